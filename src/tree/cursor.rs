//! Range Cursor
//!
//! Lazy ordered traversal of one version.
//!
//! The cursor keeps a stack of `(node, position)` frames, one per level,
//! so its state is bounded by tree height. The first call to `next` seeks
//! to the starting bound; every later call emits at most one entry and
//! fetches only the nodes on the way to the next one. Dropping the cursor
//! at any point releases everything it holds.

use std::sync::Arc;

use crate::error::Result;
use crate::range::{Bound, KeyRange, RangeOptions};

use super::store::NodeStore;
use super::{Entry, Node, NodeEntry, NodeRef};

/// One level of the path stack
///
/// Ascending: `pos` is the next entry to emit.
/// Descending: `pos` counts the entries not yet emitted, so the next one is
/// `pos - 1`.
struct Frame {
    node: Arc<Node>,
    pos: usize,
}

/// Iterator over the live entries of a version within bounds
pub struct RangeIter {
    store: Arc<NodeStore>,
    version: u64,
    range: KeyRange,
    limit: Option<usize>,
    reverse: bool,
    /// Prefix bytes removed from emitted keys
    strip: usize,
    stack: Vec<Frame>,
    emitted: usize,
    started: bool,
    done: bool,
}

impl RangeIter {
    /// Create a cursor; bounds must already be validated
    pub(crate) fn new(store: Arc<NodeStore>, version: u64, options: RangeOptions) -> Self {
        Self {
            store,
            version,
            range: options.range,
            limit: options.limit,
            reverse: options.reverse,
            strip: 0,
            stack: Vec::new(),
            emitted: 0,
            started: false,
            done: false,
        }
    }

    /// Remove a namespace prefix from every emitted key
    pub(crate) fn strip_prefix(mut self, len: usize) -> Self {
        self.strip = len;
        self
    }

    /// Version this cursor reads
    pub fn version(&self) -> u64 {
        self.version
    }

    // =========================================================================
    // Seeking
    // =========================================================================

    /// Build the path to the first entry inside the starting bound
    fn seek(&mut self) -> Result<()> {
        let bound = if self.reverse {
            self.range.upper()
        } else {
            self.range.lower()
        };

        let mut next = self.store.root(self.version)?;
        while let Some(node_ref) = next {
            let node = self.store.node(node_ref)?;
            let (pos, descend) = self.start_position(&node, bound.as_ref());
            next = if descend {
                node.children.get(pos).copied()
            } else {
                None
            };
            self.stack.push(Frame { node, pos });
        }
        Ok(())
    }

    /// Frame position for the starting bound, and whether the child at that
    /// position may still hold keys inside the range
    fn start_position(&self, node: &Node, bound: Option<&Bound>) -> (usize, bool) {
        let len = node.entries.len();
        let bound = match bound {
            None => return (if self.reverse { len } else { 0 }, true),
            Some(bound) => bound,
        };

        match (node.search(self.store.comparator(), &bound.key), self.reverse) {
            // Exact hit, inclusive: everything in the neighbouring child is
            // outside the range
            (Ok(i), false) if bound.inclusive => (i, false),
            (Ok(i), false) => (i + 1, true),
            (Ok(i), true) if bound.inclusive => (i + 1, false),
            (Ok(i), true) => (i, true),
            (Err(i), _) => (i, true),
        }
    }

    /// Push the path from `node_ref` down its outermost edge
    fn descend(&mut self, mut node_ref: NodeRef) -> Result<()> {
        loop {
            let node = self.store.node(node_ref)?;
            let (pos, next) = if self.reverse {
                (node.entries.len(), node.children.last().copied())
            } else {
                (0, node.children.first().copied())
            };
            self.stack.push(Frame { node, pos });
            match next {
                Some(child) => node_ref = child,
                None => return Ok(()),
            }
        }
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Next raw entry in traversal order, tombstones included
    fn step(&mut self) -> Result<Option<NodeEntry>> {
        loop {
            let frame = match self.stack.last_mut() {
                Some(frame) => frame,
                None => return Ok(None),
            };

            let (entry, child) = if self.reverse {
                if frame.pos == 0 {
                    self.stack.pop();
                    continue;
                }
                frame.pos -= 1;
                (
                    frame.node.entries[frame.pos].clone(),
                    frame.node.children.get(frame.pos).copied(),
                )
            } else {
                if frame.pos >= frame.node.entries.len() {
                    self.stack.pop();
                    continue;
                }
                frame.pos += 1;
                (
                    frame.node.entries[frame.pos - 1].clone(),
                    frame.node.children.get(frame.pos).copied(),
                )
            };

            if let Some(child) = child {
                self.descend(child)?;
            }
            return Ok(Some(entry));
        }
    }

    fn next_entry(&mut self) -> Result<Option<Entry>> {
        if !self.started {
            self.started = true;
            if self.limit == Some(0) {
                return Ok(None);
            }
            self.seek()?;
        }

        while let Some(entry) = self.step()? {
            let comparator = self.store.comparator();
            let inside = if self.reverse {
                self.range.above_lower(comparator, &entry.key)
            } else {
                self.range.below_upper(comparator, &entry.key)
            };
            if !inside {
                return Ok(None);
            }

            if let Some(entry) = Entry::from_node_entry(&entry, self.strip) {
                self.emitted += 1;
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    fn finish(&mut self) {
        self.done = true;
        self.stack.clear();
    }
}

impl Iterator for RangeIter {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_entry() {
            Ok(Some(entry)) => {
                if self.limit.is_some_and(|limit| self.emitted >= limit) {
                    self.finish();
                }
                Some(Ok(entry))
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}
