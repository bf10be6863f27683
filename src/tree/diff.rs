//! Diff Cursor
//!
//! Structural comparison of two versions.
//!
//! Each side is flattened lazily into a sorted stream of items, where an
//! item is either an entry or a whole unexpanded subtree:
//!
//! ```text
//!   node [k1 k2] with children c0 c1 c2  =>  c0, k1, c1, k2, c2
//! ```
//!
//! When both streams are positioned on the same [`NodeRef`] the subtree is
//! identical on both sides and is skipped without being fetched. Otherwise
//! the newer subtree is expanded first, since an older subtree is often a
//! child of the newer one. Entries are merged by key.
//!
//! A lower bound is applied by descending both sides to it first, so the
//! items before the bound are never fetched.

use std::cmp::Ordering;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::range::{Bound, KeyRange};

use super::store::NodeStore;
use super::{same_value, DiffEntry, Entry, Node, NodeEntry, NodeRef};

/// Next item of one side
enum Head {
    Subtree(NodeRef),
    Entry(NodeEntry),
    End,
}

struct Frame {
    node: Arc<Node>,
    /// Index into the interleaved child/entry sequence
    item: usize,
}

/// Sorted item stream over one version's tree
struct Walker {
    /// Root not yet expanded
    root: Option<NodeRef>,
    stack: Vec<Frame>,
}

impl Walker {
    fn new(root: Option<NodeRef>) -> Self {
        Self {
            root,
            stack: Vec::new(),
        }
    }

    fn peek(&mut self) -> Head {
        if let Some(root) = self.root {
            return Head::Subtree(root);
        }

        while let Some(frame) = self.stack.last() {
            let node = &frame.node;
            let items = if node.is_leaf() {
                node.entries.len()
            } else {
                2 * node.entries.len() + 1
            };

            if frame.item >= items {
                self.stack.pop();
                continue;
            }

            return if node.is_leaf() {
                Head::Entry(node.entries[frame.item].clone())
            } else if frame.item % 2 == 0 {
                Head::Subtree(node.children[frame.item / 2])
            } else {
                Head::Entry(node.entries[frame.item / 2].clone())
            };
        }
        Head::End
    }

    /// Consume the current item
    fn advance(&mut self) {
        if self.root.take().is_some() {
            return;
        }
        if let Some(frame) = self.stack.last_mut() {
            frame.item += 1;
        }
    }

    /// Descend from the root towards `lower`, leaving out every item that
    /// lies wholly below it. Subtrees that straddle the bound are opened.
    fn seek(&mut self, store: &NodeStore, lower: &Bound) -> Result<()> {
        let mut next = self.root.take();
        while let Some(node_ref) = next {
            let node = store.node(node_ref)?;
            let leaf = node.is_leaf();
            let (item, child) = match node.search(store.comparator(), &lower.key) {
                Ok(i) if lower.inclusive => (if leaf { i } else { 2 * i + 1 }, None),
                Ok(i) => (if leaf { i + 1 } else { 2 * i + 2 }, None),
                Err(i) if leaf => (i, None),
                Err(i) => (2 * i + 1, node.children.get(i).copied()),
            };
            self.stack.push(Frame { node, item });
            next = child;
        }
        Ok(())
    }

    /// Replace the current subtree item with its contents
    fn expand(&mut self, store: &NodeStore, node_ref: NodeRef) -> Result<()> {
        let node = store.node(node_ref)?;
        self.advance();
        self.stack.push(Frame { node, item: 0 });
        Ok(())
    }
}

/// Iterator over the keys that differ between two versions
pub struct DiffIter {
    store: Arc<NodeStore>,
    left_version: u64,
    right_version: u64,
    left: Walker,
    right: Walker,
    range: KeyRange,
    limit: Option<usize>,
    strip: usize,
    emitted: usize,
    started: bool,
    done: bool,
}

impl DiffIter {
    /// Create a diff cursor; versions and bounds must already be validated
    pub(crate) fn new(
        store: Arc<NodeStore>,
        left_version: u64,
        right_version: u64,
        range: KeyRange,
        limit: Option<usize>,
    ) -> Self {
        Self {
            store,
            left_version,
            right_version,
            left: Walker::new(None),
            right: Walker::new(None),
            range,
            limit,
            strip: 0,
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

    /// Version reported on the left side of each record
    pub fn left_version(&self) -> u64 {
        self.left_version
    }

    /// Version reported on the right side of each record
    pub fn right_version(&self) -> u64 {
        self.right_version
    }

    fn start(&mut self) -> Result<()> {
        self.left = Walker::new(self.store.root(self.left_version)?);
        self.right = Walker::new(self.store.root(self.right_version)?);
        if let Some(lower) = self.range.lower() {
            self.left.seek(&self.store, &lower)?;
            self.right.seek(&self.store, &lower)?;
        }
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<DiffEntry>> {
        if !self.started {
            self.started = true;
            if self.limit == Some(0) {
                return Ok(None);
            }
            self.start()?;
        }

        loop {
            let left = self.left.peek();
            let right = self.right.peek();

            let (left_entry, right_entry) = match (left, right) {
                (Head::End, Head::End) => return Ok(None),

                // Same position, same bytes: nothing below can differ
                (Head::Subtree(a), Head::Subtree(b)) if a == b => {
                    self.left.advance();
                    self.right.advance();
                    continue;
                }
                (Head::Subtree(a), Head::Subtree(b)) => {
                    if a > b {
                        self.left.expand(&self.store, a)?;
                    } else {
                        self.right.expand(&self.store, b)?;
                    }
                    continue;
                }
                (Head::Subtree(a), _) => {
                    self.left.expand(&self.store, a)?;
                    continue;
                }
                (_, Head::Subtree(b)) => {
                    self.right.expand(&self.store, b)?;
                    continue;
                }

                (Head::Entry(a), Head::End) => {
                    self.left.advance();
                    (Some(a), None)
                }
                (Head::End, Head::Entry(b)) => {
                    self.right.advance();
                    (None, Some(b))
                }
                (Head::Entry(a), Head::Entry(b)) => {
                    match self.store.comparator().compare(&a.key, &b.key) {
                        Ordering::Less => {
                            self.left.advance();
                            (Some(a), None)
                        }
                        Ordering::Greater => {
                            self.right.advance();
                            (None, Some(b))
                        }
                        Ordering::Equal => {
                            self.left.advance();
                            self.right.advance();
                            (Some(a), Some(b))
                        }
                    }
                }
            };

            // The candidate is the smallest key left on either side
            let key: Bytes = match (&left_entry, &right_entry) {
                (Some(entry), _) | (None, Some(entry)) => entry.key.clone(),
                (None, None) => continue,
            };
            let comparator = self.store.comparator();
            if !self.range.below_upper(comparator, &key) {
                return Ok(None);
            }
            if !self.range.above_lower(comparator, &key) {
                continue;
            }

            if let Some(record) = self.record(key, left_entry, right_entry) {
                self.emitted += 1;
                return Ok(Some(record));
            }
        }
    }

    /// Build the output record, or `None` when both sides read the same
    fn record(
        &self,
        key: Bytes,
        left: Option<NodeEntry>,
        right: Option<NodeEntry>,
    ) -> Option<DiffEntry> {
        if let (Some(a), Some(b)) = (&left, &right) {
            if same_value(a, b) {
                return None;
            }
        }

        let left = left.and_then(|e| Entry::from_node_entry(&e, self.strip));
        let right = right.and_then(|e| Entry::from_node_entry(&e, self.strip));
        if left.is_none() && right.is_none() {
            // Tombstone against absence
            return None;
        }

        Some(DiffEntry {
            key: key.slice(self.strip.min(key.len())..),
            left,
            right,
        })
    }

    fn finish(&mut self) {
        self.done = true;
        self.left = Walker::new(None);
        self.right = Walker::new(None);
    }
}

impl Iterator for DiffIter {
    type Item = Result<DiffEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => {
                if self.limit.is_some_and(|limit| self.emitted >= limit) {
                    self.finish();
                }
                Some(Ok(record))
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
