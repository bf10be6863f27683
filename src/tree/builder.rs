//! Index Builder
//!
//! Turns a change-set into the block of new nodes for the next version.
//!
//! ## Path Copying
//! ```text
//!   base version            next version
//!       [R]                     [R']          R' and L' are new,
//!      /   \                   /    \         written in one block
//!    [A]   [L]      ==>      [A]    [L']      A is shared by position
//! ```
//!
//! Only nodes on the path from the root to the touched entry are copied
//! into the working arena. Everything else stays a [`NodeRef`] into the log.
//! Deletes write tombstones and never merge nodes, so a node never shrinks
//! below the size it was split at.

use bytes::Bytes;

use crate::error::{BrambleError, Result};

use super::store::NodeStore;
use super::{search_entries, Block, Node, NodeEntry, NodeRef};

/// A buffered mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Put { key: Bytes, value: Bytes },
    Del { key: Bytes },
}

impl Op {
    pub(crate) fn key(&self) -> &Bytes {
        match self {
            Op::Put { key, .. } | Op::Del { key } => key,
        }
    }
}

/// Child of a working node: untouched in the log, or copied into the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Child {
    Stored(NodeRef),
    Dirty(usize),
}

/// Mutable copy of a node
#[derive(Debug, Default)]
struct DirtyNode {
    entries: Vec<NodeEntry>,
    children: Vec<Child>,
}

/// Applies operations on top of a base version
pub(crate) struct IndexBuilder<'a> {
    store: &'a NodeStore,
    max_entries: usize,
    /// Log position the new block will occupy
    seq: u64,
    root: Option<Child>,
    arena: Vec<DirtyNode>,
    changed: bool,
}

impl<'a> IndexBuilder<'a> {
    /// Start a change-set against `base`
    ///
    /// The new block is placed at the current end of the log.
    pub(crate) fn new(store: &'a NodeStore, base: u64, max_entries: usize) -> Result<Self> {
        let root = store.root(base)?.map(Child::Stored);
        Ok(Self {
            store,
            max_entries,
            seq: store.log().len(),
            root,
            arena: Vec::new(),
            changed: false,
        })
    }

    /// Version the block will produce when appended
    pub(crate) fn target_version(&self) -> u64 {
        self.seq + 1
    }

    pub(crate) fn apply(&mut self, op: Op) -> Result<()> {
        match op {
            Op::Put { key, value } => self.put(key, value),
            Op::Del { key } => self.del(key),
        }
    }

    /// Insert or replace a key
    fn put(&mut self, key: Bytes, value: Bytes) -> Result<()> {
        let entry = NodeEntry {
            key,
            value: Some(value),
            version: self.target_version(),
        };
        self.write(entry)
    }

    /// Tombstone a key; a no-op when it is absent or already deleted
    fn del(&mut self, key: Bytes) -> Result<()> {
        match self.lookup(&key)? {
            Some(existing) if !existing.is_tombstone() => {}
            _ => return Ok(()),
        }

        let entry = NodeEntry {
            key,
            value: None,
            version: self.target_version(),
        };
        self.write(entry)
    }

    /// Path-copy down to the owner of `entry.key` and store it there
    fn write(&mut self, entry: NodeEntry) -> Result<()> {
        self.changed = true;

        let root = match self.root {
            Some(root) => self.materialize(root)?,
            None => {
                self.arena.push(DirtyNode {
                    entries: vec![entry],
                    children: Vec::new(),
                });
                self.root = Some(Child::Dirty(self.arena.len() - 1));
                return Ok(());
            }
        };
        self.root = Some(Child::Dirty(root));

        let store = self.store;
        // (node, child index taken) from the root down
        let mut path: Vec<(usize, usize)> = Vec::new();
        let mut current = root;

        loop {
            match search_entries(&self.arena[current].entries, store.comparator(), &entry.key) {
                Ok(i) => {
                    self.arena[current].entries[i] = entry;
                    return Ok(());
                }
                Err(i) => {
                    if self.arena[current].children.is_empty() {
                        self.arena[current].entries.insert(i, entry);
                        break;
                    }
                    let next = self.arena[current].children[i];
                    let child = self.materialize(next)?;
                    self.arena[current].children[i] = Child::Dirty(child);
                    path.push((current, i));
                    current = child;
                }
            }
        }

        self.rebalance(current, path);
        Ok(())
    }

    /// Split overfull nodes from `current` back up to the root
    fn rebalance(&mut self, mut current: usize, mut path: Vec<(usize, usize)>) {
        while self.arena[current].entries.len() > self.max_entries {
            let (median, right) = self.split(current);

            match path.pop() {
                Some((parent, i)) => {
                    let node = &mut self.arena[parent];
                    node.entries.insert(i, median);
                    node.children.insert(i + 1, Child::Dirty(right));
                    current = parent;
                }
                None => {
                    self.arena.push(DirtyNode {
                        entries: vec![median],
                        children: vec![Child::Dirty(current), Child::Dirty(right)],
                    });
                    self.root = Some(Child::Dirty(self.arena.len() - 1));
                    return;
                }
            }
        }
    }

    /// Split a node around its median; the left half stays in place
    fn split(&mut self, index: usize) -> (NodeEntry, usize) {
        let node = &mut self.arena[index];
        let mid = node.entries.len() / 2;

        let right_entries = node.entries.split_off(mid + 1);
        let median = node.entries.remove(mid);
        let right_children = if node.children.is_empty() {
            Vec::new()
        } else {
            node.children.split_off(mid + 1)
        };

        self.arena.push(DirtyNode {
            entries: right_entries,
            children: right_children,
        });
        (median, self.arena.len() - 1)
    }

    /// Copy a stored node into the arena (no-op for dirty nodes)
    fn materialize(&mut self, child: Child) -> Result<usize> {
        match child {
            Child::Dirty(index) => Ok(index),
            Child::Stored(node_ref) => {
                let node = self.store.node(node_ref)?;
                self.arena.push(DirtyNode {
                    entries: node.entries.clone(),
                    children: node.children.iter().map(|c| Child::Stored(*c)).collect(),
                });
                Ok(self.arena.len() - 1)
            }
        }
    }

    /// Find a key in the working tree without copying anything
    pub(crate) fn lookup(&self, key: &[u8]) -> Result<Option<NodeEntry>> {
        let comparator = self.store.comparator();
        let mut next = self.root;

        while let Some(child) = next {
            next = match child {
                Child::Dirty(index) => {
                    let node = &self.arena[index];
                    match search_entries(&node.entries, comparator, key) {
                        Ok(i) => return Ok(Some(node.entries[i].clone())),
                        Err(i) => node.children.get(i).copied(),
                    }
                }
                Child::Stored(node_ref) => {
                    let node = self.store.node(node_ref)?;
                    match node.search(comparator, key) {
                        Ok(i) => return Ok(Some(node.entries[i].clone())),
                        Err(i) => node.children.get(i).map(|c| Child::Stored(*c)),
                    }
                }
            };
        }
        Ok(None)
    }

    /// Lay out the copied nodes children-first, root last
    ///
    /// Returns `None` when no operation changed the tree.
    pub(crate) fn finish(mut self) -> Result<Option<Block>> {
        if !self.changed {
            return Ok(None);
        }
        let root = match self.root {
            Some(Child::Dirty(root)) => root,
            _ => {
                return Err(BrambleError::CorruptNode(
                    "changed tree has no copied root".to_string(),
                ))
            }
        };

        let mut nodes = Vec::with_capacity(self.arena.len());
        self.emit(root, &mut nodes);
        Ok(Some(Block { nodes }))
    }

    fn emit(&mut self, index: usize, out: &mut Vec<Node>) -> NodeRef {
        let dirty = std::mem::take(&mut self.arena[index]);

        let children = dirty
            .children
            .iter()
            .map(|child| match *child {
                Child::Stored(node_ref) => node_ref,
                Child::Dirty(child) => self.emit(child, out),
            })
            .collect();

        out.push(Node {
            entries: dirty.entries,
            children,
        });
        NodeRef {
            seq: self.seq,
            offset: (out.len() - 1) as u32,
        }
    }
}
