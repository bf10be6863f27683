//! Snapshot Module
//!
//! A read-only handle pinned to one version.
//!
//! A snapshot is just a version number plus a shared node store: taking one
//! copies nothing, and since blocks are never rewritten it reads the same
//! data no matter what the writer does afterwards.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::range::{DiffOptions, RangeOptions};
use crate::sub::Sub;
use crate::tree::{DiffIter, Entry, NodeRef, NodeStore, RangeIter};

/// Read-only view of a fixed version
#[derive(Clone)]
pub struct Snapshot {
    store: Arc<NodeStore>,
    version: u64,
    separator: Bytes,
}

impl Snapshot {
    /// Pin a version the caller has already checked against the log
    pub(crate) fn new(store: Arc<NodeStore>, version: u64, separator: Bytes) -> Self {
        Self {
            store,
            version,
            separator,
        }
    }

    /// The pinned version
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Position of this version's root node
    pub fn root(&self) -> Result<Option<NodeRef>> {
        self.store.root(self.version)
    }

    /// Whether the tree has no nodes at all (tombstones count as nodes)
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.root()?.is_none())
    }

    /// Point lookup
    ///
    /// Returns `Ok(None)` for absent and deleted keys.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Entry>> {
        let key = key.as_ref();
        let comparator = self.store.comparator();

        let mut next = self.root()?;
        while let Some(node_ref) = next {
            let node = self.store.node(node_ref)?;
            match node.search(comparator, key) {
                Ok(i) => return Ok(Entry::from_node_entry(&node.entries[i], 0)),
                Err(i) => next = node.children.get(i).copied(),
            }
        }
        Ok(None)
    }

    /// Ordered scan within bounds
    pub fn range(&self, options: RangeOptions) -> Result<RangeIter> {
        options.range.validate(self.store.comparator())?;
        Ok(RangeIter::new(Arc::clone(&self.store), self.version, options))
    }

    /// Keys that differ between this version (left) and `other` (right)
    pub fn diff(&self, other: u64, options: DiffOptions) -> Result<DiffIter> {
        self.store.check_version(other)?;
        options.range.validate(self.store.comparator())?;
        Ok(DiffIter::new(
            Arc::clone(&self.store),
            self.version,
            other,
            options.range,
            options.limit,
        ))
    }

    /// Namespace view over this version
    pub fn sub(&self, name: impl AsRef<[u8]>) -> Result<Sub<'_, Snapshot>> {
        Sub::new(self, Bytes::new(), name.as_ref(), self.separator.clone())
    }

    pub(crate) fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("version", &self.version)
            .finish()
    }
}
