//! Tree Module
//!
//! The persistent B-tree: immutable nodes addressed by log position.
//!
//! ## Responsibilities
//! - Node layout and the records stored in the log
//! - Deterministic byte encoding (`codec`)
//! - Fetching and caching decoded nodes (`store`)
//! - Path-copying mutations (`builder`)
//! - Ordered range traversal (`cursor`) and structural diffs (`diff`)
//!
//! ## Log Layout
//! ```text
//! position 0     1         2         3
//!         ┌────────┬─────────┬─────────┬─────────┐
//!         │ Header │ Block 1 │ Block 2 │ Block 3 │ ...
//!         └────────┴─────────┴─────────┴─────────┘
//!                    │
//!                    ▼
//!         [node 0][node 1] ... [root]   (children before parents)
//! ```
//!
//! Version `v` is the log length after the append that produced it; its
//! root is the last node of the block at position `v - 1`. Versions 0 and
//! 1 are the empty tree.

pub mod codec;
pub mod cursor;
pub mod diff;
pub mod store;

pub(crate) mod builder;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::comparator::KeyComparator;
use crate::encoding::Encoding;
use crate::error::Result;

pub use cursor::RangeIter;
pub use diff::DiffIter;
pub use store::NodeStore;

// =============================================================================
// Node Layout
// =============================================================================

/// Position of a node: the block's log position plus the node's index
/// inside that block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub seq: u64,
    pub offset: u32,
}

/// A key with its value, or a tombstone when `value` is `None`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub key: Bytes,
    pub value: Option<Bytes>,
    /// Version that last wrote this key
    pub version: u64,
}

impl NodeEntry {
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

/// Immutable tree node
///
/// Leaves have no children; internal nodes have `entries.len() + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub entries: Vec<NodeEntry>,
    pub children: Vec<NodeRef>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Binary search for `key`: `Ok(i)` on an exact match, otherwise
    /// `Err(i)` where `i` is the child to descend into
    pub fn search(
        &self,
        comparator: &dyn KeyComparator,
        key: &[u8],
    ) -> std::result::Result<usize, usize> {
        search_entries(&self.entries, comparator, key)
    }
}

pub(crate) fn search_entries(
    entries: &[NodeEntry],
    comparator: &dyn KeyComparator,
    key: &[u8],
) -> std::result::Result<usize, usize> {
    entries.binary_search_by(|entry| comparator.compare(&entry.key, key))
}

// =============================================================================
// Log Records
// =============================================================================

/// Build parameters stored at log position 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub magic: [u8; 4],
    pub format_version: u16,
    pub max_entries: u16,
    pub comparator: String,
}

/// Every node written by one mutation; the root is last
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub nodes: Vec<Node>,
}

/// One log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    Header(Header),
    Block(Block),
}

// =============================================================================
// Read Results
// =============================================================================

/// A live key/value pair as seen by readers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Bytes,
    pub value: Bytes,
    /// Version that last wrote this key
    pub version: u64,
}

impl Entry {
    /// Convert a node entry, dropping tombstones
    pub(crate) fn from_node_entry(entry: &NodeEntry, strip: usize) -> Option<Self> {
        entry.value.as_ref().map(|value| Entry {
            key: entry.key.slice(strip.min(entry.key.len())..),
            value: value.clone(),
            version: entry.version,
        })
    }

    /// Decode the key with a boundary encoding
    pub fn key_as<E: Encoding>(&self, encoding: &E) -> Result<E::Value> {
        encoding.decode(&self.key)
    }

    /// Decode the value with a boundary encoding
    pub fn value_as<E: Encoding>(&self, encoding: &E) -> Result<E::Value> {
        encoding.decode(&self.value)
    }
}

/// One differing key between two versions
///
/// `left` belongs to the version the diff was started from, `right` to the
/// version passed as argument. A side is `None` when the key is absent or
/// deleted there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub key: Bytes,
    pub left: Option<Entry>,
    pub right: Option<Entry>,
}

impl DiffEntry {
    /// Only the left version holds the key
    pub fn is_left_only(&self) -> bool {
        self.left.is_some() && self.right.is_none()
    }

    /// Only the right version holds the key
    pub fn is_right_only(&self) -> bool {
        self.left.is_none() && self.right.is_some()
    }

    /// Both versions hold the key with different values
    pub fn is_modified(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }
}

/// Whether two entries read the same (tombstones compare equal to each other)
pub(crate) fn same_value(a: &NodeEntry, b: &NodeEntry) -> bool {
    a.value == b.value
}
