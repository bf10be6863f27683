//! Node Store
//!
//! Read-only access to the nodes of every version.
//!
//! ## Responsibilities
//! - Fetch a block from the log and decode it
//! - Validate node shape before anything walks it
//! - Keep recently decoded blocks in a bounded cache
//! - Resolve the root of a version

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::comparator::KeyComparator;
use crate::error::{BrambleError, Result};
use crate::log::Log;

use super::codec;
use super::{Node, NodeRef};

/// Decoded nodes of one block
type DecodedBlock = Arc<Vec<Arc<Node>>>;

/// FIFO cache of decoded blocks, keyed by log position
struct BlockCache {
    blocks: HashMap<u64, DecodedBlock>,
    order: VecDeque<u64>,
    capacity: usize,
}

impl BlockCache {
    fn get(&self, seq: u64) -> Option<DecodedBlock> {
        self.blocks.get(&seq).cloned()
    }

    fn insert(&mut self, seq: u64, block: DecodedBlock) {
        if self.blocks.insert(seq, block).is_some() {
            return;
        }
        self.order.push_back(seq);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.blocks.remove(&evicted);
            }
        }
    }
}

/// Fetches and decodes nodes from the log
///
/// Blocks are immutable once appended, so a cached block never goes stale.
pub struct NodeStore {
    log: Arc<dyn Log>,
    comparator: Arc<dyn KeyComparator>,
    cache: Mutex<BlockCache>,
}

impl NodeStore {
    /// Create a store over a log
    pub fn new(
        log: Arc<dyn Log>,
        comparator: Arc<dyn KeyComparator>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            log,
            comparator,
            cache: Mutex::new(BlockCache {
                blocks: HashMap::new(),
                order: VecDeque::new(),
                capacity: cache_capacity.max(1),
            }),
        }
    }

    /// The underlying log
    pub fn log(&self) -> &Arc<dyn Log> {
        &self.log
    }

    /// The key order nodes were built with
    pub fn comparator(&self) -> &dyn KeyComparator {
        self.comparator.as_ref()
    }

    /// Reject versions past the end of the log
    pub fn check_version(&self, version: u64) -> Result<()> {
        let length = self.log.len();
        if version > length {
            return Err(BrambleError::InvalidVersion { version, length });
        }
        Ok(())
    }

    /// Root node of a version, or `None` for the empty tree
    pub fn root(&self, version: u64) -> Result<Option<NodeRef>> {
        self.check_version(version)?;
        if version <= 1 {
            return Ok(None);
        }

        let seq = version - 1;
        let block = self.block(seq)?;
        // decode_block rejects empty blocks, so there is always a last node
        let offset = (block.len() - 1) as u32;
        Ok(Some(NodeRef { seq, offset }))
    }

    /// Fetch one node
    pub fn node(&self, node_ref: NodeRef) -> Result<Arc<Node>> {
        let block = self.block(node_ref.seq)?;
        block.get(node_ref.offset as usize).cloned().ok_or_else(|| {
            BrambleError::CorruptNode(format!(
                "block {} has no node at offset {}",
                node_ref.seq, node_ref.offset
            ))
        })
    }

    /// Fetch and decode a block, going through the cache
    fn block(&self, seq: u64) -> Result<DecodedBlock> {
        if seq == 0 {
            return Err(BrambleError::CorruptNode(
                "log position 0 holds the header, not nodes".to_string(),
            ));
        }
        if let Some(block) = self.cache.lock().get(seq) {
            return Ok(block);
        }

        // Fetch without holding the cache lock; the log may block
        let bytes = self.log.get(seq)?;
        let block = codec::decode_block(&bytes)?;
        if block.nodes.is_empty() {
            return Err(BrambleError::CorruptNode(format!("block {} is empty", seq)));
        }

        let mut nodes = Vec::with_capacity(block.nodes.len());
        for (offset, node) in block.nodes.into_iter().enumerate() {
            self.validate(seq, offset, &node)?;
            nodes.push(Arc::new(node));
        }

        let decoded: DecodedBlock = Arc::new(nodes);
        self.cache.lock().insert(seq, Arc::clone(&decoded));
        tracing::trace!(seq, nodes = decoded.len(), "decoded block");
        Ok(decoded)
    }

    /// Check the invariants every walker relies on
    fn validate(&self, seq: u64, offset: usize, node: &Node) -> Result<()> {
        if node.entries.is_empty() {
            return Err(BrambleError::CorruptNode(format!(
                "node {}:{} has no entries",
                seq, offset
            )));
        }
        if !node.children.is_empty() && node.children.len() != node.entries.len() + 1 {
            return Err(BrambleError::CorruptNode(format!(
                "node {}:{} has {} entries but {} children",
                seq,
                offset,
                node.entries.len(),
                node.children.len()
            )));
        }

        for pair in node.entries.windows(2) {
            if self.comparator.compare(&pair[0].key, &pair[1].key) != Ordering::Less {
                return Err(BrambleError::CorruptNode(format!(
                    "node {}:{} keys are not strictly ascending",
                    seq, offset
                )));
            }
        }

        // Children must already exist when the parent is written
        for child in &node.children {
            let older = child.seq < seq || (child.seq == seq && (child.offset as usize) < offset);
            if !older || child.seq == 0 {
                return Err(BrambleError::CorruptNode(format!(
                    "node {}:{} points forward to {}:{}",
                    seq, offset, child.seq, child.offset
                )));
            }
        }
        Ok(())
    }
}
