//! Configuration for Bramble
//!
//! Centralized configuration with sensible defaults.

use std::sync::Arc;

use crate::comparator::{KeyComparator, Lexicographic};
use crate::error::{BrambleError, Result};

/// Main configuration for a Bramble engine
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Tree Configuration
    // -------------------------------------------------------------------------
    /// Maximum entries per node before it splits.
    /// Split halves hold at least `max_entries / 2` entries.
    /// Ignored when opening a log whose header already records a value.
    pub max_entries: usize,

    /// Key order. Recorded by name in the log header.
    pub comparator: Arc<dyn KeyComparator>,

    // -------------------------------------------------------------------------
    // Read Path Configuration
    // -------------------------------------------------------------------------
    /// Number of decoded blocks kept in the node cache
    pub node_cache_capacity: usize,

    // -------------------------------------------------------------------------
    // Sub-namespace Configuration
    // -------------------------------------------------------------------------
    /// Separator appended to every namespace name
    pub separator: Vec<u8>,

    // -------------------------------------------------------------------------
    // Log Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often a file-backed log calls fsync
    pub log_sync_strategy: LogSyncStrategy,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryAppend,

    /// fsync after N appends (balanced durability/performance)
    EveryNAppends { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 8,
            comparator: Arc::new(Lexicographic),
            node_cache_capacity: 1024,
            separator: vec![0u8],
            log_sync_strategy: LogSyncStrategy::EveryAppend,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the tree cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_entries < 2 {
            return Err(BrambleError::Config(format!(
                "max_entries must be at least 2, got {}",
                self.max_entries
            )));
        }
        if self.max_entries > u16::MAX as usize {
            return Err(BrambleError::Config(format!(
                "max_entries must fit in u16, got {}",
                self.max_entries
            )));
        }
        if self.separator.is_empty() {
            return Err(BrambleError::Config(
                "namespace separator must not be empty".to_string(),
            ));
        }
        if self.node_cache_capacity == 0 {
            return Err(BrambleError::Config(
                "node_cache_capacity must be non-zero".to_string(),
            ));
        }
        if let LogSyncStrategy::EveryNAppends { count: 0 } = self.log_sync_strategy {
            return Err(BrambleError::Config(
                "EveryNAppends count must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the maximum number of entries per node
    pub fn max_entries(mut self, count: usize) -> Self {
        self.config.max_entries = count;
        self
    }

    /// Set the key comparator
    pub fn comparator(mut self, comparator: Arc<dyn KeyComparator>) -> Self {
        self.config.comparator = comparator;
        self
    }

    /// Set the node cache capacity (in blocks)
    pub fn node_cache_capacity(mut self, blocks: usize) -> Self {
        self.config.node_cache_capacity = blocks;
        self
    }

    /// Set the sub-namespace separator
    pub fn separator(mut self, separator: impl Into<Vec<u8>>) -> Self {
        self.config.separator = separator.into();
        self
    }

    /// Set the log sync strategy
    pub fn log_sync_strategy(mut self, strategy: LogSyncStrategy) -> Self {
        self.config.log_sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
