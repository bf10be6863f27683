//! Engine Module
//!
//! The versioned index over one append-only log.
//!
//! ## Responsibilities
//! - Write or verify the log header on open
//! - Serialize mutations and append one block per change-set
//! - Publish the new head version only after the append succeeded
//! - Hand out snapshots, cursors and namespace views

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::batch::Batch;
use crate::comparator::KeyComparator;
use crate::config::Config;
use crate::error::{BrambleError, Result};
use crate::log::{FileLog, Log, MemoryLog};
use crate::range::{DiffOptions, RangeOptions};
use crate::snapshot::Snapshot;
use crate::sub::Sub;
use crate::tree::builder::{IndexBuilder, Op};
use crate::tree::codec;
use crate::tree::{DiffIter, Entry, NodeStore, RangeIter, Record};

/// State owned by the single writer
struct Writer {
    /// Version the next change-set builds on
    version: u64,
}

/// The main engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/del/batch flush): serialized by `writer`
///   - Only ONE change-set is built and appended at a time
///   - The head is published after the log accepted the block
///
/// - **Reads** (get/range/diff/snapshot): never take `writer`
///   - A read loads `head` once and stays on that version
///   - Nodes are immutable, so readers share the node cache freely
pub struct Engine {
    config: Config,
    store: Arc<NodeStore>,
    log: Arc<dyn Log>,
    separator: Bytes,
    writer: Mutex<Writer>,
    /// Latest published version
    head: AtomicU64,
}

impl Engine {
    /// Open an engine over any log
    ///
    /// An empty log gets a header recording the fan-out and comparator.
    /// An existing log must have been written with a comparator of the same
    /// name; its recorded fan-out replaces `config.max_entries`.
    pub fn open(log: Arc<dyn Log>, config: Config) -> Result<Self> {
        config.validate()?;
        let mut config = config;

        if log.is_empty() {
            let header = codec::encode_header(config.max_entries as u16, config.comparator.name())?;
            log.append(&[header])?;
            info!(
                max_entries = config.max_entries,
                comparator = config.comparator.name(),
                "initialized new log"
            );
        } else {
            let header = codec::decode_header(&log.get(0)?)?;
            if header.comparator != config.comparator.name() {
                return Err(BrambleError::IncompatibleLog(format!(
                    "log was written with comparator {}, opened with {}",
                    header.comparator,
                    config.comparator.name()
                )));
            }
            if header.max_entries < 2 {
                return Err(BrambleError::IncompatibleLog(format!(
                    "header records max_entries {}",
                    header.max_entries
                )));
            }
            if header.max_entries as usize != config.max_entries {
                warn!(
                    configured = config.max_entries,
                    recorded = header.max_entries,
                    "using max_entries recorded in the log header"
                );
                config.max_entries = header.max_entries as usize;
            }
        }

        let version = log.len();
        let store = Arc::new(NodeStore::new(
            Arc::clone(&log),
            Arc::clone(&config.comparator),
            config.node_cache_capacity,
        ));
        info!(version, "engine opened");

        Ok(Self {
            separator: Bytes::from(config.separator.clone()),
            config,
            store,
            log,
            writer: Mutex::new(Writer { version }),
            head: AtomicU64::new(version),
        })
    }

    /// Open an engine over a fresh in-memory log
    pub fn open_memory(config: Config) -> Result<Self> {
        Self::open(Arc::new(MemoryLog::new()), config)
    }

    /// Open or create an engine backed by a single log file
    pub fn open_file(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let log = FileLog::open(path.as_ref(), config.log_sync_strategy)?;
        let stats = log.recovery();
        if stats.was_truncated {
            warn!(
                path = %path.as_ref().display(),
                bytes_truncated = stats.bytes_truncated,
                "log tail was truncated during recovery"
            );
        }
        Self::open(Arc::new(log), config)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Latest published version
    pub fn version(&self) -> u64 {
        self.head.load(Ordering::Acquire)
    }

    /// Read-only handle on the latest version
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(Arc::clone(&self.store), self.version(), self.separator.clone())
    }

    /// Read-only handle on an earlier (or the current) version
    pub fn checkout(&self, version: u64) -> Result<Snapshot> {
        self.store.check_version(version)?;
        Ok(Snapshot::new(
            Arc::clone(&self.store),
            version,
            self.separator.clone(),
        ))
    }

    /// Point lookup at the latest version
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Entry>> {
        self.snapshot().get(key)
    }

    /// Ordered scan of the latest version
    pub fn range(&self, options: RangeOptions) -> Result<RangeIter> {
        self.snapshot().range(options)
    }

    /// Keys that differ between the latest version (left) and `other` (right)
    pub fn diff(&self, other: u64, options: DiffOptions) -> Result<DiffIter> {
        self.snapshot().diff(other, options)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert or replace a key, returning the new version
    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<u64> {
        self.commit(vec![Op::Put {
            key: Bytes::copy_from_slice(key.as_ref()),
            value: Bytes::copy_from_slice(value.as_ref()),
        }])
    }

    /// Delete a key, returning the resulting version
    ///
    /// Deleting a key that is not live changes nothing and returns the
    /// current version.
    pub fn del(&self, key: impl AsRef<[u8]>) -> Result<u64> {
        self.commit(vec![Op::Del {
            key: Bytes::copy_from_slice(key.as_ref()),
        }])
    }

    /// Start a batch of writes committed as one version
    pub fn batch(&self) -> Batch<'_> {
        Batch::new(self, Bytes::new())
    }

    /// Namespace view
    pub fn sub(&self, name: impl AsRef<[u8]>) -> Result<Sub<'_, Engine>> {
        Sub::new(self, Bytes::new(), name.as_ref(), self.separator.clone())
    }

    /// Build one change-set on the head and append it as a single block
    pub(crate) fn commit(&self, ops: Vec<Op>) -> Result<u64> {
        let mut writer = self.writer.lock();

        let length = self.log.len();
        if length != writer.version {
            return Err(BrambleError::LogCorruption(format!(
                "log length {} does not match head version {}",
                length, writer.version
            )));
        }

        let op_count = ops.len();
        let mut builder = IndexBuilder::new(&self.store, writer.version, self.config.max_entries)?;
        for op in ops {
            builder.apply(op)?;
        }
        let target = builder.target_version();

        let block = match builder.finish()? {
            Some(block) => block,
            None => {
                debug!(version = writer.version, op_count, "change-set left the tree unchanged");
                return Ok(writer.version);
            }
        };
        let node_count = block.nodes.len();
        let bytes = codec::encode_record(&Record::Block(block))?;
        let byte_count = bytes.len();

        let new_length = self.log.append(&[bytes])?;
        if new_length != target {
            return Err(BrambleError::LogCorruption(format!(
                "append produced length {}, expected {}",
                new_length, target
            )));
        }

        writer.version = new_length;
        self.head.store(new_length, Ordering::Release);
        debug!(
            version = new_length,
            op_count, node_count, byte_count, "committed block"
        );
        Ok(new_length)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Effective configuration (fan-out taken from the log header)
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The key order
    pub fn comparator(&self) -> &dyn KeyComparator {
        self.store.comparator()
    }

    /// The underlying log
    pub fn log(&self) -> &Arc<dyn Log> {
        &self.log
    }

    /// Force the log to stable storage
    pub fn sync(&self) -> Result<()> {
        self.log.sync()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("version", &self.version())
            .field("max_entries", &self.config.max_entries)
            .field("comparator", &self.config.comparator.name())
            .finish()
    }
}
