//! # Bramble
//!
//! A persistent, versioned, ordered key/value index stored in an
//! append-only log:
//! - Copy-on-write B-tree: every mutation appends one block of new nodes
//! - Any past version can be checked out and read
//! - Ordered range scans, forward and reverse
//! - Structural diffs that skip shared subtrees without reading them
//! - Atomic batches and key-prefixed sub-namespaces
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Engine / Snapshot / Sub / Batch                 │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Builder   │          │  Cursors    │
//!   │ (path copy) │          │(range/diff) │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          │                        ▼
//!          │                ┌─────────────┐
//!          │                │  NodeStore  │
//!          │                │   (cache)   │
//!          │                └──────┬──────┘
//!          ▼                       ▼
//!   ┌─────────────────────────────────────┐
//!   │                 Log                 │
//!   │         (memory or file)            │
//!   └─────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use bramble::{Config, Engine, RangeOptions};
//!
//! let engine = Engine::open_memory(Config::default())?;
//! engine.put("a", "1")?;
//! let v = engine.put("b", "2")?;
//! engine.del("a")?;
//!
//! assert!(engine.get("a")?.is_none());
//! assert!(engine.checkout(v)?.get("a")?.is_some());
//!
//! let keys = engine
//!     .range(RangeOptions::new())?
//!     .map(|e| e.map(|e| e.key.to_vec()))
//!     .collect::<bramble::Result<Vec<_>>>()?;
//! assert_eq!(keys, vec![b"b".to_vec()]);
//! # Ok::<(), bramble::BrambleError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod comparator;
pub mod encoding;
pub mod range;

pub mod log;
pub mod tree;
pub mod snapshot;
pub mod batch;
pub mod sub;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BrambleError, Result};
pub use config::{Config, ConfigBuilder, LogSyncStrategy};
pub use comparator::{KeyComparator, Lexicographic, ReverseLexicographic};
pub use encoding::{Binary, Encoding, Utf8};
pub use range::{DiffOptions, KeyRange, RangeOptions};
pub use log::{FileLog, Log, MemoryLog, RecoveryStats};
pub use tree::{DiffEntry, DiffIter, Entry, NodeRef, RangeIter};
pub use snapshot::Snapshot;
pub use batch::Batch;
pub use sub::{Source, Sub};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Bramble
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
