//! Log Module
//!
//! The only storage primitive the tree uses: an ordered, append-only
//! sequence of immutable byte entries addressable by position.
//!
//! ## Responsibilities
//! - Append a group of entries atomically (all visible or none)
//! - Return the entry stored at a position
//! - Report the current length, which defines the version space `[0, len]`
//!
//! ## Implementations
//! - [`MemoryLog`]: in-process, for tests and ephemeral trees
//! - [`FileLog`]: single append-only file with CRC32 framing and
//!   torn-tail recovery

mod file;
mod memory;

use bytes::Bytes;

use crate::error::Result;

pub use file::{FileLog, RecoveryStats};
pub use memory::MemoryLog;

/// Append-only, position-addressed log of immutable entries
///
/// Entries are durable once `append` returns. `get` may block while an
/// entry is fetched; implementations report positions past the end as
/// [`BrambleError::EntryUnavailable`](crate::BrambleError::EntryUnavailable).
pub trait Log: Send + Sync {
    /// Append all entries as one atomic group, returning the new length
    fn append(&self, entries: &[Vec<u8>]) -> Result<u64>;

    /// Read the entry at `position`
    fn get(&self, position: u64) -> Result<Bytes>;

    /// Current number of entries
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Force appended entries to stable storage
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
