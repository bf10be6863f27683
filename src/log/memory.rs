//! In-memory log
//!
//! Entries live in a `Vec` behind a RwLock; an append holds the write lock
//! for the whole group, so readers never observe half of it.

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{BrambleError, Result};

use super::Log;

/// Log kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: RwLock<Vec<Bytes>>,
}

impl MemoryLog {
    /// Create a new empty log
    pub fn new() -> Self {
        Self::default()
    }
}

impl Log for MemoryLog {
    fn append(&self, entries: &[Vec<u8>]) -> Result<u64> {
        let mut log = self.entries.write();
        log.extend(entries.iter().map(|e| Bytes::copy_from_slice(e)));
        Ok(log.len() as u64)
    }

    fn get(&self, position: u64) -> Result<Bytes> {
        let log = self.entries.read();
        log.get(position as usize)
            .cloned()
            .ok_or(BrambleError::EntryUnavailable {
                position,
                length: log.len() as u64,
            })
    }

    fn len(&self) -> u64 {
        self.entries.read().len() as u64
    }
}
