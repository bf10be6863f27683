//! Batch Module
//!
//! Buffers writes and commits them as a single version.
//!
//! Nothing touches the log until [`Batch::flush`]. The whole change-set
//! then goes through one index-builder pass and one append, so readers see
//! either none of it or all of it. Dropping a batch without flushing
//! discards it.

use bytes::{BufMut, Bytes, BytesMut};

use crate::engine::Engine;
use crate::error::Result;
use crate::tree::builder::Op;
use crate::tree::Entry;

/// Pending writes against an engine
pub struct Batch<'a> {
    engine: &'a Engine,
    ops: Vec<Op>,
    /// Namespace prefix applied to every key
    prefix: Bytes,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(engine: &'a Engine, prefix: Bytes) -> Self {
        Self {
            engine,
            ops: Vec::new(),
            prefix,
        }
    }

    /// Queue a put
    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        let key = self.key(key.as_ref());
        self.ops.push(Op::Put {
            key,
            value: Bytes::copy_from_slice(value.as_ref()),
        });
    }

    /// Queue a delete
    pub fn del(&mut self, key: impl AsRef<[u8]>) {
        let key = self.key(key.as_ref());
        self.ops.push(Op::Del { key });
    }

    /// Read a key as the batch would leave it
    ///
    /// Pending writes win over the live version. A pending put reports the
    /// version the batch would produce if flushed now.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Entry>> {
        let user_key = key.as_ref();
        let full = self.key(user_key);
        let comparator = self.engine.comparator();

        let pending = self
            .ops
            .iter()
            .rev()
            .find(|op| comparator.compare(op.key(), &full).is_eq());

        match pending {
            Some(Op::Put { value, .. }) => Ok(Some(Entry {
                key: Bytes::copy_from_slice(user_key),
                value: value.clone(),
                version: self.engine.version() + 1,
            })),
            Some(Op::Del { .. }) => Ok(None),
            None => {
                let entry = self.engine.get(&full)?;
                Ok(entry.map(|mut entry| {
                    entry.key = entry.key.slice(self.prefix.len()..);
                    entry
                }))
            }
        }
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Commit every queued operation as one version
    ///
    /// Returns the new version, or the current one when nothing changed.
    /// On error the engine is untouched and the batch can be rebuilt and
    /// retried.
    pub fn flush(self) -> Result<u64> {
        self.engine.commit(self.ops)
    }

    fn key(&self, key: &[u8]) -> Bytes {
        if self.prefix.is_empty() {
            return Bytes::copy_from_slice(key);
        }
        let mut full = BytesMut::with_capacity(self.prefix.len() + key.len());
        full.put_slice(&self.prefix);
        full.put_slice(key);
        full.freeze()
    }
}
