//! Sub-namespaces
//!
//! A key-prefixing view over the one shared tree.
//!
//! ```text
//!   sub("users") with separator 0x00
//!
//!   view key  "alice"  <->  tree key  "users\0alice"
//!   view scan [gte "a"]  ->  tree scan [gte "users\0a", lt "users\x01"]
//! ```
//!
//! Names may not contain the separator, so one namespace's prefix is never
//! the start of another's and their key ranges cannot overlap. The view
//! shares the parent's versions and writer; it only rewrites keys.

use bytes::{BufMut, Bytes, BytesMut};

use crate::batch::Batch;
use crate::engine::Engine;
use crate::error::{BrambleError, Result};
use crate::range::{DiffOptions, KeyRange, RangeOptions};
use crate::snapshot::Snapshot;
use crate::tree::{DiffIter, Entry, RangeIter};

/// Something a namespace can read from
pub trait Source {
    /// Version the next read should observe
    fn snapshot(&self) -> Snapshot;
}

impl Source for Snapshot {
    fn snapshot(&self) -> Snapshot {
        self.clone()
    }
}

impl Source for Engine {
    fn snapshot(&self) -> Snapshot {
        Engine::snapshot(self)
    }
}

/// Namespace view over an engine or a snapshot
pub struct Sub<'a, S> {
    source: &'a S,
    prefix: Bytes,
    separator: Bytes,
}

impl<'a, S: Source> Sub<'a, S> {
    /// Open `name` below `parent_prefix`
    pub(crate) fn new(
        source: &'a S,
        parent_prefix: Bytes,
        name: &[u8],
        separator: Bytes,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(BrambleError::InvalidNamespace(
                "namespace name is empty".to_string(),
            ));
        }
        // The separator may only occur once in `name ++ separator`, at the end.
        // Otherwise one sibling's prefix could begin another's ("x" vs "xa"
        // with separator "aa").
        let mut segment = name.to_vec();
        segment.extend_from_slice(&separator);
        let terminal = name.len();
        if segment
            .windows(separator.len())
            .enumerate()
            .any(|(at, w)| at != terminal && w == &separator[..])
        {
            return Err(BrambleError::InvalidNamespace(format!(
                "namespace name {:?} overlaps the separator",
                String::from_utf8_lossy(name)
            )));
        }
        let snapshot = source.snapshot();
        let comparator = snapshot.store().comparator();
        if !comparator.groups_prefixes() {
            return Err(BrambleError::InvalidNamespace(format!(
                "comparator {} does not keep prefixes together",
                comparator.name()
            )));
        }

        let mut prefix = BytesMut::with_capacity(parent_prefix.len() + name.len() + separator.len());
        prefix.put_slice(&parent_prefix);
        prefix.put_slice(name);
        prefix.put_slice(&separator);

        Ok(Self {
            source,
            prefix: prefix.freeze(),
            separator,
        })
    }

    /// Raw prefix this view adds to every key
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Nested namespace
    pub fn sub(&self, name: impl AsRef<[u8]>) -> Result<Sub<'a, S>> {
        Sub::new(
            self.source,
            self.prefix.clone(),
            name.as_ref(),
            self.separator.clone(),
        )
    }

    /// Version reads currently observe
    pub fn version(&self) -> u64 {
        self.source.snapshot().version()
    }

    /// Point lookup inside the namespace
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Entry>> {
        let entry = self.source.snapshot().get(self.key(key.as_ref()))?;
        Ok(entry.map(|mut entry| {
            entry.key = entry.key.slice(self.prefix.len()..);
            entry
        }))
    }

    /// Ordered scan of the namespace only
    pub fn range(&self, options: RangeOptions) -> Result<RangeIter> {
        let snapshot = self.source.snapshot();
        options.range.validate(snapshot.store().comparator())?;

        let options = RangeOptions {
            range: self.translate(&options.range),
            ..options
        };
        Ok(snapshot.range(options)?.strip_prefix(self.prefix.len()))
    }

    /// Keys of this namespace that differ from version `other`
    pub fn diff(&self, other: u64, options: DiffOptions) -> Result<DiffIter> {
        let snapshot = self.source.snapshot();
        options.range.validate(snapshot.store().comparator())?;

        let options = DiffOptions {
            range: self.translate(&options.range),
            ..options
        };
        Ok(snapshot.diff(other, options)?.strip_prefix(self.prefix.len()))
    }

    /// Prefix a view key
    pub(crate) fn key(&self, key: &[u8]) -> Bytes {
        let mut full = BytesMut::with_capacity(self.prefix.len() + key.len());
        full.put_slice(&self.prefix);
        full.put_slice(key);
        full.freeze()
    }

    /// Map view bounds onto the tree, closing open ends at the prefix edges
    fn translate(&self, range: &KeyRange) -> KeyRange {
        let mut out = KeyRange::default();

        match (&range.gt, &range.gte) {
            (Some(key), _) => out.gt = Some(self.key(key)),
            (None, Some(key)) => out.gte = Some(self.key(key)),
            (None, None) => out.gte = Some(self.prefix.clone()),
        }
        match (&range.lt, &range.lte) {
            (Some(key), _) => out.lt = Some(self.key(key)),
            (None, Some(key)) => out.lte = Some(self.key(key)),
            (None, None) => out.lt = prefix_successor(&self.prefix),
        }
        out
    }
}

impl<'a> Sub<'a, Engine> {
    /// Write a key inside the namespace
    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<u64> {
        self.source.put(self.key(key.as_ref()), value)
    }

    /// Delete a key inside the namespace
    pub fn del(&self, key: impl AsRef<[u8]>) -> Result<u64> {
        self.source.del(self.key(key.as_ref()))
    }

    /// Batch whose keys all land in this namespace
    pub fn batch(&self) -> Batch<'a> {
        Batch::new(self.source, self.prefix.clone())
    }
}

/// Smallest byte string greater than every string starting with `prefix`
fn prefix_successor(prefix: &[u8]) -> Option<Bytes> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(Bytes::from(end));
        }
    }
    None
}
