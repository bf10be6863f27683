//! Range options
//!
//! LevelDB-style bounds shared by range scans and diffs.
//!
//! - `gt` / `lt` are exclusive, `gte` / `lte` inclusive
//! - at most one lower and one upper bound
//! - an empty key range is rejected rather than silently returning nothing

use std::cmp::Ordering;

use bytes::Bytes;

use crate::comparator::KeyComparator;
use crate::error::{BrambleError, Result};

/// A single bound: key plus inclusiveness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub key: Bytes,
    pub inclusive: bool,
}

/// Key bounds of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    pub gt: Option<Bytes>,
    pub gte: Option<Bytes>,
    pub lt: Option<Bytes>,
    pub lte: Option<Bytes>,
}

impl KeyRange {
    /// Lower bound, if any
    pub fn lower(&self) -> Option<Bound> {
        match (&self.gt, &self.gte) {
            (Some(key), _) => Some(Bound {
                key: key.clone(),
                inclusive: false,
            }),
            (None, Some(key)) => Some(Bound {
                key: key.clone(),
                inclusive: true,
            }),
            (None, None) => None,
        }
    }

    /// Upper bound, if any
    pub fn upper(&self) -> Option<Bound> {
        match (&self.lt, &self.lte) {
            (Some(key), _) => Some(Bound {
                key: key.clone(),
                inclusive: false,
            }),
            (None, Some(key)) => Some(Bound {
                key: key.clone(),
                inclusive: true,
            }),
            (None, None) => None,
        }
    }

    /// Reject contradictory bounds
    pub fn validate(&self, comparator: &dyn KeyComparator) -> Result<()> {
        if self.gt.is_some() && self.gte.is_some() {
            return Err(BrambleError::InvalidRange(
                "both gt and gte given".to_string(),
            ));
        }
        if self.lt.is_some() && self.lte.is_some() {
            return Err(BrambleError::InvalidRange(
                "both lt and lte given".to_string(),
            ));
        }

        if let (Some(lower), Some(upper)) = (self.lower(), self.upper()) {
            let empty = match comparator.compare(&lower.key, &upper.key) {
                Ordering::Greater => true,
                Ordering::Equal => !(lower.inclusive && upper.inclusive),
                Ordering::Less => false,
            };
            if empty {
                return Err(BrambleError::InvalidRange(format!(
                    "lower bound {:?} is not below upper bound {:?}",
                    lower.key, upper.key
                )));
            }
        }
        Ok(())
    }

    /// Whether `key` satisfies the lower bound
    pub fn above_lower(&self, comparator: &dyn KeyComparator, key: &[u8]) -> bool {
        match self.lower() {
            None => true,
            Some(bound) => match comparator.compare(key, &bound.key) {
                Ordering::Greater => true,
                Ordering::Equal => bound.inclusive,
                Ordering::Less => false,
            },
        }
    }

    /// Whether `key` satisfies the upper bound
    pub fn below_upper(&self, comparator: &dyn KeyComparator, key: &[u8]) -> bool {
        match self.upper() {
            None => true,
            Some(bound) => match comparator.compare(key, &bound.key) {
                Ordering::Less => true,
                Ordering::Equal => bound.inclusive,
                Ordering::Greater => false,
            },
        }
    }
}

/// Options for a range scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeOptions {
    pub range: KeyRange,
    pub limit: Option<usize>,
    pub reverse: bool,
}

impl RangeOptions {
    /// Unbounded ascending scan
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gt(mut self, key: impl AsRef<[u8]>) -> Self {
        self.range.gt = Some(Bytes::copy_from_slice(key.as_ref()));
        self
    }

    pub fn gte(mut self, key: impl AsRef<[u8]>) -> Self {
        self.range.gte = Some(Bytes::copy_from_slice(key.as_ref()));
        self
    }

    pub fn lt(mut self, key: impl AsRef<[u8]>) -> Self {
        self.range.lt = Some(Bytes::copy_from_slice(key.as_ref()));
        self
    }

    pub fn lte(mut self, key: impl AsRef<[u8]>) -> Self {
        self.range.lte = Some(Bytes::copy_from_slice(key.as_ref()));
        self
    }

    /// Stop after `limit` entries
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Scan in descending key order
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }
}

/// Options for a diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOptions {
    pub range: KeyRange,
    pub limit: Option<usize>,
}

impl DiffOptions {
    /// Diff over the whole key space
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gt(mut self, key: impl AsRef<[u8]>) -> Self {
        self.range.gt = Some(Bytes::copy_from_slice(key.as_ref()));
        self
    }

    pub fn gte(mut self, key: impl AsRef<[u8]>) -> Self {
        self.range.gte = Some(Bytes::copy_from_slice(key.as_ref()));
        self
    }

    pub fn lt(mut self, key: impl AsRef<[u8]>) -> Self {
        self.range.lt = Some(Bytes::copy_from_slice(key.as_ref()));
        self
    }

    pub fn lte(mut self, key: impl AsRef<[u8]>) -> Self {
        self.range.lte = Some(Bytes::copy_from_slice(key.as_ref()));
        self
    }

    /// Stop after `limit` records
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
