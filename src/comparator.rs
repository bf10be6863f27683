//! Key comparators
//!
//! The tree only ever orders raw bytes. The order is a strategy object
//! supplied once through [`Config`](crate::Config) and recorded by name in
//! the log header, so every reader of a log agrees on it.

use std::cmp::Ordering;
use std::fmt;

/// Total order over raw keys
pub trait KeyComparator: Send + Sync + fmt::Debug {
    /// Compare two keys
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Stable identity stored in the log header
    fn name(&self) -> &str;

    /// Whether every key sharing a byte prefix `p` sorts within
    /// `[p, successor(p))`. Sub-namespaces require it.
    fn groups_prefixes(&self) -> bool {
        false
    }
}

/// Plain byte-wise ordering (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct Lexicographic;

impl KeyComparator for Lexicographic {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &str {
        "lexicographic"
    }

    fn groups_prefixes(&self) -> bool {
        true
    }
}

/// Byte-wise ordering, reversed
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseLexicographic;

impl KeyComparator for ReverseLexicographic {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        b.cmp(a)
    }

    fn name(&self) -> &str {
        "reverse-lexicographic"
    }
}
