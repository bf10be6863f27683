//! Tests for structural diffs
//!
//! These tests verify:
//! - Pure insertions show up on the newer side only
//! - Deletes, inserts and modifications in one diff
//! - Diffing a version against itself is empty
//! - Sides follow argument order
//! - Bounds, limits and determinism
//! - Shared subtrees and subtrees below the lower bound are never read

#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bramble::{
    BrambleError, Config, DiffEntry, DiffIter, DiffOptions, Engine, Log, MemoryLog,
};
use bytes::Bytes;
use common::{put_letters, setup_memory_engine, setup_small_engine};

// =============================================================================
// Helper Functions
// =============================================================================

fn collect_diff(iter: DiffIter) -> Vec<DiffEntry> {
    iter.map(|record| record.unwrap()).collect()
}

fn diff_keys(records: &[DiffEntry]) -> Vec<String> {
    records
        .iter()
        .map(|record| String::from_utf8(record.key.to_vec()).unwrap())
        .collect()
}

/// Memory log that counts positional reads
struct CountingLog {
    inner: MemoryLog,
    reads: AtomicU64,
}

impl CountingLog {
    fn new() -> Self {
        Self {
            inner: MemoryLog::new(),
            reads: AtomicU64::new(0),
        }
    }

    fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
    }
}

impl Log for CountingLog {
    fn append(&self, entries: &[Vec<u8>]) -> bramble::Result<u64> {
        self.inner.append(entries)
    }

    fn get(&self, position: u64) -> bramble::Result<Bytes> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(position)
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }
}

const WIDE_KEYS: usize = 2_000;

fn wide_key(i: usize) -> String {
    format!("key{:05}", i)
}

fn small_config() -> Config {
    Config::builder().max_entries(4).build()
}

/// A deep tree of `WIDE_KEYS` keys, one put each, over a counting log
fn wide_tree() -> (Arc<CountingLog>, Engine) {
    common::init_tracing();
    let log = Arc::new(CountingLog::new());
    let engine = Engine::open(Arc::clone(&log) as Arc<dyn Log>, small_config()).unwrap();
    for i in 0..WIDE_KEYS {
        engine.put(wide_key(i), "v").unwrap();
    }
    (log, engine)
}

/// Fresh engine over the same log, so no node is cached
fn reopen_cold(log: &Arc<CountingLog>) -> Engine {
    let engine = Engine::open(Arc::clone(log) as Arc<dyn Log>, small_config()).unwrap();
    log.reset();
    engine
}

/// Keys a..l, returning the engine and the version after 'l'
fn twelve_letters() -> (Engine, u64) {
    let engine = setup_small_engine();
    put_letters(&engine, b'a', b'l');
    let version = engine.version();
    (engine, version)
}

// =============================================================================
// Insertion Tests
// =============================================================================

#[test]
fn test_diff_after_pure_insertions() {
    let (engine, _) = twelve_letters();

    // Header at 1, 'a' at 2, ... 'h' at 9
    let records = collect_diff(engine.diff(9, DiffOptions::new()).unwrap());

    assert_eq!(diff_keys(&records), vec!["i", "j", "k", "l"]);
    for record in &records {
        assert!(record.is_left_only());
        assert!(record.right.is_none());
        assert_eq!(record.left.as_ref().unwrap().value, record.key);
    }
}

#[test]
fn test_diff_against_empty_version() {
    let (engine, _) = twelve_letters();

    for empty in [0, 1] {
        let records = collect_diff(engine.diff(empty, DiffOptions::new()).unwrap());
        assert_eq!(records.len(), 12);
        assert!(records.iter().all(DiffEntry::is_left_only));
    }
}

// =============================================================================
// Mixed Change Tests
// =============================================================================

#[test]
fn test_diff_deletes_inserts_and_modifications() {
    let (engine, old) = twelve_letters();

    engine.del("k").unwrap();
    engine.del("l").unwrap();
    engine.put("m", "m").unwrap();
    engine.put("a", "changed").unwrap();

    let records = collect_diff(engine.diff(old, DiffOptions::new()).unwrap());
    assert_eq!(diff_keys(&records), vec!["a", "k", "l", "m"]);

    let a = &records[0];
    assert!(a.is_modified());
    assert_eq!(a.left.as_ref().unwrap().value, Bytes::from("changed"));
    assert_eq!(a.right.as_ref().unwrap().value, Bytes::from("a"));

    assert!(records[1].is_right_only());
    assert!(records[2].is_right_only());
    assert!(records[3].is_left_only());
}

#[test]
fn test_diff_sides_follow_argument_order() {
    let (engine, old) = twelve_letters();
    engine.del("c").unwrap();
    engine.put("z", "z").unwrap();
    let latest = engine.version();

    let forward = collect_diff(engine.diff(old, DiffOptions::new()).unwrap());
    let backward = collect_diff(
        engine
            .checkout(old)
            .unwrap()
            .diff(latest, DiffOptions::new())
            .unwrap(),
    );

    assert_eq!(diff_keys(&forward), vec!["c", "z"]);
    assert_eq!(diff_keys(&backward), vec!["c", "z"]);
    for (f, b) in forward.iter().zip(&backward) {
        assert_eq!(f.left, b.right);
        assert_eq!(f.right, b.left);
    }
}

#[test]
fn test_diff_ignores_value_restored_to_original() {
    let (engine, old) = twelve_letters();

    engine.put("b", "temporary").unwrap();
    engine.put("b", "b").unwrap();
    engine.del("c").unwrap();
    engine.put("c", "c").unwrap();

    // Same value on both sides; only the writing version moved
    assert!(collect_diff(engine.diff(old, DiffOptions::new()).unwrap()).is_empty());
}

#[test]
fn test_diff_ignores_tombstone_against_absent() {
    let engine = setup_memory_engine();
    engine.put("a", "1").unwrap();
    let old = engine.version();

    engine.put("x", "1").unwrap();
    engine.del("x").unwrap();

    assert!(collect_diff(engine.diff(old, DiffOptions::new()).unwrap()).is_empty());
}

// =============================================================================
// Reflexivity and Determinism Tests
// =============================================================================

#[test]
fn test_diff_of_version_with_itself_is_empty() {
    let (engine, _) = twelve_letters();
    engine.del("e").unwrap();

    for version in 0..=engine.version() {
        let snapshot = engine.checkout(version).unwrap();
        assert!(collect_diff(snapshot.diff(version, DiffOptions::new()).unwrap()).is_empty());
    }
}

#[test]
fn test_diff_is_deterministic() {
    let (engine, old) = twelve_letters();
    for i in 0..40 {
        engine.put(format!("n{:02}", i), "v").unwrap();
    }
    engine.del("d").unwrap();

    let first = collect_diff(engine.diff(old, DiffOptions::new()).unwrap());
    let second = collect_diff(engine.diff(old, DiffOptions::new()).unwrap());

    assert_eq!(first.len(), 41);
    assert_eq!(first, second);
}

#[test]
fn test_diff_keys_are_ascending() {
    let engine = setup_small_engine();
    for i in (0..60).rev() {
        engine.put(format!("k{:02}", i), "v1").unwrap();
    }
    let old = engine.version();
    for i in (0..60).step_by(7) {
        engine.put(format!("k{:02}", i), "v2").unwrap();
    }

    let keys = diff_keys(&collect_diff(engine.diff(old, DiffOptions::new()).unwrap()));
    let expected: Vec<String> = (0..60).step_by(7).map(|i| format!("k{:02}", i)).collect();
    assert_eq!(keys, expected);
}

// =============================================================================
// Bounds and Limit Tests
// =============================================================================

#[test]
fn test_diff_with_bounds() {
    let (engine, _) = twelve_letters();

    let records = collect_diff(engine.diff(1, DiffOptions::new().gt("c").lte("f")).unwrap());
    assert_eq!(diff_keys(&records), vec!["d", "e", "f"]);
}

#[test]
fn test_diff_with_limit() {
    let (engine, _) = twelve_letters();

    let records = collect_diff(engine.diff(1, DiffOptions::new().limit(5)).unwrap());
    assert_eq!(diff_keys(&records), vec!["a", "b", "c", "d", "e"]);

    assert!(collect_diff(engine.diff(1, DiffOptions::new().limit(0)).unwrap()).is_empty());
}

#[test]
fn test_diff_reports_versions() {
    let (engine, old) = twelve_letters();
    engine.put("a", "new").unwrap();

    let iter = engine.diff(old, DiffOptions::new()).unwrap();
    assert_eq!(iter.left_version(), engine.version());
    assert_eq!(iter.right_version(), old);

    let records = collect_diff(iter);
    assert_eq!(records[0].left.as_ref().unwrap().version, engine.version());
    assert_eq!(records[0].right.as_ref().unwrap().version, 2);
}

// =============================================================================
// Structural Sharing Tests
// =============================================================================

#[test]
fn test_diff_skips_shared_subtrees() {
    let (log, engine) = wide_tree();
    let old = engine.version();
    engine.put(wide_key(1_234), "changed").unwrap();
    drop(engine);

    let engine = reopen_cold(&log);
    let records = collect_diff(engine.diff(old, DiffOptions::new()).unwrap());

    assert_eq!(diff_keys(&records), vec![wide_key(1_234)]);
    assert_eq!(records[0].left.as_ref().unwrap().value, Bytes::from("changed"));
    assert_eq!(records[0].right.as_ref().unwrap().value, Bytes::from("v"));

    // One root-to-leaf path per side; a full walk would read every block
    let reads = log.reads();
    assert!(reads <= 24, "diff read {} blocks", reads);
}

#[test]
fn test_diff_lower_bound_skips_earlier_subtrees() {
    let (log, engine) = wide_tree();
    drop(engine);

    let engine = reopen_cold(&log);
    let records = collect_diff(
        engine
            .diff(1, DiffOptions::new().gte(wide_key(WIDE_KEYS - 5)))
            .unwrap(),
    );

    let expected: Vec<String> = (WIDE_KEYS - 5..WIDE_KEYS).map(wide_key).collect();
    assert_eq!(diff_keys(&records), expected);
    assert!(records.iter().all(|record| record.is_left_only()));

    let reads = log.reads();
    assert!(reads <= 24, "diff read {} blocks", reads);
}

#[test]
fn test_diff_lower_bounds_match_filtered_full_diff() {
    let (_log, engine) = wide_tree();
    let old = engine.version();
    for i in (0..WIDE_KEYS).step_by(97) {
        engine.put(wide_key(i), "changed").unwrap();
    }
    engine.del(wide_key(500)).unwrap();
    engine.put("key00500x", "new").unwrap();

    let full = diff_keys(&collect_diff(engine.diff(old, DiffOptions::new()).unwrap()));

    for bound in ["key00000", "key00485", "key00500", "key00500x", "key01000z", "key99999"] {
        let gte = diff_keys(&collect_diff(
            engine.diff(old, DiffOptions::new().gte(bound)).unwrap(),
        ));
        let expected: Vec<String> = full.iter().filter(|k| k.as_str() >= bound).cloned().collect();
        assert_eq!(gte, expected, "gte {}", bound);

        let gt = diff_keys(&collect_diff(
            engine.diff(old, DiffOptions::new().gt(bound)).unwrap(),
        ));
        let expected: Vec<String> = full.iter().filter(|k| k.as_str() > bound).cloned().collect();
        assert_eq!(gt, expected, "gt {}", bound);
    }
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_diff_rejects_invalid_version() {
    let (engine, _) = twelve_letters();
    let length = engine.log().len();

    assert!(matches!(
        engine.diff(length + 1, DiffOptions::new()),
        Err(BrambleError::InvalidVersion { .. })
    ));
}

#[test]
fn test_diff_rejects_contradictory_bounds() {
    let (engine, old) = twelve_letters();

    assert!(matches!(
        engine.diff(old, DiffOptions::new().gte("x").lt("b")),
        Err(BrambleError::InvalidRange(_))
    ));
}
