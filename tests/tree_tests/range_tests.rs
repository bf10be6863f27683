//! Tests for range scans
//!
//! These tests verify:
//! - Limits and direction
//! - Exclusive and inclusive bounds, with and without matching keys
//! - Tombstones are skipped
//! - Contradictory bounds are rejected
//! - Custom key order

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use bramble::{BrambleError, Config, Engine, Encoding, RangeOptions, ReverseLexicographic, Utf8};
use common::{collect_keys, put_letters, setup_memory_engine, setup_small_engine};

// =============================================================================
// Helper Functions
// =============================================================================

fn letters(from: u8, to: u8) -> Vec<String> {
    (from..=to).map(|c| (c as char).to_string()).collect()
}

fn alphabet_engine() -> Engine {
    let engine = setup_small_engine();
    put_letters(&engine, b'a', b'z');
    engine
}

fn scan(engine: &Engine, options: RangeOptions) -> Vec<String> {
    collect_keys(engine.range(options).unwrap())
}

// =============================================================================
// Limit and Direction Tests
// =============================================================================

#[test]
fn test_range_full_scan() {
    let engine = alphabet_engine();
    assert_eq!(scan(&engine, RangeOptions::new()), letters(b'a', b'z'));
}

#[test]
fn test_range_limit() {
    let engine = alphabet_engine();
    assert_eq!(scan(&engine, RangeOptions::new().limit(10)), letters(b'a', b'j'));
}

#[test]
fn test_range_limit_reverse() {
    let engine = alphabet_engine();

    let mut expected = letters(b'q', b'z');
    expected.reverse();
    assert_eq!(scan(&engine, RangeOptions::new().limit(10).reverse()), expected);
}

#[test]
fn test_range_reverse_full_scan() {
    let engine = alphabet_engine();

    let mut expected = letters(b'a', b'z');
    expected.reverse();
    assert_eq!(scan(&engine, RangeOptions::new().reverse()), expected);
}

#[test]
fn test_range_limit_zero() {
    let engine = alphabet_engine();
    assert!(scan(&engine, RangeOptions::new().limit(0)).is_empty());
}

#[test]
fn test_range_on_empty_tree() {
    let engine = setup_memory_engine();
    assert!(scan(&engine, RangeOptions::new()).is_empty());
    assert!(scan(&engine, RangeOptions::new().reverse()).is_empty());
}

// =============================================================================
// Bound Tests
// =============================================================================

#[test]
fn test_range_exclusive_bounds() {
    let engine = alphabet_engine();
    assert_eq!(scan(&engine, RangeOptions::new().gt("a").lt("d")), vec!["b", "c"]);
}

#[test]
fn test_range_inclusive_bounds() {
    let engine = alphabet_engine();
    assert_eq!(
        scan(&engine, RangeOptions::new().gte("a").lte("d")),
        vec!["a", "b", "c", "d"]
    );
}

#[test]
fn test_range_reverse_with_bounds() {
    let engine = alphabet_engine();

    assert_eq!(
        scan(&engine, RangeOptions::new().gte("e").lte("f").reverse()),
        vec!["f", "e"]
    );
    assert_eq!(
        scan(&engine, RangeOptions::new().gt("e").lt("i").reverse()),
        vec!["h", "g", "f"]
    );
}

#[test]
fn test_range_bounds_between_keys() {
    let engine = setup_small_engine();
    for c in (b'a'..=b'z').step_by(2) {
        engine.put([c], [c]).unwrap();
    }

    // Only even letters exist: a c e g ...
    assert_eq!(scan(&engine, RangeOptions::new().gt("b").lt("h")), vec!["c", "e", "g"]);
    assert_eq!(scan(&engine, RangeOptions::new().gte("b").lte("h")), vec!["c", "e", "g"]);
    assert_eq!(
        scan(&engine, RangeOptions::new().gte("b").lte("h").reverse()),
        vec!["g", "e", "c"]
    );
}

#[test]
fn test_range_single_key() {
    let engine = alphabet_engine();
    assert_eq!(scan(&engine, RangeOptions::new().gte("m").lte("m")), vec!["m"]);
}

#[test]
fn test_range_open_ended() {
    let engine = alphabet_engine();

    assert_eq!(scan(&engine, RangeOptions::new().gt("w")), vec!["x", "y", "z"]);
    assert_eq!(scan(&engine, RangeOptions::new().lt("c")), vec!["a", "b"]);
    assert_eq!(scan(&engine, RangeOptions::new().lte("c").reverse()), vec!["c", "b", "a"]);
}

#[test]
fn test_range_bounds_outside_keys() {
    let engine = alphabet_engine();

    assert!(scan(&engine, RangeOptions::new().gt("z")).is_empty());
    assert!(scan(&engine, RangeOptions::new().lt("a")).is_empty());
    assert_eq!(scan(&engine, RangeOptions::new().gte("0").lte("~")).len(), 26);
}

// =============================================================================
// Tombstone Tests
// =============================================================================

#[test]
fn test_range_skips_tombstones() {
    let engine = alphabet_engine();
    engine.del("c").unwrap();
    engine.del("q").unwrap();

    assert_eq!(scan(&engine, RangeOptions::new().gte("a").lte("d")), vec!["a", "b", "d"]);
    assert_eq!(
        scan(&engine, RangeOptions::new().gte("o").lte("s").reverse()),
        vec!["s", "r", "p", "o"]
    );
}

#[test]
fn test_range_limit_counts_live_entries_only() {
    let engine = alphabet_engine();
    engine.del("a").unwrap();
    engine.del("b").unwrap();

    assert_eq!(scan(&engine, RangeOptions::new().limit(3)), vec!["c", "d", "e"]);
}

#[test]
fn test_range_reports_versions() {
    let engine = setup_memory_engine();
    let va = engine.put("a", "1").unwrap();
    let vb = engine.put("b", "2").unwrap();

    let versions: Vec<u64> = engine
        .range(RangeOptions::new())
        .unwrap()
        .map(|entry| entry.unwrap().version)
        .collect();
    assert_eq!(versions, vec![va, vb]);
}

#[test]
fn test_range_abandoned_midway() {
    let engine = alphabet_engine();

    let mut iter = engine.range(RangeOptions::new()).unwrap();
    assert_eq!(&iter.next().unwrap().unwrap().key[..], b"a");
    drop(iter);

    // The engine keeps working after a dropped cursor
    engine.put("zz", "1").unwrap();
    assert_eq!(scan(&engine, RangeOptions::new().gt("z")), vec!["zz"]);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_range_rejects_contradictory_bounds() {
    let engine = alphabet_engine();

    for options in [
        RangeOptions::new().gt("d").lt("a"),
        RangeOptions::new().gte("c").lt("c"),
        RangeOptions::new().gt("c").lte("c"),
        RangeOptions::new().gt("a").gte("b"),
        RangeOptions::new().lt("a").lte("b"),
    ] {
        assert!(matches!(
            engine.range(options),
            Err(BrambleError::InvalidRange(_))
        ));
    }
}

// =============================================================================
// Key Order Tests
// =============================================================================

#[test]
fn test_range_follows_custom_comparator() {
    let config = Config::builder()
        .max_entries(4)
        .comparator(Arc::new(ReverseLexicographic))
        .build();
    let engine = Engine::open_memory(config).unwrap();
    put_letters(&engine, b'a', b'h');

    assert_eq!(
        scan(&engine, RangeOptions::new()),
        vec!["h", "g", "f", "e", "d", "c", "b", "a"]
    );
    // Bounds follow the comparator's order too
    assert_eq!(scan(&engine, RangeOptions::new().gt("f").lt("c")), vec!["e", "d"]);
}

#[test]
fn test_range_decodes_with_encoding() {
    let engine = setup_memory_engine();
    engine.put(Utf8.encode(&"héllo".to_string()), "wörld").unwrap();

    let entry = engine.range(RangeOptions::new()).unwrap().next().unwrap().unwrap();
    assert_eq!(entry.key_as(&Utf8).unwrap(), "héllo");
    assert_eq!(entry.value_as(&Utf8).unwrap(), "wörld");
}
