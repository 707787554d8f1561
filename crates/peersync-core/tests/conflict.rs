use peersync_core::file::{FLAG_DELETED, FileInfo, FileMeta, Winner, resolve_conflict};
use peersync_core::{Counter, Ordering, ShortId, Vector};
use proptest::prelude::*;

use generators::*;

fn v(pairs: &[(u64, u64)]) -> Vector {
    Vector::from_counters(pairs.iter().map(|&(id, value)| Counter::new(id, value)))
}

fn record(deleted: bool, modified: i64, version: Vector) -> FileInfo {
    FileInfo {
        name: "photos/cat.jpg".to_string(),
        flags: if deleted { FLAG_DELETED } else { 0o600 },
        modified,
        version,
        length: 2048,
        blocks: Vec::new(),
    }
}

#[test]
fn live_record_beats_deleted_with_equal_times() {
    let a = record(false, 100, v(&[(1, 1)]));
    let b = record(true, 100, v(&[(2, 4)]));
    assert!(a.wins_conflict(&b));
    assert!(!b.wins_conflict(&a));
}

#[test]
fn later_modification_wins_regardless_of_vectors() {
    let a = record(false, 100, v(&[(1, 9), (2, 9)]));
    let b = record(false, 200, v(&[(3, 1)]));
    assert!(b.wins_conflict(&a));
    assert!(!a.wins_conflict(&b));
    assert_eq!(resolve_conflict(&a, &b), Winner::Right);
}

#[test]
fn equal_times_concurrent_greater_wins_and_swaps() {
    let a = record(false, 100, v(&[(1, 3), (2, 1)]));
    let b = record(false, 100, v(&[(1, 1), (3, 1)]));
    assert_eq!(a.version.compare(&b.version), Ordering::ConcurrentGreater);
    assert!(a.wins_conflict(&b));
    assert!(!b.wins_conflict(&a));
    assert_eq!(resolve_conflict(&a, &b), Winner::Left);
    assert_eq!(resolve_conflict(&b, &a), Winner::Right);
}

#[test]
fn replicas_agree_after_independent_edits() {
    // Two devices edit the same synced file at the same second.
    let base = Vector::new().update(ShortId(10));
    let on_first = record(false, 500, base.copy().update(ShortId(10)));
    let on_second = record(false, 500, base.update(ShortId(20)));
    assert!(on_first.version.concurrent(&on_second.version));

    // Each device evaluates the policy with itself on the left.
    let first_keeps_own = on_first.wins_conflict(&on_second);
    let second_keeps_own = on_second.wins_conflict(&on_first);
    assert_ne!(first_keeps_own, second_keeps_own);
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(2000))]

    #[test]
    fn exactly_one_winner_for_concurrent_equal_times(
        a in arb_file_info(),
        b in arb_file_info(),
    ) {
        let mut b = b;
        b.modified = a.modified;
        b.flags = a.flags;
        if !a.version.concurrent(&b.version) {
            return Ok(());
        }
        prop_assert_ne!(a.wins_conflict(&b), b.wins_conflict(&a));
    }

    #[test]
    fn never_both_win(a in arb_file_info(), b in arb_file_info()) {
        prop_assert!(!(a.wins_conflict(&b) && b.wins_conflict(&a)));
    }

    #[test]
    fn decision_is_total_when_concurrent(a in arb_file_info(), b in arb_file_info()) {
        if !a.version.concurrent(&b.version) {
            return Ok(());
        }
        prop_assert!(a.wins_conflict(&b) || b.wins_conflict(&a));
    }

    #[test]
    fn truncated_shape_decides_identically(a in arb_file_info(), b in arb_file_info()) {
        prop_assert_eq!(a.wins_conflict(&b), a.truncate().wins_conflict(&b.truncate()));
        prop_assert_eq!(a.wins_conflict(&b), a.wins_conflict(&b.truncate()));
    }
}
