//! Metadata-level conflict resolution between two records for one path.

use std::cmp::Ordering as CmpOrdering;

use tracing::trace;

use super::FileMeta;
use crate::version::Ordering;

/// Which side of a conflict survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winner {
    Left,
    Right,
}

pub(super) fn wins(this: &impl FileMeta, other: &impl FileMeta) -> bool {
    // Edits beat deletions.
    match (this.is_deleted(), other.is_deleted()) {
        (false, true) => return true,
        (true, false) => return false,
        _ => {}
    }

    match this.modified().cmp(&other.modified()) {
        CmpOrdering::Greater => return true,
        CmpOrdering::Less => return false,
        CmpOrdering::Equal => {}
    }

    // Only reached for genuine conflicts: dominated versions are resolved by
    // causal order before anyone asks.
    this.version().compare(other.version()) == Ordering::ConcurrentGreater
}

/// Pick the surviving record of a conflict between `left` and `right`.
///
/// `Left` when `left.wins_conflict(right)`, `Right` otherwise; callers get a
/// definite answer even for pairs the policy considers tied.
pub fn resolve_conflict(left: &impl FileMeta, right: &impl FileMeta) -> Winner {
    let winner = if wins(left, right) {
        Winner::Left
    } else {
        Winner::Right
    };
    trace!(
        name = left.name(),
        left_modified = left.modified(),
        right_modified = right.modified(),
        left_deleted = left.is_deleted(),
        right_deleted = right.is_deleted(),
        ?winner,
        "resolved conflict"
    );
    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FLAG_DELETED, FileInfo};
    use crate::version::{Counter, ShortId, Vector};

    fn record(flags: u32, modified: i64, version: Vector) -> FileInfo {
        FileInfo {
            name: "a.txt".to_string(),
            flags,
            modified,
            version,
            length: 10,
            blocks: Vec::new(),
        }
    }

    fn v(pairs: &[(u64, u64)]) -> Vector {
        Vector::from_counters(pairs.iter().map(|&(id, value)| Counter::new(id, value)))
    }

    #[test]
    fn edit_beats_delete() {
        let live = record(0, 100, v(&[(1, 1)]));
        let gone = record(FLAG_DELETED, 100, v(&[(2, 1)]));
        assert!(live.wins_conflict(&gone));
        assert!(!gone.wins_conflict(&live));
    }

    #[test]
    fn edit_beats_newer_delete() {
        let live = record(0, 100, v(&[(1, 1)]));
        let gone = record(FLAG_DELETED, 900, v(&[(2, 1)]));
        assert!(live.wins_conflict(&gone));
        assert_eq!(resolve_conflict(&gone, &live), Winner::Right);
    }

    #[test]
    fn later_modification_wins_regardless_of_version() {
        let a = record(0, 100, v(&[(1, 50), (2, 50)]));
        let b = record(0, 200, v(&[(3, 1)]));
        assert!(b.wins_conflict(&a));
        assert!(!a.wins_conflict(&b));
    }

    #[test]
    fn both_deleted_uses_time() {
        let a = record(FLAG_DELETED, 300, v(&[(1, 1)]));
        let b = record(FLAG_DELETED, 200, v(&[(2, 1)]));
        assert!(a.wins_conflict(&b));
        assert!(!b.wins_conflict(&a));
    }

    #[test]
    fn equal_times_use_version_tie_break() {
        let a = record(0, 100, v(&[(1, 2)]));
        let b = record(0, 100, v(&[(2, 1)]));
        assert_eq!(a.version.compare(&b.version), Ordering::ConcurrentGreater);
        assert!(a.wins_conflict(&b));
        assert!(!b.wins_conflict(&a));
        assert_eq!(resolve_conflict(&a, &b), Winner::Left);
        assert_eq!(resolve_conflict(&b, &a), Winner::Right);
    }

    #[test]
    fn dominating_version_is_not_a_tie_break_win() {
        let base = v(&[(1, 1)]);
        let a = record(0, 100, base.copy().update(ShortId(1)));
        let b = record(0, 100, base);
        assert!(!a.wins_conflict(&b));
        assert!(!b.wins_conflict(&a));
    }

    #[test]
    fn full_and_truncated_records_compare() {
        let a = record(0, 100, v(&[(1, 2)]));
        let b = record(0, 100, v(&[(2, 1)])).truncate();
        assert!(a.wins_conflict(&b));
        assert!(!b.wins_conflict(&a));
    }
}
