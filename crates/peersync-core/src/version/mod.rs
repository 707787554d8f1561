//! Version vectors: per-device counters used to order file observations.
//!
//! A [`Vector`] maps each device that has touched a file to the number of
//! changes that device has made to it. The counters are stored sparsely,
//! sorted by device id, with at most one counter per device. A device that
//! is absent from the vector has an implicit counter value of zero.
//!
//! Mutating operations consume the vector and hand back its new state.
//! When the existing allocation is large enough it is reused, so a value
//! passed to [`Vector::update`] or [`Vector::merge`] is gone afterwards; use
//! [`Vector::copy`] to keep an independent snapshot.

mod compare;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use compare::Ordering;

// ---------------------------------------------------------------------------
// ShortId
// ---------------------------------------------------------------------------

/// Short form of a device identity, used as the key in version vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(pub u64);

impl ShortId {
    /// Derive the short id from a full device identity.
    ///
    /// The first eight bytes are read big-endian. Identities shorter than
    /// eight bytes are zero-padded on the right.
    #[must_use]
    pub fn from_device_id(device_id: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        let n = device_id.len().min(8);
        buf[..n].copy_from_slice(&device_id[..n]);
        Self(u64::from_be_bytes(buf))
    }

    /// The raw 64-bit value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ShortId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Counter / Vector
// ---------------------------------------------------------------------------

/// A single device's counter inside a version vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Counter {
    /// Device short id.
    pub id: u64,
    /// Number of changes observed from that device.
    pub value: u64,
}

impl Counter {
    #[must_use]
    pub const fn new(id: u64, value: u64) -> Self {
        Self { id, value }
    }
}

/// A version vector. The zero value is a usable, empty vector.
///
/// Equality is semantic: two vectors are equal when every device has the
/// same counter in both, so a stored zero counter equals an absent one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "VectorRepr")]
pub struct Vector {
    counters: Vec<Counter>,
}

/// Wire shape of [`Vector`]; decoded counters are normalised on the way in.
#[derive(Deserialize)]
struct VectorRepr {
    counters: Vec<Counter>,
}

impl From<VectorRepr> for Vector {
    fn from(repr: VectorRepr) -> Self {
        Self::from_counters(repr.counters)
    }
}

impl Vector {
    /// An empty vector, as used for a brand-new file observation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counters: Vec::new(),
        }
    }

    /// Build a vector from arbitrary counters.
    ///
    /// The result is sorted by device id; duplicate ids are coalesced by
    /// keeping the highest value. Decoders should construct vectors through
    /// this so the sortedness invariant holds for remote input too.
    #[must_use]
    pub fn from_counters(counters: impl IntoIterator<Item = Counter>) -> Self {
        let mut counters: Vec<Counter> = counters.into_iter().collect();
        counters.sort_unstable_by_key(|c| (c.id, std::cmp::Reverse(c.value)));
        counters.dedup_by_key(|c| c.id);
        Self { counters }
    }

    /// The stored counters, in ascending device-id order.
    #[must_use]
    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    /// Iterate over the stored counters in ascending device-id order.
    pub fn iter(&self) -> std::slice::Iter<'_, Counter> {
        self.counters.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Return the vector with the counter for `id` incremented by one.
    ///
    /// A device seen for the first time is inserted at its sorted position
    /// with value 1. A counter already at `u64::MAX` stays there rather than
    /// wrapping to zero, which would make the new vector compare as older.
    #[must_use]
    pub fn update(mut self, id: ShortId) -> Self {
        self.update_in_place(id);
        self
    }

    /// In-place form of [`Vector::update`] for owners that keep the vector
    /// inside a larger record.
    pub fn update_in_place(&mut self, id: ShortId) {
        let id = id.as_u64();
        match self.counters.binary_search_by_key(&id, |c| c.id) {
            Ok(idx) => {
                let counter = &mut self.counters[idx];
                counter.value = counter.value.saturating_add(1);
            }
            Err(idx) => self.counters.insert(idx, Counter::new(id, 1)),
        }
    }

    /// Return the pointwise maximum of `self` and `other`.
    #[must_use]
    pub fn merge(mut self, other: &Self) -> Self {
        self.merge_in_place(other);
        self
    }

    /// In-place form of [`Vector::merge`].
    pub fn merge_in_place(&mut self, other: &Self) {
        let mut vi = 0;
        let mut oi = 0;
        while oi < other.counters.len() {
            let theirs = other.counters[oi];
            if vi == self.counters.len() {
                // Everything left in `other` sorts after our last counter.
                self.counters.extend_from_slice(&other.counters[oi..]);
                break;
            }

            let ours = self.counters[vi];
            match ours.id.cmp(&theirs.id) {
                std::cmp::Ordering::Less => {
                    vi += 1;
                }
                std::cmp::Ordering::Equal => {
                    self.counters[vi].value = ours.value.max(theirs.value);
                    vi += 1;
                    oi += 1;
                }
                std::cmp::Ordering::Greater => {
                    self.counters.insert(vi, theirs);
                    vi += 1;
                    oi += 1;
                }
            }
        }
    }

    /// An identical vector that shares no storage with `self`.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            counters: self.counters.to_vec(),
        }
    }

    /// Counter value for `id`, or zero if the device is absent.
    #[must_use]
    pub fn counter(&self, id: ShortId) -> u64 {
        let id = id.as_u64();
        self.counters
            .binary_search_by_key(&id, |c| c.id)
            .map_or(0, |idx| self.counters[idx].value)
    }

    /// True when both vectors have the same value for every device.
    #[must_use]
    pub fn equal(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }

    /// True when `self` is equal to or causally before `other`.
    #[must_use]
    pub fn lesser_equal(&self, other: &Self) -> bool {
        matches!(self.compare(other), Ordering::Lesser | Ordering::Equal)
    }

    /// True when `self` is equal to or causally after `other`.
    #[must_use]
    pub fn greater_equal(&self, other: &Self) -> bool {
        matches!(self.compare(other), Ordering::Greater | Ordering::Equal)
    }

    /// True when neither vector causally dominates the other.
    #[must_use]
    pub fn concurrent(&self, other: &Self) -> bool {
        self.compare(other).is_concurrent()
    }
}

impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl Eq for Vector {}

impl FromIterator<Counter> for Vector {
    fn from_iter<I: IntoIterator<Item = Counter>>(iter: I) -> Self {
        Self::from_counters(iter)
    }
}

impl<'a> IntoIterator for &'a Vector {
    type Item = &'a Counter;
    type IntoIter = std::slice::Iter<'a, Counter>;

    fn into_iter(self) -> Self::IntoIter {
        self.counters.iter()
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, c) in self.counters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:X}:{}", c.id, c.value)?;
        }
        f.write_str("}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_of(pairs: &[(u64, u64)]) -> Vector {
        Vector::from_counters(pairs.iter().map(|&(id, value)| Counter::new(id, value)))
    }

    fn is_sorted_unique(v: &Vector) -> bool {
        v.counters().windows(2).all(|w| w[0].id < w[1].id)
    }

    // === update =============================================================

    #[test]
    fn update_empty_inserts_one() {
        let v = Vector::new().update(ShortId(42));
        assert_eq!(v.counters(), &[Counter::new(42, 1)]);
    }

    #[test]
    fn update_existing_increments() {
        let v = vec_of(&[(1, 3), (5, 7)]).update(ShortId(5));
        assert_eq!(v.counter(ShortId(5)), 8);
        assert_eq!(v.counter(ShortId(1)), 3);
    }

    #[test]
    fn update_saturates_at_max() {
        let v = vec_of(&[(3, u64::MAX)]);
        let bumped = v.copy().update(ShortId(3));
        assert_eq!(bumped.counter(ShortId(3)), u64::MAX);
        assert_eq!(bumped.compare(&v), Ordering::Equal);
        assert!(bumped.greater_equal(&v));
    }

    #[test]
    fn update_inserts_in_sorted_position() {
        let v = vec_of(&[(1, 1), (10, 1)]);
        let v = v.update(ShortId(5)).update(ShortId(0)).update(ShortId(20));
        let ids: Vec<u64> = v.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 5, 10, 20]);
        assert!(is_sorted_unique(&v));
    }

    #[test]
    fn repeated_update_counts_exactly() {
        let mut v = Vector::new();
        for expected in 1..=50 {
            v = v.update(ShortId(9));
            assert_eq!(v.counter(ShortId(9)), expected);
        }
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn update_in_place_matches_update() {
        let base = vec_of(&[(2, 4), (8, 1)]);
        let mut in_place = base.copy();
        in_place.update_in_place(ShortId(3));
        let moved = base.update(ShortId(3));
        assert_eq!(in_place.counters(), moved.counters());
    }

    // === merge ==============================================================

    #[test]
    fn merge_takes_pointwise_max() {
        let a = vec_of(&[(1, 5), (3, 1), (7, 2)]);
        let b = vec_of(&[(1, 2), (3, 4), (9, 9)]);
        let m = a.merge(&b);
        assert_eq!(
            m.counters(),
            &[
                Counter::new(1, 5),
                Counter::new(3, 4),
                Counter::new(7, 2),
                Counter::new(9, 9),
            ]
        );
    }

    #[test]
    fn merge_into_empty_copies_other() {
        let b = vec_of(&[(4, 1), (6, 2)]);
        let m = Vector::new().merge(&b);
        assert_eq!(m.counters(), b.counters());
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let a = vec_of(&[(4, 1), (6, 2)]);
        let m = a.copy().merge(&Vector::new());
        assert_eq!(m.counters(), a.counters());
    }

    #[test]
    fn merge_inserts_before_and_between() {
        let a = vec_of(&[(5, 1), (10, 1)]);
        let b = vec_of(&[(1, 1), (7, 3), (12, 1)]);
        let m = a.merge(&b);
        let ids: Vec<u64> = m.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 5, 7, 10, 12]);
        assert_eq!(m.counter(ShortId(7)), 3);
    }

    #[test]
    fn merge_is_idempotent() {
        let a = vec_of(&[(1, 2), (3, 4)]);
        let m = a.copy().merge(&a);
        assert_eq!(m.counters(), a.counters());
    }

    // === copy / counter =====================================================

    #[test]
    fn copy_is_independent() {
        let original = vec_of(&[(1, 1)]);
        let snapshot = original.copy();
        let advanced = original.update(ShortId(1));
        assert_eq!(snapshot.counter(ShortId(1)), 1);
        assert_eq!(advanced.counter(ShortId(1)), 2);
    }

    #[test]
    fn counter_absent_is_zero() {
        let v = vec_of(&[(1, 1)]);
        assert_eq!(v.counter(ShortId(2)), 0);
        assert_eq!(Vector::new().counter(ShortId(0)), 0);
    }

    // === construction =======================================================

    #[test]
    fn from_counters_sorts_and_coalesces() {
        let v = Vector::from_counters([
            Counter::new(9, 1),
            Counter::new(2, 3),
            Counter::new(9, 4),
            Counter::new(2, 1),
        ]);
        assert_eq!(v.counters(), &[Counter::new(2, 3), Counter::new(9, 4)]);
    }

    #[test]
    fn zero_counter_equals_absent() {
        let with_zero = vec_of(&[(1, 0), (2, 3)]);
        let without = vec_of(&[(2, 3)]);
        assert_eq!(with_zero, without);
    }

    #[test]
    fn short_id_from_device_id_reads_big_endian_prefix() {
        let id = ShortId::from_device_id(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0xff]);
        assert_eq!(id, ShortId(0x0102_0304_0506_0708));

        let short = ShortId::from_device_id(&[0xab]);
        assert_eq!(short, ShortId(0xab00_0000_0000_0000));
    }

    #[test]
    fn display_formats() {
        let v = vec_of(&[(0x1a, 2), (0xff, 1)]);
        assert_eq!(v.to_string(), "{1A:2, FF:1}");
        assert_eq!(ShortId(0xabc).to_string(), "0000000000000ABC");
    }

    #[test]
    fn serde_roundtrip() {
        let v = vec_of(&[(1, 2), (3, 4)]);
        let json = serde_json::to_string(&v).unwrap();
        let decoded: Vector = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.counters(), v.counters());
    }

    #[test]
    fn deserialize_normalises_unsorted_input() {
        let json = r#"{"counters":[{"id":7,"value":1},{"id":2,"value":5},{"id":7,"value":3}]}"#;
        let decoded: Vector = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.counters(), &[Counter::new(2, 5), Counter::new(7, 3)]);
    }
}
