//! Causal comparison of version vectors.
//!
//! Each vector is treated as a total function from device id to counter
//! value (absent ⇒ 0) and compared pointwise. Incomparable vectors still get
//! a deterministic side so that every replica picks the same winner from the
//! same pair without talking to anyone:
//!
//! 1. The vector with the larger counter sum is `ConcurrentGreater`.
//! 2. On equal sums, the vector holding the larger value at the lowest
//!    device id where the two differ is `ConcurrentGreater`.
//!
//! Both steps flip when the operands are swapped, so `a.compare(b)` is
//! always the exact inverse of `b.compare(a)`.

use serde::{Deserialize, Serialize};

use super::Vector;

/// Result of comparing two version vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ordering {
    /// Same counter for every device.
    Equal,
    /// The left operand causally dominates the right.
    Greater,
    /// The right operand causally dominates the left.
    Lesser,
    /// Incomparable, tie-break favours the left operand.
    ConcurrentGreater,
    /// Incomparable, tie-break favours the right operand.
    ConcurrentLesser,
}

impl Ordering {
    /// The ordering seen from the other operand.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Equal => Self::Equal,
            Self::Greater => Self::Lesser,
            Self::Lesser => Self::Greater,
            Self::ConcurrentGreater => Self::ConcurrentLesser,
            Self::ConcurrentLesser => Self::ConcurrentGreater,
        }
    }

    #[must_use]
    pub const fn is_concurrent(self) -> bool {
        matches!(self, Self::ConcurrentGreater | Self::ConcurrentLesser)
    }
}

impl Vector {
    /// Compare `self` against `other`.
    ///
    /// Runs in time linear in the number of devices present in either
    /// vector.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        let a = self.counters();
        let b = other.counters();

        let mut ai = 0;
        let mut bi = 0;
        let mut left_ahead = false;
        let mut right_ahead = false;
        let mut left_sum: u128 = 0;
        let mut right_sum: u128 = 0;
        // Which side holds the larger value at the lowest differing device.
        let mut first_diff: Option<bool> = None;

        while ai < a.len() || bi < b.len() {
            let (av, bv) = match (a.get(ai), b.get(bi)) {
                (Some(ac), Some(bc)) if ac.id == bc.id => {
                    ai += 1;
                    bi += 1;
                    (ac.value, bc.value)
                }
                (Some(ac), Some(bc)) if ac.id < bc.id => {
                    ai += 1;
                    (ac.value, 0)
                }
                (Some(_), Some(bc)) | (None, Some(bc)) => {
                    bi += 1;
                    (0, bc.value)
                }
                (Some(ac), None) => {
                    ai += 1;
                    (ac.value, 0)
                }
                (None, None) => break,
            };

            left_sum += u128::from(av);
            right_sum += u128::from(bv);

            if av != bv {
                let left_wins = av > bv;
                if left_wins {
                    left_ahead = true;
                } else {
                    right_ahead = true;
                }
                first_diff.get_or_insert(left_wins);
            }
        }

        match (left_ahead, right_ahead) {
            (false, false) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Lesser,
            (true, true) => {
                let left_wins = match left_sum.cmp(&right_sum) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => first_diff.unwrap_or(false),
                };
                if left_wins {
                    Ordering::ConcurrentGreater
                } else {
                    Ordering::ConcurrentLesser
                }
            }
        }
    }
}
