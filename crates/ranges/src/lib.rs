#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! Integer ranges and range sets.
//!
//! An [`IntegerRange`] is an inclusive `[lower, upper]` bound in one of
//! two variants (unsigned or signed); a [`RangeSet`] is an ordered,
//! same-variant collection of ranges. Range sets back enumeration
//! mappings, bit-array flags, and variant/option selector ranges; they
//! are plain value objects with no ownership cycles, frozen once
//! attached to the field class that owns them.

use thiserror::Error;

/// Errors raised while building or mutating a range or range set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// `lower` was greater than `upper`.
    #[error("invalid integer range: lower bound {lower} is greater than upper bound {upper}")]
    InvalidBounds {
        /// The lower bound that was supplied.
        lower: i128,
        /// The upper bound that was supplied.
        upper: i128,
    },

    /// A range's signedness does not match the range set it is being
    /// pushed into (or the other range set it is being compared with).
    #[error("signedness mismatch: expected {expected:?}, got {actual:?}")]
    SignednessMismatch {
        /// The signedness the range set was created with.
        expected: Signedness,
        /// The signedness of the value that was rejected.
        actual: Signedness,
    },

    /// A mutating operation was attempted on a frozen range set.
    #[error("range set is frozen and cannot be mutated")]
    Frozen,
}

/// Whether a range or range set holds unsigned (`u64`) or signed
/// (`i64`) bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signedness {
    /// Bounds are `u64`.
    Unsigned,
    /// Bounds are `i64`.
    Signed,
}

/// An inclusive `[lower, upper]` integer range, in one of two
/// same-width variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegerRange {
    /// An unsigned range.
    Unsigned {
        /// Inclusive lower bound.
        lower: u64,
        /// Inclusive upper bound.
        upper: u64,
    },
    /// A signed range.
    Signed {
        /// Inclusive lower bound.
        lower: i64,
        /// Inclusive upper bound.
        upper: i64,
    },
}

impl IntegerRange {
    /// Creates an unsigned range `[lower, upper]`.
    pub fn unsigned(lower: u64, upper: u64) -> Result<Self, Error> {
        if lower > upper {
            return Err(Error::InvalidBounds {
                lower: lower as i128,
                upper: upper as i128,
            });
        }
        Ok(Self::Unsigned { lower, upper })
    }

    /// Creates a signed range `[lower, upper]`.
    pub fn signed(lower: i64, upper: i64) -> Result<Self, Error> {
        if lower > upper {
            return Err(Error::InvalidBounds {
                lower: lower as i128,
                upper: upper as i128,
            });
        }
        Ok(Self::Signed { lower, upper })
    }

    /// A single-value range `[v, v]`.
    pub fn single_unsigned(v: u64) -> Self {
        Self::Unsigned { lower: v, upper: v }
    }

    /// A single-value range `[v, v]`.
    pub fn single_signed(v: i64) -> Self {
        Self::Signed { lower: v, upper: v }
    }

    /// The signedness of this range.
    pub fn signedness(&self) -> Signedness {
        match self {
            IntegerRange::Unsigned { .. } => Signedness::Unsigned,
            IntegerRange::Signed { .. } => Signedness::Signed,
        }
    }

    /// Returns `true` if `value` is a u64 falling within this range.
    ///
    /// Returns `false` (rather than panicking) when called on a signed
    /// range, since a mismatched query is never "in range".
    pub fn contains_unsigned(&self, value: u64) -> bool {
        matches!(self, IntegerRange::Unsigned { lower, upper } if *lower <= value && value <= *upper)
    }

    /// Returns `true` if `value` is an i64 falling within this range.
    pub fn contains_signed(&self, value: i64) -> bool {
        matches!(self, IntegerRange::Signed { lower, upper } if *lower <= value && value <= *upper)
    }

    /// Returns `true` if `self` and `other` overlap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignednessMismatch`] if the two ranges are not
    /// of the same variant.
    pub fn overlaps(&self, other: &IntegerRange) -> Result<bool, Error> {
        match (self, other) {
            (IntegerRange::Unsigned { lower: al, upper: au }, IntegerRange::Unsigned { lower: bl, upper: bu }) => {
                Ok(al.max(bl) <= au.min(bu))
            }
            (IntegerRange::Signed { lower: al, upper: au }, IntegerRange::Signed { lower: bl, upper: bu }) => {
                Ok(al.max(bl) <= au.min(bu))
            }
            _ => Err(Error::SignednessMismatch {
                expected: self.signedness(),
                actual: other.signedness(),
            }),
        }
    }
}

/// An ordered collection of same-variant [`IntegerRange`]s.
///
/// Range sets back enumeration mappings, bit-array flags, and
/// variant/option selectors. They support an overlap predicate and are
/// frozen once attached to the field class that owns them (an
/// enumeration mapping, a variant option, or an option field class).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeSet {
    signedness: Signedness,
    ranges: Vec<IntegerRange>,
    frozen: bool,
}

impl RangeSet {
    /// Creates an empty range set of the given signedness.
    pub fn new(signedness: Signedness) -> Self {
        Self {
            signedness,
            ranges: Vec::new(),
            frozen: false,
        }
    }

    /// Creates a range set from ranges that all share the same
    /// signedness.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignednessMismatch`] if `ranges` is non-empty
    /// and mixes signedness, or contradicts the one inferred from the
    /// first element.
    pub fn from_ranges(ranges: impl IntoIterator<Item = IntegerRange>) -> Result<Self, Error> {
        let mut iter = ranges.into_iter();
        let Some(first) = iter.next() else {
            return Ok(Self::new(Signedness::Unsigned));
        };
        let mut set = Self::new(first.signedness());
        set.push(first)?;
        for r in iter {
            set.push(r)?;
        }
        Ok(set)
    }

    /// The signedness shared by every range in this set.
    pub fn signedness(&self) -> Signedness {
        self.signedness
    }

    /// Whether this range set has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Freezes this range set; subsequent `push` calls fail.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Appends a range to the set, in insertion order.
    ///
    /// Overlapping ranges within the same set are always allowed here;
    /// callers that require disjointness (e.g. a variant's options)
    /// enforce it themselves via [`RangeSet::overlaps_with`] before
    /// calling this.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if the set is frozen, or
    /// [`Error::SignednessMismatch`] if `range`'s variant does not
    /// match this set's.
    pub fn push(&mut self, range: IntegerRange) -> Result<(), Error> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        if range.signedness() != self.signedness {
            return Err(Error::SignednessMismatch {
                expected: self.signedness,
                actual: range.signedness(),
            });
        }
        self.ranges.push(range);
        Ok(())
    }

    /// The ranges in insertion order.
    pub fn ranges(&self) -> &[IntegerRange] {
        &self.ranges
    }

    /// Returns `true` if any range in `self` overlaps any range in
    /// `other`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignednessMismatch`] if `self` and `other`
    /// don't share a signedness.
    pub fn overlaps_with(&self, other: &RangeSet) -> Result<bool, Error> {
        if self.signedness != other.signedness {
            return Err(Error::SignednessMismatch {
                expected: self.signedness,
                actual: other.signedness,
            });
        }
        for a in &self.ranges {
            for b in &other.ranges {
                // Same signedness was checked above; `overlaps` cannot fail here.
                if a.overlaps(b).unwrap_or(false) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Returns `true` if `value` is covered by any range in this set.
    pub fn contains_unsigned(&self, value: u64) -> bool {
        self.ranges.iter().any(|r| r.contains_unsigned(value))
    }

    /// Returns `true` if `value` is covered by any range in this set.
    pub fn contains_signed(&self, value: i64) -> bool {
        self.ranges.iter().any(|r| r.contains_signed(value))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        assert_eq!(
            IntegerRange::unsigned(5, 3),
            Err(Error::InvalidBounds { lower: 5, upper: 3 })
        );
    }

    #[test]
    fn overlap_predicate() {
        let a = IntegerRange::unsigned(0, 10).unwrap();
        let b = IntegerRange::unsigned(10, 20).unwrap();
        let c = IntegerRange::unsigned(11, 20).unwrap();
        assert!(a.overlaps(&b).unwrap());
        assert!(!a.overlaps(&c).unwrap());
    }

    #[test]
    fn cross_signedness_overlap_errors() {
        let a = IntegerRange::unsigned(0, 10).unwrap();
        let b = IntegerRange::signed(0, 10).unwrap();
        assert!(matches!(a.overlaps(&b), Err(Error::SignednessMismatch { .. })));
    }

    #[test]
    fn range_set_overlap_across_sets() {
        let x = RangeSet::from_ranges([IntegerRange::unsigned(1, 3).unwrap()]).unwrap();
        let y = RangeSet::from_ranges([IntegerRange::unsigned(3, 5).unwrap()]).unwrap();
        let z = RangeSet::from_ranges([IntegerRange::unsigned(4, 5).unwrap()]).unwrap();

        assert!(x.overlaps_with(&y).unwrap());
        assert!(!x.overlaps_with(&z).unwrap());
    }

    #[test]
    fn frozen_set_rejects_push() {
        let mut set = RangeSet::new(Signedness::Unsigned);
        set.freeze();
        assert_eq!(set.push(IntegerRange::unsigned(0, 1).unwrap()), Err(Error::Frozen));
    }

    #[test]
    fn mismatched_push_is_rejected() {
        let mut set = RangeSet::new(Signedness::Unsigned);
        let err = set.push(IntegerRange::signed(0, 1).unwrap()).unwrap_err();
        assert_eq!(
            err,
            Error::SignednessMismatch {
                expected: Signedness::Unsigned,
                actual: Signedness::Signed
            }
        );
    }

    #[test]
    fn contains_predicates() {
        let set = RangeSet::from_ranges([
            IntegerRange::unsigned(0, 3).unwrap(),
            IntegerRange::unsigned(10, 20).unwrap(),
        ])
        .unwrap();

        assert!(set.contains_unsigned(2));
        assert!(set.contains_unsigned(15));
        assert!(!set.contains_unsigned(5));
    }
}
