//! The clock-correlation validator: checks that two messages (or a
//! message iterator's successive outputs) carry default clock
//! snapshots whose clock classes can actually be compared.
//!
//! A muxer, or any other component combining clock snapshots from
//! different sources, must reject clock classes that cannot be
//! correlated rather than silently compare incomparable timestamps.
//! Every clock class falls into exactly one of three categories:
//!
//! - *known*: origin is the Unix epoch, or a custom, self-identifying
//!   `(namespace, name, uid)` reference point — two known clocks
//!   correlate iff their origins are equal;
//! - *unknown with an id*: origin is unknown, but the clock carries a
//!   [`ClockIdentity`] — two such clocks correlate iff their
//!   identities are equal;
//! - *unknown without an id*: origin is unknown and no identity is
//!   set — such a clock only ever correlates with itself (checked by
//!   reference equality, not by value).

use flowtrace_clock::{ClockClass, ClockIdentity, ClockOrigin};
use thiserror::Error;

/// Errors raised when two clock classes cannot be correlated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Expecting a known-origin clock class, got none at all.
    #[error("expecting a known-origin clock class, got none")]
    ExpectingKnownGotNone,

    /// Expecting a known-origin clock class, got one with an unknown
    /// origin.
    #[error("expecting a known-origin clock class, got one with an unknown origin")]
    ExpectingKnownGotUnknown,

    /// Both clock classes have a known origin, but the origins differ.
    #[error("expecting a known-origin clock class, got one with a different origin")]
    ExpectingKnownGotOtherOrigin,

    /// Expecting an unknown-origin clock class with an identity, got
    /// none at all.
    #[error("expecting an unknown-origin clock class with an identity, got none")]
    ExpectingUnknownWithIdGotNone,

    /// Expecting an unknown-origin clock class with an identity, got a
    /// known-origin one.
    #[error("expecting an unknown-origin clock class with an identity, got a known-origin one")]
    ExpectingUnknownWithIdGotKnown,

    /// Expecting an unknown-origin clock class with an identity, got
    /// one with no identity.
    #[error("expecting an unknown-origin clock class with an identity, got one without an identity")]
    ExpectingUnknownWithIdGotWithoutId,

    /// Both clock classes have an unknown origin and an identity, but
    /// the identities differ.
    #[error("expecting an unknown-origin clock class with an identity, got one with a different identity")]
    ExpectingUnknownWithIdGotOtherId,

    /// Expecting an unknown-origin clock class with no identity, got
    /// none at all.
    #[error("expecting an unknown-origin clock class with no identity, got none")]
    ExpectingUnknownWithoutIdGotNone,

    /// Expecting an unknown-origin clock class with no identity, got a
    /// different clock class (this category only ever correlates with
    /// itself).
    #[error("expecting an unknown-origin clock class with no identity, got a different clock class")]
    ExpectingUnknownWithoutIdGotOther,
}

enum OriginClass {
    Known(ClockOrigin),
    UnknownWithId(ClockIdentity),
    UnknownWithoutId,
}

fn classify(clock: &ClockClass) -> OriginClass {
    match clock.origin() {
        ClockOrigin::Unknown => match clock.identity() {
            Some(identity) => OriginClass::UnknownWithId(identity),
            None => OriginClass::UnknownWithoutId,
        },
        known => OriginClass::Known(known),
    }
}

fn expecting_none(expected: &ClockClass) -> Error {
    match classify(expected) {
        OriginClass::Known(_) => Error::ExpectingKnownGotNone,
        OriginClass::UnknownWithId(_) => Error::ExpectingUnknownWithIdGotNone,
        OriginClass::UnknownWithoutId => Error::ExpectingUnknownWithoutIdGotNone,
    }
}

/// The outcome of comparing two optional clock classes for
/// correlatability.
pub fn check_correlatable(a: Option<&ClockClass>, b: Option<&ClockClass>) -> Result<(), Error> {
    match (a, b) {
        (None, None) => Ok(()),
        (Some(a), Some(b)) => check_origins(a, b),
        (Some(expected), None) | (None, Some(expected)) => Err(expecting_none(expected)),
    }
}

fn check_origins(a: &ClockClass, b: &ClockClass) -> Result<(), Error> {
    use OriginClass as C;
    match (classify(a), classify(b)) {
        (C::Known(oa), C::Known(ob)) => {
            if oa == ob {
                Ok(())
            } else {
                Err(Error::ExpectingKnownGotOtherOrigin)
            }
        }
        (C::Known(_), C::UnknownWithId(_) | C::UnknownWithoutId) => Err(Error::ExpectingKnownGotUnknown),

        (C::UnknownWithId(_), C::Known(_)) => Err(Error::ExpectingUnknownWithIdGotKnown),
        (C::UnknownWithId(ida), C::UnknownWithId(idb)) => {
            if ida == idb {
                Ok(())
            } else {
                Err(Error::ExpectingUnknownWithIdGotOtherId)
            }
        }
        (C::UnknownWithId(_), C::UnknownWithoutId) => Err(Error::ExpectingUnknownWithIdGotWithoutId),

        (C::UnknownWithoutId, _) => {
            if a.is_same_instance(b) {
                Ok(())
            } else {
                Err(Error::ExpectingUnknownWithoutIdGotOther)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn both_absent_is_correlatable() {
        assert!(check_correlatable(None, None).is_ok());
    }

    #[test]
    fn one_absent_one_present_is_rejected() {
        let clock = ClockClass::new(1000).unwrap();
        clock.set_origin(ClockOrigin::UnixEpoch).unwrap();
        assert_eq!(check_correlatable(None, Some(&clock)), Err(Error::ExpectingKnownGotNone));
        assert_eq!(check_correlatable(Some(&clock), None), Err(Error::ExpectingKnownGotNone));
    }

    #[test]
    fn both_unix_epoch_is_correlatable() {
        let a = ClockClass::new(1000).unwrap();
        a.set_origin(ClockOrigin::UnixEpoch).unwrap();
        let b = ClockClass::new(2000).unwrap();
        b.set_origin(ClockOrigin::UnixEpoch).unwrap();
        assert!(check_correlatable(Some(&a), Some(&b)).is_ok());
    }

    #[test]
    fn unix_epoch_vs_unknown_is_rejected() {
        let a = ClockClass::new(1000).unwrap();
        a.set_origin(ClockOrigin::UnixEpoch).unwrap();
        let b = ClockClass::new(1000).unwrap();
        assert_eq!(check_correlatable(Some(&a), Some(&b)), Err(Error::ExpectingKnownGotUnknown));
    }

    #[test]
    fn custom_origins_with_different_uid_are_rejected() {
        let a = ClockClass::new(1000).unwrap();
        a.set_origin(ClockOrigin::Custom { namespace: None, name: "clk".into(), uid: "1".into() }).unwrap();
        let b = ClockClass::new(1000).unwrap();
        b.set_origin(ClockOrigin::Custom { namespace: None, name: "clk".into(), uid: "2".into() }).unwrap();
        assert_eq!(check_correlatable(Some(&a), Some(&b)), Err(Error::ExpectingKnownGotOtherOrigin));
    }

    #[test]
    fn differing_identity_on_unknown_origin_is_rejected() {
        let a = ClockClass::new(1000).unwrap();
        a.set_identity(Some(ClockIdentity::Uuid([1; 16]))).unwrap();
        let b = ClockClass::new(1000).unwrap();
        b.set_identity(Some(ClockIdentity::Uuid([2; 16]))).unwrap();
        assert_eq!(check_correlatable(Some(&a), Some(&b)), Err(Error::ExpectingUnknownWithIdGotOtherId));
    }

    #[test]
    fn matching_namespace_name_uid_identity_is_correlatable() {
        let identity = ClockIdentity::NamespaceNameUid {
            namespace: "ns".into(),
            name: "clk".into(),
            uid: "1".into(),
        };
        let a = ClockClass::new(1000).unwrap();
        a.set_identity(Some(identity.clone())).unwrap();
        let b = ClockClass::new(1000).unwrap();
        b.set_identity(Some(identity)).unwrap();
        assert!(check_correlatable(Some(&a), Some(&b)).is_ok());
    }

    #[test]
    fn two_unknown_without_id_clocks_must_be_the_same_instance() {
        let a = ClockClass::new(1000).unwrap();
        let b = ClockClass::new(1000).unwrap();
        assert_eq!(check_correlatable(Some(&a), Some(&b)), Err(Error::ExpectingUnknownWithoutIdGotOther));
        assert!(check_correlatable(Some(&a), Some(&a)).is_ok());
    }
}
