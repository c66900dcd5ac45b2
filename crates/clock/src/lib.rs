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

//! Clock classes: the shape of a single monotonic cycle counter, and
//! the conversion from a cycle value to nanoseconds from its origin.
//!
//! A [`ClockClass`] is shared, not owned: many stream classes across a
//! single trace may reference the very same clock, and the
//! clock-correlation rules in the message-iterator layer need to tell
//! whether two clock classes are the *same* clock or merely two clocks
//! that happen to agree on origin. [`ClockClass`] is therefore an
//! `Rc<RefCell<..>>` handle — cheap to clone, not thread-safe (this
//! whole crate assumes a single-threaded graph, so an atomic refcount
//! buys nothing) — and [`ClockClass::is_same_instance`] answers the
//! "same clock" question with `Rc::ptr_eq`.

use std::cell::RefCell;
use std::rc::Rc;

use flowtrace_attrs::UserAttributes;
use thiserror::Error;

/// Errors raised while building, mutating, or evaluating a clock
/// class.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A clock class was constructed with a zero frequency, which
    /// would make cycle-to-nanosecond conversion a division by zero.
    #[error("clock class frequency must be non-zero")]
    ZeroFrequency,

    /// A mutating operation was attempted on a frozen clock class.
    #[error("clock class is frozen and cannot be mutated")]
    Frozen,

    /// Converting a cycle value to nanoseconds from the origin
    /// overflowed an `i64`.
    #[error("cycle value {cycles} overflows nanoseconds-from-origin at frequency {frequency} Hz")]
    Overflow {
        /// The cycle value that could not be converted.
        cycles: u64,
        /// The clock's frequency in Hz.
        frequency: u64,
    },
}

/// Where a clock's cycle counter is counted from.
///
/// Origin and identity are independent axes: a clock with an
/// [`ClockOrigin::Unknown`] origin can still carry a [`ClockIdentity`]
/// (see [`ClockClass::identity`]), and that identity is what two such
/// clocks are compared on when their origin alone gives no reference
/// point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClockOrigin {
    /// The origin is not known to correlate with anything on its own:
    /// two clocks with an unknown origin are correlatable only if they
    /// carry the same identity (or are the very same clock class).
    Unknown,
    /// The origin is the Unix epoch (1970-01-01T00:00:00Z): any two
    /// clocks with this origin are implicitly correlatable.
    UnixEpoch,
    /// The origin is a custom, self-identifying reference point (MIP
    /// >= 1 only): two clocks are correlatable iff their
    /// `(namespace, name, uid)` triples are equal.
    Custom {
        /// The reference point's namespace, if any.
        namespace: Option<String>,
        /// The reference point's name within its namespace.
        name: String,
        /// A value distinguishing this reference point from others
        /// sharing the same namespace and name.
        uid: String,
    },
}

/// A clock class's identity, carried independently of its
/// [`ClockOrigin`]: present or absent regardless of origin, but in
/// practice set on clocks whose origin is [`ClockOrigin::Unknown`] to
/// give them a reference point origin alone cannot supply.
///
/// MIP 0 traces identify a clock by a UUID; MIP >= 1 traces use a
/// `(namespace, name, uid)` triple instead. The two forms are never
/// compared against each other — mixing them is a clock-correlation
/// error, not an identity mismatch, and is reported that way by the
/// consumer of this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClockIdentity {
    /// A MIP 0 UUID.
    Uuid([u8; 16]),
    /// A MIP >= 1 namespace/name/uid triple.
    NamespaceNameUid {
        /// The identity's namespace.
        namespace: String,
        /// The identity's name within its namespace.
        name: String,
        /// A value distinguishing this identity from others sharing
        /// the same namespace and name (e.g. a restart counter).
        uid: String,
    },
}

#[derive(Debug)]
struct ClockClassData {
    frequency: u64,
    offset_seconds: i64,
    offset_cycles: u64,
    precision: Option<u64>,
    accuracy: Option<u64>,
    origin: ClockOrigin,
    identity: Option<ClockIdentity>,
    name: Option<String>,
    description: Option<String>,
    user_attributes: UserAttributes,
    frozen: bool,
}

/// A shared handle to a single clock's shape: its frequency, the
/// offset of cycle zero from its origin, and the origin itself.
#[derive(Clone, Debug)]
pub struct ClockClass(Rc<RefCell<ClockClassData>>);

impl ClockClass {
    /// Creates a clock class ticking at `frequency` Hz, with a zero
    /// offset and an unknown origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroFrequency`] if `frequency` is `0`.
    pub fn new(frequency: u64) -> Result<Self, Error> {
        if frequency == 0 {
            return Err(Error::ZeroFrequency);
        }
        Ok(Self(Rc::new(RefCell::new(ClockClassData {
            frequency,
            offset_seconds: 0,
            offset_cycles: 0,
            precision: None,
            accuracy: None,
            origin: ClockOrigin::Unknown,
            identity: None,
            name: None,
            description: None,
            user_attributes: UserAttributes::new(),
            frozen: false,
        }))))
    }

    /// This clock's frequency, in Hz.
    pub fn frequency(&self) -> u64 {
        self.0.borrow().frequency
    }

    /// Sets the offset of cycle zero from the clock's origin, as whole
    /// seconds plus a sub-second cycle count (`0 <= offset_cycles <
    /// frequency` is the caller's responsibility to maintain; a value
    /// outside that range is still converted correctly, just unusual).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this clock class is frozen.
    pub fn set_offset(&self, offset_seconds: i64, offset_cycles: u64) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.offset_seconds = offset_seconds;
        data.offset_cycles = offset_cycles;
        Ok(())
    }

    /// The offset of cycle zero from the origin, as `(seconds,
    /// cycles)`.
    pub fn offset(&self) -> (i64, u64) {
        let data = self.0.borrow();
        (data.offset_seconds, data.offset_cycles)
    }

    /// Sets the clock's precision, in cycles (the maximum error in a
    /// single reading).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this clock class is frozen.
    pub fn set_precision(&self, precision: Option<u64>) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.precision = precision;
        Ok(())
    }

    /// This clock's precision, in cycles, if known.
    pub fn precision(&self) -> Option<u64> {
        self.0.borrow().precision
    }

    /// Sets the clock's accuracy, in cycles (the maximum drift from
    /// true time).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this clock class is frozen.
    pub fn set_accuracy(&self, accuracy: Option<u64>) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.accuracy = accuracy;
        Ok(())
    }

    /// This clock's accuracy, in cycles, if known.
    pub fn accuracy(&self) -> Option<u64> {
        self.0.borrow().accuracy
    }

    /// Sets the clock's origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this clock class is frozen.
    pub fn set_origin(&self, origin: ClockOrigin) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.origin = origin;
        Ok(())
    }

    /// This clock's origin.
    pub fn origin(&self) -> ClockOrigin {
        self.0.borrow().origin.clone()
    }

    /// Sets the clock's identity, independently of its origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this clock class is frozen.
    pub fn set_identity(&self, identity: Option<ClockIdentity>) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.identity = identity;
        Ok(())
    }

    /// Sets the clock's human-readable name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this clock class is frozen.
    pub fn set_name(&self, name: Option<String>) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.name = name;
        Ok(())
    }

    /// This clock's name, if set.
    pub fn name(&self) -> Option<String> {
        self.0.borrow().name.clone()
    }

    /// Sets the clock's human-readable description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this clock class is frozen.
    pub fn set_description(&self, description: Option<String>) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.description = description;
        Ok(())
    }

    /// This clock's description, if set.
    pub fn description(&self) -> Option<String> {
        self.0.borrow().description.clone()
    }

    /// A snapshot of this clock class's current user attributes.
    pub fn user_attributes(&self) -> UserAttributes {
        self.0.borrow().user_attributes.clone()
    }

    /// Merges `value` into the user attribute named `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this clock class is frozen.
    pub fn set_user_attribute(&self, key: impl Into<String>, value: flowtrace_attrs::AttributeValue) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        let _ = data.user_attributes.set(key, value);
        Ok(())
    }

    /// Freezes this clock class: all setters will return
    /// [`Error::Frozen`] from now on.
    pub fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    /// Whether this clock class is frozen.
    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    /// Returns `true` iff `self` and `other` are handles to the very
    /// same clock class (not merely two clock classes that happen to
    /// describe the same clock).
    pub fn is_same_instance(&self, other: &ClockClass) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// This clock's identity, if any, independently of its origin.
    pub fn identity(&self) -> Option<ClockIdentity> {
        self.0.borrow().identity.clone()
    }

    /// Converts a raw cycle value into nanoseconds from this clock's
    /// origin.
    ///
    /// Intermediate arithmetic is carried out in `i128` to avoid
    /// overflow while scaling by `1_000_000_000 / frequency`; only the
    /// final narrowing to `i64` is checked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if the result does not fit in an
    /// `i64`.
    pub fn cycles_to_ns_from_origin(&self, cycles: u64) -> Result<i64, Error> {
        let data = self.0.borrow();
        const NANOS_PER_SEC: i128 = 1_000_000_000;

        let total_cycles = (cycles as i128) + (data.offset_cycles as i128);
        let frequency = data.frequency as i128;

        let whole_seconds_from_cycles = total_cycles / frequency;
        let remainder_cycles = total_cycles % frequency;
        let remainder_ns = remainder_cycles * NANOS_PER_SEC / frequency;

        let ns = (data.offset_seconds as i128) * NANOS_PER_SEC + whole_seconds_from_cycles * NANOS_PER_SEC + remainder_ns;

        i64::try_from(ns).map_err(|_| Error::Overflow { cycles, frequency: data.frequency })
    }
}

/// A single reading of a clock at a point in the stream, carrying both
/// the raw cycle value and its precomputed nanoseconds-from-origin.
#[derive(Clone, Debug)]
pub struct ClockSnapshot {
    clock_class: ClockClass,
    cycles: u64,
    ns_from_origin: i64,
}

impl ClockSnapshot {
    /// Creates a snapshot of `clock_class` at `cycles`, computing
    /// nanoseconds-from-origin eagerly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if the conversion overflows.
    pub fn new(clock_class: ClockClass, cycles: u64) -> Result<Self, Error> {
        let ns_from_origin = clock_class.cycles_to_ns_from_origin(cycles)?;
        Ok(Self { clock_class, cycles, ns_from_origin })
    }

    /// The clock class this snapshot was taken against.
    pub fn clock_class(&self) -> &ClockClass {
        &self.clock_class
    }

    /// The raw cycle value at the time of the snapshot.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The precomputed nanoseconds from the clock's origin.
    pub fn ns_from_origin(&self) -> i64 {
        self.ns_from_origin
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_frequency_is_rejected() {
        assert_eq!(ClockClass::new(0), Err(Error::ZeroFrequency));
    }

    #[test]
    fn basic_cycle_conversion_at_one_ghz() {
        let clock = ClockClass::new(1_000_000_000).unwrap();
        assert_eq!(clock.cycles_to_ns_from_origin(42).unwrap(), 42);
    }

    #[test]
    fn conversion_accounts_for_second_and_cycle_offset() {
        let clock = ClockClass::new(1_000).unwrap();
        clock.set_offset(5, 500).unwrap();
        // offset: 5s + 500 cycles (500ms at 1kHz), plus 250 cycles (250ms) of input.
        assert_eq!(clock.cycles_to_ns_from_origin(250).unwrap(), 5_750_000_000);
    }

    #[test]
    fn frozen_clock_rejects_mutation() {
        let clock = ClockClass::new(1000).unwrap();
        clock.freeze();
        assert_eq!(clock.set_precision(Some(1)), Err(Error::Frozen));
    }

    #[test]
    fn same_instance_vs_equal_identity() {
        let a = ClockClass::new(1000).unwrap();
        let b = a.clone();
        let c = ClockClass::new(1000).unwrap();
        assert!(a.is_same_instance(&b));
        assert!(!a.is_same_instance(&c));
    }

    #[test]
    fn identity_is_independent_of_origin() {
        let clock = ClockClass::new(1000).unwrap();
        let identity = ClockIdentity::NamespaceNameUid {
            namespace: "ns".into(),
            name: "clk".into(),
            uid: "boot-1".into(),
        };
        // The origin stays unknown; the identity is set on its own axis.
        clock.set_identity(Some(identity.clone())).unwrap();
        assert_eq!(clock.origin(), ClockOrigin::Unknown);
        assert_eq!(clock.identity(), Some(identity));
    }

    #[test]
    fn custom_origin_compares_by_namespace_name_uid() {
        let a = ClockClass::new(1000).unwrap();
        a.set_origin(ClockOrigin::Custom { namespace: Some("ns".into()), name: "clk".into(), uid: "1".into() })
            .unwrap();
        let b = ClockClass::new(1000).unwrap();
        b.set_origin(ClockOrigin::Custom { namespace: Some("ns".into()), name: "clk".into(), uid: "1".into() })
            .unwrap();
        assert_eq!(a.origin(), b.origin());
    }

    #[test]
    fn overflow_is_reported_not_panicked() {
        let clock = ClockClass::new(1).unwrap();
        clock.set_offset(i64::MAX, 0).unwrap();
        assert!(matches!(clock.cycles_to_ns_from_origin(1), Err(Error::Overflow { .. })));
    }
}
