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

//! Trace, stream, and event classes, and the trace/stream instances
//! built from them.
//!
//! Unlike the field class tree ([`flowtrace_field_class`], owned
//! outright with no sharing), trace IR objects use `Rc<RefCell<..>>`:
//! a stream class is referenced both by its trace class (as a child)
//! and by every stream instantiated from it, and an event class is
//! referenced both by its stream class and by every message that
//! carries one of its events. Reference counts here are never required
//! to be atomic — a single graph runs on one thread — so `Rc` rather
//! than `Arc` is the right tool, matching how non-thread-shared
//! reference-counted state is handled elsewhere in the ecosystem this
//! crate draws on.
//!
//! Parent-to-child links (trace class to stream class, stream class to
//! event class) are strong; child-to-parent links are [`std::rc::Weak`]
//! to avoid a reference cycle that would otherwise keep a trace class
//! alive forever once it had produced a single stream class.

mod class;
mod instance;

pub use class::{DestructionListener, EventClass, LogLevel, StreamClass, TraceClass};
pub use instance::{Stream, Trace};

use thiserror::Error;

/// Errors raised while building or mutating trace IR objects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A mutating operation was attempted on a frozen object.
    #[error("trace IR object is frozen and cannot be mutated")]
    Frozen,

    /// An id was reused where this object does not assign ids
    /// automatically.
    #[error("id {0} is already in use")]
    DuplicateId(u64),

    /// An operation was attempted that the object's current
    /// configuration does not allow (e.g. setting a packet context on
    /// a stream class that does not support packets).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
}

#[cfg(test)]
mod test {
    use super::*;
    use flowtrace_field_class::Mip;

    #[test]
    fn stream_class_and_event_class_chain_upward() {
        let trace_class = TraceClass::new(Mip::AtLeastOne);
        let stream_class = trace_class.create_stream_class(0).unwrap();
        let event_class = stream_class.create_event_class(0).unwrap();

        assert!(event_class.stream_class().unwrap().trace_class().unwrap().is_same_instance(&trace_class));
    }

    #[test]
    fn automatic_ids_ignore_requested_value() {
        let trace_class = TraceClass::new(Mip::AtLeastOne);
        let a = trace_class.create_stream_class(99).unwrap();
        let b = trace_class.create_stream_class(99).unwrap();
        assert_eq!(a.id(), 0);
        assert_eq!(b.id(), 1);
    }

    #[test]
    fn freeze_is_transitive_across_the_whole_schema() {
        let trace_class = TraceClass::new(Mip::AtLeastOne);
        let stream_class = trace_class.create_stream_class(0).unwrap();
        let event_class = stream_class.create_event_class(0).unwrap();
        trace_class.freeze();

        assert!(stream_class.is_frozen());
        assert!(event_class.is_frozen());
        assert_eq!(stream_class.set_name("late"), Err(Error::Frozen));
    }

    #[test]
    fn registering_a_destruction_listener_does_not_change_refcount() {
        let trace_class = TraceClass::new(Mip::AtLeastOne);
        let before = trace_class.strong_count();
        trace_class.add_destruction_listener(Box::new(|_| {}));
        assert_eq!(trace_class.strong_count(), before);
    }

    #[test]
    fn stream_must_belong_to_the_trace_own_trace_class() {
        let trace_class_a = TraceClass::new(Mip::AtLeastOne);
        let trace_class_b = TraceClass::new(Mip::AtLeastOne);
        let stream_class_a = trace_class_a.create_stream_class(0).unwrap();

        let trace_b = Trace::new(trace_class_b);
        let err = trace_b.create_stream(stream_class_a, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn discarded_packets_require_packet_support() {
        let trace_class = TraceClass::new(Mip::AtLeastOne);
        let stream_class = trace_class.create_stream_class(0).unwrap();
        let err = stream_class.set_supports_discarded_packets(true, false).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }
}
