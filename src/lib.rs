#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results,
    variant_size_differences
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! `flowtrace` is a library for describing the shape of trace data
//! (**field classes**, **clock classes**, **trace/stream/event
//! classes**) and for moving that data, one **message** at a time,
//! across a directed graph of components connected by **message
//! iterators**.
//!
//! A source component exposes a message iterator that a downstream
//! component pulls from; the [`flowtrace_muxer`] crate implements the
//! canonical N-way merge used to combine several upstream iterators
//! into a single, time-ordered stream.
//!
//! Iteration is cooperative and single-threaded: a `next` call either
//! makes progress or asks to be retried later (see
//! [`flowtrace_iterator`]). No component in this crate performs
//! blocking I/O or spawns threads.

pub use flowtrace_attrs as attrs;
pub use flowtrace_clock as clock;
pub use flowtrace_field_class as field_class;
pub use flowtrace_field_location as field_location;
pub use flowtrace_iterator as iterator;
pub use flowtrace_message as message;
pub use flowtrace_muxer as muxer;
pub use flowtrace_ranges as ranges;
pub use flowtrace_trace_ir as trace_ir;
