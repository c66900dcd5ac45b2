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

//! Message kinds and the two validators that check a stream of
//! messages is well-formed: the per-stream protocol validator (§3.8 of
//! the per-stream message-sequence automaton) and the clock-correlation
//! validator.

mod clock_correlation;
mod message;
mod protocol;

pub use clock_correlation::{check_correlatable, Error as ClockCorrelationError};
pub use message::{next_sequence_number, Message, Packet};
pub use protocol::{PerStreamState, StreamProtocolValidator};

use thiserror::Error;

/// Errors raised while validating a sequence of messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A message could not legally follow its stream's current state.
    #[error("message {message_kind:?} is invalid in per-stream state {state:?}")]
    ProtocolViolation {
        /// The stream's state just before this message.
        state: &'static str,
        /// The kind of message that was rejected.
        message_kind: &'static str,
    },

    /// An event or packet-end message referred to a packet other than
    /// the one currently open for its stream.
    #[error("message {message_kind:?} refers to a packet other than the one currently open for its stream")]
    PacketMismatch {
        /// The kind of message that carried the mismatched packet.
        message_kind: &'static str,
    },

    /// Two clock classes could not be correlated.
    #[error(transparent)]
    ClockCorrelation(#[from] clock_correlation::Error),
}
