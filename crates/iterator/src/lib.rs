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

//! The message iterator base: the lifecycle every message iterator
//! goes through, the cooperative "try again later" suspension signal,
//! and (behind the `dev-mode` feature) the expensive postconditions a
//! test or debug build checks after every `next()` call.
//!
//! There is no blocking I/O and no threading in this model: a message
//! iterator that cannot make progress right now returns
//! [`Advance::Again`] rather than blocking, and the caller is expected
//! to come back later (typically after polling something else, or
//! after a timer / external event indicates progress is possible
//! again).

#[cfg(feature = "dev-mode")]
mod dev_mode;
mod seek;

#[cfg(feature = "dev-mode")]
pub use dev_mode::DevModeChecker;
pub use seek::auto_seek_ns_from_origin;

use smallvec::SmallVec;
use thiserror::Error;

use flowtrace_message::Message;

/// The maximum number of messages a single `next()` call may return.
/// Chosen to bound per-call latency in a cooperative, single-threaded
/// graph; callers needing more simply call `next()` again.
pub const MAX_MESSAGES_PER_ADVANCE: usize = 64;

/// Errors raised by a message iterator or by the postcondition checks
/// layered on top of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The iterator has no message ready and cannot make progress
    /// right now; the caller should try again later. This is not
    /// really an error — it is the cooperative scheduling signal — but
    /// it is modeled as one so `?` composes the same way whichever
    /// branch a caller is on.
    #[error("try again later")]
    Again,

    /// The iterator has reached its end and will never produce
    /// another message.
    #[error("iterator has ended")]
    End,

    /// Seeking is not supported by this iterator.
    #[error("seeking is not supported by this iterator")]
    SeekingNotSupported,

    /// `next()` was called on an iterator that is not
    /// [`LifecycleState::Active`] (e.g. non-initialized, ended,
    /// finalized, or mid-seek).
    #[error("next() called while iterator is in state {0:?}")]
    WrongState(LifecycleState),

    /// A dev-mode postcondition was violated: the underlying iterator
    /// returned messages that break an invariant it is required to
    /// uphold.
    #[error("postcondition violated: {0}")]
    PostconditionViolated(String),

    /// An operational error from the underlying iterator, with a
    /// human-readable cause chain.
    #[error("{0}")]
    Operational(String),
}

/// The lifecycle state of a message iterator, independent of any
/// particular implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Created but not yet advanced or seeked.
    NonInitialized,
    /// Ready to produce messages via `next()`.
    Active,
    /// A seek operation is in progress (suspended on
    /// [`Error::Again`]).
    Seeking,
    /// The most recent seek attempt returned [`Error::Again`] and has
    /// not yet been retried to completion.
    LastSeekReturnedAgain,
    /// The most recent seek attempt failed outright.
    LastSeekReturnedError,
    /// The iterator has reached its end.
    Ended,
    /// The iterator has been torn down and must not be used again.
    Finalized,
}

impl LifecycleState {
    fn can_call_next(self) -> bool {
        matches!(self, LifecycleState::Active)
    }

    fn can_seek(self) -> bool {
        !matches!(self, LifecycleState::Finalized)
    }
}

/// The result of advancing a message iterator by one step.
#[derive(Clone)]
pub enum Advance {
    /// One or more messages, in the order they occurred.
    Messages(SmallVec<[Message; 4]>),
    /// The iterator has reached its end.
    End,
}

/// The lifecycle state machine wrapping a concrete message iterator
/// implementation.
///
/// This is the part of a message iterator that is the same for every
/// implementation: tracking [`LifecycleState`], rejecting `next()`
/// calls made from the wrong state, and recording whether the last
/// seek attempt needs to be retried.
pub struct IteratorLifecycle {
    state: LifecycleState,
}

impl Default for IteratorLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl IteratorLifecycle {
    /// Creates a lifecycle tracker in [`LifecycleState::NonInitialized`].
    pub fn new() -> Self {
        Self { state: LifecycleState::NonInitialized }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Call before invoking the underlying iterator's `next()`
    /// implementation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongState`] unless the current state allows a
    /// `next()` call ([`LifecycleState::NonInitialized`] transitions to
    /// [`LifecycleState::Active`] implicitly on the first call).
    pub fn begin_next(&mut self) -> Result<(), Error> {
        if self.state == LifecycleState::NonInitialized {
            self.state = LifecycleState::Active;
        }
        if !self.state.can_call_next() {
            return Err(Error::WrongState(self.state));
        }
        Ok(())
    }

    /// Call after the underlying iterator's `next()` implementation
    /// returns, to update the lifecycle state accordingly.
    pub fn end_next(&mut self, result: &Result<Advance, Error>) {
        match result {
            Ok(Advance::End) => self.state = LifecycleState::Ended,
            Ok(Advance::Messages(_)) => self.state = LifecycleState::Active,
            Err(Error::Again) => self.state = LifecycleState::Active,
            Err(_) => {}
        }
    }

    /// Call before invoking a seek.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongState`] if the iterator is finalized.
    pub fn begin_seek(&mut self) -> Result<(), Error> {
        if !self.state.can_seek() {
            return Err(Error::WrongState(self.state));
        }
        self.state = LifecycleState::Seeking;
        Ok(())
    }

    /// Call after a seek completes, to update the lifecycle state
    /// accordingly.
    pub fn end_seek(&mut self, result: &Result<(), Error>) {
        self.state = match result {
            Ok(()) => LifecycleState::Active,
            Err(Error::Again) => LifecycleState::LastSeekReturnedAgain,
            Err(_) => LifecycleState::LastSeekReturnedError,
        };
    }

    /// Finalizes this iterator: no further `next()` or seek calls are
    /// valid afterward.
    pub fn finalize(&mut self) {
        self.state = LifecycleState::Finalized;
    }
}

/// The operations a concrete message iterator must implement; the
/// cooperative retry/lifecycle bookkeeping around these calls is
/// handled by [`IteratorLifecycle`] and, in dev builds, by
/// [`DevModeChecker`].
pub trait MessageIterator {
    /// Advances the iterator by one step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Again`] if no message is ready yet, or
    /// [`Error::Operational`] on a genuine failure.
    fn next(&mut self) -> Result<Advance, Error>;

    /// Whether this iterator supports seeking to the beginning of its
    /// stream(s).
    fn can_seek_beginning(&self) -> bool {
        false
    }

    /// Seeks to the beginning of this iterator's stream(s).
    ///
    /// # Errors
    ///
    /// Returns [`Error::SeekingNotSupported`] if
    /// [`MessageIterator::can_seek_beginning`] is `false`,
    /// [`Error::Again`] if the seek cannot complete yet, or
    /// [`Error::Operational`] on failure.
    fn seek_beginning(&mut self) -> Result<(), Error> {
        Err(Error::SeekingNotSupported)
    }

    /// Whether this iterator supports seeking directly to a point in
    /// time, expressed as nanoseconds from the Unix epoch.
    fn can_seek_ns_from_origin(&self, _ns_from_origin: i64) -> bool {
        false
    }

    /// Seeks directly to `ns_from_origin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SeekingNotSupported`] if
    /// [`MessageIterator::can_seek_ns_from_origin`] is `false`,
    /// [`Error::Again`] if the seek cannot complete yet, or
    /// [`Error::Operational`] on failure.
    fn seek_ns_from_origin(&mut self, _ns_from_origin: i64) -> Result<(), Error> {
        Err(Error::SeekingNotSupported)
    }
}
