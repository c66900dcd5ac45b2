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

//! The N-way merging muxer: combines any number of upstream message
//! iterators into one ordered, oldest-first sequence.
//!
//! Internally, each upstream gets a small message queue plus a slot on
//! a min-heap keyed by the default clock snapshot timestamp of the
//! message currently at the front of its queue. An upstream that
//! returns [`flowtrace_iterator::Error::Again`] is moved to a
//! "to reload" side-list instead of the heap, so the muxer doesn't spin
//! on it every call; it rejoins the heap the next time its `next()`
//! succeeds.
//!
//! Messages with no default clock snapshot (untimed) are always
//! considered "oldest": they can't be placed relative to timed
//! messages, so the muxer flushes them immediately rather than
//! guessing. Equal timestamps, and ties among untimed messages, break
//! deterministically by upstream index, so the same set of upstreams
//! always merges into the same output order.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};

use thiserror::Error;

use flowtrace_clock::ClockClass;
use flowtrace_iterator::{auto_seek_ns_from_origin, Advance, MessageIterator};
use flowtrace_message::{check_correlatable, ClockCorrelationError, Message};

pub use flowtrace_iterator::Error as IteratorError;

/// Errors specific to the muxer, beyond what an individual upstream can
/// raise.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// An upstream's default clock snapshot could not be correlated
    /// with the clock already established for this muxer.
    #[error(transparent)]
    ClockCorrelation(#[from] ClockCorrelationError),

    /// `seek_beginning` was requested but at least one upstream does
    /// not support it; per the all-or-nothing rule, no upstream was
    /// seeked.
    #[error("upstream {0} does not support seek-beginning")]
    SeekBeginningNotSupported(usize),

    /// Propagated from an upstream iterator.
    #[error(transparent)]
    Iterator(#[from] IteratorError),
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct HeapKey {
    ns_from_origin: Option<i64>,
    upstream_index: usize,
}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.ns_from_origin, other.ns_from_origin) {
            (None, None) => self.upstream_index.cmp(&other.upstream_index),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(&b).then(self.upstream_index.cmp(&other.upstream_index)),
        }
    }
}

/// Combines several upstream message iterators into a single
/// oldest-first sequence.
pub struct Muxer {
    upstreams: Vec<Box<dyn MessageIterator>>,
    queues: Vec<VecDeque<Message>>,
    ended: Vec<bool>,
    to_reload: Vec<usize>,
    heap: BinaryHeap<Reverse<HeapKey>>,
    reference_clock: Option<ClockClass>,
}

impl Muxer {
    /// Creates a muxer over `upstreams`, in the order their messages
    /// should tie-break when timestamps are equal or absent.
    pub fn new(upstreams: Vec<Box<dyn MessageIterator>>) -> Self {
        let len = upstreams.len();
        Self {
            upstreams,
            queues: (0..len).map(|_| VecDeque::new()).collect(),
            ended: vec![false; len],
            to_reload: (0..len).collect(),
            heap: BinaryHeap::new(),
            reference_clock: None,
        }
    }

    fn ensure_full_heap(&mut self) -> Result<(), Error> {
        let pending: Vec<usize> = self.to_reload.drain(..).collect();
        for index in pending {
            if self.ended[index] {
                continue;
            }
            match self.upstreams[index].next() {
                Ok(Advance::End) => {
                    self.ended[index] = true;
                }
                Ok(Advance::Messages(messages)) => {
                    for message in &messages {
                        self.check_clock(message)?;
                    }
                    self.queues[index].extend(messages);
                    self.push_heap_entry(index);
                }
                Err(IteratorError::Again) => {
                    self.to_reload.push(index);
                }
                Err(e) => return Err(Error::Iterator(e)),
            }
        }
        Ok(())
    }

    fn check_clock(&mut self, message: &Message) -> Result<(), Error> {
        let current = message.default_clock_snapshot().map(|s| s.clock_class());
        match (&self.reference_clock, current) {
            (None, Some(clock)) => self.reference_clock = Some(clock.clone()),
            (None, None) => {}
            (Some(reference), current) => check_correlatable(Some(reference), current)?,
        }
        Ok(())
    }

    fn push_heap_entry(&mut self, index: usize) {
        if let Some(front) = self.queues[index].front() {
            let ns_from_origin = front.default_clock_snapshot().map(|s| s.ns_from_origin());
            self.heap.push(Reverse(HeapKey { ns_from_origin, upstream_index: index }));
        }
    }

    /// Advances the merge by one message.
    ///
    /// # Errors
    ///
    /// Returns [`IteratorError::Again`] (via [`Error::Iterator`]) if at
    /// least one upstream has no message ready yet and none of the
    /// others has one queued; returns other errors as raised by an
    /// upstream or by clock correlation.
    pub fn next(&mut self) -> Result<Advance, Error> {
        self.ensure_full_heap()?;

        if self.heap.is_empty() {
            if self.to_reload.is_empty() {
                return Ok(Advance::End);
            }
            return Err(Error::Iterator(IteratorError::Again));
        }

        let Reverse(key) = self.heap.pop().expect("checked non-empty");
        let index = key.upstream_index;
        let message = self.queues[index].pop_front().expect("heap entry implies a queued message");

        if self.queues[index].is_empty() {
            if !self.ended[index] {
                self.to_reload.push(index);
            }
        } else {
            self.push_heap_entry(index);
        }

        Ok(Advance::Messages(smallvec::smallvec![message]))
    }

    /// Seeks every upstream to the beginning of its stream(s).
    ///
    /// All-or-nothing: if any upstream doesn't support
    /// `seek_beginning`, no upstream is seeked and
    /// [`Error::SeekBeginningNotSupported`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SeekBeginningNotSupported`] if any upstream
    /// lacks support, or propagates an upstream's seek error.
    pub fn seek_beginning(&mut self) -> Result<(), Error> {
        for (index, upstream) in self.upstreams.iter().enumerate() {
            if !upstream.can_seek_beginning() {
                return Err(Error::SeekBeginningNotSupported(index));
            }
        }
        for upstream in &mut self.upstreams {
            upstream.seek_beginning()?;
        }
        for queue in &mut self.queues {
            queue.clear();
        }
        self.ended.iter_mut().for_each(|e| *e = false);
        self.to_reload = (0..self.upstreams.len()).collect();
        self.heap.clear();
        self.reference_clock = None;
        Ok(())
    }

    /// Seeks every upstream to `ns_from_origin`, using each upstream's
    /// native support if available and falling back to
    /// [`auto_seek_ns_from_origin`] otherwise.
    ///
    /// # Errors
    ///
    /// Propagates the first upstream's seek error.
    pub fn seek_ns_from_origin(&mut self, ns_from_origin: i64) -> Result<(), Error> {
        for upstream in &mut self.upstreams {
            if upstream.can_seek_ns_from_origin(ns_from_origin) {
                upstream.seek_ns_from_origin(ns_from_origin)?;
            } else {
                auto_seek_ns_from_origin(upstream.as_mut(), ns_from_origin)?;
            }
        }
        for queue in &mut self.queues {
            queue.clear();
        }
        self.ended.iter_mut().for_each(|e| *e = false);
        self.to_reload = (0..self.upstreams.len()).collect();
        self.heap.clear();
        self.reference_clock = None;
        Ok(())
    }
}
