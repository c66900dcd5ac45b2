//! Trace and stream instances: the runtime objects built from a trace
//! class, carrying the data that varies per capture rather than per
//! schema (environment overrides aside, a trace's shape always comes
//! from its trace class).

use std::cell::RefCell;
use std::rc::Rc;

use crate::class::{StreamClass, TraceClass};
use crate::Error;

struct StreamData {
    stream_class: StreamClass,
    trace: Trace,
    id: u64,
    name: Option<String>,
}

/// A shared handle to a stream: one sequence of packets and/or events,
/// instantiated from a [`StreamClass`].
#[derive(Clone)]
pub struct Stream(Rc<RefCell<StreamData>>);

impl Stream {
    pub(crate) fn new(stream_class: StreamClass, trace: Trace, id: u64) -> Self {
        Self(Rc::new(RefCell::new(StreamData { stream_class, trace, id, name: None })))
    }

    /// The stream class this stream was instantiated from.
    pub fn stream_class(&self) -> StreamClass {
        self.0.borrow().stream_class.clone()
    }

    /// The trace this stream belongs to.
    pub fn trace(&self) -> Trace {
        self.0.borrow().trace.clone()
    }

    /// This stream's identifier, unique within its trace.
    pub fn id(&self) -> u64 {
        self.0.borrow().id
    }

    /// This stream's name, if any.
    pub fn name(&self) -> Option<String> {
        self.0.borrow().name.clone()
    }

    /// Sets this stream's name.
    pub fn set_name(&self, name: impl Into<String>) {
        self.0.borrow_mut().name = Some(name.into());
    }

    /// Returns `true` iff `self` and `other` are handles to the same
    /// stream.
    pub fn is_same_instance(&self, other: &Stream) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_instance(other)
    }
}

impl Eq for Stream {}

impl std::hash::Hash for Stream {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

struct TraceData {
    trace_class: TraceClass,
    streams: Vec<Stream>,
    assigns_automatic_stream_ids: bool,
}

/// A shared handle to a trace: the runtime instance of a [`TraceClass`],
/// owning every stream captured under it.
#[derive(Clone)]
pub struct Trace(Rc<RefCell<TraceData>>);

impl Trace {
    /// Creates an empty trace instantiated from `trace_class`.
    pub fn new(trace_class: TraceClass) -> Self {
        Self(Rc::new(RefCell::new(TraceData {
            trace_class,
            streams: Vec::new(),
            assigns_automatic_stream_ids: true,
        })))
    }

    /// The trace class this trace was instantiated from.
    pub fn trace_class(&self) -> TraceClass {
        self.0.borrow().trace_class.clone()
    }

    /// Creates and appends a new stream of the given stream class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `stream_class` does
    /// not belong to this trace's trace class, or [`Error::DuplicateId`]
    /// if `id` is already used and this trace does not assign
    /// automatic stream ids.
    pub fn create_stream(&self, stream_class: StreamClass, id: u64) -> Result<Stream, Error> {
        let belongs = stream_class
            .trace_class()
            .map(|sc_trace_class| sc_trace_class.is_same_instance(&self.0.borrow().trace_class))
            .unwrap_or(false);
        if !belongs {
            return Err(Error::InvalidConfiguration("stream class does not belong to this trace's trace class"));
        }

        let mut data = self.0.borrow_mut();
        let id = if data.assigns_automatic_stream_ids {
            data.streams.len() as u64
        } else {
            if data.streams.iter().any(|s| s.id() == id) {
                return Err(Error::DuplicateId(id));
            }
            id
        };
        let stream = Stream::new(stream_class, self.clone(), id);
        data.streams.push(stream.clone());
        Ok(stream)
    }

    /// The streams of this trace, in creation order.
    pub fn streams(&self) -> Vec<Stream> {
        self.0.borrow().streams.clone()
    }

    /// Returns `true` iff `self` and `other` are handles to the same
    /// trace.
    pub fn is_same_instance(&self, other: &Trace) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
