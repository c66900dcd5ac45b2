//! Trace, stream, and event classes: the schema shared by every trace,
//! stream, and event instance built from them.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use flowtrace_attrs::UserAttributes;
use flowtrace_clock::ClockClass;
use flowtrace_field_class::{FieldClass, Mip};

use crate::Error;

/// A listener invoked just before a trace class is dropped (its
/// strong count reaches zero). Registering or firing listeners never
/// changes the trace class's own refcount: the listener list is owned
/// by the trace class's interior data, not held externally.
pub type DestructionListener<T> = Box<dyn FnMut(&T)>;

#[derive(Default)]
struct ListenerList<T> {
    listeners: Vec<DestructionListener<T>>,
}

impl<T> ListenerList<T> {
    fn push(&mut self, listener: DestructionListener<T>) {
        self.listeners.push(listener);
    }
}

impl<T> std::fmt::Debug for ListenerList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerList").field("count", &self.listeners.len()).finish()
    }
}

struct EventClassData {
    stream_class: Weak<RefCell<StreamClassData>>,
    id: u64,
    name: Option<String>,
    log_level: Option<LogLevel>,
    emf_uri: Option<String>,
    specific_context_field_class: Option<FieldClass>,
    payload_field_class: Option<FieldClass>,
    user_attributes: UserAttributes,
    frozen: bool,
    on_destruction: ListenerList<EventClass>,
}

/// A logging level attached to an event class, in Babeltrace/syslog
/// severity order (most severe first).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// System is unusable.
    Emergency,
    /// Action must be taken immediately.
    Alert,
    /// Critical condition.
    Critical,
    /// Error condition.
    Error,
    /// Warning condition.
    Warning,
    /// Normal but significant condition.
    Notice,
    /// Informational message.
    Info,
    /// Verbose debug-level message.
    DebugSystem,
    /// Application-level debug message.
    DebugProgram,
    /// Process-level debug message.
    DebugProcess,
    /// Module-level debug message.
    DebugModule,
    /// Unit-level debug message.
    DebugUnit,
    /// Function-level debug message.
    DebugFunction,
    /// Line-level debug message.
    DebugLine,
    /// Unqualified debug message.
    Debug,
}

/// A shared handle to an event class: the schema of one kind of event
/// within a stream class.
#[derive(Clone)]
pub struct EventClass(Rc<RefCell<EventClassData>>);

impl EventClass {
    pub(crate) fn new(stream_class: &Rc<RefCell<StreamClassData>>, id: u64) -> Self {
        Self(Rc::new(RefCell::new(EventClassData {
            stream_class: Rc::downgrade(stream_class),
            id,
            name: None,
            log_level: None,
            emf_uri: None,
            specific_context_field_class: None,
            payload_field_class: None,
            user_attributes: UserAttributes::new(),
            frozen: false,
            on_destruction: ListenerList::default(),
        })))
    }

    /// The numeric identifier of this event class, unique within its
    /// stream class.
    pub fn id(&self) -> u64 {
        self.0.borrow().id
    }

    /// The stream class this event class belongs to, if it has not
    /// been dropped.
    pub fn stream_class(&self) -> Option<StreamClass> {
        self.0.borrow().stream_class.upgrade().map(StreamClass)
    }

    /// This event class's name, if any.
    pub fn name(&self) -> Option<String> {
        self.0.borrow().name.clone()
    }

    /// Sets this event class's name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this event class is frozen.
    pub fn set_name(&self, name: impl Into<String>) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.name = Some(name.into());
        Ok(())
    }

    /// This event class's log level, if any.
    pub fn log_level(&self) -> Option<LogLevel> {
        self.0.borrow().log_level
    }

    /// Sets this event class's log level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this event class is frozen.
    pub fn set_log_level(&self, log_level: LogLevel) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.log_level = Some(log_level);
        Ok(())
    }

    /// Sets the specific context field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this event class is frozen.
    pub fn set_specific_context_field_class(&self, mut field_class: FieldClass) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        field_class.freeze();
        data.specific_context_field_class = Some(field_class);
        Ok(())
    }

    /// The specific context field class, if any.
    pub fn specific_context_field_class(&self) -> Option<FieldClass> {
        self.0.borrow().specific_context_field_class.clone()
    }

    /// Sets the payload field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this event class is frozen.
    pub fn set_payload_field_class(&self, mut field_class: FieldClass) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        field_class.freeze();
        data.payload_field_class = Some(field_class);
        Ok(())
    }

    /// The payload field class, if any.
    pub fn payload_field_class(&self) -> Option<FieldClass> {
        self.0.borrow().payload_field_class.clone()
    }

    /// Registers a listener invoked just before this event class is
    /// dropped.
    pub fn add_destruction_listener(&self, listener: DestructionListener<EventClass>) {
        self.0.borrow_mut().on_destruction.push(listener);
    }

    /// Whether this event class is frozen. An event class is frozen
    /// transitively the moment its owning stream or trace class is
    /// frozen, and each field class installed into it is frozen
    /// immediately on installation, regardless of whether this event
    /// class itself is frozen yet.
    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub(crate) fn freeze(&self) {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return;
        }
        data.frozen = true;
        if let Some(fc) = &mut data.specific_context_field_class {
            fc.freeze();
        }
        if let Some(fc) = &mut data.payload_field_class {
            fc.freeze();
        }
    }
}

impl Drop for EventClassData {
    fn drop(&mut self) {
        // The listener list is consumed here; there is no `self:
        // EventClass` to hand back at this point, so destruction
        // listeners registered on event classes fire from
        // `StreamClassData::drop` instead, just before the `Rc` holding
        // the child is released.
    }
}

struct StreamClassData {
    trace_class: Weak<RefCell<TraceClassData>>,
    id: u64,
    name: Option<String>,
    supports_packets: bool,
    packets_have_discarded_event_counter_snapshot: bool,
    packets_have_packet_counter_snapshot: bool,
    supports_discarded_events: bool,
    discarded_events_have_default_clock_snapshots: bool,
    supports_discarded_packets: bool,
    discarded_packets_have_default_clock_snapshots: bool,
    assigns_automatic_stream_ids: bool,
    assigns_automatic_event_class_ids: bool,
    packet_context_field_class: Option<FieldClass>,
    event_common_context_field_class: Option<FieldClass>,
    default_clock_class: Option<ClockClass>,
    event_classes: Vec<EventClass>,
    user_attributes: UserAttributes,
    frozen: bool,
    on_destruction: ListenerList<StreamClass>,
}

/// A shared handle to a stream class: the schema shared by every
/// stream of events produced by one source (e.g. one CPU, one thread,
/// one logical channel).
#[derive(Clone)]
pub struct StreamClass(Rc<RefCell<StreamClassData>>);

impl StreamClass {
    pub(crate) fn new(trace_class: &Rc<RefCell<TraceClassData>>, id: u64) -> Self {
        Self(Rc::new(RefCell::new(StreamClassData {
            trace_class: Rc::downgrade(trace_class),
            id,
            name: None,
            supports_packets: false,
            packets_have_discarded_event_counter_snapshot: false,
            packets_have_packet_counter_snapshot: false,
            supports_discarded_events: false,
            discarded_events_have_default_clock_snapshots: false,
            supports_discarded_packets: false,
            discarded_packets_have_default_clock_snapshots: false,
            assigns_automatic_stream_ids: true,
            assigns_automatic_event_class_ids: true,
            packet_context_field_class: None,
            event_common_context_field_class: None,
            default_clock_class: None,
            event_classes: Vec::new(),
            user_attributes: UserAttributes::new(),
            frozen: false,
            on_destruction: ListenerList::default(),
        })))
    }

    /// The numeric identifier of this stream class, unique within its
    /// trace class.
    pub fn id(&self) -> u64 {
        self.0.borrow().id
    }

    /// The trace class this stream class belongs to, if it has not
    /// been dropped.
    pub fn trace_class(&self) -> Option<TraceClass> {
        self.0.borrow().trace_class.upgrade().map(TraceClass)
    }

    /// This stream class's name, if any.
    pub fn name(&self) -> Option<String> {
        self.0.borrow().name.clone()
    }

    /// Sets this stream class's name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this stream class is frozen.
    pub fn set_name(&self, name: impl Into<String>) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.name = Some(name.into());
        Ok(())
    }

    /// Whether streams of this class carry packets.
    pub fn supports_packets(&self) -> bool {
        self.0.borrow().supports_packets
    }

    /// Declares whether streams of this class carry packets, and
    /// whether packets carry discarded-event and packet sequence
    /// counter snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this stream class is frozen.
    pub fn set_supports_packets(
        &self,
        supports_packets: bool,
        with_discarded_event_counter_snapshot: bool,
        with_packet_counter_snapshot: bool,
    ) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.supports_packets = supports_packets;
        data.packets_have_discarded_event_counter_snapshot = supports_packets && with_discarded_event_counter_snapshot;
        data.packets_have_packet_counter_snapshot = supports_packets && with_packet_counter_snapshot;
        Ok(())
    }

    /// Whether packets of this stream class carry a discarded-event
    /// counter snapshot.
    pub fn packets_have_discarded_event_counter_snapshot(&self) -> bool {
        self.0.borrow().packets_have_discarded_event_counter_snapshot
    }

    /// Whether packets of this stream class carry a packet sequence
    /// counter snapshot.
    pub fn packets_have_packet_counter_snapshot(&self) -> bool {
        self.0.borrow().packets_have_packet_counter_snapshot
    }

    /// Whether discarded-events messages may occur for streams of this
    /// class.
    pub fn supports_discarded_events(&self) -> bool {
        self.0.borrow().supports_discarded_events
    }

    /// Declares whether discarded-events messages may occur, and
    /// whether they carry default clock snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this stream class is frozen.
    pub fn set_supports_discarded_events(&self, supports: bool, with_default_clock_snapshots: bool) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.supports_discarded_events = supports;
        data.discarded_events_have_default_clock_snapshots = supports && with_default_clock_snapshots;
        Ok(())
    }

    /// Whether discarded-events messages carry a default clock
    /// snapshot.
    pub fn discarded_events_have_default_clock_snapshots(&self) -> bool {
        self.0.borrow().discarded_events_have_default_clock_snapshots
    }

    /// Whether discarded-packets messages may occur for streams of
    /// this class.
    pub fn supports_discarded_packets(&self) -> bool {
        self.0.borrow().supports_discarded_packets
    }

    /// Declares whether discarded-packets messages may occur, and
    /// whether they carry default clock snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this stream class is frozen, or
    /// [`Error::InvalidConfiguration`] if `supports` is `true` but this
    /// stream class does not support packets.
    pub fn set_supports_discarded_packets(&self, supports: bool, with_default_clock_snapshots: bool) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        if supports && !data.supports_packets {
            return Err(Error::InvalidConfiguration(
                "discarded-packets messages require packet support",
            ));
        }
        data.supports_discarded_packets = supports;
        data.discarded_packets_have_default_clock_snapshots = supports && with_default_clock_snapshots;
        Ok(())
    }

    /// Whether discarded-packets messages carry a default clock
    /// snapshot.
    pub fn discarded_packets_have_default_clock_snapshots(&self) -> bool {
        self.0.borrow().discarded_packets_have_default_clock_snapshots
    }

    /// Whether new event classes are assigned ids automatically.
    pub fn assigns_automatic_event_class_ids(&self) -> bool {
        self.0.borrow().assigns_automatic_event_class_ids
    }

    /// Sets the packet context field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if frozen, or
    /// [`Error::InvalidConfiguration`] if this stream class does not
    /// support packets.
    pub fn set_packet_context_field_class(&self, mut field_class: FieldClass) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        if !data.supports_packets {
            return Err(Error::InvalidConfiguration("packet context requires packet support"));
        }
        field_class.freeze();
        data.packet_context_field_class = Some(field_class);
        Ok(())
    }

    /// The packet context field class, if any.
    pub fn packet_context_field_class(&self) -> Option<FieldClass> {
        self.0.borrow().packet_context_field_class.clone()
    }

    /// Sets the event common context field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this stream class is frozen.
    pub fn set_event_common_context_field_class(&self, mut field_class: FieldClass) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        field_class.freeze();
        data.event_common_context_field_class = Some(field_class);
        Ok(())
    }

    /// The event common context field class, if any.
    pub fn event_common_context_field_class(&self) -> Option<FieldClass> {
        self.0.borrow().event_common_context_field_class.clone()
    }

    /// Sets this stream class's default clock class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this stream class is frozen.
    pub fn set_default_clock_class(&self, clock_class: ClockClass) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        clock_class.freeze();
        data.default_clock_class = Some(clock_class);
        Ok(())
    }

    /// This stream class's default clock class, if any.
    pub fn default_clock_class(&self) -> Option<ClockClass> {
        self.0.borrow().default_clock_class.clone()
    }

    /// Creates and appends a new event class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this stream class is frozen, or
    /// [`Error::DuplicateId`] if `id` is already used and this stream
    /// class does not assign automatic ids (when it does, `id` is
    /// ignored and the next automatic id is used instead).
    pub fn create_event_class(&self, id: u64) -> Result<EventClass, Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        let id = if data.assigns_automatic_event_class_ids {
            data.event_classes.len() as u64
        } else {
            if data.event_classes.iter().any(|ec| ec.id() == id) {
                return Err(Error::DuplicateId(id));
            }
            id
        };
        let event_class = EventClass::new(&self.0, id);
        data.event_classes.push(event_class.clone());
        Ok(event_class)
    }

    /// The event classes of this stream class, in creation order.
    pub fn event_classes(&self) -> Vec<EventClass> {
        self.0.borrow().event_classes.clone()
    }

    /// Looks up an event class by id.
    pub fn event_class_by_id(&self, id: u64) -> Option<EventClass> {
        self.0.borrow().event_classes.iter().find(|ec| ec.id() == id).cloned()
    }

    /// Registers a listener invoked just before this stream class is
    /// dropped.
    pub fn add_destruction_listener(&self, listener: DestructionListener<StreamClass>) {
        self.0.borrow_mut().on_destruction.push(listener);
    }

    /// Whether this stream class is frozen.
    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub(crate) fn freeze(&self) {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return;
        }
        data.frozen = true;
        if let Some(fc) = &mut data.packet_context_field_class {
            fc.freeze();
        }
        if let Some(fc) = &mut data.event_common_context_field_class {
            fc.freeze();
        }
        if let Some(cc) = &data.default_clock_class {
            cc.freeze();
        }
        for ec in &data.event_classes {
            ec.freeze();
        }
    }
}

struct TraceClassData {
    mip: Mip,
    namespace: Option<String>,
    name: Option<String>,
    uid: Option<String>,
    environment: UserAttributes,
    stream_classes: Vec<StreamClass>,
    assigns_automatic_stream_class_ids: bool,
    user_attributes: UserAttributes,
    frozen: bool,
    on_destruction: ListenerList<TraceClass>,
}

/// A shared handle to a trace class: the top of the schema hierarchy,
/// owning the stream classes (and, through them, the event classes
/// and field classes) that describe every trace built from it.
#[derive(Clone)]
pub struct TraceClass(Rc<RefCell<TraceClassData>>);

impl TraceClass {
    /// Creates an empty trace class at the given MIP version.
    pub fn new(mip: Mip) -> Self {
        Self(Rc::new(RefCell::new(TraceClassData {
            mip,
            namespace: None,
            name: None,
            uid: None,
            environment: UserAttributes::new(),
            stream_classes: Vec::new(),
            assigns_automatic_stream_class_ids: true,
            user_attributes: UserAttributes::new(),
            frozen: false,
            on_destruction: ListenerList::default(),
        })))
    }

    /// The Message Interchange Protocol version this trace class was
    /// built against.
    pub fn mip(&self) -> Mip {
        self.0.borrow().mip
    }

    /// This trace class's environment: arbitrary metadata (hostname,
    /// tracer name and version, domain...) describing the traces built
    /// from it.
    pub fn environment(&self) -> UserAttributes {
        self.0.borrow().environment.clone()
    }

    /// Sets an environment entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this trace class is frozen.
    pub fn set_environment_entry(&self, key: impl Into<String>, value: flowtrace_attrs::AttributeValue) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        let _ = data.environment.set(key, value);
        Ok(())
    }

    /// Creates and appends a new stream class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this trace class is frozen, or
    /// [`Error::DuplicateId`] if `id` is already used and this trace
    /// class does not assign automatic ids.
    pub fn create_stream_class(&self, id: u64) -> Result<StreamClass, Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        let id = if data.assigns_automatic_stream_class_ids {
            data.stream_classes.len() as u64
        } else {
            if data.stream_classes.iter().any(|sc| sc.id() == id) {
                return Err(Error::DuplicateId(id));
            }
            id
        };
        let stream_class = StreamClass::new(&self.0, id);
        data.stream_classes.push(stream_class.clone());
        Ok(stream_class)
    }

    /// The stream classes of this trace class, in creation order.
    pub fn stream_classes(&self) -> Vec<StreamClass> {
        self.0.borrow().stream_classes.clone()
    }

    /// Looks up a stream class by id.
    pub fn stream_class_by_id(&self, id: u64) -> Option<StreamClass> {
        self.0.borrow().stream_classes.iter().find(|sc| sc.id() == id).cloned()
    }

    /// Sets this trace class's `(namespace, name, uid)` identity (MIP
    /// >= 1 only; callers targeting MIP 0 traces should not call this).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this trace class is frozen.
    pub fn set_identity(&self, namespace: Option<String>, name: Option<String>, uid: Option<String>) -> Result<(), Error> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(Error::Frozen);
        }
        data.namespace = namespace;
        data.name = name;
        data.uid = uid;
        Ok(())
    }

    /// This trace class's `(namespace, name, uid)` identity.
    pub fn identity(&self) -> (Option<String>, Option<String>, Option<String>) {
        let data = self.0.borrow();
        (data.namespace.clone(), data.name.clone(), data.uid.clone())
    }

    /// Registers a listener invoked just before this trace class is
    /// dropped. Registering a listener never itself changes this trace
    /// class's strong refcount.
    pub fn add_destruction_listener(&self, listener: DestructionListener<TraceClass>) {
        self.0.borrow_mut().on_destruction.push(listener);
    }

    /// The number of strong references currently held to this trace
    /// class, for destruction-listener postcondition tests.
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Returns `true` iff `self` and `other` are handles to the same
    /// trace class.
    pub fn is_same_instance(&self, other: &TraceClass) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this trace class is frozen.
    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    /// Freezes this trace class and, transitively, every stream class,
    /// event class, field class, and clock class reachable from it.
    pub fn freeze(&self) {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return;
        }
        data.frozen = true;
        for sc in &data.stream_classes {
            sc.freeze();
        }
    }
}

impl Drop for TraceClassData {
    fn drop(&mut self) {
        tracing::trace!(mip = ?self.mip, "dropping trace class");
    }
}
