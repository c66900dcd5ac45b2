//! The eight message kinds moved between message iterators, and the
//! lightweight packet handle a few of them carry.
//!
//! Packets here are structural handles only — a stream plus a sequence
//! number — with no attached field *values*. This crate (like
//! [`flowtrace_field_class`]) describes the shape of data, not the data
//! itself: an actual value system is out of scope.

use std::cell::Cell;
use std::rc::Rc;

use flowtrace_clock::ClockSnapshot;
use flowtrace_trace_ir::{EventClass, Stream};

struct PacketData {
    stream: Stream,
    sequence_number: u64,
}

/// A shared handle to one packet within a stream.
#[derive(Clone)]
pub struct Packet(Rc<PacketData>);

impl Packet {
    /// Creates a new packet handle for `stream` at `sequence_number`.
    pub fn new(stream: Stream, sequence_number: u64) -> Self {
        Self(Rc::new(PacketData { stream, sequence_number }))
    }

    /// The stream this packet belongs to.
    pub fn stream(&self) -> Stream {
        self.0.stream.clone()
    }

    /// This packet's sequence number within its stream.
    pub fn sequence_number(&self) -> u64 {
        self.0.sequence_number
    }

    /// Returns `true` iff `self` and `other` are handles to the same
    /// packet.
    pub fn is_same_instance(&self, other: &Packet) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// One of the eight kinds of message a message iterator can emit.
#[derive(Clone)]
pub enum Message {
    /// The first message of a stream.
    StreamBeginning {
        /// The stream beginning.
        stream: Stream,
        /// The default clock snapshot at the start of the stream, if
        /// the stream's default clock class requires one.
        default_clock_snapshot: Option<ClockSnapshot>,
    },
    /// The last message of a stream.
    StreamEnd {
        /// The stream ending.
        stream: Stream,
        /// The default clock snapshot at the end of the stream, if
        /// applicable.
        default_clock_snapshot: Option<ClockSnapshot>,
    },
    /// The first message of a packet.
    PacketBeginning {
        /// The packet beginning.
        packet: Packet,
        /// The default clock snapshot at the start of the packet, if
        /// applicable.
        default_clock_snapshot: Option<ClockSnapshot>,
    },
    /// The last message of a packet.
    PacketEnd {
        /// The packet ending.
        packet: Packet,
        /// The default clock snapshot at the end of the packet, if
        /// applicable.
        default_clock_snapshot: Option<ClockSnapshot>,
    },
    /// One event.
    Event {
        /// The event class this event was produced from.
        event_class: EventClass,
        /// The stream the event occurred on.
        stream: Stream,
        /// The packet the event occurred within, if the stream
        /// supports packets.
        packet: Option<Packet>,
        /// The event's default clock snapshot, if the stream has a
        /// default clock class.
        default_clock_snapshot: Option<ClockSnapshot>,
    },
    /// A report of events known to have been discarded.
    DiscardedEvents {
        /// The stream events were discarded from.
        stream: Stream,
        /// The number of discarded events, if known exactly.
        count: Option<u64>,
        /// The clock snapshot at the start of the discarded range.
        beginning_clock_snapshot: Option<ClockSnapshot>,
        /// The clock snapshot at the end of the discarded range.
        end_clock_snapshot: Option<ClockSnapshot>,
    },
    /// A report of packets known to have been discarded.
    DiscardedPackets {
        /// The stream packets were discarded from.
        stream: Stream,
        /// The number of discarded packets, if known exactly.
        count: Option<u64>,
        /// The clock snapshot at the start of the discarded range.
        beginning_clock_snapshot: Option<ClockSnapshot>,
        /// The clock snapshot at the end of the discarded range.
        end_clock_snapshot: Option<ClockSnapshot>,
    },
    /// Emitted by a message iterator that has no message to return
    /// right now but wants to report how far its internal clock has
    /// advanced, so a muxing consumer doesn't stall waiting for it.
    MessageIteratorInactivity {
        /// How far this iterator's clock has advanced.
        clock_snapshot: ClockSnapshot,
    },
}

impl Message {
    /// The stream this message concerns, if any (every message but
    /// [`Message::MessageIteratorInactivity`] has one).
    pub fn stream(&self) -> Option<Stream> {
        match self {
            Message::StreamBeginning { stream, .. }
            | Message::StreamEnd { stream, .. }
            | Message::Event { stream, .. }
            | Message::DiscardedEvents { stream, .. }
            | Message::DiscardedPackets { stream, .. } => Some(stream.clone()),
            Message::PacketBeginning { packet, .. } | Message::PacketEnd { packet, .. } => Some(packet.stream()),
            Message::MessageIteratorInactivity { .. } => None,
        }
    }

    /// This message's default clock snapshot, if any.
    pub fn default_clock_snapshot(&self) -> Option<ClockSnapshot> {
        match self {
            Message::StreamBeginning { default_clock_snapshot, .. }
            | Message::StreamEnd { default_clock_snapshot, .. }
            | Message::PacketBeginning { default_clock_snapshot, .. }
            | Message::PacketEnd { default_clock_snapshot, .. }
            | Message::Event { default_clock_snapshot, .. } => default_clock_snapshot.clone(),
            Message::DiscardedEvents { end_clock_snapshot, .. } | Message::DiscardedPackets { end_clock_snapshot, .. } => {
                end_clock_snapshot.clone()
            }
            Message::MessageIteratorInactivity { clock_snapshot } => Some(clock_snapshot.clone()),
        }
    }

    /// A short name for this message's kind, for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Message::StreamBeginning { .. } => "stream-beginning",
            Message::StreamEnd { .. } => "stream-end",
            Message::PacketBeginning { .. } => "packet-beginning",
            Message::PacketEnd { .. } => "packet-end",
            Message::Event { .. } => "event",
            Message::DiscardedEvents { .. } => "discarded-events",
            Message::DiscardedPackets { .. } => "discarded-packets",
            Message::MessageIteratorInactivity { .. } => "message-iterator-inactivity",
        }
    }
}

thread_local! {
    static NEXT_SEQ: Cell<u64> = const { Cell::new(0) };
}

/// Allocates a monotonically increasing sequence number, for tests and
/// callers that don't otherwise track packet ordering.
pub fn next_sequence_number() -> u64 {
    NEXT_SEQ.with(|c| {
        let v = c.get();
        c.set(v + 1);
        v
    })
}
