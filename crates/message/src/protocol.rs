//! The per-stream message-sequence validator: checks that the messages
//! seen for a given stream follow the fixed automaton every stream
//! must obey, independent of which message iterator produced them.

use std::collections::HashMap;

use flowtrace_trace_ir::Stream;

use crate::message::{Message, Packet};
use crate::Error;

/// Where a single stream currently sits in its message-sequence
/// automaton.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PerStreamState {
    /// No message seen yet for this stream.
    Initial,
    /// A stream-beginning message has been seen.
    StreamBegan,
    /// A packet-beginning message has been seen; events may occur.
    PacketBegan,
    /// A packet-end message has been seen; another packet may begin,
    /// or a discarded-events/discarded-packets report may follow.
    AfterPacketEnd,
    /// A discarded-events message has been seen.
    AfterDiscardedEvents,
    /// A discarded-packets message has been seen.
    AfterDiscardedPackets,
    /// A stream-end message has been seen; no further messages for
    /// this stream are valid.
    StreamEnded,
}

impl Default for PerStreamState {
    fn default() -> Self {
        PerStreamState::Initial
    }
}

#[derive(Default)]
struct StreamRecord {
    state: PerStreamState,
    /// The packet currently open for this stream, if any. Tracked so
    /// that an event or packet-end message can be checked against the
    /// packet actually opened by the most recent packet-beginning
    /// message, rather than trusting the message's own claim.
    cur_packet: Option<Packet>,
}

/// Validates that the sequence of messages observed for each stream
/// obeys the per-stream protocol, independent of interleaving with
/// other streams.
#[derive(Default)]
pub struct StreamProtocolValidator {
    states: HashMap<Stream, StreamRecord>,
}

impl StreamProtocolValidator {
    /// Creates an empty validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state recorded for `stream`, or
    /// [`PerStreamState::Initial`] if nothing has been seen yet.
    pub fn state_of(&self, stream: &Stream) -> PerStreamState {
        self.states.get(stream).map(|r| r.state).unwrap_or_default()
    }

    /// Validates `message` against the state recorded for its stream,
    /// advancing that state on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] if `message` cannot legally
    /// follow the stream's current state, or
    /// [`Error::PacketMismatch`] if an event or packet-end message
    /// refers to a packet other than the one currently open for its
    /// stream.
    pub fn validate(&mut self, message: &Message) -> Result<(), Error> {
        let Some(stream) = message.stream() else {
            // Message-iterator-inactivity carries no stream and is not
            // subject to the per-stream protocol.
            return Ok(());
        };

        let record = self.states.entry(stream.clone()).or_default();

        if let Message::Event { packet: Some(got), .. } = message {
            if let Some(cur) = &record.cur_packet {
                if !cur.is_same_instance(got) {
                    return Err(Error::PacketMismatch { message_kind: message.kind_name() });
                }
            }
        }
        if let Message::PacketEnd { packet: got, .. } = message {
            if let Some(cur) = &record.cur_packet {
                if !cur.is_same_instance(got) {
                    return Err(Error::PacketMismatch { message_kind: message.kind_name() });
                }
            }
        }

        let current = record.state;
        let stream_class = stream.stream_class();
        let supports_packets = stream_class.supports_packets();
        let supports_discarded_events = stream_class.supports_discarded_events();
        let supports_discarded_packets = stream_class.supports_discarded_packets();

        let next = match (current, message) {
            (PerStreamState::Initial, Message::StreamBeginning { .. }) => PerStreamState::StreamBegan,

            (PerStreamState::StreamBegan, Message::PacketBeginning { .. }) if supports_packets => {
                PerStreamState::PacketBegan
            }
            (PerStreamState::StreamBegan, Message::Event { .. }) if !supports_packets => PerStreamState::StreamBegan,
            (PerStreamState::StreamBegan, Message::DiscardedEvents { .. }) if supports_discarded_events => {
                PerStreamState::AfterDiscardedEvents
            }
            (PerStreamState::StreamBegan, Message::DiscardedPackets { .. }) if supports_discarded_packets => {
                PerStreamState::AfterDiscardedPackets
            }
            (PerStreamState::StreamBegan, Message::StreamEnd { .. }) => PerStreamState::StreamEnded,

            (PerStreamState::PacketBegan, Message::Event { .. }) => PerStreamState::PacketBegan,
            (PerStreamState::PacketBegan, Message::DiscardedEvents { .. }) if supports_discarded_events => {
                // A discarded-events report mid-packet doesn't close the
                // packet: further events and the eventual packet-end are
                // still legal from here.
                PerStreamState::PacketBegan
            }
            (PerStreamState::PacketBegan, Message::PacketEnd { .. }) => PerStreamState::AfterPacketEnd,

            (PerStreamState::AfterPacketEnd, Message::PacketBeginning { .. }) => PerStreamState::PacketBegan,
            (PerStreamState::AfterPacketEnd, Message::DiscardedEvents { .. }) if supports_discarded_events => {
                PerStreamState::AfterDiscardedEvents
            }
            (PerStreamState::AfterPacketEnd, Message::DiscardedPackets { .. }) if supports_discarded_packets => {
                PerStreamState::AfterDiscardedPackets
            }
            (PerStreamState::AfterPacketEnd, Message::StreamEnd { .. }) => PerStreamState::StreamEnded,

            // AFTER_DISCARDED_*: behaves like the state that led to it.
            (PerStreamState::AfterDiscardedEvents, Message::Event { .. }) if !supports_packets => {
                PerStreamState::AfterDiscardedEvents
            }
            (PerStreamState::AfterDiscardedEvents, Message::PacketBeginning { .. }) if supports_packets => {
                PerStreamState::PacketBegan
            }
            (PerStreamState::AfterDiscardedEvents, Message::DiscardedPackets { .. }) if supports_discarded_packets => {
                PerStreamState::AfterDiscardedPackets
            }
            (PerStreamState::AfterDiscardedEvents, Message::StreamEnd { .. }) => PerStreamState::StreamEnded,

            (PerStreamState::AfterDiscardedPackets, Message::PacketBeginning { .. }) => PerStreamState::PacketBegan,
            (PerStreamState::AfterDiscardedPackets, Message::DiscardedEvents { .. }) if supports_discarded_events => {
                PerStreamState::AfterDiscardedEvents
            }
            (PerStreamState::AfterDiscardedPackets, Message::StreamEnd { .. }) => PerStreamState::StreamEnded,

            (state, message) => {
                return Err(Error::ProtocolViolation {
                    state: state_name(state),
                    message_kind: message.kind_name(),
                })
            }
        };

        record.state = next;
        match message {
            Message::PacketBeginning { packet, .. } => record.cur_packet = Some(packet.clone()),
            Message::PacketEnd { .. } => record.cur_packet = None,
            _ => {}
        }
        Ok(())
    }
}

fn state_name(state: PerStreamState) -> &'static str {
    match state {
        PerStreamState::Initial => "initial",
        PerStreamState::StreamBegan => "stream-began",
        PerStreamState::PacketBegan => "packet-began",
        PerStreamState::AfterPacketEnd => "after-packet-end",
        PerStreamState::AfterDiscardedEvents => "after-discarded-events",
        PerStreamState::AfterDiscardedPackets => "after-discarded-packets",
        PerStreamState::StreamEnded => "stream-ended",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flowtrace_field_class::Mip;
    use flowtrace_trace_ir::{Trace, TraceClass};

    fn fresh_stream(supports_packets: bool) -> Stream {
        let trace_class = TraceClass::new(Mip::AtLeastOne);
        let stream_class = trace_class.create_stream_class(0).unwrap();
        if supports_packets {
            stream_class.set_supports_packets(true, false, false).unwrap();
        }
        let trace = Trace::new(trace_class);
        trace.create_stream(stream_class, 0).unwrap()
    }

    #[test]
    fn event_before_stream_beginning_is_rejected() {
        let stream = fresh_stream(false);
        let stream_class = stream.stream_class();
        let event_class = stream_class.create_event_class(0).unwrap();
        let mut validator = StreamProtocolValidator::new();

        let err = validator
            .validate(&Message::Event {
                event_class,
                stream,
                packet: None,
                default_clock_snapshot: None,
            })
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation { state: "initial", .. }));
    }

    #[test]
    fn well_formed_sequence_without_packets_is_accepted() {
        let stream = fresh_stream(false);
        let event_class = stream.stream_class().create_event_class(0).unwrap();
        let mut validator = StreamProtocolValidator::new();

        validator
            .validate(&Message::StreamBeginning { stream: stream.clone(), default_clock_snapshot: None })
            .unwrap();
        validator
            .validate(&Message::Event {
                event_class,
                stream: stream.clone(),
                packet: None,
                default_clock_snapshot: None,
            })
            .unwrap();
        validator
            .validate(&Message::StreamEnd { stream: stream.clone(), default_clock_snapshot: None })
            .unwrap();

        assert_eq!(validator.state_of(&stream), PerStreamState::StreamEnded);
    }

    #[test]
    fn packet_beginning_without_packet_support_is_rejected() {
        let stream = fresh_stream(false);
        let mut validator = StreamProtocolValidator::new();
        validator
            .validate(&Message::StreamBeginning { stream: stream.clone(), default_clock_snapshot: None })
            .unwrap();

        let packet = Packet::new(stream, 0);
        let err = validator
            .validate(&Message::PacketBeginning { packet, default_clock_snapshot: None })
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation { state: "stream-began", .. }));
    }

    #[test]
    fn message_after_stream_end_is_rejected() {
        let stream = fresh_stream(false);
        let mut validator = StreamProtocolValidator::new();
        validator
            .validate(&Message::StreamBeginning { stream: stream.clone(), default_clock_snapshot: None })
            .unwrap();
        validator
            .validate(&Message::StreamEnd { stream: stream.clone(), default_clock_snapshot: None })
            .unwrap();

        let err = validator
            .validate(&Message::StreamBeginning { stream, default_clock_snapshot: None })
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation { state: "stream-ended", .. }));
    }

    #[test]
    fn discarded_events_mid_packet_does_not_close_it() {
        let stream = fresh_stream(true);
        let stream_class = stream.stream_class();
        stream_class.set_supports_discarded_events(true, false).unwrap();
        let event_class = stream_class.create_event_class(0).unwrap();
        let mut validator = StreamProtocolValidator::new();

        validator
            .validate(&Message::StreamBeginning { stream: stream.clone(), default_clock_snapshot: None })
            .unwrap();
        let packet = Packet::new(stream.clone(), 0);
        validator
            .validate(&Message::PacketBeginning { packet: packet.clone(), default_clock_snapshot: None })
            .unwrap();
        validator
            .validate(&Message::DiscardedEvents {
                stream: stream.clone(),
                count: None,
                beginning_clock_snapshot: None,
                end_clock_snapshot: None,
            })
            .unwrap();
        validator
            .validate(&Message::Event {
                event_class,
                stream: stream.clone(),
                packet: Some(packet.clone()),
                default_clock_snapshot: None,
            })
            .unwrap();
        validator
            .validate(&Message::PacketEnd { packet, default_clock_snapshot: None })
            .unwrap();
        assert_eq!(validator.state_of(&stream), PerStreamState::AfterPacketEnd);
    }

    #[test]
    fn discarded_events_without_support_is_rejected() {
        let stream = fresh_stream(false);
        let mut validator = StreamProtocolValidator::new();
        validator
            .validate(&Message::StreamBeginning { stream: stream.clone(), default_clock_snapshot: None })
            .unwrap();
        let err = validator
            .validate(&Message::DiscardedEvents {
                stream,
                count: None,
                beginning_clock_snapshot: None,
                end_clock_snapshot: None,
            })
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation { state: "stream-began", .. }));
    }

    #[test]
    fn event_from_a_different_packet_is_rejected() {
        let stream = fresh_stream(true);
        let event_class = stream.stream_class().create_event_class(0).unwrap();
        let mut validator = StreamProtocolValidator::new();

        validator
            .validate(&Message::StreamBeginning { stream: stream.clone(), default_clock_snapshot: None })
            .unwrap();
        let opened = Packet::new(stream.clone(), 0);
        validator
            .validate(&Message::PacketBeginning { packet: opened, default_clock_snapshot: None })
            .unwrap();

        let other = Packet::new(stream.clone(), 1);
        let err = validator
            .validate(&Message::Event {
                event_class,
                stream,
                packet: Some(other),
                default_clock_snapshot: None,
            })
            .unwrap_err();
        assert!(matches!(err, Error::PacketMismatch { .. }));
    }
}
