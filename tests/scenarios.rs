//! End-to-end scenarios exercising the IR model and the muxer together.

use flowtrace::clock::{ClockClass, ClockIdentity, ClockOrigin, ClockSnapshot};
use flowtrace::field_class::{FieldClass, Mip};
use flowtrace::iterator::{Advance, Error as IterError, MessageIterator};
use flowtrace::message::Message;
use flowtrace::muxer::{Error as MuxerError, Muxer};
use flowtrace::ranges::{IntegerRange, RangeSet};
use flowtrace::trace_ir::{Stream, Trace, TraceClass};

use std::collections::VecDeque;

fn unix_epoch_stream(frequency: u64) -> (Stream, ClockClass) {
    let clock = ClockClass::new(frequency).unwrap();
    clock.set_origin(ClockOrigin::UnixEpoch).unwrap();
    let trace_class = TraceClass::new(Mip::AtLeastOne);
    let stream_class = trace_class.create_stream_class(0).unwrap();
    stream_class.set_default_clock_class(clock.clone()).unwrap();
    let trace = Trace::new(trace_class);
    let stream = trace.create_stream(stream_class, 0).unwrap();
    (stream, clock)
}

/// A scripted source that replays a fixed `stream-begin, event, stream-end`
/// triple at the given timestamp, then ends.
struct ScriptedSource {
    stream: Stream,
    clock: ClockClass,
    event_class: flowtrace::trace_ir::EventClass,
    ts_cycles: u64,
    step: u8,
}

impl MessageIterator for ScriptedSource {
    fn next(&mut self) -> Result<Advance, IterError> {
        let snapshot = ClockSnapshot::new(self.clock.clone(), self.ts_cycles).unwrap();
        let message = match self.step {
            0 => Message::StreamBeginning { stream: self.stream.clone(), default_clock_snapshot: Some(snapshot) },
            1 => Message::Event {
                event_class: self.event_class.clone(),
                stream: self.stream.clone(),
                packet: None,
                default_clock_snapshot: Some(snapshot),
            },
            2 => Message::StreamEnd { stream: self.stream.clone(), default_clock_snapshot: Some(snapshot) },
            _ => return Ok(Advance::End),
        };
        self.step += 1;
        Ok(Advance::Messages(smallvec::smallvec![message]))
    }
}

#[test]
fn s1_two_sources_same_timestamp_merge_deterministically() {
    let (stream_a, clock_a) = unix_epoch_stream(1_000_000_000);
    let (stream_b, clock_b) = unix_epoch_stream(1_000_000_000);
    let event_class_a = stream_a.stream_class().create_event_class(0).unwrap();
    let event_class_b = stream_b.stream_class().create_event_class(0).unwrap();

    let a = ScriptedSource { stream: stream_a, clock: clock_a, event_class: event_class_a, ts_cycles: 5, step: 0 };
    let b = ScriptedSource { stream: stream_b, clock: clock_b, event_class: event_class_b, ts_cycles: 5, step: 0 };

    let mut muxer = Muxer::new(vec![Box::new(a), Box::new(b)]);
    let mut kinds = Vec::new();
    loop {
        match muxer.next().unwrap() {
            Advance::End => break,
            Advance::Messages(msgs) => kinds.extend(msgs.iter().map(|m| m.kind_name())),
        }
    }

    assert_eq!(kinds.len(), 6);
    // Equal timestamps tie-break by upstream index: every message from
    // upstream 0 (A) precedes its upstream-1 (B) counterpart.
    assert_eq!(kinds, vec!["stream-beginning", "stream-beginning", "event", "event", "stream-end", "stream-end"]);
}

struct SingleMessage {
    message: Option<Message>,
}

impl MessageIterator for SingleMessage {
    fn next(&mut self) -> Result<Advance, IterError> {
        match self.message.take() {
            Some(m) => Ok(Advance::Messages(smallvec::smallvec![m])),
            None => Ok(Advance::End),
        }
    }
}

#[test]
fn s2_mismatched_unknown_origin_uuids_are_rejected() {
    let trace_class = TraceClass::new(Mip::Zero);
    let clock_1 = ClockClass::new(1_000_000_000).unwrap();
    clock_1.set_identity(Some(ClockIdentity::Uuid([1; 16]))).unwrap();
    let clock_2 = ClockClass::new(1_000_000_000).unwrap();
    clock_2.set_identity(Some(ClockIdentity::Uuid([2; 16]))).unwrap();

    let stream_class_a = trace_class.create_stream_class(0).unwrap();
    stream_class_a.set_default_clock_class(clock_1.clone()).unwrap();
    let stream_class_b = trace_class.create_stream_class(1).unwrap();
    stream_class_b.set_default_clock_class(clock_2.clone()).unwrap();
    let trace = Trace::new(trace_class);
    let stream_a = trace.create_stream(stream_class_a, 0).unwrap();
    let stream_b = trace.create_stream(stream_class_b, 1).unwrap();

    let a = SingleMessage {
        message: Some(Message::StreamBeginning {
            stream: stream_a,
            default_clock_snapshot: Some(ClockSnapshot::new(clock_1, 10).unwrap()),
        }),
    };
    let b = SingleMessage {
        message: Some(Message::StreamBeginning {
            stream: stream_b,
            default_clock_snapshot: Some(ClockSnapshot::new(clock_2, 10).unwrap()),
        }),
    };

    let mut muxer = Muxer::new(vec![Box::new(a), Box::new(b)]);
    // The first pull establishes the reference clock; the second upstream's
    // incompatible UUID is only detected once both are loaded into the heap.
    let err = loop {
        match muxer.next() {
            Ok(Advance::Messages(_)) => continue,
            Ok(Advance::End) => panic!("expected a clock-correlation error before End"),
            Err(e) => break e,
        }
    };
    assert_eq!(
        err,
        MuxerError::ClockCorrelation(flowtrace::message::ClockCorrelationError::ExpectingUnknownWithIdGotOtherId)
    );
}

struct InactivityThenEvent {
    clock: ClockClass,
    sent_inactivity: bool,
}

impl MessageIterator for InactivityThenEvent {
    fn next(&mut self) -> Result<Advance, IterError> {
        if !self.sent_inactivity {
            self.sent_inactivity = true;
            let snapshot = ClockSnapshot::new(self.clock.clone(), 100).unwrap();
            return Ok(Advance::Messages(smallvec::smallvec![Message::MessageIteratorInactivity {
                clock_snapshot: snapshot
            }]));
        }
        Ok(Advance::End)
    }
}

struct TimedPeer {
    stream: Stream,
    clock: ClockClass,
    event_class: flowtrace::trace_ir::EventClass,
    done: bool,
}

impl MessageIterator for TimedPeer {
    fn next(&mut self) -> Result<Advance, IterError> {
        if self.done {
            return Ok(Advance::End);
        }
        self.done = true;
        let snapshot = ClockSnapshot::new(self.clock.clone(), 150).unwrap();
        Ok(Advance::Messages(smallvec::smallvec![Message::Event {
            event_class: self.event_class.clone(),
            stream: self.stream.clone(),
            packet: None,
            default_clock_snapshot: Some(snapshot),
        }]))
    }
}

#[test]
fn s3_inactivity_message_is_delivered_before_a_later_timed_peer() {
    let (_stream_a, clock_a) = unix_epoch_stream(1_000_000_000);
    let (stream_b, clock_b) = unix_epoch_stream(1_000_000_000);
    let event_class_b = stream_b.stream_class().create_event_class(0).unwrap();

    let a = InactivityThenEvent { clock: clock_a, sent_inactivity: false };
    let b = TimedPeer { stream: stream_b, clock: clock_b, event_class: event_class_b, done: false };

    let mut muxer = Muxer::new(vec![Box::new(a), Box::new(b)]);
    let mut order = Vec::new();
    loop {
        match muxer.next().unwrap() {
            Advance::End => break,
            Advance::Messages(msgs) => {
                for m in msgs {
                    order.push((m.kind_name(), m.default_clock_snapshot().unwrap().ns_from_origin()));
                }
            }
        }
    }
    assert_eq!(order, vec![("message-iterator-inactivity", 100), ("event", 150)]);
}

#[test]
fn s4_overlapping_variant_options_are_rejected_and_first_option_survives() {
    let selector_link = flowtrace::field_class::Link::unresolved_path(flowtrace::field_class::FieldClassTag::fresh());
    let mut variant = FieldClass::new_variant_with_unsigned_integer_selector(selector_link);

    let x_ranges = RangeSet::from_ranges([IntegerRange::unsigned(1, 3).unwrap()]).unwrap();
    variant
        .append_selector_option(Mip::AtLeastOne, Some("x".into()), FieldClass::new_bool(), x_ranges)
        .unwrap();

    let y_ranges = RangeSet::from_ranges([IntegerRange::unsigned(3, 5).unwrap()]).unwrap();
    let result = variant.append_selector_option(Mip::AtLeastOne, Some("y".into()), FieldClass::new_bool(), y_ranges);

    assert!(matches!(result, Err(flowtrace::field_class::Error::OverlappingRanges { .. })));
}

#[test]
fn s5_cycle_to_ns_conversion_matches_the_worked_example() {
    let clock = ClockClass::new(1000).unwrap();
    clock.set_offset(-10, 500).unwrap();
    let ns = clock.cycles_to_ns_from_origin(2000).unwrap();
    assert_eq!(ns, -7_500_000_000);
}

struct ForwardSeekableOnly {
    clock: ClockClass,
    stream: Stream,
    event_class: flowtrace::trace_ir::EventClass,
    cycles: VecDeque<u64>,
    all_cycles: Vec<u64>,
}

impl MessageIterator for ForwardSeekableOnly {
    fn next(&mut self) -> Result<Advance, IterError> {
        let Some(cycles) = self.cycles.pop_front() else {
            return Ok(Advance::End);
        };
        let snapshot = ClockSnapshot::new(self.clock.clone(), cycles).unwrap();
        Ok(Advance::Messages(smallvec::smallvec![Message::Event {
            event_class: self.event_class.clone(),
            stream: self.stream.clone(),
            packet: None,
            default_clock_snapshot: Some(snapshot),
        }]))
    }

    fn can_seek_beginning(&self) -> bool {
        true
    }

    fn seek_beginning(&mut self) -> Result<(), IterError> {
        self.cycles = self.all_cycles.clone().into();
        Ok(())
    }
}

#[test]
fn s6_auto_seek_stops_at_first_message_reaching_the_target() {
    let (stream, clock) = unix_epoch_stream(1_000_000_000);
    let event_class = stream.stream_class().create_event_class(0).unwrap();
    let all_cycles = vec![50, 100, 200, 300];

    let mut source = ForwardSeekableOnly { clock, stream, event_class, cycles: all_cycles.clone().into(), all_cycles };

    flowtrace::iterator::auto_seek_ns_from_origin(&mut source, 200).unwrap();
    // The first surviving message is the one at or past ns=200; everything
    // strictly before the seek target has been discarded.
    let next = source.next().unwrap();
    match next {
        Advance::Messages(msgs) => {
            let ts = msgs[0].default_clock_snapshot().unwrap().ns_from_origin();
            assert_eq!(ts, 300);
        }
        Advance::End => panic!("expected a message"),
    }
}
