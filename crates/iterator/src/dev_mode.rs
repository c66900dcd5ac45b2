//! Dev-mode postcondition checks: expensive validation layered on top
//! of a message iterator's output, meant for test and debug builds
//! (see the crate-level `dev-mode` feature). These checks catch a
//! broken iterator implementation; they are not part of the contract a
//! release build pays for on every message.

use flowtrace_message::{Message, StreamProtocolValidator};

use crate::{Advance, Error, MAX_MESSAGES_PER_ADVANCE};

/// Accumulates cross-call state needed to check postconditions that
/// span more than one `next()` call: the per-stream protocol validator
/// and the last default clock snapshot timestamp seen per stream.
#[derive(Default)]
pub struct DevModeChecker {
    protocol: StreamProtocolValidator,
    last_ns_from_origin: Option<i64>,
}

impl DevModeChecker {
    /// Creates a checker with no history yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `advance`, returning [`Error::PostconditionViolated`] if
    /// any invariant is broken.
    ///
    /// Checks applied:
    /// - a single `next()` call never returns more than
    ///   [`MAX_MESSAGES_PER_ADVANCE`] messages;
    /// - default clock snapshot timestamps are non-decreasing across
    ///   the whole sequence of calls;
    /// - every message obeys its stream's per-stream protocol.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PostconditionViolated`] on the first violation
    /// found.
    pub fn check(&mut self, advance: &Advance) -> Result<(), Error> {
        let Advance::Messages(messages) = advance else {
            return Ok(());
        };

        if messages.len() > MAX_MESSAGES_PER_ADVANCE {
            return Err(Error::PostconditionViolated(format!(
                "next() returned {} messages, more than the cap of {MAX_MESSAGES_PER_ADVANCE}",
                messages.len()
            )));
        }

        for message in messages {
            self.check_monotonic_timestamp(message)?;
            self.protocol
                .validate(message)
                .map_err(|e| Error::PostconditionViolated(e.to_string()))?;
        }

        Ok(())
    }

    fn check_monotonic_timestamp(&mut self, message: &Message) -> Result<(), Error> {
        let Some(snapshot) = message.default_clock_snapshot() else {
            return Ok(());
        };
        let ns = snapshot.ns_from_origin();
        if let Some(last) = self.last_ns_from_origin {
            if ns < last {
                return Err(Error::PostconditionViolated(format!(
                    "default clock snapshot went backward: {ns} after {last}"
                )));
            }
        }
        self.last_ns_from_origin = Some(ns);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flowtrace_clock::ClockClass;
    use flowtrace_clock::ClockSnapshot;
    use flowtrace_field_class::Mip;
    use flowtrace_message::Message;
    use flowtrace_trace_ir::{Trace, TraceClass};
    use smallvec::smallvec;

    fn stream() -> flowtrace_trace_ir::Stream {
        let trace_class = TraceClass::new(Mip::AtLeastOne);
        let stream_class = trace_class.create_stream_class(0).unwrap();
        let trace = Trace::new(trace_class);
        trace.create_stream(stream_class, 0).unwrap()
    }

    #[test]
    fn backward_timestamp_is_rejected() {
        let clock = ClockClass::new(1_000_000_000).unwrap();
        let s = stream();
        let mut checker = DevModeChecker::new();

        let first = Advance::Messages(smallvec![Message::StreamBeginning {
            stream: s.clone(),
            default_clock_snapshot: Some(ClockSnapshot::new(clock.clone(), 100).unwrap()),
        }]);
        checker.check(&first).unwrap();

        let second = Advance::Messages(smallvec![Message::StreamEnd {
            stream: s,
            default_clock_snapshot: Some(ClockSnapshot::new(clock, 50).unwrap()),
        }]);
        assert!(matches!(checker.check(&second), Err(Error::PostconditionViolated(_))));
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let mut checker = DevModeChecker::new();
        let messages: smallvec::SmallVec<[Message; 4]> = (0..MAX_MESSAGES_PER_ADVANCE + 1)
            .map(|_| Message::MessageIteratorInactivity {
                clock_snapshot: ClockSnapshot::new(ClockClass::new(1000).unwrap(), 0).unwrap(),
            })
            .collect();
        let advance = Advance::Messages(messages);
        assert!(matches!(checker.check(&advance), Err(Error::PostconditionViolated(_))));
    }
}
