//! Auto-seek: synthesizing `seek_ns_from_origin` out of
//! `seek_beginning` plus ordinary advancing, for iterators that only
//! implement the former.

use crate::{Advance, Error, MessageIterator};

/// Seeks `iterator` to `ns_from_origin` by seeking to the beginning and
/// then discarding messages until one reaches or passes that point in
/// time.
///
/// Used as a fallback by components (such as a muxer) that need to
/// seek every upstream to a common point in time but whose upstream
/// only supports seeking to the beginning of its stream(s). Messages
/// with no default clock snapshot are always passed through, since
/// they carry no timestamp to compare against `ns_from_origin`.
///
/// # Errors
///
/// Returns [`Error::Again`] if either the initial `seek_beginning` or a
/// subsequent `next()` call is not ready yet — the caller is expected
/// to retry the whole operation from scratch, since this function
/// holds no state across calls.
pub fn auto_seek_ns_from_origin(iterator: &mut dyn MessageIterator, ns_from_origin: i64) -> Result<(), Error> {
    if !iterator.can_seek_beginning() {
        return Err(Error::SeekingNotSupported);
    }
    iterator.seek_beginning()?;

    loop {
        match iterator.next()? {
            Advance::End => return Ok(()),
            Advance::Messages(messages) => {
                let reached = messages
                    .iter()
                    .filter_map(|m| m.default_clock_snapshot())
                    .any(|snapshot| snapshot.ns_from_origin() >= ns_from_origin);
                if reached {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flowtrace_clock::{ClockClass, ClockSnapshot};
    use flowtrace_field_class::Mip;
    use flowtrace_message::Message;
    use flowtrace_trace_ir::{Trace, TraceClass};
    use smallvec::smallvec;

    struct Scripted {
        clock: ClockClass,
        stream: flowtrace_trace_ir::Stream,
        cycles: Vec<u64>,
        position: usize,
        seeked: bool,
    }

    impl MessageIterator for Scripted {
        fn next(&mut self) -> Result<Advance, Error> {
            if self.position >= self.cycles.len() {
                return Ok(Advance::End);
            }
            let cycles = self.cycles[self.position];
            self.position += 1;
            let snapshot = ClockSnapshot::new(self.clock.clone(), cycles).unwrap();
            Ok(Advance::Messages(smallvec![Message::StreamEnd {
                stream: self.stream.clone(),
                default_clock_snapshot: Some(snapshot),
            }]))
        }

        fn can_seek_beginning(&self) -> bool {
            true
        }

        fn seek_beginning(&mut self) -> Result<(), Error> {
            self.position = 0;
            self.seeked = true;
            Ok(())
        }
    }

    #[test]
    fn stops_at_first_message_reaching_the_target() {
        let clock = ClockClass::new(1_000_000_000).unwrap();
        let trace_class = TraceClass::new(Mip::AtLeastOne);
        let stream_class = trace_class.create_stream_class(0).unwrap();
        let trace = Trace::new(trace_class);
        let stream = trace.create_stream(stream_class, 0).unwrap();

        let mut iter = Scripted { clock, stream, cycles: vec![1, 5, 10, 20], position: 3, seeked: false };
        auto_seek_ns_from_origin(&mut iter, 5).unwrap();
        assert!(iter.seeked);
        assert_eq!(iter.position, 2);
    }

    #[test]
    fn unsupported_seek_is_reported() {
        struct NoSeek;
        impl MessageIterator for NoSeek {
            fn next(&mut self) -> Result<Advance, Error> {
                Ok(Advance::End)
            }
        }
        let mut iter = NoSeek;
        assert_eq!(auto_seek_ns_from_origin(&mut iter, 0), Err(Error::SeekingNotSupported));
    }
}
