//! Byte-level bookkeeping for the tag scan.
//!
//! `serde_json` does the parsing. [`TrailReader`] sits between it and the
//! upload and feeds every byte it hands over through a [`ByteTrail`], which
//! tracks what the parser does not report:
//!
//! - container nesting, capped at [`MAX_NESTING`] (skipped values are
//!   otherwise unbounded),
//! - whether input stopped between tokens or inside one,
//! - the raw bytes of one value, up to a limit, so `meta` can be decoded
//!   after the fact without aborting the scan when it does not fit.
use std::cell::RefCell;
use std::io::{self, BufRead, Read};

/// Containers nested deeper than this are rejected.
pub(crate) const MAX_NESTING: usize = 10_000;

const TAIL_LEN: usize = 5;

#[derive(Debug)]
struct Recording {
    buf: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

/// Bytes captured between [`ByteTrail::start_recording`] and
/// [`ByteTrail::finish_recording`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Recorded {
    Bytes(Vec<u8>),
    /// The value went past the limit; nothing was kept.
    Oversized,
}

#[derive(Debug, Default)]
pub(crate) struct ByteTrail {
    in_string: bool,
    escaped: bool,
    depth: usize,
    nesting_exceeded: bool,
    /// Last significant bytes outside strings, closing quotes included.
    tail: [u8; TAIL_LEN],
    tail_len: usize,
    recording: Option<Recording>,
}

impl ByteTrail {
    pub(crate) fn start_recording(&mut self, limit: usize) {
        self.recording = Some(Recording {
            buf: Vec::new(),
            limit,
            overflowed: false,
        });
    }

    pub(crate) fn finish_recording(&mut self) -> Option<Recorded> {
        self.recording.take().map(|recording| {
            if recording.overflowed {
                Recorded::Oversized
            } else {
                Recorded::Bytes(recording.buf)
            }
        })
    }

    /// A recording is open and has seen more than whitespace.
    pub(crate) fn inside_recorded_value(&self) -> bool {
        self.recording.as_ref().is_some_and(|recording| {
            recording.overflowed
                || recording
                    .buf
                    .iter()
                    .any(|byte| !byte.is_ascii_whitespace())
        })
    }

    pub(crate) fn nesting_exceeded(&self) -> bool {
        self.nesting_exceeded
    }

    /// Whether the bytes seen so far stop on a token boundary.
    ///
    /// A number that runs into the end of input counts as complete; a
    /// literal, string or exponent that is cut short does not.
    pub(crate) fn ended_cleanly(&self) -> bool {
        if self.in_string {
            return false;
        }
        let tail = &self.tail[..self.tail_len];
        match tail.last() {
            None => true,
            Some(b'{' | b'[' | b',' | b':' | b'"' | b'}' | b']') => true,
            Some(byte) if byte.is_ascii_digit() => true,
            Some(_) => {
                tail.ends_with(b"true") || tail.ends_with(b"false") || tail.ends_with(b"null")
            }
        }
    }

    pub(crate) fn observe(&mut self, byte: u8) -> io::Result<()> {
        if let Some(recording) = self.recording.as_mut().filter(|r| !r.overflowed) {
            if recording.buf.len() < recording.limit {
                recording.buf.push(byte);
            } else {
                recording.overflowed = true;
                recording.buf = Vec::new();
            }
        }

        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
                self.push_tail(byte);
            }
            return Ok(());
        }

        match byte {
            b'"' => self.in_string = true,
            b' ' | b'\t' | b'\n' | b'\r' => {}
            b'{' | b'[' => {
                self.depth += 1;
                self.push_tail(byte);
                if self.depth > MAX_NESTING {
                    self.nesting_exceeded = true;
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("exceeded max nesting depth of {MAX_NESTING}"),
                    ));
                }
            }
            b'}' | b']' => {
                self.depth = self.depth.saturating_sub(1);
                self.push_tail(byte);
            }
            _ => self.push_tail(byte),
        }
        Ok(())
    }

    fn push_tail(&mut self, byte: u8) {
        if self.tail_len == TAIL_LEN {
            self.tail.copy_within(1.., 0);
            self.tail[TAIL_LEN - 1] = byte;
        } else {
            self.tail[self.tail_len] = byte;
            self.tail_len += 1;
        }
    }
}

/// [`Read`] over a [`BufRead`] that reports each byte to a [`ByteTrail`].
///
/// Consumes from `inner` exactly what it hands out.
pub(crate) struct TrailReader<'a, R> {
    inner: &'a mut R,
    trail: &'a RefCell<ByteTrail>,
}

impl<'a, R: BufRead> TrailReader<'a, R> {
    pub(crate) fn new(inner: &'a mut R, trail: &'a RefCell<ByteTrail>) -> Self {
        Self { inner, trail }
    }
}

impl<R: BufRead> Read for TrailReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.inner.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.inner.consume(n);

        let mut trail = self.trail.borrow_mut();
        for &byte in &buf[..n] {
            trail.observe(byte)?;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trail_of(input: &[u8]) -> ByteTrail {
        let mut trail = ByteTrail::default();
        for &byte in input {
            trail.observe(byte).unwrap();
        }
        trail
    }

    #[test]
    fn token_boundaries_end_cleanly() {
        for input in [
            &b""[..],
            b"  ",
            br#"{"data":"#,
            br#"{"data":[1,"#,
            br#"{"a":12"#,
            br#"{"a":"x""#,
            br#"{"a":true"#,
            br#"{"a":false"#,
            br#"[null"#,
            br#"{"a":{}}"#,
        ] {
            assert!(trail_of(input).ended_cleanly(), "{}", String::from_utf8_lossy(input));
        }
    }

    #[test]
    fn cut_tokens_do_not_end_cleanly() {
        for input in [
            &br#"{"a":"unterm"#[..],
            br#"{"a":"esc\"#,
            br#"{"a":nul"#,
            br#"{"a":tr"#,
            br#"{"a":1."#,
            br#"{"a":-"#,
            br#"{"a":1e"#,
        ] {
            assert!(!trail_of(input).ended_cleanly(), "{}", String::from_utf8_lossy(input));
        }
    }

    #[test]
    fn brackets_inside_strings_do_not_nest() {
        let trail = trail_of(br#"{"a":"[[[{{{\"]]]"}"#);
        assert_eq!(trail.depth, 0);
        assert!(trail.ended_cleanly());
    }

    #[test]
    fn nesting_past_the_cap_fails() {
        let mut trail = ByteTrail::default();
        for _ in 0..MAX_NESTING {
            trail.observe(b'[').unwrap();
        }
        let err = trail.observe(b'[').unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(trail.nesting_exceeded());
    }

    #[test]
    fn recording_keeps_bytes_up_to_the_limit() {
        let mut trail = ByteTrail::default();
        trail.start_recording(16);
        for &byte in br#" {"type":"ous"}"# {
            trail.observe(byte).unwrap();
        }
        assert!(trail.inside_recorded_value());
        assert_eq!(
            trail.finish_recording(),
            Some(Recorded::Bytes(br#" {"type":"ous"}"#.to_vec()))
        );
        assert_eq!(trail.finish_recording(), None);

        trail.start_recording(4);
        for &byte in br#"{"type":"ous"}"# {
            trail.observe(byte).unwrap();
        }
        assert_eq!(trail.finish_recording(), Some(Recorded::Oversized));
    }

    #[test]
    fn whitespace_alone_is_not_inside_a_value() {
        let mut trail = ByteTrail::default();
        trail.start_recording(8);
        trail.observe(b' ').unwrap();
        trail.observe(b'\n').unwrap();
        assert!(!trail.inside_recorded_value());
        trail.observe(b'{').unwrap();
        assert!(trail.inside_recorded_value());
    }

    #[test]
    fn reader_consumes_only_what_it_returns() {
        let trail = RefCell::new(ByteTrail::default());
        let mut source = &b"[1,2]rest"[..];
        let mut reader = TrailReader::new(&mut source, &trail);
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"[1,2]");
        assert_eq!(source, &b"rest"[..]);
        assert!(trail.borrow().ended_cleanly());
    }
}
