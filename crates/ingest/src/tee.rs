//! A reader that copies everything it reads into a sink.
use std::io::{self, Read, Write};

/// Why a [`TeeReader`] stopped forwarding reads.
#[derive(Debug)]
pub enum TeeFault {
    /// Writing to the sink failed.
    Sink(io::Error),
    /// The source produced more than the configured number of bytes.
    LimitExceeded { limit: u64 },
}

/// Forwards reads from `source` and writes every byte read into `sink`
/// before handing it to the caller.
///
/// Source errors pass through unchanged. Sink failures and the optional
/// byte cap surface to the caller as a generic read error; the precise cause
/// stays on the tee and can be collected with [`TeeReader::take_fault`].
/// Once faulted, every further read fails.
///
/// ```rust
/// use std::io::Read;
/// use ingest::TeeReader;
///
/// let mut copy = Vec::new();
/// let mut tee = TeeReader::new(&b"hello"[..], &mut copy, None);
/// let mut first = [0u8; 2];
/// tee.read_exact(&mut first).unwrap();
/// assert_eq!(tee.bytes_copied(), 2);
/// drop(tee);
/// assert_eq!(copy, b"he");
/// ```
#[derive(Debug)]
pub struct TeeReader<R, W> {
    source: R,
    sink: W,
    copied: u64,
    limit: Option<u64>,
    fault: Option<TeeFault>,
}

impl<R: Read, W: Write> TeeReader<R, W> {
    pub fn new(source: R, sink: W, limit: Option<u64>) -> Self {
        Self {
            source,
            sink,
            copied: 0,
            limit,
            fault: None,
        }
    }

    /// Bytes read from the source and written to the sink so far.
    pub fn bytes_copied(&self) -> u64 {
        self.copied
    }

    pub fn take_fault(&mut self) -> Option<TeeFault> {
        self.fault.take()
    }

    pub fn into_inner(self) -> (R, W) {
        (self.source, self.sink)
    }
}

impl<R: Read, W: Write> Read for TeeReader<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fault.is_some() {
            return Err(io::Error::other("tee stopped after an earlier fault"));
        }

        let n = self.source.read(buf)?;

        if let Some(limit) = self.limit {
            if self.copied + n as u64 > limit {
                self.fault = Some(TeeFault::LimitExceeded { limit });
                return Err(io::Error::other("upload exceeds size limit"));
            }
        }

        if let Err(err) = self.sink.write_all(&buf[..n]) {
            self.fault = Some(TeeFault::Sink(err));
            return Err(io::Error::other("failed to copy upload into sink"));
        }

        self.copied += n as u64;
        Ok(n)
    }
}
