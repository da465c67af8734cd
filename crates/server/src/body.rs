//! Bridge from an async request body to a blocking [`Read`].
//!
//! ```text
//! axum Body ──► pump (async) ──► mpsc::channel(capacity) ──► ChannelReader (blocking)
//! ```
//!
//! The pump never holds more than `capacity` chunks. The end of the body is
//! an explicit frame: if the channel closes without it, because the pump was
//! dropped with its request, the reader fails instead of reporting EOF. A body
//! error, such as the client hanging up, is forwarded as an `io::Error` too.
use std::future::Future;
use std::io::{self, Read};

use axum::body::{Body, Bytes};
use futures::StreamExt;
use tokio::sync::mpsc;

#[derive(Debug)]
enum Frame {
    Data(Bytes),
    End,
    Failed(io::Error),
}

/// Blocking reader fed by [`body_reader`]'s pump.
///
/// Must only be read from a blocking context (`spawn_blocking` or a plain
/// thread); `blocking_recv` panics inside the async runtime.
#[derive(Debug)]
pub struct ChannelReader {
    rx: mpsc::Receiver<Frame>,
    current: Bytes,
    finished: bool,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.current.is_empty() {
            if self.finished {
                return Ok(0);
            }
            match self.rx.blocking_recv() {
                Some(Frame::Data(chunk)) => self.current = chunk,
                Some(Frame::End) => self.finished = true,
                Some(Frame::Failed(err)) => return Err(err),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "request body abandoned before it ended",
                    ))
                }
            }
        }
        let n = self.current.len().min(buf.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current = self.current.slice(n..);
        Ok(n)
    }
}

/// Split `body` into a blocking reader and the future that feeds it.
///
/// The future must be polled concurrently with whoever reads; it finishes
/// when the body ends, fails, or the reader is dropped. Dropping it early
/// makes the reader's next read fail with `ConnectionAborted`.
pub fn body_reader(body: Body, capacity: usize) -> (ChannelReader, impl Future<Output = ()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pump = async move {
        let mut stream = body.into_data_stream();
        loop {
            let frame = match stream.next().await {
                Some(Ok(chunk)) => Frame::Data(chunk),
                Some(Err(err)) => {
                    Frame::Failed(io::Error::new(io::ErrorKind::ConnectionAborted, err))
                }
                None => Frame::End,
            };
            let last = !matches!(frame, Frame::Data(_));
            if tx.send(frame).await.is_err() || last {
                break;
            }
        }
    };
    let reader = ChannelReader {
        rx,
        current: Bytes::new(),
        finished: false,
    };
    (reader, pump)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reads_every_chunk_in_order() {
        let chunks: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"chunked ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let body = Body::from_stream(futures::stream::iter(chunks));
        let (mut reader, pump) = body_reader(body, 1);

        let read = tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            reader.read_to_end(&mut out).map(|_| out)
        });
        let (out, ()) = tokio::join!(read, pump);
        assert_eq!(out.unwrap().unwrap(), b"hello chunked world");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn body_errors_surface_as_read_errors() {
        let chunks: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client hung up")),
        ];
        let body = Body::from_stream(futures::stream::iter(chunks));
        let (mut reader, pump) = body_reader(body, 4);

        let read = tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            reader.read_to_end(&mut out)
        });
        let (result, ()) = tokio::join!(read, pump);
        let err = result.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropping_the_reader_stops_the_pump() {
        let chunks = futures::stream::iter(
            (0..1000).map(|_| Ok::<_, io::Error>(Bytes::from_static(b"xxxxxxxx"))),
        );
        let (reader, pump) = body_reader(Body::from_stream(chunks), 1);
        drop(reader);
        pump.await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_pump_is_not_a_clean_end() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Bytes, io::Error>>();
        tx.unbounded_send(Ok(Bytes::from_static(b"PK\x03\x04part")))
            .unwrap();
        let (mut reader, pump) = body_reader(Body::from_stream(rx), 4);

        let read = tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            let result = reader.read_to_end(&mut out);
            (out, result)
        });
        // The client never finishes; the request is abandoned instead.
        let _ = tokio::time::timeout(std::time::Duration::from_millis(100), pump).await;

        let (out, result) = read.await.unwrap();
        assert_eq!(out, b"PK\x03\x04part");
        assert_eq!(
            result.unwrap_err().kind(),
            io::ErrorKind::ConnectionAborted
        );
        drop(tx);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reads_after_the_end_stay_at_eof() {
        let body = Body::from(Bytes::from_static(b"done"));
        let (mut reader, pump) = body_reader(body, 1);

        let read = tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            reader.read_to_end(&mut out)?;
            let mut extra = [0u8; 4];
            let again = reader.read(&mut extra)?;
            Ok::<_, io::Error>((out, again))
        });
        let (result, ()) = tokio::join!(read, pump);
        let (out, again) = result.unwrap().unwrap();
        assert_eq!(out, b"done");
        assert_eq!(again, 0);
    }
}
