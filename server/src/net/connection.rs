use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::debug;

/// Largest payload a frame can carry (the length prefix is a u16).
pub const MAX_FRAME_LENGTH: usize = u16::MAX as usize;

/// Any byte stream a connection can run over (TCP in production, in-memory pipes in tests).
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

type BoxedTransport = Box<dyn Transport>;
type FrameReader = FramedRead<ReadHalf<BoxedTransport>, LengthDelimitedCodec>;
type FrameWriter = FramedWrite<WriteHalf<BoxedTransport>, LengthDelimitedCodec>;

/// Outcome of a timed receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// One complete frame.
    Message(String),
    /// Nothing arrived within the timeout; try again later.
    Empty,
    /// The peer is gone (EOF, I/O error, malformed frame, or closed locally).
    Disconnected,
}

/// Frames are a 2-byte big-endian length followed by UTF-8 text.
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(2)
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec()
}

/// One client connection with length-prefixed string framing.
///
/// The read and write halves are locked independently so the relay loop can
/// poll a member while another member's message is delivered to it.
pub struct Connection {
    peer: String,
    reader: Mutex<Option<FrameReader>>,
    writer: Mutex<Option<FrameWriter>>,
    timeout_ms: AtomicU64,
    send_timeout: Duration,
    closed: AtomicBool,
}

impl Connection {
    pub fn new<S>(stream: S, peer: impl Into<String>, timeout: Duration, send_timeout: Duration) -> Self
    where
        S: Transport + 'static,
    {
        let boxed: BoxedTransport = Box::new(stream);
        let (read_half, write_half) = tokio::io::split(boxed);
        Self {
            peer: peer.into(),
            reader: Mutex::new(Some(FramedRead::new(read_half, frame_codec()))),
            writer: Mutex::new(Some(FramedWrite::new(write_half, frame_codec()))),
            timeout_ms: AtomicU64::new(timeout.as_millis() as u64),
            send_timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Wait up to the current timeout for one frame.
    pub async fn receive(&self) -> Received {
        if self.is_closed() {
            return Received::Disconnected;
        }
        let mut guard = self.reader.lock().await;
        let Some(reader) = guard.as_mut() else {
            return Received::Disconnected;
        };

        match tokio::time::timeout(self.timeout(), reader.next()).await {
            Err(_) => Received::Empty,
            Ok(None) => Received::Disconnected,
            Ok(Some(Err(e))) => {
                debug!(peer = %self.peer, error = %e, "receive failed");
                Received::Disconnected
            }
            Ok(Some(Ok(frame))) => match String::from_utf8(frame.to_vec()) {
                Ok(text) => Received::Message(text),
                Err(_) => {
                    debug!(peer = %self.peer, "frame is not valid UTF-8");
                    Received::Disconnected
                }
            },
        }
    }

    /// Send one frame. Returns false on any failure; the caller must then treat
    /// the connection as dead.
    pub async fn send(&self, text: &str) -> bool {
        let mut writer = self.lock_writer().await;
        writer.send(text).await
    }

    /// Hold the write half so nothing else can be written until the guard drops.
    pub async fn lock_writer(&self) -> WriterGuard<'_> {
        WriterGuard {
            guard: self.writer.lock().await,
            send_timeout: self.send_timeout,
            closed: &self.closed,
            peer: &self.peer,
        }
    }

    /// Shut the connection down. Safe to call any number of times.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(writer) = self.writer.lock().await.take() {
            let mut half = writer.into_inner();
            let _ = half.shutdown().await;
        }
        self.reader.lock().await.take();
        debug!(peer = %self.peer, "connection closed");
    }
}

/// Exclusive access to a connection's write half.
pub struct WriterGuard<'a> {
    guard: MutexGuard<'a, Option<FrameWriter>>,
    send_timeout: Duration,
    closed: &'a AtomicBool,
    peer: &'a str,
}

impl WriterGuard<'_> {
    pub async fn send(&mut self, text: &str) -> bool {
        if self.closed.load(Ordering::Acquire) || text.len() > MAX_FRAME_LENGTH {
            return false;
        }
        let Some(writer) = self.guard.as_mut() else {
            return false;
        };

        let frame = Bytes::copy_from_slice(text.as_bytes());
        match tokio::time::timeout(self.send_timeout, writer.send(frame)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(peer = %self.peer, error = %e, "send failed");
                false
            }
            Err(_) => {
                debug!(peer = %self.peer, "send timed out");
                false
            }
        }
    }
}
