//! Command Frame Reader
//!
//! Clients send a single token right after connecting. The server reads one
//! frame and never replies on the wire.
//!
//! ## Framing
//!
//! A frame is complete when any of these happens first:
//!
//! 1. [`FRAME_LEN`] bytes have been collected
//! 2. a terminator byte (`\0`, `\n` or `\r`) has been seen
//! 3. the peer closed its write half
//!
//! The token is everything before the first terminator, decoded as UTF-8
//! (invalid sequences are replaced) and trimmed of ASCII whitespace. So
//! `ARDUINO\0\0\0`, `ARDUINO\n` and a bare `ARDUINO` followed by a
//! half-close all yield `ARDUINO`. A frame that fills up without a
//! terminator is taken as-is and is not extended.
//!
//! Whatever the client sends after the frame is ignored.

use crate::protocol::types::ReceivedCommand;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Length of a command frame in bytes.
pub const FRAME_LEN: usize = 10;

/// Bytes that end a token before the frame is full.
pub const TERMINATORS: &[u8] = b"\0\n\r";

/// Errors that can occur while reading a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// I/O error (peer reset, broken pipe, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer did not finish the frame in time
    #[error("no complete frame within {0:?}")]
    TimedOut(Duration),
}

/// Returns true when `buf` holds a complete frame of `frame_len` bytes.
pub fn frame_complete(buf: &[u8], frame_len: usize) -> bool {
    buf.len() >= frame_len || buf.iter().any(|b| TERMINATORS.contains(b))
}

/// Extracts the token text from a raw frame.
pub fn decode_token(frame: &[u8]) -> String {
    let end = frame
        .iter()
        .position(|b| TERMINATORS.contains(b))
        .unwrap_or(frame.len());
    String::from_utf8_lossy(&frame[..end])
        .trim_matches(|c: char| c.is_ascii_whitespace())
        .to_string()
}

/// Reads single command frames from client streams.
#[derive(Debug, Clone, Copy)]
pub struct FrameReader {
    frame_len: usize,
    read_timeout: Option<Duration>,
}

impl FrameReader {
    /// Creates a reader for `frame_len`-byte frames. A `read_timeout` of
    /// `None` waits indefinitely.
    pub fn new(frame_len: usize, read_timeout: Option<Duration>) -> Self {
        Self {
            frame_len: frame_len.max(1),
            read_timeout,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Reads one raw frame. An immediately closed stream yields an empty frame.
    pub async fn read_frame<R>(&self, reader: &mut R) -> Result<Bytes, FrameError>
    where
        R: AsyncRead + Unpin,
    {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.fill(reader))
                .await
                .map_err(|_| FrameError::TimedOut(limit))?,
            None => self.fill(reader).await,
        }
    }

    /// Reads one frame and classifies its token.
    pub async fn read_command<R>(&self, reader: &mut R) -> Result<ReceivedCommand, FrameError>
    where
        R: AsyncRead + Unpin,
    {
        let frame = self.read_frame(reader).await?;
        Ok(ReceivedCommand::new(decode_token(&frame)))
    }

    async fn fill<R>(&self, reader: &mut R) -> Result<Bytes, FrameError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = BytesMut::with_capacity(self.frame_len);

        while !frame_complete(&buffer, self.frame_len) {
            let remaining = (self.frame_len - buffer.len()) as u64;
            let n = (&mut *reader).take(remaining).read_buf(&mut buffer).await?;
            if n == 0 {
                trace!(buffered = buffer.len(), "Peer closed before frame was full");
                break;
            }
            trace!(bytes = n, buffered = buffer.len(), "Read frame bytes");
        }

        Ok(buffer.freeze())
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(FRAME_LEN, None)
    }
}
