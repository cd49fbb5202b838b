//! Receive accumulator
//!
//! Socket reads hand over arbitrary slices of the byte stream. `FrameBuffer`
//! appends them and yields complete delimiter-terminated frames left to right.
//! A trailing partial frame stays buffered until a later read completes it.

use bytes::{Bytes, BytesMut};

use crate::broker::message::DELIMITER;
use crate::utils::{Error, Result};

#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_frame_bytes: usize,
}

impl FrameBuffer {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_frame_bytes.min(4096)),
            max_frame_bytes,
        }
    }

    /// Append the bytes of one read.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take the next complete frame, without its delimiter.
    ///
    /// Returns `Ok(None)` when only a partial frame (or nothing) is buffered,
    /// and `FrameTooLarge` once a partial frame outgrows the limit.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        match self.buf.iter().position(|b| *b == DELIMITER) {
            Some(pos) => {
                let mut frame = self.buf.split_to(pos + 1);
                frame.truncate(pos);
                Ok(Some(frame.freeze()))
            }
            None if self.buf.len() > self.max_frame_bytes => Err(Error::FrameTooLarge {
                limit: self.max_frame_bytes,
            }),
            None => Ok(None),
        }
    }

    /// Bytes of the buffered partial frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(crate::config::BrokerSettings::default().max_frame_bytes)
    }
}
