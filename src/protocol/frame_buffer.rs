//! Reassembly of frames from arbitrary pipe reads.
//!
//! A read may end anywhere: inside a header, inside a payload, or between
//! two frames. [`FrameBuffer`] keeps the unconsumed bytes in one `BytesMut`
//! and remembers a header once it is complete, so each byte is inspected
//! once no matter how the stream is chunked.
//!
//! # Example
//!
//! ```
//! use gridwire::protocol::{build_frame, FrameBuffer, Header};
//!
//! let mut buffer = FrameBuffer::new();
//! let bytes = build_frame(&Header::new(1, 0, 7, 0, 2), b"hi");
//!
//! // Data arrives in chunks from the pipe
//! assert!(buffer.push(&bytes[..4]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[4..]).unwrap();
//! assert_eq!(frames[0].request_id(), 7);
//! ```

use bytes::BytesMut;

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::{GridwireError, Result};

/// Accumulates inbound bytes and cuts them into validated frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    /// Header whose payload has not fully arrived yet.
    header: Option<Header>,
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Buffer accepting payloads up to [`DEFAULT_MAX_PAYLOAD_SIZE`].
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Buffer accepting payloads up to `max_payload_size`.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            header: None,
            max_payload_size,
        }
    }

    /// Append `data` and return every frame it completes, in order.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if a header fails validation (oversized payload,
    /// reserved flag bits, malformed release). The stream cannot be
    /// resynchronized after that.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            let header = match self.header.take() {
                Some(header) => header,
                None => match self.next_header()? {
                    Some(header) => header,
                    None => break,
                },
            };

            let len = header.payload_length as usize;
            if self.buffer.len() < len {
                self.header = Some(header);
                break;
            }
            frames.push(Frame::new(header, self.buffer.split_to(len).freeze()));
        }

        Ok(frames)
    }

    fn next_header(&mut self) -> Result<Option<Header>> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = Header::decode(&self.buffer[..HEADER_SIZE])
            .ok_or_else(|| GridwireError::Protocol("Truncated frame header".to_string()))?;
        header.validate(self.max_payload_size)?;

        let _ = self.buffer.split_to(HEADER_SIZE);
        Ok(Some(header))
    }

    /// Number of buffered, not yet consumed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop buffered bytes and any half-received frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.header = None;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
