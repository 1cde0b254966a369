//! A parsed frame: decoded header plus a shared payload.
//!
//! ```
//! use gridwire::protocol::{flags, Frame, Header};
//!
//! let frame = Frame::from_parts(Header::new(0, flags::IS_RELEASE, 0, 0x2A, 0), &[]);
//! assert!(frame.is_release());
//! assert_eq!(frame.target(), 0x2A);
//! ```

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};

/// One frame read from the pipe.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: Header,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Build a frame by copying `payload`.
    pub fn from_parts(header: Header, payload: &[u8]) -> Self {
        Self::new(header, Bytes::copy_from_slice(payload))
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Operation code, or callback type id for callback frames.
    #[inline]
    pub fn op_code(&self) -> i32 {
        self.header.op_code
    }

    #[inline]
    pub fn request_id(&self) -> u32 {
        self.header.request_id
    }

    /// Addressed remote object; 0 is the processor.
    #[inline]
    pub fn target(&self) -> u64 {
        self.header.target
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.header.is_response()
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.header.is_error()
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        self.header.is_object()
    }

    #[inline]
    pub fn is_callback(&self) -> bool {
        self.header.is_callback()
    }

    #[inline]
    pub fn is_release(&self) -> bool {
        self.header.is_release()
    }
}

/// Encode `header` followed by `payload` into one contiguous buffer.
///
/// The writer task sends header and payload as separate slices; this is for
/// callers that want the bytes in one piece.
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
