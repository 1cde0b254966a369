//! Wire format encoding and decoding.
//!
//! Implements the 21-byte header format:
//! ```text
//! ┌──────────┬───────┬──────────┬──────────┬──────────┐
//! │ Op code  │ Flags │ Req ID   │ Target   │ Length   │
//! │ 4 bytes  │ 1 byte│ 4 bytes  │ 8 bytes  │ 4 bytes  │
//! │ int32 BE │       │ uint32 BE│ uint64 BE│ uint32 BE│
//! └──────────┴───────┴──────────┴──────────┴──────────┘
//! ```
//!
//! All multi-byte integers in the header are Big Endian. Target 0 addresses
//! the processor itself.

use crate::error::{GridwireError, Result};

/// Header size in bytes (fixed, exactly 21).
pub const HEADER_SIZE: usize = 21;

/// Default maximum payload size (1 GB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1_073_741_824;

/// Absolute maximum payload size (~2 GB, max i32).
pub const ABSOLUTE_MAX_PAYLOAD_SIZE: u32 = 2_147_483_647;

/// Target id addressing the processor.
pub const PROCESSOR_TARGET: u64 = 0;

/// Flag constants for the protocol.
pub mod flags {
    /// Message type: response (1) or request (0).
    pub const IS_RESPONSE: u8 = 0b0000_0001;
    /// Error flag: error (1) or ok (0).
    pub const IS_ERROR: u8 = 0b0000_0010;
    /// Payload carries a remote object handle.
    pub const IS_OBJECT: u8 = 0b0000_0100;
    /// Callback from the processor into the local binding (or its answer).
    pub const IS_CALLBACK: u8 = 0b0000_1000;
    /// One-way release of the handle in the target field.
    pub const IS_RELEASE: u8 = 0b0001_0000;

    /// Reserved bits mask (bits 5-7).
    pub const RESERVED_MASK: u8 = 0b1110_0000;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }

    // Common combinations

    /// Object-carrying response: 0x05
    pub const OBJECT_RESPONSE: u8 = IS_RESPONSE | IS_OBJECT;
    /// Error response: 0x03
    pub const ERROR_RESPONSE: u8 = IS_RESPONSE | IS_ERROR;
    /// Answer to a callback: 0x09
    pub const CALLBACK_RESPONSE: u8 = IS_RESPONSE | IS_CALLBACK;
    /// Failed callback answer: 0x0B
    pub const CALLBACK_ERROR: u8 = IS_RESPONSE | IS_CALLBACK | IS_ERROR;
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Operation code (or callback type id for callback frames).
    pub op_code: i32,
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Request identifier (0 = one-way).
    pub request_id: u32,
    /// Remote object addressed by the request (0 = processor).
    pub target: u64,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(op_code: i32, flags: u8, request_id: u32, target: u64, payload_length: u32) -> Self {
        Self {
            op_code,
            flags,
            request_id,
            target,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use gridwire::protocol::{Header, flags};
    ///
    /// let header = Header::new(1, flags::OBJECT_RESPONSE, 42, 0, 9);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 21);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (21 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.op_code.to_be_bytes());
        buf[4] = self.flags;
        buf[5..9].copy_from_slice(&self.request_id.to_be_bytes());
        buf[9..17].copy_from_slice(&self.target.to_be_bytes());
        buf[17..21].copy_from_slice(&self.payload_length.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let mut target = [0u8; 8];
        target.copy_from_slice(&buf[9..17]);
        Some(Self {
            op_code: i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            flags: buf[4],
            request_id: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]),
            target: u64::from_be_bytes(target),
            payload_length: u32::from_be_bytes([buf[17], buf[18], buf[19], buf[20]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Payload length doesn't exceed max
    /// - Reserved flag bits are 0
    /// - Release frames are one-way and address an object
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(GridwireError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(GridwireError::Protocol(
                "Reserved flag bits must be 0".to_string(),
            ));
        }

        if self.is_release() && (self.request_id != 0 || self.target == PROCESSOR_TARGET) {
            return Err(GridwireError::Protocol(
                "Release frames must be one-way and address an object".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if this is a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_RESPONSE)
    }

    /// Check if this is an error response.
    #[inline]
    pub fn is_error(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_ERROR)
    }

    /// Check if the payload carries an object handle.
    #[inline]
    pub fn is_object(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_OBJECT)
    }

    /// Check if this is a callback frame.
    #[inline]
    pub fn is_callback(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_CALLBACK)
    }

    /// Check if this is a release frame.
    #[inline]
    pub fn is_release(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_RELEASE)
    }

    /// Check if this frame addresses the processor.
    #[inline]
    pub fn targets_processor(&self) -> bool {
        self.target == PROCESSOR_TARGET
    }
}
