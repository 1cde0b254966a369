//! Protocol module - how invocations, answers and releases travel over the pipe.
//!
//! Every message is a 21-byte header followed by a payload. Request and
//! object payloads are binary-encoded (see [`crate::binary`]); faults and
//! callback payloads are MsgPack.

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    flags, Header, ABSOLUTE_MAX_PAYLOAD_SIZE, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE,
    PROCESSOR_TARGET,
};
