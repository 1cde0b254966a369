//! Codec module - MessagePack payloads for faults and callbacks.
//!
//! Invocation payloads use the binary format in [`crate::binary`]. Error
//! payloads and binding callbacks are MessagePack, encoded with
//! [`MsgPackCodec`].
//!
//! # Example
//!
//! ```
//! use gridwire::codec::MsgPackCodec;
//!
//! let encoded = MsgPackCodec::encode(&"hello").unwrap();
//! let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
