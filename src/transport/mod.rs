//! Transport module - platform-specific pipe/socket handling.
//!
//! Provides abstraction over:
//! - Unix Domain Sockets (Linux/macOS)
//! - Named Pipes (Windows)

mod pipe;

pub use pipe::PipeStream;
