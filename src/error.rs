//! Error types for gridwire.

use thiserror::Error;

/// Main error type for all gridwire operations.
///
/// "No such object" is never an error: lookups that can legitimately find
/// nothing return `Ok(None)`.
#[derive(Debug, Error)]
pub enum GridwireError {
    /// I/O error during pipe/socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error (faults and callback payloads).
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// A value cannot be represented in the binary format.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A binary payload is malformed.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Two type names hash to the same type id.
    #[error("Type id {id} of '{name}' is already registered for '{existing}'")]
    TypeConflict {
        /// Conflicting type id.
        id: i32,
        /// Name being registered.
        name: String,
        /// Name already holding the id.
        existing: String,
    },

    /// Protocol error (invalid frame, wrong flags, unexpected response, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The remote processor rejected the operation.
    #[error("Remote error {code}: {message}")]
    Remote {
        /// Error code reported by the processor.
        code: i32,
        /// Error message reported by the processor.
        message: String,
    },

    /// An operation that must yield an object returned none.
    #[error("Operation {0} returned no object")]
    MissingObject(i32),

    /// Buffer allocation failed or exceeded its configured cap.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// No response arrived before the invocation deadline.
    #[error("Operation {op} timed out after {millis}ms")]
    Timeout {
        /// Operation code of the invocation.
        op: i32,
        /// Deadline in milliseconds.
        millis: u64,
    },

    /// Callback not registered on the binding.
    #[error("Callback not found for type ID: {0}")]
    CallbackNotFound(i32),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - write buffer full.
    #[error("Backpressure timeout")]
    BackpressureTimeout,
}

impl GridwireError {
    /// Check if this error means the boundary connection is gone.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, GridwireError::ConnectionClosed | GridwireError::Io(_))
    }
}

/// Result type alias using GridwireError.
pub type Result<T> = std::result::Result<T, GridwireError>;
