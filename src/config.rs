//! Connection configuration.
//!
//! Every field has a default, so a config file only names what it changes:
//!
//! ```
//! use gridwire::InteropConfig;
//!
//! let config = InteropConfig::from_json_str(r#"{
//!     "node_name": "grid-a",
//!     "invoke_timeout_ms": 5000,
//!     "memory": { "initial_capacity": 4096 }
//! }"#).unwrap();
//!
//! assert_eq!(config.node_name.as_deref(), Some("grid-a"));
//! assert_eq!(config.memory.initial_capacity, 4096);
//! assert_eq!(config.max_concurrent_callbacks, 256);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::error::{GridwireError, Result};
use crate::memory::MemoryConfig;
use crate::protocol::{ABSOLUTE_MAX_PAYLOAD_SIZE, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::writer::{
    WriterConfig, DEFAULT_BACKPRESSURE_TIMEOUT, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_MAX_PENDING_FRAMES,
};

/// Default deadline for a single invocation.
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum concurrent callback executions.
pub const DEFAULT_MAX_CONCURRENT_CALLBACKS: usize = 256;

/// Configuration of one node connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InteropConfig {
    /// Name of the node this connection represents.
    pub node_name: Option<String>,
    /// Processor endpoint (Unix socket path or Windows pipe name).
    pub pipe_path: Option<String>,
    /// Request buffer sizing.
    pub memory: MemoryConfig,
    /// Deadline for one invocation, in milliseconds.
    pub invoke_timeout_ms: u64,
    /// Largest frame payload accepted in either direction.
    pub max_payload_size: u32,
    /// Outbound frames queued before senders wait.
    pub max_pending_frames: usize,
    /// Writer channel capacity.
    pub channel_capacity: usize,
    /// How long a sender waits for backpressure to clear, in milliseconds.
    pub backpressure_timeout_ms: u64,
    /// Callbacks from the processor executing at once.
    pub max_concurrent_callbacks: usize,
}

impl Default for InteropConfig {
    fn default() -> Self {
        Self {
            node_name: None,
            pipe_path: None,
            memory: MemoryConfig::default(),
            invoke_timeout_ms: DEFAULT_INVOKE_TIMEOUT.as_millis() as u64,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout_ms: DEFAULT_BACKPRESSURE_TIMEOUT.as_millis() as u64,
            max_concurrent_callbacks: DEFAULT_MAX_CONCURRENT_CALLBACKS,
        }
    }
}

impl InteropConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Self::from_json_str(&json)
    }

    /// Check values that would make the connection unusable.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(GridwireError::Protocol(format!("Invalid config: {}", msg)));

        if self.invoke_timeout_ms == 0 {
            return invalid("invoke_timeout_ms must be positive");
        }
        if self.max_payload_size > ABSOLUTE_MAX_PAYLOAD_SIZE {
            return invalid("max_payload_size exceeds the frame length limit");
        }
        if self.channel_capacity == 0 || self.max_pending_frames == 0 {
            return invalid("writer queue sizes must be positive");
        }
        if self.channel_capacity > Semaphore::MAX_PERMITS
            || self.max_pending_frames > Semaphore::MAX_PERMITS
        {
            return invalid("writer queue sizes exceed the semaphore permit limit");
        }
        if self.max_concurrent_callbacks == 0 {
            return invalid("max_concurrent_callbacks must be positive");
        }
        if self.max_concurrent_callbacks > Semaphore::MAX_PERMITS {
            return invalid("max_concurrent_callbacks exceeds the semaphore permit limit");
        }
        if self.memory.initial_capacity == 0
            || self.memory.initial_capacity > self.memory.max_capacity
        {
            return invalid("memory.initial_capacity must be in 1..=max_capacity");
        }
        Ok(())
    }

    /// Invocation deadline.
    #[inline]
    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_millis(self.invoke_timeout_ms)
    }

    /// Writer task settings derived from this configuration.
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            max_pending_frames: self.max_pending_frames,
            channel_capacity: self.channel_capacity,
            backpressure_timeout: Duration::from_millis(self.backpressure_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InteropConfig::default();

        assert_eq!(config.invoke_timeout(), DEFAULT_INVOKE_TIMEOUT);
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
        assert_eq!(config.memory, MemoryConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_is_default() {
        let config = InteropConfig::from_json_str("{}").unwrap();
        assert_eq!(config, InteropConfig::default());
    }

    #[test]
    fn test_writer_config() {
        let config = InteropConfig::from_json_str(
            r#"{ "max_pending_frames": 8, "channel_capacity": 4, "backpressure_timeout_ms": 250 }"#,
        )
        .unwrap();

        let writer = config.writer_config();
        assert_eq!(writer.max_pending_frames, 8);
        assert_eq!(writer.channel_capacity, 4);
        assert_eq!(writer.backpressure_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = InteropConfig::from_json_str(r#"{ "invoke_timeout_ms": 0 }"#);
        assert!(result.unwrap_err().to_string().contains("invoke_timeout_ms"));

        let result = InteropConfig::from_json_str(
            r#"{ "memory": { "initial_capacity": 2048, "max_capacity": 1024 } }"#,
        );
        assert!(result.unwrap_err().to_string().contains("initial_capacity"));
    }

    #[test]
    fn test_permit_counts_above_semaphore_limit_rejected() {
        let result = InteropConfig::from_json_str(
            r#"{ "max_concurrent_callbacks": 18446744073709551615 }"#,
        );
        let err = result.unwrap_err();
        assert!(matches!(err, GridwireError::Protocol(_)));
        assert!(err.to_string().contains("max_concurrent_callbacks"));

        let config = InteropConfig {
            max_pending_frames: Semaphore::MAX_PERMITS + 1,
            ..InteropConfig::default()
        };
        assert!(matches!(config.validate(), Err(GridwireError::Protocol(_))));

        let config = InteropConfig {
            channel_capacity: usize::MAX,
            ..InteropConfig::default()
        };
        assert!(matches!(config.validate(), Err(GridwireError::Protocol(_))));

        let config = InteropConfig {
            max_concurrent_callbacks: Semaphore::MAX_PERMITS,
            ..InteropConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_json() {
        let result = InteropConfig::from_json_str("{ node_name: ");
        assert!(matches!(result, Err(GridwireError::Json(_))));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("gridwire-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "pipe_path": "/tmp/node.sock" }"#).unwrap();

        let config = InteropConfig::from_file(&path).unwrap();
        assert_eq!(config.pipe_path.as_deref(), Some("/tmp/node.sock"));

        let _ = std::fs::remove_file(&path);
    }
}
