//! Environment - per-connection state shared by the node proxy and every
//! sub-proxy.
//!
//! The [`EnvironmentBuilder`] provides a fluent API over [`InteropConfig`]
//! and produces an `Arc<Environment>` either over a pipe to the processor or
//! over any [`Boundary`] implementation.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use gridwire::{Environment, Node};
//!
//! #[tokio::main]
//! async fn main() -> gridwire::Result<()> {
//!     let env = Environment::builder()
//!         .node_name("grid-a")
//!         .pipe_path("/tmp/grid-a.sock")
//!         .invoke_timeout(Duration::from_secs(5))
//!         .connect()
//!         .await?;
//!
//!     let node = Node::new(env);
//!     let orders = node.get_or_create_cache("orders").await?;
//!     assert!(orders.is_some());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::binary::TypeRegistry;
use crate::binding::Binding;
use crate::boundary::{Boundary, FramedBoundary};
use crate::config::InteropConfig;
use crate::error::{GridwireError, Result};
use crate::memory::{MemoryConfig, MemoryPool};

/// Shared context of one node connection.
///
/// Owns the boundary, the request buffer pool, the type registry and the
/// binding. Holds no references back to proxies.
pub struct Environment {
    config: InteropConfig,
    boundary: Arc<dyn Boundary>,
    memory: MemoryPool,
    types: TypeRegistry,
    binding: Arc<Binding>,
}

impl Environment {
    /// Create a new environment builder.
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    /// Configuration this environment was built from.
    pub fn config(&self) -> &InteropConfig {
        &self.config
    }

    /// Boundary carrying invocations to the processor.
    pub fn boundary(&self) -> &dyn Boundary {
        self.boundary.as_ref()
    }

    /// Pool request buffers are leased from.
    pub fn memory(&self) -> &MemoryPool {
        &self.memory
    }

    /// Type names known to this connection.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Callbacks the processor may invoke.
    pub fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("node_name", &self.config.node_name)
            .field("leased_buffers", &self.memory.leased())
            .field("types", &self.types.len())
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring and creating an [`Environment`].
#[derive(Debug)]
pub struct EnvironmentBuilder {
    config: InteropConfig,
    binding: Arc<Binding>,
}

impl EnvironmentBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::from_config(InteropConfig::default())
    }

    /// Start from an existing configuration.
    pub fn from_config(config: InteropConfig) -> Self {
        Self {
            config,
            binding: Arc::new(Binding::new()),
        }
    }

    /// Set the node name.
    pub fn node_name(mut self, name: impl Into<String>) -> Self {
        self.config.node_name = Some(name.into());
        self
    }

    /// Set the processor endpoint used by [`connect`](Self::connect).
    pub fn pipe_path(mut self, path: impl Into<String>) -> Self {
        self.config.pipe_path = Some(path.into());
        self
    }

    /// Set the deadline for one invocation.
    ///
    /// Stored in whole milliseconds, rounded up. Default: 30 seconds
    pub fn invoke_timeout(mut self, timeout: Duration) -> Self {
        self.config.invoke_timeout_ms = ceil_millis(timeout);
        self
    }

    /// Set request buffer sizing.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    /// Set the largest frame payload accepted in either direction.
    ///
    /// Default: 1 GB
    pub fn max_payload_size(mut self, size: u32) -> Self {
        self.config.max_payload_size = size;
        self
    }

    /// Set the maximum number of callbacks executing at once.
    ///
    /// Further callbacks are rejected with a fault until one finishes.
    /// Default: 256
    pub fn max_concurrent_callbacks(mut self, limit: usize) -> Self {
        self.config.max_concurrent_callbacks = limit;
        self
    }

    /// Set the maximum pending outbound frames for backpressure.
    ///
    /// Default: 1024
    pub fn max_pending_frames(mut self, limit: usize) -> Self {
        self.config.max_pending_frames = limit;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the backpressure timeout.
    ///
    /// Stored in whole milliseconds, rounded up. Default: 5 seconds
    pub fn backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.config.backpressure_timeout_ms = ceil_millis(timeout);
        self
    }

    /// Use an existing binding instead of a fresh one.
    pub fn binding(mut self, binding: Arc<Binding>) -> Self {
        self.binding = binding;
        self
    }

    /// Build over a caller-supplied boundary.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if the configuration is invalid.
    pub fn build(self, boundary: Arc<dyn Boundary>) -> Result<Arc<Environment>> {
        self.config.validate()?;

        tracing::debug!(
            "Environment ready for node {:?}",
            self.config.node_name.as_deref().unwrap_or("<unnamed>")
        );

        Ok(Arc::new(Environment {
            memory: MemoryPool::new(self.config.memory.clone()),
            types: TypeRegistry::new(),
            binding: self.binding,
            boundary,
            config: self.config,
        }))
    }

    /// Connect to the processor at the configured pipe path.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if no pipe path is configured, `Io` if the
    /// connection fails.
    pub async fn connect(self) -> Result<Arc<Environment>> {
        self.config.validate()?;
        let path = self.config.pipe_path.clone().ok_or_else(|| {
            GridwireError::Protocol("Invalid config: pipe_path is required to connect".to_string())
        })?;

        let boundary =
            FramedBoundary::connect(&path, &self.config, self.binding.clone()).await?;
        self.build(Arc::new(boundary))
    }

    /// Run the framed protocol over an already connected stream pair.
    ///
    /// Must be called within a tokio runtime.
    pub fn connect_stream<R, W>(self, reader: R, writer: W) -> Result<Arc<Environment>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.config.validate()?;
        let boundary = FramedBoundary::new(reader, writer, &self.config, self.binding.clone());
        self.build(Arc::new(boundary))
    }
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole milliseconds in `duration`, rounding any remainder up.
fn ceil_millis(duration: Duration) -> u64 {
    let millis = duration.as_millis() + u128::from(duration.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(millis).unwrap_or(u64::MAX)
}
