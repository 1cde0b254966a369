//! Cache sub-proxy.

use std::sync::Arc;

use crate::boundary::RemoteHandle;
use crate::environment::Environment;
use crate::target::RemoteTarget;

/// A named cache on the processor.
#[derive(Debug)]
pub struct CacheProxy {
    name: String,
    target: RemoteTarget,
}

impl CacheProxy {
    /// Wrap a cache handle. Takes ownership of `handle`.
    pub(crate) fn new(name: String, env: Arc<Environment>, handle: RemoteHandle) -> Self {
        Self {
            name,
            target: RemoteTarget::new(env, handle),
        }
    }

    /// Cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle of the remote cache.
    pub fn handle(&self) -> RemoteHandle {
        self.target.handle()
    }

    /// Environment the cache lives in.
    pub fn environment(&self) -> &Arc<Environment> {
        self.target.environment()
    }
}
