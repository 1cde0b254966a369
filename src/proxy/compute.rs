//! Compute sub-proxy.

use std::sync::Arc;

use crate::boundary::RemoteHandle;
use crate::environment::Environment;
use crate::target::RemoteTarget;

/// Compute facade over a cluster group.
#[derive(Debug)]
pub struct ComputeProxy {
    target: RemoteTarget,
}

impl ComputeProxy {
    pub(crate) fn new(env: Arc<Environment>, handle: RemoteHandle) -> Self {
        Self {
            target: RemoteTarget::new(env, handle),
        }
    }

    /// Handle of the remote compute object.
    pub fn handle(&self) -> RemoteHandle {
        self.target.handle()
    }

    /// Environment the compute object lives in.
    pub fn environment(&self) -> &Arc<Environment> {
        self.target.environment()
    }
}
