//! Cluster-group sub-proxy.

use std::sync::Arc;

use tokio::sync::OnceCell;

use super::ComputeProxy;
use crate::boundary::RemoteHandle;
use crate::environment::Environment;
use crate::error::Result;
use crate::ops::ClusterGroupOp;
use crate::target::RemoteTarget;

/// A group of cluster nodes.
///
/// Caches its compute facade: the first successful [`compute`](Self::compute)
/// call is the only one that reaches the processor.
#[derive(Debug)]
pub struct ClusterGroupProxy {
    target: RemoteTarget,
    compute: OnceCell<Arc<ComputeProxy>>,
}

impl ClusterGroupProxy {
    pub(crate) fn new(env: Arc<Environment>, handle: RemoteHandle) -> Self {
        Self {
            target: RemoteTarget::new(env, handle),
            compute: OnceCell::new(),
        }
    }

    /// Handle of the remote cluster group.
    pub fn handle(&self) -> RemoteHandle {
        self.target.handle()
    }

    /// Environment the cluster group lives in.
    pub fn environment(&self) -> &Arc<Environment> {
        self.target.environment()
    }

    /// Compute facade over this group.
    ///
    /// # Errors
    ///
    /// Returns the invocation error, or `MissingObject` if the processor
    /// returned no compute object. Nothing is cached on failure.
    pub async fn compute(&self) -> Result<Arc<ComputeProxy>> {
        self.compute
            .get_or_try_init(|| self.fetch_compute())
            .await
            .cloned()
    }

    async fn fetch_compute(&self) -> Result<Arc<ComputeProxy>> {
        let handle = self
            .target
            .invoke_required(ClusterGroupOp::GetCompute.code(), |_| Ok(()))
            .await?;
        tracing::debug!("Compute facade obtained as {}", handle);
        Ok(Arc::new(ComputeProxy::new(
            self.target.environment().clone(),
            handle,
        )))
    }
}
