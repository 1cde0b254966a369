//! Transactions sub-proxy.

use std::sync::Arc;

use crate::boundary::RemoteHandle;
use crate::environment::Environment;
use crate::target::RemoteTarget;

/// Transactions facade of a node.
#[derive(Debug)]
pub struct TransactionsProxy {
    target: RemoteTarget,
}

impl TransactionsProxy {
    pub(crate) fn new(env: Arc<Environment>, handle: RemoteHandle) -> Self {
        Self {
            target: RemoteTarget::new(env, handle),
        }
    }

    /// Handle of the remote transactions object.
    pub fn handle(&self) -> RemoteHandle {
        self.target.handle()
    }

    /// Environment the transactions object lives in.
    pub fn environment(&self) -> &Arc<Environment> {
        self.target.environment()
    }
}
