//! Operation codes understood by the processor.
//!
//! Codes are relative to the invocation target: [`ProcessorOp`] addresses the
//! processor, [`ClusterGroupOp`] a cluster-group object. Each code has exactly
//! one response shape.

use crate::boundary::ResponseShape;
use crate::error::{GridwireError, Result};

/// Operations invoked on the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ProcessorOp {
    /// Look up an existing cache by name.
    GetCache = 1,
    /// Create a cache; fails remotely if it already exists.
    CreateCache = 2,
    /// Look up a cache, creating it if absent.
    GetOrCreateCache = 3,
    /// Destroy a cache by name.
    DestroyCache = 6,
    /// Obtain the transactions facade.
    GetTransactions = 9,
    /// Obtain the cluster group covering the whole cluster.
    GetClusterGroup = 10,
}

impl ProcessorOp {
    /// Wire code.
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Shape of a successful response.
    pub fn response_shape(self) -> ResponseShape {
        match self {
            ProcessorOp::GetCache
            | ProcessorOp::CreateCache
            | ProcessorOp::GetOrCreateCache
            | ProcessorOp::GetTransactions
            | ProcessorOp::GetClusterGroup => ResponseShape::Object,
            ProcessorOp::DestroyCache => ResponseShape::Long,
        }
    }
}

impl TryFrom<i32> for ProcessorOp {
    type Error = GridwireError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(ProcessorOp::GetCache),
            2 => Ok(ProcessorOp::CreateCache),
            3 => Ok(ProcessorOp::GetOrCreateCache),
            6 => Ok(ProcessorOp::DestroyCache),
            9 => Ok(ProcessorOp::GetTransactions),
            10 => Ok(ProcessorOp::GetClusterGroup),
            other => Err(GridwireError::Protocol(format!(
                "Unknown processor op code {}",
                other
            ))),
        }
    }
}

/// Operations invoked on a cluster-group object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ClusterGroupOp {
    /// Obtain the compute facade over this group.
    GetCompute = 1,
}

impl ClusterGroupOp {
    /// Wire code.
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Shape of a successful response.
    pub fn response_shape(self) -> ResponseShape {
        match self {
            ClusterGroupOp::GetCompute => ResponseShape::Object,
        }
    }
}

impl TryFrom<i32> for ClusterGroupOp {
    type Error = GridwireError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(ClusterGroupOp::GetCompute),
            other => Err(GridwireError::Protocol(format!(
                "Unknown cluster group op code {}",
                other
            ))),
        }
    }
}
