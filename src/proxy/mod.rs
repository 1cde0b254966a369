//! Sub-proxies - typed local wrappers around remote objects.
//!
//! Each sub-proxy owns a [`RemoteTarget`](crate::target::RemoteTarget): the
//! shared environment plus the handle of its remote object, released when the
//! proxy is dropped.

mod cache;
mod cluster;
mod compute;
mod transactions;

pub use cache::CacheProxy;
pub use cluster::ClusterGroupProxy;
pub use compute::ComputeProxy;
pub use transactions::TransactionsProxy;
