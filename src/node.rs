//! Node proxy - the client-side handle of a grid node.
//!
//! [`NodeProxy`] turns each operation into one invocation of the processor
//! and wraps the returned handle into a sub-proxy. [`Node`] is the cheap,
//! cloneable handle callers hold.
//!
//! Transactions and the cluster-group projection are fetched at most once:
//! concurrent first callers wait on the same fetch, later callers get the
//! cached proxy without touching the boundary. A failed fetch caches nothing.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::binding::Binding;
use crate::boundary::{RemoteHandle, Target};
use crate::config::InteropConfig;
use crate::environment::{Environment, EnvironmentBuilder};
use crate::error::Result;
use crate::ops::ProcessorOp;
use crate::proxy::{CacheProxy, ClusterGroupProxy, ComputeProxy, TransactionsProxy};
use crate::target;

/// Dispatcher for processor operations with lazily cached sub-proxies.
#[derive(Debug)]
pub struct NodeProxy {
    env: Arc<Environment>,
    transactions: OnceCell<Arc<TransactionsProxy>>,
    projection: OnceCell<Arc<ClusterGroupProxy>>,
}

impl NodeProxy {
    /// Create a proxy over `env`.
    pub fn new(env: Arc<Environment>) -> Self {
        Self {
            env,
            transactions: OnceCell::new(),
            projection: OnceCell::new(),
        }
    }

    /// Access the proxy behind a [`Node`].
    #[doc(hidden)]
    pub fn from_wrapper(node: &Node) -> &Arc<NodeProxy> {
        &node.inner
    }

    /// Node name, if configured.
    pub fn name(&self) -> Option<&str> {
        self.env.config().node_name.as_deref()
    }

    /// Configuration of the underlying connection.
    pub fn configuration(&self) -> &InteropConfig {
        self.env.config()
    }

    /// Shared environment.
    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Callbacks the processor may invoke.
    pub fn binding(&self) -> &Arc<Binding> {
        self.env.binding()
    }

    /// Look up an existing cache.
    ///
    /// `Ok(None)` if no cache has this name.
    pub async fn get_cache(&self, name: &str) -> Result<Option<CacheProxy>> {
        self.cache_op(ProcessorOp::GetCache, name).await
    }

    /// Look up a cache, creating it if absent.
    pub async fn get_or_create_cache(&self, name: &str) -> Result<Option<CacheProxy>> {
        self.cache_op(ProcessorOp::GetOrCreateCache, name).await
    }

    /// Create a cache.
    ///
    /// The processor decides what creating an existing cache means; its
    /// refusal comes back as `Err(Remote { .. })`.
    pub async fn create_cache(&self, name: &str) -> Result<Option<CacheProxy>> {
        self.cache_op(ProcessorOp::CreateCache, name).await
    }

    async fn cache_op(&self, op: ProcessorOp, name: &str) -> Result<Option<CacheProxy>> {
        let handle = target::invoke_object(&self.env, Target::Processor, op.code(), |w| {
            w.write_string(name)
        })
        .await?;

        match handle {
            Some(handle) => {
                tracing::debug!("{:?} '{}' returned {}", op, name, handle);
                Ok(Some(CacheProxy::new(
                    name.to_owned(),
                    self.env.clone(),
                    handle,
                )))
            }
            None => {
                tracing::debug!("{:?} '{}' returned no cache", op, name);
                Ok(None)
            }
        }
    }

    /// Destroy a cache.
    pub async fn destroy_cache(&self, name: &str) -> Result<()> {
        let op = ProcessorOp::DestroyCache;
        target::invoke_long(&self.env, Target::Processor, op.code(), |w| {
            w.write_string(name)
        })
        .await?;

        tracing::debug!("Destroyed cache '{}'", name);
        Ok(())
    }

    /// Transactions facade of this node.
    ///
    /// # Errors
    ///
    /// Returns the invocation error, or `MissingObject` if the processor
    /// returned no object. Nothing is cached on failure; the next call retries.
    pub async fn transactions(&self) -> Result<Arc<TransactionsProxy>> {
        self.transactions
            .get_or_try_init(|| self.fetch_transactions())
            .await
            .cloned()
    }

    async fn fetch_transactions(&self) -> Result<Arc<TransactionsProxy>> {
        let handle = self.fetch_required(ProcessorOp::GetTransactions).await?;
        Ok(Arc::new(TransactionsProxy::new(self.env.clone(), handle)))
    }

    /// Cluster group covering the whole cluster.
    ///
    /// Same caching and failure rules as [`transactions`](Self::transactions).
    pub async fn projection(&self) -> Result<Arc<ClusterGroupProxy>> {
        self.projection
            .get_or_try_init(|| self.fetch_projection())
            .await
            .cloned()
    }

    async fn fetch_projection(&self) -> Result<Arc<ClusterGroupProxy>> {
        let handle = self.fetch_required(ProcessorOp::GetClusterGroup).await?;
        Ok(Arc::new(ClusterGroupProxy::new(self.env.clone(), handle)))
    }

    async fn fetch_required(&self, op: ProcessorOp) -> Result<RemoteHandle> {
        let handle =
            target::invoke_required(&self.env, Target::Processor, op.code(), |_| Ok(())).await?;
        tracing::debug!("{:?} returned {}", op, handle);
        Ok(handle)
    }

    /// Compute facade over the whole cluster.
    ///
    /// Obtains the projection first, then its compute facade; both are cached.
    pub async fn compute(&self) -> Result<Arc<ComputeProxy>> {
        self.projection().await?.compute().await
    }
}

/// Client-side handle of a grid node.
///
/// Cloning is cheap; clones share sub-proxy caches.
#[derive(Debug, Clone)]
pub struct Node {
    inner: Arc<NodeProxy>,
}

impl Node {
    /// Create a node over an existing environment.
    pub fn new(env: Arc<Environment>) -> Self {
        Self {
            inner: Arc::new(NodeProxy::new(env)),
        }
    }

    /// Connect to the processor described by `config`.
    pub async fn connect(config: InteropConfig) -> Result<Self> {
        let env = EnvironmentBuilder::from_config(config).connect().await?;
        Ok(Self::new(env))
    }

    /// Node name, if configured.
    pub fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    /// Configuration of the underlying connection.
    pub fn configuration(&self) -> &InteropConfig {
        self.inner.configuration()
    }

    /// Callbacks the processor may invoke.
    pub fn binding(&self) -> &Arc<Binding> {
        self.inner.binding()
    }

    /// Look up an existing cache; `Ok(None)` if absent.
    pub async fn get_cache(&self, name: &str) -> Result<Option<CacheProxy>> {
        self.inner.get_cache(name).await
    }

    /// Look up a cache, creating it if absent.
    pub async fn get_or_create_cache(&self, name: &str) -> Result<Option<CacheProxy>> {
        self.inner.get_or_create_cache(name).await
    }

    /// Create a cache.
    pub async fn create_cache(&self, name: &str) -> Result<Option<CacheProxy>> {
        self.inner.create_cache(name).await
    }

    /// Destroy a cache.
    pub async fn destroy_cache(&self, name: &str) -> Result<()> {
        self.inner.destroy_cache(name).await
    }

    /// Transactions facade, fetched once.
    pub async fn transactions(&self) -> Result<Arc<TransactionsProxy>> {
        self.inner.transactions().await
    }

    /// Cluster group covering the whole cluster, fetched once.
    pub async fn projection(&self) -> Result<Arc<ClusterGroupProxy>> {
        self.inner.projection().await
    }

    /// Compute facade over the whole cluster.
    pub async fn compute(&self) -> Result<Arc<ComputeProxy>> {
        self.inner.compute().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::BinaryReader;
    use crate::boundary::{Boundary, BoxFuture, Invocation, Response};
    use crate::error::GridwireError;
    use crate::memory::InteropInputStream;
    use std::sync::Mutex;

    /// Records invocations and answers with a fixed response.
    struct Recorder {
        response: Response,
        calls: Mutex<Vec<(Target, i32, Vec<u8>)>>,
        released: Mutex<Vec<RemoteHandle>>,
    }

    impl Recorder {
        fn new(response: Response) -> Arc<Self> {
            Arc::new(Self {
                response,
                calls: Mutex::new(Vec::new()),
                released: Mutex::new(Vec::new()),
            })
        }
    }

    impl Boundary for Recorder {
        fn invoke<'a>(&'a self, inv: Invocation<'a>) -> BoxFuture<'a, Result<Response>> {
            self.calls
                .lock()
                .unwrap()
                .push((inv.target, inv.op, inv.payload.to_vec()));
            let response = self.response;
            Box::pin(async move { Ok(response) })
        }

        fn release(&self, handle: RemoteHandle) {
            self.released.lock().unwrap().push(handle);
        }
    }

    fn node_over(boundary: Arc<Recorder>) -> Node {
        let env = Environment::builder()
            .node_name("test-node")
            .build(boundary)
            .unwrap();
        Node::new(env)
    }

    #[tokio::test]
    async fn test_cache_request_encodes_name() {
        let recorder = Recorder::new(Response::Object(RemoteHandle::new(5)));
        let node = node_over(recorder.clone());

        let cache = node.get_cache("orders").await.unwrap().unwrap();
        assert_eq!(cache.name(), "orders");
        assert_eq!(cache.handle().get(), 5);

        let calls = recorder.calls.lock().unwrap();
        let (target, op, payload) = &calls[0];
        assert_eq!(*target, Target::Processor);
        assert_eq!(*op, ProcessorOp::GetCache.code());

        let mut input = InteropInputStream::new(payload);
        assert_eq!(BinaryReader::new(&mut input).read_string().unwrap(), "orders");
        assert_eq!(input.remaining(), 0);
    }

    #[tokio::test]
    async fn test_cache_op_codes() {
        let recorder = Recorder::new(Response::Object(RemoteHandle::new(5)));
        let node = node_over(recorder.clone());

        node.create_cache("a").await.unwrap();
        node.get_or_create_cache("a").await.unwrap();

        let ops: Vec<i32> = recorder.calls.lock().unwrap().iter().map(|c| c.1).collect();
        assert_eq!(ops, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_dropping_cache_releases_handle() {
        let recorder = Recorder::new(Response::Object(RemoteHandle::new(5)));
        let node = node_over(recorder.clone());

        let cache = node.get_cache("orders").await.unwrap().unwrap();
        assert!(recorder.released.lock().unwrap().is_empty());

        drop(cache);
        assert_eq!(*recorder.released.lock().unwrap(), vec![RemoteHandle::new(5).unwrap()]);
    }

    #[tokio::test]
    async fn test_missing_transactions_is_error() {
        let recorder = Recorder::new(Response::Object(None));
        let node = node_over(recorder.clone());

        let result = node.transactions().await;
        assert!(matches!(result, Err(GridwireError::MissingObject(9))));
    }

    #[tokio::test]
    async fn test_destroy_cache_expects_long() {
        let node = node_over(Recorder::new(Response::Long(0)));
        node.destroy_cache("orders").await.unwrap();

        let node = node_over(Recorder::new(Response::Object(None)));
        let result = node.destroy_cache("orders").await;
        assert!(matches!(result, Err(GridwireError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_destroy_cache_releases_unexpected_object() {
        let recorder = Recorder::new(Response::Object(RemoteHandle::new(77)));
        let node = node_over(recorder.clone());

        let result = node.destroy_cache("orders").await;
        assert!(matches!(result, Err(GridwireError::Protocol(_))));
        assert_eq!(*recorder.released.lock().unwrap(), vec![RemoteHandle::new(77).unwrap()]);
    }

    #[tokio::test]
    async fn test_accessors() {
        let node = node_over(Recorder::new(Response::Object(None)));

        assert_eq!(node.name(), Some("test-node"));
        assert_eq!(node.configuration().node_name.as_deref(), Some("test-node"));
        assert!(node.binding().is_empty());

        let proxy = NodeProxy::from_wrapper(&node);
        assert!(Arc::ptr_eq(proxy.binding(), node.binding()));
    }
}
