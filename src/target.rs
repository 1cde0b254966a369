//! Interop targets and the shared invocation routine.
//!
//! Every operation, whether addressed to the processor or to a remote object,
//! runs the same cycle:
//! 1. lease a buffer from the environment's pool,
//! 2. encode the arguments,
//! 3. synchronize the stream,
//! 4. invoke the boundary,
//! 5. decode the response into the expected shape.
//!
//! The buffer goes back to the pool when the cycle ends, successful or not.

use std::sync::Arc;

use crate::binary::BinaryWriter;
use crate::boundary::{Invocation, RemoteHandle, Response, ResponseShape, Target};
use crate::environment::Environment;
use crate::error::{GridwireError, Result};
use crate::memory::InteropOutputStream;

/// Run one invocation against `target`.
pub(crate) async fn invoke<F>(
    env: &Environment,
    target: Target,
    op: i32,
    shape: ResponseShape,
    encode: F,
) -> Result<Response>
where
    F: FnOnce(&mut BinaryWriter<'_, '_>) -> Result<()>,
{
    let mut mem = env.memory().allocate()?;
    {
        let mut out = InteropOutputStream::new(&mut mem);
        encode(&mut BinaryWriter::new(&mut out, env.types()))?;
        out.synchronize();
    }

    env.boundary()
        .invoke(Invocation {
            target,
            op,
            shape,
            payload: mem.committed(),
        })
        .await
}

/// Run an object-shaped invocation.
///
/// `Ok(None)` when the processor has no such object.
pub(crate) async fn invoke_object<F>(
    env: &Environment,
    target: Target,
    op: i32,
    encode: F,
) -> Result<Option<RemoteHandle>>
where
    F: FnOnce(&mut BinaryWriter<'_, '_>) -> Result<()>,
{
    invoke(env, target, op, ResponseShape::Object, encode)
        .await?
        .into_object(op)
}

/// Run a long-shaped invocation.
///
/// An object answered in place of the long is released before the shape
/// mismatch is reported.
pub(crate) async fn invoke_long<F>(
    env: &Environment,
    target: Target,
    op: i32,
    encode: F,
) -> Result<i64>
where
    F: FnOnce(&mut BinaryWriter<'_, '_>) -> Result<()>,
{
    let response = invoke(env, target, op, ResponseShape::Long, encode).await?;
    if let Response::Object(Some(handle)) = response {
        tracing::warn!("Operation {} answered object {:?} where a long was expected", op, handle);
        env.boundary().release(handle);
    }
    response.into_long(op)
}

/// Run an object-shaped invocation that must yield an object.
pub(crate) async fn invoke_required<F>(
    env: &Environment,
    target: Target,
    op: i32,
    encode: F,
) -> Result<RemoteHandle>
where
    F: FnOnce(&mut BinaryWriter<'_, '_>) -> Result<()>,
{
    invoke_object(env, target, op, encode)
        .await?
        .ok_or(GridwireError::MissingObject(op))
}

/// A remote object owned by a local proxy.
///
/// Releases the handle through the boundary when dropped.
pub struct RemoteTarget {
    env: Arc<Environment>,
    handle: RemoteHandle,
}

impl RemoteTarget {
    /// Take ownership of `handle`.
    pub(crate) fn new(env: Arc<Environment>, handle: RemoteHandle) -> Self {
        Self { env, handle }
    }

    /// Handle of the remote object.
    #[inline]
    pub fn handle(&self) -> RemoteHandle {
        self.handle
    }

    /// Environment the object lives in.
    #[inline]
    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Invoke `op` on this object, requiring an object back.
    pub(crate) async fn invoke_required<F>(&self, op: i32, encode: F) -> Result<RemoteHandle>
    where
        F: FnOnce(&mut BinaryWriter<'_, '_>) -> Result<()>,
    {
        invoke_required(&self.env, Target::Object(self.handle), op, encode).await
    }
}

impl Drop for RemoteTarget {
    fn drop(&mut self) {
        self.env.boundary().release(self.handle);
    }
}

impl std::fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RemoteTarget").field(&self.handle).finish()
    }
}
