//! Boundary module - invoking operations on the remote processor.
//!
//! [`Boundary`] is the seam between the proxies and whatever carries the
//! call to the processor. [`FramedBoundary`] carries it over a pipe; tests
//! substitute in-process fakes.
//!
//! An invocation is a request/response cycle:
//! ```text
//! Invocation { target, op, shape, payload } ──► Boundary ──► Response
//!                                                   │
//!                       Object(Some(handle)) | Object(None) | Long(v) | Err
//! ```

mod framed;

use std::fmt;
use std::future::Future;
use std::num::NonZeroU64;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::{GridwireError, Result};

pub use framed::FramedBoundary;

/// Boxed future returned by boundary invocations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque reference to a live object on the processor side.
///
/// Never zero: on the wire 0 means "no object", which surfaces as `None`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteHandle(NonZeroU64);

impl RemoteHandle {
    /// Wrap a raw handle, mapping 0 to `None`.
    #[inline]
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw handle value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteHandle({:#x})", self.0)
    }
}

impl fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Object an invocation is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The processor itself.
    Processor,
    /// A remote object previously handed out by the processor.
    Object(RemoteHandle),
}

impl Target {
    /// Wire representation (0 = processor).
    #[inline]
    pub fn to_wire(self) -> u64 {
        match self {
            Target::Processor => 0,
            Target::Object(handle) => handle.get(),
        }
    }

    /// Parse the wire representation.
    #[inline]
    pub fn from_wire(raw: u64) -> Self {
        match RemoteHandle::new(raw) {
            Some(handle) => Target::Object(handle),
            None => Target::Processor,
        }
    }
}

/// What a successful response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// A remote object handle, or none.
    Object,
    /// A scalar `i64`.
    Long,
}

/// Decoded response of a successful invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Object-shaped result; `None` when the operation found nothing.
    Object(Option<RemoteHandle>),
    /// Scalar result.
    Long(i64),
}

impl Response {
    /// Unwrap an object-shaped response.
    pub fn into_object(self, op: i32) -> Result<Option<RemoteHandle>> {
        match self {
            Response::Object(handle) => Ok(handle),
            Response::Long(_) => Err(GridwireError::Protocol(format!(
                "Operation {} expected an object response, got a long",
                op
            ))),
        }
    }

    /// Unwrap a long-shaped response.
    pub fn into_long(self, op: i32) -> Result<i64> {
        match self {
            Response::Long(value) => Ok(value),
            Response::Object(_) => Err(GridwireError::Protocol(format!(
                "Operation {} expected a long response, got an object",
                op
            ))),
        }
    }
}

/// One request crossing the boundary.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Addressed object.
    pub target: Target,
    /// Operation code, interpreted relative to the target.
    pub op: i32,
    /// Expected response shape.
    pub shape: ResponseShape,
    /// Committed request bytes (binary format).
    pub payload: &'a [u8],
}

/// Error reported by the processor, carried as a MsgPack map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFault {
    /// Processor-defined error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

impl From<RemoteFault> for GridwireError {
    fn from(fault: RemoteFault) -> Self {
        GridwireError::Remote {
            code: fault.code,
            message: fault.message,
        }
    }
}

/// The call interface to the remote processor.
///
/// Implementations must be usable from many tasks at once; each `invoke`
/// is an independent request/response cycle.
pub trait Boundary: Send + Sync + 'static {
    /// Perform one invocation and wait for its response.
    ///
    /// # Errors
    ///
    /// Fails on remote faults, disconnects, malformed responses and expired
    /// deadlines. "No object" is `Ok(Response::Object(None))`, not an error.
    fn invoke<'a>(&'a self, invocation: Invocation<'a>) -> BoxFuture<'a, Result<Response>>;

    /// Tell the processor a handle is no longer referenced locally.
    ///
    /// Best effort and non-blocking; callable from `Drop`.
    fn release(&self, handle: RemoteHandle);
}
