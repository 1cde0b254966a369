//! Pipe-backed boundary.
//!
//! One writer task owns the write half; one read loop owns the read half and
//! routes every inbound frame:
//! - responses go to the invocation waiting on their request id,
//! - callbacks go to the [`Binding`] and are answered on the same pipe,
//! - object responses nobody waits for any more are released.
//!
//! ```text
//!  invoke ──► pending[id] ──► writer task ──► pipe ──► processor
//!                 ▲                                       │
//!                 └────────────── read loop ◄─────────────┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

use super::{
    Boundary, BoxFuture, Invocation, RemoteFault, RemoteHandle, Response, ResponseShape,
};
use crate::binary::BinaryReader;
use crate::binding::{Binding, FAULT_CALLBACK_FAILED, FAULT_OVERLOADED, FAULT_UNKNOWN_CALLBACK};
use crate::codec::MsgPackCodec;
use crate::config::InteropConfig;
use crate::error::{GridwireError, Result};
use crate::memory::InteropInputStream;
use crate::protocol::{flags, Frame, FrameBuffer, Header};
use crate::transport::PipeStream;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

/// Op code carried by release frames.
const RELEASE_OP: i32 = 0;

/// State shared between invocations and the read loop.
struct Shared {
    pending: Mutex<HashMap<u32, oneshot::Sender<Frame>>>,
    closed: AtomicBool,
    writer: WriterHandle,
}

impl Shared {
    fn release(&self, handle: RemoteHandle) {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!("Connection closed, not releasing {}", handle);
            return;
        }

        let header = Header::new(RELEASE_OP, flags::IS_RELEASE, 0, handle.get(), 0);
        match self.writer.try_send(OutboundFrame::empty(&header)) {
            Ok(()) => tracing::debug!("Released {}", handle),
            Err(e) => tracing::warn!("Failed to release {}: {}", handle, e),
        }
    }

    /// Release the handle carried by a response nobody is waiting for.
    fn release_orphan(&self, frame: &Frame) {
        match carried_handle(frame) {
            Some(handle) => {
                tracing::warn!(
                    "Response {} arrived after its caller gave up, releasing {}",
                    frame.request_id(),
                    handle
                );
                self.release(handle);
            }
            None => tracing::debug!("Dropping orphan response {}", frame.request_id()),
        }
    }

    /// Release the handle carried by a response that failed to decode.
    fn release_rejected(&self, frame: &Frame) {
        if let Some(handle) = carried_handle(frame) {
            tracing::warn!(
                "Response {} was rejected, releasing {}",
                frame.request_id(),
                handle
            );
            self.release(handle);
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the senders wakes every waiter with ConnectionClosed
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Pending slot of one invocation; deregisters itself when dropped.
struct PendingGuard<'a> {
    shared: &'a Shared,
    request_id: u32,
    rx: oneshot::Receiver<Frame>,
}

impl<'a> PendingGuard<'a> {
    fn register(shared: &'a Shared, request_id: u32) -> Self {
        let (tx, rx) = oneshot::channel();
        shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id, tx);
        Self {
            shared,
            request_id,
            rx,
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.request_id);

        // The response may have been delivered between the deadline and now
        self.rx.close();
        if let Ok(frame) = self.rx.try_recv() {
            self.shared.release_orphan(&frame);
        }
    }
}

/// [`Boundary`] over a framed byte stream to the processor.
pub struct FramedBoundary {
    shared: Arc<Shared>,
    next_request_id: AtomicU32,
    invoke_timeout: Duration,
    max_payload_size: u32,
    read_task: JoinHandle<()>,
    _writer_task: JoinHandle<Result<()>>,
}

impl FramedBoundary {
    /// Connect to the processor's pipe.
    pub async fn connect(path: &str, config: &InteropConfig, binding: Arc<Binding>) -> Result<Self> {
        let stream = PipeStream::connect(path).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self::new(reader, writer, config, binding))
    }

    /// Run the protocol over an already connected stream pair.
    ///
    /// Must be called within a tokio runtime, with a `config` that passed
    /// [`InteropConfig::validate`].
    pub fn new<R, W>(reader: R, writer: W, config: &InteropConfig, binding: Arc<Binding>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer, writer_task) = spawn_writer_task(writer, config.writer_config());

        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            writer,
        });

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_callbacks));
        let read_task = tokio::spawn(read_loop(
            reader,
            shared.clone(),
            binding,
            semaphore,
            config.max_payload_size,
        ));

        Self {
            shared,
            next_request_id: AtomicU32::new(1),
            invoke_timeout: config.invoke_timeout(),
            max_payload_size: config.max_payload_size,
            read_task,
            _writer_task: writer_task,
        }
    }

    /// Check if the connection to the processor is gone.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of invocations waiting for a response.
    pub fn pending_invocations(&self) -> usize {
        self.shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Next request id; 0 is reserved for one-way frames.
    fn next_request_id(&self) -> u32 {
        loop {
            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    async fn call(&self, invocation: Invocation<'_>) -> Result<Response> {
        let op = invocation.op;
        let payload_length = u32::try_from(invocation.payload.len())
            .ok()
            .filter(|len| *len <= self.max_payload_size)
            .ok_or_else(|| {
                GridwireError::Encoding(format!(
                    "Request of {} bytes exceeds maximum {}",
                    invocation.payload.len(),
                    self.max_payload_size
                ))
            })?;

        if self.is_closed() {
            return Err(GridwireError::ConnectionClosed);
        }

        let request_id = self.next_request_id();
        let mut guard = PendingGuard::register(&self.shared, request_id);

        // The read loop may have drained pending slots before we registered
        if self.is_closed() {
            return Err(GridwireError::ConnectionClosed);
        }

        let header = Header::new(
            op,
            0,
            request_id,
            invocation.target.to_wire(),
            payload_length,
        );
        tracing::debug!(
            "Invoking op {} on {:?} (request {}, {} bytes)",
            op,
            invocation.target,
            request_id,
            payload_length
        );
        self.shared
            .writer
            .send(OutboundFrame::new(
                &header,
                Bytes::copy_from_slice(invocation.payload),
            ))
            .await?;

        let frame = match tokio::time::timeout(self.invoke_timeout, &mut guard.rx).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(_)) => return Err(GridwireError::ConnectionClosed),
            Err(_) => {
                tracing::warn!("Op {} timed out (request {})", op, request_id);
                return Err(GridwireError::Timeout {
                    op,
                    millis: self.invoke_timeout.as_millis() as u64,
                });
            }
        };

        let result = decode_response(&frame, op, invocation.shape);
        if let Err(GridwireError::Decoding(_)) = &result {
            self.shared.release_rejected(&frame);
        }
        result
    }
}

impl Boundary for FramedBoundary {
    fn invoke<'a>(&'a self, invocation: Invocation<'a>) -> BoxFuture<'a, Result<Response>> {
        Box::pin(self.call(invocation))
    }

    fn release(&self, handle: RemoteHandle) {
        self.shared.release(handle);
    }
}

impl Drop for FramedBoundary {
    fn drop(&mut self) {
        self.read_task.abort();
        self.shared.close();
    }
}

impl std::fmt::Debug for FramedBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedBoundary")
            .field("closed", &self.is_closed())
            .field("pending", &self.pending_invocations())
            .field("invoke_timeout", &self.invoke_timeout)
            .finish()
    }
}

fn decode_handle(payload: &[u8]) -> Result<Option<RemoteHandle>> {
    let mut input = InteropInputStream::new(payload);
    BinaryReader::new(&mut input).read_handle()
}

/// Handle carried by a successful object response, if any.
fn carried_handle(frame: &Frame) -> Option<RemoteHandle> {
    if !frame.is_object() || frame.is_error() {
        return None;
    }
    match decode_handle(frame.payload()) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!("Malformed object response {}: {}", frame.request_id(), e);
            None
        }
    }
}

/// Turn a response frame into a [`Response`] of the expected shape.
fn decode_response(frame: &Frame, op: i32, shape: ResponseShape) -> Result<Response> {
    if frame.is_error() {
        let fault: RemoteFault = MsgPackCodec::decode(frame.payload())?;
        return Err(fault.into());
    }

    let mut input = InteropInputStream::new(frame.payload());
    let mut reader = BinaryReader::new(&mut input);
    let response = match shape {
        ResponseShape::Object => Response::Object(reader.read_handle()?),
        ResponseShape::Long => Response::Long(reader.read_i64()?),
    };

    if input.remaining() != 0 {
        return Err(GridwireError::Decoding(format!(
            "{} trailing bytes in response to op {}",
            input.remaining(),
            op
        )));
    }
    Ok(response)
}

async fn read_loop<R>(
    reader: R,
    shared: Arc<Shared>,
    binding: Arc<Binding>,
    semaphore: Arc<Semaphore>,
    max_payload_size: u32,
) where
    R: AsyncRead + Unpin,
{
    match read_frames(reader, &shared, &binding, &semaphore, max_payload_size).await {
        Ok(()) => tracing::debug!("Processor closed the connection"),
        Err(e) if e.is_disconnect() => tracing::debug!("Connection lost: {}", e),
        Err(e) => tracing::error!("Read loop error: {}", e),
    }
    shared.close();
}

async fn read_frames<R>(
    mut reader: R,
    shared: &Shared,
    binding: &Arc<Binding>,
    semaphore: &Arc<Semaphore>,
    max_payload_size: u32,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::with_max_payload(max_payload_size);
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        for frame in frame_buffer.push(&buf[..n])? {
            dispatch_frame(frame, shared, binding, semaphore, max_payload_size);
        }
    }
}

fn dispatch_frame(
    frame: Frame,
    shared: &Shared,
    binding: &Arc<Binding>,
    semaphore: &Arc<Semaphore>,
    max_payload_size: u32,
) {
    if frame.is_callback() {
        if frame.is_response() {
            // Callback answers only flow toward the processor
            tracing::warn!(
                "Ignoring callback answer from the processor (type {}, request {})",
                frame.op_code(),
                frame.request_id()
            );
        } else {
            dispatch_callback(frame, shared.writer.clone(), binding, semaphore, max_payload_size);
        }
        return;
    }

    if !frame.is_response() {
        tracing::warn!(
            "Ignoring unexpected frame (op {}, flags {:#04x})",
            frame.op_code(),
            frame.header.flags
        );
        return;
    }

    let waiter = shared
        .pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&frame.request_id());

    match waiter {
        Some(tx) => {
            if let Err(frame) = tx.send(frame) {
                shared.release_orphan(&frame);
            }
        }
        None => shared.release_orphan(&frame),
    }
}

fn dispatch_callback(
    frame: Frame,
    writer: WriterHandle,
    binding: &Arc<Binding>,
    semaphore: &Arc<Semaphore>,
    max_payload_size: u32,
) {
    let type_id = frame.op_code();
    let request_id = frame.request_id();

    let permit = match semaphore.clone().try_acquire_owned() {
        Ok(p) => p,
        Err(_) => {
            tracing::warn!("Callback capacity reached, rejecting callback {}", type_id);
            let fault = RemoteFault {
                code: FAULT_OVERLOADED,
                message: "Callback capacity reached".to_string(),
            };
            tokio::spawn(answer_callback(
                writer,
                type_id,
                request_id,
                Err(fault),
                max_payload_size,
            ));
            return;
        }
    };

    let call = binding.dispatch(type_id, frame.payload());
    tokio::spawn(async move {
        let _permit = permit;

        let outcome = call.await.map_err(|e| {
            tracing::error!("Callback {} failed: {}", type_id, e);
            let code = match e {
                GridwireError::CallbackNotFound(_) => FAULT_UNKNOWN_CALLBACK,
                _ => FAULT_CALLBACK_FAILED,
            };
            RemoteFault {
                code,
                message: e.to_string(),
            }
        });
        answer_callback(writer, type_id, request_id, outcome, max_payload_size).await;
    });
}

async fn answer_callback(
    writer: WriterHandle,
    type_id: i32,
    request_id: u32,
    outcome: std::result::Result<Vec<u8>, RemoteFault>,
    max_payload_size: u32,
) {
    if request_id == 0 {
        return;
    }

    let fits = |len: usize| u32::try_from(len).ok().filter(|len| *len <= max_payload_size);
    let outcome = match outcome {
        Ok(payload) if fits(payload.len()).is_none() => {
            tracing::error!(
                "Callback {} result of {} bytes exceeds maximum {}",
                type_id,
                payload.len(),
                max_payload_size
            );
            Err(RemoteFault {
                code: FAULT_CALLBACK_FAILED,
                message: format!(
                    "Callback result of {} bytes exceeds maximum {}",
                    payload.len(),
                    max_payload_size
                ),
            })
        }
        outcome => outcome,
    };

    let (frame_flags, payload) = match outcome {
        Ok(payload) => (flags::CALLBACK_RESPONSE, payload),
        Err(fault) => match MsgPackCodec::encode(&fault) {
            Ok(payload) => (flags::CALLBACK_ERROR, payload),
            Err(e) => {
                tracing::error!("Failed to encode callback fault: {}", e);
                return;
            }
        },
    };

    let payload_length = match fits(payload.len()) {
        Some(len) => len,
        None => {
            tracing::error!(
                "Answer to callback {} of {} bytes exceeds maximum {}",
                type_id,
                payload.len(),
                max_payload_size
            );
            return;
        }
    };

    let header = Header::new(type_id, frame_flags, request_id, 0, payload_length);
    if let Err(e) = writer.send(OutboundFrame::new(&header, Bytes::from(payload))).await {
        tracing::warn!("Failed to answer callback {}: {}", type_id, e);
    }
}
