//! Dedicated writer task for outbound frames.
//!
//! Every frame leaving this side of the boundary (invocations, callback
//! answers, releases) goes through a single task fed by an mpsc channel, so
//! concurrent callers never contend on the pipe and ready frames are batched
//! into vectored writes.
//!
//! ```text
//! Invocation ──┐
//! Callback   ──┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Pipe
//! Release    ──┘
//! ```

use std::io::IoSlice;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;

use crate::error::{GridwireError, Result};
use crate::protocol::{Header, HEADER_SIZE};

/// Default maximum pending frames before backpressure kicks in.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 1024;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default backpressure timeout.
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written to the pipe.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header.
    pub header: [u8; HEADER_SIZE],
    /// Payload bytes (empty for releases).
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    #[inline]
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// Create a new outbound frame with empty payload.
    #[inline]
    pub fn empty(header: &Header) -> Self {
        Self::new(header, Bytes::new())
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum pending frames before backpressure kicks in.
    pub max_pending_frames: usize,
    /// Channel capacity for frame queue.
    pub channel_capacity: usize,
    /// Timeout when waiting for backpressure to clear.
    pub backpressure_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
        }
    }
}

/// Handle for sending frames to the writer task.
///
/// Each queued frame holds one credit until the writer task has put it on the
/// pipe; senders wait for credits when `max_pending_frames` are in flight.
/// Cheaply cloneable.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    credits: Arc<Semaphore>,
    max_pending: usize,
    timeout: Duration,
}

impl WriterHandle {
    fn new(
        tx: mpsc::Sender<OutboundFrame>,
        credits: Arc<Semaphore>,
        max_pending: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            tx,
            credits,
            max_pending,
            timeout,
        }
    }

    /// Queue a frame for the writer task.
    ///
    /// # Errors
    ///
    /// Returns `BackpressureTimeout` if no credit frees up within the
    /// configured duration, `ConnectionClosed` if the writer task is gone.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        let credit = match tokio::time::timeout(self.timeout, self.credits.acquire()).await {
            Ok(Ok(credit)) => credit,
            Ok(Err(_)) => return Err(GridwireError::ConnectionClosed),
            Err(_) => {
                tracing::warn!("{} frames in flight, backpressure timeout", self.pending_count());
                return Err(GridwireError::BackpressureTimeout);
            }
        };

        self.tx
            .send(frame)
            .await
            .map_err(|_| GridwireError::ConnectionClosed)?;
        // Returned by the writer task once the frame is written
        credit.forget();
        Ok(())
    }

    /// Queue a frame without waiting.
    ///
    /// Used where the caller cannot await, such as releasing a handle from
    /// `Drop`.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<()> {
        let credit = self.credits.try_acquire().map_err(|e| match e {
            TryAcquireError::NoPermits => GridwireError::BackpressureTimeout,
            TryAcquireError::Closed => GridwireError::ConnectionClosed,
        })?;

        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => GridwireError::BackpressureTimeout,
            mpsc::error::TrySendError::Closed(_) => GridwireError::ConnectionClosed,
        })?;
        credit.forget();
        Ok(())
    }

    /// Frames queued or being written.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.max_pending
            .saturating_sub(self.credits.available_permits())
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends cleanly once every `WriterHandle` is dropped. If a write
/// fails, waiting senders are woken with `ConnectionClosed`.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let credits = Arc::new(Semaphore::new(config.max_pending_frames));

    let handle = WriterHandle::new(
        tx,
        credits.clone(),
        config.max_pending_frames,
        config.backpressure_timeout,
    );

    let task = tokio::spawn(writer_loop(rx, writer, credits));

    (handle, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut writer: W,
    credits: Arc<Semaphore>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!("Failed to write {} frames: {}", batch.len(), e);
            credits.close();
            return Err(e);
        }

        credits.add_permits(batch.len());
        batch.clear();
    }

    tracing::debug!("All writer handles dropped, writer task done");
    Ok(())
}

/// Write a batch of frames with vectored I/O, resuming after partial writes.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(|f| f.size()).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(GridwireError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for remaining data after `skip_bytes` were written.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        let parts: [&[u8]; 2] = [&frame.header, &frame.payload];
        for part in parts {
            let end = offset + part.len();
            if !part.is_empty() && skip_bytes < end {
                let start = skip_bytes.saturating_sub(offset);
                slices.push(IoSlice::new(&part[start..]));
            }
            offset = end;
        }
    }

    slices
}
