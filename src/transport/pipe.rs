//! Platform-specific pipe/socket connector.
//!
//! - Unix: Unix Domain Socket
//! - Windows: Named Pipe client
//!
//! The processor owns the endpoint; this side only connects to it.
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> gridwire::Result<()> {
//! use gridwire::transport::PipeStream;
//!
//! let stream = PipeStream::connect("/tmp/grid-node.sock").await?;
//! let (reader, writer) = stream.into_split();
//! # let _ = (reader, writer);
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::Result;

// ============================================================================
// Unix Implementation
// ============================================================================

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use tokio::net::UnixStream;

    /// Unix Domain Socket stream (connected).
    pub struct PipeStream {
        pub(super) stream: UnixStream,
    }

    impl PipeStream {
        /// Connect to the processor's socket at `path`.
        pub async fn connect(path: &str) -> Result<Self> {
            let stream = UnixStream::connect(path).await?;
            tracing::debug!("Connected to processor at {}", path);
            Ok(Self { stream })
        }

        /// Split into read and write halves.
        pub fn into_split(
            self,
        ) -> (
            impl AsyncRead + Unpin + Send + 'static,
            impl AsyncWrite + Unpin + Send + 'static,
        ) {
            self.stream.into_split()
        }
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use std::time::Duration;
    use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient};

    /// ERROR_PIPE_BUSY: every server instance is taken, retry shortly.
    const ERROR_PIPE_BUSY: i32 = 231;

    /// Windows Named Pipe stream (connected).
    pub struct PipeStream {
        pub(super) stream: NamedPipeClient,
    }

    impl PipeStream {
        /// Connect to the processor's named pipe at `path`.
        pub async fn connect(path: &str) -> Result<Self> {
            let stream = loop {
                match ClientOptions::new().open(path) {
                    Ok(client) => break client,
                    Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    Err(e) => return Err(e.into()),
                }
            };
            tracing::debug!("Connected to processor at {}", path);
            Ok(Self { stream })
        }

        /// Split into read and write halves.
        pub fn into_split(
            self,
        ) -> (
            impl AsyncRead + Unpin + Send + 'static,
            impl AsyncWrite + Unpin + Send + 'static,
        ) {
            tokio::io::split(self)
        }
    }
}

// ============================================================================
// Platform-independent re-exports
// ============================================================================

#[cfg(unix)]
pub use unix_impl::PipeStream;

#[cfg(windows)]
pub use windows_impl::PipeStream;

impl AsyncRead for PipeStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for PipeStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
