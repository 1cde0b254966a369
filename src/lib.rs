//! # gridwire
//!
//! Client-side proxy for a data-grid node whose processor lives in another
//! process.
//!
//! Every operation on a [`Node`] is encoded into a pooled buffer, tagged with
//! an operation code and sent across the [`Boundary`]. The processor answers
//! with a remote object handle, a scalar, or an error; handles come back
//! wrapped in typed sub-proxies ([`CacheProxy`], [`TransactionsProxy`],
//! [`ClusterGroupProxy`], [`ComputeProxy`]) that release them when dropped.
//!
//! ## Architecture
//!
//! - **Request encoding**: [`binary`] values written into [`memory`] buffers
//! - **Framing** (pipe/socket): 21-byte [`protocol`] header, binary payloads
//! - **Callbacks**: the processor may invoke closures registered on the
//!   [`Binding`], MsgPack in both directions
//!
//! ## Example
//!
//! ```no_run
//! use gridwire::{InteropConfig, Node};
//!
//! #[tokio::main]
//! async fn main() -> gridwire::Result<()> {
//!     let config = InteropConfig::from_file("node.json")?;
//!     let node = Node::connect(config).await?;
//!
//!     match node.get_cache("orders").await? {
//!         Some(cache) => println!("found {} as {}", cache.name(), cache.handle()),
//!         None => println!("no such cache"),
//!     }
//!
//!     let compute = node.compute().await?;
//!     println!("compute facade {}", compute.handle());
//!     Ok(())
//! }
//! ```

pub mod binary;
pub mod binding;
pub mod boundary;
pub mod codec;
pub mod config;
pub mod environment;
pub mod error;
pub mod memory;
pub mod node;
pub mod ops;
pub mod protocol;
pub mod proxy;
pub mod target;
pub mod transport;
pub mod writer;

pub use binding::Binding;
pub use boundary::{Boundary, FramedBoundary, RemoteHandle};
pub use config::InteropConfig;
pub use environment::{Environment, EnvironmentBuilder};
pub use error::{GridwireError, Result};
pub use node::{Node, NodeProxy};
pub use ops::{ClusterGroupOp, ProcessorOp};
pub use proxy::{CacheProxy, ClusterGroupProxy, ComputeProxy, TransactionsProxy};
