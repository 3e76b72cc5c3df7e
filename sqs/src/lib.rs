#![deny(unsafe_code)]

//! # Overall Example
//! ```rust,no_run
//!
//! use sqs::conf::{Options, Settings};
//! use sqs::{api, ServerContext, Storage};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::new(Options::default())?;
//!     let storage = Storage::new(&settings).await?;
//!     let scx = ServerContext::new(settings.clone(), storage).start().await?;
//!
//!     let listener = tokio::net::TcpListener::bind(settings.node.laddr).await?;
//!     let (_tx, rx) = tokio::sync::oneshot::channel();
//!     api::listen_and_serve(scx, listener, rx).await
//! }
//! ```

pub mod api; // HTTP routes of a serving node
pub mod backend; // memory, sled and redis stores
pub mod context; // Shared server context
pub mod error;
pub mod kv; // Store and counter traits, key layout
mod locks;
pub mod logger;
pub mod message; // Message push and pull
pub mod node; // Cluster routing and sessions
pub mod queue; // Queue directory and id counters
pub mod squad; // Acknowledged ids per squad
pub mod storage;
pub mod types;
pub mod user;

pub use context::ServerContext;
pub use error::{Result, SqsError};
pub use storage::Storage;

pub use sqs_conf as conf;
pub use sqs_utils as utils;
