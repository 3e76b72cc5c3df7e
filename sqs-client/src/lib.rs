#![deny(unsafe_code)]

//! Client of the sqs queue service
//!
//! ```rust,no_run
//! use sqs_client::{Client, Options};
//!
//! #[tokio::main]
//! async fn main() -> sqs_client::Result<()> {
//!     let client = Client::new(Options::new("127.0.0.1:5446", "root", "sqsrootsecret"))?;
//!     let mut queue = client.queue("orders", "")?;
//!     queue.apply_node().await?;
//!     queue.push_message("hello").await?;
//!     queue
//!         .pull_message(|msgs| async move {
//!             for m in msgs {
//!                 println!("{}: {}", m.message_id, m.content);
//!             }
//!             Ok::<(), std::io::Error>(())
//!         })
//!         .await?;
//!     client.close().await;
//!     Ok(())
//! }
//! ```

mod ack;
mod client;
mod error;
mod options;
mod types;

pub use client::{Client, QueueClient};
pub use error::{ClientError, Result};
pub use options::{AckRetry, Options};
pub use types::{BaseInfo, Message, MessageId, MessageIdRange, QueueInfo, UserAuth, DEFAULT_SQUAD};
