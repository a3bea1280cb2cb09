//! Durable, bounded FIFO queue of events awaiting delivery.
//!
//! This crate provides:
//! - [`DurableQueue`]: namespace-keyed queue with lifecycle guards and
//!   oldest-first eviction when a capacity is configured
//! - [`EventStore`]: the key-ordered table abstraction the queue persists into
//! - [`SqliteEventStore`]: the SQLite implementation, one database file per namespace
//!
//! # Example
//!
//! ```ignore
//! let queue = DurableQueue::new("my-app", QueueStorage::Directory(dir), 1000);
//! queue.initialize().await?;
//! queue.enqueue(&event).await?;
//! let pending = queue.get_all().await?;
//! ```

mod error;
mod queue;
mod sqlite;
mod store;

pub use error::{QueueError, QueueResult};
pub use queue::{DurableQueue, QueueStorage};
pub use sqlite::SqliteEventStore;
pub use store::EventStore;
