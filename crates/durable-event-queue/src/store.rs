//! Persistent store abstraction used by the durable queue.

use crate::QueueResult;
use async_trait::async_trait;
use event_protocol_types::{Event, EventId};

/// Key-ordered event table.
///
/// Rows are keyed by event ID and ordered by a monotonic insertion sequence
/// owned by the store. Implementations do not enforce capacity; the queue
/// serializes calls and decides what to evict.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append a new row at the tail of the insertion order.
    async fn insert(&self, event: &Event) -> QueueResult<()>;

    /// Replace the row with the same ID, keeping its position.
    ///
    /// Returns false (and writes nothing) when no such row exists.
    async fn overwrite(&self, event: &Event) -> QueueResult<bool>;

    /// All rows in insertion order.
    async fn scan_ordered(&self) -> QueueResult<Vec<Event>>;

    /// Delete one row by ID. Returns whether a row was deleted.
    async fn delete(&self, id: &EventId) -> QueueResult<bool>;

    /// Delete the row with the lowest insertion sequence.
    async fn delete_oldest(&self) -> QueueResult<Option<EventId>>;

    /// Delete every row. Returns the number deleted.
    async fn delete_all(&self) -> QueueResult<usize>;

    /// Number of rows.
    async fn count(&self) -> QueueResult<usize>;

    /// Release the underlying resource.
    async fn close(&self) -> QueueResult<()>;
}
