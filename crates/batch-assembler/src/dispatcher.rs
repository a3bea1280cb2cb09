//! Receiver of formed batches.

use async_trait::async_trait;
use event_protocol_types::Batch;

/// Consumes batches formed by a [`BatchAssembler`](crate::BatchAssembler).
///
/// Calls arrive one at a time in formation order. An `Err` is logged by the
/// assembler; the batch's events are not buffered again.
#[async_trait]
pub trait BatchDispatcher: Send + Sync {
    async fn dispatch(&self, batch: Batch) -> Result<(), String>;
}
