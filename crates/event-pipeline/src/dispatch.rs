//! Hands formed batches to the sink and retires delivered events.

use async_trait::async_trait;
use batch_assembler::BatchDispatcher;
use delivery_sink::DeliverySink;
use durable_event_queue::DurableQueue;
use event_protocol_types::Batch;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Dispatcher installed into the pipeline's assembler.
pub(crate) struct DeliveryDispatcher {
    sink: Arc<DeliverySink>,
    queue: Option<Arc<DurableQueue>>,
}

impl DeliveryDispatcher {
    pub(crate) fn new(sink: Arc<DeliverySink>, queue: Option<Arc<DurableQueue>>) -> Self {
        Self { sink, queue }
    }
}

#[async_trait]
impl BatchDispatcher for DeliveryDispatcher {
    async fn dispatch(&self, batch: Batch) -> Result<(), String> {
        let batch_id = batch.id().clone();

        match self.sink.send_batch(&batch).await {
            Ok(receipt) => {
                let Some(queue) = &self.queue else {
                    return Ok(());
                };

                // Per-event removal: a failure leaves that event queued and
                // does not undo the others.
                let mut failed = 0usize;
                for id in batch.event_ids() {
                    if let Err(e) = queue.remove(&id).await {
                        failed += 1;
                        warn!(
                            batch_id = %batch_id,
                            event_id = %id,
                            error = %e,
                            "Failed to remove delivered event from queue"
                        );
                    }
                }

                debug!(
                    batch_id = %batch_id,
                    receipt = %receipt,
                    removed = batch.len() - failed,
                    failed,
                    "Retired delivered events"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    batch_id = %batch_id,
                    events = batch.len(),
                    error = %e,
                    "Batch delivery failed, events remain queued"
                );
                Err(e.to_string())
            }
        }
    }
}
