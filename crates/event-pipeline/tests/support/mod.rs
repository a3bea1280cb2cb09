//! Shared fakes for pipeline integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use delivery_sink::{Destination, Payload, Receipt, SinkConfig, Transport, TransportError, TransportResult};
use durable_event_queue::{EventStore, QueueError, QueueResult, QueueStorage, SqliteEventStore};
use event_pipeline::{EventPipeline, PipelineOptions};
use event_protocol_types::{Batch, Event, EventId, EventKind, JsonCodec, PayloadCodec};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const IDENTITY: &str = "collector-test";

/// Transport that decodes and records delivered batches.
pub struct MockTransport {
    identity: String,
    failing: AtomicBool,
    attempts: AtomicUsize,
    closed: AtomicBool,
    delivered: Mutex<Vec<Batch>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Self::with_identity(IDENTITY)
    }

    pub fn with_identity(identity: &str) -> Arc<Self> {
        Arc::new(Self {
            identity: identity.to_string(),
            failing: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            delivered: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        let transport = Self::new();
        transport.set_failing(true);
        transport
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<Batch> {
        self.delivered.lock().clone()
    }

    pub fn delivered_ids(&self) -> Vec<Vec<String>> {
        self.delivered
            .lock()
            .iter()
            .map(|b| b.event_ids().into_iter().map(|id| id.0).collect())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn endpoint(&self) -> String {
        "mock://collector".to_string()
    }

    async fn probe(&self) -> TransportResult<String> {
        Ok(self.identity.clone())
    }

    async fn transmit(&self, payload: &Payload, _destination: &Destination) -> TransportResult<Receipt> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                status: 503,
                message: "collector unavailable".to_string(),
            });
        }

        let batch = JsonCodec
            .decode(&payload.bytes)
            .map_err(|e| TransportError::Config(e.to_string()))?;
        self.delivered.lock().push(batch);
        Ok(Receipt(format!("receipt-{}", attempt)))
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// SQLite store whose deletes fail for selected IDs.
pub struct FlakyDeleteStore {
    inner: SqliteEventStore,
    undeletable: Mutex<HashSet<String>>,
}

impl FlakyDeleteStore {
    pub async fn new(undeletable: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteEventStore::open_in_memory().await.unwrap(),
            undeletable: Mutex::new(undeletable.iter().map(|s| s.to_string()).collect()),
        })
    }
}

#[async_trait]
impl EventStore for FlakyDeleteStore {
    async fn insert(&self, event: &Event) -> QueueResult<()> {
        self.inner.insert(event).await
    }

    async fn overwrite(&self, event: &Event) -> QueueResult<bool> {
        self.inner.overwrite(event).await
    }

    async fn scan_ordered(&self) -> QueueResult<Vec<Event>> {
        self.inner.scan_ordered().await
    }

    async fn delete(&self, id: &EventId) -> QueueResult<bool> {
        if self.undeletable.lock().contains(id.as_str()) {
            return Err(QueueError::Storage(format!("cannot delete {}", id)));
        }
        self.inner.delete(id).await
    }

    async fn delete_oldest(&self) -> QueueResult<Option<EventId>> {
        self.inner.delete_oldest().await
    }

    async fn delete_all(&self) -> QueueResult<usize> {
        self.inner.delete_all().await
    }

    async fn count(&self) -> QueueResult<usize> {
        self.inner.count().await
    }

    async fn close(&self) -> QueueResult<()> {
        self.inner.close().await
    }
}

pub fn event(id: &str) -> Event {
    Event::new(EventKind::Track, format!("action-{}", id), "session-1").with_id(id)
}

/// Options with a long flush interval and millisecond retries.
pub fn options(storage: Option<QueueStorage>, batch_size: usize) -> PipelineOptions {
    PipelineOptions {
        namespace: "test".to_string(),
        storage,
        max_queue_size: 100,
        assembler: batch_assembler::AssemblerConfig {
            batch_size,
            flush_interval: Duration::from_secs(3600),
        },
        sink: SinkConfig {
            max_retries: 1,
            retry_delay: Duration::from_millis(1),
            max_retry_delay: Duration::from_millis(2),
            destination: Destination::new("events"),
            expected_identity: Some(IDENTITY.to_string()),
        },
    }
}

pub fn pipeline(options: PipelineOptions, transport: Arc<MockTransport>) -> EventPipeline {
    EventPipeline::new(options, transport, Arc::new(JsonCodec)).unwrap()
}
