//! Namespace-keyed durable queue with lifecycle guards and bounded capacity.

use crate::{EventStore, QueueError, QueueResult, SqliteEventStore};
use event_protocol_types::{Event, EventId};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Where a queue keeps its rows.
#[derive(Clone)]
pub enum QueueStorage {
    /// One SQLite file per namespace inside this directory.
    Directory(PathBuf),
    /// SQLite in memory; contents are lost on close.
    InMemory,
    /// Caller-supplied store.
    Custom(Arc<dyn EventStore>),
}

impl fmt::Debug for QueueStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStorage::Directory(dir) => f.debug_tuple("Directory").field(dir).finish(),
            QueueStorage::InMemory => f.write_str("InMemory"),
            QueueStorage::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

enum QueueState {
    NotInitialized,
    Open(Arc<dyn EventStore>),
    Closed,
}

/// Durable FIFO of events awaiting delivery.
///
/// Every operation holds the state lock for its full duration, so the
/// size check and eviction inside `enqueue` are atomic with the insert.
/// A `max_queue_size` of 0 means unbounded.
pub struct DurableQueue {
    namespace: String,
    storage: QueueStorage,
    max_queue_size: usize,
    state: Mutex<QueueState>,
}

impl DurableQueue {
    /// Create a queue handle. Nothing is opened until [`initialize`](Self::initialize).
    pub fn new(namespace: impl Into<String>, storage: QueueStorage, max_queue_size: usize) -> Self {
        Self {
            namespace: namespace.into(),
            storage,
            max_queue_size,
            state: Mutex::new(QueueState::NotInitialized),
        }
    }

    /// Namespace this queue persists under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether the queue is open.
    pub async fn is_initialized(&self) -> bool {
        matches!(*self.state.lock().await, QueueState::Open(_))
    }

    /// Open the backing storage for this namespace.
    ///
    /// Fails with `AlreadyInitialized` if the queue is open. A closed queue
    /// may be initialized again.
    pub async fn initialize(&self) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        if matches!(*state, QueueState::Open(_)) {
            return Err(QueueError::AlreadyInitialized);
        }

        let store: Arc<dyn EventStore> = match &self.storage {
            QueueStorage::Directory(dir) => {
                let path = dir.join(format!("{}.sqlite", file_stem(&self.namespace)));
                Arc::new(SqliteEventStore::open(&path).await?)
            }
            QueueStorage::InMemory => Arc::new(SqliteEventStore::open_in_memory().await?),
            QueueStorage::Custom(store) => store.clone(),
        };

        let pending = store.count().await?;
        info!(
            namespace = %self.namespace,
            pending,
            max_queue_size = self.max_queue_size,
            "Durable queue initialized"
        );

        *state = QueueState::Open(store);
        Ok(())
    }

    /// Persist an event.
    ///
    /// An event whose ID is already queued is updated in place and keeps its
    /// position. Otherwise, when the queue is at capacity, the oldest event is
    /// evicted before the new one is appended.
    pub async fn enqueue(&self, event: &Event) -> QueueResult<()> {
        let state = self.state.lock().await;
        let store = open_store(&state)?;

        if store.overwrite(event).await? {
            debug!(namespace = %self.namespace, event_id = %event.id, "Updated queued event in place");
            return Ok(());
        }

        if self.max_queue_size > 0 {
            let count = store.count().await?;
            // Normally exactly one; more only if the capacity was lowered
            // since the rows were written.
            let excess = (count + 1).saturating_sub(self.max_queue_size);
            for _ in 0..excess {
                match store.delete_oldest().await? {
                    Some(evicted) => warn!(
                        namespace = %self.namespace,
                        evicted_id = %evicted,
                        max_queue_size = self.max_queue_size,
                        "Queue full, evicted oldest event"
                    ),
                    None => break,
                }
            }
        }

        store.insert(event).await?;
        debug!(namespace = %self.namespace, event_id = %event.id, "Enqueued event");
        Ok(())
    }

    /// Every queued event, oldest first.
    pub async fn get_all(&self) -> QueueResult<Vec<Event>> {
        let state = self.state.lock().await;
        open_store(&state)?.scan_ordered().await
    }

    /// Remove one event by ID. Removing an absent ID is not an error.
    pub async fn remove(&self, id: &EventId) -> QueueResult<()> {
        let state = self.state.lock().await;
        let removed = open_store(&state)?.delete(id).await?;
        if !removed {
            debug!(namespace = %self.namespace, event_id = %id, "Remove of absent event ignored");
        }
        Ok(())
    }

    /// Remove every event.
    pub async fn clear(&self) -> QueueResult<()> {
        let state = self.state.lock().await;
        let removed = open_store(&state)?.delete_all().await?;
        info!(namespace = %self.namespace, removed, "Cleared durable queue");
        Ok(())
    }

    /// Number of queued events.
    pub async fn count(&self) -> QueueResult<usize> {
        let state = self.state.lock().await;
        open_store(&state)?.count().await
    }

    /// Release the backing storage.
    ///
    /// Closing a queue that is not open is a no-op.
    pub async fn close(&self) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, QueueState::Closed);
        match previous {
            QueueState::Open(store) => {
                store.close().await?;
                info!(namespace = %self.namespace, "Durable queue closed");
            }
            QueueState::NotInitialized => *state = QueueState::NotInitialized,
            QueueState::Closed => {}
        }
        Ok(())
    }
}

fn open_store(state: &QueueState) -> QueueResult<&Arc<dyn EventStore>> {
    match state {
        QueueState::Open(store) => Ok(store),
        QueueState::NotInitialized | QueueState::Closed => Err(QueueError::NotInitialized),
    }
}

/// Map a namespace to a safe file stem.
fn file_stem(namespace: &str) -> String {
    let stem: String = namespace
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "default".to_string()
    } else {
        stem
    }
}
