//! Batch of events formed for a single delivery attempt.

use crate::{Event, EventId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a batch, generated at formation time.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub String);

impl BatchId {
    /// Creates a new random batch ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the batch ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable, ordered group of events.
///
/// Fields are private so a formed batch cannot gain or lose events; the
/// events keep the order in which they were buffered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    id: BatchId,
    events: Vec<Event>,
    formed_at: DateTime<Utc>,
}

impl Batch {
    /// Forms a batch with a fresh ID stamped with the current time.
    pub fn form(events: Vec<Event>) -> Self {
        Self {
            id: BatchId::new(),
            events,
            formed_at: Utc::now(),
        }
    }

    /// Rebuilds a batch from its parts (used by decoders).
    pub fn from_parts(id: BatchId, events: Vec<Event>, formed_at: DateTime<Utc>) -> Self {
        Self {
            id,
            events,
            formed_at,
        }
    }

    /// Batch identifier.
    pub fn id(&self) -> &BatchId {
        &self.id
    }

    /// Events in buffer order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Formation timestamp.
    pub fn formed_at(&self) -> DateTime<Utc> {
        self.formed_at
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the batch holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the event IDs in this batch.
    pub fn event_ids(&self) -> Vec<EventId> {
        self.events.iter().map(|e| e.id.clone()).collect()
    }
}
