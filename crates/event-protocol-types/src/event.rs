//! Event record produced by the host application.

use crate::CodecError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use uuid::Uuid;

/// Free-form event properties (string keys, arbitrary JSON values).
pub type Properties = Map<String, Value>;

/// Unique identifier for an event (UUID string unless caller-assigned).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates an event ID from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the event ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of event.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A user action.
    Track,
    /// A screen or page view.
    Screen,
    /// An identity association.
    Identify,
}

impl EventKind {
    /// Returns the storage tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Track => "track",
            EventKind::Screen => "screen",
            EventKind::Identify => "identify",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(EventKind::Track),
            "screen" => Ok(EventKind::Screen),
            "identify" => Ok(EventKind::Identify),
            other => Err(CodecError::UnknownKind(other.to_string())),
        }
    }
}

/// A single recorded occurrence.
///
/// Events are immutable once built. The builder methods consume and return
/// the event so a caller can assemble one in a single expression:
///
/// ```
/// use event_protocol_types::{Event, EventKind};
///
/// let event = Event::new(EventKind::Track, "checkout", "session-1")
///     .with_property("amount", 42)
///     .with_subject("user-7");
/// assert_eq!(event.name, "checkout");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
}

impl Event {
    /// Creates an event with a fresh ID and the current time.
    pub fn new(kind: EventKind, name: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            kind,
            name: name.into(),
            properties: None,
            timestamp: Utc::now(),
            session_id: session_id.into(),
            subject_id: None,
        }
    }

    /// Replaces the generated ID with a caller-assigned one.
    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = id.into();
        self
    }

    /// Replaces the creation timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the full property map.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Adds a single property, creating the map if needed.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Sets the subject identifier as given.
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Sets the subject identifier to the SHA-256 hex digest of `raw`.
    pub fn with_hashed_subject(mut self, raw: &str) -> Self {
        self.subject_id = Some(hash_subject(raw));
        self
    }
}

/// One-way hash used for subject identifiers.
pub(crate) fn hash_subject(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    format!("{:x}", digest)
}
