//! SQLite-backed event store.

use crate::{EventStore, QueueError, QueueResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use event_protocol_types::{Event, EventId, EventKind, Properties};
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pending_events (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        properties TEXT,
        timestamp TEXT NOT NULL,
        session_id TEXT NOT NULL,
        subject_id TEXT
    );
";

/// Convert a tokio_rusqlite::Error to QueueError.
fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> QueueError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => QueueError::Sqlite(e),
        tokio_rusqlite::Error::Close(_) => QueueError::Connection("Connection closed".to_string()),
        other => QueueError::Connection(other.to_string()),
    }
}

/// Column values of one row, bound or read verbatim.
///
/// JSON and timestamp conversion happens outside the SQLite thread.
struct EventRow {
    id: String,
    kind: String,
    name: String,
    properties: Option<String>,
    timestamp: String,
    session_id: String,
    subject_id: Option<String>,
}

impl EventRow {
    fn from_event(event: &Event) -> QueueResult<Self> {
        let properties = event
            .properties
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        Ok(Self {
            id: event.id.as_str().to_string(),
            kind: event.kind.as_str().to_string(),
            name: event.name.clone(),
            properties,
            timestamp: event.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            session_id: event.session_id.clone(),
            subject_id: event.subject_id.clone(),
        })
    }

    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            name: row.get(2)?,
            properties: row.get(3)?,
            timestamp: row.get(4)?,
            session_id: row.get(5)?,
            subject_id: row.get(6)?,
        })
    }

    fn into_event(self) -> QueueResult<Event> {
        let kind: EventKind = self
            .kind
            .parse()
            .map_err(|e| QueueError::InvalidData(format!("event {}: {}", self.id, e)))?;
        let properties = self
            .properties
            .as_deref()
            .map(serde_json::from_str::<Properties>)
            .transpose()?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| QueueError::InvalidData(format!("event {}: {}", self.id, e)))?
            .with_timezone(&Utc);

        Ok(Event {
            id: EventId::from_string(self.id),
            kind,
            name: self.name,
            properties,
            timestamp,
            session_id: self.session_id,
            subject_id: self.subject_id,
        })
    }
}

/// Event store over a single SQLite database.
///
/// All statements run on the tokio-rusqlite executor thread, so calls are
/// applied in the order they are issued.
#[derive(Clone)]
pub struct SqliteEventStore {
    conn: Connection,
    path: String,
}

impl SqliteEventStore {
    /// Open (or create) the store at `path`.
    pub async fn open(path: &Path) -> QueueResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();
        info!(path = %path_str, "Opening event store");

        let conn = Connection::open(&path_str)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        conn.call(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;

        Ok(Self {
            conn,
            path: path_str,
        })
    }

    /// Open a store that lives only as long as this handle.
    pub async fn open_in_memory() -> QueueResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;

        Ok(Self {
            conn,
            path: ":memory:".to_string(),
        })
    }

    async fn call_sqlite<F, T>(&self, f: F) -> QueueResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| Ok(f(conn)?))
            .await
            .map_err(from_tokio_rusqlite)
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn insert(&self, event: &Event) -> QueueResult<()> {
        let row = EventRow::from_event(event)?;
        self.call_sqlite(move |conn| {
            conn.execute(
                "INSERT INTO pending_events (id, kind, name, properties, timestamp, session_id, subject_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.id,
                    row.kind,
                    row.name,
                    row.properties,
                    row.timestamp,
                    row.session_id,
                    row.subject_id
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn overwrite(&self, event: &Event) -> QueueResult<bool> {
        let row = EventRow::from_event(event)?;
        let updated = self
            .call_sqlite(move |conn| {
                conn.execute(
                    "UPDATE pending_events
                     SET kind = ?2, name = ?3, properties = ?4, timestamp = ?5, session_id = ?6, subject_id = ?7
                     WHERE id = ?1",
                    params![
                        row.id,
                        row.kind,
                        row.name,
                        row.properties,
                        row.timestamp,
                        row.session_id,
                        row.subject_id
                    ],
                )
            })
            .await?;
        Ok(updated > 0)
    }

    async fn scan_ordered(&self) -> QueueResult<Vec<Event>> {
        let rows = self
            .call_sqlite(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, kind, name, properties, timestamp, session_id, subject_id
                     FROM pending_events ORDER BY seq ASC",
                )?;
                let rows = stmt
                    .query_map([], EventRow::read)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    async fn delete(&self, id: &EventId) -> QueueResult<bool> {
        let id = id.as_str().to_string();
        let deleted = self
            .call_sqlite(move |conn| conn.execute("DELETE FROM pending_events WHERE id = ?1", [id]))
            .await?;
        Ok(deleted > 0)
    }

    async fn delete_oldest(&self) -> QueueResult<Option<EventId>> {
        let oldest = self
            .call_sqlite(|conn| {
                let oldest: Option<(i64, String)> = conn
                    .query_row(
                        "SELECT seq, id FROM pending_events ORDER BY seq ASC LIMIT 1",
                        [],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                if let Some((seq, _)) = &oldest {
                    conn.execute("DELETE FROM pending_events WHERE seq = ?1", [seq])?;
                }
                Ok(oldest.map(|(_, id)| id))
            })
            .await?;
        Ok(oldest.map(EventId::from_string))
    }

    async fn delete_all(&self) -> QueueResult<usize> {
        self.call_sqlite(|conn| conn.execute("DELETE FROM pending_events", []))
            .await
    }

    async fn count(&self) -> QueueResult<usize> {
        let count: i64 = self
            .call_sqlite(|conn| conn.query_row("SELECT COUNT(*) FROM pending_events", [], |row| row.get(0)))
            .await?;
        Ok(count as usize)
    }

    async fn close(&self) -> QueueResult<()> {
        debug!(path = %self.path, "Closing event store");
        match self.conn.clone().close().await {
            Ok(()) => Ok(()),
            // Already closed through another handle.
            Err(tokio_rusqlite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }
}
