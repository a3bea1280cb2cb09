//! Durable queue error types.

use thiserror::Error;

/// Durable queue error type.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Operation attempted before `initialize()` (or after `close()`)
    #[error("Queue not initialized")]
    NotInitialized,

    /// `initialize()` called on an already open queue
    #[error("Queue already initialized")]
    AlreadyInitialized,

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Executor connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Stored row could not be mapped back to an event
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a custom store
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias using QueueError.
pub type QueueResult<T> = Result<T, QueueError>;
