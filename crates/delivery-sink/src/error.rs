//! Error types for the delivery sink and its transports.

use event_protocol_types::CodecError;
use thiserror::Error;

/// Failure of a single transport call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network or transport-level HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint returned a non-success HTTP status.
    #[error("Endpoint error: {status} - {message}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body.
        message: String,
    },

    /// Response body did not match the expected schema.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid endpoint or credentials.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using TransportError.
pub type TransportResult<T> = Result<T, TransportError>;

/// Delivery sink error type.
#[derive(Debug, Error)]
pub enum SinkError {
    /// `send_batch` before a successful `initialize`
    #[error("Sink not initialized")]
    NotInitialized,

    /// `initialize` on a sink that is already initialized
    #[error("Sink already initialized")]
    AlreadyInitialized,

    /// Operation on a disposed sink
    #[error("Sink disposed")]
    Disposed,

    /// Endpoint could not be reached during initialization
    #[error("Endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    /// Endpoint reported a different identity than configured
    #[error("Endpoint identity mismatch: expected {expected}, observed {observed}")]
    IdentityMismatch { expected: String, observed: String },

    /// Batch could not be encoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Every attempt for a batch failed
    #[error("Delivery of batch {batch_id} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        batch_id: String,
        attempts: u32,
        last_error: String,
    },
}

/// Result type alias using SinkError.
pub type SinkResult<T> = Result<T, SinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = TransportError::Status {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "Endpoint error: 503 - overloaded");
    }

    #[test]
    fn identity_mismatch_states_both_sides() {
        let err = SinkError::IdentityMismatch {
            expected: "prod-collector".to_string(),
            observed: "staging-collector".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("expected prod-collector"));
        assert!(display.contains("observed staging-collector"));
    }

    #[test]
    fn retries_exhausted_display() {
        let err = SinkError::RetriesExhausted {
            batch_id: "b-1".to_string(),
            attempts: 4,
            last_error: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Delivery of batch b-1 failed after 4 attempts: timeout"
        );
    }
}
