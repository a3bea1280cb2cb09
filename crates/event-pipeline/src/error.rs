//! Pipeline error types.

use batch_assembler::AssemblerError;
use delivery_sink::{SinkError, TransportError};
use durable_event_queue::QueueError;
use pipeline_config_and_utils::CoreError;
use thiserror::Error;

/// Pipeline error type.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Operation attempted before `initialize()`
    #[error("Pipeline not initialized")]
    NotInitialized,

    /// `initialize()` called on a running pipeline
    #[error("Pipeline already initialized")]
    AlreadyInitialized,

    /// `initialize()` called after `shutdown()`
    #[error("Pipeline has been shut down")]
    ShutDown,

    /// Durable queue error
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Delivery sink error
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Transport construction error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid batching policy
    #[error("Assembler error: {0}")]
    Assembler(#[from] AssemblerError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] CoreError),
}

/// Result type alias using PipelineError.
pub type PipelineResult<T> = Result<T, PipelineError>;
