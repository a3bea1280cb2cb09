//! Batch assembler error types.

use thiserror::Error;

/// Batch assembler error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblerError {
    /// Size threshold must be at least one event
    #[error("Invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),

    /// Flush interval must be positive
    #[error("Invalid flush interval: must be greater than zero")]
    InvalidFlushInterval,
}

/// Result type alias using AssemblerError.
pub type AssemblerResult<T> = Result<T, AssemblerError>;
