//! Codec error types.

use thiserror::Error;

/// Errors raised while encoding or decoding a batch payload.
#[derive(Error, Debug)]
pub enum CodecError {
    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Unknown event kind tag
    #[error("Unknown event kind: {0}")]
    UnknownKind(String),
}

/// Result type alias using CodecError.
pub type CodecResult<T> = Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_error_display() {
        let err = CodecError::Compression("frame truncated".to_string());
        assert_eq!(err.to_string(), "Compression error: frame truncated");
    }

    #[test]
    fn json_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{{{").unwrap_err();
        let err: CodecError = serde_err.into();
        assert!(err.to_string().starts_with("JSON error:"));
    }
}
