//! Error types for the subtitle translation pipeline.
//!
//! Every failure a task can surface maps onto one variant here. Retry decisions
//! in the orchestrator are driven by [`SubtitleError::is_retryable`].

use thiserror::Error;

/// Errors produced by the codec, the orchestrator and the cache
#[derive(Debug, Error)]
pub enum SubtitleError {
    /// Missing or malformed WebVTT header
    #[error("WebVTT parse error: {0}")]
    Parse(String),

    /// LLM output could not be read as WebVTT
    #[error("Response format error: {0}")]
    ResponseFormat(String),

    /// Translated batch does not line up with the source batch
    #[error("Validation mismatch: {}", .0.join("; "))]
    ValidationMismatch(Vec<String>),

    /// The request did not finish within the per-request timeout
    #[error("Request timed out after {0} ms")]
    NetworkTimeout(u64),

    /// Transport or provider failure
    #[error("Network error: {0}")]
    Network(String),

    /// The task's cancellation token fired
    #[error("Task cancelled")]
    Cancelled,

    /// Missing API key, disabled feature, unknown provider
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Persistent store failure
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SubtitleError {
    /// Whether the orchestrator may try the same batch again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkTimeout(_)
                | Self::Network(_)
                | Self::Http(_)
                | Self::ResponseFormat(_)
                | Self::ValidationMismatch(_)
        )
    }

    /// Format and alignment failures have their own, smaller retry budget.
    pub fn is_content_failure(&self) -> bool {
        matches!(self, Self::ResponseFormat(_) | Self::ValidationMismatch(_))
    }

    /// Stable code reported to the host alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "PARSE_ERROR",
            Self::ResponseFormat(_) => "RESPONSE_FORMAT_ERROR",
            Self::ValidationMismatch(_) => "VALIDATION_MISMATCH",
            Self::NetworkTimeout(_) => "NETWORK_TIMEOUT",
            Self::Network(_) | Self::Http(_) => "NETWORK_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Result type for the crate
pub type Result<T> = std::result::Result<T, SubtitleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(SubtitleError::NetworkTimeout(1000).is_retryable());
        assert!(SubtitleError::Network("reset".into()).is_retryable());
        assert!(SubtitleError::ResponseFormat("no header".into()).is_retryable());
        assert!(SubtitleError::ValidationMismatch(vec![]).is_retryable());

        assert!(!SubtitleError::Cancelled.is_retryable());
        assert!(!SubtitleError::Parse("x".into()).is_retryable());
        assert!(!SubtitleError::Configuration("x".into()).is_retryable());
    }

    #[test]
    fn test_validation_message_joins_details() {
        let err = SubtitleError::ValidationMismatch(vec![
            "cue count 3 != 2".to_string(),
            "cue 1 start differs".to_string(),
        ]);
        assert_eq!(err.to_string(), "Validation mismatch: cue count 3 != 2; cue 1 start differs");
        assert_eq!(err.code(), "VALIDATION_MISMATCH");
    }
}
