//! Error types for flipscan.
//!
//! Taxonomy:
//! - Transient: network hiccups, timeouts, HTTP 429 and 5xx. Retried with backoff.
//! - Fatal: API-reported errors, schema violations, exhausted retries, local IO.
//! - Per-item: a single flip detail that could not be fetched. Recorded on the
//!   scan outcome and skipped, never raised.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for flipscan.
#[derive(Debug, Error)]
pub enum FlipscanError {
    // ═══════════════════════════════════════════════════════════════════
    // FATAL: local failures and bad input
    // ═══════════════════════════════════════════════════════════════════
    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {context}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════
    // FATAL: remote service said no, or said something unreadable
    // ═══════════════════════════════════════════════════════════════════
    #[error("Idena API error: {0}")]
    Api(#[from] ApiError),

    // ═══════════════════════════════════════════════════════════════════
    // TRANSIENT: retried by the client
    // ═══════════════════════════════════════════════════════════════════
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited (HTTP 429)")]
    RateLimited,

    #[error("Server error (HTTP {0})")]
    ServerStatus(u16),
}

/// Errors reported by or about the remote Idena API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API error at {path}: {message}")]
    Remote { path: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Unexpected response at {path}: {detail}")]
    UnexpectedSchema { path: String, detail: String },

    #[error("GET failed after {attempts} attempts: {url} ({last_error})")]
    MaxRetriesExceeded {
        attempts: u32,
        url: String,
        last_error: String,
    },
}

impl FlipscanError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a CSV error with context.
    pub fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            context: context.into(),
            source,
        }
    }

    /// Create a schema violation for the given request path.
    pub fn schema(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Api(ApiError::UnexpectedSchema {
            path: path.into(),
            detail: detail.into(),
        })
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited | Self::ServerStatus(_)
        )
    }
}

/// Result type alias for flipscan.
pub type Result<T> = std::result::Result<T, FlipscanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(FlipscanError::RateLimited.is_retryable());
        assert!(FlipscanError::ServerStatus(503).is_retryable());
        assert!(FlipscanError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(FlipscanError::Network("reset".into()).is_retryable());
    }

    #[test]
    fn test_fatal_errors_are_not_retryable() {
        let remote = FlipscanError::Api(ApiError::Remote {
            path: "/Flip/x".into(),
            message: "not found".into(),
        });
        assert!(!remote.is_retryable());
        assert!(!FlipscanError::schema("/Epoch/Last", "bad").is_retryable());
        assert!(!FlipscanError::InvalidInput("x".into()).is_retryable());
    }

    #[test]
    fn test_exhausted_message_carries_last_cause() {
        let err = FlipscanError::Api(ApiError::MaxRetriesExceeded {
            attempts: 3,
            url: "https://api.idena.io/api/Epoch/Last".into(),
            last_error: "Rate limited (HTTP 429)".into(),
        });
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("429"));
    }
}
