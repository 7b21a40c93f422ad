// Error types for repofetch.
// Separates transport, API status, cache, cancellation and configuration failures.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, timeout or body read failure.
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: reqwest::Error,
    },

    /// A retryable status (408, 429, 5xx) was still returned on the last attempt.
    #[error("{message}")]
    RetriesExhausted { status: StatusCode, message: String },

    /// Any other non-success status. Never retried.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("Cache I/O error at {}: {source}", path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("GitHub REST API requests must be authenticated in this environment, but no token is set")]
    MissingToken,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to decompress response body: {0}")]
    Decode(#[source] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Wrap an I/O error raised while touching the persistent cache.
    pub fn cache(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Cache {
            path: path.into(),
            source,
        }
    }

    /// Status code carried by API errors, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::RetriesExhausted { status, .. } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure would have been retried by the executor.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::RetriesExhausted { .. } => true,
            Self::Status { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// 408, 429 and every 5xx are worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

pub type Result<T> = std::result::Result<T, FetchError>;
