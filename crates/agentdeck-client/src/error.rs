//! Error types for talking to the model server.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the model server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server is not running or not reachable.
    #[error("Model server not reachable at {0}. Start it with: ollama serve")]
    Unreachable(String),

    /// Server answered with a non-success status.
    #[error("Model server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body failed after streaming started.
    #[error("Stream failed: {0}")]
    Stream(String),

    /// No chunk arrived within the configured stream timeout.
    #[error("No data received for {0:?}")]
    StreamTimeout(Duration),
}

impl ClientError {
    /// Whether this error means the server could not be used at all
    /// (unreachable, or answering with an error status).
    pub fn is_connectivity(&self) -> bool {
        match self {
            ClientError::Unreachable(_) | ClientError::Status { .. } => true,
            ClientError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}
