//! Crate-wide error taxonomy.
//!
//! Mirrors the teacher's split between a low-level domain error and an
//! HTTP-facing error that knows how to become a WebDAV response: transport
//! failures, protocol failures (bad status from the backend), parse
//! failures, and configuration failures are never folded into one numeric
//! status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors produced while talking to, or interpreting data from, the backend
/// WebDAV server.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned unexpected status {status} for {operation}")]
    UpstreamStatus {
        operation: &'static str,
        status: u16,
    },

    #[error("malformed multistatus response: {0}")]
    ParseXml(String),

    #[error("malformed split-file manifest: {0}")]
    ParseManifest(#[from] serde_json::Error),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// The status a client-facing response should carry for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::Transport(_) | ProxyError::Io(_) => StatusCode::BAD_GATEWAY,
            ProxyError::ParseXml(_) | ProxyError::ParseManifest(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::warn!(error = %self, %status, "request failed");
        (status, self.to_string()).into_response()
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;

/// A single physical-part failure collected while carrying out a multi-part
/// operation (delete, copy, move) on a split file. Never triggers a
/// rollback — see spec §7 item 6.
#[derive(Debug, Clone)]
pub struct PartFailure {
    pub url: String,
    pub status: u16,
}

impl std::fmt::Display for PartFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.url, self.status)
    }
}
