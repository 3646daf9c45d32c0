//! Error types shared across Versereel crates.

use std::path::PathBuf;

/// Top-level error type for Versereel operations.
///
/// Timing validation problems are deliberately absent: they are reported
/// as a list of violations and never abort an editing session.
#[derive(Debug, thiserror::Error)]
pub enum VersereelError {
    /// Network or upstream failure while fetching source text or audio.
    #[error("Retrieval error: {message}")]
    Retrieval {
        message: String,
        collection: Option<u32>,
        status: Option<u16>,
    },

    #[error("Invalid collection number {number} (expected 1..=8)")]
    InvalidCollection { number: i64 },

    /// Required input is missing, so the operation is not attempted.
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    /// A pipeline stage failed. The message is surfaced verbatim.
    #[error("{message}")]
    Encoding { stage: String, message: String },

    #[error("Export cancelled during {stage}")]
    Cancelled { stage: String },

    #[error("Another export is already running")]
    Busy,

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VersereelError.
pub type VersereelResult<T> = Result<T, VersereelError>;

impl VersereelError {
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval {
            message: msg.into(),
            collection: None,
            status: None,
        }
    }

    /// Upstream answered with a non-success status for a collection page.
    pub fn upstream_status(collection: u32, status: u16) -> Self {
        Self::Retrieval {
            message: format!("Failed to fetch collection {collection} (upstream status {status})"),
            collection: Some(collection),
            status: Some(status),
        }
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition {
            message: msg.into(),
        }
    }

    pub fn encoding(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Encoding {
            stage: stage.into(),
            message: msg.into(),
        }
    }

    pub fn cancelled(stage: impl Into<String>) -> Self {
        Self::Cancelled {
            stage: stage.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// HTTP-style status class for callers exposing this error over an API:
    /// 400 for bad input, 502 for upstream failures, 500 otherwise.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::InvalidCollection { .. } | Self::Precondition { .. } => 400,
            Self::Retrieval { .. } => 502,
            Self::Busy => 409,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_carries_collection_and_code() {
        let err = VersereelError::upstream_status(3, 503);
        match &err {
            VersereelError::Retrieval {
                collection, status, ..
            } => {
                assert_eq!(*collection, Some(3));
                assert_eq!(*status, Some(503));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert_eq!(err.status_hint(), 502);
    }

    #[test]
    fn test_encoding_message_is_verbatim() {
        let err = VersereelError::encoding("muxing", "ffmpeg exited with status 1: boom");
        assert_eq!(err.to_string(), "ffmpeg exited with status 1: boom");
    }

    #[test]
    fn test_invalid_collection_is_client_error() {
        let err = VersereelError::InvalidCollection { number: 9 };
        assert_eq!(err.status_hint(), 400);
        assert!(err.to_string().contains('9'));
    }
}
