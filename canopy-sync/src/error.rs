//! Error types for canopy-sync.

use std::path::PathBuf;

use canopy_core::ProjectError;
use thiserror::Error;

/// All errors that can arise from remote store access.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization of the store document or a response body.
    #[error("remote store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The HTTP store answered with a non-success status.
    #[error("{method} {url} returned {status}: {message}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        message: String,
    },

    /// Connection, DNS, TLS, or timeout failure.
    #[error("{method} {url} failed: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

impl From<SyncError> for ProjectError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Status { status: 404, .. } => ProjectError::NotFound(err.to_string()),
            SyncError::Status { status: 409, .. } => ProjectError::Conflict(err.to_string()),
            other => ProjectError::server_with("remote store request failed", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> SyncError {
        SyncError::Status {
            method: "POST",
            url: "http://remote/projects".into(),
            status: code,
            message: "nope".into(),
        }
    }

    #[test]
    fn status_codes_map_to_project_errors() {
        assert!(matches!(ProjectError::from(status(404)), ProjectError::NotFound(_)));
        assert!(matches!(ProjectError::from(status(409)), ProjectError::Conflict(_)));
        assert!(matches!(ProjectError::from(status(500)), ProjectError::Server { .. }));
    }

    #[test]
    fn transport_error_keeps_source() {
        let err = ProjectError::from(SyncError::Transport {
            method: "GET",
            url: "http://remote/projects".into(),
            message: "timed out".into(),
        });
        let source = std::error::Error::source(&err).expect("source").to_string();
        assert!(source.contains("timed out"));
    }
}
