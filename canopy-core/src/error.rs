//! Error types for canopy-core.

use std::error::Error as StdError;

use thiserror::Error;

use crate::path::ProjectPath;

type BoxError = Box<dyn StdError + Send + Sync>;

/// All errors that can arise from project resolution and registry operations.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// Missing project, type, folder, or importer.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate path, name collision, or an otherwise conflicting request.
    #[error("{0}")]
    Conflict(String),

    /// The underlying filesystem refused the operation.
    #[error("{0}")]
    Forbidden(String),

    /// Internal or unexpected failure: provider crashes, transport errors, I/O.
    #[error("{message}")]
    Server {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Required attributes could not be resolved; fatal to the one record being built.
    #[error("project type constraint violated at {path}: {message}")]
    Constraint {
        path: ProjectPath,
        message: String,
        attributes: Vec<String>,
    },

    /// A value provider raised an error while computing an attribute.
    #[error("failed to resolve attribute '{attribute}' at {path}: {source}")]
    ValueResolution {
        path: ProjectPath,
        attribute: String,
        #[source]
        source: ValueError,
    },
}

impl ProjectError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an arbitrary error as [`ProjectError::Server`], keeping it as the source.
    pub fn server_with(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Server {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Failure raised by a value provider.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("{0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("attribute '{0}' is read-only")]
    ReadOnly(String),
}

impl ValueError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_with_keeps_source() {
        let err = ProjectError::server_with(
            "remote store unreachable",
            std::io::Error::other("connection refused"),
        );
        assert_eq!(err.to_string(), "remote store unreachable");
        assert!(err.source().is_some());
    }

    #[test]
    fn constraint_message_names_path() {
        let err = ProjectError::Constraint {
            path: ProjectPath::new("/api"),
            message: "required attribute 'x' has no value".into(),
            attributes: vec!["x".into()],
        };
        assert!(err.to_string().contains("/api"));
        assert!(err.to_string().contains("'x'"));
    }
}
