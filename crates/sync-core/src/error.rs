//! Error types for sync-core

use std::path::PathBuf;

use serde::Serialize;
use sync_model::ResourcePath;

/// Result type for sync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A subscriber could not answer for a resource
    #[error("Subscriber failed for {resource}: {message}")]
    Subscriber {
        resource: ResourcePath,
        message: String,
    },

    /// The worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),

    /// Background work did not finish in time
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A snapshot file is structurally valid TOML but describes an invalid state
    #[error("Invalid snapshot: {message}")]
    InvalidSnapshot { message: String },

    /// File could not be read
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    // Transparent wrappers for lower crates
    #[error(transparent)]
    Model(#[from] sync_model::Error),

    #[error(transparent)]
    Protocol(#[from] sync_protocol::Error),
}

impl Error {
    pub fn subscriber(resource: &ResourcePath, message: impl Into<String>) -> Self {
        Error::Subscriber {
            resource: resource.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A failure attributed to a single resource.
///
/// The collector and the scheduler record these instead of aborting, so one
/// bad resource never hides the results for its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceError {
    pub resource: ResourcePath,
    pub message: String,
}

impl ResourceError {
    pub fn new(resource: ResourcePath, error: &Error) -> Self {
        let message = match error {
            Error::Subscriber { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self { resource, message }
    }
}

impl std::fmt::Display for ResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.resource, self.message)
    }
}
