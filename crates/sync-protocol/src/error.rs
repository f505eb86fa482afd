//! Error types for sync-protocol

use std::path::PathBuf;

/// Result type for sync-protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sync-protocol operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed transcript line {line}: {content}")]
    MalformedLine { line: usize, content: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
