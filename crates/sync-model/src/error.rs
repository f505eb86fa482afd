//! Error types for sync-model

/// Result type for sync-model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sync-model operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Invalid sync kind: direction {direction} cannot be combined with change type {change}")]
    InvalidSyncKind { direction: String, change: String },

    #[error("Unknown comparison mode: {value}")]
    UnknownMode { value: String },
}
