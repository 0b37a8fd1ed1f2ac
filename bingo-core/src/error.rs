//! Error types for the bingo engine

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
///
/// Domain errors (`Validation` through `IllegalStateTransition`) are terminal
/// to the calling operation and leave stored state untouched. The remaining
/// variants come from the persistence layer and are not recoverable locally.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or disallowed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request collides with existing state (active submission, taken slug or cell)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Attempt budget for a tile is exhausted
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Review requested on a submission that is not pending
    #[error("Illegal state transition: {0}")]
    IllegalStateTransition(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures of the backing store rather than of the request
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_)
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_classification() {
        assert!(Error::Storage("disk".into()).is_persistence());
        assert!(!Error::Conflict("dup".into()).is_persistence());
        assert!(!Error::LimitExceeded("spent".into()).is_persistence());
    }

    #[test]
    fn test_display() {
        let err = Error::NotFound("submission 42".into());
        assert_eq!(err.to_string(), "Not found: submission 42");
    }
}
