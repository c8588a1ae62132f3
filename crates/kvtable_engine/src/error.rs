//! Error types for engine operations.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by a storage engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The connection was closed and can no longer be used.
    #[error("connection to database '{name}' is closed")]
    Closed {
        /// Database name.
        name: String,
    },

    /// Another connection prevents the request from proceeding.
    #[error("request blocked by an open connection to database '{name}'")]
    Blocked {
        /// Database name.
        name: String,
    },

    /// The engine refused to open the database.
    #[error("database '{name}' is unavailable: {reason}")]
    Unavailable {
        /// Database name.
        name: String,
        /// Why the open was refused.
        reason: String,
    },

    /// The requested schema version is lower than the stored one.
    #[error("requested version {requested} is lower than stored version {current}")]
    Version {
        /// Version asked for by the caller.
        requested: u32,
        /// Version currently stored.
        current: u32,
    },

    /// The named physical container does not exist.
    #[error("object store not found: {0}")]
    StoreNotFound(String),

    /// The named physical container already exists.
    #[error("object store already exists: {0}")]
    StoreExists(String),

    /// The engine rejected a single row.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// A write was attempted inside a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnly,

    /// Persisted state could not be decoded.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl EngineError {
    /// Creates a closed-connection error.
    pub fn closed(name: impl Into<String>) -> Self {
        Self::Closed { name: name.into() }
    }

    /// Creates a blocked error.
    pub fn blocked(name: impl Into<String>) -> Self {
        Self::Blocked { name: name.into() }
    }

    /// Creates an unavailable error.
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a constraint error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint(message.into())
    }

    /// Returns true if the failure concerns the connection rather than the request.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_classification() {
        assert!(EngineError::closed("db").is_connectivity());
        assert!(EngineError::unavailable("db", "offline").is_connectivity());
        assert!(!EngineError::blocked("db").is_connectivity());
        assert!(!EngineError::constraint("too large").is_connectivity());
    }

    #[test]
    fn error_display() {
        let err = EngineError::Version {
            requested: 1,
            current: 3,
        };
        assert!(err.to_string().contains('1'));
        assert!(err.to_string().contains('3'));
        assert_eq!(
            EngineError::StoreNotFound("users".into()).to_string(),
            "object store not found: users"
        );
    }
}
