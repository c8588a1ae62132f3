//! Error types for kvtable core.

use kvtable_codec::CodecError;
use kvtable_engine::EngineError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in kvtable core operations.
///
/// Connection loss after a successful open is never reported here: the
/// database reopens on its own and operations wait for it.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The first open of a database failed.
    #[error("cannot open database '{name}': {message}")]
    Connectivity {
        /// Database name.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// Another connection prevents the operation.
    #[error("{operation} of database '{name}' is blocked by another connection")]
    Blocked {
        /// Database name.
        name: String,
        /// The blocked operation.
        operation: &'static str,
    },

    /// Some rows of a batch were rejected by the engine.
    ///
    /// Every other row of the batch was written.
    #[error("{failed} of {total} rows rejected writing to table '{table}'")]
    WriteBatch {
        /// Table name.
        table: String,
        /// Rejected rows.
        failed: usize,
        /// Rows in the batch.
        total: usize,
    },

    /// The engine rejected a read or delete.
    #[error("{operation} on table '{table}' failed: {source}")]
    Query {
        /// Table name.
        table: String,
        /// The failed operation with its range, limit and mode.
        operation: String,
        /// Engine failure.
        #[source]
        source: EngineError,
    },

    /// The table name is not usable.
    #[error("invalid table name '{name}': {reason}")]
    InvalidTableName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A key is outside the supported key domain.
    #[error("invalid key for table '{table}': {message}")]
    InvalidKey {
        /// Table name.
        table: String,
        /// Description of the problem.
        message: String,
    },

    /// A row cannot be stored in its table.
    #[error("invalid row for table '{table}': {message}")]
    InvalidRow {
        /// Table name.
        table: String,
        /// Description of the problem.
        message: String,
    },

    /// The table does not exist.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Table name.
        name: String,
    },

    /// The database was closed through this handle.
    #[error("database '{name}' is closed")]
    DatabaseClosed {
        /// Database name.
        name: String,
    },

    /// The database was deleted or downgraded by another connection.
    #[error("database '{name}' was detached by another connection")]
    Detached {
        /// Database name.
        name: String,
    },

    /// Storage engine error.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Row codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl CoreError {
    /// Create a query error.
    pub fn query(table: impl Into<String>, operation: impl Into<String>, source: EngineError) -> Self {
        Self::Query {
            table: table.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Classifies a codec failure raised while preparing rows or keys of `table`.
    pub fn for_table(table: &str, err: CodecError) -> Self {
        match err {
            CodecError::InvalidKey { message } => Self::InvalidKey {
                table: table.to_owned(),
                message,
            },
            CodecError::InvalidTableName { name, reason } => Self::InvalidTableName {
                name,
                reason: reason.to_owned(),
            },
            err @ (CodecError::MissingKeyColumn { .. }
            | CodecError::NotAMap
            | CodecError::EncodingFailed { .. }) => Self::InvalidRow {
                table: table.to_owned(),
                message: err.to_string(),
            },
            other => Self::Codec(other),
        }
    }

    /// Returns true if the error reports a partially applied batch.
    pub fn is_partial_write(&self) -> bool {
        matches!(self, Self::WriteBatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_errors_are_classified() {
        let err = CoreError::for_table("t", CodecError::invalid_key("too big"));
        assert!(matches!(err, CoreError::InvalidKey { ref table, .. } if table == "t"));

        let err = CoreError::for_table(
            "t",
            CodecError::MissingKeyColumn {
                column: "id".into(),
            },
        );
        assert!(matches!(err, CoreError::InvalidRow { .. }));

        let err = CoreError::for_table("t", CodecError::decoding_failed("eof"));
        assert!(matches!(err, CoreError::Codec(_)));
    }

    #[test]
    fn messages_carry_context() {
        let err = CoreError::WriteBatch {
            table: "logs".into(),
            failed: 2,
            total: 5,
        };
        assert_eq!(err.to_string(), "2 of 5 rows rejected writing to table 'logs'");
        assert!(err.is_partial_write());

        let err = CoreError::query("logs", "count (-inf, +inf)", EngineError::closed("db"));
        assert!(err.to_string().contains("count (-inf, +inf)"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
