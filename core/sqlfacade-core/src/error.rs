//! Error types for the database abstraction layer.
//!
//! All public APIs return [`DbxResult<T>`] — no panics and no exceptions
//! escape the library. Fallible operations that the spec documents as
//! "return false / empty value" still return `Err(..)` here; callers that
//! want the legacy degrade-to-empty behavior use the `_or_default` adapters
//! on [`crate::result::DbResult`].

use thiserror::Error;

/// Unified error type for all façade, type-registry, and concurrency
/// operations.
#[derive(Debug, Error)]
pub enum DbxError {
    /// A required parameter was NULL/empty where a value was required.
    #[error("null parameter: {0}")]
    NullParameter(String),

    /// The named database is not attached.
    #[error("database '{0}' not found")]
    DatabaseNotFound(String),

    /// The named table does not exist in the named database.
    #[error("table '{db}.{table}' not found")]
    TableNotFound { db: String, table: String },

    /// A column referenced by name does not exist in the result/table.
    #[error("field '{0}' not found")]
    FieldNotFound(String),

    /// A value failed to decode under the type it was tagged with.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A blob buffer was truncated or malformed for the type decoding it.
    #[error("blob decode error: {0}")]
    BlobDecode(String),

    /// Underlying SQL engine reported an error executing a statement.
    #[error("engine error: {0}")]
    Engine(String),

    /// SQLite engine error (wrapped so call sites get the real cause).
    #[error("sqlite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// Filesystem I/O error opening or managing database files.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// `update_result`/`update_result_vargs` was called against a result
    /// that does not trace back to a real table with a known primary key.
    #[error("result is not updatable: {0}")]
    NotUpdatable(String),

    /// A copy-and-rename schema evolution step failed; the caller's table
    /// is left as it was before the operation began.
    #[error("schema evolution failed: {0}")]
    SchemaEvolution(String),

    /// A lock handle passed to `unlock_tables`/`unlock_records` was invalid
    /// (already released, or not owned by the calling thread).
    #[error("invalid lock handle: {0}")]
    InvalidLockHandle(String),

    /// An internal mutex was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// A range slice request had `start > end` or `end > num_results`.
    #[error("invalid range [{start}, {end}) for {num_results} result rows")]
    InvalidRange {
        start: usize,
        end: usize,
        num_results: usize,
    },

    /// Feature deliberately not implemented by this façade.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Result type alias for all fallible operations in this crate.
pub type DbxResult<T> = Result<T, DbxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_table_not_found() {
        let err = DbxError::TableNotFound {
            db: "app".to_string(),
            table: "users".to_string(),
        };
        assert_eq!(err.to_string(), "table 'app.users' not found");
    }

    #[test]
    fn error_display_type_mismatch() {
        let err = DbxError::TypeMismatch {
            expected: "i64".to_string(),
            actual: "string".to_string(),
        };
        assert_eq!(err.to_string(), "type mismatch: expected i64, got string");
    }

    #[test]
    fn error_display_invalid_range() {
        let err = DbxError::InvalidRange {
            start: 3,
            end: 10,
            num_results: 7,
        };
        assert!(err.to_string().contains("[3, 10)"));
    }

    #[test]
    fn dbx_result_ok_and_err() {
        let ok: DbxResult<i32> = Ok(42);
        assert_eq!(ok.unwrap(), 42);
        let err: DbxResult<i32> = Err(DbxError::NullParameter("table".to_string()));
        assert!(err.is_err());
    }
}
