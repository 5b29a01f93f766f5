//! Storage-specific error types for SQLite operations.
//!
//! This module provides error types that wrap Diesel-specific errors and convert
//! them to the database-agnostic error types defined in `categorizable_core`.

use categorizable_core::categories::CategoryError;
use categorizable_core::errors::{DatabaseError, Error};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

/// Storage-specific errors that wrap Diesel and r2d2 types.
///
/// These errors are internal to the storage layer and are converted to
/// `categorizable_core::Error` before being returned to callers.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A core error raised inside a write job; passed through unchanged.
    #[error("{0}")]
    Core(Error),
}

/// Wraps core errors raised inside a write transaction so they survive the rollback.
impl From<Error> for StorageError {
    fn from(err: Error) -> Self {
        StorageError::Core(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// SQLite reports lock contention as an untyped error with one of these messages.
fn is_lock_contention(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("database is busy")
}

fn map_diesel_error(err: DieselError) -> Error {
    match err {
        DieselError::NotFound => {
            Error::Database(DatabaseError::NotFound("Record not found".to_string()))
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            let message = info.message().to_string();
            if message.contains("categories.slug") {
                Error::Category(CategoryError::DuplicateSlug(message))
            } else {
                Error::Database(DatabaseError::UniqueViolation(message))
            }
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            Error::Database(DatabaseError::ForeignKeyViolation(
                info.message().to_string(),
            ))
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
            Error::Category(CategoryError::ConcurrencyConflict(
                info.message().to_string(),
            ))
        }
        DieselError::DatabaseError(_, info) if is_lock_contention(info.message()) => {
            Error::Category(CategoryError::ConcurrencyConflict(
                info.message().to_string(),
            ))
        }
        DieselError::RollbackTransaction => {
            Error::Database(DatabaseError::TransactionFailed("Rolled back".to_string()))
        }
        e => Error::Database(DatabaseError::QueryFailed(e.to_string())),
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::PoolError(e) => {
                Error::Database(DatabaseError::PoolCreationFailed(e.to_string()))
            }
            StorageError::QueryFailed(e) => map_diesel_error(e),
            StorageError::MigrationFailed(e) => Error::Database(DatabaseError::MigrationFailed(e)),
            StorageError::SerializationError(e) => Error::Database(DatabaseError::Internal(e)),
            StorageError::Core(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::DatabaseErrorInformation;

    #[derive(Debug)]
    struct Info(&'static str);

    impl DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            self.0
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            None
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn db_error(kind: DatabaseErrorKind, message: &'static str) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(Info(message)))
    }

    #[test]
    fn test_slug_unique_violation_maps_to_duplicate_slug() {
        let err: Error = StorageError::from(db_error(
            DatabaseErrorKind::UniqueViolation,
            "UNIQUE constraint failed: categories.slug",
        ))
        .into();
        assert!(matches!(
            err.as_category_error(),
            Some(CategoryError::DuplicateSlug(_))
        ));

        let err: Error = StorageError::from(db_error(
            DatabaseErrorKind::UniqueViolation,
            "UNIQUE constraint failed: categorizables.category_id",
        ))
        .into();
        assert!(matches!(
            err,
            Error::Database(DatabaseError::UniqueViolation(_))
        ));
    }

    #[test]
    fn test_lock_errors_map_to_concurrency_conflict() {
        for err in [
            db_error(DatabaseErrorKind::Unknown, "database is locked"),
            db_error(DatabaseErrorKind::SerializationFailure, "conflict"),
        ] {
            let err: Error = StorageError::from(err).into();
            assert!(matches!(
                err.as_category_error(),
                Some(CategoryError::ConcurrencyConflict(_))
            ));
        }
    }

    #[test]
    fn test_core_errors_pass_through() {
        let err: Error = StorageError::from(Error::from(CategoryError::ParentDeleted(4))).into();
        assert_eq!(
            err.as_category_error(),
            Some(&CategoryError::ParentDeleted(4))
        );
    }

    #[test]
    fn test_not_found_maps_to_database_not_found() {
        let err: Error = StorageError::from(DieselError::NotFound).into();
        assert!(matches!(err, Error::Database(DatabaseError::NotFound(_))));
    }
}
