//! SQLite error mapping.
//!
//! Maps `tokio_rusqlite::Error` and `rusqlite::Error` to `StoreError` from
//! `dsentity_core::store`. Reads fall back to `QueryFailed`, writes to
//! `WriteFailed`.

use dsentity_core::store::StoreError;

/// Kind of statement that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    fn failed(self, message: String) -> StoreError {
        match self {
            Operation::Read => StoreError::QueryFailed(message),
            Operation::Write => StoreError::WriteFailed(message),
        }
    }
}

/// Maps a rusqlite error to a StoreError.
///
/// # Error Mapping
///
/// - `CannotOpen` → `StoreError::ConnectionFailed`
/// - Constraint violations → `StoreError::WriteFailed`
/// - Column conversion failures → `StoreError::InvalidData`
/// - All other errors → `QueryFailed` or `WriteFailed` by operation
fn map_rusqlite_error(err: &rusqlite::Error, operation: Operation) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.code == rusqlite::ErrorCode::CannotOpen =>
        {
            StoreError::ConnectionFailed(format!("Cannot open database: {err}"))
        }

        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::WriteFailed(format!("Constraint violation: {err}"))
        }

        rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
            StoreError::InvalidData(err.to_string())
        }

        _ => operation.failed(err.to_string()),
    }
}

/// Maps a tokio_rusqlite error to a StoreError.
///
/// This is the main entry point for error mapping in async code.
pub fn map_tokio_rusqlite_error(err: tokio_rusqlite::Error, operation: Operation) -> StoreError {
    match &err {
        tokio_rusqlite::Error::Rusqlite(rusqlite_err) => map_rusqlite_error(rusqlite_err, operation),
        tokio_rusqlite::Error::Close(_) | tokio_rusqlite::Error::ConnectionClosed => {
            StoreError::ConnectionFailed("Connection closed unexpectedly".to_string())
        }
        _ => operation.failed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    #[test]
    fn test_constraint_maps_to_write_failed() {
        let sqlite_err = rusqlite::ffi::Error {
            code: rusqlite::ErrorCode::ConstraintViolation,
            extended_code: ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
        };
        let err = tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(sqlite_err, None));

        let result = map_tokio_rusqlite_error(err, Operation::Read);

        assert!(matches!(result, StoreError::WriteFailed(_)));
    }

    #[test]
    fn test_cannot_open_maps_to_connection_failed() {
        let sqlite_err = rusqlite::ffi::Error {
            code: rusqlite::ErrorCode::CannotOpen,
            extended_code: ffi::SQLITE_CANTOPEN,
        };
        let err = tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(sqlite_err, None));

        let result = map_tokio_rusqlite_error(err, Operation::Write);

        assert!(matches!(result, StoreError::ConnectionFailed(_)));
    }

    #[test]
    fn test_connection_closed_maps_to_connection_failed() {
        let result = map_tokio_rusqlite_error(tokio_rusqlite::Error::ConnectionClosed, Operation::Read);
        assert!(matches!(result, StoreError::ConnectionFailed(_)));
    }

    #[test]
    fn test_generic_error_follows_operation() {
        let read = tokio_rusqlite::Error::Other(Box::new(std::io::Error::other("test error")));
        let write = tokio_rusqlite::Error::Other(Box::new(std::io::Error::other("test error")));

        assert!(matches!(
            map_tokio_rusqlite_error(read, Operation::Read),
            StoreError::QueryFailed(_)
        ));
        assert!(matches!(
            map_tokio_rusqlite_error(write, Operation::Write),
            StoreError::WriteFailed(_)
        ));
    }
}
