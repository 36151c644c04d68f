// Query error taxonomy shared by the engine, the store adapters and the HTTP layer

use thiserror::Error;

/// Errors a revenue query can surface to its caller.
///
/// An unknown hospital code is deliberately absent: a trend query for a code
/// with no records returns an empty series, not an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// A filter value is malformed (bad `yearMonth`, zero limit, missing code).
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The persistence engine cannot be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The caller's deadline expired before the query finished.
    #[error("query deadline exceeded")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    pub fn invalid(message: impl Into<String>) -> Self {
        QueryError::InvalidFilter(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        QueryError::StoreUnavailable(message.into())
    }

    /// True for errors the client caused and can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, QueryError::InvalidFilter(_))
    }
}

impl From<rusqlite::Error> for QueryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, _)
                if code.code == rusqlite::ErrorCode::OperationInterrupted =>
            {
                QueryError::Timeout
            }
            other => QueryError::StoreUnavailable(other.to_string()),
        }
    }
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_sqlite_maps_to_timeout() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
            None,
        );
        assert_eq!(QueryError::from(err), QueryError::Timeout);
    }

    #[test]
    fn test_other_sqlite_errors_are_unavailable() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
            Some("unable to open database file".to_string()),
        );
        assert!(matches!(QueryError::from(err), QueryError::StoreUnavailable(_)));
    }

    #[test]
    fn test_only_invalid_filter_is_client_error() {
        assert!(QueryError::invalid("bad").is_client_error());
        assert!(!QueryError::unavailable("down").is_client_error());
        assert!(!QueryError::Timeout.is_client_error());
    }
}
