use std::time::Duration;

use thiserror::Error;

/// Convenient result alias for the danger zone library.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of library errors.
///
/// Boundary layers map each kind to a response class instead of matching on
/// individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape or content supplied by the client.
    Validation,
    /// The referenced entity does not exist.
    NotFound,
    /// A query parameter is missing or malformed.
    InvalidArgument,
    /// The persistence layer could not be reached in time. Retryable.
    Unavailable,
    /// Anything else.
    Internal,
}

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when a zone fails creation-time validation.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Raised when a zone id does not resolve to a stored zone.
    #[error("zone {id} not found")]
    NotFound { id: String },

    /// Raised when query parameters are missing, non-numeric or inconsistent.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Raised when the storage backend cannot be reached.
    #[error("storage backend unavailable: {message}")]
    Unavailable { message: String },

    /// Raised when a storage operation exceeds its time budget.
    #[error("storage operation {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Raised for failures that indicate a bug or corrupted state.
    #[error("internal error: {message}")]
    Internal { message: String },

    /// Wrapper for SQLite errors.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Wrapper for JSON (de)serialization errors of stored documents.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify this error into the service error taxonomy.
    ///
    /// SQLite busy/locked and open failures count as `Unavailable`; any other
    /// storage-level failure is `Internal`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::Unavailable { .. } | Error::Timeout { .. } => ErrorKind::Unavailable,
            Error::Sqlite(err) => match err.sqlite_error_code() {
                Some(
                    rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::CannotOpen,
                ) => ErrorKind::Unavailable,
                _ => ErrorKind::Internal,
            },
            Error::Io(_) => ErrorKind::Unavailable,
            Error::Internal { .. } | Error::Json(_) => ErrorKind::Internal,
        }
    }

    /// Returns true when retrying the operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(
            Error::NotFound { id: "a".into() }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            Error::invalid_argument("lat").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(Error::unavailable("down").kind(), ErrorKind::Unavailable);
        assert_eq!(Error::internal("bug").kind(), ErrorKind::Internal);
    }

    #[test]
    fn timeout_is_retryable() {
        let err = Error::Timeout {
            operation: "list",
            after: Duration::from_millis(250),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("list"));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn not_found_message_names_id() {
        let err = Error::NotFound {
            id: "0190c0de-0000-7000-8000-000000000000".into(),
        };
        assert!(err.to_string().contains("0190c0de"));
        assert!(!err.is_retryable());
    }
}
