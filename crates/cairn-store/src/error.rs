//! Forecast store error types.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A statement failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The database file itself is damaged.
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// A single stored row could not be decoded.
    #[error("Undecodable row: {0}")]
    CorruptRow(String),

    /// The requested item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn corrupt_row(message: impl Into<String>) -> Self {
        Self::CorruptRow(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether the error means the store itself can't be trusted for this run.
    ///
    /// Row-level decode failures and lookups of absent items are not fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CorruptRow(_) | Self::NotFound(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "Forecast history is unavailable. Try again later.",
            Self::QueryFailed(_) => "A forecast history operation failed.",
            Self::Corruption(_) => "Forecast history may be corrupted. Consider restoring a backup.",
            Self::CorruptRow(_) => "Some stored forecasts could not be read and were skipped.",
            Self::NotFound(_) => "No stored data for that request.",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::DatabaseCorrupt
                    || e.code == rusqlite::ErrorCode::NotADatabase =>
            {
                StoreError::Corruption(err.to_string())
            }
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::CannotOpen
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(StoreError::Unavailable("x".into()).is_fatal());
        assert!(StoreError::QueryFailed("x".into()).is_fatal());
        assert!(StoreError::Corruption("x".into()).is_fatal());
        assert!(!StoreError::corrupt_row("x").is_fatal());
        assert!(!StoreError::not_found("x").is_fatal());
    }

    #[test]
    fn test_cannot_open_maps_to_unavailable() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
            None,
        );
        assert!(matches!(StoreError::from(err), StoreError::Unavailable(_)));
    }

    #[test]
    fn test_corrupt_maps_to_corruption() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CORRUPT),
            None,
        );
        assert!(matches!(StoreError::from(err), StoreError::Corruption(_)));
    }
}
