//! Catalog Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    #[display("user not found: {_0}")]
    UserNotFound(#[error(not(source))] String),
    #[display("album not found: {_0}")]
    AlbumNotFound(#[error(not(source))] String),
    #[display("photo not found: {_0}")]
    PhotoNotFound(#[error(not(source))] i64),
    /// A record with the same unique key already exists.
    #[display("already exists: {_0}")]
    Conflict(#[error(not(source))] String),
    /// A stored value couldn't be converted back into its model.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Only plain database errors qualify; SQLite reports lock contention
    /// (`SQLITE_BUSY`) through them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
