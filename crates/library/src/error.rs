//! Library Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. The [`import`](crate::import) and
//! [`ingest`](crate::ingest) modules have their own, more specific kinds
//! which are raised into these at the module boundary.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("import failed")]
    Import,
    #[display("directory ingestion failed")]
    Ingest,
    /// An upload had no usable file name.
    #[display("invalid file name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// A storage backend operation failed.
    #[display("storage operation failed")]
    Storage,
    /// A catalog query or update failed.
    #[display("catalog operation failed")]
    Catalog,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidName(_))
    }
}
