//! Error types for the [`ingest`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An ingestion error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The discovered path has no usable (UTF-8) file name.
    #[display("unusable file name: {}", _0.display())]
    InvalidName(#[error(not(source))] PathBuf),
    #[display("storage operation failed")]
    Storage,
    #[display("thumbnail generation failed")]
    Thumbnail,
    #[display("catalog operation failed")]
    Catalog,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidName(_))
    }
}
