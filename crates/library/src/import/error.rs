//! Error types for the [`import`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An import error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for import operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which collaborator an import step failed in.
///
/// None of these are fatal to the pool: the photo stays unimported and the
/// next import pass picks it up again.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Neither the stored nor the display name of the photo exists in the
    /// uploads area.
    #[display("staged file missing: {}", _0.display())]
    StagedFileMissing(#[error(not(source))] PathBuf),
    /// Another photo with the same display name is sitting in the uploads
    /// area; it has to be imported first.
    #[display("display name already in use: {}", _0.display())]
    NameTaken(#[error(not(source))] PathBuf),
    /// Renaming, moving or creating directories failed.
    #[display("storage operation failed")]
    Storage,
    #[display("thumbnail generation failed")]
    Thumbnail,
    #[display("catalog operation failed")]
    Catalog,
    /// The worker pool refused the job (it is shutting down).
    #[display("could not submit import job")]
    Submit,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Submit)
    }
}
