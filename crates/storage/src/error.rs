//! Storage errors.
//!
//! Variants carry the storage-relative path involved so pipeline logs can
//! say which photo file was affected without extra context.

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("no such file in the photo tree: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("not allowed to access {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    #[display("{} is already taken", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
    #[display("filesystem operation failed")]
    Io(std::io::Error),
    /// Escapes the storage root, or isn't a usable path at all.
    #[display("refusing path {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    #[display("storage backend failure: {_0}")]
    BackendError(#[error(not(source))] String),
}

impl ErrorKind {
    /// Transient filesystem trouble is worth another pass of the pipeline;
    /// a missing or forbidden file is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::BackendError(_))
    }
}
