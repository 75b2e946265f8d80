//! Thumbnail Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A thumbnail error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for thumbnail operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Neither a target width nor a target height was configured.
    #[display("thumbnail needs at least one of width or height")]
    MissingDimensions,
    /// The external RAW converter isn't installed (or isn't on `PATH`).
    #[display("RAW converter not found: {_0}")]
    ConverterNotFound(#[error(not(source))] String),
    /// The external RAW converter ran but didn't produce a thumbnail.
    #[display("RAW converter failed: {_0}")]
    ConverterFailed(#[error(not(source))] String),
    /// The scaler was used outside of its `start()`/`shutdown()` bracket.
    #[display("image scaler has not been started")]
    NotStarted,
    /// Scaler limits must allow at least one file and one operation.
    #[display("invalid scaler limits: {_0}")]
    InvalidLimits(#[error(not(source))] &'static str),
    /// Source image could not be decoded (corrupt, unsupported, or too big).
    #[display("could not decode source image")]
    Decode,
    /// The thumbnail for this source would need more memory than the scaler
    /// allows, typically a very thin image scaled up to the target height.
    #[display("a {width}x{height} thumbnail would exceed the memory limit")]
    TooLarge { width: u32, height: u32 },
    #[display("could not encode thumbnail")]
    Encode,
    #[display("I/O error")]
    Io,
    /// Image processing panicked; the panic was contained.
    #[display("image processing panicked: {_0}")]
    Panicked(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::NotStarted)
    }
}
