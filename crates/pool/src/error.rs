//! Pool Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A pool error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The pool has been stopped (or its parent lifetime cancelled) and no
    /// longer accepts jobs.
    #[display("worker pool is closed")]
    Closed,
    #[display("queue capacity must be at least 1")]
    InvalidCapacity,
    /// A job returned an error. Jobs wrap their own error tree in this.
    #[display("job failed")]
    Job,
    /// A job panicked; the panic was contained by the worker.
    #[display("job panicked: {_0}")]
    Panicked(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Job failures are retried by whoever submitted them, never by the pool.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Job)
    }
}
