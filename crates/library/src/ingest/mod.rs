//! Ingestion of files dropped into a user's synced directory.
//!
//! A walker task streams what it finds under `user/<name>/` to
//! [`ingest_directory`], which files each one into the user's default album
//! with at most `concurrency` files in flight. Unlike staged uploads these
//! don't go through the worker pool: every file is fully imported (or has
//! failed) by the time the call returns.

pub mod error;
mod file;
mod stream;

pub use self::file::ingest_file;
pub use self::stream::{IngestSummary, ingest_directory};
