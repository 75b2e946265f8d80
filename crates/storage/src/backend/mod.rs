//! Storage backend trait and implementations.
//!
//! The import pipeline only ever talks to the photo tree through
//! [`StorageBackend`], so tests can swap the local filesystem for an
//! in-memory map.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;
pub type BoxSyncRead = Box<dyn Read + Send + 'static>;

/// Unified interface for the photo tree.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use mediabox_storage::{StorageBackend, error::Result};
///
/// async fn stage(backend: &dyn StorageBackend, bytes: &[u8]) -> Result<u64> {
///     let staged = Path::new("uploads/alice/holidays/IMG_0001.jpg");
///     backend.write(staged, bytes).await?;
///     Ok(backend.stat(staged).await?.size)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// List all files matching an optional prefix.
    ///
    /// Default implementation collects [`list_stream()`](Self::list_stream)
    /// into a [`Vec`].
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream file metadata matching an optional prefix.
    ///
    /// Results are yielded as soon as they are discovered. Prefix matching is
    /// component-based: `user/al` does not match `user/alice/a.jpg`. A prefix
    /// that doesn't exist yields an empty stream rather than an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// use std::path::Path;
    /// # use mediabox_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut synced = backend.list_stream(Some(Path::new("user/alice")));
    /// while let Some(info) = synced.try_next().await? {
    ///     println!("{}: {} bytes", info.path.display(), info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Open a file for streaming reads.
    ///
    /// The reader is `'static`, so it can be moved into
    /// [`spawn_blocking`](tokio::task::spawn_blocking); opening the file
    /// happens before this returns. Returns
    /// [`NotFound`](crate::error::ErrorKind::NotFound) if the file does not
    /// exist.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use mediabox_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut reader = backend.reader(Path::new("user/alice/DSCF0001.RAF")).await?;
    /// let copied = tokio::task::spawn_blocking(move || std::io::copy(&mut reader, &mut std::io::sink()));
    /// # Ok(())
    /// # }
    /// ```
    async fn reader(&self, path: &Path) -> Result<BoxSyncRead>;

    /// Write file contents, creating parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Rename/move a file within the same backend.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the source
    /// file does not exist. Parent directories of the destination are created
    /// and an existing destination is overwritten.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Like [`rename()`](Self::rename), but never replaces anything: an
    /// existing destination fails with
    /// [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists) and the
    /// source stays where it is. The check and the move are one atomic step.
    async fn rename_new(&self, from: &Path, to: &Path) -> Result<()>;

    /// Create a directory and all of its parents.
    ///
    /// Succeeds without doing anything when the directory already exists.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Absolute location of a storage path, for tools that need a real
    /// filesystem path (external converters, image decoders).
    fn resolve(&self, path: &Path) -> Result<PathBuf>;
}
