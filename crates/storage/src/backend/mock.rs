//! In-memory storage backend for testing.

use super::{BoxSyncRead, FileInfoStream};
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::sync::RwLock;

const MOCK_ROOT: &str = "/mock";

/// In-memory storage backend for testing.
///
/// Files live in a map behind a [`RwLock`], so every trait method works on
/// `&self`. Directories are tracked separately so tests can assert on
/// [`create_dir_all`](StorageBackend::create_dir_all).
///
/// # Examples
///
/// ```
/// use mediabox_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("uploads/u/a/IMG_0001.jpg", b"jpeg"),
/// ]);
/// assert!(backend.exists(Path::new("uploads/u/a/IMG_0001.jpg")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    files: RwLock<BTreeMap<PathBuf, (UtcDateTime, Vec<u8>)>>,
    directories: RwLock<BTreeSet<PathBuf>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation; broken test setup should never
    /// pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let now = UtcDateTime::now();
        let mut map = BTreeMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            files: RwLock::new(map),
            directories: RwLock::new(BTreeSet::new()),
        }
    }

    /// Every file path currently stored, in sorted order.
    pub async fn paths(&self) -> Vec<PathBuf> {
        self.files.read().await.keys().cloned().collect()
    }

    /// Whether [`create_dir_all`](StorageBackend::create_dir_all) was called
    /// for this directory (or a descendant of it).
    pub async fn has_directory(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.directories.read().await.iter().any(|dir| dir.starts_with(path))
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        Box::pin(stream! {
            // Snapshot under the read lock so it isn't held across yields.
            let entries: Vec<FileInfo> = {
                let guard = self.files.read().await;
                guard
                    .iter()
                    .filter(|(path, _)| validated_prefix.as_ref().is_none_or(|pfx| path.starts_with(pfx)))
                    .map(|(path, (inserted, data))| FileInfo::new(path.clone(), data.len() as u64, *inserted))
                    .collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.files.read().await.contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let guard = self.files.read().await;
        let (_, data) = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(data.clone())
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        let data = self.read(path).await?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        self.files.write().await.insert(path, (UtcDateTime::now(), data.to_vec()));
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.files.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        let mut guard = self.files.write().await;
        let data = guard.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.insert(to, data);
        Ok(())
    }

    async fn rename_new(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        let mut guard = self.files.write().await;
        if !guard.contains_key(&from) {
            exn::bail!(ErrorKind::NotFound(from));
        }
        if guard.contains_key(&to) {
            exn::bail!(ErrorKind::AlreadyExists(to));
        }
        if let Some(data) = guard.remove(&from) {
            guard.insert(to, data);
        }
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        if self.files.read().await.contains_key(&path) {
            exn::bail!(ErrorKind::AlreadyExists(path));
        }
        self.directories.write().await.insert(path);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = self.files.read().await;
        let (inserted, data) = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(FileInfo::new(path.clone(), data.len() as u64, *inserted))
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        Ok(Path::new(MOCK_ROOT).join(validate_path(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_not_found() {
        let backend = MockBackend::default();
        let err = backend.read(Path::new("missing.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename() {
        let backend = MockBackend::with_files([("uploads/u/a/x.jpg", b"data")]);
        backend.rename(Path::new("uploads/u/a/x.jpg"), Path::new("originals/u/a/x.jpg")).await.unwrap();
        assert_eq!(backend.paths().await, vec![PathBuf::from("originals/u/a/x.jpg")]);
        let err = backend.rename(Path::new("uploads/u/a/x.jpg"), Path::new("y.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename_new() {
        let backend = MockBackend::with_files([("a.jpg", b"a"), ("b.jpg", b"b")]);
        let err = backend.rename_new(Path::new("a.jpg"), Path::new("b.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
        assert_eq!(backend.read(Path::new("b.jpg")).await.unwrap(), b"b");
        backend.rename_new(Path::new("a.jpg"), Path::new("c.jpg")).await.unwrap();
        assert_eq!(backend.paths().await, vec![PathBuf::from("b.jpg"), PathBuf::from("c.jpg")]);
    }

    #[tokio::test]
    async fn test_create_dir_all() {
        let backend = MockBackend::with_files([("taken", b"file")]);
        backend.create_dir_all(Path::new("thumbnails/u/a")).await.unwrap();
        backend.create_dir_all(Path::new("thumbnails/u/a")).await.unwrap();
        assert!(backend.has_directory("thumbnails/u").await);
        assert!(!backend.has_directory("originals").await);
        let err = backend.create_dir_all(Path::new("taken")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let backend = MockBackend::with_files([
            ("user/alice/a.jpg", b"a"),
            ("user/alice/trip/b.arw", b"b"),
            ("user/alicia/c.jpg", b"c"),
        ]);
        let files = backend.list(Some(Path::new("user/alice"))).await.unwrap();
        let paths: Vec<_> = files.into_iter().map(|f| f.path).collect();
        assert_eq!(paths, vec![PathBuf::from("user/alice/a.jpg"), PathBuf::from("user/alice/trip/b.arw")]);
    }

    #[test]
    fn test_resolve() {
        let backend = MockBackend::default();
        assert_eq!(backend.resolve(Path::new("a/b.jpg")).unwrap(), PathBuf::from("/mock/a/b.jpg"));
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", b"bad")]);
    }
}
