//! Photo tree on the local filesystem, through `tokio::fs`.

use crate::backend::{BoxSyncRead, FileInfoStream};
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{FileInfo, StorageBackend};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

/// Turn an I/O failure on `path` into the matching storage error.
fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ErrorKind + '_ {
    move |err| match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
        io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists(path.to_path_buf()),
        _ => ErrorKind::Io(err),
    }
}

fn file_info(path: &Path, metadata: &Metadata) -> Result<FileInfo> {
    let modified = metadata.modified().map_err(ErrorKind::Io)?;
    Ok(FileInfo::new(path, metadata.len(), modified.into()))
}

/// What the walk does with one directory entry.
enum Visit {
    Yield(FileInfo),
    Enter(PathBuf),
    Ignore,
}

/// Backend rooted at an absolute directory, e.g. the configured `storage_path`.
///
/// ```no_run
/// use mediabox_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/srv/mediabox")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// The root is created when missing; a relative root, or one that is a
    /// file, is an [`InvalidPath`](ErrorKind::InvalidPath).
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        // Startup only, so blocking is fine.
        std::fs::create_dir_all(&root).map_err(io_error(&root))?;
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(path)?))
    }

    /// Entries of `dir` sorted by name; a directory that vanished is empty.
    async fn children(dir: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => exn::bail!(io_error(dir)(err)),
        };
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error(dir))? {
            children.push(entry);
        }
        children.sort_by_key(DirEntry::file_name);
        Ok(children)
    }

    async fn visit(&self, entry: &DirEntry, prefix: Option<&Path>) -> Result<Visit> {
        let absolute = entry.path();
        let metadata = entry.metadata().await.map_err(io_error(&absolute))?;
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("{} is outside {}", absolute.display(), self.root.display()))
        })?;
        let under_prefix = prefix.is_none_or(|prefix| relative.starts_with(prefix));
        if metadata.is_dir() {
            // Directories above the prefix still have to be entered to reach it.
            let on_the_way = prefix.is_some_and(|prefix| prefix.starts_with(relative));
            return Ok(if under_prefix || on_the_way { Visit::Enter(absolute) } else { Visit::Ignore });
        }
        // Anything that is neither a file nor a directory is a dangling symlink.
        if !under_prefix || !metadata.is_file() {
            return Ok(Visit::Ignore);
        }
        Ok(Visit::Yield(file_info(relative, &metadata)?))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    /// Depth-first, in file name order within each directory.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let prefix = match prefix.map(validate_path).transpose() {
            Ok(prefix) => prefix,
            Err(err) => return Box::pin(futures::stream::once(async { Err(err) })),
        };
        // The prefix itself may be a file or not exist yet; start one level up.
        let start = match prefix.as_deref().and_then(Path::parent) {
            Some(parent) => self.root.join(parent),
            None => self.root.clone(),
        };

        Box::pin(stream! {
            let mut pending = vec![start];
            while let Some(dir) = pending.pop() {
                let children = match Self::children(&dir).await {
                    Ok(children) => children,
                    Err(err) => {
                        yield Err(err);
                        continue;
                    },
                };
                let mut subdirs = Vec::new();
                for child in &children {
                    match self.visit(child, prefix.as_deref()).await {
                        Ok(Visit::Yield(info)) => yield Ok(info),
                        Ok(Visit::Enter(subdir)) => subdirs.push(subdir),
                        Ok(Visit::Ignore) => {},
                        Err(err) => yield Err(err),
                    }
                }
                // Reversed so the stack pops them in name order.
                pending.extend(subdirs.into_iter().rev());
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let location = self.locate(path)?;
        Ok(fs::try_exists(&location).await.map_err(io_error(path))?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let location = self.locate(path)?;
        Ok(fs::read(&location).await.map_err(io_error(path))?)
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        let location = self.locate(path)?;
        let file = fs::File::open(&location).await.map_err(io_error(path))?;
        Ok(Box::new(file.into_std().await))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let location = self.locate(path)?;
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent).await.map_err(io_error(path))?;
        }
        Ok(fs::write(&location, data).await.map_err(io_error(path))?)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let location = self.locate(path)?;
        Ok(fs::remove_file(&location).await.map_err(io_error(path))?)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let source = self.locate(from)?;
        let destination = self.locate(to)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(io_error(to))?;
        }
        // A missing source is reported against the source path.
        if !fs::try_exists(&source).await.map_err(io_error(from))? {
            exn::bail!(ErrorKind::NotFound(from.to_path_buf()));
        }
        Ok(fs::rename(&source, &destination).await.map_err(io_error(to))?)
    }

    async fn rename_new(&self, from: &Path, to: &Path) -> Result<()> {
        let source = self.locate(from)?;
        let destination = self.locate(to)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(io_error(to))?;
        }
        // Linking refuses an existing destination, where rename(2) replaces it.
        fs::hard_link(&source, &destination).await.map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound(from.to_path_buf()),
            _ => io_error(to)(err),
        })?;
        Ok(fs::remove_file(&source).await.map_err(io_error(from))?)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let location = self.locate(path)?;
        Ok(fs::create_dir_all(&location).await.map_err(io_error(path))?)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let location = self.locate(path)?;
        let metadata = fs::metadata(&location).await.map_err(io_error(path))?;
        file_info(path, &metadata)
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        self.locate(path)
    }
}
