use mediabox_catalog::{Album, User};
use std::path::PathBuf;

/// Staged uploads, waiting to be imported.
pub const UPLOADS: &str = "uploads";
/// Imported originals.
pub const ORIGINALS: &str = "originals";
/// JPEG thumbnails of imported photos.
pub const THUMBNAILS: &str = "thumbnails";
/// Per-user synced directories, drained by directory ingestion.
pub const SYNCED: &str = "user";

/// Storage paths for one album.
///
/// Directories are keyed by the user's and album's UUIDs, so renaming either
/// never moves files. Thumbnails are stored as `<file_name>.jpg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumLayout {
    user: String,
    album: String,
}
impl AlbumLayout {
    pub fn new(user: &User, album: &Album) -> Self {
        Self { user: user.uuid.to_string(), album: album.uuid.to_string() }
    }

    fn dir(&self, root: &str) -> PathBuf {
        [root, self.user.as_str(), self.album.as_str()].iter().collect()
    }

    pub fn uploads(&self) -> PathBuf {
        self.dir(UPLOADS)
    }

    pub fn upload(&self, file_name: &str) -> PathBuf {
        self.uploads().join(file_name)
    }

    pub fn originals(&self) -> PathBuf {
        self.dir(ORIGINALS)
    }

    pub fn original(&self, file_name: &str) -> PathBuf {
        self.originals().join(file_name)
    }

    pub fn thumbnails(&self) -> PathBuf {
        self.dir(THUMBNAILS)
    }

    pub fn thumbnail(&self, file_name: &str) -> PathBuf {
        self.thumbnails().join(format!("{file_name}.jpg"))
    }
}

/// Where a user's synced files land before ingestion (keyed by name, as the
/// sync client sees it).
pub fn synced_dir(user: &User) -> PathBuf {
    [SYNCED, user.name.as_str()].iter().collect()
}
