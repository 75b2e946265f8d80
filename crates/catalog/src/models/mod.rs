//! Catalog models and their database row counterparts.

mod row;

pub(crate) use self::row::{AlbumRow, ExpiredRow, PhotoRow, UserRow};
use std::path::Path;
use time::UtcDateTime;
use uuid::Uuid;

pub type UserId = i64;
pub type AlbumId = i64;
pub type PhotoId = i64;

/// Name of the album every user gets on creation.
pub const DEFAULT_ALBUM: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub uuid: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub id: AlbumId,
    pub uuid: Uuid,
    pub name: String,
    pub user_id: UserId,
}

/// A photo record.
///
/// `name` is what the photo was called when it arrived; `file_name` is the
/// unique name it is stored under in `uploads/`, `originals/` and (with a
/// `.jpg` suffix) `thumbnails/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: PhotoId,
    pub name: String,
    pub file_name: String,
    pub file_hash: Option<String>,
    pub file_size: u64,
    /// MIME type guessed from the extension.
    pub file_type: String,
    /// Lowercased extension of `name`, without the dot.
    pub ext: String,
    pub is_imported: bool,
    pub is_valid: bool,
    pub expired_at: Option<UtcDateTime>,
    pub user_id: UserId,
    pub album_id: AlbumId,
    pub created_at: UtcDateTime,
}
impl Photo {
    /// Eligible for the import pipeline.
    pub fn is_pending(&self) -> bool {
        !self.is_imported && self.is_valid
    }
}

/// Everything needed to insert a photo record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub name: String,
    pub file_name: String,
    pub file_hash: Option<String>,
    pub file_size: u64,
    pub file_type: String,
    pub user_id: UserId,
    pub album_id: AlbumId,
}
impl NewPhoto {
    pub(crate) fn ext(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }
}

/// An expired photo together with the owner and album needed to locate its
/// files on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredPhoto {
    pub photo: Photo,
    pub user: User,
    pub album: Album,
}
