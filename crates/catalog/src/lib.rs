//! SQLite catalog of users, albums and photos.
//!
//! The catalog is the durable side of the import pipeline. A photo's
//! `is_imported`/`is_valid` flags are the only record of how far it got, so
//! everything else (jobs, workers) can be rebuilt after a crash by asking the
//! catalog what is still pending.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{
    Album, AlbumId, DEFAULT_ALBUM, ExpiredPhoto, NewPhoto, Photo, PhotoId, User, UserId,
};
pub use crate::repo::Repository;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use time::UtcDateTime;

pub type CatalogHandle = Arc<dyn Catalog + Send + Sync>;

/// Queries and mutations the import pipeline needs from the catalog.
///
/// [`Repository`] is the SQLite implementation; tests wrap it to count or
/// fail calls.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Create a user together with their [`DEFAULT_ALBUM`].
    async fn create_user(&self, name: &str) -> Result<User>;

    /// Returns [`UserNotFound`](crate::error::ErrorKind::UserNotFound) for unknown names.
    async fn find_user(&self, name: &str) -> Result<User>;

    async fn create_album(&self, user: &User, name: &str) -> Result<Album>;

    /// Returns [`AlbumNotFound`](crate::error::ErrorKind::AlbumNotFound) when the user has
    /// no album with that name.
    async fn find_album(&self, user: &User, name: &str) -> Result<Album>;

    async fn list_albums(&self, user: &User) -> Result<Vec<Album>>;

    async fn find_default_album(&self, user: &User) -> Result<Album> {
        self.find_album(user, DEFAULT_ALBUM).await
    }

    async fn create_photo(&self, photo: NewPhoto) -> Result<Photo>;

    async fn find_photo(&self, id: PhotoId) -> Result<Photo>;

    /// Photos in an album with `is_imported = false AND is_valid = true`.
    async fn find_unimported_photos(&self, album: AlbumId) -> Result<Vec<Photo>>;

    /// Returns [`PhotoNotFound`](crate::error::ErrorKind::PhotoNotFound) if no record was
    /// updated.
    async fn set_imported(&self, photo: PhotoId, imported: bool) -> Result<()>;

    /// Soft-delete photos owned by `user`, scheduling them for removal at
    /// `expires_at`. Returns the number of records changed; ids belonging to
    /// someone else are ignored.
    async fn invalidate_photos(&self, user: &User, photos: &[PhotoId], expires_at: UtcDateTime) -> Result<u64>;

    /// Invalid photos whose expiry is at or before `now`.
    async fn find_expired_photos(&self, now: UtcDateTime) -> Result<Vec<ExpiredPhoto>>;

    async fn delete_photo_record(&self, photo: PhotoId) -> Result<()>;
}

/// Convenience for callers that only have a user name.
pub async fn find_user_albums(catalog: &dyn Catalog, name: &str) -> Result<(User, Vec<Album>)> {
    let user = catalog.find_user(name).await?;
    let albums = catalog.list_albums(&user).await?;
    if albums.is_empty() {
        tracing::debug!(user = %user.name, "User has no albums");
    }
    Ok((user, albums))
}
