//! SQLite-backed [`Catalog`] implementation.

use crate::error::{ErrorKind, Result};
use crate::models::{AlbumRow, ExpiredRow, PhotoRow, UserRow};
use crate::{Album, AlbumId, Catalog, DEFAULT_ALBUM, Database, ExpiredPhoto, NewPhoto, Photo, PhotoId, User};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;
use uuid::Uuid;

/// Repository for users, albums and photos.
///
/// # Relationships
///
/// - Every user owns at least the [`DEFAULT_ALBUM`], created alongside them
/// - Photos belong to exactly one album of their owner
/// - Deleting a user or album cascades to its photos
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn now() -> i64 {
        UtcDateTime::now().unix_timestamp()
    }

    /// Unique constraint violations become [`ErrorKind::Conflict`], anything
    /// else is a plain database error.
    fn classify(err: &sqlx::Error, what: impl Into<String>) -> ErrorKind {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => ErrorKind::Conflict(what.into()),
            _ => ErrorKind::Database,
        }
    }

    async fn insert_album(
        conn: &mut sqlx::SqliteConnection,
        user: i64,
        name: &str,
        created_at: i64,
    ) -> Result<Album> {
        let row: AlbumRow = sqlx::query_as(include_str!("../queries/create_album.sql"))
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .bind(user)
            .bind(created_at)
            .fetch_one(conn)
            .await
            .map_err(|e| {
                let kind = Self::classify(&e, format!("album {name}"));
                exn::Exn::from(e).raise(kind)
            })?;
        row.try_into()
    }
}

#[async_trait]
impl Catalog for Repository {
    async fn create_user(&self, name: &str) -> Result<User> {
        let now = Self::now();
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let row: UserRow = sqlx::query_as(include_str!("../queries/create_user.sql"))
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                let kind = Self::classify(&e, format!("user {name}"));
                exn::Exn::from(e).raise(kind)
            })?;
        let user = User::try_from(row)?;
        Self::insert_album(&mut *tx, user.id, DEFAULT_ALBUM, now).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::info!(user = %user.name, uuid = %user.uuid, "Created user");
        Ok(user)
    }

    async fn find_user(&self, name: &str) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(include_str!("../queries/find_user.sql"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => row.try_into(),
            None => exn::bail!(ErrorKind::UserNotFound(name.to_string())),
        }
    }

    async fn create_album(&self, user: &User, name: &str) -> Result<Album> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        let album = Self::insert_album(&mut *conn, user.id, name, Self::now()).await?;
        tracing::info!(user = %user.name, album = %album.name, uuid = %album.uuid, "Created album");
        Ok(album)
    }

    async fn find_album(&self, user: &User, name: &str) -> Result<Album> {
        let row: Option<AlbumRow> = sqlx::query_as(include_str!("../queries/find_album.sql"))
            .bind(user.id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => row.try_into(),
            None => exn::bail!(ErrorKind::AlbumNotFound(format!("{}/{name}", user.name))),
        }
    }

    async fn list_albums(&self, user: &User) -> Result<Vec<Album>> {
        let rows: Vec<AlbumRow> = sqlx::query_as(include_str!("../queries/list_albums.sql"))
            .bind(user.id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Album::try_from).collect()
    }

    async fn create_photo(&self, photo: NewPhoto) -> Result<Photo> {
        let now = Self::now();
        let ext = photo.ext();
        let size = i64::try_from(photo.file_size).or_raise(|| ErrorKind::InvalidData("file size"))?;
        let row: PhotoRow = sqlx::query_as(include_str!("../queries/create_photo.sql"))
            .bind(&photo.name)
            .bind(&photo.file_name)
            .bind(&photo.file_hash)
            .bind(size)
            .bind(&photo.file_type)
            .bind(ext)
            .bind(photo.user_id)
            .bind(photo.album_id)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                let kind = Self::classify(&e, format!("photo {}", photo.file_name));
                exn::Exn::from(e).raise(kind)
            })?;
        row.try_into()
    }

    async fn find_photo(&self, id: PhotoId) -> Result<Photo> {
        let row: Option<PhotoRow> = sqlx::query_as(include_str!("../queries/find_photo.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => row.try_into(),
            None => exn::bail!(ErrorKind::PhotoNotFound(id)),
        }
    }

    async fn find_unimported_photos(&self, album: AlbumId) -> Result<Vec<Photo>> {
        let rows: Vec<PhotoRow> = sqlx::query_as(include_str!("../queries/find_unimported_photos.sql"))
            .bind(album)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Photo::try_from).collect()
    }

    async fn set_imported(&self, photo: PhotoId, imported: bool) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/set_imported.sql"))
            .bind(imported)
            .bind(Self::now())
            .bind(photo)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::PhotoNotFound(photo));
        }
        Ok(())
    }

    async fn invalidate_photos(&self, user: &User, photos: &[PhotoId], expires_at: UtcDateTime) -> Result<u64> {
        let now = Self::now();
        let mut changed = 0;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for photo in photos {
            let result = sqlx::query(include_str!("../queries/invalidate_photo.sql"))
                .bind(expires_at.unix_timestamp())
                .bind(now)
                .bind(photo)
                .bind(user.id)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            changed += result.rows_affected();
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(changed)
    }

    async fn find_expired_photos(&self, now: UtcDateTime) -> Result<Vec<ExpiredPhoto>> {
        let rows: Vec<ExpiredRow> = sqlx::query_as(include_str!("../queries/find_expired_photos.sql"))
            .bind(now.unix_timestamp())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(ExpiredPhoto::try_from).collect()
    }

    async fn delete_photo_record(&self, photo: PhotoId) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/delete_photo.sql"))
            .bind(photo)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::PhotoNotFound(photo));
        }
        Ok(())
    }
}
