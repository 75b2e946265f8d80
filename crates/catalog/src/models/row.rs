use super::{Album, ExpiredPhoto, Photo, User};
use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::UtcDateTime;
use uuid::Uuid;

fn parse_uuid(value: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(value).or_raise(|| ErrorKind::InvalidData("uuid"))
}

fn parse_timestamp(value: i64, field: &'static str) -> Result<UtcDateTime, Error> {
    UtcDateTime::from_unix_timestamp(value).or_raise(|| ErrorKind::InvalidData(field))
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    id: i64,
    uuid: String,
    name: String,
}
impl TryFrom<UserRow> for User {
    type Error = Error;
    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self { id: row.id, uuid: parse_uuid(&row.uuid)?, name: row.name })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AlbumRow {
    id: i64,
    uuid: String,
    name: String,
    user_id: i64,
}
impl TryFrom<AlbumRow> for Album {
    type Error = Error;
    fn try_from(row: AlbumRow) -> Result<Self, Self::Error> {
        Ok(Self { id: row.id, uuid: parse_uuid(&row.uuid)?, name: row.name, user_id: row.user_id })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PhotoRow {
    id: i64,
    name: String,
    file_name: String,
    file_hash: Option<String>,
    file_size: i64,
    file_type: String,
    ext: String,
    is_imported: bool,
    is_valid: bool,
    expired_at: Option<i64>,
    user_id: i64,
    album_id: i64,
    created_at: i64,
}
impl TryFrom<PhotoRow> for Photo {
    type Error = Error;
    fn try_from(row: PhotoRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            file_name: row.file_name,
            file_hash: row.file_hash,
            file_size: u64::try_from(row.file_size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            file_type: row.file_type,
            ext: row.ext,
            is_imported: row.is_imported,
            is_valid: row.is_valid,
            expired_at: row.expired_at.map(|ts| parse_timestamp(ts, "expiry date")).transpose()?,
            user_id: row.user_id,
            album_id: row.album_id,
            created_at: parse_timestamp(row.created_at, "creation date")?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ExpiredRow {
    #[sqlx(flatten)]
    photo: PhotoRow,
    user_uuid: String,
    user_name: String,
    album_uuid: String,
    album_name: String,
}
impl TryFrom<ExpiredRow> for ExpiredPhoto {
    type Error = Error;
    fn try_from(row: ExpiredRow) -> Result<Self, Self::Error> {
        let photo = Photo::try_from(row.photo)?;
        let user = User { id: photo.user_id, uuid: parse_uuid(&row.user_uuid)?, name: row.user_name };
        let album =
            Album { id: photo.album_id, uuid: parse_uuid(&row.album_uuid)?, name: row.album_name, user_id: photo.user_id };
        Ok(Self { photo, user, album })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo_row() -> PhotoRow {
        PhotoRow {
            id: 7,
            name: "IMG_0001.JPG".to_string(),
            file_name: "IMG_0001_20250101T000000_1a2b3c4d.JPG".to_string(),
            file_hash: None,
            file_size: 2048,
            file_type: "image/jpeg".to_string(),
            ext: "jpg".to_string(),
            is_imported: false,
            is_valid: true,
            expired_at: None,
            user_id: 1,
            album_id: 2,
            created_at: 1_735_689_600,
        }
    }

    #[test]
    fn test_photo_row_to_model() {
        let photo = Photo::try_from(photo_row()).unwrap();
        assert_eq!(photo.file_size, 2048);
        assert!(photo.is_pending());
        assert_eq!(photo.created_at.unix_timestamp(), 1_735_689_600);
    }

    #[test]
    fn test_negative_file_size_is_invalid() {
        let row = PhotoRow { file_size: -1, ..photo_row() };
        let err = Photo::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("file size")));
    }

    #[test]
    fn test_invalid_uuid() {
        let row = UserRow { id: 1, uuid: "not-a-uuid".to_string(), name: "alice".to_string() };
        let err = User::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("uuid")));
    }
}
