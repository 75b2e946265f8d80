//! Staging uploads for the import pipeline.

use crate::error::{ErrorKind, Result};
use crate::{AlbumLayout, Context};
use exn::ResultExt;
use mediabox_catalog::{Album, NewPhoto, Photo, User};
use std::path::Path;
use time::UtcDateTime;
use tracing::instrument;
use uuid::Uuid;

/// A storage name for `original` that won't collide with earlier uploads of
/// the same file: the stem, a UTC timestamp and a short random suffix,
/// followed by the original extension.
///
/// `IMG_0001.JPG` becomes something like
/// `IMG_0001_2025-06-01_12-30-00_3f2a9c1b.JPG`.
pub fn unique_filename(original: &str, now: UtcDateTime) -> String {
    let path = Path::new(original);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(original);
    let suffix = Uuid::new_v4().simple().to_string();
    let unique = format!(
        "{stem}_{:04}-{:02}-{:02}_{:02}-{:02}-{:02}_{}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        &suffix[..8],
    );
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{unique}.{ext}"),
        None => unique,
    }
}

/// MIME type for a file name, by extension.
pub(crate) fn content_type(name: &str) -> String {
    mime_guess::from_path(name).first_or_octet_stream().essence_str().to_string()
}

/// The final component of an uploaded name, rejecting anything that would
/// leave the album directory.
fn display_name(original: &str) -> Result<&str> {
    match Path::new(original).file_name().and_then(|name| name.to_str()) {
        Some(name) if name == original.trim_start_matches("./") => Ok(name),
        _ => exn::bail!(ErrorKind::InvalidName(original.to_string())),
    }
}

/// Write an uploaded file to the album's staging area and record it as
/// pending.
///
/// The photo keeps `original` as its display name and is stored under a
/// [`unique_filename`]. If the catalog refuses the record, the staged file is
/// removed again.
#[instrument(skip(ctx, user, album, bytes), fields(user = %user.name, album = %album.name, size = bytes.len()))]
pub async fn stage_upload(ctx: &Context, user: &User, album: &Album, original: &str, bytes: &[u8]) -> Result<Photo> {
    let name = display_name(original)?;
    let file_name = unique_filename(name, UtcDateTime::now());
    let staged = AlbumLayout::new(user, album).upload(&file_name);

    ctx.backend.write(&staged, bytes).await.or_raise(|| ErrorKind::Storage)?;
    let photo = NewPhoto {
        name: name.to_string(),
        file_name,
        file_hash: Some(blake3::hash(bytes).to_hex().to_string()),
        file_size: bytes.len() as u64,
        file_type: content_type(name),
        user_id: user.id,
        album_id: album.id,
    };
    match ctx.catalog.create_photo(photo).await {
        Ok(photo) => {
            tracing::info!(photo = photo.id, file_name = %photo.file_name, "Upload staged");
            Ok(photo)
        },
        Err(err) => {
            if let Err(cleanup) = ctx.backend.delete(&staged).await {
                tracing::warn!(path = %staged.display(), error = ?cleanup, "Could not remove orphaned upload");
            }
            Err(err).or_raise(|| ErrorKind::Catalog)
        },
    }
}
