use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::hash::file_hash;
use crate::ingest::error::{ErrorKind, Result as IngestResult};
use crate::upload::{content_type, unique_filename};
use crate::{AlbumLayout, Context};
use exn::ResultExt;
use mediabox_catalog::{Album, NewPhoto, Photo, User};
use mediabox_storage::FileInfo;
use mediabox_storage::error::ErrorKind as StorageErrorKind;
use mediabox_thumbnail::SourceKind;
use time::UtcDateTime;

/// File one discovered file into `album`.
///
/// Records the photo, renders its thumbnail from where it was found, moves
/// it into `originals/` and marks it imported. If anything fails, the file is
/// put back where it was found and the record is removed again, so the next
/// run picks it up cleanly.
pub async fn ingest_file(ctx: &Context, user: &User, album: &Album, file: &FileInfo) -> LibraryResult<Photo> {
    ingest_file_inner(ctx, user, album, file).await.or_raise(|| LibraryErrorKind::Ingest)
}

async fn ingest_file_inner(ctx: &Context, user: &User, album: &Album, file: &FileInfo) -> IngestResult<Photo> {
    let Some(name) = file.file_name() else {
        exn::bail!(ErrorKind::InvalidName(file.path.clone()));
    };
    let layout = AlbumLayout::new(user, album);
    let backend = &ctx.backend;

    let hash = file_hash(backend, &file.path).await.or_raise(|| ErrorKind::Storage)?;

    backend.create_dir_all(&layout.originals()).await.or_raise(|| ErrorKind::Storage)?;
    backend.create_dir_all(&layout.thumbnails()).await.or_raise(|| ErrorKind::Storage)?;

    let photo = NewPhoto {
        name: name.to_string(),
        file_name: unique_filename(name, UtcDateTime::now()),
        file_hash: Some(hash),
        file_size: file.size,
        file_type: content_type(name),
        user_id: user.id,
        album_id: album.id,
    };
    let mut photo = ctx.catalog.create_photo(photo).await.or_raise(|| ErrorKind::Catalog)?;

    if let Err(err) = place(ctx, &layout, file, &photo).await {
        forget(ctx, &photo).await;
        return Err(err);
    }
    if let Err(err) = ctx.catalog.set_imported(photo.id, true).await {
        unplace(ctx, &layout, file, &photo).await;
        forget(ctx, &photo).await;
        return Err(err).or_raise(|| ErrorKind::Catalog);
    }
    photo.is_imported = true;
    Ok(photo)
}

async fn forget(ctx: &Context, photo: &Photo) {
    if let Err(err) = ctx.catalog.delete_photo_record(photo.id).await {
        tracing::warn!(photo = photo.id, error = ?err, "Could not remove record of failed ingestion");
    }
}

/// Undo [`place`]: the original goes back to where it was found and the
/// thumbnail is dropped.
async fn unplace(ctx: &Context, layout: &AlbumLayout, file: &FileInfo, photo: &Photo) {
    let backend = &ctx.backend;
    let original = layout.original(&photo.file_name);
    if let Err(err) = backend.rename_new(&original, &file.path).await {
        let path = original.display();
        tracing::error!(photo = photo.id, %path, error = ?err, "Could not move ingested file back");
    }
    let thumbnail = layout.thumbnail(&photo.file_name);
    match backend.delete(&thumbnail).await {
        Ok(()) => {},
        Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {},
        Err(err) => {
            tracing::warn!(photo = photo.id, path = %thumbnail.display(), error = ?err, "Could not remove thumbnail");
        },
    }
}

/// Thumbnail, then move.
async fn place(ctx: &Context, layout: &AlbumLayout, file: &FileInfo, photo: &Photo) -> IngestResult<()> {
    let backend = &ctx.backend;
    let source = backend.resolve(&file.path).or_raise(|| ErrorKind::Storage)?;
    let target = backend.resolve(&layout.thumbnail(&photo.file_name)).or_raise(|| ErrorKind::Storage)?;
    let kind = SourceKind::from_extension(&photo.ext);
    ctx.thumbnails.create_thumbnail(&source, &target, kind).await.or_raise(|| ErrorKind::Thumbnail)?;
    backend.rename(&file.path, &layout.original(&photo.file_name)).await.or_raise(|| ErrorKind::Storage)?;
    Ok(())
}
