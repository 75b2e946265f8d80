//! Soft deletion and cleanup of expired photos.
//!
//! Deleting a photo only marks it invalid and schedules it for removal after
//! the retention window; until then it's out of every listing and out of the
//! import pipeline but still on disk. [`clean_up_expired_photos`] removes
//! whatever has passed its expiry.

use crate::error::{ErrorKind, Result};
use crate::hash::holds;
use crate::{AlbumLayout, Context};
use exn::ResultExt;
use mediabox_catalog::{Photo, PhotoId, User};
use std::path::PathBuf;
use time::{Duration, UtcDateTime};
use tracing::instrument;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Photos whose records were deleted.
    pub photos: usize,
    pub files_removed: usize,
    /// Files that could not be removed (logged, and otherwise ignored).
    pub files_failed: usize,
}

/// Soft-delete `photos` belonging to `user`, to be removed for good once
/// `retention` has passed. Returns how many photos were marked; ids that
/// don't belong to the user are ignored.
#[instrument(skip(ctx, user), fields(user = %user.name))]
pub async fn invalidate_photos(ctx: &Context, user: &User, photos: &[PhotoId], retention: Duration) -> Result<u64> {
    let expires_at = UtcDateTime::now() + retention;
    let marked = ctx.catalog.invalidate_photos(user, photos, expires_at).await.or_raise(|| ErrorKind::Catalog)?;
    tracing::info!(requested = photos.len(), marked, %expires_at, "Photos scheduled for deletion");
    Ok(marked)
}

/// Delete the files and records of every photo past its expiry.
///
/// That's the thumbnail and the original, plus whatever is left in
/// `uploads/` for photos that never finished importing. Files that are
/// already gone or can't be removed are logged and skipped; failing to
/// delete a record stops the cleanup with an error.
#[instrument(skip_all)]
pub async fn clean_up_expired_photos(ctx: &Context) -> Result<CleanupSummary> {
    let expired = ctx.catalog.find_expired_photos(UtcDateTime::now()).await.or_raise(|| ErrorKind::Catalog)?;
    tracing::info!(expired = expired.len(), "Cleaning up expired photos");

    let mut summary = CleanupSummary::default();
    for entry in expired {
        let layout = AlbumLayout::new(&entry.user, &entry.album);
        let file_name = &entry.photo.file_name;
        let mut paths = vec![layout.thumbnail(file_name), layout.original(file_name)];
        if !entry.photo.is_imported {
            paths.extend(leftover_uploads(ctx, &layout, &entry.photo).await);
        }
        for path in paths {
            match ctx.backend.delete(&path).await {
                Ok(()) => summary.files_removed += 1,
                Err(err) => {
                    summary.files_failed += 1;
                    tracing::error!(photo = entry.photo.id, path = %path.display(), error = ?err, "Could not delete photo file");
                },
            }
        }
        ctx.catalog.delete_photo_record(entry.photo.id).await.or_raise(|| ErrorKind::Catalog)?;
        summary.photos += 1;
    }
    tracing::info!(
        photos = summary.photos,
        files_removed = summary.files_removed,
        files_failed = summary.files_failed,
        "Expired photos cleaned up"
    );
    Ok(summary)
}

/// The staged upload of a photo that was never imported, and the copy renamed
/// to its display name if that still holds this photo's content. Only files
/// that exist are returned.
async fn leftover_uploads(ctx: &Context, layout: &AlbumLayout, photo: &Photo) -> Vec<PathBuf> {
    let staged = layout.upload(&photo.file_name);
    let renamed = layout.upload(&photo.name);
    let mut leftovers = Vec::new();
    match ctx.backend.exists(&staged).await {
        Ok(true) => leftovers.push(staged.clone()),
        Ok(false) => {},
        Err(err) => {
            tracing::warn!(photo = photo.id, path = %staged.display(), error = ?err, "Could not check upload");
        },
    }
    if renamed != staged {
        match holds(&ctx.backend, &renamed, photo).await {
            Ok(true) => leftovers.push(renamed),
            Ok(false) => {},
            Err(err) => {
                tracing::warn!(photo = photo.id, path = %renamed.display(), error = ?err, "Could not check upload");
            },
        }
    }
    leftovers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingCatalog, Fixture};
    use mediabox_catalog::Catalog;
    use mediabox_storage::StorageBackend;
    use std::sync::Arc;

    /// Stage and import a photo so it has an original and a thumbnail.
    async fn imported(fx: &Fixture, name: &str) -> Photo {
        let photo = fx.stage(name, name.as_bytes()).await;
        fx.job(photo.clone()).import().await.unwrap();
        // The mock generator doesn't write anything.
        fx.backend.write(&fx.layout().thumbnail(&photo.file_name), b"thumb").await.unwrap();
        photo
    }

    #[tokio::test]
    async fn test_invalidate_only_touches_own_photos() {
        let fx = Fixture::new().await;
        let photo = imported(&fx, "a.jpg").await;
        let bob = fx.catalog.create_user("bob").await.unwrap();

        assert_eq!(invalidate_photos(&fx.ctx, &bob, &[photo.id], Duration::days(30)).await.unwrap(), 0);
        assert!(fx.catalog.find_photo(photo.id).await.unwrap().is_valid);

        assert_eq!(invalidate_photos(&fx.ctx, &fx.user, &[photo.id], Duration::days(30)).await.unwrap(), 1);
        let photo = fx.catalog.find_photo(photo.id).await.unwrap();
        assert!(!photo.is_valid);
        assert!(photo.expired_at.is_some_and(|at| at > UtcDateTime::now() + Duration::days(29)));
    }

    #[tokio::test]
    async fn test_invalidated_photos_are_not_imported() {
        let fx = Fixture::new().await;
        let photo = fx.stage("a.jpg", b"a").await;
        invalidate_photos(&fx.ctx, &fx.user, &[photo.id], Duration::days(1)).await.unwrap();
        assert!(fx.catalog.find_unimported_photos(fx.album.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired_only() {
        let fx = Fixture::new().await;
        let expired = imported(&fx, "a.jpg").await;
        let retained = imported(&fx, "b.jpg").await;
        let kept = imported(&fx, "c.jpg").await;
        invalidate_photos(&fx.ctx, &fx.user, &[expired.id], Duration::seconds(-1)).await.unwrap();
        invalidate_photos(&fx.ctx, &fx.user, &[retained.id], Duration::days(30)).await.unwrap();

        let summary = clean_up_expired_photos(&fx.ctx).await.unwrap();
        assert_eq!(summary, CleanupSummary { photos: 1, files_removed: 2, files_failed: 0 });

        let layout = fx.layout();
        assert!(!fx.backend.exists(&layout.original(&expired.file_name)).await.unwrap());
        assert!(!fx.backend.exists(&layout.thumbnail(&expired.file_name)).await.unwrap());
        assert!(fx.catalog.find_photo(expired.id).await.is_err());
        for photo in [&retained, &kept] {
            assert!(fx.backend.exists(&layout.original(&photo.file_name)).await.unwrap());
            assert!(fx.catalog.find_photo(photo.id).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_cleanup_removes_staged_upload() {
        let fx = Fixture::new().await;
        // Never imported: no thumbnail or original, only the staged file.
        let photo = fx.stage("a.jpg", b"a").await;
        invalidate_photos(&fx.ctx, &fx.user, &[photo.id], Duration::seconds(-1)).await.unwrap();

        let summary = clean_up_expired_photos(&fx.ctx).await.unwrap();
        assert_eq!(summary, CleanupSummary { photos: 1, files_removed: 1, files_failed: 2 });
        assert!(fx.backend.paths().await.is_empty());
        assert!(fx.catalog.find_photo(photo.id).await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_removes_renamed_upload() {
        let fx = Fixture::new().await;
        let photo = fx.stage("IMG_0001.jpg", b"photo A").await;
        let layout = fx.layout();
        fx.backend.rename(&layout.upload(&photo.file_name), &layout.upload(&photo.name)).await.unwrap();
        invalidate_photos(&fx.ctx, &fx.user, &[photo.id], Duration::seconds(-1)).await.unwrap();

        let summary = clean_up_expired_photos(&fx.ctx).await.unwrap();
        assert_eq!(summary.files_removed, 1);
        assert!(fx.backend.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_leaves_uploads_of_other_photos() {
        let fx = Fixture::new().await;
        let doomed = fx.stage("IMG_0001.jpg", b"photo A").await;
        let other = fx.stage("IMG_0001.jpg", b"photo B").await;
        let layout = fx.layout();
        let renamed = layout.upload("IMG_0001.jpg");
        fx.backend.rename(&layout.upload(&other.file_name), &renamed).await.unwrap();
        invalidate_photos(&fx.ctx, &fx.user, &[doomed.id], Duration::seconds(-1)).await.unwrap();

        let summary = clean_up_expired_photos(&fx.ctx).await.unwrap();
        assert_eq!(summary, CleanupSummary { photos: 1, files_removed: 1, files_failed: 2 });
        assert_eq!(fx.backend.paths().await, vec![renamed.clone()]);
        assert_eq!(fx.backend.read(&renamed).await.unwrap(), b"photo B");
    }

    #[tokio::test]
    async fn test_cleanup_stops_on_record_failure() {
        let fx = Fixture::new().await;
        let photo = imported(&fx, "a.jpg").await;
        invalidate_photos(&fx.ctx, &fx.user, &[photo.id], Duration::seconds(-1)).await.unwrap();

        let catalog = Arc::new(CountingCatalog::new(fx.ctx.catalog.clone()).failing_deletes());
        let ctx = Context::new(fx.ctx.backend.clone(), catalog, fx.ctx.thumbnails.clone());
        let err = clean_up_expired_photos(&ctx).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Catalog));
        assert!(fx.catalog.find_photo(photo.id).await.is_ok());
    }
}
