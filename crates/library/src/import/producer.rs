use crate::Context;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::import::ImportJob;
use crate::import::error::{ErrorKind, Result as ImportResult};
use exn::ResultExt;
use mediabox_catalog::find_user_albums;
use mediabox_pool::WorkerPool;
use tracing::instrument;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub albums: usize,
    /// Albums whose pending photos could not be listed.
    pub skipped_albums: usize,
    pub submitted: usize,
}

/// Submit an [`ImportJob`] for every pending photo in each of the user's
/// albums.
///
/// Returns once everything has been queued, not once it has been imported.
/// An album that can't be queried is logged and skipped; a pool that stops
/// accepting jobs ends the pass with an error.
#[instrument(skip(ctx, pool))]
pub async fn import_originals(ctx: &Context, pool: &WorkerPool, user: &str) -> LibraryResult<ImportSummary> {
    import_originals_inner(ctx, pool, user).await.or_raise(|| LibraryErrorKind::Import)
}

async fn import_originals_inner(ctx: &Context, pool: &WorkerPool, user: &str) -> ImportResult<ImportSummary> {
    let (user, albums) = find_user_albums(ctx.catalog.as_ref(), user).await.or_raise(|| ErrorKind::Catalog)?;
    let mut summary = ImportSummary::default();
    for album in albums {
        summary.albums += 1;
        let photos = match ctx.catalog.find_unimported_photos(album.id).await {
            Ok(photos) => photos,
            Err(err) => {
                tracing::warn!(album = %album.name, error = ?err, "Could not list pending photos; skipping album");
                summary.skipped_albums += 1;
                continue;
            },
        };
        tracing::debug!(album = %album.name, pending = photos.len(), "Queueing pending photos");
        for photo in photos {
            let job = ImportJob::new(ctx.clone(), user.clone(), album.clone(), photo);
            pool.submit(Box::new(job)).await.or_raise(|| ErrorKind::Submit)?;
            summary.submitted += 1;
        }
    }
    tracing::info!(albums = summary.albums, submitted = summary.submitted, "Import pass queued");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingBackend, CountingCatalog, Fixture};
    use mediabox_catalog::Catalog;
    use mediabox_pool::PoolConfig;
    use mediabox_storage::StorageBackend;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn pool(size: usize) -> WorkerPool {
        WorkerPool::new(PoolConfig { size, queue_capacity: 4 }, &CancellationToken::new()).unwrap()
    }

    async fn drain(pool: WorkerPool) {
        pool.stop();
        pool.wait().await;
    }

    #[tokio::test]
    async fn test_imports_every_pending_photo() {
        let fx = Fixture::new().await;
        let holidays = fx.album("holidays").await;
        let a = fx.stage("a.jpg", b"a").await;
        let b = fx.stage_in(&holidays, "b.raf", b"b").await;

        let pool = pool(2);
        let summary = import_originals(&fx.ctx, &pool, "alice").await.unwrap();
        assert_eq!(summary, ImportSummary { albums: 2, skipped_albums: 0, submitted: 2 });
        drain(pool).await;

        for photo in [&a, &b] {
            assert!(fx.catalog.find_photo(photo.id).await.unwrap().is_imported);
        }
        assert!(fx.backend.exists(&fx.layout_for(&holidays).original(&b.file_name)).await.unwrap());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_batch() {
        let fx = Fixture::new().await;
        let broken = fx.stage("a.jpg", b"a").await;
        let fine = fx.stage("b.jpg", b"b").await;
        fx.backend.delete(&fx.layout().upload(&broken.file_name)).await.unwrap();

        let pool = pool(1);
        import_originals(&fx.ctx, &pool, "alice").await.unwrap();
        drain(pool).await;

        assert!(!fx.catalog.find_photo(broken.id).await.unwrap().is_imported);
        assert!(fx.catalog.find_photo(fine.id).await.unwrap().is_imported);
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let fx = Fixture::new().await;
        fx.stage("a.jpg", b"a").await;
        fx.stage("b.arw", b"b").await;

        let pool = pool(2);
        import_originals(&fx.ctx, &pool, "alice").await.unwrap();
        drain(pool).await;

        let backend = Arc::new(CountingBackend::new(fx.ctx.backend.clone()));
        let catalog = Arc::new(CountingCatalog::new(fx.ctx.catalog.clone()));
        let ctx = Context::new(backend.clone(), catalog.clone(), fx.ctx.thumbnails.clone());
        let pool = self::pool(2);
        let summary = import_originals(&ctx, &pool, "alice").await.unwrap();
        drain(pool).await;

        assert_eq!(summary.submitted, 0);
        assert_eq!(backend.writes(), 0);
        assert_eq!(catalog.writes(), 0);
        assert_eq!(fx.thumbnails.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let fx = Fixture::new().await;
        let pool = pool(1);
        let err = import_originals(&fx.ctx, &pool, "mallory").await.unwrap_err();
        assert!(matches!(&*err, LibraryErrorKind::Import));
        drain(pool).await;
    }

    #[tokio::test]
    async fn test_stopped_pool() {
        let fx = Fixture::new().await;
        let photo = fx.stage("a.jpg", b"a").await;
        let pool = pool(1);
        pool.stop();

        import_originals(&fx.ctx, &pool, "alice").await.unwrap_err();
        pool.wait().await;
        assert!(fx.catalog.find_photo(photo.id).await.unwrap().is_pending());
    }
}
