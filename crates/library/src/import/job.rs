use crate::AlbumLayout;
use crate::Context;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::hash::holds;
use crate::import::error::{ErrorKind, Result as ImportResult};
use async_trait::async_trait;
use derive_more::Display;
use exn::ResultExt;
use mediabox_catalog::{Album, Photo, User};
use mediabox_pool::Job;
use mediabox_pool::error::{ErrorKind as PoolErrorKind, Result as PoolResult};
use mediabox_storage::error::ErrorKind as StorageErrorKind;
use mediabox_thumbnail::SourceKind;

/// How far a photo got through the pipeline.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    #[display("staged")]
    Staged,
    #[display("renamed")]
    Renamed,
    #[display("thumbnail generated")]
    ThumbnailGenerated,
    #[display("finalized")]
    Finalized,
    #[display("imported")]
    Imported,
}

/// Moves one staged photo into the library.
///
/// 1. Rename `uploads/../<file_name>` to `uploads/../<name>`.
/// 2. Make sure the album's `originals/` and `thumbnails/` directories exist.
/// 3. Render `thumbnails/../<file_name>.jpg`.
/// 4. Move the file to `originals/../<file_name>`.
/// 5. Mark the photo imported.
///
/// Steps run strictly in order and the first failure ends the job. The
/// catalog flag only flips once everything else has succeeded, so a failed
/// photo is retried by the next import pass. A photo left renamed by an
/// earlier failed pass resumes from step 2, as long as the renamed file still
/// hashes to the recorded content.
///
/// Step 1 never replaces an existing file. Two uploads sharing a display name
/// in one album take turns: the second fails with
/// [`NameTaken`](ErrorKind::NameTaken) until the first has moved on to
/// `originals/`.
pub struct ImportJob {
    ctx: Context,
    user: User,
    album: Album,
    photo: Photo,
}
impl ImportJob {
    pub fn new(ctx: Context, user: User, album: Album, photo: Photo) -> Self {
        Self { ctx, user, album, photo }
    }

    pub fn photo(&self) -> &Photo {
        &self.photo
    }

    /// Run the pipeline, logging the outcome.
    pub async fn import(&self) -> LibraryResult<Stage> {
        let mut stage = Stage::Staged;
        match self.pipeline(&mut stage).await {
            Ok(()) => {
                tracing::info!(
                    user = %self.user.name,
                    album = %self.album.name,
                    photo = self.photo.id,
                    file_name = %self.photo.file_name,
                    "Photo imported"
                );
                Ok(stage)
            },
            Err(err) => {
                tracing::warn!(
                    user = %self.user.name,
                    album = %self.album.name,
                    photo = self.photo.id,
                    file_name = %self.photo.file_name,
                    reached = %stage,
                    error = ?err,
                    "Photo import failed"
                );
                Err(err).or_raise(|| LibraryErrorKind::Import)
            },
        }
    }

    async fn pipeline(&self, stage: &mut Stage) -> ImportResult<()> {
        let Self { ctx, photo, .. } = self;
        let layout = AlbumLayout::new(&self.user, &self.album);
        let backend = &ctx.backend;

        let working = self.rename_staged(&layout).await?;
        *stage = Stage::Renamed;

        backend.create_dir_all(&layout.originals()).await.or_raise(|| ErrorKind::Storage)?;
        backend.create_dir_all(&layout.thumbnails()).await.or_raise(|| ErrorKind::Storage)?;

        let thumbnail = layout.thumbnail(&photo.file_name);
        let source = backend.resolve(&working).or_raise(|| ErrorKind::Storage)?;
        let target = backend.resolve(&thumbnail).or_raise(|| ErrorKind::Storage)?;
        let kind = SourceKind::from_extension(&photo.ext);
        ctx.thumbnails.create_thumbnail(&source, &target, kind).await.or_raise(|| ErrorKind::Thumbnail)?;
        *stage = Stage::ThumbnailGenerated;

        backend.rename(&working, &layout.original(&photo.file_name)).await.or_raise(|| ErrorKind::Storage)?;
        *stage = Stage::Finalized;

        ctx.catalog.set_imported(photo.id, true).await.or_raise(|| ErrorKind::Catalog)?;
        *stage = Stage::Imported;
        Ok(())
    }

    /// Step 1. Returns the path the photo is now at.
    async fn rename_staged(&self, layout: &AlbumLayout) -> ImportResult<std::path::PathBuf> {
        let backend = &self.ctx.backend;
        let staged = layout.upload(&self.photo.file_name);
        let working = layout.upload(&self.photo.name);
        if staged == working {
            if !backend.exists(&staged).await.or_raise(|| ErrorKind::Storage)? {
                exn::bail!(ErrorKind::StagedFileMissing(staged));
            }
            return Ok(working);
        }

        match backend.rename_new(&staged, &working).await {
            Ok(()) => Ok(working),
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {
                if holds(backend, &working, &self.photo).await.or_raise(|| ErrorKind::Storage)? {
                    let path = working.display();
                    tracing::debug!(photo = self.photo.id, %path, "Resuming partially imported photo");
                    Ok(working)
                } else {
                    exn::bail!(ErrorKind::StagedFileMissing(staged))
                }
            },
            Err(err) if matches!(&*err, StorageErrorKind::AlreadyExists(_)) => {
                exn::bail!(ErrorKind::NameTaken(working))
            },
            Err(err) => Err(err).or_raise(|| ErrorKind::Storage),
        }
    }
}

#[async_trait]
impl Job for ImportJob {
    fn describe(&self) -> String {
        format!("import photo #{} ({})", self.photo.id, self.photo.file_name)
    }

    async fn run(self: Box<Self>) -> PoolResult<()> {
        self.import().await.or_raise(|| PoolErrorKind::Job)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use mediabox_catalog::Catalog;
    use mediabox_storage::StorageBackend;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_pipeline_moves_everything_into_place() {
        let fx = Fixture::new().await;
        let photo = fx.stage("IMG_0001.jpg", b"jpeg").await;
        let layout = fx.layout();

        let stage = fx.job(photo.clone()).import().await.unwrap();
        assert_eq!(stage, Stage::Imported);

        assert_eq!(fx.backend.read(&layout.original(&photo.file_name)).await.unwrap(), b"jpeg");
        assert!(!fx.backend.exists(&layout.upload(&photo.file_name)).await.unwrap());
        assert!(!fx.backend.exists(&layout.upload(&photo.name)).await.unwrap());
        assert!(fx.backend.has_directory(layout.originals()).await);
        assert!(fx.backend.has_directory(layout.thumbnails()).await);

        // The thumbnail is rendered from the renamed upload, before the move.
        let calls = fx.thumbnails.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, PathBuf::from("/mock").join(layout.upload(&photo.name)));
        assert_eq!(calls[0].1, PathBuf::from("/mock").join(layout.thumbnail(&photo.file_name)));
        assert_eq!(calls[0].2, SourceKind::Standard);

        assert!(fx.catalog.find_photo(photo.id).await.unwrap().is_imported);
    }

    #[tokio::test]
    async fn test_raw_files_use_raw_renderer() {
        let fx = Fixture::new().await;
        let photo = fx.stage("DSC0001.ARW", b"raw").await;
        fx.job(photo).import().await.unwrap();
        assert_eq!(fx.thumbnails.calls()[0].2, SourceKind::Raw);
    }

    #[tokio::test]
    async fn test_missing_staged_file() {
        let fx = Fixture::new().await;
        let photo = fx.stage("IMG_0001.jpg", b"jpeg").await;
        fx.backend.delete(&fx.layout().upload(&photo.file_name)).await.unwrap();

        let err = fx.job(photo.clone()).import().await.unwrap_err();
        assert!(matches!(&*err, LibraryErrorKind::Import));
        assert!(fx.thumbnails.calls().is_empty());
        assert!(!fx.catalog.find_photo(photo.id).await.unwrap().is_imported);
    }

    #[tokio::test]
    async fn test_thumbnail_failure_leaves_photo_pending() {
        let fx = Fixture::new().await;
        let photo = fx.stage("IMG_0001.jpg", b"jpeg").await;
        let layout = fx.layout();
        fx.thumbnails.fail_for(PathBuf::from("/mock").join(layout.upload(&photo.name)));

        fx.job(photo.clone()).import().await.unwrap_err();
        assert!(!fx.catalog.find_photo(photo.id).await.unwrap().is_imported);
        assert!(!fx.backend.exists(&layout.original(&photo.file_name)).await.unwrap());
        // Left renamed in uploads/ for the next pass.
        assert!(fx.backend.exists(&layout.upload(&photo.name)).await.unwrap());
    }

    #[tokio::test]
    async fn test_resumes_after_earlier_failure() {
        let fx = Fixture::new().await;
        let photo = fx.stage("IMG_0001.jpg", b"jpeg").await;
        let layout = fx.layout();
        // An earlier pass got as far as the rename.
        fx.backend.rename(&layout.upload(&photo.file_name), &layout.upload(&photo.name)).await.unwrap();

        assert_eq!(fx.job(photo.clone()).import().await.unwrap(), Stage::Imported);
        assert_eq!(fx.backend.read(&layout.original(&photo.file_name)).await.unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn test_same_display_name_takes_turns() {
        let fx = Fixture::new().await;
        let first = fx.stage("IMG_0001.jpg", b"photo A").await;
        let second = fx.stage("IMG_0001.jpg", b"photo B").await;
        let layout = fx.layout();
        let renamed = layout.upload("IMG_0001.jpg");
        // An earlier pass renamed the first photo and then failed.
        fx.backend.rename(&layout.upload(&first.file_name), &renamed).await.unwrap();

        fx.job(second.clone()).import().await.unwrap_err();
        assert_eq!(fx.backend.read(&renamed).await.unwrap(), b"photo A");
        assert_eq!(fx.backend.read(&layout.upload(&second.file_name)).await.unwrap(), b"photo B");

        fx.job(first.clone()).import().await.unwrap();
        fx.job(second.clone()).import().await.unwrap();
        assert_eq!(fx.backend.read(&layout.original(&first.file_name)).await.unwrap(), b"photo A");
        assert_eq!(fx.backend.read(&layout.original(&second.file_name)).await.unwrap(), b"photo B");
        assert!(fx.catalog.find_unimported_photos(fx.album.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_never_resumes_from_another_photo() {
        let fx = Fixture::new().await;
        let first = fx.stage("IMG_0001.jpg", b"photo A").await;
        let second = fx.stage("IMG_0001.jpg", b"photo B").await;
        let layout = fx.layout();
        let renamed = layout.upload("IMG_0001.jpg");
        fx.backend.rename(&layout.upload(&first.file_name), &renamed).await.unwrap();
        fx.backend.delete(&layout.upload(&second.file_name)).await.unwrap();

        fx.job(second.clone()).import().await.unwrap_err();
        assert_eq!(fx.backend.read(&renamed).await.unwrap(), b"photo A");
        assert!(!fx.catalog.find_photo(second.id).await.unwrap().is_imported);

        fx.job(first.clone()).import().await.unwrap();
        assert_eq!(fx.backend.read(&layout.original(&first.file_name)).await.unwrap(), b"photo A");
    }

    #[tokio::test]
    async fn test_job_contract() {
        let fx = Fixture::new().await;
        let photo = fx.stage("IMG_0001.jpg", b"jpeg").await;
        let job: Box<dyn Job> = Box::new(fx.job(photo.clone()));
        assert_eq!(job.describe(), format!("import photo #{} ({})", photo.id, photo.file_name));
        job.run().await.unwrap();

        let missing: Box<dyn Job> = Box::new(fx.job(photo));
        let err = missing.run().await.unwrap_err();
        assert!(matches!(&*err, PoolErrorKind::Job));
    }
}
