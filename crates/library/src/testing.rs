//! Shared fixtures: an in-memory catalog, a mock backend and a recording
//! thumbnail generator wired into a [`Context`], plus call-counting
//! decorators.

use crate::upload::stage_upload;
use crate::{AlbumLayout, Context};
use async_trait::async_trait;
use mediabox_catalog::error::Result as CatalogResult;
use mediabox_catalog::{
    Album, AlbumId, Catalog, CatalogHandle, Database, ExpiredPhoto, NewPhoto, Photo, PhotoId, Repository, User,
};
use mediabox_storage::error::Result as StorageResult;
use mediabox_storage::{BackendHandle, BoxSyncRead, FileInfo, StorageBackend};
use mediabox_storage::backend::MockBackend;
use mediabox_thumbnail::MockGenerator;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::UtcDateTime;

pub(crate) struct Fixture {
    pub ctx: Context,
    pub backend: Arc<MockBackend>,
    pub catalog: Arc<Repository>,
    pub thumbnails: Arc<MockGenerator>,
    pub user: User,
    pub album: Album,
    _db: Database,
}
impl Fixture {
    /// User `alice` with her default album.
    pub async fn new() -> Self {
        let db = Database::connect_in_memory().await.unwrap();
        let catalog = Arc::new(Repository::from(&db));
        let backend = Arc::new(MockBackend::default());
        let thumbnails = Arc::new(MockGenerator::new());
        let user = catalog.create_user("alice").await.unwrap();
        let album = catalog.find_default_album(&user).await.unwrap();
        let ctx = Context::new(backend.clone(), catalog.clone(), thumbnails.clone());
        Self { ctx, backend, catalog, thumbnails, user, album, _db: db }
    }

    pub async fn album(&self, name: &str) -> Album {
        self.catalog.create_album(&self.user, name).await.unwrap()
    }

    pub fn layout(&self) -> AlbumLayout {
        self.layout_for(&self.album)
    }

    pub fn layout_for(&self, album: &Album) -> AlbumLayout {
        AlbumLayout::new(&self.user, album)
    }

    /// Upload into the default album.
    pub async fn stage(&self, name: &str, bytes: &[u8]) -> Photo {
        self.stage_in(&self.album, name, bytes).await
    }

    pub async fn stage_in(&self, album: &Album, name: &str, bytes: &[u8]) -> Photo {
        stage_upload(&self.ctx, &self.user, album, name, bytes).await.unwrap()
    }

    pub fn job(&self, photo: Photo) -> crate::import::ImportJob {
        crate::import::ImportJob::new(self.ctx.clone(), self.user.clone(), self.album.clone(), photo)
    }
}

/// Counts mutating calls on the wrapped backend.
pub(crate) struct CountingBackend {
    inner: BackendHandle,
    writes: AtomicUsize,
}
impl CountingBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner, writes: AtomicUsize::new(0) }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}
#[async_trait]
impl StorageBackend for CountingBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(
        &'a self,
        prefix: Option<&'a Path>,
    ) -> Pin<Box<dyn futures::Stream<Item = StorageResult<FileInfo>> + Send + 'a>> {
        self.inner.list_stream(prefix)
    }

    async fn exists(&self, path: &Path) -> StorageResult<bool> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn reader(&self, path: &Path) -> StorageResult<BoxSyncRead> {
        self.inner.reader(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        self.count();
        self.inner.write(path, data).await
    }

    async fn delete(&self, path: &Path) -> StorageResult<()> {
        self.count();
        self.inner.delete(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        self.count();
        self.inner.rename(from, to).await
    }

    async fn rename_new(&self, from: &Path, to: &Path) -> StorageResult<()> {
        self.count();
        self.inner.rename_new(from, to).await
    }

    async fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        self.count();
        self.inner.create_dir_all(path).await
    }

    async fn stat(&self, path: &Path) -> StorageResult<FileInfo> {
        self.inner.stat(path).await
    }

    fn resolve(&self, path: &Path) -> StorageResult<PathBuf> {
        self.inner.resolve(path)
    }
}

/// Counts mutating calls on the wrapped catalog; can be told to fail
/// record deletion or the imported flag.
pub(crate) struct CountingCatalog {
    inner: CatalogHandle,
    writes: AtomicUsize,
    fail_deletes: bool,
    fail_set_imported: bool,
}
impl CountingCatalog {
    pub fn new(inner: CatalogHandle) -> Self {
        Self { inner, writes: AtomicUsize::new(0), fail_deletes: false, fail_set_imported: false }
    }

    pub fn failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    pub fn failing_set_imported(mut self) -> Self {
        self.fail_set_imported = true;
        self
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}
#[async_trait]
impl Catalog for CountingCatalog {
    async fn create_user(&self, name: &str) -> CatalogResult<User> {
        self.count();
        self.inner.create_user(name).await
    }

    async fn find_user(&self, name: &str) -> CatalogResult<User> {
        self.inner.find_user(name).await
    }

    async fn create_album(&self, user: &User, name: &str) -> CatalogResult<Album> {
        self.count();
        self.inner.create_album(user, name).await
    }

    async fn find_album(&self, user: &User, name: &str) -> CatalogResult<Album> {
        self.inner.find_album(user, name).await
    }

    async fn list_albums(&self, user: &User) -> CatalogResult<Vec<Album>> {
        self.inner.list_albums(user).await
    }

    async fn create_photo(&self, photo: NewPhoto) -> CatalogResult<Photo> {
        self.count();
        self.inner.create_photo(photo).await
    }

    async fn find_photo(&self, id: PhotoId) -> CatalogResult<Photo> {
        self.inner.find_photo(id).await
    }

    async fn find_unimported_photos(&self, album: AlbumId) -> CatalogResult<Vec<Photo>> {
        self.inner.find_unimported_photos(album).await
    }

    async fn set_imported(&self, photo: PhotoId, imported: bool) -> CatalogResult<()> {
        self.count();
        if self.fail_set_imported {
            exn::bail!(mediabox_catalog::error::ErrorKind::Database);
        }
        self.inner.set_imported(photo, imported).await
    }

    async fn invalidate_photos(&self, user: &User, photos: &[PhotoId], expires_at: UtcDateTime) -> CatalogResult<u64> {
        self.count();
        self.inner.invalidate_photos(user, photos, expires_at).await
    }

    async fn find_expired_photos(&self, now: UtcDateTime) -> CatalogResult<Vec<ExpiredPhoto>> {
        self.inner.find_expired_photos(now).await
    }

    async fn delete_photo_record(&self, photo: PhotoId) -> CatalogResult<()> {
        self.count();
        if self.fail_deletes {
            exn::bail!(mediabox_catalog::error::ErrorKind::Database);
        }
        self.inner.delete_photo_record(photo).await
    }
}
