//! The mediabox import pipeline.
//!
//! Photos arrive either as uploads staged under `uploads/` ([`upload`]) or as
//! files dropped into a user's synced directory ([`ingest`]). Staged uploads
//! are moved through the pipeline by [`ImportJob`](import::ImportJob)s running
//! on a [`WorkerPool`](mediabox_pool::WorkerPool); synced files are ingested
//! directly with bounded concurrency. Soft-deleted photos are removed for good
//! by [`expiry`].
//!
//! Progress lives only in the catalog (`is_imported`, `is_valid`), so every
//! entry point here can simply be run again after a failure.

pub mod error;
pub mod expiry;
mod hash;
pub mod import;
pub mod ingest;
mod layout;
pub mod upload;

pub use crate::layout::{AlbumLayout, ORIGINALS, SYNCED, THUMBNAILS, UPLOADS, synced_dir};
use mediabox_catalog::CatalogHandle;
use mediabox_storage::BackendHandle;
use mediabox_thumbnail::GeneratorHandle;

/// Collaborators shared by every pipeline operation. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    pub backend: BackendHandle,
    pub catalog: CatalogHandle,
    pub thumbnails: GeneratorHandle,
}
impl Context {
    pub fn new(backend: BackendHandle, catalog: CatalogHandle, thumbnails: GeneratorHandle) -> Self {
        Self { backend, catalog, thumbnails }
    }
}

#[cfg(test)]
pub(crate) mod testing;
