use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::ingest::error::{ErrorKind, Result as IngestResult};
use crate::ingest::ingest_file;
use crate::{Context, synced_dir};
use exn::ResultExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use mediabox_catalog::{Album, User};
use mediabox_storage::{BackendHandle, FileInfo};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::instrument;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub discovered: usize,
    pub imported: usize,
    pub failed: usize,
}

/// Import everything in `user/<user>/` into the user's default album.
///
/// At most `concurrency` files are being ingested at any time; the walker
/// only discovers the next file once there is room for it. Returns after
/// every discovered file has been dealt with. Individual failures are logged
/// and counted, never returned.
#[instrument(skip(ctx))]
pub async fn ingest_directory(ctx: &Context, user: &str, concurrency: usize) -> LibraryResult<IngestSummary> {
    ingest_directory_inner(ctx, user, concurrency).await.or_raise(|| LibraryErrorKind::Ingest)
}

async fn ingest_directory_inner(ctx: &Context, user: &str, concurrency: usize) -> IngestResult<IngestSummary> {
    let concurrency = concurrency.max(1);
    let user = ctx.catalog.find_user(user).await.or_raise(|| ErrorKind::Catalog)?;
    let album = ctx.catalog.find_default_album(&user).await.or_raise(|| ErrorKind::Catalog)?;

    let (sender, mut receiver) = mpsc::channel(1);
    let walker = tokio::spawn(walk(ctx.backend.clone(), synced_dir(&user), sender));

    let mut summary = IngestSummary::default();
    let mut in_flight = FuturesUnordered::new();
    let mut walking = true;
    loop {
        tokio::select! {
            next = receiver.recv(), if walking && in_flight.len() < concurrency => match next {
                Some(file) => {
                    summary.discovered += 1;
                    in_flight.push(ingest_one(ctx, &user, &album, file));
                },
                None => walking = false,
            },
            Some(imported) = in_flight.next() => {
                if imported {
                    summary.imported += 1;
                } else {
                    summary.failed += 1;
                }
            },
            else => break,
        }
    }

    match walker.await {
        Ok(0) => {},
        Ok(errors) => tracing::warn!(errors, "Parts of the synced directory could not be read"),
        Err(err) => tracing::error!(error = %err, "Directory walker died"),
    }
    tracing::info!(
        user = %user.name,
        discovered = summary.discovered,
        imported = summary.imported,
        failed = summary.failed,
        "Directory ingestion finished"
    );
    Ok(summary)
}

async fn ingest_one(ctx: &Context, user: &User, album: &Album, file: FileInfo) -> bool {
    match ingest_file(ctx, user, album, &file).await {
        Ok(photo) => {
            tracing::debug!(path = %file.path.display(), photo = photo.id, "Ingested file");
            true
        },
        Err(err) => {
            tracing::warn!(user = %user.name, path = %file.path.display(), error = ?err, "Could not ingest file");
            false
        },
    }
}

/// Depth-first walk of `root`, handing files over one at a time. Returns the
/// number of entries that could not be read.
async fn walk(backend: BackendHandle, root: PathBuf, sender: mpsc::Sender<FileInfo>) -> usize {
    let mut errors = 0;
    let mut files = backend.list_stream(Some(root.as_path()));
    while let Some(entry) = files.next().await {
        match entry {
            Ok(file) => {
                if sender.send(file).await.is_err() {
                    break;
                }
            },
            Err(err) => {
                errors += 1;
                tracing::warn!(root = %root.display(), error = ?err, "Could not read synced directory entry");
            },
        }
    }
    errors
}
