//! Content hashes of files in the photo tree.

use mediabox_catalog::Photo;
use mediabox_storage::BackendHandle;
use mediabox_storage::error::{ErrorKind, Result};
use std::path::Path;

/// blake3 of the file at `path`, hex encoded. The file is streamed through
/// the hasher on the blocking pool rather than read into memory.
pub(crate) async fn file_hash(backend: &BackendHandle, path: &Path) -> Result<String> {
    let mut reader = backend.reader(path).await?;
    let hashed = tokio::task::spawn_blocking(move || {
        let mut hasher = blake3::Hasher::new();
        hasher.update_reader(&mut reader)?;
        Ok::<_, std::io::Error>(hasher.finalize())
    })
    .await
    .map_err(|err| ErrorKind::BackendError(format!("hashing {} failed: {err}", path.display())))?;
    Ok(hashed.map_err(ErrorKind::Io)?.to_hex().to_string())
}

/// Whether `path` holds exactly the content recorded for `photo`. A missing
/// file, or a photo without a recorded hash, never matches.
pub(crate) async fn holds(backend: &BackendHandle, path: &Path, photo: &Photo) -> Result<bool> {
    let Some(expected) = photo.file_hash.as_deref() else {
        return Ok(false);
    };
    if !backend.exists(path).await? {
        return Ok(false);
    }
    Ok(file_hash(backend, path).await? == expected)
}
