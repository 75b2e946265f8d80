use crate::error::{ErrorKind, Result};
use crate::{SourceKind, ThumbnailGenerator};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Records every request instead of rendering anything.
///
/// Sources registered with [`fail_for`](Self::fail_for) return
/// [`ConverterFailed`](ErrorKind::ConverterFailed).
#[derive(Debug, Default)]
pub struct MockGenerator {
    calls: Mutex<Vec<(PathBuf, PathBuf, SourceKind)>>,
    failing: Mutex<HashSet<PathBuf>>,
}
impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, source: impl Into<PathBuf>) {
        self.failing.lock().unwrap().insert(source.into());
    }

    /// `(source, target, kind)` of every call so far, in order.
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf, SourceKind)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ThumbnailGenerator for MockGenerator {
    async fn create_thumbnail(&self, source: &Path, target: &Path, kind: SourceKind) -> Result<()> {
        self.calls.lock().unwrap().push((source.to_path_buf(), target.to_path_buf(), kind));
        if self.failing.lock().unwrap().contains(source) {
            exn::bail!(ErrorKind::ConverterFailed(format!("mock failure for {}", source.display())));
        }
        Ok(())
    }
}
