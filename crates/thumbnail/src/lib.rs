//! Thumbnail generation.
//!
//! RAW camera files go to an external converter ([`Darktable`]); everything
//! else is decoded and scaled in-process ([`Scaler`]). Both correct
//! orientation from EXIF, keep the aspect ratio, and write a JPEG atomically
//! to the target path. [`Thumbnailer`] picks the backend per file.

mod darktable;
mod dimensions;
pub mod error;
mod kind;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod orientation;
mod scaler;

pub use crate::darktable::{DEFAULT_BINARY, Darktable};
pub use crate::dimensions::Dimensions;
pub use crate::kind::{RAW_EXTENSIONS, SourceKind};
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::MockGenerator;
pub use crate::orientation::Orientation;
pub use crate::scaler::{Scaler, ScalerConfig};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

pub type GeneratorHandle = Arc<dyn ThumbnailGenerator + Send + Sync>;

/// One way of turning a source image into a JPEG thumbnail.
#[async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    /// Write a thumbnail of `source` to `target`, replacing anything there.
    async fn render(&self, source: &Path, target: &Path, size: Dimensions) -> Result<()>;
}

/// What the import pipeline calls to produce a thumbnail.
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    async fn create_thumbnail(&self, source: &Path, target: &Path, kind: SourceKind) -> Result<()>;
}

/// Routes each file to the renderer for its [`SourceKind`].
pub struct Thumbnailer {
    standard: Arc<dyn Renderer>,
    raw: Option<Arc<dyn Renderer>>,
    size: Dimensions,
}
impl Thumbnailer {
    pub fn new(standard: Arc<dyn Renderer>, size: Dimensions) -> Self {
        Self { standard, raw: None, size }
    }

    /// Without a RAW renderer, RAW files fail with
    /// [`ConverterNotFound`](ErrorKind::ConverterNotFound).
    pub fn with_raw(mut self, raw: Arc<dyn Renderer>) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn size(&self) -> Dimensions {
        self.size
    }

    fn renderer(&self, kind: SourceKind) -> Result<&Arc<dyn Renderer>> {
        match (kind, &self.raw) {
            (SourceKind::Standard, _) => Ok(&self.standard),
            (SourceKind::Raw, Some(raw)) => Ok(raw),
            (SourceKind::Raw, None) => exn::bail!(ErrorKind::ConverterNotFound("no RAW converter configured".into())),
        }
    }
}

#[async_trait]
impl ThumbnailGenerator for Thumbnailer {
    #[instrument(skip_all, fields(source = %source.display(), ?kind))]
    async fn create_thumbnail(&self, source: &Path, target: &Path, kind: SourceKind) -> Result<()> {
        let renderer = self.renderer(kind)?;
        tracing::trace!(renderer = renderer.name(), "Rendering thumbnail");
        renderer.render(source, target, self.size).await
    }
}
