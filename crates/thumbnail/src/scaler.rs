//! In-process image scaling.
//!
//! The [`Scaler`] is a shared, lifecycle-managed resource: one instance is
//! created by the composition root, started once, handed to every worker by
//! reference and shut down on exit. All callers share its limits.

use crate::error::{ErrorKind, Result};
use crate::orientation::Orientation;
use crate::{Dimensions, Renderer};
use async_trait::async_trait;
use exn::ResultExt;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Limits};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalerConfig {
    /// Upper bound on what a single decode may allocate, in bytes. The resized
    /// output is held to the same bound.
    pub max_memory: u64,
    /// Source files buffered in memory at once, across all callers.
    pub max_files: usize,
    /// Decode/resize/encode operations running at once, across all callers.
    pub concurrency: usize,
    /// JPEG quality, 1-100.
    pub quality: u8,
}
impl Default for ScalerConfig {
    fn default() -> Self {
        Self { max_memory: 128 * 1024 * 1024, max_files: 16, concurrency: 1, quality: 85 }
    }
}

struct Running {
    files: Arc<Semaphore>,
    workers: Arc<Semaphore>,
}
impl Running {
    fn close(&self) {
        self.files.close();
        self.workers.close();
    }
}

/// Scales standard images (JPEG, PNG, WebP, ...) to JPEG thumbnails.
///
/// Must be [`start`](Self::start)ed before use; rendering while stopped
/// fails with [`NotStarted`](ErrorKind::NotStarted). After
/// [`shutdown`](Self::shutdown) it can be started again.
pub struct Scaler {
    config: ScalerConfig,
    state: Mutex<Option<Arc<Running>>>,
}
impl Scaler {
    pub fn new(config: ScalerConfig) -> Self {
        Self { config, state: Mutex::new(None) }
    }

    pub fn config(&self) -> &ScalerConfig {
        &self.config
    }

    // Nothing that holds this lock can panic, but don't let a poisoned lock
    // take the whole pipeline down if that ever changes.
    fn state(&self) -> MutexGuard<'_, Option<Arc<Running>>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the shared limits. Starting twice is a no-op.
    pub fn start(&self) -> Result<()> {
        if self.config.max_files == 0 {
            exn::bail!(ErrorKind::InvalidLimits("max_files must be at least 1"));
        }
        if self.config.concurrency == 0 {
            exn::bail!(ErrorKind::InvalidLimits("concurrency must be at least 1"));
        }
        let mut state = self.state();
        if state.is_some() {
            tracing::warn!("Image scaler already started");
            return Ok(());
        }
        *state = Some(Arc::new(Running {
            files: Arc::new(Semaphore::new(self.config.max_files)),
            workers: Arc::new(Semaphore::new(self.config.concurrency)),
        }));
        tracing::info!(
            max_memory = self.config.max_memory,
            max_files = self.config.max_files,
            concurrency = self.config.concurrency,
            "Image scaler started"
        );
        Ok(())
    }

    /// Release the shared limits. Callers waiting on them fail with
    /// [`NotStarted`](ErrorKind::NotStarted); operations already running
    /// finish normally.
    pub fn shutdown(&self) {
        match self.state().take() {
            Some(running) => {
                running.close();
                tracing::info!("Image scaler shut down");
            },
            None => tracing::debug!("Image scaler shutdown requested but it was not running"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().is_some()
    }

    fn running(&self) -> Result<Arc<Running>> {
        match self.state().as_ref() {
            Some(running) => Ok(Arc::clone(running)),
            None => exn::bail!(ErrorKind::NotStarted),
        }
    }

    fn scale(bytes: &[u8], size: Dimensions, config: ScalerConfig) -> Result<Vec<u8>> {
        let orientation = Orientation::from_bytes(bytes);
        let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format().or_raise(|| ErrorKind::Decode)?;
        let mut limits = Limits::default();
        limits.max_alloc = Some(config.max_memory);
        reader.limits(limits);
        let image = orientation.apply(reader.decode().or_raise(|| ErrorKind::Decode)?);

        let (width, height) = size.fit(image.width(), image.height())?;
        // The resize buffer in the source's pixel format, then its RGB copy.
        let per_pixel = u64::from(image.color().bytes_per_pixel()) + 3;
        if u64::from(width) * u64::from(height) * per_pixel > config.max_memory {
            exn::bail!(ErrorKind::TooLarge { width, height });
        }
        let thumbnail = DynamicImage::ImageRgb8(image.resize_exact(width, height, FilterType::Triangle).to_rgb8());

        let mut encoded = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut encoded, config.quality);
        thumbnail.write_with_encoder(encoder).or_raise(|| ErrorKind::Encode)?;
        Ok(encoded)
    }

    /// Write next to the target, then rename over it.
    fn persist(target: &Path, bytes: &[u8]) -> Result<()> {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        let mut file = tempfile::NamedTempFile::new_in(parent).or_raise(|| ErrorKind::Io)?;
        file.write_all(bytes).or_raise(|| ErrorKind::Io)?;
        file.persist(target).or_raise(|| ErrorKind::Io)?;
        Ok(())
    }
}

#[async_trait]
impl Renderer for Scaler {
    fn name(&self) -> &str {
        "scaler"
    }

    #[instrument(skip_all, fields(source = %source.display()))]
    async fn render(&self, source: &Path, target: &Path, size: Dimensions) -> Result<()> {
        let running = self.running()?;
        let _file = running.files.acquire().await.or_raise(|| ErrorKind::NotStarted)?;
        let bytes = tokio::fs::read(source).await.or_raise(|| ErrorKind::Io)?;
        let _worker = running.workers.acquire().await.or_raise(|| ErrorKind::NotStarted)?;

        let config = self.config;
        let target = target.to_path_buf();
        let job = tokio::task::spawn_blocking(move || {
            let encoded = Self::scale(&bytes, size, config)?;
            Self::persist(&target, &encoded)
        });
        match job.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => {
                let payload = err.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(panic = %message, "Image scaling panicked");
                exn::bail!(ErrorKind::Panicked(message))
            },
            Err(err) => Err(err).or_raise(|| ErrorKind::Io),
        }
    }
}
