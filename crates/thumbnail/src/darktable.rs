use crate::error::{ErrorKind, Result};
use crate::{Dimensions, Renderer};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::instrument;

pub const DEFAULT_BINARY: &str = "darktable-cli";

/// External RAW converter.
///
/// Each call runs `darktable-cli <source> <output> --width W --height H`
/// with a throwaway configuration directory, so concurrent conversions don't
/// fight over darktable's library lock. Output goes to a private temporary
/// directory next to the target and is renamed into place once complete.
#[derive(Debug, Clone)]
pub struct Darktable {
    binary: PathBuf,
}
impl Darktable {
    /// Resolve the converter executable (a bare name is looked up on `PATH`).
    pub fn discover(binary: impl AsRef<Path>) -> Result<Self> {
        let binary = binary.as_ref();
        match which::which(binary) {
            Ok(path) => {
                tracing::debug!(binary = %path.display(), "Discovered RAW converter");
                Ok(Self { binary: path })
            },
            Err(_) => exn::bail!(ErrorKind::ConverterNotFound(binary.display().to_string())),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, source: &Path, output: &Path, config_dir: &Path, size: Dimensions) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg(source)
            .arg(output)
            .arg("--width")
            .arg(size.width.to_string())
            .arg("--height")
            .arg(size.height.to_string())
            .arg("--core")
            .arg("--configdir")
            .arg(config_dir)
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Renderer for Darktable {
    fn name(&self) -> &str {
        "darktable"
    }

    #[instrument(skip_all, fields(source = %source.display()))]
    async fn render(&self, source: &Path, target: &Path, size: Dimensions) -> Result<()> {
        if size.width == 0 && size.height == 0 {
            exn::bail!(ErrorKind::MissingDimensions);
        }
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        let scratch = tempfile::Builder::new().prefix(".darktable-").tempdir_in(parent).or_raise(|| ErrorKind::Io)?;
        let output = scratch.path().join("thumbnail.jpg");
        let config_dir = scratch.path().join("config");

        let result = self
            .command(source, &output, &config_dir, size)
            .output()
            .await
            .or_raise(|| ErrorKind::ConverterFailed(format!("could not run {}", self.binary.display())))?;
        if !result.status.success() {
            let combined = [result.stdout.as_slice(), result.stderr.as_slice()].concat();
            exn::bail!(ErrorKind::ConverterFailed(format!(
                "{} ({})",
                result.status,
                String::from_utf8_lossy(&combined).trim()
            )));
        }
        // darktable-cli has been known to exit 0 without writing anything.
        if !tokio::fs::try_exists(&output).await.or_raise(|| ErrorKind::Io)? {
            exn::bail!(ErrorKind::ConverterFailed("no output written".to_string()));
        }
        tokio::fs::rename(&output, target).await.or_raise(|| ErrorKind::Io)?;
        tracing::debug!(target = %target.display(), "RAW thumbnail written");
        Ok(())
    }
}
