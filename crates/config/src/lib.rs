//! Layered configuration for mediabox.
//!
//! Values are merged in order of increasing precedence:
//! 1. compiled-in defaults ([`Config::default`]),
//! 2. an optional configuration file (TOML, YAML or JSON, picked by
//!    extension),
//! 3. `MEDIABOX_`-prefixed environment variables, where nested keys are
//!    separated by a double underscore (`MEDIABOX_POOL__SIZE=4`).
//!
//! Command-line overrides are applied by the binary on top of the result.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "MEDIABOX_";
const CONFIG_FILENAME: &str = "config.toml";
const DATABASE_FILENAME: &str = "mediabox.db";
const FALLBACK_STORAGE_PATH: &str = "/var/lib/mediabox";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "mediabox")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the `uploads/`, `originals/`, `thumbnails/` and `user/` tree.
    pub storage_path: PathBuf,
    /// SQLite database location. Defaults to a file inside `storage_path`.
    pub database: Option<PathBuf>,
    /// Default `tracing` filter directive, overridden by `RUST_LOG`.
    pub log_level: String,
    /// Days a soft-deleted photo is kept before cleanup removes it.
    pub retention_days: u32,
    pub pool: PoolSection,
    pub ingest: IngestSection,
    pub thumbnail: ThumbnailSection,
}
impl Default for Config {
    fn default() -> Self {
        let storage_path = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(FALLBACK_STORAGE_PATH));
        Self {
            storage_path,
            database: None,
            log_level: "info".to_string(),
            retention_days: 30,
            pool: PoolSection::default(),
            ingest: IngestSection::default(),
            thumbnail: ThumbnailSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    /// Desired number of workers.
    pub size: usize,
    /// Bounded backlog of submitted-but-not-started jobs.
    pub queue_capacity: usize,
}
impl Default for PoolSection {
    fn default() -> Self {
        Self { size: 1, queue_capacity: 32 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    /// Maximum number of discovered files processed at once.
    pub concurrency: usize,
}
impl Default for IngestSection {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailSection {
    /// Zero means unconstrained.
    pub width: u32,
    /// Zero means unconstrained.
    pub height: u32,
    pub quality: u8,
    /// Name or path of the RAW converter executable.
    pub darktable: String,
    /// Upper bound on decoder allocations, in bytes.
    pub max_memory: u64,
    pub max_files: usize,
    pub concurrency: usize,
}
impl Default for ThumbnailSection {
    fn default() -> Self {
        Self {
            width: 0,
            height: 500,
            quality: 85,
            darktable: "darktable-cli".to_string(),
            max_memory: 128 * 1024 * 1024,
            max_files: 16,
            concurrency: 1,
        }
    }
}

impl Config {
    /// Location of the configuration file used when none is given explicitly.
    pub fn default_file() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// Defaults merged with the given file, without the environment layer.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let Some(file) = file else {
            return Ok(figment);
        };
        let extension = file.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file_exact(file)),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
            Some("json") => figment.merge(Json::file_exact(file)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(file.to_path_buf())),
        })
    }

    /// Load configuration from every layer.
    ///
    /// An explicitly passed file must exist; the default file is only merged
    /// when present.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(file) => Some(file.to_path_buf()),
            None => Self::default_file().filter(|f| f.is_file()),
        };
        if let Some(file) = &file {
            tracing::debug!(file = %file.display(), "Loading configuration file");
        }
        let figment = Self::figment(file.as_deref())?.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    /// Extract and validate a configuration from an already layered figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.storage_path.is_absolute() {
            exn::bail!(ErrorKind::Invalid(format!(
                "storage_path must be absolute, got {}",
                self.storage_path.display()
            )));
        }
        if self.pool.queue_capacity == 0 {
            exn::bail!(ErrorKind::Invalid("pool.queue_capacity must be at least 1".to_string()));
        }
        if self.ingest.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("ingest.concurrency must be at least 1".to_string()));
        }
        if self.thumbnail.concurrency == 0 || self.thumbnail.max_files == 0 {
            exn::bail!(ErrorKind::Invalid(
                "thumbnail.concurrency and thumbnail.max_files must be at least 1".to_string()
            ));
        }
        if self.thumbnail.width == 0 && self.thumbnail.height == 0 {
            exn::bail!(ErrorKind::Invalid("thumbnail needs a width or a height".to_string()));
        }
        Ok(())
    }

    /// Database location, falling back to a file inside the storage root.
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| self.storage_path.join(DATABASE_FILENAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    fn load_file(name: &str, contents: &str) -> Result<Config> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        Config::from_figment(Config::figment(Some(&path))?)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pool.size, 1);
        assert_eq!(config.thumbnail.height, 500);
        assert_eq!(config.thumbnail.width, 0);
        assert_eq!(config.thumbnail.max_memory, 128 * 1024 * 1024);
        assert_eq!(config.thumbnail.max_files, 16);
        assert_eq!(config.thumbnail.concurrency, 1);
        assert_eq!(config.retention_days, 30);
    }

    #[rstest]
    #[case("config.toml", "storage_path = \"/srv/media\"\n[pool]\nsize = 4\n")]
    #[case("config.yaml", "storage_path: /srv/media\npool:\n  size: 4\n")]
    #[case("config.yml", "storage_path: /srv/media\npool:\n  size: 4\n")]
    #[case("config.json", r#"{"storage_path": "/srv/media", "pool": {"size": 4}}"#)]
    fn test_file_formats(#[case] name: &str, #[case] contents: &str) {
        let config = load_file(name, contents).unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/srv/media"));
        assert_eq!(config.pool.size, 4);
        // Untouched values keep their defaults.
        assert_eq!(config.pool.queue_capacity, 32);
    }

    #[test]
    fn test_unsupported_format() {
        let err = Config::figment(Some(Path::new("/etc/mediabox.ini"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
    }

    #[rstest]
    #[case("storage_path = \"relative/media\"")]
    #[case("storage_path = \"/srv/media\"\n[pool]\nqueue_capacity = 0\n")]
    #[case("storage_path = \"/srv/media\"\n[ingest]\nconcurrency = 0\n")]
    #[case("storage_path = \"/srv/media\"\n[thumbnail]\nconcurrency = 0\n")]
    #[case("storage_path = \"/srv/media\"\n[thumbnail]\nwidth = 0\nheight = 0\n")]
    fn test_invalid_values(#[case] contents: &str) {
        let err = load_file("config.toml", contents).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_database_path() {
        let mut config = Config { storage_path: PathBuf::from("/srv/media"), ..Config::default() };
        assert_eq!(config.database_path(), PathBuf::from("/srv/media/mediabox.db"));
        config.database = Some(PathBuf::from("/var/db/photos.db"));
        assert_eq!(config.database_path(), PathBuf::from("/var/db/photos.db"));
    }
}
