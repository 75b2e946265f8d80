use clap::{Args, Parser, Subcommand};
use mediabox_catalog::{DEFAULT_ALBUM, PhotoId};
use mediabox_config::Config;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "mediabox", version, about = "Personal photo library: uploads, imports and thumbnails")]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, short, global = true, env = "MEDIABOX_CONFIG")]
    pub config: Option<PathBuf>,
    /// Root of the photo tree; overrides the configuration.
    #[arg(long, global = true)]
    pub storage_path: Option<PathBuf>,
    /// Number of import workers; overrides the configuration.
    #[arg(long, global = true)]
    pub pool_size: Option<usize>,
    #[command(subcommand)]
    pub command: Command,
}
impl Cli {
    /// Command-line values win over every other configuration layer.
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.storage_path {
            config.storage_path = path.clone();
        }
        if let Some(size) = self.pool_size {
            config.pool.size = size;
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Album(AlbumCommand),
    /// Stage files for import.
    Upload(UploadArgs),
    /// Import every staged photo of a user.
    Import(UserArgs),
    /// Import everything in a user's synced directory.
    Ingest(UserArgs),
    /// Schedule photos for deletion.
    Delete(DeleteArgs),
    /// Remove photos whose retention period has passed.
    Cleanup,
}
impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Album(_) => "album",
            Self::Upload(_) => "upload",
            Self::Import(_) => "import",
            Self::Ingest(_) => "ingest",
            Self::Delete(_) => "delete",
            Self::Cleanup => "cleanup",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create a user along with their default album.
    Create { name: String },
}

#[derive(Debug, Subcommand)]
pub enum AlbumCommand {
    Create {
        #[arg(long)]
        user: String,
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct UserArgs {
    #[arg(long)]
    pub user: String,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    #[arg(long)]
    pub user: String,
    #[arg(long, default_value = DEFAULT_ALBUM)]
    pub album: String,
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(long)]
    pub user: String,
    #[arg(required = true)]
    pub photos: Vec<PhotoId>,
}
