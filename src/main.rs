//! mediabox command-line entry point.

mod cli;
mod error;

use crate::cli::{AlbumCommand, Cli, Command, DeleteArgs, UploadArgs, UserCommand};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use mediabox_catalog::{Catalog, Database, Repository};
use mediabox_config::Config;
use mediabox_library::Context;
use mediabox_library::expiry::{clean_up_expired_photos, invalidate_photos};
use mediabox_library::import::import_originals;
use mediabox_library::ingest::ingest_directory;
use mediabox_library::upload::stage_upload;
use mediabox_pool::{PoolConfig, WorkerPool};
use mediabox_storage::backend::LocalBackend;
use mediabox_thumbnail::{Darktable, Dimensions, Scaler, ScalerConfig, Thumbnailer};
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:?}");
            return ExitCode::FAILURE;
        },
    };
    init_tracing(&config.log_level);

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "Command failed");
            ExitCode::FAILURE
        },
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    cli.apply(&mut config);
    config.validate().or_raise(|| ErrorKind::Config)?;
    Ok(config)
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();
}

async fn run(command: Command, config: Config) -> Result<()> {
    let database = config.database_path();
    if let Some(parent) = database.parent() {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
    }
    let db = Database::connect(&database).await.or_raise(|| ErrorKind::Database)?;
    tracing::debug!(path = %database.display(), "Catalog opened");

    let scaler = Arc::new(Scaler::new(ScalerConfig {
        max_memory: config.thumbnail.max_memory,
        max_files: config.thumbnail.max_files,
        concurrency: config.thumbnail.concurrency,
        quality: config.thumbnail.quality,
    }));
    if let Err(err) = scaler.start() {
        db.close().await;
        return Err(err).or_raise(|| ErrorKind::Thumbnail);
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(interrupt_on_ctrl_c(shutdown.clone()));

    let result = match App::new(&config, &db, Arc::clone(&scaler)) {
        Ok(app) => {
            let name = command.name();
            app.execute(command, &shutdown).await.or_raise(|| ErrorKind::Command(name))
        },
        Err(err) => Err(err),
    };

    scaler.shutdown();
    db.close().await;
    result
}

async fn interrupt_on_ctrl_c(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Interrupted, shutting down");
        shutdown.cancel();
    }
}

struct App {
    ctx: Context,
    config: Config,
}
impl App {
    fn new(config: &Config, db: &Database, scaler: Arc<Scaler>) -> Result<Self> {
        let backend = LocalBackend::new("local", &config.storage_path).or_raise(|| ErrorKind::Storage)?;
        let catalog = Repository::from(db);

        let size = Dimensions::new(config.thumbnail.width, config.thumbnail.height);
        let mut thumbnails = Thumbnailer::new(scaler, size);
        match Darktable::discover(&config.thumbnail.darktable) {
            Ok(darktable) => thumbnails = thumbnails.with_raw(Arc::new(darktable)),
            Err(err) => tracing::warn!(error = ?err, "No RAW converter; RAW photos will fail to import"),
        }

        let ctx = Context::new(Arc::new(backend), Arc::new(catalog), Arc::new(thumbnails));
        Ok(Self { ctx, config: config.clone() })
    }

    async fn execute(&self, command: Command, shutdown: &CancellationToken) -> Result<()> {
        match command {
            Command::User(UserCommand::Create { name }) => {
                let user = self.ctx.catalog.create_user(&name).await.or_raise(|| ErrorKind::Catalog)?;
                println!("Created user {} ({})", user.name, user.uuid);
            },
            Command::Album(AlbumCommand::Create { user, name }) => {
                let user = self.ctx.catalog.find_user(&user).await.or_raise(|| ErrorKind::Catalog)?;
                let album = self.ctx.catalog.create_album(&user, &name).await.or_raise(|| ErrorKind::Catalog)?;
                println!("Created album {} ({})", album.name, album.uuid);
            },
            Command::Upload(args) => interruptible(shutdown, self.upload(args)).await?,
            Command::Import(args) => self.import(&args.user, shutdown).await?,
            Command::Ingest(args) => {
                let concurrency = self.config.ingest.concurrency;
                let summary = interruptible(shutdown, async {
                    ingest_directory(&self.ctx, &args.user, concurrency).await.or_raise(|| ErrorKind::Library)
                })
                .await?;
                println!(
                    "Discovered {}, imported {}, failed {}",
                    summary.discovered, summary.imported, summary.failed
                );
                if summary.failed > 0 {
                    exn::bail!(ErrorKind::Partial(summary.failed));
                }
            },
            Command::Delete(args) => self.delete(args).await?,
            Command::Cleanup => {
                let summary = clean_up_expired_photos(&self.ctx).await.or_raise(|| ErrorKind::Library)?;
                println!(
                    "Removed {} photo(s), {} file(s); {} file(s) could not be removed",
                    summary.photos, summary.files_removed, summary.files_failed
                );
            },
        }
        Ok(())
    }

    async fn upload(&self, args: UploadArgs) -> Result<()> {
        let user = self.ctx.catalog.find_user(&args.user).await.or_raise(|| ErrorKind::Catalog)?;
        let album = self.ctx.catalog.find_album(&user, &args.album).await.or_raise(|| ErrorKind::Catalog)?;
        let mut failed = 0;
        for path in &args.files {
            let staged = async {
                let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
                let bytes = tokio::fs::read(path).await.or_raise(|| ErrorKind::Storage)?;
                stage_upload(&self.ctx, &user, &album, name, &bytes).await.or_raise(|| ErrorKind::Library)
            };
            match staged.await {
                Ok(photo) => println!("{}\t{}", photo.id, path.display()),
                Err(err) => {
                    failed += 1;
                    tracing::warn!(path = %path.display(), error = ?err, "Could not stage upload");
                },
            }
        }
        if failed > 0 {
            exn::bail!(ErrorKind::Partial(failed));
        }
        Ok(())
    }

    /// Queue every pending photo, then drain the pool before returning.
    async fn import(&self, user: &str, shutdown: &CancellationToken) -> Result<()> {
        let config = PoolConfig { size: self.config.pool.size, queue_capacity: self.config.pool.queue_capacity };
        let pool = WorkerPool::new(config, shutdown).or_raise(|| ErrorKind::Pool)?;
        let submitted = import_originals(&self.ctx, &pool, user).await;
        pool.stop();
        pool.wait().await;

        let summary = submitted.or_raise(|| ErrorKind::Library)?;
        if shutdown.is_cancelled() {
            exn::bail!(ErrorKind::Interrupted);
        }
        println!(
            "Submitted {} photo(s) from {} album(s); {} album(s) skipped",
            summary.submitted, summary.albums, summary.skipped_albums
        );
        Ok(())
    }

    async fn delete(&self, args: DeleteArgs) -> Result<()> {
        let user = self.ctx.catalog.find_user(&args.user).await.or_raise(|| ErrorKind::Catalog)?;
        let retention = time::Duration::days(i64::from(self.config.retention_days));
        let marked = invalidate_photos(&self.ctx, &user, &args.photos, retention)
            .await
            .or_raise(|| ErrorKind::Library)?;
        println!("Scheduled {marked} of {} photo(s) for deletion", args.photos.len());
        Ok(())
    }
}

/// Run `future` unless `shutdown` fires first.
async fn interruptible<T>(shutdown: &CancellationToken, future: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => exn::bail!(ErrorKind::Interrupted),
        result = future => result,
    }
}
