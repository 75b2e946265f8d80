use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Import workers and the ingestion fan-out all write at once; WAL allows a
/// single writer alongside readers, so a few connections are enough.
const MAX_CONNECTIONS: u32 = 5;
/// How long a writer waits for the lock before the query fails.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The catalog's SQLite connection pool, migrated on open.
///
/// Opening is fatal at startup when it fails: nothing downstream runs
/// without the catalog.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the catalog file at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::options().filename(path.as_ref()).create_if_missing(true);
        Self::open(options, MAX_CONNECTIONS).await
    }

    /// A private in-memory catalog that disappears on [`close`](Self::close).
    ///
    /// Public so dependant crates can use it in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        // Every in-memory connection would be a separate database.
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Settings applied to every connection in the pool.
    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Albums and photos cascade from their owner.
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
            .pragma("wal_autocheckpoint", "500")
            .pragma("cache_size", "-4096")
            .pragma("temp_store", "memory")
    }

    /// Apply pending migrations; already applied ones are skipped.
    #[instrument("migrating catalog", skip_all)]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Let SQLite refresh its statistics, then close every connection once
    /// returned to the pool.
    pub async fn close(&self) {
        if let Err(err) = sqlx::query("PRAGMA optimize").execute(&self.pool).await {
            tracing::debug!(error = %err, "Could not optimize catalog before closing");
        }
        self.pool.close().await;
    }
}
