//! Entry database: a SQLite file (or memory) with the entry schema applied.

use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
/// Emitted entries are written one at a time, from one task; the other
/// connections only serve lookups.
const MAX_CONNECTIONS: u32 = 2;
/// A crawl writes in bursts while `show`/`stats` may be reading the same file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    read_only: bool,
}

impl Database {
    /// Opens (or creates) the entry database at `path` and brings its schema
    /// up to date.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);
        let db = Self::with_pool(options, MAX_CONNECTIONS, false).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Opens an existing entry database without ever writing to it, not even
    /// to migrate. Fails if there is no database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(path.as_ref()).read_only(true).busy_timeout(BUSY_TIMEOUT);
        Self::with_pool(options, MAX_CONNECTIONS, true).await
    }

    /// An empty entry database that lives as long as the pool. Not
    /// `#[cfg(test)]` so other crates can use it in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:");
        // Every connection to `:memory:` gets a database of its own.
        let db = Self::with_pool(options, 1, false).await?;
        db.migrate().await?;
        Ok(db)
    }

    async fn with_pool(options: SqliteConnectOptions, max_connections: u32, read_only: bool) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Self { pool, read_only })
    }

    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)?;
        debug!("entry schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Waits for every connection to be returned, then closes the pool.
    pub async fn close(&self) {
        if !self.read_only {
            // Let SQLite update query planner statistics.
            _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        }
        self.pool.close().await;
    }
}
