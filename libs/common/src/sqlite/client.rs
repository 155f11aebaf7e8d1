use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool as SqlxSqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub type SqlitePool = SqlxSqlitePool;

/// Default pool size for the local rule database
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone)]
pub struct SqliteClient {
    pool: Arc<SqlitePool>,
    db_path: String,
}

impl SqliteClient {
    /// Open (or create) the database file with WAL and foreign keys enabled
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_max_connections(db_path, DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn with_max_connections(
        db_path: impl AsRef<Path>,
        max_connections: u32,
    ) -> Result<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .journal_mode(SqliteJournalMode::Wal) // Enable WAL for concurrent reads
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!(
            "SQLite database connected with foreign keys enabled: {}",
            db_path_str
        );

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path_str,
        })
    }

    /// Shared in-memory database, visible to every connection of the pool
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
            db_path: ":memory:".to_string(),
        })
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get database file path
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Check if database is accessible
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&*self.pool).await?;
        Ok(())
    }
}
