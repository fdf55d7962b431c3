//! Registry database handle.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Location and pool size of the registry database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// SQLite file; missing parent directories are created on open
    pub path: PathBuf,

    /// Upper bound of pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("intercom.db"),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Row counts reported by [`Database::health_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryHealth {
    /// Registered reviewers
    pub reviewers: i64,

    /// Distinct units with at least one reviewer
    pub units: i64,

    /// Reviewers in the middle of registering
    pub pending_registrations: i64,
}

/// Migrated connection pool shared by the repositories.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the registry file and bring its schema up to date.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use intercom_storage::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::new(DatabaseConfig::new("/var/lib/intercom/registry.db")).await?;
    /// let health = db.health_check().await?;
    /// println!("{} reviewers across {} units", health.reviewers, health.units);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Configuration(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        info!(path = %config.path.display(), "Opened registry database");
        Self::migrated(pool).await
    }

    /// Private registry that lives as long as the returned handle.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection would get its own empty database, and recycling
        // the only one would wipe it
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> StorageResult<Self> {
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Apply the embedded schema migrations. Safe to repeat.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        debug!("Registry migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Query both registry tables and report their size.
    pub async fn health_check(&self) -> StorageResult<RegistryHealth> {
        let (reviewers, units): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(DISTINCT unit_number) FROM reviewers")
                .fetch_one(&self.pool)
                .await?;
        let (pending_registrations,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM registration_flags")
                .fetch_one(&self.pool)
                .await?;

        debug!(reviewers, units, pending_registrations, "Registry health check");
        Ok(RegistryHealth {
            reviewers,
            units,
            pending_registrations,
        })
    }
}
