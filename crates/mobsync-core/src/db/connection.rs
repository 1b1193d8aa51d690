//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;
use std::time::Duration;

use super::migrations;

/// Remote primary that an embedded replica pulls from
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// Remote database URL (e.g., `libsql://your-db.turso.io`)
    pub url: String,
    pub auth_token: String,
    /// Automatic pull interval
    pub sync_interval: Duration,
}

impl ReplicaConfig {
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: auth_token.into(),
            sync_interval: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }
}

/// Shared read connection over a local file, memory, or an embedded replica
///
/// The sync engine only reads, so one connection serves every request.
pub struct Database {
    db: LibSqlDatabase,
    conn: Connection,
    replica: bool,
}

impl Database {
    /// Open (or create) a local database file and migrate it
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Builder::new_local(path.as_ref()).build().await?;
        Self::prepare(db, false).await
    }

    /// Open a throwaway in-memory database
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::prepare(db, false).await
    }

    /// Open an embedded replica that pulls from a remote primary
    ///
    /// Reads are served from the local file; the admin surfaces write to the
    /// primary and changes arrive here on the next pull.
    pub async fn open_replica(local_path: impl AsRef<Path>, replica: ReplicaConfig) -> Result<Self> {
        if replica.url.trim().is_empty() || replica.auth_token.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Replica URL and auth token are required".to_string(),
            ));
        }

        tracing::debug!(interval = ?replica.sync_interval, "Replica pull interval");
        let db = Builder::new_remote_replica(local_path.as_ref(), replica.url, replica.auth_token)
            .sync_interval(replica.sync_interval)
            .build()
            .await?;
        Self::prepare(db, true).await
    }

    async fn prepare(db: LibSqlDatabase, replica: bool) -> Result<Self> {
        let conn = db.connect()?;
        let database = Self { db, conn, replica };

        // Pull first so migrations see the remote schema
        database.pull().await?;
        database.configure().await?;
        migrations::run(&database.conn).await?;
        Ok(database)
    }

    async fn configure(&self) -> Result<()> {
        // Remote replicas reject some pragmas, so only foreign_keys is mandatory
        for pragma in ["PRAGMA journal_mode = WAL;", "PRAGMA synchronous = NORMAL;"] {
            self.conn.execute(pragma, ()).await.ok();
        }
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Pull from the remote primary; a no-op for local databases
    pub async fn pull(&self) -> Result<()> {
        if self.replica {
            self.db.sync().await?;
            tracing::debug!("Replica pulled from remote");
        }
        Ok(())
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
