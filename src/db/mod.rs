//! Database layer for the task list.

pub mod schema;
pub mod tasks;

use anyhow::{Result, anyhow};
use refinery::Target;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Schema version produced by the embedded migrations.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Default `busy_timeout` for file databases, in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path and migrate it to the
    /// current schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT_MS)
    }

    /// Same as [`Database::open`] with an explicit busy timeout.
    pub fn open_with_busy_timeout<P: AsRef<Path>>(path: P, busy_timeout_ms: u64) -> Result<Self> {
        Self::open_file(path.as_ref(), busy_timeout_ms, Target::Latest)
    }

    /// Open the database, applying migrations only up to `version`.
    ///
    /// Reopening later with [`Database::open`] upgrades it the rest of the way.
    pub fn open_at_version<P: AsRef<Path>>(path: P, version: i32) -> Result<Self> {
        Self::open_file(path.as_ref(), DEFAULT_BUSY_TIMEOUT_MS, Target::Version(version))
    }

    fn open_file(path: &Path, busy_timeout_ms: u64, target: Target) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for concurrent access
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout={};",
            busy_timeout_ms
        ))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations(target)?;
        info!("Opened task database at {}", path.display());

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations(Target::Latest)?;

        Ok(db)
    }

    /// Run database migrations.
    fn run_migrations(&self, target: Target) -> Result<()> {
        let mut conn = self.lock()?;
        let report = embedded::migrations::runner()
            .set_target(target)
            .run(&mut *conn)?;
        for migration in report.applied_migrations() {
            info!("Applied migration {}", migration);
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.lock()?;
        f(&mut conn)
    }
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
