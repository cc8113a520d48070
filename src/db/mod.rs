use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

pub mod migrations;
pub mod repositories;
pub mod retry;

pub use retry::RetryPolicy;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// How long SQLite itself waits on a lock before reporting busy.
    pub busy_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DbPool {
    path: PathBuf,
    options: ConnectionOptions,
}

impl DbPool {
    pub fn new<P: Into<PathBuf>>(path: P) -> AppResult<Self> {
        Self::with_options(path, ConnectionOptions::default())
    }

    /// Opens the store and brings the schema up to date. Migrations run here,
    /// once, and never on the per-request connection path.
    pub fn with_options<P: Into<PathBuf>>(path: P, options: ConnectionOptions) -> AppResult<Self> {
        let path = path.into();
        info!(target: "app::db", db_path = %path.display(), "initializing database pool");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let pool = Self { path, options };
        {
            let conn = pool.get_connection()?;
            retry::with_retry(&pool.options.retry, "migrate", || migrations::run(&conn))?;
        }

        Ok(pool)
    }

    pub fn get_connection(&self) -> AppResult<Connection> {
        retry::with_retry_if(
            &self.options.retry,
            "connect",
            |err| {
                matches!(
                    err,
                    AppError::StorageLocked { .. } | AppError::StorageUnavailable { .. }
                )
            },
            || self.open_configured(),
        )
    }

    pub fn with_connection<F, T>(&self, callback: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T>,
    {
        let conn = self.get_connection()?;
        callback(&conn)
    }

    /// Runs `callback` inside an immediate transaction, retrying the whole
    /// unit while another writer holds the lock. Nothing is committed unless
    /// the callback succeeds.
    pub fn write_transaction<F, T>(&self, label: &str, mut callback: F) -> AppResult<T>
    where
        F: FnMut(&Transaction<'_>) -> AppResult<T>,
    {
        retry::with_retry(&self.options.retry, label, || {
            let mut conn = self.open_configured()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let value = callback(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    fn open_configured(&self) -> AppResult<Connection> {
        let mut conn = Connection::open(&self.path)?;
        configure_connection(&mut conn, self.options.busy_timeout)?;
        debug!(target: "app::db", db_path = %self.path.display(), "database connection ready");
        Ok(conn)
    }
}

fn configure_connection(conn: &mut Connection, busy_timeout: Duration) -> AppResult<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", &1)?;
    conn.pragma_update(None, "journal_mode", &"WAL")?;
    Ok(())
}
