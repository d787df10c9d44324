//! Relational store for PLC2SQL
//!
//! Single owner of the SQLite schema and every query the acquisition service
//! issues. The recorder, the CLI import/export commands and the tests all go
//! through [`PlcDb`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use plc2sql_db::{PlcDb, Result};
//!
//! let db = PlcDb::open_url("sqlite:plc2sql.sqlite3").await?;
//!
//! let tags = db.tag_list_all().await?;
//! db.live_upsert(tags[0].id, PlcDb::now(), "1").await?;
//! ```

mod error;
mod schema;
mod types;

// Method implementations organized by domain
mod history;
mod tags;
pub mod transfer;

pub use error::{DbError, Result};
pub use sqlx::Error as SqlxError;
pub use transfer::ImportSummary;
pub use types::*;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Handle to the acquisition database.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone)]
pub struct PlcDb {
    pool: SqlitePool,
}

impl std::fmt::Debug for PlcDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlcDb").field("backend", &"SQLite").finish()
    }
}

impl PlcDb {
    /// Open or create a database at the given path.
    ///
    /// Creates all tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Self::open_url(&format!("sqlite:{}", path.display())).await
    }

    /// Open or create a database from a `sqlite:` URL.
    pub async fn open_url(url: &str) -> Result<Self> {
        if !url.starts_with("sqlite:") {
            return Err(DbError::invalid_state(format!(
                "Unsupported database URL: {}",
                url
            )));
        }

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;

        info!(url, "Database opened");

        Ok(db)
    }

    /// Open a private in-memory database (tests and dry runs).
    ///
    /// The pool is pinned to a single connection that never expires, since
    /// every SQLite memory connection is its own database.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Round-trip a trivial statement to confirm the store is reachable.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying connection pool (escape hatch for complex queries).
    ///
    /// Prefer using the typed methods instead.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

// Timestamp utilities
impl PlcDb {
    /// Current time truncated to the millisecond precision the store keeps.
    pub fn now() -> DateTime<Utc> {
        Self::millis_to_datetime(Utc::now().timestamp_millis())
    }

    /// Convert milliseconds to DateTime.
    pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }
}
