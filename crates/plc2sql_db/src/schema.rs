//! Database schema creation for all PLC2SQL tables.
//!
//! All CREATE TABLE statements live here - single source of truth.
//! Every statement is idempotent so opening an existing database is a no-op.

use crate::error::Result;
use crate::PlcDb;
use tracing::info;

impl PlcDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        // WAL is not available for in-memory databases; SQLite silently keeps
        // the memory journal there.
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&self.pool)
            .await?;

        self.create_configuration_tables().await?;
        self.create_acquisition_tables().await?;

        info!("Database schema verified");
        Ok(())
    }

    /// Create tag configuration tables (types, equipment, tags)
    async fn create_configuration_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS plc_tag_type (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tag_type TEXT NOT NULL UNIQUE
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS plc_equipment (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                equipment TEXT NOT NULL UNIQUE
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // trigger_setting holds the '/'-delimited parameter list, parsed and
        // validated when the tag registry loads.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS plc_tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tag_name TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                insert_trigger INTEGER NOT NULL,
                trigger_setting TEXT NOT NULL DEFAULT '',
                log_hist INTEGER NOT NULL DEFAULT 1,
                tag_type_id INTEGER REFERENCES plc_tag_type(id),
                equipment_id INTEGER REFERENCES plc_equipment(id)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create acquisition tables (history, live snapshot, events)
    async fn create_acquisition_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS plc_hist_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tag_id INTEGER NOT NULL REFERENCES plc_tags(id),
                time_stamp INTEGER NOT NULL,
                val TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS plc_live_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tag_id INTEGER NOT NULL UNIQUE REFERENCES plc_tags(id),
                time_stamp INTEGER NOT NULL,
                val TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS plc_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tag_id INTEGER NOT NULL REFERENCES plc_tags(id),
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_hist_tag_time ON plc_hist_data(tag_id, time_stamp DESC)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_tag ON plc_events(tag_id, start_time)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
