//! Subcommand implementations for the `plc2sql` binary.

pub mod check;
pub mod run;
pub mod transfer;

use anyhow::{Context, Result};
use plc2sql::PlcConfig;
use plc2sql_db::PlcDb;
use std::path::Path;

/// Load and validate the config file named on the command line.
pub fn load_config(path: &Path) -> Result<PlcConfig> {
    PlcConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

/// Open the configured store; the schema is migrated on open.
pub async fn open_database(config: &PlcConfig) -> Result<PlcDb> {
    PlcDb::open_url(&config.database.url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))
}
