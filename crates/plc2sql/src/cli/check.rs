//! `plc2sql check`: validate config and every tag's trigger parameters.

use super::{load_config, open_database};
use anyhow::{Context, Result};
use plc2sql::display::kind_count_table;
use plc2sql::TagRegistry;
use std::path::Path;
use std::time::Instant;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config).await?;

    let registry = TagRegistry::load(&db, Instant::now())
        .await
        .context("Tag configuration is invalid")?;

    println!("{}", kind_count_table(&registry.kind_counts()));
    println!("{} tag(s) OK", registry.len());

    db.close().await;
    Ok(())
}
