//! `plc2sql export` / `plc2sql import`: CSV transfer of the tag configuration.

use super::{load_config, open_database};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub async fn export(config_path: &Path, out: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config).await?;

    let file = File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let rows = db
        .export_configuration(BufWriter::new(file))
        .await
        .context("Export failed")?;

    println!("Exported {} row(s) to {}", rows, out.display());
    db.close().await;
    Ok(())
}

pub async fn import(config_path: &Path, file: &Path, replace: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config).await?;

    let reader = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let summary = db
        .import_configuration(BufReader::new(reader), replace)
        .await
        .with_context(|| format!("Import of {} failed", file.display()))?;

    println!(
        "Imported {} tag type(s), {} equipment, {} tag(s){}",
        summary.tag_types,
        summary.equipment,
        summary.tags,
        if replace { " (replaced existing configuration)" } else { "" }
    );
    db.close().await;
    Ok(())
}
