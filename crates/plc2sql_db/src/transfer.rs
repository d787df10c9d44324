//! CSV import/export of the tag configuration tables.
//!
//! One file carries all three relations. The `section` column says which
//! relation a row belongs to; columns that do not apply to a section are left
//! empty. Types and equipment are matched by name on import, tags by id.
//!
//! ```text
//! section,id,name,tag_name,insert_trigger,trigger_setting,log_hist,tag_type,equipment
//! tag_type,1,ESTOP,,,,,,
//! equipment,1,LINE 1,,,,,,
//! tag,10,estop,[plc]Line1.EStop,2,,true,ESTOP,LINE 1
//! ```

use crate::error::{DbError, Result};
use crate::PlcDb;
use serde::{Deserialize, Serialize};
use sqlx::{Row, Sqlite, Transaction};
use std::io::{Read, Write};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    TagType,
    Equipment,
    Tag,
}

/// One CSV line of a configuration transfer file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub section: Section,
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub insert_trigger: Option<i64>,
    #[serde(default)]
    pub trigger_setting: String,
    #[serde(default)]
    pub log_hist: Option<bool>,
    #[serde(default)]
    pub tag_type: String,
    #[serde(default)]
    pub equipment: String,
}

impl TransferRecord {
    fn named(section: Section, id: i64, name: &str) -> Self {
        Self {
            section,
            id: Some(id),
            name: name.to_string(),
            tag_name: String::new(),
            insert_trigger: None,
            trigger_setting: String::new(),
            log_hist: None,
            tag_type: String::new(),
            equipment: String::new(),
        }
    }
}

/// Counts of rows written by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub tag_types: usize,
    pub equipment: usize,
    pub tags: usize,
}

impl PlcDb {
    /// Write every tag type, equipment and tag row. Returns the row count.
    pub async fn export_configuration<W: Write>(&self, writer: W) -> Result<usize> {
        let tag_types = self.tag_type_list().await?;
        let equipment = self.equipment_list().await?;
        let tags = self.tag_list_all().await?;

        let mut out = csv::Writer::from_writer(writer);
        let mut written = 0;

        for row in &tag_types {
            out.serialize(TransferRecord::named(Section::TagType, row.id, &row.tag_type))?;
            written += 1;
        }
        for row in &equipment {
            out.serialize(TransferRecord::named(Section::Equipment, row.id, &row.equipment))?;
            written += 1;
        }
        for tag in tags {
            out.serialize(TransferRecord {
                section: Section::Tag,
                id: Some(tag.id),
                name: tag.name,
                tag_name: tag.tag_name,
                insert_trigger: Some(tag.insert_trigger),
                trigger_setting: tag.trigger_setting,
                log_hist: Some(tag.log_hist),
                tag_type: tag.tag_type.unwrap_or_default(),
                equipment: tag.equipment.unwrap_or_default(),
            })?;
            written += 1;
        }

        out.flush()?;
        info!(rows = written, "Configuration exported");
        Ok(written)
    }

    /// Load a configuration transfer file in a single transaction.
    ///
    /// With `replace`, the tag, tag type and equipment tables are emptied
    /// first. History, live and event rows are kept, so every tag id they
    /// reference must be present in the file or the commit fails.
    pub async fn import_configuration<R: Read>(&self, reader: R, replace: bool) -> Result<ImportSummary> {
        let mut records = Vec::new();
        for (line, record) in csv::Reader::from_reader(reader).deserialize().enumerate() {
            let record: TransferRecord = record?;
            if record.section == Section::Tag {
                if record.tag_name.trim().is_empty() {
                    return Err(DbError::constraint(format!("row {}: tag address is empty", line + 1)));
                }
                if record.insert_trigger.is_none() {
                    return Err(DbError::constraint(format!("row {}: insert_trigger is missing", line + 1)));
                }
            }
            records.push(record);
        }

        let mut tx = self.pool.begin().await?;
        let mut summary = ImportSummary::default();

        if replace {
            // Foreign keys from history/live/events are checked at commit,
            // after the tags are re-inserted.
            sqlx::query("PRAGMA defer_foreign_keys = ON").execute(&mut *tx).await?;
            sqlx::query("DELETE FROM plc_tags").execute(&mut *tx).await?;
            sqlx::query("DELETE FROM plc_tag_type").execute(&mut *tx).await?;
            sqlx::query("DELETE FROM plc_equipment").execute(&mut *tx).await?;
            warn!("Tag configuration cleared for replace import");
        }

        for record in records.iter().filter(|r| r.section == Section::TagType) {
            upsert_name(&mut tx, "plc_tag_type", "tag_type", &record.name).await?;
            summary.tag_types += 1;
        }
        for record in records.iter().filter(|r| r.section == Section::Equipment) {
            upsert_name(&mut tx, "plc_equipment", "equipment", &record.name).await?;
            summary.equipment += 1;
        }

        for record in records.iter().filter(|r| r.section == Section::Tag) {
            let tag_type_id = match record.tag_type.trim() {
                "" => None,
                name => Some(upsert_name(&mut tx, "plc_tag_type", "tag_type", name).await?),
            };
            let equipment_id = match record.equipment.trim() {
                "" => None,
                name => Some(upsert_name(&mut tx, "plc_equipment", "equipment", name).await?),
            };

            sqlx::query(
                r#"
                INSERT INTO plc_tags (id, tag_name, name, insert_trigger, trigger_setting, log_hist, tag_type_id, equipment_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    tag_name = excluded.tag_name,
                    name = excluded.name,
                    insert_trigger = excluded.insert_trigger,
                    trigger_setting = excluded.trigger_setting,
                    log_hist = excluded.log_hist,
                    tag_type_id = excluded.tag_type_id,
                    equipment_id = excluded.equipment_id
                "#,
            )
            .bind(record.id)
            .bind(&record.tag_name)
            .bind(&record.name)
            .bind(record.insert_trigger)
            .bind(&record.trigger_setting)
            .bind(record.log_hist.unwrap_or(true))
            .bind(tag_type_id)
            .bind(equipment_id)
            .execute(&mut *tx)
            .await?;
            summary.tags += 1;
        }

        tx.commit().await?;

        info!(
            tag_types = summary.tag_types,
            equipment = summary.equipment,
            tags = summary.tags,
            replace,
            "Configuration imported"
        );
        Ok(summary)
    }
}

/// Insert a name into a lookup table if missing and return its id.
/// `table` and `column` are always crate constants.
async fn upsert_name(tx: &mut Transaction<'_, Sqlite>, table: &str, column: &str, name: &str) -> Result<i64> {
    if name.trim().is_empty() {
        return Err(DbError::constraint(format!("{column} name cannot be empty")));
    }

    sqlx::query(&format!(
        "INSERT INTO {table} ({column}) VALUES (?) ON CONFLICT({column}) DO NOTHING"
    ))
    .bind(name)
    .execute(&mut **tx)
    .await?;

    let row = sqlx::query(&format!("SELECT id FROM {table} WHERE {column} = ?"))
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;
    Ok(row.get("id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewTag;

    async fn seeded() -> PlcDb {
        let db = PlcDb::open_in_memory().await.unwrap();
        let estop = db.tag_type_upsert("ESTOP").await.unwrap();
        let line = db.equipment_upsert("LINE 1").await.unwrap();

        let mut tag = NewTag::new("[plc]Line1.EStop", "estop", 2, "");
        tag.id = Some(10);
        tag.tag_type_id = Some(estop);
        tag.equipment_id = Some(line);
        db.tag_insert(&tag).await.unwrap();

        let mut speed = NewTag::new("[plc]Line1.Speed", "speed", 5, "10/20");
        speed.id = Some(11);
        speed.log_hist = false;
        db.tag_insert(&speed).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_export_then_import_reproduces_rows() {
        let source = seeded().await;
        let mut buf = Vec::new();
        let written = source.export_configuration(&mut buf).await.unwrap();
        assert_eq!(written, 4);

        let target = PlcDb::open_in_memory().await.unwrap();
        let summary = target.import_configuration(buf.as_slice(), false).await.unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                tag_types: 1,
                equipment: 1,
                tags: 2
            }
        );

        let expected = source.tag_list_all().await.unwrap();
        let actual = target.tag_list_all().await.unwrap();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_import_updates_existing_tag_by_id() {
        let db = seeded().await;
        let csv = "section,id,name,tag_name,insert_trigger,trigger_setting,log_hist,tag_type,equipment\n\
                   tag,11,speed,[plc]Line1.Speed,4,0.1,true,,LINE 2\n";

        let summary = db.import_configuration(csv.as_bytes(), false).await.unwrap();
        assert_eq!(summary.tags, 1);

        let tag = db.tag_get(11).await.unwrap().unwrap();
        assert_eq!(tag.insert_trigger, 4);
        assert_eq!(tag.trigger_setting, "0.1");
        assert!(tag.log_hist);
        assert_eq!(tag.equipment.as_deref(), Some("LINE 2"));
        assert_eq!(db.tag_list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_keeps_history_for_reimported_tags() {
        let db = seeded().await;
        db.history_insert(10, PlcDb::now(), "1").await.unwrap();

        let csv = "section,id,name,tag_name,insert_trigger,trigger_setting,log_hist,tag_type,equipment\n\
                   tag_type,,ALARM,,,,,,\n\
                   tag,10,estop,[plc]Line1.EStop,1,,true,ALARM,\n";
        db.import_configuration(csv.as_bytes(), true).await.unwrap();

        let tags = db.tag_list_all().await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].tag_type.as_deref(), Some("ALARM"));
        assert!(db.equipment_list().await.unwrap().is_empty());
        assert_eq!(db.history_list(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_fails_when_history_would_dangle() {
        let db = seeded().await;
        db.history_insert(10, PlcDb::now(), "1").await.unwrap();

        let csv = "section,id,name,tag_name,insert_trigger,trigger_setting,log_hist,tag_type,equipment\n\
                   tag,11,speed,[plc]Line1.Speed,5,10/20,false,,\n";
        assert!(db.import_configuration(csv.as_bytes(), true).await.is_err());

        // rolled back
        assert_eq!(db.tag_list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_rejects_tag_without_trigger() {
        let db = PlcDb::open_in_memory().await.unwrap();
        let csv = "section,id,name,tag_name,insert_trigger,trigger_setting,log_hist,tag_type,equipment\n\
                   tag,1,x,[plc]X,,,,,\n";
        let err = db.import_configuration(csv.as_bytes(), false).await.unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }
}
