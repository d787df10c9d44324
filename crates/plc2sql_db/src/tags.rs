//! Tag configuration operations (types, equipment, tag definitions)

use crate::error::{DbError, Result};
use crate::types::*;
use crate::PlcDb;
use sqlx::Row;

const TAG_SELECT: &str = r#"
    SELECT t.id, t.tag_name, t.name, t.insert_trigger, t.trigger_setting, t.log_hist,
           t.tag_type_id, t.equipment_id, tt.tag_type, e.equipment
    FROM plc_tags t
    LEFT JOIN plc_tag_type tt ON tt.id = t.tag_type_id
    LEFT JOIN plc_equipment e ON e.id = t.equipment_id
"#;

impl PlcDb {
    // ========================================================================
    // Tag Types & Equipment
    // ========================================================================

    /// Insert a tag type if missing; returns its id either way
    pub async fn tag_type_upsert(&self, tag_type: &str) -> Result<i64> {
        if tag_type.trim().is_empty() {
            return Err(DbError::constraint("tag type name cannot be empty"));
        }

        sqlx::query("INSERT INTO plc_tag_type (tag_type) VALUES (?) ON CONFLICT(tag_type) DO NOTHING")
            .bind(tag_type)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT id FROM plc_tag_type WHERE tag_type = ?")
            .bind(tag_type)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("id"))
    }

    /// Insert an equipment name if missing; returns its id either way
    pub async fn equipment_upsert(&self, equipment: &str) -> Result<i64> {
        if equipment.trim().is_empty() {
            return Err(DbError::constraint("equipment name cannot be empty"));
        }

        sqlx::query(
            "INSERT INTO plc_equipment (equipment) VALUES (?) ON CONFLICT(equipment) DO NOTHING",
        )
        .bind(equipment)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT id FROM plc_equipment WHERE equipment = ?")
            .bind(equipment)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("id"))
    }

    /// List all tag types
    pub async fn tag_type_list(&self) -> Result<Vec<TagTypeRow>> {
        let rows = sqlx::query("SELECT id, tag_type FROM plc_tag_type ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| TagTypeRow {
                id: row.get("id"),
                tag_type: row.get("tag_type"),
            })
            .collect())
    }

    /// List all equipment
    pub async fn equipment_list(&self) -> Result<Vec<EquipmentRow>> {
        let rows = sqlx::query("SELECT id, equipment FROM plc_equipment ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| EquipmentRow {
                id: row.get("id"),
                equipment: row.get("equipment"),
            })
            .collect())
    }

    // ========================================================================
    // Tag Definitions
    // ========================================================================

    /// Insert a tag definition
    pub async fn tag_insert(&self, tag: &NewTag) -> Result<i64> {
        if tag.tag_name.trim().is_empty() {
            return Err(DbError::constraint("tag address cannot be empty"));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO plc_tags (id, tag_name, name, insert_trigger, trigger_setting, log_hist, tag_type_id, equipment_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tag.id)
        .bind(&tag.tag_name)
        .bind(&tag.name)
        .bind(tag.insert_trigger)
        .bind(&tag.trigger_setting)
        .bind(tag.log_hist)
        .bind(tag.tag_type_id)
        .bind(tag.equipment_id)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get a tag by id
    pub async fn tag_get(&self, id: i64) -> Result<Option<TagRow>> {
        let sql = format!("{TAG_SELECT} WHERE t.id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_tag))
    }

    /// List every tag in registry order (ascending id)
    pub async fn tag_list_all(&self) -> Result<Vec<TagRow>> {
        let sql = format!("{TAG_SELECT} ORDER BY t.id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_tag).collect())
    }
}

fn row_to_tag(row: &sqlx::sqlite::SqliteRow) -> TagRow {
    TagRow {
        id: row.get("id"),
        tag_name: row.get("tag_name"),
        name: row.get("name"),
        insert_trigger: row.get("insert_trigger"),
        trigger_setting: row.get("trigger_setting"),
        log_hist: row.get("log_hist"),
        tag_type_id: row.get("tag_type_id"),
        equipment_id: row.get("equipment_id"),
        tag_type: row.get("tag_type"),
        equipment: row.get("equipment"),
    }
}

#[cfg(test)]
mod tests {
    use crate::{NewTag, PlcDb};

    #[tokio::test]
    async fn test_upsert_returns_existing_id() {
        let db = PlcDb::open_in_memory().await.unwrap();

        let first = db.tag_type_upsert("ESTOP").await.unwrap();
        let again = db.tag_type_upsert("ESTOP").await.unwrap();
        assert_eq!(first, again);

        let line = db.equipment_upsert("LINE 1").await.unwrap();
        let press = db.equipment_upsert("PRESS 15").await.unwrap();
        assert_ne!(line, press);
        assert_eq!(db.equipment_list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tag_list_joins_names_in_id_order() {
        let db = PlcDb::open_in_memory().await.unwrap();
        let type_id = db.tag_type_upsert("LINE RUNNING").await.unwrap();
        let equipment_id = db.equipment_upsert("LINE 1").await.unwrap();

        let mut second = NewTag::new("[plc]Line1.Speed", "speed", 4, "10");
        second.id = Some(20);
        db.tag_insert(&second).await.unwrap();

        let mut first = NewTag::new("[plc]Line1.Running", "running", 1, "");
        first.id = Some(10);
        first.tag_type_id = Some(type_id);
        first.equipment_id = Some(equipment_id);
        db.tag_insert(&first).await.unwrap();

        let tags = db.tag_list_all().await.unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].id, 10);
        assert_eq!(tags[0].tag_type.as_deref(), Some("LINE RUNNING"));
        assert_eq!(tags[0].equipment.as_deref(), Some("LINE 1"));
        assert_eq!(tags[1].id, 20);
        assert!(tags[1].tag_type.is_none());
    }

    #[tokio::test]
    async fn test_tag_insert_rejects_empty_address() {
        let db = PlcDb::open_in_memory().await.unwrap();
        let err = db.tag_insert(&NewTag::new("  ", "blank", 1, "")).await;
        assert!(err.is_err());
    }
}
