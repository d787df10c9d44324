//! Acquisition data operations (history, live snapshot, event intervals)
//!
//! Every method commits on its own; callers that need several writes to
//! land together must accept that each one is durable independently.

use crate::error::Result;
use crate::types::*;
use crate::PlcDb;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{debug_span, Instrument};

impl PlcDb {
    // ========================================================================
    // History
    // ========================================================================

    /// Append a history row; the value is clamped to [`MAX_VALUE_LEN`] chars
    pub async fn history_insert(&self, tag_id: i64, time_stamp: DateTime<Utc>, val: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO plc_hist_data (tag_id, time_stamp, val) VALUES (?, ?, ?)")
            .bind(tag_id)
            .bind(time_stamp.timestamp_millis())
            .bind(clamp_value(val))
            .execute(&self.pool)
            .instrument(debug_span!("db.exec", op = "history_insert", tag_id))
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent history row of a tag holding `val`, strictly before `before`
    pub async fn history_latest_value_before(
        &self,
        tag_id: i64,
        val: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<HistoryRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, tag_id, time_stamp, val FROM plc_hist_data
            WHERE tag_id = ? AND val = ? AND time_stamp < ?
            ORDER BY time_stamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(tag_id)
        .bind(clamp_value(val))
        .bind(before.timestamp_millis())
        .fetch_optional(&self.pool)
        .instrument(debug_span!("db.query", op = "history_latest_value_before", tag_id))
        .await?;

        Ok(row.as_ref().map(row_to_history))
    }

    /// All history rows of a tag, oldest first
    pub async fn history_list(&self, tag_id: i64) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            "SELECT id, tag_id, time_stamp, val FROM plc_hist_data WHERE tag_id = ? ORDER BY time_stamp, id",
        )
        .bind(tag_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_history).collect())
    }

    // ========================================================================
    // Live Snapshot
    // ========================================================================

    /// Insert or overwrite the single live row of a tag
    pub async fn live_upsert(&self, tag_id: i64, time_stamp: DateTime<Utc>, val: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plc_live_data (tag_id, time_stamp, val)
            VALUES (?, ?, ?)
            ON CONFLICT(tag_id) DO UPDATE SET
                time_stamp = excluded.time_stamp,
                val = excluded.val
            "#,
        )
        .bind(tag_id)
        .bind(time_stamp.timestamp_millis())
        .bind(clamp_value(val))
        .execute(&self.pool)
        .instrument(debug_span!("db.exec", op = "live_upsert", tag_id))
        .await?;

        Ok(())
    }

    /// Live row of a tag, if it was ever logged
    pub async fn live_get(&self, tag_id: i64) -> Result<Option<LiveSnapshot>> {
        let row = sqlx::query("SELECT id, tag_id, time_stamp, val FROM plc_live_data WHERE tag_id = ?")
            .bind(tag_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_live))
    }

    /// Every live row, ordered by tag id
    pub async fn live_list(&self) -> Result<Vec<LiveSnapshot>> {
        let rows = sqlx::query("SELECT id, tag_id, time_stamp, val FROM plc_live_data ORDER BY tag_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_live).collect())
    }

    // ========================================================================
    // Event Intervals
    // ========================================================================

    /// Record one "on" interval of a tag
    pub async fn event_insert(
        &self,
        tag_id: i64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<EventInterval> {
        let duration_ms = (end_time - start_time).num_milliseconds();

        let result = sqlx::query(
            "INSERT INTO plc_events (tag_id, start_time, end_time, duration_ms) VALUES (?, ?, ?, ?)",
        )
        .bind(tag_id)
        .bind(start_time.timestamp_millis())
        .bind(end_time.timestamp_millis())
        .bind(duration_ms)
        .execute(&self.pool)
        .instrument(debug_span!("db.exec", op = "event_insert", tag_id))
        .await?;

        Ok(EventInterval {
            id: result.last_insert_rowid(),
            tag_id,
            start_time,
            end_time,
            duration_ms,
        })
    }

    /// Event intervals of a tag, oldest first
    pub async fn event_list(&self, tag_id: i64) -> Result<Vec<EventInterval>> {
        let rows = sqlx::query(
            "SELECT id, tag_id, start_time, end_time, duration_ms FROM plc_events WHERE tag_id = ? ORDER BY start_time, id",
        )
        .bind(tag_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| EventInterval {
                id: row.get("id"),
                tag_id: row.get("tag_id"),
                start_time: PlcDb::millis_to_datetime(row.get("start_time")),
                end_time: PlcDb::millis_to_datetime(row.get("end_time")),
                duration_ms: row.get("duration_ms"),
            })
            .collect())
    }

    /// Row counts across the acquisition tables
    pub async fn acquisition_stats(&self) -> Result<AcquisitionStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM plc_hist_data) as history_rows,
                (SELECT COUNT(*) FROM plc_live_data) as live_rows,
                (SELECT COUNT(*) FROM plc_events) as event_rows
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AcquisitionStats {
            history_rows: row.get::<i64, _>("history_rows") as u64,
            live_rows: row.get::<i64, _>("live_rows") as u64,
            event_rows: row.get::<i64, _>("event_rows") as u64,
        })
    }
}

fn row_to_history(row: &sqlx::sqlite::SqliteRow) -> HistoryRecord {
    HistoryRecord {
        id: row.get("id"),
        tag_id: row.get("tag_id"),
        time_stamp: PlcDb::millis_to_datetime(row.get("time_stamp")),
        val: row.get("val"),
    }
}

fn row_to_live(row: &sqlx::sqlite::SqliteRow) -> LiveSnapshot {
    LiveSnapshot {
        id: row.get("id"),
        tag_id: row.get("tag_id"),
        time_stamp: PlcDb::millis_to_datetime(row.get("time_stamp")),
        val: row.get("val"),
    }
}
