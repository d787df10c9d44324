//! Row types for every PLC2SQL relation.
//!
//! The recorder mirrors `TagRow` into its own strongly-typed definition; the
//! remaining types are returned as-is by the read helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum stored length (in characters) of a history/live value.
pub const MAX_VALUE_LEN: usize = 50;

// ============================================================================
// Configuration Types
// ============================================================================

/// A tag classification (ESTOP, LINE RUNNING, ALARM #2, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagTypeRow {
    pub id: i64,
    pub tag_type: String,
}

/// A piece of equipment tags belong to (LINE 1, PRESS 15, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentRow {
    pub id: i64,
    pub equipment: String,
}

/// A tag definition row, joined with its type and equipment names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRow {
    pub id: i64,
    /// Address understood by the data source
    pub tag_name: String,
    /// Display name
    pub name: String,
    /// Trigger kind code (1..=9)
    pub insert_trigger: i64,
    /// '/'-delimited trigger parameters
    pub trigger_setting: String,
    /// Whether history rows are written for this tag
    pub log_hist: bool,
    pub tag_type_id: Option<i64>,
    pub equipment_id: Option<i64>,
    pub tag_type: Option<String>,
    pub equipment: Option<String>,
}

/// Insert payload for a tag definition.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTag {
    /// Explicit id, or None to let the store assign one
    pub id: Option<i64>,
    pub tag_name: String,
    pub name: String,
    pub insert_trigger: i64,
    pub trigger_setting: String,
    pub log_hist: bool,
    pub tag_type_id: Option<i64>,
    pub equipment_id: Option<i64>,
}

impl NewTag {
    pub fn new(tag_name: &str, name: &str, insert_trigger: i64, trigger_setting: &str) -> Self {
        Self {
            id: None,
            tag_name: tag_name.to_string(),
            name: name.to_string(),
            insert_trigger,
            trigger_setting: trigger_setting.to_string(),
            log_hist: true,
            tag_type_id: None,
            equipment_id: None,
        }
    }
}

// ============================================================================
// Acquisition Types
// ============================================================================

/// Append-only historical value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub tag_id: i64,
    pub time_stamp: DateTime<Utc>,
    pub val: String,
}

/// Most recent logged value of a tag (one row per tag)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub id: i64,
    pub tag_id: i64,
    pub time_stamp: DateTime<Utc>,
    pub val: String,
}

/// One "on" duration of a boolean tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInterval {
    pub id: i64,
    pub tag_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
}

impl EventInterval {
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.duration_ms)
    }
}

/// Row counts for the acquisition tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub history_rows: u64,
    pub live_rows: u64,
    pub event_rows: u64,
}

/// Clamp a value to [`MAX_VALUE_LEN`] characters on a char boundary.
pub fn clamp_value(val: &str) -> &str {
    match val.char_indices().nth(MAX_VALUE_LEN) {
        Some((idx, _)) => &val[..idx],
        None => val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_value_short_is_unchanged() {
        assert_eq!(clamp_value("34.232143"), "34.232143");
    }

    #[test]
    fn test_clamp_value_respects_char_boundaries() {
        let long = "é".repeat(60);
        let clamped = clamp_value(&long);
        assert_eq!(clamped.chars().count(), MAX_VALUE_LEN);
    }

    #[test]
    fn test_event_duration() {
        let now = Utc::now();
        let event = EventInterval {
            id: 1,
            tag_id: 1,
            start_time: now,
            end_time: now,
            duration_ms: 2_500,
        };
        assert_eq!(event.duration(), chrono::Duration::milliseconds(2_500));
    }
}
