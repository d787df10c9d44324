//! State transition store: turns a firing decision into store writes.
//!
//! Write order is history, event interval, live snapshot. Each statement
//! commits on its own, so a failure part-way leaves the earlier rows in place.

use crate::error::RecordError;
use crate::registry::TagDefinition;
use crate::trigger::TriggerKind;
use crate::value::{Quality, TagValue};
use chrono::{DateTime, Utc};
use plc2sql_db::{clamp_value, EventInterval, PlcDb};
use tracing::debug;

/// Stored form of the "on" level that opens an event interval.
const ON_VALUE: &str = "1";

/// Rows written for one fired reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Value as stored (rendered, then clamped to the column limit)
    pub value: String,
    pub history_id: Option<i64>,
    pub event: Option<EventInterval>,
}

#[derive(Debug, Clone)]
pub struct StateTransitionStore {
    db: PlcDb,
}

impl StateTransitionStore {
    pub fn new(db: PlcDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &PlcDb {
        &self.db
    }

    pub async fn record(
        &self,
        tag: &TagDefinition,
        timestamp: DateTime<Utc>,
        value: &TagValue,
        quality: &Quality,
    ) -> Result<PersistOutcome, RecordError> {
        if !quality.is_good() {
            return Err(RecordError::DataQuality(quality.to_string()));
        }

        let rendered = clamp_value(&value.render()).to_string();

        let history_id = if tag.log_history {
            Some(self.db.history_insert(tag.id, timestamp, &rendered).await?)
        } else {
            None
        };

        let event = if tag.trigger.kind() == TriggerKind::ValueChange && value.is_level(0.0) {
            self.close_event(tag.id, timestamp).await?
        } else {
            None
        };

        self.db.live_upsert(tag.id, timestamp, &rendered).await?;

        Ok(PersistOutcome {
            value: rendered,
            history_id,
            event,
        })
    }

    /// Close an "on" interval starting at the tag's most recent earlier "1".
    async fn close_event(&self, tag_id: i64, end: DateTime<Utc>) -> Result<Option<EventInterval>, RecordError> {
        let Some(start) = self.db.history_latest_value_before(tag_id, ON_VALUE, end).await? else {
            return Ok(None);
        };

        let event = self.db.event_insert(tag_id, start.time_stamp, end).await?;
        debug!(tag = tag_id, duration_ms = event.duration_ms, "Event interval closed");
        Ok(Some(event))
    }
}
