//! Tag registry: typed tag definitions plus their fresh runtime state.

use crate::error::LoadError;
use crate::trigger::{TriggerConfig, TriggerKind, TriggerState};
use crate::value::{Quality, TagValue};
use plc2sql_db::{PlcDb, TagRow};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// Immutable definition of one tag for the lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct TagDefinition {
    pub id: i64,
    /// Address passed to the data source
    pub address: String,
    pub name: String,
    pub trigger: TriggerConfig,
    pub log_history: bool,
    pub tag_type: Option<String>,
    pub equipment: Option<String>,
}

impl TagDefinition {
    pub fn from_row(row: TagRow) -> Result<Self, LoadError> {
        let trigger = TriggerConfig::parse(row.insert_trigger, &row.trigger_setting).map_err(|source| {
            LoadError::Trigger {
                tag_id: row.id,
                address: row.tag_name.clone(),
                source,
            }
        })?;

        Ok(Self {
            id: row.id,
            address: row.tag_name,
            name: row.name,
            trigger,
            log_history: row.log_hist,
            tag_type: row.tag_type,
            equipment: row.equipment,
        })
    }
}

/// Per-tag state owned by the poll controller. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TagRuntimeState {
    /// Value at the end of the last completed cycle
    pub last_value: Option<TagValue>,
    pub last_quality: Option<Quality>,
    pub trigger: TriggerState,
}

impl TagRuntimeState {
    pub fn new(now: Instant) -> Self {
        Self {
            last_value: None,
            last_quality: None,
            trigger: TriggerState::new(now),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TagEntry {
    pub definition: TagDefinition,
    pub state: TagRuntimeState,
}

/// All tags of a session, in ascending id order.
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    entries: Vec<TagEntry>,
}

impl TagRegistry {
    /// Read every tag row and build armed runtime state stamped with `now`.
    pub async fn load(db: &PlcDb, now: Instant) -> Result<Self, LoadError> {
        let rows = db.tag_list_all().await?;
        let definitions = rows
            .into_iter()
            .map(TagDefinition::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let registry = Self::from_definitions(definitions, now);
        info!(tags = registry.len(), "Tag registry loaded");
        Ok(registry)
    }

    pub fn from_definitions(mut definitions: Vec<TagDefinition>, now: Instant) -> Self {
        definitions.sort_by_key(|def| def.id);
        let entries = definitions
            .into_iter()
            .map(|definition| TagEntry {
                definition,
                state: TagRuntimeState::new(now),
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Addresses in registry order; batch reads return readings in this order.
    pub fn source_addresses(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.definition.address.clone())
            .collect()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &TagDefinition> {
        self.entries.iter().map(|entry| &entry.definition)
    }

    /// Tag count per trigger kind, for the `check` report.
    pub fn kind_counts(&self) -> BTreeMap<TriggerKind, usize> {
        let mut counts = BTreeMap::new();
        for def in self.definitions() {
            *counts.entry(def.trigger.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn into_entries(self) -> Vec<TagEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plc2sql_db::NewTag;

    async fn db_with(tags: &[(i64, &str, i64, &str)]) -> PlcDb {
        let db = PlcDb::open_in_memory().await.unwrap();
        for (id, address, code, params) in tags {
            let mut tag = NewTag::new(address, "", *code, params);
            tag.id = Some(*id);
            db.tag_insert(&tag).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_load_orders_by_id_with_armed_state() {
        let db = db_with(&[(3, "[plc]C", 9, "5"), (1, "[plc]A", 1, ""), (2, "[plc]B", 5, "10/20")]).await;
        let now = Instant::now();

        let registry = TagRegistry::load(&db, now).await.unwrap();
        assert_eq!(registry.source_addresses(), vec!["[plc]A", "[plc]B", "[plc]C"]);

        let entries = registry.into_entries();
        assert_eq!(entries[1].definition.trigger, TriggerConfig::InBand { low: 10.0, high: 20.0 });
        for entry in &entries {
            assert_eq!(entry.state, TagRuntimeState::new(now));
        }
    }

    #[tokio::test]
    async fn test_load_fails_on_bad_parameters() {
        let db = db_with(&[(1, "[plc]A", 1, ""), (2, "[plc]Band", 5, "10")]).await;

        let err = TagRegistry::load(&db, Instant::now()).await.unwrap_err();
        match err {
            LoadError::Trigger { tag_id, address, .. } => {
                assert_eq!(tag_id, 2);
                assert_eq!(address, "[plc]Band");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_kind_counts() {
        let db = db_with(&[(1, "a", 1, ""), (2, "b", 1, ""), (3, "c", 2, "")]).await;
        let registry = TagRegistry::load(&db, Instant::now()).await.unwrap();
        let counts = registry.kind_counts();
        assert_eq!(counts.get(&TriggerKind::ValueChange), Some(&2));
        assert_eq!(counts.get(&TriggerKind::RisingEdge), Some(&1));
        assert_eq!(counts.len(), 2);
    }
}
