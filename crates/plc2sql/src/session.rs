//! Per-session context.
//!
//! Everything mutable about an acquisition session (connection, registry,
//! runtime state, cycle counter) lives in a [`SessionContext`]. It is built
//! when a session starts and dropped when the session ends, so a restart
//! always begins from a clean slate with a forced full resynchronisation.

use crate::config::PlcConfig;
use crate::error::SessionError;
use crate::poller::{ControllerState, PollController};
use crate::recorder::StateTransitionStore;
use crate::registry::TagRegistry;
use crate::source::DataSource;
use chrono::{DateTime, Utc};
use plc2sql_db::PlcDb;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::info;

/// Session parameters that do not change across restarts.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub endpoint: String,
    pub period: Duration,
    /// Print each cycle's persisted readings as a table
    pub verbose: bool,
}

impl SessionSettings {
    pub fn from_config(config: &PlcConfig, verbose: bool) -> Self {
        Self {
            endpoint: config.source.endpoint.clone(),
            period: config.poll.period(),
            verbose,
        }
    }
}

#[derive(Debug)]
pub struct SessionContext {
    id: u64,
    started_at: DateTime<Utc>,
    controller: PollController,
}

impl SessionContext {
    /// Connect the source, confirm the store, and load (or adopt) the registry.
    pub async fn establish(
        id: u64,
        db: &PlcDb,
        source: &mut dyn DataSource,
        settings: &SessionSettings,
        registry: Option<TagRegistry>,
    ) -> Result<Self, SessionError> {
        source.connect(&settings.endpoint).await?;
        db.ping().await.map_err(SessionError::StoreUnreachable)?;

        let registry = match registry {
            Some(registry) => registry,
            None => TagRegistry::load(db, Instant::now()).await?,
        };

        let mut controller = PollController::new(
            registry,
            StateTransitionStore::new(db.clone()),
            settings.period,
            settings.verbose,
        );
        controller.mark_connected();

        info!(session = id, tags = controller.entries().len(), "Session established");
        Ok(Self {
            id,
            started_at: Utc::now(),
            controller,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> ControllerState {
        self.controller.state()
    }

    /// Poll until shutdown or a session-fatal fault.
    pub async fn run(
        &mut self,
        source: &mut dyn DataSource,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SessionError> {
        self.controller.run(source, shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::SimulatedSource;
    use async_trait::async_trait;
    use crate::value::Reading;

    struct Unreachable;

    #[async_trait]
    impl DataSource for Unreachable {
        async fn connect(&mut self, endpoint: &str) -> Result<(), SourceError> {
            Err(SourceError::Connect {
                endpoint: endpoint.to_string(),
                reason: "refused".into(),
            })
        }

        async fn batch_read(&mut self, _addresses: &[String]) -> Result<Vec<Reading>, SourceError> {
            Err(SourceError::read("not connected"))
        }

        async fn disconnect(&mut self) {}
    }

    fn settings() -> SessionSettings {
        SessionSettings::from_config(&PlcConfig::default(), false)
    }

    #[tokio::test]
    async fn test_establish_loads_registry_when_none_given() {
        let db = PlcDb::open_in_memory().await.unwrap();
        db.tag_insert(&plc2sql_db::NewTag::new("bit:Run", "run", 2, "")).await.unwrap();
        let mut source = SimulatedSource::new(1);

        let ctx = SessionContext::establish(4, &db, &mut source, &settings(), None)
            .await
            .unwrap();
        assert_eq!(ctx.id(), 4);
        assert_eq!(ctx.state(), ControllerState::Connected);
        assert_eq!(ctx.controller.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_started_at_is_stamped_on_establish() {
        let db = PlcDb::open_in_memory().await.unwrap();
        let mut source = SimulatedSource::new(1);
        let before = Utc::now();

        let ctx = SessionContext::establish(2, &db, &mut source, &settings(), Some(TagRegistry::default()))
            .await
            .unwrap();
        assert!(ctx.started_at() >= before);
        assert!(ctx.started_at() <= Utc::now());
        assert_eq!(ctx.controller.entries().len(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_session_error() {
        let db = PlcDb::open_in_memory().await.unwrap();
        let err = SessionContext::establish(1, &db, &mut Unreachable, &settings(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Source(SourceError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_closed_store_is_unreachable() {
        let db = PlcDb::open_in_memory().await.unwrap();
        db.pool().close().await;
        let mut source = SimulatedSource::new(1);

        let err = SessionContext::establish(1, &db, &mut source, &settings(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::StoreUnreachable(_)));
    }
}
