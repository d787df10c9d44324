//! Recovery supervisor
//!
//! Keeps acquisition alive across faults: when a session ends with an error
//! the source is disconnected, the session context dropped, and after a delay
//! a fresh session reconnects, reloads the registry and resynchronises.
//!
//! Restarts are counted in a sliding window. Once the count reaches the
//! threshold the operator is alerted (once per window) and the delay between
//! attempts escalates. The supervisor itself never gives up; only a shutdown
//! request ends it.

use crate::alert::AlertChannel;
use crate::config::RecoveryConfig;
use crate::registry::TagRegistry;
use crate::session::{SessionContext, SessionSettings};
use crate::source::DataSource;
use chrono::Utc;
use plc2sql_db::PlcDb;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub window: Duration,
    pub delay: Duration,
    pub escalated_delay: Duration,
}

impl From<&RecoveryConfig> for RestartPolicy {
    fn from(config: &RecoveryConfig) -> Self {
        Self {
            max_restarts: config.max_restarts,
            window: Duration::from_secs(config.window_secs),
            delay: Duration::from_millis(config.restart_delay_ms),
            escalated_delay: Duration::from_millis(config.escalated_delay_ms),
        }
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::from(&RecoveryConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartDecision {
    pub restarts_in_window: usize,
    pub delay: Duration,
    /// Send an operator alert for this restart
    pub alert: bool,
}

/// Sliding-window restart counter.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: RestartPolicy,
    restarts: VecDeque<Instant>,
    last_alert: Option<Instant>,
}

impl RestartTracker {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            restarts: VecDeque::new(),
            last_alert: None,
        }
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    /// Count a restart at `now` and decide the delay and whether to alert.
    pub fn record_restart(&mut self, now: Instant) -> RestartDecision {
        while let Some(oldest) = self.restarts.front() {
            if now.saturating_duration_since(*oldest) >= self.policy.window {
                self.restarts.pop_front();
            } else {
                break;
            }
        }
        self.restarts.push_back(now);

        let count = self.restarts.len();
        if count < self.policy.max_restarts as usize {
            return RestartDecision {
                restarts_in_window: count,
                delay: self.policy.delay,
                alert: false,
            };
        }

        let alert = match self.last_alert {
            Some(at) => now.saturating_duration_since(at) >= self.policy.window,
            None => true,
        };
        if alert {
            self.last_alert = Some(now);
        }
        RestartDecision {
            restarts_in_window: count,
            delay: self.policy.escalated_delay,
            alert,
        }
    }
}

/// Totals over the supervisor's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    pub sessions: u64,
    pub restarts: u64,
    pub alerts: u64,
}

pub struct RecoverySupervisor {
    db: PlcDb,
    source: Box<dyn DataSource>,
    alert: Arc<dyn AlertChannel>,
    settings: SessionSettings,
    tracker: RestartTracker,
}

impl RecoverySupervisor {
    pub fn new(
        db: PlcDb,
        source: Box<dyn DataSource>,
        alert: Arc<dyn AlertChannel>,
        settings: SessionSettings,
        policy: RestartPolicy,
    ) -> Self {
        Self {
            db,
            source,
            alert,
            settings,
            tracker: RestartTracker::new(policy),
        }
    }

    /// Run sessions until shutdown. `initial` is the registry validated at
    /// startup; later sessions reload it from the store.
    pub async fn run(mut self, initial: TagRegistry, mut shutdown: watch::Receiver<bool>) -> SupervisorReport {
        let mut report = SupervisorReport::default();
        let mut preloaded = Some(initial);

        loop {
            report.sessions += 1;
            let session_id = report.sessions;

            let result = async {
                let mut ctx = SessionContext::establish(
                    session_id,
                    &self.db,
                    self.source.as_mut(),
                    &self.settings,
                    preloaded.take(),
                )
                .await?;
                let outcome = ctx.run(self.source.as_mut(), &mut shutdown).await;
                info!(
                    session = ctx.id(),
                    started_at = %ctx.started_at(),
                    uptime_secs = (Utc::now() - ctx.started_at()).num_seconds(),
                    ok = outcome.is_ok(),
                    "Session ended"
                );
                outcome
            }
            .instrument(info_span!("session", session = session_id))
            .await;

            self.source.disconnect().await;

            let err = match result {
                Ok(()) => {
                    info!(sessions = report.sessions, restarts = report.restarts, "Acquisition stopped");
                    return report;
                }
                Err(err) => err,
            };

            report.restarts += 1;
            let decision = self.tracker.record_restart(Instant::now());
            error!(
                session = session_id,
                restarts_in_window = decision.restarts_in_window,
                retry_in_ms = decision.delay.as_millis() as u64,
                "Session failed: {}",
                err
            );

            if decision.alert {
                report.alerts += 1;
                let policy = self.tracker.policy();
                let headline = format!(
                    "PLC2SQL restarted {} times within {} minutes",
                    decision.restarts_in_window,
                    policy.window.as_secs() / 60
                );
                let detail = format!(
                    "Last failure: {}. Retrying every {} ms.",
                    err,
                    decision.delay.as_millis()
                );
                if let Err(alert_err) = self.alert.send(&headline, &detail).await {
                    warn!("Failed to send restart alert: {}", alert_err);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(decision.delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(sessions = report.sessions, restarts = report.restarts, "Shutdown during restart delay");
                        return report;
                    }
                }
            }
            info!(session = session_id + 1, "Restarting acquisition session");
        }
    }
}
