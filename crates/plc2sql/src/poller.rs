//! Poll loop controller
//!
//! One cycle is: batch-read every address, evaluate each tag in registry
//! order, record the ones that fire, then adopt the readings as the new
//! baseline. The inter-cycle sleep is the only place a shutdown request is
//! observed, so a cycle always completes or fails as a whole.

use crate::display::{record_table, RecordLine};
use crate::error::{RecordError, SessionError, SourceError};
use crate::recorder::StateTransitionStore;
use crate::registry::{TagEntry, TagRegistry};
use crate::source::DataSource;
use crate::trigger::evaluate;
use crate::value::Reading;
use plc2sql_db::PlcDb;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Initializing,
    Connected,
    Running,
    Stopped,
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub forced: bool,
    pub fired: usize,
    pub persisted: usize,
    pub events: usize,
    pub quality_skipped: usize,
    pub failed: usize,
    pub records: Vec<RecordLine>,
}

#[derive(Debug)]
pub struct PollController {
    state: ControllerState,
    entries: Vec<TagEntry>,
    addresses: Vec<String>,
    store: StateTransitionStore,
    period: Duration,
    verbose: bool,
    force_fire_next: bool,
    cycle: u64,
}

impl PollController {
    pub fn new(registry: TagRegistry, store: StateTransitionStore, period: Duration, verbose: bool) -> Self {
        let addresses = registry.source_addresses();
        Self {
            state: ControllerState::Initializing,
            entries: registry.into_entries(),
            addresses,
            store,
            period,
            verbose,
            force_fire_next: true,
            cycle: 0,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    /// Source connected and registry loaded.
    pub fn mark_connected(&mut self) {
        self.state = ControllerState::Connected;
    }

    /// Execute one sampling cycle.
    ///
    /// A source failure or a lost store stops the controller and returns the
    /// session error; per-row faults are logged and counted.
    pub async fn run_cycle(&mut self, source: &mut dyn DataSource) -> Result<CycleReport, SessionError> {
        self.state = ControllerState::Running;
        let force = self.force_fire_next;
        let cycle = self.cycle + 1;

        let readings = match self.read_all(source).await {
            Ok(readings) => readings,
            Err(err) => {
                self.state = ControllerState::Stopped;
                return Err(err.into());
            }
        };

        let timestamp = PlcDb::now();
        let now = Instant::now();
        let mut report = CycleReport {
            cycle,
            forced: force,
            ..CycleReport::default()
        };

        for (entry, reading) in self.entries.iter_mut().zip(&readings) {
            let def = &entry.definition;
            let fired = evaluate(
                &def.trigger,
                &reading.value,
                entry.state.last_value.as_ref(),
                &mut entry.state.trigger,
                force,
                now,
            );
            if !fired {
                continue;
            }
            report.fired += 1;

            match self.store.record(def, timestamp, &reading.value, &reading.quality).await {
                Ok(outcome) => {
                    report.persisted += 1;
                    if outcome.event.is_some() {
                        report.events += 1;
                    }
                    report.records.push(RecordLine {
                        address: def.address.clone(),
                        name: def.name.clone(),
                        tag_type: def.tag_type.clone(),
                        equipment: def.equipment.clone(),
                        timestamp,
                        value: outcome.value,
                    });
                }
                Err(RecordError::DataQuality(quality)) => {
                    warn!(tag = %def.address, %timestamp, quality = %quality, "Reading skipped: data quality not good");
                    report.quality_skipped += 1;
                }
                Err(RecordError::Store(err)) if err.is_connectivity() => {
                    warn!(tag = %def.address, %timestamp, error = %err, "Store unreachable, stopping session");
                    self.state = ControllerState::Stopped;
                    return Err(SessionError::StoreUnreachable(err));
                }
                Err(err) => {
                    warn!(tag = %def.address, %timestamp, error = %err, "Reading not persisted");
                    report.failed += 1;
                }
            }
        }

        for (entry, reading) in self.entries.iter_mut().zip(readings) {
            entry.state.last_value = Some(reading.value);
            entry.state.last_quality = Some(reading.quality);
        }
        self.force_fire_next = false;
        self.cycle = cycle;

        if self.verbose && !report.records.is_empty() {
            println!("{}", record_table(&report.records));
        }
        debug!(
            cycle,
            forced = force,
            fired = report.fired,
            persisted = report.persisted,
            "Cycle complete"
        );
        Ok(report)
    }

    /// Run cycles until shutdown is requested or the session fails.
    pub async fn run(
        &mut self,
        source: &mut dyn DataSource,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SessionError> {
        self.state = ControllerState::Running;
        info!(tags = self.entries.len(), period_ms = self.period.as_millis() as u64, "Polling started");

        loop {
            self.run_cycle(source).await?;

            tokio::select! {
                _ = tokio::time::sleep(self.period) => {}
                changed = shutdown.changed() => {
                    // a dropped sender also means stop
                    if changed.is_err() || *shutdown.borrow() {
                        info!(cycles = self.cycle, "Shutdown requested, polling stopped");
                        self.state = ControllerState::Stopped;
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn read_all(&self, source: &mut dyn DataSource) -> Result<Vec<Reading>, SourceError> {
        let readings = source.batch_read(&self.addresses).await?;
        if readings.len() != self.addresses.len() {
            return Err(SourceError::read(format!(
                "expected {} readings, got {}",
                self.addresses.len(),
                readings.len()
            )));
        }
        Ok(readings)
    }
}
