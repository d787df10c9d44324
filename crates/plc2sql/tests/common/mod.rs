//! Shared test doubles: a scripted data source and a recording alert channel.

#![allow(dead_code)]

use async_trait::async_trait;
use plc2sql::{AlertChannel, AlertError, DataSource, Reading, SourceError};
use plc2sql_db::{NewTag, PlcDb};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub enum Step {
    Read(Vec<Reading>),
    Fail(&'static str),
}

/// Observable side effects of a [`ScriptedSource`].
#[derive(Debug, Default)]
pub struct SourceLog {
    pub connects: u32,
    pub disconnects: u32,
    pub reads: u32,
    /// Address count of every batch read, in order
    pub batch_sizes: Vec<usize>,
}

/// Replays a fixed list of batch reads. Popping the last step requests
/// shutdown, so the run ends after that cycle.
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    failing_connects: u32,
    shutdown: Option<watch::Sender<bool>>,
    log: Arc<Mutex<SourceLog>>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> (Self, Arc<Mutex<SourceLog>>) {
        let log = Arc::new(Mutex::new(SourceLog::default()));
        let source = Self {
            steps: steps.into(),
            failing_connects: 0,
            shutdown: None,
            log: Arc::clone(&log),
        };
        (source, log)
    }

    pub fn with_failing_connects(mut self, count: u32) -> Self {
        self.failing_connects = count;
        self
    }

    pub fn with_shutdown(mut self, tx: watch::Sender<bool>) -> Self {
        self.shutdown = Some(tx);
        self
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn connect(&mut self, endpoint: &str) -> Result<(), SourceError> {
        self.log.lock().unwrap().connects += 1;
        if self.failing_connects > 0 {
            self.failing_connects -= 1;
            return Err(SourceError::Connect {
                endpoint: endpoint.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    async fn batch_read(&mut self, addresses: &[String]) -> Result<Vec<Reading>, SourceError> {
        {
            let mut log = self.log.lock().unwrap();
            log.reads += 1;
            log.batch_sizes.push(addresses.len());
        }
        let step = self.steps.pop_front();
        if self.steps.is_empty() {
            if let Some(tx) = &self.shutdown {
                let _ = tx.send(true);
            }
        }
        match step {
            Some(Step::Read(readings)) => Ok(readings),
            Some(Step::Fail(reason)) => Err(SourceError::read(reason)),
            None => Err(SourceError::read("script exhausted")),
        }
    }

    async fn disconnect(&mut self) {
        self.log.lock().unwrap().disconnects += 1;
    }
}

/// Alert channel that keeps every (headline, detail) it was given.
#[derive(Clone, Default)]
pub struct RecordingAlert {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingAlert {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl AlertChannel for RecordingAlert {
    async fn send(&self, headline: &str, detail: &str) -> Result<(), AlertError> {
        self.sent
            .lock()
            .unwrap()
            .push((headline.to_string(), detail.to_string()));
        Ok(())
    }
}

/// In-memory store with one tag per `(id, address, trigger code, params)`.
pub async fn store_with_tags(tags: &[(i64, &str, i64, &str)]) -> PlcDb {
    let db = PlcDb::open_in_memory().await.unwrap();
    for (id, address, code, params) in tags {
        let mut tag = NewTag::new(address, address, *code, params);
        tag.id = Some(*id);
        db.tag_insert(&tag).await.unwrap();
    }
    db
}

pub fn good(values: &[f64]) -> Vec<Reading> {
    values.iter().map(|v| Reading::good(*v)).collect()
}
