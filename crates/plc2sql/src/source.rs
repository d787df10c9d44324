//! Data source adapters.
//!
//! The industrial wire protocol lives behind [`DataSource`]. The crate ships
//! a seeded [`SimulatedSource`] for commissioning and tests without a PLC.

use crate::config::{SourceConfig, SourceKind};
use crate::error::SourceError;
use crate::value::{Reading, TagValue};
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use tracing::{debug, info};

/// Batch-reading connection to the control system.
#[async_trait]
pub trait DataSource: Send {
    async fn connect(&mut self, endpoint: &str) -> Result<(), SourceError>;

    /// Read every address; the result is aligned with `addresses`.
    async fn batch_read(&mut self, addresses: &[String]) -> Result<Vec<Reading>, SourceError>;

    /// Release the connection. Safe to call when not connected.
    async fn disconnect(&mut self);
}

/// Build the adapter named in the configuration.
pub fn from_config(config: &SourceConfig) -> Box<dyn DataSource> {
    match config.kind {
        SourceKind::Simulated => Box::new(SimulatedSource::new(config.seed)),
    }
}

/// Address prefix of simulated boolean points.
const BIT_PREFIX: &str = "bit:";
/// Address prefix of simulated points that always read bad quality.
const BAD_PREFIX: &str = "bad:";
const BIT_TOGGLE_PROBABILITY: f64 = 0.2;
const WALK_START: f64 = 50.0;
const WALK_STEP: f64 = 1.0;

/// Deterministic stand-in for a PLC.
///
/// `bit:` addresses toggle between 0 and 1, `bad:` addresses read with bad
/// quality, everything else random-walks from 50 with 3-decimal resolution.
#[derive(Debug)]
pub struct SimulatedSource {
    rng: ChaCha8Rng,
    points: HashMap<String, f64>,
    connected_to: Option<String>,
}

impl SimulatedSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            points: HashMap::new(),
            connected_to: None,
        }
    }

    fn sample(&mut self, address: &str) -> Reading {
        let is_bit = address.starts_with(BIT_PREFIX);
        let current = self.points.get(address).copied();

        let next = match (is_bit, current) {
            (true, None) => 0.0,
            (true, Some(bit)) => {
                if self.rng.gen_bool(BIT_TOGGLE_PROBABILITY) {
                    1.0 - bit
                } else {
                    bit
                }
            }
            (false, None) => WALK_START,
            (false, Some(value)) => {
                let step = self.rng.gen_range(-WALK_STEP..=WALK_STEP);
                ((value + step) * 1000.0).round() / 1000.0
            }
        };
        self.points.insert(address.to_string(), next);

        if address.starts_with(BAD_PREFIX) {
            Reading::bad(TagValue::Number(next), "Bad")
        } else {
            Reading::good(TagValue::Number(next))
        }
    }
}

#[async_trait]
impl DataSource for SimulatedSource {
    async fn connect(&mut self, endpoint: &str) -> Result<(), SourceError> {
        info!(endpoint, "Simulated source connected");
        self.connected_to = Some(endpoint.to_string());
        Ok(())
    }

    async fn batch_read(&mut self, addresses: &[String]) -> Result<Vec<Reading>, SourceError> {
        if self.connected_to.is_none() {
            return Err(SourceError::read("simulated source is not connected"));
        }
        let readings: Vec<Reading> = addresses.iter().map(|address| self.sample(address)).collect();
        debug!(count = readings.len(), "Simulated batch read");
        Ok(readings)
    }

    async fn disconnect(&mut self) {
        if let Some(endpoint) = self.connected_to.take() {
            info!(endpoint, "Simulated source disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_read_requires_connection() {
        let mut source = SimulatedSource::new(1);
        let err = source.batch_read(&addresses(&["a"])).await.unwrap_err();
        assert!(matches!(err, SourceError::Read(_)));
    }

    #[tokio::test]
    async fn test_same_seed_same_sequence() {
        let addrs = addresses(&["bit:Run", "Line1.Speed", "bad:Sensor"]);
        let mut a = SimulatedSource::new(42);
        let mut b = SimulatedSource::new(42);
        a.connect("sim").await.unwrap();
        b.connect("sim").await.unwrap();

        for _ in 0..20 {
            assert_eq!(a.batch_read(&addrs).await.unwrap(), b.batch_read(&addrs).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_point_shapes() {
        let addrs = addresses(&["bit:Run", "Line1.Speed", "bad:Sensor"]);
        let mut source = SimulatedSource::new(7);
        source.connect("sim").await.unwrap();

        let first = source.batch_read(&addrs).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0], Reading::good(0.0));
        assert_eq!(first[1], Reading::good(WALK_START));
        assert!(!first[2].quality.is_good());

        for _ in 0..50 {
            let readings = source.batch_read(&addrs).await.unwrap();
            let bit = readings[0].value.as_number().unwrap();
            assert!(bit == 0.0 || bit == 1.0);
        }
    }

    #[tokio::test]
    async fn test_disconnect_blocks_reads() {
        let mut source = SimulatedSource::new(7);
        source.connect("sim").await.unwrap();
        source.disconnect().await;
        assert!(source.batch_read(&addresses(&["x"])).await.is_err());
    }
}
