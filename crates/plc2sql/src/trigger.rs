//! Trigger evaluation: decides, per tag and per sample, whether a reading is
//! worth persisting.
//!
//! Trigger parameters are parsed once when the registry loads; evaluation
//! never fails. Edge kinds carry a [`Latch`] so a sustained level fires once:
//!
//! | latch   | current at level | fires | next latch |
//! |---------|------------------|-------|------------|
//! | Armed   | yes              | yes   | Latched    |
//! | Armed   | no               | no    | Armed      |
//! | Latched | yes              | no    | Latched    |
//! | Latched | no               | no    | Armed      |
//!
//! The level is 1 for rising edges and 0 for falling edges. Under force-fire
//! every kind fires and the latch is set to `Latched` exactly when the
//! current value is at the level.

use crate::error::TriggerConfigError;
use crate::value::TagValue;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Trigger kind codes as stored in `plc_tags.insert_trigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TriggerKind {
    ValueChange = 1,
    RisingEdge = 2,
    FallingEdge = 3,
    Deadband = 4,
    InBand = 5,
    OutBand = 6,
    HighLimit = 7,
    LowLimit = 8,
    Time = 9,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 9] = [
        TriggerKind::ValueChange,
        TriggerKind::RisingEdge,
        TriggerKind::FallingEdge,
        TriggerKind::Deadband,
        TriggerKind::InBand,
        TriggerKind::OutBand,
        TriggerKind::HighLimit,
        TriggerKind::LowLimit,
        TriggerKind::Time,
    ];

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::ValueChange => "VALUE_CHANGE",
            TriggerKind::RisingEdge => "RISING_EDGE",
            TriggerKind::FallingEdge => "FALLING_EDGE",
            TriggerKind::Deadband => "DEADBAND",
            TriggerKind::InBand => "IN_BAND",
            TriggerKind::OutBand => "OUT_BAND",
            TriggerKind::HighLimit => "HIGH_LIMIT",
            TriggerKind::LowLimit => "LOW_LIMIT",
            TriggerKind::Time => "TIME",
        }
    }

    fn arity(self) -> usize {
        match self {
            TriggerKind::ValueChange | TriggerKind::RisingEdge | TriggerKind::FallingEdge => 0,
            TriggerKind::InBand | TriggerKind::OutBand => 2,
            TriggerKind::Deadband
            | TriggerKind::HighLimit
            | TriggerKind::LowLimit
            | TriggerKind::Time => 1,
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated trigger policy of one tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerConfig {
    ValueChange,
    RisingEdge,
    FallingEdge,
    /// Relative change threshold, already normalised to a fraction
    Deadband { fraction: f64 },
    InBand { low: f64, high: f64 },
    OutBand { low: f64, high: f64 },
    HighLimit { threshold: f64 },
    LowLimit { threshold: f64 },
    Time { interval: Duration },
}

impl TriggerConfig {
    /// Parse a kind code and its `/`-delimited parameter string.
    pub fn parse(code: i64, params: &str) -> Result<Self, TriggerConfigError> {
        let kind = TriggerKind::from_code(code).ok_or(TriggerConfigError::UnknownKind(code))?;

        let raw: Vec<&str> = if params.trim().is_empty() {
            Vec::new()
        } else {
            params.split('/').map(str::trim).collect()
        };
        if raw.len() != kind.arity() {
            return Err(TriggerConfigError::Arity {
                kind,
                expected: kind.arity(),
                found: raw.len(),
            });
        }

        let mut values = Vec::with_capacity(raw.len());
        for item in raw {
            match item.parse::<f64>() {
                Ok(v) if v.is_finite() => values.push(v),
                _ => {
                    return Err(TriggerConfigError::NonNumeric {
                        kind,
                        value: item.to_string(),
                    })
                }
            }
        }

        let config = match kind {
            TriggerKind::ValueChange => TriggerConfig::ValueChange,
            TriggerKind::RisingEdge => TriggerConfig::RisingEdge,
            TriggerKind::FallingEdge => TriggerConfig::FallingEdge,
            TriggerKind::Deadband => {
                let raw = values[0];
                if raw < 0.0 {
                    return Err(TriggerConfigError::NegativeDeadband(raw));
                }
                // whole percentages (10) and fractions (0.10) are both accepted
                let fraction = if raw > 1.0 { raw / 100.0 } else { raw };
                TriggerConfig::Deadband { fraction }
            }
            TriggerKind::InBand | TriggerKind::OutBand => {
                let (low, high) = (values[0], values[1]);
                if low > high {
                    return Err(TriggerConfigError::InvertedBand { low, high });
                }
                if kind == TriggerKind::InBand {
                    TriggerConfig::InBand { low, high }
                } else {
                    TriggerConfig::OutBand { low, high }
                }
            }
            TriggerKind::HighLimit => TriggerConfig::HighLimit { threshold: values[0] },
            TriggerKind::LowLimit => TriggerConfig::LowLimit { threshold: values[0] },
            TriggerKind::Time => {
                let secs = values[0];
                if secs <= 0.0 {
                    return Err(TriggerConfigError::InvalidInterval(secs));
                }
                TriggerConfig::Time {
                    interval: Duration::from_secs_f64(secs),
                }
            }
        };
        Ok(config)
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerConfig::ValueChange => TriggerKind::ValueChange,
            TriggerConfig::RisingEdge => TriggerKind::RisingEdge,
            TriggerConfig::FallingEdge => TriggerKind::FallingEdge,
            TriggerConfig::Deadband { .. } => TriggerKind::Deadband,
            TriggerConfig::InBand { .. } => TriggerKind::InBand,
            TriggerConfig::OutBand { .. } => TriggerKind::OutBand,
            TriggerConfig::HighLimit { .. } => TriggerKind::HighLimit,
            TriggerConfig::LowLimit { .. } => TriggerKind::LowLimit,
            TriggerConfig::Time { .. } => TriggerKind::Time,
        }
    }

    /// Level an edge kind latches on.
    fn edge_level(&self) -> Option<f64> {
        match self {
            TriggerConfig::RisingEdge => Some(1.0),
            TriggerConfig::FallingEdge => Some(0.0),
            _ => None,
        }
    }
}

/// Edge-trigger latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Latch {
    #[default]
    Armed,
    Latched,
}

/// Trigger bookkeeping mutated by [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerState {
    pub latch: Latch,
    /// Instant of the last firing (or of registry load)
    pub last_fired_at: Instant,
}

impl TriggerState {
    pub fn new(now: Instant) -> Self {
        Self {
            latch: Latch::Armed,
            last_fired_at: now,
        }
    }
}

/// Decide whether `current` should be persisted.
///
/// `previous` is the value seen at the end of the last completed cycle, or
/// None on the first sample. On a firing decision `state.last_fired_at`
/// becomes `now`.
pub fn evaluate(
    config: &TriggerConfig,
    current: &TagValue,
    previous: Option<&TagValue>,
    state: &mut TriggerState,
    force_fire: bool,
    now: Instant,
) -> bool {
    let fire = if force_fire {
        if let Some(level) = config.edge_level() {
            state.latch = if current.is_level(level) {
                Latch::Latched
            } else {
                Latch::Armed
            };
        }
        true
    } else {
        decide(config, current, previous, state, now)
    };

    if fire {
        state.last_fired_at = now;
    }
    fire
}

fn decide(
    config: &TriggerConfig,
    current: &TagValue,
    previous: Option<&TagValue>,
    state: &mut TriggerState,
    now: Instant,
) -> bool {
    match config {
        TriggerConfig::ValueChange => previous != Some(current),
        TriggerConfig::RisingEdge | TriggerConfig::FallingEdge => {
            let at_level = config.edge_level().is_some_and(|level| current.is_level(level));
            match (state.latch, at_level) {
                (Latch::Armed, true) => {
                    state.latch = Latch::Latched;
                    true
                }
                (_, false) => {
                    state.latch = Latch::Armed;
                    false
                }
                (Latch::Latched, true) => false,
            }
        }
        TriggerConfig::Time { interval } => now.saturating_duration_since(state.last_fired_at) >= *interval,
        numeric => {
            let Some(cur) = current.as_number() else {
                debug!(kind = %numeric.kind(), value = %current, "Text value ignored by numeric trigger");
                return false;
            };
            match numeric {
                TriggerConfig::Deadband { fraction } => match previous {
                    None => true,
                    Some(prev) => match prev.as_number() {
                        Some(prev) => outside_deadband(prev, cur, *fraction),
                        None => false,
                    },
                },
                TriggerConfig::InBand { low, high } => *low <= cur && cur <= *high,
                TriggerConfig::OutBand { low, high } => !(*low <= cur && cur <= *high),
                TriggerConfig::HighLimit { threshold } => cur >= *threshold,
                TriggerConfig::LowLimit { threshold } => cur <= *threshold,
                _ => false,
            }
        }
    }
}

fn outside_deadband(prev: f64, cur: f64, fraction: f64) -> bool {
    if prev == 0.0 {
        return cur != 0.0;
    }
    ((cur - prev) / prev).abs() > fraction
}
