//! Error types for the acquisition service.
//!
//! Row-level faults (`RecordError::DataQuality`, non-connectivity store
//! errors) are handled inside a poll cycle. Everything that reaches
//! `SessionError` ends the session and is retried by the supervisor.

use crate::trigger::TriggerKind;
use plc2sql_db::DbError;
use thiserror::Error;

/// Invalid trigger configuration on a tag row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriggerConfigError {
    #[error("unknown trigger kind code {0}")]
    UnknownKind(i64),

    #[error("{kind} expects {expected} parameter(s), got {found}")]
    Arity {
        kind: TriggerKind,
        expected: usize,
        found: usize,
    },

    #[error("{kind} parameter '{value}' is not a finite number")]
    NonNumeric { kind: TriggerKind, value: String },

    #[error("band low {low} is greater than high {high}")]
    InvertedBand { low: f64, high: f64 },

    #[error("deadband {0} is negative")]
    NegativeDeadband(f64),

    #[error("time interval {0}s must be positive")]
    InvalidInterval(f64),
}

/// Failure to build the tag registry.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read tag definitions: {0}")]
    Store(#[from] DbError),

    #[error("tag {tag_id} ({address}): {source}")]
    Trigger {
        tag_id: i64,
        address: String,
        #[source]
        source: TriggerConfigError,
    },
}

/// Data source adapter failure. Both variants end the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("batch read failed: {0}")]
    Read(String),
}

impl SourceError {
    pub fn read(reason: impl Into<String>) -> Self {
        Self::Read(reason.into())
    }
}

/// Failure to persist one fired reading.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("data quality not good: {0}")]
    DataQuality(String),

    #[error(transparent)]
    Store(#[from] DbError),
}

impl RecordError {
    /// Only a lost store ends the session; everything else skips the row.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            RecordError::Store(err) => err.is_connectivity(),
            RecordError::DataQuality(_) => false,
        }
    }
}

/// Alert delivery failure. Logged, never fatal.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reason an acquisition session ended.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("store unreachable: {0}")]
    StoreUnreachable(DbError),
}
