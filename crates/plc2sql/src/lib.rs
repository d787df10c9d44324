//! PLC2SQL acquisition service
//!
//! Samples tags from an industrial data source, decides per tag and per sample
//! whether a reading is worth keeping, and writes history, live snapshot and
//! event-interval rows through [`plc2sql_db`].
//!
//! Component stack, leaf first:
//! - [`trigger`]: pure firing decisions over current/previous values
//! - [`registry`]: typed tag definitions and fresh runtime state
//! - [`recorder`]: writes for a fired reading
//! - [`poller`]: one read/evaluate/record cycle at a time
//! - [`supervisor`]: restarts failed sessions with a bounded alert policy

pub mod alert;
pub mod config;
pub mod display;
pub mod error;
pub mod poller;
pub mod recorder;
pub mod registry;
pub mod session;
pub mod source;
pub mod supervisor;
pub mod trigger;
pub mod value;

pub use alert::{AlertChannel, LogAlertChannel, SpoolAlertChannel};
pub use config::{ConfigError, PlcConfig};
pub use error::{AlertError, LoadError, RecordError, SessionError, SourceError, TriggerConfigError};
pub use poller::{ControllerState, CycleReport, PollController};
pub use recorder::{PersistOutcome, StateTransitionStore};
pub use registry::{TagDefinition, TagEntry, TagRegistry, TagRuntimeState};
pub use session::{SessionContext, SessionSettings};
pub use source::{DataSource, SimulatedSource};
pub use supervisor::{RecoverySupervisor, RestartDecision, RestartPolicy, RestartTracker, SupervisorReport};
pub use trigger::{evaluate, Latch, TriggerConfig, TriggerKind, TriggerState};
pub use value::{Quality, Reading, TagValue};
