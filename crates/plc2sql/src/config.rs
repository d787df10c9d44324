//! Service configuration
//!
//! Read from a TOML file (default `plc2sql.toml`). Every section and field is
//! optional; a missing file yields the defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "plc2sql.toml";

/// Error type for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlcConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub alert: AlertConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `sqlite:` connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Simulated,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Seed for the simulated source
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            endpoint: default_endpoint(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
        }
    }
}

impl PollConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecoveryConfig {
    /// Restarts inside the window that trigger an alert and the long delay
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    #[serde(default = "default_escalated_delay_ms")]
    pub escalated_delay_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            window_secs: default_window_secs(),
            restart_delay_ms: default_restart_delay_ms(),
            escalated_delay_ms: default_escalated_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Log,
    Spool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertConfig {
    #[serde(default = "default_alert_kind")]
    pub kind: AlertKind,
    /// Directory the spool channel drops messages into
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_sender")]
    pub sender: String,
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            kind: default_alert_kind(),
            outbox_dir: default_outbox_dir(),
            subject: default_subject(),
            sender: default_sender(),
            recipients: Vec::new(),
        }
    }
}

fn default_database_url() -> String { "sqlite:plc2sql.sqlite3".to_string() }
fn default_source_kind() -> SourceKind { SourceKind::Simulated }
fn default_endpoint() -> String { "localhost".to_string() }
fn default_seed() -> u64 { 7 }
fn default_period_ms() -> u64 { 1000 }
fn default_max_restarts() -> u32 { 3 }
fn default_window_secs() -> u64 { 30 * 60 }
fn default_restart_delay_ms() -> u64 { 1000 }
fn default_escalated_delay_ms() -> u64 { 60_000 }
fn default_alert_kind() -> AlertKind { AlertKind::Log }
fn default_outbox_dir() -> PathBuf { PathBuf::from("alerts") }
fn default_subject() -> String { "PLC2SQL acquisition failure".to_string() }
fn default_sender() -> String { "plc2sql@localhost".to_string() }

impl PlcConfig {
    /// Load and validate a config file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content)?;
        info!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: PlcConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(ConfigError::Invalid(format!(
                "database.url must be a sqlite: URL, got '{}'",
                self.database.url
            )));
        }
        if self.poll.period_ms == 0 {
            return Err(ConfigError::Invalid("poll.period_ms must be > 0".into()));
        }
        if self.recovery.max_restarts == 0 {
            return Err(ConfigError::Invalid("recovery.max_restarts must be > 0".into()));
        }
        if self.recovery.window_secs == 0 {
            return Err(ConfigError::Invalid("recovery.window_secs must be > 0".into()));
        }
        if self.alert.kind == AlertKind::Spool && self.alert.outbox_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "alert.outbox_dir is required for the spool alert channel".into(),
            ));
        }
        Ok(())
    }
}
