//! Tracing setup for the PLC2SQL binary.
//!
//! Events go to stderr and to a size-rolled file under `<home>/logs`, where
//! home is `PLC2SQL_HOME` or `~/.plc2sql`. `RUST_LOG` overrides the default
//! filter for both outputs.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "plc2sql=info,plc2sql_db=info";
const VERBOSE_CONSOLE_FILTER: &str = "plc2sql=debug,plc2sql_db=info";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging options chosen on the command line.
pub struct LogConfig<'a> {
    /// Base name of the log file (`<app_name>.log`)
    pub app_name: &'a str,
    /// Raise the console filter to debug for the service crate
    pub verbose: bool,
    /// Write log files here instead of `<home>/logs`
    pub log_dir: Option<PathBuf>,
}

/// Install the global subscriber. Fails if the log directory is unusable.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = match config.log_dir {
        Some(dir) => dir,
        None => logs_dir(),
    };
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create logs directory: {}", log_dir.display()))?;

    let file_writer = RollingWriter::open(&log_dir, config.app_name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
        .with_context(|| format!("Failed to open log file for {}", config.app_name))?;

    let env_filter = std::env::var("RUST_LOG").ok().filter(|s| !s.trim().is_empty());
    let file_filter = match &env_filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::new(DEFAULT_LOG_FILTER),
    };
    let console_filter = match (&env_filter, config.verbose) {
        (Some(directives), _) => EnvFilter::new(directives),
        (None, true) => EnvFilter::new(VERBOSE_CONSOLE_FILTER),
        (None, false) => EnvFilter::new(DEFAULT_LOG_FILTER),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(())
}

/// Stderr-only fallback for when the log directory cannot be used.
pub fn init_console_logging(verbose: bool) -> Result<()> {
    let filter = match std::env::var("RUST_LOG").ok().filter(|s| !s.trim().is_empty()) {
        Some(directives) => EnvFilter::new(directives),
        None if verbose => EnvFilter::new(VERBOSE_CONSOLE_FILTER),
        None => EnvFilter::new(DEFAULT_LOG_FILTER),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;
    Ok(())
}

/// PLC2SQL home directory: `PLC2SQL_HOME`, else `~/.plc2sql`, else `./.plc2sql`
pub fn plc2sql_home() -> PathBuf {
    if let Some(override_path) = std::env::var_os("PLC2SQL_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".plc2sql")
}

/// Default logs directory: `<home>/logs`
pub fn logs_dir() -> PathBuf {
    plc2sql_home().join("logs")
}

/// Append-only log file that shifts `name.log` to `name.log.1`, `.1` to `.2`
/// and so on once it would exceed `max_size`. At most `max_files` files exist.
struct RollingFile {
    dir: PathBuf,
    stem: String,
    max_files: usize,
    max_size: u64,
    file: Option<File>,
    size: u64,
}

impl RollingFile {
    fn open(dir: &Path, name: &str, max_files: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut rolling = Self {
            dir: dir.to_path_buf(),
            stem: file_stem(name),
            max_files: max_files.max(1),
            max_size,
            file: None,
            size: 0,
        };
        rolling.reopen()?;
        if rolling.size > rolling.max_size {
            rolling.roll()?;
        }
        Ok(rolling)
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.stem))
    }

    fn archived_path(&self, generation: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.stem, generation))
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.active_path())?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn roll(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        let oldest = self.max_files - 1;
        if oldest > 0 {
            let _ = fs::remove_file(self.archived_path(oldest));
            for generation in (1..oldest).rev() {
                let from = self.archived_path(generation);
                if from.exists() {
                    fs::rename(&from, self.archived_path(generation + 1))?;
                }
            }
            fs::rename(self.active_path(), self.archived_path(1))?;
        } else {
            // single-file mode: truncate in place
            File::create(self.active_path())?;
        }

        self.reopen()
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_size {
            self.roll()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let written = file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// `MakeWriter` handing every event a handle to the shared rolling file.
#[derive(Clone)]
struct RollingWriter {
    inner: Arc<Mutex<RollingFile>>,
}

impl RollingWriter {
    fn open(dir: &Path, name: &str, max_files: usize, max_size: u64) -> io::Result<Self> {
        let file = RollingFile::open(dir, name, max_files, max_size)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut RollingFile) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        f(&mut file)
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RollingWriter {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    if stem.is_empty() {
        "plc2sql".to_string()
    } else {
        stem
    }
}
