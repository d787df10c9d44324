//! PLC2SQL command-line entry point
//!
//! - `run`: acquisition loop under the recovery supervisor
//! - `export` / `import`: CSV transfer of the tag configuration
//! - `check`: validate config and tag trigger parameters

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plc2sql::config::DEFAULT_CONFIG_FILE;
use plc2sql_logging::{init_console_logging, init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "plc2sql", version, about = "Trigger-driven PLC tag acquisition into SQLite")]
struct Cli {
    /// Configuration file
    #[arg(short = 'c', long, global = true, env = "PLC2SQL_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Print every persisted reading and debug logs to the console
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start acquisition (Ctrl-C to stop)
    Run,

    /// Write tag types, equipment and tags to a CSV file
    Export {
        /// Destination CSV file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Load tag types, equipment and tags from a CSV file
    Import {
        /// Source CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Clear the tag configuration tables before loading
        #[arg(long)]
        replace: bool,
    },

    /// Validate the configuration and every tag's trigger parameters
    Check,
}

async fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run => cli::run::run(&cli.config, cli.verbose).await,
        Commands::Export { out } => cli::transfer::export(&cli.config, &out).await,
        Commands::Import { file, replace } => cli::transfer::import(&cli.config, &file, replace).await,
        Commands::Check => cli::check::run(&cli.config).await,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "plc2sql",
        verbose: cli.verbose,
        log_dir: None,
    }) {
        eprintln!("Warning: file logging disabled: {:#}", err);
        let _ = init_console_logging(cli.verbose);
    }

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
        .and_then(|runtime| runtime.block_on(run_command(cli)));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            ExitCode::from(1)
        }
    }
}
