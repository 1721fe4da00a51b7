//! CLI entry point for meteread.
//!
//! ```bash
//! meteread read electricity          # run a configured meter
//! meteread --config my.toml meters   # list configured meters
//! ```
//!
//! The process exits non-zero on any failure and is meant to be restarted by a
//! supervisor (systemd, docker, ...). Nothing is retried here.

use anyhow::Result;
use clap::{Parser, Subcommand};
use meteread::config::{Settings, DEFAULT_CONFIG_PATH};
use meteread::error::MeterError;
use meteread::logging;
use meteread::meter::MeterRegistry;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "meteread")]
#[command(about = "Smart-meter telemetry collector", long_about = None)]
struct Cli {
    /// Configuration file (optional; built-in meters are used without it)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a configured meter until it stops or fails
    Read {
        /// Meter name, e.g. `electricity`
        meter: String,
    },

    /// Edit the configuration (reserved)
    Config,

    /// List configured meters
    Meters,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e
                .downcast_ref::<MeterError>()
                .map(|m| format!("{:?}", m.kind()))
                .unwrap_or_else(|| "Unknown".to_string());
            error!(kind = %kind, "{e:#}");
            eprintln!("meteread: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load_from(&cli.config)?;
    logging::init_from_settings(&settings)?;
    let registry = MeterRegistry::new(settings)?;

    match cli.command {
        Commands::Read { meter } => {
            let mut meter = registry.build(&meter)?;
            info!(meter = meter.name(), config = %cli.config.display(), "starting");
            meter.run()?;
            Ok(())
        }
        Commands::Config => Err(MeterError::NotImplemented("config").into()),
        Commands::Meters => {
            for name in registry.names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}
