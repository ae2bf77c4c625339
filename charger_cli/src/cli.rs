//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "charger", version, about = "SOC-profiled battery charger")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/charger.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins if set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the configured battery profiles
    Profiles,
    /// Print the derived parameters of one profile
    Show {
        /// Profile name
        #[arg(long)]
        battery: String,
        /// Capacity in Ah (overrides or fills in the stored value)
        #[arg(long, value_name = "AH")]
        capacity: Option<f32>,
    },
    /// Charge a battery until the profile's completion threshold is reached
    Charge {
        /// Profile name
        #[arg(long)]
        battery: String,
        /// Capacity in Ah (overrides or fills in the stored value)
        #[arg(long, value_name = "AH")]
        capacity: Option<f32>,
        /// Stream samples to this CSV file (t_ms,voltage_v,current_a,soc)
        #[arg(long, value_name = "FILE")]
        telemetry: Option<PathBuf>,
        /// Override charge.max_run_s; 0 disables the cap
        #[arg(long, value_name = "SECONDS")]
        max_run_s: Option<u64>,
    },
    /// Open the supply, switch the output off, read it back and close
    SelfCheck,
}
