//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Operator target-priority override, mirrors `depth_config::TargetPriority`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum TargetPriorityArg {
    Near,
    Far,
}

impl From<TargetPriorityArg> for depth_core::types::TargetPriority {
    fn from(v: TargetPriorityArg) -> Self {
        match v {
            TargetPriorityArg::Near => depth_core::types::TargetPriority::Near,
            TargetPriorityArg::Far => depth_core::types::TargetPriority::Far,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "depth_cli", version, about = "Multi-source depth fusion CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/depth_config.toml")]
    pub config: PathBuf,

    /// Path to the persisted calibration TOML (created/updated at runtime)
    #[arg(long, value_name = "FILE", default_value = "etc/calibration.toml")]
    pub calibration: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay recorded per-frame sensor inputs through the fusion pipeline
    Run {
        /// Path to a JSON-lines file of frame records, or "-" for stdin
        #[arg(long, value_name = "FILE", default_value = "-")]
        input: PathBuf,
        /// Override the configured default target priority
        #[arg(long, value_enum)]
        target_priority: Option<TargetPriorityArg>,
        /// Cast DEM terrain rays for frames carrying an `observer` block
        #[arg(long, action = ArgAction::SetTrue)]
        terrain: bool,
        /// Assumed frame rate, used only to flag missed per-frame deadlines in --stats
        #[arg(long, value_name = "HZ", default_value_t = 30)]
        frame_rate_hz: u32,
        /// Persist the calibrator's fit to --calibration every N frames (0 disables)
        #[arg(long, value_name = "N", default_value_t = 200)]
        save_calibration_every: u64,
        /// Print per-frame latency stats on completion
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Quick check that configuration and terrain data sources are usable
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}
