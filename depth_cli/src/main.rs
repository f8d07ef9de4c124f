#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! CLI entrypoint for the depth fusion system.
//!
//! Responsibilities:
//! - Parse config/flags and assemble a `FusionContext`
//! - Initialize tracing and manage log sinks
//! - Replay recorded per-frame sensor inputs through the pipeline, emitting
//!   either human-readable lines or `--json` JSONL
//! - Map domain errors to stable exit codes

mod cli;
mod error_fmt;
mod run;
mod tracing_setup;

use clap::Parser;
use eyre::WrapErr;

use cli::{Cli, Commands, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use run::{RunOptions, TerrainWiring};
use tracing_setup::init_tracing;

fn main() -> eyre::Result<()> {
    let _ = color_eyre::install();

    let shutdown = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let shutdown_clone = std::sync::Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nReceived shutdown signal, stopping gracefully...");
        shutdown_clone.store(true, std::sync::atomic::Ordering::SeqCst);
    }) {
        eprintln!("Warning: Failed to set signal handler: {e}");
    }

    if let Err(e) = real_main(shutdown) {
        let json = *JSON_MODE.get().unwrap_or(&false);
        let code = exit_code_for_error(&e);
        if json {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(code);
    }
    Ok(())
}

fn real_main(shutdown: std::sync::Arc<std::sync::atomic::AtomicBool>) -> eyre::Result<()> {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let cfg = depth_config::load_toml(&cli.config).wrap_err_with(|| format!("load config {:?}", cli.config))?;

    init_tracing(cli.json, &cli.log_level, cfg.logging.file.as_deref(), cfg.logging.rotation.as_deref());

    let fusion_config = depth_core::config::FusionConfig::from(&cfg);

    match cli.cmd {
        Commands::SelfCheck => {
            tracing::info!("self-check starting");
            println!("configuration: OK ({} bytes validated)", std::fs::metadata(&cli.config).map(|m| m.len()).unwrap_or(0));
            if let Some(dir) = &cfg.dem.tile_directory {
                let exists = std::path::Path::new(dir).is_dir();
                println!("{} tile directory: {dir}", if exists { "✓" } else { "✗ missing" });
            } else {
                println!("- no local tile directory configured");
            }
            if let Some(url) = &cfg.dem.online_base_url {
                println!("- online elevation endpoint configured: {url}");
            } else {
                println!("- no online elevation endpoint configured");
            }
            let persisted = depth_config::load_calibration(&cli.calibration).wrap_err("loading calibration")?;
            println!("calibration: {:?}, {} samples", persisted.model_kind, persisted.sample_count);
            Ok(())
        }
        Commands::Health => {
            tracing::info!("health check starting");
            let config_ok = cfg.validate().is_ok();
            let calibration_ok = depth_config::load_calibration(&cli.calibration).is_ok();
            if config_ok {
                println!("✓ Config: valid");
            } else {
                println!("✗ Config: invalid");
            }
            if calibration_ok {
                println!("✓ Calibration file: readable");
            } else {
                println!("✗ Calibration file: unreadable");
            }
            if config_ok && calibration_ok {
                println!("\nHealth check: OK");
                Ok(())
            } else {
                Err(eyre::eyre!("Health check failed"))
            }
        }
        Commands::Run { input, target_priority, terrain, frame_rate_hz, save_calibration_every, stats } => {
            let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0);
            let mut ctx = depth_core::FusionContext::new(fusion_config, now);

            let wiring = if terrain { Some(TerrainWiring::build(&cfg).wrap_err("building terrain ray-caster")?) } else { None };

            let opts = RunOptions {
                target_priority,
                json: cli.json,
                stats,
                frame_rate_hz,
                save_calibration_every,
                calibration_path: cli.calibration.clone(),
            };

            let summary = run::run_replay(&mut ctx, &input, wiring.as_ref(), &opts, shutdown)?;
            tracing::info!(frames = summary.frames, missed = summary.missed_deadlines, "run complete");
            Ok(())
        }
    }
}
