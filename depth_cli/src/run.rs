//! Frame-replay loop: reads recorded per-frame sensor snapshots, drives them
//! through [`depth_core::FusionContext`], and reports the fused distance.

use std::io::{BufRead, Write as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use depth_core::types::DemEstimate;
use depth_core::{FrameInputs, FusionContext, ObjectDetection};
use depth_traits::sources::InverseDepthMap;
use depth_terrain::{ElevationTileStore, Observer, OnlineElevationClient, TerrainRayCaster};
use eyre::{Context as _, Result};

use crate::cli::TargetPriorityArg;

/// One line of the replay input. Mirrors [`FrameInputs`] directly plus an
/// optional `observer` block used to cast a DEM ray when `dem` is absent.
#[derive(Debug, Clone, serde::Deserialize)]
struct FrameRecord {
    timestamp_s: f64,
    #[serde(default)]
    neural_raw: Option<f64>,
    #[serde(default)]
    reference_metric: Option<f64>,
    #[serde(default)]
    reference_confidence: f64,
    #[serde(default)]
    lidar_distance_m: Option<f64>,
    #[serde(default)]
    geometric_distance_m: Option<f64>,
    #[serde(default)]
    terrain_slope_deg: f64,
    #[serde(default)]
    neural_depth_map: Option<InverseDepthMapRecord>,
    #[serde(default)]
    roi_samples: Vec<f64>,
    #[serde(default)]
    detections: Vec<DetectionRecord>,
    #[serde(default)]
    dem: Option<DemEstimate>,
    #[serde(default)]
    observer: Option<ObserverRecord>,
    #[serde(default)]
    pitch_rad: f64,
    #[serde(default)]
    heading_deg: f64,
    #[serde(default)]
    angular_velocity_rad_s: f64,
    #[serde(default)]
    horizontal_gps_accuracy_m: f64,
    #[serde(default)]
    vertical_gps_accuracy_m: f64,
    #[serde(default)]
    heading_accuracy_deg: f64,
    #[serde(default)]
    manual_bracket_m: Option<f64>,
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
struct DetectionRecord {
    distance_m: f64,
    detection_confidence: f64,
}

/// A row-major dense inverse-depth map, as recorded in a replay line.
#[derive(Debug, Clone, serde::Deserialize)]
struct InverseDepthMapRecord {
    width: usize,
    height: usize,
    samples: Vec<f32>,
}

impl From<InverseDepthMapRecord> for InverseDepthMap {
    fn from(r: InverseDepthMapRecord) -> Self {
        InverseDepthMap { width: r.width, height: r.height, samples: r.samples }
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
struct ObserverRecord {
    lat: f64,
    lon: f64,
    altitude_m: f64,
}

/// Wiring for an optional DEM ray-caster used when a record supplies an
/// `observer` block and no precomputed `dem`.
pub struct TerrainWiring {
    caster: TerrainRayCaster,
    runtime: tokio::runtime::Runtime,
}

impl TerrainWiring {
    pub fn build(cfg: &depth_config::Config) -> Result<Self> {
        let tile_directory = cfg.dem.tile_directory.clone().map(std::path::PathBuf::from);
        let tiles = ElevationTileStore::new(tile_directory, cfg.dem.tile_cache_capacity);
        let online = OnlineElevationClient::new(cfg.dem.online_base_url.clone().unwrap_or_default(), 4);
        let caster = TerrainRayCaster::new(tiles, online, cfg.dem.ray_step_m, cfg.dem.max_ray_m, cfg.dem.bisection_iters, cfg.dem.rate_limit_s);
        let runtime = tokio::runtime::Runtime::new().wrap_err("building terrain runtime")?;
        Ok(Self { caster, runtime })
    }

    fn cast(&self, observer: ObserverRecord, record: &FrameRecord) -> Option<DemEstimate> {
        let obs = Observer {
            lat: observer.lat,
            lon: observer.lon,
            altitude_m: observer.altitude_m,
            pitch_rad: record.pitch_rad,
            heading_deg: record.heading_deg,
            horizontal_accuracy_m: record.horizontal_gps_accuracy_m,
            vertical_accuracy_m: record.vertical_gps_accuracy_m,
            heading_accuracy_deg: record.heading_accuracy_deg,
        };
        self.runtime.block_on(self.caster.cast(obs, record.timestamp_s))
    }
}

pub struct RunOptions {
    pub target_priority: Option<TargetPriorityArg>,
    pub json: bool,
    pub stats: bool,
    pub frame_rate_hz: u32,
    pub save_calibration_every: u64,
    pub calibration_path: std::path::PathBuf,
}

pub struct RunSummary {
    pub frames: u64,
    pub latencies_us: Vec<u64>,
    pub missed_deadlines: u64,
    pub stopped_early: bool,
}

/// Run every record in `input` through `ctx`, in order. Returns once the
/// input is exhausted or `shutdown` is observed between frames.
pub fn run_replay(
    ctx: &mut FusionContext,
    input: &std::path::Path,
    terrain: Option<&TerrainWiring>,
    opts: &RunOptions,
    shutdown: Arc<AtomicBool>,
) -> Result<RunSummary> {
    if let Some(priority) = opts.target_priority {
        ctx.set_target_priority(priority.into());
    }

    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(std::io::BufReader::new(std::io::stdin()))
    } else {
        let f = std::fs::File::open(input).wrap_err_with(|| format!("open input {}", input.display()))?;
        Box::new(std::io::BufReader::new(f))
    };

    let period_us = if opts.frame_rate_hz == 0 { 0 } else { 1_000_000 / u64::from(opts.frame_rate_hz) };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut summary = RunSummary { frames: 0, latencies_us: Vec::new(), missed_deadlines: 0, stopped_early: false };

    for (lineno, line) in reader.lines().enumerate() {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!(frames = summary.frames, "run: shutdown requested, stopping");
            summary.stopped_early = true;
            break;
        }
        let line = line.wrap_err("reading input line")?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord = serde_json::from_str(&line).wrap_err_with(|| format!("parsing frame record at line {}", lineno + 1))?;

        let t_start = std::time::Instant::now();

        let dem = match (record.dem, record.observer, terrain) {
            (Some(dem), _, _) => Some(dem),
            (None, Some(observer), Some(wiring)) => wiring.cast(observer, &record),
            (None, _, _) => None,
        };

        let inputs = FrameInputs {
            timestamp_s: record.timestamp_s,
            neural_raw: record.neural_raw,
            reference_metric: record.reference_metric,
            reference_confidence: record.reference_confidence,
            lidar_distance_m: record.lidar_distance_m,
            geometric_distance_m: record.geometric_distance_m,
            terrain_slope_deg: record.terrain_slope_deg,
            neural_depth_map: record.neural_depth_map.map(InverseDepthMap::from),
            roi_samples: record.roi_samples,
            detections: record
                .detections
                .iter()
                .map(|d| ObjectDetection { distance_m: d.distance_m, detection_confidence: d.detection_confidence })
                .collect(),
            dem,
            pitch_rad: record.pitch_rad,
            heading_deg: record.heading_deg,
            angular_velocity_rad_s: record.angular_velocity_rad_s,
            horizontal_gps_accuracy_m: record.horizontal_gps_accuracy_m,
            vertical_gps_accuracy_m: record.vertical_gps_accuracy_m,
            heading_accuracy_deg: record.heading_accuracy_deg,
            manual_bracket_m: record.manual_bracket_m,
        };
        ctx.publish_attitude(inputs.pitch_rad, inputs.heading_deg, inputs.angular_velocity_rad_s, inputs.timestamp_s);

        let report = ctx.process_frame(inputs);

        let latency_us = t_start.elapsed().as_micros() as u64;
        summary.latencies_us.push(latency_us);
        if period_us > 0 && latency_us > period_us {
            summary.missed_deadlines += 1;
        }
        summary.frames += 1;

        if opts.json {
            let obj = serde_json::json!({
                "timestamp_s": report.selected.timestamp_s,
                "distance_m": report.selected.distance_m,
                "confidence_0_1": report.selected.confidence_0_1,
                "uncertainty_m": report.selected.uncertainty_m,
                "primary": format!("{:?}", report.selected.primary),
                "horizontal_distance_m": report.horizontal_distance_m,
                "cosine_factor": report.cosine_factor,
                "kalman_depth_m": report.kalman_depth_m,
                "smoothed_depth_m": report.smoothed_depth_m,
                "is_bimodal": report.bimodal.is_bimodal,
                "calibration_confidence": report.calibration.confidence_0_1,
                "motion_state": format!("{:?}", report.motion.motion_state),
            });
            writeln!(out, "{obj}").ok();
        } else {
            writeln!(
                out,
                "t={:.3} dist={:.2}m conf={:.2} primary={:?} horiz={:.2}m",
                report.selected.timestamp_s, report.selected.distance_m, report.selected.confidence_0_1, report.selected.primary, report.horizontal_distance_m
            )
            .ok();
        }

        if opts.save_calibration_every > 0 && summary.frames % opts.save_calibration_every == 0 {
            persist_calibration(ctx, &opts.calibration_path)?;
        }
    }

    if opts.save_calibration_every > 0 {
        persist_calibration(ctx, &opts.calibration_path)?;
    }

    if opts.stats {
        print_stats(&summary, opts.frame_rate_hz);
    }
    Ok(summary)
}

fn persist_calibration(ctx: &FusionContext, path: &std::path::Path) -> Result<()> {
    let state = ctx.calibration_state();
    let persisted = depth_config::PersistedCalibration {
        model_kind: state.model_kind.into(),
        a: state.a,
        b: state.b,
        sample_count: state.sample_count,
    };
    depth_config::save_calibration(path, &persisted).wrap_err_with(|| format!("saving calibration to {}", path.display()))
}

fn print_stats(summary: &RunSummary, frame_rate_hz: u32) {
    let latencies = &summary.latencies_us;
    if latencies.is_empty() {
        return;
    }
    let min = *latencies.iter().min().unwrap_or(&0);
    let max = *latencies.iter().max().unwrap_or(&0);
    let avg = latencies.iter().sum::<u64>() as f64 / latencies.len() as f64;
    let stdev = if latencies.len() > 1 {
        let var = latencies.iter().map(|&x| (x as f64 - avg).powi(2)).sum::<f64>() / (latencies.len() as f64 - 1.0);
        var.sqrt()
    } else {
        0.0
    };
    eprintln!("\n--- Replay Stats ---");
    eprintln!("Frames: {}", summary.frames);
    eprintln!("Assumed frame rate (Hz): {frame_rate_hz}");
    eprintln!("Latency min/avg/max/stdev (us): {min:.0} / {avg:.1} / {max:.0} / {stdev:.1}");
    eprintln!("Missed deadlines (> period): {}", summary.missed_deadlines);
    if summary.stopped_early {
        eprintln!("Stopped early: shutdown requested");
    }
    eprintln!("--------------------\n");
}
