#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
//! TOML-facing configuration surface for the depth fusion core (§6).
//!
//! `depth_core` never parses TOML directly; it consumes the plain runtime
//! structs in `depth_core::config`, reached via the `From` bridges in
//! `depth_core::conversions`. This crate owns everything that touches a
//! file: parsing, validation, and the atomic persisted-calibration writer.

use std::fs;
use std::io::Write as _;
use std::path::Path;

use eyre::{bail, Result, WrapErr};
use serde::{Deserialize, Serialize};

/// Operator preference governing bimodal-peak selection and foreground
/// occluder handling; mirrors `depth_core::types::TargetPriority` without a
/// crate dependency back toward `depth_core`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPriority {
    Near,
    #[default]
    Far,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionToml {
    pub neural_hard_cap_m: f64,
    pub min_lidar_m: f64,
    pub max_lidar_m: f64,
    pub min_geometric_m: f64,
    pub max_geometric_m: f64,
    pub min_dem_m: f64,
    pub max_dem_m: f64,
    pub min_object_m: f64,
    pub dem_primary_weight_floor: f64,
    pub object_block_weight: f64,
    pub outlier_ratio_threshold: f64,
    pub confidence_floor: f64,
}

impl Default for FusionToml {
    fn default() -> Self {
        Self {
            neural_hard_cap_m: 150.0,
            min_lidar_m: 0.3,
            max_lidar_m: 10.0,
            min_geometric_m: 5.0,
            max_geometric_m: 800.0,
            min_dem_m: 20.0,
            max_dem_m: 2000.0,
            min_object_m: 0.5,
            dem_primary_weight_floor: 0.15,
            object_block_weight: 0.05,
            outlier_ratio_threshold: 2.0,
            confidence_floor: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorToml {
    pub object_primary_weight_threshold: f64,
    pub dem_relaxed_weight_threshold: f64,
    pub occluder_near_peak_m: f64,
}

impl Default for SelectorToml {
    fn default() -> Self {
        Self {
            object_primary_weight_threshold: 0.3,
            dem_relaxed_weight_threshold: 0.01,
            occluder_near_peak_m: 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibratorToml {
    pub max_samples: usize,
    pub min_samples_for_fit: usize,
    pub refit_every_n: usize,
    pub min_sample_confidence: f64,
    pub confidence_decay_seconds: f64,
    pub min_confidence_floor: f64,
}

impl Default for CalibratorToml {
    fn default() -> Self {
        Self {
            max_samples: 120,
            min_samples_for_fit: 8,
            refit_every_n: 4,
            min_sample_confidence: 0.3,
            confidence_decay_seconds: 240.0,
            min_confidence_floor: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemToml {
    pub ray_step_m: f64,
    pub max_ray_m: f64,
    pub bisection_iters: u32,
    pub rate_limit_s: f64,
    pub tile_cache_capacity: usize,
    /// Base URL for the online point-query elevation client, when tiles are
    /// not pre-seeded on disk.
    pub online_base_url: Option<String>,
    pub tile_directory: Option<String>,
}

impl Default for DemToml {
    fn default() -> Self {
        Self {
            ray_step_m: 30.0,
            max_ray_m: 2000.0,
            bisection_iters: 5,
            rate_limit_s: 0.5,
            tile_cache_capacity: 16,
            online_base_url: None,
            tile_directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanToml {
    pub base_q: f64,
    pub base_r: f64,
    pub q_motion_scale_stationary: f64,
    pub q_motion_scale_tracking: f64,
    pub q_motion_scale_panning: f64,
    pub max_gap_s: f64,
}

impl Default for KalmanToml {
    fn default() -> Self {
        Self {
            base_q: 0.05,
            base_r: 1.0,
            q_motion_scale_stationary: 0.05,
            q_motion_scale_tracking: 1.0,
            q_motion_scale_panning: 4.0,
            max_gap_s: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherToml {
    pub alpha_floor: f64,
    pub alpha_panning: f64,
    pub discontinuity_ring_len: usize,
    /// (distance_m, fraction) breakpoints, ascending by distance.
    pub discontinuity_thresholds: Vec<(f64, f64)>,
}

impl Default for SmootherToml {
    fn default() -> Self {
        Self {
            alpha_floor: 0.02,
            alpha_panning: 0.6,
            discontinuity_ring_len: 4,
            discontinuity_thresholds: vec![
                (0.0, 0.30),
                (50.0, 0.36),
                (100.0, 0.45),
                (150.0, 0.60),
                (200.0, 0.75),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionToml {
    pub theta_stationary_rad_s: f64,
    pub theta_panning_rad_s: f64,
}

impl Default for MotionToml {
    fn default() -> Self {
        Self {
            theta_stationary_rad_s: 0.05,
            theta_panning_rad_s: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CosineToml {
    pub deadband_rad: f64,
}

impl Default for CosineToml {
    fn default() -> Self {
        Self {
            deadband_rad: 2.0_f64.to_radians(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BimodalToml {
    pub min_fraction: f64,
    pub min_ratio: f64,
    pub histogram_min_m: f64,
    pub histogram_max_m: f64,
    pub histogram_bins: usize,
    pub dem_agreement_ratio: f64,
    pub roi_fraction: f64,
    pub roi_stride: usize,
}

impl Default for BimodalToml {
    fn default() -> Self {
        Self {
            min_fraction: 0.10,
            min_ratio: 2.0,
            histogram_min_m: 1.0,
            histogram_max_m: 2000.0,
            histogram_bins: 64,
            dem_agreement_ratio: 1.5,
            roi_fraction: 0.2,
            roi_stride: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierToml {
    pub ring_capacity: usize,
}

impl Default for OutlierToml {
    fn default() -> Self {
        Self { ring_capacity: 8 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceToml {
    pub default_camera_height_m: f64,
    pub default_target_priority: TargetPriority,
}

impl Default for DeviceToml {
    fn default() -> Self {
        Self {
            default_camera_height_m: 1.5,
            default_target_priority: TargetPriority::Far,
        }
    }
}

/// Console/file logging knobs, consulted only by the CLI entrypoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingToml {
    /// Optional log file path; when set, logs are additionally written
    /// there (non-blocking) alongside the console.
    pub file: Option<String>,
    /// Rotation policy for the file sink: "daily", "hourly", or "never".
    pub rotation: Option<String>,
}

/// Top-level configuration document, one section per pipeline stage.
/// Every field carries a default, so a caller may supply an empty or
/// partial TOML document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fusion: FusionToml,
    pub selector: SelectorToml,
    pub calibrator: CalibratorToml,
    pub dem: DemToml,
    pub kalman: KalmanToml,
    pub smoother: SmootherToml,
    pub motion: MotionToml,
    pub cosine: CosineToml,
    pub bimodal: BimodalToml,
    pub outlier: OutlierToml,
    pub device: DeviceToml,
    pub logging: LoggingToml,
}

impl Config {
    /// Reject configurations that would make the pipeline misbehave: NaN or
    /// inverted ranges, zero-length windows, and the like. Unlike the
    /// gating/confidence math itself, these are hard failures raised to the
    /// caller at load time rather than absorbed by clamping.
    pub fn validate(&self) -> Result<()> {
        let f = &self.fusion;
        if !f.neural_hard_cap_m.is_finite() || f.neural_hard_cap_m <= 0.0 {
            bail!("fusion.neural_hard_cap_m must be finite and > 0");
        }
        if f.min_lidar_m < 0.0 || f.max_lidar_m <= f.min_lidar_m {
            bail!("fusion.max_lidar_m must exceed fusion.min_lidar_m");
        }
        if f.min_geometric_m < 0.0 || f.max_geometric_m <= f.min_geometric_m {
            bail!("fusion.max_geometric_m must exceed fusion.min_geometric_m");
        }
        if f.min_dem_m < 0.0 || f.max_dem_m <= f.min_dem_m {
            bail!("fusion.max_dem_m must exceed fusion.min_dem_m");
        }
        if !(0.0..=1.0).contains(&f.dem_primary_weight_floor) {
            bail!("fusion.dem_primary_weight_floor must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&f.confidence_floor) {
            bail!("fusion.confidence_floor must be in [0, 1]");
        }
        if f.outlier_ratio_threshold <= 1.0 {
            bail!("fusion.outlier_ratio_threshold must be > 1.0");
        }

        let c = &self.calibrator;
        if c.max_samples == 0 {
            bail!("calibrator.max_samples must be > 0");
        }
        if c.min_samples_for_fit == 0 || c.min_samples_for_fit > c.max_samples {
            bail!("calibrator.min_samples_for_fit must be in (0, max_samples]");
        }
        if c.refit_every_n == 0 {
            bail!("calibrator.refit_every_n must be > 0");
        }
        if !(0.0..=1.0).contains(&c.min_sample_confidence) {
            bail!("calibrator.min_sample_confidence must be in [0, 1]");
        }
        if c.confidence_decay_seconds <= 0.0 {
            bail!("calibrator.confidence_decay_seconds must be > 0");
        }

        let d = &self.dem;
        if d.ray_step_m <= 0.0 {
            bail!("dem.ray_step_m must be > 0");
        }
        if d.max_ray_m <= d.ray_step_m {
            bail!("dem.max_ray_m must exceed dem.ray_step_m");
        }
        if d.bisection_iters == 0 {
            bail!("dem.bisection_iters must be > 0");
        }
        if d.rate_limit_s < 0.0 {
            bail!("dem.rate_limit_s must be >= 0");
        }
        if d.tile_cache_capacity == 0 {
            bail!("dem.tile_cache_capacity must be > 0");
        }

        let k = &self.kalman;
        if k.base_q <= 0.0 || k.base_r <= 0.0 {
            bail!("kalman.base_q and kalman.base_r must be > 0");
        }
        if k.max_gap_s <= 0.0 {
            bail!("kalman.max_gap_s must be > 0");
        }

        let s = &self.smoother;
        if !(0.0..=1.0).contains(&s.alpha_floor) || !(0.0..=1.0).contains(&s.alpha_panning) {
            bail!("smoother alpha values must be in [0, 1]");
        }
        if s.discontinuity_thresholds.is_empty() {
            bail!("smoother.discontinuity_thresholds must not be empty");
        }
        for w in s.discontinuity_thresholds.windows(2) {
            if w[1].0 <= w[0].0 {
                bail!("smoother.discontinuity_thresholds must be strictly ascending by distance");
            }
        }

        let b = &self.bimodal;
        if b.histogram_bins < 2 {
            bail!("bimodal.histogram_bins must be >= 2");
        }
        if b.histogram_max_m <= b.histogram_min_m {
            bail!("bimodal.histogram_max_m must exceed bimodal.histogram_min_m");
        }
        if !(0.0..=1.0).contains(&b.min_fraction) {
            bail!("bimodal.min_fraction must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&b.roi_fraction) || b.roi_fraction <= 0.0 {
            bail!("bimodal.roi_fraction must be in (0, 1]");
        }
        if b.roi_stride == 0 {
            bail!("bimodal.roi_stride must be > 0");
        }

        if self.outlier.ring_capacity == 0 {
            bail!("outlier.ring_capacity must be > 0");
        }
        if self.device.default_camera_height_m <= 0.0 {
            bail!("device.default_camera_height_m must be > 0");
        }

        Ok(())
    }
}

/// Load and validate a configuration document from a TOML file.
pub fn load_toml(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).wrap_err_with(|| format!("reading config file {}", path.display()))?;
    let cfg: Config = toml::from_str(&text).wrap_err_with(|| format!("parsing config file {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Online model family fit by the continuous calibrator, persisted between
/// runs. Mirrors `depth_core::types::ModelKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistedModelKind {
    Linear,
    Inverse,
}

/// The calibrator's fitted model, persisted to disk so a restart resumes
/// without re-collecting samples from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedCalibration {
    pub model_kind: PersistedModelKind,
    pub a: f64,
    pub b: f64,
    pub sample_count: usize,
}

impl Default for PersistedCalibration {
    fn default() -> Self {
        Self {
            model_kind: PersistedModelKind::Linear,
            a: 1.0,
            b: 0.0,
            sample_count: 0,
        }
    }
}

/// Write bytes to `path` via a temp-file-then-rename so a reader never
/// observes a half-written file.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

/// Persist the calibrator's current fit. Called periodically (not every
/// frame) by the CLI runner.
pub fn save_calibration(path: impl AsRef<Path>, calibration: &PersistedCalibration) -> Result<()> {
    let text = toml::to_string_pretty(calibration).wrap_err("serializing persisted calibration")?;
    write_atomic(path.as_ref(), text.as_bytes())
        .wrap_err_with(|| format!("writing calibration file {}", path.as_ref().display()))
}

/// Load a previously persisted calibration, if the file exists. Returns the
/// identity default when it does not, since a missing file is the expected
/// state on first run.
pub fn load_calibration(path: impl AsRef<Path>) -> Result<PersistedCalibration> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(PersistedCalibration::default());
    }
    let text = fs::read_to_string(path).wrap_err_with(|| format!("reading calibration file {}", path.display()))?;
    toml::from_str(&text).wrap_err_with(|| format!("parsing calibration file {}", path.display()))
}
