//! Runtime configuration types for the fusion core.
//!
//! These are the structs actually consulted by `FusionContext` and the
//! individual pipeline stages. They are distinct from the TOML-deserialized
//! config in `depth_config`; `depth_config::Config` is converted into these
//! via the `From` impls in `conversions`.

/// Gating and geometry thresholds for the fusion engine (§4.1) and
/// confidence model (§4.10).
#[derive(Debug, Clone)]
pub struct FusionCfg {
    /// Hard zero cutoff for the neural source (soft compression boundary is
    /// fixed at 150 m per the resolved open question; this is the
    /// configurable hard zero).
    pub neural_hard_cap_m: f64,
    pub min_lidar_m: f64,
    pub max_lidar_m: f64,
    pub min_geometric_m: f64,
    pub max_geometric_m: f64,
    pub min_dem_m: f64,
    pub max_dem_m: f64,
    pub min_object_m: f64,
    /// Minimum DEM weight for the DEM-primary short-circuit (§4.1 step 2).
    pub dem_primary_weight_floor: f64,
    /// Minimum object weight that blocks the DEM-primary short-circuit.
    pub object_block_weight: f64,
    /// Ratio threshold for outlier rejection among ≥3 contributors (§4.1 step 4).
    pub outlier_ratio_threshold: f64,
    /// Floor applied to all non-zero confidence outputs.
    pub confidence_floor: f64,
}

impl Default for FusionCfg {
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

/// Selector-specific thresholds (§4.2).
#[derive(Debug, Clone)]
pub struct SelectorCfg {
    pub object_primary_weight_threshold: f64,
    /// DEM short-circuit weight threshold relaxes to this when bimodal
    /// analysis reports `dem_agrees_with_far`.
    pub dem_relaxed_weight_threshold: f64,
    /// Foreground occluder near-peak cutoff, in meters.
    pub occluder_near_peak_m: f64,
}

impl Default for SelectorCfg {
    fn default() -> Self {
        Self {
            object_primary_weight_threshold: 0.3,
            dem_relaxed_weight_threshold: 0.01,
            occluder_near_peak_m: 12.0,
        }
    }
}

/// Continuous calibrator configuration (§4.3).
#[derive(Debug, Clone)]
pub struct CalibratorCfg {
    /// Ring buffer capacity for accepted samples.
    pub max_samples: usize,
    /// Minimum samples before a non-identity model is fit.
    pub min_samples_for_fit: usize,
    /// Refit cadence: fit runs every N accepted samples.
    pub refit_every_n: usize,
    /// Minimum sample confidence accepted into the ring.
    pub min_sample_confidence: f64,
    /// Seconds to decay confidence toward `min_confidence_floor`.
    pub confidence_decay_seconds: f64,
    pub min_confidence_floor: f64,
}

impl Default for CalibratorCfg {
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

/// Terrain ray-cast gating thresholds consumed directly by the core (the
/// ray-cast itself runs in `depth_terrain`; these mirror the configuration
/// surface so the core's confidence model and selector stay self-contained).
#[derive(Debug, Clone)]
pub struct DemCfg {
    pub ray_step_m: f64,
    pub max_ray_m: f64,
    pub bisection_iters: u32,
    pub rate_limit_s: f64,
    pub tile_cache_capacity: usize,
}

impl Default for DemCfg {
    fn default() -> Self {
        Self {
            ray_step_m: 30.0,
            max_ray_m: 2000.0,
            bisection_iters: 5,
            rate_limit_s: 0.5,
            tile_cache_capacity: 16,
        }
    }
}

/// Kalman filter tuning (§4.7).
#[derive(Debug, Clone)]
pub struct KalmanCfg {
    pub base_q: f64,
    pub base_r: f64,
    /// Process-noise multipliers per motion state (stationary, tracking, panning).
    pub q_motion_scale: (f64, f64, f64),
    /// Time gap beyond which the filter resets instead of predicting.
    pub max_gap_s: f64,
}

impl Default for KalmanCfg {
    fn default() -> Self {
        Self {
            base_q: 0.05,
            base_r: 1.0,
            q_motion_scale: (0.05, 1.0, 4.0),
            max_gap_s: 1.0,
        }
    }
}

/// Motion-aware smoother tuning (§4.7).
#[derive(Debug, Clone)]
pub struct SmootherCfg {
    pub alpha_floor: f64,
    pub alpha_panning: f64,
    pub discontinuity_ring_len: usize,
    /// (distance_m, fraction) pairs, ascending by distance; the
    /// discontinuity fraction threshold is the value for the highest
    /// breakpoint not exceeding the current distance (the bimodal
    /// discontinuity schedule, tabulated per the resolved open question
    /// rather than hard-coded).
    pub discontinuity_thresholds: Vec<(f64, f64)>,
}

impl Default for SmootherCfg {
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

/// Motion/attitude gate thresholds (§4.8). Exact values are an open
/// question in the source material; any monotone two-threshold classifier
/// is conformant.
#[derive(Debug, Clone, Copy)]
pub struct MotionCfg {
    pub theta_stationary_rad_s: f64,
    pub theta_panning_rad_s: f64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            theta_stationary_rad_s: 0.05,
            theta_panning_rad_s: 0.5,
        }
    }
}

/// Cosine correction deadband (§4.9).
#[derive(Debug, Clone, Copy)]
pub struct CosineCfg {
    pub deadband_rad: f64,
}

impl Default for CosineCfg {
    fn default() -> Self {
        Self {
            deadband_rad: 2.0_f64.to_radians(),
        }
    }
}

/// Bimodal analyzer tuning (§4.6).
#[derive(Debug, Clone)]
pub struct BimodalCfg {
    pub min_fraction: f64,
    pub min_ratio: f64,
    pub histogram_min_m: f64,
    pub histogram_max_m: f64,
    pub histogram_bins: usize,
    pub dem_agreement_ratio: f64,
    /// Fraction of the dense depth map's width/height, centered on the
    /// crosshair, sampled by `bimodal::sample_roi`.
    pub roi_fraction: f64,
    /// Row/column stride when walking the ROI; 1 samples every pixel.
    pub roi_stride: usize,
}

impl Default for BimodalCfg {
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

/// Outlier buffer configuration (§4.12).
#[derive(Debug, Clone, Copy)]
pub struct OutlierCfg {
    pub ring_capacity: usize,
}

impl Default for OutlierCfg {
    fn default() -> Self {
        Self { ring_capacity: 8 }
    }
}

/// Default camera / operator parameters (§6).
#[derive(Debug, Clone, Copy)]
pub struct DeviceCfg {
    pub default_camera_height_m: f64,
    pub default_target_priority: super::types::TargetPriority,
}

impl Default for DeviceCfg {
    fn default() -> Self {
        Self {
            default_camera_height_m: 1.5,
            default_target_priority: super::types::TargetPriority::Far,
        }
    }
}

/// Aggregate runtime configuration consumed by `FusionContext`.
#[derive(Debug, Clone, Default)]
pub struct FusionConfig {
    pub fusion: FusionCfg,
    pub selector: SelectorCfg,
    pub calibrator: CalibratorCfg,
    pub dem: DemCfg,
    pub kalman: KalmanCfg,
    pub smoother: SmootherCfg,
    pub motion: MotionCfg,
    pub cosine: CosineCfg,
    pub bimodal: BimodalCfg,
    pub outlier: OutlierCfg,
    pub device: DeviceCfg,
}
