//! Per-frame and persistent value types shared across the fusion pipeline.

use std::collections::HashMap;

/// Which sensor or derivation produced a [`SourceEstimate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SourceTag {
    Lidar,
    Neural,
    Geometric,
    DemRaycast,
    Object,
    Stadiametric,
    SemanticPlaceholder,
}

/// One candidate range estimate contributed by a single source this frame.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SourceEstimate {
    pub distance_m: f64,
    pub weight: f64,
    pub source: SourceTag,
    pub secondary_confidence: f64,
}

impl SourceEstimate {
    pub fn new(distance_m: f64, weight: f64, source: SourceTag, secondary_confidence: f64) -> Self {
        Self {
            distance_m,
            weight: weight.max(0.0),
            source,
            secondary_confidence,
        }
    }

    /// True when the estimate is well-formed: finite, non-negative weight.
    pub fn is_valid(&self) -> bool {
        self.distance_m.is_finite() && self.weight.is_finite() && self.weight >= 0.0
    }
}

/// The fused range report emitted at most once per frame.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FusedDepth {
    pub distance_m: f64,
    pub confidence_0_1: f64,
    pub uncertainty_m: f64,
    pub primary: SourceTag,
    pub contributing_weights: HashMap<SourceTag, f64>,
    pub timestamp_s: f64,
}

impl FusedDepth {
    /// The no-estimate sentinel: confidence 0, distance 0. Distinguished
    /// from a valid (physically impossible) zero-distance result by the
    /// zero confidence.
    pub fn none(timestamp_s: f64) -> Self {
        Self {
            distance_m: 0.0,
            confidence_0_1: 0.0,
            uncertainty_m: 0.0,
            primary: SourceTag::SemanticPlaceholder,
            contributing_weights: HashMap::new(),
            timestamp_s,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.confidence_0_1 > 0.0
    }
}

/// A terrain ray-cast result: immutable once produced, lifetime bounded by
/// the ray-caster's rate-limit cache.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DemEstimate {
    pub distance_m: f64,
    pub confidence_0_1: f64,
    pub terrain_elevation_m: f64,
    pub heading_deg_true_north: f64,
    pub horizontal_gps_accuracy_m: f64,
    pub hit_lat: f64,
    pub hit_lon: f64,
}

/// Online model family fit by the continuous calibrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelKind {
    Linear,
    Inverse,
}

/// The calibrator's current fitted model and its quality metadata.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CalibrationState {
    pub model_kind: ModelKind,
    pub a: f64,
    pub b: f64,
    pub sample_count: usize,
    pub fit_residual: f64,
    pub last_update_time: f64,
    pub confidence_0_1: f64,
}

impl CalibrationState {
    /// The identity state: Linear, a=1, b=0, held until enough samples
    /// have been ingested to fit a real model.
    pub fn identity(now: f64) -> Self {
        Self {
            model_kind: ModelKind::Linear,
            a: 1.0,
            b: 0.0,
            sample_count: 0,
            fit_residual: 0.0,
            last_update_time: now,
            confidence_0_1: 0.3,
        }
    }
}

/// One accepted (neural_raw, reference_metric) pairing fed to the
/// calibrator's fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    pub neural_raw: f64,
    pub reference_metric: f64,
    pub confidence: f64,
    pub timestamp: f64,
}

impl CalibrationSample {
    pub fn is_valid(&self, min_confidence: f64) -> bool {
        self.neural_raw.is_finite()
            && self.reference_metric.is_finite()
            && self.reference_metric > 0.0
            && self.confidence >= min_confidence
    }
}

/// Two-population crosshair-ROI depth histogram summary, recomputed per
/// frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub struct BimodalAnalysis {
    pub is_bimodal: bool,
    pub near_peak_m: f64,
    pub far_peak_m: f64,
    pub near_fraction_0_1: f64,
    pub far_fraction_0_1: f64,
    pub dem_agrees_with_far: bool,
}

/// Coarse motion classification driving Kalman process noise and smoother
/// aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum MotionState {
    #[default]
    Stationary,
    Tracking,
    Panning,
}

/// 2x2 symmetric covariance used by [`KalmanState`].
pub type Covariance2 = nalgebra::SMatrix<f64, 2, 2>;

/// State of the depth/velocity Kalman filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanState {
    pub is_tracking: bool,
    pub depth_m: f64,
    pub velocity_m_per_s: f64,
    pub covariance: Covariance2,
    pub last_update_time: f64,
}

impl KalmanState {
    pub fn uninitialized() -> Self {
        Self {
            is_tracking: false,
            depth_m: 0.0,
            velocity_m_per_s: 0.0,
            covariance: Covariance2::zeros(),
            last_update_time: 0.0,
        }
    }
}

/// State of the motion-aware EMA smoother and its discontinuity ring.
#[derive(Debug, Clone)]
pub struct SmootherState {
    pub is_initialized: bool,
    pub smoothed_depth_m: f64,
    pub discontinuity_ring: std::collections::VecDeque<f64>,
    pub smoothed_confidence_0_1: f64,
}

impl SmootherState {
    pub fn new(ring_capacity: usize) -> Self {
        Self {
            is_initialized: false,
            smoothed_depth_m: 0.0,
            discontinuity_ring: std::collections::VecDeque::with_capacity(ring_capacity),
            smoothed_confidence_0_1: 0.0,
        }
    }
}

/// Operator preference governing bimodal-peak selection and foreground
/// occluder handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum TargetPriority {
    Near,
    #[default]
    Far,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fused_depth_none_is_invalid() {
        let f = FusedDepth::none(12.0);
        assert!(!f.is_valid());
        assert_eq!(f.distance_m, 0.0);
        assert_eq!(f.confidence_0_1, 0.0);
    }

    #[test]
    fn source_estimate_clamps_negative_weight() {
        let e = SourceEstimate::new(10.0, -5.0, SourceTag::Neural, 0.5);
        assert_eq!(e.weight, 0.0);
    }

    #[test]
    fn calibration_identity_is_linear_unity() {
        let c = CalibrationState::identity(0.0);
        assert_eq!(c.model_kind, ModelKind::Linear);
        assert_eq!(c.a, 1.0);
        assert_eq!(c.b, 0.0);
        assert_eq!(c.sample_count, 0);
    }
}
