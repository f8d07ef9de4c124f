//! The single synchronous per-frame entry point (§5).
//!
//! `FusionContext` owns every stage of the pipeline that carries state across
//! frames: the continuous calibrator, the Kalman filter, the motion-aware
//! smoother, the motion/attitude gate, and the outlier buffer. It exposes one
//! method, [`FusionContext::process_frame`], which takes one frame's raw
//! inputs and returns a [`FrameReport`]. There is no internal concurrency;
//! the caller is responsible for running at most one frame through at a time.

use std::collections::HashMap;

use crate::bimodal::{self, BimodalAnalysis};
use crate::calibrator::ContinuousCalibrator;
use crate::config::FusionConfig;
use crate::confidence;
use crate::cosine;
use crate::fusion;
use crate::kalman::DepthKalman;
use crate::motion::{MotionGate, MotionSnapshot};
use crate::outlier::OutlierBuffer;
use crate::selector;
use crate::smoother::MotionSmoother;
use crate::types::{CalibrationState, DemEstimate, FusedDepth, SourceEstimate, SourceTag, TargetPriority};
use depth_traits::sources::InverseDepthMap;

/// One detection candidate offered to the fusion pool this frame.
#[derive(Debug, Clone, Copy)]
pub struct ObjectDetection {
    pub distance_m: f64,
    pub detection_confidence: f64,
}

/// All raw per-frame inputs `process_frame` needs. Any source may be absent
/// (`None`) for a given frame; an absent source simply contributes nothing to
/// the pool.
#[derive(Debug, Clone)]
pub struct FrameInputs {
    pub timestamp_s: f64,

    /// Raw (uncalibrated) neural monocular depth at the crosshair, if the
    /// model produced one this frame.
    pub neural_raw: Option<f64>,
    /// A simultaneous reference-depth reading used to train the calibrator,
    /// when the reference sensor and the neural model agree on a target.
    pub reference_metric: Option<f64>,
    pub reference_confidence: f64,

    pub lidar_distance_m: Option<f64>,
    pub geometric_distance_m: Option<f64>,
    pub terrain_slope_deg: f64,

    /// The dense neural inverse-depth map for this frame, if the model
    /// produced one. When present, `process_frame` strides its ROI and runs
    /// each sample through the calibrator itself (§4.6); `roi_samples` is
    /// ignored in that case.
    pub neural_depth_map: Option<InverseDepthMap>,

    /// Pre-calibrated crosshair-ROI metric depth samples for the bimodal
    /// analyzer, used only when `neural_depth_map` is absent. Non-finite and
    /// non-positive samples are dropped by the analyzer itself.
    pub roi_samples: Vec<f64>,

    pub detections: Vec<ObjectDetection>,

    pub dem: Option<DemEstimate>,

    pub pitch_rad: f64,
    pub heading_deg: f64,
    pub angular_velocity_rad_s: f64,

    pub horizontal_gps_accuracy_m: f64,
    pub vertical_gps_accuracy_m: f64,
    pub heading_accuracy_deg: f64,

    /// An operator-entered stadiametric bracket, already converted to a
    /// distance by `stadiametric::range`. Always wins the selector ladder
    /// when present.
    pub manual_bracket_m: Option<f64>,
}

/// Everything one call to `process_frame` produced, for display and logging.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub selected: FusedDepth,
    pub background: Option<FusedDepth>,
    pub kalman_depth_m: f64,
    pub smoothed_depth_m: f64,
    pub horizontal_distance_m: f64,
    pub cosine_factor: f64,
    pub motion: MotionSnapshot,
    pub bimodal: BimodalAnalysis,
    pub calibration: CalibrationState,
}

pub struct FusionContext {
    config: FusionConfig,
    calibrator: ContinuousCalibrator,
    kalman: DepthKalman,
    smoother: MotionSmoother,
    motion_gate: MotionGate,
    outlier: OutlierBuffer,
    target_priority: TargetPriority,
}

impl FusionContext {
    pub fn new(config: FusionConfig, now: f64) -> Self {
        let target_priority = config.device.default_target_priority;
        Self {
            calibrator: ContinuousCalibrator::new(config.calibrator.clone(), now),
            kalman: DepthKalman::new(config.kalman.clone()),
            smoother: MotionSmoother::new(config.smoother.clone()),
            motion_gate: MotionGate::new(config.motion),
            outlier: OutlierBuffer::new(config.outlier),
            target_priority,
            config,
        }
    }

    pub fn target_priority(&self) -> TargetPriority {
        self.target_priority
    }

    /// Switch the operator's target priority. Per §4.7/§4.12, any explicit
    /// target-priority change resets the Kalman filter, the smoother, and
    /// the outlier buffer so the new priority isn't fought by stale state.
    pub fn set_target_priority(&mut self, target_priority: TargetPriority) {
        if target_priority == self.target_priority {
            return;
        }
        self.target_priority = target_priority;
        self.reset_tracking();
    }

    /// Clear all cross-frame tracking state (Kalman, smoother, outlier ring)
    /// without touching the calibrator, which tracks a slower-moving
    /// lens/sensor property rather than the current scene.
    pub fn reset_tracking(&mut self) {
        self.kalman.reset();
        self.smoother.reset();
        self.outlier.clear();
    }

    pub fn calibration_state(&self) -> CalibrationState {
        self.calibrator.state()
    }

    /// Publish one attitude sample. Called at the attitude producer's own
    /// rate, independent of `process_frame`.
    pub fn publish_attitude(&self, pitch_rad: f64, heading_deg: f64, angular_velocity_rad_s: f64, timestamp_s: f64) {
        self.motion_gate.publish(pitch_rad, heading_deg, angular_velocity_rad_s, timestamp_s);
    }

    /// Run one frame through the full pipeline: calibration, per-source
    /// confidence, pooling, bimodal analysis, selection, Kalman filtering,
    /// smoothing, outlier suppression, and cosine correction.
    pub fn process_frame(&mut self, inputs: FrameInputs) -> FrameReport {
        let motion = self.motion_gate.snapshot();

        if let (Some(neural_raw), Some(reference_metric)) = (inputs.neural_raw, inputs.reference_metric) {
            self.calibrator.observe(neural_raw, reference_metric, inputs.reference_confidence, inputs.timestamp_s);
        }

        let calibration = self.calibrator.state();
        let calibration_age_s = (inputs.timestamp_s - calibration.last_update_time).max(0.0);
        let calibration_quality = confidence::calibration_quality(
            calibration_age_s,
            calibration.confidence_0_1,
            self.config.calibrator.confidence_decay_seconds,
            self.config.calibrator.min_confidence_floor,
        );

        let pool = self.build_pool(&inputs, motion, calibration_quality);

        let roi_samples = match inputs.neural_depth_map.as_ref() {
            Some(map) => bimodal::sample_roi(map, &self.calibrator, &self.config.bimodal),
            None => inputs.roi_samples.clone(),
        };
        let bimodal = bimodal::analyze(&roi_samples, &self.config.bimodal, inputs.dem.as_ref());

        let manual_bracket = inputs
            .manual_bracket_m
            .map(|d| SourceEstimate::new(d, 1.0, SourceTag::Stadiametric, 0.95));

        let selected = selector::select(
            &pool,
            manual_bracket,
            &bimodal,
            inputs.dem.as_ref(),
            self.target_priority,
            &self.config.fusion,
            &self.config.selector,
            inputs.timestamp_s,
        );

        let kalman_depth_m = if selected.primary.is_valid() {
            self.kalman.update(selected.primary.distance_m, selected.primary.confidence_0_1, motion.motion_state, inputs.timestamp_s)
        } else {
            self.kalman.state().depth_m
        };

        let smoothed_depth_m = self.smoother.update(kalman_depth_m, motion.motion_state, inputs.timestamp_s);

        let mut reported = selected.primary.clone();
        if selected.primary.is_valid() {
            if self.outlier.is_unjustified_jump(smoothed_depth_m, self.config.fusion.outlier_ratio_threshold) {
                tracing::debug!(smoothed_depth_m, "context: suppressing unjustified jump, holding prior report");
                if let Some(mean) = self.outlier.mean_recent_distance() {
                    reported.distance_m = mean;
                }
            } else {
                reported.distance_m = smoothed_depth_m;
            }
            self.outlier.push(reported.clone());
        }

        let (horizontal_distance_m, cosine_factor) = cosine::correct(reported.distance_m, motion.pitch_rad, &self.config.cosine);

        FrameReport {
            selected: reported,
            background: selected.background,
            kalman_depth_m,
            smoothed_depth_m,
            horizontal_distance_m,
            cosine_factor,
            motion,
            bimodal,
            calibration,
        }
    }

    fn build_pool(&self, inputs: &FrameInputs, motion: MotionSnapshot, calibration_quality: f64) -> Vec<SourceEstimate> {
        let mut pool = Vec::with_capacity(4 + inputs.detections.len());

        if let Some(raw) = inputs.neural_raw {
            let calibrated = self.calibrator.calibrate(raw);
            let base = confidence::neural_confidence(calibrated, &self.config.fusion);
            let weight = base * calibration_quality;
            if weight > 0.0 {
                pool.push(SourceEstimate::new(calibrated, weight, SourceTag::Neural, calibration_quality));
            }
        }

        if let Some(distance_m) = inputs.lidar_distance_m {
            let weight = confidence::lidar_confidence(distance_m, &self.config.fusion);
            if weight > 0.0 {
                pool.push(SourceEstimate::new(distance_m, weight, SourceTag::Lidar, weight));
            }
        }

        if let Some(distance_m) = inputs.geometric_distance_m {
            let weight =
                confidence::geometric_confidence(distance_m, motion.pitch_rad, inputs.terrain_slope_deg, &self.config.fusion);
            if weight > 0.0 {
                pool.push(SourceEstimate::new(distance_m, weight, SourceTag::Geometric, weight));
            }
        }

        if let Some(dem) = inputs.dem.as_ref() {
            let weight = confidence::dem_confidence(
                dem.distance_m,
                inputs.horizontal_gps_accuracy_m,
                inputs.vertical_gps_accuracy_m,
                inputs.heading_accuracy_deg,
                &self.config.fusion,
            );
            if weight > 0.0 {
                pool.push(SourceEstimate::new(dem.distance_m, weight, SourceTag::DemRaycast, dem.confidence_0_1));
            }
        }

        for detection in &inputs.detections {
            let weight = confidence::object_confidence(detection.distance_m, detection.detection_confidence, &self.config.fusion);
            if weight > 0.0 {
                pool.push(SourceEstimate::new(
                    detection.distance_m,
                    weight,
                    SourceTag::Object,
                    detection.detection_confidence,
                ));
            }
        }

        pool
    }
}

/// Summarize a [`FrameReport`]'s contributing sources as a plain map, for
/// logging or serialization by callers that don't want the full struct.
pub fn contributing_weights(report: &FrameReport) -> HashMap<SourceTag, f64> {
    report.selected.contributing_weights.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> FusionConfig {
        FusionConfig::default()
    }

    #[test]
    fn first_frame_with_only_lidar_reports_lidar() {
        let mut ctx = FusionContext::new(cfg(), 0.0);
        let report = ctx.process_frame(FrameInputs {
            timestamp_s: 0.0,
            neural_raw: None,
            reference_metric: None,
            reference_confidence: 0.0,
            lidar_distance_m: Some(5.0),
            geometric_distance_m: None,
            terrain_slope_deg: 0.0,
            neural_depth_map: None,
            roi_samples: vec![],
            detections: vec![],
            dem: None,
            pitch_rad: 0.0,
            heading_deg: 0.0,
            angular_velocity_rad_s: 0.0,
            horizontal_gps_accuracy_m: 3.0,
            vertical_gps_accuracy_m: 3.0,
            heading_accuracy_deg: 1.0,
            manual_bracket_m: None,
        });
        assert_eq!(report.selected.primary, SourceTag::Lidar);
        assert!((report.selected.distance_m - 5.0).abs() < 1e-6);
    }

    #[test]
    fn manual_bracket_overrides_every_other_source() {
        let mut ctx = FusionContext::new(cfg(), 0.0);
        let report = ctx.process_frame(FrameInputs {
            timestamp_s: 0.0,
            neural_raw: None,
            reference_metric: None,
            reference_confidence: 0.0,
            lidar_distance_m: Some(5.0),
            geometric_distance_m: None,
            terrain_slope_deg: 0.0,
            neural_depth_map: None,
            roi_samples: vec![],
            detections: vec![],
            dem: None,
            pitch_rad: 0.0,
            heading_deg: 0.0,
            angular_velocity_rad_s: 0.0,
            horizontal_gps_accuracy_m: 3.0,
            vertical_gps_accuracy_m: 3.0,
            heading_accuracy_deg: 1.0,
            manual_bracket_m: Some(250.0),
        });
        assert_eq!(report.selected.primary, SourceTag::Stadiametric);
        assert!((report.selected.distance_m - 250.0).abs() < 1e-6);
    }

    #[test]
    fn target_priority_change_resets_tracking_state() {
        let mut ctx = FusionContext::new(cfg(), 0.0);
        ctx.process_frame(FrameInputs {
            timestamp_s: 0.0,
            neural_raw: None,
            reference_metric: None,
            reference_confidence: 0.0,
            lidar_distance_m: Some(5.0),
            geometric_distance_m: None,
            terrain_slope_deg: 0.0,
            neural_depth_map: None,
            roi_samples: vec![],
            detections: vec![],
            dem: None,
            pitch_rad: 0.0,
            heading_deg: 0.0,
            angular_velocity_rad_s: 0.0,
            horizontal_gps_accuracy_m: 3.0,
            vertical_gps_accuracy_m: 3.0,
            heading_accuracy_deg: 1.0,
            manual_bracket_m: None,
        });
        assert!(ctx.kalman.state().is_tracking);
        ctx.set_target_priority(TargetPriority::Near);
        assert!(!ctx.kalman.state().is_tracking);
        assert!(!ctx.smoother.state().is_initialized);
    }

    #[test]
    fn empty_frame_yields_invalid_output() {
        let mut ctx = FusionContext::new(cfg(), 0.0);
        let report = ctx.process_frame(FrameInputs {
            timestamp_s: 0.0,
            neural_raw: None,
            reference_metric: None,
            reference_confidence: 0.0,
            lidar_distance_m: None,
            geometric_distance_m: None,
            terrain_slope_deg: 0.0,
            neural_depth_map: None,
            roi_samples: vec![],
            detections: vec![],
            dem: None,
            pitch_rad: 0.0,
            heading_deg: 0.0,
            angular_velocity_rad_s: 0.0,
            horizontal_gps_accuracy_m: 3.0,
            vertical_gps_accuracy_m: 3.0,
            heading_accuracy_deg: 1.0,
            manual_bracket_m: None,
        });
        assert!(!report.selected.is_valid());
    }

    #[test]
    fn pitch_applies_cosine_correction_to_final_distance() {
        let mut ctx = FusionContext::new(cfg(), 0.0);
        ctx.publish_attitude(-30f64.to_radians(), 0.0, 0.0, 0.0);
        let report = ctx.process_frame(FrameInputs {
            timestamp_s: 0.0,
            neural_raw: None,
            reference_metric: None,
            reference_confidence: 0.0,
            lidar_distance_m: Some(5.0),
            geometric_distance_m: None,
            terrain_slope_deg: 0.0,
            neural_depth_map: None,
            roi_samples: vec![],
            detections: vec![],
            dem: None,
            pitch_rad: 0.0,
            heading_deg: 0.0,
            angular_velocity_rad_s: 0.0,
            horizontal_gps_accuracy_m: 3.0,
            vertical_gps_accuracy_m: 3.0,
            heading_accuracy_deg: 1.0,
            manual_bracket_m: None,
        });
        assert!(report.horizontal_distance_m < report.selected.distance_m);
        assert!((report.cosine_factor - 0.866).abs() < 0.01);
    }

    #[test]
    fn dense_depth_map_feeds_bimodal_analysis_over_roi_samples() {
        let mut ctx = FusionContext::new(cfg(), 0.0);
        let map = InverseDepthMap {
            width: 4,
            height: 4,
            samples: vec![
                3.0, 3.0, 3.0, 3.0, //
                3.0, 3.0, 3.0, 3.0, //
                3.0, 3.0, 3.0, 3.0, //
                3.0, 3.0, 3.0, 3.0, //
            ],
        };
        let report = ctx.process_frame(FrameInputs {
            timestamp_s: 0.0,
            neural_raw: None,
            reference_metric: None,
            reference_confidence: 0.0,
            lidar_distance_m: None,
            geometric_distance_m: None,
            terrain_slope_deg: 0.0,
            neural_depth_map: Some(map),
            // Deliberately bimodal if it were used instead of the map, so a
            // pass confirms the map (unimodal at 3.0) took priority.
            roi_samples: vec![3.0; 50].into_iter().chain(vec![1500.0; 50]).collect(),
            detections: vec![],
            dem: None,
            pitch_rad: 0.0,
            heading_deg: 0.0,
            angular_velocity_rad_s: 0.0,
            horizontal_gps_accuracy_m: 3.0,
            vertical_gps_accuracy_m: 3.0,
            heading_accuracy_deg: 1.0,
            manual_bracket_m: None,
        });
        assert!(!report.bimodal.is_bimodal);
    }
}
