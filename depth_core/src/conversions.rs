//! `From` bridges translating `depth_config`'s TOML-facing structs into the
//! plain runtime structs in `config.rs` that the pipeline stages consume
//! directly.

use crate::config::{
    BimodalCfg, CalibratorCfg, CosineCfg, DemCfg, DeviceCfg, FusionCfg, KalmanCfg, MotionCfg, OutlierCfg,
    SelectorCfg, SmootherCfg,
};
use crate::types::{ModelKind, TargetPriority};

impl From<&depth_config::FusionToml> for FusionCfg {
    fn from(c: &depth_config::FusionToml) -> Self {
        Self {
            neural_hard_cap_m: c.neural_hard_cap_m,
            min_lidar_m: c.min_lidar_m,
            max_lidar_m: c.max_lidar_m,
            min_geometric_m: c.min_geometric_m,
            max_geometric_m: c.max_geometric_m,
            min_dem_m: c.min_dem_m,
            max_dem_m: c.max_dem_m,
            min_object_m: c.min_object_m,
            dem_primary_weight_floor: c.dem_primary_weight_floor,
            object_block_weight: c.object_block_weight,
            outlier_ratio_threshold: c.outlier_ratio_threshold,
            confidence_floor: c.confidence_floor,
        }
    }
}

impl From<&depth_config::SelectorToml> for SelectorCfg {
    fn from(c: &depth_config::SelectorToml) -> Self {
        Self {
            object_primary_weight_threshold: c.object_primary_weight_threshold,
            dem_relaxed_weight_threshold: c.dem_relaxed_weight_threshold,
            occluder_near_peak_m: c.occluder_near_peak_m,
        }
    }
}

impl From<&depth_config::CalibratorToml> for CalibratorCfg {
    fn from(c: &depth_config::CalibratorToml) -> Self {
        Self {
            max_samples: c.max_samples,
            min_samples_for_fit: c.min_samples_for_fit,
            refit_every_n: c.refit_every_n,
            min_sample_confidence: c.min_sample_confidence,
            confidence_decay_seconds: c.confidence_decay_seconds,
            min_confidence_floor: c.min_confidence_floor,
        }
    }
}

impl From<&depth_config::DemToml> for DemCfg {
    fn from(c: &depth_config::DemToml) -> Self {
        Self {
            ray_step_m: c.ray_step_m,
            max_ray_m: c.max_ray_m,
            bisection_iters: c.bisection_iters,
            rate_limit_s: c.rate_limit_s,
            tile_cache_capacity: c.tile_cache_capacity,
        }
    }
}

impl From<&depth_config::KalmanToml> for KalmanCfg {
    fn from(c: &depth_config::KalmanToml) -> Self {
        Self {
            base_q: c.base_q,
            base_r: c.base_r,
            q_motion_scale: (c.q_motion_scale_stationary, c.q_motion_scale_tracking, c.q_motion_scale_panning),
            max_gap_s: c.max_gap_s,
        }
    }
}

impl From<&depth_config::SmootherToml> for SmootherCfg {
    fn from(c: &depth_config::SmootherToml) -> Self {
        Self {
            alpha_floor: c.alpha_floor,
            alpha_panning: c.alpha_panning,
            discontinuity_ring_len: c.discontinuity_ring_len,
            discontinuity_thresholds: c.discontinuity_thresholds.clone(),
        }
    }
}

impl From<&depth_config::MotionToml> for MotionCfg {
    fn from(c: &depth_config::MotionToml) -> Self {
        Self {
            theta_stationary_rad_s: c.theta_stationary_rad_s,
            theta_panning_rad_s: c.theta_panning_rad_s,
        }
    }
}

impl From<&depth_config::CosineToml> for CosineCfg {
    fn from(c: &depth_config::CosineToml) -> Self {
        Self { deadband_rad: c.deadband_rad }
    }
}

impl From<&depth_config::BimodalToml> for BimodalCfg {
    fn from(c: &depth_config::BimodalToml) -> Self {
        Self {
            min_fraction: c.min_fraction,
            min_ratio: c.min_ratio,
            histogram_min_m: c.histogram_min_m,
            histogram_max_m: c.histogram_max_m,
            histogram_bins: c.histogram_bins,
            dem_agreement_ratio: c.dem_agreement_ratio,
            roi_fraction: c.roi_fraction,
            roi_stride: c.roi_stride,
        }
    }
}

impl From<&depth_config::OutlierToml> for OutlierCfg {
    fn from(c: &depth_config::OutlierToml) -> Self {
        Self { ring_capacity: c.ring_capacity }
    }
}

impl From<depth_config::TargetPriority> for TargetPriority {
    fn from(c: depth_config::TargetPriority) -> Self {
        match c {
            depth_config::TargetPriority::Near => TargetPriority::Near,
            depth_config::TargetPriority::Far => TargetPriority::Far,
        }
    }
}

impl From<&depth_config::DeviceToml> for DeviceCfg {
    fn from(c: &depth_config::DeviceToml) -> Self {
        Self {
            default_camera_height_m: c.default_camera_height_m,
            default_target_priority: c.default_target_priority.into(),
        }
    }
}

impl From<&depth_config::Config> for crate::config::FusionConfig {
    fn from(c: &depth_config::Config) -> Self {
        Self {
            fusion: (&c.fusion).into(),
            selector: (&c.selector).into(),
            calibrator: (&c.calibrator).into(),
            dem: (&c.dem).into(),
            kalman: (&c.kalman).into(),
            smoother: (&c.smoother).into(),
            motion: (&c.motion).into(),
            cosine: (&c.cosine).into(),
            bimodal: (&c.bimodal).into(),
            outlier: (&c.outlier).into(),
            device: (&c.device).into(),
        }
    }
}

impl From<depth_config::PersistedModelKind> for ModelKind {
    fn from(k: depth_config::PersistedModelKind) -> Self {
        match k {
            depth_config::PersistedModelKind::Linear => ModelKind::Linear,
            depth_config::PersistedModelKind::Inverse => ModelKind::Inverse,
        }
    }
}

impl From<ModelKind> for depth_config::PersistedModelKind {
    fn from(k: ModelKind) -> Self {
        match k {
            ModelKind::Linear => depth_config::PersistedModelKind::Linear,
            ModelKind::Inverse => depth_config::PersistedModelKind::Inverse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_config_converts_cleanly() {
        let toml_cfg = depth_config::Config::default();
        let runtime: crate::config::FusionConfig = (&toml_cfg).into();
        assert!((runtime.fusion.neural_hard_cap_m - 150.0).abs() < 1e-9);
        assert_eq!(runtime.smoother.discontinuity_thresholds.len(), 5);
    }

    #[test]
    fn model_kind_round_trips() {
        let k: depth_config::PersistedModelKind = ModelKind::Inverse.into();
        let back: ModelKind = k.into();
        assert_eq!(back, ModelKind::Inverse);
    }
}
