//! Semantic selector: deterministic priority ladder, foreground-occluder
//! predicate, and background hypothesis (§4.2).

use crate::config::SelectorCfg;
use crate::fusion;
use crate::types::{BimodalAnalysis, DemEstimate, FusedDepth, SourceEstimate, SourceTag, TargetPriority};

/// Result of the priority ladder: the chosen primary reading plus, when one
/// exists, a background hypothesis for overlay display.
#[derive(Debug, Clone)]
pub struct SelectorOutput {
    pub primary: FusedDepth,
    pub background: Option<FusedDepth>,
}

/// Evaluate the priority ladder for one frame.
///
/// `manual_bracket`, when `Some`, always wins (§4.2 step 1). Otherwise
/// LiDAR, then object, then the DEM short-circuit, then full fusion are
/// tried in order.
#[allow(clippy::too_many_arguments)]
pub fn select(
    pool: &[SourceEstimate],
    manual_bracket: Option<SourceEstimate>,
    bimodal: &BimodalAnalysis,
    dem: Option<&DemEstimate>,
    target_priority: TargetPriority,
    fusion_cfg: &crate::config::FusionCfg,
    selector_cfg: &SelectorCfg,
    timestamp_s: f64,
) -> SelectorOutput {
    if let Some(bracket) = manual_bracket {
        return SelectorOutput {
            primary: single_source_depth(bracket, timestamp_s),
            background: background_hypothesis(pool, SourceTag::Stadiametric, timestamp_s),
        };
    }

    let lidar = pool.iter().find(|e| e.source == SourceTag::Lidar && e.weight > 0.0).copied();
    if let Some(lidar) = lidar {
        let occluded = target_priority == TargetPriority::Far && is_foreground_occluder(bimodal, lidar, selector_cfg);
        if !occluded {
            return SelectorOutput {
                primary: single_source_depth(lidar, timestamp_s),
                background: background_hypothesis(pool, SourceTag::Lidar, timestamp_s),
            };
        }
    }

    let object = pool
        .iter()
        .filter(|e| e.source == SourceTag::Object && e.weight > selector_cfg.object_primary_weight_threshold)
        .copied()
        .max_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(std::cmp::Ordering::Equal));
    if let Some(object) = object {
        return SelectorOutput {
            primary: single_source_depth(object, timestamp_s),
            background: background_hypothesis(pool, SourceTag::Object, timestamp_s),
        };
    }

    let dem_threshold = if bimodal.is_bimodal && bimodal.dem_agrees_with_far {
        selector_cfg.dem_relaxed_weight_threshold
    } else {
        fusion_cfg.dem_primary_weight_floor
    };
    let dem_entry = pool.iter().find(|e| e.source == SourceTag::DemRaycast && e.weight > dem_threshold);
    let object_blocks = pool
        .iter()
        .any(|e| e.source == SourceTag::Object && e.weight > fusion_cfg.object_block_weight);
    if let (Some(dem_entry), false) = (dem_entry, object_blocks) {
        let depth = dem_short_circuit_depth(*dem_entry, dem, fusion_cfg, timestamp_s);
        return SelectorOutput {
            primary: depth,
            background: background_hypothesis(pool, SourceTag::DemRaycast, timestamp_s),
        };
    }

    let fused = fusion::fuse(pool, bimodal, dem, fusion_cfg, timestamp_s);
    let background = background_hypothesis(pool, fused.primary, timestamp_s);
    SelectorOutput { primary: fused, background }
}

fn single_source_depth(e: SourceEstimate, timestamp_s: f64) -> FusedDepth {
    let mut contributing_weights = std::collections::HashMap::new();
    contributing_weights.insert(e.source, e.weight);
    FusedDepth {
        distance_m: e.distance_m,
        confidence_0_1: e.secondary_confidence.clamp(0.0, 1.0),
        uncertainty_m: 0.0,
        primary: e.source,
        contributing_weights,
        timestamp_s,
    }
}

fn dem_short_circuit_depth(
    dem_entry: SourceEstimate,
    dem: Option<&DemEstimate>,
    cfg: &crate::config::FusionCfg,
    timestamp_s: f64,
) -> FusedDepth {
    let distance_m = dem.map(|d| d.distance_m).unwrap_or(dem_entry.distance_m);
    let confidence = fusion::dem_short_circuit_confidence(dem_entry.weight, distance_m, cfg.confidence_floor);
    let mut contributing_weights = std::collections::HashMap::new();
    contributing_weights.insert(SourceTag::DemRaycast, dem_entry.weight);
    FusedDepth {
        distance_m,
        confidence_0_1: confidence,
        uncertainty_m: 0.0,
        primary: SourceTag::DemRaycast,
        contributing_weights,
        timestamp_s,
    }
}

/// True iff LiDAR is reading a near foreground object rather than the
/// intended far target, when the operator wants the far target.
///
/// All of: the scene is bimodal, the near peak is within 12 m or LiDAR
/// reads below the near peak, the far peak is corroborated by the DEM
/// estimate, and the caller wants the far target (checked by the caller
/// passing `target_priority == Far`).
fn is_foreground_occluder(bimodal: &BimodalAnalysis, lidar: SourceEstimate, cfg: &SelectorCfg) -> bool {
    if !bimodal.is_bimodal {
        return false;
    }
    let near_close_enough = bimodal.near_peak_m <= cfg.occluder_near_peak_m || lidar.distance_m < bimodal.near_peak_m;
    near_close_enough && bimodal.dem_agrees_with_far
}

/// The best-weighted estimate whose source differs from `primary`, for
/// overlay display only.
fn background_hypothesis(pool: &[SourceEstimate], primary: SourceTag, timestamp_s: f64) -> Option<FusedDepth> {
    pool.iter()
        .filter(|e| e.source != primary && e.weight > 0.0)
        .max_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(std::cmp::Ordering::Equal))
        .copied()
        .map(|e| single_source_depth(e, timestamp_s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FusionCfg;

    fn est(distance_m: f64, weight: f64, source: SourceTag) -> SourceEstimate {
        SourceEstimate::new(distance_m, weight, source, 0.8)
    }

    #[test]
    fn manual_bracket_always_wins() {
        let pool = vec![est(10.0, 0.9, SourceTag::Lidar)];
        let bracket = est(250.0, 1.0, SourceTag::Stadiametric);
        let out = select(
            &pool,
            Some(bracket),
            &BimodalAnalysis::default(),
            None,
            TargetPriority::Far,
            &FusionCfg::default(),
            &SelectorCfg::default(),
            0.0,
        );
        assert_eq!(out.primary.primary, SourceTag::Stadiametric);
        assert_eq!(out.primary.distance_m, 250.0);
    }

    #[test]
    fn lidar_wins_when_not_occluding() {
        let pool = vec![est(5.0, 0.9, SourceTag::Lidar), est(300.0, 0.2, SourceTag::Geometric)];
        let out = select(
            &pool,
            None,
            &BimodalAnalysis::default(),
            None,
            TargetPriority::Far,
            &FusionCfg::default(),
            &SelectorCfg::default(),
            0.0,
        );
        assert_eq!(out.primary.primary, SourceTag::Lidar);
    }

    #[test]
    fn lidar_suppressed_as_foreground_occluder() {
        let pool = vec![est(5.0, 0.9, SourceTag::Lidar), est(500.0, 0.5, SourceTag::DemRaycast)];
        let bimodal = BimodalAnalysis {
            is_bimodal: true,
            near_peak_m: 5.0,
            far_peak_m: 500.0,
            near_fraction_0_1: 0.4,
            far_fraction_0_1: 0.4,
            dem_agrees_with_far: true,
        };
        let dem = DemEstimate {
            distance_m: 500.0,
            confidence_0_1: 0.8,
            terrain_elevation_m: 10.0,
            heading_deg_true_north: 0.0,
            horizontal_gps_accuracy_m: 3.0,
            hit_lat: 0.0,
            hit_lon: 0.0,
        };
        let out = select(
            &pool,
            None,
            &bimodal,
            Some(&dem),
            TargetPriority::Far,
            &FusionCfg::default(),
            &SelectorCfg::default(),
            0.0,
        );
        assert_ne!(out.primary.primary, SourceTag::Lidar);
        assert_eq!(out.primary.primary, SourceTag::DemRaycast);
    }

    #[test]
    fn object_wins_over_weak_dem_when_above_threshold() {
        let pool = vec![est(80.0, 0.5, SourceTag::Object), est(85.0, 0.05, SourceTag::DemRaycast)];
        let out = select(
            &pool,
            None,
            &BimodalAnalysis::default(),
            None,
            TargetPriority::Far,
            &FusionCfg::default(),
            &SelectorCfg::default(),
            0.0,
        );
        assert_eq!(out.primary.primary, SourceTag::Object);
    }

    #[test]
    fn falls_through_to_fusion_when_nothing_else_qualifies() {
        let pool = vec![est(40.0, 0.2, SourceTag::Neural), est(42.0, 0.3, SourceTag::Geometric)];
        let out = select(
            &pool,
            None,
            &BimodalAnalysis::default(),
            None,
            TargetPriority::Far,
            &FusionCfg::default(),
            &SelectorCfg::default(),
            0.0,
        );
        assert!(matches!(out.primary.primary, SourceTag::Neural | SourceTag::Geometric));
    }

    #[test]
    fn background_hypothesis_differs_from_primary() {
        let pool = vec![est(5.0, 0.9, SourceTag::Lidar), est(300.0, 0.4, SourceTag::Geometric)];
        let out = select(
            &pool,
            None,
            &BimodalAnalysis::default(),
            None,
            TargetPriority::Far,
            &FusionCfg::default(),
            &SelectorCfg::default(),
            0.0,
        );
        let bg = out.background.expect("background expected");
        assert_ne!(bg.primary, out.primary.primary);
    }

    #[test]
    fn near_priority_never_treats_lidar_as_occluder() {
        let pool = vec![est(5.0, 0.9, SourceTag::Lidar)];
        let bimodal = BimodalAnalysis {
            is_bimodal: true,
            near_peak_m: 5.0,
            far_peak_m: 500.0,
            near_fraction_0_1: 0.4,
            far_fraction_0_1: 0.4,
            dem_agrees_with_far: true,
        };
        let out = select(
            &pool,
            None,
            &bimodal,
            None,
            TargetPriority::Near,
            &FusionCfg::default(),
            &SelectorCfg::default(),
            0.0,
        );
        assert_eq!(out.primary.primary, SourceTag::Lidar);
    }
}
