//! Fusion engine: gating, DEM-primary short-circuit, DEM-dominance
//! suppression, outlier rejection, weighted combination, disagreement
//! penalty, and confidence normalization (§4.1).

use std::collections::HashMap;

use crate::config::FusionCfg;
use crate::types::{BimodalAnalysis, DemEstimate, FusedDepth, SourceEstimate, SourceTag};

/// Fuse a per-frame source pool into one reported distance with calibrated
/// confidence. `dem_present` distinguishes "no DEM estimate this frame"
/// from "DEM estimate present but weight dropped to zero by gating" for
/// callers that want to branch on the distinction; the fusion math itself
/// only looks at the pool.
pub fn fuse(
    pool: &[SourceEstimate],
    bimodal: &BimodalAnalysis,
    dem: Option<&DemEstimate>,
    cfg: &FusionCfg,
    timestamp_s: f64,
) -> FusedDepth {
    let mut pool: Vec<SourceEstimate> = pool.iter().copied().filter(|e| e.is_valid()).collect();

    gate(&mut pool, cfg);

    if let Some(short_circuit) = dem_primary_short_circuit(&pool, dem, cfg, timestamp_s) {
        return short_circuit;
    }

    suppress_dem_disagreement(&mut pool, dem, bimodal, cfg);
    reject_outliers(&mut pool, cfg);

    let contributors: Vec<SourceEstimate> = pool.iter().copied().filter(|e| e.weight > 0.0).collect();
    if contributors.is_empty() {
        return FusedDepth::none(timestamp_s);
    }

    let s: f64 = contributors.iter().map(|e| e.weight).sum();
    let distance_m = if contributors.len() >= 3 {
        let mean = weighted_mean(&contributors);
        let median = weighted_median(&contributors, s);
        0.3 * mean + 0.7 * median
    } else {
        weighted_mean(&contributors)
    };

    let mut disagreement_penalty = 1.0;
    if contributors.len() == 2 {
        let r = ratio(contributors[0].distance_m, contributors[1].distance_m);
        if r > 2.0 {
            disagreement_penalty = (1.0 - 0.5 * (r - 2.0)).max(0.15);
        }
    }

    let expected_max = expected_max_weight(distance_m);
    let mut confidence = (s / expected_max).min(1.0);
    if contributors.len() >= 2 {
        confidence *= 1.15;
    }
    if contributors.len() == 1 && contributors[0].source == SourceTag::DemRaycast && distance_m > 100.0 {
        confidence *= 0.85;
    }
    confidence = confidence.max(cfg.confidence_floor).min(1.0);
    confidence *= disagreement_penalty;
    confidence = confidence.max(cfg.confidence_floor).min(1.0);

    let mut contributing_weights = HashMap::new();
    for c in &contributors {
        *contributing_weights.entry(c.source).or_insert(0.0) += c.weight;
    }
    let primary = contributing_weights
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(tag, _)| *tag)
        .unwrap_or(SourceTag::SemanticPlaceholder);

    let uncertainty_m = spread(&contributors);

    FusedDepth {
        distance_m,
        confidence_0_1: confidence,
        uncertainty_m,
        primary,
        contributing_weights,
        timestamp_s,
    }
}

fn gate(pool: &mut [SourceEstimate], cfg: &FusionCfg) {
    for e in pool.iter_mut() {
        let in_band = match e.source {
            SourceTag::Lidar => e.distance_m > cfg.min_lidar_m && e.distance_m < cfg.max_lidar_m,
            SourceTag::Neural => e.distance_m <= cfg.neural_hard_cap_m,
            SourceTag::Geometric => e.distance_m > cfg.min_geometric_m && e.distance_m < cfg.max_geometric_m,
            SourceTag::DemRaycast => e.distance_m > cfg.min_dem_m && e.distance_m <= cfg.max_dem_m,
            SourceTag::Object => e.distance_m > cfg.min_object_m,
            SourceTag::Stadiametric | SourceTag::SemanticPlaceholder => true,
        };
        if !in_band {
            e.weight = 0.0;
        }
    }
}

fn dem_primary_short_circuit(
    pool: &[SourceEstimate],
    dem: Option<&DemEstimate>,
    cfg: &FusionCfg,
    timestamp_s: f64,
) -> Option<FusedDepth> {
    let dem_entry = pool.iter().find(|e| e.source == SourceTag::DemRaycast && e.weight > cfg.dem_primary_weight_floor)?;
    let object_blocks = pool
        .iter()
        .any(|e| e.source == SourceTag::Object && e.weight > cfg.object_block_weight);
    if object_blocks {
        return None;
    }
    let dem = dem?;
    let confidence = dem_short_circuit_confidence(dem_entry.weight, dem.distance_m, cfg.confidence_floor);

    let mut contributing_weights = HashMap::new();
    contributing_weights.insert(SourceTag::DemRaycast, dem_entry.weight);

    Some(FusedDepth {
        distance_m: dem.distance_m,
        confidence_0_1: confidence,
        uncertainty_m: 0.0,
        primary: SourceTag::DemRaycast,
        contributing_weights,
        timestamp_s,
    })
}

/// Confidence for a DEM-primary short circuit: `min(1, dem_weight /
/// expected_max_weight(dem_distance_m))`, with the >100 m dampening and
/// confidence floor applied. Shared by `dem_primary_short_circuit` and
/// `selector::dem_short_circuit_depth` so both short-circuit paths agree.
pub(crate) fn dem_short_circuit_confidence(dem_weight: f64, dem_distance_m: f64, confidence_floor: f64) -> f64 {
    let expected_max = expected_max_weight(dem_distance_m);
    let mut confidence = (dem_weight / expected_max).min(1.0);
    if dem_distance_m > 100.0 {
        confidence *= 0.85;
    }
    confidence.max(confidence_floor)
}

fn suppress_dem_disagreement(
    pool: &mut [SourceEstimate],
    dem: Option<&DemEstimate>,
    bimodal: &BimodalAnalysis,
    cfg: &FusionCfg,
) {
    let dem_present_and_confident = pool
        .iter()
        .any(|e| e.source == SourceTag::DemRaycast && e.weight > 0.1);
    if !dem_present_and_confident {
        return;
    }
    let Some(dem) = dem else { return };

    let object_agrees = pool
        .iter()
        .any(|e| e.source == SourceTag::Object && e.weight > 0.0 && ratio(e.distance_m, dem.distance_m) <= 1.5);

    // When the bimodal analyzer already corroborates the DEM hypothesis
    // against the scene's far population, widen the band before zeroing a
    // disagreeing near/geometric estimate so a genuine near-peak source
    // bracket isn't discarded on the strength of the DEM hit alone.
    let mut zero_threshold = if dem.distance_m > 200.0 { 2.0 } else { 2.5 };
    if bimodal.is_bimodal && bimodal.dem_agrees_with_far {
        zero_threshold *= 1.3;
    }
    // The scale-down branch only applies beyond 40 m (§4.1 step 3); the
    // zero branch below has no such distance gate.
    let scale_branch_active = dem.distance_m > 40.0;

    for e in pool.iter_mut() {
        if !matches!(e.source, SourceTag::Neural | SourceTag::Geometric) || e.weight <= 0.0 {
            continue;
        }
        let r = ratio(e.distance_m, dem.distance_m);
        if r > zero_threshold {
            e.weight = 0.0;
        } else if scale_branch_active && r > 1.5 {
            let mut scale = (1.0 / r).max(0.05);
            if object_agrees {
                scale *= 0.3;
            }
            e.weight *= scale;
        }
    }
}

fn reject_outliers(pool: &mut [SourceEstimate], cfg: &FusionCfg) {
    let active: Vec<f64> = pool.iter().filter(|e| e.weight > 0.05).map(|e| e.distance_m).collect();
    if active.len() < 3 {
        return;
    }
    let median = unweighted_median(&active);
    for e in pool.iter_mut() {
        if e.weight > 0.05 && median > 0.0 {
            let r = ratio(e.distance_m, median);
            if r > cfg.outlier_ratio_threshold {
                e.weight = 0.0;
            }
        }
    }
}

fn unweighted_median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn weighted_mean(contributors: &[SourceEstimate]) -> f64 {
    let s: f64 = contributors.iter().map(|e| e.weight).sum();
    if s <= 0.0 {
        return 0.0;
    }
    contributors.iter().map(|e| e.weight * e.distance_m).sum::<f64>() / s
}

/// Smallest distance whose cumulative weight (after sorting by distance)
/// reaches S/2.
fn weighted_median(contributors: &[SourceEstimate], s: f64) -> f64 {
    let mut sorted = contributors.to_vec();
    sorted.sort_by(|a, b| a.distance_m.partial_cmp(&b.distance_m).unwrap_or(std::cmp::Ordering::Equal));
    let half = s / 2.0;
    let mut cumulative = 0.0;
    for e in &sorted {
        cumulative += e.weight;
        if cumulative >= half {
            return e.distance_m;
        }
    }
    sorted.last().map(|e| e.distance_m).unwrap_or(0.0)
}

fn spread(contributors: &[SourceEstimate]) -> f64 {
    if contributors.len() < 2 {
        return 0.0;
    }
    let min = contributors.iter().map(|e| e.distance_m).fold(f64::INFINITY, f64::min);
    let max = contributors.iter().map(|e| e.distance_m).fold(f64::NEG_INFINITY, f64::max);
    (max - min).max(0.0)
}

fn ratio(a: f64, b: f64) -> f64 {
    if a <= 0.0 || b <= 0.0 {
        return f64::INFINITY;
    }
    (a / b).max(b / a)
}

/// Distance-banded expected-maximum weight sum, rising to ~2.2 near 100 m
/// and falling toward ~0.95 at 1000+ m, used to normalize confidence.
fn expected_max_weight(distance_m: f64) -> f64 {
    const BREAKPOINTS: &[(f64, f64)] = &[
        (0.0, 1.0),
        (10.0, 1.6),
        (50.0, 2.0),
        (100.0, 2.2),
        (300.0, 1.7),
        (600.0, 1.2),
        (1000.0, 0.95),
    ];
    if distance_m <= BREAKPOINTS[0].0 {
        return BREAKPOINTS[0].1;
    }
    for w in BREAKPOINTS.windows(2) {
        let (d0, v0) = w[0];
        let (d1, v1) = w[1];
        if distance_m <= d1 {
            let t = (distance_m - d0) / (d1 - d0);
            return v0 + t * (v1 - v0);
        }
    }
    BREAKPOINTS.last().unwrap().1
}
