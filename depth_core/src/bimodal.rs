//! Bimodal depth analyzer (§4.6).
//!
//! Builds a log-scale histogram of crosshair-ROI metric depths and reports
//! whether the scene shows two significant populations (a near foreground
//! and a far background), with cross-validation against the DEM estimate.

use depth_traits::sources::InverseDepthMap;

use crate::calibrator::ContinuousCalibrator;
use crate::config::BimodalCfg;
use crate::types::{BimodalAnalysis, DemEstimate};

/// Stride-sample the crosshair-centered ROI of a dense inverse-depth map,
/// running each raw sample through `calibrator` to get a metric depth.
/// Non-finite and non-positive results are dropped before they ever reach
/// [`analyze`].
///
/// The ROI is the `cfg.roi_fraction` box centered on the map, e.g. 0.2
/// samples the central 20% of both width and height.
pub fn sample_roi(depth_map: &InverseDepthMap, calibrator: &ContinuousCalibrator, cfg: &BimodalCfg) -> Vec<f64> {
    let stride = cfg.roi_stride.max(1);
    let roi_fraction = cfg.roi_fraction.clamp(0.0, 1.0);
    let roi_w = ((depth_map.width as f64) * roi_fraction).round() as usize;
    let roi_h = ((depth_map.height as f64) * roi_fraction).round() as usize;
    let col_start = depth_map.width.saturating_sub(roi_w) / 2;
    let row_start = depth_map.height.saturating_sub(roi_h) / 2;
    let row_end = (row_start + roi_h).min(depth_map.height);
    let col_end = (col_start + roi_w).min(depth_map.width);

    let mut samples = Vec::new();
    let mut row = row_start;
    while row < row_end {
        let mut col = col_start;
        while col < col_end {
            if let Some(raw) = depth_map.get(row, col) {
                let metric = calibrator.calibrate(raw as f64);
                if metric.is_finite() && metric > 0.0 {
                    samples.push(metric);
                }
            }
            col += stride;
        }
        row += stride;
    }
    samples
}

/// Summarize a set of already-calibrated, finite, positive metric depth
/// samples (non-finite/non-positive values are expected to have been
/// dropped by the caller before this point, per the gating rule applied
/// uniformly across sources).
pub fn analyze(samples: &[f64], cfg: &BimodalCfg, dem: Option<&DemEstimate>) -> BimodalAnalysis {
    let edges = log_bin_edges(cfg.histogram_min_m, cfg.histogram_max_m, cfg.histogram_bins);
    let mut counts = vec![0usize; cfg.histogram_bins];
    let mut total = 0usize;

    for &s in samples {
        if !s.is_finite() || s <= 0.0 {
            continue;
        }
        if let Some(bin) = bin_index(s, &edges) {
            counts[bin] += 1;
            total += 1;
        }
    }

    if total == 0 {
        return BimodalAnalysis::default();
    }

    let Some(peak1) = argmax(&counts) else {
        return BimodalAnalysis::default();
    };
    let separation = (cfg.histogram_bins / 8).max(1);
    let peak2 = argmax_excluding(&counts, peak1, separation);

    let bin_center = |i: usize| (edges[i] * edges[i + 1]).sqrt();

    let (near_idx, far_idx) = match peak2 {
        Some(p2) => {
            if bin_center(peak1) <= bin_center(p2) {
                (peak1, p2)
            } else {
                (p2, peak1)
            }
        }
        None => (peak1, peak1),
    };

    let near_peak_m = bin_center(near_idx);
    let far_peak_m = bin_center(far_idx);
    let near_fraction = counts[near_idx] as f64 / total as f64;
    let far_fraction = counts[far_idx] as f64 / total as f64;

    let is_bimodal = near_idx != far_idx
        && near_fraction > cfg.min_fraction
        && far_fraction > cfg.min_fraction
        && far_peak_m / near_peak_m.max(1e-9) > cfg.min_ratio;

    let dem_agrees_with_far = dem
        .map(|d| ratio(d.distance_m, far_peak_m) <= cfg.dem_agreement_ratio)
        .unwrap_or(false);

    BimodalAnalysis {
        is_bimodal,
        near_peak_m,
        far_peak_m,
        near_fraction_0_1: near_fraction,
        far_fraction_0_1: far_fraction,
        dem_agrees_with_far,
    }
}

fn ratio(a: f64, b: f64) -> f64 {
    if a <= 0.0 || b <= 0.0 {
        return f64::INFINITY;
    }
    (a / b).max(b / a)
}

fn log_bin_edges(min_m: f64, max_m: f64, bins: usize) -> Vec<f64> {
    let log_min = min_m.max(1e-6).ln();
    let log_max = max_m.max(min_m + 1e-6).ln();
    let step = (log_max - log_min) / bins as f64;
    (0..=bins).map(|i| (log_min + step * i as f64).exp()).collect()
}

fn bin_index(value: f64, edges: &[f64]) -> Option<usize> {
    if value < edges[0] || value > *edges.last().unwrap() {
        return None;
    }
    for i in 0..edges.len() - 1 {
        if value >= edges[i] && value <= edges[i + 1] {
            return Some(i);
        }
    }
    None
}

fn argmax(counts: &[usize]) -> Option<usize> {
    counts
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0)
        .max_by_key(|(_, &c)| c)
        .map(|(i, _)| i)
}

fn argmax_excluding(counts: &[usize], exclude: usize, separation: usize) -> Option<usize> {
    counts
        .iter()
        .enumerate()
        .filter(|(i, &c)| c > 0 && i.abs_diff(exclude) >= separation)
        .max_by_key(|(_, &c)| c)
        .map(|(i, _)| i)
}
