//! Per-source confidence curves and calibration-quality decay (§4.10).
//!
//! Every function here is monotone-by-construction within a source's active
//! interval, non-negative, bounded by 1, and steps (rather than jumps
//! continuously) only at activation/deactivation boundaries.

use crate::config::FusionCfg;

/// LiDAR / reference depth: flat near the sweet spot, decaying to zero by
/// the sensor's published edge.
pub fn lidar_confidence(distance_m: f64, cfg: &FusionCfg) -> f64 {
    const SWEET_SPOT_MAX: f64 = 3.0;
    const PLATEAU: f64 = 0.98;
    if distance_m < cfg.min_lidar_m || distance_m > cfg.max_lidar_m {
        return 0.0;
    }
    if distance_m <= SWEET_SPOT_MAX {
        return PLATEAU;
    }
    let span = (cfg.max_lidar_m - SWEET_SPOT_MAX).max(1e-6);
    let t = ((distance_m - SWEET_SPOT_MAX) / span).clamp(0.0, 1.0);
    PLATEAU * (1.0 - t)
}

/// Neural monocular depth: rising shoulder from the validity floor, plateau
/// through the calibration domain, hard zero beyond the configured cap.
pub fn neural_confidence(distance_m: f64, cfg: &FusionCfg) -> f64 {
    const VALIDITY_FLOOR_M: f64 = 0.3;
    const SHOULDER_END_M: f64 = 2.0;
    const PLATEAU: f64 = 0.9;

    if distance_m < VALIDITY_FLOOR_M || distance_m > cfg.neural_hard_cap_m {
        return 0.0;
    }
    if distance_m <= SHOULDER_END_M {
        let span = (SHOULDER_END_M - VALIDITY_FLOOR_M).max(1e-6);
        let t = ((distance_m - VALIDITY_FLOOR_M) / span).clamp(0.0, 1.0);
        return PLATEAU * t;
    }
    // Taper smoothly toward zero over the last quarter of the valid range so
    // the hard cap is a true zero without a discontinuous final step larger
    // than the continuity tolerance.
    let taper_start = cfg.neural_hard_cap_m * 0.75;
    if distance_m <= taper_start {
        return PLATEAU;
    }
    let span = (cfg.neural_hard_cap_m - taper_start).max(1e-6);
    let t = ((distance_m - taper_start) / span).clamp(0.0, 1.0);
    PLATEAU * (1.0 - t)
}

/// Geometric (stereo/motion-parallax) depth: collapses at shallow viewing
/// angles and is penalized by terrain slope; zero outside its validity band.
pub fn geometric_confidence(
    distance_m: f64,
    pitch_rad: f64,
    terrain_slope_deg: f64,
    cfg: &FusionCfg,
) -> f64 {
    if distance_m < cfg.min_geometric_m || distance_m > cfg.max_geometric_m {
        return 0.0;
    }
    let angle_term = pitch_rad.abs().sin().max(0.15);
    let slope_penalty = (1.0 - (terrain_slope_deg.abs() / 90.0).clamp(0.0, 1.0) * 0.5).max(0.1);
    (angle_term * slope_penalty).clamp(0.0, 1.0)
}

/// DEM ray-cast: step-wise combination of horizontal/vertical GPS accuracy
/// and heading-accuracy tiers; zero below the minimum and above the maximum
/// distance cutoffs.
pub fn dem_confidence(
    distance_m: f64,
    horizontal_accuracy_m: f64,
    vertical_accuracy_m: f64,
    heading_accuracy_deg: f64,
    cfg: &FusionCfg,
) -> f64 {
    if distance_m < cfg.min_dem_m || distance_m > cfg.max_dem_m {
        return 0.0;
    }
    horizontal_tier(horizontal_accuracy_m) * vertical_tier(vertical_accuracy_m) * heading_tier(heading_accuracy_deg)
}

fn horizontal_tier(accuracy_m: f64) -> f64 {
    if accuracy_m < 5.0 {
        1.0
    } else if accuracy_m < 15.0 {
        0.85
    } else if accuracy_m < 30.0 {
        0.6
    } else if accuracy_m < 100.0 {
        0.3
    } else {
        0.0
    }
}

/// Vertical-GPS `altFactor` tiers. The resolved value at <10 m is 0.90 (see
/// DESIGN.md open-question resolution); either 0.85 or 0.90 is conformant
/// as long as the function is monotone non-increasing in accuracy.
fn vertical_tier(accuracy_m: f64) -> f64 {
    if accuracy_m < 10.0 {
        0.90
    } else if accuracy_m < 25.0 {
        0.75
    } else if accuracy_m < 50.0 {
        0.5
    } else {
        0.25
    }
}

fn heading_tier(accuracy_deg: f64) -> f64 {
    if accuracy_deg < 2.0 {
        1.0
    } else if accuracy_deg < 5.0 {
        0.85
    } else if accuracy_deg < 15.0 {
        0.6
    } else {
        0.35
    }
}

/// Object detection: a distance-dependent term (bounding-box pixel noise
/// grows with distance) times the detector's own confidence.
pub fn object_confidence(distance_m: f64, detection_confidence: f64, cfg: &FusionCfg) -> f64 {
    if distance_m < cfg.min_object_m {
        return 0.0;
    }
    let distance_term = (1.0 - (distance_m / 500.0)).clamp(0.2, 1.0);
    (distance_term * detection_confidence as f64).clamp(0.0, 1.0)
}

/// Calibration quality decay: falls from 1 toward ~0.3 as the calibrator
/// goes unrefreshed, combined multiplicatively with the calibrator's own
/// fit-quality confidence.
pub fn calibration_quality(age_s: f64, raw_confidence: f64, decay_seconds: f64, floor: f64) -> f64 {
    let decay_seconds = decay_seconds.max(1e-6);
    let age_term = floor + (1.0 - floor) * (-age_s.max(0.0) / decay_seconds).exp();
    (age_term * raw_confidence).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> FusionCfg {
        FusionCfg::default()
    }

    #[test]
    fn lidar_is_zero_outside_band() {
        let c = cfg();
        assert_eq!(lidar_confidence(0.1, &c), 0.0);
        assert_eq!(lidar_confidence(20.0, &c), 0.0);
    }

    #[test]
    fn lidar_is_plateau_in_sweet_spot() {
        let c = cfg();
        assert!((lidar_confidence(1.2, &c) - 0.98).abs() < 1e-9);
    }

    #[test]
    fn neural_is_zero_beyond_cap() {
        let c = cfg();
        assert_eq!(neural_confidence(151.0, &c), 0.0);
        assert!(neural_confidence(100.0, &c) > 0.0);
    }

    #[test]
    fn dem_zero_below_min_distance() {
        let c = cfg();
        assert_eq!(dem_confidence(5.0, 3.0, 3.0, 1.0, &c), 0.0);
        assert!(dem_confidence(100.0, 3.0, 3.0, 1.0, &c) > 0.0);
    }

    #[test]
    fn vertical_tier_monotone_non_increasing() {
        let accuracies = [1.0, 5.0, 9.9, 10.0, 20.0, 30.0, 60.0];
        let mut prev = f64::INFINITY;
        for a in accuracies {
            let v = vertical_tier(a);
            assert!(v <= prev + 1e-12);
            prev = v;
        }
    }

    #[test]
    fn calibration_quality_decays_toward_floor() {
        let fresh = calibration_quality(0.0, 1.0, 240.0, 0.3);
        let stale = calibration_quality(10_000.0, 1.0, 240.0, 0.3);
        assert!((fresh - 1.0).abs() < 1e-6);
        assert!((stale - 0.3).abs() < 1e-3);
        assert!(stale < fresh);
    }

    proptest::proptest! {
        #[test]
        fn lidar_continuity_within_active_range(d in 0.31f64..9.9) {
            let c = cfg();
            let a = lidar_confidence(d, &c);
            let b = lidar_confidence(d + 0.1, &c);
            prop_assert!((a - b).abs() <= 0.06 + 1e-9);
        }

        #[test]
        fn neural_continuity_within_active_range(d in 0.31f64..149.9) {
            let c = cfg();
            let a = neural_confidence(d, &c);
            let b = neural_confidence(d + 0.1, &c);
            prop_assert!((a - b).abs() <= 0.06 + 1e-9);
        }
    }
}
