//! Inclination & cosine correction (§4.9).

use crate::config::CosineCfg;

/// Convert line-of-sight distance `d` at device pitch `theta_rad` to
/// horizontal distance. Below the deadband the correction is skipped and
/// the factor 1.0 is reported; both up and down inclinations apply the
/// same magnitude.
pub fn correct(distance_m: f64, pitch_rad: f64, cfg: &CosineCfg) -> (f64, f64) {
    if pitch_rad.abs() <= cfg.deadband_rad {
        return (distance_m, 1.0);
    }
    let factor = pitch_rad.abs().cos();
    (distance_m * factor, factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CosineCfg {
        CosineCfg::default()
    }

    #[test]
    fn below_deadband_is_unchanged() {
        let (d, f) = correct(500.0, 0.01, &cfg());
        assert_eq!(d, 500.0);
        assert_eq!(f, 1.0);
    }

    #[test]
    fn thirty_degrees_matches_worked_example() {
        let (d, f) = correct(500.0, -30f64.to_radians(), &cfg());
        assert!((d - 433.0).abs() < 0.5);
        assert!((f - 0.866).abs() < 0.01);
    }

    #[test]
    fn symmetric_in_sign_of_pitch() {
        let cfg = cfg();
        let (d_pos, f_pos) = correct(500.0, 0.7, &cfg);
        let (d_neg, f_neg) = correct(500.0, -0.7, &cfg);
        assert_eq!(d_pos, d_neg);
        assert_eq!(f_pos, f_neg);
    }

    proptest::proptest! {
        #[test]
        fn correct_is_symmetric_for_any_angle(d in 0.1f64..2000.0, theta in -1.4f64..1.4) {
            let cfg = CosineCfg::default();
            let (a, fa) = correct(d, theta, &cfg);
            let (b, fb) = correct(d, -theta, &cfg);
            prop_assert!((a - b).abs() < 1e-9);
            prop_assert!((fa - fb).abs() < 1e-9);
        }
    }
}
