//! Stadiametric (pinhole) ranging from a manual bracket (§4.11).

use crate::types::{SourceEstimate, SourceTag};

/// `distance = known_size_m * focal_length_pixels / measured_pixel_size`.
/// Zero pixel size yields distance 0. Carries confidence 1.0 (the operator
/// assumes responsibility for the bracket) and source tag `Stadiametric`.
pub fn range(known_size_m: f64, measured_pixel_size: f64, focal_length_pixels: f64) -> SourceEstimate {
    let distance_m = if measured_pixel_size == 0.0 {
        0.0
    } else {
        known_size_m * focal_length_pixels / measured_pixel_size
    };
    SourceEstimate::new(distance_m, 1.0, SourceTag::Stadiametric, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pixel_size_yields_zero_distance() {
        let e = range(1.8, 0.0, 1000.0);
        assert_eq!(e.distance_m, 0.0);
    }

    #[test]
    fn round_trip_recovers_distance_exactly() {
        let known_size_m = 1.8_f64;
        let focal = 1400.0_f64;
        let distance = 250.0_f64;
        let pixel_size = known_size_m * focal / distance;
        let recovered = range(known_size_m, pixel_size, focal);
        assert!((recovered.distance_m - distance).abs() < 1e-9);
    }

    #[test]
    fn confidence_is_always_one() {
        let e = range(0.5, 20.0, 1200.0);
        assert_eq!(e.secondary_confidence, 1.0);
        assert_eq!(e.weight, 1.0);
        assert_eq!(e.source, SourceTag::Stadiametric);
    }
}
