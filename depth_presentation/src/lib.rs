#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Unit formatting for fused distances. Distances everywhere else in the
//! workspace are plain meters `f64`; this crate is the only place that
//! knows about yards.

const METERS_PER_YARD: f64 = 0.9144;

/// Display unit chosen by the operator, independent of how distance was
/// measured or fused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Meters,
    Yards,
}

impl DistanceUnit {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Meters => "m",
            Self::Yards => "yd",
        }
    }
}

/// Render a meters distance in the requested unit with a fixed 1-decimal
/// precision, e.g. `"42.3yd"`.
pub fn format_distance(distance_m: f64, unit: DistanceUnit) -> String {
    let value = match unit {
        DistanceUnit::Meters => distance_m,
        DistanceUnit::Yards => distance_m / METERS_PER_YARD,
    };
    format!("{:.1}{}", value, unit.suffix())
}

/// Render a distance with its confidence as a trailing percentage, e.g.
/// `"42.3yd (87%)"`. Confidence below 0 or above 1 is clamped.
pub fn format_distance_with_confidence(distance_m: f64, confidence_0_1: f64, unit: DistanceUnit) -> String {
    let pct = (confidence_0_1.clamp(0.0, 1.0) * 100.0).round();
    format!("{} ({pct:.0}%)", format_distance(distance_m, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meters_pass_through() {
        assert_eq!(format_distance(42.3, DistanceUnit::Meters), "42.3m");
    }

    #[test]
    fn meters_convert_to_yards() {
        assert_eq!(format_distance(91.44, DistanceUnit::Yards), "100.0yd");
    }

    #[test]
    fn confidence_is_clamped_above_one() {
        assert_eq!(format_distance_with_confidence(10.0, 1.5, DistanceUnit::Meters), "10.0m (100%)");
    }

    #[test]
    fn confidence_is_clamped_below_zero() {
        assert_eq!(format_distance_with_confidence(10.0, -0.2, DistanceUnit::Meters), "10.0m (0%)");
    }

    #[test]
    fn zero_distance_formats_cleanly() {
        assert_eq!(format_distance(0.0, DistanceUnit::Yards), "0.0yd");
    }
}
