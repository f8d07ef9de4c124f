//! Shared East-North-Up geometry helpers used by the ray-caster and the
//! online elevation client's corridor pre-fetch (§4.4/§4.5).

pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

pub fn meters_per_degree_lon(lat_deg: f64) -> f64 {
    METERS_PER_DEGREE_LAT * lat_deg.to_radians().cos()
}

/// Unit ENU direction for a ray at `heading_deg` (true north) and
/// `pitch_rad` (positive = above horizontal).
pub fn enu_direction(heading_deg: f64, pitch_rad: f64) -> (f64, f64, f64) {
    let pitch_below_horizon = -pitch_rad;
    let heading_rad = heading_deg.to_radians();
    let d_east = heading_rad.sin() * pitch_below_horizon.cos();
    let d_north = heading_rad.cos() * pitch_below_horizon.cos();
    let d_up = -pitch_below_horizon.sin();
    (d_east, d_north, d_up)
}

/// Offset (lat, lon) by an ENU displacement in meters.
pub fn offset_latlon(lat: f64, lon: f64, east_m: f64, north_m: f64) -> (f64, f64) {
    let dlat = north_m / METERS_PER_DEGREE_LAT;
    let dlon = east_m / meters_per_degree_lon(lat);
    (lat + dlat, lon + dlon)
}

/// Great-circle-free flat-earth bearing/pitch difference check used by the
/// ray-caster's rate limiter: true when both differ by less than the given
/// tolerances.
pub fn within_tolerance(heading_a: f64, heading_b: f64, pitch_a: f64, pitch_b: f64, heading_tol_deg: f64, pitch_tol_rad: f64) -> bool {
    let mut dh = (heading_a - heading_b).abs() % 360.0;
    if dh > 180.0 {
        dh = 360.0 - dh;
    }
    dh < heading_tol_deg && (pitch_a - pitch_b).abs() < pitch_tol_rad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_north_level_points_north_with_zero_vertical() {
        let (e, n, u) = enu_direction(0.0, 0.0);
        assert!(e.abs() < 1e-9);
        assert!((n - 1.0).abs() < 1e-9);
        assert!(u.abs() < 1e-9);
    }

    #[test]
    fn upward_pitch_gives_negative_down_component() {
        let (_, _, u) = enu_direction(0.0, 30f64.to_radians());
        assert!(u > 0.0);
    }

    #[test]
    fn offset_one_degree_latitude_matches_meters_constant() {
        let (lat, _) = offset_latlon(0.0, 0.0, 0.0, METERS_PER_DEGREE_LAT);
        assert!((lat - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tolerance_wraps_across_0_360() {
        assert!(within_tolerance(359.5, 0.2, 0.0, 0.0, 1.0, 0.01));
        assert!(!within_tolerance(359.0, 1.0, 0.0, 0.0, 1.0, 0.01));
    }
}
