//! Great-circle helpers for movement plans.
//!
//! Straight-line distances only; the simulator animates along straight
//! segments, so road geometry never enters the picture.

use crate::model::LatLng;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points in kilometers.
pub fn haversine_km(from: LatLng, to: LatLng) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Sum of consecutive leg distances along `points`.
pub fn path_length_km(points: &[LatLng]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}

/// Linear interpolation in lat/lng space. `t` is clamped to `[0, 1]`.
pub fn lerp(from: LatLng, to: LatLng, t: f64) -> LatLng {
    let t = t.clamp(0.0, 1.0);
    (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_km((6.9, 79.8), (6.9, 79.8));
        assert!(dist < 0.001, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Colombo (6.93, 79.85) to Kandy (7.29, 80.63), ~94 km straight line
        let dist = haversine_km((6.93, 79.85), (7.29, 80.63));
        assert!(dist > 85.0 && dist < 100.0, "Colombo to Kandy should be ~94km, got {}", dist);
    }

    #[test]
    fn test_path_length_sums_legs() {
        let a = (6.90, 79.80);
        let b = (6.91, 79.81);
        let c = (6.92, 79.80);
        let total = path_length_km(&[a, b, c]);
        let expected = haversine_km(a, b) + haversine_km(b, c);
        assert!((total - expected).abs() < 1e-9);
        assert_eq!(path_length_km(&[a]), 0.0);
    }

    #[test]
    fn test_lerp_endpoints_exact() {
        let from = (6.90, 79.80);
        let to = (6.91, 79.81);
        assert_eq!(lerp(from, to, 0.0), from);
        assert_eq!(lerp(from, to, 1.0), to);
        assert_eq!(lerp(from, to, 2.0), to);
    }
}
