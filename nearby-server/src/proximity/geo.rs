//! Great-circle distances and search-box coverage.

use geo::{HaversineDistance, Point};

/// Haversine distance in meters between two lat/lng positions.
pub fn distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    Point::new(lng1, lat1).haversine_distance(&Point::new(lng2, lat2))
}

/// Radius in meters of the circle inscribed in the search square
/// `[lat ± half_width, lng ± half_width]`.
///
/// Every point within this distance of the centre is inside the square,
/// so results filtered to it are not biased towards the square's corners.
/// Longitude degrees shrink away from the equator, so this is the smallest
/// of the four centre-to-edge distances.
pub fn covered_radius_m(lat: f64, lng: f64, half_width: f64) -> f64 {
    let north = (lat + half_width).min(90.0);
    let south = (lat - half_width).max(-90.0);
    [
        distance_m(lat, lng, north, lng),
        distance_m(lat, lng, south, lng),
        distance_m(lat, lng, lat, lng + half_width),
        distance_m(lat, lng, lat, lng - half_width),
    ]
    .into_iter()
    .fold(f64::INFINITY, f64::min)
}

/// Whether a lat/lng pair is a usable query origin.
pub fn is_valid_position(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance() {
        assert_eq!(distance_m(45.5, -73.6, 45.5, -73.6), 0.0);
    }

    #[test]
    fn known_distance() {
        // One degree of latitude is roughly 111 km
        let d = distance_m(45.0, -73.0, 46.0, -73.0);
        assert!((d - 111_195.0).abs() < 500.0, "got {d}");
    }

    #[test]
    fn covered_radius_uses_longitude_edge_away_from_equator() {
        let lat = 45.5;
        let r = covered_radius_m(lat, -73.6, 0.01);
        let lat_edge = distance_m(lat, -73.6, lat + 0.01, -73.6);
        let lng_edge = distance_m(lat, -73.6, lat, -73.6 + 0.01);
        assert!(lng_edge < lat_edge);
        assert!((r - lng_edge).abs() < 1e-6);
    }

    #[test]
    fn covered_radius_is_less_than_corner() {
        let r = covered_radius_m(45.5, -73.6, 0.01);
        let corner = distance_m(45.5, -73.6, 45.51, -73.59);
        assert!(r < corner);
    }

    #[test]
    fn covered_radius_grows_with_half_width() {
        let a = covered_radius_m(45.5, -73.6, 0.01);
        let b = covered_radius_m(45.5, -73.6, 0.02);
        assert!(b > a);
    }

    #[test]
    fn position_validation() {
        assert!(is_valid_position(45.5, -73.6));
        assert!(is_valid_position(-90.0, 180.0));
        assert!(!is_valid_position(91.0, 0.0));
        assert!(!is_valid_position(0.0, -181.0));
        assert!(!is_valid_position(f64::NAN, 0.0));
        assert!(!is_valid_position(0.0, f64::INFINITY));
    }
}
