//! Great-circle distance on a spherical Earth.

use crate::geo::Coordinate;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two validated coordinates.
///
/// Symmetric, and exactly `0.0` for identical points.
#[must_use]
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    haversine_km(a.latitude(), a.longitude(), b.latitude(), b.longitude())
}

fn haversine_km(lat_a: f64, lng_a: f64, lat_b: f64, lng_b: f64) -> f64 {
    let d_lat = (lat_b - lat_a).to_radians();
    let d_lng = (lng_b - lng_a).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.to_radians().cos() * lat_b.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Human-readable distance: whole metres below 1 km, one decimal above.
#[must_use]
pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        format!("{:.0} m", km * 1000.0)
    } else {
        format!("{km:.1} km")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[test]
    fn distance_to_self_is_zero() {
        for (lat, lng) in [(0.0, 0.0), (22.3072, 73.1812), (-90.0, 180.0), (51.5, -0.12)] {
            let a = coord(lat, lng);
            assert_eq!(distance_km(&a, &a), 0.0, "({lat}, {lng})");
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (coord(22.3072, 73.1812), coord(19.0760, 72.8777)),
            (coord(-33.8688, 151.2093), coord(40.7128, -74.0060)),
            (coord(0.0, 179.9), coord(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance_km(&a, &b), distance_km(&b, &a));
        }
    }

    #[test]
    fn short_hop_in_vadodara_is_about_150_metres() {
        let a = coord(22.3072, 73.1812);
        let b = coord(22.3082, 73.1822);
        let d = distance_km(&a, &b);
        assert!((d - 0.15).abs() <= 0.02, "got {d}");
    }

    #[test]
    fn vadodara_to_mumbai_is_roughly_350_km() {
        let d = distance_km(&coord(22.3072, 73.1812), &coord(19.0760, 72.8777));
        assert!((340.0..370.0).contains(&d), "got {d}");
    }

    #[test]
    fn antimeridian_crossing_takes_the_short_way() {
        let d = distance_km(&coord(0.0, 179.9), &coord(0.0, -179.9));
        assert!(d < 25.0, "got {d}");
    }

    #[test]
    fn format_distance_switches_units_at_one_km() {
        assert_eq!(format_distance(0.1504), "150 m");
        assert_eq!(format_distance(1.0), "1.0 km");
        assert_eq!(format_distance(12.345), "12.3 km");
    }
}
