//! Points on the sphere and the haversine metric.

use nalgebra::Vector2;

/// Mean radius of the Earth, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6378.1;

/// A position on the unit sphere: latitude then longitude, in radians.
pub type LatLon = Vector2<f64>;

/// Builds a [`LatLon`] from decimal degrees.
pub fn from_degrees(lat: f64, lon: f64) -> LatLon {
    LatLon::new(lat, lon).map(f64::to_radians)
}

/// Converts a distance on the Earth's surface into the matching angle.
///
/// # Example
///
/// ```rust
/// let angle = geocluster::km_to_radians(geocluster::EARTH_RADIUS_KM);
/// assert!((angle - 1.0).abs() < 1e-12);
/// ```
pub fn km_to_radians(km: f64) -> f64 {
    km / EARTH_RADIUS_KM
}

/// Great-circle distance between `a` and `b`, as an angle in radians.
pub fn haversine(a: &LatLon, b: &LatLon) -> f64 {
    let delta = b - a;
    let sin_lat = f64::sin(delta.x / 2.0);
    let sin_lon = f64::sin(delta.y / 2.0);
    let h = sin_lat * sin_lat + f64::cos(a.x) * f64::cos(b.x) * sin_lon * sin_lon;
    // Rounding can push `h` slightly above 1 for antipodal points.
    2.0 * f64::asin(f64::sqrt(h.min(1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use approx::assert_ulps_eq;
    use std::f64::consts::FRAC_PI_2;
    use std::f64::consts::PI;

    #[test]
    fn test_km_to_radians() {
        assert_ulps_eq!(km_to_radians(6378.1), 1.0);
        assert_ulps_eq!(km_to_radians(0.0), 0.0);
        assert_relative_eq!(km_to_radians(1.0) * EARTH_RADIUS_KM, 1.0);
    }

    #[test]
    fn test_haversine() {
        let origin = from_degrees(0.0, 0.0);
        let pole = from_degrees(90.0, 0.0);
        let antipode = from_degrees(0.0, 180.0);

        assert_ulps_eq!(haversine(&origin, &origin), 0.0);
        assert_relative_eq!(haversine(&origin, &pole), FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(haversine(&origin, &antipode), PI, epsilon = 1e-12);
        assert_relative_eq!(
            haversine(&pole, &antipode),
            haversine(&antipode, &pole),
            epsilon = 1e-15,
        );
    }

    #[test]
    fn test_haversine_across_antimeridian() {
        let west = from_degrees(10.0, 179.5);
        let east = from_degrees(10.0, -179.5);
        let near_west = from_degrees(10.0, 178.5);

        assert_relative_eq!(
            haversine(&west, &east),
            haversine(&west, &near_west),
            epsilon = 1e-12,
        );
    }
}
