use geocluster::LatLon;
use rand::Rng;

/// Points drawn uniformly in a latitude/longitude box, in degrees.
pub fn uniform_box(lat: (f64, f64), lon: (f64, f64), num_points: usize) -> Vec<LatLon> {
    let mut rng = rand::thread_rng();
    (0..num_points)
        .map(|_| geocluster::from_degrees(rng.gen_range(lat.0..lat.1), rng.gen_range(lon.0..lon.1)))
        .collect()
}
