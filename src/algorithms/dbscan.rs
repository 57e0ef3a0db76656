//! Density-based spatial clustering of applications with noise.
//!
//! Ester, Kriegel, Sander, and Xu, "A Density-Based Algorithm for Discovering
//! Clusters in Large Spatial Databases with Noise" (1996).

use super::Error;
use crate::geometry::LatLon;
use crate::neighbors::BruteForce;
use crate::Label;

/// Diagnostic data for a [`Dbscan`] run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub cluster_count: usize,
    pub core_count: usize,
    pub noise_count: usize,
}

fn dbscan(
    labels: &mut [Label],
    points: &[LatLon],
    radius: f64,
    min_points: usize,
) -> Result<Metadata, Error> {
    if !(0.0 < radius) {
        return Err(Error::InvalidRadius(radius));
    }
    if min_points == 0 {
        return Err(Error::InvalidMinPoints {
            min: 1,
            actual: min_points,
        });
    }
    if labels.len() != points.len() {
        return Err(Error::InputLenMismatch {
            expected: points.len(),
            actual: labels.len(),
        });
    }

    labels.fill(None);
    let neighborhoods = BruteForce::new(points).neighborhoods(radius);
    let is_core: Vec<bool> = neighborhoods
        .iter()
        .map(|neighborhood| min_points <= neighborhood.len())
        .collect();

    let mut cluster_count = 0;
    let mut stack = Vec::new();
    for seed in 0..points.len() {
        if labels[seed].is_some() || !is_core[seed] {
            continue;
        }
        // Depth-first expansion, stopping at border points.
        stack.push(seed);
        while let Some(point) = stack.pop() {
            if labels[point].is_some() {
                continue;
            }
            labels[point] = Some(cluster_count);
            if is_core[point] {
                stack.extend(
                    neighborhoods[point]
                        .iter()
                        .copied()
                        .filter(|neighbor| labels[*neighbor].is_none()),
                );
            }
        }
        cluster_count += 1;
    }

    let metadata = Metadata {
        cluster_count,
        core_count: is_core.iter().filter(|core| **core).count(),
        noise_count: labels.iter().filter(|label| label.is_none()).count(),
    };
    tracing::info!(?metadata, "dbscan done");

    Ok(metadata)
}

/// DBSCAN under the haversine metric.
///
/// A point is a core point when at least `min_points` points (itself
/// included) lie within `radius` radians of it. Clusters are the connected
/// components of core points, plus the border points they reach. Other points
/// are noise.
///
/// # Example
///
/// ```rust
/// use geocluster::Cluster as _;
///
/// let points = [
///     geocluster::from_degrees(45.0, 5.0),
///     geocluster::from_degrees(45.0005, 5.0),
///     geocluster::from_degrees(49.5, 5.0),
/// ];
/// let mut labels = [None; 3];
///
/// geocluster::Dbscan {
///     radius: geocluster::km_to_radians(1.0),
///     min_points: 2,
/// }
/// .cluster(&mut labels, &points)
/// .unwrap();
///
/// assert_eq!(labels, [Some(0), Some(0), None]);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Dbscan {
    /// Neighborhood radius, in radians.
    pub radius: f64,
    pub min_points: usize,
}

impl Default for Dbscan {
    fn default() -> Self {
        Self {
            radius: 0.5,
            min_points: 5,
        }
    }
}

impl<'a> crate::Cluster<&'a [LatLon]> for Dbscan {
    type Metadata = Metadata;
    type Error = Error;

    fn cluster(
        &mut self,
        labels: &mut [Label],
        points: &'a [LatLon],
    ) -> Result<Self::Metadata, Self::Error> {
        dbscan(labels, points, self.radius, self.min_points)
    }
}

impl<'a, const N: usize> crate::Cluster<&'a [LatLon; N]> for Dbscan {
    type Metadata = Metadata;
    type Error = Error;

    fn cluster(
        &mut self,
        labels: &mut [Label],
        points: &'a [LatLon; N],
    ) -> Result<Self::Metadata, Self::Error> {
        dbscan(labels, points, self.radius, self.min_points)
    }
}
