//! Brute-force neighbor queries under the haversine metric.
//!
//! Every query scans the whole point set. Scans are spread across the rayon
//! pool of the caller.

use crate::geometry::haversine;
use crate::geometry::LatLon;
use rayon::iter::IndexedParallelIterator as _;
use rayon::iter::IntoParallelRefIterator as _;
use rayon::iter::ParallelIterator as _;

#[derive(Debug, Clone, Copy)]
pub struct BruteForce<'p> {
    points: &'p [LatLon],
}

impl<'p> BruteForce<'p> {
    pub fn new(points: &'p [LatLon]) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Indices and distances of the points within `radius` of `center`,
    /// boundary included, in index order.
    pub fn within(&self, center: &LatLon, radius: f64) -> Vec<(usize, f64)> {
        self.points
            .par_iter()
            .enumerate()
            .filter_map(|(idx, point)| {
                let distance = haversine(center, point);
                if distance <= radius {
                    Some((idx, distance))
                } else {
                    None
                }
            })
            .collect()
    }

    /// For each point, the indices of the points within `radius` of it
    /// (itself included), in index order.
    pub fn neighborhoods(&self, radius: f64) -> Vec<Vec<usize>> {
        let span = tracing::info_span!("neighborhoods", point_count = self.len(), radius);
        let _enter = span.enter();

        self.points
            .par_iter()
            .map(|center| {
                self.points
                    .iter()
                    .enumerate()
                    .filter(|(_, point)| haversine(center, point) <= radius)
                    .map(|(idx, _)| idx)
                    .collect()
            })
            .collect()
    }

    /// For each point, the distance to its `k`-th nearest point, the point
    /// itself being the first.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero or greater than the number of points.
    pub fn kth_distances(&self, k: usize) -> Vec<f64> {
        assert!(0 < k && k <= self.len());
        let span = tracing::info_span!("kth_distances", point_count = self.len(), k);
        let _enter = span.enter();

        self.points
            .par_iter()
            .map(|center| {
                let mut distances: Vec<f64> = self
                    .points
                    .iter()
                    .map(|point| haversine(center, point))
                    .collect();
                let (_, kth, _) = distances.select_nth_unstable_by(k - 1, f64::total_cmp);
                *kth
            })
            .collect()
    }
}
