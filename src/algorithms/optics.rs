//! Ordering points to identify the clustering structure.
//!
//! Ankerst, Breunig, Kriegel, and Sander, "OPTICS: Ordering Points To Identify
//! the Clustering Structure" (1999). Clusters are extracted from the
//! reachability plot with the ξ-steep-area method of the same paper, with the
//! predecessor correction of Schubert and Gertz, "Improving the Cluster
//! Structure Extracted from OPTICS Plots" (2018).
//!
//! Two inequalities of the paper are reversed here, as they are wrong as
//! printed: a steep downward point has `r(p) * (1 - ξ) >= r(p + 1)`
//! (definition 9), and the end of a cluster is searched for while
//! `r(x) > r(sD)` (definition 11, 4c).

use super::Error;
use crate::geometry::LatLon;
use crate::neighbors::BruteForce;
use crate::Label;
use std::ops::RangeInclusive;

/// Number of decimals kept in reachability and core distances, so that ties
/// between nearly-equal distances resolve the same way on every platform.
const DISTANCE_DECIMALS: i32 = 15;

fn round_distance(distance: f64) -> f64 {
    if !distance.is_finite() {
        return distance;
    }
    let scale = 10_f64.powi(DISTANCE_DECIMALS);
    (distance * scale).round_ties_even() / scale
}

/// Diagnostic data for an [`Optics`] run.
#[derive(Clone, Debug, PartialEq)]
pub struct Metadata {
    /// Point indices in processing order.
    pub ordering: Vec<usize>,

    /// Reachability distance of each point, indexed by point.
    pub reachability: Vec<f64>,

    /// Core distance of each point, infinite for points that are not core
    /// points.
    pub core_distances: Vec<f64>,

    /// Point from which each point was reached.
    pub predecessors: Vec<Option<usize>>,

    /// Extracted clusters as ranges of `ordering`, inner clusters first.
    pub clusters: Vec<RangeInclusive<usize>>,
}

/// Output of the ordering phase.
struct Graph {
    ordering: Vec<usize>,
    reachability: Vec<f64>,
    core_distances: Vec<f64>,
    predecessors: Vec<Option<usize>>,
}

fn optics_graph(points: &[LatLon], min_points: usize, max_radius: f64) -> Graph {
    let search = BruteForce::new(points);

    let mut core_distances = search.kth_distances(min_points);
    for distance in &mut core_distances {
        if *distance > max_radius {
            *distance = f64::INFINITY;
        }
        *distance = round_distance(*distance);
    }

    let span = tracing::info_span!("ordering", point_count = points.len());
    let _enter = span.enter();

    let mut reachability = vec![f64::INFINITY; points.len()];
    let mut predecessors = vec![None; points.len()];
    let mut processed = vec![false; points.len()];
    let mut ordering = Vec::with_capacity(points.len());

    for _ in 0..points.len() {
        // Smallest reachability first, smallest index on ties.
        let mut next = None;
        for (idx, reach) in reachability.iter().enumerate() {
            if processed[idx] {
                continue;
            }
            match next {
                Some((_, best)) if best <= *reach => {}
                _ => next = Some((idx, *reach)),
            }
        }
        let point = match next {
            Some((point, _)) => point,
            None => break,
        };

        processed[point] = true;
        ordering.push(point);

        let core_distance = core_distances[point];
        if core_distance == f64::INFINITY {
            continue;
        }
        for (neighbor, distance) in search.within(&points[point], max_radius) {
            if processed[neighbor] {
                continue;
            }
            let reach = round_distance(f64::max(distance, core_distance));
            if reach < reachability[neighbor] {
                reachability[neighbor] = reach;
                predecessors[neighbor] = Some(point);
            }
        }
    }

    if reachability.iter().all(|reach| reach.is_infinite()) {
        tracing::warn!(
            "all reachability values are infinite, every point will be noise; \
             consider a larger radius"
        );
    }

    Graph {
        ordering,
        reachability,
        core_distances,
        predecessors,
    }
}

/// A steep down area of the reachability plot.
#[derive(Debug, Clone, Copy)]
struct SteepDownArea {
    start: usize,
    end: usize,
    /// Maximum reachability between the end of the area and the current
    /// position.
    mib: f64,
}

/// Extends a steep area starting at `start` as far as possible.
///
/// The area may contain at most `min_points` consecutive points that go in
/// the right direction without being steep. It stops at the first point that
/// goes the other way.
fn extend_region(steep: &[bool], xward: &[bool], start: usize, min_points: usize) -> usize {
    let mut non_xward_points = 0;
    let mut end = start;
    for index in start..steep.len() {
        if steep[index] {
            non_xward_points = 0;
            end = index;
        } else if !xward[index] {
            non_xward_points += 1;
            if non_xward_points > min_points {
                break;
            }
        } else {
            return end;
        }
    }
    end
}

/// Drops the steep down areas that are too low for `mib`, and updates the mib
/// of the others.
fn filter_steep_down_areas(
    areas: &mut Vec<SteepDownArea>,
    mib: f64,
    xi_complement: f64,
    plot: &[f64],
) {
    if mib.is_infinite() {
        areas.clear();
        return;
    }
    areas.retain(|area| mib <= plot[area.start] * xi_complement);
    for area in areas {
        area.mib = f64::max(area.mib, mib);
    }
}

/// Shrinks `start..=end` from the right until the predecessor of its last
/// point is inside the range.
fn correct_predecessor(
    plot: &[f64],
    predecessor_plot: &[Option<usize>],
    ordering: &[usize],
    start: usize,
    mut end: usize,
) -> Option<(usize, usize)> {
    while start < end {
        if plot[start] > plot[end] {
            return Some((start, end));
        }
        if let Some(predecessor) = predecessor_plot[end] {
            if ordering[start..end].contains(&predecessor) {
                return Some((start, end));
            }
        }
        end -= 1;
    }
    None
}

struct XiSettings {
    xi: f64,
    min_points: usize,
    min_cluster_size: usize,
    predecessor_correction: bool,
}

/// Finds the ξ-clusters of a reachability plot, as ranges of positions in the
/// ordering.
fn xi_clusters(
    reachability_plot: &[f64],
    predecessor_plot: &[Option<usize>],
    ordering: &[usize],
    settings: &XiSettings,
) -> Vec<RangeInclusive<usize>> {
    let span = tracing::info_span!("xi_clusters", xi = settings.xi);
    let _enter = span.enter();

    // The infinite sentinel lets clusters end on the last point even without
    // an upward area after it.
    let mut plot = reachability_plot.to_vec();
    plot.push(f64::INFINITY);
    let plot = plot.as_slice();
    let xi_complement = 1.0 - settings.xi;

    // NaN ratios (inf/inf, 0/0) are neither steep nor directed.
    let ratios: Vec<f64> = plot.windows(2).map(|w| w[0] / w[1]).collect();
    let steep_upward: Vec<bool> = ratios.iter().map(|r| *r <= xi_complement).collect();
    let steep_downward: Vec<bool> = ratios.iter().map(|r| *r >= 1.0 / xi_complement).collect();
    let downward: Vec<bool> = ratios.iter().map(|r| *r > 1.0).collect();
    let upward: Vec<bool> = ratios.iter().map(|r| *r < 1.0).collect();

    let mut steep_down_areas: Vec<SteepDownArea> = Vec::new();
    let mut clusters = Vec::new();
    let mut index = 0;
    let mut mib = 0.0;

    let steep_indices = (0..ratios.len()).filter(|i| steep_upward[*i] || steep_downward[*i]);
    for steep_index in steep_indices {
        if steep_index < index {
            // Already part of a discovered area.
            continue;
        }

        mib = plot[index..=steep_index]
            .iter()
            .copied()
            .fold(mib, f64::max);

        if steep_downward[steep_index] {
            filter_steep_down_areas(&mut steep_down_areas, mib, xi_complement, plot);
            let end = extend_region(&steep_downward, &upward, steep_index, settings.min_points);
            steep_down_areas.push(SteepDownArea {
                start: steep_index,
                end,
                mib: 0.0,
            });
            index = end + 1;
            mib = plot[index];
            continue;
        }

        filter_steep_down_areas(&mut steep_down_areas, mib, xi_complement, plot);
        let up_start = steep_index;
        let up_end = extend_region(&steep_upward, &downward, up_start, settings.min_points);
        index = up_end + 1;
        mib = plot[index];

        let mut up_clusters = Vec::new();
        for area in &steep_down_areas {
            let mut start = area.start;
            let mut end = up_end;

            if plot[end + 1] * xi_complement < area.mib {
                continue;
            }

            // Definition 11, criterion 4.
            let down_max = plot[area.start];
            if down_max * xi_complement >= plot[end + 1] {
                // Start from the left where the plot is level with the end.
                while plot[start + 1] > plot[end + 1] && start < area.end {
                    start += 1;
                }
            } else if plot[end + 1] * xi_complement >= down_max {
                // End from the right where the plot is level with the start.
                while end > up_start && plot[end - 1] > down_max {
                    end -= 1;
                }
            }

            if settings.predecessor_correction {
                match correct_predecessor(plot, predecessor_plot, ordering, start, end) {
                    Some(corrected) => (start, end) = corrected,
                    None => continue,
                }
            }

            // Definition 11, criteria 3.a, 1 and 2.
            if end - start + 1 < settings.min_cluster_size
                || area.end < start
                || end < up_start
            {
                continue;
            }

            up_clusters.push(start..=end);
        }

        // Inner clusters first.
        up_clusters.reverse();
        clusters.extend(up_clusters);
    }

    clusters
}

/// Labels points from ξ-clusters. A cluster is only kept if none of its
/// points are already labelled.
fn xi_labels(labels: &mut [Label], ordering: &[usize], clusters: &[RangeInclusive<usize>]) -> usize {
    let mut ordered: Vec<Label> = vec![None; ordering.len()];
    let mut cluster_count = 0;
    for cluster in clusters {
        let range = &mut ordered[cluster.clone()];
        if range.iter().all(Option::is_none) {
            range.fill(Some(cluster_count));
            cluster_count += 1;
        }
    }
    for (point, label) in ordering.iter().zip(ordered) {
        labels[*point] = label;
    }
    cluster_count
}

fn optics(
    labels: &mut [Label],
    points: &[LatLon],
    settings: Optics,
) -> Result<Metadata, Error> {
    if settings.max_radius.is_nan() || settings.max_radius < 0.0 {
        return Err(Error::InvalidRadius(settings.max_radius));
    }
    if !(0.0..=1.0).contains(&settings.xi) {
        return Err(Error::InvalidXi(settings.xi));
    }
    if settings.min_points < 2 {
        return Err(Error::InvalidMinPoints {
            min: 2,
            actual: settings.min_points,
        });
    }
    let min_cluster_size = settings.min_cluster_size.unwrap_or(settings.min_points);
    if min_cluster_size < 2 {
        return Err(Error::InvalidMinPoints {
            min: 2,
            actual: min_cluster_size,
        });
    }
    if labels.len() != points.len() {
        return Err(Error::InputLenMismatch {
            expected: points.len(),
            actual: labels.len(),
        });
    }

    labels.fill(None);
    if points.is_empty() {
        return Ok(Metadata {
            ordering: Vec::new(),
            reachability: Vec::new(),
            core_distances: Vec::new(),
            predecessors: Vec::new(),
            clusters: Vec::new(),
        });
    }
    for required in [settings.min_points, min_cluster_size] {
        if points.len() < required {
            return Err(Error::TooFewSamples {
                required,
                sample_count: points.len(),
            });
        }
    }

    let Graph {
        ordering,
        reachability,
        core_distances,
        predecessors,
    } = optics_graph(points, settings.min_points, settings.max_radius);

    let reachability_plot: Vec<f64> = ordering.iter().map(|p| reachability[*p]).collect();
    let predecessor_plot: Vec<Option<usize>> = ordering.iter().map(|p| predecessors[*p]).collect();
    let clusters = xi_clusters(
        &reachability_plot,
        &predecessor_plot,
        &ordering,
        &XiSettings {
            xi: settings.xi,
            min_points: settings.min_points,
            min_cluster_size,
            predecessor_correction: settings.predecessor_correction,
        },
    );
    let cluster_count = xi_labels(labels, &ordering, &clusters);
    tracing::info!(
        cluster_count,
        candidate_count = clusters.len(),
        "optics done"
    );

    Ok(Metadata {
        ordering,
        reachability,
        core_distances,
        predecessors,
        clusters,
    })
}

/// OPTICS under the haversine metric.
///
/// Points are ordered by reachability, considering neighbors up to
/// `max_radius` radians away, then clusters are cut out of the reachability
/// plot where it drops and rises by a relative amount of at least `xi`.
///
/// # Example
///
/// ```rust
/// use geocluster::Cluster as _;
///
/// let points = [
///     geocluster::from_degrees(45.0, 5.0),
///     geocluster::from_degrees(45.0005, 5.0),
///     geocluster::from_degrees(45.0, 5.0005),
///     geocluster::from_degrees(49.5, 5.0),
/// ];
/// let mut labels = [None; 4];
///
/// let metadata = geocluster::Optics {
///     max_radius: geocluster::km_to_radians(1.0),
///     min_points: 2,
///     ..Default::default()
/// }
/// .cluster(&mut labels, &points)
/// .unwrap();
///
/// assert_eq!(labels, [Some(0), Some(0), Some(0), None]);
/// assert_eq!(metadata.ordering, [0, 2, 1, 3]);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Optics {
    /// Largest neighborhood radius considered, in radians.
    pub max_radius: f64,
    pub min_points: usize,
    /// Minimum relative steepness of cluster boundaries in the reachability
    /// plot.
    pub xi: f64,
    /// Minimum number of points in a cluster, `min_points` if `None`.
    pub min_cluster_size: Option<usize>,
    pub predecessor_correction: bool,
}

impl Default for Optics {
    fn default() -> Self {
        Self {
            max_radius: f64::INFINITY,
            min_points: 5,
            xi: 0.05,
            min_cluster_size: None,
            predecessor_correction: true,
        }
    }
}

impl<'a> crate::Cluster<&'a [LatLon]> for Optics {
    type Metadata = Metadata;
    type Error = Error;

    fn cluster(
        &mut self,
        labels: &mut [Label],
        points: &'a [LatLon],
    ) -> Result<Self::Metadata, Self::Error> {
        optics(labels, points, *self)
    }
}

impl<'a, const N: usize> crate::Cluster<&'a [LatLon; N]> for Optics {
    type Metadata = Metadata;
    type Error = Error;

    fn cluster(
        &mut self,
        labels: &mut [Label],
        points: &'a [LatLon; N],
    ) -> Result<Self::Metadata, Self::Error> {
        optics(labels, points, *self)
    }
}
