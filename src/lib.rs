//! A library that groups geographic locations into density-based clusters.
//!
//! # Crate Layout
//!
//! Geocluster exposes a [`Cluster`] trait, which is in turn implemented by
//! algorithms. Algorithms work on points of the unit sphere ([`LatLon`]) and
//! measure distances with the [haversine] formula.
//!
//! On top of it, [`cluster_locations`] takes a [`Table`] of records with `lat`
//! and `lon` columns in decimal degrees, drops the rows whose coordinates are
//! invalid, runs the requested [`Algorithm`] and groups the records by
//! cluster.
//!
//! # Available algorithms
//!
//! - [DBSCAN][Dbscan]
//! - [OPTICS][Optics], with ξ-steep cluster extraction
//!
//! # Example
//!
//! ```rust
//! use geocluster::Algorithm;
//! use geocluster::Table;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), geocluster::LocationsError> {
//! let mut table = Table::new(["name", "lat", "lon"])?;
//! table.push_row([json!("a"), json!("45.0"), json!("5.0")])?;
//! table.push_row([json!("b"), json!("45.0005"), json!("5.0")])?;
//! table.push_row([json!("c"), json!("12.0"), json!("5.0")])?;
//!
//! let clusters = geocluster::cluster_locations(&table, Algorithm::Dbscan, 1.0, 2)?;
//! assert_eq!(clusters.clusters().len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    rust_2018_idioms
)]

mod algorithms;
mod geometry;
mod locations;
pub mod neighbors;
mod validate;

pub use crate::algorithms::*;
pub use crate::geometry::{from_degrees, haversine, km_to_radians, LatLon, EARTH_RADIUS_KM};
pub use crate::locations::cluster_locations;
pub use crate::locations::ClusterMap;
pub use crate::locations::Error as LocationsError;
pub use crate::locations::InvalidReport;
pub use crate::locations::InvalidRow;
pub use crate::locations::LocationClusters;
pub use crate::locations::Record;
pub use crate::locations::Table;
pub use crate::validate::{is_valid_lat, is_valid_lon, parse_latitude, parse_longitude};

use itertools::Itertools as _;

pub use nalgebra;
pub use rayon;
pub use serde_json;

/// Cluster assigned to a point, or `None` for noise.
pub type Label = Option<usize>;

/// The `Cluster` trait allows for clustering data.
///
/// Clustering algorithms implement this trait.
///
/// The generic argument `M` defines the input of the algorithms (e.g. a set of
/// points on the sphere).
///
/// The label slice must be of the correct size. Its previous contents are
/// ignored and overwritten.
pub trait Cluster<M> {
    /// Diagnostic data returned for a specific run of the algorithm.
    type Metadata;

    /// Error details, should the algorithm fail to run.
    type Error;

    /// Cluster the given data and output the label of each element in
    /// `labels`.
    ///
    /// Cluster IDs are contiguous and start from zero. Points that belong to
    /// no cluster are labelled `None`.
    fn cluster(&mut self, labels: &mut [Label], data: M) -> Result<Self::Metadata, Self::Error>;
}

/// Wraps a label slice so that it displays like `[0 0 -1 1]`, noise as `-1`.
#[derive(Debug, Clone, Copy)]
pub struct DisplayLabels<'a>(pub &'a [Label]);

impl std::fmt::Display for DisplayLabels<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels = self.0.iter().map(|label| match label {
            Some(id) => *id as isize,
            None => -1,
        });
        write!(f, "[{}]", labels.format(" "))
    }
}
