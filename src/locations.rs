//! Clustering of tabular location records.

use crate::algorithms::Algorithm;
use crate::algorithms::Dbscan;
use crate::algorithms::Optics;
use crate::geometry::from_degrees;
use crate::geometry::km_to_radians;
use crate::validate::parse_latitude;
use crate::validate::parse_longitude;
use crate::Cluster as _;
use crate::DisplayLabels;
use crate::Label;
use serde::ser::SerializeMap as _;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// A location record, as a mapping from column name to value, in column
/// order.
pub type Record = serde_json::Map<String, Value>;

const LAT: &str = "lat";
const LON: &str = "lon";

/// Errors raised while clustering a [`Table`].
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The table lacks a column required to locate rows.
    MissingColumn(&'static str),

    /// Two columns of the table share a name.
    DuplicateColumn(String),

    /// A row does not have one value per column.
    RowLenMismatch { expected: usize, actual: usize },

    /// The clustering algorithm rejected its input.
    Clustering(crate::algorithms::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingColumn(name) => write!(f, "missing column {name:?}"),
            Error::DuplicateColumn(name) => write!(f, "duplicate column {name:?}"),
            Error::RowLenMismatch { expected, actual } => write!(
                f,
                "row has {actual} values but the table has {expected} columns",
            ),
            Error::Clustering(_) => write!(f, "clustering failed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Clustering(err) => Some(err),
            _ => None,
        }
    }
}

impl From<crate::algorithms::Error> for Error {
    fn from(err: crate::algorithms::Error) -> Self {
        Error::Clustering(err)
    }
}

/// Rows of values under named columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// An empty table with the given columns, whose names must be unique.
    pub fn new<I, S>(columns: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique = Vec::new();
        for column in columns {
            let column = column.into();
            if unique.contains(&column) {
                return Err(Error::DuplicateColumn(column));
            }
            unique.push(column);
        }
        Ok(Self {
            columns: unique,
            rows: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row, which must hold exactly one value per column.
    pub fn push_row<I>(&mut self, row: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Value>,
    {
        let row: Vec<Value> = row.into_iter().collect();
        if row.len() != self.columns.len() {
            return Err(Error::RowLenMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// The row at index `row` as a [`Record`].
    pub fn record(&self, row: usize) -> Option<Record> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect(),
        )
    }

    fn column(&self, name: &'static str) -> Result<usize, Error> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or(Error::MissingColumn(name))
    }
}

/// Text of a coordinate cell. Values other than strings and numbers have
/// none, and are thus invalid coordinates.
fn coordinate_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        _ => None,
    }
}

/// A row left out of clustering because of its coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct InvalidRow {
    /// Index of the row in the input table.
    pub row: usize,
    pub lat: Value,
    pub lon: Value,
}

/// Mapping from cluster ID to the records of the cluster.
///
/// IDs iterate in the order they first appear in the table. Records keep
/// their table order. Noise is not part of the map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterMap {
    clusters: Vec<(usize, Vec<Record>)>,
}

impl ClusterMap {
    /// Groups the records of `rows` by their label. `labels[i]` is the label
    /// of row `rows[i]` of `table`.
    fn from_labels(table: &Table, rows: &[usize], labels: &[Label]) -> Self {
        debug_assert_eq!(rows.len(), labels.len());

        let slot_count = labels.iter().flatten().max().map_or(0, |max| max + 1);
        let mut slots: Vec<Option<usize>> = vec![None; slot_count];
        let mut clusters: Vec<(usize, Vec<Record>)> = Vec::new();

        for (row, label) in rows.iter().zip(labels) {
            let id = match label {
                Some(id) => *id,
                None => continue,
            };
            let record = match table.record(*row) {
                Some(record) => record,
                None => continue,
            };
            let slot = *slots[id].get_or_insert_with(|| {
                clusters.push((id, Vec::new()));
                clusters.len() - 1
            });
            clusters[slot].1.push(record);
        }

        Self { clusters }
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&[Record]> {
        self.clusters
            .iter()
            .find(|(cluster_id, _)| *cluster_id == id)
            .map(|(_, records)| records.as_slice())
    }

    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.clusters.iter().map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Record])> + '_ {
        self.clusters
            .iter()
            .map(|(id, records)| (*id, records.as_slice()))
    }
}

impl IntoIterator for ClusterMap {
    type Item = (usize, Vec<Record>);
    type IntoIter = std::vec::IntoIter<(usize, Vec<Record>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.into_iter()
    }
}

impl serde::Serialize for ClusterMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.clusters.len()))?;
        for (id, records) in &self.clusters {
            map.serialize_entry(id, records)?;
        }
        map.end()
    }
}

/// Output of [`cluster_locations`].
#[derive(Clone, Debug)]
pub struct LocationClusters {
    clusters: ClusterMap,
    labels: Vec<Label>,
    rows: Vec<usize>,
    invalid: Vec<InvalidRow>,
}

impl LocationClusters {
    pub fn clusters(&self) -> &ClusterMap {
        &self.clusters
    }

    pub fn into_clusters(self) -> ClusterMap {
        self.clusters
    }

    /// Label of each valid row, in table order.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Table index of each valid row, matching [`Self::labels`].
    pub fn valid_rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn invalid_rows(&self) -> &[InvalidRow] {
        &self.invalid
    }

    /// Human-readable summary of the rows left out.
    pub fn invalid_report(&self) -> InvalidReport<'_> {
        InvalidReport(&self.invalid)
    }

    /// The label array, noise shown as `-1`.
    pub fn labels_display(&self) -> DisplayLabels<'_> {
        DisplayLabels(&self.labels)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InvalidReport<'a>(&'a [InvalidRow]);

impl fmt::Display for InvalidReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Found {} invalid coordinate pairs, ignoring:",
            self.0.len(),
        )?;
        writeln!(f, "{:>8} {:>16} {:>16}", "row", LAT, LON)?;
        for invalid in self.0 {
            writeln!(
                f,
                "{:>8} {:>16} {:>16}",
                invalid.row,
                invalid.lat.to_string(),
                invalid.lon.to_string(),
            )?;
        }
        Ok(())
    }
}

/// Clusters the rows of `table` by location.
///
/// Rows need `lat` and `lon` columns in decimal degrees. Rows whose
/// coordinates do not parse or are out of bounds are left out and reported in
/// the result. The others are clustered with `algorithm`, such that clusters
/// hold points within `radius_km` kilometers of each other and at least
/// `min_cluster_size` points.
///
/// A table without any valid row is not an error: the result is then empty.
pub fn cluster_locations(
    table: &Table,
    algorithm: Algorithm,
    radius_km: f64,
    min_cluster_size: usize,
) -> Result<LocationClusters, Error> {
    let lat_column = table.column(LAT)?;
    let lon_column = table.column(LON)?;

    let mut points = Vec::with_capacity(table.len());
    let mut rows = Vec::with_capacity(table.len());
    let mut invalid = Vec::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let lat = coordinate_text(&row[lat_column]).and_then(|text| parse_latitude(&text));
        let lon = coordinate_text(&row[lon_column]).and_then(|text| parse_longitude(&text));
        match (lat, lon) {
            (Some(lat), Some(lon)) => {
                points.push(from_degrees(lat, lon));
                rows.push(idx);
            }
            _ => invalid.push(InvalidRow {
                row: idx,
                lat: row[lat_column].clone(),
                lon: row[lon_column].clone(),
            }),
        }
    }
    if !invalid.is_empty() {
        tracing::warn!(
            count = invalid.len(),
            "found invalid coordinate pairs, ignoring"
        );
        for InvalidRow { row, lat, lon } in &invalid {
            tracing::debug!(row, %lat, %lon, "invalid coordinate pair");
        }
    }

    let radius = km_to_radians(radius_km);
    let mut labels = vec![None; points.len()];
    match algorithm {
        Algorithm::Dbscan => {
            Dbscan {
                radius,
                min_points: min_cluster_size,
            }
            .cluster(&mut labels, points.as_slice())?;
        }
        Algorithm::Optics => {
            Optics {
                max_radius: radius,
                min_points: min_cluster_size,
                ..Optics::default()
            }
            .cluster(&mut labels, points.as_slice())?;
        }
    }
    tracing::debug!(labels = %DisplayLabels(&labels));

    let clusters = ClusterMap::from_labels(table, &rows, &labels);
    tracing::info!(
        %algorithm,
        cluster_count = clusters.len(),
        clustered = labels.iter().filter(|label| label.is_some()).count(),
        "clustered locations"
    );

    Ok(LocationClusters {
        clusters,
        labels,
        rows,
        invalid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn table(rows: &[(&str, Value, Value)]) -> Table {
        let mut table = Table::new(["name", "lat", "lon", "visits"]).unwrap();
        for (i, (name, lat, lon)) in rows.iter().enumerate() {
            table
                .push_row([json!(name), lat.clone(), lon.clone(), json!(i)])
                .unwrap();
        }
        table
    }

    fn close_and_far() -> Table {
        table(&[
            ("a", json!("45.0"), json!("5.0")),
            ("b", json!("45.0005"), json!("5.0")),
            ("c", json!("45.0"), json!("5.0005")),
            ("far", json!("49.5"), json!("5.0")),
        ])
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records
            .iter()
            .map(|record| record["name"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_close_points_cluster_together() {
        let table = close_and_far();
        for algorithm in [Algorithm::Dbscan, Algorithm::Optics] {
            let result = cluster_locations(&table, algorithm, 1.0, 2).unwrap();
            let clusters = result.clusters();

            assert_eq!(clusters.len(), 1, "{algorithm}");
            let cluster = clusters.get(0).unwrap();
            assert_eq!(names(cluster), ["a", "b", "c"], "{algorithm}");
            assert!(clusters
                .iter()
                .all(|(_, records)| !names(records).contains(&"far")));
            assert_eq!(result.labels(), [Some(0), Some(0), Some(0), None]);
        }
    }

    #[test]
    fn test_records_pass_through() {
        let table = close_and_far();
        let result = cluster_locations(&table, Algorithm::Dbscan, 1.0, 2).unwrap();
        let cluster = result.clusters().get(0).unwrap();

        assert_eq!(cluster[1], table.record(1).unwrap());
        assert_eq!(
            cluster[1].keys().collect::<Vec<_>>(),
            ["name", "lat", "lon", "visits"],
        );
        assert_eq!(cluster[1]["lat"], json!("45.0005"));
        assert_eq!(cluster[1]["visits"], json!(1));
    }

    #[test]
    fn test_invalid_rows_are_excluded() {
        let table = table(&[
            ("a", json!("45.0"), json!("5.0")),
            ("bad", json!("999"), json!("5.0")),
            ("b", json!("45.0005"), json!("5.0")),
            ("c", json!("45.0"), json!("5.0005")),
            ("worse", json!("abc"), json!(null)),
            ("lon", json!(45.0), json!(-200)),
        ]);
        let result = cluster_locations(&table, Algorithm::Dbscan, 1.0, 2).unwrap();

        let invalid: Vec<usize> = result.invalid_rows().iter().map(|r| r.row).collect();
        assert_eq!(invalid, [1, 4, 5]);
        assert_eq!(result.invalid_rows()[0].lat, json!("999"));
        assert_eq!(result.valid_rows(), [0, 2, 3]);
        assert_eq!(names(result.clusters().get(0).unwrap()), ["a", "b", "c"]);

        let report = result.invalid_report().to_string();
        assert!(report.starts_with("Found 3 invalid coordinate pairs, ignoring:"));
        assert!(report.contains("\"999\""));
    }

    #[test]
    fn test_numeric_coordinates() {
        let table = table(&[
            ("a", json!(45.0), json!(5.0)),
            ("b", json!(45.0005), json!(5)),
        ]);
        let result = cluster_locations(&table, Algorithm::Dbscan, 1.0, 2).unwrap();
        assert!(result.invalid_rows().is_empty());
        assert_eq!(result.clusters().get(0).map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_missing_column() {
        let mut table = Table::new(["latitude", "lon"]).unwrap();
        table.push_row([json!("1"), json!("2")]).unwrap();
        let err = cluster_locations(&table, Algorithm::Optics, 1.0, 2).unwrap_err();
        assert_eq!(err, Error::MissingColumn("lat"));
    }

    #[test]
    fn test_duplicate_column() {
        let err = Table::new(["lat", "lon", "lat"]).unwrap_err();
        assert_eq!(err, Error::DuplicateColumn("lat".to_owned()));
        assert_eq!(err.to_string(), "duplicate column \"lat\"");
    }

    #[test]
    fn test_row_len_mismatch() {
        let mut table = Table::new(["lat", "lon"]).unwrap();
        let err = table.push_row([json!("1")]).unwrap_err();
        assert_eq!(
            err,
            Error::RowLenMismatch {
                expected: 2,
                actual: 1,
            }
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_algorithm_errors_propagate() {
        let table = close_and_far();
        let err = cluster_locations(&table, Algorithm::Optics, 1.0, 1).unwrap_err();
        assert!(matches!(err, Error::Clustering(_)));
        let err = cluster_locations(&table, Algorithm::Dbscan, 0.0, 2).unwrap_err();
        assert!(matches!(
            err,
            Error::Clustering(crate::algorithms::Error::InvalidRadius(_))
        ));
    }

    #[test]
    fn test_only_invalid_rows() {
        let table = table(&[("bad", json!("999"), json!("5.0"))]);
        for algorithm in [Algorithm::Dbscan, Algorithm::Optics] {
            let result = cluster_locations(&table, algorithm, 1.0, 2).unwrap();
            assert!(result.clusters().is_empty());
            assert!(result.labels().is_empty());
            assert_eq!(result.invalid_rows().len(), 1);
        }
    }

    #[test]
    fn test_cluster_ids_follow_first_occurrence() {
        let table = close_and_far();
        let labels = [Some(1), Some(0), None, Some(1)];
        let clusters = ClusterMap::from_labels(&table, &[0, 1, 2, 3], &labels);

        assert_eq!(clusters.ids().collect::<Vec<_>>(), [1, 0]);
        assert_eq!(names(clusters.get(1).unwrap()), ["a", "far"]);
        assert_eq!(names(clusters.get(0).unwrap()), ["b"]);
        assert!(clusters.get(2).is_none());
    }

    #[test]
    fn test_serialize_cluster_map() {
        let table = close_and_far();
        let clusters = ClusterMap::from_labels(&table, &[0, 1, 3], &[Some(1), Some(0), Some(1)]);

        let json = serde_json::to_value(&clusters).unwrap();
        assert_eq!(
            json,
            json!({
                "1": [
                    {"name": "a", "lat": "45.0", "lon": "5.0", "visits": 0},
                    {"name": "far", "lat": "49.5", "lon": "5.0", "visits": 3},
                ],
                "0": [
                    {"name": "b", "lat": "45.0005", "lon": "5.0", "visits": 1},
                ],
            })
        );
        let text = serde_json::to_string(&clusters).unwrap();
        assert!(text.starts_with("{\"1\":"));
    }

    #[test]
    fn test_labels_display() {
        let result = cluster_locations(&close_and_far(), Algorithm::Dbscan, 1.0, 2).unwrap();
        assert_eq!(result.labels_display().to_string(), "[0 0 0 -1]");
    }

    proptest!(
        /// Each valid row lands in at most one cluster, invalid rows in none,
        /// and the records are left untouched.
        #[test]
        fn rows_land_in_at_most_one_cluster(
            (rows, radius_km, min_size, optics) in (
                prop::collection::vec((44.98..45.02_f64, 4.98..5.02_f64, prop::bool::weighted(0.1)), 2..40),
                0.3..3.0_f64,
                2..4_usize,
                any::<bool>(),
            )
        ) {
            let mut table = Table::new(["id", "lat", "lon"]).unwrap();
            for (id, (lat, lon, broken)) in rows.iter().enumerate() {
                let lat = if *broken { json!("n/a") } else { json!(lat.to_string()) };
                table.push_row([json!(id), lat, json!(lon.to_string())]).unwrap();
            }
            let algorithm = if optics { Algorithm::Optics } else { Algorithm::Dbscan };
            let valid_count = rows.iter().filter(|(_, _, broken)| !broken).count();
            prop_assume!(!optics || min_size <= valid_count);

            let result = cluster_locations(&table, algorithm, radius_km, min_size).unwrap();

            let mut seen = vec![0_usize; rows.len()];
            for (_, records) in result.clusters().iter() {
                for record in records {
                    let id = record["id"].as_u64().unwrap() as usize;
                    seen[id] += 1;
                    prop_assert_eq!(record, &table.record(id).unwrap());
                }
            }
            for (id, (_, _, broken)) in rows.iter().enumerate() {
                prop_assert!(seen[id] <= 1);
                if *broken {
                    prop_assert_eq!(seen[id], 0);
                }
            }
            let clustered = result.labels().iter().filter(|label| label.is_some()).count();
            prop_assert_eq!(seen.iter().sum::<usize>(), clustered);
        }
    );
}
