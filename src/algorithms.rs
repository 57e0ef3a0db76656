use std::fmt;
use std::str::FromStr;

mod dbscan;
mod optics;

pub use dbscan::Dbscan;
pub use dbscan::Metadata as DbscanMetadata;
pub use optics::Metadata as OpticsMetadata;
pub use optics::Optics;

/// Common errors thrown by algorithms.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The neighborhood radius is NaN or below what the algorithm supports
    /// (zero for DBSCAN, negative for OPTICS).
    InvalidRadius(f64),

    /// The minimum number of points is below what the algorithm supports.
    InvalidMinPoints { min: usize, actual: usize },

    /// A size parameter exceeds the number of points to cluster.
    TooFewSamples { required: usize, sample_count: usize },

    /// The steepness threshold of OPTICS is outside `[0, 1]`.
    InvalidXi(f64),

    /// Input sets don't have matching lengths.
    InputLenMismatch { expected: usize, actual: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRadius(radius) => write!(f, "invalid neighborhood radius {radius}"),
            Error::InvalidMinPoints { min, actual } => write!(
                f,
                "minimum point count must be at least {min} (got {actual})",
            ),
            Error::TooFewSamples {
                required,
                sample_count,
            } => write!(
                f,
                "expected at least {required} points, got {sample_count}",
            ),
            Error::InvalidXi(xi) => write!(f, "xi must be in [0, 1] (got {xi})"),
            Error::InputLenMismatch { expected, actual } => write!(
                f,
                "input sets don't have the same length (expected {expected} items, got {actual})",
            ),
        }
    }
}

impl std::error::Error for Error {}

/// The density-based algorithms available to [`crate::cluster_locations`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Dbscan,
    Optics,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Dbscan => "dbscan",
            Algorithm::Optics => "optics",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when an algorithm name is not recognized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseAlgorithmError {
    name: String,
}

impl fmt::Display for ParseAlgorithmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown algorithm {:?} (expected \"dbscan\" or \"optics\")",
            self.name,
        )
    }
}

impl std::error::Error for ParseAlgorithmError {}

impl FromStr for Algorithm {
    type Err = ParseAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dbscan" => Ok(Algorithm::Dbscan),
            "optics" => Ok(Algorithm::Optics),
            _ => Err(ParseAlgorithmError { name: s.to_owned() }),
        }
    }
}
