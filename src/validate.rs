//! Decimal coordinate validation.
//!
//! Coordinates come in as text, usually straight out of a CSV cell. A value is
//! accepted when it parses as a float and lies within geographic bounds.

fn parse_within(val: &str, bound: f64) -> Option<f64> {
    let val: f64 = val.trim().parse().ok()?;
    // NaN fails both comparisons.
    if -bound <= val && val <= bound {
        Some(val)
    } else {
        None
    }
}

/// Parses a decimal latitude, in degrees, within `[-90, 90]`.
pub fn parse_latitude(val: &str) -> Option<f64> {
    parse_within(val, 90.0)
}

/// Parses a decimal longitude, in degrees, within `[-180, 180]`.
pub fn parse_longitude(val: &str) -> Option<f64> {
    parse_within(val, 180.0)
}

/// Whether the given string is a valid decimal latitude.
///
/// ```rust
/// assert!(geocluster::is_valid_lat("90"));
/// assert!(!geocluster::is_valid_lat("91"));
/// assert!(!geocluster::is_valid_lat("abc"));
/// ```
pub fn is_valid_lat(val: &str) -> bool {
    parse_latitude(val).is_some()
}

/// Whether the given string is a valid decimal longitude.
pub fn is_valid_lon(val: &str) -> bool {
    parse_longitude(val).is_some()
}
