#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point-in-bounding-box tests for viewport-windowed dataset loads.
//!
//! This is deliberately not a geometry engine: the pipeline only ever
//! needs axis-aligned lat/lng rectangles with flat (non-spherical)
//! comparisons, so that is all this crate provides.

use serde::{Deserialize, Serialize};
use storemap_dataset_models::PointRecord;

/// Error parsing a [`BoundingBox`] from its `CLI` string form.
#[derive(Debug, thiserror::Error)]
pub enum BoundingBoxParseError {
    /// The string did not contain exactly four comma-separated fields.
    #[error("expected 4 comma-separated values (minLng,minLat,maxLng,maxLat), got {0}")]
    WrongFieldCount(usize),

    /// One of the fields was not a valid float.
    #[error("invalid number {value:?}: {source}")]
    InvalidNumber {
        /// The offending field text.
        value: String,
        /// Underlying float parse error.
        source: std::num::ParseFloatError,
    },
}

/// An axis-aligned lat/lng rectangle.
///
/// No invariant is enforced beyond numeric comparability: an inverted box
/// (`min > max` on either axis) simply matches nothing, and a box whose
/// `min_lng > max_lng` crosses the ±180° seam is *not* wrapped, so it also
/// matches nothing. Both are documented limitations, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Western edge.
    pub min_lng: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lng: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl BoundingBox {
    /// Creates a bounding box from its four edges.
    #[must_use]
    pub const fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// Returns `true` if the point falls inside the box.
    ///
    /// Inclusive on all four bounds: a point exactly on an edge is inside.
    #[must_use]
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        lng >= self.min_lng && lng <= self.max_lng && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Returns `true` if the record's true WGS84 position falls inside the
    /// box.
    ///
    /// Uses [`PointRecord::longitude`]/[`PointRecord::latitude`] directly,
    /// so the commercial dataset's swapped *emit* order has no effect on
    /// filtering.
    #[must_use]
    pub fn contains_record(&self, record: &PointRecord) -> bool {
        self.contains(record.longitude, record.latitude)
    }
}

impl std::str::FromStr for BoundingBox {
    type Err = BoundingBoxParseError;

    /// Parses the `CLI` form `minLng,minLat,maxLng,maxLat`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(BoundingBoxParseError::WrongFieldCount(fields.len()));
        }

        let mut values = [0.0_f64; 4];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field
                .parse()
                .map_err(|source| BoundingBoxParseError::InvalidNumber {
                    value: (*field).to_owned(),
                    source,
                })?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_lng, self.min_lat, self.max_lng, self.max_lat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOX: BoundingBox = BoundingBox::new(-1.0, 50.0, 1.0, 52.0);

    #[test]
    fn boundary_points_are_included() {
        assert!(BOX.contains(-1.0, 51.0));
        assert!(BOX.contains(1.0, 51.0));
        assert!(BOX.contains(0.0, 50.0));
        assert!(BOX.contains(0.0, 52.0));
        assert!(BOX.contains(-1.0, 50.0));
        assert!(BOX.contains(1.0, 52.0));
    }

    #[test]
    fn points_one_unit_outside_are_excluded() {
        assert!(!BOX.contains(-2.0, 51.0));
        assert!(!BOX.contains(2.0, 51.0));
        assert!(!BOX.contains(0.0, 49.0));
        assert!(!BOX.contains(0.0, 53.0));
    }

    #[test]
    fn inverted_box_matches_nothing() {
        let inverted = BoundingBox::new(1.0, 52.0, -1.0, 50.0);
        assert!(!inverted.contains(0.0, 51.0));
        assert!(!inverted.contains(1.0, 52.0));
    }

    #[test]
    fn seam_crossing_box_matches_nothing() {
        // min_lng > max_lng across the antimeridian: no wraparound handling.
        let seam = BoundingBox::new(170.0, -10.0, -170.0, 10.0);
        assert!(!seam.contains(175.0, 0.0));
        assert!(!seam.contains(-175.0, 0.0));
    }

    #[test]
    fn parses_cli_form() {
        let parsed: BoundingBox = "-1.0, 50.0, 1.0, 52.0".parse().unwrap();
        assert_eq!(parsed, BOX);
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = "-1.0,50.0,1.0".parse::<BoundingBox>().unwrap_err();
        assert!(matches!(err, BoundingBoxParseError::WrongFieldCount(3)));
    }

    #[test]
    fn rejects_non_numeric_field() {
        let err = "-1.0,50.0,east,52.0".parse::<BoundingBox>().unwrap_err();
        assert!(matches!(err, BoundingBoxParseError::InvalidNumber { .. }));
    }
}
