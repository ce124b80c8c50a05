//! Generic row normalization.
//!
//! Turns one raw tabular row (a JSON object keyed by CSV header, every
//! value a string) into a validated [`PointRecord`] according to a
//! [`DatasetProfile`], or rejects it. Malformed geocoding is common in
//! scraped exports, so row-level problems are counted and dropped rather
//! than surfaced as errors. Only transport/decode failures for a whole
//! source are errors, and those live upstream in the ingest crate.

use serde_json::{Map, Value};
use storemap_dataset_models::{FeatureCollection, NormalizeStats, PointRecord};

use crate::profile::{DatasetProfile, PropertyMapping, PropertyMode};

/// Why a single row produced no record.
///
/// Not an error type: rejections are expected, silent, and countable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRejection {
    /// A coordinate column was absent, null, or empty after trimming.
    MissingCoordinate,
    /// A coordinate value failed to parse to a finite in-range number.
    InvalidCoordinate,
    /// The row's category label is not on the dataset's allow-list.
    TypeFiltered,
}

/// Normalizes one raw row into a [`PointRecord`].
///
/// Pure function of `(row, profile)`; no side effects.
///
/// # Errors
///
/// Returns the [`RowRejection`] describing why the row was dropped.
pub fn normalize_row(profile: &DatasetProfile, row: &Value) -> Result<PointRecord, RowRejection> {
    let longitude = coordinate(row, &profile.coordinates.lng_column, 180.0)?;
    let latitude = coordinate(row, &profile.coordinates.lat_column, 90.0)?;

    if let Some(filter) = &profile.type_filter
        && !filter.keeps(row)
    {
        return Err(RowRejection::TypeFiltered);
    }

    let properties = row.as_object().map_or_else(Map::new, |obj| {
        build_properties(
            &profile.properties,
            &profile.coordinates.lng_column,
            &profile.coordinates.lat_column,
            obj,
        )
    });

    Ok(PointRecord {
        longitude,
        latitude,
        point_type: profile.point_type,
        coordinate_order: profile.coordinates.order,
        properties,
    })
}

/// Folds a sequence of raw rows into one ordered [`FeatureCollection`],
/// discarding rejected rows and preserving the relative order of
/// survivors as they appeared in the source.
#[must_use]
pub fn normalize_rows(
    profile: &DatasetProfile,
    rows: &[Value],
) -> (FeatureCollection, NormalizeStats) {
    let mut collection = FeatureCollection::new();
    let mut stats = NormalizeStats::default();

    for row in rows {
        match normalize_row(profile, row) {
            Ok(record) => {
                stats.kept += 1;
                collection.push(record);
            }
            Err(RowRejection::MissingCoordinate) => stats.missing_coordinate += 1,
            Err(RowRejection::InvalidCoordinate) => stats.invalid_coordinate += 1,
            Err(RowRejection::TypeFiltered) => stats.type_filtered += 1,
        }
    }

    log::debug!("[{}] normalized: {stats}", profile.id());
    (collection, stats)
}

/// Extracts and validates one coordinate from a raw row.
///
/// `limit` is the symmetric domain bound (180 for longitude, 90 for
/// latitude).
fn coordinate(row: &Value, column: &str, limit: f64) -> Result<f64, RowRejection> {
    let raw = row.get(column).ok_or(RowRejection::MissingCoordinate)?;

    let parsed = match raw {
        Value::Null => return Err(RowRejection::MissingCoordinate),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(RowRejection::MissingCoordinate);
            }
            trimmed.parse::<f64>().ok()
        }
        Value::Number(n) => n.as_f64(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() && v.abs() <= limit => Ok(v),
        _ => Err(RowRejection::InvalidCoordinate),
    }
}

/// Builds the normalized property map for one row.
///
/// Coordinate columns are consumed by extraction and never copied into
/// properties. Empty strings present in the source pass through; only
/// columns absent from the row are omitted.
fn build_properties(
    mapping: &PropertyMapping,
    lng_column: &str,
    lat_column: &str,
    row: &Map<String, Value>,
) -> Map<String, Value> {
    let mut out = Map::new();

    match mapping.mode {
        PropertyMode::Passthrough => {
            for (column, value) in row {
                if column == lng_column || column == lat_column {
                    continue;
                }
                insert_property(mapping, &mut out, column, value);
            }
        }
        PropertyMode::Allowlist => {
            for column in &mapping.keep {
                if let Some(value) = row.get(column) {
                    insert_property(mapping, &mut out, column, value);
                }
            }
        }
    }

    out
}

/// Inserts one property, applying renames and numeric coercion.
fn insert_property(
    mapping: &PropertyMapping,
    out: &mut Map<String, Value>,
    column: &str,
    value: &Value,
) {
    let key = mapping
        .rename
        .get(column)
        .map_or(column, String::as_str)
        .to_owned();

    if let Some(rule) = mapping.coerce.iter().find(|r| r.column == column) {
        if let Some(coerced) = rule.apply(value) {
            out.insert(key, coerced);
        }
        // Omit fallback: key is absent from the output.
    } else {
        out.insert(key, value.clone());
    }
}
