//! Declarative dataset profile definition.
//!
//! [`DatasetProfile`] captures everything unique about a dataset in a
//! serializable config struct: which raw columns carry the coordinate,
//! the emitted coordinate order, an optional category allow-list, how raw
//! columns map to normalized property keys, and (for pre-sharded
//! datasets) the shard count and naming template. A single generic
//! parser handles every dataset, eliminating per-dataset boilerplate.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use storemap_dataset_models::{CoordinateOrder, PointType};

/// A complete, config-driven dataset definition.
///
/// Loaded from TOML files at compile time and used as the sole dataset
/// implementation.
#[derive(Debug, Deserialize)]
pub struct DatasetProfile {
    /// Unique identifier (e.g., `"traffic"`).
    pub id: String,
    /// Human-readable name (e.g., `"Road traffic counts (DfT)"`).
    pub name: String,
    /// Fixed discriminator stamped on every record from this dataset.
    pub point_type: PointType,
    /// Which raw columns supply the coordinate, and in which order the
    /// pair is emitted.
    pub coordinates: CoordinateMapping,
    /// Optional exact-match category filter (competitor dataset only).
    #[serde(default)]
    pub type_filter: Option<TypeFilter>,
    /// How raw columns become normalized properties.
    pub properties: PropertyMapping,
    /// Shard layout, for datasets pre-split into fixed-count chunks.
    #[serde(default)]
    pub shards: Option<ShardConfig>,
}

impl DatasetProfile {
    /// Returns the unique dataset identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Coordinate column names and emit order for one dataset.
///
/// Column names are the documented external contract with the upstream
/// data providers and must not be altered (the population export
/// capitalizes `Longitude`/`Latitude`; the others are lowercase).
#[derive(Debug, Deserialize)]
pub struct CoordinateMapping {
    /// Raw column holding the longitude.
    pub lng_column: String,
    /// Raw column holding the latitude.
    pub lat_column: String,
    /// Order of the emitted `GeoJSON` coordinate pair.
    pub order: CoordinateOrder,
}

/// Exact-match allow-list on a raw category column.
#[derive(Debug, Deserialize)]
pub struct TypeFilter {
    /// Raw column holding the category label.
    pub column: String,
    /// Literal labels that keep a row. Anything else, including an empty
    /// or missing value, drops it.
    pub allow: Vec<String>,
}

impl TypeFilter {
    /// Returns `true` if the row's category value is allow-listed.
    #[must_use]
    pub fn keeps(&self, row: &Value) -> bool {
        let value = row
            .get(&self.column)
            .and_then(Value::as_str)
            .unwrap_or_default();
        self.allow.iter().any(|label| label == value)
    }
}

/// How raw columns map to normalized property keys.
#[derive(Debug, Deserialize)]
pub struct PropertyMapping {
    /// Whether unmatched columns pass through or only `keep` survives.
    pub mode: PropertyMode,
    /// Columns retained in [`PropertyMode::Allowlist`] mode.
    #[serde(default)]
    pub keep: Vec<String>,
    /// Raw column -> normalized key renames (e.g. `full_address` ->
    /// `address`). Columns not listed keep their raw names.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    /// Numeric coercion rules, keyed by raw column name.
    #[serde(default)]
    pub coerce: Vec<CoerceRule>,
}

/// Property retention strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyMode {
    /// All non-coordinate columns pass through (renames applied).
    Passthrough,
    /// Only the columns in `keep` survive; everything else is dropped.
    Allowlist,
}

/// Numeric coercion for one raw column.
#[derive(Debug, Deserialize)]
pub struct CoerceRule {
    /// Raw column name this rule applies to.
    pub column: String,
    /// Target numeric type.
    pub kind: CoerceKind,
    /// What to emit when the raw value fails to parse.
    pub fallback: CoerceFallback,
}

/// Target type for a coerced property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoerceKind {
    /// Parse to `i64`. Float-formatted values (`"1234.0"`) are truncated.
    Integer,
    /// Parse to `f64`.
    Float,
}

/// Fallback behavior when numeric coercion fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoerceFallback {
    /// Emit a literal zero (count-style fields like `all_motor_vehicles`).
    Zero,
    /// Omit the key entirely (the documented `year` behavior).
    Omit,
}

impl CoerceRule {
    /// Applies this rule to a raw value.
    ///
    /// Returns `None` when the value fails to parse and the fallback is
    /// [`CoerceFallback::Omit`].
    #[must_use]
    pub fn apply(&self, raw: &Value) -> Option<Value> {
        match self.kind {
            CoerceKind::Integer => parse_integer(raw).map(Value::from).or(match self.fallback {
                CoerceFallback::Zero => Some(Value::from(0_i64)),
                CoerceFallback::Omit => None,
            }),
            CoerceKind::Float => parse_float(raw).map(Value::from).or(match self.fallback {
                CoerceFallback::Zero => Some(Value::from(0.0_f64)),
                CoerceFallback::Omit => None,
            }),
        }
    }
}

/// Parses a raw value as an integer. Accepts JSON numbers and numeric
/// strings; float-formatted strings are truncated toward zero.
fn parse_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(float_to_i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(float_to_i64)
            })
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)] // truncation is the documented behavior
fn float_to_i64(f: f64) -> i64 {
    f as i64
}

/// Parses a raw value as a finite float.
fn parse_float(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Shard layout for a dataset pre-split into fixed-count chunks.
#[derive(Debug, Deserialize)]
pub struct ShardConfig {
    /// Number of shards. Ordinals run `1..=count`.
    pub count: u32,
    /// Resource name template with an `{ordinal}` placeholder.
    pub template: String,
}

impl ShardConfig {
    /// Resolves the resource name for one shard ordinal.
    #[must_use]
    pub fn shard_name(&self, ordinal: u32) -> String {
        self.template.replace("{ordinal}", &ordinal.to_string())
    }
}

/// Parses a [`DatasetProfile`] from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or missing required fields.
pub fn parse_profile_toml(toml_str: &str) -> Result<DatasetProfile, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_filter_is_exact_match() {
        let filter = TypeFilter {
            column: "type".to_owned(),
            allow: vec!["Storage".to_owned()],
        };
        assert!(filter.keeps(&json!({"type": "Storage"})));
        assert!(!filter.keeps(&json!({"type": "storage"})));
        assert!(!filter.keeps(&json!({"type": "Storage "})));
        assert!(!filter.keeps(&json!({"type": ""})));
        assert!(!filter.keeps(&json!({})));
    }

    #[test]
    fn integer_coercion_zero_fallback() {
        let rule = CoerceRule {
            column: "count".to_owned(),
            kind: CoerceKind::Integer,
            fallback: CoerceFallback::Zero,
        };
        assert_eq!(rule.apply(&json!("1234")), Some(Value::from(1234_i64)));
        assert_eq!(rule.apply(&json!("1234.0")), Some(Value::from(1234_i64)));
        assert_eq!(rule.apply(&json!("n/a")), Some(Value::from(0_i64)));
        assert_eq!(rule.apply(&json!("")), Some(Value::from(0_i64)));
    }

    #[test]
    fn integer_coercion_omit_fallback() {
        let rule = CoerceRule {
            column: "year".to_owned(),
            kind: CoerceKind::Integer,
            fallback: CoerceFallback::Omit,
        };
        assert_eq!(rule.apply(&json!("2019")), Some(Value::from(2019_i64)));
        assert_eq!(rule.apply(&json!("unknown")), None);
    }

    #[test]
    fn float_coercion() {
        let rule = CoerceRule {
            column: "acreage".to_owned(),
            kind: CoerceKind::Float,
            fallback: CoerceFallback::Omit,
        };
        assert_eq!(rule.apply(&json!("2.5")), Some(Value::from(2.5_f64)));
        assert_eq!(rule.apply(&json!("two")), None);
    }

    #[test]
    fn shard_name_substitutes_ordinal() {
        let shards = ShardConfig {
            count: 18,
            template: "population_chunk_{ordinal}.csv".to_owned(),
        };
        assert_eq!(shards.shard_name(1), "population_chunk_1.csv");
        assert_eq!(shards.shard_name(18), "population_chunk_18.csv");
    }

    #[test]
    fn parses_minimal_profile_toml() {
        let profile = parse_profile_toml(
            r#"
            id = "test"
            name = "Test dataset"
            point_type = "traffic"

            [coordinates]
            lng_column = "lng"
            lat_column = "lat"
            order = "lng_lat"

            [properties]
            mode = "passthrough"
            "#,
        )
        .unwrap();
        assert_eq!(profile.id(), "test");
        assert!(profile.type_filter.is_none());
        assert!(profile.shards.is_none());
    }
}
