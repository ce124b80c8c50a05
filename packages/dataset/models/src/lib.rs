#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical geocoded point types shared across the storemap pipeline.
//!
//! Every dataset (competitor facilities, commercial listings, traffic
//! counts, population density) normalizes to [`PointRecord`], and every
//! load path produces a [`FeatureCollection`] that the map renderer
//! consumes as standard `GeoJSON`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};

/// Property key under which the dataset discriminator is emitted in
/// serialized `GeoJSON` features, so the renderer can toggle layers.
pub const POINT_TYPE_PROPERTY: &str = "pointType";

/// The dataset a point record belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PointType {
    /// Existing self-storage facility scraped from map listings.
    Competitor,
    /// Commercial land/property listing.
    Commercial,
    /// Roadside traffic count point.
    Traffic,
    /// Built-up-area population centroid.
    Population,
}

/// The order in which a record's coordinate pair is emitted into the
/// `GeoJSON` geometry.
///
/// `GeoJSON` convention is `[lng, lat]` and every dataset uses it except
/// the commercial listings feed, which the upstream pipeline has always
/// emitted as `[lat, lng]`. That looks like a data bug, but the rendered
/// commercial layer depends on it, so it is preserved here and declared
/// per dataset instead of silently corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateOrder {
    /// Standard `GeoJSON` `[longitude, latitude]`.
    LngLat,
    /// Swapped `[latitude, longitude]` (commercial listings only).
    LatLng,
}

/// A normalized geocoded entity: validated coordinate, dataset
/// discriminator, and dataset-specific properties.
///
/// `longitude`/`latitude` always hold the true WGS84 position. The
/// swapped emit order for commercial listings is applied only when the
/// record is serialized, so spatial filtering works uniformly.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    /// Longitude (WGS84), finite and within [-180, 180].
    pub longitude: f64,
    /// Latitude (WGS84), finite and within [-90, 90].
    pub latitude: f64,
    /// Which dataset this record came from.
    pub point_type: PointType,
    /// Coordinate order to use when emitting the `GeoJSON` geometry.
    pub coordinate_order: CoordinateOrder,
    /// Normalized properties. Keys are dataset-specific; values absent in
    /// the source row are omitted rather than stored as placeholders.
    pub properties: Map<String, Value>,
}

impl PointRecord {
    /// Returns the coordinate pair in this record's declared emit order.
    #[must_use]
    pub const fn emitted_coordinates(&self) -> [f64; 2] {
        match self.coordinate_order {
            CoordinateOrder::LngLat => [self.longitude, self.latitude],
            CoordinateOrder::LatLng => [self.latitude, self.longitude],
        }
    }

    /// Converts this record into a `GeoJSON` point feature.
    ///
    /// The dataset discriminator is added to the feature properties under
    /// [`POINT_TYPE_PROPERTY`].
    #[must_use]
    pub fn to_feature(&self) -> geojson::Feature {
        let [x, y] = self.emitted_coordinates();
        let geometry = geojson::Geometry::new(geojson::Value::Point(vec![x, y]));

        let mut properties = self.properties.clone();
        properties.insert(
            POINT_TYPE_PROPERTY.to_owned(),
            Value::String(self.point_type.to_string()),
        );

        geojson::Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// An ordered batch of [`PointRecord`]s.
///
/// Constructed empty, appended to during a single parse/load pass, and
/// handed to the caller as a finished value. Duplicate coordinates are
/// valid (multiple listings can share one address point), and insertion
/// order matches surviving source-row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    features: Vec<PointRecord>,
}

impl FeatureCollection {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    /// Appends a record, preserving insertion order.
    pub fn push(&mut self, record: PointRecord) {
        self.features.push(record);
    }

    /// Appends every record from `other`, preserving order.
    pub fn append(&mut self, other: Self) {
        self.features.extend(other.features);
    }

    /// Number of records in the collection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns `true` if the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterates the records in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, PointRecord> {
        self.features.iter()
    }

    /// Retains only the records for which `keep` returns `true`,
    /// preserving the relative order of survivors.
    pub fn retain(&mut self, keep: impl FnMut(&PointRecord) -> bool) {
        self.features.retain(keep);
    }

    /// Converts the collection into its serializable `GeoJSON` form.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.iter().map(PointRecord::to_feature).collect(),
            foreign_members: None,
        }
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a PointRecord;
    type IntoIter = std::slice::Iter<'a, PointRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

impl IntoIterator for FeatureCollection {
    type Item = PointRecord;
    type IntoIter = std::vec::IntoIter<PointRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl FromIterator<PointRecord> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = PointRecord>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

/// Row-level outcome counts for one normalization pass.
///
/// Rejected rows are expected and frequent in scraped exports, so they are
/// counted rather than surfaced as errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeStats {
    /// Rows that produced a [`PointRecord`].
    pub kept: u64,
    /// Rows dropped because a coordinate column was absent or empty.
    pub missing_coordinate: u64,
    /// Rows dropped because a coordinate failed to parse to a finite
    /// in-range number.
    pub invalid_coordinate: u64,
    /// Rows dropped by the dataset's type filter.
    pub type_filtered: u64,
}

impl NormalizeStats {
    /// Merge another stats into this one.
    pub const fn merge(&mut self, other: Self) {
        self.kept += other.kept;
        self.missing_coordinate += other.missing_coordinate;
        self.invalid_coordinate += other.invalid_coordinate;
        self.type_filtered += other.type_filtered;
    }

    /// Total number of rows dropped.
    #[must_use]
    pub const fn rejected(&self) -> u64 {
        self.missing_coordinate + self.invalid_coordinate + self.type_filtered
    }

    /// Total number of rows considered.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.kept + self.rejected()
    }
}

impl std::fmt::Display for NormalizeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} kept, {} rejected ({} missing coordinate, {} invalid coordinate, {} type-filtered)",
            self.kept,
            self.rejected(),
            self.missing_coordinate,
            self.invalid_coordinate,
            self.type_filtered
        )
    }
}
