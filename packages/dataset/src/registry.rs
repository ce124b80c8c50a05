//! Dataset registry: loads all profiles from embedded TOML configs.
//!
//! Each `.toml` file in `packages/dataset/profiles/` is baked into the
//! binary at compile time via [`include_str!`]. Adding a dataset is as
//! simple as creating a new TOML file and adding it to the list below.

use crate::profile::{DatasetProfile, parse_profile_toml};

/// TOML configs embedded at compile time.
const PROFILE_TOMLS: &[(&str, &str)] = &[
    ("competitor", include_str!("../profiles/competitor.toml")),
    ("commercial", include_str!("../profiles/commercial.toml")),
    ("traffic", include_str!("../profiles/traffic.toml")),
    ("population", include_str!("../profiles/population.toml")),
];

/// Total number of configured datasets (used in tests).
#[cfg(test)]
const EXPECTED_PROFILE_COUNT: usize = 4;

/// Returns all configured dataset profiles, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time
/// guarantee since the configs are embedded).
#[must_use]
pub fn all_profiles() -> Vec<DatasetProfile> {
    PROFILE_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_profile_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up a single dataset profile by id.
#[must_use]
pub fn profile(id: &str) -> Option<DatasetProfile> {
    all_profiles().into_iter().find(|p| p.id() == id)
}

#[cfg(test)]
mod tests {
    use storemap_dataset_models::{CoordinateOrder, PointType};

    use super::*;

    #[test]
    fn loads_all_profiles() {
        let profiles = all_profiles();
        assert_eq!(profiles.len(), EXPECTED_PROFILE_COUNT);
    }

    #[test]
    fn profile_ids_are_unique() {
        let profiles = all_profiles();
        let mut ids: Vec<&str> = profiles.iter().map(DatasetProfile::id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), EXPECTED_PROFILE_COUNT);
    }

    #[test]
    fn all_profiles_have_required_fields() {
        for profile in &all_profiles() {
            assert!(!profile.id.is_empty(), "profile id is empty");
            assert!(!profile.name.is_empty(), "profile name is empty");
            assert!(
                !profile.coordinates.lng_column.is_empty(),
                "{}: no lng column",
                profile.id
            );
            assert!(
                !profile.coordinates.lat_column.is_empty(),
                "{}: no lat column",
                profile.id
            );
        }
    }

    #[test]
    fn only_commercial_emits_swapped_coordinates() {
        for profile in &all_profiles() {
            let expected = if profile.point_type == PointType::Commercial {
                CoordinateOrder::LatLng
            } else {
                CoordinateOrder::LngLat
            };
            assert_eq!(
                profile.coordinates.order, expected,
                "{}: unexpected coordinate order",
                profile.id
            );
        }
    }

    #[test]
    fn competitor_allow_list_covers_both_facility_spellings() {
        let competitor = profile("competitor").unwrap();
        let filter = competitor.type_filter.unwrap();
        for label in [
            "Storage",
            "Self storage facility",
            "Storage facility",
            "Storage facification",
        ] {
            assert!(
                filter.allow.iter().any(|a| a == label),
                "missing allow-list entry: {label}"
            );
        }
    }

    #[test]
    fn only_population_is_sharded() {
        for profile in &all_profiles() {
            if profile.point_type == PointType::Population {
                let shards = profile.shards.as_ref().unwrap();
                assert_eq!(shards.count, 18);
                assert!(shards.template.contains("{ordinal}"));
            } else {
                assert!(profile.shards.is_none(), "{}: unexpected shards", profile.id);
            }
        }
    }
}
