#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Config-driven dataset definitions and row normalization.
//!
//! Each map dataset (competitor, commercial, traffic, population) is
//! described by a declarative [`profile::DatasetProfile`] loaded from TOML
//! at compile time. A single generic parser in [`parser`] turns raw CSV
//! rows into validated [`storemap_dataset_models::PointRecord`]s according
//! to the active profile; there are no per-dataset code paths.

pub mod parser;
pub mod profile;
pub mod registry;

pub use parser::{RowRejection, normalize_row, normalize_rows};
pub use profile::{DatasetProfile, parse_profile_toml};
