#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the storemap dataset pipeline.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storemap_dataset::{DatasetProfile, registry};
use storemap_dataset_models::FeatureCollection;
use storemap_ingest::{DEFAULT_SHARD_CONCURRENCY, LoadOptions, load_dataset, load_window};
use storemap_spatial::BoundingBox;

#[derive(Parser)]
#[command(name = "storemap", about = "Self-storage siting map dataset pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all configured datasets
    Datasets,
    /// Convert a whole-file CSV dataset resource to GeoJSON
    Convert {
        /// Dataset identifier (e.g., "competitor")
        dataset: String,
        /// CSV resource: a URL or a local path, optionally gzipped
        input: String,
        /// Output file for the GeoJSON document (stdout if not set)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Pretty-print the GeoJSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Load a sharded dataset within a bounding box and emit GeoJSON
    Window {
        /// Dataset identifier (must have a shard layout, e.g., "population")
        dataset: String,
        /// Bounding box as "minLng,minLat,maxLng,maxLat" (inclusive)
        bbox: BoundingBox,
        /// Base URL or directory the shard files live under
        #[arg(long)]
        base: Option<String>,
        /// Maximum shard fetches in flight at once
        #[arg(long, default_value_t = DEFAULT_SHARD_CONCURRENCY)]
        concurrency: usize,
        /// Output file for the GeoJSON document (stdout if not set)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Pretty-print the GeoJSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Rehost the image URLs in a CSV listing export on R2
    HydrateImages {
        /// Input CSV export
        input: PathBuf,
        /// Output CSV with rewritten image URLs
        output: PathBuf,
        /// Name of the image URL column
        #[arg(long, default_value = "image_url")]
        column: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Datasets => {
            println!("{:<16} NAME", "ID");
            println!("{}", "-".repeat(50));
            for profile in registry::all_profiles() {
                println!("{:<16} {}", profile.id(), profile.name());
            }
        }
        Commands::Convert {
            dataset,
            input,
            output,
            pretty,
        } => {
            let profile = require_profile(&dataset)?;
            let client = reqwest::Client::new();

            let (collection, stats) = load_dataset(&client, &profile, &input).await?;
            log::info!("{}: {stats}", profile.id());

            write_geojson(&collection, output.as_deref(), pretty)?;
        }
        Commands::Window {
            dataset,
            bbox,
            base,
            concurrency,
            output,
            pretty,
        } => {
            let profile = require_profile(&dataset)?;
            let client = reqwest::Client::new();
            let options = LoadOptions {
                concurrency,
                base,
                ..LoadOptions::default()
            };

            let load = load_window(&client, &profile, bbox, &options).await?;
            log::info!("{}: {}", profile.id(), load.summary);

            write_geojson(&load.collection, output.as_deref(), pretty)?;
        }
        Commands::HydrateImages {
            input,
            output,
            column,
        } => {
            let public_base = std::env::var("R2_PUBLIC_BASE_URL")
                .map_err(|_| "R2_PUBLIC_BASE_URL must be set to the bucket's public URL")?;
            let r2 = storemap_r2::R2Client::from_env(&public_base)?;
            let http = reqwest::Client::new();

            let stats =
                storemap_r2::hydrate_csv_images(&r2, &http, &input, &output, &column).await?;
            log::info!("{}: {stats}", output.display());
        }
    }

    Ok(())
}

/// Looks up a dataset profile by id, failing with the known ids listed.
fn require_profile(id: &str) -> Result<DatasetProfile, String> {
    registry::profile(id).ok_or_else(|| {
        let profiles = registry::all_profiles();
        let known: Vec<&str> = profiles.iter().map(DatasetProfile::id).collect();
        format!("unknown dataset {id:?} (known: {})", known.join(", "))
    })
}

/// Serializes a collection as GeoJSON to a file or stdout.
fn write_geojson(
    collection: &FeatureCollection,
    output: Option<&std::path::Path>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = collection.to_geojson();
    let json = if pretty {
        serde_json::to_string_pretty(&doc)?
    } else {
        serde_json::to_string(&doc)?
    };

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            log::info!("wrote {} features to {}", collection.len(), path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
