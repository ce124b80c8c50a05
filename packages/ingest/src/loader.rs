//! Whole-file and windowed dataset loads.
//!
//! The windowed path loads a pre-sharded dataset chunk by chunk with
//! bounded concurrency, filters each chunk against the caller's bounding
//! box, and merges survivors in shard-ordinal order so the output is
//! deterministic regardless of fetch completion order. Shard failures are
//! best-effort: each failed shard is recorded in the summary and skipped,
//! and the merged collection is returned even if every shard fails. The
//! caller decides whether an all-empty result is itself an error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt as _;
use storemap_dataset::DatasetProfile;
use storemap_dataset::normalize_rows;
use storemap_dataset_models::{FeatureCollection, NormalizeStats};
use storemap_spatial::BoundingBox;

use crate::{IngestError, source};

/// Default number of shard fetches allowed in flight at once.
pub const DEFAULT_SHARD_CONCURRENCY: usize = 4;

/// Caller-initiated cancellation for a windowed load.
///
/// Cancelling stops new shard fetches from being issued; in-flight
/// fetches complete normally and their records are kept. Cancelled
/// shards appear in the summary as skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for a windowed load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Maximum shard fetches in flight at once (minimum 1).
    pub concurrency: usize,
    /// Base URL or directory prepended to each shard name. `None` uses
    /// the shard template as-is.
    pub base: Option<String>,
    /// Cancellation token shared with the caller.
    pub cancel: CancelToken,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_SHARD_CONCURRENCY,
            base: None,
            cancel: CancelToken::new(),
        }
    }
}

/// Outcome of loading one shard.
#[derive(Debug)]
pub enum ShardOutcome {
    /// The shard was fetched and parsed.
    Loaded {
        /// Records that survived the bounding-box filter.
        kept: u64,
        /// Valid records that fell outside the window.
        outside_window: u64,
        /// Row-level normalization counts for the shard.
        stats: NormalizeStats,
    },
    /// Retrieval or decoding failed; the shard contributed nothing.
    Failed(IngestError),
    /// The fetch was never issued because the load was cancelled.
    Skipped,
}

/// One shard's ordinal paired with its outcome.
#[derive(Debug)]
pub struct ShardResult {
    /// Shard ordinal (`1..=count`).
    pub ordinal: u32,
    /// What happened to the shard.
    pub outcome: ShardOutcome,
}

/// Per-shard outcomes and merged row stats for one windowed load.
#[derive(Debug, Default)]
pub struct WindowSummary {
    /// Outcomes in ascending ordinal order.
    pub shards: Vec<ShardResult>,
    /// Merged row-level stats across loaded shards.
    pub stats: NormalizeStats,
    /// Valid records excluded by the bounding box, across loaded shards.
    pub outside_window: u64,
}

impl WindowSummary {
    /// Number of shards that loaded successfully.
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.count(|o| matches!(o, ShardOutcome::Loaded { .. }))
    }

    /// Number of shards that failed to load.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ShardOutcome::Failed(_)))
    }

    /// Number of shards skipped due to cancellation.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ShardOutcome::Skipped))
    }

    fn count(&self, predicate: impl Fn(&ShardOutcome) -> bool) -> usize {
        self.shards
            .iter()
            .filter(|shard| predicate(&shard.outcome))
            .count()
    }
}

impl std::fmt::Display for WindowSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} shards loaded ({} failed, {} skipped); rows: {}; {} outside window",
            self.loaded(),
            self.shards.len(),
            self.failed(),
            self.skipped(),
            self.stats,
            self.outside_window
        )
    }
}

/// Result of a windowed load: the merged collection plus the summary the
/// caller can inspect for partial failures.
#[derive(Debug)]
pub struct WindowedLoad {
    /// Records inside the window, in shard-ordinal then source-row order.
    pub collection: FeatureCollection,
    /// Per-shard outcomes and merged stats.
    pub summary: WindowSummary,
}

/// Loads and normalizes a whole-file dataset resource.
///
/// # Errors
///
/// Returns [`IngestError`] if the resource cannot be retrieved or
/// decoded; no partial collection is produced in that case.
pub async fn load_dataset(
    client: &reqwest::Client,
    profile: &DatasetProfile,
    location: &str,
) -> Result<(FeatureCollection, NormalizeStats), IngestError> {
    log::info!("[{}] loading {location}", profile.name());

    let raw_rows = source::fetch_csv_rows(client, location).await?;
    let (collection, stats) = normalize_rows(profile, &raw_rows);

    log::info!(
        "[{}] loaded {} records ({stats})",
        profile.name(),
        collection.len()
    );
    Ok((collection, stats))
}

/// Loads a pre-sharded dataset, keeping only records inside `window`.
///
/// Shards are fetched with bounded concurrency and merged in ascending
/// ordinal order. A shard that cannot be retrieved or decoded is logged,
/// recorded in the summary, and skipped; it never aborts the load.
///
/// # Errors
///
/// Returns [`IngestError::NotSharded`] if the profile has no shard
/// configuration. Shard-level failures do not surface here.
pub async fn load_window(
    client: &reqwest::Client,
    profile: &DatasetProfile,
    window: BoundingBox,
    options: &LoadOptions,
) -> Result<WindowedLoad, IngestError> {
    let shards = profile
        .shards
        .as_ref()
        .ok_or_else(|| IngestError::NotSharded(profile.id().to_owned()))?;

    log::info!(
        "[{}] windowed load of {} shards within {window}",
        profile.name(),
        shards.count
    );

    let mut results: Vec<(u32, ShardOutcome, FeatureCollection)> =
        futures::stream::iter((1..=shards.count).map(|ordinal| {
            let location = resolve_location(options.base.as_deref(), &shards.shard_name(ordinal));
            let cancel = options.cancel.clone();

            async move {
                if cancel.is_cancelled() {
                    log::debug!("[{}] shard {ordinal} skipped (cancelled)", profile.id());
                    return (ordinal, ShardOutcome::Skipped, FeatureCollection::new());
                }

                match load_shard(client, profile, &location, window).await {
                    Ok((collection, stats, outside_window)) => {
                        let outcome = ShardOutcome::Loaded {
                            kept: collection.len() as u64,
                            outside_window,
                            stats,
                        };
                        (ordinal, outcome, collection)
                    }
                    Err(e) => {
                        log::warn!(
                            "[{}] shard {ordinal} ({location}) failed: {e}, skipping",
                            profile.id()
                        );
                        (ordinal, ShardOutcome::Failed(e), FeatureCollection::new())
                    }
                }
            }
        }))
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    // Concurrent fetches complete in arbitrary order; merge by ordinal so
    // the output sequence is deterministic.
    results.sort_by_key(|(ordinal, _, _)| *ordinal);

    let mut collection = FeatureCollection::new();
    let mut summary = WindowSummary::default();

    for (ordinal, outcome, shard_records) in results {
        if let ShardOutcome::Loaded {
            stats,
            outside_window,
            ..
        } = &outcome
        {
            summary.stats.merge(*stats);
            summary.outside_window += outside_window;
        }
        summary.shards.push(ShardResult { ordinal, outcome });
        collection.append(shard_records);
    }

    log::info!("[{}] window load complete: {summary}", profile.id());
    Ok(WindowedLoad {
        collection,
        summary,
    })
}

/// Fetches, normalizes, and window-filters one shard.
async fn load_shard(
    client: &reqwest::Client,
    profile: &DatasetProfile,
    location: &str,
    window: BoundingBox,
) -> Result<(FeatureCollection, NormalizeStats, u64), IngestError> {
    let raw_rows = source::fetch_csv_rows(client, location).await?;
    let (mut collection, stats) = normalize_rows(profile, &raw_rows);

    let before = collection.len() as u64;
    collection.retain(|record| window.contains_record(record));
    let outside_window = before - collection.len() as u64;

    Ok((collection, stats, outside_window))
}

/// Joins an optional base URL/directory with a shard name.
fn resolve_location(base: Option<&str>, shard_name: &str) -> String {
    base.map_or_else(
        || shard_name.to_owned(),
        |base| format!("{}/{shard_name}", base.trim_end_matches('/')),
    )
}

#[cfg(test)]
mod tests {
    use storemap_dataset::parse_profile_toml;

    use super::*;

    /// A three-shard test dataset with population-style passthrough rows.
    fn sharded_profile() -> DatasetProfile {
        parse_profile_toml(
            r#"
            id = "test_population"
            name = "Test population"
            point_type = "population"

            [coordinates]
            lng_column = "lng"
            lat_column = "lat"
            order = "lng_lat"

            [properties]
            mode = "passthrough"

            [shards]
            count = 3
            template = "chunk_{ordinal}.csv"
            "#,
        )
        .unwrap()
    }

    fn write_shard(dir: &std::path::Path, ordinal: u32, body: &str) {
        std::fs::write(dir.join(format!("chunk_{ordinal}.csv")), body).unwrap();
    }

    fn options_for(dir: &std::path::Path) -> LoadOptions {
        LoadOptions {
            base: Some(dir.to_str().unwrap().to_owned()),
            ..LoadOptions::default()
        }
    }

    const WIDE_WINDOW: BoundingBox = BoundingBox::new(-180.0, -90.0, 180.0, 90.0);

    #[tokio::test]
    async fn merges_shards_in_ordinal_order() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), 1, "lng,lat,name\n1.0,50.0,a\n1.1,50.0,b\n");
        write_shard(dir.path(), 2, "lng,lat,name\n2.0,50.0,c\n");
        write_shard(dir.path(), 3, "lng,lat,name\n3.0,50.0,d\n");

        let client = reqwest::Client::new();
        let profile = sharded_profile();
        let load = load_window(&client, &profile, WIDE_WINDOW, &options_for(dir.path()))
            .await
            .unwrap();

        let names: Vec<&str> = load
            .collection
            .iter()
            .map(|r| r.properties["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(load.summary.loaded(), 3);
        assert_eq!(load.summary.failed(), 0);
    }

    #[tokio::test]
    async fn missing_shard_never_aborts_the_load() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), 1, "lng,lat,name\n1.0,50.0,a\n");
        // chunk_2.csv deliberately absent
        write_shard(dir.path(), 3, "lng,lat,name\n3.0,50.0,d\n");

        let client = reqwest::Client::new();
        let profile = sharded_profile();
        let load = load_window(&client, &profile, WIDE_WINDOW, &options_for(dir.path()))
            .await
            .unwrap();

        assert_eq!(load.collection.len(), 2);
        assert_eq!(load.summary.loaded(), 2);
        assert_eq!(load.summary.failed(), 1);

        let failed = &load.summary.shards[1];
        assert_eq!(failed.ordinal, 2);
        assert!(matches!(failed.outcome, ShardOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn all_shards_failing_yields_empty_collection() {
        let dir = tempfile::tempdir().unwrap();

        let client = reqwest::Client::new();
        let profile = sharded_profile();
        let load = load_window(&client, &profile, WIDE_WINDOW, &options_for(dir.path()))
            .await
            .unwrap();

        assert!(load.collection.is_empty());
        assert_eq!(load.summary.failed(), 3);
    }

    #[tokio::test]
    async fn window_filter_is_inclusive_on_bounds() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(
            dir.path(),
            1,
            "lng,lat,name\n-1.0,50.0,west_edge\n0.0,51.0,inside\n1.0,52.0,northeast_corner\n1.5,51.0,outside\n",
        );
        write_shard(dir.path(), 2, "lng,lat,name\n");
        write_shard(dir.path(), 3, "lng,lat,name\n");

        let client = reqwest::Client::new();
        let profile = sharded_profile();
        let window = BoundingBox::new(-1.0, 50.0, 1.0, 52.0);
        let load = load_window(&client, &profile, window, &options_for(dir.path()))
            .await
            .unwrap();

        let names: Vec<&str> = load
            .collection
            .iter()
            .map(|r| r.properties["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["west_edge", "inside", "northeast_corner"]);
        assert_eq!(load.summary.outside_window, 1);
    }

    #[tokio::test]
    async fn rejected_rows_are_counted_per_window_load() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), 1, "lng,lat,name\n,50.0,no_lng\n1.0,50.0,ok\n");
        write_shard(dir.path(), 2, "lng,lat,name\nbogus,50.0,bad_lng\n");
        write_shard(dir.path(), 3, "lng,lat,name\n");

        let client = reqwest::Client::new();
        let profile = sharded_profile();
        let load = load_window(&client, &profile, WIDE_WINDOW, &options_for(dir.path()))
            .await
            .unwrap();

        assert_eq!(load.collection.len(), 1);
        assert_eq!(load.summary.stats.missing_coordinate, 1);
        assert_eq!(load.summary.stats.invalid_coordinate, 1);
    }

    #[tokio::test]
    async fn cancelled_load_skips_all_shards() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), 1, "lng,lat,name\n1.0,50.0,a\n");
        write_shard(dir.path(), 2, "lng,lat,name\n2.0,50.0,b\n");
        write_shard(dir.path(), 3, "lng,lat,name\n3.0,50.0,c\n");

        let mut options = options_for(dir.path());
        options.cancel.cancel();

        let client = reqwest::Client::new();
        let profile = sharded_profile();
        let load = load_window(&client, &profile, WIDE_WINDOW, &options)
            .await
            .unwrap();

        assert!(load.collection.is_empty());
        assert_eq!(load.summary.skipped(), 3);
    }

    #[tokio::test]
    async fn whole_file_load_reads_local_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.csv");
        std::fs::write(
            &path,
            "longitude,latitude,year,all_motor_vehicles,road_name\n\
             -2.5,51.4,2019,5400,A38\n\
             -2.6,not-a-lat,2019,100,A4\n",
        )
        .unwrap();

        let client = reqwest::Client::new();
        let profile = storemap_dataset::registry::profile("traffic").unwrap();
        let (collection, stats) = load_dataset(&client, &profile, path.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(collection.len(), 1);
        assert_eq!(stats.invalid_coordinate, 1);
    }

    #[tokio::test]
    async fn whole_file_load_propagates_unreadable_source() {
        let client = reqwest::Client::new();
        let profile = storemap_dataset::registry::profile("traffic").unwrap();
        let err = load_dataset(&client, &profile, "/nonexistent/traffic.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Io(_)));
    }

    #[tokio::test]
    async fn non_sharded_dataset_rejects_windowed_load() {
        let client = reqwest::Client::new();
        let profile = storemap_dataset::registry::profile("competitor").unwrap();
        let err = load_window(&client, &profile, WIDE_WINDOW, &LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NotSharded(_)));
    }

    #[test]
    fn resolve_location_joins_base() {
        assert_eq!(
            resolve_location(Some("https://cdn.example.com/data/"), "chunk_1.csv"),
            "https://cdn.example.com/data/chunk_1.csv"
        );
        assert_eq!(resolve_location(None, "chunk_1.csv"), "chunk_1.csv");
    }
}
