#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cloudflare R2 hosting for commercial listing images.
//!
//! Scraped listing exports reference images by their upstream portal
//! URLs, which expire or get hotlink-blocked. [`hydrate_csv_images`]
//! rewrites a CSV export in place: each image URL is downloaded, uploaded
//! to the R2 bucket under a content-addressed key, and replaced with the
//! stable public URL. Re-running is cheap because keys are derived from
//! the source URL and existing objects are never re-uploaded.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `CLOUDFLARE_ACCOUNT_ID` | Yes | Cloudflare account ID (builds the R2 endpoint) |
//! | `R2_ACCESS_KEY_ID` | Yes | S3-compatible access key for R2 |
//! | `R2_SECRET_ACCESS_KEY` | Yes | S3-compatible secret key for R2 |

use std::path::Path;

use aws_config::Region;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};
use storemap_ingest::retry;

/// R2 bucket name for hosted dataset assets.
const BUCKET: &str = "storemap-assets";

/// Key prefix for hydrated listing images.
const IMAGE_PREFIX: &str = "images";

/// Image extensions we recognize and preserve in derived keys.
const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif"];

/// Errors that can occur during R2 operations.
#[derive(Debug, thiserror::Error)]
pub enum R2Error {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// S3 `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// S3 `HeadObject` failed.
    #[error("Failed to head s3://{bucket}/{key}: {source}")]
    Head {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Downloading a source image failed.
    #[error("Failed to fetch image: {0}")]
    Fetch(#[from] storemap_ingest::IngestError),

    /// CSV read or write failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The CSV is missing the image URL column.
    #[error("CSV has no column named {0:?}")]
    MissingColumn(String),

    /// I/O error reading or writing local files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a hydration batch: how many images were uploaded vs reused.
#[derive(Debug, Default, Clone, Copy)]
pub struct HydrateStats {
    /// Images downloaded and uploaded to R2.
    pub uploaded: u64,
    /// Rows skipped because the URL was empty, already hydrated, or the
    /// object already existed on R2.
    pub skipped: u64,
    /// Rows whose image could not be fetched or uploaded; the original
    /// URL is kept for those.
    pub failed: u64,
}

impl HydrateStats {
    /// Merge another stats into this one.
    pub const fn merge(&mut self, other: Self) {
        self.uploaded += other.uploaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    /// Total number of rows considered.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.uploaded + self.skipped + self.failed
    }
}

impl std::fmt::Display for HydrateStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} uploaded, {} skipped, {} failed",
            self.uploaded, self.skipped, self.failed
        )
    }
}

/// Client for hosting dataset assets on Cloudflare R2.
pub struct R2Client {
    client: aws_sdk_s3::Client,
    /// Public base URL rewritten URLs point at (no trailing slash).
    public_base: String,
}

impl R2Client {
    /// Creates a new R2 client from environment variables.
    ///
    /// Reads `CLOUDFLARE_ACCOUNT_ID`, `R2_ACCESS_KEY_ID`, and
    /// `R2_SECRET_ACCESS_KEY` from the environment. `public_base` is the
    /// public URL the bucket is served from; rewritten image URLs are
    /// `{public_base}/{key}`.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::MissingEnv`] if any required variable is unset.
    pub fn from_env(public_base: &str) -> Result<Self, R2Error> {
        let account_id = require_env("CLOUDFLARE_ACCOUNT_ID")?;
        let access_key = require_env("R2_ACCESS_KEY_ID")?;
        let secret_key = require_env("R2_SECRET_ACCESS_KEY")?;

        let endpoint = format!("https://{account_id}.r2.cloudflarestorage.com");
        let creds = Credentials::new(&access_key, &secret_key, None, None, "r2-env");

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&endpoint)
            .region(Region::new("auto"))
            .credentials_provider(creds)
            .force_path_style(true)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            public_base: public_base.trim_end_matches('/').to_owned(),
        })
    }

    /// Returns the public URL for an object key.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base)
    }

    /// Uploads image bytes to R2 under `key`, skipping the upload if the
    /// object already exists.
    ///
    /// Keys are content-addressed from the source URL, so an existing
    /// object is always the same image.
    ///
    /// Returns `true` if the object was uploaded, `false` if it already
    /// existed.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::Upload`] or [`R2Error::Head`] on S3 failures.
    pub async fn upload_image(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<bool, R2Error> {
        if self.exists(key).await? {
            log::debug!("  s3://{BUCKET}/{key} already exists, skipping upload");
            return Ok(false);
        }

        let body = aws_sdk_s3::primitives::ByteStream::from(bytes);

        self.client
            .put_object()
            .bucket(BUCKET)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| R2Error::Upload {
                bucket: BUCKET.to_owned(),
                key: key.to_owned(),
                source: Box::new(e),
            })?;

        log::info!("  uploaded s3://{BUCKET}/{key}");
        Ok(true)
    }

    /// Checks whether an object exists via `HeadObject`.
    async fn exists(&self, key: &str) -> Result<bool, R2Error> {
        let result = self
            .client
            .head_object()
            .bucket(BUCKET)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.as_service_error();
                if service_err
                    .is_some_and(aws_sdk_s3::operation::head_object::HeadObjectError::is_not_found)
                {
                    return Ok(false);
                }
                Err(R2Error::Head {
                    bucket: BUCKET.to_owned(),
                    key: key.to_owned(),
                    source: Box::new(err),
                })
            }
        }
    }
}

/// Rewrites a CSV export so its image URL column points at R2.
///
/// For each row, the URL in `column` is downloaded, uploaded to R2 under
/// a key derived from the URL, and replaced with the public R2 URL.
/// Rows with an empty URL, or one already under the client's public base,
/// pass through untouched. A row whose image cannot be fetched or
/// uploaded keeps its original URL and is counted as failed; it never
/// aborts the batch.
///
/// # Errors
///
/// Returns [`R2Error`] if the input cannot be read, the output cannot be
/// written, or the URL column is missing. Per-image failures do not
/// surface here.
pub async fn hydrate_csv_images(
    r2: &R2Client,
    http: &reqwest::Client,
    input: &Path,
    output: &Path,
    column: &str,
) -> Result<HydrateStats, R2Error> {
    let data = tokio::fs::read(input).await?;
    let mut reader = csv::Reader::from_reader(data.as_slice());

    let headers = reader.headers()?.clone();
    let url_index = headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| R2Error::MissingColumn(column.to_owned()))?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers)?;

    let mut stats = HydrateStats::default();

    for result in reader.records() {
        let record = result?;
        let url = record.get(url_index).unwrap_or("").trim().to_owned();

        let rewritten = if url.is_empty() || url.starts_with(&r2.public_base) {
            stats.skipped += 1;
            url
        } else {
            match hydrate_one(r2, http, &url).await {
                Ok(Hydrated::Uploaded(public)) => {
                    stats.uploaded += 1;
                    public
                }
                Ok(Hydrated::AlreadyHosted(public)) => {
                    stats.skipped += 1;
                    public
                }
                Err(e) => {
                    log::warn!("image {url} failed: {e}, keeping original URL");
                    stats.failed += 1;
                    url
                }
            }
        };

        let cells: Vec<&str> = record
            .iter()
            .enumerate()
            .map(|(i, cell)| if i == url_index { rewritten.as_str() } else { cell })
            .collect();
        writer.write_record(&cells)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    tokio::fs::write(output, bytes).await?;

    log::info!("hydrated {}: {stats}", input.display());
    Ok(stats)
}

/// Whether [`hydrate_one`] transferred bytes or found them on R2 already.
enum Hydrated {
    Uploaded(String),
    AlreadyHosted(String),
}

/// Downloads one image and uploads it to R2, returning the public URL.
async fn hydrate_one(
    r2: &R2Client,
    http: &reqwest::Client,
    url: &str,
) -> Result<Hydrated, R2Error> {
    let key = image_key(url);

    // Key is derived from the URL, so presence means the bytes are there.
    if r2.exists(&key).await? {
        return Ok(Hydrated::AlreadyHosted(r2.public_url(&key)));
    }

    let bytes = retry::send_bytes(|| http.get(url)).await?;
    r2.upload_image(&key, bytes, content_type_for(&key)).await?;

    Ok(Hydrated::Uploaded(r2.public_url(&key)))
}

/// Derives a content-addressed object key from a source image URL.
///
/// The key is the MD5 hex digest of the full URL, preserving a known
/// image extension so the object is served with a sensible content type.
/// Query strings are part of the digest but never the extension.
#[must_use]
pub fn image_key(url: &str) -> String {
    let digest = format!("{:x}", md5::compute(url.as_bytes()));

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()));

    extension.map_or_else(
        || format!("{IMAGE_PREFIX}/{digest}"),
        |ext| format!("{IMAGE_PREFIX}/{digest}.{ext}"),
    )
}

/// MIME type for an object key, by extension.
#[must_use]
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

/// Reads a required environment variable.
fn require_env(name: &str) -> Result<String, R2Error> {
    std::env::var(name).map_err(|_| R2Error::MissingEnv {
        name: name.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_key_is_stable_and_extension_preserving() {
        let key = image_key("https://portal.example.com/photos/unit-42.JPG?w=800");
        assert!(key.starts_with("images/"));
        assert!(key.ends_with(".jpg"));
        assert_eq!(
            key,
            image_key("https://portal.example.com/photos/unit-42.JPG?w=800")
        );
    }

    #[test]
    fn image_key_differs_per_url() {
        assert_ne!(
            image_key("https://a.example.com/1.png"),
            image_key("https://a.example.com/2.png")
        );
    }

    #[test]
    fn image_key_without_known_extension_has_none() {
        let key = image_key("https://portal.example.com/photo?id=9");
        assert!(!key.contains('.'));
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("images/abc.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("images/abc.webp"), "image/webp");
        assert_eq!(content_type_for("images/abc"), "application/octet-stream");
    }

    #[test]
    fn stats_merge_and_total() {
        let mut a = HydrateStats {
            uploaded: 2,
            ..HydrateStats::default()
        };
        a.merge(HydrateStats {
            uploaded: 1,
            skipped: 3,
            failed: 1,
        });
        assert_eq!(a.uploaded, 3);
        assert_eq!(a.total(), 7);
    }
}
