//! Resource retrieval.
//!
//! A dataset resource is addressed by a location string: `http(s)://`
//! URLs are fetched through the retrying HTTP helper, anything else is
//! read from the local filesystem. Resources with a `.gz` suffix are
//! gzip-decompressed before CSV decoding.

use std::io::Read as _;

use serde_json::Value;

use crate::{IngestError, retry, rows};

/// Fetches a resource's raw bytes from a URL or local path, transparently
/// decompressing `.gz` resources.
///
/// # Errors
///
/// Returns [`IngestError`] if the HTTP request, file read, or gzip
/// decode fails.
pub async fn fetch_resource(
    client: &reqwest::Client,
    location: &str,
) -> Result<Vec<u8>, IngestError> {
    let bytes = if is_remote(location) {
        retry::send_bytes(|| client.get(location)).await?
    } else {
        tokio::fs::read(location).await?
    };

    if location.ends_with(".gz") {
        let mut decoder = flate2::read::GzDecoder::new(bytes.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        log::debug!(
            "Decompressed {location}: {} -> {} bytes",
            bytes.len(),
            decompressed.len()
        );
        return Ok(decompressed);
    }

    Ok(bytes)
}

/// Fetches a CSV resource and decodes it into raw row objects.
///
/// # Errors
///
/// Returns [`IngestError`] if retrieval or CSV decoding fails. This is
/// the whole-source failure boundary: row-level problems never surface
/// here.
pub async fn fetch_csv_rows(
    client: &reqwest::Client,
    location: &str,
) -> Result<Vec<Value>, IngestError> {
    let bytes = fetch_resource(client, location).await?;
    rows::parse_csv_rows(&bytes)
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[tokio::test]
    async fn reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        std::fs::write(&path, "name,lng,lat\nAlpha,1.0,2.0\n").unwrap();

        let client = reqwest::Client::new();
        let rows = fetch_csv_rows(&client, path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Alpha");
    }

    #[tokio::test]
    async fn decompresses_gzipped_resources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv.gz");

        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"name,lng,lat\nAlpha,1.0,2.0\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let client = reqwest::Client::new();
        let rows = fetch_csv_rows(&client, path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let client = reqwest::Client::new();
        let err = fetch_csv_rows(&client, "/nonexistent/points.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Io(_)));
    }
}
