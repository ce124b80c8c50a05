//! HTTP retry helper for transient errors.
//!
//! All remote fetches go through [`send_bytes`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so every request gets
//! bounded retry with exponential backoff for transient failures
//! (timeouts, connection resets, server errors, rate limiting). Retries
//! never change caller-observable semantics: a resource either yields its
//! bytes or a single [`IngestError`].

use std::time::Duration;

use crate::IngestError;

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (2s, 4s, 8s) the total wait before giving up
/// is 14 seconds.
const MAX_RETRIES: u32 = 3;

/// Sends an HTTP request and returns the response body bytes.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// Retries on connection errors, timeouts, HTTP 429, and HTTP 5xx.
/// Does **not** retry other 4xx statuses; those are permanent.
///
/// # Errors
///
/// Returns [`IngestError`] if the request fails after all retries or the
/// server returns a non-retryable status code.
#[allow(clippy::future_not_send)]
pub async fn send_bytes<F>(build_request: F) -> Result<Vec<u8>, IngestError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<IngestError> = None;

    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let delay = Duration::from_secs(1_u64 << attempt); // 2s, 4s, 8s
            log::warn!("  retry {attempt}/{MAX_RETRIES} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < MAX_RETRIES {
                    log::warn!("  transient error: {e}");
                    last_error = Some(IngestError::Http(e));
                    continue;
                }
                return Err(IngestError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                let url = response.url().to_string();

                // 429 and 5xx are worth retrying; other 4xx are permanent.
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < MAX_RETRIES {
                        log::warn!("  HTTP {status} from {url}");
                        last_error = Some(IngestError::HttpStatus { url, status });
                        continue;
                    }
                    return Err(IngestError::HttpStatus { url, status });
                }

                if status.is_client_error() {
                    return Err(IngestError::HttpStatus { url, status });
                }

                return Ok(response.bytes().await?.to_vec());
            }
        }
    }

    // Unreachable: the loop always returns via Ok or Err.
    Err(last_error.unwrap_or(IngestError::Parse(
        "request failed after all retries".to_owned(),
    )))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}
