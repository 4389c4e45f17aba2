//! Single-resource retrieval with retry and capped exponential backoff
//!
//! One [`RetryingFetcher`] call downloads one remote resource to a local
//! path. Attempts are inherently serial (each depends on the previous one
//! failing) and every failure class consumes the same retry budget; there is
//! no fast-fail short-circuit for 4xx responses. An attempt's outcome is an
//! explicit classified result inspected by the retry loop, never raised/caught
//! control flow.

use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::config::FetchConfig;
use crate::error::Result;
use crate::types::{FetchFailure, FetchResult};

/// Resilient single-file fetcher
///
/// Holds one connection-pooled HTTP client reused across attempts and calls.
/// Certificate validation follows [`FetchConfig::accept_invalid_certs`]; by
/// default it is relaxed, a documented trust decision for misconfigured media
/// endpoints.
#[derive(Clone)]
pub struct RetryingFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl RetryingFetcher {
    /// Create a fetcher from a retry/transport policy
    ///
    /// # Errors
    ///
    /// Returns an error if the policy is invalid or the HTTP client cannot
    /// be constructed.
    pub fn new(config: FetchConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { client, config })
    }

    /// The policy this fetcher was built with
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Download one remote resource to `dest`
    ///
    /// Retries up to `max_attempts` with capped exponential backoff between
    /// attempts, then reports the outcome as a [`FetchResult`]. Exhaustion
    /// is a failed result with the last classified cause, never an error.
    /// The configured `inter_call_delay`, if any, is applied after a
    /// successful fetch; batch mode bypasses it.
    pub async fn fetch_one(
        &self,
        url: &str,
        dest: &Path,
        display_name: Option<&str>,
    ) -> FetchResult {
        self.fetch_with_policy(url, dest, display_name, true).await
    }

    /// Fetch with the inter-call delay toggled by the caller
    pub(crate) async fn fetch_with_policy(
        &self,
        url: &str,
        dest: &Path,
        display_name: Option<&str>,
        apply_inter_call_delay: bool,
    ) -> FetchResult {
        let max_attempts = self.config.max_attempts.max(1);
        let mut name = display_name.map(str::to_string);
        let mut last_failure = None;

        for attempt in 0..max_attempts {
            match self.attempt_fetch(url, dest, &mut name).await {
                Ok(bytes_written) => {
                    tracing::info!(
                        url = %url,
                        dest = %dest.display(),
                        bytes = bytes_written,
                        attempts = attempt + 1,
                        "fetch succeeded"
                    );
                    if apply_inter_call_delay
                        && let Some(delay) = self.config.inter_call_delay
                    {
                        tokio::time::sleep(delay).await;
                    }
                    return FetchResult {
                        success: true,
                        path: dest.to_path_buf(),
                        display_name: name.unwrap_or_else(|| display_name_from_url(url)),
                        attempts: attempt + 1,
                        error: None,
                    };
                }
                Err(failure) => {
                    tracing::warn!(
                        url = %url,
                        attempt = attempt + 1,
                        max_attempts,
                        transient = failure.is_transient(),
                        cause = %failure,
                        "fetch attempt failed"
                    );
                    last_failure = Some(failure);

                    if attempt + 1 < max_attempts {
                        let delay = backoff_delay(attempt, self.config.backoff_cap);
                        tracing::debug!(
                            url = %url,
                            delay_secs = delay.as_secs(),
                            "backing off before retry"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let cause = last_failure.unwrap_or(FetchFailure::Other {
            message: "no attempt was made".to_string(),
        });
        tracing::error!(
            url = %url,
            attempts = max_attempts,
            cause = %cause,
            "fetch failed after all attempts"
        );
        FetchResult {
            success: false,
            path: dest.to_path_buf(),
            display_name: name.unwrap_or_else(|| display_name_from_url(url)),
            attempts: max_attempts,
            error: Some(cause),
        }
    }

    /// Perform one attempt, returning bytes written or a classified failure
    async fn attempt_fetch(
        &self,
        url: &str,
        dest: &Path,
        display_name: &mut Option<String>,
    ) -> std::result::Result<u64, FetchFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::HttpStatus {
                status: status.as_u16(),
            });
        }

        if display_name.is_none() {
            *display_name = Some(display_name_from_response(&response, url));
        }

        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_failure)?;
        }

        // Stream the body to disk chunk by chunk; the file is never buffered
        // in memory as a whole.
        let mut file = tokio::fs::File::create(dest).await.map_err(io_failure)?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(classify_request_error)?;
            file.write_all(&chunk).await.map_err(io_failure)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_failure)?;

        Ok(written)
    }
}

/// Backoff before the retry following 0-indexed `attempt`: `min(2^attempt, cap)`
///
/// With the default 10-second cap the sequence is 1, 2, 4, 8, 10, 10, …
pub(crate) fn backoff_delay(attempt: u32, cap: Duration) -> Duration {
    match 1u64.checked_shl(attempt) {
        Some(secs) => Duration::from_secs(secs).min(cap),
        None => cap,
    }
}

/// Classify a reqwest error into a failure cause
///
/// Timeouts are checked first; a timed-out connect is still a timeout.
fn classify_request_error(e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        return FetchFailure::Timeout;
    }
    if is_certificate_error(&e) {
        return FetchFailure::Certificate;
    }
    if e.is_connect() {
        return FetchFailure::Connection;
    }
    FetchFailure::Other {
        message: e.to_string(),
    }
}

/// Walk the error source chain looking for transport-security causes
fn is_certificate_error(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        let text = err.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("self-signed") || text.contains("tls") {
            return true;
        }
        source = err.source();
    }
    false
}

fn io_failure(e: std::io::Error) -> FetchFailure {
    FetchFailure::Io {
        message: e.to_string(),
    }
}

/// Derive a display name from the response, falling back to the URL
fn display_name_from_response(response: &reqwest::Response, url: &str) -> String {
    let header = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok());
    display_name_from_parts(header, url)
}

/// Extract a filename from a Content-Disposition header value or a URL
///
/// Tries the header's `filename=` parameter first, then the last URL path
/// segment, then "download" as a last resort.
fn display_name_from_parts(content_disposition: Option<&str>, url: &str) -> String {
    if let Some(value) = content_disposition {
        for part in value.split(';') {
            let part = part.trim();
            if let Some(filename) = part.strip_prefix("filename=") {
                let filename = filename.trim_matches('"');
                if !filename.is_empty() {
                    return filename.to_string();
                }
            }
        }
    }
    display_name_from_url(url)
}

/// Last URL path segment, or "download" when the path has none
fn display_name_from_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url)
        && let Some(segments) = parsed.path_segments()
        && let Some(last) = segments.filter(|s| !s.is_empty()).next_back()
    {
        return last.to_string();
    }
    "download".to_string()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config(max_attempts: u32) -> FetchConfig {
        FetchConfig {
            max_attempts,
            backoff_cap: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            inter_call_delay: None,
            accept_invalid_certs: true,
        }
    }

    #[test]
    fn backoff_sequence_is_capped_exponential() {
        let cap = Duration::from_secs(10);
        let delays: Vec<u64> = (0..5).map(|a| backoff_delay(a, cap).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10]);
        // past the cap the delay stays flat
        assert_eq!(backoff_delay(6, cap), cap);
        assert_eq!(backoff_delay(63, cap), cap);
        // shift overflow saturates to the cap
        assert_eq!(backoff_delay(64, cap), cap);
    }

    #[test]
    fn backoff_delays_increase_until_cap() {
        let cap = Duration::from_secs(10);
        let mut previous = Duration::ZERO;
        for attempt in 0..4 {
            let delay = backoff_delay(attempt, cap);
            assert!(
                delay > previous,
                "delay for attempt {attempt} should exceed the previous one"
            );
            previous = delay;
        }
    }

    #[test]
    fn display_name_prefers_content_disposition() {
        let name = display_name_from_parts(
            Some("attachment; filename=\"clip.mp4\""),
            "https://cdn.example.com/v1/abc123",
        );
        assert_eq!(name, "clip.mp4");

        let unquoted =
            display_name_from_parts(Some("attachment; filename=raw.bin"), "https://x.test/a");
        assert_eq!(unquoted, "raw.bin");
    }

    #[test]
    fn display_name_falls_back_to_url_segment() {
        assert_eq!(
            display_name_from_parts(None, "https://cdn.example.com/media/video.mp4?sig=1"),
            "video.mp4"
        );
        assert_eq!(
            display_name_from_parts(Some("attachment"), "https://cdn.example.com/media/a.png"),
            "a.png"
        );
    }

    #[test]
    fn display_name_last_resort_is_download() {
        assert_eq!(display_name_from_parts(None, "https://example.com/"), "download");
        assert_eq!(display_name_from_parts(None, "not a url"), "download");
    }

    #[tokio::test]
    async fn fetch_succeeds_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/video.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out").join("video.mp4");

        let fetcher = RetryingFetcher::new(fast_config(3)).unwrap();
        let result = fetcher
            .fetch_one(&format!("{}/media/video.mp4", server.uri()), &dest, None)
            .await;

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert!(result.error.is_none());
        assert_eq!(result.display_name, "video.mp4");
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn fetch_creates_missing_destination_directories() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("deeply").join("nested").join("a.bin");

        let fetcher = RetryingFetcher::new(fast_config(1)).unwrap();
        let result = fetcher
            .fetch_one(&format!("{}/a.bin", server.uri()), &dest, None)
            .await;

        assert!(result.success);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 64);
    }

    #[tokio::test]
    async fn fetch_uses_content_disposition_for_display_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/asset"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"x".to_vec())
                    .insert_header("content-disposition", "attachment; filename=\"result.mp4\""),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = RetryingFetcher::new(fast_config(1)).unwrap();
        let result = fetcher
            .fetch_one(
                &format!("{}/v1/asset", server.uri()),
                &dir.path().join("asset.mp4"),
                None,
            )
            .await;

        assert!(result.success);
        assert_eq!(result.display_name, "result.mp4");
    }

    #[tokio::test]
    async fn provided_display_name_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/asset"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = RetryingFetcher::new(fast_config(1)).unwrap();
        let result = fetcher
            .fetch_one(
                &format!("{}/v1/asset", server.uri()),
                &dir.path().join("asset.mp4"),
                Some("My Render"),
            )
            .await;

        assert_eq!(result.display_name, "My Render");
    }

    #[tokio::test]
    async fn server_errors_consume_the_full_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = RetryingFetcher::new(fast_config(3)).unwrap();
        let result = fetcher
            .fetch_one(
                &format!("{}/flaky", server.uri()),
                &dir.path().join("flaky.bin"),
                None,
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.error, Some(FetchFailure::HttpStatus { status: 500 }));
    }

    #[tokio::test]
    async fn permanent_status_is_retried_under_the_same_budget() {
        // No fast-fail short-circuit: a 404 burns the same attempts a 503 would
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = RetryingFetcher::new(fast_config(2)).unwrap();
        let result = fetcher
            .fetch_one(
                &format!("{}/gone", server.uri()),
                &dir.path().join("gone.bin"),
                None,
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.error, Some(FetchFailure::HttpStatus { status: 404 }));
    }

    #[tokio::test]
    async fn slow_server_classifies_as_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = FetchConfig {
            request_timeout: Duration::from_millis(200),
            ..fast_config(1)
        };
        let dir = tempfile::tempdir().unwrap();
        let fetcher = RetryingFetcher::new(config).unwrap();
        let result = fetcher
            .fetch_one(
                &format!("{}/slow", server.uri()),
                &dir.path().join("slow.bin"),
                None,
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.error, Some(FetchFailure::Timeout));
    }

    #[tokio::test]
    async fn refused_connection_classifies_as_connection_failure() {
        // Bind a port, then drop the listener so connecting to it is refused
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let fetcher = RetryingFetcher::new(fast_config(1)).unwrap();
        let result = fetcher
            .fetch_one(
                &format!("http://127.0.0.1:{port}/x.bin"),
                &dir.path().join("x.bin"),
                None,
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.error, Some(FetchFailure::Connection));
    }

    #[tokio::test]
    async fn backoff_sleeps_between_failed_attempts() {
        // Attempts at 0s, ~1s, ~3s (1s then 2s of backoff)
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/always500"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let config = FetchConfig {
            backoff_cap: Duration::from_secs(10),
            ..fast_config(3)
        };
        let dir = tempfile::tempdir().unwrap();
        let fetcher = RetryingFetcher::new(config).unwrap();

        let start = std::time::Instant::now();
        let result = fetcher
            .fetch_one(
                &format!("{}/always500", server.uri()),
                &dir.path().join("x.bin"),
                None,
            )
            .await;
        let elapsed = start.elapsed();

        assert!(!result.success);
        assert!(
            elapsed >= Duration::from_secs(3),
            "expected at least 3s of backoff, got {elapsed:?}"
        );
        assert!(
            elapsed < Duration::from_secs(10),
            "backoff should not balloon, got {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn inter_call_delay_applies_to_single_fetches_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quick"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .mount(&server)
            .await;

        let config = FetchConfig {
            inter_call_delay: Some(Duration::from_millis(400)),
            ..fast_config(1)
        };
        let dir = tempfile::tempdir().unwrap();
        let fetcher = RetryingFetcher::new(config).unwrap();
        let url = format!("{}/quick", server.uri());

        let start = std::time::Instant::now();
        let single = fetcher
            .fetch_one(&url, &dir.path().join("one.bin"), None)
            .await;
        let single_elapsed = start.elapsed();

        let start = std::time::Instant::now();
        let batched = fetcher
            .fetch_with_policy(&url, &dir.path().join("two.bin"), None, false)
            .await;
        let batch_elapsed = start.elapsed();

        assert!(single.success);
        assert!(batched.success);
        assert!(
            single_elapsed >= Duration::from_millis(400),
            "single fetch should pace itself, got {single_elapsed:?}"
        );
        assert!(
            batch_elapsed < Duration::from_millis(400),
            "batch-mode fetch should skip the pacing delay, got {batch_elapsed:?}"
        );
    }
}
