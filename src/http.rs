//! Outbound HTTP shared by the source adapters.
//!
//! Both the trending API client and the RSS/Atom fetcher go through
//! [`fetch_bytes`], which applies a per-request timeout, bounded retries with
//! exponential backoff, and a response size cap.

use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// 10MB, far above any legitimate feed or API payload
pub const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Errors that can occur while talking to an upstream source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded [`MAX_RESPONSE_SIZE`]
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// JSON payload did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Timeout and backoff settings for one upstream.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// GET `url` and return the body.
///
/// - 429, 5xx, and truncated bodies are retried up to `max_retries` times
/// - other non-2xx statuses fail immediately
/// - bodies over [`MAX_RESPONSE_SIZE`] are rejected
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, FetchError> {
    let mut retry_count = 0;

    loop {
        let response = tokio::time::timeout(policy.timeout, client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if retry_count >= policy.max_retries {
                return Err(if status.is_server_error() {
                    FetchError::HttpStatus(status.as_u16())
                } else {
                    FetchError::RateLimited(policy.max_retries)
                });
            }

            let delay = policy.delay(retry_count);
            tracing::warn!(
                url = %url,
                status = %status,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Upstream busy, backing off"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        // 4xx errors fail immediately
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        match read_limited_bytes(response, MAX_RESPONSE_SIZE).await {
            Ok(bytes) => return Ok(bytes),
            Err(FetchError::IncompleteResponse { expected, received })
                if retry_count < policy.max_retries =>
            {
                let delay = policy.delay(retry_count);
                tracing::debug!(
                    url = %url,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    "Retrying incomplete download"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
