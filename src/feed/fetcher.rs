use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_feed, FeedDocument};
use super::FeedSource;

/// Errors raised while turning a feed URL into a [`FeedDocument`].
///
/// Exactly two kinds exist: the source could not be reached (`Fetch`), or it
/// was reached but its body is not a feed (`Parse`). Both carry the URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure reaching the source
    #[error("Failed to fetch {url}: {cause}")]
    Fetch {
        url: String,
        #[source]
        cause: TransportError,
    },
    /// Source responded but the body is not a valid RSS/Atom/JSON feed
    #[error("Failed to parse feed at {url}: {reason}")]
    Parse { url: String, reason: String },
}

impl FetchError {
    /// URL the failing request was made against
    pub fn url(&self) -> &str {
        match self {
            FetchError::Fetch { url, .. } | FetchError::Parse { url, .. } => url,
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, FetchError::Parse { .. })
    }
}

/// What went wrong on the wire.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,
    /// Server kept answering 429 Too Many Requests
    #[error("rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the configured size limit
    #[error("response too large")]
    ResponseTooLarge,
    /// Received fewer bytes than Content-Length announced
    #[error("incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Tuning knobs for [`HttpFetcher`]
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub request_timeout: Duration,
    /// Retries after the first attempt for 429, 5xx and truncated bodies
    pub max_retries: u32,
    /// Backoff is `retry_base_delay * 2^attempt`
    pub retry_base_delay: Duration,
    pub max_feed_size: usize,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            max_feed_size: 10 * 1024 * 1024,
            user_agent: concat!("feedsync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

enum Attempt {
    Body(Vec<u8>),
    Status(reqwest::StatusCode),
}

/// Fetches feeds over HTTP(S) and parses them with `feed-rs`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    /// Build a fetcher with its own HTTP client
    pub fn new(config: FetcherConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    /// Build a fetcher around a caller-configured client
    pub fn with_client(client: reqwest::Client, config: FetcherConfig) -> Self {
        Self { client, config }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let mut retry_count = 0;

        loop {
            // The deadline covers headers and body together
            let attempt = tokio::time::timeout(self.config.request_timeout, self.attempt(url))
                .await
                .map_err(|_| TransportError::Timeout)?;

            let status = match attempt {
                Ok(Attempt::Body(bytes)) => return Ok(bytes),
                Ok(Attempt::Status(status)) => status,
                Err(TransportError::IncompleteResponse { expected, received })
                    if retry_count < self.config.max_retries =>
                {
                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        feed = %url,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= self.config.max_retries {
                    return Err(TransportError::RateLimited(self.config.max_retries));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    feed = %url,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if status.is_server_error() {
                if retry_count >= self.config.max_retries {
                    return Err(TransportError::HttpStatus(status.as_u16()));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    feed = %url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            // 4xx and other non-success statuses are not worth retrying
            return Err(TransportError::HttpStatus(status.as_u16()));
        }
    }

    /// One request: a non-success status is returned without reading the body
    async fn attempt(&self, url: &str) -> Result<Attempt, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(Attempt::Status(status));
        }
        read_limited_bytes(response, self.config.max_feed_size)
            .await
            .map(Attempt::Body)
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        self.config
            .retry_base_delay
            .saturating_mul(2u32.saturating_pow(retry_count))
    }
}

impl FeedSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FeedDocument, FetchError> {
        let bytes = self.fetch_bytes(url).await.map_err(|cause| FetchError::Fetch {
            url: url.to_string(),
            cause,
        })?;

        let document = parse_feed(&bytes, url).map_err(|e| FetchError::Parse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let unidentifiable = document.items.iter().filter(|i| i.url.is_none()).count();
        if unidentifiable > 0 {
            tracing::warn!(
                feed = %url,
                skipped = unidentifiable,
                "Entries without a usable link will be ignored"
            );
        }

        Ok(document)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(TransportError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(TransportError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
