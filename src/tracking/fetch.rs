//! HTTP fetching and the retry policy around it.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, RETRY_AFTER, USER_AGENT};

use super::config::TrackerConfig;
use super::error::{TrackingError, TrackingResult};

/// Boxed future type for fetch operations.
pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Status and body of one GET.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, lossily decoded as UTF-8.
    pub body: String,
}

/// Transport used by sessions to retrieve result pages.
///
/// Non-success statuses are returned as responses; only transport failures
/// are errors.
pub trait Fetcher: Send + Sync {
    /// GET `url`, sending `user_agent` when given.
    ///
    /// # Errors
    /// Returns an error if the request cannot be completed.
    fn get<'a>(
        &'a self,
        url: &'a str,
        user_agent: Option<&'a str>,
    ) -> FetchFuture<'a, TrackingResult<FetchResponse>>;
}

/// `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with timeouts and headers from `config`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &TrackerConfig) -> TrackingResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| TrackingError::HttpClient(e.to_string()))?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn get<'a>(
        &'a self,
        url: &'a str,
        user_agent: Option<&'a str>,
    ) -> FetchFuture<'a, TrackingResult<FetchResponse>> {
        Box::pin(async move {
            let mut request = self.client.get(url);
            if let Some(ua) = user_agent {
                request = request.header(USER_AGENT, ua);
            }

            let response = request.send().await.map_err(classify)?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let wait = retry_after_secs(response.headers().get(RETRY_AFTER));
                return Err(TrackingError::RateLimited(wait));
            }

            let bytes = response.bytes().await.map_err(classify)?;
            Ok(FetchResponse {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            })
        })
    }
}

/// Seconds to wait when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Parse a delta-seconds `Retry-After` value. HTTP dates and garbage fall back
/// to the default; the retry loop clamps whatever comes out.
fn retry_after_secs(value: Option<&HeaderValue>) -> u64 {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn classify(err: reqwest::Error) -> TrackingError {
    if err.is_timeout() {
        TrackingError::Timeout
    } else {
        TrackingError::HttpRequest(err)
    }
}

/// Bounded retry schedule for transport failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub delay: Duration,
    /// Double the delay after each failure.
    pub backoff: bool,
    /// Upper bound on any single wait, including server-requested ones.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the `attempt`-th failure (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let delay = if self.backoff {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            self.delay.saturating_mul(factor)
        } else {
            self.delay
        };
        delay.min(self.max_delay)
    }
}

/// GET `url`, retrying retryable failures according to `policy`.
///
/// # Errors
/// Returns non-retryable errors immediately, and `RetriesExhausted` once the
/// attempt budget is spent.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    user_agent: Option<&str>,
    policy: &RetryPolicy,
) -> TrackingResult<FetchResponse> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetcher.get(url, user_agent).await {
            Ok(response) => return Ok(response),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if attempt >= max_attempts => {
                return Err(TrackingError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            Err(err) => {
                let delay = err
                    .retry_delay()
                    .map_or_else(|| policy.delay_after(attempt), Duration::from_secs)
                    .min(policy.max_delay);
                tracing::warn!(
                    "fetch attempt {attempt}/{max_attempts} failed: {err}; retrying in {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
