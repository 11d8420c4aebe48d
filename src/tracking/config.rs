//! Configuration for the rank tracker.

use std::path::Path;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::{TrackingError, TrackingResult};
use super::extract::{HtmlExtractor, JsonExtractor, PageExtractor};
use super::fetch::RetryPolicy;
use super::types::PageSize;

/// HTML results endpoint.
pub const HTML_ENDPOINT: &str = "http://www.google.com/search";
/// Legacy JSON results endpoint.
pub const JSON_ENDPOINT: &str = "http://www.google.com/uds/GwebSearch";

/// Shape of the documents returned by the endpoint.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// Result listing HTML, parsed with patterns.
    #[default]
    Html,
    /// Legacy structured JSON API.
    Json,
}

impl PayloadFormat {
    /// Endpoint normally paired with this format.
    #[must_use]
    pub const fn default_endpoint(self) -> &'static str {
        match self {
            Self::Html => HTML_ENDPOINT,
            Self::Json => JSON_ENDPOINT,
        }
    }

    /// Parameters this format requires after `start`, `hl` and `q`.
    #[must_use]
    pub fn implicit_params(self, size: PageSize) -> Vec<(&'static str, &'static str)> {
        match self {
            Self::Html => Vec::new(),
            Self::Json => vec![("rsz", size.as_param()), ("key", "notsupplied"), ("v", "1.0")],
        }
    }

    /// Extraction strategy for this format.
    ///
    /// # Errors
    /// Returns an error if the HTML patterns fail to compile.
    pub fn extractor(self) -> TrackingResult<Box<dyn PageExtractor>> {
        Ok(match self {
            Self::Html => Box::new(HtmlExtractor::new()?),
            Self::Json => Box::new(JsonExtractor::new()),
        })
    }
}

/// Configuration for the tracking service.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Search endpoint, without query string.
    pub endpoint: String,
    /// Payload shape served by the endpoint.
    pub format: PayloadFormat,
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Delay between retries in milliseconds.
    pub retry_delay_ms: u64,
    /// Double the delay after every failed attempt.
    pub backoff: bool,
    /// Cap on any single retry wait in milliseconds, `Retry-After` included.
    pub max_retry_delay_ms: u64,
    /// User agents to rotate when a query has none.
    pub user_agents: Vec<String>,
    /// Sessions run at once in batch mode.
    pub max_concurrent_sessions: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: HTML_ENDPOINT.to_string(),
            format: PayloadFormat::Html,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay_ms: 1000,
            backoff: false,
            max_retry_delay_ms: 5000,
            user_agents: default_user_agents(),
            max_concurrent_sessions: 2,
        }
    }
}

impl TrackerConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a JSON file; absent keys keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> TrackingResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Switch payload format and its matching endpoint.
    #[must_use]
    pub fn with_format(mut self, format: PayloadFormat) -> Self {
        self.format = format;
        self.endpoint = format.default_endpoint().to_string();
        self
    }

    /// Set the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set retry count and delay.
    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = delay_ms;
        self
    }

    /// Set the cap on a single retry wait.
    #[must_use]
    pub const fn with_max_retry_delay(mut self, max_delay_ms: u64) -> Self {
        self.max_retry_delay_ms = max_delay_ms;
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set batch concurrency.
    #[must_use]
    pub const fn with_max_concurrent_sessions(mut self, n: usize) -> Self {
        self.max_concurrent_sessions = n;
        self
    }

    /// Check configuration invariants.
    ///
    /// # Errors
    /// Returns an error if the endpoint is not a URL or concurrency is zero.
    pub fn validate(&self) -> TrackingResult<()> {
        url::Url::parse(&self.endpoint)?;
        if self.max_concurrent_sessions == 0 {
            return Err(TrackingError::Config(
                "max_concurrent_sessions must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry policy derived from this config.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.saturating_add(1),
            delay: Duration::from_millis(self.retry_delay_ms),
            backoff: self.backoff,
            max_delay: Duration::from_millis(self.max_retry_delay_ms),
        }
    }

    /// Get a random user agent from the rotation list.
    #[must_use]
    pub fn random_user_agent(&self) -> String {
        if self.user_agents.is_empty() {
            return default_user_agents()[0].clone();
        }
        let mut rng = rand::thread_rng();
        let idx = rng.gen_range(0..self.user_agents.len());
        self.user_agents[idx].clone()
    }
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string(),
    ]
}

/// Durations as whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
