//! Error types for rank tracking.

use thiserror::Error;

/// Errors that can abort a tracking session.
///
/// Malformed pages and fragments are not represented here: they degrade to
/// sentinel values and a logged warning instead of failing the session.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Regex error.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimited(u64),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every fetch attempt for one page failed.
    #[error("fetch failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        last: Box<TrackingError>,
    },
}

impl TrackingError {
    /// Check if this error is a transport failure worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited(_) | Self::HttpRequest(_)
        )
    }

    /// Get the server-suggested retry delay in seconds, if any.
    #[must_use]
    pub const fn retry_delay(&self) -> Option<u64> {
        match self {
            Self::RateLimited(seconds) => Some(*seconds),
            _ => None,
        }
    }
}

/// Convenience result alias for tracking operations.
pub type TrackingResult<T> = Result<T, TrackingError>;
