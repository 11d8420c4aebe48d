//! Search-result rank tracking.
//!
//! This module walks paginated result listings for a query and reports where
//! a target site first appears:
//! - Pattern-based extraction from result HTML, or the legacy JSON API
//! - Page-local global rank arithmetic
//! - A pagination session with a target-match stopping rule
//! - Bounded retries around the HTTP transport
//! - Batch runs over many queries

pub mod batch;
pub mod config;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod rank;
pub mod session;
pub mod sink;
pub mod types;

pub use batch::BatchEntry;
pub use config::{PayloadFormat, TrackerConfig};
pub use error::{TrackingError, TrackingResult};
pub use extract::{ExtractedPage, HtmlExtractor, JsonExtractor, PageExtractor};
pub use fetch::{FetchResponse, Fetcher, HttpFetcher};
pub use session::{Session, SessionSettings, SessionState};
pub use sink::{CollectingSink, Sink, WriterSink};
pub use types::{PageSize, PageStats, ResultRecord, SearchQuery, SessionReport, Termination};

use std::sync::Arc;

use futures::stream::{self, StreamExt};

/// Runs tracking sessions against one endpoint.
pub struct RankTracker {
    config: TrackerConfig,
    fetcher: Arc<dyn Fetcher>,
    extractor: Box<dyn PageExtractor>,
}

impl RankTracker {
    /// Create a tracker with an HTTP fetcher built from `config`.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot be created.
    pub fn new(config: TrackerConfig) -> Result<Self, TrackingError> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Create a tracker over any fetcher.
    ///
    /// # Errors
    /// Returns an error if the config is invalid.
    pub fn with_fetcher(
        config: TrackerConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, TrackingError> {
        config.validate()?;
        let extractor = config.format.extractor()?;
        Ok(Self {
            config,
            fetcher,
            extractor,
        })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// A fresh session for `query`, to be driven page by page.
    #[must_use]
    pub fn session(&self, query: SearchQuery) -> Session<'_> {
        let settings = SessionSettings::for_query(&self.config, &query);
        Session::new(query, self.fetcher.as_ref(), self.extractor.as_ref(), settings)
    }

    /// Track one query to completion, streaming records into `sink`.
    ///
    /// # Errors
    /// Returns an error if fetching fails after every retry or the sink fails.
    pub async fn track(
        &self,
        query: SearchQuery,
        sink: &mut dyn Sink,
    ) -> Result<SessionReport, TrackingError> {
        self.session(query).run(sink).await
    }

    /// Track many independent queries, at most `max_concurrent_sessions` at once.
    ///
    /// Reports come back in input order; one failed query does not stop the others.
    pub async fn track_batch(
        &self,
        queries: Vec<SearchQuery>,
    ) -> Vec<Result<SessionReport, TrackingError>> {
        stream::iter(queries)
            .map(|query| async move {
                let mut sink = CollectingSink::default();
                self.track(query, &mut sink).await
            })
            .buffered(self.config.max_concurrent_sessions)
            .collect()
            .await
    }
}
