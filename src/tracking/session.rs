//! One query's pagination run.
//!
//! A [`Session`] walks result pages one at a time: fetch, extract, decide.
//! Offsets advance by one page-size unit between fetches, never before the
//! first one. The loop ends when a record matches the target, a valid page
//! comes back empty, or a page fails validity.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::config::TrackerConfig;
use super::encoding::build_url;
use super::error::TrackingResult;
use super::extract::{EXPECTED_STATUS, ExtractedPage, PageExtractor};
use super::fetch::{Fetcher, RetryPolicy, fetch_with_retry};
use super::sink::Sink;
use super::types::{Page, ResultRecord, SearchQuery, SessionReport, Termination, UNKNOWN_TOTAL};

/// Where a session is in its fetch/parse cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// Nothing fetched yet.
    Init,
    /// A request is in flight.
    Fetching,
    /// A document is being extracted.
    Parsing,
    /// The last page was valid, non-empty and unmatched.
    Continue,
    /// The session has ended.
    Done(Termination),
}

/// Transport and endpoint settings shared by sessions.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    /// Search endpoint.
    pub endpoint: String,
    /// Format-specific parameters.
    pub implicit_params: Vec<(String, String)>,
    /// Retry schedule for fetches.
    pub retry: RetryPolicy,
    /// User agent used when the query has none.
    pub fallback_user_agent: Option<String>,
}

impl SessionSettings {
    /// Settings for `query` derived from `config`.
    #[must_use]
    pub fn for_query(config: &TrackerConfig, query: &SearchQuery) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            implicit_params: config
                .format
                .implicit_params(query.page_size)
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            retry: config.retry_policy(),
            fallback_user_agent: Some(config.random_user_agent()),
        }
    }
}

/// Records emitted by one page and the state it left the session in.
#[derive(Clone, Debug)]
pub struct PageOutcome {
    /// The fetched page.
    pub page: Page,
    /// Records emitted, in rank order. Stops at a match; empty for invalid pages.
    pub records: Vec<ResultRecord>,
    /// State after this page.
    pub state: SessionState,
}

/// Mutable iteration state for one query.
pub struct Session<'a> {
    query: SearchQuery,
    fetcher: &'a dyn Fetcher,
    extractor: &'a dyn PageExtractor,
    settings: SessionSettings,
    offset: u32,
    sent: bool,
    state: SessionState,
    pages_fetched: u32,
    total_results: Option<String>,
    found: Option<ResultRecord>,
}

impl<'a> Session<'a> {
    /// Create a session positioned at the query's initial offset.
    #[must_use]
    pub fn new(
        query: SearchQuery,
        fetcher: &'a dyn Fetcher,
        extractor: &'a dyn PageExtractor,
        settings: SessionSettings,
    ) -> Self {
        Self {
            offset: query.initial_offset,
            query,
            fetcher,
            extractor,
            settings,
            sent: false,
            state: SessionState::Init,
            pages_fetched: 0,
            total_results: None,
            found: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Offset of the most recent (or, before any fetch, the first) request.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Pages fetched so far.
    #[must_use]
    pub const fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// The query this session tracks.
    #[must_use]
    pub const fn query(&self) -> &SearchQuery {
        &self.query
    }

    /// Request URL for the current offset.
    #[must_use]
    pub fn request_url(&self) -> String {
        let start = self.offset.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("start", start.as_str()),
            ("hl", self.query.language.as_str()),
            ("q", self.query.query.as_str()),
        ];
        params.extend(
            self.settings
                .implicit_params
                .iter()
                .chain(self.query.extra_params.iter())
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        build_url(&self.settings.endpoint, &params)
    }

    fn user_agent(&self) -> Option<&str> {
        self.query
            .user_agent
            .as_deref()
            .or(self.settings.fallback_user_agent.as_deref())
    }

    /// Fetch and evaluate the next page.
    ///
    /// Returns `None` once the session has ended.
    ///
    /// # Errors
    /// Returns an error when the fetch fails after every retry.
    pub async fn next_page(&mut self) -> TrackingResult<Option<PageOutcome>> {
        if matches!(self.state, SessionState::Done(_)) {
            return Ok(None);
        }

        // At most `max_pages` fetches, even when declared page numbers never advance.
        if self.pages_fetched >= self.query.max_pages {
            warn!(
                query = %self.query.query,
                "fetched {} pages, page budget spent", self.pages_fetched
            );
            self.state = SessionState::Done(Termination::Exhausted);
            return Ok(None);
        }

        if self.sent {
            self.offset += self.query.page_size.items();
        }
        let url = self.request_url();
        self.sent = true;
        self.state = SessionState::Fetching;

        let user_agent = self.user_agent();
        debug!("curl -A {:?} -XGET {url:?}", user_agent.unwrap_or_default());
        let response = fetch_with_retry(self.fetcher, &url, user_agent, &self.settings.retry).await?;
        self.pages_fetched += 1;

        self.state = SessionState::Parsing;
        let extracted =
            self.extractor
                .extract(&response.body, response.status, self.query.page_size.items());

        let page = Page {
            body: response.body,
            status: response.status,
            offset: self.offset,
            index: extracted.stats.is_resolved().then_some(extracted.stats.page),
        };

        let (state, records) = self.evaluate(extracted);
        self.state = state;
        Ok(Some(PageOutcome {
            page,
            records,
            state,
        }))
    }

    /// Apply the validity, exhaustion and match rules to one extracted page.
    fn evaluate(&mut self, extracted: ExtractedPage) -> (SessionState, Vec<ResultRecord>) {
        let stats = &extracted.stats;
        let over_budget = i64::from(stats.page) > i64::from(self.query.max_pages);
        if extracted.status != EXPECTED_STATUS || over_budget {
            info!(
                query = %self.query.query,
                status = extracted.status,
                page = stats.page,
                "invalid page, stopping"
            );
            return (SessionState::Done(Termination::Invalid), Vec::new());
        }

        if extracted.records.is_empty() {
            debug!(offset = self.offset, "no results on page");
            return (SessionState::Done(Termination::Exhausted), Vec::new());
        }

        if !stats.is_resolved() {
            warn!(offset = self.offset, "page index unresolved, ranks undefined");
            return (SessionState::Done(Termination::Invalid), Vec::new());
        }

        if stats.total_results != UNKNOWN_TOTAL {
            self.total_results = Some(stats.total_results.clone());
        }

        let mut emitted = Vec::with_capacity(extracted.records.len());
        for record in extracted.records {
            let matched = self.query.is_target(&record);
            if !matched && self.is_other_target_page(&record) {
                info!(
                    "other {:?} (not: {}) at index: {}",
                    record.url.as_deref().unwrap_or_default(),
                    self.query.target_path.as_deref().unwrap_or_default(),
                    record.rank
                );
            }
            emitted.push(record);
            if matched {
                self.found = emitted.last().cloned();
                return (SessionState::Done(Termination::Matched), emitted);
            }
        }

        debug!(page = stats.page, count = emitted.len(), "no match, continuing");
        (SessionState::Continue, emitted)
    }

    /// Right domain, wrong path.
    fn is_other_target_page(&self, record: &ResultRecord) -> bool {
        self.query.target_path.is_some()
            && self.query.target_domain.is_some()
            && record.domain == self.query.target_domain
    }

    /// Run to a terminal state, streaming every emitted record into `sink`.
    ///
    /// # Errors
    /// Returns an error on fetch exhaustion or when the sink fails.
    pub async fn run(mut self, sink: &mut dyn Sink) -> TrackingResult<SessionReport> {
        info!(query = %self.query.query, "searching");
        let mut records = Vec::new();
        while let Some(outcome) = self.next_page().await? {
            for record in &outcome.records {
                sink.record(record)?;
            }
            records.extend(outcome.records);
        }

        let termination = match self.state {
            SessionState::Done(t) => t,
            _ => Termination::Exhausted,
        };
        let report = SessionReport {
            query: self.query.query.clone(),
            termination,
            records,
            found: self.found.take(),
            total_results: self
                .total_results
                .take()
                .unwrap_or_else(|| UNKNOWN_TOTAL.to_string()),
            pages_fetched: self.pages_fetched,
            max_pages: self.query.max_pages,
            checked_at: Utc::now(),
        };
        info!(
            query = %report.query,
            termination = termination.name(),
            pages = report.pages_fetched,
            "session finished"
        );
        sink.finish(&report)?;
        Ok(report)
    }
}
