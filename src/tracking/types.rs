//! Core types for rank tracking.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title used when a fragment has no recognisable title anchor.
pub const UNKNOWN_TITLE: &str = "unknown title";
/// Snippet used when no content marker matches.
pub const MISSING_SNIPPET: &str = "-";
/// Total-result estimate used when the statistics line cannot be parsed.
pub const UNKNOWN_TOTAL: &str = "unknown";
/// Default page budget per session.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Number of results requested per page.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// Four results per page.
    Small,
    /// Ten results per page (default).
    #[default]
    Large,
}

impl PageSize {
    /// Item count for this size class.
    #[must_use]
    pub const fn items(self) -> u32 {
        match self {
            Self::Small => 4,
            Self::Large => 10,
        }
    }

    /// Value of the `rsz` parameter used by the legacy JSON API.
    #[must_use]
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Large => "large",
        }
    }
}

/// An immutable rank-tracking request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The search query string.
    pub query: String,
    /// Interface language code sent as `hl`.
    pub language: String,
    /// Page-size class.
    pub page_size: PageSize,
    /// Host a result must have to count as a match.
    pub target_domain: Option<String>,
    /// Suffix the matching result's URL must also end with.
    pub target_path: Option<String>,
    /// Maximum declared page index that is still trusted.
    pub max_pages: u32,
    /// User agent sent with every request.
    pub user_agent: Option<String>,
    /// Offset of the first request.
    pub initial_offset: u32,
    /// Engine-specific parameters appended after `start`, `hl` and `q`.
    pub extra_params: Vec<(String, String)>,
}

impl SearchQuery {
    /// Create a new query with default settings.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            language: "en".to_string(),
            page_size: PageSize::Large,
            target_domain: None,
            target_path: None,
            max_pages: DEFAULT_MAX_PAGES,
            user_agent: None,
            initial_offset: 0,
            extra_params: Vec::new(),
        }
    }

    /// Set the language code.
    #[must_use]
    pub fn with_language(mut self, lang: impl Into<String>) -> Self {
        self.language = lang.into();
        self
    }

    /// Set the page-size class.
    #[must_use]
    pub const fn with_page_size(mut self, size: PageSize) -> Self {
        self.page_size = size;
        self
    }

    /// Set the target domain.
    #[must_use]
    pub fn with_target_domain(mut self, domain: impl Into<String>) -> Self {
        self.target_domain = Some(domain.into());
        self
    }

    /// Set the target path.
    #[must_use]
    pub fn with_target_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    /// Set the page budget.
    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set the offset of the first request.
    #[must_use]
    pub const fn with_initial_offset(mut self, offset: u32) -> Self {
        self.initial_offset = offset;
        self
    }

    /// Append an engine-specific request parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }

    /// Whether `record` satisfies the target domain and, if set, the target path.
    #[must_use]
    pub fn is_target(&self, record: &ResultRecord) -> bool {
        let Some(domain) = self.target_domain.as_deref() else {
            return false;
        };
        if record.domain.as_deref() != Some(domain) {
            return false;
        }
        match self.target_path.as_deref() {
            Some(path) => record.url.as_deref().is_some_and(|url| url.ends_with(path)),
            None => true,
        }
    }
}

/// One fetched unit, before extraction.
#[derive(Clone, Debug)]
pub struct Page {
    /// Raw document text.
    pub body: String,
    /// HTTP status code.
    pub status: u16,
    /// Offset used to request this page.
    pub offset: u32,
    /// Page index declared by the document, filled in by extraction.
    pub index: Option<i32>,
}

/// Page-level statistics declared by the source document.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PageStats {
    /// 1-based page index, or -1 when unresolvable.
    pub page: i32,
    /// Total-result estimate exactly as printed (may contain separators).
    pub total_results: String,
    /// Number of fragments found on the page.
    pub estimated_count: u32,
}

impl PageStats {
    /// Stats for a page whose markers could not be found.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            page: -1,
            total_results: UNKNOWN_TOTAL.to_string(),
            estimated_count: 0,
        }
    }

    /// Whether the page index was resolved to a usable value.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.page > 0
    }
}

/// Fields only present in the legacy JSON payload.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LegacyFields {
    /// Title without highlighting markup.
    pub title_no_formatting: Option<String>,
    /// Cached copy URL.
    pub cache_url: Option<String>,
    /// Result class reported by the API.
    pub result_class: Option<String>,
    /// Destination URL before escaping.
    pub unescaped_url: Option<String>,
}

/// One extracted search result.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Title text, or [`UNKNOWN_TITLE`].
    pub title: String,
    /// Destination URL.
    pub url: Option<String>,
    /// Host of the destination URL.
    pub domain: Option<String>,
    /// Snippet text, or [`MISSING_SNIPPET`].
    pub snippet: String,
    /// Page index copied from the page stats.
    pub page: i32,
    /// 0-based position within the page.
    pub position: u32,
    /// 1-based rank across all pages.
    pub rank: u64,
    /// Total-result estimate copied from the page stats.
    pub total_results: String,
    /// Extra fields from the legacy JSON payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy: Option<LegacyFields>,
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} page: {}) {} | {} | {}",
            self.rank,
            self.page,
            self.title,
            self.snippet,
            self.url.as_deref().unwrap_or(MISSING_SNIPPET)
        )
    }
}

/// Terminal state of a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    /// A record matched the target.
    Matched,
    /// A valid page returned no results, or the page budget was spent.
    Exhausted,
    /// A page failed validity (bad status or page index beyond budget).
    Invalid,
}

impl Termination {
    /// Lowercase label for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Exhausted => "exhausted",
            Self::Invalid => "invalid",
        }
    }
}

/// Externally observable result of one session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionReport {
    /// Query text.
    pub query: String,
    /// How the session ended.
    pub termination: Termination,
    /// Every emitted record, in rank order.
    pub records: Vec<ResultRecord>,
    /// The matching record, if any.
    pub found: Option<ResultRecord>,
    /// Latest known total-result estimate.
    pub total_results: String,
    /// Number of pages fetched.
    pub pages_fetched: u32,
    /// Page budget of the query.
    pub max_pages: u32,
    /// When the session finished.
    pub checked_at: DateTime<Utc>,
}

impl SessionReport {
    /// The trailing summary line written after the records.
    #[must_use]
    pub fn summary_line(&self) -> String {
        match &self.found {
            Some(record) => format!(
                "found {record} among an estimated {} results",
                self.total_results
            ),
            None => format!(
                "not found within {} pages of an estimated {} results",
                self.max_pages, self.total_results
            ),
        }
    }
}
