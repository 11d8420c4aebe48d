//! Result-page extraction strategies.
//!
//! Each strategy turns one raw document into page statistics and ranked
//! records. Sessions only see [`PageExtractor`], so the HTML and JSON shapes
//! are interchangeable.

pub mod html;
pub mod json;

pub use html::HtmlExtractor;
pub use json::JsonExtractor;

use scraper::Html;

use super::rank;
use super::types::{PageStats, ResultRecord};

/// HTTP status a page must carry to be parsed at all.
pub const EXPECTED_STATUS: u16 = 200;

/// Statistics and records recovered from one document.
#[derive(Clone, Debug)]
pub struct ExtractedPage {
    /// Effective status (the payload may override the transport status).
    pub status: u16,
    /// Declared page statistics.
    pub stats: PageStats,
    /// One record per fragment, ranked.
    pub records: Vec<ResultRecord>,
}

impl ExtractedPage {
    /// A page that yielded nothing.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            stats: PageStats::unknown(),
            records: Vec::new(),
        }
    }
}

/// A strategy for parsing one result page.
pub trait PageExtractor: Send + Sync {
    /// Parse `document`. `default_count` is the page-size constant used for
    /// rank arithmetic when the page declares no usable item count.
    fn extract(&self, document: &str, status: u16, default_count: u32) -> ExtractedPage;
}

/// Fill in `rank` on every record of one page.
fn assign_ranks(records: &mut [ResultRecord], stats: &PageStats, default_count: u32) {
    let per_page = rank::per_page_count(stats.estimated_count, default_count);
    for record in records.iter_mut() {
        record.rank = rank::rank(stats.page, record.position, per_page).unwrap_or_default();
    }
}

/// Visible text of an HTML snippet: tags dropped, entities decoded, whitespace collapsed.
fn strip_markup(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    let text = parsed.root_element().text().collect::<String>();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
