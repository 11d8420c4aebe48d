//! Extraction from the legacy structured JSON search API.

use serde::Deserialize;
use tracing::warn;
use url::Url;

use super::{EXPECTED_STATUS, ExtractedPage, PageExtractor, assign_ranks, strip_markup};
use crate::tracking::types::{
    LegacyFields, MISSING_SNIPPET, PageStats, ResultRecord, UNKNOWN_TITLE, UNKNOWN_TOTAL,
};

/// Reads stats and records straight from named payload fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonExtractor;

impl JsonExtractor {
    /// Create a JSON extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PageExtractor for JsonExtractor {
    fn extract(&self, document: &str, status: u16, default_count: u32) -> ExtractedPage {
        if status != EXPECTED_STATUS {
            return ExtractedPage::empty(status);
        }

        let response: LegacyResponse = match serde_json::from_str(document) {
            Ok(r) => r,
            Err(e) => {
                warn!("malformed JSON payload: {e}");
                return ExtractedPage::empty(status);
            }
        };

        if response.response_status != EXPECTED_STATUS {
            warn!(
                status = response.response_status,
                "API refused request: {}",
                response.response_details.as_deref().unwrap_or("no details")
            );
            return ExtractedPage::empty(response.response_status);
        }

        let Some(data) = response.response_data else {
            warn!("payload has no responseData");
            return ExtractedPage::empty(status);
        };

        let cursor = data.cursor.unwrap_or_default();
        let stats = PageStats {
            // The API counts pages from zero.
            page: cursor.page_index().map_or(-1, |idx| idx + 1),
            total_results: cursor
                .estimated_result_count
                .unwrap_or_else(|| UNKNOWN_TOTAL.to_string()),
            estimated_count: u32::try_from(data.results.len()).unwrap_or(u32::MAX),
        };

        let mut records: Vec<ResultRecord> = data
            .results
            .into_iter()
            .zip(0u32..)
            .map(|(item, position)| item.into_record(&stats, position))
            .collect();
        assign_ranks(&mut records, &stats, default_count);

        ExtractedPage {
            status,
            stats,
            records,
        }
    }
}

// Legacy API response structures

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyResponse {
    response_status: u16,
    response_details: Option<String>,
    response_data: Option<LegacyData>,
}

#[derive(Debug, Deserialize)]
struct LegacyData {
    cursor: Option<Cursor>,
    #[serde(default)]
    results: Vec<LegacyItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cursor {
    estimated_result_count: Option<String>,
    current_page_index: Option<serde_json::Value>,
}

impl Cursor {
    /// Page index, whether sent as a string or a number.
    fn page_index(&self) -> Option<i32> {
        match self.current_page_index.as_ref()? {
            serde_json::Value::String(s) => s.trim().parse().ok(),
            serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyItem {
    title: Option<String>,
    content: Option<String>,
    url: Option<String>,
    visible_url: Option<String>,
    title_no_formatting: Option<String>,
    cache_url: Option<String>,
    #[serde(rename = "GsearchResultClass")]
    gsearch_result_class: Option<String>,
    unescaped_url: Option<String>,
}

impl LegacyItem {
    fn into_record(self, stats: &PageStats, position: u32) -> ResultRecord {
        let title = self
            .title
            .as_deref()
            .map(strip_markup)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let snippet = self
            .content
            .as_deref()
            .map(strip_markup)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                warn!(page = stats.page, position, "result has no content");
                MISSING_SNIPPET.to_string()
            });

        let url = self.url.or_else(|| self.unescaped_url.clone());
        let domain = self.visible_url.or_else(|| {
            url.as_deref()
                .and_then(|u| Url::parse(u).ok())
                .and_then(|u| u.host_str().map(String::from))
        });

        ResultRecord {
            title,
            url,
            domain,
            snippet,
            page: stats.page,
            position,
            rank: 0,
            total_results: stats.total_results.clone(),
            legacy: Some(LegacyFields {
                title_no_formatting: self.title_no_formatting,
                cache_url: self.cache_url,
                result_class: self.gsearch_result_class,
                unescaped_url: self.unescaped_url,
            }),
        }
    }
}
