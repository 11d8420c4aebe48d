//! Recurring rank checks over a list of queries.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::encoding::build_url;
use super::error::TrackingResult;
use super::types::{SearchQuery, SessionReport};

/// One query to track and the page it should land on.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Query text.
    pub query: String,
    /// Path the target URL must end with.
    #[serde(default)]
    pub target_path: Option<String>,
}

impl BatchEntry {
    /// Build a query from `template`, replacing its text and target path.
    #[must_use]
    pub fn to_query(&self, template: &SearchQuery) -> SearchQuery {
        SearchQuery {
            query: self.query.clone(),
            target_path: self.target_path.clone(),
            ..template.clone()
        }
    }
}

/// Load batch entries from a JSON array.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_entries(path: &Path) -> TrackingResult<Vec<BatchEntry>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Log lines for one finished batch query.
#[must_use]
pub fn report_lines(query: &SearchQuery, report: &SessionReport, endpoint: &str) -> Vec<String> {
    let mut lines = vec![format!("Searching for {}", query.query)];
    match &report.found {
        Some(found) => lines.push(format!(
            "\tFound {:?} at index: {}",
            found.url.as_deref().unwrap_or_default(),
            found.rank
        )),
        None => lines.push(format!(
            "\tUnable to find: {}{}. Check manually: {}",
            query.target_domain.as_deref().unwrap_or_default(),
            query.target_path.as_deref().unwrap_or_default(),
            build_url(endpoint, &[("start", "0"), ("q", query.query.as_str())])
        )),
    }
    lines
}
