//! Pattern-based extraction from result-listing HTML.
//!
//! The listing is treated as loosely structured text rather than a DOM: a
//! container marker locates the results, a boundary marker splits them into
//! fragments, and per-field patterns pull values out of each fragment.

use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use super::{EXPECTED_STATUS, ExtractedPage, PageExtractor, assign_ranks, strip_markup};
use crate::tracking::error::TrackingResult;
use crate::tracking::types::{MISSING_SNIPPET, PageStats, ResultRecord, UNKNOWN_TITLE, UNKNOWN_TOTAL};

/// Prefix the first results page leaves out of its statistics line.
const FIRST_PAGE_PREFIX: &str = "Page 1 of ";

/// Snippet classes, tried in order.
const SNIPPET_CLASSES: [&str; 2] = ["st", "s"];

/// Extracts statistics, fragments and records from result HTML.
///
/// Patterns are compiled once; extraction itself holds no mutable state.
pub struct HtmlExtractor {
    center: Regex,
    result_stats: Regex,
    stat_line: Regex,
    results: Regex,
    boundary: Regex,
    title_link: Regex,
    snippets: Vec<Regex>,
}

impl HtmlExtractor {
    /// Compile the extraction patterns.
    ///
    /// # Errors
    /// Returns an error if any pattern fails to compile.
    pub fn new() -> TrackingResult<Self> {
        let snippets = SNIPPET_CLASSES
            .iter()
            .map(|class| Regex::new(&format!(r#"<([^>\s]+)\s+class="{class}"[^>]*>"#)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            center: Regex::new(r#"(?s)<div[^>]+id="center_col"[^>]*>(.+)"#)?,
            result_stats: Regex::new(r#"<div[^>]+id="resultStats"[^>]*>([^<]+)<"#)?,
            stat_line: Regex::new(r"Page (\d+) of [aA]bout ([\d,.]+) results")?,
            results: Regex::new(
                r#"(?s)<div[^>]+id="search"[^>]*>\s*<div[^>]+id="ires"[^>]*>\s*<ol[^>]*>(.+)</ol"#,
            )?,
            boundary: Regex::new(r#"<li[^>]+class="g"[^>]*>"#)?,
            title_link: Regex::new(
                r#"(?s)<h3[^>]+class="r"[^>]*>\s*<a\s+href="([^"]+)"[^>]*>(.+?)</a>\s*</h3"#,
            )?,
            snippets,
        })
    }

    /// Parse a statistics line into `(page, total)`.
    ///
    /// Later pages read "Page 2 of about 859,000 results"; the first page only
    /// says "About 774,000 results", so a failed match is retried with the
    /// first-page prefix prepended.
    #[must_use]
    pub fn parse_stats(&self, text: &str) -> Option<(i32, String)> {
        let text = text.trim();
        let prefixed = format!("{FIRST_PAGE_PREFIX}{text}");
        let caps = self
            .stat_line
            .captures(text)
            .or_else(|| self.stat_line.captures(&prefixed))?;
        let page = caps.get(1)?.as_str().parse().ok()?;
        Some((page, caps.get(2)?.as_str().to_string()))
    }

    /// Split a document into page statistics and raw result fragments.
    ///
    /// A document without the results container yields unknown stats and no
    /// fragments.
    #[must_use]
    pub fn extract_fragments(&self, document: &str) -> (PageStats, Vec<String>) {
        let Some(center) = self.center.captures(document).and_then(|c| c.get(1)) else {
            debug!("results container not found");
            return (PageStats::unknown(), Vec::new());
        };
        let center = center.as_str();

        let (page, total_results) = self
            .result_stats
            .captures(center)
            .and_then(|c| c.get(1))
            .and_then(|m| self.parse_stats(m.as_str()))
            .unwrap_or_else(|| {
                warn!("result statistics not found or unparseable");
                (-1, UNKNOWN_TOTAL.to_string())
            });

        let fragments: Vec<String> = self
            .results
            .captures(center)
            .and_then(|c| c.get(1))
            .map(|list| {
                self.boundary
                    .split(list.as_str())
                    .filter(|f| !f.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let stats = PageStats {
            page,
            total_results,
            estimated_count: u32::try_from(fragments.len()).unwrap_or(u32::MAX),
        };
        (stats, fragments)
    }

    /// Build one record from a fragment.
    ///
    /// Never fails: unmatched fields fall back to sentinels or stay absent.
    #[must_use]
    pub fn build_record(&self, fragment: &str, stats: &PageStats, position: u32) -> ResultRecord {
        let (title, url) = match self.title_link.captures(fragment) {
            Some(caps) => {
                let title = caps
                    .get(2)
                    .map(|m| strip_markup(m.as_str()))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
                let url = caps.get(1).and_then(|m| resolve_destination(m.as_str()));
                (title, url)
            }
            None => {
                warn!(page = stats.page, position, "no title link in result fragment");
                (UNKNOWN_TITLE.to_string(), None)
            }
        };

        let domain = url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .and_then(|u| u.host_str().map(String::from));

        let snippet = self.snippet(fragment).unwrap_or_else(|| {
            warn!(page = stats.page, position, "unknown content in result fragment");
            debug!("fragment: {fragment}");
            MISSING_SNIPPET.to_string()
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
            legacy: None,
        }
    }

    /// First snippet class that matches, with its text up to the last closing tag.
    fn snippet(&self, fragment: &str) -> Option<String> {
        self.snippets.iter().find_map(|open| {
            let caps = open.captures(fragment)?;
            let tag = caps.get(1)?.as_str();
            let rest = &fragment[caps.get(0)?.end()..];
            let end = rest.rfind(&format!("</{tag}"))?;
            Some(strip_markup(&rest[..end]))
        })
    }
}

impl PageExtractor for HtmlExtractor {
    fn extract(&self, document: &str, status: u16, default_count: u32) -> ExtractedPage {
        if status != EXPECTED_STATUS {
            return ExtractedPage::empty(status);
        }

        let (stats, fragments) = self.extract_fragments(document);
        let mut records: Vec<ResultRecord> = fragments
            .iter()
            .zip(0u32..)
            .map(|(fragment, position)| self.build_record(fragment, &stats, position))
            .collect();
        assign_ranks(&mut records, &stats, default_count);

        ExtractedPage {
            status,
            stats,
            records,
        }
    }
}

/// Recover the destination URL from a redirect link like `/url?q=<dest>&sa=U`.
///
/// The destination is the first query parameter with its two-character
/// `q=` prefix stripped. Links that are already absolute are used as-is.
fn resolve_destination(href: &str) -> Option<String> {
    let href = href.replace("&amp;", "&");
    let is_absolute = href.starts_with("http://") || href.starts_with("https://");
    if is_absolute && !href.contains("/url?") {
        return Some(href);
    }

    let (_, query) = href.split_once('?')?;
    let value = query.get(2..)?.split('&').next()?;
    if value.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(value).map_or_else(|_| value.to_string(), |s| s.into_owned());
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> HtmlExtractor {
        match HtmlExtractor::new() {
            Ok(e) => e,
            Err(e) => panic!("patterns must compile: {e}"),
        }
    }

    fn result_item(host: &str, path: &str, title: &str, snippet: &str) -> String {
        format!(
            r#"<li class="g"><h3 class="r"><a href="/url?q=https://{host}{path}&amp;sa=U&amp;ei=abc">{title}</a></h3><div class="s"><span class="st">{snippet}</span></div></li>"#
        )
    }

    fn document(stats: &str, items: &[String]) -> String {
        format!(
            r#"<html><body><div id="center_col" class="x"><div id="resultStats">{stats}<nobr> (0.21 seconds)</nobr></div><div id="search"><div id="ires"><ol>{}</ol></div></div></div></body></html>"#,
            items.join("\n")
        )
    }

    #[test]
    fn test_parse_stats_both_formats() {
        let e = extractor();
        assert_eq!(e.parse_stats("About 774,000 results"), Some((1, "774,000".to_string())));
        assert_eq!(
            e.parse_stats("Page 2 of about 859,000 results"),
            Some((2, "859,000".to_string()))
        );
        assert_eq!(e.parse_stats("no numbers here"), None);
    }

    #[test]
    fn test_extract_fragments_splits_results() {
        let e = extractor();
        let items: Vec<String> = (0..3)
            .map(|i| result_item("example.com", &format!("/{i}"), "Title", "Snippet"))
            .collect();
        let (stats, fragments) = e.extract_fragments(&document("About 1,234 results", &items));
        assert_eq!(stats.page, 1);
        assert_eq!(stats.total_results, "1,234");
        assert_eq!(stats.estimated_count, 3);
        assert_eq!(fragments.len(), 3);
        assert!(fragments[2].contains("example.com/2"));
    }

    #[test]
    fn test_missing_container_is_soft() {
        let e = extractor();
        let (stats, fragments) = e.extract_fragments("<html><body>captcha</body></html>");
        assert_eq!(stats, PageStats::unknown());
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let e = extractor();
        let doc = document(
            "Page 3 of about 10 results",
            &[result_item("a.com", "/x", "A", "B")],
        );
        assert_eq!(e.extract_fragments(&doc), e.extract_fragments(&doc));
    }

    #[test]
    fn test_build_record_decodes_redirect() {
        let e = extractor();
        let stats = PageStats {
            page: 2,
            total_results: "859,000".to_string(),
            estimated_count: 10,
        };
        let fragment = result_item(
            "www.brainscape.com",
            "/subjects/biology%3Fref%3Dx",
            "Biology <b>Flashcards</b>",
            "Study <em>smarter</em> &amp; faster",
        );
        let record = e.build_record(&fragment, &stats, 3);
        assert_eq!(record.title, "Biology Flashcards");
        assert_eq!(
            record.url.as_deref(),
            Some("https://www.brainscape.com/subjects/biology?ref=x")
        );
        assert_eq!(record.domain.as_deref(), Some("www.brainscape.com"));
        assert_eq!(record.snippet, "Study smarter & faster");
        assert_eq!(record.page, 2);
        assert_eq!(record.position, 3);
        assert_eq!(record.total_results, "859,000");
    }

    #[test]
    fn test_secondary_snippet_class() {
        let e = extractor();
        let fragment = r#"<h3 class="r"><a href="/url?q=http://a.com/">A</a></h3><div class="s">Fallback text</div>"#;
        let record = e.build_record(fragment, &PageStats::unknown(), 0);
        assert_eq!(record.snippet, "Fallback text");
    }

    #[test]
    fn test_unparseable_fragment_uses_sentinels() {
        let e = extractor();
        let record = e.build_record("<p>sponsored</p>", &PageStats::unknown(), 0);
        assert_eq!(record.title, UNKNOWN_TITLE);
        assert_eq!(record.snippet, MISSING_SNIPPET);
        assert!(record.url.is_none());
        assert!(record.domain.is_none());
    }

    #[test]
    fn test_short_redirect_parameter_leaves_url_absent() {
        assert_eq!(resolve_destination("/url?q="), None);
        assert_eq!(resolve_destination("/url?q"), None);
        assert_eq!(resolve_destination("/url"), None);
        assert_eq!(
            resolve_destination("https://direct.example.com/page"),
            Some("https://direct.example.com/page".to_string())
        );
    }

    #[test]
    fn test_extract_ranks_every_fragment() {
        let e = extractor();
        let items: Vec<String> = (0..10)
            .map(|i| result_item("example.com", &format!("/{i}"), "T", "S"))
            .chain(std::iter::once(r#"<li class="g"><p>broken</p></li>"#.to_string()))
            .collect();
        let page = e.extract(&document("Page 2 of about 99 results", &items), 200, 10);
        assert_eq!(page.records.len(), 11);
        let ranks: Vec<u64> = page.records.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, (12..=22).collect::<Vec<u64>>());
        assert_eq!(page.records[10].title, UNKNOWN_TITLE);
    }

    #[test]
    fn test_non_ok_status_is_not_parsed() {
        let e = extractor();
        let doc = document("About 5 results", &[result_item("a.com", "/", "A", "B")]);
        let page = e.extract(&doc, 503, 10);
        assert_eq!(page.status, 503);
        assert!(page.records.is_empty());
    }
}
