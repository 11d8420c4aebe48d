//! End-to-end tracking runs against canned result pages.

use std::sync::{Arc, Mutex};

use serp_rank::tracking::fetch::FetchFuture;
use serp_rank::tracking::{
    CollectingSink, FetchResponse, Fetcher, PayloadFormat, RankTracker, SearchQuery,
    Termination, TrackerConfig, TrackingError, TrackingResult,
};

/// Serves pages in order, or routes by a substring of the request URL.
struct Scripted {
    pages: Mutex<Vec<FetchResponse>>,
    routes: Vec<(String, FetchResponse)>,
    urls: Mutex<Vec<String>>,
    fail: bool,
}

impl Scripted {
    fn pages(mut pages: Vec<FetchResponse>) -> Self {
        pages.reverse();
        Self {
            pages: Mutex::new(pages),
            routes: Vec::new(),
            urls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn routes(routes: Vec<(&str, FetchResponse)>) -> Self {
        Self {
            routes: routes.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            ..Self::pages(Vec::new())
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::pages(Vec::new())
        }
    }

    fn urls(&self) -> Vec<String> {
        self.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl Fetcher for Scripted {
    fn get<'a>(
        &'a self,
        url: &'a str,
        _user_agent: Option<&'a str>,
    ) -> FetchFuture<'a, TrackingResult<FetchResponse>> {
        Box::pin(async move {
            if let Ok(mut urls) = self.urls.lock() {
                urls.push(url.to_string());
            }
            if self.fail {
                return Err(TrackingError::Timeout);
            }
            if let Some((_, page)) = self.routes.iter().find(|(needle, _)| url.contains(needle)) {
                return Ok(page.clone());
            }
            let next = self.pages.lock().ok().and_then(|mut p| p.pop());
            Ok(next.unwrap_or_else(|| html_page("About 0 results", &[])))
        })
    }
}

fn item(url: &str, title: &str) -> String {
    format!(
        r#"<li class="g"><h3 class="r"><a href="/url?q={url}&amp;sa=U&amp;ei=x">{title}</a></h3><div class="s"><span class="st">About <b>{title}</b></span></div></li>"#
    )
}

fn html_page(stats: &str, urls: &[&str]) -> FetchResponse {
    let items: String = urls.iter().map(|u| item(u, "Result")).collect();
    html_body(stats, &items)
}

fn html_body(stats: &str, items: &str) -> FetchResponse {
    FetchResponse {
        status: 200,
        body: format!(
            r#"<html><body><div id="center_col"><div id="resultStats">{stats}<nobr> (0.21 seconds)</nobr></div><div id="search"><div id="ires"><ol>{items}</ol></div></div></div></body></html>"#
        ),
    }
}

fn filler(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://{prefix}{i}.example.com/page")).collect()
}

fn tracker(config: TrackerConfig, fetcher: Arc<Scripted>) -> RankTracker {
    match RankTracker::with_fetcher(config, fetcher) {
        Ok(t) => t,
        Err(e) => panic!("tracker must build: {e}"),
    }
}

fn quick_config() -> TrackerConfig {
    TrackerConfig::default().with_retries(1, 1)
}

#[tokio::test]
async fn test_target_found_on_second_page() {
    let first = filler("a", 10);
    let mut second = filler("b", 10);
    second[3] = "https://www.brainscape.com/subjects/anatomy".to_string();
    let first: Vec<&str> = first.iter().map(String::as_str).collect();
    let second: Vec<&str> = second.iter().map(String::as_str).collect();

    let fetcher = Arc::new(Scripted::pages(vec![
        html_page("About 1,250,000 results", &first),
        html_page("Page 2 of about 1,250,000 results", &second),
    ]));
    let tracker = tracker(quick_config(), Arc::clone(&fetcher));
    let query = SearchQuery::new("find anatomy flashcards").with_target_domain("www.brainscape.com");

    let mut sink = CollectingSink::default();
    let report = match tracker.track(query, &mut sink).await {
        Ok(r) => r,
        Err(e) => panic!("session failed: {e}"),
    };

    assert_eq!(report.termination, Termination::Matched);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.total_results, "1,250,000");
    assert_eq!(report.found.as_ref().map(|r| r.rank), Some(14));
    assert_eq!(report.found.as_ref().map(|r| r.page), Some(2));
    assert_eq!(sink.records.len(), 14);

    let ranks: Vec<u64> = sink.records.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, (1..=14).collect::<Vec<u64>>());

    let urls = fetcher.urls();
    assert_eq!(urls.len(), 2);
    assert!(urls[0].contains("start=0&hl=en&q=find+anatomy+flashcards"));
    assert!(urls[1].contains("start=10&"));
    assert_eq!(
        sink.summary.as_deref(),
        Some(
            "found #14 page: 2) Result | About Result | https://www.brainscape.com/subjects/anatomy \
             among an estimated 1,250,000 results"
        )
    );
}

#[tokio::test]
async fn test_target_path_must_match() {
    let fetcher = Arc::new(Scripted::pages(vec![
        html_page(
            "About 500 results",
            &["https://www.brainscape.com/", "https://other.com/learn/spanish"],
        ),
        html_page(
            "Page 2 of about 500 results",
            &["https://www.brainscape.com/learn/spanish", "https://z.com/"],
        ),
    ]));
    let tracker = tracker(quick_config(), fetcher);
    let query = SearchQuery::new("learn spanish")
        .with_target_domain("www.brainscape.com")
        .with_target_path("/learn/spanish");

    let mut sink = CollectingSink::default();
    let report = tracker.track(query, &mut sink).await.ok();

    let found = report.and_then(|r| r.found);
    assert_eq!(found.as_ref().map(|r| r.rank), Some(3));
    assert_eq!(found.and_then(|r| r.url).as_deref(), Some("https://www.brainscape.com/learn/spanish"));
}

#[tokio::test]
async fn test_page_past_budget_is_invalid() {
    let fetcher = Arc::new(Scripted::pages(vec![html_page(
        "Page 2 of about 40 results",
        &["https://www.brainscape.com/"],
    )]));
    let tracker = tracker(quick_config(), Arc::clone(&fetcher));
    let query = SearchQuery::new("flashcards")
        .with_target_domain("www.brainscape.com")
        .with_max_pages(1);

    let mut sink = CollectingSink::default();
    let report = tracker.track(query, &mut sink).await.ok();

    assert_eq!(report.as_ref().map(|r| r.termination), Some(Termination::Invalid));
    assert!(report.is_some_and(|r| r.found.is_none()));
    assert!(sink.records.is_empty());
    assert_eq!(fetcher.urls().len(), 1);
    assert_eq!(
        sink.summary.as_deref(),
        Some("not found within 1 pages of an estimated unknown results")
    );
}

#[tokio::test]
async fn test_unparseable_results_keep_their_rank() {
    let items = format!(
        "{}{}{}",
        item("https://a.example.com/", "First"),
        r#"<li class="g"><div class="video">no title, no snippet</div></li>"#,
        item("https://target.example.com/", "Third"),
    );
    let fetcher = Arc::new(Scripted::pages(vec![html_body("About 3 results", &items)]));
    let tracker = tracker(quick_config(), fetcher);
    let query = SearchQuery::new("q").with_target_domain("target.example.com");

    let mut sink = CollectingSink::default();
    let report = tracker.track(query, &mut sink).await.ok();

    assert_eq!(sink.records.len(), 3);
    assert_eq!(sink.records[1].title, "unknown title");
    assert_eq!(sink.records[1].snippet, "-");
    assert_eq!(sink.records[1].url, None);
    assert_eq!(sink.records[1].rank, 2);
    assert_eq!(report.and_then(|r| r.found).map(|r| r.rank), Some(3));
}

#[tokio::test]
async fn test_transport_failure_is_fatal() {
    let fetcher = Arc::new(Scripted::failing());
    let tracker = tracker(quick_config(), Arc::clone(&fetcher));
    let query = SearchQuery::new("q").with_target_domain("a.com");

    let mut sink = CollectingSink::default();
    let result = tracker.track(query, &mut sink).await;

    assert!(matches!(
        result,
        Err(TrackingError::RetriesExhausted { attempts: 2, .. })
    ));
    assert_eq!(fetcher.urls().len(), 2);
    assert!(sink.summary.is_none());
}

#[tokio::test]
async fn test_json_format_flow() {
    let body = r#"{
        "responseData": {
            "results": [
                {"GsearchResultClass": "GwebSearch", "url": "https://a.com/x", "visibleUrl": "a.com",
                 "title": "<b>A</b>", "titleNoFormatting": "A", "content": "first"},
                {"GsearchResultClass": "GwebSearch", "url": "https://www.brainscape.com/",
                 "unescapedUrl": "https://www.brainscape.com/", "visibleUrl": "www.brainscape.com",
                 "cacheUrl": "http://cache.test/1", "title": "Brainscape",
                 "titleNoFormatting": "Brainscape", "content": "Smart &amp; fast"}
            ],
            "cursor": {"estimatedResultCount": "120", "currentPageIndex": 0}
        },
        "responseDetails": null,
        "responseStatus": 200
    }"#;
    let fetcher = Arc::new(Scripted::pages(vec![FetchResponse {
        status: 200,
        body: body.to_string(),
    }]));
    let config = quick_config().with_format(PayloadFormat::Json);
    let tracker = tracker(config, Arc::clone(&fetcher));
    let query = SearchQuery::new("flashcards").with_target_domain("www.brainscape.com");

    let mut sink = CollectingSink::default();
    let report = tracker.track(query, &mut sink).await.ok();

    let found = report.and_then(|r| r.found);
    assert_eq!(found.as_ref().map(|r| r.rank), Some(2));
    assert_eq!(found.as_ref().map(|r| r.snippet.as_str()), Some("Smart & fast"));
    assert_eq!(
        found
            .and_then(|r| r.legacy)
            .and_then(|l| l.cache_url)
            .as_deref(),
        Some("http://cache.test/1")
    );

    let urls = fetcher.urls();
    assert_eq!(
        urls[0],
        "http://www.google.com/uds/GwebSearch?start=0&hl=en&q=flashcards&rsz=large&key=notsupplied&v=1.0"
    );
}

#[tokio::test]
async fn test_batch_reports_in_input_order() {
    let fetcher = Arc::new(Scripted::routes(vec![
        ("q=alpha", html_page("About 5 results", &["https://x.com/", "https://www.brainscape.com/"])),
        ("q=beta", html_page("About 0 results", &[])),
    ]));
    let config = quick_config().with_max_concurrent_sessions(2);
    let tracker = tracker(config, fetcher);
    let template = SearchQuery::new("").with_target_domain("www.brainscape.com");
    let queries = vec![
        SearchQuery {
            query: "beta".to_string(),
            ..template.clone()
        },
        SearchQuery {
            query: "alpha".to_string(),
            ..template
        },
    ];

    let reports: Vec<_> = tracker
        .track_batch(queries)
        .await
        .into_iter()
        .filter_map(Result::ok)
        .collect();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].query, "beta");
    assert_eq!(reports[0].termination, Termination::Exhausted);
    assert_eq!(reports[1].query, "alpha");
    assert_eq!(reports[1].found.as_ref().map(|r| r.rank), Some(2));
}
