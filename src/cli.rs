//! Command surface for `serp-rank`.
//!
//! ```bash
//! serp-rank -d -r -u "Mozilla" -t www.brainscape.com --query "find anatomy flashcards"
//! serp-rank -r -t www.brainscape.com --batch queries.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{CommandFactory, Parser, ValueEnum};

use crate::tracking::batch::{self, BatchEntry};
use crate::tracking::sink::results_file_path;
use crate::tracking::types::DEFAULT_MAX_PAGES;
use crate::tracking::{PageSize, PayloadFormat, RankTracker, SearchQuery, TrackerConfig, WriterSink};

/// Exit code for usage errors, matching clap's own.
const USAGE_EXIT: u8 = 2;
/// Exit code for fatal runtime failures.
const FATAL_EXIT: u8 = 1;

/// Track where a site ranks in search results for a query.
#[derive(Debug, Parser)]
#[command(name = "serp-rank", version)]
pub struct Cli {
    /// Run the search.
    #[arg(short = 'r', long)]
    pub run: bool,

    /// User agent sent with every request.
    #[arg(short = 'u', long = "user-agent", alias = "user_agent")]
    pub user_agent: Option<String>,

    /// Query to search for.
    #[arg(short = 'q', long)]
    pub query: Option<String>,

    /// Target site (exact host), e.g. www.mycompany.com.
    #[arg(short = 't', long = "target")]
    pub target_site: Option<String>,

    /// Path the matching URL must end with.
    #[arg(short = 'p', long = "target-path")]
    pub target_path: Option<String>,

    /// Highest declared page number to accept.
    #[arg(short = 'm', long = "max-pages", default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: u32,

    /// Results per page.
    #[arg(short = 's', long, value_enum, default_value_t = SizeArg::Large)]
    pub size: SizeArg,

    /// Interface language code.
    #[arg(short = 'l', long, default_value = "en")]
    pub language: String,

    /// Debug logging.
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Directory for per-query results logs.
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Payload format served by the endpoint.
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Override the search endpoint.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Tracker config file (JSON).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON list of `{"query", "target_path"}` entries to track in one run.
    #[arg(long)]
    pub batch: Option<PathBuf>,
}

/// Page-size flag values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SizeArg {
    /// 4 results per page.
    Small,
    /// 10 results per page.
    Large,
}

impl From<SizeArg> for PageSize {
    fn from(arg: SizeArg) -> Self {
        match arg {
            SizeArg::Small => Self::Small,
            SizeArg::Large => Self::Large,
        }
    }
}

/// Payload-format flag values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum FormatArg {
    /// Result listing HTML.
    Html,
    /// Legacy JSON API.
    Json,
}

impl From<FormatArg> for PayloadFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Html => Self::Html,
            FormatArg::Json => Self::Json,
        }
    }
}

impl Cli {
    /// Names of mandatory options that were not given.
    #[must_use]
    pub fn missing_options(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.run {
            missing.push("run");
        }
        if self.target_site.is_none() {
            missing.push("target");
        }
        if self.query.is_none() && self.batch.is_none() {
            missing.push("query");
        }
        missing
    }

    /// Query settings shared by single and batch runs.
    #[must_use]
    pub fn query_template(&self) -> SearchQuery {
        let mut query = SearchQuery::new(self.query.clone().unwrap_or_default())
            .with_language(self.language.clone())
            .with_page_size(self.size.into())
            .with_max_pages(self.max_pages);
        query.target_domain.clone_from(&self.target_site);
        query.target_path.clone_from(&self.target_path);
        query.user_agent.clone_from(&self.user_agent);
        query
    }

    /// Tracker config from the config file and flag overrides.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be loaded.
    pub fn tracker_config(&self) -> anyhow::Result<TrackerConfig> {
        let mut config = match &self.config {
            Some(path) => TrackerConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => TrackerConfig::default(),
        };
        if let Some(format) = self.format {
            config = config.with_format(format.into());
        }
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        Ok(config)
    }
}

/// Parse arguments, run, and map the outcome to an exit code.
#[must_use]
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    ExitCode::from(dispatch(&cli))
}

/// Validate mandatory options, then run to completion. Returns the process exit status.
fn dispatch(cli: &Cli) -> u8 {
    let missing = cli.missing_options();
    if !missing.is_empty() {
        eprintln!("Missing options: {}", missing.join(", "));
        eprintln!("{}", Cli::command().render_help());
        return USAGE_EXIT;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create runtime: {e}");
            return FATAL_EXIT;
        }
    };

    match rt.block_on(execute(cli)) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e:#}");
            FATAL_EXIT
        }
    }
}

/// `RUST_LOG` wins when set; otherwise `--debug` picks between debug and warn.
fn log_filter(debug: bool) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if debug { "debug" } else { "warn" })
    })
}

fn init_tracing(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(debug))
        .with_writer(std::io::stderr)
        .init();
}

async fn execute(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.tracker_config()?;
    let endpoint = config.endpoint.clone();
    let tracker = RankTracker::new(config).context("building tracker")?;
    let template = cli.query_template();

    if let Some(path) = &cli.batch {
        let entries = batch::load_entries(path)
            .with_context(|| format!("loading batch {}", path.display()))?;
        return run_batch(&tracker, &template, &entries, &endpoint).await;
    }

    let path = results_file_path(&cli.output_dir, &template.query);
    let mut sink = WriterSink::create(&path)
        .with_context(|| format!("creating results log {}", path.display()))?;
    tracing::debug!("writing results to {}", path.display());

    let report = tracker.track(template, &mut sink).await?;
    println!("{}", report.summary_line());
    Ok(())
}

async fn run_batch(
    tracker: &RankTracker,
    template: &SearchQuery,
    entries: &[BatchEntry],
    endpoint: &str,
) -> anyhow::Result<()> {
    let queries: Vec<SearchQuery> = entries.iter().map(|e| e.to_query(template)).collect();
    let results = tracker.track_batch(queries.clone()).await;

    let mut failures = 0;
    for (query, result) in queries.iter().zip(results) {
        match result {
            Ok(report) => {
                for line in batch::report_lines(query, &report, endpoint) {
                    println!("{line}");
                }
            }
            Err(e) => {
                failures += 1;
                println!("Searching for {}\n\tError: {e}", query.query);
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} queries failed", queries.len());
    }
    Ok(())
}
