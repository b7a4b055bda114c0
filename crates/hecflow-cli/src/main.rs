//! hecflow - forward GitHub Actions workflow runs to Splunk HEC
//!
//! Positional arguments follow the order the reporter has always used:
//!
//! ```text
//! hecflow <repository> <run_id> <hec_host> <hec_token> <index> [port] [scheme]
//! ```
//!
//! Every positional falls back to an environment variable, and the GitHub
//! token is read from `GITHUB_TOKEN`.

use anyhow::{Context, Result};
use clap::Parser;
use hecflow_core::source::DEFAULT_API_URL;
use hecflow_core::{
    init_tracing, EventBuilder, GitHubClient, GitHubConfig, HecClient, HecConfig, LogFormat,
    RunOutcome, RunReporter,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{warn, Level};

#[derive(Parser, Debug)]
#[command(name = "hecflow")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Forward GitHub Actions workflow runs to Splunk HEC", long_about = None)]
struct Cli {
    /// Repository as owner/name
    #[arg(env = "GITHUB_REPOSITORY")]
    repository: String,

    /// Workflow run id
    #[arg(env = "GITHUB_RUN_ID")]
    run_id: u64,

    /// HEC host name
    #[arg(env = "SPLUNK_HOST")]
    hec_host: String,

    /// HEC token
    #[arg(env = "SPLUNK_HEC_TOKEN", hide_env_values = true)]
    hec_token: String,

    /// Splunk index receiving the events
    #[arg(env = "SPLUNK_INDEX")]
    index: String,

    /// HEC port
    #[arg(env = "SPLUNK_HEC_PORT", default_value_t = 8088)]
    port: u16,

    /// HEC scheme
    #[arg(env = "SPLUNK_HEC_SCHEME", default_value = "https", value_parser = ["http", "https"])]
    scheme: String,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// GitHub REST API base URL (GitHub Enterprise)
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    github_api_url: String,

    /// User the run is attributed to
    #[arg(long, env = "GITHUB_ACTOR", default_value = "unknown")]
    user: String,

    /// Extra static field added to every event (repeatable)
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Additional run ids to report (repeatable)
    #[arg(long = "run", value_name = "RUN_ID")]
    extra_runs: Vec<u64>,

    /// Runs processed at the same time
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Timeout of each HTTP request in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Host reported on artifact and summary events (default: last job's runner)
    #[arg(long)]
    host: Option<String>,

    /// Emit job events with the `github:workflow:action` sourcetype
    #[arg(long)]
    legacy_sourcetype: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Run ids in the order given, without duplicates.
    fn run_ids(&self) -> Vec<u64> {
        let mut run_ids = vec![self.run_id];
        for run_id in &self.extra_runs {
            if !run_ids.contains(run_id) {
                run_ids.push(*run_id);
            }
        }
        run_ids
    }

    fn extra_fields(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(key, value)| (key.clone(), Value::from(value.as_str())))
            .collect()
    }
}

fn parse_field(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn build_reporter(cli: &Cli) -> Result<RunReporter> {
    let mut github = GitHubConfig::new(&cli.github_api_url).with_timeout(cli.timeout_secs);
    match &cli.github_token {
        Some(token) => github = github.with_token(token),
        None => warn!("GITHUB_TOKEN is not set, GitHub requests are unauthenticated"),
    }
    let source = GitHubClient::new(github).context("Failed to create GitHub client")?;

    let hec = HecConfig::new(&cli.hec_host, cli.port, &cli.hec_token)
        .with_scheme(&cli.scheme)
        .with_timeout(cli.timeout_secs);
    let sink = HecClient::new(hec).context("Failed to create HEC client")?;

    let builder = EventBuilder::new(&cli.index, &cli.user)
        .with_fields(cli.extra_fields())
        .with_legacy_sourcetype(cli.legacy_sourcetype);

    let mut reporter = RunReporter::new(Arc::new(source), Arc::new(sink), builder, &cli.repository);
    if let Some(host) = &cli.host {
        reporter = reporter.with_host(host);
    }
    Ok(reporter)
}

fn outcome_json(outcome: &RunOutcome) -> Value {
    json!({
        "run_id": outcome.run_id,
        "phase": outcome.phase.to_string(),
        "jobs_emitted": outcome.jobs_emitted,
        "jobs_skipped": outcome.jobs_skipped,
        "artifacts_emitted": outcome.artifacts_emitted,
        "accepted": outcome.deliveries.accepted,
        "rejected": outcome.deliveries.rejected,
        "unreachable": outcome.deliveries.unreachable,
        "duration_in_seconds": outcome.report.duration_in_seconds,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(format, level);

    let reporter = build_reporter(&cli)?;
    let run_ids = cli.run_ids();

    let mut failed = 0usize;
    for (run_id, result) in reporter.report_runs(&run_ids, cli.concurrency).await {
        match result {
            Ok(outcome) => println!("{}", outcome_json(&outcome)),
            Err(e) => {
                failed += 1;
                eprintln!("run {}: {}", run_id, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!(
            "{} of {} run(s) of {} could not be reported",
            failed,
            run_ids.len(),
            reporter.repository()
        );
    }
    Ok(())
}
