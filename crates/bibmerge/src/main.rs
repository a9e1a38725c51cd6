//! bibmerge - Entry Point
//!
//! Fetches, merges and normalizes the bibliography, writes JSON lines, and
//! publishes when a credential is available. The run summary goes to stdout,
//! logs to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use bibmerge::config::{self, Config};
use bibmerge::formatters::{format_report_json, format_report_markdown};
use bibmerge::models::{AuthorStyle, FieldSelection};
use bibmerge::{Pipeline, PipelineError};

#[derive(Parser, Debug)]
#[command(name = "bibmerge")]
#[command(about = "Merge a BibTeX bibliography into a JSON-lines dataset")]
#[command(version)]
struct Cli {
    /// Abbreviations (@string definitions) source URL
    #[arg(long, env = config::env::ABBREV_URL, default_value = config::sources::ABBREV_URL)]
    abbrev_url: String,

    /// Main bibliography source URL
    #[arg(long, env = config::env::MAIN_URL, default_value = config::sources::MAIN_URL)]
    main_url: String,

    /// Output fields: all, minimal, standard, or a comma-separated list
    #[arg(long, env = config::env::FIELDS, default_value = "all")]
    fields: FieldSelection,

    /// How author and editor lists are written
    #[arg(long, value_enum, default_value_t = AuthorStyle::Raw)]
    author_style: AuthorStyle,

    /// Output file
    #[arg(short, long, env = config::env::OUTPUT, default_value = config::output::DEFAULT_PATH)]
    output: PathBuf,

    /// Dataset to publish to (e.g. user/cryptobib)
    #[arg(long, env = config::env::DATASET)]
    dataset: Option<String>,

    /// Hub access token; publication is skipped without one
    #[arg(long, env = config::env::TOKEN, hide_env_values = true)]
    token: Option<String>,

    /// Hub base URL
    #[arg(long, env = config::env::HUB_ENDPOINT, default_value = config::api::HUB_ENDPOINT)]
    hub_endpoint: String,

    /// Branch to commit to
    #[arg(long, default_value = config::api::DEFAULT_REVISION)]
    revision: String,

    /// File name inside the dataset (defaults to the output file name)
    #[arg(long)]
    path_in_repo: Option<String>,

    /// Retries for transient HTTP failures
    #[arg(long, default_value_t = config::api::MAX_RETRIES)]
    max_retries: u32,

    /// Summary format printed on stdout
    #[arg(long, value_enum, default_value = "text")]
    report: ReportFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum ReportFormat {
    /// Markdown summary
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            abbrev_url: self.abbrev_url,
            main_url: self.main_url,
            fields: self.fields,
            author_style: self.author_style,
            output_path: self.output,
            hub_endpoint: self.hub_endpoint,
            revision: self.revision,
            path_in_repo: self.path_in_repo,
            max_retries: self.max_retries,
            ..Config::new(
                self.dataset.filter(|s| !s.is_empty()),
                self.token.filter(|s| !s.is_empty()),
            )
        }
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let format = cli.report;
    let config = cli.into_config();
    tracing::debug!(?config, "Resolved configuration");

    let pipeline = Pipeline::new(config).map_err(fatal)?;
    let report = pipeline.run().await.map_err(fatal)?;

    let rendered = match format {
        ReportFormat::Text => format_report_markdown(&report),
        ReportFormat::Json => format_report_json(&report)?,
    };
    println!("{rendered}");

    let outcome = report.outcome();
    tracing::info!(?outcome, records = report.records, misses = report.misses.len(), "Done");
    Ok(ExitCode::from(outcome.exit_code()))
}

fn fatal(error: PipelineError) -> anyhow::Error {
    if error.is_internal() {
        tracing::error!(error = %error, "Internal invariant violated");
    } else {
        tracing::error!(error = %error, "Run failed");
    }
    anyhow::anyhow!(error.to_user_message())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting bibmerge");

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
