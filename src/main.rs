use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

mod compare;
mod config;
mod db;
mod error;
mod insights;
mod logging;
mod metrics;
mod models;
mod ranking;
mod render;
mod report;
mod window;

use config::Config;
use models::{DateRange, RawEventCounts, Report};
use report::Baseline;
use window::{BaselinePolicy, Period};

#[derive(Parser)]
#[command(name = "usage-digest")]
#[command(about = "Event analytics digests for team channels", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
    Slack,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load two weeks of sample event counts
    Seed,
    /// Import daily event counts from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the most frequent events for a window
    Top {
        #[arg(long, default_value = "weekly")]
        period: String,
        #[arg(long)]
        days: Option<u32>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Only rank these events (comma separated)
        #[arg(long, value_delimiter = ',')]
        events: Vec<String>,
    },
    /// Build a report from the analytics database
    Report {
        /// daily, weekly, biweekly, monthly or custom
        #[arg(long, default_value = "weekly")]
        period: String,
        /// Day count for a custom period (1-90)
        #[arg(long)]
        days: Option<u32>,
        /// preceding, previous-cycle or none; overrides the config file
        #[arg(long)]
        baseline: Option<String>,
        /// Treat this date as today
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Events to rank instead of the configured tracked events (comma separated)
        #[arg(long, value_delimiter = ',')]
        events: Vec<String>,
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build a report from event count JSON files
    Summarize {
        #[arg(long)]
        current: PathBuf,
        #[arg(long)]
        prior: Option<PathBuf>,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, default_value = "Custom Summary")]
        label: String,
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    logging::init(&config.logging);

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            let inserted = db::seed(&pool, &config.project_id, Utc::now().date_naive()).await?;
            println!("Inserted {inserted} sample counts.");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} counts from {}.", csv.display());
        }
        Commands::Top {
            period,
            days,
            limit,
            events,
        } => {
            let period = Period::parse(&period, days)?;
            let range = window::current_range(period, Utc::now().date_naive());
            let events = if events.is_empty() {
                config.tracked_events.clone()
            } else {
                events
            };
            let pool = connect().await?;
            let counts = db::fetch_event_counts(&pool, &config.project_id, &events, range).await?;
            let ranked = ranking::rank(&counts, limit)?;

            if ranked.is_empty() {
                println!("No events found for this window.");
                return Ok(());
            }

            println!("Top events from {range}:");
            for event in &ranked {
                println!(
                    "{}. {} with {} occurrences",
                    event.rank,
                    event.name,
                    insights::format_count(event.count)
                );
            }
        }
        Commands::Report {
            period,
            days,
            baseline,
            as_of,
            events,
            format,
            out,
        } => {
            let period = Period::parse(&period, days)?;
            let policy = match baseline {
                Some(value) => value.parse::<BaselinePolicy>()?,
                None => config.baseline,
            };
            let today = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let pool = connect().await?;

            let result = report_from_db(&pool, &config, period, policy, today, &events).await;
            deliver(result, &config, &period.to_string(), format, out.as_deref())?;
        }
        Commands::Summarize {
            current,
            prior,
            from,
            to,
            label,
            format,
            out,
        } => {
            let result = report_from_files(&config, &current, prior.as_deref(), from, to, &label);
            deliver(result, &config, "summarize", format, out.as_deref())?;
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the analytics Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn report_from_db(
    pool: &PgPool,
    config: &Config,
    period: Period,
    policy: BaselinePolicy,
    today: NaiveDate,
    only_events: &[String],
) -> anyhow::Result<Report> {
    let range = window::current_range(period, today);
    let events = config.requested_events(only_events);
    let current = db::fetch_event_counts(pool, &config.project_id, &events, range).await?;

    let prior = match window::baseline_range(period, range, policy) {
        Some(prior_range) => Some((
            prior_range,
            db::fetch_event_counts(pool, &config.project_id, &events, prior_range).await?,
        )),
        None => None,
    };

    info!(period = %period, range = %range, baseline = ?policy, "assembling report");
    let report = report::assemble(
        range,
        &period.label(),
        &current,
        prior
            .as_ref()
            .map(|(prior_range, counts)| Baseline::new(*prior_range, counts)),
        &config.report_options_for(period),
    )?;
    Ok(report)
}

fn report_from_files(
    config: &Config,
    current: &Path,
    prior: Option<&Path>,
    from: NaiveDate,
    to: NaiveDate,
    label: &str,
) -> anyhow::Result<Report> {
    let range = DateRange::new(from, to)?;
    let current = read_counts(current)?;
    let prior = prior.map(read_counts).transpose()?;

    let report = report::assemble(
        range,
        label,
        &current,
        prior.as_ref().map(Baseline::counts_only),
        &config.report_options(),
    )?;
    Ok(report)
}

fn read_counts(path: &Path) -> anyhow::Result<RawEventCounts> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let counts = RawEventCounts::from_json(&value)
        .with_context(|| format!("invalid event counts in {}", path.display()))?;
    Ok(counts)
}

/// Renders the report, or for Slack output an error notice when building it
/// failed. The original error is still returned.
fn deliver(
    result: anyhow::Result<Report>,
    config: &Config,
    source: &str,
    format: OutputFormat,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            let invalid_input = is_input_error(&err);
            tracing::error!(source, invalid_input, error = %err, "report generation failed");
            if let OutputFormat::Slack = format {
                let notice = render::slack_error_blocks(source, &format!("{err:#}"), Utc::now());
                write_output(&serde_json::to_string_pretty(&notice)?, out)?;
            }
            return Err(err);
        }
    };

    let rendered = match format {
        OutputFormat::Markdown => render::to_markdown(&report),
        OutputFormat::Json => render::to_json(&report)?,
        OutputFormat::Slack => {
            serde_json::to_string_pretty(&render::to_slack_blocks(&report, &config.company_name))?
        }
    };

    info!(
        label = report.period_label(),
        top_events = report.top_events().len(),
        insights = report.insights().len(),
        "report ready"
    );
    write_output(&rendered, out)
}

/// Whether the failure came from malformed input rather than I/O.
fn is_input_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<error::Error>().is_some()
}

fn write_output(contents: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}.", path.display());
        }
        None => println!("{contents}"),
    }
    Ok(())
}
