//! sy-agg - Station yield aggregation engine
//!
//! Batch CLI that rolls raw workstation events up into daily, weekly,
//! packing, and hourly summary tables. One invocation aggregates a
//! single date, a single ISO week, a trailing window, or everything
//! with raw data present. Exit code is 0 only when every requested
//! period succeeded.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use sy_agg::{Driver, EventStore, PeriodRequest};
use sy_common::config::{resolve_database_path, AppConfig};
use sy_common::db::init_summary_store;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for sy-agg
#[derive(Parser, Debug)]
#[command(name = "sy-agg")]
#[command(about = "Station yield aggregation engine")]
#[command(version)]
#[command(group = clap::ArgGroup::new("period").required(true))]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the SQLite database (event log + summaries)
    #[arg(short, long, env = "SY_DATABASE")]
    database: Option<PathBuf>,

    /// Aggregate a single production day (weekend dates fold to Friday)
    #[arg(long, value_name = "YYYY-MM-DD", group = "period")]
    date: Option<NaiveDate>,

    /// Aggregate a single ISO week
    #[arg(long, value_name = "YYYY-Www", group = "period")]
    week: Option<String>,

    /// Aggregate the trailing N days ending today
    #[arg(long, value_name = "N", group = "period")]
    trailing_days: Option<u32>,

    /// Aggregate every day and week with raw data present
    #[arg(long, group = "period")]
    all: bool,
}

impl Args {
    fn request(&self) -> PeriodRequest {
        if let Some(date) = self.date {
            PeriodRequest::Date(date)
        } else if let Some(week) = &self.week {
            PeriodRequest::Week(week.clone())
        } else if let Some(n) = self.trailing_days {
            PeriodRequest::TrailingDays(n)
        } else {
            PeriodRequest::All
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sy_agg=info,sy_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting sy-agg v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    let db_path = resolve_database_path(args.database.as_deref(), &config);
    info!("Database: {}", db_path.display());

    // Summary tables are created on first run; the raw event log is
    // owned by the ingest pipeline and only ever read here.
    let summaries = init_summary_store(&db_path)
        .await
        .context("Failed to initialize summary store")?;
    let events = EventStore::connect_readonly(&db_path, config.excluded_service_flows.clone())
        .await
        .context("Failed to open event store")?;

    let driver = Driver::new(events, summaries, config);
    let report = driver.run(&args.request()).await?;

    if !report.all_succeeded() {
        for failure in report.failures() {
            eprintln!(
                "FAILED {}: {}",
                failure.key,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
        anyhow::bail!("{} period(s) failed", report.failures().len());
    }

    info!("{} period(s) aggregated", report.succeeded());
    Ok(())
}
