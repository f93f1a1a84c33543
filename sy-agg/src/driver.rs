//! Batch driver
//!
//! Expands a period request into concrete periods and runs the
//! aggregation for each one in sequence. A failing period is logged
//! and reported; it never aborts the batch, and the next scheduled run
//! simply recomputes it from scratch (safe, because every write is an
//! idempotent upsert).

use crate::events::EventStore;
use crate::rollup::{
    compute_period_metrics, hourly_counts, packing_counts, sum_daily_totals, upsert_daily,
    upsert_hourly, upsert_packing, upsert_weekly,
};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::fmt;
use sy_common::calendar::{daily_fetch_window, iso_week_id, production_date, production_day, week_range};
use sy_common::config::AppConfig;
use sy_common::Result;
use tracing::{error, info};

/// What the caller asked to aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum PeriodRequest {
    /// One production day (weekend dates normalize to their Friday)
    Date(NaiveDate),
    /// One ISO week, e.g. `2025-W23`
    Week(String),
    /// The trailing N days ending today
    TrailingDays(u32),
    /// Every day and week with any raw data
    All,
}

/// One concrete period inside a run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PeriodKey {
    Day(NaiveDate),
    Week(String),
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Day(d) => write!(f, "day {d}"),
            PeriodKey::Week(w) => write!(f, "week {w}"),
        }
    }
}

/// Per-period lifecycle; a period never moves backwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Outcome of one period within a run
#[derive(Debug, Clone)]
pub struct PeriodOutcome {
    pub key: PeriodKey,
    pub state: PeriodState,
    pub error: Option<String>,
}

/// End-of-run accounting
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<PeriodOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == PeriodState::Succeeded)
            .count()
    }

    pub fn failures(&self) -> Vec<&PeriodOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.state == PeriodState::Failed)
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Sequential batch orchestrator
///
/// Holds the read-only event handle and the summary-store write pool;
/// the calculators themselves stay pure and store-free.
pub struct Driver {
    events: EventStore,
    summaries: SqlitePool,
    config: AppConfig,
}

impl Driver {
    pub fn new(events: EventStore, summaries: SqlitePool, config: AppConfig) -> Self {
        Driver { events, summaries, config }
    }

    /// Expand the request and run every period, continuing past
    /// failures. Only period expansion itself can fail the whole run
    /// (e.g. a malformed week id).
    pub async fn run(&self, request: &PeriodRequest) -> Result<RunReport> {
        let periods = self.expand(request).await?;
        info!("Aggregating {} period(s)", periods.len());

        let mut outcomes: Vec<PeriodOutcome> = periods
            .iter()
            .map(|p| PeriodOutcome {
                key: p.clone(),
                state: PeriodState::Pending,
                error: None,
            })
            .collect();

        let total = outcomes.len();
        for (i, outcome) in outcomes.iter_mut().enumerate() {
            info!("[{}/{}] {}", i + 1, total, outcome.key);
            outcome.state = PeriodState::Running;

            let result = match &outcome.key {
                PeriodKey::Day(day) => self.run_day(*day).await,
                PeriodKey::Week(week_id) => self.run_week(week_id).await,
            };

            match result {
                Ok(()) => outcome.state = PeriodState::Succeeded,
                Err(e) => {
                    error!("{} failed: {e}", outcome.key);
                    outcome.state = PeriodState::Failed;
                    outcome.error = Some(e.to_string());
                }
            }
        }

        let report = RunReport { outcomes };
        info!(
            "Run complete: {} succeeded, {} failed",
            report.succeeded(),
            report.failures().len()
        );
        Ok(report)
    }

    async fn expand(&self, request: &PeriodRequest) -> Result<Vec<PeriodKey>> {
        match request {
            PeriodRequest::Date(date) => {
                let day = production_date(*date);
                if day != *date {
                    info!("{date} is a weekend date; aggregating production day {day}");
                }
                Ok(vec![PeriodKey::Day(day)])
            }
            PeriodRequest::Week(week_id) => {
                // Validate up front so a malformed id fails the run
                // instead of producing a silent empty period.
                week_range(week_id)?;
                Ok(vec![PeriodKey::Week(week_id.clone())])
            }
            PeriodRequest::TrailingDays(n) => {
                let today = Utc::now().date_naive();
                let days: BTreeSet<NaiveDate> = (0..*n as i64)
                    .map(|back| production_date(today - Duration::days(back)))
                    .collect();
                Ok(days.into_iter().map(PeriodKey::Day).collect())
            }
            PeriodRequest::All => {
                let days = self.events.fetch_event_days().await?;
                let weeks: BTreeSet<String> =
                    days.iter().map(|d| iso_week_id(*d)).collect();

                // Days first so the weekly overall-yield sums see
                // freshly materialized daily rows.
                let mut periods: Vec<PeriodKey> =
                    days.into_iter().map(PeriodKey::Day).collect();
                periods.extend(weeks.into_iter().map(PeriodKey::Week));
                Ok(periods)
            }
        }
    }

    /// Aggregate one production day: station yields, FPY, TPY, the
    /// daily summary row, plus packing and hourly counts for the same
    /// window.
    async fn run_day(&self, day: NaiveDate) -> Result<()> {
        let (start, end) = daily_fetch_window(day);

        let mut events = self.events.fetch_production_events(start, end).await?;
        // The window is production-day aligned already; the filter
        // keeps the attribution rule explicit at the one place that
        // matters.
        events.retain(|e| production_day(e.end_time) == day);

        let metrics = compute_period_metrics(&events, &self.config);
        info!(
            "  {day}: {} events, FPY {:.1}%, {} stations",
            events.len(),
            metrics.fpy.traditional_fpy,
            metrics.station_metrics.len()
        );
        upsert_daily(&self.summaries, day, &metrics).await?;

        let passes = self
            .events
            .fetch_station_passes(&self.config.terminal_station, start, end)
            .await?;
        upsert_packing(&self.summaries, &packing_counts(&passes)).await?;

        let all_events = self.events.fetch_all_events(start, end).await?;
        upsert_hourly(&self.summaries, &hourly_counts(&all_events)).await?;

        Ok(())
    }

    /// Aggregate one ISO week over its literal `[start, end)` bounds.
    async fn run_week(&self, week_id: &str) -> Result<()> {
        let (week_start, week_end) = week_range(week_id)?;
        let start = week_start.and_time(NaiveTime::MIN);
        let end = (week_end + Duration::days(1)).and_time(NaiveTime::MIN);

        let events = self.events.fetch_production_events(start, end).await?;
        let metrics = compute_period_metrics(&events, &self.config);

        let daily = sum_daily_totals(&self.summaries, week_start, week_end).await?;
        if daily.days_with_data < 7 {
            info!(
                "  {week_id}: only {} daily row(s) present; overall yield is partial",
                daily.days_with_data
            );
        }

        info!(
            "  {week_id}: {} events, FPY {:.1}%",
            events.len(),
            metrics.fpy.traditional_fpy
        );
        upsert_weekly(&self.summaries, week_id, week_start, week_end, &metrics, daily).await
    }
}
