//! Summary assembly and the rollup store writer
//!
//! The calculators in this crate are pure; this module glues their
//! outputs into period summaries and persists them. Every write is a
//! natural-key upsert inside one transaction per period, so a re-run
//! over unchanged raw data converges to an identical end state and an
//! interrupted run never exposes a partially written period.

use crate::events::StationEvent;
use crate::fpy::{first_pass_yield, FpyResult};
use crate::station_yield::{
    average_yield, best_station, model_station_yields, overall_station_yields, round2,
    worst_station, StationYield,
};
use crate::tpy::{compose, TpyResult, TpyStrategy};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use sy_common::config::AppConfig;
use sy_common::{Error, Result};

/// Computed metrics for one period (daily or weekly), before persistence
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodMetrics {
    /// Per-station aggregates across all tracked models
    pub station_metrics: BTreeMap<String, StationYield>,
    /// Per-model, per-station aggregates
    pub model_station_metrics: BTreeMap<String, BTreeMap<String, StationYield>>,
    pub fpy: FpyResult,
    /// Fixed-chain TPY per model
    pub tpy_fixed: BTreeMap<String, TpyResult>,
    /// Discovered-station TPY per model
    pub tpy_discovered: BTreeMap<String, TpyResult>,
    /// Event-level totals across the overall station metrics
    pub total_parts: i64,
    pub passed_parts: i64,
}

/// Overall-yield figures summed from persisted daily summary rows
///
/// Advisory when `days_with_data` does not cover the whole week.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyTotals {
    pub total_parts: i64,
    pub passed_parts: i64,
    pub days_with_data: i64,
}

/// Compute all period metrics from pre-filtered production-flow events.
///
/// The caller decides the window semantics (production-day folded for
/// daily, literal bounds for weekly); this function only aggregates.
pub fn compute_period_metrics(events: &[StationEvent], config: &AppConfig) -> PeriodMetrics {
    let model_station_metrics = model_station_yields(events, &config.tracked_models);
    let station_metrics = overall_station_yields(&model_station_metrics);
    let fpy = first_pass_yield(events, &config.terminal_station);

    let mut tpy_fixed = BTreeMap::new();
    let mut tpy_discovered = BTreeMap::new();
    let empty = BTreeMap::new();
    for model in &config.tracked_models {
        let yields = model_station_metrics.get(model).unwrap_or(&empty);
        if let Some(chain) = config.chain_for(model) {
            let strategy = TpyStrategy::Fixed(chain.to_vec());
            tpy_fixed.insert(model.clone(), compose(&strategy, yields));
        }
        tpy_discovered.insert(model.clone(), compose(&TpyStrategy::Discovered, yields));
    }

    let total_parts = station_metrics.values().map(|s| s.total_units).sum();
    let passed_parts = station_metrics.values().map(|s| s.passed_units).sum();

    PeriodMetrics {
        station_metrics,
        model_station_metrics,
        fpy,
        tpy_fixed,
        tpy_discovered,
        total_parts,
        passed_parts,
    }
}

/// Group terminal-station passes into packing counts keyed by
/// production day, model, and part number. Weekend passes fold into
/// the preceding Friday.
pub fn packing_counts(events: &[StationEvent]) -> BTreeMap<(NaiveDate, String, String), i64> {
    let mut counts = BTreeMap::new();
    for event in events {
        let key = (
            sy_common::calendar::production_day(event.end_time),
            event.model.clone(),
            event.part_number.clone(),
        );
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Group all station visits into hourly volume keyed by literal date,
/// hour, and station. No weekend folding: hourly volume reports when
/// the work actually happened.
pub fn hourly_counts(events: &[StationEvent]) -> BTreeMap<(NaiveDate, u32, String), i64> {
    use chrono::Timelike;
    let mut counts = BTreeMap::new();
    for event in events {
        let key = (
            event.end_time.date(),
            event.end_time.time().hour(),
            event.station_name.clone(),
        );
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Internal(format!("JSON encode failed: {e}")))
}

/// Persist one production day: per-station rows plus the summary row,
/// replaced wholesale inside a single transaction.
pub async fn upsert_daily(pool: &SqlitePool, date: NaiveDate, metrics: &PeriodMetrics) -> Result<()> {
    let mut tx = pool.begin().await?;

    // Wholesale replace: stale station rows from a previous run over
    // different raw data must not survive.
    sqlx::query("DELETE FROM daily_station_yield WHERE date_id = ?")
        .bind(date)
        .execute(&mut *tx)
        .await?;

    for (model, stations) in &metrics.model_station_metrics {
        for (station, sy) in stations {
            sqlx::query(
                "INSERT INTO daily_station_yield
                     (date_id, model, station_name, total_units, passed_units, failed_units, throughput_yield)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (date_id, model, station_name) DO UPDATE SET
                     total_units = excluded.total_units,
                     passed_units = excluded.passed_units,
                     failed_units = excluded.failed_units,
                     throughput_yield = excluded.throughput_yield,
                     updated_at = CURRENT_TIMESTAMP",
            )
            .bind(date)
            .bind(model)
            .bind(station)
            .bind(sy.total_units)
            .bind(sy.passed_units)
            .bind(sy.failed_units)
            .bind(round2(sy.throughput_yield))
            .execute(&mut *tx)
            .await?;
        }
    }

    let best = best_station(&metrics.station_metrics);
    let worst = worst_station(&metrics.station_metrics);

    sqlx::query(
        "INSERT INTO daily_yield_summary (
             date_id, total_parts, passed_parts, overall_yield,
             fpy_parts_started, fpy_first_pass_success, fpy_parts_completed,
             fpy_parts_failed, fpy_parts_stuck_in_limbo, fpy_traditional, fpy_completed_only,
             station_metrics, model_station_metrics, tpy_fixed, tpy_discovered,
             average_yield, total_stations,
             best_station_name, best_station_yield, worst_station_name, worst_station_yield
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (date_id) DO UPDATE SET
             total_parts = excluded.total_parts,
             passed_parts = excluded.passed_parts,
             overall_yield = excluded.overall_yield,
             fpy_parts_started = excluded.fpy_parts_started,
             fpy_first_pass_success = excluded.fpy_first_pass_success,
             fpy_parts_completed = excluded.fpy_parts_completed,
             fpy_parts_failed = excluded.fpy_parts_failed,
             fpy_parts_stuck_in_limbo = excluded.fpy_parts_stuck_in_limbo,
             fpy_traditional = excluded.fpy_traditional,
             fpy_completed_only = excluded.fpy_completed_only,
             station_metrics = excluded.station_metrics,
             model_station_metrics = excluded.model_station_metrics,
             tpy_fixed = excluded.tpy_fixed,
             tpy_discovered = excluded.tpy_discovered,
             average_yield = excluded.average_yield,
             total_stations = excluded.total_stations,
             best_station_name = excluded.best_station_name,
             best_station_yield = excluded.best_station_yield,
             worst_station_name = excluded.worst_station_name,
             worst_station_yield = excluded.worst_station_yield,
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(date)
    .bind(metrics.total_parts)
    .bind(metrics.passed_parts)
    .bind(round2(crate::station_yield::yield_pct(
        metrics.passed_parts,
        metrics.total_parts,
    )))
    .bind(metrics.fpy.parts_started)
    .bind(metrics.fpy.first_pass_success)
    .bind(metrics.fpy.parts_completed)
    .bind(metrics.fpy.parts_failed)
    .bind(metrics.fpy.parts_stuck_in_limbo)
    .bind(round2(metrics.fpy.traditional_fpy))
    .bind(round2(metrics.fpy.completed_only_fpy))
    .bind(to_json(&metrics.station_metrics)?)
    .bind(to_json(&metrics.model_station_metrics)?)
    .bind(to_json(&metrics.tpy_fixed)?)
    .bind(to_json(&metrics.tpy_discovered)?)
    .bind(round2(average_yield(&metrics.station_metrics)))
    .bind(metrics.station_metrics.len() as i64)
    .bind(best.map(|(name, _)| name.to_string()))
    .bind(best.map(|(_, y)| round2(y)))
    .bind(worst.map(|(name, _)| name.to_string()))
    .bind(worst.map(|(_, y)| round2(y)))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Sum persisted daily summary rows over `[start, end]` (inclusive
/// dates) for the weekly overall-yield figure.
pub async fn sum_daily_totals(
    pool: &SqlitePool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<DailyTotals> {
    let row: (i64, i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_parts), 0), COALESCE(SUM(passed_parts), 0), COUNT(*)
         FROM daily_yield_summary
         WHERE date_id >= ? AND date_id <= ?",
    )
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    Ok(DailyTotals {
        total_parts: row.0,
        passed_parts: row.1,
        days_with_data: row.2,
    })
}

/// Persist one ISO week: per-station rows plus the summary row.
///
/// FPY/TPY columns come from `metrics` (recomputed from raw events);
/// the overall-yield columns come from `daily` (summed from persisted
/// daily rows — advisory when days are missing).
pub async fn upsert_weekly(
    pool: &SqlitePool,
    week_id: &str,
    week_start: NaiveDate,
    week_end: NaiveDate,
    metrics: &PeriodMetrics,
    daily: DailyTotals,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM weekly_station_yield WHERE week_id = ?")
        .bind(week_id)
        .execute(&mut *tx)
        .await?;

    for (model, stations) in &metrics.model_station_metrics {
        for (station, sy) in stations {
            sqlx::query(
                "INSERT INTO weekly_station_yield
                     (week_id, model, station_name, total_units, passed_units, failed_units, throughput_yield)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (week_id, model, station_name) DO UPDATE SET
                     total_units = excluded.total_units,
                     passed_units = excluded.passed_units,
                     failed_units = excluded.failed_units,
                     throughput_yield = excluded.throughput_yield,
                     updated_at = CURRENT_TIMESTAMP",
            )
            .bind(week_id)
            .bind(model)
            .bind(station)
            .bind(sy.total_units)
            .bind(sy.passed_units)
            .bind(sy.failed_units)
            .bind(round2(sy.throughput_yield))
            .execute(&mut *tx)
            .await?;
        }
    }

    let best = best_station(&metrics.station_metrics);
    let worst = worst_station(&metrics.station_metrics);

    sqlx::query(
        "INSERT INTO weekly_yield_summary (
             week_id, week_start, week_end, days_in_week,
             fpy_parts_started, fpy_first_pass_success, fpy_parts_completed,
             fpy_parts_failed, fpy_parts_stuck_in_limbo, fpy_traditional, fpy_completed_only,
             overall_total_parts, overall_passed_parts, overall_yield, days_with_daily_data,
             station_metrics, model_station_metrics, tpy_fixed, tpy_discovered,
             average_yield, total_stations,
             best_station_name, best_station_yield, worst_station_name, worst_station_yield
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (week_id) DO UPDATE SET
             week_start = excluded.week_start,
             week_end = excluded.week_end,
             days_in_week = excluded.days_in_week,
             fpy_parts_started = excluded.fpy_parts_started,
             fpy_first_pass_success = excluded.fpy_first_pass_success,
             fpy_parts_completed = excluded.fpy_parts_completed,
             fpy_parts_failed = excluded.fpy_parts_failed,
             fpy_parts_stuck_in_limbo = excluded.fpy_parts_stuck_in_limbo,
             fpy_traditional = excluded.fpy_traditional,
             fpy_completed_only = excluded.fpy_completed_only,
             overall_total_parts = excluded.overall_total_parts,
             overall_passed_parts = excluded.overall_passed_parts,
             overall_yield = excluded.overall_yield,
             days_with_daily_data = excluded.days_with_daily_data,
             station_metrics = excluded.station_metrics,
             model_station_metrics = excluded.model_station_metrics,
             tpy_fixed = excluded.tpy_fixed,
             tpy_discovered = excluded.tpy_discovered,
             average_yield = excluded.average_yield,
             total_stations = excluded.total_stations,
             best_station_name = excluded.best_station_name,
             best_station_yield = excluded.best_station_yield,
             worst_station_name = excluded.worst_station_name,
             worst_station_yield = excluded.worst_station_yield,
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(week_id)
    .bind(week_start)
    .bind(week_end)
    .bind(7i64)
    .bind(metrics.fpy.parts_started)
    .bind(metrics.fpy.first_pass_success)
    .bind(metrics.fpy.parts_completed)
    .bind(metrics.fpy.parts_failed)
    .bind(metrics.fpy.parts_stuck_in_limbo)
    .bind(round2(metrics.fpy.traditional_fpy))
    .bind(round2(metrics.fpy.completed_only_fpy))
    .bind(daily.total_parts)
    .bind(daily.passed_parts)
    .bind(round2(crate::station_yield::yield_pct(
        daily.passed_parts,
        daily.total_parts,
    )))
    .bind(daily.days_with_data)
    .bind(to_json(&metrics.station_metrics)?)
    .bind(to_json(&metrics.model_station_metrics)?)
    .bind(to_json(&metrics.tpy_fixed)?)
    .bind(to_json(&metrics.tpy_discovered)?)
    .bind(round2(average_yield(&metrics.station_metrics)))
    .bind(metrics.station_metrics.len() as i64)
    .bind(best.map(|(name, _)| name.to_string()))
    .bind(best.map(|(_, y)| round2(y)))
    .bind(worst.map(|(name, _)| name.to_string()))
    .bind(worst.map(|(_, y)| round2(y)))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Persist packing counts. Each affected production day is replaced
/// wholesale within one transaction.
pub async fn upsert_packing(
    pool: &SqlitePool,
    counts: &BTreeMap<(NaiveDate, String, String), i64>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    let days: std::collections::BTreeSet<NaiveDate> =
        counts.keys().map(|(day, _, _)| *day).collect();
    for day in &days {
        sqlx::query("DELETE FROM packing_daily_summary WHERE pack_date = ?")
            .bind(day)
            .execute(&mut *tx)
            .await?;
    }

    for ((day, model, part_number), count) in counts {
        sqlx::query(
            "INSERT INTO packing_daily_summary (pack_date, model, part_number, packed_count)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (pack_date, model, part_number) DO UPDATE SET
                 packed_count = excluded.packed_count,
                 updated_at = CURRENT_TIMESTAMP",
        )
        .bind(day)
        .bind(model)
        .bind(part_number)
        .bind(count)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Persist hourly station volume for the covered dates.
pub async fn upsert_hourly(
    pool: &SqlitePool,
    counts: &BTreeMap<(NaiveDate, u32, String), i64>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    let days: std::collections::BTreeSet<NaiveDate> =
        counts.keys().map(|(day, _, _)| *day).collect();
    for day in &days {
        sqlx::query("DELETE FROM station_hourly_summary WHERE date_id = ?")
            .bind(day)
            .execute(&mut *tx)
            .await?;
    }

    for ((day, hour, station), count) in counts {
        sqlx::query(
            "INSERT INTO station_hourly_summary (date_id, hour, station_name, part_count)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (date_id, hour, station_name) DO UPDATE SET
                 part_count = excluded.part_count,
                 updated_at = CURRENT_TIMESTAMP",
        )
        .bind(day)
        .bind(*hour as i64)
        .bind(station)
        .bind(count)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
