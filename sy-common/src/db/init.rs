//! Summary-store initialization
//!
//! Creates the summary tables on first run. The raw event log
//! (`workstation_master_log`) is owned by the ingest pipeline and is
//! never created or written here; this module owns only the derived
//! summary tables.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize the summary-store connection and create tables if needed
pub async fn init_summary_store(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new summary store: {}", db_path.display());
    } else {
        info!("Opened existing summary store: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL lets the aggregation writer coexist with readers (dashboards,
    // ad-hoc queries) without blocking them for the whole batch.
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Schema creation is idempotent - safe to call on every startup
    create_daily_station_yield_table(&pool).await?;
    create_daily_yield_summary_table(&pool).await?;
    create_weekly_station_yield_table(&pool).await?;
    create_weekly_yield_summary_table(&pool).await?;
    create_packing_daily_summary_table(&pool).await?;
    create_station_hourly_summary_table(&pool).await?;

    Ok(pool)
}

/// Per-day, per-model, per-station pass/fail counts and throughput yield
pub async fn create_daily_station_yield_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_station_yield (
            date_id TEXT NOT NULL,
            model TEXT NOT NULL,
            station_name TEXT NOT NULL,
            total_units INTEGER NOT NULL,
            passed_units INTEGER NOT NULL,
            failed_units INTEGER NOT NULL,
            throughput_yield REAL NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (date_id, model, station_name),
            CHECK (total_units >= 0),
            CHECK (passed_units >= 0 AND passed_units <= total_units),
            CHECK (throughput_yield >= 0.0 AND throughput_yield <= 100.0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_daily_station_yield_date ON daily_station_yield(date_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// One row per production day: overall yield, FPY breakdown, TPY variants
pub async fn create_daily_yield_summary_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_yield_summary (
            date_id TEXT PRIMARY KEY,
            total_parts INTEGER NOT NULL,
            passed_parts INTEGER NOT NULL,
            overall_yield REAL NOT NULL,
            fpy_parts_started INTEGER NOT NULL,
            fpy_first_pass_success INTEGER NOT NULL,
            fpy_parts_completed INTEGER NOT NULL,
            fpy_parts_failed INTEGER NOT NULL,
            fpy_parts_stuck_in_limbo INTEGER NOT NULL,
            fpy_traditional REAL NOT NULL,
            fpy_completed_only REAL NOT NULL,
            station_metrics TEXT NOT NULL,
            model_station_metrics TEXT NOT NULL,
            tpy_fixed TEXT NOT NULL,
            tpy_discovered TEXT NOT NULL,
            average_yield REAL NOT NULL,
            total_stations INTEGER NOT NULL,
            best_station_name TEXT,
            best_station_yield REAL,
            worst_station_name TEXT,
            worst_station_yield REAL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Per-week, per-model, per-station counts over literal week bounds
pub async fn create_weekly_station_yield_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weekly_station_yield (
            week_id TEXT NOT NULL,
            model TEXT NOT NULL,
            station_name TEXT NOT NULL,
            total_units INTEGER NOT NULL,
            passed_units INTEGER NOT NULL,
            failed_units INTEGER NOT NULL,
            throughput_yield REAL NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (week_id, model, station_name),
            CHECK (total_units >= 0),
            CHECK (passed_units >= 0 AND passed_units <= total_units)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per ISO week
///
/// FPY/TPY columns are recomputed from raw events; the overall-yield
/// columns are summed from daily_yield_summary rows (advisory when days
/// are missing, see days_with_daily_data).
pub async fn create_weekly_yield_summary_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weekly_yield_summary (
            week_id TEXT PRIMARY KEY,
            week_start TEXT NOT NULL,
            week_end TEXT NOT NULL,
            days_in_week INTEGER NOT NULL,
            fpy_parts_started INTEGER NOT NULL,
            fpy_first_pass_success INTEGER NOT NULL,
            fpy_parts_completed INTEGER NOT NULL,
            fpy_parts_failed INTEGER NOT NULL,
            fpy_parts_stuck_in_limbo INTEGER NOT NULL,
            fpy_traditional REAL NOT NULL,
            fpy_completed_only REAL NOT NULL,
            overall_total_parts INTEGER NOT NULL,
            overall_passed_parts INTEGER NOT NULL,
            overall_yield REAL NOT NULL,
            days_with_daily_data INTEGER NOT NULL,
            station_metrics TEXT NOT NULL,
            model_station_metrics TEXT NOT NULL,
            tpy_fixed TEXT NOT NULL,
            tpy_discovered TEXT NOT NULL,
            average_yield REAL NOT NULL,
            total_stations INTEGER NOT NULL,
            best_station_name TEXT,
            best_station_yield REAL,
            worst_station_name TEXT,
            worst_station_yield REAL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_weekly_yield_summary_start ON weekly_yield_summary(week_start)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Weekend-folded packing counts keyed by production day
pub async fn create_packing_daily_summary_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS packing_daily_summary (
            pack_date TEXT NOT NULL,
            model TEXT NOT NULL,
            part_number TEXT NOT NULL,
            packed_count INTEGER NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (pack_date, model, part_number),
            CHECK (packed_count >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Hourly station volume (all flows, all statuses)
pub async fn create_station_hourly_summary_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS station_hourly_summary (
            date_id TEXT NOT NULL,
            hour INTEGER NOT NULL,
            station_name TEXT NOT NULL,
            part_count INTEGER NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (date_id, hour, station_name),
            CHECK (hour >= 0 AND hour <= 23),
            CHECK (part_count >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
