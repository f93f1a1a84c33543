//! End-to-end pipeline tests against a temporary SQLite database
//!
//! The raw event log is owned by the ingest pipeline in production;
//! these tests create a minimal copy of it and drive the whole
//! aggregation path through the public Driver API.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use sy_agg::{Driver, EventStore, PeriodRequest};
use sy_common::config::AppConfig;
use sy_common::db::{
    init_summary_store, DailyStationYieldRow, PackingDailyRow, StationHourlyRow,
    WeeklyStationYieldRow,
};
use tempfile::TempDir;

struct TestDb {
    // Held for the lifetime of the test so the directory is not dropped
    _dir: TempDir,
    pool: SqlitePool,
}

async fn setup() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sy-test.db");
    let pool = init_summary_store(&db_path).await.unwrap();

    sqlx::query(
        "CREATE TABLE workstation_master_log (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             sn TEXT NOT NULL,
             model TEXT NOT NULL,
             workstation_name TEXT NOT NULL,
             pn TEXT,
             history_station_passing_status TEXT NOT NULL,
             service_flow TEXT,
             history_station_end_time TIMESTAMP
         )",
    )
    .execute(&pool)
    .await
    .unwrap();

    TestDb { _dir: dir, pool }
}

fn driver_for(db: &TestDb) -> Driver {
    let config = AppConfig::default();
    let events = EventStore::from_pool(db.pool.clone(), config.excluded_service_flows.clone());
    Driver::new(events, db.pool.clone(), config)
}

async fn insert_event(
    pool: &SqlitePool,
    sn: &str,
    model: &str,
    station: &str,
    status: &str,
    flow: &str,
    timestamp: &str,
) {
    let end_time = chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S").unwrap();
    sqlx::query(
        "INSERT INTO workstation_master_log
             (sn, model, workstation_name, pn, history_station_passing_status,
              service_flow, history_station_end_time)
         VALUES (?, ?, ?, 'PN-1', ?, ?, ?)",
    )
    .bind(sn)
    .bind(model)
    .bind(station)
    .bind(status)
    .bind(flow)
    .bind(end_time)
    .execute(pool)
    .await
    .unwrap();
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_packing_folds_weekend_into_friday() {
    let db = setup().await;
    // Saturday and Friday packing passes both attribute to Friday
    insert_event(&db.pool, "S1", "Tesla SXM4", "PACKING", "Pass", "Mass Production", "2025-06-14 10:00:00").await;
    insert_event(&db.pool, "S2", "Tesla SXM4", "PACKING", "Pass", "Mass Production", "2025-06-13 09:00:00").await;

    let driver = driver_for(&db);
    let report = driver
        .run(&PeriodRequest::Date(date(2025, 6, 13)))
        .await
        .unwrap();
    assert!(report.all_succeeded());

    let rows: Vec<PackingDailyRow> = sqlx::query_as(
        "SELECT pack_date, model, part_number, packed_count FROM packing_daily_summary",
    )
    .fetch_all(&db.pool)
    .await
    .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].pack_date, "2025-06-13");
    assert_eq!(rows[0].model, "Tesla SXM4");
    assert_eq!(rows[0].packed_count, 2);
}

#[tokio::test]
async fn test_saturday_date_request_aggregates_friday() {
    let db = setup().await;
    insert_event(&db.pool, "S1", "Tesla SXM4", "PACKING", "Pass", "Mass Production", "2025-06-14 10:00:00").await;

    let driver = driver_for(&db);
    // Asking for the Saturday date runs the Friday production day
    let report = driver
        .run(&PeriodRequest::Date(date(2025, 6, 14)))
        .await
        .unwrap();
    assert!(report.all_succeeded());

    let date_id: String = sqlx::query_scalar("SELECT date_id FROM daily_yield_summary")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(date_id, "2025-06-13");
}

#[tokio::test]
async fn test_excluded_service_flows_never_enter_metrics() {
    let db = setup().await;
    insert_event(&db.pool, "S1", "Tesla SXM4", "FI", "Pass", "Mass Production", "2025-06-11 09:00:00").await;
    insert_event(&db.pool, "S2", "Tesla SXM4", "FI", "Fail", "NC Sort", "2025-06-11 10:00:00").await;
    insert_event(&db.pool, "S3", "Tesla SXM4", "FI", "Fail", "RO", "2025-06-11 11:00:00").await;

    let driver = driver_for(&db);
    driver
        .run(&PeriodRequest::Date(date(2025, 6, 11)))
        .await
        .unwrap();

    let (total, passed): (i64, i64) =
        sqlx::query_as("SELECT total_parts, passed_parts FROM daily_yield_summary")
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert_eq!(total, 1);
    assert_eq!(passed, 1);
}

#[tokio::test]
async fn test_zero_event_period_writes_zero_valued_row() {
    let db = setup().await;

    let driver = driver_for(&db);
    let report = driver
        .run(&PeriodRequest::Date(date(2025, 7, 1)))
        .await
        .unwrap();
    assert!(report.all_succeeded(), "empty period must not be an error");

    let (started, traditional, overall): (i64, f64, f64) = sqlx::query_as(
        "SELECT fpy_parts_started, fpy_traditional, overall_yield
         FROM daily_yield_summary WHERE date_id = '2025-07-01'",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(started, 0);
    assert_eq!(traditional, 0.0);
    assert_eq!(overall, 0.0);
}

#[tokio::test]
async fn test_rerun_produces_identical_rows() {
    let db = setup().await;
    insert_event(&db.pool, "S1", "Tesla SXM4", "VI2", "Pass", "Mass Production", "2025-06-11 08:00:00").await;
    insert_event(&db.pool, "S1", "Tesla SXM4", "FI", "Fail", "Mass Production", "2025-06-11 09:00:00").await;
    insert_event(&db.pool, "S2", "Tesla SXM5", "BBD", "Pass", "Mass Production", "2025-06-11 10:00:00").await;
    insert_event(&db.pool, "S2", "Tesla SXM5", "PACKING", "Pass", "Mass Production", "2025-06-11 11:00:00").await;

    let driver = driver_for(&db);
    let request = PeriodRequest::Date(date(2025, 6, 11));

    let summary_sql = "SELECT total_parts, passed_parts, overall_yield,
                              fpy_parts_started, fpy_first_pass_success,
                              station_metrics, model_station_metrics, tpy_fixed, tpy_discovered
                       FROM daily_yield_summary WHERE date_id = '2025-06-11'";
    let station_sql = "SELECT date_id, model, station_name, total_units, passed_units,
                              failed_units, throughput_yield
                       FROM daily_station_yield ORDER BY date_id, model, station_name";

    driver.run(&request).await.unwrap();
    let summary1: (i64, i64, f64, i64, i64, String, String, String, String) =
        sqlx::query_as(summary_sql).fetch_one(&db.pool).await.unwrap();
    let stations1: Vec<DailyStationYieldRow> =
        sqlx::query_as(station_sql).fetch_all(&db.pool).await.unwrap();

    driver.run(&request).await.unwrap();
    let summary2: (i64, i64, f64, i64, i64, String, String, String, String) =
        sqlx::query_as(summary_sql).fetch_one(&db.pool).await.unwrap();
    let stations2: Vec<DailyStationYieldRow> =
        sqlx::query_as(station_sql).fetch_all(&db.pool).await.unwrap();

    assert_eq!(summary1, summary2);
    assert_eq!(stations1, stations2);
    assert!(!stations1.is_empty());
}

#[tokio::test]
async fn test_fixed_tpy_requires_the_complete_chain() {
    let db = setup().await;
    // All four SXM4 chain stations have volume
    for (i, station) in ["VI2", "ASSY2", "FI", "FQC"].iter().enumerate() {
        let sn = format!("S{i}");
        let ts = format!("2025-06-11 0{}:00:00", i + 1);
        insert_event(&db.pool, &sn, "Tesla SXM4", station, "Pass", "Mass Production", &ts).await;
    }
    // SXM5 only has one of its four
    insert_event(&db.pool, "S9", "Tesla SXM5", "BBD", "Pass", "Mass Production", "2025-06-11 09:00:00").await;

    let driver = driver_for(&db);
    driver
        .run(&PeriodRequest::Date(date(2025, 6, 11)))
        .await
        .unwrap();

    let tpy_fixed: String = sqlx::query_scalar(
        "SELECT tpy_fixed FROM daily_yield_summary WHERE date_id = '2025-06-11'",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&tpy_fixed).unwrap();

    // Every station passed, so the complete SXM4 chain composes to 100%
    assert_eq!(parsed["Tesla SXM4"]["tpy"], 100.0);
    // The incomplete SXM5 chain must be null, not an approximation
    assert!(parsed["Tesla SXM5"]["tpy"].is_null());
    assert_eq!(parsed["Tesla SXM5"]["stationCount"], 1);
}

#[tokio::test]
async fn test_weekly_overall_matches_from_raw_when_dailies_are_complete() {
    let db = setup().await;

    // A full ISO week (2025-W24: Mon 06-09 .. Sun 06-15) of events.
    // 12 tracked-model production events, 9 passes.
    let rows = [
        ("A1", "VI2", "Pass", "2025-06-09 08:00:00"),
        ("A1", "FI", "Pass", "2025-06-09 12:00:00"),
        ("A2", "VI2", "Fail", "2025-06-10 08:00:00"),
        ("A3", "ASSY2", "Pass", "2025-06-10 09:00:00"),
        ("A3", "FI", "Fail", "2025-06-11 10:00:00"),
        ("A4", "FQC", "Pass", "2025-06-11 11:00:00"),
        ("A4", "PACKING", "Pass", "2025-06-12 09:00:00"),
        ("A5", "VI2", "Pass", "2025-06-12 10:00:00"),
        ("A5", "FI", "Pass", "2025-06-13 08:00:00"),
        ("A6", "FQC", "Fail", "2025-06-13 14:00:00"),
        // Weekend output folds into Friday's daily row but stays
        // inside the same ISO week for the from-raw path.
        ("A7", "PACKING", "Pass", "2025-06-14 10:00:00"),
        ("A8", "PACKING", "Pass", "2025-06-15 16:00:00"),
    ];
    for (sn, station, status, ts) in rows {
        insert_event(&db.pool, sn, "Tesla SXM4", station, status, "Mass Production", ts).await;
    }

    let driver = driver_for(&db);

    // Materialize every production day of the week, then the week
    for day in 9..=13 {
        let report = driver
            .run(&PeriodRequest::Date(date(2025, 6, day)))
            .await
            .unwrap();
        assert!(report.all_succeeded());
    }
    let report = driver
        .run(&PeriodRequest::Week("2025-W24".to_string()))
        .await
        .unwrap();
    assert!(report.all_succeeded());

    let (total, passed, overall, days): (i64, i64, f64, i64) = sqlx::query_as(
        "SELECT overall_total_parts, overall_passed_parts, overall_yield, days_with_daily_data
         FROM weekly_yield_summary WHERE week_id = '2025-W24'",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();

    // Summed-from-daily equals the from-raw event counts
    assert_eq!(total, 12);
    assert_eq!(passed, 9);
    assert_eq!(overall, 75.0);
    assert_eq!(days, 5);

    // And the recomputed weekly FPY saw all 8 units
    let started: i64 = sqlx::query_scalar(
        "SELECT fpy_parts_started FROM weekly_yield_summary WHERE week_id = '2025-W24'",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(started, 8);

    // Per-station weekly rows cover the same raw events
    let stations: Vec<WeeklyStationYieldRow> = sqlx::query_as(
        "SELECT week_id, model, station_name, total_units, passed_units,
                failed_units, throughput_yield
         FROM weekly_station_yield WHERE week_id = '2025-W24'
         ORDER BY model, station_name",
    )
    .fetch_all(&db.pool)
    .await
    .unwrap();

    let fi = stations
        .iter()
        .find(|r| r.station_name == "FI")
        .expect("FI has weekly volume");
    assert_eq!(fi.model, "Tesla SXM4");
    assert_eq!(fi.total_units, 3);
    assert_eq!(fi.passed_units, 2);
    assert_eq!(fi.failed_units, 1);
    assert_eq!(
        stations.iter().map(|r| r.total_units).sum::<i64>(),
        12,
        "weekly station rows account for every production event"
    );
}

#[tokio::test]
async fn test_weekly_overall_is_partial_when_dailies_are_missing() {
    let db = setup().await;
    insert_event(&db.pool, "A1", "Tesla SXM4", "FI", "Pass", "Mass Production", "2025-06-09 08:00:00").await;
    insert_event(&db.pool, "A2", "Tesla SXM4", "FI", "Pass", "Mass Production", "2025-06-10 08:00:00").await;

    let driver = driver_for(&db);
    // Only Monday's daily row is materialized
    driver
        .run(&PeriodRequest::Date(date(2025, 6, 9)))
        .await
        .unwrap();
    driver
        .run(&PeriodRequest::Week("2025-W24".to_string()))
        .await
        .unwrap();

    let (total, days, started): (i64, i64, i64) = sqlx::query_as(
        "SELECT overall_total_parts, days_with_daily_data, fpy_parts_started
         FROM weekly_yield_summary WHERE week_id = '2025-W24'",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();

    // Advisory partial sum: one day only, while from-raw FPY sees both
    assert_eq!(total, 1);
    assert_eq!(days, 1);
    assert_eq!(started, 2);
}

#[tokio::test]
async fn test_malformed_week_id_fails_the_run() {
    let db = setup().await;
    let driver = driver_for(&db);
    let result = driver.run(&PeriodRequest::Week("2025-23".to_string())).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_store_failure_is_reported_not_propagated() {
    let db = setup().await;
    // Simulate a broken event store: the log table is gone
    sqlx::query("DROP TABLE workstation_master_log")
        .execute(&db.pool)
        .await
        .unwrap();

    let driver = driver_for(&db);
    let report = driver
        .run(&PeriodRequest::Date(date(2025, 6, 11)))
        .await
        .unwrap();

    // The run itself completes; the period is reported as failed
    assert!(!report.all_succeeded());
    assert_eq!(report.failures().len(), 1);
    assert!(report.failures()[0].error.is_some());
}

#[tokio::test]
async fn test_all_request_covers_every_day_and_week() {
    let db = setup().await;
    insert_event(&db.pool, "A1", "Tesla SXM4", "FI", "Pass", "Mass Production", "2025-06-11 08:00:00").await;
    insert_event(&db.pool, "A2", "Tesla SXM4", "FI", "Pass", "Mass Production", "2025-06-18 08:00:00").await;

    let driver = driver_for(&db);
    let report = driver.run(&PeriodRequest::All).await.unwrap();
    assert!(report.all_succeeded());
    // Two days plus two distinct ISO weeks
    assert_eq!(report.succeeded(), 4);

    let day_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_yield_summary")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    let week_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weekly_yield_summary")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(day_count, 2);
    assert_eq!(week_count, 2);
}

#[tokio::test]
async fn test_hourly_counts_persisted_with_literal_dates() {
    let db = setup().await;
    insert_event(&db.pool, "S1", "Tesla SXM4", "FI", "Pass", "Mass Production", "2025-06-14 10:15:00").await;
    insert_event(&db.pool, "S2", "Tesla SXM4", "FI", "Fail", "NC Sort", "2025-06-14 10:45:00").await;

    let driver = driver_for(&db);
    driver
        .run(&PeriodRequest::Date(date(2025, 6, 13)))
        .await
        .unwrap();

    // Hourly volume counts every flow and keeps the real Saturday date
    let row: StationHourlyRow = sqlx::query_as(
        "SELECT date_id, hour, station_name, part_count FROM station_hourly_summary
         WHERE station_name = 'FI'",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(row.date_id, "2025-06-14");
    assert_eq!(row.hour, 10);
    assert_eq!(row.part_count, 2);
}

#[tokio::test]
async fn test_all_request_discovers_weekend_days_as_friday() {
    let db = setup().await;
    // Raw data exists only on a Saturday and a Sunday
    insert_event(&db.pool, "S1", "Tesla SXM4", "FI", "Pass", "Mass Production", "2025-06-14 10:00:00").await;
    insert_event(&db.pool, "S2", "Tesla SXM4", "FI", "Fail", "Mass Production", "2025-06-15 11:00:00").await;

    let driver = driver_for(&db);
    let report = driver.run(&PeriodRequest::All).await.unwrap();
    assert!(report.all_succeeded());
    // One production day (the Friday) plus its week
    assert_eq!(report.succeeded(), 2);

    let date_ids: Vec<String> = sqlx::query_scalar("SELECT date_id FROM daily_yield_summary")
        .fetch_all(&db.pool)
        .await
        .unwrap();
    assert_eq!(date_ids, vec!["2025-06-13".to_string()]);

    let (total, passed): (i64, i64) = sqlx::query_as(
        "SELECT total_parts, passed_parts FROM daily_yield_summary WHERE date_id = '2025-06-13'",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(total, 2);
    assert_eq!(passed, 1);
}
