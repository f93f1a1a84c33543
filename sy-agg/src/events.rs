//! Event-store read layer
//!
//! The raw event log (`workstation_master_log`) is owned by the ingest
//! pipeline; this module only ever reads it. One row per serial number
//! per workstation visit, with a pass/fail outcome.

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::path::Path;
use sy_common::calendar::production_date;
use sy_common::{Error, Result};

/// One station visit for one unit
#[derive(Debug, Clone, PartialEq)]
pub struct StationEvent {
    pub serial: String,
    pub model: String,
    pub station_name: String,
    pub part_number: String,
    pub pass_fail_status: String,
    pub service_flow: String,
    pub end_time: NaiveDateTime,
}

impl StationEvent {
    /// Whether this visit passed. Anything other than the literal
    /// `Pass` status counts as a failure.
    pub fn is_pass(&self) -> bool {
        self.pass_fail_status == "Pass"
    }
}

/// Read-only handle to the raw event log
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
    excluded_flows: Vec<String>,
}

type EventRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    NaiveDateTime,
);

impl EventStore {
    /// Connect to the event database in read-only mode
    ///
    /// Safety: uses SQLite mode=ro so the aggregation engine cannot
    /// write to the ingest pipeline's tables.
    pub async fn connect_readonly(db_path: &Path, excluded_flows: Vec<String>) -> Result<Self> {
        if !db_path.exists() {
            return Err(Error::Config(format!(
                "Event database not found: {}\nRun the ingest pipeline first to create it.",
                db_path.display()
            )));
        }

        let db_url = format!("sqlite://{}?mode=ro", db_path.display());
        let pool = SqlitePool::connect(&db_url).await?;

        Ok(EventStore { pool, excluded_flows })
    }

    /// Wrap an existing pool (shared-database deployments and tests)
    pub fn from_pool(pool: SqlitePool, excluded_flows: Vec<String>) -> Self {
        EventStore { pool, excluded_flows }
    }

    /// Production-flow events with `end_time` in `[start, end)`
    ///
    /// Rows with a NULL end time or an excluded service flow (rework,
    /// sorting) never enter the yield metrics.
    pub async fn fetch_production_events(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<StationEvent>> {
        let placeholders = vec!["?"; self.excluded_flows.len()].join(", ");
        let sql = format!(
            "SELECT sn, model, workstation_name, pn, history_station_passing_status,
                    service_flow, history_station_end_time
             FROM workstation_master_log
             WHERE history_station_end_time IS NOT NULL
               AND history_station_end_time >= ?
               AND history_station_end_time < ?
               AND service_flow IS NOT NULL
               AND service_flow NOT IN ({placeholders})
             ORDER BY history_station_end_time"
        );

        let mut query = sqlx::query_as::<_, EventRow>(&sql).bind(start).bind(end);
        for flow in &self.excluded_flows {
            query = query.bind(flow);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Self::into_event).collect())
    }

    /// All events with `end_time` in `[start, end)`, regardless of flow
    ///
    /// Used for hourly station volume, which counts every visit.
    pub async fn fetch_all_events(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<StationEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT sn, model, workstation_name, pn, history_station_passing_status,
                    service_flow, history_station_end_time
             FROM workstation_master_log
             WHERE history_station_end_time IS NOT NULL
               AND history_station_end_time >= ?
               AND history_station_end_time < ?
             ORDER BY history_station_end_time",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::into_event).collect())
    }

    /// Passing visits at the given station in `[start, end)`
    ///
    /// The packing rollup counts every flow, matching the packing
    /// aggregation it replaces.
    pub async fn fetch_station_passes(
        &self,
        station: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<StationEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT sn, model, workstation_name, pn, history_station_passing_status,
                    service_flow, history_station_end_time
             FROM workstation_master_log
             WHERE history_station_end_time IS NOT NULL
               AND history_station_end_time >= ?
               AND history_station_end_time < ?
               AND workstation_name = ?
               AND history_station_passing_status = 'Pass'
             ORDER BY history_station_end_time",
        )
        .bind(start)
        .bind(end)
        .bind(station)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::into_event).collect())
    }

    /// Distinct production days with any raw data, in ascending order
    ///
    /// Weekend dates fold into their Friday, so the returned days are
    /// always business days. The date extraction happens in SQL; only
    /// the distinct calendar dates cross into memory.
    pub async fn fetch_event_days(&self) -> Result<Vec<NaiveDate>> {
        let dates: Vec<(NaiveDate,)> = sqlx::query_as(
            "SELECT DISTINCT date(history_station_end_time)
             FROM workstation_master_log
             WHERE history_station_end_time IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        let days: BTreeSet<NaiveDate> =
            dates.into_iter().map(|(d,)| production_date(d)).collect();
        Ok(days.into_iter().collect())
    }

    fn into_event(row: EventRow) -> StationEvent {
        let (serial, model, station_name, part_number, pass_fail_status, service_flow, end_time) =
            row;
        StationEvent {
            serial,
            model,
            station_name,
            part_number: part_number.unwrap_or_default(),
            pass_fail_status,
            service_flow: service_flow.unwrap_or_default(),
            end_time,
        }
    }
}
