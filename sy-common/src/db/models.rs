//! Row models for the summary tables

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A daily_station_yield row
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DailyStationYieldRow {
    pub date_id: String,
    pub model: String,
    pub station_name: String,
    pub total_units: i64,
    pub passed_units: i64,
    pub failed_units: i64,
    pub throughput_yield: f64,
}

/// A weekly_station_yield row
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct WeeklyStationYieldRow {
    pub week_id: String,
    pub model: String,
    pub station_name: String,
    pub total_units: i64,
    pub passed_units: i64,
    pub failed_units: i64,
    pub throughput_yield: f64,
}

/// A packing_daily_summary row
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PackingDailyRow {
    pub pack_date: String,
    pub model: String,
    pub part_number: String,
    pub packed_count: i64,
}

/// A station_hourly_summary row
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct StationHourlyRow {
    pub date_id: String,
    pub hour: i64,
    pub station_name: String,
    pub part_count: i64,
}
