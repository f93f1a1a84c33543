//! Station throughput-yield calculator
//!
//! Pure grouping over pre-filtered events. All maps are BTreeMaps so
//! iteration order is the sorted station-name order; best/worst
//! selection below relies on that for its tie-break.

use crate::events::StationEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pass/fail counts and throughput yield for one (model, station) group
///
/// Serialized field names match the JSON shape stored in the summary
/// tables' metric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationYield {
    pub total_units: i64,
    pub passed_units: i64,
    pub failed_units: i64,
    pub throughput_yield: f64,
}

impl StationYield {
    fn from_counts(total: i64, passed: i64) -> Self {
        StationYield {
            total_units: total,
            passed_units: passed,
            failed_units: total - passed,
            throughput_yield: yield_pct(passed, total),
        }
    }
}

/// Passed over total as a percentage; 0 when the denominator is 0
pub fn yield_pct(passed: i64, total: i64) -> f64 {
    if total > 0 {
        passed as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Round to 2 decimal places. Applied only at the storage boundary so
/// rounding error does not compound across multi-station products.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Group events into per-model, per-station yields
///
/// Only tracked models participate in model-specific metrics; events
/// for other models are ignored here (they still count toward FPY).
pub fn model_station_yields(
    events: &[StationEvent],
    tracked_models: &[String],
) -> BTreeMap<String, BTreeMap<String, StationYield>> {
    let mut counts: BTreeMap<(String, String), (i64, i64)> = BTreeMap::new();

    for event in events {
        if !tracked_models.iter().any(|m| m == &event.model) {
            continue;
        }
        let entry = counts
            .entry((event.model.clone(), event.station_name.clone()))
            .or_insert((0, 0));
        entry.0 += 1;
        if event.is_pass() {
            entry.1 += 1;
        }
    }

    let mut yields: BTreeMap<String, BTreeMap<String, StationYield>> = BTreeMap::new();
    for ((model, station), (total, passed)) in counts {
        yields
            .entry(model)
            .or_default()
            .insert(station, StationYield::from_counts(total, passed));
    }
    yields
}

/// Sum the per-model groups into one per-station map across models
pub fn overall_station_yields(
    per_model: &BTreeMap<String, BTreeMap<String, StationYield>>,
) -> BTreeMap<String, StationYield> {
    let mut counts: BTreeMap<String, (i64, i64)> = BTreeMap::new();

    for stations in per_model.values() {
        for (station, sy) in stations {
            let entry = counts.entry(station.clone()).or_insert((0, 0));
            entry.0 += sy.total_units;
            entry.1 += sy.passed_units;
        }
    }

    counts
        .into_iter()
        .map(|(station, (total, passed))| (station, StationYield::from_counts(total, passed)))
        .collect()
}

/// Mean throughput yield across a station map; 0 for an empty map
pub fn average_yield(stations: &BTreeMap<String, StationYield>) -> f64 {
    if stations.is_empty() {
        return 0.0;
    }
    stations.values().map(|s| s.throughput_yield).sum::<f64>() / stations.len() as f64
}

/// Station with the highest throughput yield
///
/// Ties go to the lexicographically smallest station name: iteration is
/// in sorted name order and only a strictly greater yield displaces the
/// current best.
pub fn best_station(stations: &BTreeMap<String, StationYield>) -> Option<(&str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for (station, sy) in stations {
        match best {
            Some((_, y)) if sy.throughput_yield <= y => {}
            _ => best = Some((station, sy.throughput_yield)),
        }
    }
    best
}

/// Station with the lowest throughput yield; same tie-break as
/// [`best_station`]
pub fn worst_station(stations: &BTreeMap<String, StationYield>) -> Option<(&str, f64)> {
    let mut worst: Option<(&str, f64)> = None;
    for (station, sy) in stations {
        match worst {
            Some((_, y)) if sy.throughput_yield >= y => {}
            _ => worst = Some((station, sy.throughput_yield)),
        }
    }
    worst
}
