//! First-pass-yield calculator
//!
//! Per (serial, model) unit in the period, two indicators decide the
//! classification: whether the unit ever reached the terminal station,
//! and whether any of its visits failed. Every started unit lands in
//! exactly one of {first-pass success, failed, stuck in limbo}.

use crate::events::StationEvent;
use crate::station_yield::yield_pct;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Period-level first-pass-yield figures
///
/// `traditional_fpy` counts all started units in the denominator;
/// `completed_only_fpy` excludes stuck-in-limbo units, so it can only
/// be greater than or equal to the traditional figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FpyResult {
    pub parts_started: i64,
    pub first_pass_success: i64,
    pub parts_completed: i64,
    pub parts_failed: i64,
    pub parts_stuck_in_limbo: i64,
    pub traditional_fpy: f64,
    pub completed_only_fpy: f64,
}

impl FpyResult {
    /// All-zero result for a period with no matching raw events
    pub fn empty() -> Self {
        FpyResult {
            parts_started: 0,
            first_pass_success: 0,
            parts_completed: 0,
            parts_failed: 0,
            parts_stuck_in_limbo: 0,
            traditional_fpy: 0.0,
            completed_only_fpy: 0.0,
        }
    }
}

/// Classify every (serial, model) unit seen in the period and compute
/// the period FPY figures.
///
/// Only units with at least one filtered event exist here; there are no
/// phantom units. Zero started units is a valid zero-valued result,
/// not an error.
pub fn first_pass_yield(events: &[StationEvent], terminal_station: &str) -> FpyResult {
    // (reached terminal, has any failure) per unit
    let mut units: HashMap<(String, String), (bool, bool)> = HashMap::new();

    for event in events {
        let entry = units
            .entry((event.serial.clone(), event.model.clone()))
            .or_insert((false, false));
        if event.station_name == terminal_station {
            entry.0 = true;
        }
        if !event.is_pass() {
            entry.1 = true;
        }
    }

    let parts_started = units.len() as i64;
    let mut first_pass_success = 0;
    let mut parts_completed = 0;
    let mut parts_failed = 0;
    let mut parts_stuck_in_limbo = 0;

    for (reached, failed) in units.values() {
        if *reached {
            parts_completed += 1;
        }
        match (reached, failed) {
            (true, false) => first_pass_success += 1,
            (_, true) => parts_failed += 1,
            (false, false) => parts_stuck_in_limbo += 1,
        }
    }

    // Completed-only excludes limbo units: the denominator is every
    // unit that either succeeded or failed.
    let active_parts = parts_started - parts_stuck_in_limbo;

    FpyResult {
        parts_started,
        first_pass_success,
        parts_completed,
        parts_failed,
        parts_stuck_in_limbo,
        traditional_fpy: yield_pct(first_pass_success, parts_started),
        completed_only_fpy: yield_pct(first_pass_success, active_parts),
    }
}
