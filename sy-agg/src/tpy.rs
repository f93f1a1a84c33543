//! Total-process-yield composer
//!
//! Two deliberately different composite metrics, both always produced
//! and surfaced side by side:
//!
//! - **Fixed**: the configured process chain for a model. A station
//!   with no data for the period leaves the composite unset rather than
//!   silently shrinking the chain (a missing station must not inflate
//!   yield).
//! - **Discovered**: every station the model's units actually visited
//!   in the period, with the station count reported alongside.

use crate::station_yield::StationYield;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the station set entering the composite product is chosen
#[derive(Debug, Clone, PartialEq)]
pub enum TpyStrategy {
    /// The configured ordered station chain for the model
    Fixed(Vec<String>),
    /// All stations with recorded volume for the model in the period
    Discovered,
}

/// Composite yield for one model under one strategy
///
/// `tpy` is the product of the per-station fractional yields, scaled
/// back to a percentage, unrounded. `None` means the fixed chain was
/// incomplete (or no stations at all were discovered).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TpyResult {
    pub stations: BTreeMap<String, f64>,
    pub tpy: Option<f64>,
    pub station_count: usize,
}

/// Compose the per-station yields for one model under the given strategy
pub fn compose(strategy: &TpyStrategy, station_yields: &BTreeMap<String, StationYield>) -> TpyResult {
    match strategy {
        TpyStrategy::Fixed(chain) => compose_fixed(chain, station_yields),
        TpyStrategy::Discovered => compose_discovered(station_yields),
    }
}

fn compose_fixed(chain: &[String], station_yields: &BTreeMap<String, StationYield>) -> TpyResult {
    let mut stations = BTreeMap::new();
    let mut complete = true;

    for station in chain {
        match station_yields.get(station) {
            Some(sy) => {
                stations.insert(station.clone(), sy.throughput_yield);
            }
            None => complete = false,
        }
    }

    let tpy = if complete && !chain.is_empty() {
        Some(product_pct(stations.values().copied()))
    } else {
        None
    };

    TpyResult {
        station_count: stations.len(),
        stations,
        tpy,
    }
}

fn compose_discovered(station_yields: &BTreeMap<String, StationYield>) -> TpyResult {
    let stations: BTreeMap<String, f64> = station_yields
        .iter()
        .map(|(name, sy)| (name.clone(), sy.throughput_yield))
        .collect();

    let tpy = if stations.is_empty() {
        None
    } else {
        Some(product_pct(stations.values().copied()))
    };

    TpyResult {
        station_count: stations.len(),
        stations,
        tpy,
    }
}

/// Product of `(yield/100)` terms, scaled back to a percentage
fn product_pct(yields: impl Iterator<Item = f64>) -> f64 {
    yields.fold(1.0, |acc, y| acc * (y / 100.0)) * 100.0
}
