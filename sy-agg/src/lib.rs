//! # SY Aggregation Engine
//!
//! Batch rollup of per-unit workstation events into production-quality
//! metrics: per-station throughput yield, model-specific first-pass
//! yield, composite total-process yield, and packing/hourly counts, at
//! daily and weekly granularity.
//!
//! The engine is idempotent by construction: every summary row is keyed
//! by its natural period key and written with insert-or-replace
//! semantics, so re-running any window converges to the same state.

pub mod driver;
pub mod events;
pub mod fpy;
pub mod rollup;
pub mod station_yield;
pub mod tpy;

pub use driver::{Driver, PeriodRequest, RunReport};
pub use events::{EventStore, StationEvent};
