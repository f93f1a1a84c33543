//! # SY Common Library
//!
//! Shared code for the Station Yield aggregation tools:
//! - Business calendar (production days, ISO weeks)
//! - Summary-store schema and initialization
//! - Configuration loading
//! - Error types

pub mod calendar;
pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
