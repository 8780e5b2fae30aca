//! Database module for pingwatch.
//!
//! SQLite-backed append-only history of targets and measurements.

mod models;
mod store;

pub use models::*;
pub use store::*;
