#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! geotemp shared crate
//!
//! Database plumbing and the geographic value types used by the API crate.

pub mod db;
pub mod geo;

pub use db::{create_pool, run_migrations, DbError};
pub use geo::{BoundingBox, TemperatureBand, TemperaturePoint};
