// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! geotemp API Library
//!
//! Credential and session handling plus the temperature retrieval gateway
//! behind the regional temperature map.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod security;
pub mod state;
pub mod temperature;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
