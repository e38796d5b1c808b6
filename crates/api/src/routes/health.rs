//! Health check

use axum::{extract::State, Json};
use geotemp_shared::BoundingBox;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub source: &'static str,
    /// Area observations are clipped to, as `[min_lon, min_lat, max_lon, max_lat]`
    pub region: BoundingBox,
    pub version: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        source: state.gateway.source_name(),
        region: state.gateway.region(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
