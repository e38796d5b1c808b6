//! Temperature data routes

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use geotemp_shared::TemperaturePoint;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
    temperature::DateSpec,
};

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

/// `GET /api/temperature/{date}`
pub async fn temperature_for_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> ApiResult<Json<Vec<TemperaturePoint>>> {
    let points = state.gateway.fetch_points(&date).await?;
    Ok(Json(points))
}

/// `GET /api/temperature/temperature-data?date=...`
pub async fn temperature_data(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Vec<TemperaturePoint>>> {
    let date = query.date.ok_or(ApiError::InvalidDateFormat)?;
    let points = state.gateway.fetch_points(&date).await?;
    Ok(Json(points))
}

/// `GET /protected-temperatures?date=...`, defaulting to the current UTC day
pub async fn protected_temperatures(
    State(state): State<AppState>,
    auth_user: Option<Extension<AuthUser>>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Vec<TemperaturePoint>>> {
    let Some(Extension(auth_user)) = auth_user else {
        return Err(ApiError::Unauthorized);
    };

    let date = match query.date {
        Some(date) => date,
        None => DateSpec::Day(OffsetDateTime::now_utc().date()).to_string(),
    };

    tracing::debug!(
        user_id = %auth_user.user_id,
        date = %date,
        "Protected temperature request"
    );
    let points = state.gateway.fetch_points(&date).await?;
    Ok(Json(points))
}
