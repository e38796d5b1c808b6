//! Registration, login and logout

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{clear_session_cookie, session_cookie},
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Turn a body rejection into the uniform 400 error
fn credentials(
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<CredentialsRequest> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected credentials body");
        ApiError::InvalidInput("Username and password are required".to_string())
    })?;
    Ok(req)
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let req = credentials(payload)?;
    state
        .credentials
        .register(&req.username, &req.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully",
        }),
    ))
}

/// Verify credentials and set the session cookie
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let req = credentials(payload)?;
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::InvalidInput(
            "Username and password are required".to_string(),
        ));
    }

    let user = state
        .credentials
        .verify(&req.username, &req.password)
        .await?;
    let issued = state.jwt_manager.issue(user.id)?;
    let cookie = session_cookie(
        &issued.token,
        state.jwt_manager.ttl(),
        state.config.cookie_secure,
    )
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(
        user_id = %user.id,
        expires_at = %issued.expires_at,
        "User logged in"
    );

    Ok((
        [(SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Login successful",
        }),
    )
        .into_response())
}

/// Expire the session cookie; tokens are stateless so nothing is revoked server-side
pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = clear_session_cookie(state.config.cookie_secure);
    (
        [(SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Logged out",
        }),
    )
        .into_response()
}
