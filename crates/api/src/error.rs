//! API error taxonomy and HTTP mapping
//!
//! Every failure leaving a handler is an [`ApiError`]. Internal causes are
//! logged here and never serialized into the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::jwt::TokenError;
use crate::auth::users::CredentialError;
use crate::temperature::TemperatureError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Username already exists")]
    DuplicateUser,
    /// Unknown user and wrong password collapse into this variant
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid token")]
    TokenInvalid,
    #[error("Token expired")]
    TokenExpired,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid date format")]
    InvalidDateFormat,
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::DuplicateUser => StatusCode::CONFLICT,
            ApiError::InvalidCredentials
            | ApiError::TokenInvalid
            | ApiError::TokenExpired
            | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidDateFormat | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamUnavailable(_)
            | ApiError::MalformedUpstreamResponse(_)
            | ApiError::Database(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients
    fn public_message(&self) -> String {
        match self {
            ApiError::DuplicateUser => "Username already exists".to_string(),
            ApiError::InvalidCredentials => "Invalid credentials".to_string(),
            // Token failures share one message so callers cannot tell which check failed
            ApiError::TokenInvalid | ApiError::TokenExpired | ApiError::Unauthorized => {
                "Authentication required".to_string()
            }
            ApiError::InvalidDateFormat => {
                "Invalid date format, expected YYYY-MM-DD or YYYY-MM".to_string()
            }
            ApiError::InvalidInput(reason) => reason.clone(),
            ApiError::UpstreamUnavailable(_) | ApiError::MalformedUpstreamResponse(_) => {
                "Failed to retrieve temperature data".to_string()
            }
            ApiError::Database(_) | ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::UpstreamUnavailable(detail) => {
                tracing::error!(error = %detail, "Temperature upstream unavailable");
            }
            ApiError::MalformedUpstreamResponse(detail) => {
                tracing::error!(
                    error = %detail,
                    "Temperature upstream returned malformed data"
                );
            }
            ApiError::Database(detail) => {
                tracing::error!(error = %detail, "Database error");
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
            }
            other => {
                tracing::debug!(error = %other, status = status.as_u16(), "Request rejected");
            }
        }

        let body = Json(json!({
            "error": self.public_message(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::DuplicateUser => ApiError::DuplicateUser,
            CredentialError::InvalidCredentials => ApiError::InvalidCredentials,
            CredentialError::InvalidInput(reason) => ApiError::InvalidInput(reason),
            CredentialError::Store(e) => ApiError::Database(e.to_string()),
            CredentialError::Hashing(e) => ApiError::Internal(e),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => ApiError::TokenInvalid,
            TokenError::Expired => ApiError::TokenExpired,
            TokenError::Signing(e) => ApiError::Internal(e),
        }
    }
}

impl From<TemperatureError> for ApiError {
    fn from(err: TemperatureError) -> Self {
        match err {
            TemperatureError::InvalidDateFormat(_) => ApiError::InvalidDateFormat,
            TemperatureError::UpstreamUnavailable(detail) => ApiError::UpstreamUnavailable(detail),
            TemperatureError::MalformedUpstreamResponse(detail) => {
                ApiError::MalformedUpstreamResponse(detail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_upstream_detail_not_exposed() {
        let err = ApiError::UpstreamUnavailable("connect ECONNREFUSED 10.0.0.3".into());
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to retrieve temperature data");
        assert!(!body.to_string().contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn test_token_failures_share_message() {
        let (s1, invalid) = body_json(ApiError::TokenInvalid).await;
        let (s2, expired) = body_json(ApiError::TokenExpired).await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s1, s2);
        assert_eq!(invalid, expired);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(ApiError::DuplicateUser.status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::InvalidDateFormat.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::MalformedUpstreamResponse(String::new()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let (_, body) = body_json(ApiError::Database("duplicate key".into())).await;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["code"], 500);
    }
}
