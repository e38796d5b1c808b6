//! Authentication middleware for Axum

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use super::jwt::{JwtManager, TokenError};

/// Name of the HttpOnly cookie carrying the session token
pub const SESSION_COOKIE: &str = "token";

/// Authenticated caller, inserted into request extensions by [`require_auth`]
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub auth_method: AuthMethod,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthMethod {
    /// Token from the HttpOnly session cookie
    Cookie,
    /// Token from an `Authorization: Bearer` header
    Bearer,
}

/// State needed for authentication
#[derive(Clone)]
pub struct AuthState {
    pub jwt_manager: JwtManager,
}

/// Extract the session token from the HttpOnly cookie
fn extract_token_from_cookie(request: &Request) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE}=");
    request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(prefix.as_str()))
        .filter(|token| !token.is_empty())
        .map(String::from)
}

/// Extract bearer token from the session cookie or Authorization header.
///
/// The cookie wins because browsers never let page scripts read it; the
/// header exists for non-browser clients.
fn extract_token(request: &Request) -> Option<(String, AuthMethod)> {
    if let Some(token) = extract_token_from_cookie(request) {
        return Some((token, AuthMethod::Cookie));
    }

    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| (token.to_string(), AuthMethod::Bearer))
}

/// Middleware that requires a valid session token.
///
/// On failure the wrapped handler never runs and the caller gets a 401 with
/// a message that does not say which check failed.
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let Some((token, auth_method)) = extract_token(&request) else {
        tracing::debug!(path = %path, "require_auth: no session token");
        return AuthError::MissingAuth.into_response();
    };

    match auth_state.jwt_manager.verify(&token) {
        Ok(user_id) => {
            tracing::debug!(
                path = %path,
                user_id = %user_id,
                auth_method = ?auth_method,
                "require_auth: authentication successful"
            );
            request.extensions_mut().insert(AuthUser {
                user_id,
                auth_method,
            });
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(
                path = %path,
                error = %err,
                "require_auth: authentication failed"
            );
            AuthError::from(err).into_response()
        }
    }
}

/// Build the `Set-Cookie` value for a freshly issued token
pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> Result<HeaderValue, AuthError> {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        ttl.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| AuthError::Internal(e.to_string()))
}

/// `Set-Cookie` value that makes the browser drop the session token
pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    let cookie = if secure {
        "token=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0; Secure"
    } else {
        "token=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"
    };
    HeaderValue::from_static(cookie)
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Expired token")]
    ExpiredToken,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AuthError::InvalidToken,
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::Signing(e) => AuthError::Internal(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth | AuthError::InvalidToken | AuthError::ExpiredToken => {
                (StatusCode::UNAUTHORIZED, "Authentication required")
            }
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}
