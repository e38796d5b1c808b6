//! API routes

pub mod auth;
pub mod health;
pub mod temperature;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{auth::require_auth, state::AppState};

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // Session-gated routes
    let protected_routes = Router::new()
        .route(
            "/protected-temperatures",
            get(temperature::protected_temperatures),
        )
        .route_layer(middleware::from_fn_with_state(
            state.auth_state(),
            require_auth,
        ));

    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout));

    let temperature_routes = Router::new()
        .route(
            "/api/temperature/temperature-data",
            get(temperature::temperature_data),
        )
        .route(
            "/api/temperature/{date}",
            get(temperature::temperature_for_date),
        );

    Router::new()
        .route("/health", get(health::health))
        .merge(auth_routes)
        .merge(temperature_routes)
        .merge(protected_routes)
        .with_state(state)
}
