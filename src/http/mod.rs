use axum::http::{header, HeaderValue, Method};
use axum::{middleware as axum_middleware, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::AppState;

pub mod auth;
mod error;
mod extract;
mod handlers;
pub mod middleware;
mod routes;

pub use auth::{CsrfVerified, CurrentSession, StaffUser};
pub use error::AppError;
pub use extract::{AppJson, AppPath};

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_allowed_origins);

    Router::new()
        .merge(routes::feedback())
        .merge(routes::admin())
        .merge(routes::auth())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::hosts::allowed_hosts_middleware,
        ))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, auth::CSRF_HEADER])
}
