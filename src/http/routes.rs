use axum::{routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn feedback() -> Router<AppState> {
    Router::new().route(
        "/feedback/",
        get(handlers::list_feedback).post(handlers::submit_feedback),
    )
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/feedback/", get(handlers::admin_list_feedback))
        .route(
            "/admin/feedback/:id/",
            patch(handlers::admin_update_feedback),
        )
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/check-auth", get(handlers::check_auth))
        .route("/csrf-token", get(handlers::csrf_token))
}
