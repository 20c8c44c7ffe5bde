use axum::routing::{get, post};
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/session", get(handlers::session))
        .route("/api/auth/forgot-password", post(handlers::forgot_password))
        .route(
            "/api/auth/reset-password",
            get(handlers::check_reset_token).post(handlers::reset_password),
        )
}
