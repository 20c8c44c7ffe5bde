pub mod auth;
pub mod posts;
pub mod profile;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Every route of the JSON API, traced and bound to `state`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(posts::router())
        .merge(profile::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
