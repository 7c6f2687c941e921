//! Route modules for Orderbox Server

pub mod bundles;
pub mod health;
pub mod transfer;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .nest("/api", transfer::router().merge(bundles::router()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
