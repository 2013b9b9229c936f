//! API routes
//!
//! - [`health`] - public health checks
//! - [`loyalty`] - staff loyalty operations

pub mod health;
pub mod loyalty;

use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// Every route, state not yet applied
pub fn build_router(state: &ServerState) -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(loyalty::router(state))
}

/// Fully layered application, used by the server and by tests
pub fn build_app(state: ServerState) -> Router {
    let max_in_flight = state.config.max_concurrent_requests;
    build_router(&state)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(max_in_flight))
}
