//! Loyalty API module
//!
//! Staff-only: every route sits behind [`require_auth`].

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::require_auth;
use crate::core::ServerState;

pub use handler::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};

pub fn router(state: &ServerState) -> Router<ServerState> {
    Router::new().nest(
        "/api/loyalty",
        routes().layer(middleware::from_fn_with_state(state.clone(), require_auth)),
    )
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/members", get(handler::list).post(handler::create))
        .route("/members/search", get(handler::search))
        .route(
            "/members/{id}",
            get(handler::get_by_id).delete(handler::delete),
        )
        .route("/members/{id}/phone", put(handler::update_phone))
        .route("/members/{id}/email", put(handler::update_email))
        .route("/members/{id}/name", put(handler::update_name))
        .route("/members/{id}/punches", post(handler::add_punches))
        .route("/members/{id}/adjustments", post(handler::remove_punches))
        .route("/members/{id}/redeem", post(handler::redeem))
        .route("/members/{id}/history", get(handler::member_history))
        .route("/members/{id}/reconcile", get(handler::reconcile))
        .route("/history", get(handler::recent_history))
        .route("/stats", get(handler::stats))
}
