//! Health check routes
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /health | GET | none |
//! | /health/detailed | GET | none |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::time::SystemTime;

use crate::core::ServerState;

/// Public routes
pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Active punch overflow policy (cap | rollover)
    overflow_policy: &'static str,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    /// Enrolled members, absent when the store is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    members: Option<i64>,
    checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    database: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    status: &'static str,
    latency_ms: Option<u64>,
    message: Option<String>,
}

impl CheckResult {
    fn ok_with_latency(latency_ms: u64) -> Self {
        Self {
            status: "ok",
            latency_ms: Some(latency_ms),
            message: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            latency_ms: None,
            message: Some(message.into()),
        }
    }
}

static START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

fn get_uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(SystemTime::now);
    SystemTime::now()
        .duration_since(*start)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    START_TIME.get_or_init(SystemTime::now);
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        overflow_policy: state.loyalty.policy().as_str(),
    })
}

/// Health including a database round trip
pub async fn detailed_health(State(state): State<ServerState>) -> Json<DetailedHealthResponse> {
    let db_start = std::time::Instant::now();
    let (db_check, members) =
        match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM loyalty_members")
            .fetch_one(&state.pool)
            .await
        {
            Ok(count) => (
                CheckResult::ok_with_latency(db_start.elapsed().as_millis() as u64),
                Some(count),
            ),
            Err(e) => {
                tracing::warn!("Health check database probe failed: {e}");
                (CheckResult::error("Database unavailable"), None)
            }
        };

    let all_ok = db_check.status == "ok";

    Json(DetailedHealthResponse {
        status: if all_ok { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: get_uptime_seconds(),
        members,
        checks: HealthChecks { database: db_check },
    })
}
