use axum::extract::State;
use axum::{routing::get, Json, Router};
use devsession_db::models::session::SessionListFilter;
use devsession_db::repositories::SessionRepo;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Active sessions, absent when the database could not be queried.
    pub active_sessions: Option<i64>,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_sessions = SessionRepo::count(&state.pool, &SessionListFilter::default())
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Health check query failed"))
        .ok();
    let db_healthy = active_sessions.is_some();

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        active_sessions,
    })
}

/// Root-level health route (not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
