pub mod health;
pub mod session;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /sessions                                 list (GET), get-or-create (POST)
/// /sessions/project/{project_uuid}          get-or-create (GET), update (PUT)
/// /sessions/{id}                            get, delete
/// /sessions/{id}/refresh                    sample workload status (POST)
/// /sessions/{id}/namespace                  release namespace (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/sessions", session::router())
}
