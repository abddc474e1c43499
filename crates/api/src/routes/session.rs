use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::session;
use crate::state::AppState;

/// Session routes, mounted at `/sessions`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(session::list).post(session::create))
        .route(
            "/project/{project_uuid}",
            get(session::get_or_create_for_project).put(session::update_for_project),
        )
        .route("/{id}", get(session::get_by_id).delete(session::delete))
        .route("/{id}/refresh", post(session::refresh_status))
        .route("/{id}/namespace", delete(session::release_namespace))
}
