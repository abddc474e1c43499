//! Handlers for the `/sessions` resource.
//!
//! Reconciler work runs on its own task: if the client disconnects the
//! deploy still finishes and its outcome is persisted.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use devsession_core::endpoints::EndpointKind;
use devsession_core::error::CoreError;
use devsession_core::pagination::{PageInfo, PageRequest};
use devsession_core::reconciler::{ReconcileError, SessionReconciler};
use devsession_core::session::{SessionRecord, SessionRequest};
use devsession_core::status::SessionStatus;
use devsession_core::types::{DbId, Timestamp};
use devsession_db::models::session::SessionListFilter;
use devsession_db::repositories::SessionRepo;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::client::ClientInfo;
use crate::query::{ListSessionsParams, OwnerParams};
use crate::state::AppState;

/// Session as returned to clients, endpoints flattened.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: DbId,
    pub project_uuid: String,
    pub owner_user_id: DbId,
    pub owner_project_id: DbId,
    pub token: String,
    pub isolation_key: String,
    pub workload_name: String,
    pub status: SessionStatus,
    pub cluster_ip: String,
    pub endpoints_resolved: bool,
    pub preview_url: Option<String>,
    pub preview_path: String,
    pub chat_url: Option<String>,
    pub chat_path: String,
    pub vscode_url: Option<String>,
    pub vscode_path: String,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
    pub expires_at: Timestamp,
    pub expired: bool,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<SessionRecord> for SessionResponse {
    fn from(record: SessionRecord) -> Self {
        let endpoints = &record.endpoints;
        Self {
            expired: record.is_expired(),
            cluster_ip: endpoints.base_address().to_string(),
            endpoints_resolved: endpoints.resolved,
            preview_url: endpoints.url(EndpointKind::Preview),
            preview_path: endpoints.preview.route_path.clone(),
            chat_url: endpoints.url(EndpointKind::Chat),
            chat_path: endpoints.chat.route_path.clone(),
            vscode_url: endpoints.url(EndpointKind::Editor),
            vscode_path: endpoints.editor.route_path.clone(),
            id: record.id,
            project_uuid: record.project_uuid,
            owner_user_id: record.owner_user_id,
            owner_project_id: record.owner_project_id,
            token: record.token,
            isolation_key: record.isolation_key,
            workload_name: record.workload_name,
            status: record.status,
            user_agent: record.user_agent,
            client_ip: record.client_ip,
            expires_at: record.expires_at,
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Body of `POST /sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub project_uuid: String,
    #[serde(default)]
    pub user_id: DbId,
    #[serde(default)]
    pub project_id: DbId,
}

/// Body of `PUT /sessions/project/{project_uuid}`.
#[derive(Debug, Deserialize)]
pub struct UpdateSessionBody {
    pub user_id: DbId,
    pub project_id: DbId,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionResponse>,
    pub pagination: PageInfo,
}

/// Run `op` against the reconciler on a spawned task and wait for it.
async fn detached<T, F, Fut>(reconciler: &Arc<SessionReconciler>, op: F) -> AppResult<T>
where
    F: FnOnce(Arc<SessionReconciler>) -> Fut,
    Fut: Future<Output = Result<T, ReconcileError>> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(op(Arc::clone(reconciler)));
    let result = task
        .await
        .map_err(|e| AppError::InternalError(format!("Reconciler task failed: {e}")))?;
    Ok(result?)
}

/// Trim a caller-supplied identity; an empty one is a bad request.
fn required_project_uuid(raw: &str) -> AppResult<String> {
    let project_uuid = raw.trim();
    if project_uuid.is_empty() {
        return Err(AppError::BadRequest("project_uuid is required".to_string()));
    }
    Ok(project_uuid.to_string())
}

/// GET /api/v1/sessions/project/{project_uuid}
pub async fn get_or_create_for_project(
    State(state): State<AppState>,
    Path(project_uuid): Path<String>,
    Query(params): Query<OwnerParams>,
    client: ClientInfo,
) -> AppResult<Json<SessionResponse>> {
    let request = SessionRequest {
        project_uuid: required_project_uuid(&project_uuid)?,
        owner_user_id: params.user_id.unwrap_or_default(),
        owner_project_id: params.project_id.unwrap_or_default(),
        user_agent: client.user_agent,
        client_ip: client.ip,
    };
    let reconciled = detached(&state.reconciler, |r| async move {
        r.get_or_create(&request).await
    })
    .await?;
    Ok(Json(reconciled.record.into()))
}

/// POST /api/v1/sessions
///
/// 201 when this call created the session, 200 when it already existed.
pub async fn create(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<CreateSessionBody>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    let request = SessionRequest {
        project_uuid: required_project_uuid(&input.project_uuid)?,
        owner_user_id: input.user_id,
        owner_project_id: input.project_id,
        user_agent: client.user_agent,
        client_ip: client.ip,
    };
    let reconciled = detached(&state.reconciler, |r| async move {
        r.get_or_create(&request).await
    })
    .await?;

    let status = if reconciled.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(reconciled.record.into())))
}

/// PUT /api/v1/sessions/project/{project_uuid}
pub async fn update_for_project(
    State(state): State<AppState>,
    Path(project_uuid): Path<String>,
    client: ClientInfo,
    Json(input): Json<UpdateSessionBody>,
) -> AppResult<Json<SessionResponse>> {
    let request = SessionRequest {
        project_uuid: required_project_uuid(&project_uuid)?,
        owner_user_id: input.user_id,
        owner_project_id: input.project_id,
        user_agent: client.user_agent,
        client_ip: client.ip,
    };
    let record = detached(&state.reconciler, |r| async move {
        r.update(&request).await
    })
    .await?;
    Ok(Json(record.into()))
}

/// GET /api/v1/sessions
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListSessionsParams>,
) -> AppResult<Json<SessionListResponse>> {
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(SessionStatus::from_str_value)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let filter = SessionListFilter {
        owner_user_id: params.user_id,
        owner_project_id: params.project_id,
        status,
    };
    let page = PageRequest::new(params.page, params.page_size);

    let rows = SessionRepo::list(&state.pool, &filter, page.limit(), page.offset()).await?;
    let total = SessionRepo::count(&state.pool, &filter).await?;

    Ok(Json(SessionListResponse {
        sessions: rows
            .into_iter()
            .map(|row| row.into_record().into())
            .collect(),
        pagination: PageInfo::new(page, total),
    }))
}

/// GET /api/v1/sessions/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<SessionResponse>> {
    let session = SessionRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Session",
            id,
        }))?;
    Ok(Json(session.into_record().into()))
}

/// DELETE /api/v1/sessions/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    detached(&state.reconciler, |r| async move { r.delete(id).await }).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/{id}/refresh
pub async fn refresh_status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<SessionResponse>> {
    let record = detached(&state.reconciler, |r| async move {
        r.refresh_status(id).await
    })
    .await?;
    Ok(Json(record.into()))
}

/// DELETE /api/v1/sessions/{id}/namespace
pub async fn release_namespace(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    detached(&state.reconciler, |r| async move {
        r.release_isolation(id).await
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
