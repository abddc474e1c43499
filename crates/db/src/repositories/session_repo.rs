//! Repository for the `dev_sessions` table.

use devsession_core::session::{DeploymentUpdate, NewSession};
use devsession_core::status::SessionStatus;
use devsession_core::types::DbId;
use sqlx::PgPool;

use crate::models::session::{DevSession, SessionListFilter};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_uuid, owner_user_id, owner_project_id, token, \
                        isolation_key, workload_name, status, cluster_ip, preview_path, \
                        chat_path, vscode_path, user_agent, client_ip, expires_at, is_active, \
                        deleted_at, created_at, updated_at";

/// Shared WHERE clause for list/count. `$1` = user, `$2` = project, `$3` = status.
const LIST_FILTER: &str = "is_active = true \
                           AND ($1::BIGINT IS NULL OR owner_user_id = $1) \
                           AND ($2::BIGINT IS NULL OR owner_project_id = $2) \
                           AND ($3::TEXT IS NULL OR status = $3)";

/// Provides CRUD operations for dev sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new active session, returning the created row.
    ///
    /// Fails with a unique violation on `uq_dev_sessions_active_isolation_key`
    /// if the namespace already has an active session.
    pub async fn create(pool: &PgPool, input: &NewSession) -> Result<DevSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO dev_sessions
                (project_uuid, owner_user_id, owner_project_id, token, isolation_key,
                 workload_name, status, cluster_ip, preview_path, chat_path, vscode_path,
                 user_agent, client_ip, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING {COLUMNS}"
        );
        let endpoints = &input.endpoints;
        sqlx::query_as::<_, DevSession>(&query)
            .bind(&input.project_uuid)
            .bind(input.owner_user_id)
            .bind(input.owner_project_id)
            .bind(&input.token)
            .bind(&input.isolation_key)
            .bind(&input.workload_name)
            .bind(input.status.as_str())
            .bind(endpoints.base_address())
            .bind(&endpoints.preview.route_path)
            .bind(&endpoints.chat.route_path)
            .bind(&endpoints.editor.route_path)
            .bind(&input.user_agent)
            .bind(&input.client_ip)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find an active session by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<DevSession>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM dev_sessions WHERE id = $1 AND is_active = true");
        sqlx::query_as::<_, DevSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a session by ID, including soft-deleted rows.
    pub async fn find_by_id_include_deleted(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<DevSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM dev_sessions WHERE id = $1");
        sqlx::query_as::<_, DevSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the active session for a project, if any.
    pub async fn find_active_by_project_uuid(
        pool: &PgPool,
        project_uuid: &str,
    ) -> Result<Option<DevSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM dev_sessions WHERE project_uuid = $1 AND is_active = true"
        );
        sqlx::query_as::<_, DevSession>(&query)
            .bind(project_uuid)
            .fetch_optional(pool)
            .await
    }

    /// List active sessions, most recently created first.
    pub async fn list(
        pool: &PgPool,
        filter: &SessionListFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DevSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM dev_sessions
             WHERE {LIST_FILTER}
             ORDER BY created_at DESC, id DESC
             LIMIT $4 OFFSET $5"
        );
        sqlx::query_as::<_, DevSession>(&query)
            .bind(filter.owner_user_id)
            .bind(filter.owner_project_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count active sessions matching `filter`.
    pub async fn count(pool: &PgPool, filter: &SessionListFilter) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM dev_sessions WHERE {LIST_FILTER}");
        let (count,): (i64,) = sqlx::query_as(&query)
            .bind(filter.owner_user_id)
            .bind(filter.owner_project_id)
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Record the outcome of a re-apply. Returns `None` if the session is not active.
    pub async fn update_deployment(
        pool: &PgPool,
        id: DbId,
        input: &DeploymentUpdate,
    ) -> Result<Option<DevSession>, sqlx::Error> {
        let query = format!(
            "UPDATE dev_sessions SET
                owner_user_id = $2,
                owner_project_id = $3,
                status = $4,
                cluster_ip = $5,
                preview_path = $6,
                chat_path = $7,
                vscode_path = $8
             WHERE id = $1 AND is_active = true
             RETURNING {COLUMNS}"
        );
        let endpoints = &input.endpoints;
        sqlx::query_as::<_, DevSession>(&query)
            .bind(id)
            .bind(input.owner_user_id)
            .bind(input.owner_project_id)
            .bind(input.status.as_str())
            .bind(endpoints.base_address())
            .bind(&endpoints.preview.route_path)
            .bind(&endpoints.chat.route_path)
            .bind(&endpoints.editor.route_path)
            .fetch_optional(pool)
            .await
    }

    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        status: SessionStatus,
    ) -> Result<Option<DevSession>, sqlx::Error> {
        let query = format!(
            "UPDATE dev_sessions SET status = $2
             WHERE id = $1 AND is_active = true
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DevSession>(&query)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete a session by ID. Returns `true` if a row was deactivated.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE dev_sessions SET is_active = false, deleted_at = NOW()
             WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
