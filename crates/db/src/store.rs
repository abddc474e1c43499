//! [`SessionStore`] backed by PostgreSQL.

use async_trait::async_trait;
use devsession_core::session::{DeploymentUpdate, NewSession, SessionRecord};
use devsession_core::status::SessionStatus;
use devsession_core::store::{SessionStore, StoreError};
use devsession_core::types::DbId;
use sqlx::PgPool;

use crate::models::session::DevSession;
use crate::repositories::SessionRepo;

/// PostgreSQL unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a sqlx error, surfacing unique violations by constraint name.
fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::UniqueViolation {
                constraint: db_err.constraint().unwrap_or("unknown").to_string(),
            };
        }
    }
    StoreError::Backend(err.to_string())
}

fn into_record(row: Option<DevSession>) -> Option<SessionRecord> {
    row.map(DevSession::into_record)
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find_active_by_project_uuid(
        &self,
        project_uuid: &str,
    ) -> Result<Option<SessionRecord>, StoreError> {
        SessionRepo::find_active_by_project_uuid(&self.pool, project_uuid)
            .await
            .map(into_record)
            .map_err(store_error)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<SessionRecord>, StoreError> {
        SessionRepo::find_by_id(&self.pool, id)
            .await
            .map(into_record)
            .map_err(store_error)
    }

    async fn find_by_id_include_deleted(
        &self,
        id: DbId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        SessionRepo::find_by_id_include_deleted(&self.pool, id)
            .await
            .map(into_record)
            .map_err(store_error)
    }

    async fn insert(&self, session: &NewSession) -> Result<SessionRecord, StoreError> {
        SessionRepo::create(&self.pool, session)
            .await
            .map(DevSession::into_record)
            .map_err(store_error)
    }

    async fn update_deployment(
        &self,
        id: DbId,
        update: &DeploymentUpdate,
    ) -> Result<Option<SessionRecord>, StoreError> {
        SessionRepo::update_deployment(&self.pool, id, update)
            .await
            .map(into_record)
            .map_err(store_error)
    }

    async fn update_status(
        &self,
        id: DbId,
        status: SessionStatus,
    ) -> Result<Option<SessionRecord>, StoreError> {
        SessionRepo::update_status(&self.pool, id, status)
            .await
            .map(into_record)
            .map_err(store_error)
    }

    async fn soft_delete(&self, id: DbId) -> Result<bool, StoreError> {
        SessionRepo::soft_delete(&self.pool, id)
            .await
            .map_err(store_error)
    }
}
