//! Persistence seam used by the reconciler.
//!
//! The PostgreSQL implementation lives in the `db` crate. The store is the
//! single source of truth; a unique index on active `project_uuid` is the
//! only concurrency control between service instances.

use async_trait::async_trait;

use crate::session::{DeploymentUpdate, NewSession, SessionRecord};
use crate::status::SessionStatus;
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another writer already holds the key (usually the active namespace).
    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },

    #[error("storage error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `project_uuid` is expected in canonical (lowercase) form.
    async fn find_active_by_project_uuid(
        &self,
        project_uuid: &str,
    ) -> Result<Option<SessionRecord>, StoreError>;

    /// Active sessions only.
    async fn find_by_id(&self, id: DbId) -> Result<Option<SessionRecord>, StoreError>;

    /// Includes soft-deleted sessions.
    async fn find_by_id_include_deleted(
        &self,
        id: DbId,
    ) -> Result<Option<SessionRecord>, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] when an active session
    /// already owns the same isolation key.
    async fn insert(&self, session: &NewSession) -> Result<SessionRecord, StoreError>;

    async fn update_deployment(
        &self,
        id: DbId,
        update: &DeploymentUpdate,
    ) -> Result<Option<SessionRecord>, StoreError>;

    async fn update_status(
        &self,
        id: DbId,
        status: SessionStatus,
    ) -> Result<Option<SessionRecord>, StoreError>;

    /// Mark inactive. Returns `false` if the session was not active.
    async fn soft_delete(&self, id: DbId) -> Result<bool, StoreError>;
}
