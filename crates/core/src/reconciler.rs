//! Get-or-create session reconciler.
//!
//! Maps a project identity onto exactly one active session and its
//! workload. The store is the source of truth; the cluster is brought in
//! line with it through the [`DeploymentDriver`] and observed through the
//! [`EndpointResolver`]. Nothing is cached between calls.

use std::sync::Arc;

use chrono::Utc;

use crate::deploy::{validate_identity, DeployError, DeploymentDriver};
use crate::endpoints::EndpointSet;
use crate::resolver::EndpointResolver;
use crate::session::{
    DeploymentUpdate, NewSession, SessionRecord, SessionRequest, DEFAULT_SESSION_TTL_DAYS,
};
use crate::status::SessionStatus;
use crate::store::{SessionStore, StoreError};
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Session {0} not found")]
    SessionNotFound(DbId),

    #[error("No active session for project {0}")]
    ProjectNotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of [`SessionReconciler::get_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub record: SessionRecord,
    /// `true` when this call created the session.
    pub created: bool,
}

/// Status and endpoints observed after one apply attempt.
struct DeploymentOutcome {
    status: SessionStatus,
    endpoints: EndpointSet,
}

impl DeploymentOutcome {
    fn failed() -> Self {
        Self {
            status: SessionStatus::Error,
            endpoints: EndpointSet::unresolved(),
        }
    }
}

/// Orchestrates the session lifecycle:
/// 1. Look up the active session for the project.
/// 2. Otherwise validate the identity and apply the workload.
/// 3. Resolve endpoints (a missing address leaves the session degraded).
/// 4. Persist the outcome, falling back to a re-read on a concurrent insert.
pub struct SessionReconciler {
    driver: Arc<dyn DeploymentDriver>,
    resolver: Arc<dyn EndpointResolver>,
    store: Arc<dyn SessionStore>,
    session_ttl: chrono::Duration,
}

impl SessionReconciler {
    pub fn new(
        driver: Arc<dyn DeploymentDriver>,
        resolver: Arc<dyn EndpointResolver>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            driver,
            resolver,
            store,
            session_ttl: chrono::Duration::days(DEFAULT_SESSION_TTL_DAYS),
        }
    }

    pub fn with_session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Return the active session for the project, creating and deploying
    /// one if none exists.
    ///
    /// A deployment failure is not an error here: the session is persisted
    /// with status `error` so the failure is visible to the caller.
    pub async fn get_or_create(
        &self,
        request: &SessionRequest,
    ) -> Result<Reconciled, ReconcileError> {
        let request = &request.canonical();

        // 1. Existing session short-circuits; no cluster access.
        if let Some(existing) = self
            .store
            .find_active_by_project_uuid(&request.project_uuid)
            .await?
        {
            tracing::info!(
                project_uuid = %request.project_uuid,
                session_id = existing.id,
                status = %existing.status,
                "Found existing session"
            );
            return Ok(Reconciled {
                record: existing,
                created: false,
            });
        }

        tracing::info!(project_uuid = %request.project_uuid, "Creating new session");

        // 2-3. Deploy and observe.
        let mut session = NewSession::pending(request, self.session_ttl, Utc::now());
        let outcome = self
            .deploy(
                &request.project_uuid,
                request.owner_project_id,
                request.owner_user_id,
            )
            .await;
        session.status = outcome.status;
        session.endpoints = outcome.endpoints;

        // 4. Persist. The unique index decides concurrent creators.
        match self.store.insert(&session).await {
            Ok(record) => {
                tracing::info!(
                    project_uuid = %record.project_uuid,
                    session_id = record.id,
                    status = %record.status,
                    "Session created"
                );
                Ok(Reconciled {
                    record,
                    created: true,
                })
            }
            Err(StoreError::UniqueViolation { constraint }) => {
                tracing::warn!(
                    project_uuid = %request.project_uuid,
                    %constraint,
                    "Concurrent create detected, re-reading session"
                );
                match self
                    .store
                    .find_active_by_project_uuid(&request.project_uuid)
                    .await?
                {
                    Some(record) => Ok(Reconciled {
                        record,
                        created: false,
                    }),
                    None => Err(ReconcileError::Conflict(format!(
                        "Session for project {} was created and removed concurrently",
                        request.project_uuid
                    ))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-apply the workload of an existing session with new owner ids.
    pub async fn update(&self, request: &SessionRequest) -> Result<SessionRecord, ReconcileError> {
        let request = &request.canonical();
        let record = self
            .store
            .find_active_by_project_uuid(&request.project_uuid)
            .await?
            .ok_or_else(|| ReconcileError::ProjectNotFound(request.project_uuid.clone()))?;

        tracing::info!(
            project_uuid = %request.project_uuid,
            session_id = record.id,
            "Updating session"
        );

        let outcome = self
            .deploy(
                &request.project_uuid,
                request.owner_project_id,
                request.owner_user_id,
            )
            .await;
        let update = DeploymentUpdate {
            owner_user_id: request.owner_user_id,
            owner_project_id: request.owner_project_id,
            status: outcome.status,
            endpoints: outcome.endpoints,
        };

        self.store
            .update_deployment(record.id, &update)
            .await?
            .ok_or(ReconcileError::SessionNotFound(record.id))
    }

    /// Remove the workload and soft-delete the session.
    ///
    /// A failed removal is logged and does not block the delete, so the
    /// identity is always released for reuse. The namespace is kept.
    pub async fn delete(&self, id: DbId) -> Result<(), ReconcileError> {
        let record = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(ReconcileError::SessionNotFound(id))?;

        if let Err(e) = self.driver.remove(&record.project_uuid).await {
            tracing::warn!(
                session_id = id,
                project_uuid = %record.project_uuid,
                error = %e,
                "Failed to remove workload, continuing with session delete"
            );
        }

        if !self.store.soft_delete(id).await? {
            return Err(ReconcileError::SessionNotFound(id));
        }
        tracing::info!(session_id = id, project_uuid = %record.project_uuid, "Session deleted");
        Ok(())
    }

    /// Sample the workload status and persist it if it changed.
    ///
    /// A status that cannot be read is recorded as `error`.
    pub async fn refresh_status(&self, id: DbId) -> Result<SessionRecord, ReconcileError> {
        let record = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(ReconcileError::SessionNotFound(id))?;

        let status = match self.driver.status(&record.project_uuid).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(session_id = id, error = %e, "Failed to read workload status");
                SessionStatus::Error
            }
        };

        if status == record.status {
            return Ok(record);
        }

        tracing::info!(
            session_id = id,
            from = %record.status,
            to = %status,
            "Session status changed"
        );
        self.store
            .update_status(id, status)
            .await?
            .ok_or(ReconcileError::SessionNotFound(id))
    }

    /// Delete the namespace of a session that has already been deleted.
    ///
    /// Refused while any active session, including a successor created
    /// after the delete, still lives in the namespace.
    pub async fn release_isolation(&self, id: DbId) -> Result<(), ReconcileError> {
        let record = self
            .store
            .find_by_id_include_deleted(id)
            .await?
            .ok_or(ReconcileError::SessionNotFound(id))?;

        if record.is_active {
            return Err(ReconcileError::Conflict(format!(
                "Session {id} is still active; delete it before releasing its namespace"
            )));
        }

        if let Some(successor) = self
            .store
            .find_active_by_project_uuid(&record.project_uuid)
            .await?
        {
            return Err(ReconcileError::Conflict(format!(
                "Namespace {} is in use by active session {}",
                record.isolation_key, successor.id
            )));
        }

        self.driver.release_namespace(&record.project_uuid).await?;
        tracing::info!(session_id = id, namespace = %record.isolation_key, "Session namespace released");
        Ok(())
    }

    /// Validate, apply, resolve. Never fails; failures become an `error` outcome.
    async fn deploy(
        &self,
        project_uuid: &str,
        owner_project_id: DbId,
        owner_user_id: DbId,
    ) -> DeploymentOutcome {
        let identity = match validate_identity(project_uuid) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(project_uuid, error = %e, "Rejected malformed project identity");
                return DeploymentOutcome::failed();
            }
        };

        if let Err(e) = self
            .driver
            .apply(identity.as_str(), owner_project_id, owner_user_id)
            .await
        {
            tracing::error!(project_uuid, error = %e, "Deployment failed");
            return DeploymentOutcome::failed();
        }

        let endpoints = match self
            .resolver
            .resolve(&identity, &identity.release_name())
            .await
        {
            Ok(endpoints) => endpoints,
            Err(e) => {
                tracing::warn!(project_uuid, error = %e, "Endpoint resolution rejected");
                EndpointSet::unresolved()
            }
        };
        if !endpoints.resolved {
            tracing::warn!(project_uuid, "Workload running without a resolved address");
        }

        DeploymentOutcome {
            status: SessionStatus::Running,
            endpoints,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
