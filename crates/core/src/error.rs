use crate::deploy::DeployError;
use crate::reconciler::ReconcileError;
use crate::store::StoreError;
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("No active session for project {0}")]
    ProjectNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ReconcileError> for CoreError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::SessionNotFound(id) => CoreError::NotFound {
                entity: "Session",
                id,
            },
            ReconcileError::ProjectNotFound(uuid) => CoreError::ProjectNotFound(uuid),
            ReconcileError::Conflict(msg) => CoreError::Conflict(msg),
            ReconcileError::Store(StoreError::UniqueViolation { constraint }) => {
                CoreError::Conflict(format!("Duplicate value violates {constraint}"))
            }
            ReconcileError::Store(other) => CoreError::Internal(other.to_string()),
            ReconcileError::Deploy(DeployError::InvalidIdentity(e)) => {
                CoreError::Validation(e.to_string())
            }
            ReconcileError::Deploy(other) => CoreError::Internal(other.to_string()),
        }
    }
}
