//! Dev session records and the inputs that create or refresh them.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::endpoints::EndpointSet;
use crate::identity::{canonical_identity, isolation_key_for, workload_name_for};
use crate::status::SessionStatus;
use crate::types::{DbId, Timestamp};

/// Sessions are always-on, so they expire after a year rather than hours.
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 365;

/// One environment instance, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: DbId,
    /// Externally issued identity. Unique among active sessions.
    pub project_uuid: String,
    pub owner_user_id: DbId,
    pub owner_project_id: DbId,
    /// Opaque access token handed to the editor/chat front ends.
    pub token: String,
    /// Namespace scoping the workload.
    pub isolation_key: String,
    /// Helm release name.
    pub workload_name: String,
    pub status: SessionStatus,
    pub endpoints: EndpointSet,
    pub user_agent: Option<String>,
    /// Address of the client that created the session.
    pub client_ip: Option<String>,
    pub expires_at: Timestamp,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

/// What a caller asks for when it wants a session for a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub project_uuid: String,
    pub owner_user_id: DbId,
    pub owner_project_id: DbId,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
}

impl SessionRequest {
    /// The same request keyed by [`canonical_identity`].
    pub fn canonical(&self) -> Self {
        Self {
            project_uuid: canonical_identity(&self.project_uuid),
            ..self.clone()
        }
    }
}

/// Insert DTO for a session that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub project_uuid: String,
    pub owner_user_id: DbId,
    pub owner_project_id: DbId,
    pub token: String,
    pub isolation_key: String,
    pub workload_name: String,
    pub status: SessionStatus,
    pub endpoints: EndpointSet,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
    pub expires_at: Timestamp,
}

impl NewSession {
    /// A fresh `pending` session with static route paths and derived names.
    pub fn pending(request: &SessionRequest, ttl: chrono::Duration, now: Timestamp) -> Self {
        Self {
            project_uuid: request.project_uuid.clone(),
            owner_user_id: request.owner_user_id,
            owner_project_id: request.owner_project_id,
            token: uuid::Uuid::new_v4().to_string(),
            isolation_key: isolation_key_for(&request.project_uuid),
            workload_name: workload_name_for(&request.project_uuid),
            status: SessionStatus::Pending,
            endpoints: EndpointSet::unresolved(),
            user_agent: request.user_agent.clone(),
            client_ip: request.client_ip.clone(),
            expires_at: now + ttl,
        }
    }
}

/// Fields rewritten after an apply attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentUpdate {
    pub owner_user_id: DbId,
    pub owner_project_id: DbId,
    pub status: SessionStatus,
    pub endpoints: EndpointSet,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
