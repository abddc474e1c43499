//! Dev session row model and list filter.

use devsession_core::endpoints::{Endpoint, EndpointSet};
use devsession_core::session::SessionRecord;
use devsession_core::status::SessionStatus;
use devsession_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `dev_sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct DevSession {
    pub id: DbId,
    pub project_uuid: String,
    pub owner_user_id: DbId,
    pub owner_project_id: DbId,
    pub token: String,
    pub isolation_key: String,
    pub workload_name: String,
    pub status: String,
    pub cluster_ip: String,
    pub preview_path: String,
    pub chat_path: String,
    pub vscode_path: String,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
    pub expires_at: Timestamp,
    pub is_active: bool,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl DevSession {
    pub fn into_record(self) -> SessionRecord {
        let status = SessionStatus::from_str_value(&self.status).unwrap_or_else(|e| {
            tracing::warn!(session_id = self.id, error = %e, "Unknown stored status, reading as error");
            SessionStatus::Error
        });
        let endpoint = |route_path: String| Endpoint {
            base_address: self.cluster_ip.clone(),
            route_path,
        };
        let endpoints = EndpointSet {
            preview: endpoint(self.preview_path),
            chat: endpoint(self.chat_path),
            editor: endpoint(self.vscode_path),
            resolved: !self.cluster_ip.is_empty(),
        };

        SessionRecord {
            id: self.id,
            project_uuid: self.project_uuid,
            owner_user_id: self.owner_user_id,
            owner_project_id: self.owner_project_id,
            token: self.token,
            isolation_key: self.isolation_key,
            workload_name: self.workload_name,
            status,
            endpoints,
            user_agent: self.user_agent,
            client_ip: self.client_ip,
            expires_at: self.expires_at,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

/// Optional filters for listing sessions. Only active sessions are listed.
#[derive(Debug, Clone, Default)]
pub struct SessionListFilter {
    pub owner_user_id: Option<DbId>,
    pub owner_project_id: Option<DbId>,
    pub status: Option<SessionStatus>,
}
