//! Shared query parameter types for API handlers.

use devsession_core::types::DbId;
use serde::Deserialize;

/// Owner ids passed alongside a project identity (`?user_id=&project_id=`).
#[derive(Debug, Default, Deserialize)]
pub struct OwnerParams {
    pub user_id: Option<DbId>,
    pub project_id: Option<DbId>,
}

/// Filters and pagination for `GET /sessions`.
///
/// Page values are normalised by `PageRequest::new`, not here.
#[derive(Debug, Default, Deserialize)]
pub struct ListSessionsParams {
    pub user_id: Option<DbId>,
    pub project_id: Option<DbId>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}
