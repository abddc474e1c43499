use std::sync::Arc;

use devsession_core::reconciler::SessionReconciler;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: devsession_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Get-or-create session reconciler.
    pub reconciler: Arc<SessionReconciler>,
}
