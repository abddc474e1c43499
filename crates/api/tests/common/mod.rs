#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use devsession_api::config::{DeployConfig, LogFormat, ServerConfig};
use devsession_api::router::build_app_router;
use devsession_api::state::AppState;
use devsession_core::deploy::{validate_identity, DeployError, DeploymentDriver};
use devsession_core::endpoints::EndpointSet;
use devsession_core::identity::ProjectIdentity;
use devsession_core::reconciler::SessionReconciler;
use devsession_core::resolver::{EndpointResolver, ResolveError};
use devsession_core::status::SessionStatus;
use devsession_core::types::DbId;
use devsession_db::PgSessionStore;

/// Front-door address every fake deployment resolves to.
pub const FAKE_ADDRESS: &str = "10.0.0.5";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        db_max_connections: 5,
        log_format: LogFormat::Pretty,
        deploy: DeployConfig::from_lookup(|_| None),
    }
}

/// Deployment driver that records calls instead of running helm.
#[derive(Default)]
pub struct FakeDriver {
    pub applies: AtomicUsize,
    pub removes: AtomicUsize,
    pub namespace_releases: AtomicUsize,
    pub fail_apply: AtomicBool,
    pub last_owner: Mutex<Option<(DbId, DbId)>>,
    pub status: Mutex<Option<SessionStatus>>,
}

impl FakeDriver {
    pub fn apply_count(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, status: SessionStatus) {
        *self.status.lock().unwrap() = Some(status);
    }
}

#[async_trait]
impl DeploymentDriver for FakeDriver {
    async fn apply(
        &self,
        identity: &str,
        owner_project_id: DbId,
        owner_user_id: DbId,
    ) -> Result<(), DeployError> {
        validate_identity(identity)?;
        self.applies.fetch_add(1, Ordering::SeqCst);
        *self.last_owner.lock().unwrap() = Some((owner_project_id, owner_user_id));
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(DeployError::Timeout {
                operation: "helm upgrade",
                elapsed_ms: 330_000,
                output: "Error: timed out waiting for the condition".to_string(),
            });
        }
        Ok(())
    }

    async fn remove(&self, identity: &str) -> Result<(), DeployError> {
        validate_identity(identity)?;
        self.removes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn status(&self, identity: &str) -> Result<SessionStatus, DeployError> {
        validate_identity(identity)?;
        Ok(self.status.lock().unwrap().unwrap_or(SessionStatus::Running))
    }

    async fn release_namespace(&self, identity: &str) -> Result<(), DeployError> {
        validate_identity(identity)?;
        self.namespace_releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Resolver that always finds [`FAKE_ADDRESS`].
pub struct FakeResolver;

#[async_trait]
impl EndpointResolver for FakeResolver {
    async fn resolve(
        &self,
        _identity: &ProjectIdentity,
        _workload_name: &str,
    ) -> Result<EndpointSet, ResolveError> {
        Ok(EndpointSet::at(FAKE_ADDRESS))
    }
}

/// Build the full application router around `driver` and a real store.
///
/// Uses the same `build_app_router` as `main.rs`, so the middleware stack
/// under test matches production.
pub fn build_test_app_with(pool: PgPool, driver: Arc<FakeDriver>) -> Router {
    let config = test_config();
    let store = Arc::new(PgSessionStore::new(pool.clone()));
    let reconciler = SessionReconciler::new(driver, Arc::new(FakeResolver), store);

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        reconciler: Arc::new(reconciler),
    };
    build_app_router(state, &config)
}

pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, Arc::new(FakeDriver::default()))
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    send_with_headers(app, method, uri, body, &[]).await
}

pub async fn send_with_headers(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
