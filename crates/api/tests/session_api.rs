//! HTTP-level integration tests for the `/api/v1/sessions` endpoints.
//!
//! The deployment driver and resolver are fakes; the store is the real
//! PostgreSQL implementation.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use common::{
    body_json, build_test_app, build_test_app_with, delete, get, post_empty, post_json,
    put_json, send_with_headers, FakeDriver,
};
use devsession_core::status::SessionStatus;
use serde_json::json;
use sqlx::PgPool;

const PROJECT: &str = "11111111-1111-1111-1111-111111111111";
const OTHER_PROJECT: &str = "22222222-2222-2222-2222-222222222222";
const HEX_PROJECT: &str = "abcdef01-2345-6789-abcd-ef0123456789";

// ---------------------------------------------------------------------------
// Get-or-create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_post_creates_running_session(pool: PgPool) {
    let app = build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/sessions",
        json!({"project_uuid": PROJECT, "user_id": 7, "project_id": 42}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["project_uuid"], PROJECT);
    assert_eq!(json["status"], "running");
    assert_eq!(json["owner_user_id"], 7);
    assert_eq!(json["owner_project_id"], 42);
    assert_eq!(json["isolation_key"], PROJECT);
    assert_eq!(json["workload_name"], format!("dev-session-{PROJECT}"));
    assert_eq!(json["cluster_ip"], "10.0.0.5");
    assert_eq!(json["preview_url"], "http://10.0.0.5/preview");
    assert_eq!(json["chat_url"], "http://10.0.0.5/chat");
    assert_eq!(json["vscode_url"], "http://10.0.0.5/vscode");
    assert_eq!(json["vscode_path"], "/vscode");
    assert!(json["token"].is_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_second_post_returns_existing_without_redeploy(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    let body = json!({"project_uuid": PROJECT, "user_id": 7, "project_id": 42});

    let first = post_json(
        build_test_app_with(pool.clone(), driver.clone()),
        "/api/v1/sessions",
        body.clone(),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = body_json(first).await;

    let second = post_json(
        build_test_app_with(pool, driver.clone()),
        "/api/v1/sessions",
        body,
    )
    .await;
    assert_eq!(second.status(), StatusCode::OK);
    let second = body_json(second).await;

    assert_eq!(first, second);
    assert_eq!(driver.apply_count(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_by_project_creates_then_reuses(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    let uri = format!("/api/v1/sessions/project/{PROJECT}?user_id=3&project_id=4");

    let first = get(build_test_app_with(pool.clone(), driver.clone()), &uri).await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_json(first).await;
    assert_eq!(first["owner_user_id"], 3);

    let second = get(build_test_app_with(pool, driver.clone()), &uri).await;
    let second = body_json(second).await;
    assert_eq!(first["id"], second["id"]);
    assert_eq!(driver.apply_count(), 1);
    assert_eq!(*driver.last_owner.lock().unwrap(), Some((4, 3)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_empty_project_uuid_is_400(pool: PgPool) {
    let app = build_test_app(pool);
    let response = post_json(app, "/api/v1/sessions", json!({"project_uuid": "  "})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_by_project_trims_identity(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());

    let response = get(
        build_test_app_with(pool.clone(), driver.clone()),
        &format!("/api/v1/sessions/project/%20{PROJECT}%20"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["project_uuid"], PROJECT);

    let response = get(
        build_test_app_with(pool, driver.clone()),
        "/api/v1/sessions/project/%20%20",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(driver.apply_count(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_case_variant_reuses_existing_session(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    let upper = HEX_PROJECT.to_uppercase();

    let first = post_json(
        build_test_app_with(pool.clone(), driver.clone()),
        "/api/v1/sessions",
        json!({"project_uuid": upper}),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = body_json(first).await;
    assert_eq!(first["project_uuid"], HEX_PROJECT);

    let second = get(
        build_test_app_with(pool.clone(), driver.clone()),
        &format!("/api/v1/sessions/project/{HEX_PROJECT}"),
    )
    .await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_json(second).await["id"], first["id"]);
    assert_eq!(driver.apply_count(), 1);

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM dev_sessions WHERE isolation_key = $1 AND is_active")
            .bind(HEX_PROJECT)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_client_address_is_recorded(pool: PgPool) {
    let app = build_test_app(pool);
    let response = send_with_headers(
        app,
        Method::POST,
        "/api/v1/sessions",
        Some(json!({"project_uuid": PROJECT})),
        &[("x-forwarded-for", "203.0.113.9, 10.0.0.1"), ("user-agent", "curl/8.5")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["client_ip"], "203.0.113.9");
    assert_eq!(json["user_agent"], "curl/8.5");
    assert_eq!(json["expired"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_malformed_identity_persists_error_session(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    let app = build_test_app_with(pool, driver.clone());
    let response = post_json(app, "/api/v1/sessions", json!({"project_uuid": "not-a-uuid"})).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["cluster_ip"], "");
    assert!(json["preview_url"].is_null());
    assert_eq!(driver.apply_count(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_failed_deploy_persists_error_session(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    driver.fail_apply.store(true, Ordering::SeqCst);
    let app = build_test_app_with(pool, driver);

    let response = post_json(app, "/api/v1/sessions", json!({"project_uuid": PROJECT})).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["endpoints_resolved"], false);
    assert!(json["vscode_url"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_creates_yield_one_session(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    let body = json!({"project_uuid": PROJECT, "user_id": 1, "project_id": 1});

    let (a, b) = tokio::join!(
        post_json(
            build_test_app_with(pool.clone(), driver.clone()),
            "/api/v1/sessions",
            body.clone()
        ),
        post_json(
            build_test_app_with(pool.clone(), driver.clone()),
            "/api/v1/sessions",
            body
        ),
    );

    let mut statuses = [a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CREATED]);
    assert_eq!(body_json(a).await["id"], body_json(b).await["id"]);

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM dev_sessions WHERE project_uuid = $1 AND is_active")
            .bind(PROJECT)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

// ---------------------------------------------------------------------------
// Update / get / delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_put_reapplies_with_new_owner(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    post_json(
        build_test_app_with(pool.clone(), driver.clone()),
        "/api/v1/sessions",
        json!({"project_uuid": PROJECT, "user_id": 1, "project_id": 1}),
    )
    .await;

    let response = put_json(
        build_test_app_with(pool, driver.clone()),
        &format!("/api/v1/sessions/project/{PROJECT}"),
        json!({"user_id": 2, "project_id": 9}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["owner_project_id"], 9);
    assert_eq!(json["status"], "running");
    assert_eq!(driver.apply_count(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_put_without_session_is_404(pool: PgPool) {
    let app = build_test_app(pool);
    let response = put_json(
        app,
        &format!("/api/v1/sessions/project/{PROJECT}"),
        json!({"user_id": 2, "project_id": 9}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_nonexistent_session_returns_404(pool: PgPool) {
    let app = build_test_app(pool);
    let response = get(app, "/api/v1/sessions/999999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_then_recreate(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    let created = post_json(
        build_test_app_with(pool.clone(), driver.clone()),
        "/api/v1/sessions",
        json!({"project_uuid": PROJECT}),
    )
    .await;
    let id = body_json(created).await["id"].as_i64().unwrap();

    let response = delete(
        build_test_app_with(pool.clone(), driver.clone()),
        &format!("/api/v1/sessions/{id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(driver.removes.load(Ordering::SeqCst), 1);

    let response = get(
        build_test_app_with(pool.clone(), driver.clone()),
        &format!("/api/v1/sessions/{id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let recreated = post_json(
        build_test_app_with(pool, driver.clone()),
        "/api/v1/sessions",
        json!({"project_uuid": PROJECT}),
    )
    .await;
    assert_eq!(recreated.status(), StatusCode::CREATED);
    assert_ne!(body_json(recreated).await["id"].as_i64().unwrap(), id);
    assert_eq!(driver.apply_count(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_unknown_session_is_404(pool: PgPool) {
    let app = build_test_app(pool);
    let response = delete(app, "/api/v1/sessions/424242").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Status refresh / namespace release
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refresh_records_new_status(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    let created = post_json(
        build_test_app_with(pool.clone(), driver.clone()),
        "/api/v1/sessions",
        json!({"project_uuid": PROJECT}),
    )
    .await;
    let id = body_json(created).await["id"].as_i64().unwrap();

    driver.set_status(SessionStatus::Stopped);
    let response = post_empty(
        build_test_app_with(pool, driver),
        &format!("/api/v1/sessions/{id}/refresh"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "stopped");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_namespace_release_requires_deleted_session(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    let created = post_json(
        build_test_app_with(pool.clone(), driver.clone()),
        "/api/v1/sessions",
        json!({"project_uuid": PROJECT}),
    )
    .await;
    let id = body_json(created).await["id"].as_i64().unwrap();
    let uri = format!("/api/v1/sessions/{id}/namespace");

    let response = delete(build_test_app_with(pool.clone(), driver.clone()), &uri).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    delete(
        build_test_app_with(pool.clone(), driver.clone()),
        &format!("/api/v1/sessions/{id}"),
    )
    .await;
    let response = delete(build_test_app_with(pool, driver.clone()), &uri).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(driver.namespace_releases.load(Ordering::SeqCst), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_namespace_release_refused_while_successor_active(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    let create = || {
        post_json(
            build_test_app_with(pool.clone(), driver.clone()),
            "/api/v1/sessions",
            json!({"project_uuid": PROJECT}),
        )
    };

    let old_id = body_json(create().await).await["id"].as_i64().unwrap();
    delete(
        build_test_app_with(pool.clone(), driver.clone()),
        &format!("/api/v1/sessions/{old_id}"),
    )
    .await;
    let successor = create().await;
    assert_eq!(successor.status(), StatusCode::CREATED);
    let successor_id = body_json(successor).await["id"].as_i64().unwrap();

    let response = delete(
        build_test_app_with(pool.clone(), driver.clone()),
        &format!("/api/v1/sessions/{old_id}/namespace"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(driver.namespace_releases.load(Ordering::SeqCst), 0);

    let response = get(
        build_test_app_with(pool.clone(), driver.clone()),
        &format!("/api/v1/sessions/{successor_id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "running");
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_paginates_and_filters(pool: PgPool) {
    let driver = Arc::new(FakeDriver::default());
    for (project, user) in [(PROJECT, 1), (OTHER_PROJECT, 2)] {
        post_json(
            build_test_app_with(pool.clone(), driver.clone()),
            "/api/v1/sessions",
            json!({"project_uuid": project, "user_id": user, "project_id": 5}),
        )
        .await;
    }

    let response = get(
        build_test_app_with(pool.clone(), driver.clone()),
        "/api/v1/sessions?page_size=1&page=2",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["sessions"].as_array().unwrap().len(), 1);
    assert_eq!(json["pagination"]["total"], 2);
    assert_eq!(json["pagination"]["total_pages"], 2);
    assert_eq!(json["pagination"]["page"], 2);

    let response = get(
        build_test_app_with(pool.clone(), driver.clone()),
        "/api/v1/sessions?user_id=2&page_size=500",
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["pagination"]["page_size"], 10);
    assert_eq!(json["sessions"][0]["project_uuid"], OTHER_PROJECT);
    assert_eq!(json["pagination"]["total"], 1);

    let response = get(
        build_test_app_with(pool, driver),
        "/api/v1/sessions?status=sideways",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
