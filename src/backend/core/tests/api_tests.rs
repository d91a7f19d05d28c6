//! HTTP API tests against the full router over a memory store.
//!
//! Tests cover:
//! - Health endpoint
//! - Role resolution from the X-Role-Id header (401 / 503)
//! - Current-role endpoints
//! - Management guards (read on the management page, manage grant for writes)
//! - Bulk update validation and persistence
//! - Grant, revoke and create-all

mod common;

use accessgate_core::access::{AccessService, DefaultRole, PageCatalog, RoleId, ROLE_HEADER};
use accessgate_core::api::{build_router, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use common::{seeded_service, UnreachableStore};

const ADMIN: RoleId = DefaultRole::Admin.id();
const MANAGER: RoleId = DefaultRole::Manager.id();
const SALES: RoleId = DefaultRole::Sales.id();
const WAREHOUSE: RoleId = DefaultRole::Warehouse.id();

// ============================================================================
// Helpers
// ============================================================================

fn app() -> Router {
    let (_, service) = seeded_service();
    build_router(AppState::new(service))
}

fn unreachable_app() -> Router {
    let service = AccessService::new(Arc::new(UnreachableStore), PageCatalog::business_default());
    build_router(AppState::new(Arc::new(service)))
}

fn request(method: Method, uri: &str, role: Option<RoleId>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder.header(ROLE_HEADER, role.get().to_string());
    }
    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn get(app: &Router, uri: &str, role: Option<RoleId>) -> (StatusCode, Value) {
    send(app, request(Method::GET, uri, role, None)).await
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_ok() {
    let (status, body) = get(&app(), "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_health_reports_store_outage() {
    let (status, body) = get(&unreachable_app(), "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

// ============================================================================
// Role Resolution
// ============================================================================

#[tokio::test]
async fn test_missing_role_header_is_unauthenticated() {
    let (status, body) = get(&app(), "/api/v1/me/permissions", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_unknown_or_malformed_role_is_unauthenticated() {
    let app = app();
    let (status, _) = get(&app, "/api/v1/me/permissions", Some(RoleId(999))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/v1/me/permissions")
        .header(ROLE_HEADER, "manager")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_store_outage_is_unavailable_not_forbidden() {
    let app = unreachable_app();

    let (status, body) = get(&app, "/api/v1/me/permissions", Some(MANAGER)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(&body), "ACCESS_DATA_UNAVAILABLE");

    let (status, _) = get(&app, "/api/v1/page-access/configuration", Some(MANAGER)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// Current Role
// ============================================================================

#[tokio::test]
async fn test_my_permissions() {
    let (status, body) = get(&app(), "/api/v1/me/permissions", Some(MANAGER)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["roleId"], MANAGER.get());
    assert_eq!(body["data"]["isSuperuser"], false);
    let count = body["data"]["permissions"].as_array().map(Vec::len);
    assert_eq!(count, Some(DefaultRole::Manager.granted_permissions().len()));
}

#[tokio::test]
async fn test_admin_is_reported_as_superuser() {
    let (status, body) = get(&app(), "/api/v1/me/page-access", Some(ADMIN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isSuperuser"], true);
}

#[tokio::test]
async fn test_my_access_resolves_nested_location() {
    let (status, body) = get(&app(), "/api/v1/me/access?page=/sales/orders/12", Some(MANAGER)).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["pageUrl"], "/sales/orders");
    assert_eq!(data["accessLevel"], "edit");
    assert_eq!(data["canView"], true);
    assert_eq!(data["canEdit"], true);
    assert_eq!(data["canCreate"], false);
    assert_eq!(data["canDelete"], false);
}

#[tokio::test]
async fn test_my_access_requires_page() {
    let (status, _) = get(&app(), "/api/v1/me/access?page=", Some(MANAGER)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_my_navigation_omits_inaccessible_categories() {
    let (status, body) = get(&app(), "/api/v1/me/navigation", Some(WAREHOUSE)).await;
    assert_eq!(status, StatusCode::OK);
    let categories: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|g| g["category"].as_str())
        .collect();
    assert_eq!(categories, vec!["General", "Production", "Inventory"]);
}

// ============================================================================
// Management Guards
// ============================================================================

#[tokio::test]
async fn test_manager_can_read_configuration() {
    let (status, body) = get(&app(), "/api/v1/page-access/configuration", Some(MANAGER)).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["roles"].as_array().map(Vec::len), Some(5));
    assert_eq!(data["pages"].as_array().map(Vec::len), Some(12));
    assert!(data["currentAccess"]
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["roleId"] == MANAGER.get() && r["pageUrl"] == "/accounting" && r["accessLevel"] == "read"));
}

#[tokio::test]
async fn test_sales_cannot_read_configuration() {
    let (status, body) = get(&app(), "/api/v1/page-access/configuration", Some(SALES)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");
    let unmet = &body["error"]["details"]["context"]["denial"]["unmet"][0];
    assert_eq!(unmet["kind"], "level");
    assert_eq!(unmet["page"], "/settings/permissions");
}

#[tokio::test]
async fn test_manager_cannot_write() {
    let app = app();
    let body = json!([{ "pageUrl": "/inventory", "roleId": SALES.get(), "accessLevel": "edit" }]);
    let (status, _) = send(
        &app,
        request(Method::POST, "/api/v1/page-access/bulk-update", Some(MANAGER), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/v1/page-access/create-all", Some(MANAGER), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Bulk Update
// ============================================================================

#[tokio::test]
async fn test_bulk_update_persists_for_subsequent_reads() {
    let app = app();
    let body = json!([
        { "pageUrl": "/accounting", "roleId": MANAGER.get(), "accessLevel": "create" },
        { "pageUrl": "/settings/roles", "roleId": MANAGER.get(), "accessLevel": "read" }
    ]);
    let (status, resp) = send(
        &app,
        request(Method::POST, "/api/v1/page-access/bulk-update", Some(ADMIN), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["changes"], 2);
    assert!(resp["message"].as_str().is_some());

    let (_, access) = get(&app, "/api/v1/me/access?page=/accounting", Some(MANAGER)).await;
    assert_eq!(access["data"]["accessLevel"], "create");
    assert_eq!(access["data"]["canDelete"], true);
}

#[tokio::test]
async fn test_bulk_update_rejects_legacy_view_token() {
    let body = json!([{ "pageUrl": "/accounting", "roleId": MANAGER.get(), "accessLevel": "view" }]);
    let (status, resp) = send(
        &app(),
        request(Method::POST, "/api/v1/page-access/bulk-update", Some(ADMIN), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&resp), "UNKNOWN_ACCESS_LEVEL");
}

#[tokio::test]
async fn test_bulk_update_rejects_unknown_page_and_writes_nothing() {
    let app = app();
    let body = json!([
        { "pageUrl": "/accounting", "roleId": MANAGER.get(), "accessLevel": "edit" },
        { "pageUrl": "/nowhere", "roleId": MANAGER.get(), "accessLevel": "edit" }
    ]);
    let (status, resp) = send(
        &app,
        request(Method::POST, "/api/v1/page-access/bulk-update", Some(ADMIN), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&resp), "PAGE_NOT_FOUND");

    let (_, access) = get(&app, "/api/v1/me/access?page=/accounting", Some(MANAGER)).await;
    assert_eq!(access["data"]["accessLevel"], "read");
}

#[tokio::test]
async fn test_bulk_update_requires_json_content_type() {
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/page-access/bulk-update")
        .header(ROLE_HEADER, ADMIN.get().to_string())
        .header(CONTENT_TYPE, "text/plain")
        .header("content-length", "2")
        .body(Body::from("[]"))
        .unwrap();
    let (status, _) = send(&app(), req).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_empty_bulk_update_reports_no_changes() {
    let (status, resp) = send(
        &app(),
        request(Method::POST, "/api/v1/page-access/bulk-update", Some(ADMIN), Some(json!([]))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["changes"], 0);
    assert_eq!(resp["message"], "No changes to save");
}

// ============================================================================
// Grants & Create-All
// ============================================================================

#[tokio::test]
async fn test_granting_manage_unlocks_writes() {
    let app = app();
    let uri = format!("/api/v1/roles/{}/permissions/15", SALES.get());

    let (status, resp) = send(&app, request(Method::POST, &uri, Some(ADMIN), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["granted"], true);

    let body = json!([{ "pageUrl": "/inventory", "roleId": SALES.get(), "accessLevel": "edit" }]);
    let (status, _) = send(
        &app,
        request(Method::POST, "/api/v1/page-access/bulk-update", Some(SALES), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, resp) = send(&app, request(Method::DELETE, &uri, Some(ADMIN), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["granted"], false);

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/v1/page-access/create-all", Some(SALES), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_permissions_unknown_role_is_not_found() {
    let (status, resp) = get(&app(), "/api/v1/roles/999/permissions", Some(ADMIN)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&resp), "ROLE_NOT_FOUND");
}

#[tokio::test]
async fn test_create_all_fills_every_gap_once() {
    let app = app();
    let (status, resp) = send(
        &app,
        request(Method::POST, "/api/v1/page-access/create-all", Some(ADMIN), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(resp["data"]["created"].as_u64().unwrap() > 0);

    let (_, resp) = send(
        &app,
        request(Method::POST, "/api/v1/page-access/create-all", Some(ADMIN), None),
    )
    .await;
    assert_eq!(resp["data"]["created"], 0);

    let (_, config) = get(&app, "/api/v1/page-access/configuration", Some(ADMIN)).await;
    assert_eq!(config["data"]["currentAccess"].as_array().map(Vec::len), Some(5 * 12));
}
