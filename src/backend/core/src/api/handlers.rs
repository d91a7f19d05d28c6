//! API request handlers.
//!
//! All handlers return `Result<impl IntoResponse, AccessError>` so errors
//! render through `AccessError`'s `IntoResponse`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{ApiResponse, AppState};
use crate::access::{
    require_resolved, AccessRule, NavigationGroup, Permission, PermissionId, RoleContext, RoleId, RuleChange,
    RuleChangeRequest,
};
use crate::error::{AccessError, Result};

async fn current_role(state: &AppState, role: RoleContext) -> Result<RoleId> {
    let resolved = state.service.resolve_role(role.0).await;
    require_resolved(&resolved)
}

fn is_bypass(state: &AppState, role_id: RoleId) -> bool {
    state.service.control().roles().is_bypass(role_id)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Health & Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse> {
    state.service.health_check().await?;
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "store": state.service.store().backend_name(),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.as_ref().map(|h| h.render()).unwrap_or_default();
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Current Role
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyPermissions {
    pub role_id: RoleId,
    pub is_superuser: bool,
    pub permissions: Vec<Permission>,
}

pub async fn my_permissions(State(state): State<AppState>, role: RoleContext) -> Result<impl IntoResponse> {
    let role_id = current_role(&state, role).await?;
    Ok(Json(ApiResponse::success(MyPermissions {
        role_id,
        is_superuser: is_bypass(&state, role_id),
        permissions: state.service.permissions_of(role_id),
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyPageAccess {
    pub role_id: RoleId,
    pub is_superuser: bool,
    pub rules: Vec<AccessRule>,
}

pub async fn my_page_access(State(state): State<AppState>, role: RoleContext) -> Result<impl IntoResponse> {
    let role_id = current_role(&state, role).await?;
    Ok(Json(ApiResponse::success(MyPageAccess {
        role_id,
        is_superuser: is_bypass(&state, role_id),
        rules: state.service.page_rules_of(role_id),
    })))
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub page: String,
}

/// Effective level on one page. A location below a catalog page is checked
/// against that page.
pub async fn my_access(
    State(state): State<AppState>,
    role: RoleContext,
    Query(query): Query<AccessQuery>,
) -> Result<impl IntoResponse> {
    if query.page.trim().is_empty() {
        return Err(AccessError::validation("Query parameter `page` must not be empty"));
    }
    let role_id = current_role(&state, role).await?;
    let page_url = state
        .service
        .catalog()
        .resolve(&query.page)
        .map(|p| p.url.clone())
        .unwrap_or(query.page);
    Ok(Json(ApiResponse::success(state.service.page_access(role_id, &page_url))))
}

pub async fn my_navigation(State(state): State<AppState>, role: RoleContext) -> Result<impl IntoResponse> {
    let role_id = current_role(&state, role).await?;
    let groups: Vec<NavigationGroup> = state.service.navigation(role_id);
    Ok(Json(ApiResponse::success(groups)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Management
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn page_access_configuration(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let configuration = state.service.configuration().await?;
    Ok(Json(ApiResponse::success(configuration)))
}

/// Apply an ordered batch atomically. Every entry is validated before anything
/// is written.
pub async fn bulk_update(
    State(state): State<AppState>,
    Json(requests): Json<Vec<RuleChangeRequest>>,
) -> Result<impl IntoResponse> {
    let changes = requests
        .into_iter()
        .map(RuleChange::try_from)
        .collect::<Result<Vec<_>>>()?;

    let report = state.service.apply_changes(&changes).await?;
    let message = if report.changes == 0 {
        "No changes to save".to_string()
    } else {
        format!("Saved {} access rule change(s)", report.changes)
    };
    Ok(Json(ApiResponse::success(report).with_message(message)))
}

#[derive(Debug, Serialize)]
pub struct CreateAllResponse {
    pub created: u64,
}

pub async fn create_all(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let created = state.service.create_all().await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreateAllResponse { created })),
    ))
}

pub async fn list_permissions(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(ApiResponse::success(state.service.list_permissions().await?)))
}

pub async fn list_roles(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(ApiResponse::success(state.service.list_roles().await?)))
}

pub async fn role_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let permissions = state.service.role_permissions(RoleId(role_id)).await?;
    Ok(Json(ApiResponse::success(permissions)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResponse {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub granted: bool,
}

pub async fn grant_permission(
    State(state): State<AppState>,
    Path((role_id, permission_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse> {
    let (role_id, permission_id) = (RoleId(role_id), PermissionId(permission_id));
    state.service.grant(role_id, permission_id).await?;
    Ok(Json(ApiResponse::success(GrantResponse {
        role_id,
        permission_id,
        granted: true,
    })))
}

pub async fn revoke_permission(
    State(state): State<AppState>,
    Path((role_id, permission_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse> {
    let (role_id, permission_id) = (RoleId(role_id), PermissionId(permission_id));
    state.service.revoke(role_id, permission_id).await?;
    Ok(Json(ApiResponse::success(GrantResponse {
        role_id,
        permission_id,
        granted: false,
    })))
}
