//! HTTP API.
//!
//! - `/health`, `/metrics`: unversioned, unguarded
//! - `/api/v1/me/*`: the caller's own access, keyed by the `X-Role-Id` header
//! - `/api/v1/page-access/*`, `/api/v1/permissions`, `/api/v1/roles/*`:
//!   management, guarded by [`RequireAccessLayer`](crate::access::RequireAccessLayer)

mod handlers;
pub mod middleware;
pub mod v1;

use axum::{middleware as axum_middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::access::{AccessService, PermissionRequirement};
use crate::config::AccessConfig;
use crate::error::{AccessError, Result};

/// What the management routes require.
#[derive(Debug, Clone)]
pub struct ManagementPolicy {
    /// Page whose `read` level unlocks the configuration views.
    pub page: String,
    /// Grant required for management writes.
    pub permission: PermissionRequirement,
}

impl ManagementPolicy {
    pub fn from_config(config: &AccessConfig) -> Result<Self> {
        let permission = PermissionRequirement::parse(&config.manage_permission).ok_or_else(|| {
            AccessError::configuration(format!(
                "access.manage_permission must look like resource:action, got {:?}",
                config.manage_permission
            ))
        })?;
        Ok(Self {
            page: config.management_page.clone(),
            permission,
        })
    }
}

impl Default for ManagementPolicy {
    fn default() -> Self {
        Self {
            page: "/settings/permissions".to_string(),
            permission: PermissionRequirement::new("permissions", "manage"),
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AccessService>,
    pub metrics: Option<PrometheusHandle>,
    pub management: ManagementPolicy,
}

impl AppState {
    pub fn new(service: Arc<AccessService>) -> Self {
        Self {
            service,
            metrics: None,
            management: ManagementPolicy::default(),
        }
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    pub fn with_management(mut self, management: ManagementPolicy) -> Self {
        self.management = management;
        self
    }
}

/// Build the full router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .nest("/api/v1", v1::routes::v1_router(&state))
        .layer(axum_middleware::from_fn(middleware::content_type_validation))
        .layer(axum_middleware::from_fn(middleware::record_request_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessConfig;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("ok").with_message("done");
        assert!(response.success);
        assert_eq!(response.data, Some("ok"));
        assert_eq!(response.message.as_deref(), Some("done"));
    }

    #[test]
    fn test_management_policy_from_config() {
        let policy = ManagementPolicy::from_config(&AccessConfig::default()).unwrap();
        assert_eq!(policy.page, "/settings/permissions");
        assert_eq!(policy.permission, PermissionRequirement::new("permissions", "manage"));

        let bad = AccessConfig {
            manage_permission: "manage".into(),
            ..AccessConfig::default()
        };
        assert!(ManagementPolicy::from_config(&bad).is_err());
    }
}
