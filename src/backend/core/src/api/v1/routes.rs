//! V1 API routes.

use axum::{
    routing::{get, post},
    Router,
};

use crate::access::{AccessLevel, RequireAccessLayer};
use crate::api::{handlers, AppState};

/// V1 API prefix.
pub const V1_PREFIX: &str = "/api/v1";

/// Build the V1 router.
///
/// ## Current role (no guard beyond a resolvable role)
/// - `GET /me/permissions`
/// - `GET /me/page-access`
/// - `GET /me/access?page=`
/// - `GET /me/navigation`
///
/// ## Management reads (`read` on the management page)
/// - `GET /page-access/configuration`
/// - `GET /permissions`
/// - `GET /roles`
/// - `GET /roles/:role_id/permissions`
///
/// ## Management writes (the manage grant)
/// - `POST /page-access/bulk-update`
/// - `POST /page-access/create-all`
/// - `POST /roles/:role_id/permissions/:permission_id`
/// - `DELETE /roles/:role_id/permissions/:permission_id`
pub fn v1_router(state: &AppState) -> Router<AppState> {
    let service = state.service.clone();
    let management = &state.management;

    let me = Router::new()
        .route("/me/permissions", get(handlers::my_permissions))
        .route("/me/page-access", get(handlers::my_page_access))
        .route("/me/access", get(handlers::my_access))
        .route("/me/navigation", get(handlers::my_navigation));

    let reads = Router::new()
        .route("/page-access/configuration", get(handlers::page_access_configuration))
        .route("/permissions", get(handlers::list_permissions))
        .route("/roles", get(handlers::list_roles))
        .route("/roles/:role_id/permissions", get(handlers::role_permissions))
        .route_layer(RequireAccessLayer::page(
            service.clone(),
            management.page.clone(),
            AccessLevel::Read,
        ));

    let writes = Router::new()
        .route("/page-access/bulk-update", post(handlers::bulk_update))
        .route("/page-access/create-all", post(handlers::create_all))
        .route(
            "/roles/:role_id/permissions/:permission_id",
            post(handlers::grant_permission).delete(handlers::revoke_permission),
        )
        .route_layer(RequireAccessLayer::requirement(service, management.permission.clone()));

    me.merge(reads).merge(writes)
}

/// Route constants for clients and documentation.
pub mod paths {
    pub const MY_PERMISSIONS: &str = "/api/v1/me/permissions";
    pub const MY_PAGE_ACCESS: &str = "/api/v1/me/page-access";
    pub const MY_ACCESS: &str = "/api/v1/me/access";
    pub const MY_NAVIGATION: &str = "/api/v1/me/navigation";

    pub const CONFIGURATION: &str = "/api/v1/page-access/configuration";
    pub const BULK_UPDATE: &str = "/api/v1/page-access/bulk-update";
    pub const CREATE_ALL: &str = "/api/v1/page-access/create-all";

    pub const PERMISSIONS: &str = "/api/v1/permissions";
    pub const ROLES: &str = "/api/v1/roles";
}
