//! One evaluator for both access models.
//!
//! Callers ask about page levels and resource-action pairs through the same
//! [`AccessEvaluator`] interface, always passing the role explicitly.

use metrics::counter;

use super::level::AccessLevel;
use super::matrix::PageAccessMatrix;
use super::models::{PermissionRequirement, RoleId};
use super::registry::PermissionRegistry;
use super::roles::RoleDirectory;

/// Pure access queries over `(role, request)`.
pub trait AccessEvaluator: Send + Sync {
    /// Effective level of a role on a page.
    fn access_level(&self, role_id: RoleId, page_url: &str) -> AccessLevel;

    /// Whether a role holds `(resource, action)`.
    fn has_permission(&self, role_id: RoleId, resource: &str, action: &str) -> bool;

    fn can_view(&self, role_id: RoleId, page_url: &str) -> bool {
        self.access_level(role_id, page_url).satisfies(AccessLevel::Read)
    }

    fn can_edit(&self, role_id: RoleId, page_url: &str) -> bool {
        self.access_level(role_id, page_url).satisfies(AccessLevel::Edit)
    }

    fn can_create(&self, role_id: RoleId, page_url: &str) -> bool {
        self.access_level(role_id, page_url).satisfies(AccessLevel::Create)
    }

    fn can_delete(&self, role_id: RoleId, page_url: &str) -> bool {
        self.access_level(role_id, page_url).satisfies(AccessLevel::Create)
    }

    fn has_any(&self, role_id: RoleId, requirements: &[PermissionRequirement]) -> bool {
        requirements
            .iter()
            .any(|r| self.has_permission(role_id, &r.resource, &r.action))
    }

    fn has_all(&self, role_id: RoleId, requirements: &[PermissionRequirement]) -> bool {
        requirements
            .iter()
            .all(|r| self.has_permission(role_id, &r.resource, &r.action))
    }
}

/// In-memory access state: roles, the permission registry and the page matrix.
///
/// Clones share the same underlying indices.
#[derive(Debug, Clone)]
pub struct AccessControl {
    roles: RoleDirectory,
    registry: PermissionRegistry,
    matrix: PageAccessMatrix,
}

impl AccessControl {
    pub fn new() -> Self {
        let roles = RoleDirectory::new();
        Self {
            registry: PermissionRegistry::new(roles.clone()),
            matrix: PageAccessMatrix::new(roles.clone()),
            roles,
        }
    }

    pub fn roles(&self) -> &RoleDirectory {
        &self.roles
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    pub fn matrix(&self) -> &PageAccessMatrix {
        &self.matrix
    }

    /// A known role that has been deactivated gets nothing.
    fn is_disabled(&self, role_id: RoleId) -> bool {
        self.roles.contains(role_id) && !self.roles.is_active(role_id)
    }
}

impl Default for AccessControl {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessEvaluator for AccessControl {
    fn access_level(&self, role_id: RoleId, page_url: &str) -> AccessLevel {
        if self.is_disabled(role_id) {
            return AccessLevel::None;
        }
        self.matrix.access_level(role_id, page_url)
    }

    fn has_permission(&self, role_id: RoleId, resource: &str, action: &str) -> bool {
        let allowed = !self.is_disabled(role_id) && self.registry.has_permission(role_id, resource, action);
        counter!(
            "accessgate_permission_checks_total",
            "outcome" => if allowed { "allow" } else { "deny" },
        )
        .increment(1);
        allowed
    }
}
