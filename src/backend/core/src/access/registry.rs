//! Resource-action permission registry.
//!
//! Answers "does role R hold `(resource, action)`?" against the grant edges
//! loaded from the store. There is no implication between actions: holding
//! `orders:approve` says nothing about `orders:view`.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::models::{Permission, PermissionId, RoleId};
use super::roles::RoleDirectory;
use crate::error::{AccessError, Result};

/// Permission definitions plus the role → permission grant edges.
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    roles: RoleDirectory,
    permissions: Arc<DashMap<PermissionId, Permission>>,
    grants: Arc<DashMap<RoleId, HashSet<PermissionId>>>,
}

impl PermissionRegistry {
    pub fn new(roles: RoleDirectory) -> Self {
        Self {
            roles,
            permissions: Arc::new(DashMap::new()),
            grants: Arc::new(DashMap::new()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace every permission definition.
    pub fn load_permissions(&self, permissions: Vec<Permission>) {
        self.permissions.clear();
        for permission in permissions {
            self.permissions.insert(permission.id, permission);
        }
    }

    /// Replace one role's grant set with what the store returned.
    pub fn load_grants(&self, role_id: RoleId, granted: Vec<Permission>) {
        let mut ids = HashSet::with_capacity(granted.len());
        for permission in granted {
            ids.insert(permission.id);
            self.permissions.entry(permission.id).or_insert(permission);
        }
        debug!(role_id = %role_id, grants = ids.len(), "Loaded role grants");
        self.grants.insert(role_id, ids);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Every permission definition, ordered by module, resource and action.
    pub fn list_permissions(&self) -> Vec<Permission> {
        let mut all: Vec<Permission> = self.permissions.iter().map(|p| p.value().clone()).collect();
        all.sort_by(|a, b| {
            (&a.module, &a.resource, &a.action).cmp(&(&b.module, &b.resource, &b.action))
        });
        all
    }

    pub fn get_permission(&self, permission_id: PermissionId) -> Option<Permission> {
        self.permissions.get(&permission_id).map(|p| p.clone())
    }

    /// Permissions granted to a role, ordered like [`list_permissions`](Self::list_permissions).
    pub fn list_grants(&self, role_id: RoleId) -> Vec<Permission> {
        let Some(ids) = self.grants.get(&role_id) else {
            return Vec::new();
        };
        let mut granted: Vec<Permission> = ids
            .iter()
            .filter_map(|id| self.permissions.get(id).map(|p| p.clone()))
            .collect();
        granted.sort_by(|a, b| {
            (&a.module, &a.resource, &a.action).cmp(&(&b.module, &b.resource, &b.action))
        });
        granted
    }

    /// Whether the role holds an active permission matching `(resource, action)`.
    ///
    /// Ignores role activity; queries go through
    /// [`AccessEvaluator`](super::evaluator::AccessEvaluator).
    pub(super) fn has_permission(&self, role_id: RoleId, resource: &str, action: &str) -> bool {
        if self.roles.is_bypass(role_id) {
            return true;
        }
        let Some(ids) = self.grants.get(&role_id) else {
            return false;
        };
        ids.iter().any(|id| {
            self.permissions
                .get(id)
                .map(|p| p.is_active && p.resource == resource && p.action == action)
                .unwrap_or(false)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a grant edge. Returns whether the edge was newly created.
    ///
    /// Granting an edge that already exists succeeds without change.
    pub fn grant(&self, role_id: RoleId, permission_id: PermissionId) -> Result<bool> {
        if !self.permissions.contains_key(&permission_id) {
            return Err(AccessError::permission_not_found(permission_id));
        }
        if !self.roles.contains(role_id) {
            return Err(AccessError::role_not_found(role_id));
        }
        let added = self.grants.entry(role_id).or_default().insert(permission_id);
        debug!(role_id = %role_id, permission_id = %permission_id, added, "Grant applied");
        Ok(added)
    }

    /// Remove a grant edge. Returns whether an edge was removed.
    ///
    /// Revoking an absent edge succeeds without change.
    pub fn revoke(&self, role_id: RoleId, permission_id: PermissionId) -> bool {
        let removed = self
            .grants
            .get_mut(&role_id)
            .map(|mut ids| ids.remove(&permission_id))
            .unwrap_or(false);
        debug!(role_id = %role_id, permission_id = %permission_id, removed, "Revoke applied");
        removed
    }

    /// Forget a role's grant set so it is reloaded on next access.
    pub fn forget_role(&self, role_id: RoleId) {
        self.grants.remove(&role_id);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::roles::{default_permissions, DefaultRole};

    fn setup() -> PermissionRegistry {
        let roles = RoleDirectory::new();
        roles.replace_all(DefaultRole::all_roles());
        let registry = PermissionRegistry::new(roles);
        registry.load_permissions(default_permissions());
        for role in DefaultRole::all() {
            let granted = role
                .granted_permissions()
                .into_iter()
                .filter_map(|id| registry.get_permission(id))
                .collect();
            registry.load_grants(role.id(), granted);
        }
        registry
    }

    #[test]
    fn test_has_permission_for_granted_pair() {
        let registry = setup();
        let sales = DefaultRole::Sales.id();
        assert!(registry.has_permission(sales, "orders", "create"));
        assert!(!registry.has_permission(sales, "orders", "approve"));
    }

    #[test]
    fn test_no_implication_between_actions() {
        let registry = setup();
        let warehouse = DefaultRole::Warehouse.id();
        assert!(registry.has_permission(warehouse, "stock", "adjust"));
        assert!(!registry.has_permission(warehouse, "work_orders", "create"));
    }

    #[test]
    fn test_inactive_permission_denies() {
        let registry = setup();
        let perms = default_permissions()
            .into_iter()
            .map(|p| if p.id == PermissionId(2) { p.inactive() } else { p })
            .collect();
        registry.load_permissions(perms);

        assert!(registry.has_permission(DefaultRole::Sales.id(), "customers", "edit"));
        assert!(!registry.has_permission(DefaultRole::Sales.id(), "orders", "create"));
    }

    #[test]
    fn test_bypass_role_holds_everything() {
        let registry = setup();
        assert!(registry.has_permission(DefaultRole::Admin.id(), "anything", "at_all"));
        assert!(registry.has_permission(DefaultRole::Admin.id(), "ledger", "post"));
    }

    #[test]
    fn test_grant_and_revoke_are_idempotent() {
        let registry = setup();
        let sales = DefaultRole::Sales.id();

        assert!(registry.grant(sales, PermissionId(3)).unwrap());
        assert!(!registry.grant(sales, PermissionId(3)).unwrap());
        assert!(registry.has_permission(sales, "orders", "approve"));

        assert!(registry.revoke(sales, PermissionId(3)));
        assert!(!registry.revoke(sales, PermissionId(3)));
        assert!(!registry.has_permission(sales, "orders", "approve"));
    }

    #[test]
    fn test_grant_unknown_permission_fails() {
        let registry = setup();
        assert!(registry.grant(DefaultRole::Sales.id(), PermissionId(999)).is_err());
        assert!(registry.grant(RoleId(999), PermissionId(1)).is_err());
    }
}
