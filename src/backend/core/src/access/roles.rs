//! Role directory and the default roles shipped with a fresh installation.
//!
//! | Role       | Bypass | Description                                         |
//! |------------|--------|-----------------------------------------------------|
//! | Admin      | yes    | Full access to every page and permission            |
//! | Manager    | no     | Oversees sales, production and accounting           |
//! | Accountant | no     | Invoices and the general ledger                     |
//! | Sales      | no     | Orders and customers                                |
//! | Warehouse  | no     | Stock levels and inbound work orders                |
//!
//! The same seed data is written by the initial database migration.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::level::AccessLevel;
use super::models::{Permission, PermissionId, Role, RoleId};

// ═══════════════════════════════════════════════════════════════════════════════
// Role Directory
// ═══════════════════════════════════════════════════════════════════════════════

/// Known roles indexed by id. Decides which roles carry the bypass attribute.
#[derive(Debug, Clone, Default)]
pub struct RoleDirectory {
    roles: Arc<DashMap<RoleId, Role>>,
}

impl RoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, role: Role) {
        debug!(role_id = %role.id, role = %role.name, superuser = role.is_superuser, "Registering role");
        self.roles.insert(role.id, role);
    }

    /// Replace the whole directory.
    pub fn replace_all(&self, roles: Vec<Role>) {
        self.roles.clear();
        for role in roles {
            self.upsert(role);
        }
    }

    pub fn get(&self, role_id: RoleId) -> Option<Role> {
        self.roles.get(&role_id).map(|r| r.clone())
    }

    pub fn contains(&self, role_id: RoleId) -> bool {
        self.roles.contains_key(&role_id)
    }

    /// Whether every check for this role short-circuits to allow.
    ///
    /// Unknown roles never bypass.
    pub fn is_bypass(&self, role_id: RoleId) -> bool {
        self.roles
            .get(&role_id)
            .map(|r| r.bypasses_checks())
            .unwrap_or(false)
    }

    /// Whether the role exists and is active.
    pub fn is_active(&self, role_id: RoleId) -> bool {
        self.roles
            .get(&role_id)
            .map(|r| r.is_active)
            .unwrap_or(false)
    }

    /// All roles, ordered by display level then id.
    pub fn list(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.roles.iter().map(|r| r.value().clone()).collect();
        roles.sort_by(|a, b| b.level.cmp(&a.level).then(a.id.cmp(&b.id)));
        roles
    }

    pub fn ids(&self) -> Vec<RoleId> {
        let mut ids: Vec<RoleId> = self.roles.iter().map(|r| *r.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Default Roles
// ═══════════════════════════════════════════════════════════════════════════════

/// Built-in role templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultRole {
    Admin,
    Manager,
    Accountant,
    Sales,
    Warehouse,
}

impl DefaultRole {
    pub const fn id(&self) -> RoleId {
        match self {
            Self::Admin => RoleId(1),
            Self::Manager => RoleId(2),
            Self::Accountant => RoleId(3),
            Self::Sales => RoleId(4),
            Self::Warehouse => RoleId(5),
        }
    }

    pub const fn key(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Manager => "MANAGER",
            Self::Accountant => "ACCOUNTANT",
            Self::Sales => "SALES",
            Self::Warehouse => "WAREHOUSE",
        }
    }

    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Admin => "Administrator",
            Self::Manager => "Manager",
            Self::Accountant => "Accountant",
            Self::Sales => "Sales Representative",
            Self::Warehouse => "Warehouse Staff",
        }
    }

    const fn level(&self) -> i32 {
        match self {
            Self::Admin => 100,
            Self::Manager => 80,
            Self::Accountant => 50,
            Self::Sales => 40,
            Self::Warehouse => 30,
        }
    }

    pub fn to_role(&self) -> Role {
        let role = Role::new(self.id().get(), self.key(), self.display_name()).with_level(self.level());
        match self {
            Self::Admin => role.superuser(),
            _ => role,
        }
    }

    /// Permission ids granted out of the box. The bypass role needs none.
    pub fn granted_permissions(&self) -> Vec<PermissionId> {
        let ids: &[i64] = match self {
            Self::Admin => &[],
            Self::Manager => &[1, 3, 4, 6, 8, 10, 12, 14],
            Self::Accountant => &[4, 8, 9, 10, 11],
            Self::Sales => &[1, 2, 4, 5, 12],
            Self::Warehouse => &[6, 12, 13],
        };
        ids.iter().copied().map(PermissionId).collect()
    }

    /// Page levels granted out of the box.
    pub fn page_levels(&self) -> Vec<(&'static str, AccessLevel)> {
        use AccessLevel::*;
        match self {
            Self::Admin => vec![],
            Self::Manager => vec![
                ("/dashboard", Read),
                ("/sales/orders", Edit),
                ("/sales/customers", Read),
                ("/production/work-orders", Read),
                ("/accounting", Read),
                ("/inventory", Read),
                ("/inventory/stock", Read),
                ("/settings/permissions", Read),
            ],
            Self::Accountant => vec![
                ("/dashboard", Read),
                ("/accounting", Create),
                ("/accounting/invoices", Create),
                ("/accounting/ledger", Edit),
                ("/sales/customers", Read),
            ],
            Self::Sales => vec![
                ("/dashboard", Read),
                ("/sales/orders", Create),
                ("/sales/customers", Edit),
                ("/inventory/stock", Read),
            ],
            Self::Warehouse => vec![
                ("/dashboard", Read),
                ("/inventory", Create),
                ("/inventory/stock", Edit),
                ("/production/work-orders", Read),
            ],
        }
    }

    pub fn all() -> Vec<DefaultRole> {
        vec![
            Self::Admin,
            Self::Manager,
            Self::Accountant,
            Self::Sales,
            Self::Warehouse,
        ]
    }

    pub fn all_roles() -> Vec<Role> {
        Self::all().iter().map(|r| r.to_role()).collect()
    }
}

/// The permission catalog shipped with a fresh installation.
pub fn default_permissions() -> Vec<Permission> {
    vec![
        Permission::new(1, "sales", "orders", "view").with_display_name("View sales orders"),
        Permission::new(2, "sales", "orders", "create").with_display_name("Create sales orders"),
        Permission::new(3, "sales", "orders", "approve").with_display_name("Approve sales orders"),
        Permission::new(4, "sales", "customers", "view").with_display_name("View customers"),
        Permission::new(5, "sales", "customers", "edit").with_display_name("Edit customers"),
        Permission::new(6, "production", "work_orders", "view").with_display_name("View work orders"),
        Permission::new(7, "production", "work_orders", "create").with_display_name("Create work orders"),
        Permission::new(8, "accounting", "invoices", "view").with_display_name("View invoices"),
        Permission::new(9, "accounting", "invoices", "create").with_display_name("Issue invoices"),
        Permission::new(10, "accounting", "ledger", "view").with_display_name("View general ledger"),
        Permission::new(11, "accounting", "ledger", "post").with_display_name("Post ledger entries"),
        Permission::new(12, "inventory", "stock", "view").with_display_name("View stock levels"),
        Permission::new(13, "inventory", "stock", "adjust").with_display_name("Adjust stock levels"),
        Permission::new(14, "administration", "permissions", "view").with_display_name("View access configuration"),
        Permission::new(15, "administration", "permissions", "manage")
            .with_display_name("Manage access configuration")
            .with_description("Edit the page access matrix and role grants"),
        Permission::new(16, "administration", "roles", "manage").with_display_name("Manage roles"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_only_admin_bypasses() {
        let dir = RoleDirectory::new();
        dir.replace_all(DefaultRole::all_roles());

        assert!(dir.is_bypass(DefaultRole::Admin.id()));
        assert!(!dir.is_bypass(DefaultRole::Manager.id()));
        assert!(!dir.is_bypass(RoleId(999)));
    }

    #[test]
    fn test_inactive_superuser_does_not_bypass() {
        let dir = RoleDirectory::new();
        dir.upsert(DefaultRole::Admin.to_role().inactive());
        assert!(!dir.is_bypass(RoleId(1)));
        assert!(!dir.is_active(RoleId(1)));
    }

    #[test]
    fn test_list_orders_by_level() {
        let dir = RoleDirectory::new();
        dir.replace_all(DefaultRole::all_roles());
        let names: Vec<String> = dir.list().into_iter().map(|r| r.name).collect();
        assert_eq!(names.first().map(String::as_str), Some("ADMIN"));
        assert_eq!(names.last().map(String::as_str), Some("WAREHOUSE"));
    }

    #[test]
    fn test_default_permissions_unique_by_resource_action() {
        let perms = default_permissions();
        let keys: HashSet<_> = perms.iter().map(|p| p.key()).collect();
        assert_eq!(keys.len(), perms.len());
    }

    #[test]
    fn test_default_grants_reference_catalog() {
        let ids: HashSet<PermissionId> = default_permissions().iter().map(|p| p.id).collect();
        for role in DefaultRole::all() {
            for granted in role.granted_permissions() {
                assert!(ids.contains(&granted), "{:?} grants unknown {}", role, granted);
            }
        }
    }
}
