//! Persistence boundary for roles, permissions, grants and page rules.
//!
//! Two implementations ship with the crate: [`crate::db::Database`] on
//! PostgreSQL and [`MemoryStore`] for tests and local development.

pub mod memory;

use async_trait::async_trait;

use crate::access::{AccessLevel, Permission, PermissionId, Role, RoleId, RuleChange, StoredRule};
use crate::error::Result;

pub use memory::MemoryStore;

#[async_trait]
pub trait AccessStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;

    async fn list_roles(&self) -> Result<Vec<Role>>;

    async fn list_permissions(&self) -> Result<Vec<Permission>>;

    /// Permissions granted to one role.
    async fn list_grants(&self, role_id: RoleId) -> Result<Vec<Permission>>;

    /// Add a grant edge. Succeeds unchanged if it already exists.
    async fn grant(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()>;

    /// Remove a grant edge. Succeeds unchanged if it does not exist.
    async fn revoke(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()>;

    /// Stored page rules, for one role or all of them. Levels are returned raw.
    async fn list_rules(&self, role_id: Option<RoleId>) -> Result<Vec<StoredRule>>;

    /// Upsert every change atomically, in order. Nothing is applied on error.
    async fn apply_rule_batch(&self, changes: &[RuleChange]) -> Result<()>;

    /// Insert `level` for each `(role, page)` pair that has no rule yet.
    /// Returns the number of rules created.
    async fn materialize_rules(
        &self,
        role_ids: &[RoleId],
        page_urls: &[String],
        level: AccessLevel,
    ) -> Result<u64>;

    async fn health_check(&self) -> Result<()>;
}
