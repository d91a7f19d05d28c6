//! Shared fixtures for integration tests.

#![allow(dead_code)]

use accessgate_core::access::{
    AccessLevel, AccessService, CommitPolicy, PageCatalog, Permission, PermissionId, Role, RoleId, RuleChange,
    StoredRule,
};
use accessgate_core::error::{AccessError, ErrorCode, Result};
use accessgate_core::store::{AccessStore, MemoryStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Seeded memory store plus a service over it with a fast retry policy.
pub fn seeded_service() -> (Arc<MemoryStore>, Arc<AccessService>) {
    let store = Arc::new(MemoryStore::seeded());
    let service = AccessService::new(store.clone(), PageCatalog::business_default()).with_commit_policy(CommitPolicy {
        max_attempts: 3,
        backoff: Duration::from_millis(1),
    });
    (store, Arc::new(service))
}

/// A store whose every call fails as if the database were unreachable.
pub struct UnreachableStore;

fn down() -> AccessError {
    AccessError::with_internal(
        ErrorCode::DatabaseConnectionFailed,
        "Database connection failed",
        "connection refused",
    )
}

#[async_trait]
impl AccessStore for UnreachableStore {
    fn backend_name(&self) -> &'static str {
        "unreachable"
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        Err(down())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        Err(down())
    }

    async fn list_grants(&self, _role_id: RoleId) -> Result<Vec<Permission>> {
        Err(down())
    }

    async fn grant(&self, _role_id: RoleId, _permission_id: PermissionId) -> Result<()> {
        Err(down())
    }

    async fn revoke(&self, _role_id: RoleId, _permission_id: PermissionId) -> Result<()> {
        Err(down())
    }

    async fn list_rules(&self, _role_id: Option<RoleId>) -> Result<Vec<StoredRule>> {
        Err(down())
    }

    async fn apply_rule_batch(&self, _changes: &[RuleChange]) -> Result<()> {
        Err(down())
    }

    async fn materialize_rules(&self, _role_ids: &[RoleId], _page_urls: &[String], _level: AccessLevel) -> Result<u64> {
        Err(down())
    }

    async fn health_check(&self) -> Result<()> {
        Err(down())
    }
}

/// A memory store whose next `list_rules` call takes its snapshot and then
/// waits for [`release`](Self::release) before returning it.
pub struct GatedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    snapshot_taken: Notify,
    released: Notify,
}

impl GatedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            snapshot_taken: Notify::new(),
            released: Notify::new(),
        }
    }

    /// Hold the next rule listing after it has read the store.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Resolves once the held listing has taken its snapshot.
    pub async fn snapshot_taken(&self) {
        self.snapshot_taken.notified().await;
    }

    /// Let the held listing return its snapshot.
    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl AccessStore for GatedStore {
    fn backend_name(&self) -> &'static str {
        "gated"
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        self.inner.list_roles().await
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        self.inner.list_permissions().await
    }

    async fn list_grants(&self, role_id: RoleId) -> Result<Vec<Permission>> {
        self.inner.list_grants(role_id).await
    }

    async fn grant(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        self.inner.grant(role_id, permission_id).await
    }

    async fn revoke(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        self.inner.revoke(role_id, permission_id).await
    }

    async fn list_rules(&self, role_id: Option<RoleId>) -> Result<Vec<StoredRule>> {
        let rules = self.inner.list_rules(role_id).await;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.snapshot_taken.notify_one();
            self.released.notified().await;
        }
        rules
    }

    async fn apply_rule_batch(&self, changes: &[RuleChange]) -> Result<()> {
        self.inner.apply_rule_batch(changes).await
    }

    async fn materialize_rules(&self, role_ids: &[RoleId], page_urls: &[String], level: AccessLevel) -> Result<u64> {
        self.inner.materialize_rules(role_ids, page_urls, level).await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}
