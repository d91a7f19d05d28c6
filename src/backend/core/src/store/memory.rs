//! In-process [`AccessStore`] backed by `parking_lot` locks.
//!
//! Batch writes validate every entry before touching state, so a rejected
//! batch leaves nothing behind, matching the transactional Postgres store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::{debug, warn};

use super::AccessStore;
use crate::access::roles::{default_permissions, DefaultRole};
use crate::access::{AccessLevel, Permission, PermissionId, Role, RoleId, RuleChange, StoredRule};
use crate::error::{AccessError, ErrorCode, Result};

#[derive(Debug, Default)]
struct State {
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    grants: BTreeSet<(RoleId, PermissionId)>,
    rules: BTreeMap<(RoleId, String), String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    injected_failures: AtomicU32,
    batch_writes: AtomicU64,
    reads: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the default roles, permissions, grants and page rules.
    pub fn seeded() -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write();
            for permission in default_permissions() {
                state.permissions.insert(permission.id, permission);
            }
            for role in DefaultRole::all() {
                state.roles.insert(role.id(), role.to_role());
                for permission_id in role.granted_permissions() {
                    state.grants.insert((role.id(), permission_id));
                }
                for (url, level) in role.page_levels() {
                    state
                        .rules
                        .insert((role.id(), url.to_string()), level.as_str().to_string());
                }
            }
        }
        store
    }

    pub fn with_role(self, role: Role) -> Self {
        self.state.write().roles.insert(role.id, role);
        self
    }

    pub fn with_permission(self, permission: Permission) -> Self {
        self.state.write().permissions.insert(permission.id, permission);
        self
    }

    /// Write a rule with an arbitrary level token, bypassing validation.
    pub fn insert_raw_rule(&self, role_id: RoleId, page_url: &str, level: &str) {
        self.state
            .write()
            .rules
            .insert((role_id, page_url.to_string()), level.to_string());
    }

    /// Delete one stored rule so the pair reads as having no rule at all.
    pub fn remove_rule(&self, role_id: RoleId, page_url: &str) -> bool {
        self.state
            .write()
            .rules
            .remove(&(role_id, page_url.to_string()))
            .is_some()
    }

    /// Make the next `count` writes fail with a retryable transaction error.
    pub fn fail_next_writes(&self, count: u32) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Number of rule batches that reached the store.
    pub fn batch_writes(&self) -> u64 {
        self.batch_writes.load(Ordering::SeqCst)
    }

    /// Number of read calls served.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    fn take_injected_failure(&self) -> Result<()> {
        let consumed = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            warn!("Injected store failure");
            return Err(AccessError::with_internal(
                ErrorCode::DatabaseTransactionFailed,
                "A database error occurred",
                "injected failure",
            ));
        }
        Ok(())
    }

    fn count_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl AccessStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        self.count_read();
        Ok(self.state.read().roles.values().cloned().collect())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        self.count_read();
        Ok(self.state.read().permissions.values().cloned().collect())
    }

    async fn list_grants(&self, role_id: RoleId) -> Result<Vec<Permission>> {
        self.count_read();
        let state = self.state.read();
        Ok(state
            .grants
            .iter()
            .filter(|(rid, _)| *rid == role_id)
            .filter_map(|(_, pid)| state.permissions.get(pid).cloned())
            .collect())
    }

    async fn grant(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        self.take_injected_failure()?;
        let mut state = self.state.write();
        if !state.roles.contains_key(&role_id) {
            return Err(AccessError::role_not_found(role_id));
        }
        if !state.permissions.contains_key(&permission_id) {
            return Err(AccessError::permission_not_found(permission_id));
        }
        state.grants.insert((role_id, permission_id));
        Ok(())
    }

    async fn revoke(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        self.take_injected_failure()?;
        self.state.write().grants.remove(&(role_id, permission_id));
        Ok(())
    }

    async fn list_rules(&self, role_id: Option<RoleId>) -> Result<Vec<StoredRule>> {
        self.count_read();
        let state = self.state.read();
        Ok(state
            .rules
            .iter()
            .filter(|((rid, _), _)| role_id.map_or(true, |r| r == *rid))
            .map(|((rid, url), level)| StoredRule {
                role_id: *rid,
                page_url: url.clone(),
                access_level: level.clone(),
            })
            .collect())
    }

    async fn apply_rule_batch(&self, changes: &[RuleChange]) -> Result<()> {
        self.batch_writes.fetch_add(1, Ordering::SeqCst);
        self.take_injected_failure()?;

        let mut state = self.state.write();
        if let Some(missing) = changes.iter().find(|c| !state.roles.contains_key(&c.role_id)) {
            return Err(AccessError::role_not_found(missing.role_id));
        }
        for change in changes {
            state.rules.insert(
                (change.role_id, change.page_url.clone()),
                change.access_level.as_str().to_string(),
            );
        }
        debug!(changes = changes.len(), "Applied rule batch");
        Ok(())
    }

    async fn materialize_rules(
        &self,
        role_ids: &[RoleId],
        page_urls: &[String],
        level: AccessLevel,
    ) -> Result<u64> {
        self.take_injected_failure()?;
        let mut state = self.state.write();
        let known: Vec<RoleId> = role_ids
            .iter()
            .copied()
            .filter(|r| state.roles.contains_key(r))
            .collect();
        let mut created = 0;
        for role_id in known {
            for url in page_urls {
                let key = (role_id, url.clone());
                if !state.rules.contains_key(&key) {
                    state.rules.insert(key, level.as_str().to_string());
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
