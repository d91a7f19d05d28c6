//! Store-backed access service.
//!
//! Owns the in-memory [`AccessControl`] indices and keeps them in step with
//! the [`AccessStore`]: catalog data and per-role data are refetched once
//! their staleness window lapses, writes go to the store first and only then
//! into memory, and bulk matrix commits are retried as a whole.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::editor::{MatrixEditor, RuleBatchWriter};
use super::evaluator::{AccessControl, AccessEvaluator};
use super::guard::{GuardContext, RoleState};
use super::level::AccessLevel;
use super::models::{AccessRule, Page, Permission, PermissionId, Role, RoleId, RuleChange, StoredRule};
use super::navigation::{NavigationFilter, NavigationGroup, PageCatalog};
use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::{AccessError, Result};
use crate::store::AccessStore;
use crate::telemetry::{CommitMetrics, CommitOutcomeLabel, StoreMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FreshnessKey {
    /// Role list and permission definitions.
    Catalog,
    /// One role's grants and page rules.
    Role(RoleId),
}

/// Retry policy for bulk commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further one.
    pub backoff: Duration,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

impl CommitPolicy {
    fn delay_before(&self, attempt: u32) -> Duration {
        // attempt is the 1-based number of the attempt about to run
        self.backoff.saturating_mul(1 << attempt.saturating_sub(2).min(16))
    }
}

/// A successful bulk commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub changes: usize,
    pub attempts: u32,
}

/// Payload of the management configuration view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixConfiguration {
    pub roles: Vec<Role>,
    pub pages: Vec<Page>,
    pub current_access: Vec<AccessRule>,
}

/// Effective access of one role on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAccessView {
    pub page_url: String,
    pub access_level: AccessLevel,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_create: bool,
    pub can_delete: bool,
}

pub struct AccessService {
    store: Arc<dyn AccessStore>,
    control: AccessControl,
    catalog: PageCatalog,
    freshness: TtlCache<FreshnessKey, ()>,
    /// Per-role write counter. A reload installs its fetch only if no write
    /// for that role landed while it was in flight.
    generations: DashMap<RoleId, u64>,
    commit_policy: CommitPolicy,
    materialize_level: AccessLevel,
}

impl std::fmt::Debug for AccessService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessService")
            .field("store", &self.store.backend_name())
            .field("pages", &self.catalog.len())
            .field("commit_policy", &self.commit_policy)
            .finish()
    }
}

impl AccessService {
    /// Service with a 3 minute staleness window and the default commit policy.
    pub fn new(store: Arc<dyn AccessStore>, catalog: PageCatalog) -> Self {
        Self {
            store,
            control: AccessControl::new(),
            catalog,
            freshness: TtlCache::new("access", Duration::from_secs(180)),
            generations: DashMap::new(),
            commit_policy: CommitPolicy::default(),
            materialize_level: AccessLevel::None,
        }
    }

    pub fn from_config(store: Arc<dyn AccessStore>, config: &Config) -> Self {
        Self::new(store, config.catalog.build())
            .with_staleness(config.cache.staleness)
            .with_commit_policy(CommitPolicy {
                max_attempts: config.access.commit_max_attempts,
                backoff: config.access.commit_retry_backoff,
            })
            .with_materialize_level(config.access.materialize_level)
    }

    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.freshness = TtlCache::new("access", staleness);
        self
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = CommitPolicy {
            max_attempts: policy.max_attempts.max(1),
            ..policy
        };
        self
    }

    pub fn with_materialize_level(mut self, level: AccessLevel) -> Self {
        self.materialize_level = level;
        self
    }

    pub fn control(&self) -> &AccessControl {
        &self.control
    }

    pub fn catalog(&self) -> &PageCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn AccessStore> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch roles and permission definitions unless still fresh.
    pub async fn ensure_catalog_loaded(&self) -> Result<()> {
        if self.freshness.get(&FreshnessKey::Catalog).is_some() {
            return Ok(());
        }

        StoreMetrics::fetch("catalog", self.store.backend_name());
        let (roles, permissions) = tokio::try_join!(self.store.list_roles(), self.store.list_permissions())?;

        let known: Vec<RoleId> = roles.iter().map(|r| r.id).collect();
        for stale in self.control.roles().ids().into_iter().filter(|id| !known.contains(id)) {
            self.bump_generation(stale);
            self.control.registry().forget_role(stale);
            self.control.matrix().forget_role(stale);
            self.freshness.invalidate(&FreshnessKey::Role(stale));
        }

        debug!(roles = roles.len(), permissions = permissions.len(), "Loaded access catalog");
        self.control.roles().replace_all(roles);
        self.control.registry().load_permissions(permissions);
        self.freshness.insert(FreshnessKey::Catalog, ());
        Ok(())
    }

    /// Fetch one role's grants and page rules unless still fresh.
    pub async fn ensure_role_loaded(&self, role_id: RoleId) -> Result<()> {
        let key = FreshnessKey::Role(role_id);
        if self.freshness.get(&key).is_some() {
            return Ok(());
        }

        let generation = self.generation(role_id);
        StoreMetrics::fetch("role", self.store.backend_name());
        let (grants, rules) = tokio::try_join!(
            self.store.list_grants(role_id),
            self.store.list_rules(Some(role_id))
        )?;
        let rules: Vec<AccessRule> = rules.into_iter().map(StoredRule::into_rule).collect();

        // Writers bump through this entry, so they wait for the install to finish.
        let current = self.generations.entry(role_id).or_insert(0);
        if *current != generation {
            debug!(role_id = %role_id, "Discarding role reload superseded by a write");
            return Ok(());
        }
        self.control.registry().load_grants(role_id, grants);
        self.control.matrix().load_role_rules(role_id, rules);
        self.freshness.insert(key, ());
        Ok(())
    }

    fn generation(&self, role_id: RoleId) -> u64 {
        self.generations.get(&role_id).map(|g| *g).unwrap_or(0)
    }

    /// Mark a role as written. Call after the store accepted the write and
    /// before memory is updated.
    fn bump_generation(&self, role_id: RoleId) {
        *self.generations.entry(role_id).or_insert(0) += 1;
    }

    /// Load several roles concurrently. Fails if any one load fails.
    pub async fn ensure_roles_loaded(&self, role_ids: &[RoleId]) -> Result<()> {
        try_join_all(role_ids.iter().map(|id| self.ensure_role_loaded(*id))).await?;
        Ok(())
    }

    /// Catalog plus every known role.
    pub async fn ensure_all_loaded(&self) -> Result<()> {
        self.ensure_catalog_loaded().await?;
        let ids = self.control.roles().ids();
        self.ensure_roles_loaded(&ids).await
    }

    /// Drop every freshness mark and reload from the store.
    pub async fn refresh(&self) -> Result<()> {
        self.freshness.invalidate_all();
        self.ensure_all_loaded().await
    }

    /// Turn the caller's role id into a guard state, loading its data.
    ///
    /// A missing or unknown id is unauthenticated. A store failure yields
    /// [`RoleState::Unavailable`], never a denial.
    #[instrument(skip(self))]
    pub async fn resolve_role(&self, role_id: Option<RoleId>) -> RoleState {
        let Some(role_id) = role_id else {
            return RoleState::Unauthenticated;
        };

        if let Err(e) = self.ensure_catalog_loaded().await {
            warn!(error = %e, "Access catalog unavailable");
            return RoleState::Unavailable {
                reason: e.user_message().to_string(),
            };
        }
        if !self.control.roles().contains(role_id) {
            debug!("Unknown role treated as unauthenticated");
            return RoleState::Unauthenticated;
        }
        match self.ensure_role_loaded(role_id).await {
            Ok(()) => RoleState::Resolved(role_id),
            Err(e) => {
                warn!(error = %e, "Role access data unavailable");
                RoleState::Unavailable {
                    reason: e.user_message().to_string(),
                }
            }
        }
    }

    /// Guard context over this service's catalog and evaluator.
    pub fn guard_context<'a>(&'a self, state: &'a RoleState, location: &'a str) -> GuardContext<'a> {
        GuardContext {
            state,
            location,
            catalog: &self.catalog,
            access: &self.control,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries (callers resolve the role first)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn permissions_of(&self, role_id: RoleId) -> Vec<Permission> {
        self.control.registry().list_grants(role_id)
    }

    pub fn page_rules_of(&self, role_id: RoleId) -> Vec<AccessRule> {
        self.control.matrix().rules_for_role(role_id)
    }

    pub fn page_access(&self, role_id: RoleId, page_url: &str) -> PageAccessView {
        let access = &self.control;
        PageAccessView {
            page_url: page_url.to_string(),
            access_level: access.access_level(role_id, page_url),
            can_view: access.can_view(role_id, page_url),
            can_edit: access.can_edit(role_id, page_url),
            can_create: access.can_create(role_id, page_url),
            can_delete: access.can_delete(role_id, page_url),
        }
    }

    pub fn navigation(&self, role_id: RoleId) -> Vec<NavigationGroup> {
        NavigationFilter::new(&self.catalog, &self.control).navigation_groups(role_id)
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        self.ensure_catalog_loaded().await?;
        Ok(self.control.roles().list())
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>> {
        self.ensure_catalog_loaded().await?;
        Ok(self.control.registry().list_permissions())
    }

    /// Grants of any role, for the management view.
    pub async fn role_permissions(&self, role_id: RoleId) -> Result<Vec<Permission>> {
        self.ensure_catalog_loaded().await?;
        if !self.control.roles().contains(role_id) {
            return Err(AccessError::role_not_found(role_id));
        }
        self.ensure_role_loaded(role_id).await?;
        Ok(self.permissions_of(role_id))
    }

    /// Roles, pages and every stored rule.
    pub async fn configuration(&self) -> Result<MatrixConfiguration> {
        self.ensure_all_loaded().await?;
        Ok(MatrixConfiguration {
            roles: self.control.roles().list(),
            pages: self.catalog.pages().to_vec(),
            current_access: self.control.matrix().all_rules(),
        })
    }

    /// An editor whose baseline is the current matrix.
    pub async fn load_editor(&self) -> Result<MatrixEditor> {
        self.ensure_all_loaded().await?;
        Ok(MatrixEditor::new(self.control.matrix().snapshot()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant a permission. Granting an existing edge is a no-op success.
    #[instrument(skip(self))]
    pub async fn grant(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        self.ensure_catalog_loaded().await?;
        if !self.control.roles().contains(role_id) {
            return Err(AccessError::role_not_found(role_id));
        }
        if self.control.registry().get_permission(permission_id).is_none() {
            return Err(AccessError::permission_not_found(permission_id));
        }

        self.store.grant(role_id, permission_id).await?;
        self.bump_generation(role_id);
        self.freshness.invalidate(&FreshnessKey::Role(role_id));
        self.ensure_role_loaded(role_id).await?;
        info!("Permission granted");
        Ok(())
    }

    /// Revoke a permission. Revoking an absent edge is a no-op success.
    #[instrument(skip(self))]
    pub async fn revoke(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        self.store.revoke(role_id, permission_id).await?;
        self.bump_generation(role_id);
        self.control.registry().revoke(role_id, permission_id);
        self.freshness.invalidate(&FreshnessKey::Role(role_id));
        info!("Permission revoked");
        Ok(())
    }

    /// Commit an ordered batch of rule changes atomically.
    ///
    /// Every page must be in the catalog and every role known; otherwise
    /// nothing is sent. Retryable store failures re-send the whole batch up
    /// to the policy's attempt limit. Memory is updated only after the store
    /// accepted the batch.
    #[instrument(skip(self, changes), fields(changes = changes.len()))]
    pub async fn apply_changes(&self, changes: &[RuleChange]) -> Result<CommitReport> {
        let started = Instant::now();
        if changes.is_empty() {
            CommitMetrics::record(CommitOutcomeLabel::Empty, 0, started);
            return Ok(CommitReport {
                changes: 0,
                attempts: 0,
            });
        }

        if let Err(e) = self.validate_changes(changes).await {
            CommitMetrics::record(CommitOutcomeLabel::Rejected, changes.len(), started);
            return Err(e);
        }

        let mut attempt = 1;
        loop {
            match self.store.apply_rule_batch(changes).await {
                Ok(()) => {
                    let mut touched: Vec<RoleId> = changes.iter().map(|c| c.role_id).collect();
                    touched.sort();
                    touched.dedup();
                    for role_id in touched {
                        self.bump_generation(role_id);
                    }
                    self.control.matrix().apply(changes);
                    CommitMetrics::record(CommitOutcomeLabel::Committed, changes.len(), started);
                    info!(attempts = attempt, "Rule batch committed");
                    return Ok(CommitReport {
                        changes: changes.len(),
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_retryable() && attempt < self.commit_policy.max_attempts => {
                    attempt += 1;
                    let delay = self.commit_policy.delay_before(attempt);
                    warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "Retrying rule batch");
                    CommitMetrics::retry();
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    CommitMetrics::record(CommitOutcomeLabel::Failed, changes.len(), started);
                    return Err(AccessError::batch_commit_failed(changes.len(), attempt, &e));
                }
            }
        }
    }

    async fn validate_changes(&self, changes: &[RuleChange]) -> Result<()> {
        self.ensure_catalog_loaded().await?;
        for change in changes {
            if !self.catalog.contains(&change.page_url) {
                return Err(AccessError::page_not_found(change.page_url.clone()));
            }
            if !self.control.roles().contains(change.role_id) {
                return Err(AccessError::role_not_found(change.role_id));
            }
        }
        Ok(())
    }

    /// Insert the default level for every (role, page) pair without a rule.
    /// Returns the number of rules created.
    #[instrument(skip(self))]
    pub async fn create_all(&self) -> Result<u64> {
        self.ensure_catalog_loaded().await?;
        let role_ids = self.control.roles().ids();
        let page_urls = self.catalog.urls();

        let created = self
            .store
            .materialize_rules(&role_ids, &page_urls, self.materialize_level)
            .await?;
        for role_id in &role_ids {
            self.bump_generation(*role_id);
        }
        self.control
            .matrix()
            .materialize_all(&role_ids, &page_urls, self.materialize_level);
        self.freshness
            .invalidate_where(|k| matches!(k, FreshnessKey::Role(_)));

        info!(created, level = %self.materialize_level, "Materialized missing page rules");
        Ok(created)
    }

    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }
}

#[async_trait]
impl RuleBatchWriter for AccessService {
    async fn write_batch(&self, changes: &[RuleChange]) -> Result<()> {
        self.apply_changes(changes).await.map(|_| ())
    }
}
