//! Hierarchical page-access matrix.
//!
//! One level per `(role, page)`; a missing rule means `none`. Delete rights
//! follow the `create` tier.

use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use super::level::AccessLevel;
use super::models::{AccessRule, RoleId, RuleChange};
use super::roles::RoleDirectory;

/// `page_url -> role_id -> level`.
pub type MatrixSnapshot = BTreeMap<String, BTreeMap<RoleId, AccessLevel>>;

/// Rules are held per role so that a reload replaces a role's whole rule set
/// in one insert; readers never observe it half-loaded.
#[derive(Debug, Clone)]
pub struct PageAccessMatrix {
    roles: RoleDirectory,
    rules: Arc<DashMap<RoleId, HashMap<String, AccessLevel>>>,
}

impl PageAccessMatrix {
    pub fn new(roles: RoleDirectory) -> Self {
        Self {
            roles,
            rules: Arc::new(DashMap::new()),
        }
    }

    /// Effective level ignoring role activity. Bypass roles always get `create`.
    ///
    /// Queries go through [`AccessEvaluator`](super::evaluator::AccessEvaluator).
    pub(super) fn access_level(&self, role_id: RoleId, page_url: &str) -> AccessLevel {
        if self.roles.is_bypass(role_id) {
            return AccessLevel::Create;
        }
        self.stored_level(role_id, page_url).unwrap_or_default()
    }

    /// The stored rule, ignoring bypass.
    pub fn stored_level(&self, role_id: RoleId, page_url: &str) -> Option<AccessLevel> {
        self.rules
            .get(&role_id)
            .and_then(|pages| pages.get(page_url).copied())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Loading and mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace one role's rules. Rows for other roles are ignored.
    pub fn load_role_rules(&self, role_id: RoleId, rules: Vec<AccessRule>) {
        let pages: HashMap<String, AccessLevel> = rules
            .into_iter()
            .filter(|r| r.role_id == role_id)
            .map(|r| (r.page_url, r.access_level))
            .collect();
        debug!(role_id = %role_id, rules = pages.len(), "Loaded page rules");
        self.rules.insert(role_id, pages);
    }

    /// Drop one role's rules.
    pub fn forget_role(&self, role_id: RoleId) {
        self.rules.remove(&role_id);
    }

    /// Apply changes in order. A later entry for the same cell wins.
    pub fn apply(&self, changes: &[RuleChange]) {
        for change in changes {
            self.rules
                .entry(change.role_id)
                .or_default()
                .insert(change.page_url.clone(), change.access_level);
        }
    }

    /// Insert `default_level` for every pair without a rule. Returns the number inserted.
    pub fn materialize_all(&self, role_ids: &[RoleId], page_urls: &[String], default_level: AccessLevel) -> usize {
        let mut inserted = 0;
        for role_id in role_ids {
            let mut pages = self.rules.entry(*role_id).or_default();
            for url in page_urls {
                pages.entry(url.clone()).or_insert_with(|| {
                    inserted += 1;
                    default_level
                });
            }
        }
        inserted
    }

    /// Stored rules for one role, ordered by page.
    pub fn rules_for_role(&self, role_id: RoleId) -> Vec<AccessRule> {
        let Some(pages) = self.rules.get(&role_id) else {
            return Vec::new();
        };
        let mut rules: Vec<AccessRule> = pages
            .iter()
            .map(|(url, level)| AccessRule {
                role_id,
                page_url: url.clone(),
                access_level: *level,
            })
            .collect();
        rules.sort_by(|a, b| a.page_url.cmp(&b.page_url));
        rules
    }

    /// Every stored rule, ordered by page then role.
    pub fn all_rules(&self) -> Vec<AccessRule> {
        let mut rules: Vec<AccessRule> = self
            .rules
            .iter()
            .flat_map(|entry| {
                let role_id = *entry.key();
                entry
                    .value()
                    .iter()
                    .map(|(url, level)| AccessRule {
                        role_id,
                        page_url: url.clone(),
                        access_level: *level,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        rules.sort_by(|a, b| a.page_url.cmp(&b.page_url).then(a.role_id.cmp(&b.role_id)));
        rules
    }

    /// Stored rules as an editable snapshot.
    pub fn snapshot(&self) -> MatrixSnapshot {
        let mut snapshot = MatrixSnapshot::new();
        for entry in self.rules.iter() {
            for (url, level) in entry.value() {
                snapshot
                    .entry(url.clone())
                    .or_default()
                    .insert(*entry.key(), *level);
            }
        }
        snapshot
    }

    /// Number of stored rules.
    pub fn len(&self) -> usize {
        self.rules.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
