//! Access data models: roles, pages, page rules, and resource-action permissions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::level::AccessLevel;
use crate::error::{AccessError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed role identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub i64);

impl RoleId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RoleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Strongly-typed permission identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(pub i64);

impl PermissionId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PermissionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// A named role. Every user acts under exactly one role at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    /// Machine key, e.g. `"MANAGER"`.
    pub name: String,
    pub display_name: String,
    /// Sort and display rank only. Never consulted for access decisions.
    pub level: i32,
    pub is_active: bool,
    /// Elevated bypass: every check for an active superuser passes at the maximum level.
    pub is_superuser: bool,
}

impl Role {
    pub fn new(id: i64, name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: RoleId(id),
            name: name.into(),
            display_name: display_name.into(),
            level: 0,
            is_active: true,
            is_superuser: false,
        }
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether checks for this role short-circuit to allow.
    pub fn bypasses_checks(&self) -> bool {
        self.is_active && self.is_superuser
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Page
// ═══════════════════════════════════════════════════════════════════════════════

/// A navigable page in the host application, keyed by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Page {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            category: None,
        }
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Page Access Rules
// ═══════════════════════════════════════════════════════════════════════════════

/// A `(role, page) -> level` rule. At most one exists per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    pub role_id: RoleId,
    pub page_url: String,
    pub access_level: AccessLevel,
}

/// A rule exactly as read from storage, before the level token is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRule {
    pub role_id: RoleId,
    pub page_url: String,
    pub access_level: String,
}

impl StoredRule {
    /// Convert to a typed rule. Unknown level tokens fail closed to `none`.
    pub fn into_rule(self) -> AccessRule {
        AccessRule {
            access_level: AccessLevel::from_stored(&self.access_level),
            role_id: self.role_id,
            page_url: self.page_url,
        }
    }
}

/// One cell of a matrix batch write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleChange {
    pub page_url: String,
    pub role_id: RoleId,
    pub access_level: AccessLevel,
}

impl RuleChange {
    pub fn new(page_url: impl Into<String>, role_id: RoleId, access_level: AccessLevel) -> Self {
        Self {
            page_url: page_url.into(),
            role_id,
            access_level,
        }
    }
}

/// Batch entry as submitted over the wire, with the level still untyped.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleChangeRequest {
    pub page_url: String,
    pub role_id: RoleId,
    pub access_level: String,
}

impl TryFrom<RuleChangeRequest> for RuleChange {
    type Error = AccessError;

    fn try_from(req: RuleChangeRequest) -> Result<Self> {
        if req.page_url.trim().is_empty() {
            return Err(AccessError::validation("Page URL must not be empty"));
        }
        let access_level = req.access_level.parse().map_err(|e: AccessError| {
            e.with_context("page_url", &req.page_url)
                .with_context("role_id", req.role_id)
        })?;
        Ok(Self {
            page_url: req.page_url,
            role_id: req.role_id,
            access_level,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission
// ═══════════════════════════════════════════════════════════════════════════════

/// A discrete capability, unique by `(resource, action)`.
///
/// `module` groups permissions for display and does not take part in matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: PermissionId,
    pub module: String,
    pub resource: String,
    pub action: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
}

impl Permission {
    pub fn new(
        id: i64,
        module: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        let resource = resource.into();
        let action = action.into();
        Self {
            id: PermissionId(id),
            module: module.into(),
            display_name: format!("{}:{}", resource, action),
            resource,
            action,
            description: String::new(),
            is_active: true,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether this permission is the `(resource, action)` pair asked about.
    pub fn matches(&self, requirement: &PermissionRequirement) -> bool {
        self.resource == requirement.resource && self.action == requirement.action
    }

    pub fn key(&self) -> PermissionRequirement {
        PermissionRequirement::new(&self.resource, &self.action)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// A `(resource, action)` pair a caller must hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionRequirement {
    pub resource: String,
    pub action: String,
}

impl PermissionRequirement {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Parse `"resource:action"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (resource, action) = s.split_once(':')?;
        if resource.is_empty() || action.is_empty() {
            return None;
        }
        Some(Self::new(resource, action))
    }
}

impl fmt::Display for PermissionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

impl<R: Into<String>, A: Into<String>> From<(R, A)> for PermissionRequirement {
    fn from((resource, action): (R, A)) -> Self {
        Self::new(resource, action)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
