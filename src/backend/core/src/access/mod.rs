//! Access control engine.
//!
//! Two models sit side by side:
//!
//! - **Page access**: per role and page, one level of `none < read < edit < create`
//!   ([`PageAccessMatrix`]).
//! - **Resource-action permissions**: per role, a set of granted
//!   `(resource, action)` pairs ([`PermissionRegistry`]).
//!
//! Both are answered through [`AccessEvaluator`]. Roles marked
//! `is_superuser` bypass every check while active.
//!
//! ```text
//! AccessStore ──► AccessService ──► AccessControl ──► Guard / NavigationFilter
//!                      ▲                                   │
//!                      └──── MatrixEditor (diff + commit) ◄┘
//! ```

pub mod editor;
pub mod evaluator;
pub mod guard;
pub mod layer;
pub mod level;
pub mod matrix;
pub mod models;
pub mod navigation;
pub mod registry;
pub mod roles;
pub mod service;

pub use editor::{diff_snapshots, CommitOutcome, MatrixEditor, RuleBatchWriter};
pub use evaluator::{AccessControl, AccessEvaluator};
pub use guard::{
    DenialNotice, Guard, GuardContext, GuardDecision, GuardRequirement, PageTarget, Redirect, RedirectKind,
    Rendered, RoleState, RouteGuard, RouteOutcome, UnmetRequirement,
};
pub use layer::{require_resolved, role_from_headers, RequireAccessLayer, RequireAccessService, RoleContext, ROLE_HEADER};
pub use level::{satisfies, AccessLevel};
pub use matrix::{MatrixSnapshot, PageAccessMatrix};
pub use models::{
    AccessRule, Page, Permission, PermissionId, PermissionRequirement, Role, RoleId, RuleChange, RuleChangeRequest,
    StoredRule,
};
pub use navigation::{NavigationFilter, NavigationGroup, PageCatalog};
pub use registry::PermissionRegistry;
pub use roles::{default_permissions, DefaultRole, RoleDirectory};
pub use service::{AccessService, CommitPolicy, CommitReport, MatrixConfiguration, PageAccessView};
