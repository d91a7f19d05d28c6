#![allow(clippy::result_large_err)]
//! # AccessGate Core
//!
//! Access control engine for a multi-module business application.
//!
//! ## Architecture
//!
//! - **Access**: access-level hierarchy, permission registry, page access
//!   matrix, matrix diff and bulk commit, navigation filter and guards
//! - **Store**: persistence boundary with PostgreSQL and in-memory backends
//! - **Cache**: TTL cache backing the staleness window for fetched access data
//! - **API**: axum routes for the current role and for access management
//! - **Telemetry**: structured logging and Prometheus metrics

pub mod access;
pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod store;
pub mod telemetry;

pub use error::{AccessError, ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::access::{
        AccessControl, AccessEvaluator, AccessLevel, AccessService, Guard, GuardContext, GuardDecision,
        MatrixEditor, NavigationFilter, PageCatalog, Permission, PermissionId, PermissionRequirement, Role, RoleId,
        RoleState, RouteGuard, RuleChange,
    };
    pub use crate::error::{AccessError, ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result};
    pub use crate::store::{AccessStore, MemoryStore};
}
