//! Declarative guards over the current role.
//!
//! A guard turns `(role state, location, requirement)` into one of: still
//! loading, access data unavailable, allowed, or denied with the list of
//! unmet requirements. [`RouteGuard`] adds a redirect that fires once per
//! transition into a denied condition.

use serde::Serialize;
use tracing::debug;

use super::evaluator::AccessEvaluator;
use super::level::AccessLevel;
use super::models::{PermissionRequirement, RoleId};
use super::navigation::PageCatalog;

// ═══════════════════════════════════════════════════════════════════════════════
// Role State
// ═══════════════════════════════════════════════════════════════════════════════

/// What is known about the current role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleState {
    /// Role or its access data is still being fetched.
    Loading,
    /// The fetch failed. Neither allowed nor denied.
    Unavailable { reason: String },
    Unauthenticated,
    Resolved(RoleId),
}

impl RoleState {
    pub fn role_id(&self) -> Option<RoleId> {
        match self {
            Self::Resolved(id) => Some(*id),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Requirements
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTarget {
    Explicit(String),
    /// Resolve the page from the current location.
    FromLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardRequirement {
    Level {
        page: PageTarget,
        required: AccessLevel,
    },
    Permissions {
        requirements: Vec<PermissionRequirement>,
        require_all: bool,
    },
}

/// A single requirement the role did not meet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnmetRequirement {
    Authentication,
    Level {
        page: String,
        required: AccessLevel,
        actual: AccessLevel,
    },
    Permission {
        resource: String,
        action: String,
    },
}

/// Shown in place of guarded content when access is denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenialNotice {
    pub message: String,
    /// Whether any one of the listed permissions would have sufficed.
    pub any_of: bool,
    pub unmet: Vec<UnmetRequirement>,
}

impl DenialNotice {
    fn unauthenticated() -> Self {
        Self {
            message: "Sign in to continue".into(),
            any_of: false,
            unmet: vec![UnmetRequirement::Authentication],
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.unmet.contains(&UnmetRequirement::Authentication)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Pending,
    Unavailable(String),
    Allowed,
    Denied(DenialNotice),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Output of [`Guard::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<T> {
    Loading,
    Unavailable(String),
    Content(T),
    Fallback(T),
    Denied(DenialNotice),
}

/// Everything a guard needs to decide, passed explicitly.
#[derive(Clone, Copy)]
pub struct GuardContext<'a> {
    pub state: &'a RoleState,
    pub location: &'a str,
    pub catalog: &'a PageCatalog,
    pub access: &'a dyn AccessEvaluator,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Guard
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    requirement: GuardRequirement,
}

impl Guard {
    pub fn new(requirement: GuardRequirement) -> Self {
        Self { requirement }
    }

    /// Require `required` on a specific page.
    pub fn level(page_url: impl Into<String>, required: AccessLevel) -> Self {
        Self::new(GuardRequirement::Level {
            page: PageTarget::Explicit(page_url.into()),
            required,
        })
    }

    /// Require `required` on whatever page the current location belongs to.
    pub fn level_here(required: AccessLevel) -> Self {
        Self::new(GuardRequirement::Level {
            page: PageTarget::FromLocation,
            required,
        })
    }

    pub fn permissions<I, R>(requirements: I, require_all: bool) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<PermissionRequirement>,
    {
        Self::new(GuardRequirement::Permissions {
            requirements: requirements.into_iter().map(Into::into).collect(),
            require_all,
        })
    }

    pub fn requirement(&self) -> &GuardRequirement {
        &self.requirement
    }

    pub fn decide(&self, ctx: GuardContext<'_>) -> GuardDecision {
        let role_id = match ctx.state {
            RoleState::Loading => return GuardDecision::Pending,
            RoleState::Unavailable { reason } => return GuardDecision::Unavailable(reason.clone()),
            RoleState::Unauthenticated => return GuardDecision::Denied(DenialNotice::unauthenticated()),
            RoleState::Resolved(id) => *id,
        };

        let decision = match &self.requirement {
            GuardRequirement::Level { page, required } => {
                let page_url = match page {
                    PageTarget::Explicit(url) => url.clone(),
                    // Unresolvable locations are checked as-is: only bypass roles pass.
                    PageTarget::FromLocation => ctx
                        .catalog
                        .resolve(ctx.location)
                        .map(|p| p.url.clone())
                        .unwrap_or_else(|| ctx.location.to_string()),
                };
                let actual = ctx.access.access_level(role_id, &page_url);
                if actual.satisfies(*required) {
                    GuardDecision::Allowed
                } else {
                    GuardDecision::Denied(DenialNotice {
                        message: format!("{} access to {} is required", required, page_url),
                        any_of: false,
                        unmet: vec![UnmetRequirement::Level {
                            page: page_url,
                            required: *required,
                            actual,
                        }],
                    })
                }
            }
            GuardRequirement::Permissions {
                requirements,
                require_all,
            } => {
                let passed = if *require_all {
                    ctx.access.has_all(role_id, requirements)
                } else {
                    ctx.access.has_any(role_id, requirements)
                };
                if passed {
                    GuardDecision::Allowed
                } else {
                    let unmet: Vec<UnmetRequirement> = requirements
                        .iter()
                        .filter(|r| !ctx.access.has_permission(role_id, &r.resource, &r.action))
                        .map(|r| UnmetRequirement::Permission {
                            resource: r.resource.clone(),
                            action: r.action.clone(),
                        })
                        .collect();
                    let message = if *require_all {
                        "All of the listed permissions are required"
                    } else {
                        "One of the listed permissions is required"
                    };
                    GuardDecision::Denied(DenialNotice {
                        message: message.into(),
                        any_of: !*require_all,
                        unmet,
                    })
                }
            }
        };

        debug!(
            role_id = %role_id,
            location = %ctx.location,
            allowed = decision.is_allowed(),
            "Guard evaluated"
        );
        decision
    }

    /// Produce guarded content, or the denial notice.
    pub fn render<T, C>(&self, ctx: GuardContext<'_>, content: C) -> Rendered<T>
    where
        C: FnOnce() -> T,
    {
        self.render_inner(ctx, content, None::<fn() -> T>)
    }

    /// Produce guarded content, or `fallback` in place of the denial notice.
    pub fn render_or_else<T, C, F>(&self, ctx: GuardContext<'_>, content: C, fallback: F) -> Rendered<T>
    where
        C: FnOnce() -> T,
        F: FnOnce() -> T,
    {
        self.render_inner(ctx, content, Some(fallback))
    }

    fn render_inner<T, C, F>(&self, ctx: GuardContext<'_>, content: C, fallback: Option<F>) -> Rendered<T>
    where
        C: FnOnce() -> T,
        F: FnOnce() -> T,
    {
        match self.decide(ctx) {
            GuardDecision::Pending => Rendered::Loading,
            GuardDecision::Unavailable(reason) => Rendered::Unavailable(reason),
            GuardDecision::Allowed => Rendered::Content(content()),
            GuardDecision::Denied(notice) => match fallback {
                Some(f) => Rendered::Fallback(f()),
                None => Rendered::Denied(notice),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Route Guard
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Login,
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    pub decision: GuardDecision,
    pub redirect: Option<Redirect>,
}

/// Guard for route entry. Emits at most one redirect per `(location, condition)`.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    guard: Guard,
    login_path: String,
    unauthorized_path: String,
    fired: Option<(String, RedirectKind)>,
}

impl RouteGuard {
    pub fn new(guard: Guard) -> Self {
        Self {
            guard,
            login_path: "/login".into(),
            unauthorized_path: "/unauthorized".into(),
            fired: None,
        }
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_unauthorized_path(mut self, path: impl Into<String>) -> Self {
        self.unauthorized_path = path.into();
        self
    }

    pub fn evaluate(&mut self, ctx: GuardContext<'_>) -> RouteOutcome {
        let decision = self.guard.decide(ctx);

        let kind = match &decision {
            GuardDecision::Denied(notice) if notice.is_unauthenticated() => Some(RedirectKind::Login),
            GuardDecision::Denied(_) => Some(RedirectKind::Unauthorized),
            GuardDecision::Allowed => {
                self.fired = None;
                None
            }
            GuardDecision::Pending | GuardDecision::Unavailable(_) => None,
        };

        let redirect = kind.and_then(|kind| {
            let key = (ctx.location.to_string(), kind);
            if self.fired.as_ref() == Some(&key) {
                return None;
            }
            self.fired = Some(key);
            let to = match kind {
                RedirectKind::Login => self.login_path.clone(),
                RedirectKind::Unauthorized => self.unauthorized_path.clone(),
            };
            debug!(location = %ctx.location, to = %to, "Route guard redirect");
            Some(Redirect { kind, to })
        });

        RouteOutcome { decision, redirect }
    }
}
