//! HTTP side of the guard: the caller's role from request headers, and a
//! tower layer that applies a [`Guard`] before the inner service runs.

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use metrics::counter;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

use super::guard::{Guard, GuardDecision, RoleState};
use super::level::AccessLevel;
use super::models::{PermissionRequirement, RoleId};
use super::service::AccessService;
use crate::error::{AccessError, ErrorDetails, Result};

/// Header carrying the caller's role id, set by the upstream gateway.
pub const ROLE_HEADER: &str = "x-role-id";

/// Role id from [`ROLE_HEADER`]. Missing or malformed values are `None`.
pub fn role_from_headers(headers: &HeaderMap) -> Option<RoleId> {
    headers
        .get(ROLE_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .map(RoleId)
}

/// The caller's claimed role, unverified. Never rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleContext(pub Option<RoleId>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for RoleContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        if let Some(role) = parts.extensions.get::<RoleContext>() {
            return Ok(*role);
        }
        Ok(Self(role_from_headers(&parts.headers)))
    }
}

/// Map a non-resolved role state to the error the API returns for it.
pub fn require_resolved(state: &RoleState) -> Result<RoleId> {
    match state {
        RoleState::Resolved(id) => Ok(*id),
        RoleState::Unauthenticated => Err(AccessError::unauthenticated("A valid role is required")),
        RoleState::Unavailable { reason } => Err(AccessError::access_data_unavailable(reason.clone())),
        RoleState::Loading => Err(AccessError::access_data_unavailable("access data still loading")),
    }
}

fn decision_response(decision: GuardDecision) -> Option<Response> {
    let (outcome, error) = match decision {
        GuardDecision::Allowed => ("allow", None),
        GuardDecision::Pending => (
            "unavailable",
            Some(AccessError::access_data_unavailable("access data still loading")),
        ),
        GuardDecision::Unavailable(reason) => ("unavailable", Some(AccessError::access_data_unavailable(reason))),
        GuardDecision::Denied(notice) if notice.is_unauthenticated() => (
            "unauthenticated",
            Some(AccessError::unauthenticated(notice.message.clone())),
        ),
        GuardDecision::Denied(notice) => (
            "deny",
            Some(
                AccessError::forbidden(notice.message.clone())
                    .with_details(ErrorDetails::new().with_context("denial", &notice)),
            ),
        ),
    };
    counter!("accessgate_guard_decisions_total", "outcome" => outcome).increment(1);
    error.map(IntoResponse::into_response)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Applies a guard to every request.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/api/v1/page-access/configuration", get(configuration))
///     .layer(RequireAccessLayer::page(service.clone(), "/settings/permissions", AccessLevel::Read));
/// ```
#[derive(Clone)]
pub struct RequireAccessLayer {
    service: Arc<AccessService>,
    guard: Arc<Guard>,
}

impl RequireAccessLayer {
    pub fn new(service: Arc<AccessService>, guard: Guard) -> Self {
        Self {
            service,
            guard: Arc::new(guard),
        }
    }

    /// Require `level` on a fixed page.
    pub fn page(service: Arc<AccessService>, page_url: impl Into<String>, level: AccessLevel) -> Self {
        Self::new(service, Guard::level(page_url, level))
    }

    /// Require one `resource:action` grant. Unparseable input requires `input:*`,
    /// which nothing grants, so only bypass roles pass.
    pub fn permission(service: Arc<AccessService>, permission: &str) -> Self {
        let requirement =
            PermissionRequirement::parse(permission).unwrap_or_else(|| PermissionRequirement::new(permission, "*"));
        Self::requirement(service, requirement)
    }

    pub fn requirement(service: Arc<AccessService>, requirement: PermissionRequirement) -> Self {
        Self::new(service, Guard::permissions([requirement], true))
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }
}

impl<S> Layer<S> for RequireAccessLayer {
    type Service = RequireAccessService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireAccessService {
            inner,
            service: self.service.clone(),
            guard: self.guard.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequireAccessService<S> {
    inner: S,
    service: Arc<AccessService>,
    guard: Arc<Guard>,
}

impl<S> Service<Request<Body>> for RequireAccessService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let service = self.service.clone();
        let guard = self.guard.clone();
        // The clone may not be ready; swap so the polled one serves this request.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let role_id = role_from_headers(request.headers());
            let state = service.resolve_role(role_id).await;
            let location = request.uri().path().to_string();

            let decision = guard.decide(service.guard_context(&state, &location));
            if let GuardDecision::Denied(notice) = &decision {
                warn!(role_id = ?role_id, location = %location, unmet = notice.unmet.len(), "Access denied");
            }
            if let Some(rejection) = decision_response(decision) {
                return Ok(rejection);
            }

            request.extensions_mut().insert(RoleContext(role_id));
            inner.call(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_role_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(role_from_headers(&headers), None);

        headers.insert(ROLE_HEADER, HeaderValue::from_static(" 4 "));
        assert_eq!(role_from_headers(&headers), Some(RoleId(4)));

        headers.insert(ROLE_HEADER, HeaderValue::from_static("sales"));
        assert_eq!(role_from_headers(&headers), None);
    }

    #[test]
    fn test_require_resolved_maps_states() {
        assert_eq!(require_resolved(&RoleState::Resolved(RoleId(2))).unwrap(), RoleId(2));
        assert_eq!(
            require_resolved(&RoleState::Unauthenticated).unwrap_err().http_status(),
            axum::http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            require_resolved(&RoleState::Unavailable { reason: "db down".into() })
                .unwrap_err()
                .http_status(),
            axum::http::StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_decision_response() {
        assert!(decision_response(GuardDecision::Allowed).is_none());
        let response = decision_response(GuardDecision::Unavailable("down".into())).unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }
}
