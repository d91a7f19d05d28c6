//! API middleware: content-type enforcement and request metrics.

use axum::{
    extract::{MatchedPath, Request},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Instant;

use crate::telemetry::RequestDurationHistogram;

/// POST, PUT and PATCH requests must carry `Content-Type: application/json`.
///
/// Bodyless management calls (grant, revoke, create-all) are exempt when
/// they send no `Content-Length` or a zero one.
pub async fn content_type_validation(req: Request, next: Next) -> Response {
    if matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) && has_body(&req) {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.contains("application/json") {
            return (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                Json(serde_json::json!({
                    "success": false,
                    "error": {
                        "code": "UNSUPPORTED_MEDIA_TYPE",
                        "message": "Content-Type must be application/json",
                    }
                })),
            )
                .into_response();
        }
    }
    next.run(req).await
}

fn has_body(req: &Request) -> bool {
    req.headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|len| len > 0)
        .unwrap_or_else(|| req.headers().contains_key(axum::http::header::TRANSFER_ENCODING))
}

/// Record duration and count per matched route.
pub async fn record_request_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(req).await;

    RequestDurationHistogram::record(&method, &path, response.status().as_u16(), started.elapsed().as_secs_f64());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::post, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/echo", post(|| async { "ok" }))
            .layer(axum::middleware::from_fn(content_type_validation))
    }

    #[tokio::test]
    async fn test_rejects_non_json_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/echo")
            .header(CONTENT_TYPE, "text/plain")
            .header(axum::http::header::CONTENT_LENGTH, "2")
            .body(Body::from("hi"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_allows_empty_post() {
        let request = Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
