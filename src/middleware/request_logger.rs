use axum::{
    extract::{Request, State},
    http::header::USER_AGENT,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::config::ForwardedFor;
use crate::middleware::client_ip::resolve_client_ip;
use crate::middleware::request_id::RequestId;

/// Emits one structured line per request once the response status is known.
pub async fn request_logger_middleware(
    State(forwarded_for): State<ForwardedFor>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let remote_ip = resolve_client_ip(req.headers(), req.extensions(), forwarded_for);
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.to_string())
        .unwrap_or_default();
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        user_agent = %user_agent,
        remote_ip = %remote_ip,
        "HTTP request"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::post, Router};
    use axum::http::Request;
    use axum::middleware::from_fn_with_state;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_request_logger_passes_response_through() {
        let app = Router::new()
            .route("/test", post(|| async { (StatusCode::CREATED, "ok") }))
            .layer(from_fn_with_state(ForwardedFor::FirstEntry, request_logger_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/test")
                    .header("user-agent", "vandar-test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
