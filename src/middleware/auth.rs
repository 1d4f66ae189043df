use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::utils::crypto::constant_time_eq;

/// Expected bearer credential for the payment endpoints.
#[derive(Clone)]
pub struct BearerAuth {
    api_key: Arc<str>,
}

impl BearerAuth {
    pub fn new(api_key: impl Into<Arc<str>>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    fn accepts(&self, header: Option<&str>) -> bool {
        let Some(header) = header else {
            return false;
        };

        let parts: Vec<&str> = header.split(' ').collect();
        match parts.as_slice() {
            ["Bearer", token] => constant_time_eq(token.as_bytes(), self.api_key.as_bytes()),
            _ => false,
        }
    }
}

// Missing, malformed and mismatched credentials share one response.
pub async fn bearer_auth_middleware(
    State(auth): State<BearerAuth>,
    req: Request,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if !auth.accepts(header) {
        tracing::warn!(path = %req.uri().path(), "rejected unauthenticated request");
        return AppError::Unauthorized("Unauthorized").into_response();
    }

    next.run(req).await
}
