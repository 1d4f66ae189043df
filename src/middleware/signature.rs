use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::error::AppError;
use crate::utils::crypto::verify_signature;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const MAX_CLOCK_SKEW_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureRejection {
    MissingSignature,
    MissingTimestamp,
    InvalidTimestamp,
    TimestampExpired,
    InvalidSignature,
}

impl SignatureRejection {
    fn message(self) -> &'static str {
        match self {
            SignatureRejection::MissingSignature => "Missing signature",
            SignatureRejection::MissingTimestamp => "Missing timestamp",
            SignatureRejection::InvalidTimestamp => "Invalid timestamp",
            SignatureRejection::TimestampExpired => "Timestamp expired",
            SignatureRejection::InvalidSignature => "Invalid signature",
        }
    }
}

/// HMAC request signing check for POST and PUT requests.
///
/// Callers send `X-Timestamp` (unix seconds) and `X-Signature`, the hex
/// HMAC-SHA256 of `"{path}:{timestamp}:{api_key}"` keyed with the API key.
/// Not part of the default route chains.
#[derive(Clone)]
pub struct SignatureVerifier {
    api_key: Arc<str>,
}

impl SignatureVerifier {
    pub fn new(api_key: impl Into<Arc<str>>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn signed_data(&self, path: &str, timestamp: &str) -> String {
        format!("{}:{}:{}", path, timestamp, self.api_key)
    }

    pub fn verify(
        &self,
        path: &str,
        headers: &HeaderMap,
        now_unix: i64,
    ) -> Result<(), SignatureRejection> {
        let signature = header(headers, SIGNATURE_HEADER).ok_or(SignatureRejection::MissingSignature)?;
        let timestamp = header(headers, TIMESTAMP_HEADER).ok_or(SignatureRejection::MissingTimestamp)?;

        let sent_at: i64 = timestamp
            .parse()
            .map_err(|_| SignatureRejection::InvalidTimestamp)?;
        if now_unix.abs_diff(sent_at) > MAX_CLOCK_SKEW_SECS {
            return Err(SignatureRejection::TimestampExpired);
        }

        let data = self.signed_data(path, timestamp);
        if !verify_signature(signature, &data, &self.api_key) {
            return Err(SignatureRejection::InvalidSignature);
        }

        Ok(())
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

pub async fn signature_middleware(
    State(verifier): State<SignatureVerifier>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::POST && req.method() != Method::PUT {
        return next.run(req).await;
    }

    if let Err(reason) = verifier.verify(req.uri().path(), req.headers(), Utc::now().timestamp()) {
        tracing::warn!(path = %req.uri().path(), reason = ?reason, "rejected unsigned request");
        return AppError::Unauthorized(reason.message()).into_response();
    }

    next.run(req).await
}
