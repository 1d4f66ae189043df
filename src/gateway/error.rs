use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::gateway::models::{ApiError, PaymentInitResponse, PaymentVerifyResponse, RefundResponse};
use crate::validation::ValidationErrors;

/// Which gateway operation reported a logical failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineKind {
    Payment,
    Verification,
    Refund,
}

impl fmt::Display for DeclineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeclineKind::Payment => "payment",
            DeclineKind::Verification => "verification",
            DeclineKind::Refund => "refund",
        };
        f.write_str(name)
    }
}

/// Decoded payload of a declined call.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResponse {
    Init(PaymentInitResponse),
    Verify(PaymentVerifyResponse),
    Refund(RefundResponse),
}

impl GatewayResponse {
    pub fn message(&self) -> Option<&str> {
        match self {
            GatewayResponse::Init(r) => r.message.as_deref(),
            GatewayResponse::Verify(r) => r.message.as_deref(),
            GatewayResponse::Refund(r) => r.message.as_deref(),
        }
    }

    pub fn errors(&self) -> &HashMap<String, String> {
        match self {
            GatewayResponse::Init(r) => &r.errors,
            GatewayResponse::Verify(r) => &r.errors,
            GatewayResponse::Refund(r) => &r.errors,
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("gateway returned HTTP {status}: {error}")]
    Api { status: u16, error: ApiError },

    #[error("gateway returned unexpected HTTP {status}")]
    UnexpectedStatus { status: u16, error: ApiError },

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("gateway request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("failed to decode gateway response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{kind} failed: {message}")]
    Declined {
        kind: DeclineKind,
        message: String,
        response: Box<GatewayResponse>,
    },
}

impl GatewayError {
    pub(crate) fn declined(kind: DeclineKind, response: GatewayResponse) -> Self {
        let message = response
            .message()
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "rejected by gateway".to_string());

        GatewayError::Declined {
            kind,
            message,
            response: Box::new(response),
        }
    }

    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            GatewayError::Timeout(error)
        } else {
            GatewayError::Network(error)
        }
    }

    /// Parses a non-2xx body as a structured error, falling back to the raw body.
    pub(crate) fn from_status(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ApiError>(body) {
            Ok(error) => GatewayError::Api { status, error },
            Err(_) => GatewayError::UnexpectedStatus {
                status,
                error: ApiError {
                    message: String::from_utf8_lossy(body).into_owned(),
                    code: Some(status.to_string()),
                    errors: HashMap::new(),
                },
            },
        }
    }

    /// The typed payload carried by a declined call.
    pub fn declined_response(&self) -> Option<&GatewayResponse> {
        match self {
            GatewayError::Declined { response, .. } => Some(response.as_ref()),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, GatewayError::Network(_) | GatewayError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_error_body_is_parsed() {
        let error = GatewayError::from_status(
            401,
            br#"{"message":"invalid api key","code":"AUTH","errors":{"api_key":"invalid"}}"#,
        );

        match error {
            GatewayError::Api { status, error } => {
                assert_eq!(status, 401);
                assert_eq!(error.message, "invalid api key");
                assert_eq!(error.code.as_deref(), Some("AUTH"));
                assert_eq!(error.errors["api_key"], "invalid");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unstructured_body_keeps_raw_text_and_status_code() {
        let error = GatewayError::from_status(503, b"<html>Service Unavailable</html>");

        match error {
            GatewayError::UnexpectedStatus { status, error } => {
                assert_eq!(status, 503);
                assert_eq!(error.message, "<html>Service Unavailable</html>");
                assert_eq!(error.code.as_deref(), Some("503"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn declined_uses_gateway_message() {
        let response = RefundResponse {
            status: false,
            message: Some("amount already refunded".into()),
            ..Default::default()
        };
        let error = GatewayError::declined(DeclineKind::Refund, GatewayResponse::Refund(response.clone()));

        assert_eq!(error.to_string(), "refund failed: amount already refunded");
        assert_eq!(error.declined_response(), Some(&GatewayResponse::Refund(response)));
    }

    #[test]
    fn declined_without_message_gets_default() {
        let error = GatewayError::declined(
            DeclineKind::Payment,
            GatewayResponse::Init(PaymentInitResponse::default()),
        );
        assert_eq!(error.to_string(), "payment failed: rejected by gateway");
    }
}
