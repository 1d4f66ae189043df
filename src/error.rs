use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::validation::ValidationErrors;

const NETWORK_MESSAGE: &str = "A network error occurred. Please try again.";
const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred. Please try again.";
const GATEWAY_UNEXPECTED_MESSAGE: &str = "The payment gateway returned an unexpected response.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Access denied")]
    Forbidden,

    #[error("Rate limit exceeded")]
    TooManyRequests,

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::Gateway(e) => match e {
                GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
                GatewayError::Declined { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
                GatewayError::Api { .. }
                | GatewayError::UnexpectedStatus { .. }
                | GatewayError::Network(_)
                | GatewayError::Decode(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }

    /// Caller-facing body. Never carries raw internal error text.
    fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("status".into(), Value::Bool(false));

        let (message, code, errors) = match self {
            AppError::Validation(errors)
            | AppError::Gateway(GatewayError::Validation(errors)) => {
                ("Validation failed".to_string(), None, Some(to_json_map(errors.field_map())))
            }
            AppError::BadRequest(message) => (message.clone(), None, None),
            AppError::Unauthorized(_) | AppError::Forbidden | AppError::TooManyRequests => {
                (self.to_string(), None, None)
            }
            AppError::Gateway(GatewayError::Declined { message, response, .. }) => {
                let errors = Some(response.errors().clone()).filter(|e| !e.is_empty());
                (message.clone(), None, errors.map(to_json_map))
            }
            AppError::Gateway(GatewayError::Api { error, .. }) => {
                let errors = Some(error.errors.clone()).filter(|e| !e.is_empty());
                (error.message.clone(), error.code.clone(), errors.map(to_json_map))
            }
            AppError::Gateway(GatewayError::UnexpectedStatus { .. })
            | AppError::Gateway(GatewayError::Decode(_)) => {
                (GATEWAY_UNEXPECTED_MESSAGE.to_string(), None, None)
            }
            AppError::Gateway(GatewayError::Network(_))
            | AppError::Gateway(GatewayError::Timeout(_)) => {
                (NETWORK_MESSAGE.to_string(), None, None)
            }
            AppError::Gateway(GatewayError::Config(_)) => {
                (UNEXPECTED_MESSAGE.to_string(), None, None)
            }
        };

        body.insert("message".into(), Value::String(message));
        if let Some(code) = code {
            body.insert("code".into(), Value::String(code));
        }
        if let Some(errors) = errors {
            body.insert("errors".into(), errors);
        }

        Value::Object(body)
    }
}

fn to_json_map<I>(entries: I) -> Value
where
    I: IntoIterator<Item = (String, String)>,
{
    Value::Object(
        entries
            .into_iter()
            .map(|(field, message)| (field, Value::String(message)))
            .collect(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }

        (status, Json(self.body())).into_response()
    }
}
