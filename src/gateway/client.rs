use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::config::GatewayConfig;
use crate::domain::Transaction;
use crate::gateway::error::{DeclineKind, GatewayError, GatewayResponse};
use crate::gateway::models::{
    PaymentInitRequest, PaymentInitResponse, PaymentStatusRequest, PaymentStatusResponse,
    PaymentVerifyRequest, PaymentVerifyResponse, RefundRequest, RefundResponse,
    TransactionInfoResponse,
};
use crate::ports::{RepositoryError, TransactionRepository};
use crate::utils::crypto::{generate_request_id, mask_card_number};
use crate::utils::sanitize::{mask_value, sanitize_json};
use crate::validation;

const INIT_PATH: &str = "/api/v4/send";
const VERIFY_PATH: &str = "/api/v4/verify";
const TRANSACTION_INFO_PATH: &str = "/api/v4/transaction";
const STATUS_PATH: &str = "/v4";

/// HTTP client for the payment gateway.
///
/// State-changing calls (initiate, verify) also record the outcome in the
/// transaction repository. Repository failures are logged, never returned:
/// once the gateway has accepted a call its answer stands.
///
/// Calls are never retried here. Init, verify and refund move money and the
/// gateway offers no idempotency keys, so a failed call is reported as is.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    config: Arc<GatewayConfig>,
    repository: Arc<dyn TransactionRepository>,
}

impl GatewayClient {
    pub fn new(
        config: GatewayConfig,
        repository: Arc<dyn TransactionRepository>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(GatewayError::Network)?;

        Ok(GatewayClient {
            client,
            config: Arc::new(config),
            repository,
        })
    }

    /// Replaces the underlying HTTP client, e.g. to add a proxy or custom TLS.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Starts a payment and records it locally in `INIT` state.
    pub async fn initiate_payment(
        &self,
        amount: i64,
        description: &str,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<PaymentInitResponse, GatewayError> {
        let request = PaymentInitRequest {
            description: Some(description.to_string()).filter(|d| !d.is_empty()),
            metadata,
            ..PaymentInitRequest::new(amount)
        };

        self.initiate(request).await
    }

    /// Full-shape variant of [`GatewayClient::initiate_payment`]. A missing
    /// callback URL falls back to the configured one.
    pub async fn initiate(
        &self,
        mut request: PaymentInitRequest,
    ) -> Result<PaymentInitResponse, GatewayError> {
        if request.callback_url.as_deref().map_or(true, str::is_empty) {
            request.callback_url = Some(self.config.callback_url.clone());
        }
        validation::validate_payment_init(&request)?;

        let callback_url = request.callback_url.as_deref().unwrap_or_default();
        let body = request.to_gateway_body(&self.config.api_key, callback_url);
        let response: PaymentInitResponse = self.send(Method::POST, INIT_PATH, Some(&body)).await?;

        if !response.is_success() {
            return Err(GatewayError::declined(
                DeclineKind::Payment,
                GatewayResponse::Init(response),
            ));
        }

        let transaction = Transaction::new(
            response.token.clone(),
            request.amount,
            request.description.unwrap_or_default(),
            request.metadata,
        );

        if let Err(e) = self.repository.store(&transaction).await {
            tracing::error!(
                error = %e,
                transaction_id = %transaction.id,
                token = %mask_value(&transaction.token),
                "failed to store initiated transaction"
            );
        }

        Ok(response)
    }

    /// Verifies a payment and marks the local record `PAID`.
    pub async fn verify_payment(&self, token: &str) -> Result<PaymentVerifyResponse, GatewayError> {
        let request = PaymentVerifyRequest {
            token: token.to_string(),
        };
        validation::validate_payment_verify(&request)?;

        let body = json!({
            "api_key": self.config.api_key,
            "token": request.token,
        });
        let response: PaymentVerifyResponse =
            self.send(Method::POST, VERIFY_PATH, Some(&body)).await?;

        if !response.is_success() {
            return Err(GatewayError::declined(
                DeclineKind::Verification,
                GatewayResponse::Verify(response),
            ));
        }

        self.record_verification(&request.token, &response).await;

        Ok(response)
    }

    pub async fn transaction_info(
        &self,
        token: &str,
    ) -> Result<TransactionInfoResponse, GatewayError> {
        let request = PaymentStatusRequest {
            token: token.to_string(),
        };
        validation::validate_payment_status(&request)?;

        let body = json!({
            "api_key": self.config.api_key,
            "token": request.token,
        });

        self.send(Method::POST, TRANSACTION_INFO_PATH, Some(&body))
            .await
    }

    pub async fn payment_status(&self, token: &str) -> Result<PaymentStatusResponse, GatewayError> {
        let request = PaymentStatusRequest {
            token: token.to_string(),
        };
        validation::validate_payment_status(&request)?;

        let path = format!("{}/{}", STATUS_PATH, encode_segment(&request.token));
        self.send(Method::GET, &path, None).await
    }

    /// Refunds a settled transaction. An amount of zero refunds in full.
    pub async fn refund_payment(
        &self,
        transaction_id: &str,
        amount: i64,
    ) -> Result<RefundResponse, GatewayError> {
        let request = RefundRequest {
            transaction_id: transaction_id.to_string(),
            amount,
        };
        validation::validate_refund(&request)?;

        let mut body = json!({
            "api_key": self.config.api_key,
            "transaction_id": request.transaction_id,
        });
        if request.amount > 0 {
            body["amount"] = Value::from(request.amount);
        }

        let path = format!(
            "/v3/business/{}/transaction/{}/refund",
            encode_segment(&self.config.business),
            encode_segment(&request.transaction_id)
        );
        let response: RefundResponse = self.send(Method::POST, &path, Some(&body)).await?;

        if !response.status {
            return Err(GatewayError::declined(
                DeclineKind::Refund,
                GatewayResponse::Refund(response),
            ));
        }

        Ok(response)
    }

    async fn record_verification(&self, token: &str, response: &PaymentVerifyResponse) {
        let mut transaction = match self.repository.get(token).await {
            Ok(transaction) => transaction,
            Err(RepositoryError::NotFound(_)) => {
                tracing::warn!(
                    token = %mask_value(token),
                    "transaction not found in storage, skipping local update"
                );
                return;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    token = %mask_value(token),
                    "failed to load transaction for verification"
                );
                return;
            }
        };

        transaction.mark_paid(
            response.trans_id,
            response.card_number.as_deref().map(mask_card_number),
            response.cid.clone(),
            Utc::now(),
        );

        if let Err(e) = self.repository.update(&transaction).await {
            tracing::error!(
                error = %e,
                transaction_id = %transaction.id,
                "failed to update verified transaction"
            );
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let request_id = generate_request_id();

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.config.api_key)
            .header("X-Request-ID", &request_id);

        if let Some(body) = body {
            tracing::debug!(
                method = %method,
                endpoint,
                request_id = %request_id,
                body = %sanitize_json(body),
                "sending gateway request"
            );
            request = request.body(serde_json::to_vec(body)?);
        } else {
            tracing::debug!(method = %method, endpoint, request_id = %request_id, "sending gateway request");
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(
                error = %e,
                method = %method,
                endpoint,
                request_id = %request_id,
                "gateway request failed"
            );
            GatewayError::from_transport(e)
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(GatewayError::from_transport)?;

        tracing::debug!(
            method = %method,
            endpoint,
            status_code = status.as_u16(),
            request_id = %request_id,
            "received gateway response"
        );

        if !status.is_success() {
            return Err(GatewayError::from_status(status.as_u16(), &bytes));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryTransactionRepository;

    fn config() -> GatewayConfig {
        GatewayConfig::new("api-key", "https://shop.example.com/payments/callback")
    }

    #[test]
    fn rejects_invalid_config() {
        let repo = Arc::new(MemoryTransactionRepository::new());
        let result = GatewayClient::new(GatewayConfig::new("", "https://x.example.com"), repo);
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn keeps_configured_base_url() {
        let repo = Arc::new(MemoryTransactionRepository::new());
        let client = GatewayClient::new(config(), repo).unwrap();
        assert_eq!(client.config().base_url, "https://api.vandar.io");
    }

    #[test]
    fn encodes_path_segments() {
        assert_eq!(encode_segment("abc123"), "abc123");
        assert_eq!(encode_segment("a/b?c"), "a%2Fb%3Fc");
    }
}
