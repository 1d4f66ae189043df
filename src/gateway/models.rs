use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body keys that metadata entries may not override.
const RESERVED_INIT_KEYS: &[&str] = &["api_key", "amount", "callback_url"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentInitRequest {
    /// Rials.
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, rename = "factorNumber", skip_serializing_if = "Option::is_none")]
    pub factor_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_card_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl PaymentInitRequest {
    pub fn new(amount: i64) -> Self {
        Self {
            amount,
            ..Default::default()
        }
    }

    /// Builds the outbound body. Metadata is flattened next to the known fields.
    pub(crate) fn to_gateway_body(&self, api_key: &str, callback_url: &str) -> Value {
        let mut body = Map::new();
        body.insert("api_key".into(), Value::from(api_key));
        body.insert("amount".into(), Value::from(self.amount));
        body.insert("callback_url".into(), Value::from(callback_url));

        let optional = [
            ("description", &self.description),
            ("mobile", &self.mobile),
            ("factorNumber", &self.factor_number),
            ("valid_card_number", &self.valid_card_number),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                body.insert(key.into(), Value::from(value));
            }
        }

        if let Some(metadata) = &self.metadata {
            for (key, value) in metadata {
                if !RESERVED_INIT_KEYS.contains(&key.as_str()) {
                    body.entry(key.clone()).or_insert_with(|| Value::from(value.as_str()));
                }
            }
        }

        Value::Object(body)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentInitResponse {
    pub status: i32,
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, String>,
}

impl PaymentInitResponse {
    pub fn is_success(&self) -> bool {
        self.status == 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentVerifyRequest {
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentVerifyResponse {
    pub status: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, rename = "realAmount", skip_serializing_if = "Option::is_none")]
    pub real_amount: Option<i64>,
    #[serde(default, rename = "transId", skip_serializing_if = "Option::is_none")]
    pub trans_id: Option<i64>,
    #[serde(default, rename = "factorNumber", skip_serializing_if = "Option::is_none")]
    pub factor_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "cardNumber", skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(default, rename = "paymentDate", skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, String>,
}

impl PaymentVerifyResponse {
    pub fn is_success(&self) -> bool {
        self.status == 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusRequest {
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, rename = "transactionStatus", skip_serializing_if = "Option::is_none")]
    pub transaction_status: Option<String>,
    #[serde(default, rename = "refId", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionInfoResponse {
    pub status: i32,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub wage: String,
    #[serde(default, rename = "shaparakWage")]
    pub shaparak_wage: String,
    #[serde(default, rename = "transId")]
    pub trans_id: i64,
    #[serde(default, rename = "refnumber")]
    pub ref_number: String,
    #[serde(default, rename = "trackingCode")]
    pub tracking_code: String,
    #[serde(default, rename = "factorNumber")]
    pub factor_number: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "cardNumber")]
    pub card_number: String,
    #[serde(default, rename = "CID")]
    pub cid: String,
    #[serde(default, rename = "createdAt")]
    pub created_at: String,
    #[serde(default, rename = "paymentDate")]
    pub payment_date: String,
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub transaction_id: String,
    /// Zero refunds the full amount.
    #[serde(default)]
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefundResponse {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, String>,
}

/// Asynchronous notification posted by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackData {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub status: String,
}

/// Normalized error payload from a non-2xx gateway response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (code: {})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ApiError {}
