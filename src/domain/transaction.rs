//! Transaction domain entity.
//! Local record of one payment attempt, keyed by the gateway token.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Open set of transaction states. Callbacks may report any string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    Init,
    Paid,
    Other(String),
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Init => "INIT",
            TransactionStatus::Paid => "PAID",
            TransactionStatus::Other(status) => status,
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "INIT" => TransactionStatus::Init,
            "PAID" => TransactionStatus::Paid,
            _ => TransactionStatus::Other(value),
        }
    }
}

impl From<&str> for TransactionStatus {
    fn from(value: &str) -> Self {
        TransactionStatus::from(value.to_string())
    }
}

impl From<TransactionStatus> for String {
    fn from(value: TransactionStatus) -> Self {
        match value {
            TransactionStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub token: String,
    /// Minor currency units (Rials).
    pub amount: i64,
    pub status: TransactionStatus,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_transaction_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// A freshly initiated payment in `INIT` state.
    pub fn new(
        token: String,
        amount: i64,
        description: String,
        metadata: Option<HashMap<String, String>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            token,
            amount,
            status: TransactionStatus::Init,
            description,
            metadata,
            gateway_transaction_id: None,
            card_number: None,
            card_hash: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn mark_paid(
        &mut self,
        gateway_transaction_id: Option<i64>,
        card_number: Option<String>,
        card_hash: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status = TransactionStatus::Paid;
        if gateway_transaction_id.is_some() {
            self.gateway_transaction_id = gateway_transaction_id;
        }
        if card_number.is_some() {
            self.card_number = card_number;
        }
        if card_hash.is_some() {
            self.card_hash = card_hash;
        }
        self.touch(now);
        self.completed_at.get_or_insert(now);
    }

    pub fn set_status(&mut self, status: TransactionStatus, now: DateTime<Utc>) {
        self.status = status;
        self.touch(now);
    }

    /// `updated_at` never moves backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}
