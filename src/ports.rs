//! Storage port for transaction records.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Transaction, TransactionStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("transaction not found: {0}")]
    NotFound(String),

    #[error("invalid transaction: {0}")]
    InvalidRecord(&'static str),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Keyed persistence for transactions. Records are looked up by gateway token.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn store(&self, tx: &Transaction) -> RepositoryResult<()>;

    async fn get(&self, token: &str) -> RepositoryResult<Transaction>;

    /// Returns the record as persisted.
    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn list_by_status(&self, status: &TransactionStatus) -> RepositoryResult<Vec<Transaction>>;
}
