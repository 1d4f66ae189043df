//! In-memory implementation of TransactionRepository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::{Transaction, TransactionStatus};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

/// Map-backed repository. Readers share the lock; writers take it exclusively.
#[derive(Clone, Default)]
pub struct MemoryTransactionRepository {
    transactions: Arc<RwLock<HashMap<String, Transaction>>>,
}

impl MemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }
}

fn check_keys(tx: &Transaction) -> RepositoryResult<()> {
    if tx.id.is_nil() {
        return Err(RepositoryError::InvalidRecord("id must not be empty"));
    }
    if tx.token.trim().is_empty() {
        return Err(RepositoryError::InvalidRecord("token must not be empty"));
    }
    Ok(())
}

#[async_trait]
impl TransactionRepository for MemoryTransactionRepository {
    async fn store(&self, tx: &Transaction) -> RepositoryResult<()> {
        check_keys(tx)?;

        self.transactions
            .write()
            .await
            .insert(tx.token.clone(), tx.clone());

        Ok(())
    }

    async fn get(&self, token: &str) -> RepositoryResult<Transaction> {
        if token.is_empty() {
            return Err(RepositoryError::InvalidRecord("token must not be empty"));
        }

        self.transactions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(token.to_string()))
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        check_keys(tx)?;

        let mut transactions = self.transactions.write().await;
        let existing = transactions
            .get(&tx.token)
            .ok_or_else(|| RepositoryError::NotFound(tx.token.clone()))?;

        let mut updated = tx.clone();
        updated.updated_at = existing.updated_at;
        updated.touch(tx.updated_at.max(Utc::now()));

        transactions.insert(updated.token.clone(), updated.clone());
        Ok(updated)
    }

    async fn list_by_status(&self, status: &TransactionStatus) -> RepositoryResult<Vec<Transaction>> {
        let mut matching: Vec<Transaction> = self
            .transactions
            .read()
            .await
            .values()
            .filter(|tx| &tx.status == status)
            .cloned()
            .collect();

        matching.sort_by_key(|tx| tx.created_at);
        Ok(matching)
    }
}
