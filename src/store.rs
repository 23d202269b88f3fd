//! In-memory transaction repository: the single source of truth for record
//! state. A primary map indexed by id plus per-state id buckets, guarded by
//! one reader/writer lock so every mutation updates both atomically.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::TxmError;
use crate::ledger_error::LedgerError;
use crate::transaction::{Transaction, TransactionId, TxState};

#[derive(Default)]
struct StoreInner {
    transactions: HashMap<TransactionId, Transaction>,
    buckets: HashMap<TxState, HashSet<TransactionId>>,
}

/// Concurrency-safe store. Workers never hold references into it; reads
/// return value copies and writes go through the fallible operations below.
#[derive(Default)]
pub struct TransactionStore {
    inner: RwLock<StoreInner>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new record, forcing its state to `Pending`.
    pub async fn add(&self, mut tx: Transaction) -> Result<(), TxmError> {
        let mut inner = self.inner.write().await;
        if inner.transactions.contains_key(&tx.id) {
            return Err(TxmError::AlreadyExists(tx.id));
        }
        tx.state = TxState::Pending;
        inner
            .buckets
            .entry(TxState::Pending)
            .or_default()
            .insert(tx.id.clone());
        inner.transactions.insert(tx.id.clone(), tx);
        Ok(())
    }

    pub async fn get(&self, id: &TransactionId) -> Result<Transaction, TxmError> {
        self.inner
            .read()
            .await
            .transactions
            .get(id)
            .cloned()
            .ok_or_else(|| TxmError::NotFound(id.clone()))
    }

    /// Moves a record to `next`, validating against the transition table and
    /// relocating the id between state buckets in the same critical section.
    pub async fn change_state(&self, id: &TransactionId, next: TxState) -> Result<(), TxmError> {
        let mut inner = self.inner.write().await;
        let tx = inner
            .transactions
            .get_mut(id)
            .ok_or_else(|| TxmError::NotFound(id.clone()))?;
        let current = tx.state;
        if !current.can_transition_to(next) {
            return Err(TxmError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        tx.state = next;
        tx.last_updated = Utc::now();
        if let Some(bucket) = inner.buckets.get_mut(&current) {
            bucket.remove(id);
        }
        inner.buckets.entry(next).or_default().insert(id.clone());
        Ok(())
    }

    pub async fn update_digest(&self, id: &TransactionId, digest: &str) -> Result<(), TxmError> {
        self.mutate(id, |tx| tx.digest = digest.to_string()).await
    }

    /// An attempt happened, successful or not; the counter only ever grows.
    pub async fn increment_attempts(&self, id: &TransactionId) -> Result<(), TxmError> {
        self.mutate(id, |tx| tx.attempts = tx.attempts.saturating_add(1))
            .await
    }

    pub async fn update_gas_budget(&self, id: &TransactionId, budget: u64) -> Result<(), TxmError> {
        self.mutate(id, |tx| tx.gas_budget = budget).await
    }

    pub async fn update_error(&self, id: &TransactionId, error: LedgerError) -> Result<(), TxmError> {
        self.mutate(id, |tx| tx.last_error = Some(error)).await
    }

    pub async fn list_by_state(&self, state: TxState) -> Vec<Transaction> {
        let inner = self.inner.read().await;
        inner
            .buckets
            .get(&state)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(|id| inner.transactions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Submitted and Retriable records, the set the confirmer sweeps.
    pub async fn list_inflight(&self) -> Vec<Transaction> {
        let inner = self.inner.read().await;
        [TxState::Submitted, TxState::Retriable]
            .iter()
            .flat_map(|state| inner.buckets.get(state))
            .flat_map(|bucket| bucket.iter())
            .filter_map(|id| inner.transactions.get(id).cloned())
            .collect()
    }

    pub async fn delete(&self, id: &TransactionId) -> Result<(), TxmError> {
        let mut inner = self.inner.write().await;
        let tx = inner
            .transactions
            .remove(id)
            .ok_or_else(|| TxmError::NotFound(id.clone()))?;
        if let Some(bucket) = inner.buckets.get_mut(&tx.state) {
            bucket.remove(id);
        }
        Ok(())
    }

    async fn mutate(
        &self,
        id: &TransactionId,
        apply: impl FnOnce(&mut Transaction),
    ) -> Result<(), TxmError> {
        let mut inner = self.inner.write().await;
        let tx = inner
            .transactions
            .get_mut(id)
            .ok_or_else(|| TxmError::NotFound(id.clone()))?;
        apply(tx);
        tx.last_updated = Utc::now();
        Ok(())
    }
}
