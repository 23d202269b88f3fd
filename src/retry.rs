//! Failure classification for the confirmer: decides whether a reported
//! execution failure warrants a resubmission and with which strategy. The
//! policy is an injectable function value so callers can swap classification
//! without touching the manager.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::ledger_error::{ErrorCategory, LedgerError};
use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    NoRetry,
    ExponentialBackoff,
    GasBump,
}

/// Classification contract: `(record, raw_error, max_attempts)` to
/// `(retryable, strategy)`.
pub type RetryPolicy = Arc<dyn Fn(&Transaction, &str, u32) -> (bool, RetryStrategy) + Send + Sync>;

pub struct RetryManager {
    policy: RwLock<RetryPolicy>,
    max_attempts: u32,
}

impl RetryManager {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            policy: RwLock::new(Arc::new(default_retry_policy)),
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Replaces the classification policy for all future evaluations.
    pub async fn set_policy(&self, policy: RetryPolicy) {
        *self.policy.write().await = policy;
    }

    pub async fn is_retryable(&self, tx: &Transaction, raw_error: &str) -> (bool, RetryStrategy) {
        let policy = self.policy.read().await.clone();
        policy(tx, raw_error, self.max_attempts)
    }
}

/// Default classification: unknown or terminal error kinds are not retried;
/// the attempt cap applies regardless of kind; gas-category kinds get a fee
/// bump, every other retryable kind backs off and resubmits unchanged.
pub fn default_retry_policy(
    tx: &Transaction,
    raw_error: &str,
    max_attempts: u32,
) -> (bool, RetryStrategy) {
    let Some(error) = LedgerError::parse(raw_error) else {
        return (false, RetryStrategy::NoRetry);
    };
    if !error.kind.is_retryable() {
        return (false, RetryStrategy::NoRetry);
    }
    if tx.attempts >= max_attempts {
        return (false, RetryStrategy::NoRetry);
    }
    match error.kind.category() {
        ErrorCategory::Gas => (true, RetryStrategy::GasBump),
        _ => (true, RetryStrategy::ExponentialBackoff),
    }
}
