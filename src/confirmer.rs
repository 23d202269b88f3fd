//! Confirmation worker. Polls the gateway for the execution status of
//! submitted transactions on a jittered timer, finalizes successes, routes
//! failures through the retry policy, and re-queues retriable records once
//! their backoff has elapsed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use derive_new::new;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::error::TxmError;
use crate::gas::ManagesGas;
use crate::gateway::{ChainGateway, ExecutionStatus};
use crate::jitter::{jittered, DEFAULT_JITTER_PERCENT};
use crate::ledger_error::LedgerError;
use crate::metrics::TxmMetrics;
use crate::retry::{RetryManager, RetryStrategy};
use crate::store::TransactionStore;
use crate::transaction::{Transaction, TransactionId, TxState};

const WORKER_NAME: &str = "confirmer";

/// Ceiling on the re-queue backoff so a record with many attempts still
/// resubmits within a bounded window.
const MAX_REQUEUE_BACKOFF_SECS: u64 = 60;

#[derive(new)]
pub struct Confirmer {
    store: Arc<TransactionStore>,
    gateway: Arc<dyn ChainGateway>,
    retry_manager: Arc<RetryManager>,
    gas_manager: Arc<dyn ManagesGas>,
    id_sender: mpsc::Sender<TransactionId>,
    poll_period: Duration,
    metrics: TxmMetrics,
    shutdown: watch::Receiver<bool>,
}

impl Confirmer {
    pub async fn run(mut self) {
        info!(poll_period = ?self.poll_period, "Confirmer started");
        loop {
            self.metrics.update_liveness_metric(WORKER_NAME);
            let tick = jittered(self.poll_period, DEFAULT_JITTER_PERCENT);
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("Confirmer shutting down");
                        return;
                    }
                }
                _ = tokio::time::sleep(tick) => {
                    self.check_confirmations().await;
                }
            }
        }
    }

    /// One sweep: resolve the status of every submitted record, then
    /// re-queue retriable records whose backoff has elapsed.
    pub(crate) async fn check_confirmations(&self) {
        for tx in self.store.list_by_state(TxState::Submitted).await {
            self.check_one(tx).await;
        }
        for tx in self.store.list_by_state(TxState::Retriable).await {
            self.requeue_if_due(&tx).await;
        }
    }

    #[instrument(skip(self, tx), fields(id = %tx.id, digest = %tx.digest))]
    async fn check_one(&self, tx: Transaction) {
        let response = match self.gateway.transaction_status(&tx.digest).await {
            Ok(response) => response,
            Err(err) => {
                // Transient lookup failure; the record stays Submitted and
                // the next sweep retries the query.
                warn!(id = %tx.id, %err, "Status lookup failed");
                return;
            }
        };
        match response.status {
            ExecutionStatus::Success => {
                if let Err(err) = self.store.change_state(&tx.id, TxState::Finalized).await {
                    error!(id = %tx.id, %err, "Failed to finalize transaction");
                    return;
                }
                self.metrics.update_finalized_metric(WORKER_NAME);
                info!(id = %tx.id, digest = %tx.digest, "Transaction finalized");
            }
            ExecutionStatus::Failure => {
                let raw_error = response.error.unwrap_or_default();
                self.handle_failure(tx, &raw_error).await;
            }
            ExecutionStatus::Other(status) => {
                debug!(id = %tx.id, %status, "Transaction not yet settled");
            }
        }
    }

    async fn handle_failure(&self, tx: Transaction, raw_error: &str) {
        warn!(id = %tx.id, error = raw_error, attempts = tx.attempts, "Transaction execution failed");
        if let Some(error) = LedgerError::parse(raw_error) {
            if let Err(err) = self.store.update_error(&tx.id, error).await {
                error!(id = %tx.id, %err, "Failed to record ledger error");
            }
        }
        let (retryable, strategy) = self.retry_manager.is_retryable(&tx, raw_error).await;
        if !retryable {
            self.fail(&tx.id).await;
            return;
        }
        match strategy {
            RetryStrategy::GasBump => {
                let max_budget = tx
                    .max_gas_budget
                    .unwrap_or_else(|| self.gas_manager.max_gas_budget());
                match self.gas_manager.bump_gas(tx.gas_budget, max_budget) {
                    Ok(bumped) => {
                        if let Err(err) = self.store.update_gas_budget(&tx.id, bumped).await {
                            error!(id = %tx.id, %err, "Failed to record bumped gas budget");
                            return;
                        }
                        self.metrics.update_gas_bump_metric(WORKER_NAME);
                        info!(id = %tx.id, bumped, "Gas budget bumped for resubmission");
                        self.mark_retriable(&tx.id).await;
                    }
                    Err(TxmError::AtMaxBudget) => {
                        warn!(id = %tx.id, "Gas budget already at maximum");
                        self.fail(&tx.id).await;
                    }
                    Err(err) => {
                        error!(id = %tx.id, %err, "Gas bump failed");
                        self.fail(&tx.id).await;
                    }
                }
            }
            RetryStrategy::ExponentialBackoff => self.mark_retriable(&tx.id).await,
            RetryStrategy::NoRetry => self.fail(&tx.id).await,
        }
    }

    /// Pushes a retriable record back onto the broadcast queue once
    /// `2^attempts` seconds (capped) have passed since its last update. A
    /// full queue is not an error; the next sweep tries again.
    async fn requeue_if_due(&self, tx: &Transaction) {
        let backoff = requeue_backoff(tx.attempts);
        let elapsed = Utc::now()
            .signed_duration_since(tx.last_updated)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if elapsed < backoff {
            return;
        }
        match self.id_sender.try_send(tx.id.clone()) {
            Ok(()) => {
                debug!(id = %tx.id, attempts = tx.attempts, "Re-queued retriable transaction")
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(id = %tx.id, "Broadcast queue full, deferring re-queue")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(id = %tx.id, "Broadcast queue closed, cannot re-queue")
            }
        }
    }

    async fn mark_retriable(&self, id: &TransactionId) {
        if let Err(err) = self.store.change_state(id, TxState::Retriable).await {
            error!(%id, %err, "Failed to mark transaction retriable");
        }
    }

    async fn fail(&self, id: &TransactionId) {
        if let Err(err) = self.store.change_state(id, TxState::Failed).await {
            error!(%id, %err, "Failed to mark transaction failed");
            return;
        }
        self.metrics.update_failed_metric("confirmation");
    }
}

fn requeue_backoff(attempts: u32) -> Duration {
    let secs = 2u64
        .saturating_pow(attempts)
        .min(MAX_REQUEUE_BACKOFF_SECS);
    Duration::from_secs(secs)
}
