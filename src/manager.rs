//! Transaction manager: the public face of the crate. Owns the store, the
//! gas and retry managers, and the two background workers, and exposes the
//! enqueue/status lifecycle to callers.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::broadcaster::Broadcaster;
use crate::config::TxmConfig;
use crate::confirmer::Confirmer;
use crate::error::TxmError;
use crate::gas::{FixedBumpGasManager, ManagesGas};
use crate::gateway::{ChainGateway, Signer};
use crate::metrics::TxmMetrics;
use crate::retry::RetryManager;
use crate::store::TransactionStore;
use crate::transaction::{Transaction, TransactionId, TxMeta, TxStatus};

pub struct TransactionManager {
    store: Arc<TransactionStore>,
    gateway: Arc<dyn ChainGateway>,
    signer: Arc<dyn Signer>,
    gas_manager: Arc<dyn ManagesGas>,
    retry_manager: Arc<RetryManager>,
    config: TxmConfig,
    metrics: TxmMetrics,
    id_sender: mpsc::Sender<TransactionId>,
    /// Consumed by the broadcaster on the first `start`.
    id_receiver: Mutex<Option<mpsc::Receiver<TransactionId>>>,
    shutdown_sender: watch::Sender<bool>,
    shutdown_receiver: watch::Receiver<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TransactionManager {
    pub fn new(
        config: TxmConfig,
        gateway: Arc<dyn ChainGateway>,
        signer: Arc<dyn Signer>,
        metrics: TxmMetrics,
    ) -> Self {
        let (id_sender, id_receiver) = mpsc::channel(config.broadcast_channel_size);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let gas_manager: Arc<dyn ManagesGas> = Arc::new(FixedBumpGasManager::new(
            gateway.clone(),
            config.max_gas_budget,
            config.gas_bump_percent,
        ));
        let retry_manager = Arc::new(RetryManager::new(config.max_retry_attempts));
        Self {
            store: Arc::new(TransactionStore::new()),
            gateway,
            signer,
            gas_manager,
            retry_manager,
            config,
            metrics,
            id_sender,
            id_receiver: Mutex::new(Some(id_receiver)),
            shutdown_sender,
            shutdown_receiver,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the broadcaster and confirmer workers. Calling `start` again
    /// on a running manager is a no-op.
    pub async fn start(&self) {
        let Some(id_receiver) = self.id_receiver.lock().await.take() else {
            warn!("Transaction manager already started");
            return;
        };
        let broadcaster = Broadcaster::new(
            id_receiver,
            self.store.clone(),
            self.gateway.clone(),
            self.metrics.clone(),
            self.shutdown_receiver.clone(),
        );
        let confirmer = Confirmer::new(
            self.store.clone(),
            self.gateway.clone(),
            self.retry_manager.clone(),
            self.gas_manager.clone(),
            self.id_sender.clone(),
            self.config.confirm_poll_period(),
            self.metrics.clone(),
            self.shutdown_receiver.clone(),
        );
        let mut workers = self.workers.lock().await;
        workers.push(tokio::spawn(broadcaster.run()));
        workers.push(tokio::spawn(confirmer.run()));
        info!("Transaction manager started");
    }

    /// Signals the workers to stop and waits for them to drain. Safe to call
    /// more than once.
    pub async fn close(&self) {
        let mut workers = self.workers.lock().await;
        if workers.is_empty() {
            return;
        }
        if self.shutdown_sender.send(true).is_err() {
            warn!("Shutdown channel closed before workers stopped");
        }
        for handle in workers.drain(..) {
            if let Err(err) = handle.await {
                error!(%err, "Worker task panicked during shutdown");
            }
        }
        info!("Transaction manager stopped");
    }

    /// Registers a transaction and hands it to the broadcaster. The fee
    /// budget comes from `meta` when set, otherwise from a gateway dry run.
    /// Blocks when the broadcast queue is full rather than dropping work.
    pub async fn enqueue(
        &self,
        id: TransactionId,
        meta: TxMeta,
        sender: &str,
        payload: Vec<u8>,
    ) -> Result<Transaction, TxmError> {
        let gas_budget = match meta.gas_limit {
            Some(limit) => limit,
            None => self.gas_manager.estimate_gas_budget(&payload).await?,
        };
        let signatures = self.signer.sign(sender, &payload).await?;
        let tx = Transaction::new(
            id.clone(),
            sender,
            gas_budget,
            meta.max_gas_budget,
            payload,
            signatures,
            self.config.request_type.clone(),
        );
        self.store.add(tx.clone()).await?;
        self.id_sender.send(id.clone()).await?;
        info!(%id, gas_budget, "Transaction enqueued");
        Ok(tx)
    }

    /// Caller-facing status; `NotFound` for ids the manager has never seen.
    pub async fn get_status(&self, id: &TransactionId) -> Result<TxStatus, TxmError> {
        let tx = self.store.get(id).await?;
        Ok(TxStatus::from(tx.state))
    }

    pub async fn get_transaction(&self, id: &TransactionId) -> Result<Transaction, TxmError> {
        self.store.get(id).await
    }

    pub async fn delete(&self, id: &TransactionId) -> Result<(), TxmError> {
        self.store.delete(id).await
    }

    /// Live counts of in-flight work, for operational visibility.
    pub async fn inflight_count(&self) -> usize {
        self.store.list_inflight().await.len()
    }

    pub fn retry_manager(&self) -> &RetryManager {
        &self.retry_manager
    }

    pub fn metrics(&self) -> &TxmMetrics {
        &self.metrics
    }
}
