//! Submission worker. Receives transaction ids over a bounded channel,
//! drains whatever has accumulated, and submits the records oldest-first so
//! a sender's transactions reach the network in creation order.

use std::sync::Arc;

use derive_new::new;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, instrument, warn};

use crate::gateway::{ChainGateway, SubmitRequest};
use crate::metrics::TxmMetrics;
use crate::store::TransactionStore;
use crate::transaction::{Transaction, TransactionId, TxState};

const WORKER_NAME: &str = "broadcaster";

#[derive(new)]
pub struct Broadcaster {
    id_receiver: mpsc::Receiver<TransactionId>,
    store: Arc<TransactionStore>,
    gateway: Arc<dyn ChainGateway>,
    metrics: TxmMetrics,
    shutdown: watch::Receiver<bool>,
}

impl Broadcaster {
    pub async fn run(mut self) {
        info!("Broadcaster started");
        loop {
            self.metrics.update_liveness_metric(WORKER_NAME);
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("Broadcaster shutting down");
                        return;
                    }
                }
                received = self.id_receiver.recv() => {
                    let Some(first) = received else {
                        info!("Broadcast channel closed, broadcaster stopping");
                        return;
                    };
                    let batch = self.drain_queued_ids(first);
                    self.metrics
                        .update_queue_length_metric(WORKER_NAME, batch.len() as u64);
                    for tx in self.fetch_ordered(batch).await {
                        self.submit_one(tx).await;
                    }
                }
            }
        }
    }

    /// Pulls everything already sitting in the channel without blocking, so
    /// a burst of enqueues is submitted as one ordered batch.
    fn drain_queued_ids(&mut self, first: TransactionId) -> Vec<TransactionId> {
        let mut ids = vec![first];
        while let Ok(id) = self.id_receiver.try_recv() {
            ids.push(id);
        }
        ids
    }

    /// Resolves ids into records and orders them by creation time, oldest
    /// first. Ids the store no longer knows are dropped.
    async fn fetch_ordered(&self, ids: Vec<TransactionId>) -> Vec<Transaction> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.get(&id).await {
                Ok(tx) => records.push(tx),
                Err(err) => warn!(%id, %err, "Skipping unknown transaction id"),
            }
        }
        records.sort_by_key(|tx| tx.created_at);
        records
    }

    #[instrument(skip(self, tx), fields(id = %tx.id, attempts = tx.attempts))]
    async fn submit_one(&self, tx: Transaction) {
        let request = SubmitRequest {
            payload: tx.payload.clone(),
            signatures: tx.signatures.clone(),
            request_type: tx.request_type.clone(),
        };
        let result = self.gateway.send_transaction(request).await;
        self.metrics.update_submissions_metric(WORKER_NAME);
        // Every submission counts against the attempt cap, accepted or not.
        if let Err(err) = self.store.increment_attempts(&tx.id).await {
            error!(id = %tx.id, %err, "Failed to record submission attempt");
            return;
        }
        match result {
            Ok(response) if !response.digest.is_empty() => {
                if let Err(err) = self.store.update_digest(&tx.id, &response.digest).await {
                    error!(id = %tx.id, %err, "Failed to record digest");
                    return;
                }
                if let Err(err) = self.store.change_state(&tx.id, TxState::Submitted).await {
                    error!(id = %tx.id, %err, "Failed to mark transaction submitted");
                    return;
                }
                info!(id = %tx.id, digest = %response.digest, "Transaction submitted");
            }
            Ok(_) => {
                // No digest means the network never accepted the transaction;
                // there is nothing to poll, so the record is terminal.
                warn!(id = %tx.id, "Submission returned an empty digest");
                self.fail(&tx.id).await;
            }
            Err(err) => {
                warn!(id = %tx.id, %err, "Submission failed");
                self.fail(&tx.id).await;
            }
        }
    }

    async fn fail(&self, id: &TransactionId) {
        if let Err(err) = self.store.change_state(id, TxState::Failed).await {
            error!(%id, %err, "Failed to mark transaction failed");
            return;
        }
        self.metrics.update_failed_metric("submission");
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::gateway::{ExecutionStatus, MockChainGateway, SubmitResponse};

    fn tx(id: &str, created_offset_secs: i64) -> Transaction {
        let mut record = Transaction::new(
            TransactionId::from(id),
            "0xsender",
            1_000_000,
            None,
            id.as_bytes().to_vec(),
            vec!["sig".to_string()],
            "WaitForEffectsCert",
        );
        record.created_at = Utc::now() + ChronoDuration::seconds(created_offset_secs);
        record
    }

    fn broadcaster(
        gateway: MockChainGateway,
        store: Arc<TransactionStore>,
    ) -> (Broadcaster, mpsc::Sender<TransactionId>, watch::Sender<bool>) {
        let (id_sender, id_receiver) = mpsc::channel(16);
        let (shutdown_sender, shutdown) = watch::channel(false);
        let worker = Broadcaster::new(
            id_receiver,
            store,
            Arc::new(gateway),
            TxmMetrics::dummy_instance(),
            shutdown,
        );
        (worker, id_sender, shutdown_sender)
    }

    #[tokio::test]
    async fn submits_oldest_first_regardless_of_queue_order() {
        let store = Arc::new(TransactionStore::new());
        store.add(tx("0xa", 30)).await.expect("add");
        store.add(tx("0xb", 10)).await.expect("add");
        store.add(tx("0xc", 20)).await.expect("add");

        let submitted = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut gateway = MockChainGateway::new();
        let seen = submitted.clone();
        gateway.expect_send_transaction().returning(move |request| {
            seen.lock().expect("lock").push(request.payload.clone());
            Ok(SubmitResponse {
                digest: format!("d-{}", request.payload.len()),
                status: ExecutionStatus::Success,
            })
        });

        let (mut worker, _sender, _shutdown) = broadcaster(gateway, store.clone());
        let batch = worker.drain_queued_ids(TransactionId::from("0xa"));
        assert_eq!(batch.len(), 1);
        let ids = vec![
            TransactionId::from("0xa"),
            TransactionId::from("0xb"),
            TransactionId::from("0xc"),
        ];
        for record in worker.fetch_ordered(ids).await {
            worker.submit_one(record).await;
        }

        let order = submitted.lock().expect("lock").clone();
        assert_eq!(order, vec![b"0xb".to_vec(), b"0xc".to_vec(), b"0xa".to_vec()]);
        for id in ["0xa", "0xb", "0xc"] {
            let record = store.get(&id.into()).await.expect("get");
            assert_eq!(record.state, TxState::Submitted);
            assert_eq!(record.attempts, 1);
            assert!(!record.digest.is_empty());
        }
    }

    #[tokio::test]
    async fn empty_digest_fails_the_transaction() {
        let store = Arc::new(TransactionStore::new());
        store.add(tx("0x1", 0)).await.expect("add");

        let mut gateway = MockChainGateway::new();
        gateway.expect_send_transaction().returning(|_| {
            Ok(SubmitResponse {
                digest: String::new(),
                status: ExecutionStatus::Other("unknown".to_string()),
            })
        });

        let (worker, _sender, _shutdown) = broadcaster(gateway, store.clone());
        let record = store.get(&"0x1".into()).await.expect("get");
        worker.submit_one(record).await;

        let record = store.get(&"0x1".into()).await.expect("get");
        assert_eq!(record.state, TxState::Failed);
        assert_eq!(record.attempts, 1);
        assert!(record.digest.is_empty());
    }

    #[tokio::test]
    async fn send_error_fails_the_transaction_but_counts_the_attempt() {
        let store = Arc::new(TransactionStore::new());
        store.add(tx("0x1", 0)).await.expect("add");

        let mut gateway = MockChainGateway::new();
        gateway
            .expect_send_transaction()
            .returning(|_| Err(crate::error::TxmError::Network("rpc down".to_string())));

        let (worker, _sender, _shutdown) = broadcaster(gateway, store.clone());
        let record = store.get(&"0x1".into()).await.expect("get");
        worker.submit_one(record).await;

        let record = store.get(&"0x1".into()).await.expect("get");
        assert_eq!(record.state, TxState::Failed);
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn run_loop_processes_enqueued_ids_and_stops_on_shutdown() {
        let store = Arc::new(TransactionStore::new());
        store.add(tx("0x1", 0)).await.expect("add");

        let mut gateway = MockChainGateway::new();
        gateway.expect_send_transaction().returning(|_| {
            Ok(SubmitResponse {
                digest: "d1".to_string(),
                status: ExecutionStatus::Success,
            })
        });

        let (id_sender, id_receiver) = mpsc::channel(16);
        let (shutdown_sender, shutdown) = watch::channel(false);
        let worker = Broadcaster::new(
            id_receiver,
            store.clone(),
            Arc::new(gateway),
            TxmMetrics::dummy_instance(),
            shutdown,
        );
        let handle = tokio::spawn(worker.run());

        id_sender
            .send(TransactionId::from("0x1"))
            .await
            .expect("send");
        for _ in 0..50 {
            if store.get(&"0x1".into()).await.expect("get").state == TxState::Submitted {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(
            store.get(&"0x1".into()).await.expect("get").state,
            TxState::Submitted
        );

        shutdown_sender.send(true).expect("signal shutdown");
        handle.await.expect("worker join");
    }
}
