use std::time::UNIX_EPOCH;

use prometheus::{
    opts, register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry,
    IntCounterVec, IntGaugeVec, Registry,
};

const METRICS_NAMESPACE: &str = "courier";

fn namespaced(name: &str) -> String {
    format!("{}_{}", METRICS_NAMESPACE, name)
}

/// Metrics for one transaction manager instance.
#[derive(Clone)]
pub struct TxmMetrics {
    registry: Registry,
    /// Liveness of the background workers, as a timestamp since the epoch.
    pub worker_liveness: IntGaugeVec,
    pub broadcast_queue_length: IntGaugeVec,
    pub transaction_submissions: IntCounterVec,
    pub finalized_transactions: IntCounterVec,
    /// Labeled by the phase that failed the transaction.
    pub failed_transactions: IntCounterVec,
    pub gas_bumps: IntCounterVec,
}

impl TxmMetrics {
    pub fn new(registry: Registry) -> prometheus::Result<Self> {
        let worker_liveness = register_int_gauge_vec_with_registry!(
            opts!(
                namespaced("worker_liveness"),
                "The liveness of the manager workers, expressed as a timestamp since the epoch",
            ),
            &["worker"],
            registry.clone()
        )?;
        let broadcast_queue_length = register_int_gauge_vec_with_registry!(
            opts!(
                namespaced("broadcast_queue_length"),
                "The number of identifiers drained from the broadcast queue per batch",
            ),
            &["worker"],
            registry.clone()
        )?;
        let transaction_submissions = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("transaction_submissions"),
                "The number of submission attempts made against the gateway",
            ),
            &["worker"],
            registry.clone()
        )?;
        let finalized_transactions = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("finalized_transactions"),
                "The number of transactions finalized",
            ),
            &["worker"],
            registry.clone()
        )?;
        let failed_transactions = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("failed_transactions"),
                "The number of transactions terminally failed",
            ),
            &["phase"],
            registry.clone()
        )?;
        let gas_bumps = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("gas_bumps"),
                "The number of fee budget escalations applied",
            ),
            &["worker"],
            registry.clone()
        )?;
        Ok(Self {
            registry,
            worker_liveness,
            broadcast_queue_length,
            transaction_submissions,
            finalized_transactions,
            failed_transactions,
            gas_bumps,
        })
    }

    pub fn update_liveness_metric(&self, worker: &str) {
        self.worker_liveness.with_label_values(&[worker]).set(
            UNIX_EPOCH
                .elapsed()
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
        );
    }

    pub fn update_queue_length_metric(&self, worker: &str, length: u64) {
        self.broadcast_queue_length
            .with_label_values(&[worker])
            .set(length as i64);
    }

    pub fn update_submissions_metric(&self, worker: &str) {
        self.transaction_submissions
            .with_label_values(&[worker])
            .inc();
    }

    pub fn update_finalized_metric(&self, worker: &str) {
        self.finalized_transactions
            .with_label_values(&[worker])
            .inc();
    }

    pub fn update_failed_metric(&self, phase: &str) {
        self.failed_transactions.with_label_values(&[phase]).inc();
    }

    pub fn update_gas_bump_metric(&self, worker: &str) {
        self.gas_bumps.with_label_values(&[worker]).inc();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Standalone instance for tests; registers against a fresh registry.
    pub fn dummy_instance() -> Self {
        Self::new(Registry::new()).expect("metrics registration on a fresh registry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = TxmMetrics::dummy_instance();
        metrics.update_submissions_metric("broadcaster");
        metrics.update_submissions_metric("broadcaster");
        metrics.update_finalized_metric("confirmer");
        metrics.update_failed_metric("submission");
        metrics.update_liveness_metric("broadcaster");

        assert_eq!(
            metrics
                .transaction_submissions
                .with_label_values(&["broadcaster"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .finalized_transactions
                .with_label_values(&["confirmer"])
                .get(),
            1
        );
        assert!(
            metrics
                .worker_liveness
                .with_label_values(&["broadcaster"])
                .get()
                > 0
        );
    }
}
