#![deny(clippy::unwrap_used, clippy::panic)]
#![deny(clippy::arithmetic_side_effects)]

//! Transaction manager for a relayer against a finality-gadget ledger.
//!
//! Callers enqueue signed payloads through [`TransactionManager`]; a
//! broadcaster worker submits them to the chain gateway oldest-first and a
//! confirmer worker polls for execution results, bumping fees or backing off
//! on transient failures according to a pluggable retry policy.

pub use config::TxmConfig;
pub use error::TxmError;
pub use gas::{FixedBumpGasManager, ManagesGas};
pub use gateway::{
    ChainGateway, ExecutionStatus, Signer, StatusResponse, SubmitRequest, SubmitResponse,
};
pub use ledger_error::{ErrorCategory, LedgerError, LedgerErrorKind};
pub use manager::TransactionManager;
pub use metrics::TxmMetrics;
pub use retry::{default_retry_policy, RetryManager, RetryPolicy, RetryStrategy};
pub use store::TransactionStore;
pub use transaction::{Transaction, TransactionId, TxMeta, TxState, TxStatus};

mod broadcaster;
mod config;
mod confirmer;
mod error;
mod gas;
mod gateway;
mod jitter;
mod ledger_error;
mod manager;
mod metrics;
mod retry;
mod store;
mod transaction;
