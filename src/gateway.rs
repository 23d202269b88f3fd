//! Capability surfaces the manager consumes from external collaborators: the
//! chain gateway (RPC layer) and the signing service. Both are narrow traits
//! so tests can mock them and multiple managers can share one gateway.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::TxmError;

/// Wire submission request assembled by the broadcaster from a stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub payload: Vec<u8>,
    pub signatures: Vec<String>,
    /// Finality-wait mode, e.g. "WaitForEffectsCert".
    pub request_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    /// Ledger-assigned digest. Empty means the network never accepted the
    /// transaction.
    pub digest: String,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: ExecutionStatus,
    /// Raw ledger error message accompanying a `Failure` status.
    pub error: Option<String>,
}

/// Execution outcome as reported by the ledger. Anything the gateway cannot
/// map onto success/failure comes through as `Other` and is never acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failure,
    Other(String),
}

/// The chain RPC surface the manager needs. Sending costs real fees;
/// `estimate_gas` is a dry-run evaluation that costs much less.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn send_transaction(&self, request: SubmitRequest) -> Result<SubmitResponse, TxmError>;

    async fn transaction_status(&self, digest: &str) -> Result<StatusResponse, TxmError>;

    async fn estimate_gas(&self, payload: &[u8]) -> Result<u64, TxmError>;
}

/// Abstract signing capability. Key storage lives elsewhere.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, address: &str, message: &[u8]) -> Result<Vec<String>, TxmError>;
}
