use crate::transaction::{TransactionId, TxState};

#[derive(Debug, thiserror::Error)]
pub enum TxmError {
    #[error("transaction {0} already exists")]
    AlreadyExists(TransactionId),
    #[error("transaction {0} not found")]
    NotFound(TransactionId),
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: TxState, to: TxState },
    #[error("gas estimation failed: {0}")]
    EstimationFailed(String),
    #[error("gas budget is already at the maximum")]
    AtMaxBudget,
    #[error("network error: {0}")]
    Network(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("failed to send on the broadcast channel: {0}")]
    ChannelSendFailure(#[from] tokio::sync::mpsc::error::SendError<TransactionId>),
    #[error("broadcast channel closed")]
    ChannelClosed,
}
