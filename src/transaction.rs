use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ledger_error::LedgerError;

/// Caller-assigned unique transaction identifier.
///
/// Uniqueness is enforced by the store for the lifetime of the process;
/// re-adding an existing identifier fails with `AlreadyExists`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `0x`-prefixed UUID, the format handed out by the surrounding relayer.
    pub fn random() -> Self {
        Self(format!("0x{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle state of a transaction.
///
/// Every record belongs to exactly one state bucket in the store at all
/// times. `Finalized` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TxState {
    /// Created but not yet submitted.
    Pending,
    /// Accepted by the network, awaiting confirmation.
    Submitted,
    /// Successfully executed. Terminal.
    Finalized,
    /// Hit a transient error and may be resubmitted.
    Retriable,
    /// Failed permanently. Terminal.
    Failed,
}

impl TxState {
    pub const ALL: [TxState; 5] = [
        TxState::Pending,
        TxState::Submitted,
        TxState::Finalized,
        TxState::Retriable,
        TxState::Failed,
    ];

    /// The allowed transition table. `Pending -> Failed` covers a first
    /// submission the network never accepted: there is no digest to poll,
    /// so the broadcaster fails the record terminally.
    pub fn can_transition_to(self, next: TxState) -> bool {
        use TxState::*;
        matches!(
            (self, next),
            (Pending, Submitted)
                | (Pending, Failed)
                | (Submitted, Finalized)
                | (Submitted, Retriable)
                | (Submitted, Failed)
                | (Retriable, Submitted)
                | (Retriable, Failed)
                | (Retriable, Finalized)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TxState::Finalized | TxState::Failed)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxState::Pending => "Pending",
            TxState::Submitted => "Submitted",
            TxState::Finalized => "Finalized",
            TxState::Retriable => "Retriable",
            TxState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Caller-facing status, a coarser view than the internal state machine.
/// `Unknown` is the zero value for statuses that cannot be determined; it is
/// never produced by the state mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TxStatus {
    Pending,
    Unconfirmed,
    Finalized,
    Failed,
    Fatal,
    #[default]
    Unknown,
}

impl From<TxState> for TxStatus {
    fn from(state: TxState) -> Self {
        match state {
            TxState::Pending => TxStatus::Pending,
            TxState::Submitted => TxStatus::Unconfirmed,
            TxState::Finalized => TxStatus::Finalized,
            TxState::Retriable => TxStatus::Failed,
            TxState::Failed => TxStatus::Fatal,
        }
    }
}

/// Caller-provided fee metadata for a new transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxMeta {
    /// Explicit fee budget. When absent the manager asks the gateway for a
    /// dry-run estimate.
    pub gas_limit: Option<u64>,
    /// Per-transaction cap on fee escalation. Defaults to the manager-wide
    /// maximum when absent.
    pub max_gas_budget: Option<u64>,
}

/// Full details about a transaction. The store owns the authoritative copy;
/// workers only ever see value copies and mutate through store operations.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub sender: String,
    /// Current fee budget. Raised by the gas manager on a `GasBump` retry.
    pub gas_budget: u64,
    pub max_gas_budget: Option<u64>,
    pub created_at: DateTime<Utc>,
    /// Opaque signed payload bytes; the manager never inspects them.
    pub payload: Vec<u8>,
    pub signatures: Vec<String>,
    /// Gateway finality-wait mode, e.g. "WaitForEffectsCert".
    pub request_type: String,
    /// Incremented exactly once per submission attempt, successful or not.
    pub attempts: u32,
    pub state: TxState,
    /// Ledger-assigned digest; empty until the network first accepts the
    /// transaction.
    pub digest: String,
    pub last_updated: DateTime<Utc>,
    pub last_error: Option<LedgerError>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TransactionId,
        sender: impl Into<String>,
        gas_budget: u64,
        max_gas_budget: Option<u64>,
        payload: Vec<u8>,
        signatures: Vec<String>,
        request_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            sender: sender.into(),
            gas_budget,
            max_gas_budget,
            created_at: now,
            payload,
            signatures,
            request_type: request_type.into(),
            attempts: 0,
            state: TxState::Pending,
            digest: String::new(),
            last_updated: now,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_is_exact() {
        use TxState::*;
        let allowed = [
            (Pending, Submitted),
            (Pending, Failed),
            (Submitted, Finalized),
            (Submitted, Retriable),
            (Submitted, Failed),
            (Retriable, Submitted),
            (Retriable, Failed),
            (Retriable, Finalized),
        ];
        for from in TxState::ALL {
            for to in TxState::ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "transition {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        for to in TxState::ALL {
            assert!(!TxState::Finalized.can_transition_to(to));
            assert!(!TxState::Failed.can_transition_to(to));
        }
    }

    #[test]
    fn status_mapping() {
        assert_eq!(TxStatus::from(TxState::Pending), TxStatus::Pending);
        assert_eq!(TxStatus::from(TxState::Submitted), TxStatus::Unconfirmed);
        assert_eq!(TxStatus::from(TxState::Finalized), TxStatus::Finalized);
        assert_eq!(TxStatus::from(TxState::Retriable), TxStatus::Failed);
        assert_eq!(TxStatus::from(TxState::Failed), TxStatus::Fatal);
    }

    #[test]
    fn random_ids_are_unique_and_prefixed() {
        let a = TransactionId::random();
        let b = TransactionId::random();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("0x"));
    }
}
