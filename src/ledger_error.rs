//! Taxonomy of execution errors reported by the ledger, mapped from the raw
//! RPC error strings the gateway hands back. The retry manager keys its
//! default classification off the category and the retryable set below.

use std::fmt;

/// Coarse grouping of ledger error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    Object,
    Call,
    Gas,
    Signature,
    Consensus,
    Publishing,
}

/// A known ledger error kind, identified by the token the ledger embeds in
/// its error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LedgerErrorKind {
    // object errors
    ObjectNotFound,
    ObjectDeleted,
    InvalidObjectDigest,
    InvalidSequenceNumber,
    NotOwnedObject,
    // call errors
    MalformedCall,
    BlockedFunction,
    FunctionInputError,
    // gas errors
    GasBudgetTooLow,
    GasBudgetTooHigh,
    GasBalanceTooLow,
    GasPriceUnderReference,
    GasPriceTooHigh,
    InsufficientGas,
    InsufficientBalanceForMinimalGas,
    // signature and transaction errors
    IncorrectSignature,
    TransactionDenied,
    InvalidIdentifier,
    // checkpoint and consensus errors
    StaleCheckpoint,
    CheckpointContentsNotFound,
    PackageVerificationTimeout,
    TransactionCursorNotFound,
    // publishing errors
    DependentPackageNotFound,
    SizeLimitExceeded,
}

impl LedgerErrorKind {
    pub const ALL: [LedgerErrorKind; 24] = [
        LedgerErrorKind::ObjectNotFound,
        LedgerErrorKind::ObjectDeleted,
        LedgerErrorKind::InvalidObjectDigest,
        LedgerErrorKind::InvalidSequenceNumber,
        LedgerErrorKind::NotOwnedObject,
        LedgerErrorKind::MalformedCall,
        LedgerErrorKind::BlockedFunction,
        LedgerErrorKind::FunctionInputError,
        LedgerErrorKind::GasBudgetTooLow,
        LedgerErrorKind::GasBudgetTooHigh,
        LedgerErrorKind::GasBalanceTooLow,
        LedgerErrorKind::GasPriceUnderReference,
        LedgerErrorKind::GasPriceTooHigh,
        LedgerErrorKind::InsufficientGas,
        LedgerErrorKind::InsufficientBalanceForMinimalGas,
        LedgerErrorKind::IncorrectSignature,
        LedgerErrorKind::TransactionDenied,
        LedgerErrorKind::InvalidIdentifier,
        LedgerErrorKind::StaleCheckpoint,
        LedgerErrorKind::CheckpointContentsNotFound,
        LedgerErrorKind::PackageVerificationTimeout,
        LedgerErrorKind::TransactionCursorNotFound,
        LedgerErrorKind::DependentPackageNotFound,
        LedgerErrorKind::SizeLimitExceeded,
    ];

    /// The token the ledger embeds in raw error messages for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerErrorKind::ObjectNotFound => "ObjectNotFound",
            LedgerErrorKind::ObjectDeleted => "ObjectDeleted",
            LedgerErrorKind::InvalidObjectDigest => "InvalidObjectDigest",
            LedgerErrorKind::InvalidSequenceNumber => "InvalidSequenceNumber",
            LedgerErrorKind::NotOwnedObject => "NotOwnedObject",
            LedgerErrorKind::MalformedCall => "MalformedCall",
            LedgerErrorKind::BlockedFunction => "BlockedFunction",
            LedgerErrorKind::FunctionInputError => "FunctionInputError",
            LedgerErrorKind::GasBudgetTooLow => "GasBudgetTooLow",
            LedgerErrorKind::GasBudgetTooHigh => "GasBudgetTooHigh",
            LedgerErrorKind::GasBalanceTooLow => "GasBalanceTooLow",
            LedgerErrorKind::GasPriceUnderReference => "GasPriceUnderReference",
            LedgerErrorKind::GasPriceTooHigh => "GasPriceTooHigh",
            LedgerErrorKind::InsufficientGas => "InsufficientGas",
            LedgerErrorKind::InsufficientBalanceForMinimalGas => {
                "InsufficientBalanceForMinimalGas"
            }
            LedgerErrorKind::IncorrectSignature => "IncorrectSignature",
            LedgerErrorKind::TransactionDenied => "TransactionDenied",
            LedgerErrorKind::InvalidIdentifier => "InvalidIdentifier",
            LedgerErrorKind::StaleCheckpoint => "StaleCheckpoint",
            LedgerErrorKind::CheckpointContentsNotFound => "CheckpointContentsNotFound",
            LedgerErrorKind::PackageVerificationTimeout => "PackageVerificationTimeout",
            LedgerErrorKind::TransactionCursorNotFound => "TransactionCursorNotFound",
            LedgerErrorKind::DependentPackageNotFound => "DependentPackageNotFound",
            LedgerErrorKind::SizeLimitExceeded => "SizeLimitExceeded",
        }
    }

    pub fn category(self) -> ErrorCategory {
        use LedgerErrorKind::*;
        match self {
            ObjectNotFound | ObjectDeleted | InvalidObjectDigest | InvalidSequenceNumber
            | NotOwnedObject => ErrorCategory::Object,
            MalformedCall | BlockedFunction | FunctionInputError => ErrorCategory::Call,
            GasBudgetTooLow | GasBudgetTooHigh | GasBalanceTooLow | GasPriceUnderReference
            | GasPriceTooHigh | InsufficientGas | InsufficientBalanceForMinimalGas => {
                ErrorCategory::Gas
            }
            IncorrectSignature | TransactionDenied | InvalidIdentifier => ErrorCategory::Signature,
            StaleCheckpoint | CheckpointContentsNotFound | PackageVerificationTimeout
            | TransactionCursorNotFound => ErrorCategory::Consensus,
            DependentPackageNotFound | SizeLimitExceeded => ErrorCategory::Publishing,
        }
    }

    /// Transient errors worth retrying: consensus/checkpoint lookups that
    /// resolve themselves, and fee-budget/price mismatches a bump can fix.
    /// Balance exhaustion below the minimal fee is terminal.
    pub fn is_retryable(self) -> bool {
        use LedgerErrorKind::*;
        matches!(
            self,
            StaleCheckpoint
                | CheckpointContentsNotFound
                | PackageVerificationTimeout
                | TransactionCursorNotFound
                | GasBudgetTooLow
                | GasBudgetTooHigh
                | GasBalanceTooLow
                | GasPriceUnderReference
                | GasPriceTooHigh
                | InsufficientGas
        )
    }

    /// Maps a raw RPC error message to a known kind by substring match.
    pub fn parse(message: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| message.contains(kind.as_str()))
    }
}

impl fmt::Display for LedgerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified ledger failure, kept on the transaction record so callers
/// can see why a transaction ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LedgerError {
    pub kind: LedgerErrorKind,
    pub message: String,
}

impl LedgerError {
    pub fn new(kind: LedgerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classifies a raw error message; `None` when no known kind matches.
    pub fn parse(message: &str) -> Option<Self> {
        LedgerErrorKind::parse(message).map(|kind| Self::new(kind, message))
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for LedgerError {}
