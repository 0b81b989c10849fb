//! Error types for the ledger.

use thiserror::Error;
use ztoken_common::{AccountKey, Balance, Digest, PublicIdentity};
use ztoken_map::MapError;

use crate::action::ActionId;

/// Error type for ledger operations.
///
/// Every variant leaves persisted state exactly as it was before the call.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A witness does not recompute the expected root.
    #[error("witness mismatch: {0}")]
    WitnessMismatch(#[from] MapError),

    /// Debit exceeds the sender's balance.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Balance,
        available: Balance,
    },

    /// The evidence table has no record for a pending action.
    #[error("missing evidence for action {0}")]
    MissingEvidence(ActionId),

    /// The evidence table has two records for one action.
    #[error("duplicate evidence for action {0}")]
    DuplicateEvidence(ActionId),

    /// Sender authorization was not confirmed for the claimed identity.
    #[error("sender {0} is not authorized")]
    UnauthorizedSender(PublicIdentity),

    /// The committed root moved since the caller read it.
    #[error("stale root: expected {expected}, current {current}")]
    StaleRoot { expected: Digest, current: Digest },

    /// The action log was drained by another reduction while this one folded.
    #[error("action log changed during reduction")]
    LogChanged,

    /// Crediting would overflow the receiver's balance.
    #[error("balance overflow crediting {0}")]
    BalanceOverflow(AccountKey),

    /// Minting would overflow the total supply.
    #[error("total supply overflow")]
    SupplyOverflow,

    /// The action log is at capacity.
    #[error("action log full ({capacity} pending)")]
    ActionLogFull { capacity: usize },

    /// Proof generation error.
    #[error("proof error: {0}")]
    Proof(String),

    /// State storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::WitnessMismatch(_) => "WITNESS_MISMATCH",
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::MissingEvidence(_) => "MISSING_EVIDENCE",
            LedgerError::DuplicateEvidence(_) => "DUPLICATE_EVIDENCE",
            LedgerError::UnauthorizedSender(_) => "UNAUTHORIZED_SENDER",
            LedgerError::StaleRoot { .. } => "STALE_ROOT",
            LedgerError::LogChanged => "LOG_CHANGED",
            LedgerError::BalanceOverflow(_) => "BALANCE_OVERFLOW",
            LedgerError::SupplyOverflow => "SUPPLY_OVERFLOW",
            LedgerError::ActionLogFull { .. } => "ACTION_LOG_FULL",
            LedgerError::Proof(_) => "PROOF_ERROR",
            LedgerError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Get HTTP status code suggestion.
    pub fn suggested_status_code(&self) -> u16 {
        match self {
            LedgerError::UnauthorizedSender(_) => 401,
            LedgerError::StaleRoot { .. } | LedgerError::LogChanged => 409,
            LedgerError::ActionLogFull { .. } => 503,
            LedgerError::Proof(_) | LedgerError::Storage(_) => 500,
            LedgerError::WitnessMismatch(_)
            | LedgerError::InsufficientBalance { .. }
            | LedgerError::MissingEvidence(_)
            | LedgerError::DuplicateEvidence(_)
            | LedgerError::BalanceOverflow(_)
            | LedgerError::SupplyOverflow => 422,
        }
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}
