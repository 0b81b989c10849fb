//! Deferred actions queued in the action log.

use std::fmt;

use serde::{Deserialize, Serialize};
use ztoken_common::{Balance, PublicIdentity};

/// Identifier assigned to an action when it is dispatched.
///
/// Ids increase strictly in dispatch order and are never reused by a log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Debit side of an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "identity", rename_all = "snake_case")]
pub enum Sender {
    /// Sentinel for newly minted tokens; there is no debit leg.
    Mint,
    /// An account holder.
    Account(PublicIdentity),
}

/// A mint or transfer request, immutable once dispatched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAction {
    pub from: Sender,
    pub to: PublicIdentity,
    pub amount: Balance,
}

impl TransferAction {
    pub fn mint(to: PublicIdentity, amount: Balance) -> Self {
        Self {
            from: Sender::Mint,
            to,
            amount,
        }
    }

    pub fn transfer(from: PublicIdentity, to: PublicIdentity, amount: Balance) -> Self {
        Self {
            from: Sender::Account(from),
            to,
            amount,
        }
    }

    pub fn is_mint(&self) -> bool {
        matches!(self.from, Sender::Mint)
    }
}

/// An action waiting in the log, with its assigned id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: ActionId,
    pub action: TransferAction,
}
