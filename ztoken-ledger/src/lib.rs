//! ztoken-ledger
//!
//! Token ledger whose balances live behind a sparse Merkle root.
//!
//! Balances change in one of two ways:
//!
//! - **Synchronously**: [`TokenLedger::mint`] and [`TokenLedger::transfer`]
//!   take caller-supplied witnesses for the touched leaves and commit the new
//!   root immediately.
//! - **Deferred**: [`TokenLedger::dispatch`] appends a witness-free action to
//!   the [`ActionLog`]. Later, [`TokenLedger::reduce`] folds the oldest batch
//!   in dispatch order, looking up each action's witnesses in an
//!   [`EvidenceTable`], and commits one transition for the whole batch.
//!
//! Every commit is an optimistic compare-and-swap on [`LedgerState`] and
//! carries a [`TransitionProof`] over the [`Assertion`]s it discharged.

pub mod action;
pub mod auth;
pub mod config;
pub mod error;
pub mod evidence;
pub mod leaf;
pub mod ledger;
pub mod log;
pub mod proof;
pub mod reducer;
pub mod state;
pub mod transfer;

pub use action::{ActionId, PendingAction, Sender, TransferAction};
pub use auth::{SenderAuthorization, Unauthenticated, VerifiedSender};
pub use config::LedgerConfig;
pub use error::LedgerError;
pub use evidence::{assemble_evidence, AssembledEvidence, EvidenceRecord, EvidenceTable};
pub use leaf::{apply_delta, LeafEvidence};
pub use ledger::{MintRequest, ReductionReceipt, TokenLedger, TransferRequest, TransitionReceipt};
pub use log::ActionLog;
pub use proof::{Assertion, ProofSystem, TranscriptProver, TransitionProof, TRANSCRIPT_SYSTEM_ID};
pub use reducer::{reduce, Reduction};
pub use state::{LedgerState, MemoryStateCell, SledStateCell, StateCell};
pub use transfer::Transition;
