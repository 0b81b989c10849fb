//! The token ledger: synchronous mint/transfer, deferred dispatch and
//! batch reduction over one committed [`LedgerState`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ztoken_common::{Balance, Digest, PublicIdentity};

use crate::{
    action::{ActionId, PendingAction, Sender, TransferAction},
    auth::SenderAuthorization,
    config::LedgerConfig,
    error::LedgerError,
    evidence::EvidenceTable,
    leaf::LeafEvidence,
    log::ActionLog,
    proof::{Assertion, ProofSystem, TranscriptProver, TransitionProof},
    reducer,
    state::{LedgerState, MemoryStateCell, SledStateCell, StateCell},
    transfer::{self, Transition},
};

/// Synchronous mint with caller-supplied witness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    /// Root the witness was computed against.
    pub expected_root: Digest,
    pub to: PublicIdentity,
    pub to_leg: LeafEvidence,
    pub amount: Balance,
}

/// Synchronous transfer with caller-supplied witnesses.
///
/// `to_leg` must be computed against the root left by the debit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub expected_root: Digest,
    pub from: PublicIdentity,
    pub from_leg: LeafEvidence,
    pub to: PublicIdentity,
    pub to_leg: LeafEvidence,
    pub amount: Balance,
}

/// A committed state transition and its proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionReceipt {
    pub before: LedgerState,
    pub after: LedgerState,
    pub assertions: Vec<Assertion>,
    pub proof: TransitionProof,
}

/// Outcome of [`TokenLedger::reduce`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionReceipt {
    /// Actions settled and removed from the log, in order.
    pub settled: Vec<ActionId>,
    /// Actions still pending after this reduction.
    pub remaining: usize,
    /// `None` when there was nothing to reduce.
    pub transition: Option<TransitionReceipt>,
}

pub struct TokenLedger {
    config: LedgerConfig,
    cell: Arc<dyn StateCell>,
    log: ActionLog,
    prover: Arc<dyn ProofSystem>,
}

impl TokenLedger {
    /// Genesis ledger held in memory, proving with [`TranscriptProver`].
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::with_components(
            config,
            Arc::new(MemoryStateCell::new(LedgerState::genesis())),
            Arc::new(TranscriptProver),
        )
    }

    pub fn with_components(
        config: LedgerConfig,
        cell: Arc<dyn StateCell>,
        prover: Arc<dyn ProofSystem>,
    ) -> Self {
        let log = ActionLog::new(config.max_pending_actions);
        Self {
            config,
            cell,
            log,
            prover,
        }
    }

    /// Open the ledger described by `config`: sled-backed when a state
    /// database is configured, in memory otherwise.
    pub fn from_config(config: LedgerConfig) -> Result<Self, LedgerError> {
        match config.state_db_path.clone() {
            Some(path) => {
                let cell = SledStateCell::open(&path)?;
                tracing::info!("ledger state opened at {}", path.display());
                Ok(Self::with_components(
                    config,
                    Arc::new(cell),
                    Arc::new(TranscriptProver),
                ))
            }
            None => Ok(Self::in_memory(config)),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Currently committed state.
    pub fn state(&self) -> Result<LedgerState, LedgerError> {
        self.cell.read()
    }

    /// Mint directly against the committed root.
    pub fn mint(&self, req: &MintRequest) -> Result<TransitionReceipt, LedgerError> {
        let before = self.read_expecting(&req.expected_root)?;
        let transition = transfer::mint(&before, &req.to.account_key(), &req.to_leg, req.amount)?;
        let receipt = self.commit(before, transition)?;
        tracing::info!(
            amount = req.amount,
            supply = receipt.after.total_supply,
            "mint committed"
        );
        Ok(receipt)
    }

    /// Transfer directly against the committed root.
    pub fn transfer(
        &self,
        auth: &dyn SenderAuthorization,
        req: &TransferRequest,
    ) -> Result<TransitionReceipt, LedgerError> {
        if !auth.verified_sender_authorization(&req.from) {
            return Err(LedgerError::UnauthorizedSender(req.from));
        }
        let before = self.read_expecting(&req.expected_root)?;
        let transition = transfer::transfer(
            &before,
            &req.from.account_key(),
            &req.from_leg,
            &req.to.account_key(),
            &req.to_leg,
            req.amount,
        )?;
        let receipt = self.commit(before, transition)?;
        tracing::info!(amount = req.amount, "transfer committed");
        Ok(receipt)
    }

    /// Queue `action` without touching the root.
    ///
    /// Transfers need `auth` to confirm the sender; mints need no check.
    pub fn dispatch(
        &self,
        auth: &dyn SenderAuthorization,
        action: TransferAction,
    ) -> Result<ActionId, LedgerError> {
        if let Sender::Account(sender) = action.from {
            if !auth.verified_sender_authorization(&sender) {
                return Err(LedgerError::UnauthorizedSender(sender));
            }
        }
        let id = self.log.append(action)?;
        tracing::debug!(action = %id, "action dispatched");
        Ok(id)
    }

    pub fn dispatch_mint(&self, to: PublicIdentity, amount: Balance) -> Result<ActionId, LedgerError> {
        let id = self.log.append(TransferAction::mint(to, amount))?;
        tracing::debug!(action = %id, "mint dispatched");
        Ok(id)
    }

    pub fn dispatch_transfer(
        &self,
        auth: &dyn SenderAuthorization,
        from: PublicIdentity,
        to: PublicIdentity,
        amount: Balance,
    ) -> Result<ActionId, LedgerError> {
        self.dispatch(auth, TransferAction::transfer(from, to, amount))
    }

    /// The batch the next reduction will settle, oldest first.
    pub fn pending_actions(&self) -> Vec<PendingAction> {
        self.log.pending(self.config.max_actions_per_reduce)
    }

    /// Number of actions waiting in the log.
    pub fn pending_len(&self) -> usize {
        self.log.len()
    }

    /// Settle the next batch of pending actions.
    ///
    /// Folds up to `max_actions_per_reduce` actions against the committed
    /// state, then commits the result and removes exactly those actions from
    /// the log. On any error the root, supply and log are unchanged.
    pub fn reduce(
        &self,
        expected_root: Digest,
        evidence: &EvidenceTable,
    ) -> Result<ReductionReceipt, LedgerError> {
        let before = self.read_expecting(&expected_root)?;
        let batch = self.log.pending(self.config.max_actions_per_reduce);
        if batch.is_empty() {
            return Ok(ReductionReceipt {
                settled: Vec::new(),
                remaining: self.log.len(),
                transition: None,
            });
        }

        let reduction = reducer::reduce(&batch, evidence, &before)?;
        let mut assertions = reduction.assertions;
        assertions.push(Assertion::StateTransition {
            before,
            after: reduction.state,
        });
        let proof = self.prover.emit_proof(&assertions)?;

        let mut entries = self.log.lock();
        if !entries.starts_with(&reduction.settled) {
            return Err(LedgerError::LogChanged);
        }
        self.cell.compare_and_swap(&before, &reduction.state)?;
        entries.drain_front(reduction.settled.len());
        let remaining = entries.len();
        drop(entries);

        tracing::info!(
            settled = reduction.settled.len(),
            remaining,
            root = %reduction.state.balances_root,
            "reduction committed"
        );

        Ok(ReductionReceipt {
            settled: reduction.settled,
            remaining,
            transition: Some(TransitionReceipt {
                before,
                after: reduction.state,
                assertions,
                proof,
            }),
        })
    }

    /// Check a receipt's proof with this ledger's proof system.
    pub fn verify_receipt(&self, receipt: &TransitionReceipt) -> bool {
        let closes_chain = matches!(
            receipt.assertions.last(),
            Some(Assertion::StateTransition { before, after })
                if *before == receipt.before && *after == receipt.after
        );
        closes_chain && self.prover.verify_proof(&receipt.proof, &receipt.assertions)
    }

    fn read_expecting(&self, expected_root: &Digest) -> Result<LedgerState, LedgerError> {
        let current = self.cell.read()?;
        if current.balances_root != *expected_root {
            return Err(LedgerError::StaleRoot {
                expected: *expected_root,
                current: current.balances_root,
            });
        }
        Ok(current)
    }

    fn commit(
        &self,
        before: LedgerState,
        transition: Transition,
    ) -> Result<TransitionReceipt, LedgerError> {
        let after = transition.state;
        let mut assertions = transition.assertions;
        assertions.push(Assertion::StateTransition { before, after });
        let proof = self.prover.emit_proof(&assertions)?;
        self.cell.compare_and_swap(&before, &after)?;
        Ok(TransitionReceipt {
            before,
            after,
            assertions,
            proof,
        })
    }
}

impl std::fmt::Debug for TokenLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLedger")
            .field("config", &self.config)
            .field("pending", &self.log.len())
            .finish_non_exhaustive()
    }
}
