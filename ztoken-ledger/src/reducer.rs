//! Reduction engine: folds a pending batch into one state transition.
//!
//! The fold is pure. It reads nothing but its arguments, so a failed
//! reduction retried with the same inputs fails the same way, and the
//! caller decides whether to commit the result.

use ztoken_common::Balance;

use crate::{
    action::{ActionId, PendingAction, Sender},
    error::LedgerError,
    evidence::EvidenceTable,
    proof::Assertion,
    state::LedgerState,
    transfer,
};

/// Outcome of folding a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reduction {
    pub state: LedgerState,
    /// Ids of the folded actions, in settlement order.
    pub settled: Vec<ActionId>,
    pub assertions: Vec<Assertion>,
}

/// Apply `pending` in order to `start`, looking up each action's witnesses in
/// `evidence`.
///
/// Every action sees the running state left by the one before it. Evidence
/// for actions outside `pending` is ignored.
pub fn reduce(
    pending: &[PendingAction],
    evidence: &EvidenceTable,
    start: &LedgerState,
) -> Result<Reduction, LedgerError> {
    let mut acc = *start;
    let mut settled = Vec::with_capacity(pending.len());
    let mut assertions = Vec::new();

    for entry in pending {
        let record = evidence.find(entry.id)?;
        let action = &entry.action;
        let to = action.to.account_key();

        let step = match action.from {
            Sender::Mint => transfer::mint(&acc, &to, &record.to, action.amount),
            Sender::Account(sender) => {
                let from_leg = record
                    .from
                    .as_ref()
                    .ok_or(LedgerError::MissingEvidence(entry.id))?;
                transfer::transfer(
                    &acc,
                    &sender.account_key(),
                    from_leg,
                    &to,
                    &record.to,
                    action.amount,
                )
            }
        };

        let step = step.map_err(|err| {
            tracing::debug!(action = %entry.id, error = %err, "reduction step rejected");
            err
        })?;

        acc = step.state;
        assertions.extend(step.assertions);
        settled.push(entry.id);
    }

    Ok(Reduction {
        state: acc,
        settled,
        assertions,
    })
}

/// Sum of mint amounts in `pending`, or `None` on overflow.
pub fn minted_total(pending: &[PendingAction]) -> Option<Balance> {
    pending
        .iter()
        .filter(|entry| entry.action.is_mint())
        .try_fold(0, |sum: Balance, entry| sum.checked_add(entry.action.amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        action::TransferAction,
        evidence::{assemble_evidence, EvidenceRecord},
    };
    use ztoken_common::PublicIdentity;
    use ztoken_map::SparseMerkleMap;

    fn alice() -> PublicIdentity {
        PublicIdentity::from_bytes([0xa1; 32])
    }

    fn bob() -> PublicIdentity {
        PublicIdentity::from_bytes([0xb0; 32])
    }

    fn batch(actions: Vec<TransferAction>) -> Vec<PendingAction> {
        actions
            .into_iter()
            .enumerate()
            .map(|(i, action)| PendingAction {
                id: ActionId(i as u64 + 1),
                action,
            })
            .collect()
    }

    #[test]
    fn fold_matches_materialised_map() {
        let pending = batch(vec![
            TransferAction::mint(alice(), 500),
            TransferAction::transfer(alice(), bob(), 200),
            TransferAction::transfer(bob(), alice(), 50),
        ]);
        let assembled = assemble_evidence(&SparseMerkleMap::new(), &pending).unwrap();

        let reduction = reduce(&pending, &assembled.table, &LedgerState::genesis()).unwrap();

        assert_eq!(reduction.state.total_supply, 500);
        assert_eq!(reduction.state.balances_root, assembled.projected.root());
        assert_eq!(
            reduction.settled,
            vec![ActionId(1), ActionId(2), ActionId(3)]
        );
    }

    #[test]
    fn missing_record_aborts() {
        let pending = batch(vec![TransferAction::mint(alice(), 1)]);
        let err = reduce(&pending, &EvidenceTable::new(), &LedgerState::genesis()).unwrap_err();
        assert!(matches!(err, LedgerError::MissingEvidence(ActionId(1))));
    }

    #[test]
    fn transfer_without_debit_leg_is_missing_evidence() {
        let map = SparseMerkleMap::new();
        let pending = batch(vec![TransferAction::transfer(alice(), bob(), 0)]);
        let mut table = EvidenceTable::new();
        table
            .insert(EvidenceRecord {
                action_id: ActionId(1),
                from: None,
                to: crate::leaf::LeafEvidence::new(0, map.witness(&bob().account_key())),
            })
            .unwrap();

        let err = reduce(&pending, &table, &LedgerState::genesis()).unwrap_err();
        assert!(matches!(err, LedgerError::MissingEvidence(ActionId(1))));
    }

    #[test]
    fn evidence_for_reordered_batch_is_rejected() {
        let mut map = SparseMerkleMap::new();
        map.set(alice().account_key(), 100);
        let start = LedgerState {
            total_supply: 100,
            balances_root: map.root(),
        };
        let a = TransferAction::transfer(alice(), bob(), 30);
        let b = TransferAction::transfer(alice(), bob(), 20);

        let reordered = vec![
            PendingAction {
                id: ActionId(2),
                action: b,
            },
            PendingAction {
                id: ActionId(1),
                action: a.clone(),
            },
        ];
        let table = assemble_evidence(&map, &reordered).unwrap().table;

        let in_order = batch(vec![a, TransferAction::transfer(alice(), bob(), 20)]);
        let err = reduce(&in_order, &table, &start).unwrap_err();
        assert!(matches!(err, LedgerError::WitnessMismatch(_)));
    }

    #[test]
    fn extra_evidence_is_ignored() {
        let pending = batch(vec![
            TransferAction::mint(alice(), 5),
            TransferAction::mint(bob(), 7),
        ]);
        let assembled = assemble_evidence(&SparseMerkleMap::new(), &pending).unwrap();

        let reduction =
            reduce(&pending[..1], &assembled.table, &LedgerState::genesis()).unwrap();
        assert_eq!(reduction.settled, vec![ActionId(1)]);
        assert_eq!(reduction.state.total_supply, 5);
    }

    #[test]
    fn minted_total_skips_transfers() {
        let pending = batch(vec![
            TransferAction::mint(alice(), 5),
            TransferAction::transfer(alice(), bob(), 3),
            TransferAction::mint(bob(), 7),
        ]);
        assert_eq!(minted_total(&pending), Some(12));
    }
}
