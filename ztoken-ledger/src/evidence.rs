//! Action-correlation table.
//!
//! Actions are dispatched without witnesses. Before reducing, the caller
//! supplies one [`EvidenceRecord`] per pending action, keyed by action id, with
//! witnesses computed against the state the action will actually see during
//! the fold.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ztoken_map::SparseMerkleMap;

use crate::{
    action::{ActionId, PendingAction, Sender},
    error::LedgerError,
    leaf::LeafEvidence,
};

/// Witnesses needed to apply one pending action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub action_id: ActionId,
    /// Debit leg; required for transfers, ignored for mints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<LeafEvidence>,
    pub to: LeafEvidence,
}

/// Evidence records indexed by action id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<EvidenceRecord>", into = "Vec<EvidenceRecord>")]
pub struct EvidenceTable {
    records: BTreeMap<ActionId, EvidenceRecord>,
}

impl EvidenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(
        records: impl IntoIterator<Item = EvidenceRecord>,
    ) -> Result<Self, LedgerError> {
        let mut table = Self::new();
        for record in records {
            table.insert(record)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, record: EvidenceRecord) -> Result<(), LedgerError> {
        let id = record.action_id;
        if self.records.contains_key(&id) {
            return Err(LedgerError::DuplicateEvidence(id));
        }
        self.records.insert(id, record);
        Ok(())
    }

    /// Record for `id`, or [`LedgerError::MissingEvidence`].
    pub fn find(&self, id: ActionId) -> Result<&EvidenceRecord, LedgerError> {
        self.records
            .get(&id)
            .ok_or(LedgerError::MissingEvidence(id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &EvidenceRecord> {
        self.records.values()
    }
}

impl TryFrom<Vec<EvidenceRecord>> for EvidenceTable {
    type Error = LedgerError;

    fn try_from(records: Vec<EvidenceRecord>) -> Result<Self, Self::Error> {
        Self::from_records(records)
    }
}

impl From<EvidenceTable> for Vec<EvidenceRecord> {
    fn from(table: EvidenceTable) -> Self {
        table.records.into_values().collect()
    }
}

/// Evidence for a batch plus the caller's map as it will look once the
/// batch settles.
#[derive(Clone, Debug)]
pub struct AssembledEvidence {
    pub table: EvidenceTable,
    pub projected: SparseMerkleMap,
}

/// Build evidence for `pending` by replaying it, in order, on a copy of the
/// caller's materialised map.
///
/// `map` must match the committed root. Each record's witnesses are taken
/// from the map state directly before that action, so the records chain the
/// same way the reduction does.
pub fn assemble_evidence(
    map: &SparseMerkleMap,
    pending: &[PendingAction],
) -> Result<AssembledEvidence, LedgerError> {
    let mut projected = map.clone();
    let mut table = EvidenceTable::new();

    for entry in pending {
        let action = &entry.action;
        let from = match action.from {
            Sender::Mint => None,
            Sender::Account(identity) => {
                let key = identity.account_key();
                let before = projected.get(&key);
                if action.amount > before {
                    return Err(LedgerError::InsufficientBalance {
                        requested: action.amount,
                        available: before,
                    });
                }
                let leg = LeafEvidence::new(before, projected.witness(&key));
                projected.set(key, before - action.amount);
                Some(leg)
            }
        };

        let to_key = action.to.account_key();
        let to_before = projected.get(&to_key);
        let to = LeafEvidence::new(to_before, projected.witness(&to_key));
        let credited = to_before
            .checked_add(action.amount)
            .ok_or(LedgerError::BalanceOverflow(to_key))?;
        projected.set(to_key, credited);

        table.insert(EvidenceRecord {
            action_id: entry.id,
            from,
            to,
        })?;
    }

    Ok(AssembledEvidence { table, projected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::TransferAction;
    use ztoken_common::PublicIdentity;

    fn record(id: u64) -> EvidenceRecord {
        let map = SparseMerkleMap::new();
        let key = PublicIdentity::from_bytes([7u8; 32]).account_key();
        EvidenceRecord {
            action_id: ActionId(id),
            from: None,
            to: LeafEvidence::new(0, map.witness(&key)),
        }
    }

    #[test]
    fn find_by_action_id() {
        let table = EvidenceTable::from_records(vec![record(3), record(1)]).unwrap();
        assert_eq!(table.find(ActionId(3)).unwrap().action_id, ActionId(3));
        assert!(matches!(
            table.find(ActionId(2)),
            Err(LedgerError::MissingEvidence(ActionId(2)))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = EvidenceTable::from_records(vec![record(1), record(1)]).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateEvidence(ActionId(1))));
    }

    #[test]
    fn table_serializes_as_list() {
        let table = EvidenceTable::from_records(vec![record(2)]).unwrap();
        let json = serde_json::to_value(&table).unwrap();
        assert!(json.is_array());

        let parsed: EvidenceTable = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn assembly_replays_actions_in_order() {
        let alice = PublicIdentity::from_bytes([0xa1; 32]);
        let bob = PublicIdentity::from_bytes([0xb0; 32]);
        let pending = vec![
            PendingAction {
                id: ActionId(1),
                action: TransferAction::mint(alice, 100),
            },
            PendingAction {
                id: ActionId(2),
                action: TransferAction::transfer(alice, bob, 60),
            },
        ];

        let assembled = assemble_evidence(&SparseMerkleMap::new(), &pending).unwrap();
        let second = assembled.table.find(ActionId(2)).unwrap();

        assert_eq!(second.from.as_ref().unwrap().balance_before, 100);
        assert_eq!(assembled.projected.get(&alice.account_key()), 40);
        assert_eq!(assembled.projected.get(&bob.account_key()), 60);
    }

    #[test]
    fn assembly_reports_overdraft() {
        let alice = PublicIdentity::from_bytes([0xa1; 32]);
        let bob = PublicIdentity::from_bytes([0xb0; 32]);
        let pending = vec![PendingAction {
            id: ActionId(1),
            action: TransferAction::transfer(alice, bob, 1),
        }];

        assert!(matches!(
            assemble_evidence(&SparseMerkleMap::new(), &pending),
            Err(LedgerError::InsufficientBalance { .. })
        ));
    }
}
