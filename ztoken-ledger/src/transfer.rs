//! Transfer protocol: two chained leaf updates, plus the single-leaf mint.
//!
//! A transfer debits the sender under the current root, then credits the
//! receiver under the *post-debit* root. The receiver's witness therefore has
//! to be computed after the debit was applied; a witness taken from the
//! pre-debit root is rejected.

use ztoken_common::{AccountKey, Balance};

use crate::{
    error::LedgerError,
    leaf::{apply_delta, LeafEvidence},
    proof::Assertion,
    state::LedgerState,
};

/// Result of applying one transfer or mint to a ledger state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: LedgerState,
    pub assertions: Vec<Assertion>,
}

/// Move `amount` from `from` to `to`.
///
/// Steps, in order:
/// 1. `amount <= from_leg.balance_before`
/// 2. debit: `root_after_debit = apply_delta(root, from, before, before - amount)`
/// 3. `to_leg.witness` must prove `to_leg.balance_before` under `root_after_debit`
/// 4. credit: `apply_delta(root_after_debit, to, to_before, to_before + amount)`
pub fn transfer(
    state: &LedgerState,
    from: &AccountKey,
    from_leg: &LeafEvidence,
    to: &AccountKey,
    to_leg: &LeafEvidence,
    amount: Balance,
) -> Result<Transition, LedgerError> {
    let available = from_leg.balance_before;
    if amount > available {
        return Err(LedgerError::InsufficientBalance {
            requested: amount,
            available,
        });
    }

    let root_after_debit = apply_delta(
        &state.balances_root,
        from,
        available,
        &from_leg.witness,
        available - amount,
    )?;

    to_leg
        .witness
        .check(&root_after_debit, to, to_leg.balance_before)?;

    let credited = to_leg
        .balance_before
        .checked_add(amount)
        .ok_or(LedgerError::BalanceOverflow(*to))?;
    let new_root = apply_delta(
        &root_after_debit,
        to,
        to_leg.balance_before,
        &to_leg.witness,
        credited,
    )?;

    Ok(Transition {
        state: LedgerState {
            total_supply: state.total_supply,
            balances_root: new_root,
        },
        assertions: vec![
            Assertion::AmountSufficient {
                key: *from,
                amount,
                available,
            },
            Assertion::WitnessMatchesRoot {
                key: *from,
                root: state.balances_root,
                value: available,
            },
            Assertion::ChainedRoot {
                key: *to,
                root_after_debit,
                value: to_leg.balance_before,
            },
        ],
    })
}

/// Credit `amount` of new supply to `to`.
pub fn mint(
    state: &LedgerState,
    to: &AccountKey,
    to_leg: &LeafEvidence,
    amount: Balance,
) -> Result<Transition, LedgerError> {
    let total_supply = state
        .total_supply
        .checked_add(amount)
        .ok_or(LedgerError::SupplyOverflow)?;
    let credited = to_leg
        .balance_before
        .checked_add(amount)
        .ok_or(LedgerError::BalanceOverflow(*to))?;

    let new_root = apply_delta(
        &state.balances_root,
        to,
        to_leg.balance_before,
        &to_leg.witness,
        credited,
    )?;

    Ok(Transition {
        state: LedgerState {
            total_supply,
            balances_root: new_root,
        },
        assertions: vec![
            Assertion::WitnessMatchesRoot {
                key: *to,
                root: state.balances_root,
                value: to_leg.balance_before,
            },
            Assertion::SupplyIncrement {
                before: state.total_supply,
                amount,
                after: total_supply,
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ztoken_map::SparseMerkleMap;

    fn alice() -> AccountKey {
        AccountKey::from_bytes([0xa1; 32])
    }

    fn bob() -> AccountKey {
        AccountKey::from_bytes([0xb0; 32])
    }

    fn funded(balance: Balance) -> (SparseMerkleMap, LedgerState) {
        let mut map = SparseMerkleMap::new();
        map.set(alice(), balance);
        let state = LedgerState {
            total_supply: balance,
            balances_root: map.root(),
        };
        (map, state)
    }

    fn legs(map: &mut SparseMerkleMap, amount: Balance) -> (LeafEvidence, LeafEvidence) {
        let from_before = map.get(&alice());
        let from_leg = LeafEvidence::new(from_before, map.witness(&alice()));
        map.set(alice(), from_before - amount);
        let to_leg = LeafEvidence::new(map.get(&bob()), map.witness(&bob()));
        (from_leg, to_leg)
    }

    #[test]
    fn transfer_moves_balance() {
        let (mut map, state) = funded(1000);
        let (from_leg, to_leg) = legs(&mut map, 100);

        let next = transfer(&state, &alice(), &from_leg, &bob(), &to_leg, 100).unwrap();

        map.set(bob(), 100);
        assert_eq!(next.state.balances_root, map.root());
        assert_eq!(next.state.total_supply, 1000);
        assert_eq!(next.assertions.len(), 3);
    }

    #[test]
    fn credit_is_not_doubled() {
        let (mut map, state) = funded(1000);
        map.set(bob(), 40);
        let state = LedgerState {
            balances_root: map.root(),
            ..state
        };
        let (from_leg, to_leg) = legs(&mut map, 10);

        let next = transfer(&state, &alice(), &from_leg, &bob(), &to_leg, 10).unwrap();

        map.set(bob(), 50);
        assert_eq!(next.state.balances_root, map.root());
    }

    #[test]
    fn overdraft_is_rejected() {
        let (mut map, state) = funded(50);
        let from_leg = LeafEvidence::new(50, map.witness(&alice()));
        let to_leg = LeafEvidence::new(0, map.witness(&bob()));
        map.set(bob(), 0);

        let err = transfer(&state, &alice(), &from_leg, &bob(), &to_leg, 51).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                requested: 51,
                available: 50
            }
        ));
    }

    #[test]
    fn receiver_witness_from_pre_debit_root_is_rejected() {
        let (map, state) = funded(1000);
        let from_leg = LeafEvidence::new(1000, map.witness(&alice()));
        let stale_to = LeafEvidence::new(0, map.witness(&bob()));

        let err = transfer(&state, &alice(), &from_leg, &bob(), &stale_to, 100).unwrap_err();
        assert!(matches!(err, LedgerError::WitnessMismatch(_)));
    }

    #[test]
    fn zero_amount_transfer_keeps_root() {
        let (mut map, state) = funded(10);
        let (from_leg, to_leg) = legs(&mut map, 0);

        let next = transfer(&state, &alice(), &from_leg, &bob(), &to_leg, 0).unwrap();
        assert_eq!(next.state, state);
    }

    #[test]
    fn self_transfer_needs_post_debit_claim() {
        let (map, state) = funded(100);
        let witness = map.witness(&alice());
        let from_leg = LeafEvidence::new(100, witness.clone());

        let same_claim = LeafEvidence::new(100, witness.clone());
        assert!(transfer(&state, &alice(), &from_leg, &alice(), &same_claim, 30).is_err());

        let post_debit = LeafEvidence::new(70, witness);
        let next = transfer(&state, &alice(), &from_leg, &alice(), &post_debit, 30).unwrap();
        assert_eq!(next.state, state);
    }

    #[test]
    fn mint_credits_and_grows_supply() {
        let mut map = SparseMerkleMap::new();
        let state = LedgerState::genesis();
        let leg = LeafEvidence::new(0, map.witness(&alice()));

        let next = mint(&state, &alice(), &leg, 1000).unwrap();

        assert_eq!(next.state.total_supply, 1000);
        assert_eq!(next.state.balances_root, map.set(alice(), 1000));
    }

    #[test]
    fn mint_rejects_supply_overflow() {
        let map = SparseMerkleMap::new();
        let state = LedgerState {
            total_supply: Balance::MAX,
            balances_root: map.root(),
        };
        let leg = LeafEvidence::new(0, map.witness(&alice()));

        assert!(matches!(
            mint(&state, &alice(), &leg, 1),
            Err(LedgerError::SupplyOverflow)
        ));
    }
}
