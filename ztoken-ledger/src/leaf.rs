//! Leaf-update verifier.

use serde::{Deserialize, Serialize};
use ztoken_common::{AccountKey, Balance, Digest};
use ztoken_map::MapWitness;

use crate::error::LedgerError;

/// A claimed leaf value together with the witness proving it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafEvidence {
    pub balance_before: Balance,
    pub witness: MapWitness,
}

impl LeafEvidence {
    pub fn new(balance_before: Balance, witness: MapWitness) -> Self {
        Self {
            balance_before,
            witness,
        }
    }
}

/// Rewrite the leaf at `key` from `before` to `after` under `root`.
///
/// Fails with [`LedgerError::WitnessMismatch`] unless `witness` is bound to
/// `key` and recomputes `root` for `before`. No amount rules are applied here.
pub fn apply_delta(
    root: &Digest,
    key: &AccountKey,
    before: Balance,
    witness: &MapWitness,
    after: Balance,
) -> Result<Digest, LedgerError> {
    Ok(ztoken_map::update(root, key, before, after, witness)?)
}
