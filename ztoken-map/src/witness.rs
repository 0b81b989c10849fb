//! Single-key inclusion witnesses.
//!
//! A [`MapWitness`] carries the key it was built for and the sibling digests
//! from the leaf up to the root. Given a value, it recomputes the root the
//! map would have with that value at the key and every other leaf unchanged.
//! That one operation serves both as the membership check for the current
//! value and as the root rewrite for the next one.

use serde::{Deserialize, Serialize};
use ztoken_common::{AccountKey, Balance, Digest};

use crate::{
    error::MapError,
    hash::{leaf_digest, node_digest, MAP_DEPTH},
};

/// Sibling path for one key.
///
/// `siblings[h]` is the sibling of the path node at height `h` (0 = leaf level).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WitnessRepr")]
pub struct MapWitness {
    key: AccountKey,
    siblings: Vec<Digest>,
}

#[derive(Deserialize)]
struct WitnessRepr {
    key: AccountKey,
    siblings: Vec<Digest>,
}

impl TryFrom<WitnessRepr> for MapWitness {
    type Error = MapError;

    fn try_from(repr: WitnessRepr) -> Result<Self, Self::Error> {
        MapWitness::new(repr.key, repr.siblings)
    }
}

impl MapWitness {
    pub fn new(key: AccountKey, siblings: Vec<Digest>) -> Result<Self, MapError> {
        if siblings.len() != MAP_DEPTH {
            return Err(MapError::InvalidWitnessLength {
                expected: MAP_DEPTH,
                actual: siblings.len(),
            });
        }
        Ok(Self { key, siblings })
    }

    /// Sibling paths built by [`SparseMerkleMap`](crate::SparseMerkleMap) always have full depth.
    pub(crate) fn from_path(key: AccountKey, siblings: Vec<Digest>) -> Self {
        debug_assert_eq!(siblings.len(), MAP_DEPTH);
        Self { key, siblings }
    }

    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    pub fn siblings(&self) -> &[Digest] {
        &self.siblings
    }

    /// Root of the map with `value` written at this witness's key.
    pub fn recompute_root(&self, value: Balance) -> Digest {
        let mut current = leaf_digest(value);
        for (height, sibling) in self.siblings.iter().enumerate() {
            current = if self.key.bit(MAP_DEPTH - 1 - height) {
                node_digest(sibling, &current)
            } else {
                node_digest(&current, sibling)
            };
        }
        current
    }

    /// Check that this witness is bound to `key` and that `claimed` is the
    /// value at that key under `root`.
    pub fn check(&self, root: &Digest, key: &AccountKey, claimed: Balance) -> Result<(), MapError> {
        if self.key != *key {
            return Err(MapError::KeyMismatch {
                witness_key: self.key,
                expected: *key,
            });
        }
        let computed = self.recompute_root(claimed);
        if computed != *root {
            return Err(MapError::WitnessMismatch {
                key: *key,
                expected: *root,
                computed,
            });
        }
        Ok(())
    }
}

/// `true` when `witness` proves `claimed` is stored at `key` under `root`.
pub fn verify(root: &Digest, key: &AccountKey, claimed: Balance, witness: &MapWitness) -> bool {
    witness.check(root, key, claimed).is_ok()
}

/// Write `new_value` at `key` and return the resulting root.
///
/// The witness must prove `claimed` against `root` first; nothing is computed
/// for the new value otherwise.
pub fn update(
    root: &Digest,
    key: &AccountKey,
    claimed: Balance,
    new_value: Balance,
    witness: &MapWitness,
) -> Result<Digest, MapError> {
    witness.check(root, key, claimed)?;
    Ok(witness.recompute_root(new_value))
}
