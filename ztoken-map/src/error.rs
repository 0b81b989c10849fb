//! Error types for the authenticated map.

use thiserror::Error;
use ztoken_common::{AccountKey, Digest};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// The witness does not recompute the expected root for the claimed value.
    #[error("witness for {key} recomputes {computed}, expected root {expected}")]
    WitnessMismatch {
        key: AccountKey,
        expected: Digest,
        computed: Digest,
    },

    /// The witness was built for a different key.
    #[error("witness is bound to {witness_key}, not {expected}")]
    KeyMismatch {
        witness_key: AccountKey,
        expected: AccountKey,
    },

    /// Sibling path length differs from the map depth.
    #[error("witness has {actual} siblings, expected {expected}")]
    InvalidWitnessLength { expected: usize, actual: usize },
}
