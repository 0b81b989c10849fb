//! Assertions discharged by a state transition and the commit-and-prove seam.
//!
//! The ledger only states *what* must hold for a transition to be accepted.
//! A [`ProofSystem`] turns that list into a [`TransitionProof`] and checks it
//! later; how is up to the implementation.

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use ztoken_common::{AccountKey, Balance, Digest};

use crate::{error::LedgerError, state::LedgerState};

const TRANSCRIPT_DOMAIN: &[u8] = b"ztoken_transition_transcript_v1";

/// Identifier of the built-in transcript proof system.
pub const TRANSCRIPT_SYSTEM_ID: &str = "ZTOKEN_TRANSCRIPT_V1";

/// A fact checked while computing a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "assertion", rename_all = "snake_case")]
pub enum Assertion {
    /// `value` at `key` is consistent with `root`.
    WitnessMatchesRoot {
        key: AccountKey,
        root: Digest,
        value: Balance,
    },
    /// The debit does not exceed the sender's balance.
    AmountSufficient {
        key: AccountKey,
        amount: Balance,
        available: Balance,
    },
    /// The receiver's witness is valid against the post-debit root.
    ChainedRoot {
        key: AccountKey,
        root_after_debit: Digest,
        value: Balance,
    },
    /// Total supply grew by exactly the minted amount.
    SupplyIncrement {
        before: Balance,
        amount: Balance,
        after: Balance,
    },
    /// The committed state moved from `before` to `after`.
    StateTransition {
        before: LedgerState,
        after: LedgerState,
    },
}

/// Proof over an ordered list of assertions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionProof {
    pub system_id: String,
    pub assertion_count: u32,
    pub commitment: Digest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proof_bytes: Vec<u8>,
}

/// Commit-and-prove capability consumed by the ledger.
pub trait ProofSystem: Send + Sync {
    fn emit_proof(&self, assertions: &[Assertion]) -> Result<TransitionProof, LedgerError>;

    fn verify_proof(&self, proof: &TransitionProof, assertions: &[Assertion]) -> bool;
}

/// Binds a proof to its assertions with a blake3 transcript commitment.
///
/// This attests the exact assertion list a transition discharged; it carries
/// no zero-knowledge and is intended for development and auditing.
#[derive(Clone, Copy, Debug, Default)]
pub struct TranscriptProver;

impl TranscriptProver {
    fn commit(assertions: &[Assertion]) -> Result<Digest, LedgerError> {
        let mut hasher = Hasher::new();
        hasher.update(TRANSCRIPT_DOMAIN);
        hasher.update(&(assertions.len() as u64).to_be_bytes());
        for assertion in assertions {
            let encoded =
                serde_json::to_vec(assertion).map_err(|err| LedgerError::Proof(err.to_string()))?;
            hasher.update(&(encoded.len() as u64).to_be_bytes());
            hasher.update(&encoded);
        }
        Ok(hasher.finalize().into())
    }
}

impl ProofSystem for TranscriptProver {
    fn emit_proof(&self, assertions: &[Assertion]) -> Result<TransitionProof, LedgerError> {
        let assertion_count = u32::try_from(assertions.len())
            .map_err(|_| LedgerError::Proof("too many assertions".into()))?;
        Ok(TransitionProof {
            system_id: TRANSCRIPT_SYSTEM_ID.to_string(),
            assertion_count,
            commitment: Self::commit(assertions)?,
            proof_bytes: Vec::new(),
        })
    }

    fn verify_proof(&self, proof: &TransitionProof, assertions: &[Assertion]) -> bool {
        if proof.system_id != TRANSCRIPT_SYSTEM_ID
            || proof.assertion_count as usize != assertions.len()
        {
            return false;
        }
        matches!(Self::commit(assertions), Ok(commitment) if commitment == proof.commitment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Assertion> {
        vec![
            Assertion::SupplyIncrement {
                before: 0,
                amount: 10,
                after: 10,
            },
            Assertion::StateTransition {
                before: LedgerState::genesis(),
                after: LedgerState {
                    total_supply: 10,
                    balances_root: Digest::from_bytes([1u8; 32]),
                },
            },
        ]
    }

    #[test]
    fn transcript_proof_verifies_its_assertions() {
        let prover = TranscriptProver;
        let assertions = sample();
        let proof = prover.emit_proof(&assertions).unwrap();

        assert_eq!(proof.assertion_count, 2);
        assert!(prover.verify_proof(&proof, &assertions));
    }

    #[test]
    fn transcript_proof_rejects_tampered_assertions() {
        let prover = TranscriptProver;
        let mut assertions = sample();
        let proof = prover.emit_proof(&assertions).unwrap();

        assertions[0] = Assertion::SupplyIncrement {
            before: 0,
            amount: 11,
            after: 11,
        };
        assert!(!prover.verify_proof(&proof, &assertions));

        assertions.reverse();
        assert!(!prover.verify_proof(&proof, &assertions));
    }
}
