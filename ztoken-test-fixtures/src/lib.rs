//! Deterministic parties and a caller-side ledger mirror shared by tests.
//!
//! The ledger only ever sees roots and witnesses. Tests play the caller: they
//! keep the full balance map in a [`LedgerMirror`], derive witnesses from it,
//! and update it after each commit.

use anyhow::{anyhow, ensure, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use once_cell::sync::Lazy;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use ztoken_common::{Balance, PublicIdentity};
use ztoken_ledger::{
    assemble_evidence, reducer::minted_total, EvidenceTable, LeafEvidence, LedgerState,
    MintRequest, PendingAction, TransferRequest,
};
use ztoken_map::SparseMerkleMap;

const PARTY_SEED_DOMAIN: &[u8] = b"ztoken_test_party_v1";

/// A named key holder with a deterministic ed25519 key.
pub struct Party {
    pub name: &'static str,
    signing_key: SigningKey,
}

impl Party {
    /// Same `name`, same key, on every run.
    pub fn new(name: &'static str) -> Self {
        let seed = blake3::keyed_hash(
            blake3::hash(PARTY_SEED_DOMAIN).as_bytes(),
            name.as_bytes(),
        );
        let mut rng = ChaCha20Rng::from_seed(*seed.as_bytes());
        let mut secret = [0u8; 32];
        rng.fill_bytes(&mut secret);
        Self {
            name,
            signing_key: SigningKey::from_bytes(&secret),
        }
    }

    pub fn identity(&self) -> PublicIdentity {
        PublicIdentity::from_bytes(self.verifying_key().to_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

static ALICE: Lazy<Party> = Lazy::new(|| Party::new("alice"));
static BOB: Lazy<Party> = Lazy::new(|| Party::new("bob"));
static CAROL: Lazy<Party> = Lazy::new(|| Party::new("carol"));

pub fn alice() -> &'static Party {
    &ALICE
}

pub fn bob() -> &'static Party {
    &BOB
}

pub fn carol() -> &'static Party {
    &CAROL
}

/// Caller-side copy of the full ledger contents.
#[derive(Clone, Debug, Default)]
pub struct LedgerMirror {
    map: SparseMerkleMap,
    total_supply: Balance,
}

impl LedgerMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state the ledger should have committed.
    pub fn state(&self) -> LedgerState {
        LedgerState {
            total_supply: self.total_supply,
            balances_root: self.map.root(),
        }
    }

    pub fn balance(&self, who: &PublicIdentity) -> Balance {
        self.map.get(&who.account_key())
    }

    pub fn map(&self) -> &SparseMerkleMap {
        &self.map
    }

    /// Witnessed mint request against the current root.
    pub fn mint_request(&self, to: &PublicIdentity, amount: Balance) -> MintRequest {
        let key = to.account_key();
        MintRequest {
            expected_root: self.map.root(),
            to: *to,
            to_leg: LeafEvidence::new(self.map.get(&key), self.map.witness(&key)),
            amount,
        }
    }

    /// Witnessed transfer request; the receiver leg is taken after the debit.
    pub fn transfer_request(
        &self,
        from: &PublicIdentity,
        to: &PublicIdentity,
        amount: Balance,
    ) -> Result<TransferRequest> {
        let from_key = from.account_key();
        let to_key = to.account_key();
        let before = self.map.get(&from_key);
        ensure!(amount <= before, "{amount} exceeds balance {before}");

        let from_leg = LeafEvidence::new(before, self.map.witness(&from_key));
        let mut debited = self.map.clone();
        debited.set(from_key, before - amount);
        let to_leg = LeafEvidence::new(debited.get(&to_key), debited.witness(&to_key));

        Ok(TransferRequest {
            expected_root: self.map.root(),
            from: *from,
            from_leg,
            to: *to,
            to_leg,
            amount,
        })
    }

    /// Record a committed mint.
    pub fn apply_mint(&mut self, to: &PublicIdentity, amount: Balance) -> Result<()> {
        let key = to.account_key();
        let credited = self
            .map
            .get(&key)
            .checked_add(amount)
            .ok_or_else(|| anyhow!("balance overflow"))?;
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| anyhow!("supply overflow"))?;
        self.map.set(key, credited);
        Ok(())
    }

    /// Record a committed transfer.
    pub fn apply_transfer(
        &mut self,
        from: &PublicIdentity,
        to: &PublicIdentity,
        amount: Balance,
    ) -> Result<()> {
        let from_key = from.account_key();
        let before = self.map.get(&from_key);
        ensure!(amount <= before, "{amount} exceeds balance {before}");
        self.map.set(from_key, before - amount);

        let to_key = to.account_key();
        let credited = self
            .map
            .get(&to_key)
            .checked_add(amount)
            .ok_or_else(|| anyhow!("balance overflow"))?;
        self.map.set(to_key, credited);
        Ok(())
    }

    /// Evidence for settling `pending` from the current state.
    pub fn evidence_for(&self, pending: &[PendingAction]) -> Result<EvidenceTable> {
        Ok(assemble_evidence(&self.map, pending)?.table)
    }

    /// Record a committed reduction of `settled`.
    pub fn apply_pending(&mut self, settled: &[PendingAction]) -> Result<()> {
        let assembled = assemble_evidence(&self.map, settled)?;
        let minted = minted_total(settled).ok_or_else(|| anyhow!("supply overflow"))?;
        self.total_supply = self
            .total_supply
            .checked_add(minted)
            .ok_or_else(|| anyhow!("supply overflow"))?;
        self.map = assembled.projected;
        Ok(())
    }
}
