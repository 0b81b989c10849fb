//! Ed25519 sender authorization and the dispatch replay guard.
//!
//! A caller proves it may spend as `from` by signing a canonical message with
//! the ed25519 key whose public half *is* the identity. Every signed message
//! carries a per-sender nonce that must strictly increase, so a signature
//! cannot be replayed even when the root returns to an earlier value.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use ed25519_dalek::{Signature, VerifyingKey};
use ztoken_common::{Balance, Digest, PublicIdentity};
use ztoken_ledger::SenderAuthorization;

use crate::error::RailError;

const TRANSFER_DOMAIN: &str = "ztoken-rails-transfer-v1";
const DISPATCH_DOMAIN: &str = "ztoken-rails-dispatch-v1";

/// Message signed for a synchronous transfer.
pub fn transfer_message(
    nonce: u64,
    expected_root: &Digest,
    from: &PublicIdentity,
    to: &PublicIdentity,
    amount: Balance,
) -> String {
    format!("{TRANSFER_DOMAIN}\nnonce:{nonce}\nroot:{expected_root}\nfrom:{from}\nto:{to}\namount:{amount}")
}

/// Message signed for a deferred transfer dispatch.
pub fn dispatch_message(
    nonce: u64,
    from: &PublicIdentity,
    to: &PublicIdentity,
    amount: Balance,
) -> String {
    format!("{DISPATCH_DOMAIN}\nnonce:{nonce}\nfrom:{from}\nto:{to}\namount:{amount}")
}

/// Parse a hex-encoded (optionally `0x`-prefixed) 64-byte signature.
pub fn parse_signature(signature_hex: &str) -> Result<Signature, RailError> {
    let raw = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let bytes = hex::decode(raw)
        .map_err(|err| RailError::InvalidSignature(format!("signature is not hex: {err}")))?;
    Signature::from_slice(&bytes).map_err(|_| {
        RailError::InvalidSignature(format!("expected 64 signature bytes, got {}", bytes.len()))
    })
}

/// Confirms a claimed identity when `signature` verifies over `message`
/// under that identity's ed25519 key.
pub struct SignatureAuthorization {
    message: Vec<u8>,
    signature: Signature,
}

impl SignatureAuthorization {
    pub fn new(message: impl Into<Vec<u8>>, signature: Signature) -> Self {
        Self {
            message: message.into(),
            signature,
        }
    }
}

impl SenderAuthorization for SignatureAuthorization {
    fn verified_sender_authorization(&self, claimed: &PublicIdentity) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(claimed.as_bytes()) else {
            tracing::debug!("claimed identity {claimed} is not an ed25519 key");
            return false;
        };
        match key.verify_strict(&self.message, &self.signature) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!("signature rejected for {claimed}: {err}");
                false
            }
        }
    }
}

/// Highest nonce accepted per sender, shared by transfers and dispatches.
#[derive(Debug, Default)]
pub struct NonceGuard {
    seen: Mutex<HashMap<PublicIdentity, u64>>,
}

impl NonceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` under `nonce` for `sender`.
    ///
    /// The nonce must exceed every nonce accepted before. It is recorded only
    /// if `op` succeeds; the guard stays locked while `op` runs, so two
    /// requests carrying the same nonce cannot both get through.
    pub fn consume<T, E>(
        &self,
        sender: &PublicIdentity,
        nonce: u64,
        op: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<RailError>,
    {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&last) = seen.get(sender) {
            if nonce <= last {
                return Err(RailError::ReplayedNonce { last, got: nonce }.into());
            }
        }
        let out = op()?;
        seen.insert(*sender, nonce);
        Ok(out)
    }

    pub fn last(&self, sender: &PublicIdentity) -> Option<u64> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sender)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ztoken_test_fixtures::{alice, bob};

    #[test]
    fn signature_confirms_only_the_signer() {
        let (a, b) = (alice().identity(), bob().identity());
        let message = dispatch_message(1, &a, &b, 10);
        let auth = SignatureAuthorization::new(message.clone(), alice().sign(message.as_bytes()));

        assert!(auth.verified_sender_authorization(&a));
        assert!(!auth.verified_sender_authorization(&b));
    }

    #[test]
    fn signature_is_bound_to_message() {
        let (a, b) = (alice().identity(), bob().identity());
        let signed = dispatch_message(1, &a, &b, 10);
        let signature = alice().sign(signed.as_bytes());

        let tampered = SignatureAuthorization::new(dispatch_message(1, &a, &b, 11), signature);
        assert!(!tampered.verified_sender_authorization(&a));
    }

    #[test]
    fn parse_signature_accepts_prefixed_hex() {
        let signature = alice().sign(b"hello");
        let encoded = format!("0x{}", hex::encode(signature.to_bytes()));
        assert_eq!(parse_signature(&encoded).unwrap(), signature);
        assert!(matches!(
            parse_signature("abcd"),
            Err(RailError::InvalidSignature(_))
        ));
    }

    fn accept(guard: &NonceGuard, sender: &PublicIdentity, nonce: u64) -> Result<(), RailError> {
        guard.consume(sender, nonce, || Ok(()))
    }

    #[test]
    fn nonces_must_increase() {
        let guard = NonceGuard::new();
        let a = alice().identity();

        accept(&guard, &a, 1).unwrap();
        accept(&guard, &a, 5).unwrap();
        assert!(matches!(
            accept(&guard, &a, 5),
            Err(RailError::ReplayedNonce { last: 5, got: 5 })
        ));
        assert!(accept(&guard, &a, 2).is_err());
        assert_eq!(guard.last(&a), Some(5));

        accept(&guard, &bob().identity(), 1).unwrap();
    }

    #[test]
    fn failed_operation_leaves_nonce_unused() {
        let guard = NonceGuard::new();
        let a = alice().identity();

        let failed: Result<(), RailError> = guard.consume(&a, 3, || {
            Err(RailError::InvalidSignature("rejected".into()))
        });
        assert!(failed.is_err());
        assert_eq!(guard.last(&a), None);

        accept(&guard, &a, 3).unwrap();
        assert_eq!(guard.last(&a), Some(3));
    }

    #[test]
    fn transfer_message_binds_nonce() {
        let (a, b) = (alice().identity(), bob().identity());
        let root = Digest::ZERO;
        assert_ne!(
            transfer_message(1, &root, &a, &b, 10),
            transfer_message(2, &root, &a, &b, 10)
        );
    }
}
