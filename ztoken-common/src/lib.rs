//! ztoken-common
//!
//! Identifiers and digests shared by every ztoken crate.
//!
//! - [`Digest`]: a 32-byte blake3 commitment (map roots, node hashes, proof commitments)
//! - [`PublicIdentity`]: the public identity of an account holder
//! - [`AccountKey`]: the one-way map key derived from a [`PublicIdentity`]
//!
//! All 32-byte values serialize as `0x`-prefixed hex strings.

use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

/// Token amounts and leaf values.
pub type Balance = u64;

/// Domain tag for deriving account keys from public identities.
pub const ACCOUNT_KEY_DOMAIN: &[u8] = b"ztoken_account_key_v1";

/// 32-byte blake3 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Digest(#[serde(with = "serde_bytes32")] pub [u8; 32]);

impl Digest {
    pub const ZERO: Digest = Digest([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse a 64-char hex string, with or without `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, String> {
        decode_bytes32(s).map(Self)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..18])
    }
}

impl From<blake3::Hash> for Digest {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

/// Public identity of an account holder (an ed25519 public key on the HTTP rail).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicIdentity(#[serde(with = "serde_bytes32")] pub [u8; 32]);

impl PublicIdentity {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the map key for this identity.
    ///
    /// `key = blake3("ztoken_account_key_v1" || identity)`
    pub fn account_key(&self) -> AccountKey {
        let mut hasher = Hasher::new();
        hasher.update(ACCOUNT_KEY_DOMAIN);
        hasher.update(&self.0);
        AccountKey(*hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicIdentity(0x{})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Key of a leaf in the authenticated balance map.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountKey(#[serde(with = "serde_bytes32")] pub [u8; 32]);

impl AccountKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Bit `index` of the key, most significant bit first.
    ///
    /// Bit 0 selects the child directly below the root.
    pub fn bit(&self, index: usize) -> bool {
        let byte = self.0[index / 8];
        (byte >> (7 - (index % 8))) & 1 == 1
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountKey(0x{})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

fn decode_bytes32(s: &str) -> Result<[u8; 32], String> {
    let hex_str = s.strip_prefix("0x").unwrap_or(s);
    if hex_str.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", hex_str.len()));
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hex_str, &mut bytes).map_err(|err| err.to_string())?;
    Ok(bytes)
}

/// Serde module for `[u8; 32]` as `0x`-prefixed hex.
pub mod serde_bytes32 {
    use serde::{de, Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Bytes32Visitor;

        impl de::Visitor<'_> for Bytes32Visitor {
            type Value = [u8; 32];

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a 32-byte hex string (with or without 0x prefix)")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                super::decode_bytes32(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(Bytes32Visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_key_is_deterministic_and_distinct() {
        let alice = PublicIdentity::from_bytes([1u8; 32]);
        let bob = PublicIdentity::from_bytes([2u8; 32]);

        assert_eq!(alice.account_key(), alice.account_key());
        assert_ne!(alice.account_key(), bob.account_key());
        assert_ne!(alice.account_key().as_bytes(), alice.as_bytes());
    }

    #[test]
    fn key_bits_are_msb_first() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0b1000_0001;
        bytes[31] = 0b0000_0001;
        let key = AccountKey::from_bytes(bytes);

        assert!(key.bit(0));
        assert!(!key.bit(1));
        assert!(key.bit(7));
        assert!(!key.bit(254));
        assert!(key.bit(255));
    }

    #[test]
    fn digest_json_is_prefixed_hex() {
        let digest = Digest::from_bytes([0xab; 32]);
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(32)));

        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, digest);
    }

    #[test]
    fn digest_rejects_short_hex() {
        assert!(Digest::from_hex("0xabcd").is_err());
        assert!(serde_json::from_str::<Digest>("\"0x1234\"").is_err());
    }
}
