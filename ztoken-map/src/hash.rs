//! Leaf and node hashing for the balance tree.

use blake3::Hasher;
use once_cell::sync::Lazy;
use ztoken_common::{Balance, Digest};

/// Number of levels between a leaf and the root.
pub const MAP_DEPTH: usize = 256;

const LEAF_DOMAIN: &[u8] = b"ztoken_map_leaf_v1";
const NODE_DOMAIN: &[u8] = b"ztoken_map_node_v1";

/// `EMPTY_SUBTREES[h]` is the root of an empty subtree of height `h`.
static EMPTY_SUBTREES: Lazy<Vec<Digest>> = Lazy::new(|| {
    let mut digests = Vec::with_capacity(MAP_DEPTH + 1);
    digests.push(Digest::ZERO);
    for height in 0..MAP_DEPTH {
        let below = digests[height];
        digests.push(node_digest(&below, &below));
    }
    digests
});

/// Digest of a leaf holding `value`. Zero maps to the empty leaf.
pub fn leaf_digest(value: Balance) -> Digest {
    if value == 0 {
        return Digest::ZERO;
    }
    let mut hasher = Hasher::new();
    hasher.update(LEAF_DOMAIN);
    hasher.update(&value.to_be_bytes());
    hasher.finalize().into()
}

pub fn node_digest(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Hasher::new();
    hasher.update(NODE_DOMAIN);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hasher.finalize().into()
}

/// Root of an empty subtree of the given height (0 = leaf).
pub fn empty_subtree(height: usize) -> Digest {
    EMPTY_SUBTREES[height]
}

/// Root of the map with no written leaves.
pub fn empty_root() -> Digest {
    EMPTY_SUBTREES[MAP_DEPTH]
}
