//! Fully materialised sparse Merkle map.
//!
//! This is the caller-side copy of the balance tree. Only non-empty nodes are
//! stored; every missing node is the empty subtree of its height.

use std::collections::{BTreeMap, HashMap};

use ztoken_common::{AccountKey, Balance, Digest};

use crate::{
    hash::{empty_root, empty_subtree, leaf_digest, node_digest, MAP_DEPTH},
    witness::MapWitness,
};

/// Node position: height above the leaves and the key prefix it covers
/// (bits below the height cleared).
type NodeId = (u16, [u8; 32]);

#[derive(Clone, Debug)]
pub struct SparseMerkleMap {
    values: BTreeMap<AccountKey, Balance>,
    nodes: HashMap<NodeId, Digest>,
    root: Digest,
}

impl Default for SparseMerkleMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseMerkleMap {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            nodes: HashMap::new(),
            root: empty_root(),
        }
    }

    pub fn root(&self) -> Digest {
        self.root
    }

    /// Value at `key`; unwritten keys read as zero.
    pub fn get(&self, key: &AccountKey) -> Balance {
        self.values.get(key).copied().unwrap_or(0)
    }

    /// Number of keys holding a non-zero value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Non-zero entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&AccountKey, &Balance)> {
        self.values.iter()
    }

    /// Write `value` at `key` and return the new root.
    pub fn set(&mut self, key: AccountKey, value: Balance) -> Digest {
        if value == 0 {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value);
        }

        let mut current = leaf_digest(value);
        self.store(0, node_prefix(&key, 0), current);

        for height in 0..MAP_DEPTH {
            let sibling = self.node(height, sibling_prefix(&key, height));
            current = if key.bit(MAP_DEPTH - 1 - height) {
                node_digest(&sibling, &current)
            } else {
                node_digest(&current, &sibling)
            };
            self.store(height + 1, node_prefix(&key, height + 1), current);
        }

        self.root = current;
        current
    }

    /// Witness for `key` against the current root.
    pub fn witness(&self, key: &AccountKey) -> MapWitness {
        let siblings: Vec<Digest> = (0..MAP_DEPTH)
            .map(|height| self.node(height, sibling_prefix(key, height)))
            .collect();
        MapWitness::from_path(*key, siblings)
    }

    fn node(&self, height: usize, prefix: [u8; 32]) -> Digest {
        self.nodes
            .get(&(height as u16, prefix))
            .copied()
            .unwrap_or_else(|| empty_subtree(height))
    }

    fn store(&mut self, height: usize, prefix: [u8; 32], digest: Digest) {
        let id = (height as u16, prefix);
        if digest == empty_subtree(height) {
            self.nodes.remove(&id);
        } else {
            self.nodes.insert(id, digest);
        }
    }
}

/// Prefix of the path node at `height`: the leading `MAP_DEPTH - height` key bits.
fn node_prefix(key: &AccountKey, height: usize) -> [u8; 32] {
    let keep = MAP_DEPTH - height;
    let bytes = key.as_bytes();
    let mut out = [0u8; 32];
    let full = keep / 8;
    out[..full].copy_from_slice(&bytes[..full]);
    let rem = keep % 8;
    if rem > 0 {
        out[full] = bytes[full] & (0xffu8 << (8 - rem));
    }
    out
}

/// Prefix of the sibling of the path node at `height`.
fn sibling_prefix(key: &AccountKey, height: usize) -> [u8; 32] {
    let mut prefix = node_prefix(key, height);
    let bit = MAP_DEPTH - 1 - height;
    prefix[bit / 8] ^= 1 << (7 - (bit % 8));
    prefix
}
