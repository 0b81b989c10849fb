//! ztoken-map
//!
//! Authenticated balance map: a fixed-depth sparse Merkle tree keyed by
//! [`AccountKey`](ztoken_common::AccountKey).
//!
//! # Tree Model
//!
//! ```text
//! depth       = 256                     (one level per key bit, MSB first)
//! leaf(0)     = 0x00..00                (unwritten and zero leaves are identical)
//! leaf(v)     = blake3("ztoken_map_leaf_v1" || v_be)
//! node(l, r)  = blake3("ztoken_map_node_v1" || l || r)
//! ```
//!
//! Ledger code only ever holds a root plus a [`MapWitness`] for the key being
//! written. [`SparseMerkleMap`] is the fully materialised map that callers keep
//! off-ledger to produce those witnesses.

pub mod error;
pub mod hash;
pub mod map;
pub mod witness;

pub use error::MapError;
pub use hash::{empty_root, leaf_digest, node_digest, MAP_DEPTH};
pub use map::SparseMerkleMap;
pub use witness::{update, verify, MapWitness};
