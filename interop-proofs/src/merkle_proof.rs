use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Hash of an empty subtree
pub const EMPTY_HASH: [u8; 32] = [0u8; 32];

/// Depth of the tree, one level per bit of a state key
const DEPTH: usize = 256;

/// Sparse Merkle tree over the key/value state of a ledger
///
/// Every `(namespace, key)` pair maps to a fixed 256-bit path:
/// 1. Empty subtrees hash to `EMPTY_HASH` and are never stored
/// 2. Leaves are stored at the end of their full path, so the same sibling
///    lookup serves insertion, removal and proof generation
/// 3. A proof for an absent key is a proof that its leaf is empty
#[derive(Debug, Clone, Default)]
pub struct MerkleTree {
    /// The root hash of the tree
    root: [u8; 32],

    /// Map from state key to its leaf hash
    leaves: HashMap<[u8; 32], [u8; 32]>,

    /// Map from node positions to their non-empty hashes
    nodes: BTreeMap<Vec<bool>, [u8; 32]>,
}

/// Proof that a state key holds a given leaf, possibly the empty one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Hashed state key
    pub key: [u8; 32],

    /// Leaf at the key, `EMPTY_HASH` when the key is absent
    pub leaf_hash: [u8; 32],

    /// Sibling hashes from the leaf level up to the root, `None` for empty subtrees
    pub siblings: Vec<Option<[u8; 32]>>,
}

/// Convert a key to a path in the tree, most significant bit first
fn key_to_path(key: &[u8; 32]) -> Vec<bool> {
    let mut path = Vec::with_capacity(DEPTH);
    for &byte in key {
        for i in 0..8 {
            path.push(((byte >> (7 - i)) & 1) == 1);
        }
    }
    path
}

fn sibling_path(path: &[bool], level: usize) -> Vec<bool> {
    let mut sibling = path[..level].to_vec();
    sibling.push(!path[level]);
    sibling
}

/// Hash an internal node from its left and right children
fn hash_internal_node(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    if left == &EMPTY_HASH && right == &EMPTY_HASH {
        return EMPTY_HASH;
    }
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"NODE:");
    hasher.update(left);
    hasher.update(right);

    *hasher.finalize().as_bytes()
}

/// The fixed-size tree key of a namespaced state key
pub fn state_key(namespace: &str, key: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"KEY:");
    hasher.update(namespace.as_bytes());
    hasher.update(&[0]);
    hasher.update(key.as_bytes());

    *hasher.finalize().as_bytes()
}

/// Hash a state entry to create a leaf hash
pub fn hash_leaf(namespace: &str, key: &str, value: &[u8]) -> [u8; 32] {
    // Create a leaf prefix to distinguish from internal nodes
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"LEAF:");
    hasher.update(&state_key(namespace, key));
    hasher.update(value);

    *hasher.finalize().as_bytes()
}

impl MerkleTree {
    /// Create a new, empty Merkle tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of a state entry and update all affected nodes
    pub fn insert(&mut self, namespace: &str, key: &str, value: &[u8]) -> [u8; 32] {
        let tree_key = state_key(namespace, key);
        let leaf_hash = hash_leaf(namespace, key, value);
        self.leaves.insert(tree_key, leaf_hash);
        self.update_tree(&tree_key, leaf_hash);
        leaf_hash
    }

    /// Remove a state entry, restoring an empty leaf
    pub fn remove(&mut self, namespace: &str, key: &str) {
        let tree_key = state_key(namespace, key);
        if self.leaves.remove(&tree_key).is_some() {
            self.update_tree(&tree_key, EMPTY_HASH);
        }
    }

    fn store_node(&mut self, path: Vec<bool>, hash: [u8; 32]) {
        if hash == EMPTY_HASH {
            self.nodes.remove(&path);
        } else {
            self.nodes.insert(path, hash);
        }
    }

    /// Recompute the hashes on the path of a leaf
    fn update_tree(&mut self, tree_key: &[u8; 32], leaf_hash: [u8; 32]) {
        let path = key_to_path(tree_key);
        let mut current_hash = leaf_hash;
        self.store_node(path.clone(), current_hash);

        // Traverse up the tree, computing new hashes for each level
        for level in (0..DEPTH).rev() {
            let sibling_hash = self
                .nodes
                .get(&sibling_path(&path, level))
                .copied()
                .unwrap_or(EMPTY_HASH);

            current_hash = if path[level] {
                // Current node is right child, sibling is left
                hash_internal_node(&sibling_hash, &current_hash)
            } else {
                hash_internal_node(&current_hash, &sibling_hash)
            };
            self.store_node(path[..level].to_vec(), current_hash);
        }

        self.root = current_hash;
    }

    /// Generate a proof for a state entry, present or not
    pub fn generate_proof(&self, namespace: &str, key: &str) -> MerkleProof {
        let tree_key = state_key(namespace, key);
        let path = key_to_path(&tree_key);
        let siblings = (0..DEPTH)
            .rev()
            .map(|level| self.nodes.get(&sibling_path(&path, level)).copied())
            .collect();

        MerkleProof {
            key: tree_key,
            leaf_hash: self.leaves.get(&tree_key).copied().unwrap_or(EMPTY_HASH),
            siblings,
        }
    }

    /// Get the root hash
    pub fn root_hash(&self) -> [u8; 32] {
        self.root
    }
}

impl MerkleProof {
    /// Recompute the root this proof commits to, `None` if the proof is malformed
    pub fn compute_root(&self) -> Option<[u8; 32]> {
        if self.siblings.len() != DEPTH {
            return None;
        }
        let path = key_to_path(&self.key);
        let mut current_hash = self.leaf_hash;
        for (sibling, level) in self.siblings.iter().zip((0..DEPTH).rev()) {
            let sibling_hash = sibling.unwrap_or(EMPTY_HASH);
            current_hash = if path[level] {
                hash_internal_node(&sibling_hash, &current_hash)
            } else {
                hash_internal_node(&current_hash, &sibling_hash)
            };
        }
        Some(current_hash)
    }

    /// Verify the proof against a root
    pub fn verify(&self, root: &[u8; 32]) -> bool {
        self.compute_root().as_ref() == Some(root)
    }

    /// True if the proof is about this entry and commits to `value`
    pub fn proves(&self, namespace: &str, key: &str, value: Option<&[u8]>) -> bool {
        if self.key != state_key(namespace, key) {
            return false;
        }
        match value {
            Some(v) => self.leaf_hash == hash_leaf(namespace, key, v),
            None => self.leaf_hash == EMPTY_HASH,
        }
    }
}
