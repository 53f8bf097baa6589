//! Incremental Merkle tree of group member commitments.
//!
//! The tree has a fixed depth chosen at creation. Leaves are filled left to
//! right in insertion order, empty positions hold the zero value, and every
//! insert rehashes the path from the new leaf to the root with Poseidon.
//! Building from a member list hashes each level once instead.

use crate::error::{Error, Result};
use crate::utils::{field_to_bytes, field_to_hex, poseidon_hash, serde_field, serde_field_vec};
use log::debug;
use parking_lot::RwLock;
use pasta_curves::group::ff::Field;
use pasta_curves::pallas;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Smallest supported tree depth.
pub const MIN_DEPTH: usize = 1;

/// Largest supported tree depth (2^32 members).
pub const MAX_DEPTH: usize = 32;

/// Authentication path from a leaf to the root.
///
/// `path_bits[i]` is true when the node at level `i` is a right child, i.e.
/// its sibling sits on the left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath {
    pub leaf_index: usize,
    pub siblings: Vec<pallas::Base>,
    pub path_bits: Vec<bool>,
}

impl MerklePath {
    /// Folds `leaf` up the path and returns the resulting root.
    #[must_use]
    pub fn compute_root(&self, leaf: pallas::Base) -> pallas::Base {
        self.siblings
            .iter()
            .zip(&self.path_bits)
            .fold(leaf, |node, (sibling, &is_right)| {
                if is_right {
                    poseidon_hash(*sibling, node)
                } else {
                    poseidon_hash(node, *sibling)
                }
            })
    }
}

impl fmt::Display for MerklePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MerklePath:\n  Index: {}\n  Depth: {}",
            self.leaf_index,
            self.siblings.len()
        )
    }
}

/// Checks a requested depth against the supported range.
pub fn validate_depth(depth: usize) -> Result<()> {
    if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        return Err(Error::InvalidInput(format!(
            "tree depth must be between {MIN_DEPTH} and {MAX_DEPTH}, got {depth}"
        )));
    }
    Ok(())
}

/// Zero values per level: `zeros[0] = 0`, `zeros[i + 1] = H(zeros[i], zeros[i])`.
fn zero_hashes(depth: usize) -> Vec<pallas::Base> {
    let mut zeros = Vec::with_capacity(depth + 1);
    zeros.push(pallas::Base::ZERO);
    for level in 0..depth {
        zeros.push(poseidon_hash(zeros[level], zeros[level]));
    }
    zeros
}

/// Append-only group of member commitments.
#[derive(Debug, Clone)]
pub struct GroupTree {
    depth: usize,
    zeros: Vec<pallas::Base>,
    /// `levels[0]` holds the leaves, `levels[depth]` at most the root.
    levels: Vec<Vec<pallas::Base>>,
    positions: HashMap<[u8; 32], usize>,
}

impl GroupTree {
    /// Creates an empty group able to hold `2^depth` members.
    pub fn new(depth: usize) -> Result<Self> {
        validate_depth(depth)?;
        Ok(Self {
            depth,
            zeros: zero_hashes(depth),
            levels: vec![Vec::new(); depth + 1],
            positions: HashMap::new(),
        })
    }

    /// Creates a group holding `members` in order.
    ///
    /// Hashes each level once bottom-up instead of rehashing a full path per
    /// member. Fails like [`GroupTree::add_member`] on the first bad member.
    pub fn with_members<I>(depth: usize, members: I) -> Result<Self>
    where
        I: IntoIterator<Item = pallas::Base>,
    {
        let mut tree = Self::new(depth)?;
        for commitment in members {
            tree.check_new_member(commitment)?;
            tree.positions
                .insert(field_to_bytes(commitment), tree.levels[0].len());
            tree.levels[0].push(commitment);
        }

        for level in 0..depth {
            let zero = tree.zeros[level];
            let parents: Vec<pallas::Base> = tree.levels[level]
                .chunks(2)
                .map(|pair| poseidon_hash(pair[0], pair.get(1).copied().unwrap_or(zero)))
                .collect();
            tree.levels[level + 1] = parents;
        }

        debug!(
            "Built group of {} members at depth {}, root {}",
            tree.len(),
            depth,
            field_to_hex(tree.root())
        );
        Ok(tree)
    }

    fn check_new_member(&self, commitment: pallas::Base) -> Result<()> {
        if commitment == pallas::Base::ZERO {
            return Err(Error::InvalidInput(
                "zero is reserved for empty leaves and cannot be a member".to_string(),
            ));
        }
        if self.positions.contains_key(&field_to_bytes(commitment)) {
            return Err(Error::DuplicateMember(field_to_hex(commitment)));
        }
        if self.len() as u64 >= self.capacity() {
            return Err(Error::GroupFull {
                depth: self.depth,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    /// Appends a commitment at the next free leaf and returns its index.
    ///
    /// On error the tree is left untouched.
    ///
    /// # Errors
    /// - [`Error::DuplicateMember`] if the commitment is already a leaf
    /// - [`Error::GroupFull`] if all `2^depth` leaves are taken
    /// - [`Error::InvalidInput`] for the zero commitment, which marks empty leaves
    pub fn add_member(&mut self, commitment: pallas::Base) -> Result<usize> {
        self.check_new_member(commitment)?;

        let leaf_index = self.levels[0].len();
        self.levels[0].push(commitment);
        self.positions.insert(field_to_bytes(commitment), leaf_index);

        let mut node = commitment;
        let mut index = leaf_index;
        for level in 0..self.depth {
            let sibling = self.node(level, index ^ 1);
            node = if index & 1 == 0 {
                poseidon_hash(node, sibling)
            } else {
                poseidon_hash(sibling, node)
            };
            index >>= 1;

            let parents = &mut self.levels[level + 1];
            if index < parents.len() {
                parents[index] = node;
            } else {
                parents.push(node);
            }
        }

        debug!(
            "Added member {} at leaf {}, new root {}",
            field_to_hex(commitment),
            leaf_index,
            field_to_hex(self.root())
        );
        Ok(leaf_index)
    }

    fn node(&self, level: usize, index: usize) -> pallas::Base {
        self.levels[level]
            .get(index)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    #[must_use]
    pub fn root(&self) -> pallas::Base {
        self.node(self.depth, 0)
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Members in insertion order; position is the leaf index.
    #[must_use]
    pub fn members(&self) -> &[pallas::Base] {
        &self.levels[0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    #[must_use]
    pub fn index_of(&self, commitment: &pallas::Base) -> Option<usize> {
        self.positions.get(&field_to_bytes(*commitment)).copied()
    }

    #[must_use]
    pub fn contains(&self, commitment: &pallas::Base) -> bool {
        self.index_of(commitment).is_some()
    }

    /// Authentication path for the leaf at `leaf_index`, `None` past the end.
    #[must_use]
    pub fn merkle_path(&self, leaf_index: usize) -> Option<MerklePath> {
        if leaf_index >= self.len() {
            return None;
        }

        let mut siblings = Vec::with_capacity(self.depth);
        let mut path_bits = Vec::with_capacity(self.depth);
        let mut index = leaf_index;
        for level in 0..self.depth {
            siblings.push(self.node(level, index ^ 1));
            path_bits.push(index & 1 == 1);
            index >>= 1;
        }

        Some(MerklePath {
            leaf_index,
            siblings,
            path_bits,
        })
    }

    /// Immutable copy of the current state for proof generation.
    #[must_use]
    pub fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot::from(self)
    }
}

/// Immutable view of a group handed to the prover.
///
/// Only built from a [`GroupTree`] (or deserialised from one that was), so the
/// root always belongs to the member list it travels with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    #[serde(with = "serde_field")]
    root: pallas::Base,
    depth: usize,
    #[serde(with = "serde_field_vec")]
    members: Vec<pallas::Base>,
}

impl From<&GroupTree> for GroupSnapshot {
    fn from(tree: &GroupTree) -> Self {
        Self {
            root: tree.root(),
            depth: tree.depth(),
            members: tree.members().to_vec(),
        }
    }
}

impl GroupSnapshot {
    #[must_use]
    pub fn root(&self) -> pallas::Base {
        self.root
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn members(&self) -> &[pallas::Base] {
        &self.members
    }

    #[must_use]
    pub fn contains(&self, commitment: &pallas::Base) -> bool {
        self.members.contains(commitment)
    }

    /// Rebuilds the tree and returns the path for `commitment`.
    ///
    /// # Errors
    /// - [`Error::NotAMember`] if the commitment is not in the snapshot
    /// - [`Error::CircuitExecution`] if the members no longer hash to the
    ///   snapshot root
    pub fn membership_path(&self, commitment: &pallas::Base) -> Result<MerklePath> {
        if !self.contains(commitment) {
            return Err(Error::NotAMember(field_to_hex(*commitment)));
        }

        let tree = GroupTree::with_members(self.depth, self.members.iter().copied())
            .map_err(|e| Error::CircuitExecution(format!("snapshot members are invalid: {e}")))?;
        let path = tree
            .index_of(commitment)
            .and_then(|leaf_index| tree.merkle_path(leaf_index))
            .ok_or_else(|| Error::CircuitExecution("leaf index out of range".to_string()))?;

        if path.compute_root(*commitment) != self.root {
            return Err(Error::CircuitExecution(format!(
                "membership path does not reach snapshot root {}",
                field_to_hex(self.root)
            )));
        }
        Ok(path)
    }
}

/// A group shared between threads.
///
/// Inserts take the write lock so leaf indices and the root are assigned
/// atomically; reads run concurrently while no insert is in progress.
#[derive(Debug, Clone)]
pub struct SharedGroup {
    inner: Arc<RwLock<GroupTree>>,
}

impl SharedGroup {
    pub fn new(depth: usize) -> Result<Self> {
        Ok(Self::from(GroupTree::new(depth)?))
    }

    pub fn add_member(&self, commitment: pallas::Base) -> Result<usize> {
        self.inner.write().add_member(commitment)
    }

    #[must_use]
    pub fn root(&self) -> pallas::Base {
        self.inner.read().root()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.read().depth()
    }

    #[must_use]
    pub fn members(&self) -> Vec<pallas::Base> {
        self.inner.read().members().to_vec()
    }

    #[must_use]
    pub fn snapshot(&self) -> GroupSnapshot {
        self.inner.read().snapshot()
    }
}

impl From<GroupTree> for SharedGroup {
    fn from(tree: GroupTree) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tree)),
        }
    }
}
