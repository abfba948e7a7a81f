//! Distribution tree construction and proof generation
//!
//! Leaves are sorted ascending before pairing, pairs are hashed with the
//! sorted-pair rule, and an odd node at the end of a level is promoted to
//! the next level unchanged. The root is therefore a function of the leaf
//! set alone, not of the order the list was read in.

use std::collections::{BTreeMap, HashMap};

use airdrop_types::{
    hash_sorted_pair, Address, Amount, Digest, DistributionManifest, Entitlement, ManifestEntry,
    MerkleProof,
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Cannot build a tree from an empty leaf set")]
    EmptyInput,

    #[error("Leaf not found in tree: {0}")]
    LeafNotFound(Digest),

    #[error("Recipient not found in distribution: {0}")]
    RecipientNotFound(Address),

    #[error("Duplicate leaf: {0}")]
    DuplicateLeaf(Digest),

    #[error("Recipient listed more than once: {0}")]
    DuplicateRecipient(Address),

    #[error("Total distribution amount exceeds 256 bits")]
    TotalOverflow,
}

/// A binary hash tree over a set of leaf digests
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// levels[0] is the sorted leaves, the last level holds only the root
    levels: Vec<Vec<Digest>>,
    root: Digest,
}

impl MerkleTree {
    /// Build the tree. Fails on an empty set or on repeated leaves.
    pub fn from_leaves(mut leaves: Vec<Digest>) -> Result<Self, TreeError> {
        if leaves.is_empty() {
            return Err(TreeError::EmptyInput);
        }

        leaves.sort_unstable();
        if let Some(pair) = leaves.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(TreeError::DuplicateLeaf(pair[0]));
        }

        let mut levels = vec![leaves];

        while let Some(prev_level) = levels.last() {
            if prev_level.len() <= 1 {
                break;
            }
            let next_level: Vec<Digest> = prev_level
                .chunks(2)
                .map(|pair| match pair.get(1) {
                    Some(right) => hash_sorted_pair(&pair[0], right),
                    // Odd node: carried up without re-hashing
                    None => pair[0],
                })
                .collect();
            levels.push(next_level);
        }

        let root = levels[levels.len() - 1][0];
        debug!(
            "Built merkle tree: {} leaves, depth {}",
            levels[0].len(),
            levels.len() - 1
        );

        Ok(Self { levels, root })
    }

    pub fn root(&self) -> &Digest {
        &self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Number of hashing levels above the leaves
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Leaves in canonical (sorted) order
    pub fn leaves(&self) -> &[Digest] {
        &self.levels[0]
    }

    pub fn contains(&self, leaf: &Digest) -> bool {
        self.levels[0].binary_search(leaf).is_ok()
    }

    /// Sibling path for a leaf, ordered from the leaf level up to the root
    pub fn proof(&self, leaf: &Digest) -> Result<MerkleProof, TreeError> {
        let mut index = self.levels[0]
            .binary_search(leaf)
            .map_err(|_| TreeError::LeafNotFound(*leaf))?;

        let mut siblings = Vec::with_capacity(self.depth());
        for level in &self.levels[..self.levels.len() - 1] {
            // A promoted node has no sibling and contributes nothing
            if let Some(sibling) = level.get(index ^ 1) {
                siblings.push(*sibling);
            }
            index /= 2;
        }

        Ok(MerkleProof::new(siblings))
    }

    /// Proof index for every leaf
    pub fn proofs(&self) -> Result<HashMap<Digest, MerkleProof>, TreeError> {
        self.levels[0]
            .iter()
            .map(|leaf| Ok((*leaf, self.proof(leaf)?)))
            .collect()
    }
}

/// Build a commitment over raw leaves: the root plus a proof for every leaf
pub fn build<I>(leaves: I) -> Result<(Digest, HashMap<Digest, MerkleProof>), TreeError>
where
    I: IntoIterator<Item = Digest>,
{
    let tree = MerkleTree::from_leaves(leaves.into_iter().collect())?;
    let proofs = tree.proofs()?;
    Ok((*tree.root(), proofs))
}

/// A committed distribution list
#[derive(Debug, Clone)]
pub struct DistributionTree {
    tree: MerkleTree,
    entitlements: BTreeMap<Address, Entitlement>,
    total_amount: Amount,
}

impl DistributionTree {
    pub fn root(&self) -> &Digest {
        self.tree.root()
    }

    pub fn leaf_count(&self) -> usize {
        self.tree.leaf_count()
    }

    /// Sum of all committed amounts
    pub fn total_amount(&self) -> &Amount {
        &self.total_amount
    }

    pub fn merkle_tree(&self) -> &MerkleTree {
        &self.tree
    }

    pub fn entitlement(&self, recipient: &Address) -> Option<&Entitlement> {
        self.entitlements.get(recipient)
    }

    /// Entitlements ordered by recipient
    pub fn entitlements(&self) -> impl Iterator<Item = &Entitlement> {
        self.entitlements.values()
    }

    pub fn proof(&self, leaf: &Digest) -> Result<MerkleProof, TreeError> {
        self.tree.proof(leaf)
    }

    pub fn proof_for(&self, recipient: &Address) -> Result<MerkleProof, TreeError> {
        let entitlement = self
            .entitlements
            .get(recipient)
            .ok_or(TreeError::RecipientNotFound(*recipient))?;
        self.tree.proof(&entitlement.leaf())
    }

    pub fn proofs(&self) -> Result<HashMap<Digest, MerkleProof>, TreeError> {
        self.tree.proofs()
    }

    /// Root, total and per-recipient proofs in publishable form
    pub fn manifest(&self) -> Result<DistributionManifest, TreeError> {
        let claims = self
            .entitlements
            .values()
            .map(|entitlement| {
                let leaf = entitlement.leaf();
                let entry = ManifestEntry {
                    amount: entitlement.amount,
                    leaf,
                    proof: self.tree.proof(&leaf)?,
                };
                Ok((entitlement.recipient, entry))
            })
            .collect::<Result<BTreeMap<_, _>, TreeError>>()?;

        Ok(DistributionManifest {
            merkle_root: *self.root(),
            total_amount: self.total_amount,
            claims,
        })
    }
}

/// Builder for constructing distribution trees
#[derive(Debug, Default)]
pub struct DistributionTreeBuilder {
    entitlements: Vec<Entitlement>,
}

impl DistributionTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entitlement to the list
    pub fn add_entitlement(&mut self, entitlement: Entitlement) {
        self.entitlements.push(entitlement);
    }

    pub fn extend<I>(&mut self, entitlements: I)
    where
        I: IntoIterator<Item = Entitlement>,
    {
        self.entitlements.extend(entitlements);
    }

    pub fn len(&self) -> usize {
        self.entitlements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entitlements.is_empty()
    }

    /// Build the tree. Any error aborts the whole build.
    pub fn build(self) -> Result<DistributionTree, TreeError> {
        if self.entitlements.is_empty() {
            return Err(TreeError::EmptyInput);
        }

        let mut by_recipient: BTreeMap<Address, Entitlement> = BTreeMap::new();
        let mut total_amount = Amount::ZERO;

        for entitlement in self.entitlements {
            if let Some(existing) = by_recipient.get(&entitlement.recipient) {
                return Err(if existing.amount == entitlement.amount {
                    TreeError::DuplicateLeaf(entitlement.leaf())
                } else {
                    TreeError::DuplicateRecipient(entitlement.recipient)
                });
            }
            total_amount = total_amount
                .checked_add(&entitlement.amount)
                .ok_or(TreeError::TotalOverflow)?;
            by_recipient.insert(entitlement.recipient, entitlement);
        }

        let leaves = by_recipient.values().map(Entitlement::leaf).collect();
        let tree = MerkleTree::from_leaves(leaves)?;

        info!(
            "Built distribution tree with {} entitlements, total {}, root {}",
            tree.leaf_count(),
            total_amount,
            tree.root()
        );

        Ok(DistributionTree {
            tree,
            entitlements: by_recipient,
            total_amount,
        })
    }
}
