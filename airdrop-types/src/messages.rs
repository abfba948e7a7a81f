//! Leaf encoding, pair hashing and the messages exchanged between the
//! builder, the verifier and their collaborators

use crate::error::Result;
use crate::primitives::{Address, Amount, Digest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha3::{Digest as _, Keccak256};
use std::collections::BTreeMap;

/// Length of the canonical leaf preimage: `recipient (20) || amount (32)`.
///
/// Interior preimages are always 64 bytes, so no leaf preimage can be
/// reinterpreted as a pair of child digests.
pub const LEAF_PREIMAGE_LEN: usize = Address::LEN + Amount::LEN;

/// One (recipient, amount) record of the distribution list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entitlement {
    pub recipient: Address,
    pub amount: Amount,
}

impl Entitlement {
    pub fn new(recipient: Address, amount: Amount) -> Self {
        Self { recipient, amount }
    }

    /// Canonical byte layout hashed into the leaf
    pub fn encode(&self) -> [u8; LEAF_PREIMAGE_LEN] {
        encode_entitlement(&self.recipient, &self.amount)
    }

    /// The leaf digest committed to by the tree
    pub fn leaf(&self) -> Digest {
        compute_leaf_hash(&self.recipient, &self.amount)
    }
}

/// `recipient || amount` with the amount as 32 big-endian bytes
pub fn encode_entitlement(recipient: &Address, amount: &Amount) -> [u8; LEAF_PREIMAGE_LEN] {
    let mut out = [0u8; LEAF_PREIMAGE_LEN];
    out[..Address::LEN].copy_from_slice(recipient.as_bytes());
    out[Address::LEN..].copy_from_slice(amount.as_bytes());
    out
}

/// Hash a leaf: keccak256(recipient || amount)
pub fn compute_leaf_hash(recipient: &Address, amount: &Amount) -> Digest {
    let hash = Keccak256::new()
        .chain_update(recipient.as_bytes())
        .chain_update(amount.as_bytes())
        .finalize();
    Digest::new(hash.into())
}

/// Encode a leaf from raw fixed-width bytes.
///
/// `recipient` must be exactly 20 bytes. `amount` is big-endian and is
/// left-padded to 32 bytes; anything wider than 256 bits is rejected.
pub fn encode_leaf(recipient: &[u8], amount: &[u8]) -> Result<Digest> {
    let recipient = Address::from_slice(recipient)?;
    let amount = Amount::from_be_slice(amount)?;
    Ok(compute_leaf_hash(&recipient, &amount))
}

/// Hash a pair of nodes with the smaller digest first: H(min || max)
pub fn hash_sorted_pair(a: &Digest, b: &Digest) -> Digest {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let hash = Keccak256::new()
        .chain_update(first.as_bytes())
        .chain_update(second.as_bytes())
        .finalize();
    Digest::new(hash.into())
}

/// Sibling path from a leaf to the root.
///
/// Sorted-pair hashing means no left/right flags are needed. Levels where
/// the node was promoted without a sibling contribute no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerkleProof {
    pub siblings: Vec<Digest>,
}

impl MerkleProof {
    pub fn new(siblings: Vec<Digest>) -> Self {
        Self { siblings }
    }

    pub fn len(&self) -> usize {
        self.siblings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty()
    }

    /// Fold the siblings into the leaf
    pub fn compute_root(&self, leaf: &Digest) -> Digest {
        self.siblings
            .iter()
            .fold(*leaf, |current, sibling| hash_sorted_pair(&current, sibling))
    }

    /// Hex strings, as handed to recipients
    pub fn to_hex(&self) -> Vec<String> {
        self.siblings.iter().map(Digest::to_hex).collect()
    }

    pub fn from_hex<S: AsRef<str>>(items: &[S]) -> Result<Self> {
        let siblings = items
            .iter()
            .map(|s| Digest::from_hex(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { siblings })
    }
}

/// Order to the value-transfer collaborator, issued once per successful claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInstruction {
    pub recipient: Address,
    pub amount: Amount,
}

/// Audit event emitted after a claim has been committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEvent {
    pub recipient: Address,
    pub amount: Amount,
    pub claimed_at: DateTime<Utc>,
}

impl ClaimEvent {
    pub fn new(instruction: &TransferInstruction) -> Self {
        Self {
            recipient: instruction.recipient,
            amount: instruction.amount,
            claimed_at: Utc::now(),
        }
    }
}

/// Per-recipient entry of a [`DistributionManifest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub amount: Amount,
    pub leaf: Digest,
    pub proof: MerkleProof,
}

/// Everything needed to publish a commitment and hand out proofs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionManifest {
    pub merkle_root: Digest,
    pub total_amount: Amount,
    pub claims: BTreeMap<Address, ManifestEntry>,
}

impl DistributionManifest {
    pub fn entry(&self, recipient: &Address) -> Option<&ManifestEntry> {
        self.claims.get(recipient)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
