//! Core types and encoding rules for Merkle airdrops
//!
//! This crate defines the fixed-width primitives, the canonical leaf
//! encoding and the sorted-pair hashing rule. The builder and the verifier
//! both depend on it, which is what keeps them bit-for-bit in agreement.

pub mod error;
pub mod messages;
pub mod primitives;

pub use error::{Error, Result};
pub use messages::{
    compute_leaf_hash, encode_entitlement, encode_leaf, hash_sorted_pair, ClaimEvent,
    DistributionManifest, Entitlement, ManifestEntry, MerkleProof, TransferInstruction,
};
pub use primitives::{Address, Amount, Digest};
