//! Commitment building and proof verification for Merkle airdrops
//!
//! This crate provides:
//! - Merkle tree construction over a canonical (sorted) leaf set
//! - Per-leaf proof generation and distribution manifests
//! - Stateless proof verification against a committed root

pub mod merkle;
pub mod verify;

pub use merkle::{build, DistributionTree, DistributionTreeBuilder, MerkleTree, TreeError};
pub use verify::{verify_entitlement, verify_proof, VerificationError};
