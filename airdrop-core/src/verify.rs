//! Stateless proof verification

use airdrop_types::{Digest, Entitlement, MerkleProof};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Invalid proof: computed root {computed} does not match committed root {expected}")]
    InvalidProof { computed: Digest, expected: Digest },
}

/// Verify that `leaf` is committed under `root`
///
/// Folds the proof's siblings into the leaf with the same sorted-pair rule
/// the builder used, then compares against the committed root.
pub fn verify_proof(
    leaf: &Digest,
    proof: &MerkleProof,
    root: &Digest,
) -> Result<(), VerificationError> {
    let computed = proof.compute_root(leaf);
    if computed != *root {
        return Err(VerificationError::InvalidProof {
            computed,
            expected: *root,
        });
    }
    Ok(())
}

/// Re-encode an entitlement and verify it against the root
pub fn verify_entitlement(
    entitlement: &Entitlement,
    proof: &MerkleProof,
    root: &Digest,
) -> Result<(), VerificationError> {
    verify_proof(&entitlement.leaf(), proof, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::DistributionTreeBuilder;
    use airdrop_types::{Address, Amount};

    fn two_entry_tree() -> crate::DistributionTree {
        let mut builder = DistributionTreeBuilder::new();
        builder.add_entitlement(Entitlement::new(Address::new([0x11; 20]), Amount::from_u64(100)));
        builder.add_entitlement(Entitlement::new(Address::new([0x22; 20]), Amount::from_u64(200)));
        builder.build().unwrap()
    }

    #[test]
    fn test_roundtrip_every_entitlement() {
        let tree = two_entry_tree();
        for e in tree.entitlements() {
            let proof = tree.proof_for(&e.recipient).unwrap();
            assert!(verify_entitlement(e, &proof, tree.root()).is_ok());
        }
    }

    #[test]
    fn test_tampered_amount_fails() {
        let tree = two_entry_tree();
        let recipient = Address::new([0x11; 20]);
        let proof = tree.proof_for(&recipient).unwrap();

        let inflated = Entitlement::new(recipient, Amount::from_u64(101));
        assert!(matches!(
            verify_entitlement(&inflated, &proof, tree.root()),
            Err(VerificationError::InvalidProof { .. })
        ));
    }

    #[test]
    fn test_proof_for_other_leaf_fails() {
        let tree = two_entry_tree();
        let proof_a = tree.proof_for(&Address::new([0x11; 20])).unwrap();
        let entitlement_b = tree.entitlement(&Address::new([0x22; 20])).unwrap();
        assert!(verify_entitlement(entitlement_b, &proof_a, tree.root()).is_err());
    }

    #[test]
    fn test_wrong_root_reports_both_digests() {
        let tree = two_entry_tree();
        let e = tree.entitlement(&Address::new([0x11; 20])).unwrap();
        let proof = tree.proof_for(&e.recipient).unwrap();
        let wrong_root = Digest::new([0u8; 32]);

        let err = verify_entitlement(e, &proof, &wrong_root).unwrap_err();
        assert_eq!(
            err,
            VerificationError::InvalidProof {
                computed: *tree.root(),
                expected: wrong_root,
            }
        );
    }

    #[test]
    fn test_extra_sibling_fails() {
        let tree = two_entry_tree();
        let e = tree.entitlement(&Address::new([0x11; 20])).unwrap();
        let mut proof = tree.proof_for(&e.recipient).unwrap();
        proof.siblings.push(Digest::new([0u8; 32]));
        assert!(verify_entitlement(e, &proof, tree.root()).is_err());
    }
}
