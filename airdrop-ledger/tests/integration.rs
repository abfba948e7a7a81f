//! End-to-end claim tests: build a distribution, then redeem it

use airdrop_core::{DistributionTree, DistributionTreeBuilder};
use airdrop_ledger::testutil::{RecordingEventSink, RecordingTransfer};
use airdrop_ledger::{ClaimLedger, InMemoryClaimRecord, LedgerError, TokenVault};
use airdrop_types::{Address, Amount, Digest, Entitlement, MerkleProof};

fn addr(byte: u8) -> Address {
    Address::new([byte; 20])
}

fn distribution(count: u8) -> DistributionTree {
    let mut builder = DistributionTreeBuilder::new();
    for i in 1..=count {
        builder.add_entitlement(Entitlement::new(addr(i), Amount::from_u64(i as u64 * 100)));
    }
    builder.build().expect("build failed")
}

fn recording_ledger(
    root: Digest,
) -> ClaimLedger<InMemoryClaimRecord, RecordingTransfer, RecordingEventSink> {
    ClaimLedger::with_event_sink(
        root,
        InMemoryClaimRecord::new(),
        RecordingTransfer::new(),
        RecordingEventSink::new(),
    )
}

#[test]
fn test_every_recipient_claims_once() {
    let tree = distribution(25);
    let ledger = recording_ledger(*tree.root());

    for e in tree.entitlements() {
        let proof = tree.proof_for(&e.recipient).unwrap();
        let instruction = ledger
            .claim(&e.recipient, &e.amount, &proof)
            .unwrap_or_else(|err| panic!("claim for {} failed: {}", e.recipient, err));
        assert_eq!(instruction.recipient, e.recipient);
        assert_eq!(instruction.amount, e.amount);
    }

    assert_eq!(ledger.claimed_count().unwrap(), 25);
    assert_eq!(ledger.transfer().instructions().len(), 25);
    assert_eq!(ledger.events().events().len(), 25);
}

#[test]
fn test_replay_pays_once() {
    let tree = distribution(3);
    let ledger = recording_ledger(*tree.root());
    let recipient = addr(2);
    let amount = Amount::from_u64(200);
    let proof = tree.proof_for(&recipient).unwrap();

    ledger.claim(&recipient, &amount, &proof).unwrap();
    for _ in 0..3 {
        let err = ledger.claim(&recipient, &amount, &proof).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyClaimed(a) if a == recipient));
    }

    assert_eq!(ledger.transfer().total_for(&recipient), amount);
    assert_eq!(ledger.events().events().len(), 1);
}

#[test]
fn test_tampered_amount_rejected() {
    let tree = distribution(4);
    let ledger = recording_ledger(*tree.root());
    let recipient = addr(3);
    let proof = tree.proof_for(&recipient).unwrap();

    for amount in [0u64, 299, 301, 3000] {
        assert!(matches!(
            ledger.claim(&recipient, &Amount::from_u64(amount), &proof),
            Err(LedgerError::InvalidProof)
        ));
    }

    // A rejected attempt does not consume the entitlement
    ledger.claim(&recipient, &Amount::from_u64(300), &proof).unwrap();
}

#[test]
fn test_tampered_proof_rejected() {
    let tree = distribution(8);
    let ledger = recording_ledger(*tree.root());
    let recipient = addr(5);
    let amount = Amount::from_u64(500);
    let proof = tree.proof_for(&recipient).unwrap();

    for i in 0..proof.len() {
        for byte in [0usize, 17, 31] {
            let mut siblings = proof.siblings.clone();
            let mut bytes = *siblings[i].as_bytes();
            bytes[byte] ^= 0x01;
            siblings[i] = Digest::new(bytes);

            assert!(matches!(
                ledger.verify(&recipient, &amount, &MerkleProof::new(siblings)),
                Err(LedgerError::InvalidProof)
            ));
        }
    }
    assert!(!ledger.is_claimed(&recipient).unwrap());
}

#[test]
fn test_proof_of_another_recipient_rejected() {
    let tree = distribution(2);
    let ledger = recording_ledger(*tree.root());

    let proof_a = tree.proof_for(&addr(1)).unwrap();
    assert!(matches!(
        ledger.claim(&addr(2), &Amount::from_u64(200), &proof_a),
        Err(LedgerError::InvalidProof)
    ));
}

#[test]
fn test_unknown_recipient_rejected() {
    let tree = distribution(4);
    let ledger = recording_ledger(*tree.root());
    let proof = tree.proof_for(&addr(1)).unwrap();

    assert!(matches!(
        ledger.claim(&addr(0xee), &Amount::from_u64(100), &proof),
        Err(LedgerError::InvalidProof)
    ));
}

#[test]
fn test_literal_two_entry_distribution() {
    let root = Digest::from_hex("0x46451dfcfffe56da3b9019027cda3f4cf0db85034ab47952da3a8db11d19dae3")
        .unwrap();
    let leaf_a = Digest::from_hex("0x4f2aefca2998f6aa2ab6799857a78dad717148458baa694d613c74251a29f216")
        .unwrap();
    let leaf_b = Digest::from_hex("0x7a10cfda5e9b2c0b4e2b98d253b1f1b38d27b63642bc2dfc72471e863437348f")
        .unwrap();

    let ledger = ClaimLedger::new(root, InMemoryClaimRecord::new(), RecordingTransfer::new());

    ledger
        .claim(&addr(0x11), &Amount::from_u64(100), &MerkleProof::new(vec![leaf_b]))
        .unwrap();
    ledger
        .claim(&addr(0x22), &Amount::from_u64(200), &MerkleProof::new(vec![leaf_a]))
        .unwrap();
    assert_eq!(ledger.claimed_count().unwrap(), 2);
}

#[test]
fn test_vault_funds_claims() {
    let tree = distribution(3);
    let ledger = ClaimLedger::new(
        *tree.root(),
        InMemoryClaimRecord::new(),
        TokenVault::new(*tree.total_amount()),
    );

    for e in tree.entitlements() {
        let proof = tree.proof_for(&e.recipient).unwrap();
        ledger.claim(&e.recipient, &e.amount, &proof).unwrap();
    }
    assert!(ledger.transfer().balance().unwrap().is_zero());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Any sequence of claim attempts pays each recipient exactly its entitlement
        #[test]
        fn prop_each_recipient_paid_once(
            count in 1u8..24,
            attempts in prop::collection::vec(0u8..32, 1..80),
        ) {
            let tree = distribution(count);
            let ledger = recording_ledger(*tree.root());

            for pick in attempts {
                let recipient = addr(pick % count + 1);
                let e = tree.entitlement(&recipient).unwrap();
                let proof = tree.proof_for(&recipient).unwrap();
                let was_claimed = ledger.is_claimed(&recipient).unwrap();

                match ledger.claim(&recipient, &e.amount, &proof) {
                    Ok(_) => prop_assert!(!was_claimed),
                    Err(LedgerError::AlreadyClaimed(_)) => prop_assert!(was_claimed),
                    Err(other) => prop_assert!(false, "unexpected error: {}", other),
                }
            }

            for (recipient, total) in ledger.transfer().totals() {
                prop_assert_eq!(total, tree.entitlement(&recipient).unwrap().amount);
            }
            prop_assert_eq!(
                ledger.claimed_count().unwrap(),
                ledger.transfer().instructions().len()
            );
        }
    }
}
