//! Claim processing against a committed root

use airdrop_core::verify_entitlement;
use airdrop_types::{Address, Amount, ClaimEvent, Digest, Entitlement, MerkleProof, TransferInstruction};
use tracing::{debug, error, info, warn};

use crate::claim_record::ClaimRecord;
use crate::events::{ClaimEventSink, TracingEventSink};
use crate::transfer::TransferExecutor;
use crate::{LedgerError, Result};

/// Verifier and replay guard for one distribution
///
/// The root is fixed at construction. Proof checks take no locks; the claim
/// record serializes claims per recipient.
pub struct ClaimLedger<R, T, E = TracingEventSink> {
    root: Digest,
    records: R,
    transfer: T,
    events: E,
}

impl<R, T> ClaimLedger<R, T, TracingEventSink>
where
    R: ClaimRecord,
    T: TransferExecutor,
{
    pub fn new(root: Digest, records: R, transfer: T) -> Self {
        Self::with_event_sink(root, records, transfer, TracingEventSink)
    }
}

impl<R, T, E> ClaimLedger<R, T, E>
where
    R: ClaimRecord,
    T: TransferExecutor,
    E: ClaimEventSink,
{
    pub fn with_event_sink(root: Digest, records: R, transfer: T, events: E) -> Self {
        Self {
            root,
            records,
            transfer,
            events,
        }
    }

    pub fn root(&self) -> &Digest {
        &self.root
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    /// Check a proof without touching claim state
    pub fn verify(&self, recipient: &Address, amount: &Amount, proof: &MerkleProof) -> Result<()> {
        let entitlement = Entitlement::new(*recipient, *amount);
        verify_entitlement(&entitlement, proof, &self.root).map_err(|e| {
            debug!(recipient = %recipient, error = %e, "proof rejected");
            LedgerError::InvalidProof
        })
    }

    /// Redeem an entitlement
    ///
    /// The recipient is reserved before the transfer runs. If the transfer
    /// fails the reservation is released and the transfer error returned, so
    /// the recipient can retry. The event is published only after the claim
    /// is committed.
    pub fn claim(
        &self,
        recipient: &Address,
        amount: &Amount,
        proof: &MerkleProof,
    ) -> Result<TransferInstruction> {
        if let Err(e) = self.verify(recipient, amount, proof) {
            warn!(recipient = %recipient, "claim rejected: invalid proof");
            return Err(e);
        }

        if let Err(e) = self.records.begin_claim(recipient) {
            if matches!(e, LedgerError::AlreadyClaimed(_)) {
                warn!(recipient = %recipient, "claim rejected: already claimed");
            }
            return Err(e);
        }

        let instruction = TransferInstruction {
            recipient: *recipient,
            amount: *amount,
        };

        if let Err(e) = self.transfer.execute(&instruction) {
            warn!(recipient = %recipient, error = %e, "transfer failed, releasing claim");
            if let Err(abort_err) = self.records.abort_claim(recipient) {
                error!(
                    recipient = %recipient,
                    transfer_error = %e,
                    error = %abort_err,
                    "claim reservation could not be released"
                );
                return Err(LedgerError::Storage(format!(
                    "Failed to release claim after transfer error ({}): {}",
                    e, abort_err
                )));
            }
            return Err(e);
        }

        // Past this point value has moved, so a failed commit is never a plain failure
        let event = ClaimEvent::new(&instruction);
        if let Err(e) = self.records.commit_claim(&event) {
            error!(
                recipient = %recipient,
                amount = %amount,
                error = %e,
                "transfer executed but claim commit failed, recipient left in doubt"
            );
            return Err(LedgerError::InDoubt {
                instruction,
                reason: e.to_string(),
            });
        }
        self.events.publish(&event);

        info!(recipient = %recipient, amount = %amount, "claim succeeded");
        Ok(instruction)
    }

    pub fn is_claimed(&self, recipient: &Address) -> Result<bool> {
        self.records.is_claimed(recipient)
    }

    pub fn receipt(&self, recipient: &Address) -> Result<Option<ClaimEvent>> {
        self.records.receipt(recipient)
    }

    pub fn claimed_count(&self) -> Result<usize> {
        self.records.claimed_count()
    }
}
