//! Sled-backed claim record and transfer outbox

use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use tracing::{debug, warn};

use airdrop_types::{Address, ClaimEvent, TransferInstruction};

use crate::claim_record::ClaimRecord;
use crate::transfer::TransferExecutor;
use crate::{LedgerError, Result};

const CLAIMS_TREE: &str = "claims";
const TRANSFERS_TREE: &str = "transfers";

/// Value stored for a reserved but uncommitted claim
const PENDING: &[u8] = b"pending";

/// Open or create the ledger database at the given path
pub fn open_db(path: &Path) -> Result<Db> {
    sled::open(path)
        .map_err(|e| LedgerError::Storage(format!("Failed to open database: {}", e)))
}

/// Durable claim record
///
/// Keys are the 20 recipient bytes. A value is either the pending marker or
/// the JSON receipt of a committed claim. When opened with an outbox, the
/// commit also queues the transfer in the same transaction.
pub struct SledClaimRecord {
    claims: Tree,
    outbox: Option<(Db, Tree)>,
}

impl SledClaimRecord {
    /// Open a claim record in its own database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let db = open_db(path)?;
        Self::with_db(&db)
    }

    /// Open the claim record inside an existing database
    pub fn with_db(db: &Db) -> Result<Self> {
        let claims = db
            .open_tree(CLAIMS_TREE)
            .map_err(|e| LedgerError::Storage(format!("Failed to open claims tree: {}", e)))?;

        let record = Self {
            claims,
            outbox: None,
        };
        for recipient in record.pending()? {
            warn!(
                recipient = %recipient,
                "in-doubt claim left pending by an earlier run, recipient stays blocked"
            );
        }
        Ok(record)
    }

    /// Open the claim record together with the `transfers` outbox
    ///
    /// Committing a claim then writes the receipt and queues its transfer
    /// atomically. Pair it with [`crate::transfer::QueuedOnCommit`].
    pub fn with_outbox(db: &Db) -> Result<Self> {
        let mut record = Self::with_db(db)?;
        let transfers = db
            .open_tree(TRANSFERS_TREE)
            .map_err(|e| LedgerError::Storage(format!("Failed to open transfers tree: {}", e)))?;
        record.outbox = Some((db.clone(), transfers));
        Ok(record)
    }

    fn commit_with_transfer(
        &self,
        db: &Db,
        transfers: &Tree,
        event: &ClaimEvent,
        receipt: Vec<u8>,
    ) -> Result<()> {
        let instruction = TransferInstruction {
            recipient: event.recipient,
            amount: event.amount,
        };
        let queued = serde_json::to_vec(&instruction)
            .map_err(|e| LedgerError::Storage(format!("Failed to serialize transfer: {}", e)))?;
        let id = db
            .generate_id()
            .map_err(|e| LedgerError::Storage(format!("Failed to allocate transfer id: {}", e)))?;
        let id_key = id.to_be_bytes();
        let key = &event.recipient.as_bytes()[..];

        let result: std::result::Result<(), TransactionError<LedgerError>> =
            (&self.claims, transfers).transaction(|(claims, transfers)| {
                match claims.get(key)? {
                    Some(value) if value.as_ref() == PENDING => {}
                    _ => {
                        return Err(ConflictableTransactionError::Abort(LedgerError::Storage(
                            format!("No pending claim to commit for {}", event.recipient),
                        )))
                    }
                }
                claims.insert(key, receipt.clone())?;
                transfers.insert(&id_key[..], queued.clone())?;
                Ok(())
            });

        match result {
            Ok(()) => {
                debug!(id, recipient = %event.recipient, "claim committed, transfer queued");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => {
                Err(LedgerError::Storage(format!("Failed to commit claim: {}", e)))
            }
        }
    }

    /// Recipients reserved by a claim that never committed or aborted
    pub fn pending(&self) -> Result<Vec<Address>> {
        let mut pending = Vec::new();
        for item in self.claims.iter() {
            let (key, value) = item
                .map_err(|e| LedgerError::Storage(format!("Failed to scan claims: {}", e)))?;
            if value.as_ref() == PENDING {
                pending.push(Address::from_slice(&key)?);
            }
        }
        Ok(pending)
    }
}

impl ClaimRecord for SledClaimRecord {
    fn is_claimed(&self, recipient: &Address) -> Result<bool> {
        self.claims
            .contains_key(recipient.as_bytes())
            .map_err(|e| LedgerError::Storage(format!("Failed to read claim: {}", e)))
    }

    fn receipt(&self, recipient: &Address) -> Result<Option<ClaimEvent>> {
        let value = self
            .claims
            .get(recipient.as_bytes())
            .map_err(|e| LedgerError::Storage(format!("Failed to read claim: {}", e)))?;

        match value {
            Some(bytes) if bytes.as_ref() != PENDING => {
                let event = serde_json::from_slice(&bytes).map_err(|e| {
                    LedgerError::Storage(format!("Failed to deserialize receipt: {}", e))
                })?;
                Ok(Some(event))
            }
            _ => Ok(None),
        }
    }

    fn begin_claim(&self, recipient: &Address) -> Result<()> {
        let swapped = self
            .claims
            .compare_and_swap(recipient.as_bytes(), None as Option<&[u8]>, Some(PENDING))
            .map_err(|e| LedgerError::Storage(format!("Failed to reserve claim: {}", e)))?;

        if swapped.is_err() {
            return Err(LedgerError::AlreadyClaimed(*recipient));
        }

        // Reservation must be on disk before any transfer is attempted
        self.claims
            .flush()
            .map_err(|e| LedgerError::Storage(format!("Failed to flush database: {}", e)))?;

        debug!(recipient = %recipient, "claim reserved");
        Ok(())
    }

    fn commit_claim(&self, event: &ClaimEvent) -> Result<()> {
        let receipt = serde_json::to_vec(event)
            .map_err(|e| LedgerError::Storage(format!("Failed to serialize receipt: {}", e)))?;

        match &self.outbox {
            Some((db, transfers)) => self.commit_with_transfer(db, transfers, event, receipt)?,
            None => {
                self.claims
                    .compare_and_swap(event.recipient.as_bytes(), Some(PENDING), Some(receipt))
                    .map_err(|e| LedgerError::Storage(format!("Failed to commit claim: {}", e)))?
                    .map_err(|_| {
                        LedgerError::Storage(format!(
                            "No pending claim to commit for {}",
                            event.recipient
                        ))
                    })?;
            }
        }

        self.claims
            .flush()
            .map_err(|e| LedgerError::Storage(format!("Failed to flush database: {}", e)))?;

        Ok(())
    }

    fn abort_claim(&self, recipient: &Address) -> Result<()> {
        self.claims
            .compare_and_swap(recipient.as_bytes(), Some(PENDING), None as Option<&[u8]>)
            .map_err(|e| LedgerError::Storage(format!("Failed to abort claim: {}", e)))?
            .map_err(|_| {
                LedgerError::Storage(format!("No pending claim to abort for {}", recipient))
            })?;

        // Otherwise a crash here leaves an untransferred recipient in doubt
        self.claims
            .flush()
            .map_err(|e| LedgerError::Storage(format!("Failed to flush database: {}", e)))?;

        debug!(recipient = %recipient, "claim reservation released");
        Ok(())
    }

    fn claimed_count(&self) -> Result<usize> {
        let mut count = 0;
        for value in self.claims.iter().values() {
            let value = value
                .map_err(|e| LedgerError::Storage(format!("Failed to scan claims: {}", e)))?;
            if value.as_ref() != PENDING {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Durable queue of transfer instructions for an external executor
pub struct TransferOutbox {
    db: Db,
    transfers: Tree,
}

impl TransferOutbox {
    /// Open the outbox inside an existing database
    pub fn with_db(db: &Db) -> Result<Self> {
        let transfers = db
            .open_tree(TRANSFERS_TREE)
            .map_err(|e| LedgerError::Storage(format!("Failed to open transfers tree: {}", e)))?;

        Ok(Self {
            db: db.clone(),
            transfers,
        })
    }

    /// Queued instructions in the order they were issued
    pub fn list(&self) -> Result<Vec<TransferInstruction>> {
        let mut instructions = Vec::new();
        for value in self.transfers.iter().values() {
            let bytes = value
                .map_err(|e| LedgerError::Storage(format!("Failed to scan transfers: {}", e)))?;
            let instruction = serde_json::from_slice(&bytes).map_err(|e| {
                LedgerError::Storage(format!("Failed to deserialize transfer: {}", e))
            })?;
            instructions.push(instruction);
        }
        Ok(instructions)
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

impl TransferExecutor for TransferOutbox {
    fn execute(&self, instruction: &TransferInstruction) -> Result<()> {
        let id = self
            .db
            .generate_id()
            .map_err(|e| LedgerError::Transfer(format!("Failed to allocate transfer id: {}", e)))?;
        let value = serde_json::to_vec(instruction)
            .map_err(|e| LedgerError::Transfer(format!("Failed to serialize transfer: {}", e)))?;

        self.transfers
            .insert(id.to_be_bytes(), value)
            .map_err(|e| LedgerError::Transfer(format!("Failed to queue transfer: {}", e)))?;

        self.transfers
            .flush()
            .map_err(|e| LedgerError::Transfer(format!("Failed to flush transfers: {}", e)))?;

        debug!(id, recipient = %instruction.recipient, "transfer queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdrop_types::Amount;
    use tempfile::TempDir;

    fn instruction(byte: u8, amount: u64) -> TransferInstruction {
        TransferInstruction {
            recipient: Address::new([byte; 20]),
            amount: Amount::from_u64(amount),
        }
    }

    #[test]
    fn test_claim_lifecycle() {
        let dir = TempDir::new().unwrap();
        let record = SledClaimRecord::open(dir.path()).unwrap();
        let recipient = Address::new([7; 20]);

        record.begin_claim(&recipient).unwrap();
        assert!(record.is_claimed(&recipient).unwrap());
        assert_eq!(record.pending().unwrap(), vec![recipient]);
        assert!(matches!(
            record.begin_claim(&recipient),
            Err(LedgerError::AlreadyClaimed(_))
        ));

        let event = ClaimEvent::new(&instruction(7, 42));
        record.commit_claim(&event).unwrap();
        assert_eq!(record.receipt(&recipient).unwrap(), Some(event));
        assert!(record.pending().unwrap().is_empty());
        assert_eq!(record.claimed_count().unwrap(), 1);
    }

    #[test]
    fn test_abort_releases_reservation() {
        let dir = TempDir::new().unwrap();
        let record = SledClaimRecord::open(dir.path()).unwrap();
        let recipient = Address::new([8; 20]);

        record.begin_claim(&recipient).unwrap();
        record.abort_claim(&recipient).unwrap();
        assert!(!record.is_claimed(&recipient).unwrap());
        assert!(record.abort_claim(&recipient).is_err());
    }

    #[test]
    fn test_commit_requires_reservation() {
        let dir = TempDir::new().unwrap();
        let record = SledClaimRecord::open(dir.path()).unwrap();
        let event = ClaimEvent::new(&instruction(9, 1));
        assert!(matches!(
            record.commit_claim(&event),
            Err(LedgerError::Storage(_))
        ));
    }

    #[test]
    fn test_commit_queues_transfer_atomically() {
        let dir = TempDir::new().unwrap();
        let db = open_db(dir.path()).unwrap();
        let record = SledClaimRecord::with_outbox(&db).unwrap();
        let outbox = TransferOutbox::with_db(&db).unwrap();
        let recipient = Address::new([10; 20]);

        record.begin_claim(&recipient).unwrap();
        assert!(outbox.is_empty());

        let event = ClaimEvent::new(&instruction(10, 70));
        record.commit_claim(&event).unwrap();
        assert_eq!(record.receipt(&recipient).unwrap(), Some(event));
        assert_eq!(outbox.list().unwrap(), vec![instruction(10, 70)]);
    }

    #[test]
    fn test_rejected_commit_queues_nothing() {
        let dir = TempDir::new().unwrap();
        let db = open_db(dir.path()).unwrap();
        let record = SledClaimRecord::with_outbox(&db).unwrap();
        let outbox = TransferOutbox::with_db(&db).unwrap();

        // Never reserved
        let event = ClaimEvent::new(&instruction(11, 5));
        assert!(matches!(
            record.commit_claim(&event),
            Err(LedgerError::Storage(_))
        ));
        assert!(outbox.is_empty());
        assert!(!record.is_claimed(&Address::new([11; 20])).unwrap());

        // Already committed
        let recipient = Address::new([12; 20]);
        record.begin_claim(&recipient).unwrap();
        let event = ClaimEvent::new(&instruction(12, 6));
        record.commit_claim(&event).unwrap();
        assert!(record.commit_claim(&event).is_err());
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn test_outbox_preserves_order() {
        let dir = TempDir::new().unwrap();
        let db = open_db(dir.path()).unwrap();
        let outbox = TransferOutbox::with_db(&db).unwrap();
        assert!(outbox.is_empty());

        outbox.execute(&instruction(1, 10)).unwrap();
        outbox.execute(&instruction(2, 20)).unwrap();

        assert_eq!(outbox.len(), 2);
        assert_eq!(
            outbox.list().unwrap(),
            vec![instruction(1, 10), instruction(2, 20)]
        );
    }
}
