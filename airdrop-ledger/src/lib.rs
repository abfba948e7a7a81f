//! Airdrop Claim Ledger
//!
//! Verifies claims against a committed Merkle root and guarantees that each
//! recipient is paid at most once.

pub mod claim_record;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod storage;
pub mod testutil;
pub mod transfer;

pub use claim_record::{ClaimRecord, ClaimState, InMemoryClaimRecord};
pub use config::{ConfigError, LedgerConfig};
pub use error::{LedgerError, Result};
pub use events::{ClaimEventSink, TracingEventSink};
pub use ledger::ClaimLedger;
pub use storage::{open_db, SledClaimRecord, TransferOutbox};
pub use transfer::{FundedExecutor, QueuedOnCommit, TokenVault, TransferExecutor};
