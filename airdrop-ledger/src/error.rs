use airdrop_types::{Address, TransferInstruction};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid proof")]
    InvalidProof,

    #[error("Recipient {0} has already claimed")]
    AlreadyClaimed(Address),

    #[error("Encoding error: {0}")]
    Encoding(#[from] airdrop_types::Error),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// The transfer went out but the claim could not be committed
    #[error("Transfer {instruction:?} executed but claim not recorded: {reason}")]
    InDoubt {
        instruction: TransferInstruction,
        reason: String,
    },

    #[error("Vault balance insufficient for claim")]
    InsufficientVaultBalance,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Claim record lock poisoned")]
    LockPoisoned,
}

impl<T> From<std::sync::PoisonError<T>> for LedgerError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        LedgerError::LockPoisoned
    }
}
