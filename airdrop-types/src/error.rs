//! Encoding error types for airdrop primitives

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Malformed fixed-width input. These are caller bugs and never retryable.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid address length: expected {expected}, got {actual}")]
    InvalidAddressLength { expected: usize, actual: usize },

    #[error("Invalid digest length: expected {expected}, got {actual}")]
    InvalidDigestLength { expected: usize, actual: usize },

    #[error("Amount exceeds {bits}-bit width")]
    AmountOverflow { bits: u32 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Hex encoding error: {0}")]
    HexEncoding(#[from] hex::FromHexError),
}
