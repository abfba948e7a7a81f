//! Airdrop CLI Library
//!
//! Source-list ingestion and manifest files for the `airdrop` tool

pub mod ingest;
pub mod manifest;

pub use ingest::{parse_entitlements, read_entitlements};
pub use manifest::{read_manifest, write_manifest};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required column '{0}' in header")]
    MissingColumn(&'static str),

    #[error("Input has no header row")]
    EmptyInput,

    #[error("Line {line}: {source}")]
    InvalidRow {
        line: usize,
        source: airdrop_types::Error,
    },

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] airdrop_types::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
