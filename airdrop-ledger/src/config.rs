//! Ledger configuration

use std::path::{Path, PathBuf};

use airdrop_types::{Amount, Digest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides `distribution.merkle_root`
pub const MERKLE_ROOT_ENV: &str = "AIRDROP_MERKLE_ROOT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid AIRDROP_MERKLE_ROOT: {0}")]
    InvalidRoot(#[from] airdrop_types::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Committed distribution
    pub distribution: DistributionConfig,

    /// Claim database
    pub storage: StorageConfig,

    /// In-process vault (optional)
    #[serde(default)]
    pub vault: Option<VaultConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Root every claim is verified against
    pub merkle_root: Digest,

    /// Token contract or asset identifier, informational only
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the sled database directory
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Balance available to fund claims
    pub initial_balance: Amount,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            distribution: DistributionConfig {
                merkle_root: Digest::new([0u8; 32]),
                token: None,
            },
            storage: StorageConfig {
                path: PathBuf::from("airdrop-ledger.db"),
            },
            vault: None,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: LedgerConfig = toml::from_str(&contents)?;

        // Root published out of band takes precedence over the file
        if let Ok(root) = std::env::var(MERKLE_ROOT_ENV) {
            config.distribution.merkle_root = Digest::from_hex(&root)?;
        }

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.toml");

        let config = LedgerConfig {
            distribution: DistributionConfig {
                merkle_root: Digest::new([0xab; 32]),
                token: Some("0x00000000000000000000000000000000000000aa".to_string()),
            },
            storage: StorageConfig {
                path: dir.path().join("db"),
            },
            vault: Some(VaultConfig {
                initial_balance: Amount::from_u64(1_000_000),
            }),
        };
        config.to_file(&path).unwrap();

        // The override variable is not set in this test process
        if std::env::var(MERKLE_ROOT_ENV).is_err() {
            assert_eq!(LedgerConfig::from_file(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_minimal_file() {
        let toml = r#"
[distribution]
merkle_root = "0x46451dfcfffe56da3b9019027cda3f4cf0db85034ab47952da3a8db11d19dae3"

[storage]
path = "claims.db"
"#;
        let config: LedgerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.distribution.token, None);
        assert_eq!(config.vault, None);
        assert_eq!(config.storage.path, PathBuf::from("claims.db"));
    }

    #[test]
    fn test_malformed_root_rejected() {
        let toml = r#"
[distribution]
merkle_root = "0x1234"

[storage]
path = "claims.db"
"#;
        assert!(toml::from_str::<LedgerConfig>(toml).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            LedgerConfig::from_file(&dir.path().join("absent.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
