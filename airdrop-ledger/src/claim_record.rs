//! Per-recipient claim state
//!
//! Every recipient moves through `Unclaimed -> Pending -> Claimed`. The
//! `Pending` step exists so a claim can be reserved before the value transfer
//! runs and released again if that transfer fails; once `Claimed` is written
//! there is no way back.

use std::collections::HashMap;
use std::sync::Mutex;

use airdrop_types::{Address, ClaimEvent};
use tracing::debug;

use crate::{LedgerError, Result};

/// State of a recipient that has an entry in the record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    /// Reserved by an in-flight claim, transfer not yet confirmed
    Pending,
    /// Terminal, carries the receipt of the successful claim
    Claimed(ClaimEvent),
}

/// Atomic check-and-set store keyed by recipient
///
/// Implementations must make `begin_claim` a single atomic transition from
/// absent to `Pending`. A recipient with any entry, pending or claimed, is
/// taken.
pub trait ClaimRecord: Send + Sync {
    /// True if the recipient has a pending or committed claim
    fn is_claimed(&self, recipient: &Address) -> Result<bool>;

    /// Receipt of a committed claim
    fn receipt(&self, recipient: &Address) -> Result<Option<ClaimEvent>>;

    /// Reserve the recipient, failing with `AlreadyClaimed` if it is taken
    fn begin_claim(&self, recipient: &Address) -> Result<()>;

    /// Move a reserved recipient to `Claimed`
    fn commit_claim(&self, event: &ClaimEvent) -> Result<()>;

    /// Release a reservation whose transfer did not happen
    fn abort_claim(&self, recipient: &Address) -> Result<()>;

    /// Number of committed claims
    fn claimed_count(&self) -> Result<usize>;
}

/// Claim record held in process memory
#[derive(Debug, Default)]
pub struct InMemoryClaimRecord {
    states: Mutex<HashMap<Address, ClaimState>>,
}

impl InMemoryClaimRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a recipient, `None` when unclaimed
    pub fn state(&self, recipient: &Address) -> Result<Option<ClaimState>> {
        Ok(self.states.lock()?.get(recipient).cloned())
    }
}

impl ClaimRecord for InMemoryClaimRecord {
    fn is_claimed(&self, recipient: &Address) -> Result<bool> {
        Ok(self.states.lock()?.contains_key(recipient))
    }

    fn receipt(&self, recipient: &Address) -> Result<Option<ClaimEvent>> {
        match self.states.lock()?.get(recipient) {
            Some(ClaimState::Claimed(event)) => Ok(Some(event.clone())),
            _ => Ok(None),
        }
    }

    fn begin_claim(&self, recipient: &Address) -> Result<()> {
        let mut states = self.states.lock()?;
        if states.contains_key(recipient) {
            return Err(LedgerError::AlreadyClaimed(*recipient));
        }
        states.insert(*recipient, ClaimState::Pending);
        debug!(recipient = %recipient, "claim reserved");
        Ok(())
    }

    fn commit_claim(&self, event: &ClaimEvent) -> Result<()> {
        let mut states = self.states.lock()?;
        match states.get_mut(&event.recipient) {
            Some(state @ ClaimState::Pending) => {
                *state = ClaimState::Claimed(event.clone());
                Ok(())
            }
            _ => Err(LedgerError::Storage(format!(
                "No pending claim to commit for {}",
                event.recipient
            ))),
        }
    }

    fn abort_claim(&self, recipient: &Address) -> Result<()> {
        let mut states = self.states.lock()?;
        match states.get(recipient) {
            Some(ClaimState::Pending) => {
                states.remove(recipient);
                debug!(recipient = %recipient, "claim reservation released");
                Ok(())
            }
            _ => Err(LedgerError::Storage(format!(
                "No pending claim to abort for {}",
                recipient
            ))),
        }
    }

    fn claimed_count(&self) -> Result<usize> {
        Ok(self
            .states
            .lock()?
            .values()
            .filter(|s| matches!(s, ClaimState::Claimed(_)))
            .count())
    }
}
