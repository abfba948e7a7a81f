//! Value-transfer collaborators

use std::sync::Mutex;

use airdrop_types::{Amount, TransferInstruction};
use tracing::debug;

use crate::{LedgerError, Result};

/// Receives exactly one instruction per successful claim
///
/// An `Err` means nothing was transferred; the ledger then releases the
/// recipient's reservation.
pub trait TransferExecutor: Send + Sync {
    fn execute(&self, instruction: &TransferInstruction) -> Result<()>;
}

/// Executor for a claim record that queues the transfer itself when the
/// claim commits, see [`crate::storage::SledClaimRecord::with_outbox`]
#[derive(Debug, Default, Clone, Copy)]
pub struct QueuedOnCommit;

impl TransferExecutor for QueuedOnCommit {
    fn execute(&self, instruction: &TransferInstruction) -> Result<()> {
        debug!(recipient = %instruction.recipient, "transfer deferred to claim commit");
        Ok(())
    }
}

/// In-memory token balance that funds claims
#[derive(Debug)]
pub struct TokenVault {
    balance: Mutex<Amount>,
}

impl TokenVault {
    pub fn new(initial_balance: Amount) -> Self {
        Self {
            balance: Mutex::new(initial_balance),
        }
    }

    pub fn balance(&self) -> Result<Amount> {
        Ok(*self.balance.lock()?)
    }

    /// Add funds, e.g. to top up an underfunded distribution
    pub fn deposit(&self, amount: Amount) -> Result<Amount> {
        let mut balance = self.balance.lock()?;
        *balance = balance
            .checked_add(&amount)
            .ok_or_else(|| LedgerError::Transfer("Vault balance overflow".to_string()))?;
        Ok(*balance)
    }
}

impl TransferExecutor for TokenVault {
    fn execute(&self, instruction: &TransferInstruction) -> Result<()> {
        let mut balance = self.balance.lock()?;
        *balance = balance
            .checked_sub(&instruction.amount)
            .ok_or(LedgerError::InsufficientVaultBalance)?;

        debug!(
            recipient = %instruction.recipient,
            amount = %instruction.amount,
            remaining = %*balance,
            "vault disbursed"
        );
        Ok(())
    }
}

/// Debits a vault before handing the instruction to another executor
///
/// If the inner executor fails the debit is refunded.
#[derive(Debug)]
pub struct FundedExecutor<T> {
    vault: TokenVault,
    inner: T,
}

impl<T: TransferExecutor> FundedExecutor<T> {
    pub fn new(vault: TokenVault, inner: T) -> Self {
        Self { vault, inner }
    }

    pub fn vault(&self) -> &TokenVault {
        &self.vault
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: TransferExecutor> TransferExecutor for FundedExecutor<T> {
    fn execute(&self, instruction: &TransferInstruction) -> Result<()> {
        self.vault.execute(instruction)?;
        if let Err(e) = self.inner.execute(instruction) {
            self.vault.deposit(instruction.amount)?;
            return Err(e);
        }
        Ok(())
    }
}
