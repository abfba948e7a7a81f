//! Test doubles for exercising a ledger without real value transfer.

use std::collections::HashMap;
use std::sync::Mutex;

use airdrop_types::{Address, Amount, ClaimEvent, TransferInstruction};

use crate::events::ClaimEventSink;
use crate::transfer::TransferExecutor;
use crate::{LedgerError, Result};

/// Transfer executor that records every instruction it accepts
#[derive(Debug, Default)]
pub struct RecordingTransfer {
    instructions: Mutex<Vec<TransferInstruction>>,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions(&self) -> Vec<TransferInstruction> {
        self.instructions
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Sum of everything transferred to a recipient
    pub fn total_for(&self, recipient: &Address) -> Amount {
        self.instructions()
            .iter()
            .filter(|i| i.recipient == *recipient)
            .fold(Amount::ZERO, |acc, i| acc.checked_add(&i.amount).unwrap_or(Amount::MAX))
    }

    /// Per-recipient totals
    pub fn totals(&self) -> HashMap<Address, Amount> {
        let mut totals = HashMap::new();
        for i in self.instructions() {
            let entry = totals.entry(i.recipient).or_insert(Amount::ZERO);
            *entry = entry.checked_add(&i.amount).unwrap_or(Amount::MAX);
        }
        totals
    }
}

impl TransferExecutor for RecordingTransfer {
    fn execute(&self, instruction: &TransferInstruction) -> Result<()> {
        self.instructions.lock()?.push(*instruction);
        Ok(())
    }
}

/// Transfer executor that rejects every instruction
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingTransfer;

impl TransferExecutor for FailingTransfer {
    fn execute(&self, instruction: &TransferInstruction) -> Result<()> {
        Err(LedgerError::Transfer(format!(
            "transfer to {} refused",
            instruction.recipient
        )))
    }
}

/// Event sink that keeps published events in memory
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<ClaimEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClaimEvent> {
        self.events.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl ClaimEventSink for RecordingEventSink {
    fn publish(&self, event: &ClaimEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
