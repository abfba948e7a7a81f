//! Claim audit events

use airdrop_types::ClaimEvent;
use tracing::info;

/// Observer of committed claims
pub trait ClaimEventSink: Send + Sync {
    fn publish(&self, event: &ClaimEvent);
}

/// Emits each claim as a structured `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl ClaimEventSink for TracingEventSink {
    fn publish(&self, event: &ClaimEvent) {
        info!(
            target: "airdrop::claim",
            recipient = %event.recipient,
            amount = %event.amount,
            claimed_at = %event.claimed_at.to_rfc3339(),
            "claim committed"
        );
    }
}
