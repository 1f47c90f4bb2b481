//! Structured events emitted on every successful state transition.

pub mod audit_trail;

pub use audit_trail::{format_events, query_events, EventLog, EventQuery};

use crate::types::{Amount, Principal, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Deposited,
    ProposalCreated,
    ProposalSigned,
    ProposalExecuted,
    ProposalCancelled,
    PolicyUpdated,
    RecipientsChanged,
    PeriodReset,
    SignersChanged,
    CategoryAdded,
    EmergencyCreated,
    EmergencySigned,
    EmergencyExecuted,
    EmergencyCancelled,
    Frozen,
    Unfrozen,
    EmergencyWithdrawal,
    ProposalsPauseToggled,
    EmergencyPauseToggled,
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Deposited => "Deposit",
            EventKind::ProposalCreated => "Proposal Created",
            EventKind::ProposalSigned => "Proposal Signed",
            EventKind::ProposalExecuted => "Proposal Executed",
            EventKind::ProposalCancelled => "Proposal Cancelled",
            EventKind::PolicyUpdated => "Policy Updated",
            EventKind::RecipientsChanged => "Recipients Changed",
            EventKind::PeriodReset => "Period Reset",
            EventKind::SignersChanged => "Signers Changed",
            EventKind::CategoryAdded => "Category Added",
            EventKind::EmergencyCreated => "Emergency Created",
            EventKind::EmergencySigned => "Emergency Signed",
            EventKind::EmergencyExecuted => "Emergency Executed",
            EventKind::EmergencyCancelled => "Emergency Cancelled",
            EventKind::Frozen => "Frozen",
            EventKind::Unfrozen => "Unfrozen",
            EventKind::EmergencyWithdrawal => "Emergency Withdrawal",
            EventKind::ProposalsPauseToggled => "Proposals Pause Toggled",
            EventKind::EmergencyPauseToggled => "Emergency Pause Toggled",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryEvent {
    /// Position in the log, assigned on append.
    pub seq: u64,
    pub kind: EventKind,
    /// Entity the event concerns ("P-3", "E-1", a policy name, a category).
    pub entity: String,
    pub actor: Principal,
    #[serde(default)]
    pub amount: Option<Amount>,
    /// Resulting count (signatures, signers) where meaningful.
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub details: String,
    pub timestamp: Timestamp,
}

impl TreasuryEvent {
    pub fn new(kind: EventKind, entity: impl Into<String>, actor: &Principal, timestamp: Timestamp) -> Self {
        Self {
            seq: 0,
            kind,
            entity: entity.into(),
            actor: actor.clone(),
            amount: None,
            count: None,
            details: String::new(),
            timestamp,
        }
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

/// Subscriber for emitted events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &TreasuryEvent);
}

/// Forwards events to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &TreasuryEvent) {
        tracing::info!(
            seq = event.seq,
            kind = event.kind.label(),
            entity = %event.entity,
            actor = %event.actor,
            amount = event.amount,
            count = event.count,
            timestamp = event.timestamp,
            "{}",
            event.details
        );
    }
}

/// Collects events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<TreasuryEvent>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TreasuryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &TreasuryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
