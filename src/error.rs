//! Engine error taxonomy.
//!
//! Every rejected operation reports one of these kinds synchronously. No
//! variant implies partial mutation: the proposal, action, or vault stays in
//! the state it had before the call.

use crate::types::{ActionId, Amount, Principal, ProposalId, Timestamp};

/// Result type for engine operations.
pub type TreasuryResult<T> = Result<T, TreasuryError>;

/// Treasury engine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreasuryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{principal} is not authorized to {action}")]
    NotAuthorized {
        principal: Principal,
        action: &'static str,
    },

    #[error("{0} has already signed")]
    AlreadySigned(Principal),

    #[error("Insufficient signatures: {have}/{need}")]
    InsufficientSignatures { have: u32, need: u32 },

    #[error("Time lock active until {ready_at} (now {now})")]
    TimeLockNotReady { ready_at: Timestamp, now: Timestamp },

    #[error("Treasury is frozen")]
    TreasuryFrozen,

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("Policy violation ({policy}): {reason}")]
    PolicyViolation { policy: String, reason: String },

    #[error("Already executed")]
    AlreadyExecuted,

    #[error("Already cancelled")]
    AlreadyCancelled,

    #[error("Emergency cooldown active for another {remaining}s")]
    CooldownActive { remaining: u64 },

    #[error("Proposal {0} not found")]
    ProposalNotFound(ProposalId),

    #[error("Emergency action {0} not found")]
    ActionNotFound(ActionId),

    #[error("Proposals are paused")]
    ProposalsPaused,

    #[error("Emergency actions are paused")]
    EmergencyPaused,
}

impl TreasuryError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_authorized(principal: &Principal, action: &'static str) -> Self {
        Self::NotAuthorized {
            principal: principal.clone(),
            action,
        }
    }

    pub fn policy(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PolicyViolation {
            policy: policy.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call later can succeed without any other
    /// state change (time passing is the only thing that has to happen).
    pub fn is_time_dependent(&self) -> bool {
        matches!(
            self,
            Self::TimeLockNotReady { .. } | Self::CooldownActive { .. }
        )
    }
}
