//! Emergency controller: supermajority-gated override actions.
//!
//! Actions follow `Pending -> {Executed, Cancelled}` like proposals, but are
//! gated by the emergency signer set and threshold, carry no time lock, and
//! are rate limited by a controller-wide cooldown measured from the last
//! successful execution.

use crate::error::{TreasuryError, TreasuryResult};
use crate::proposals::ProposalRegistry;
use crate::types::{ActionId, Amount, Principal, Timestamp};
use crate::vault::TreasuryVault;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default cooldown between emergency executions (24h).
pub const DEFAULT_COOLDOWN_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyActionKind {
    Freeze,
    Unfreeze,
    /// Move funds out directly, ignoring policy and the frozen flag.
    Withdrawal { recipient: Principal, amount: Amount },
    /// Flip the proposal registry's pause flag.
    PauseProposals,
}

impl EmergencyActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            EmergencyActionKind::Freeze => "freeze",
            EmergencyActionKind::Unfreeze => "unfreeze",
            EmergencyActionKind::Withdrawal { .. } => "withdrawal",
            EmergencyActionKind::PauseProposals => "pause_proposals",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Pending,
    Executed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyAction {
    pub id: ActionId,
    pub kind: EmergencyActionKind,
    pub creator: Principal,
    pub justification: String,
    /// Signer -> signing time.
    pub signatures: BTreeMap<Principal, Timestamp>,
    pub status: ActionStatus,
    pub created_at: Timestamp,
    #[serde(default)]
    pub executed_at: Option<Timestamp>,
}

impl EmergencyAction {
    pub fn signature_count(&self) -> u32 {
        self.signatures.len() as u32
    }

    /// A current emergency signer who approved this action.
    fn approving_signer<'a>(&'a self, vault: &TreasuryVault) -> TreasuryResult<&'a Principal> {
        self.signatures
            .keys()
            .find(|s| vault.is_emergency_signer(s))
            .ok_or_else(|| TreasuryError::not_authorized(&self.creator, "freeze the treasury"))
    }

    fn ensure_pending(&self) -> TreasuryResult<()> {
        match self.status {
            ActionStatus::Pending => Ok(()),
            ActionStatus::Executed => Err(TreasuryError::AlreadyExecuted),
            ActionStatus::Cancelled => Err(TreasuryError::AlreadyCancelled),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyController {
    actions: Vec<EmergencyAction>,
    cooldown_period: u64,
    last_emergency_time: Option<Timestamp>,
    paused: bool,
}

impl Default for EmergencyController {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_SECS)
    }
}

impl EmergencyController {
    pub fn new(cooldown_period: u64) -> Self {
        Self {
            actions: Vec::new(),
            cooldown_period,
            last_emergency_time: None,
            paused: false,
        }
    }

    pub fn create_action(
        &mut self,
        kind: EmergencyActionKind,
        creator: &Principal,
        justification: &str,
        now: Timestamp,
        vault: &TreasuryVault,
    ) -> TreasuryResult<ActionId> {
        if self.paused {
            return Err(TreasuryError::EmergencyPaused);
        }
        vault.require_emergency_signer(creator, "create emergency actions")?;
        if justification.trim().is_empty() {
            return Err(TreasuryError::invalid("emergency actions need a justification"));
        }
        if let EmergencyActionKind::Withdrawal { amount: 0, .. } = kind {
            return Err(TreasuryError::invalid("withdrawal amount must be positive"));
        }

        let id = ActionId(self.actions.len() as u64);
        self.actions.push(EmergencyAction {
            id,
            kind,
            creator: creator.clone(),
            justification: justification.to_string(),
            signatures: BTreeMap::new(),
            status: ActionStatus::Pending,
            created_at: now,
            executed_at: None,
        });
        Ok(id)
    }

    /// Record an emergency signer's approval. Returns the new count.
    pub fn sign_action(
        &mut self,
        id: ActionId,
        signer: &Principal,
        now: Timestamp,
        vault: &TreasuryVault,
    ) -> TreasuryResult<u32> {
        let action = self.get_mut(id)?;
        action.ensure_pending()?;
        vault.require_emergency_signer(signer, "sign emergency actions")?;
        if action.signatures.contains_key(signer) {
            return Err(TreasuryError::AlreadySigned(signer.clone()));
        }
        action.signatures.insert(signer.clone(), now);
        Ok(action.signature_count())
    }

    /// Signatures from principals still in the emergency set.
    pub fn valid_signatures(&self, id: ActionId, vault: &TreasuryVault) -> TreasuryResult<u32> {
        let action = self.get(id)?;
        Ok(action
            .signatures
            .keys()
            .filter(|s| vault.is_emergency_signer(s))
            .count() as u32)
    }

    /// Pending, not paused, and at or above the emergency threshold.
    ///
    /// The cooldown is time-dependent and reported by `cooldown_remaining`.
    pub fn can_execute(&self, id: ActionId, vault: &TreasuryVault) -> bool {
        let Ok(action) = self.get(id) else {
            return false;
        };
        action.status == ActionStatus::Pending
            && !self.paused
            && self
                .valid_signatures(id, vault)
                .is_ok_and(|n| n >= vault.emergency_threshold())
    }

    /// Seconds until another emergency action may execute.
    pub fn cooldown_remaining(&self, now: Timestamp) -> u64 {
        match self.last_emergency_time {
            Some(last) => last.saturating_add(self.cooldown_period).saturating_sub(now),
            None => 0,
        }
    }

    /// Execute an action once threshold is met and the cooldown has elapsed.
    pub fn execute_action(
        &mut self,
        id: ActionId,
        now: Timestamp,
        vault: &mut TreasuryVault,
        registry: &mut ProposalRegistry,
    ) -> TreasuryResult<()> {
        self.check_execute(id, now, vault)?;

        let count = self.valid_signatures(id, vault)?;
        let action = self.get(id)?;
        match &action.kind {
            EmergencyActionKind::Freeze => {
                let authority = action.approving_signer(vault)?;
                vault.freeze(authority)?
            }
            EmergencyActionKind::Unfreeze => vault.unfreeze(count)?,
            EmergencyActionKind::Withdrawal { amount, .. } => vault.withdraw_emergency(*amount)?,
            EmergencyActionKind::PauseProposals => registry.set_paused(!registry.is_paused()),
        }

        self.last_emergency_time = Some(now);
        let action = self.get_mut(id)?;
        action.status = ActionStatus::Executed;
        action.executed_at = Some(now);
        Ok(())
    }

    fn check_execute(&self, id: ActionId, now: Timestamp, vault: &TreasuryVault) -> TreasuryResult<()> {
        let action = self.get(id)?;
        action.ensure_pending()?;
        if self.paused {
            return Err(TreasuryError::EmergencyPaused);
        }
        let remaining = self.cooldown_remaining(now);
        if remaining > 0 {
            return Err(TreasuryError::CooldownActive { remaining });
        }
        let have = self.valid_signatures(id, vault)?;
        let need = vault.emergency_threshold();
        if have < need {
            return Err(TreasuryError::InsufficientSignatures { have, need });
        }
        match &action.kind {
            EmergencyActionKind::Freeze => vault.check_freeze(action.approving_signer(vault)?),
            EmergencyActionKind::Unfreeze => vault.check_unfreeze(have),
            EmergencyActionKind::Withdrawal { amount, .. } => {
                if *amount > vault.balance() {
                    return Err(TreasuryError::InsufficientBalance {
                        requested: *amount,
                        available: vault.balance(),
                    });
                }
                Ok(())
            }
            EmergencyActionKind::PauseProposals => Ok(()),
        }
    }

    /// Cancel a Pending action: the creator at any time, any other
    /// emergency signer only while unsigned.
    pub fn cancel_action(
        &mut self,
        id: ActionId,
        canceller: &Principal,
        vault: &TreasuryVault,
    ) -> TreasuryResult<()> {
        let action = self.get_mut(id)?;
        action.ensure_pending()?;
        let permitted = *canceller == action.creator
            || (vault.is_emergency_signer(canceller) && action.signatures.is_empty());
        if !permitted {
            return Err(TreasuryError::not_authorized(
                canceller,
                "cancel this emergency action",
            ));
        }
        action.status = ActionStatus::Cancelled;
        Ok(())
    }

    /// Flip the controller's own pause flag. Returns the new state.
    ///
    /// Any single emergency signer may toggle, in either direction. A pause
    /// blocks creating and executing actions, Freeze included, until another
    /// toggle lifts it.
    pub fn toggle_pause(&mut self, caller: &Principal, vault: &TreasuryVault) -> TreasuryResult<bool> {
        vault.require_emergency_signer(caller, "pause emergency actions")?;
        self.paused = !self.paused;
        Ok(self.paused)
    }

    pub fn get(&self, id: ActionId) -> TreasuryResult<&EmergencyAction> {
        usize::try_from(id.0)
            .ok()
            .and_then(|idx| self.actions.get(idx))
            .ok_or(TreasuryError::ActionNotFound(id))
    }

    fn get_mut(&mut self, id: ActionId) -> TreasuryResult<&mut EmergencyAction> {
        usize::try_from(id.0)
            .ok()
            .and_then(|idx| self.actions.get_mut(idx))
            .ok_or(TreasuryError::ActionNotFound(id))
    }

    pub fn actions(&self) -> &[EmergencyAction] {
        &self.actions
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn cooldown_period(&self) -> u64 {
        self.cooldown_period
    }

    pub fn last_emergency_time(&self) -> Option<Timestamp> {
        self.last_emergency_time
    }
}
