//! Proposal execution: gating, re-validation, and the atomic commit.
//!
//! Every gate is evaluated against current state before anything is
//! written. Gate order: terminal status, registry pause, vault freeze,
//! signatures, time lock, policy re-validation, balance.

use super::{ProposalRegistry, ProposalStatus};
use crate::error::{TreasuryError, TreasuryResult};
use crate::policy::{PolicyEngine, SpendCheck, Stage};
use crate::types::{Amount, ProposalId, Timestamp, Transfer};
use crate::vault::TreasuryVault;
use serde::{Deserialize, Serialize};

/// Outcome of a successful execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub proposal: ProposalId,
    pub category: String,
    pub total: Amount,
    pub transfers: Vec<Transfer>,
    pub executed_at: Timestamp,
    pub digest: String,
    pub balance_after: Amount,
}

impl ProposalRegistry {
    /// Signatures that still count: those from current standard signers.
    pub fn valid_signatures(&self, id: ProposalId, vault: &TreasuryVault) -> TreasuryResult<u32> {
        let proposal = self.get(id)?;
        Ok(proposal
            .signatures
            .keys()
            .filter(|signer| vault.is_signer(signer))
            .count() as u32)
    }

    /// Whether the signature, time-lock, pause, and freeze gates all pass.
    ///
    /// Policy and balance are not consulted; `execute` re-checks those.
    pub fn can_execute(&self, id: ProposalId, now: Timestamp, vault: &TreasuryVault) -> bool {
        self.check_gates(id, now, vault).is_ok()
    }

    fn check_gates(&self, id: ProposalId, now: Timestamp, vault: &TreasuryVault) -> TreasuryResult<()> {
        let proposal = self.get(id)?;
        if let Some(err) = proposal.status.terminal_error() {
            return Err(err);
        }
        self.ensure_not_paused()?;
        if vault.is_frozen() {
            return Err(TreasuryError::TreasuryFrozen);
        }
        let have = self.valid_signatures(id, vault)?;
        if have < proposal.threshold {
            return Err(TreasuryError::InsufficientSignatures {
                have,
                need: proposal.threshold,
            });
        }
        if now < proposal.deadline {
            return Err(TreasuryError::TimeLockNotReady {
                ready_at: proposal.deadline,
                now,
            });
        }
        Ok(())
    }

    /// Run every execution check without mutating anything.
    pub fn check_execute(
        &self,
        id: ProposalId,
        now: Timestamp,
        vault: &TreasuryVault,
        policy: &PolicyEngine,
    ) -> TreasuryResult<()> {
        self.check_gates(id, now, vault)?;

        let proposal = self.get(id)?;
        let signed = proposal.signers();
        policy.check_transfers(&SpendCheck {
            stage: Stage::Execute,
            category: &proposal.category,
            transfers: &proposal.transfers,
            total: proposal.total,
            signed: &signed,
            now,
        })?;
        vault.check_debit(&proposal.category, proposal.total)
    }

    /// Execute a proposal: one debit for the batch total, then spend
    /// accounting, then the status transition.
    ///
    /// On any failure the proposal stays Pending and neither the vault nor
    /// the policy counters change.
    pub fn execute(
        &mut self,
        id: ProposalId,
        now: Timestamp,
        vault: &mut TreasuryVault,
        policy: &mut PolicyEngine,
    ) -> TreasuryResult<ExecutionReceipt> {
        self.check_execute(id, now, vault, policy)?;

        let proposal = self.get_mut(id)?;
        vault.debit(&proposal.category, proposal.total)?;
        policy.record_spending(&proposal.category, proposal.total, now);
        proposal.status = ProposalStatus::Executed;
        proposal.executed_at = Some(now);

        Ok(ExecutionReceipt {
            proposal: id,
            category: proposal.category.clone(),
            total: proposal.total,
            transfers: proposal.transfers.clone(),
            executed_at: now,
            digest: proposal.digest.clone(),
            balance_after: vault.balance(),
        })
    }
}
