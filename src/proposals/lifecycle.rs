//! Proposal lifecycle: open, sign, cancel.

use super::{Proposal, ProposalRegistry, ProposalRequest, ProposalStatus, SignatureRecord};
use crate::error::{TreasuryError, TreasuryResult};
use crate::policy::{PolicyEngine, SpendCheck, Stage};
use crate::types::{Amount, Principal, ProposalId, Timestamp, MAX_TRANSFERS};
use crate::vault::TreasuryVault;
use std::collections::BTreeMap;

impl ProposalRegistry {
    /// Open a new Pending proposal.
    ///
    /// The effective threshold is the largest of the requested threshold,
    /// the policy threshold for the total, and the vault's standard
    /// threshold. The time lock is the larger of the requested and
    /// policy-derived locks.
    pub fn open(
        &mut self,
        request: ProposalRequest,
        now: Timestamp,
        vault: &TreasuryVault,
        policy: &PolicyEngine,
    ) -> TreasuryResult<ProposalId> {
        self.ensure_not_paused()?;
        vault.require_signer(&request.creator, "open proposals")?;
        if vault.is_frozen() {
            return Err(TreasuryError::TreasuryFrozen);
        }
        vault.require_category(&request.category)?;

        let count = request.transfers.len();
        if count == 0 || count > MAX_TRANSFERS {
            return Err(TreasuryError::invalid(format!(
                "a proposal needs between 1 and {} transfers (got {})",
                MAX_TRANSFERS, count
            )));
        }
        if request.transfers.iter().any(|t| t.amount == 0) {
            return Err(TreasuryError::invalid("transfer amounts must be positive"));
        }
        let total = request
            .transfers
            .iter()
            .try_fold(0 as Amount, |acc, t| acc.checked_add(t.amount))
            .ok_or_else(|| TreasuryError::invalid("proposal total overflows"))?;

        policy.check_transfers(&SpendCheck {
            stage: Stage::Open,
            category: &request.category,
            transfers: &request.transfers,
            total,
            signed: &[],
            now,
        })?;

        let threshold = request
            .requested_threshold
            .unwrap_or(0)
            .max(policy.threshold_for(&request.category, total))
            .max(vault.threshold());
        let signer_count = vault.signers().len() as u32;
        if threshold > signer_count {
            return Err(TreasuryError::invalid(format!(
                "required threshold {} exceeds the {} available signers",
                threshold, signer_count
            )));
        }
        let lock = request
            .requested_time_lock
            .unwrap_or(0)
            .max(policy.time_lock_for(&request.category, total));

        let mut proposal = Proposal {
            id: self.next_id(),
            creator: request.creator,
            description: request.description,
            category: request.category,
            transfers: request.transfers,
            total,
            created_at: now,
            deadline: now.saturating_add(lock),
            threshold,
            signatures: BTreeMap::new(),
            status: ProposalStatus::Pending,
            executed_at: None,
            cancelled_at: None,
            digest: String::new(),
        };
        proposal.digest = proposal.compute_digest()?;

        let id = proposal.id;
        self.push(proposal);
        Ok(id)
    }

    /// Record `signer`'s approval. Returns the new signature count.
    pub fn sign(
        &mut self,
        id: ProposalId,
        signer: &Principal,
        now: Timestamp,
        vault: &TreasuryVault,
    ) -> TreasuryResult<u32> {
        let proposal = self.get_mut(id)?;
        if let Some(err) = proposal.status.terminal_error() {
            return Err(err);
        }
        vault.require_signer(signer, "sign proposals")?;
        if proposal.has_signed(signer) {
            return Err(TreasuryError::AlreadySigned(signer.clone()));
        }

        let digest = proposal.digest.clone();
        proposal.signatures.insert(
            signer.clone(),
            SignatureRecord {
                signed_at: now,
                digest,
            },
        );
        Ok(proposal.signature_count())
    }

    /// Cancel a Pending proposal.
    ///
    /// The creator may cancel at any time before execution. Any other
    /// standard signer may cancel only while nobody has signed.
    pub fn cancel(
        &mut self,
        id: ProposalId,
        canceller: &Principal,
        now: Timestamp,
        vault: &TreasuryVault,
    ) -> TreasuryResult<()> {
        let proposal = self.get_mut(id)?;
        if let Some(err) = proposal.status.terminal_error() {
            return Err(err);
        }

        let permitted = *canceller == proposal.creator
            || (vault.is_signer(canceller) && proposal.signatures.is_empty());
        if !permitted {
            return Err(TreasuryError::not_authorized(canceller, "cancel this proposal"));
        }

        proposal.status = ProposalStatus::Cancelled;
        proposal.cancelled_at = Some(now);
        Ok(())
    }
}
