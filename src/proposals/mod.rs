//! Proposal registry: the spending proposal state machine.
//!
//! States: `Pending -> {Executed, Cancelled}`. Both outcomes are terminal.
//! Proposals live in an append-only arena and are addressed by
//! `ProposalId`, which is the arena index.

pub mod executor;
pub mod lifecycle;

pub use executor::ExecutionReceipt;

use crate::error::{TreasuryError, TreasuryResult};
use crate::serialization::to_cbor;
use crate::types::{Amount, Principal, ProposalId, Timestamp, Transfer};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Pending,
    Executed,
    Cancelled,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }

    /// Error for an operation attempted on a terminal proposal.
    pub(crate) fn terminal_error(&self) -> Option<TreasuryError> {
        match self {
            ProposalStatus::Pending => None,
            ProposalStatus::Executed => Some(TreasuryError::AlreadyExecuted),
            ProposalStatus::Cancelled => Some(TreasuryError::AlreadyCancelled),
        }
    }
}

/// One signer's approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub signed_at: Timestamp,
    /// Proposal digest the signer approved.
    pub digest: String,
}

/// Caller input for opening a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRequest {
    pub creator: Principal,
    pub category: String,
    pub description: String,
    pub transfers: Vec<Transfer>,
    /// Lower bound on the time lock; policy may raise it.
    #[serde(default)]
    pub requested_time_lock: Option<u64>,
    /// Lower bound on the threshold; policy may raise it.
    #[serde(default)]
    pub requested_threshold: Option<u32>,
}

impl ProposalRequest {
    /// Build a request from parallel recipient and amount lists.
    pub fn from_parallel(
        creator: Principal,
        category: impl Into<String>,
        description: impl Into<String>,
        recipients: Vec<Principal>,
        amounts: Vec<Amount>,
    ) -> TreasuryResult<Self> {
        if recipients.len() != amounts.len() {
            return Err(TreasuryError::invalid(format!(
                "{} recipients but {} amounts",
                recipients.len(),
                amounts.len()
            )));
        }
        let transfers = recipients
            .into_iter()
            .zip(amounts)
            .map(|(recipient, amount)| Transfer { recipient, amount })
            .collect();
        Ok(Self {
            creator,
            category: category.into(),
            description: description.into(),
            transfers,
            requested_time_lock: None,
            requested_threshold: None,
        })
    }

    pub fn with_time_lock(mut self, secs: u64) -> Self {
        self.requested_time_lock = Some(secs);
        self
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.requested_threshold = Some(threshold);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub creator: Principal,
    pub description: String,
    pub category: String,
    pub transfers: Vec<Transfer>,
    pub total: Amount,
    pub created_at: Timestamp,
    /// Earliest execution time.
    pub deadline: Timestamp,
    pub threshold: u32,
    pub signatures: BTreeMap<Principal, SignatureRecord>,
    pub status: ProposalStatus,
    #[serde(default)]
    pub executed_at: Option<Timestamp>,
    #[serde(default)]
    pub cancelled_at: Option<Timestamp>,
    /// Hex SHA-256 over the immutable proposal content.
    pub digest: String,
}

/// Fields covered by the proposal digest.
#[derive(Serialize)]
struct DigestContent<'a> {
    id: ProposalId,
    creator: &'a Principal,
    category: &'a str,
    description: &'a str,
    transfers: &'a [Transfer],
    threshold: u32,
    deadline: Timestamp,
}

impl Proposal {
    pub fn signature_count(&self) -> u32 {
        self.signatures.len() as u32
    }

    pub fn has_signed(&self, principal: &Principal) -> bool {
        self.signatures.contains_key(principal)
    }

    pub fn signers(&self) -> Vec<&Principal> {
        self.signatures.keys().collect()
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }

    pub fn recipients(&self) -> Vec<Principal> {
        self.transfers.iter().map(|t| t.recipient.clone()).collect()
    }

    pub(crate) fn compute_digest(&self) -> TreasuryResult<String> {
        let content = DigestContent {
            id: self.id,
            creator: &self.creator,
            category: &self.category,
            description: &self.description,
            transfers: &self.transfers,
            threshold: self.threshold,
            deadline: self.deadline,
        };
        let bytes = to_cbor(&content).map_err(|e| TreasuryError::invalid(e.to_string()))?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Whether the stored digest still matches the proposal content.
    pub fn verify_digest(&self) -> bool {
        self.compute_digest().is_ok_and(|d| d == self.digest)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRegistry {
    proposals: Vec<Proposal>,
    paused: bool,
}

impl ProposalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ProposalId) -> TreasuryResult<&Proposal> {
        usize::try_from(id.0)
            .ok()
            .and_then(|idx| self.proposals.get(idx))
            .ok_or(TreasuryError::ProposalNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: ProposalId) -> TreasuryResult<&mut Proposal> {
        usize::try_from(id.0)
            .ok()
            .and_then(|idx| self.proposals.get_mut(idx))
            .ok_or(TreasuryError::ProposalNotFound(id))
    }

    /// Proposals in creation order, optionally filtered by status.
    pub fn list(&self, status: Option<ProposalStatus>) -> Vec<&Proposal> {
        self.proposals
            .iter()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.proposals.iter().filter(|p| p.is_pending()).count()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub(crate) fn next_id(&self) -> ProposalId {
        ProposalId(self.proposals.len() as u64)
    }

    pub(crate) fn push(&mut self, proposal: Proposal) {
        self.proposals.push(proposal);
    }

    pub(crate) fn ensure_not_paused(&self) -> TreasuryResult<()> {
        if self.paused {
            return Err(TreasuryError::ProposalsPaused);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> Proposal {
        let mut p = Proposal {
            id: ProposalId(0),
            creator: Principal::from("alice"),
            description: "rent".to_string(),
            category: "ops".to_string(),
            transfers: vec![Transfer::new("landlord", 1_200)],
            total: 1_200,
            created_at: 100,
            deadline: 200,
            threshold: 2,
            signatures: BTreeMap::new(),
            status: ProposalStatus::Pending,
            executed_at: None,
            cancelled_at: None,
            digest: String::new(),
        };
        p.digest = p.compute_digest().unwrap();
        p
    }

    #[test]
    fn test_digest_is_stable_and_content_bound() {
        let p = proposal();
        assert_eq!(p.digest.len(), 64);
        assert!(p.verify_digest());

        let mut tampered = p.clone();
        tampered.transfers[0].amount = 12_000;
        assert!(!tampered.verify_digest());
    }

    #[test]
    fn test_digest_ignores_signatures() {
        let mut p = proposal();
        p.signatures.insert(
            Principal::from("bob"),
            SignatureRecord {
                signed_at: 150,
                digest: p.digest.clone(),
            },
        );
        assert!(p.verify_digest());
        assert_eq!(p.signature_count(), 1);
    }

    #[test]
    fn test_from_parallel_rejects_mismatch() {
        let result = ProposalRequest::from_parallel(
            Principal::from("alice"),
            "ops",
            "two payees",
            vec![Principal::from("a"), Principal::from("b")],
            vec![10],
        );
        assert!(matches!(result, Err(TreasuryError::InvalidInput(_))));
    }

    #[test]
    fn test_registry_lookup_and_filter() {
        let mut registry = ProposalRegistry::new();
        assert!(matches!(
            registry.get(ProposalId(0)),
            Err(TreasuryError::ProposalNotFound(_))
        ));
        registry.push(proposal());
        let mut done = proposal();
        done.id = ProposalId(1);
        done.status = ProposalStatus::Executed;
        registry.push(done);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.pending_count(), 1);
        assert_eq!(registry.list(Some(ProposalStatus::Executed)).len(), 1);
        assert_eq!(registry.list(None).len(), 2);
        assert_eq!(registry.next_id(), ProposalId(2));
    }

    #[test]
    fn test_terminal_errors() {
        assert_eq!(ProposalStatus::Pending.terminal_error(), None);
        assert_eq!(
            ProposalStatus::Executed.terminal_error(),
            Some(TreasuryError::AlreadyExecuted)
        );
        assert_eq!(
            ProposalStatus::Cancelled.terminal_error(),
            Some(TreasuryError::AlreadyCancelled)
        );
    }
}
