//! The treasury context: one owner for the vault, policy engine, proposal
//! registry, emergency controller, event log, and spend history.
//!
//! Every public operation is a single transaction against this object. On
//! success it appends an event, forwards it to registered sinks, and logs
//! the transition. On failure nothing changes and the error is returned.

use crate::emergency::{EmergencyActionKind, EmergencyController};
use crate::error::TreasuryResult;
use crate::events::{EventKind, EventLog, EventQuery, EventSink, TreasuryEvent};
use crate::policy::{PeriodKind, PolicyEngine, PolicyRule};
use crate::proposals::{ExecutionReceipt, ProposalRegistry, ProposalRequest};
use crate::serialization::SnapshotEnvelope;
use crate::types::{ActionId, Amount, Principal, ProposalId, Timestamp};
use crate::vault::{TreasuryVault, VaultParams};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One executed spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRecord {
    pub proposal: ProposalId,
    pub category: String,
    pub amount: Amount,
    pub recipients: Vec<Principal>,
    pub executed_at: Timestamp,
    pub digest: String,
}

/// Everything that is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryState {
    pub vault: TreasuryVault,
    pub policy: PolicyEngine,
    pub proposals: ProposalRegistry,
    pub emergency: EmergencyController,
    #[serde(default)]
    pub events: EventLog,
    #[serde(default)]
    pub history: Vec<SpendRecord>,
}

/// Point-in-time overview for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasurySummary {
    pub balance: Amount,
    pub total_deposited: Amount,
    pub total_spent: Amount,
    pub signers: usize,
    pub threshold: u32,
    pub emergency_signers: usize,
    pub emergency_threshold: u32,
    pub frozen: bool,
    pub proposals_paused: bool,
    pub emergency_paused: bool,
    pub pending_proposals: usize,
    pub categories: Vec<String>,
    pub policies: Vec<String>,
    pub cooldown_remaining: u64,
}

impl fmt::Display for TreasurySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Balance:            {}", self.balance)?;
        writeln!(f, "Total deposited:    {}", self.total_deposited)?;
        writeln!(f, "Total spent:        {}", self.total_spent)?;
        writeln!(f, "Signers:            {} (threshold {})", self.signers, self.threshold)?;
        writeln!(
            f,
            "Emergency signers:  {} (threshold {})",
            self.emergency_signers, self.emergency_threshold
        )?;
        writeln!(f, "Frozen:             {}", yes_no(self.frozen))?;
        writeln!(f, "Proposals paused:   {}", yes_no(self.proposals_paused))?;
        writeln!(f, "Emergency paused:   {}", yes_no(self.emergency_paused))?;
        writeln!(f, "Pending proposals:  {}", self.pending_proposals)?;
        writeln!(f, "Categories:         {}", self.categories.join(", "))?;
        writeln!(f, "Policies:           {}", list_or_none(&self.policies))?;
        write!(f, "Emergency cooldown: {}s remaining", self.cooldown_remaining)
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

pub struct Treasury {
    state: TreasuryState,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl fmt::Debug for Treasury {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Treasury")
            .field("state", &self.state)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Treasury {
    /// Genesis: an empty vault with no policies.
    pub fn new(params: VaultParams, emergency_cooldown: u64) -> TreasuryResult<Self> {
        let vault = TreasuryVault::new(params)?;
        info!(
            signers = vault.signers().len(),
            threshold = vault.threshold(),
            emergency_signers = vault.emergency_signers().len(),
            emergency_threshold = vault.emergency_threshold(),
            "treasury created"
        );
        Ok(Self::from_state(TreasuryState {
            vault,
            policy: PolicyEngine::new(),
            proposals: ProposalRegistry::new(),
            emergency: EmergencyController::new(emergency_cooldown),
            events: EventLog::new(),
            history: Vec::new(),
        }))
    }

    pub fn from_state(state: TreasuryState) -> Self {
        Self {
            state,
            sinks: Vec::new(),
        }
    }

    /// Rebuild from a persisted snapshot.
    pub fn restore(envelope: SnapshotEnvelope) -> Self {
        debug!(
            schema_version = envelope.schema_version,
            taken_at = envelope.taken_at,
            "restoring treasury snapshot"
        );
        Self::from_state(envelope.state)
    }

    pub fn snapshot(&self, now: Timestamp) -> SnapshotEnvelope {
        SnapshotEnvelope::new(self.state.clone(), now)
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    // ----- funds -----

    pub fn deposit(&mut self, depositor: &Principal, amount: Amount, now: Timestamp) -> TreasuryResult<Amount> {
        let balance = self.state.vault.deposit(depositor, amount)?;
        info!(depositor = %depositor, amount, balance, "deposit accepted");
        self.record(TreasuryEvent::new(EventKind::Deposited, "vault", depositor, now).with_amount(amount));
        Ok(balance)
    }

    // ----- proposals -----

    pub fn open_proposal(&mut self, request: ProposalRequest, now: Timestamp) -> TreasuryResult<ProposalId> {
        let creator = request.creator.clone();
        let id = self
            .state
            .proposals
            .open(request, now, &self.state.vault, &self.state.policy)
            .inspect_err(|e| warn!(creator = %creator, error = %e, "proposal rejected"))?;

        let proposal = self.state.proposals.get(id)?;
        let (total, threshold, deadline) = (proposal.total, proposal.threshold, proposal.deadline);
        info!(proposal = %id, creator = %creator, total, threshold, deadline, "proposal opened");
        self.record(
            TreasuryEvent::new(EventKind::ProposalCreated, id.to_string(), &creator, now)
                .with_amount(total)
                .with_count(threshold)
                .with_details(format!("executable at {}", deadline)),
        );
        Ok(id)
    }

    pub fn sign_proposal(&mut self, id: ProposalId, signer: &Principal, now: Timestamp) -> TreasuryResult<u32> {
        let count = self
            .state
            .proposals
            .sign(id, signer, now, &self.state.vault)?;
        debug!(proposal = %id, signer = %signer, count, "proposal signed");
        self.record(TreasuryEvent::new(EventKind::ProposalSigned, id.to_string(), signer, now).with_count(count));
        Ok(count)
    }

    pub fn can_execute(&self, id: ProposalId, now: Timestamp) -> bool {
        self.state.proposals.can_execute(id, now, &self.state.vault)
    }

    /// Execute a proposal. `executor` is recorded as the event actor; anyone
    /// may trigger execution once the gates pass.
    pub fn execute_proposal(
        &mut self,
        id: ProposalId,
        executor: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<ExecutionReceipt> {
        let receipt = self
            .state
            .proposals
            .execute(id, now, &mut self.state.vault, &mut self.state.policy)
            .inspect_err(|e| warn!(proposal = %id, error = %e, "execution rejected"))?;

        self.state.history.push(SpendRecord {
            proposal: id,
            category: receipt.category.clone(),
            amount: receipt.total,
            recipients: receipt.transfers.iter().map(|t| t.recipient.clone()).collect(),
            executed_at: now,
            digest: receipt.digest.clone(),
        });
        info!(
            proposal = %id,
            category = %receipt.category,
            total = receipt.total,
            balance = receipt.balance_after,
            "proposal executed"
        );
        self.record(
            TreasuryEvent::new(EventKind::ProposalExecuted, id.to_string(), executor, now)
                .with_amount(receipt.total)
                .with_details(format!("category {}", receipt.category)),
        );
        Ok(receipt)
    }

    pub fn cancel_proposal(&mut self, id: ProposalId, canceller: &Principal, now: Timestamp) -> TreasuryResult<()> {
        self.state
            .proposals
            .cancel(id, canceller, now, &self.state.vault)?;
        info!(proposal = %id, canceller = %canceller, "proposal cancelled");
        self.record(TreasuryEvent::new(EventKind::ProposalCancelled, id.to_string(), canceller, now));
        Ok(())
    }

    // ----- policy registry -----

    pub fn install_policy(
        &mut self,
        name: &str,
        rule: PolicyRule,
        actor: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<bool> {
        self.state.vault.require_signer(actor, "install policies")?;
        let kind = rule.kind();
        let replaced = self
            .state
            .policy
            .install(name, rule, self.state.vault.categories())?;
        info!(policy = name, kind, replaced, "policy installed");
        self.record(
            TreasuryEvent::new(EventKind::PolicyUpdated, name, actor, now)
                .with_details(format!("{} {}", if replaced { "replaced" } else { "installed" }, kind)),
        );
        Ok(replaced)
    }

    pub fn remove_policy(&mut self, name: &str, actor: &Principal, now: Timestamp) -> TreasuryResult<PolicyRule> {
        self.state.vault.require_signer(actor, "remove policies")?;
        let rule = self.state.policy.remove(name)?;
        info!(policy = name, kind = rule.kind(), "policy removed");
        self.record(
            TreasuryEvent::new(EventKind::PolicyUpdated, name, actor, now)
                .with_details(format!("removed {}", rule.kind())),
        );
        Ok(rule)
    }

    pub fn set_policy_enabled(
        &mut self,
        name: &str,
        enabled: bool,
        actor: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        self.state.vault.require_signer(actor, "toggle policies")?;
        self.state.policy.set_enabled(name, enabled)?;
        info!(policy = name, enabled, "policy toggled");
        self.record(
            TreasuryEvent::new(EventKind::PolicyUpdated, name, actor, now)
                .with_details(if enabled { "enabled" } else { "disabled" }),
        );
        Ok(())
    }

    pub fn allow_recipient(
        &mut self,
        policy: &str,
        recipient: &Principal,
        actor: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        self.state.vault.require_signer(actor, "edit recipient lists")?;
        self.state.policy.allow_recipient(policy, recipient.clone(), now)?;
        self.recipients_changed(policy, actor, now, format!("allowed {}", recipient));
        Ok(())
    }

    pub fn allow_recipient_until(
        &mut self,
        policy: &str,
        recipient: &Principal,
        expires_at: Timestamp,
        actor: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        self.state.vault.require_signer(actor, "edit recipient lists")?;
        self.state
            .policy
            .allow_recipient_until(policy, recipient.clone(), expires_at, now)?;
        self.recipients_changed(
            policy,
            actor,
            now,
            format!("allowed {} until {}", recipient, expires_at),
        );
        Ok(())
    }

    pub fn deny_recipient(
        &mut self,
        policy: &str,
        recipient: &Principal,
        actor: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        self.state.vault.require_signer(actor, "edit recipient lists")?;
        self.state.policy.deny_recipient(policy, recipient.clone(), now)?;
        self.recipients_changed(policy, actor, now, format!("denied {}", recipient));
        Ok(())
    }

    pub fn remove_recipient(
        &mut self,
        policy: &str,
        recipient: &Principal,
        actor: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<bool> {
        self.state.vault.require_signer(actor, "edit recipient lists")?;
        let removed = self.state.policy.remove_recipient(policy, recipient, now)?;
        if removed {
            self.recipients_changed(policy, actor, now, format!("removed {}", recipient));
        }
        Ok(removed)
    }

    fn recipients_changed(&mut self, policy: &str, actor: &Principal, now: Timestamp, details: String) {
        info!(policy, actor = %actor, "{}", details);
        self.record(TreasuryEvent::new(EventKind::RecipientsChanged, policy, actor, now).with_details(details));
    }

    /// Externally triggered period rollover.
    pub fn reset_period(&mut self, kind: PeriodKind, actor: &Principal, now: Timestamp) -> TreasuryResult<()> {
        self.state.vault.require_signer(actor, "reset spending periods")?;
        self.state.policy.reset_period(kind);
        info!(period = kind.name(), "spending period reset");
        self.record(TreasuryEvent::new(EventKind::PeriodReset, kind.name(), actor, now));
        Ok(())
    }

    // ----- governance -----

    pub fn add_signer(&mut self, new_signer: &Principal, authorizer: &Principal, now: Timestamp) -> TreasuryResult<()> {
        self.state.vault.add_signer(new_signer.clone(), authorizer)?;
        self.signers_changed(authorizer, now, format!("added signer {}", new_signer));
        Ok(())
    }

    pub fn remove_signer(&mut self, target: &Principal, authorizer: &Principal, now: Timestamp) -> TreasuryResult<()> {
        self.state.vault.remove_signer(target, authorizer)?;
        self.signers_changed(authorizer, now, format!("removed signer {}", target));
        Ok(())
    }

    pub fn set_threshold(&mut self, threshold: u32, authorizer: &Principal, now: Timestamp) -> TreasuryResult<()> {
        self.state.vault.require_signer(authorizer, "change the threshold")?;
        self.state.vault.set_threshold(threshold)?;
        self.signers_changed(authorizer, now, format!("threshold set to {}", threshold));
        Ok(())
    }

    pub fn add_emergency_signer(
        &mut self,
        signer: &Principal,
        authorizer: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        self.state
            .vault
            .require_emergency_signer(authorizer, "add emergency signers")?;
        self.state.vault.add_emergency_signer(signer.clone());
        self.signers_changed(authorizer, now, format!("added emergency signer {}", signer));
        Ok(())
    }

    pub fn remove_emergency_signer(
        &mut self,
        target: &Principal,
        authorizer: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        self.state
            .vault
            .require_emergency_signer(authorizer, "remove emergency signers")?;
        self.state.vault.remove_emergency_signer(target)?;
        self.signers_changed(authorizer, now, format!("removed emergency signer {}", target));
        Ok(())
    }

    pub fn set_emergency_threshold(
        &mut self,
        threshold: u32,
        authorizer: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        self.state
            .vault
            .require_emergency_signer(authorizer, "change the emergency threshold")?;
        self.state.vault.set_emergency_threshold(threshold)?;
        self.signers_changed(authorizer, now, format!("emergency threshold set to {}", threshold));
        Ok(())
    }

    fn signers_changed(&mut self, authorizer: &Principal, now: Timestamp, details: String) {
        info!(authorizer = %authorizer, "{}", details);
        let count = self.state.vault.signers().len() as u32;
        self.record(
            TreasuryEvent::new(EventKind::SignersChanged, "vault", authorizer, now)
                .with_count(count)
                .with_details(details),
        );
    }

    pub fn add_category(&mut self, category: &str, authorizer: &Principal, now: Timestamp) -> TreasuryResult<bool> {
        self.state.vault.require_signer(authorizer, "add categories")?;
        let added = self.state.vault.add_category(category)?;
        if added {
            info!(category, "category added");
            self.record(TreasuryEvent::new(EventKind::CategoryAdded, category, authorizer, now));
        }
        Ok(added)
    }

    // ----- emergency -----

    pub fn create_emergency_action(
        &mut self,
        kind: EmergencyActionKind,
        creator: &Principal,
        justification: &str,
        now: Timestamp,
    ) -> TreasuryResult<ActionId> {
        let name = kind.name();
        let id = self
            .state
            .emergency
            .create_action(kind, creator, justification, now, &self.state.vault)?;
        warn!(action = %id, kind = name, creator = %creator, "emergency action created");
        self.record(
            TreasuryEvent::new(EventKind::EmergencyCreated, id.to_string(), creator, now)
                .with_details(format!("{}: {}", name, justification)),
        );
        Ok(id)
    }

    pub fn sign_emergency_action(&mut self, id: ActionId, signer: &Principal, now: Timestamp) -> TreasuryResult<u32> {
        let count = self
            .state
            .emergency
            .sign_action(id, signer, now, &self.state.vault)?;
        debug!(action = %id, signer = %signer, count, "emergency action signed");
        self.record(TreasuryEvent::new(EventKind::EmergencySigned, id.to_string(), signer, now).with_count(count));
        Ok(count)
    }

    pub fn can_execute_emergency_action(&self, id: ActionId) -> bool {
        self.state.emergency.can_execute(id, &self.state.vault)
    }

    pub fn execute_emergency_action(
        &mut self,
        id: ActionId,
        executor: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        self.state
            .emergency
            .execute_action(id, now, &mut self.state.vault, &mut self.state.proposals)
            .inspect_err(|e| warn!(action = %id, error = %e, "emergency execution rejected"))?;

        let kind = self.state.emergency.get(id)?.kind.clone();
        let entity = id.to_string();
        warn!(action = %entity, kind = kind.name(), "emergency action executed");
        self.record(
            TreasuryEvent::new(EventKind::EmergencyExecuted, entity.clone(), executor, now)
                .with_details(kind.name()),
        );

        let effect = match &kind {
            EmergencyActionKind::Freeze => TreasuryEvent::new(EventKind::Frozen, entity, executor, now),
            EmergencyActionKind::Unfreeze => TreasuryEvent::new(EventKind::Unfrozen, entity, executor, now),
            EmergencyActionKind::Withdrawal { recipient, amount } => {
                TreasuryEvent::new(EventKind::EmergencyWithdrawal, entity, executor, now)
                    .with_amount(*amount)
                    .with_details(format!("to {}", recipient))
            }
            EmergencyActionKind::PauseProposals => {
                let paused = self.state.proposals.is_paused();
                TreasuryEvent::new(EventKind::ProposalsPauseToggled, entity, executor, now)
                    .with_details(if paused { "paused" } else { "resumed" })
            }
        };
        self.record(effect);
        Ok(())
    }

    pub fn cancel_emergency_action(&mut self, id: ActionId, canceller: &Principal, now: Timestamp) -> TreasuryResult<()> {
        self.state
            .emergency
            .cancel_action(id, canceller, &self.state.vault)?;
        info!(action = %id, canceller = %canceller, "emergency action cancelled");
        self.record(TreasuryEvent::new(EventKind::EmergencyCancelled, id.to_string(), canceller, now));
        Ok(())
    }

    pub fn toggle_emergency_pause(&mut self, caller: &Principal, now: Timestamp) -> TreasuryResult<bool> {
        let paused = self
            .state
            .emergency
            .toggle_pause(caller, &self.state.vault)?;
        warn!(caller = %caller, paused, "emergency pause toggled");
        self.record(
            TreasuryEvent::new(EventKind::EmergencyPauseToggled, "emergency", caller, now)
                .with_details(if paused { "paused" } else { "resumed" }),
        );
        Ok(paused)
    }

    // ----- queries -----

    pub fn vault(&self) -> &TreasuryVault {
        &self.state.vault
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.state.policy
    }

    pub fn proposals(&self) -> &ProposalRegistry {
        &self.state.proposals
    }

    pub fn emergency(&self) -> &EmergencyController {
        &self.state.emergency
    }

    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    pub fn query_events(&self, query: &EventQuery) -> Vec<TreasuryEvent> {
        self.state.events.query(query)
    }

    pub fn history(&self) -> &[SpendRecord] {
        &self.state.history
    }

    pub fn history_for(&self, category: &str) -> Vec<&SpendRecord> {
        self.state
            .history
            .iter()
            .filter(|r| r.category == category)
            .collect()
    }

    pub fn state(&self) -> &TreasuryState {
        &self.state
    }

    pub fn summary(&self, now: Timestamp) -> TreasurySummary {
        let vault = &self.state.vault;
        TreasurySummary {
            balance: vault.balance(),
            total_deposited: vault.total_deposited(),
            total_spent: vault.total_spent(),
            signers: vault.signers().len(),
            threshold: vault.threshold(),
            emergency_signers: vault.emergency_signers().len(),
            emergency_threshold: vault.emergency_threshold(),
            frozen: vault.is_frozen(),
            proposals_paused: self.state.proposals.is_paused(),
            emergency_paused: self.state.emergency.is_paused(),
            pending_proposals: self.state.proposals.pending_count(),
            categories: vault.categories().iter().cloned().collect(),
            policies: self.state.policy.names(),
            cooldown_remaining: self.state.emergency.cooldown_remaining(now),
        }
    }

    fn record(&mut self, event: TreasuryEvent) {
        let event = self.state.events.append(event);
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
