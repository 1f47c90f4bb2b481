//! Policy engine: named rules, derived safety parameters, spend accounting.
//!
//! Rules are a closed sum type. Validation walks the enabled rules and
//! matches each one exhaustively; derivations (`threshold_for`,
//! `time_lock_for`) take the strictest value across every matching rule.
//!
//! The only mutation outside the registry surface is spend accounting
//! (`record_spending`, `reset_period`), called by the executor after a
//! successful debit.

pub mod approval;
pub mod limits;
pub mod recipients;
pub mod tiers;

pub use approval::ApprovalRule;
pub use limits::{PeriodKind, PeriodSpending, PeriodTotals, SpendingLimit};
pub use recipients::AllowDenyList;
pub use tiers::{ThresholdTier, TierTable, TimeLockRule, DEFAULT_THRESHOLD};

use crate::error::{TreasuryError, TreasuryResult};
use crate::types::{Amount, Principal, Timestamp, Transfer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single policy, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyRule {
    SpendingLimit(SpendingLimit),
    ThresholdTiers(TierTable),
    TimeLock(TimeLockRule),
    Recipients(AllowDenyList),
    Approval(ApprovalRule),
}

impl PolicyRule {
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyRule::SpendingLimit(_) => "spending_limit",
            PolicyRule::ThresholdTiers(_) => "threshold_tiers",
            PolicyRule::TimeLock(_) => "time_lock",
            PolicyRule::Recipients(_) => "recipients",
            PolicyRule::Approval(_) => "approval",
        }
    }

    /// Category the rule is scoped to, if any.
    pub fn category(&self) -> Option<&str> {
        match self {
            PolicyRule::SpendingLimit(limit) => limit.category.as_deref(),
            PolicyRule::ThresholdTiers(table) => Some(&table.category),
            PolicyRule::TimeLock(rule) => Some(&rule.category),
            PolicyRule::Recipients(_) => None,
            PolicyRule::Approval(rule) => Some(&rule.category),
        }
    }

    pub fn validate(&self) -> TreasuryResult<()> {
        match self {
            PolicyRule::SpendingLimit(limit) => {
                if let Some(cap) = limit.max_per_transaction {
                    if cap == 0 {
                        return Err(TreasuryError::invalid("max_per_transaction must be positive"));
                    }
                }
                Ok(())
            }
            PolicyRule::ThresholdTiers(table) => table.validate(),
            PolicyRule::TimeLock(rule) => rule.validate(),
            PolicyRule::Recipients(list) => list.validate(),
            PolicyRule::Approval(rule) => rule.validate(),
        }
    }

    // Evaluation order: recipients, then spending limits (caps before
    // period totals), then approvals.
    fn check_rank(&self) -> u8 {
        match self {
            PolicyRule::Recipients(_) => 0,
            PolicyRule::SpendingLimit(_) => 1,
            PolicyRule::Approval(_) => 2,
            PolicyRule::ThresholdTiers(_) | PolicyRule::TimeLock(_) => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub enabled: bool,
    pub rule: PolicyRule,
}

/// When a batch is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Pre-validation at proposal open: recipients and per-transfer caps.
    Open,
    /// Full re-validation immediately before debiting.
    Execute,
}

/// A batch of transfers presented to the pipeline.
#[derive(Debug, Clone)]
pub struct SpendCheck<'a> {
    pub stage: Stage,
    pub category: &'a str,
    pub transfers: &'a [Transfer],
    pub total: Amount,
    /// Principals that have signed (empty at open).
    pub signed: &'a [&'a Principal],
    pub now: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEngine {
    rules: BTreeMap<String, PolicyEntry>,
    periods: BTreeMap<String, PeriodSpending>,
    global_period: PeriodSpending,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace a named rule. Returns true if a rule was replaced.
    ///
    /// A replaced rule keeps its enabled flag; a new rule starts enabled.
    pub fn install(
        &mut self,
        name: &str,
        rule: PolicyRule,
        categories: &BTreeSet<String>,
    ) -> TreasuryResult<bool> {
        if name.trim().is_empty() {
            return Err(TreasuryError::invalid("policy name must not be empty"));
        }
        rule.validate()?;
        if let Some(category) = rule.category() {
            if !categories.contains(category) {
                return Err(TreasuryError::invalid(format!(
                    "policy '{}' references unknown category '{}'",
                    name, category
                )));
            }
        }

        let enabled = self.rules.get(name).map_or(true, |e| e.enabled);
        let replaced = self
            .rules
            .insert(name.to_string(), PolicyEntry { enabled, rule })
            .is_some();
        Ok(replaced)
    }

    pub fn remove(&mut self, name: &str) -> TreasuryResult<PolicyRule> {
        self.rules
            .remove(name)
            .map(|entry| entry.rule)
            .ok_or_else(|| unknown_policy(name))
    }

    pub fn get(&self, name: &str) -> Option<&PolicyEntry> {
        self.rules.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = (&str, &PolicyEntry)> {
        self.rules.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn names(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> TreasuryResult<()> {
        let entry = self.rules.get_mut(name).ok_or_else(|| unknown_policy(name))?;
        entry.enabled = enabled;
        Ok(())
    }

    /// Per-transaction cap check against one named policy.
    ///
    /// Permissive when no policy is registered under `name`, when it is
    /// disabled, or when it is not a spending limit.
    pub fn validate_limits(&self, name: &str, amount: Amount) -> bool {
        match self.rules.get(name) {
            Some(PolicyEntry {
                enabled: true,
                rule: PolicyRule::SpendingLimit(limit),
            }) => limit.allows_transaction(amount),
            _ => true,
        }
    }

    /// Whether every enabled recipient list admits `recipient` at `now`.
    pub fn validate_recipient(&self, recipient: &Principal, now: Timestamp) -> bool {
        self.enabled().all(|(_, rule)| match rule {
            PolicyRule::Recipients(list) => list.is_allowed(recipient, now),
            _ => true,
        })
    }

    /// Signature threshold required for `amount` in `category`.
    ///
    /// The strictest enabled tier table wins; with none the default applies.
    pub fn threshold_for(&self, category: &str, amount: Amount) -> u32 {
        self.enabled()
            .filter_map(|(_, rule)| match rule {
                PolicyRule::ThresholdTiers(table) if table.category == category => {
                    Some(table.threshold_for(amount))
                }
                _ => None,
            })
            .max()
            .unwrap_or(DEFAULT_THRESHOLD)
    }

    /// Time lock in seconds for `amount` in `category`; 0 without a rule.
    pub fn time_lock_for(&self, category: &str, amount: Amount) -> u64 {
        self.enabled()
            .filter_map(|(_, rule)| match rule {
                PolicyRule::TimeLock(lock) if lock.category == category => {
                    Some(lock.lock_for(amount))
                }
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Run every enabled rule against a batch.
    pub fn check_transfers(&self, check: &SpendCheck<'_>) -> TreasuryResult<()> {
        let mut ordered: Vec<(&str, &PolicyRule)> = self.enabled().collect();
        ordered.sort_by_key(|(_, rule)| rule.check_rank());

        for (name, rule) in ordered {
            match rule {
                PolicyRule::Recipients(list) => {
                    if let Some(t) = check
                        .transfers
                        .iter()
                        .find(|t| !list.is_allowed(&t.recipient, check.now))
                    {
                        return Err(TreasuryError::policy(
                            name,
                            format!("recipient {} is not allowed", t.recipient),
                        ));
                    }
                }
                PolicyRule::SpendingLimit(limit) => {
                    if !limit.applies_to(check.category) {
                        continue;
                    }
                    for t in check.transfers {
                        limit.check_transaction(name, t.amount)?;
                    }
                    if check.stage == Stage::Execute {
                        let current = match &limit.category {
                            Some(category) => self.period_totals(category, check.now),
                            None => self.global_totals(check.now),
                        };
                        limit.check_period(name, &current, check.total)?;
                    }
                }
                PolicyRule::Approval(rule) => {
                    if check.stage == Stage::Execute && rule.category == check.category {
                        rule.check(name, check.signed.iter().copied())?;
                    }
                }
                // Consumed at open through threshold_for / time_lock_for.
                PolicyRule::ThresholdTiers(_) | PolicyRule::TimeLock(_) => {}
            }
        }
        Ok(())
    }

    /// Charge an executed spend to the category and global period counters.
    pub fn record_spending(&mut self, category: &str, amount: Amount, now: Timestamp) {
        self.periods
            .entry(category.to_string())
            .or_default()
            .record(amount, now);
        self.global_period.record(amount, now);
    }

    /// External rollover trigger: zero one period everywhere.
    pub fn reset_period(&mut self, kind: PeriodKind) {
        for spending in self.periods.values_mut() {
            spending.reset(kind);
        }
        self.global_period.reset(kind);
    }

    pub fn period_totals(&self, category: &str, now: Timestamp) -> PeriodTotals {
        self.periods
            .get(category)
            .map(|p| p.current(now))
            .unwrap_or_default()
    }

    pub fn global_totals(&self, now: Timestamp) -> PeriodTotals {
        self.global_period.current(now)
    }

    pub fn allow_recipient(
        &mut self,
        policy: &str,
        principal: Principal,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        let list = self.recipients_mut(policy, now)?;
        list.allow(principal)
    }

    pub fn allow_recipient_until(
        &mut self,
        policy: &str,
        principal: Principal,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        if expires_at <= now {
            return Err(TreasuryError::invalid("temporary allow entry already expired"));
        }
        let list = self.recipients_mut(policy, now)?;
        list.allow_until(principal, expires_at)
    }

    pub fn deny_recipient(
        &mut self,
        policy: &str,
        principal: Principal,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        let list = self.recipients_mut(policy, now)?;
        list.deny(principal);
        Ok(())
    }

    /// Remove a principal from both lists of a recipient policy.
    pub fn remove_recipient(
        &mut self,
        policy: &str,
        principal: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<bool> {
        let list = self.recipients_mut(policy, now)?;
        let allowed = list.remove(principal);
        let denied = list.undeny(principal);
        Ok(allowed || denied)
    }

    fn recipients_mut(&mut self, policy: &str, now: Timestamp) -> TreasuryResult<&mut AllowDenyList> {
        match self.rules.get_mut(policy) {
            Some(PolicyEntry {
                rule: PolicyRule::Recipients(list),
                ..
            }) => {
                list.prune_expired(now);
                Ok(list)
            }
            Some(entry) => Err(TreasuryError::invalid(format!(
                "policy '{}' is a {} policy, not a recipient list",
                policy,
                entry.rule.kind()
            ))),
            None => Err(unknown_policy(policy)),
        }
    }

    fn enabled(&self) -> impl Iterator<Item = (&str, &PolicyRule)> {
        self.rules
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(name, entry)| (name.as_str(), &entry.rule))
    }
}

fn unknown_policy(name: &str) -> TreasuryError {
    TreasuryError::invalid(format!("no policy named '{}'", name))
}
