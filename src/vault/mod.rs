//! Treasury vault: balance, categories, spend tracker, frozen flag.
//!
//! The vault also owns the two signer sets and their thresholds, since every
//! other component asks it who may act. It performs no authorization of its
//! own on `debit`: callers (the proposal executor and the emergency
//! controller) do all gating before touching funds.
//!
//! Invariants:
//! - `1 <= threshold <= |signers|`
//! - `1 <= emergency_threshold <= |emergency_signers|`
//! - `balance` changes only through `deposit`, `debit`, `withdraw_emergency`

use crate::error::{TreasuryError, TreasuryResult};
use crate::types::{Amount, Principal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Parameters fixed at genesis.
#[derive(Debug, Clone)]
pub struct VaultParams {
    pub signers: BTreeSet<Principal>,
    pub threshold: u32,
    pub emergency_signers: BTreeSet<Principal>,
    pub emergency_threshold: u32,
    pub categories: BTreeSet<String>,
}

/// Pooled funds and the signer sets that govern them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryVault {
    balance: Amount,
    total_deposited: Amount,
    categories: BTreeSet<String>,
    spent: BTreeMap<String, Amount>,
    frozen: bool,
    signers: BTreeSet<Principal>,
    threshold: u32,
    emergency_signers: BTreeSet<Principal>,
    emergency_threshold: u32,
}

impl TreasuryVault {
    /// Create an empty vault, validating both threshold invariants.
    pub fn new(params: VaultParams) -> TreasuryResult<Self> {
        validate_threshold("threshold", params.threshold, params.signers.len())?;
        validate_threshold(
            "emergency threshold",
            params.emergency_threshold,
            params.emergency_signers.len(),
        )?;
        if params.categories.is_empty() {
            return Err(TreasuryError::invalid("at least one category is required"));
        }
        if let Some(empty) = params.categories.iter().find(|c| c.trim().is_empty()) {
            return Err(TreasuryError::invalid(format!(
                "invalid category name '{}'",
                empty
            )));
        }

        let spent = params.categories.iter().map(|c| (c.clone(), 0)).collect();

        Ok(Self {
            balance: 0,
            total_deposited: 0,
            categories: params.categories,
            spent,
            frozen: false,
            signers: params.signers,
            threshold: params.threshold,
            emergency_signers: params.emergency_signers,
            emergency_threshold: params.emergency_threshold,
        })
    }

    /// Add funds. Any principal may deposit; returns the new balance.
    pub fn deposit(&mut self, _depositor: &Principal, amount: Amount) -> TreasuryResult<Amount> {
        if self.frozen {
            return Err(TreasuryError::TreasuryFrozen);
        }
        if amount == 0 {
            return Err(TreasuryError::invalid("deposit amount must be positive"));
        }
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| TreasuryError::invalid("deposit overflows balance"))?;
        let total = self
            .total_deposited
            .checked_add(amount)
            .ok_or_else(|| TreasuryError::invalid("deposit overflows deposit counter"))?;

        self.balance = balance;
        self.total_deposited = total;
        Ok(balance)
    }

    /// Check that `debit(category, amount)` would succeed, without mutating.
    pub fn check_debit(&self, category: &str, amount: Amount) -> TreasuryResult<()> {
        self.require_category(category)?;
        if amount > self.balance {
            return Err(TreasuryError::InsufficientBalance {
                requested: amount,
                available: self.balance,
            });
        }
        Ok(())
    }

    /// Remove funds for an approved spend and charge the category tracker.
    ///
    /// Only the proposal executor calls this, after every gate has passed.
    pub fn debit(&mut self, category: &str, amount: Amount) -> TreasuryResult<()> {
        self.check_debit(category, amount)?;
        self.balance -= amount;
        let spent = self.spent.entry(category.to_string()).or_insert(0);
        *spent = spent.saturating_add(amount);
        Ok(())
    }

    /// Remove funds on the emergency path. Ignores the frozen flag and the
    /// category tracker but never overdraws.
    pub fn withdraw_emergency(&mut self, amount: Amount) -> TreasuryResult<()> {
        if amount == 0 {
            return Err(TreasuryError::invalid("withdrawal amount must be positive"));
        }
        if amount > self.balance {
            return Err(TreasuryError::InsufficientBalance {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Freeze the vault. The caller must be an emergency signer.
    pub fn freeze(&mut self, caller: &Principal) -> TreasuryResult<()> {
        self.check_freeze(caller)?;
        self.frozen = true;
        Ok(())
    }

    pub fn check_freeze(&self, caller: &Principal) -> TreasuryResult<()> {
        if !self.emergency_signers.contains(caller) {
            return Err(TreasuryError::not_authorized(caller, "freeze the treasury"));
        }
        Ok(())
    }

    /// Unfreeze the vault.
    ///
    /// `signature_count` comes from the emergency controller after its own
    /// gating and is trusted as-is.
    pub fn unfreeze(&mut self, signature_count: u32) -> TreasuryResult<()> {
        self.check_unfreeze(signature_count)?;
        self.frozen = false;
        Ok(())
    }

    pub fn check_unfreeze(&self, signature_count: u32) -> TreasuryResult<()> {
        if !self.frozen {
            return Err(TreasuryError::invalid("treasury is not frozen"));
        }
        if signature_count < self.emergency_threshold {
            return Err(TreasuryError::InsufficientSignatures {
                have: signature_count,
                need: self.emergency_threshold,
            });
        }
        Ok(())
    }

    // Governance surface. Authorization workflow for these lives outside the
    // engine; the vault only enforces the threshold invariants.

    pub fn add_signer(&mut self, new_signer: Principal, authorizer: &Principal) -> TreasuryResult<()> {
        self.require_signer(authorizer, "add signers")?;
        self.signers.insert(new_signer);
        Ok(())
    }

    /// Remove a standard signer (and their emergency membership, if any).
    pub fn remove_signer(&mut self, target: &Principal, authorizer: &Principal) -> TreasuryResult<()> {
        self.require_signer(authorizer, "remove signers")?;
        if !self.signers.contains(target) {
            return Err(TreasuryError::invalid(format!("{} is not a signer", target)));
        }
        if self.signers.len() as u32 <= self.threshold {
            return Err(TreasuryError::invalid(
                "cannot remove signer: signer count would drop below threshold",
            ));
        }
        if self.emergency_signers.contains(target)
            && self.emergency_signers.len() as u32 <= self.emergency_threshold
        {
            return Err(TreasuryError::invalid(
                "cannot remove signer: emergency signer count would drop below emergency threshold",
            ));
        }
        self.signers.remove(target);
        self.emergency_signers.remove(target);
        Ok(())
    }

    pub fn set_threshold(&mut self, threshold: u32) -> TreasuryResult<()> {
        validate_threshold("threshold", threshold, self.signers.len())?;
        self.threshold = threshold;
        Ok(())
    }

    pub fn add_emergency_signer(&mut self, signer: Principal) {
        self.emergency_signers.insert(signer);
    }

    pub fn remove_emergency_signer(&mut self, target: &Principal) -> TreasuryResult<()> {
        if !self.emergency_signers.contains(target) {
            return Err(TreasuryError::invalid(format!(
                "{} is not an emergency signer",
                target
            )));
        }
        if self.emergency_signers.len() as u32 <= self.emergency_threshold {
            return Err(TreasuryError::invalid(
                "cannot remove emergency signer: count would drop below emergency threshold",
            ));
        }
        self.emergency_signers.remove(target);
        Ok(())
    }

    pub fn set_emergency_threshold(&mut self, threshold: u32) -> TreasuryResult<()> {
        validate_threshold("emergency threshold", threshold, self.emergency_signers.len())?;
        self.emergency_threshold = threshold;
        Ok(())
    }

    /// Register a new spending category. Returns false if it already existed.
    pub fn add_category(&mut self, category: &str) -> TreasuryResult<bool> {
        if category.trim().is_empty() {
            return Err(TreasuryError::invalid("category name must not be empty"));
        }
        let added = self.categories.insert(category.to_string());
        self.spent.entry(category.to_string()).or_insert(0);
        Ok(added)
    }

    pub fn require_category(&self, category: &str) -> TreasuryResult<()> {
        if !self.categories.contains(category) {
            return Err(TreasuryError::invalid(format!("unknown category '{}'", category)));
        }
        Ok(())
    }

    pub fn require_signer(&self, principal: &Principal, action: &'static str) -> TreasuryResult<()> {
        if !self.signers.contains(principal) {
            return Err(TreasuryError::not_authorized(principal, action));
        }
        Ok(())
    }

    pub fn require_emergency_signer(
        &self,
        principal: &Principal,
        action: &'static str,
    ) -> TreasuryResult<()> {
        if !self.emergency_signers.contains(principal) {
            return Err(TreasuryError::not_authorized(principal, action));
        }
        Ok(())
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn total_deposited(&self) -> Amount {
        self.total_deposited
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn is_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    /// Cumulative amount debited from a category since genesis.
    pub fn spent(&self, category: &str) -> Amount {
        self.spent.get(category).copied().unwrap_or(0)
    }

    pub fn total_spent(&self) -> Amount {
        self.spent.values().fold(0, |acc, v| acc.saturating_add(*v))
    }

    pub fn signers(&self) -> &BTreeSet<Principal> {
        &self.signers
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn emergency_signers(&self) -> &BTreeSet<Principal> {
        &self.emergency_signers
    }

    pub fn emergency_threshold(&self) -> u32 {
        self.emergency_threshold
    }

    pub fn is_signer(&self, principal: &Principal) -> bool {
        self.signers.contains(principal)
    }

    pub fn is_emergency_signer(&self, principal: &Principal) -> bool {
        self.emergency_signers.contains(principal)
    }
}

fn validate_threshold(label: &str, threshold: u32, signers: usize) -> TreasuryResult<()> {
    if threshold == 0 || threshold as usize > signers {
        return Err(TreasuryError::invalid(format!(
            "{} must be between 1 and {} (got {})",
            label, signers, threshold
        )));
    }
    Ok(())
}
