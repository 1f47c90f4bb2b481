//! Amount-tiered signature thresholds and amount-scaled time locks.

use crate::error::{TreasuryError, TreasuryResult};
use crate::types::Amount;
use serde::{Deserialize, Serialize};

/// Threshold used when no tier covers an amount.
pub const DEFAULT_THRESHOLD: u32 = 2;

/// Inclusive amount range mapped to a required signature count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdTier {
    pub min_amount: Amount,
    pub max_amount: Amount,
    pub threshold: u32,
}

impl ThresholdTier {
    pub fn contains(&self, amount: Amount) -> bool {
        self.min_amount <= amount && amount <= self.max_amount
    }
}

/// Ordered, non-overlapping tiers for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    pub category: String,
    pub tiers: Vec<ThresholdTier>,
}

impl TierTable {
    /// Sort and validate tiers.
    pub fn new(category: impl Into<String>, mut tiers: Vec<ThresholdTier>) -> TreasuryResult<Self> {
        tiers.sort_by_key(|t| t.min_amount);
        let table = Self {
            category: category.into(),
            tiers,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> TreasuryResult<()> {
        for tier in &self.tiers {
            if tier.min_amount > tier.max_amount {
                return Err(TreasuryError::invalid(format!(
                    "tier [{}, {}] has min above max",
                    tier.min_amount, tier.max_amount
                )));
            }
            if tier.threshold == 0 {
                return Err(TreasuryError::invalid("tier threshold must be at least 1"));
            }
        }
        for pair in self.tiers.windows(2) {
            if pair[1].min_amount < pair[0].min_amount {
                return Err(TreasuryError::invalid("tiers must be in ascending order"));
            }
            if pair[1].min_amount <= pair[0].max_amount {
                return Err(TreasuryError::invalid(format!(
                    "tiers [{}, {}] and [{}, {}] overlap",
                    pair[0].min_amount, pair[0].max_amount, pair[1].min_amount, pair[1].max_amount
                )));
            }
        }
        Ok(())
    }

    /// Required threshold for `amount`.
    ///
    /// Below the lowest tier the default applies. An amount that falls in a
    /// gap between tiers or above the top tier takes the top tier's
    /// threshold.
    pub fn threshold_for(&self, amount: Amount) -> u32 {
        let (Some(lowest), Some(top)) = (self.tiers.first(), self.tiers.last()) else {
            return DEFAULT_THRESHOLD;
        };
        if amount < lowest.min_amount {
            return DEFAULT_THRESHOLD;
        }
        self.tiers
            .iter()
            .find(|t| t.contains(amount))
            .map_or(top.threshold, |t| t.threshold)
    }
}

/// `lock = base_duration + floor(amount / amount_factor)` seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLockRule {
    pub category: String,
    #[serde(deserialize_with = "crate::config::duration::deserialize_secs")]
    pub base_duration: u64,
    pub amount_factor: Amount,
}

impl TimeLockRule {
    pub fn new(category: impl Into<String>, base_duration: u64, amount_factor: Amount) -> TreasuryResult<Self> {
        let rule = Self {
            category: category.into(),
            base_duration,
            amount_factor,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> TreasuryResult<()> {
        if self.amount_factor == 0 {
            return Err(TreasuryError::invalid("time lock amount_factor must be positive"));
        }
        Ok(())
    }

    pub fn lock_for(&self, amount: Amount) -> u64 {
        // amount_factor is validated non-zero; checked_div keeps a bad snapshot harmless
        let scaled = amount.checked_div(self.amount_factor).unwrap_or(0);
        self.base_duration.saturating_add(scaled)
    }
}
