//! Spending limits and per-period spend accounting.
//!
//! Period counters roll over lazily: reads compute the totals as of the
//! supplied timestamp (zeroing any period whose UTC calendar boundary has
//! passed) and writes bring the stored counters current before adding.
//! Boundaries are UTC calendar day, ISO week, and calendar month.

use crate::error::{TreasuryError, TreasuryResult};
use crate::types::{Amount, Timestamp};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Accounting period for spend counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Daily,
    Weekly,
    Monthly,
}

impl PeriodKind {
    pub const ALL: [PeriodKind; 3] = [PeriodKind::Daily, PeriodKind::Weekly, PeriodKind::Monthly];

    pub fn name(&self) -> &'static str {
        match self {
            PeriodKind::Daily => "daily",
            PeriodKind::Weekly => "weekly",
            PeriodKind::Monthly => "monthly",
        }
    }

    /// Calendar bucket containing `ts`, or `None` if `ts` is out of range.
    fn bucket(&self, ts: Timestamp) -> Option<(i32, u32)> {
        let secs = i64::try_from(ts).ok()?;
        let dt: DateTime<Utc> = DateTime::from_timestamp(secs, 0)?;
        Some(match self {
            PeriodKind::Daily => (dt.year(), dt.ordinal()),
            PeriodKind::Weekly => {
                let week = dt.iso_week();
                (week.year(), week.week())
            }
            PeriodKind::Monthly => (dt.year(), dt.month()),
        })
    }

    /// Whether a period boundary lies between `from` and `to`.
    fn crossed(&self, from: Timestamp, to: Timestamp) -> bool {
        if to <= from {
            return false;
        }
        match (self.bucket(from), self.bucket(to)) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        }
    }
}

/// Running totals for the current daily/weekly/monthly periods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub daily: Amount,
    pub weekly: Amount,
    pub monthly: Amount,
}

impl PeriodTotals {
    pub fn get(&self, kind: PeriodKind) -> Amount {
        match kind {
            PeriodKind::Daily => self.daily,
            PeriodKind::Weekly => self.weekly,
            PeriodKind::Monthly => self.monthly,
        }
    }

    fn slot(&mut self, kind: PeriodKind) -> &mut Amount {
        match kind {
            PeriodKind::Daily => &mut self.daily,
            PeriodKind::Weekly => &mut self.weekly,
            PeriodKind::Monthly => &mut self.monthly,
        }
    }
}

/// Spend counters for one category (or the global bucket).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSpending {
    totals: PeriodTotals,
    /// Timestamp the counters were last brought current.
    last_reset: Timestamp,
}

impl PeriodSpending {
    /// Totals as they stand at `now`, without mutating.
    pub fn current(&self, now: Timestamp) -> PeriodTotals {
        let mut totals = self.totals;
        for kind in PeriodKind::ALL {
            if kind.crossed(self.last_reset, now) {
                *totals.slot(kind) = 0;
            }
        }
        totals
    }

    /// Roll over to `now`, then add `amount` to every period.
    pub fn record(&mut self, amount: Amount, now: Timestamp) {
        self.roll_over(now);
        for kind in PeriodKind::ALL {
            let slot = self.totals.slot(kind);
            *slot = slot.saturating_add(amount);
        }
    }

    /// Zero every period whose boundary passed since the last reset.
    pub fn roll_over(&mut self, now: Timestamp) {
        self.totals = self.current(now);
        if now > self.last_reset {
            self.last_reset = now;
        }
    }

    /// Externally triggered reset of one period.
    pub fn reset(&mut self, kind: PeriodKind) {
        *self.totals.slot(kind) = 0;
    }

    pub fn last_reset(&self) -> Timestamp {
        self.last_reset
    }
}

/// Spending limit policy configuration.
///
/// A limit scoped to a category checks that category's period totals; an
/// unscoped limit checks the combined totals of every category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingLimit {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub max_per_transaction: Option<Amount>,
    #[serde(default)]
    pub daily_limit: Option<Amount>,
    #[serde(default)]
    pub weekly_limit: Option<Amount>,
    #[serde(default)]
    pub monthly_limit: Option<Amount>,
}

impl SpendingLimit {
    pub fn applies_to(&self, category: &str) -> bool {
        self.category.as_deref().map_or(true, |c| c == category)
    }

    pub fn limit(&self, kind: PeriodKind) -> Option<Amount> {
        match kind {
            PeriodKind::Daily => self.daily_limit,
            PeriodKind::Weekly => self.weekly_limit,
            PeriodKind::Monthly => self.monthly_limit,
        }
    }

    pub fn allows_transaction(&self, amount: Amount) -> bool {
        self.max_per_transaction.map_or(true, |cap| amount <= cap)
    }

    pub fn check_transaction(&self, policy: &str, amount: Amount) -> TreasuryResult<()> {
        if let Some(cap) = self.max_per_transaction {
            if amount > cap {
                return Err(TreasuryError::policy(
                    policy,
                    format!(
                        "transaction amount {} exceeds max per transaction {}",
                        amount, cap
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Check that adding `batch` to `current` stays within every period limit.
    pub fn check_period(
        &self,
        policy: &str,
        current: &PeriodTotals,
        batch: Amount,
    ) -> TreasuryResult<()> {
        for kind in PeriodKind::ALL {
            let Some(limit) = self.limit(kind) else {
                continue;
            };
            let spent = current.get(kind);
            let projected = spent.checked_add(batch);
            if projected.map_or(true, |p| p > limit) {
                let scope = self.category.as_deref().unwrap_or("all categories");
                return Err(TreasuryError::policy(
                    policy,
                    format!(
                        "{} limit exceeded for {}: current {} + {} > {}",
                        kind.name(),
                        scope,
                        spent,
                        batch,
                        limit
                    ),
                ));
            }
        }
        Ok(())
    }
}
