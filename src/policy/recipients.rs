//! Recipient allow/deny lists.
//!
//! Deny wins: denying a principal evicts it from the allow list (permanent
//! and temporary), and allowing a denied principal is rejected. A principal
//! is therefore never on both lists.

use crate::error::{TreasuryError, TreasuryResult};
use crate::types::{Principal, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowDenyList {
    #[serde(default)]
    allow: BTreeSet<Principal>,
    #[serde(default)]
    deny: BTreeSet<Principal>,
    /// Allow entries that lapse at the given timestamp.
    #[serde(default)]
    temporary: BTreeMap<Principal, Timestamp>,
}

impl AllowDenyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured sets, rejecting any overlap.
    pub fn from_sets(
        allow: BTreeSet<Principal>,
        deny: BTreeSet<Principal>,
    ) -> TreasuryResult<Self> {
        let list = Self {
            allow,
            deny,
            temporary: BTreeMap::new(),
        };
        list.validate()?;
        Ok(list)
    }

    pub fn validate(&self) -> TreasuryResult<()> {
        let conflict = self
            .allow
            .iter()
            .chain(self.temporary.keys())
            .find(|p| self.deny.contains(*p));
        if let Some(p) = conflict {
            return Err(TreasuryError::invalid(format!(
                "{} is on both the allow list and the deny list",
                p
            )));
        }
        Ok(())
    }

    pub fn allow(&mut self, principal: Principal) -> TreasuryResult<()> {
        self.reject_denied(&principal)?;
        self.temporary.remove(&principal);
        self.allow.insert(principal);
        Ok(())
    }

    /// Allow a principal until `expires_at` (exclusive).
    pub fn allow_until(&mut self, principal: Principal, expires_at: Timestamp) -> TreasuryResult<()> {
        self.reject_denied(&principal)?;
        self.temporary.insert(principal, expires_at);
        Ok(())
    }

    pub fn deny(&mut self, principal: Principal) {
        self.allow.remove(&principal);
        self.temporary.remove(&principal);
        self.deny.insert(principal);
    }

    /// Drop a principal from the allow list (permanent and temporary).
    pub fn remove(&mut self, principal: &Principal) -> bool {
        let permanent = self.allow.remove(principal);
        let temporary = self.temporary.remove(principal).is_some();
        permanent || temporary
    }

    pub fn undeny(&mut self, principal: &Principal) -> bool {
        self.deny.remove(principal)
    }

    pub fn prune_expired(&mut self, now: Timestamp) {
        self.temporary.retain(|_, expires_at| now < *expires_at);
    }

    /// Whether a transfer to `recipient` is permitted at `now`.
    ///
    /// Denied principals never pass; an allow list with no live entries
    /// admits everyone else; otherwise the recipient must be listed.
    pub fn is_allowed(&self, recipient: &Principal, now: Timestamp) -> bool {
        if self.deny.contains(recipient) {
            return false;
        }
        let live_temporary = self
            .temporary
            .values()
            .any(|expires_at| now < *expires_at);
        if self.allow.is_empty() && !live_temporary {
            return true;
        }
        if self.allow.contains(recipient) {
            return true;
        }
        self.temporary
            .get(recipient)
            .is_some_and(|expires_at| now < *expires_at)
    }

    pub fn is_denied(&self, principal: &Principal) -> bool {
        self.deny.contains(principal)
    }

    pub fn allowed(&self) -> &BTreeSet<Principal> {
        &self.allow
    }

    pub fn denied(&self) -> &BTreeSet<Principal> {
        &self.deny
    }

    fn reject_denied(&self, principal: &Principal) -> TreasuryResult<()> {
        if self.deny.contains(principal) {
            return Err(TreasuryError::policy(
                "recipients",
                format!("{} is deny-listed", principal),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> Principal {
        Principal::from(name)
    }

    #[test]
    fn test_empty_list_is_open() {
        let list = AllowDenyList::new();
        assert!(list.is_allowed(&p("anyone"), 0));
    }

    #[test]
    fn test_allow_list_restricts() {
        let mut list = AllowDenyList::new();
        list.allow(p("vendor")).unwrap();
        assert!(list.is_allowed(&p("vendor"), 0));
        assert!(!list.is_allowed(&p("stranger"), 0));
    }

    #[test]
    fn test_deny_evicts_from_allow() {
        let mut list = AllowDenyList::new();
        list.allow(p("vendor")).unwrap();
        list.allow(p("other")).unwrap();
        list.deny(p("vendor"));
        assert!(!list.is_allowed(&p("vendor"), 0));
        assert!(!list.allowed().contains(&p("vendor")));
        assert!(list.validate().is_ok());
    }

    #[test]
    fn test_allow_of_denied_is_rejected() {
        let mut list = AllowDenyList::new();
        list.deny(p("attacker"));
        assert!(matches!(
            list.allow(p("attacker")),
            Err(TreasuryError::PolicyViolation { .. })
        ));
        assert!(list.allow_until(p("attacker"), 100).is_err());
        assert!(list.undeny(&p("attacker")));
        list.allow(p("attacker")).unwrap();
    }

    #[test]
    fn test_deny_wins_over_open_list() {
        let mut list = AllowDenyList::new();
        list.deny(p("attacker"));
        assert!(!list.is_allowed(&p("attacker"), 0));
        assert!(list.is_allowed(&p("anyone"), 0));
    }

    #[test]
    fn test_temporary_entry_expires() {
        let mut list = AllowDenyList::new();
        list.allow(p("vendor")).unwrap();
        list.allow_until(p("contractor"), 1_000).unwrap();
        assert!(list.is_allowed(&p("contractor"), 999));
        assert!(!list.is_allowed(&p("contractor"), 1_000));

        list.prune_expired(1_000);
        assert!(!list.remove(&p("contractor")));
    }

    #[test]
    fn test_only_expired_temporaries_leave_list_open() {
        let mut list = AllowDenyList::new();
        list.allow_until(p("contractor"), 10).unwrap();
        assert!(!list.is_allowed(&p("stranger"), 5));
        assert!(list.is_allowed(&p("stranger"), 10));
    }

    #[test]
    fn test_from_sets_rejects_overlap() {
        let allow: BTreeSet<_> = [p("a"), p("b")].into();
        let deny: BTreeSet<_> = [p("b")].into();
        assert!(AllowDenyList::from_sets(allow, deny).is_err());
    }
}
