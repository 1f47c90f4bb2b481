//! Per-category approval rules: mandatory co-signers and veto signers.

use crate::error::{TreasuryError, TreasuryResult};
use crate::types::Principal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub category: String,
    /// Every one of these must have signed before execution.
    #[serde(default)]
    pub required_signers: BTreeSet<Principal>,
    /// A signature from any of these blocks execution.
    #[serde(default)]
    pub veto_signers: BTreeSet<Principal>,
}

impl ApprovalRule {
    pub fn validate(&self) -> TreasuryResult<()> {
        if let Some(p) = self.required_signers.intersection(&self.veto_signers).next() {
            return Err(TreasuryError::invalid(format!(
                "{} cannot be both a required signer and a veto signer",
                p
            )));
        }
        Ok(())
    }

    pub fn check<'a>(
        &self,
        policy: &str,
        signed: impl IntoIterator<Item = &'a Principal>,
    ) -> TreasuryResult<()> {
        let signed: BTreeSet<&Principal> = signed.into_iter().collect();

        let missing: Vec<&str> = self
            .required_signers
            .iter()
            .filter(|p| !signed.contains(p))
            .map(|p| p.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(TreasuryError::policy(
                policy,
                format!("missing required signers: {}", missing.join(", ")),
            ));
        }

        if let Some(veto) = self.veto_signers.iter().find(|p| signed.contains(p)) {
            return Err(TreasuryError::policy(
                policy,
                format!("veto signer {} signed this proposal", veto),
            ));
        }
        Ok(())
    }
}
