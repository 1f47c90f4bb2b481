//! Identifier and quantity types shared by every component.
//!
//! Principals are opaque strings: the engine never inspects them beyond
//! equality. Authentication happens before a principal reaches this crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token amount in minor units.
pub type Amount = u64;

/// Unix timestamp in seconds, always supplied by the caller.
pub type Timestamp = u64;

/// Maximum number of transfers in a single proposal.
pub const MAX_TRANSFERS: usize = 50;

/// An authenticated actor (signer, creator, recipient, depositor).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(pub String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Principal {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Index of a proposal in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(pub u64);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Index of an emergency action in the controller arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

/// A single (recipient, amount) pair inside a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transfer {
    pub recipient: Principal,
    pub amount: Amount,
}

impl Transfer {
    pub fn new(recipient: impl Into<Principal>, amount: Amount) -> Self {
        Self {
            recipient: recipient.into(),
            amount,
        }
    }
}
