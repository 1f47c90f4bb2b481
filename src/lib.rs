//! Coffer - Policy-Governed Multi-Signer Treasury
//!
//! A treasury engine where spending requires M-of-N signer approval,
//! subject to configurable policies, with emergency controls for
//! incident response.
//!
//! Key principles:
//! - Every state transition validates fully before mutating anything
//! - Balance never goes negative; executed proposals stay executed
//! - Policies only tighten: thresholds and time-locks take the maximum
//! - State is an explicit value, snapshotted to CBOR for persistence

pub mod config;
pub mod emergency;
pub mod error;
pub mod events;
pub mod policy;
pub mod proposals;
pub mod serialization;
pub mod shared;
pub mod store;
pub mod treasury;
pub mod types;
pub mod vault;

pub use error::{TreasuryError, TreasuryResult};
pub use shared::SharedTreasury;
pub use treasury::{Treasury, TreasuryState, TreasurySummary};
pub use types::{ActionId, Amount, Principal, ProposalId, Timestamp, Transfer};
