//! CBOR serialization for treasury snapshots.
//!
//! - CBOR via `ciborium`
//! - Deterministic encoding (all maps are `BTreeMap`), so digests are stable
//! - Schema evolution through `#[serde(default)]` plus an envelope version

use crate::treasury::TreasuryState;
use crate::types::Timestamp;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Current snapshot schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Serialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// CBOR encoding failed.
    #[error("CBOR encoding failed: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("CBOR decoding failed: {0}")]
    Decode(String),

    #[error("Unsupported snapshot schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Serialize to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| SerializationError::Encode(format!("{:?}", e)))?;
    Ok(bytes)
}

/// Deserialize from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    ciborium::from_reader(bytes).map_err(|e| SerializationError::Decode(format!("{:?}", e)))
}

/// Versioned wrapper around a full treasury state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEnvelope {
    pub schema_version: u32,
    pub taken_at: Timestamp,
    pub state: TreasuryState,
}

impl SnapshotEnvelope {
    pub fn new(state: TreasuryState, taken_at: Timestamp) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            taken_at,
            state,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SerializationError> {
        to_cbor(self)
    }

    /// Decode and reject snapshots written by a newer schema.
    pub fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
        let envelope: Self = from_cbor(bytes)?;
        if envelope.schema_version > SCHEMA_VERSION {
            return Err(SerializationError::UnsupportedVersion {
                found: envelope.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(envelope)
    }
}
