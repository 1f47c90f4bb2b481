//! In-memory store for tests.

use super::{StoreError, StoreResult, TreasuryStore};
use crate::serialization::SnapshotEnvelope;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Keeps the encoded snapshot in memory. Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    bytes: Option<Vec<u8>>,
    saves: usize,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves (for test assertions).
    pub fn save_count(&self) -> usize {
        self.state.lock().map(|s| s.saves).unwrap_or(0)
    }

    /// Make subsequent saves fail with `Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_writes = fail;
        }
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl TreasuryStore for MemoryStore {
    async fn save_snapshot(&self, snapshot: &SnapshotEnvelope) -> StoreResult<()> {
        // Encode outside the lock.
        let bytes = snapshot.encode()?;
        let mut state = self.lock()?;
        if state.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        state.bytes = Some(bytes);
        state.saves += 1;
        Ok(())
    }

    async fn load_snapshot(&self) -> StoreResult<Option<SnapshotEnvelope>> {
        let bytes = self.lock()?.bytes.clone();
        match bytes {
            Some(bytes) => Ok(Some(SnapshotEnvelope::decode(&bytes)?)),
            None => Ok(None),
        }
    }
}
