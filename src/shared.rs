//! Shared handle for concurrent callers.
//!
//! One async mutex guards the whole treasury, so every operation is
//! linearizable: concurrent signers cannot lose an increment, and two
//! executions can never both pass the balance check against a stale
//! balance. A second mutex orders persists, so a store never ends up with
//! an older snapshot than one it already saved.

use crate::emergency::EmergencyActionKind;
use crate::error::TreasuryResult;
use crate::proposals::{ExecutionReceipt, ProposalRequest};
use crate::store::{StoreResult, TreasuryStore};
use crate::treasury::{Treasury, TreasurySummary};
use crate::types::{ActionId, Amount, Principal, ProposalId, Timestamp};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub struct SharedTreasury {
    inner: Arc<Mutex<Treasury>>,
    persist_guard: Arc<Mutex<()>>,
}

impl SharedTreasury {
    pub fn new(treasury: Treasury) -> Self {
        Self {
            inner: Arc::new(Mutex::new(treasury)),
            persist_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Exclusive access for multi-step transactions.
    pub async fn lock(&self) -> MutexGuard<'_, Treasury> {
        self.inner.lock().await
    }

    /// Run `f` with exclusive access.
    pub async fn with<R>(&self, f: impl FnOnce(&mut Treasury) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }

    pub async fn deposit(&self, depositor: &Principal, amount: Amount, now: Timestamp) -> TreasuryResult<Amount> {
        self.inner.lock().await.deposit(depositor, amount, now)
    }

    pub async fn open_proposal(&self, request: ProposalRequest, now: Timestamp) -> TreasuryResult<ProposalId> {
        self.inner.lock().await.open_proposal(request, now)
    }

    pub async fn sign_proposal(&self, id: ProposalId, signer: &Principal, now: Timestamp) -> TreasuryResult<u32> {
        self.inner.lock().await.sign_proposal(id, signer, now)
    }

    pub async fn execute_proposal(
        &self,
        id: ProposalId,
        executor: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<ExecutionReceipt> {
        self.inner.lock().await.execute_proposal(id, executor, now)
    }

    pub async fn create_emergency_action(
        &self,
        kind: EmergencyActionKind,
        creator: &Principal,
        justification: &str,
        now: Timestamp,
    ) -> TreasuryResult<ActionId> {
        self.inner
            .lock()
            .await
            .create_emergency_action(kind, creator, justification, now)
    }

    pub async fn sign_emergency_action(&self, id: ActionId, signer: &Principal, now: Timestamp) -> TreasuryResult<u32> {
        self.inner.lock().await.sign_emergency_action(id, signer, now)
    }

    pub async fn execute_emergency_action(
        &self,
        id: ActionId,
        executor: &Principal,
        now: Timestamp,
    ) -> TreasuryResult<()> {
        self.inner.lock().await.execute_emergency_action(id, executor, now)
    }

    pub async fn summary(&self, now: Timestamp) -> TreasurySummary {
        self.inner.lock().await.summary(now)
    }

    /// Snapshot under the treasury lock, then save without holding it.
    ///
    /// Persists run one at a time in call order; operations keep running
    /// while a save is in flight.
    pub async fn persist<S: TreasuryStore + ?Sized>(&self, store: &S, now: Timestamp) -> StoreResult<()> {
        let _persisting = self.persist_guard.lock().await;
        let snapshot = self.inner.lock().await.snapshot(now);
        store.save_snapshot(&snapshot).await
    }
}
