//! Lease Controller.
//!
//! The controller is the only component that writes to a [`LeaseStore`]. It turns user
//! intent (open for edit, delete, toggle lock, update a note) into policy checks plus store
//! mutations, and it owns eviction of expired leases, both lazily when a query trips over one
//! and eagerly through [`LeaseController::sweep_expired`].
//!
//! Conflicts come back as values ([`LockConflict`], [`ToggleOutcome::Conflict`]). Rendering
//! them for the user is left to the caller.
//!
//! ## Per-record states
//!
//! From the point of view of one session user a record is `Unlocked`, `LockedBySelf` or
//! `LockedByOther` (see [`LockState`]). Acquire moves `Unlocked` to `LockedBySelf`; release
//! and expiry move either locked state back to `Unlocked`; a toggle against `LockedByOther`
//! reports a conflict and changes nothing.

use crate::error::LockConflict;
use crate::lease::{Holder, HolderId, Lease, Millis, RecordId};
use crate::policy::{LeasePolicy, LockState};
use crate::store::{InMemoryLeaseStore, LeaseStore};
use serde::Serialize;

/// Result of [`LeaseController::toggle`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Released,
    Acquired,
    Conflict { holder_name: String },
}

#[derive(Debug, Clone)]
pub struct LeaseController<S = InMemoryLeaseStore> {
    store: S,
    policy: LeasePolicy,
}

impl Default for LeaseController<InMemoryLeaseStore> {
    fn default() -> Self {
        Self::new(InMemoryLeaseStore::new(), LeasePolicy::default())
    }
}

impl<S: LeaseStore> LeaseController<S> {
    /// Creates a controller that takes ownership of `store`.
    pub fn new(store: S, policy: LeasePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> LeasePolicy {
        self.policy
    }

    /// Read-only view of the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Queries (with lazy eviction)
    // ------------------------------------------------------------------

    /// Drops the lease for `record_id` if it has expired. Returns true if one was evicted.
    fn evict_if_expired(&mut self, record_id: &RecordId, now: Millis) -> bool {
        let expired = self
            .store
            .get(record_id)
            .is_some_and(|lease| self.policy.is_expired(lease, now));
        if expired {
            self.store.delete(record_id);
            tracing::debug!(record = %record_id, "evicted expired lease on access");
        }
        expired
    }

    /// Returns the active lease on `record_id`, if any.
    pub fn lease(&mut self, record_id: &RecordId, now: Millis) -> Option<Lease> {
        self.evict_if_expired(record_id, now);
        self.store.get(record_id).cloned()
    }

    pub fn is_active(&mut self, record_id: &RecordId, now: Millis) -> bool {
        self.evict_if_expired(record_id, now);
        self.policy.is_active(&self.store, record_id, now)
    }

    pub fn is_held_by(&mut self, record_id: &RecordId, holder_id: &HolderId, now: Millis) -> bool {
        self.evict_if_expired(record_id, now);
        self.policy.is_held_by(&self.store, record_id, holder_id, now)
    }

    pub fn can_edit(&mut self, record_id: &RecordId, holder_id: &HolderId, now: Millis) -> bool {
        self.evict_if_expired(record_id, now);
        self.policy.can_edit(&self.store, record_id, holder_id, now)
    }

    pub fn lock_state(&mut self, record_id: &RecordId, viewer: &HolderId, now: Millis) -> LockState {
        self.evict_if_expired(record_id, now);
        self.policy.lock_state(&self.store, record_id, viewer, now)
    }

    fn check(
        &mut self,
        record_id: &RecordId,
        holder_id: &HolderId,
        now: Millis,
    ) -> Result<(), LockConflict> {
        match self.lock_state(record_id, holder_id, now) {
            LockState::LockedByOther { holder_name } => {
                tracing::warn!(
                    record = %record_id,
                    holder = %holder_id,
                    "blocked by lease held by {}",
                    holder_name
                );
                Err(LockConflict { holder_name })
            }
            LockState::Unlocked | LockState::LockedBySelf => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Claims `record_id` for `holder`.
    ///
    /// Succeeds when the record is unleased, its lease has expired, or `holder` already holds
    /// it (which renews `acquired_at`).
    ///
    /// # Errors
    ///
    /// Returns [`LockConflict`] carrying the current holder's name if another user holds an
    /// active lease.
    pub fn acquire(
        &mut self,
        record_id: &RecordId,
        holder: &Holder,
        now: Millis,
    ) -> Result<(), LockConflict> {
        self.check(record_id, &holder.id, now)?;

        let renewed = self.store.get(record_id).is_some();
        self.store
            .set(record_id.clone(), Lease::new(record_id.clone(), holder, now));

        if renewed {
            tracing::debug!(record = %record_id, holder = %holder.id, "renewed lease");
        } else {
            tracing::debug!(record = %record_id, holder = %holder.id, "acquired lease");
        }
        Ok(())
    }

    /// Drops any lease on `record_id`, whoever holds it. Releasing an unleased record is a
    /// no-op.
    pub fn release(&mut self, record_id: &RecordId) {
        if let Some(lease) = self.store.delete(record_id) {
            tracing::debug!(record = %record_id, holder = %lease.holder_id, "released lease");
        }
    }

    /// Lock button semantics: release if `holder` holds the record, acquire if nobody does,
    /// otherwise report who is in the way.
    pub fn toggle(&mut self, record_id: &RecordId, holder: &Holder, now: Millis) -> ToggleOutcome {
        match self.lock_state(record_id, &holder.id, now) {
            LockState::LockedBySelf => {
                self.release(record_id);
                ToggleOutcome::Released
            }
            LockState::Unlocked => match self.acquire(record_id, holder, now) {
                Ok(()) => ToggleOutcome::Acquired,
                Err(LockConflict { holder_name }) => ToggleOutcome::Conflict { holder_name },
            },
            LockState::LockedByOther { holder_name } => ToggleOutcome::Conflict { holder_name },
        }
    }

    /// Evicts every expired lease. Returns how many were removed.
    pub fn sweep_expired(&mut self, now: Millis) -> usize {
        let expired: Vec<RecordId> = self
            .store
            .entries()
            .into_iter()
            .filter(|(_, lease)| self.policy.is_expired(lease, now))
            .map(|(record_id, _)| record_id)
            .collect();

        for record_id in &expired {
            self.store.delete(record_id);
        }

        if !expired.is_empty() {
            tracing::info!(evicted = expired.len(), remaining = self.store.len(), "swept expired leases");
        }
        expired.len()
    }

    /// Runs `action` only if `holder_id` may edit `record_id`. Does not acquire.
    ///
    /// Used for delete and note updates.
    ///
    /// # Errors
    ///
    /// Returns [`LockConflict`] without running `action` when another user holds the record.
    pub fn guard<T>(
        &mut self,
        record_id: &RecordId,
        holder_id: &HolderId,
        now: Millis,
        action: impl FnOnce() -> T,
    ) -> Result<T, LockConflict> {
        self.check(record_id, holder_id, now)?;
        Ok(action())
    }

    /// Acquires (or renews) `record_id` for `holder`, then runs `action`.
    ///
    /// Used when a record is opened for editing.
    ///
    /// # Errors
    ///
    /// Returns [`LockConflict`] without running `action` when another user holds the record.
    pub fn guard_edit<T>(
        &mut self,
        record_id: &RecordId,
        holder: &Holder,
        now: Millis,
        action: impl FnOnce() -> T,
    ) -> Result<T, LockConflict> {
        self.acquire(record_id, holder, now)?;
        Ok(action())
    }
}
