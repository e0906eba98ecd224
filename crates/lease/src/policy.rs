//! Lease decisions.
//!
//! Every function here reads the store and the caller-supplied `now` and returns a verdict.
//! Nothing is mutated, so an expired lease that is still stored is simply reported as
//! inactive. Evicting it is the controller's job.

use crate::constants::LEASE_TTL_MS;
use crate::lease::{HolderId, Lease, Millis, RecordId};
use crate::store::LeaseStore;
use serde::Serialize;

/// Lock state of a record as seen by one viewer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    Unlocked,
    LockedBySelf,
    LockedByOther { holder_name: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeasePolicy {
    ttl_ms: Millis,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self::new(LEASE_TTL_MS)
    }
}

impl LeasePolicy {
    pub fn new(ttl_ms: Millis) -> Self {
        Self { ttl_ms }
    }

    pub fn ttl_ms(&self) -> Millis {
        self.ttl_ms
    }

    /// A lease is expired once its age reaches the TTL. The boundary itself is expired.
    pub fn is_expired(&self, lease: &Lease, now: Millis) -> bool {
        lease.age(now) >= self.ttl_ms
    }

    /// Returns the lease for `record_id` if one is stored and not expired.
    pub fn active_lease<'a, S: LeaseStore + ?Sized>(
        &self,
        store: &'a S,
        record_id: &RecordId,
        now: Millis,
    ) -> Option<&'a Lease> {
        store
            .get(record_id)
            .filter(|lease| !self.is_expired(lease, now))
    }

    pub fn is_active<S: LeaseStore + ?Sized>(
        &self,
        store: &S,
        record_id: &RecordId,
        now: Millis,
    ) -> bool {
        self.active_lease(store, record_id, now).is_some()
    }

    pub fn is_held_by<S: LeaseStore + ?Sized>(
        &self,
        store: &S,
        record_id: &RecordId,
        holder_id: &HolderId,
        now: Millis,
    ) -> bool {
        self.active_lease(store, record_id, now)
            .is_some_and(|lease| &lease.holder_id == holder_id)
    }

    /// The single authorisation gate for edit, delete and note updates.
    pub fn can_edit<S: LeaseStore + ?Sized>(
        &self,
        store: &S,
        record_id: &RecordId,
        holder_id: &HolderId,
        now: Millis,
    ) -> bool {
        !self.is_active(store, record_id, now)
            || self.is_held_by(store, record_id, holder_id, now)
    }

    pub fn lock_state<S: LeaseStore + ?Sized>(
        &self,
        store: &S,
        record_id: &RecordId,
        viewer: &HolderId,
        now: Millis,
    ) -> LockState {
        match self.active_lease(store, record_id, now) {
            None => LockState::Unlocked,
            Some(lease) if &lease.holder_id == viewer => LockState::LockedBySelf,
            Some(lease) => LockState::LockedByOther {
                holder_name: lease.holder_name.clone(),
            },
        }
    }
}
