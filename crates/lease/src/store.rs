//! The lease map.
//!
//! Stores hold leases and nothing else: no expiry checks, no holder checks. All operations
//! are total. Only [`LeaseController`](crate::LeaseController) writes to a store.

use crate::lease::{Lease, RecordId};
use std::collections::HashMap;

/// Read/write primitives over `record -> lease`.
///
/// Keyed storage means at most one lease can exist per record.
pub trait LeaseStore {
    fn get(&self, record_id: &RecordId) -> Option<&Lease>;

    /// Inserts or overwrites the lease for `record_id`.
    fn set(&mut self, record_id: RecordId, lease: Lease);

    /// Removes the lease for `record_id`, returning it. Absent ids are a no-op.
    fn delete(&mut self, record_id: &RecordId) -> Option<Lease>;

    /// Snapshot of every stored lease, in no particular order.
    fn entries(&self) -> Vec<(RecordId, Lease)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local lease store, dropped with the session.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLeaseStore {
    leases: HashMap<RecordId, Lease>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaseStore for InMemoryLeaseStore {
    fn get(&self, record_id: &RecordId) -> Option<&Lease> {
        self.leases.get(record_id)
    }

    fn set(&mut self, record_id: RecordId, lease: Lease) {
        self.leases.insert(record_id, lease);
    }

    fn delete(&mut self, record_id: &RecordId) -> Option<Lease> {
        self.leases.remove(record_id)
    }

    fn entries(&self) -> Vec<(RecordId, Lease)> {
        self.leases
            .iter()
            .map(|(id, lease)| (id.clone(), lease.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.leases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::Holder;

    fn lease(record: &str, holder: &str, at: u64) -> Lease {
        Lease::new(RecordId::from(record), &Holder::new(holder, holder), at)
    }

    #[test]
    fn test_set_overwrites_existing_lease() {
        let mut store = InMemoryLeaseStore::new();
        store.set(RecordId::from("p1"), lease("p1", "alice", 0));
        store.set(RecordId::from("p1"), lease("p1", "bob", 10));

        assert_eq!(store.len(), 1);
        let stored = store.get(&RecordId::from("p1")).unwrap();
        assert_eq!(stored.holder_id.as_str(), "bob");
        assert_eq!(stored.acquired_at, 10);
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let mut store = InMemoryLeaseStore::new();
        assert!(store.delete(&RecordId::from("missing")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_entries_returns_snapshot() {
        let mut store = InMemoryLeaseStore::new();
        store.set(RecordId::from("p1"), lease("p1", "alice", 0));
        store.set(RecordId::from("p2"), lease("p2", "bob", 0));

        let mut ids: Vec<String> = store
            .entries()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["p1", "p2"]);

        store.delete(&RecordId::from("p1"));
        assert_eq!(store.len(), 1);
    }
}
