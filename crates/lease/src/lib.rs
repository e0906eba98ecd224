//! # Casework Lease
//!
//! Advisory edit leases for patient records.
//!
//! A lease is a time-bounded claim by one session user that they are editing a record. Leases
//! are purely advisory: they live in process memory, are never persisted, and only coordinate
//! callers that go through the same [`LeaseController`].
//!
//! The crate is split the same way the decision flow runs:
//! - [`store`]: the `record -> lease` map and nothing else
//! - [`policy`]: side-effect free decisions (expired? active? who may edit?)
//! - [`controller`]: the only writer of the store (acquire, release, toggle, guard, sweep)
//! - [`sweep`]: the periodic eviction task, driven by an injected [`Clock`]
//!
//! Time is always passed in by the caller as milliseconds since the Unix epoch, which keeps
//! every policy decision deterministic under test.

pub mod clock;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod lease;
pub mod policy;
pub mod store;
pub mod sweep;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LeaseConfig;
pub use constants::{LEASE_TTL_MS, SWEEP_INTERVAL_MS};
pub use controller::{LeaseController, ToggleOutcome};
pub use error::{LeaseConfigError, LockConflict};
pub use lease::{Holder, HolderId, Lease, Millis, RecordId};
pub use policy::{LeasePolicy, LockState};
pub use store::{InMemoryLeaseStore, LeaseStore};
pub use sweep::{Sweep, Sweeper};
