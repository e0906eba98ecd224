//! Constants used throughout the lease crate.

/// How long a lease stays active after it was acquired or last renewed (5 minutes).
pub const LEASE_TTL_MS: u64 = 5 * 60 * 1000;

/// How often the background sweep evicts expired leases (30 seconds).
pub const SWEEP_INTERVAL_MS: u64 = 30 * 1000;

/// Environment variable overriding [`LEASE_TTL_MS`].
pub const LEASE_TTL_ENV: &str = "CASEWORK_LEASE_TTL_MS";

/// Environment variable overriding [`SWEEP_INTERVAL_MS`].
pub const SWEEP_INTERVAL_ENV: &str = "CASEWORK_SWEEP_INTERVAL_MS";
