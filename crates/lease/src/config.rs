//! Lease runtime configuration.
//!
//! Resolved once at process startup and passed in. Nothing in this crate reads environment
//! variables while handling a command.

use crate::constants::{LEASE_TTL_ENV, LEASE_TTL_MS, SWEEP_INTERVAL_ENV, SWEEP_INTERVAL_MS};
use crate::error::LeaseConfigError;
use crate::policy::LeasePolicy;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeaseConfig {
    ttl_ms: u64,
    sweep_interval_ms: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl_ms: LEASE_TTL_MS,
            sweep_interval_ms: SWEEP_INTERVAL_MS,
        }
    }
}

impl LeaseConfig {
    /// # Errors
    ///
    /// Returns [`LeaseConfigError::Zero`] if either duration is zero.
    pub fn new(ttl_ms: u64, sweep_interval_ms: u64) -> Result<Self, LeaseConfigError> {
        if ttl_ms == 0 {
            return Err(LeaseConfigError::Zero {
                name: LEASE_TTL_ENV,
            });
        }
        if sweep_interval_ms == 0 {
            return Err(LeaseConfigError::Zero {
                name: SWEEP_INTERVAL_ENV,
            });
        }
        Ok(Self {
            ttl_ms,
            sweep_interval_ms,
        })
    }

    /// Build from optional raw environment values. Missing or blank values fall back to the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseConfigError`] if a value is present but not a positive integer.
    pub fn from_env_values(
        ttl: Option<String>,
        sweep_interval: Option<String>,
    ) -> Result<Self, LeaseConfigError> {
        let ttl_ms = millis_from_env_value(LEASE_TTL_ENV, ttl)?.unwrap_or(LEASE_TTL_MS);
        let sweep_interval_ms =
            millis_from_env_value(SWEEP_INTERVAL_ENV, sweep_interval)?.unwrap_or(SWEEP_INTERVAL_MS);
        Self::new(ttl_ms, sweep_interval_ms)
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn policy(&self) -> LeasePolicy {
        LeasePolicy::new(self.ttl_ms)
    }
}

fn millis_from_env_value(
    name: &'static str,
    value: Option<String>,
) -> Result<Option<u64>, LeaseConfigError> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    value
        .map(|v| {
            v.parse::<u64>()
                .map_err(|_| LeaseConfigError::NotANumber { name, value: v })
        })
        .transpose()
}
