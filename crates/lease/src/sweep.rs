//! Periodic eviction of expired leases.
//!
//! Lazy eviction only happens when somebody looks at a record. The sweeper runs on a fixed
//! interval regardless, so lock badges clear even if nobody touches the record again.

use crate::clock::Clock;
use crate::controller::LeaseController;
use crate::lease::Millis;
use crate::store::LeaseStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Anything that can evict its expired leases.
pub trait Sweep {
    /// Evicts expired leases as of `now`, returning how many were removed.
    fn sweep_expired(&mut self, now: Millis) -> usize;
}

impl<S: LeaseStore> Sweep for LeaseController<S> {
    fn sweep_expired(&mut self, now: Millis) -> usize {
        LeaseController::sweep_expired(self, now)
    }
}

/// Background task calling [`Sweep::sweep_expired`] every `interval`.
pub struct Sweeper<T> {
    target: Arc<Mutex<T>>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl<T> Sweeper<T>
where
    T: Sweep + Send + 'static,
{
    pub fn new(target: Arc<Mutex<T>>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            target,
            clock,
            interval,
        }
    }

    /// One pass. Returns the number of evicted leases, or `None` if the target's mutex is
    /// poisoned.
    pub fn tick(&self) -> Option<usize> {
        let now = self.clock.now_millis();
        match self.target.lock() {
            Ok(mut target) => Some(target.sweep_expired(now)),
            Err(_) => {
                tracing::warn!("lease sweep skipped: target lock poisoned");
                None
            }
        }
    }

    /// Start the sweep loop as a background task. Abort the handle to stop it.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                "lease sweeper started (interval={}ms)",
                self.interval.as_millis()
            );
            let mut interval = tokio::time::interval(self.interval);
            // The first tick completes immediately; skip it so the first sweep happens one
            // full interval after start.
            interval.tick().await;
            loop {
                interval.tick().await;
                self.tick();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::constants::{LEASE_TTL_MS, SWEEP_INTERVAL_MS};
    use crate::lease::{Holder, RecordId};

    const T0: Millis = 1_700_000_000_000;

    fn shared_controller() -> Arc<Mutex<LeaseController>> {
        let mut controller = LeaseController::default();
        controller
            .acquire(&RecordId::from("p1"), &Holder::new("alice", "Alice"), T0)
            .unwrap();
        Arc::new(Mutex::new(controller))
    }

    #[test]
    fn test_tick_uses_injected_clock() {
        let controller = shared_controller();
        let clock = Arc::new(ManualClock::new(T0 + 1));
        let sweeper = Sweeper::new(
            controller.clone(),
            clock.clone(),
            Duration::from_millis(SWEEP_INTERVAL_MS),
        );

        assert_eq!(sweeper.tick(), Some(0));
        clock.set(T0 + LEASE_TTL_MS);
        assert_eq!(sweeper.tick(), Some(1));
        assert!(controller.lock().unwrap().store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_evicts_without_access() {
        let controller = shared_controller();
        let clock = Arc::new(ManualClock::new(T0 + LEASE_TTL_MS + 1));
        let handle = Sweeper::new(
            controller.clone(),
            clock,
            Duration::from_millis(SWEEP_INTERVAL_MS),
        )
        .start();

        // let the task register its interval
        tokio::task::yield_now().await;
        assert_eq!(controller.lock().unwrap().store().len(), 1);

        tokio::time::sleep(Duration::from_millis(SWEEP_INTERVAL_MS + 1)).await;
        assert!(controller.lock().unwrap().store().is_empty());

        handle.abort();
    }
}
