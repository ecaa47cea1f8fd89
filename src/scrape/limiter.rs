//! Job-scoped fetch rate limiting
//!
//! Every fetch of a job, whatever pass or batch it belongs to, acquires a
//! permit here first. The limiter enforces two independent bounds: a hard cap
//! on simultaneously in-flight fetches and a minimum spacing between
//! consecutive dispatches. The second bound keeps a fresh batch from landing
//! as a thundering herd even when the in-flight cap would allow it.

use crate::config::FetchConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Shared per-job limiter handed to every worker
#[derive(Clone)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
    last_dispatch: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

/// Held for the duration of one fetch; dropping it releases the slot
///
/// Release is tied to drop so the slot comes back on every exit path,
/// including errors and timeouts.
pub struct FetchPermit {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.max_in_flight as usize)),
            last_dispatch: Arc::new(Mutex::new(None)),
            min_interval: Duration::from_millis(config.min_dispatch_interval_ms),
        }
    }

    /// Waits for an in-flight slot and for the dispatch spacing
    pub async fn acquire(&self) -> FetchPermit {
        // The semaphore is never closed while the limiter is alive.
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("limiter semaphore closed"));

        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            let next_allowed = previous + self.min_interval;
            let now = Instant::now();
            if next_allowed > now {
                tokio::time::sleep(next_allowed - now).await;
            }
        }
        *last = Some(Instant::now());
        drop(last);

        FetchPermit { _permit: permit }
    }

    /// In-flight slots currently free
    #[cfg(test)]
    fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
