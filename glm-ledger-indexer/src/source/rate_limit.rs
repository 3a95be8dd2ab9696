//! Shared outbound call budget for the block explorer

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Spaces outbound calls so no more than `per_second` start in any second.
///
/// One limiter is shared by every client that talks to the same explorer
/// key; callers serialize through [`RateLimiter::acquire`].
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(per_second: u32) -> Self {
        let per_second = per_second.max(1);
        Self {
            interval: Duration::from_secs(1) / per_second,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Minimum spacing between two calls
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next call slot is available and claim it
    pub async fn acquire(&self) {
        let mut next_slot = self.next_slot.lock().await;
        let now = Instant::now();
        if *next_slot > now {
            sleep_until(*next_slot).await;
        }
        *next_slot = Instant::now().max(*next_slot) + self.interval;
    }

    /// Push the next slot out, used after the explorer reports throttling
    pub async fn penalize(&self, delay: Duration) {
        let mut next_slot = self.next_slot.lock().await;
        let candidate = Instant::now() + delay;
        if candidate > *next_slot {
            *next_slot = candidate;
        }
    }
}
