//! Call gate: one "next allowed call" instant shared by every request to the
//! accrual service.

use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Longest the gate can be held closed in one step
pub const MAX_DEFER: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct CallGate {
    next_call: Instant,
    min_delay: Duration,
}

impl CallGate {
    /// Open immediately; after each successful call the gate stays closed
    /// for `min_delay`.
    pub fn new(min_delay: Duration) -> Self {
        Self {
            next_call: Instant::now(),
            min_delay,
        }
    }

    pub fn next_call(&self) -> Instant {
        self.next_call
    }

    /// Close the gate for `delay` from now (rate limiting), at most [`MAX_DEFER`].
    pub fn defer(&mut self, delay: Duration) {
        self.next_call = Instant::now() + delay.min(MAX_DEFER);
    }

    /// Back to the minimum spacing after a successful call.
    pub fn reset(&mut self) {
        self.next_call = Instant::now() + self.min_delay;
    }

    /// Wait until the gate opens. Returns `false` if cancelled first.
    pub async fn wait(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep_until(self.next_call) => true,
        }
    }
}
