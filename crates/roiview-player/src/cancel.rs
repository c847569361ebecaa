//! Cooperative cancellation for the frame loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Granularity at which sleeps observe cancellation.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Shared cancellation flag, one per playback session.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Sleep in slices so cancellation cuts the wait short. Returns
    /// false when the token was cancelled before the duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        while remaining > Duration::ZERO {
            if self.is_cancelled() {
                return false;
            }
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
        !self.is_cancelled()
    }
}
