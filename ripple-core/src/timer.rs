//! Cancellable one-shot timers.
//!
//! Every timer is a tokio task that sleeps until a deadline and then runs its
//! callback. The deadline is computed when the timer is scheduled, not when the
//! task is first polled, so a busy runtime does not stretch delays.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{Result, StoreError};

/// Deadline used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Schedules callbacks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct Scheduler {
    handle: Handle,
}

impl Scheduler {
    /// Capture the runtime the caller is running on.
    ///
    /// Fails with [`StoreError::NoRuntime`] outside a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|_| StoreError::NoRuntime)
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Run `callback` once after `delay`.
    ///
    /// Delays too large to represent saturate to a deadline decades away.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        // Entering the runtime makes `Instant::now` read its (possibly paused) clock.
        let _guard = self.handle.enter();
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);

        let task = self.handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            callback();
        });

        TimerHandle { task }
    }
}

/// Handle to a scheduled timer.
///
/// Dropping the handle does not cancel the timer; call [`TimerHandle::cancel`].
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Cancel the timer. Has no effect if it already fired.
    pub fn cancel(self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn scheduler_requires_runtime() {
        assert!(matches!(Scheduler::current(), Err(StoreError::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_delay() {
        let fired = Arc::new(AtomicI32::new(0));
        let fired_clone = fired.clone();

        let scheduler = Scheduler::current().unwrap();
        let _timer = scheduler.schedule(Duration::from_millis(100), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let fired = Arc::new(AtomicI32::new(0));
        let fired_clone = fired.clone();

        let scheduler = Scheduler::current().unwrap();
        let timer = scheduler.schedule(Duration::from_millis(10), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_delay_saturates() {
        let fired = Arc::new(AtomicI32::new(0));
        let fired_clone = fired.clone();

        let scheduler = Scheduler::current().unwrap();
        let timer = scheduler.schedule(Duration::MAX, move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(86_400 * 365)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        timer.cancel();
    }
}
