//! Throttle filter.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::Result;
use crate::store::{derived, Cleanup, ReadSignal, Readable, Setter};
use crate::timer::Scheduler;

/// Publish at most one upstream value per `delay` window.
///
/// A value passes immediately when nothing has passed yet or more than
/// `delay` has elapsed since the last immediate pass. Otherwise it is
/// published after `delay`, unless a newer value replaces it first.
///
/// Fails with [`StoreError::NoRuntime`](crate::StoreError::NoRuntime) outside
/// a tokio runtime.
pub fn throttle<S>(store: S, delay: Duration) -> Result<ReadSignal<S::Value>>
where
    S: Readable + Send + Sync + 'static,
    S::Value: Clone + Send + Sync + 'static,
{
    let scheduler = Scheduler::current()?;
    let last_pass: Mutex<Option<Instant>> = Mutex::new(None);

    Ok(derived(
        store,
        move |value: &S::Value, setter: &Setter<S::Value>| {
            let now = Instant::now();
            let immediate = {
                let mut last_pass = last_pass.lock();
                let due = match *last_pass {
                    None => true,
                    Some(previous) => now.duration_since(previous) > delay,
                };
                if due {
                    *last_pass = Some(now);
                }
                due
            };

            if immediate {
                setter.set(value.clone());
                return None;
            }

            let setter = setter.clone();
            let value = value.clone();
            let timer = scheduler.schedule(delay, move || setter.set(value));
            Some(Box::new(move || timer.cancel()) as Cleanup)
        },
    ))
}
