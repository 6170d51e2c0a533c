//! Debounce filter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::Result;
use crate::store::{derived, Cleanup, ReadSignal, Readable, Setter};
use crate::timer::Scheduler;

/// Publish upstream values only once they have been stable for `delay`.
///
/// The very first value passes through immediately. Every later value is
/// held for `delay` and dropped if a newer one arrives in the meantime.
///
/// Fails with [`StoreError::NoRuntime`](crate::StoreError::NoRuntime) outside
/// a tokio runtime.
pub fn debounce<S>(store: S, delay: Duration) -> Result<ReadSignal<S::Value>>
where
    S: Readable + Send + Sync + 'static,
    S::Value: Clone + Send + Sync + 'static,
{
    let scheduler = Scheduler::current()?;
    let initialised = AtomicBool::new(false);

    Ok(derived(
        store,
        move |value: &S::Value, setter: &Setter<S::Value>| {
            if !initialised.swap(true, Ordering::SeqCst) {
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
