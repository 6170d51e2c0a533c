//! Derived stores.
//!
//! A derived store is a [`Signal`] whose start notifier subscribes to one
//! upstream store. It therefore follows the upstream only while it has
//! subscribers of its own:
//!
//! 1. The first downstream subscriber starts it, which subscribes upstream.
//!    The upstream delivers its current value synchronously, so the derived
//!    store has a value before that subscriber is called.
//!
//! 2. For every upstream value, the cleanup returned by the previous
//!    derivation runs first, then the derivation itself. It may set a value
//!    right away, later (from a timer), or not at all.
//!
//! 3. When the last downstream subscriber leaves, the pending cleanup runs
//!    and the upstream subscription is dropped.

use std::sync::Arc;

use parking_lot::Mutex;

use super::signal::{Cleanup, ReadSignal, Setter, Signal};
use super::Readable;

/// Per-session state shared by the upstream callback and the stop cleanup.
#[derive(Default)]
struct Session {
    cleanup: Option<Cleanup>,
    stopped: bool,
}

/// Create a store derived from `upstream` by `derive`.
///
/// `derive` receives each upstream value and a [`Setter`] for the derived
/// store, and may return a [`Cleanup`] that runs before the next derivation
/// or when the derived store stops.
///
/// ```rust
/// use ripple_core::store::{derived, get, Setter};
/// use ripple_core::Signal;
///
/// let celsius = Signal::new(100.0_f64);
/// let fahrenheit = derived(celsius.clone(), |c: &f64, set: &Setter<f64>| {
///     set.set(c * 9.0 / 5.0 + 32.0);
///     None
/// });
/// assert_eq!(get(&fahrenheit), Some(212.0));
/// ```
pub fn derived<S, V, F>(upstream: S, derive: F) -> ReadSignal<V>
where
    S: Readable + Send + Sync + 'static,
    S::Value: 'static,
    V: Clone + Send + Sync + 'static,
    F: Fn(&S::Value, &Setter<V>) -> Option<Cleanup> + Send + Sync + 'static,
{
    let derive = Arc::new(derive);

    let signal = Signal::lazy(move |setter: Setter<V>| {
        let session = Arc::new(Mutex::new(Session::default()));

        let derive = Arc::clone(&derive);
        let callback_session = Arc::clone(&session);
        let upstream_subscription = upstream.subscribe(move |value: &S::Value| {
            let previous = callback_session.lock().cleanup.take();
            if let Some(cleanup) = previous {
                cleanup();
            }

            let next = derive(value, &setter);

            let orphaned = {
                let mut session = callback_session.lock();
                if session.stopped {
                    next
                } else {
                    session.cleanup = next;
                    None
                }
            };
            // The derived store stopped while `derive` was running.
            if let Some(cleanup) = orphaned {
                cleanup();
            }
        });

        Some(Box::new(move || {
            upstream_subscription.unsubscribe();
            let last = {
                let mut session = session.lock();
                session.stopped = true;
                session.cleanup.take()
            };
            if let Some(cleanup) = last {
                cleanup();
            }
        }) as Cleanup)
    });

    signal.read_only()
}

/// Create a store whose value is `f` applied to the upstream value.
pub fn map<S, V, F>(upstream: S, f: F) -> ReadSignal<V>
where
    S: Readable + Send + Sync + 'static,
    S::Value: 'static,
    V: Clone + Send + Sync + 'static,
    F: Fn(&S::Value) -> V + Send + Sync + 'static,
{
    derived(upstream, move |value, setter| {
        setter.set(f(value));
        None
    })
}
