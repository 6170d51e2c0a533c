//! Signal Implementation
//!
//! A Signal is the primitive single-value store. It holds one value and
//! notifies its subscribers every time the value is set.
//!
//! # Start notifiers
//!
//! A signal may be created with a start notifier. The notifier runs when the
//! signal gains its first subscriber and receives a [`Setter`] it can use to
//! push values from outside (an event listener, a timer, another store). It may
//! return a [`Cleanup`] that runs when the last subscriber leaves. The next
//! subscriber after that starts the signal again.
//!
//! While the notifier is running, `set` records the value without
//! broadcasting; the subscriber that triggered the start receives the latest
//! value once the notifier returns.
//!
//! # Thread Safety
//!
//! State lives behind a `parking_lot::Mutex`. The lock is never held while a
//! subscriber callback, start notifier or cleanup runs.

use std::fmt::{self, Debug};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::subscriber::{broadcast, deliver, Callback, SubscriberId, SubscriberSet, Subscription};
use super::{Readable, Writable};

/// Teardown returned by a start notifier or a derivation.
pub type Cleanup = Box<dyn FnOnce() + Send>;

type StartNotifier<V> = Arc<dyn Fn(Setter<V>) -> Option<Cleanup> + Send + Sync>;

struct SignalState<V> {
    /// `None` only for derived signals that have not produced a value yet.
    value: Option<V>,
    subscribers: SubscriberSet<V>,
    /// Cleanup returned by the start notifier of the current session.
    stop: Option<Cleanup>,
    /// True between the first subscriber arriving and the last one leaving.
    running: bool,
    /// True while the start notifier is executing.
    starting: bool,
}

struct SignalInner<V> {
    state: Mutex<SignalState<V>>,
    start: Option<StartNotifier<V>>,
}

impl<V> SignalInner<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn new(value: Option<V>, start: Option<StartNotifier<V>>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SignalState {
                value,
                subscribers: SubscriberSet::new(),
                stop: None,
                running: false,
                starting: false,
            }),
            start,
        })
    }

    fn set(&self, value: V) {
        let callbacks = {
            let mut state = self.state.lock();
            let callbacks = (!state.starting).then(|| state.subscribers.snapshot());
            state.value = Some(value.clone());
            callbacks
        };

        if let Some(callbacks) = callbacks {
            broadcast(&callbacks, &value);
        }
    }

    fn subscribe(self: &Arc<Self>, callback: Callback<V>) -> Subscription {
        let (id, start) = {
            let mut state = self.state.lock();
            let id = state.subscribers.insert(Arc::clone(&callback));
            let start = match &self.start {
                Some(start) if !state.running => {
                    state.running = true;
                    state.starting = true;
                    Some(Arc::clone(start))
                }
                _ => None,
            };
            (id, start)
        };

        if let Some(start) = start {
            tracing::trace!("starting signal");
            let setter = Setter {
                inner: Arc::downgrade(self),
            };
            let stop = match panic::catch_unwind(AssertUnwindSafe(|| start(setter))) {
                Ok(stop) => stop,
                Err(payload) => {
                    // Roll back so the next subscriber retries the start.
                    {
                        let mut state = self.state.lock();
                        state.subscribers.remove(id);
                        state.starting = false;
                        state.running = false;
                    }
                    tracing::error!("start notifier panicked");
                    panic::resume_unwind(payload);
                }
            };

            let orphaned = {
                let mut state = self.state.lock();
                state.starting = false;
                if state.running {
                    state.stop = stop;
                    None
                } else {
                    // Every subscriber left while the notifier was running.
                    stop
                }
            };
            if let Some(stop) = orphaned {
                stop();
            }
        }

        let current = self.state.lock().value.clone();
        if let Some(value) = current {
            deliver(id, &callback, &value);
        }

        let weak = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.unsubscribe(id);
            }
        })
    }

    fn unsubscribe(&self, id: SubscriberId) {
        let stop = {
            let mut state = self.state.lock();
            if !state.subscribers.remove(id) {
                return;
            }
            if state.subscribers.is_empty() && state.running {
                state.running = false;
                state.stop.take()
            } else {
                None
            }
        };

        if let Some(stop) = stop {
            tracing::trace!("stopping signal");
            stop();
        }
    }
}

/// A writable single-value store.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Readable, Signal};
/// use std::sync::{Arc, Mutex};
///
/// let count = Signal::new(0);
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = seen.clone();
/// let subscription = count.subscribe(move |v: &i32| sink.lock().unwrap().push(*v));
///
/// count.set(5);
/// count.update(|v| v + 1);
/// assert_eq!(*seen.lock().unwrap(), vec![0, 5, 6]);
/// subscription.unsubscribe();
/// ```
pub struct Signal<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<V>>,
}

impl<V> Signal<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: V) -> Self {
        Self {
            inner: SignalInner::new(Some(value), None),
        }
    }

    /// Create a signal whose `start` notifier runs when the first subscriber
    /// arrives. The cleanup it returns runs when the last subscriber leaves.
    pub fn with_start<F>(value: V, start: F) -> Self
    where
        F: Fn(Setter<V>) -> Option<Cleanup> + Send + Sync + 'static,
    {
        Self {
            inner: SignalInner::new(Some(value), Some(Arc::new(start))),
        }
    }

    /// Like [`Signal::with_start`], but without an initial value. Subscribers
    /// are only called once the notifier has set one.
    pub(crate) fn lazy<F>(start: F) -> Self
    where
        F: Fn(Setter<V>) -> Option<Cleanup> + Send + Sync + 'static,
    {
        Self {
            inner: SignalInner::new(None, Some(Arc::new(start))),
        }
    }

    /// Set a new value and notify subscribers.
    pub fn set(&self, value: V) {
        self.inner.set(value);
    }

    /// Update the value using a function of the current one.
    ///
    /// Does nothing on a lazy signal that has no value yet.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&V) -> V,
    {
        let current = self.inner.state.lock().value.clone();
        if let Some(current) = current {
            self.set(f(&current));
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    /// A handle that can subscribe but not set.
    pub fn read_only(&self) -> ReadSignal<V> {
        ReadSignal {
            signal: self.clone(),
        }
    }
}

impl<V> Readable for Signal<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Value = V;

    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.inner.subscribe(Arc::new(callback))
    }
}

impl<V> Writable for Signal<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Input = V;

    fn set(&self, value: V) {
        self.inner.set(value);
    }
}

impl<V> Clone for Signal<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Debug for Signal<V>
where
    V: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Signal")
            .field("value", &state.value)
            .field("subscriber_count", &state.subscribers.len())
            .field("running", &state.running)
            .finish()
    }
}

/// Read-only view of a [`Signal`].
///
/// Returned by derived stores and the event bridge.
pub struct ReadSignal<V>
where
    V: Clone + Send + Sync + 'static,
{
    signal: Signal<V>,
}

impl<V> ReadSignal<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }
}

impl<V> Readable for ReadSignal<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Value = V;

    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.signal.subscribe(callback)
    }
}

impl<V> Clone for ReadSignal<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<V> Debug for ReadSignal<V>
where
    V: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.signal).finish()
    }
}

/// Handle passed to start notifiers and derivations for pushing values.
///
/// Holds a weak reference: once every handle to the signal is gone, `set` is
/// a no-op.
pub struct Setter<V> {
    inner: Weak<SignalInner<V>>,
}

impl<V> Setter<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn set(&self, value: V) {
        if let Some(inner) = self.inner.upgrade() {
            inner.set(value);
        }
    }
}

impl<V> Clone for Setter<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<V> Debug for Setter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
