//! Ephemeral Multi-Value Store
//!
//! A store that accumulates a list of values instead of holding one. Every
//! `set` appends a new entry and broadcasts the whole list, in insertion
//! order, to every subscriber. When the store is configured with a
//! time-to-live, each entry removes itself once its ttl elapses and the
//! shortened list is broadcast again.
//!
//! # Entries
//!
//! Each value is stored under an `EntryId` drawn from a counter owned by the
//! store instance. Ids grow strictly and are never reused, so two equal values
//! are still two distinct entries and a stale timer can never remove a newer
//! entry. Ids stay internal: subscribers receive plain values.
//!
//! # Expiry and reset
//!
//! With a ttl configured, every entry has exactly one pending eviction timer
//! while it is live. The timer either fires (removing its entry) or is
//! cancelled by a reset, never both:
//!
//! - A firing timer only acts if its eviction is still registered.
//! - A reset happens when the last subscriber leaves. It cancels every pending
//!   eviction and clears all entries, so a later subscriber starts from an
//!   empty list rather than whatever was left of the previous session.
//!
//! Without a ttl, entries live as long as the store.
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{EphemeralStore, Readable};
//! use std::sync::{Arc, Mutex};
//!
//! let toasts = EphemeralStore::new();
//! let latest = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = latest.clone();
//! let subscription = toasts.subscribe(move |values: &Vec<&'static str>| {
//!     *sink.lock().unwrap() = values.clone();
//! });
//!
//! toasts.set("saved");
//! toasts.set("synced");
//! assert_eq!(*latest.lock().unwrap(), vec!["saved", "synced"]);
//! subscription.unsubscribe();
//! ```

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::config::{StoreConfig, Ttl};
use crate::error::Result;
use crate::store::{
    broadcast, deliver, Callback, Readable, SubscriberId, SubscriberSet, Subscription, Writable,
};
use crate::timer::{Scheduler, TimerHandle};

/// Identity of one entry within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EntryId(u64);

struct EphemeralState<T> {
    /// Live entries in insertion order.
    entries: IndexMap<EntryId, T>,
    /// One timer per live entry, only when a ttl is configured.
    pending: HashMap<EntryId, TimerHandle>,
    subscribers: SubscriberSet<Vec<T>>,
    /// Last id issued.
    last_id: u64,
}

impl<T: Clone> EphemeralState<T> {
    fn values(&self) -> Vec<T> {
        self.entries.values().cloned().collect()
    }
}

/// Timing configuration, fixed at construction.
struct Expiry {
    ttl: Duration,
    scheduler: Scheduler,
}

struct EphemeralInner<T> {
    state: Mutex<EphemeralState<T>>,
    expiry: Option<Expiry>,
}

impl<T> EphemeralInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn set(self: &Arc<Self>, value: T) {
        let (id, values, callbacks) = {
            let mut state = self.state.lock();
            state.last_id += 1;
            let id = EntryId(state.last_id);
            state.entries.insert(id, value);

            if let Some(expiry) = &self.expiry {
                let weak = Arc::downgrade(self);
                let timer = expiry.scheduler.schedule(expiry.ttl, move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.evict(id);
                    }
                });
                state.pending.insert(id, timer);
            }

            (id, state.values(), state.subscribers.snapshot())
        };

        tracing::trace!(entry = ?id, live = values.len(), "entry added");
        broadcast(&callbacks, &values);
    }

    /// Called by an entry's timer.
    fn evict(&self, id: EntryId) {
        let delivery = {
            let mut state = self.state.lock();
            // A reset may have cancelled this eviction after the timer woke.
            if state.pending.remove(&id).is_none() {
                None
            } else {
                state.entries.shift_remove(&id);
                Some((state.values(), state.subscribers.snapshot()))
            }
        };

        if let Some((values, callbacks)) = delivery {
            tracing::trace!(entry = ?id, live = values.len(), "entry expired");
            broadcast(&callbacks, &values);
        }
    }

    fn subscribe(self: &Arc<Self>, callback: Callback<Vec<T>>) -> Subscription {
        let (id, values) = {
            let mut state = self.state.lock();
            let id = state.subscribers.insert(Arc::clone(&callback));
            (id, state.values())
        };

        deliver(id, &callback, &values);

        let weak: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.unsubscribe(id);
            }
        })
    }

    fn unsubscribe(&self, id: SubscriberId) {
        let cancelled = {
            let mut state = self.state.lock();
            if !state.subscribers.remove(id) {
                return;
            }
            if self.expiry.is_none() || !state.subscribers.is_empty() {
                return;
            }

            let dropped = state.entries.len();
            state.entries.clear();
            let timers: Vec<TimerHandle> =
                state.pending.drain().map(|(_, timer)| timer).collect();
            tracing::debug!(
                entries = dropped,
                timers = timers.len(),
                "last subscriber left, resetting"
            );
            timers
        };

        for timer in cancelled {
            timer.cancel();
        }
    }
}

impl<T> Drop for EphemeralInner<T> {
    fn drop(&mut self) {
        for (_, timer) in self.state.get_mut().pending.drain() {
            timer.cancel();
        }
    }
}

/// A store holding a growing list of values, each optionally expiring after a
/// time-to-live.
///
/// Subscribers receive a fresh `Vec<T>` on every change. There is no
/// `update`: with several independent values there is no single current one
/// to update.
pub struct EphemeralStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<EphemeralInner<T>>,
}

impl<T> EphemeralStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty store whose values never expire.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Create a store from an optional initial value and an optional ttl in
    /// milliseconds.
    ///
    /// Fails with [`StoreError::InvalidArgument`](crate::StoreError::InvalidArgument)
    /// if the ttl is negative or not finite, and with
    /// [`StoreError::NoRuntime`](crate::StoreError::NoRuntime) if a ttl is
    /// given outside a tokio runtime. The initial value, if any, expires like
    /// any other.
    pub fn from_millis(initial: Option<T>, ttl_ms: Option<f64>) -> Result<Self> {
        Self::with_config(initial, StoreConfig::from_millis(ttl_ms)?)
    }

    /// Create a store whose values expire after `ttl`.
    pub fn with_ttl(initial: Option<T>, ttl: Duration) -> Result<Self> {
        Self::with_config(initial, StoreConfig::new().with_ttl(ttl))
    }

    /// Create a store from a validated configuration.
    pub fn with_config(initial: Option<T>, config: StoreConfig) -> Result<Self> {
        let expiry = match config.ttl {
            Some(ttl) => Some(Expiry {
                ttl: ttl.as_duration(),
                scheduler: Scheduler::current()?,
            }),
            None => None,
        };

        Ok(Self::build(initial, expiry))
    }

    fn build(initial: Option<T>, expiry: Option<Expiry>) -> Self {
        let store = Self {
            inner: Arc::new(EphemeralInner {
                state: Mutex::new(EphemeralState {
                    entries: IndexMap::new(),
                    pending: HashMap::new(),
                    subscribers: SubscriberSet::new(),
                    last_id: 0,
                }),
                expiry,
            }),
        };

        if let Some(value) = initial {
            store.set(value);
        }

        store
    }

    /// Append a value and broadcast the new list.
    pub fn set(&self, value: T) {
        self.inner.set(value);
    }

    /// The configured time-to-live, if any.
    pub fn ttl(&self) -> Option<Ttl> {
        self.inner.expiry.as_ref().map(|expiry| Ttl::from(expiry.ttl))
    }

    /// Current live values in insertion order.
    pub fn values(&self) -> Vec<T> {
        self.inner.state.lock().values()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().entries.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    /// Number of entries waiting for their eviction timer.
    pub fn pending_evictions(&self) -> usize {
        self.inner.state.lock().pending.len()
    }
}

impl<T> Default for EphemeralStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Readable for EphemeralStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Value = Vec<T>;

    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Vec<T>) + Send + Sync + 'static,
    {
        self.inner.subscribe(Arc::new(callback))
    }
}

impl<T> Writable for EphemeralStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Input = T;

    fn set(&self, value: T) {
        self.inner.set(value);
    }
}

impl<T> Clone for EphemeralStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for EphemeralStore<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("EphemeralStore")
            .field("values", &state.entries.values().collect::<Vec<_>>())
            .field("ttl", &self.inner.expiry.as_ref().map(|expiry| expiry.ttl))
            .field("subscriber_count", &state.subscribers.len())
            .field("pending_evictions", &state.pending.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
