//! Subscriber bookkeeping shared by every store.
//!
//! A store keeps its callbacks in a [`SubscriberSet`], hands out a
//! [`Subscription`] guard per registration, and delivers values with
//! [`broadcast`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;

/// Identifier of one registration within one store.
///
/// Ids are allocated from a per-store counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// A subscriber callback as stored by a store.
pub type Callback<V> = Arc<dyn Fn(&V) + Send + Sync>;

/// Insertion-ordered set of registered callbacks.
///
/// Registering the same closure twice yields two independent entries; each
/// is removed by its own id.
pub(crate) struct SubscriberSet<V> {
    next_id: u64,
    callbacks: IndexMap<SubscriberId, Callback<V>>,
}

impl<V> SubscriberSet<V> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            callbacks: IndexMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, callback: Callback<V>) -> SubscriberId {
        self.next_id += 1;
        let id = SubscriberId(self.next_id);
        self.callbacks.insert(id, callback);
        id
    }

    /// Returns false if `id` was not registered.
    pub(crate) fn remove(&mut self, id: SubscriberId) -> bool {
        // shift_remove keeps the remaining callbacks in registration order.
        self.callbacks.shift_remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Copy of the current callbacks, taken so that delivery can run without
    /// holding the store's lock.
    pub(crate) fn snapshot(&self) -> Vec<(SubscriberId, Callback<V>)> {
        self.callbacks
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect()
    }
}

/// Invoke every callback with `value`, in order.
///
/// A panicking callback is logged and skipped; the remaining callbacks still
/// receive the value.
pub(crate) fn broadcast<V>(callbacks: &[(SubscriberId, Callback<V>)], value: &V) {
    for (id, callback) in callbacks {
        deliver(*id, callback, value);
    }
}

pub(crate) fn deliver<V>(id: SubscriberId, callback: &Callback<V>, value: &V) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());
        tracing::error!(subscriber = ?id, %message, "subscriber panicked during delivery");
    }
}

/// Handle to one registration.
///
/// The registration is removed when [`Subscription::unsubscribe`] is called or
/// when the handle is dropped, whichever comes first.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the registration.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
