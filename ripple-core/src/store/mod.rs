//! Store Contract
//!
//! Every store in this crate, primitive or derived, speaks the same small
//! protocol:
//!
//! - [`Readable::subscribe`] registers a callback, calls it right away with
//!   the current value, and again on every change. It returns a
//!   [`Subscription`] that removes the callback when unsubscribed or dropped.
//! - [`Writable::set`] pushes a new value into stores that accept one.
//!
//! # Delivery
//!
//! Delivery is synchronous: by the time `set` returns, every subscriber that
//! was registered when it was called has seen the new value. Stores never hold
//! their internal lock while a callback runs, so callbacks may call back into
//! the store that is notifying them.
//!
//! # Start and stop
//!
//! A [`Signal`] may carry a start notifier that runs when the first
//! subscriber arrives and returns a [`Cleanup`] that runs when the last one
//! leaves. Derived stores and the event bridge are built on this, which is
//! how they attach to their upstream only while someone is listening.

mod derived;
mod signal;
mod subscriber;

pub use derived::{derived, map};
pub use signal::{Cleanup, ReadSignal, Setter, Signal};
pub use subscriber::{Callback, SubscriberId, Subscription};

pub(crate) use subscriber::{broadcast, deliver, SubscriberSet};

/// A store that can be observed.
pub trait Readable {
    /// The value delivered to subscribers.
    type Value;

    /// Register `callback`. It is invoked with the current value before this
    /// method returns, then on every change until the subscription ends.
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Self::Value) + Send + Sync + 'static;
}

/// A store that accepts new values.
pub trait Writable: Readable {
    /// The value accepted by [`Writable::set`]. Usually the same as
    /// [`Readable::Value`], but a store may publish something derived from
    /// its inputs.
    type Input;

    fn set(&self, value: Self::Input);
}

/// Read the current value of a store by subscribing and immediately
/// unsubscribing.
///
/// Note that this is a full subscription session: on a store with a start
/// notifier it starts and stops the store, and on an
/// [`EphemeralStore`](crate::EphemeralStore) with a ttl it resets the store
/// if no one else is subscribed.
pub fn get<S>(store: &S) -> Option<S::Value>
where
    S: Readable,
    S::Value: Clone + Send + 'static,
{
    let slot = std::sync::Arc::new(parking_lot::Mutex::new(None));
    let sink = std::sync::Arc::clone(&slot);
    let subscription = store.subscribe(move |value: &S::Value| {
        *sink.lock() = Some(value.clone());
    });
    subscription.unsubscribe();

    let value = slot.lock().take();
    value
}
