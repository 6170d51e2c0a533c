//! External-event bridge.
//!
//! Adapts a listener-based event source (a UI widget, a socket, an OS
//! notification hub) into the store contract. The store attaches a single
//! listener when it gains its first subscriber and removes it when the last
//! one leaves, so an idle bridge costs the source nothing.
//!
//! The store's value is `None` until the first event arrives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::store::{Cleanup, ReadSignal, Setter, Signal};

/// Callback registered with an [`EventSource`].
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Identifier returned by [`EventSource::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A source of named events.
pub trait EventSource: Send + Sync + 'static {
    type Event: Clone + Send + Sync + 'static;

    /// Register `listener` for `event`.
    fn add_listener(&self, event: &str, listener: Listener<Self::Event>) -> ListenerId;

    /// Remove a listener. Unknown ids are ignored.
    fn remove_listener(&self, event: &str, id: ListenerId);
}

/// Create a store that holds the most recent `event` emitted by `source`.
pub fn event_store<Src>(
    source: Arc<Src>,
    event: impl Into<String>,
) -> ReadSignal<Option<Src::Event>>
where
    Src: EventSource,
{
    let event = event.into();

    Signal::with_start(None, move |setter: Setter<Option<Src::Event>>| {
        let listener: Listener<Src::Event> =
            Arc::new(move |payload: &Src::Event| setter.set(Some(payload.clone())));
        let id = source.add_listener(&event, listener);
        tracing::debug!(event = %event, listener = ?id, "attached event listener");

        let source = Arc::clone(&source);
        let event = event.clone();
        Some(Box::new(move || {
            source.remove_listener(&event, id);
            tracing::debug!(event = %event, listener = ?id, "detached event listener");
        }) as Cleanup)
    })
    .read_only()
}

/// In-memory [`EventSource`] that dispatches events synchronously.
pub struct EventEmitter<E> {
    listeners: RwLock<HashMap<String, IndexMap<ListenerId, Listener<E>>>>,
    next_id: AtomicU64,
}

impl<E> EventEmitter<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Deliver `payload` to every listener of `event`, in registration order.
    ///
    /// Listeners run without the registry lock held, so they may add or
    /// remove listeners.
    pub fn emit(&self, event: &str, payload: E) {
        let listeners: Vec<Listener<E>> = self
            .listeners
            .read()
            .get(event)
            .map(|registered| registered.values().cloned().collect())
            .unwrap_or_default();

        for listener in listeners {
            listener(&payload);
        }
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, IndexMap::len)
    }
}

impl<E> Default for EventEmitter<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventSource for EventEmitter<E>
where
    E: Clone + Send + Sync + 'static,
{
    type Event = E;

    fn add_listener(&self, event: &str, listener: Listener<E>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .insert(id, listener);
        id
    }

    fn remove_listener(&self, event: &str, id: ListenerId) {
        let mut listeners = self.listeners.write();
        if let Some(registered) = listeners.get_mut(event) {
            registered.shift_remove(&id);
            if registered.is_empty() {
                listeners.remove(event);
            }
        }
    }
}
