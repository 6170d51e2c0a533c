//! Read-only projection of a store.

use crate::store::{map, ReadSignal, Readable};

/// Expose `store` through a handle that can subscribe but not set.
pub fn readonly<S>(store: S) -> ReadSignal<S::Value>
where
    S: Readable + Send + Sync + 'static,
    S::Value: Clone + Send + Sync + 'static,
{
    map(store, |value: &S::Value| value.clone())
}
