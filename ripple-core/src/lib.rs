//! Ripple Core
//!
//! Reactive stores: value containers that notify their subscribers whenever
//! their value changes. This crate provides:
//!
//! - The store contract (`Readable` / `Writable`) shared by every store
//! - `EphemeralStore`, a list of values that expire individually after a
//!   time-to-live
//! - `Signal`, a single-value store with optional start/stop notifiers
//! - Derived stores and filters (`derived`, `map`, `readonly`, `debounce`,
//!   `throttle`)
//! - A bridge from listener-based event sources into the store contract
//!
//! # Architecture
//!
//! - `store`: the contract, subscriber bookkeeping, `Signal` and derivation
//! - `ephemeral`: the expiring multi-value store
//! - `filters`: debounce, throttle and read-only projections
//! - `bridge`: event-source adapter
//! - `timer`: cancellable one-shot timers on the tokio runtime
//! - `config`: ttl validation and JSON configuration
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{EphemeralStore, Readable};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() -> ripple_core::Result<()> {
//! // Notifications that disappear after two seconds.
//! let notifications = EphemeralStore::with_ttl(None, Duration::from_secs(2))?;
//!
//! let subscription = notifications.subscribe(|values: &Vec<String>| {
//!     println!("showing {} notifications", values.len());
//! });
//!
//! notifications.set("build finished".to_string());
//! tokio::time::sleep(Duration::from_secs(3)).await;
//! assert!(notifications.is_empty());
//!
//! subscription.unsubscribe();
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod ephemeral;
pub mod error;
pub mod filters;
pub mod store;
pub mod timer;

pub use bridge::{event_store, EventEmitter, EventSource, Listener, ListenerId};
pub use config::{StoreConfig, Ttl};
pub use ephemeral::EphemeralStore;
pub use error::{Result, StoreError};
pub use filters::{debounce, readonly, throttle};
pub use store::{
    derived, get, map, Cleanup, ReadSignal, Readable, Setter, Signal, SubscriberId, Subscription,
    Writable,
};
pub use timer::{Scheduler, TimerHandle};
