//! Single-value filters over an upstream store.
//!
//! Each filter is a derived store: it attaches to its upstream when it gains
//! a subscriber and detaches, cancelling any pending timer, when the last one
//! leaves.

mod debounce;
mod readonly;
mod throttle;

pub use debounce::debounce;
pub use readonly::readonly;
pub use throttle::throttle;
