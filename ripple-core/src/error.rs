//! Error types for store construction and configuration.

use thiserror::Error;

/// Errors surfaced synchronously by store constructors and config parsing.
///
/// Nothing after construction can fail: `set`, `subscribe`, broadcasts and
/// timer-driven evictions are infallible.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no tokio runtime available to schedule timers")]
    NoRuntime,

    #[error("malformed store configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for store construction.
pub type Result<T> = std::result::Result<T, StoreError>;
