//! Store configuration.
//!
//! The only knob is the time-to-live applied to every value written to an
//! [`EphemeralStore`](crate::EphemeralStore). It can be given as a number of
//! milliseconds, parsed from a string, or loaded from JSON:
//!
//! ```rust
//! use ripple_core::StoreConfig;
//!
//! let config = StoreConfig::from_json(r#"{ "ttl_ms": 250 }"#).unwrap();
//! assert_eq!(config.ttl.unwrap().as_millis(), 250);
//! ```

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, StoreError};

/// A validated time-to-live.
///
/// Constructed only from finite, non-negative millisecond counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ttl(Duration);

impl Ttl {
    /// Validate a millisecond count.
    pub fn from_millis(millis: f64) -> Result<Self> {
        if !millis.is_finite() {
            return Err(StoreError::InvalidArgument(format!(
                "ttl must be a finite number of milliseconds, got {millis}"
            )));
        }
        if millis < 0.0 {
            return Err(StoreError::InvalidArgument(format!(
                "ttl must not be negative, got {millis}"
            )));
        }
        // `as` saturates, so absurdly large values clamp to ~584 years.
        Ok(Self(Duration::from_nanos((millis * 1_000_000.0).round() as u64)))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> u128 {
        self.0.as_millis()
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl FromStr for Ttl {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let millis: f64 = s.trim().parse().map_err(|_| {
            StoreError::InvalidArgument(format!("ttl must be a number, got {s:?}"))
        })?;
        Self::from_millis(millis)
    }
}

/// Configuration for an [`EphemeralStore`](crate::EphemeralStore).
///
/// `ttl: None` means values never expire on their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    pub ttl: Option<Ttl>,
}

/// Wire shape of the JSON config. `ttl_ms` is kept untyped so that a string
/// or negative value is reported as an invalid argument rather than a parse
/// error.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStoreConfig {
    #[serde(default)]
    ttl_ms: Option<serde_json::Value>,
}

impl StoreConfig {
    /// Creates a configuration without a ttl.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ttl.
    pub fn with_ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    /// Builds a configuration from an optional millisecond count.
    pub fn from_millis(ttl_ms: Option<f64>) -> Result<Self> {
        let ttl = ttl_ms.map(Ttl::from_millis).transpose()?;
        Ok(Self { ttl })
    }

    /// Parses a JSON object of the form `{ "ttl_ms": <number> }`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawStoreConfig = serde_json::from_str(json)?;
        let ttl = match raw.ttl_ms {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Number(n)) => {
                let millis = n.as_f64().ok_or_else(|| {
                    StoreError::InvalidArgument(format!("ttl_ms is not representable: {n}"))
                })?;
                Some(Ttl::from_millis(millis)?)
            }
            Some(other) => {
                return Err(StoreError::InvalidArgument(format!(
                    "ttl_ms must be a number, got {other}"
                )))
            }
        };
        Ok(Self { ttl })
    }
}
