//! Pool configuration types

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which end of the idle queue `acquire` serves from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AcquireOrder {
    /// Oldest idle resource first. Every live resource gets exercised in turn.
    #[default]
    Fifo,
    /// Most recently returned resource first.
    Lifo,
}

/// Configuration for a [`Pool`](crate::Pool)
///
/// The pool keeps at least `minimum` idle resources, lets the idle set settle
/// around `average`, and never holds more than `maximum` resources in total.
/// Idle resources above `average` are destroyed once they have been idle for
/// longer than `expiration`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Idle resources to keep ready at all times
    pub minimum: usize,
    /// Idle resources to settle at once bursts are over
    pub average: usize,
    /// Hard cap on resources in existence (idle + in use)
    pub maximum: usize,
    /// Idle time after which a resource above `average` is destroyed
    pub expiration: Duration,
    /// How long `acquire` waits on an exhausted pool.
    ///
    /// `None` and a zero duration both wait forever, as does a duration too
    /// large to add to the current `Instant`.
    pub acquire_timeout: Option<Duration>,
    /// Run [`Manager::check`](crate::Manager::check) on idle resources before handing them out
    pub validate_on_acquire: bool,
    /// Which idle resource `acquire` hands out first
    pub order: AcquireOrder,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            minimum: 1,
            average: 4,
            maximum: 10,
            expiration: Duration::from_secs(600),
            acquire_timeout: Some(Duration::from_secs(30)),
            validate_on_acquire: false,
            order: AcquireOrder::Fifo,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with the given capacity policy and default timings.
    pub fn new(minimum: usize, average: usize, maximum: usize) -> Self {
        Self {
            minimum,
            average,
            maximum,
            ..Self::default()
        }
    }

    /// Set the idle expiration.
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Set the acquire timeout; `None` or zero waits forever.
    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Enable or disable the health check on acquire.
    pub fn with_validate_on_acquire(mut self, enabled: bool) -> Self {
        self.validate_on_acquire = enabled;
        self
    }

    /// Set the acquire order.
    pub fn with_order(mut self, order: AcquireOrder) -> Self {
        self.order = order;
        self
    }

    /// Validate pool configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.minimum == 0 {
            return Err(Error::configuration("minimum must be at least 1"));
        }
        if self.average < self.minimum {
            return Err(Error::configuration(format!(
                "average ({}) must not be below minimum ({})",
                self.average, self.minimum
            )));
        }
        if self.maximum < self.average {
            return Err(Error::configuration(format!(
                "maximum ({}) must not be below average ({})",
                self.maximum, self.average
            )));
        }
        if self.expiration.is_zero() {
            return Err(Error::configuration("expiration must be greater than zero"));
        }
        Ok(())
    }
}
