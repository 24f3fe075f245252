//! Pool tuning options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use wordpool::PoolOptions;
//!
//! let options = PoolOptions::new()
//!     .with_max_consumers(16)
//!     .with_watermarks(25.0, 85.0)
//!     .with_governor_interval(Duration::from_millis(250));
//!
//! options.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default ceiling on governor-managed consumers.
pub const DEFAULT_MAX_CONSUMERS: usize = 100;

/// Gauge at or above which the governor adds a consumer.
pub const DEFAULT_HIGH_WATER: f64 = 90.0;

/// Gauge at or below which the governor removes a consumer.
pub const DEFAULT_LOW_WATER: f64 = 30.0;

/// Time between governor decisions.
pub const DEFAULT_GOVERNOR_INTERVAL: Duration = Duration::from_millis(500);

/// Registry attempts before an insert or remove is abandoned.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 100;

/// Pause between registry attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(10);

// ============================================================================
// RetryPolicy
// ============================================================================

/// Bounded retry for registry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before giving up (at least 1).
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF)
    }
}

impl RetryPolicy {
    /// Creates a retry policy.
    #[inline]
    #[must_use]
    pub const fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

// ============================================================================
// PoolOptions
// ============================================================================

/// Tunables of a [`PoolController`](crate::PoolController).
#[derive(Debug, Clone, PartialEq)]
pub struct PoolOptions {
    /// The governor never grows the pool past this size.
    pub max_consumers: usize,

    /// Scale out when the gauge is at or above this level.
    pub high_water: f64,

    /// Scale in when the gauge is at or below this level.
    pub low_water: f64,

    /// Time between governor decisions.
    pub governor_interval: Duration,

    /// Registry insert/remove retry policy.
    pub retry: RetryPolicy,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl PoolOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_consumers: DEFAULT_MAX_CONSUMERS,
            high_water: DEFAULT_HIGH_WATER,
            low_water: DEFAULT_LOW_WATER,
            governor_interval: DEFAULT_GOVERNOR_INTERVAL,
            retry: RetryPolicy::new(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl PoolOptions {
    /// Sets the governor's pool size ceiling.
    #[inline]
    #[must_use]
    pub fn with_max_consumers(mut self, max_consumers: usize) -> Self {
        self.max_consumers = max_consumers;
        self
    }

    /// Sets the scale-in and scale-out gauge levels.
    #[inline]
    #[must_use]
    pub fn with_watermarks(mut self, low_water: f64, high_water: f64) -> Self {
        self.low_water = low_water;
        self.high_water = high_water;
        self
    }

    /// Sets the time between governor decisions.
    #[inline]
    #[must_use]
    pub fn with_governor_interval(mut self, interval: Duration) -> Self {
        self.governor_interval = interval;
        self
    }

    /// Sets the registry retry policy.
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl PoolOptions {
    /// Checks that the options describe a usable pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.max_consumers == 0 {
            return Err(Error::config("max_consumers must be at least 1"));
        }

        if !(0.0..=100.0).contains(&self.low_water) || !(0.0..=100.0).contains(&self.high_water) {
            return Err(Error::config(format!(
                "watermarks must lie within 0..=100 (low={}, high={})",
                self.low_water, self.high_water
            )));
        }

        if self.low_water >= self.high_water {
            return Err(Error::config(format!(
                "low_water ({}) must be below high_water ({})",
                self.low_water, self.high_water
            )));
        }

        if self.governor_interval.is_zero() {
            return Err(Error::config("governor_interval must be non-zero"));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts must be at least 1"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
