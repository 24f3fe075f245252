//! Builder pattern for pool configuration.
//!
//! Provides a fluent API for configuring and creating [`PoolController`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use wordpool::{Connection, FrameCodec, PoolController};
//!
//! # async fn example() -> wordpool::Result<()> {
//! let primary = Connection::open("127.0.0.1", 5000, FrameCodec::default()).await?;
//! let pool = PoolController::builder()
//!     .max_consumers(8)
//!     .build(primary)
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::Result;
use crate::transport::Connection;

use super::controller::PoolController;
use super::options::{PoolOptions, RetryPolicy};

// ============================================================================
// PoolBuilder
// ============================================================================

/// Builder for configuring a [`PoolController`].
///
/// Use [`PoolController::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct PoolBuilder {
    /// Options collected so far.
    options: PoolOptions,
}

// ============================================================================
// PoolBuilder Implementation
// ============================================================================

impl PoolBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the governor's pool size ceiling.
    #[inline]
    #[must_use]
    pub fn max_consumers(mut self, max_consumers: usize) -> Self {
        self.options.max_consumers = max_consumers;
        self
    }

    /// Sets the scale-in and scale-out gauge levels.
    #[inline]
    #[must_use]
    pub fn watermarks(mut self, low_water: f64, high_water: f64) -> Self {
        self.options = self.options.with_watermarks(low_water, high_water);
        self
    }

    /// Sets the time between governor decisions.
    #[inline]
    #[must_use]
    pub fn governor_interval(mut self, interval: Duration) -> Self {
        self.options.governor_interval = interval;
        self
    }

    /// Sets the registry retry policy.
    #[inline]
    #[must_use]
    pub fn retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.options.retry = RetryPolicy::new(max_attempts, backoff);
        self
    }

    /// Validates the options and attaches a controller to `primary`.
    ///
    /// A failed session handshake does not fail the build; the controller
    /// comes back unable to start consumers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the options are
    /// invalid.
    pub async fn build(self, primary: Connection) -> Result<PoolController> {
        self.options.validate()?;
        Ok(PoolController::with_options(primary, self.options).await)
    }
}

// ============================================================================
// Tests
// ============================================================================
