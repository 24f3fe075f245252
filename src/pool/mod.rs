//! Consumer pool management.
//!
//! This module grows and shrinks a set of consumer connections that pull
//! work items on behalf of one primary session.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PoolController`] | Starts, stops and autoscales consumers |
//! | [`PoolBuilder`] | Fluent configuration builder |
//! | [`PoolOptions`] | Watermarks, limits and retry tuning |
//! | [`GovernorState`] | Lifecycle of the autoscale governor |
//!
//! # Example
//!
//! ```no_run
//! use wordpool::{Connection, FrameCodec, PoolController};
//!
//! # async fn example() -> wordpool::Result<()> {
//! let primary = Connection::open("127.0.0.1", 5000, FrameCodec::default()).await?;
//! let pool = PoolController::attach(primary).await;
//!
//! pool.start_self_adjusting_consumers();
//! // ... later
//! pool.stop_all_consumers().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for pool configuration.
pub mod builder;

/// Pool controller and shared pool state.
pub mod controller;

/// Self-adjusting governor.
pub mod governor;

/// Pool tuning options.
pub mod options;

pub(crate) mod registry;
pub(crate) mod store;
pub(crate) mod worker;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::PoolBuilder;
pub use controller::PoolController;
pub use governor::{GovernorState, ScaleDecision, decide};
pub use options::{
    DEFAULT_GOVERNOR_INTERVAL, DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER, DEFAULT_MAX_CONSUMERS,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF, PoolOptions, RetryPolicy,
};
