//! Self-adjusting consumer governor.
//!
//! The governor is one long-lived task that watches the buffer-level gauge
//! reported with every work item and nudges the pool size by at most one
//! consumer per tick:
//!
//! | Gauge | Pool size | Action |
//! |-------|-----------|--------|
//! | `>= high_water` | `< max_consumers` | start one consumer |
//! | `<= low_water` | `> 1` | stop one consumer |
//! | otherwise | any | hold |
//!
//! The band between the watermarks keeps the pool from oscillating. Gauge
//! and pool size are sampled separately, so a racing worker can make one
//! decision act on slightly stale numbers.
//!
//! # States
//!
//! ```text
//! Idle --start--> Running --stop--> StopRequested
//! ```
//!
//! A controller runs its governor at most once.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::controller::PoolInner;
use super::options::PoolOptions;

// ============================================================================
// Constants
// ============================================================================

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOP_REQUESTED: u8 = 2;

// ============================================================================
// GovernorState
// ============================================================================

/// Lifecycle state of the governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorState {
    /// Never started.
    Idle,
    /// Running its control loop.
    Running,
    /// Told to stop. Terminal.
    StopRequested,
}

impl GovernorState {
    const fn from_u8(value: u8) -> Self {
        match value {
            STATE_IDLE => Self::Idle,
            STATE_RUNNING => Self::Running,
            _ => Self::StopRequested,
        }
    }
}

// ============================================================================
// ScaleDecision
// ============================================================================

/// What one governor tick does to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Start one consumer.
    ScaleOut,
    /// Stop one consumer.
    ScaleIn,
    /// Leave the pool alone.
    Hold,
}

/// Decides one tick from the gauge and current pool size.
#[must_use]
pub fn decide(gauge: f64, pool_size: usize, options: &PoolOptions) -> ScaleDecision {
    if gauge >= options.high_water && pool_size < options.max_consumers {
        ScaleDecision::ScaleOut
    } else if gauge <= options.low_water && pool_size > 1 {
        ScaleDecision::ScaleIn
    } else {
        ScaleDecision::Hold
    }
}

// ============================================================================
// Governor
// ============================================================================

/// State machine and task handle of a pool's governor.
///
/// The task slot lock serializes start against stop, so a stop never
/// misses a governor that is being started concurrently.
#[derive(Debug)]
pub(crate) struct Governor {
    state: AtomicU8,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Governor {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_IDLE),
            task: Mutex::new(None),
        }
    }

    /// Returns the lifecycle state.
    #[inline]
    pub(crate) fn state(&self) -> GovernorState {
        GovernorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` once a stop was requested.
    #[inline]
    pub(crate) fn is_stop_requested(&self) -> bool {
        self.state() == GovernorState::StopRequested
    }

    /// Moves Idle to Running and stores the task `spawn` returns.
    ///
    /// Returns `false` without calling `spawn` in any other state.
    pub(crate) fn start(&self, spawn: impl FnOnce() -> JoinHandle<()>) -> bool {
        let mut task = self.task.lock();

        if self
            .state
            .compare_exchange(
                STATE_IDLE,
                STATE_RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }

        *task = Some(spawn());
        true
    }

    /// Moves Running to StopRequested and hands back the task to join.
    ///
    /// A governor that never started stays Idle.
    pub(crate) fn stop(&self) -> Option<JoinHandle<()>> {
        let mut task = self.task.lock();
        let _ = self.state.compare_exchange(
            STATE_RUNNING,
            STATE_STOP_REQUESTED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        task.take()
    }
}

// ============================================================================
// Control Loop
// ============================================================================

/// Body of the governor task.
pub(crate) async fn run(pool: Arc<PoolInner>) {
    info!(
        max = pool.options.max_consumers,
        low = pool.options.low_water,
        high = pool.options.high_water,
        "Governor started"
    );

    if let Err(e) = pool.start_consumers(1).await {
        warn!(error = %e, "Governor could not start its first consumer");
    }

    loop {
        if pool.governor.is_stop_requested() {
            break;
        }

        let gauge = pool.gauge.level();
        let size = pool.consumers.len();

        match decide(gauge, size, &pool.options) {
            ScaleDecision::ScaleOut => {
                debug!(gauge, size, "Governor scaling out");
                if let Err(e) = pool.start_consumers(1).await {
                    warn!(error = %e, "Governor scale-out failed");
                }
            }
            ScaleDecision::ScaleIn => {
                debug!(gauge, size, "Governor scaling in");
                pool.stop_consumers(1).await;
            }
            ScaleDecision::Hold => {}
        }

        sleep(pool.options.governor_interval).await;
    }

    info!("Governor stopped");
}

// ============================================================================
// Tests
// ============================================================================
