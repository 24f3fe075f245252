//! Consumer worker loop.
//!
//! Each consumer runs one task that repeatedly fetches a work item over its
//! own connection until it is told to stop, the stream ends, or the
//! connection fails.
//!
//! # Cleanup Ownership
//!
//! Whoever removes the consumer's registry entry owns its connection
//! teardown. A worker that exits on its own tries the removal itself; if a
//! stopper got there first, the worker leaves the connection alone.
//!
//! A worker never untracks its own task handle. The handle stays in the task
//! registry until the controller joins it, so scale-in and shutdown can wait
//! for the retire to finish.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::Error;
use crate::identifiers::WorkerId;
use crate::protocol::{Command, WorkItem};
use crate::transport::Connection;

use super::controller::PoolInner;

// ============================================================================
// Consumer
// ============================================================================

/// A registered consumer: its connection plus a per-worker stop flag.
#[derive(Debug, Clone)]
pub(crate) struct Consumer {
    /// The consumer's own connection.
    pub(crate) connection: Connection,
    /// Set to ask this worker alone to stop.
    stop: Arc<AtomicBool>,
}

impl Consumer {
    /// Wraps a linked connection.
    pub(crate) fn new(connection: Connection) -> Self {
        Self {
            connection,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the worker id.
    #[inline]
    pub(crate) fn id(&self) -> WorkerId {
        self.connection.id()
    }

    /// Asks this worker to stop at its next loop head.
    #[inline]
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Returns `true` if this worker was asked to stop.
    #[inline]
    pub(crate) fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

// ============================================================================
// WorkerExit
// ============================================================================

/// Why a worker loop ended.
#[derive(Debug)]
enum WorkerExit {
    /// The pool-wide or per-worker stop flag was set.
    StopRequested,
    /// The server sent the end-of-stream item.
    EndOfStream,
    /// Transport failure or undecodable reply.
    Failed(Error),
}

// ============================================================================
// Worker Task
// ============================================================================

/// Body of a consumer task.
///
/// Parks until `start` fires. If the sender is dropped instead, the spawn
/// was abandoned and the spawner has already cleaned up.
pub(crate) async fn run(pool: Arc<PoolInner>, consumer: Consumer, start: oneshot::Receiver<()>) {
    let id = consumer.id();

    if start.await.is_err() {
        debug!(worker_id = %id, "Consumer abandoned before start");
        return;
    }

    let exit = consume(&pool, &consumer).await;
    match &exit {
        WorkerExit::Failed(e) => debug!(worker_id = %id, error = %e, "Consumer failed"),
        _ => debug!(worker_id = %id, ?exit, "Consumer finished"),
    }

    match pool.consumers.remove(id).await {
        Ok(Some(_)) => pool.retire(&consumer.connection).await,
        // A stopper owns the teardown.
        Ok(None) => {}
        Err(e) => {
            warn!(worker_id = %id, error = %e, "Consumer left registered after exit");
            consumer.connection.close().await;
        }
    }
}

async fn consume(pool: &PoolInner, consumer: &Consumer) -> WorkerExit {
    loop {
        if pool.is_stop_requested() || consumer.is_stop_requested() {
            return WorkerExit::StopRequested;
        }

        let reply = match consumer.connection.exchange(&Command::GetWord).await {
            Ok(reply) => reply,
            Err(e) => return WorkerExit::Failed(e),
        };

        let item = match WorkItem::decode(&reply) {
            Ok(item) => item,
            Err(e) => return WorkerExit::Failed(e),
        };

        if item.is_end_of_stream() {
            return WorkerExit::EndOfStream;
        }

        pool.record(item);
    }
}
