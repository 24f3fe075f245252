//! Consumer pool controller.
//!
//! The [`PoolController`] links auxiliary consumer connections to a primary
//! session and keeps one worker task per consumer pulling work items.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                PoolController                │
//! │  primary ── id ──► session                   │
//! │                                              │
//! │  consumers: WorkerId → Consumer              │
//! │  tasks:     WorkerId → JoinHandle            │
//! │                                              │
//! │  worker ─ getword ─► WorkStore + BufferGauge │
//! │  governor ◄── gauge ── scales ±1 per tick    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Registries
//!
//! The consumer and task registries move in lockstep. A worker task is
//! spawned parked on a start signal, and the signal fires only once both
//! entries exist. Teardown always removes the consumer entry first and the
//! task entry second; the two locks are never held together.
//!
//! A task entry whose consumer entry is gone belongs to a worker that exited
//! on its own (or is being stopped). Scale-in and shutdown join those too,
//! so they return only once every affected task has finished.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashSet;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, WorkerId};
use crate::protocol::{Command, LINKED_REPLY, WorkItem};
use crate::transport::{Connection, ExchangeBuffer};

use super::builder::PoolBuilder;
use super::governor::{self, Governor, GovernorState};
use super::options::PoolOptions;
use super::registry::Registry;
use super::store::{BufferGauge, WorkStore};
use super::worker::{self, Consumer};

// ============================================================================
// PoolInner
// ============================================================================

/// Shared state of a pool, owned jointly by the controller, the workers and
/// the governor.
pub(crate) struct PoolInner {
    /// Primary control connection.
    pub(crate) primary: Connection,
    /// Session consumers link to. `None` if the `id` handshake failed.
    pub(crate) session: Option<SessionId>,
    /// Tunables.
    pub(crate) options: PoolOptions,
    /// Registered consumers.
    pub(crate) consumers: Registry<Consumer>,
    /// Worker task handles.
    pub(crate) tasks: Registry<JoinHandle<()>>,
    /// Latest reported buffer level.
    pub(crate) gauge: BufferGauge,
    /// Accumulated work items.
    pub(crate) store: WorkStore,
    /// Pool-wide stop flag.
    stop_requested: AtomicBool,
    /// Autoscale governor.
    pub(crate) governor: Governor,
}

// ============================================================================
// PoolInner - Flags and Results
// ============================================================================

impl PoolInner {
    /// Returns `true` if the pool-wide stop flag is set.
    #[inline]
    pub(crate) fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    #[inline]
    fn set_stop_requested(&self, stop: bool) {
        self.stop_requested.store(stop, Ordering::Release);
    }

    /// Publishes a fetched item: gauge first, then the collection.
    pub(crate) fn record(&self, item: WorkItem) {
        self.gauge.set(item.buffer_level());
        self.store.push(item);
    }

    fn ready_session(&self) -> Result<SessionId> {
        match self.session {
            Some(session) if self.primary.is_active() => Ok(session),
            _ => {
                warn!("Client is not connected; cannot start consumers");
                Err(Error::SessionUnavailable)
            }
        }
    }
}

// ============================================================================
// PoolInner - Scale Out
// ============================================================================

impl PoolInner {
    /// Starts up to `count` consumers. Returns how many started.
    pub(crate) async fn start_consumers(self: &Arc<Self>, count: usize) -> Result<usize> {
        self.set_stop_requested(false);
        let session = self.ready_session()?;

        let mut started = 0;
        for _ in 0..count {
            match self.spawn_consumer(session).await {
                Ok(id) => {
                    started += 1;
                    debug!(worker_id = %id, "Consumer started");
                }
                Err(e) => warn!(error = %e, "Failed to start consumer"),
            }
        }

        debug!(
            requested = count,
            started,
            running = self.consumers.len(),
            "Scale-out finished"
        );
        Ok(started)
    }

    async fn spawn_consumer(self: &Arc<Self>, session: SessionId) -> Result<WorkerId> {
        let consumer = Consumer::new(self.link_consumer(session).await?);
        let id = consumer.id();

        if let Err(e) = self.consumers.insert(id, consumer.clone()).await {
            consumer.connection.close().await;
            return Err(e);
        }

        let (start_tx, start_rx) = oneshot::channel();
        let handle = tokio::spawn(worker::run(Arc::clone(self), consumer.clone(), start_rx));

        if let Err(e) = self.tasks.insert(id, handle).await {
            // Dropping the sender releases the parked task without running it.
            drop(start_tx);
            if let Err(remove_err) = self.consumers.remove(id).await {
                warn!(worker_id = %id, error = %remove_err, "Abandoned consumer left registered");
            }
            consumer.connection.close().await;
            return Err(e);
        }

        if consumer.is_stop_requested() {
            // A stopper took the consumer before its task was tracked.
            drop(start_tx);
            match self.tasks.remove(id).await {
                Ok(Some(handle)) => self.join_task(id, handle).await,
                // The stopper took the handle and joins it.
                Ok(None) => {}
                Err(e) => warn!(worker_id = %id, error = %e, "Unstarted consumer left tracked"),
            }
            return Err(Error::ConnectionStopped);
        }

        let _ = start_tx.send(());
        Ok(id)
    }

    /// Opens a connection to the primary's endpoint and links it.
    async fn link_consumer(&self, session: SessionId) -> Result<Connection> {
        let endpoint = self.primary.endpoint().ok_or(Error::SessionUnavailable)?;
        let connection = Connection::new(self.primary.codec().clone());
        let mut buffer = ExchangeBuffer::for_codec(connection.codec());

        if let Err(e) = connection.connect_addr(endpoint, &mut buffer).await {
            connection.close().await;
            return Err(e);
        }

        buffer.reset();
        let reply = connection
            .exchange_with(&Command::LinkTo(session), &mut buffer)
            .await;

        match reply {
            Ok(reply) if reply == LINKED_REPLY => Ok(connection),
            Ok(reply) => {
                connection.close().await;
                Err(Error::protocol(format!("Unexpected link reply: {reply:?}")))
            }
            Err(e) => {
                connection.close().await;
                Err(e)
            }
        }
    }
}

// ============================================================================
// PoolInner - Scale In
// ============================================================================

impl PoolInner {
    /// Stops up to `count` consumers and joins their tasks, along with the
    /// tasks of workers that exited on their own. Returns how many were
    /// stopped.
    pub(crate) async fn stop_consumers(self: &Arc<Self>, count: usize) -> usize {
        let count = count.min(self.consumers.len());

        let mut stopped = 0;
        for _ in 0..count {
            match self.consumers.remove_any().await {
                Ok(Some((id, consumer))) => {
                    self.stop_consumer(id, consumer).await;
                    stopped += 1;
                }
                // Workers that finished on their own emptied the registry.
                Ok(None) => break,
                Err(e) => warn!(error = %e, "Failed to take a consumer for stopping"),
            }
        }

        let exited = self.join_exited().await;

        debug!(
            requested = count,
            stopped,
            exited,
            running = self.consumers.len(),
            "Scale-in finished"
        );
        stopped
    }

    async fn stop_consumer(&self, id: WorkerId, consumer: Consumer) {
        consumer.request_stop();
        self.retire(&consumer.connection).await;

        match self.tasks.remove(id).await {
            Ok(Some(handle)) => self.join_task(id, handle).await,
            // Taken by a concurrent join of exited workers.
            Ok(None) => debug!(worker_id = %id, "Consumer task joined elsewhere"),
            Err(e) => warn!(worker_id = %id, error = %e, "Consumer task left untracked"),
        }

        debug!(worker_id = %id, "Consumer stopped");
    }

    /// Joins every tracked task whose consumer entry is gone. Returns how
    /// many were joined.
    ///
    /// Task ids are read before consumer ids. A consumer entry is always
    /// inserted before its task entry, so a task whose consumer is missing
    /// from the later read has left the pool for good.
    pub(crate) async fn join_exited(&self) -> usize {
        let tracked = self.tasks.ids();
        let live: FxHashSet<WorkerId> = self.consumers.ids().into_iter().collect();

        let mut joined = 0;
        for id in tracked.into_iter().filter(|id| !live.contains(id)) {
            match self.tasks.remove(id).await {
                Ok(Some(handle)) => {
                    self.join_task(id, handle).await;
                    joined += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(worker_id = %id, error = %e, "Exited consumer left tracked"),
            }
        }
        joined
    }

    /// Joins every tracked task. Only called once no consumer is registered.
    async fn join_all(&self) {
        loop {
            match self.tasks.remove_any().await {
                Ok(Some((id, handle))) => self.join_task(id, handle).await,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to take a consumer task for joining");
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    async fn join_task(&self, id: WorkerId, handle: JoinHandle<()>) {
        if let Err(e) = handle.await {
            warn!(worker_id = %id, error = %e, "Consumer task did not finish cleanly");
        }
    }

    /// Unlinks and disconnects a consumer, then closes its connection.
    ///
    /// Both farewells are best-effort.
    pub(crate) async fn retire(&self, connection: &Connection) {
        if let Some(session) = self.session
            && let Err(e) = connection.exchange(&Command::UnlinkFrom(session)).await
        {
            debug!(connection_id = %connection.id(), error = %e, "Unlink failed");
        }

        if let Err(e) = connection.exchange(&Command::Disconnect).await {
            debug!(connection_id = %connection.id(), error = %e, "Disconnect failed");
        }

        connection.close().await;
    }
}

// ============================================================================
// PoolController
// ============================================================================

/// Grows and shrinks a pool of consumer connections linked to one primary
/// session.
///
/// Cloning yields another handle to the same pool.
///
/// # Example
///
/// ```no_run
/// use wordpool::{Connection, FrameCodec, PoolController};
///
/// # async fn example() -> wordpool::Result<()> {
/// let primary = Connection::open("127.0.0.1", 5000, FrameCodec::default()).await?;
/// let pool = PoolController::attach(primary).await;
///
/// pool.start_consumers(4).await?;
/// // ... later
/// pool.stop_all_consumers().await;
///
/// println!("{}", pool.ordered_text());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PoolController {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for PoolController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolController")
            .field("session", &self.inner.session)
            .field("consumers", &self.consumer_count())
            .field("governor", &self.governor_state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PoolController - Constructors
// ============================================================================

impl PoolController {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Attaches a controller with default options to `primary`.
    ///
    /// Requests the session id on `primary`. If that fails the controller
    /// is still returned, but starting consumers reports
    /// [`Error::SessionUnavailable`].
    pub async fn attach(primary: Connection) -> Self {
        Self::with_options(primary, PoolOptions::default()).await
    }

    pub(crate) async fn with_options(primary: Connection, options: PoolOptions) -> Self {
        let session = match Self::request_session(&primary).await {
            Ok(session) => {
                info!(%session, "Pool controller attached");
                Some(session)
            }
            Err(e) => {
                warn!(error = %e, "Session handshake failed; consumers unavailable");
                None
            }
        };

        let inner = PoolInner {
            consumers: Registry::new("consumers", options.retry),
            tasks: Registry::new("tasks", options.retry),
            primary,
            session,
            options,
            gauge: BufferGauge::default(),
            store: WorkStore::default(),
            stop_requested: AtomicBool::new(false),
            governor: Governor::new(),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    async fn request_session(primary: &Connection) -> Result<SessionId> {
        let reply = primary.exchange(&Command::Id).await?;
        SessionId::parse(&reply)
    }
}

// ============================================================================
// PoolController - Scaling
// ============================================================================

impl PoolController {
    /// Starts `count` consumers.
    ///
    /// Clears a previous pool-wide stop. Each consumer that fails to connect,
    /// link or register is skipped without affecting the rest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionUnavailable`] if there is no session or the
    /// primary connection is no longer active.
    pub async fn start_consumers(&self, count: usize) -> Result<usize> {
        self.inner.start_consumers(count).await
    }

    /// Stops up to `count` consumers and waits for their tasks to finish.
    ///
    /// Returns how many were stopped.
    pub async fn stop_consumers(&self, count: usize) -> usize {
        self.inner.stop_consumers(count).await
    }

    /// Joins the tasks of consumers that exited on their own, after their
    /// end of stream or a failure.
    ///
    /// Returns how many were joined.
    pub async fn join_exited_consumers(&self) -> usize {
        self.inner.join_exited().await
    }

    /// Starts the self-adjusting governor.
    ///
    /// Returns `false` if the governor is already running or was stopped
    /// before.
    pub fn start_self_adjusting_consumers(&self) -> bool {
        let started = self
            .inner
            .governor
            .start(|| tokio::spawn(governor::run(Arc::clone(&self.inner))));

        if !started {
            debug!(state = ?self.governor_state(), "Governor not started");
        }
        started
    }

    /// Stops the governor and every consumer.
    ///
    /// Returns once both registries are empty and all tasks are joined.
    pub async fn stop_all_consumers(&self) {
        self.inner.set_stop_requested(true);

        if let Some(handle) = self.inner.governor.stop()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Governor task did not finish cleanly");
        }

        // The governor may have cleared the flag with a last scale-out.
        self.inner.set_stop_requested(true);

        while !self.inner.consumers.is_empty() {
            let size = self.inner.consumers.len();
            if self.inner.stop_consumers(size).await == 0 {
                tokio::task::yield_now().await;
            }
        }
        self.inner.join_all().await;

        info!(items = self.work_item_count(), "All consumers stopped");
    }
}

// ============================================================================
// PoolController - Accessors
// ============================================================================

impl PoolController {
    /// Returns the number of registered consumers.
    #[inline]
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.inner.consumers.len()
    }

    /// Returns the number of tracked worker tasks.
    #[inline]
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Returns the session consumers link to.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.session
    }

    /// Returns the primary connection.
    #[inline]
    #[must_use]
    pub fn primary(&self) -> &Connection {
        &self.inner.primary
    }

    /// Returns the pool options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    /// Returns the latest reported buffer level.
    #[inline]
    #[must_use]
    pub fn buffer_level(&self) -> f64 {
        self.inner.gauge.level()
    }

    /// Returns the governor state.
    #[inline]
    #[must_use]
    pub fn governor_state(&self) -> GovernorState {
        self.inner.governor.state()
    }

    /// Returns `true` if the pool-wide stop flag is set.
    #[inline]
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.inner.is_stop_requested()
    }

    /// Returns the number of accumulated work items.
    #[inline]
    #[must_use]
    pub fn work_item_count(&self) -> usize {
        self.inner.store.len()
    }

    /// Returns the accumulated work items ordered by index.
    #[must_use]
    pub fn work_items(&self) -> Vec<WorkItem> {
        self.inner.store.ordered()
    }

    /// Returns the accumulated work items in arrival order.
    #[must_use]
    pub fn unordered_work_items(&self) -> Vec<WorkItem> {
        self.inner.store.snapshot()
    }

    /// Returns the index-ordered item texts joined with spaces.
    #[must_use]
    pub fn ordered_text(&self) -> String {
        self.inner.store.ordered_text()
    }
}

// ============================================================================
// Tests
// ============================================================================
