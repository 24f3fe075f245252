//! Bounded-retry registries keyed by worker id.
//!
//! Each registry is a mutex-guarded map that is only ever locked with
//! `try_lock`, never across an `.await`. An operation that cannot take the
//! lock (or finds its key occupied, for inserts) backs off and retries up
//! to the policy's ceiling, then gives up with
//! [`Error::RegistryContention`]. Nothing is silently dropped: a failed
//! insert hands nothing to the map, and a failed remove leaves the entry
//! in place.
//!
//! Lock ordering: the pool never holds two registry locks at once.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{Error, Result};
use crate::identifiers::WorkerId;

use super::options::RetryPolicy;

// ============================================================================
// Types
// ============================================================================

type Entries<V> = FxHashMap<WorkerId, V>;

// ============================================================================
// Registry
// ============================================================================

/// A worker-id keyed map with bounded-retry mutation.
pub(crate) struct Registry<V> {
    /// Name used in logs.
    name: &'static str,
    /// The entries.
    entries: Mutex<Entries<V>>,
    /// Retry ceiling and backoff.
    retry: RetryPolicy,
}

impl<V: Send> Registry<V> {
    /// Creates an empty registry.
    pub(crate) fn new(name: &'static str, retry: RetryPolicy) -> Self {
        Self {
            name,
            entries: Mutex::new(Entries::default()),
            retry,
        }
    }

    /// Returns the number of entries.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if the registry has no entries.
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the registered ids.
    pub(crate) fn ids(&self) -> Vec<WorkerId> {
        self.entries.lock().keys().copied().collect()
    }

    /// Inserts `value` under `id`.
    ///
    /// An occupied key counts as a failed attempt.
    pub(crate) async fn insert(&self, id: WorkerId, value: V) -> Result<()> {
        let mut value = Some(value);
        self.with_retry("insert", |entries| {
            if entries.contains_key(&id) {
                return None;
            }
            entries.insert(id, value.take()?);
            Some(())
        })
        .await
    }

    /// Removes the entry under `id`, if present.
    pub(crate) async fn remove(&self, id: WorkerId) -> Result<Option<V>> {
        self.with_retry("remove", |entries| Some(entries.remove(&id)))
            .await
    }

    /// Removes an arbitrary entry, if any.
    pub(crate) async fn remove_any(&self) -> Result<Option<(WorkerId, V)>> {
        self.with_retry("remove_any", |entries| {
            let id = entries.keys().next().copied();
            Some(id.and_then(|id| entries.remove(&id).map(|value| (id, value))))
        })
        .await
    }

    async fn with_retry<T, F>(&self, operation: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut(&mut Entries<V>) -> Option<T>,
    {
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            if let Some(out) = self.try_once(&mut op) {
                return Ok(out);
            }
            if attempt < attempts {
                sleep(self.retry.backoff).await;
            }
        }

        warn!(
            registry = self.name,
            operation, attempts, "Registry retry ceiling reached"
        );
        Err(Error::registry_contention(operation, attempts))
    }

    fn try_once<T, F>(&self, op: &mut F) -> Option<T>
    where
        F: FnMut(&mut Entries<V>) -> Option<T>,
    {
        let mut entries = self.entries.try_lock()?;
        op(&mut entries)
    }
}

// ============================================================================
// Tests
// ============================================================================
