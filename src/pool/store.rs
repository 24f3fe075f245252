//! Shared results of the consumer workers.
//!
//! [`WorkStore`] collects every work item in arrival order; readers get
//! snapshots. [`BufferGauge`] holds the most recent buffer level reported by
//! any worker.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;

use crate::protocol::WorkItem;

// ============================================================================
// BufferGauge
// ============================================================================

/// Latest server buffer level, behind its own lock.
#[derive(Debug, Default)]
pub(crate) struct BufferGauge {
    level: Mutex<f64>,
}

impl BufferGauge {
    /// Returns the current level.
    #[inline]
    pub(crate) fn level(&self) -> f64 {
        *self.level.lock()
    }

    /// Overwrites the current level.
    #[inline]
    pub(crate) fn set(&self, level: f64) {
        *self.level.lock() = level;
    }
}

// ============================================================================
// WorkStore
// ============================================================================

/// Unordered collection of accumulated work items.
#[derive(Debug, Default)]
pub(crate) struct WorkStore {
    items: Mutex<Vec<WorkItem>>,
}

impl WorkStore {
    /// Appends an item.
    #[inline]
    pub(crate) fn push(&self, item: WorkItem) {
        self.items.lock().push(item);
    }

    /// Returns the number of items.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns the items in arrival order.
    pub(crate) fn snapshot(&self) -> Vec<WorkItem> {
        self.items.lock().clone()
    }

    /// Returns the items ordered by index.
    pub(crate) fn ordered(&self) -> Vec<WorkItem> {
        let mut items = self.snapshot();
        items.sort_by_key(WorkItem::index);
        items
    }

    /// Joins the index-ordered item texts with single spaces.
    pub(crate) fn ordered_text(&self) -> String {
        self.ordered()
            .iter()
            .map(WorkItem::text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============================================================================
// Tests
// ============================================================================
