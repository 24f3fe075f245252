//! Work items dispensed by `getword`.
//!
//! # Format
//!
//! ```json
//! { "text": "whale", "index": 42, "bufferLevel": 87.5 }
//! ```
//!
//! The server may also send PascalCase keys (`Text`, `Index`,
//! `BufferLevel`); both spellings are accepted.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Text of the item that marks the end of the stream.
pub const END_OF_STREAM: &str = "<EOF>";

// ============================================================================
// WorkItem
// ============================================================================

/// One unit of text handed out by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// The dispensed text.
    #[serde(alias = "Text")]
    text: String,

    /// Position of this item in the source stream.
    #[serde(alias = "Index")]
    index: u64,

    /// Server queue occupancy (0-100) when the item was dispatched.
    #[serde(alias = "BufferLevel", default)]
    buffer_level: f64,
}

impl WorkItem {
    /// Creates a work item.
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>, index: u64, buffer_level: f64) -> Self {
        Self {
            text: text.into(),
            index,
            buffer_level,
        }
    }

    /// Decodes a `getword` reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the payload is not a work item.
    pub fn decode(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| Error::protocol(format!("Undecodable work item: {e}")))
    }

    /// Returns the text.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the sequence index.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Returns the buffer-level gauge.
    #[inline]
    #[must_use]
    pub const fn buffer_level(&self) -> f64 {
        self.buffer_level
    }

    /// Returns `true` if this item marks the end of the stream.
    #[inline]
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        self.text == END_OF_STREAM
    }
}

// ============================================================================
// Tests
// ============================================================================
