//! Per-exchange scratch state.
//!
//! An [`ExchangeBuffer`] carries everything one request/response exchange
//! needs: the fixed-size receive area, the bytes of a frame that has not
//! seen its sentinel yet, the text shown to the caller, and the transport
//! failure (if any) that ended the exchange.

// ============================================================================
// Imports
// ============================================================================

use crate::error::TransportFailure;
use crate::protocol::{DEFAULT_CHUNK_SIZE, FrameCodec};

// ============================================================================
// Constants
// ============================================================================

/// Prefix marking a tabular server reply.
pub const FORMAT_MARKER: &str = "<FORMAT>";

// ============================================================================
// ExchangeBuffer
// ============================================================================

/// Mutable scratch state for one request/response exchange.
///
/// The error flag is monotonic: once a transport failure is recorded it
/// stays set until [`reset`](Self::reset) is called.
#[derive(Debug, Clone)]
pub struct ExchangeBuffer {
    /// Fixed-capacity receive area for one transport read.
    scratch: Box<[u8]>,
    /// Bytes of the frame being reassembled.
    pending: Vec<u8>,
    /// Decoded reply text and recorded status messages.
    message: String,
    /// First transport failure of this exchange.
    failure: Option<TransportFailure>,
}

impl Default for ExchangeBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHUNK_SIZE)
    }
}

impl ExchangeBuffer {
    /// Creates a buffer with the default receive capacity.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer whose receive area holds `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scratch: vec![0; capacity.max(1)].into_boxed_slice(),
            pending: Vec::new(),
            message: String::new(),
            failure: None,
        }
    }

    /// Creates a buffer sized for a codec's transport reads.
    #[inline]
    #[must_use]
    pub fn for_codec(codec: &FrameCodec) -> Self {
        Self::with_capacity(codec.chunk_size())
    }

    /// Returns the receive area capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.scratch.len()
    }

    /// Returns the accumulated message text.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Takes the accumulated message text, leaving it empty.
    #[inline]
    pub fn take_message(&mut self) -> String {
        std::mem::take(&mut self.message)
    }

    /// Returns `true` if any message text is present.
    #[inline]
    #[must_use]
    pub fn has_message(&self) -> bool {
        !self.message.is_empty()
    }

    /// Returns `true` if the message is a tabular reply.
    #[inline]
    #[must_use]
    pub fn is_formatted(&self) -> bool {
        self.message.starts_with(FORMAT_MARKER)
    }

    /// Returns `true` if a transport failure was recorded.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.failure.is_some()
    }

    /// Returns the recorded transport failure.
    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&TransportFailure> {
        self.failure.as_ref()
    }

    /// Appends status text to the message.
    #[inline]
    pub fn append_message(&mut self, text: &str) {
        self.message.push_str(text);
    }

    /// Clears the message text, keeping the error flag.
    #[inline]
    pub fn clear_message(&mut self) {
        self.message.clear();
    }

    /// Zeroes the receive area.
    #[inline]
    pub fn clear_scratch(&mut self) {
        self.scratch.fill(0);
    }

    /// Clears all state, including the error flag.
    pub fn reset(&mut self) {
        self.clear_scratch();
        self.pending.clear();
        self.message.clear();
        self.failure = None;
    }
}

// ============================================================================
// ExchangeBuffer - Frame Assembly
// ============================================================================

impl ExchangeBuffer {
    /// Prepares for a new frame read with `chunk_size`-byte reads.
    pub(crate) fn begin_frame(&mut self, chunk_size: usize) {
        if self.scratch.len() != chunk_size {
            self.scratch = vec![0; chunk_size].into_boxed_slice();
        }
        self.pending.clear();
    }

    /// Returns the receive area for the next transport read.
    #[inline]
    pub(crate) fn scratch_mut(&mut self) -> &mut [u8] {
        &mut self.scratch
    }

    /// Moves the first `read` bytes of the receive area into the pending
    /// frame and clears the receive area.
    ///
    /// Returns the pending length before the append.
    pub(crate) fn absorb(&mut self, read: usize) -> usize {
        let before = self.pending.len();
        self.pending.extend_from_slice(&self.scratch[..read]);
        self.clear_scratch();
        before
    }

    /// Returns the bytes of the frame being reassembled.
    #[inline]
    pub(crate) fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Records a completed frame's text and drops its bytes.
    pub(crate) fn finish_frame(&mut self, text: &str) {
        self.message.push_str(text);
        self.pending.clear();
    }

    /// Records a transport failure and returns it.
    ///
    /// The first failure wins; later ones only append their text.
    pub(crate) fn record_failure(&mut self, failure: TransportFailure) -> TransportFailure {
        self.message.push_str(&failure.message);
        self.pending.clear();
        self.failure.get_or_insert(failure).clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
