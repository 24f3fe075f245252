//! Sentinel-delimited frame codec.
//!
//! A frame is payload text followed by the literal [`FRAME_SENTINEL`]. There
//! is no escaping: a payload that contains the sentinel is cut short at its
//! first occurrence.
//!
//! Text travels as UTF-16LE by default, which is what the word server speaks.
//! The sentinel is searched for in the raw bytes at code-unit alignment, so a
//! frame split anywhere across transport chunks (even inside a code unit)
//! reassembles exactly.

// ============================================================================
// Imports
// ============================================================================

use std::char::REPLACEMENT_CHARACTER;

// ============================================================================
// Constants
// ============================================================================

/// Literal end-of-frame marker.
pub const FRAME_SENTINEL: &str = "<STOP>";

/// Default size of one transport read.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

// ============================================================================
// WireEncoding
// ============================================================================

/// Text encoding used on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireEncoding {
    /// UTF-16 little endian (server default).
    #[default]
    Utf16Le,
    /// UTF-8.
    Utf8,
}

impl WireEncoding {
    /// Width in bytes of one code unit.
    #[inline]
    #[must_use]
    pub const fn unit_width(self) -> usize {
        match self {
            Self::Utf16Le => 2,
            Self::Utf8 => 1,
        }
    }

    /// Encodes text into wire bytes.
    #[must_use]
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf8 => text.as_bytes().to_vec(),
        }
    }

    /// Decodes wire bytes, replacing invalid sequences with U+FFFD.
    #[must_use]
    pub fn decode_lossy(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf16Le => {
                let units = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
                let mut text: String = char::decode_utf16(units)
                    .map(|c| c.unwrap_or(REPLACEMENT_CHARACTER))
                    .collect();
                if bytes.len() % 2 != 0 {
                    text.push(REPLACEMENT_CHARACTER);
                }
                text
            }
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

// ============================================================================
// FrameCodec
// ============================================================================

/// Encodes outgoing frames and locates the end of incoming ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCodec {
    /// Wire text encoding.
    encoding: WireEncoding,
    /// Bytes requested per transport read.
    chunk_size: usize,
    /// Encoded sentinel.
    sentinel: Vec<u8>,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(WireEncoding::default(), DEFAULT_CHUNK_SIZE)
    }
}

impl FrameCodec {
    /// Creates a codec for the given encoding and read size.
    ///
    /// A zero chunk size is raised to one code unit.
    #[must_use]
    pub fn new(encoding: WireEncoding, chunk_size: usize) -> Self {
        Self {
            encoding,
            chunk_size: chunk_size.max(encoding.unit_width()),
            sentinel: encoding.encode(FRAME_SENTINEL),
        }
    }

    /// Returns the wire encoding.
    #[inline]
    #[must_use]
    pub const fn encoding(&self) -> WireEncoding {
        self.encoding
    }

    /// Returns the transport read size.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the encoded sentinel.
    #[inline]
    #[must_use]
    pub fn sentinel(&self) -> &[u8] {
        &self.sentinel
    }

    /// Encodes `<payload><STOP>`.
    #[must_use]
    pub fn encode_frame(&self, payload: &str) -> Vec<u8> {
        let mut frame = self.encoding.encode(payload);
        frame.extend_from_slice(&self.sentinel);
        frame
    }

    /// Finds the first aligned sentinel in `bytes`, starting near `from`.
    ///
    /// `from` is the length the buffer had before the latest chunk was
    /// appended; the search backs up far enough to catch a sentinel that
    /// straddles the old boundary.
    #[must_use]
    pub fn find_sentinel(&self, bytes: &[u8], from: usize) -> Option<usize> {
        let unit = self.encoding.unit_width();
        let needle = self.sentinel.as_slice();

        let start = from.saturating_sub(needle.len() - 1);
        let mut pos = start - start % unit;

        while pos + needle.len() <= bytes.len() {
            if &bytes[pos..pos + needle.len()] == needle {
                return Some(pos);
            }
            pos += unit;
        }

        None
    }

    /// Decodes a complete payload.
    #[inline]
    #[must_use]
    pub fn decode(&self, payload: &[u8]) -> String {
        self.encoding.decode_lossy(payload)
    }
}

// ============================================================================
// Tests
// ============================================================================
