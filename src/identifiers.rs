//! Type-safe identifiers.
//!
//! Newtype wrappers keep connection ids and server session ids from being
//! mixed up.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::{Error, Result};

// ============================================================================
// ConnectionId
// ============================================================================

/// Process-local unique id of a [`Connection`](crate::transport::Connection).
///
/// Consumer workers are keyed by the id of the connection they drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a new random id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workers are identified by their connection.
pub type WorkerId = ConnectionId;

// ============================================================================
// SessionId
// ============================================================================

/// Server-assigned id of the primary connection.
///
/// Returned by the `id` command as a UUID literal and echoed back in
/// `linkto` / `unlinkfrom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Parses a session id from a server reply.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the reply is not a UUID literal.
    pub fn parse(reply: &str) -> Result<Self> {
        Uuid::parse_str(reply.trim())
            .map(Self)
            .map_err(|e| Error::protocol(format!("Malformed session id {reply:?}: {e}")))
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// ============================================================================
// Tests
// ============================================================================
