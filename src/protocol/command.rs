//! Commands understood by the word server.
//!
//! Each command renders to the exact text sent before the frame sentinel.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::identifiers::SessionId;

// ============================================================================
// Constants
// ============================================================================

/// Reply the server sends after a successful `linkto`.
pub const LINKED_REPLY: &str = "LINKED TO CLIENT";

// ============================================================================
// Command
// ============================================================================

/// A request sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask for the session id of this connection.
    Id,
    /// Link this connection to a primary session as a consumer.
    LinkTo(SessionId),
    /// Fetch the next work item.
    GetWord,
    /// Unlink this connection from a primary session.
    UnlinkFrom(SessionId),
    /// Ask the server to drop this connection.
    Disconnect,
    /// Any other command text, sent verbatim.
    Raw(String),
}

impl Command {
    /// Creates a verbatim command.
    #[inline]
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(text.into())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => f.write_str("id"),
            Self::LinkTo(session) => write!(f, "linkto {session}"),
            Self::GetWord => f.write_str("getword"),
            Self::UnlinkFrom(session) => write!(f, "unlinkfrom {session}"),
            Self::Disconnect => f.write_str("disconnect"),
            Self::Raw(text) => f.write_str(text),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
