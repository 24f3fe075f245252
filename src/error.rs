//! Error types for the consumer pool client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use wordpool::{Command, Connection, Result};
//!
//! async fn example(connection: &Connection) -> Result<()> {
//!     let reply = connection.exchange(&Command::Id).await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Transport | [`Error::Transport`], [`Error::ConnectionStopped`] |
//! | Protocol | [`Error::Protocol`], [`Error::SessionUnavailable`] |
//! | Pool | [`Error::RegistryContention`] |
//! | External | [`Error::Io`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::{Error as IoError, ErrorKind};
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// TransportFailure
// ============================================================================

/// Classification of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The peer forcibly closed the connection (reset or abort).
    RemoteReset,
    /// Any other connect, send or receive failure.
    Other,
}

/// A recorded connect/send/receive failure.
///
/// Cloneable so the same record can live in an
/// [`ExchangeBuffer`](crate::transport::ExchangeBuffer) and be returned to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    /// Failure classification.
    pub kind: TransportKind,
    /// Human-readable description.
    pub message: String,
}

impl TransportFailure {
    /// Message recorded for a forcibly closed connection.
    pub const REMOTE_RESET_MESSAGE: &'static str = "REMOTE HOST FORCIBLY CLOSED CONNECTION";

    /// Creates a failure of kind [`TransportKind::Other`].
    #[inline]
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: TransportKind::Other,
            message: message.into(),
        }
    }

    /// Creates a failure of kind [`TransportKind::RemoteReset`].
    #[inline]
    pub fn remote_reset() -> Self {
        Self {
            kind: TransportKind::RemoteReset,
            message: Self::REMOTE_RESET_MESSAGE.to_string(),
        }
    }

    /// Classifies an I/O error.
    ///
    /// Resets and aborts initiated by the peer map to
    /// [`TransportKind::RemoteReset`]; everything else is
    /// [`TransportKind::Other`].
    pub fn from_io(err: &IoError) -> Self {
        match err.kind() {
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => Self::remote_reset(),
            _ => Self::other(err.to_string()),
        }
    }

    /// Returns `true` if the peer forcibly closed the connection.
    #[inline]
    #[must_use]
    pub fn is_remote_reset(&self) -> bool {
        self.kind == TransportKind::RemoteReset
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when pool options fail validation.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Connect, send or receive failed.
    #[error("Transport error: {0}")]
    Transport(TransportFailure),

    /// I/O attempted on a connection that is not active.
    #[error("Connection is not active")]
    ConnectionStopped,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected reply.
    ///
    /// Returned for a wrong handshake reply, a malformed session id, or an
    /// undecodable work item.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// The controller has no session to link consumers to.
    #[error("Client is not connected: no session available")]
    SessionUnavailable,

    // ========================================================================
    // Pool Errors
    // ========================================================================
    /// Bounded-retry ceiling reached on a registry insert or remove.
    #[error("Registry contention: {operation} abandoned after {attempts} attempts")]
    RegistryContention {
        /// The registry operation that was abandoned.
        operation: &'static str,
        /// Attempts made before giving up.
        attempts: u32,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a registry contention error.
    #[inline]
    pub fn registry_contention(operation: &'static str, attempts: u32) -> Self {
        Self::RegistryContention {
            operation,
            attempts,
        }
    }
}

impl From<TransportFailure> for Error {
    fn from(failure: TransportFailure) -> Self {
        Self::Transport(failure)
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a transport-level failure.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ConnectionStopped | Self::Io(_)
        )
    }

    /// Returns `true` if the peer forcibly closed the connection.
    #[inline]
    #[must_use]
    pub fn is_remote_reset(&self) -> bool {
        matches!(self, Self::Transport(failure) if failure.is_remote_reset())
    }

    /// Returns `true` if the server replied with something unexpected.
    #[inline]
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Protocol { .. } | Self::SessionUnavailable)
    }

    /// Returns `true` if a registry retry ceiling was reached.
    #[inline]
    #[must_use]
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::RegistryContention { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
