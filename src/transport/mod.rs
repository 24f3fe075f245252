//! TCP transport layer.
//!
//! This module owns the sockets to the word server and the frame I/O on
//! top of them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                            ┌──────────────────┐
//! │  Connection      │        TCP (UTF-16LE)      │  Word server     │
//! │                  │  "getword<STOP>"  ───────► │                  │
//! │  ExchangeBuffer  │  ◄─────── "{..}<STOP>"     │                  │
//! └──────────────────┘                            └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::new` - Unconnected handle
//! 2. `Connection::connect` - Active on success
//! 3. `Connection::exchange` - Send a command, receive its reply
//! 4. `Connection::close` - Stopped (also entered on any I/O failure)
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Socket lifecycle and frame I/O |
//! | `exchange` | Per-exchange scratch state |

// ============================================================================
// Submodules
// ============================================================================

/// Socket lifecycle and frame I/O.
pub mod connection;

/// Per-exchange scratch state.
pub mod exchange;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionState, read_frame};
pub use exchange::{ExchangeBuffer, FORMAT_MARKER};
