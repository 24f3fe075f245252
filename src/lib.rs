//! Wordpool - Consumer pool client for a word-dispensing server.
//!
//! This library talks to a text server over TCP and pulls the words of a
//! shared stream through a pool of auxiliary connections.
//!
//! # Architecture
//!
//! The client follows a primary/consumer model:
//!
//! - **Primary connection**: Asks the server for a session id
//! - **Consumer connections**: Link to that session and fetch work items
//!
//! Key design principles:
//!
//! - Every request and reply is a text frame ending in `<STOP>`
//! - Each consumer owns one connection and one worker task
//! - Work items carry a global index, so arrival order does not matter
//! - A governor sizes the pool from the server's reported buffer level
//!
//! # Quick Start
//!
//! ```no_run
//! use wordpool::{Connection, FrameCodec, PoolController, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Connect the primary and fetch the session id
//!     let primary = Connection::open("127.0.0.1", 5000, FrameCodec::default()).await?;
//!     let pool = PoolController::builder()
//!         .max_consumers(16)
//!         .build(primary)
//!         .await?;
//!
//!     // Let the governor size the pool
//!     pool.start_self_adjusting_consumers();
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     pool.stop_all_consumers().await;
//!
//!     println!("{}", pool.ordered_text());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`pool`] | Consumer pool: [`PoolController`], governor |
//! | [`protocol`] | Commands, frames and work items |
//! | [`transport`] | TCP connections and frame I/O |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for connections and sessions.
pub mod identifiers;

/// Consumer pool management.
///
/// Use [`PoolController::builder()`] to create a configured pool.
pub mod pool;

/// Word server wire protocol.
pub mod protocol;

/// TCP transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result, TransportFailure, TransportKind};

// Identifier types
pub use identifiers::{ConnectionId, SessionId, WorkerId};

// Pool types
pub use pool::{GovernorState, PoolBuilder, PoolController, PoolOptions, RetryPolicy};

// Protocol types
pub use protocol::{Command, FrameCodec, WireEncoding, WorkItem};

// Transport types
pub use transport::{Connection, ConnectionState, ExchangeBuffer};
