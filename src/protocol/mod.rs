//! Word server wire protocol.
//!
//! This module defines the frame format and the messages exchanged with the
//! word server.
//!
//! # Protocol Overview
//!
//! | Command | Reply |
//! |---------|-------|
//! | `id` | UUID literal (session id) |
//! | `linkto <id>` | `LINKED TO CLIENT` |
//! | `getword` | JSON [`WorkItem`], text `<EOF>` at end of stream |
//! | `unlinkfrom <id>` | acknowledgement (ignored) |
//! | `disconnect` | acknowledgement (ignored) |
//!
//! Every request and reply is text terminated by the `<STOP>` sentinel.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Request commands |
//! | `frame` | Sentinel framing and wire encoding |
//! | `work_item` | Decoded `getword` replies |

// ============================================================================
// Submodules
// ============================================================================

/// Request commands.
pub mod command;

/// Sentinel framing and wire encoding.
pub mod frame;

/// Decoded `getword` replies.
pub mod work_item;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, LINKED_REPLY};
pub use frame::{DEFAULT_CHUNK_SIZE, FRAME_SENTINEL, FrameCodec, WireEncoding};
pub use work_item::{END_OF_STREAM, WorkItem};
