//! peersync-core library.
//!
//! Causality tracking and conflict resolution for leaderless file sync:
//! version vectors ([`version`]), file metadata with the conflict policy
//! ([`file`]), block descriptors ([`block`]), and the 4-byte message framing
//! header ([`header`], [`message`]).
//!
//! # Conventions
//!
//! - **Errors**: Use `thiserror` enums for protocol errors and
//!   `anyhow::Result` at configuration boundaries.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod block;
pub mod config;
pub mod error;
pub mod file;
pub mod header;
pub mod message;
pub mod version;

pub use block::{BLOCK_SIZE, BlockInfo};
pub use error::{ErrorCode, ProtocolError};
pub use file::{FileInfo, FileInfoTruncated, FileMeta, Winner, resolve_conflict};
pub use header::{HEADER_LEN, Header};
pub use message::{Compression, MessageIds, MessageType};
pub use version::{Counter, Ordering, ShortId, Vector};
