//! # Sync Engine
//!
//! Timestamp-based multi-stream synchronization.
//!
//! Buffers recent messages per channel and produces best-effort time-aligned
//! `SyncedFrame`s on demand. Alignment is exclusively by timestamp comparison,
//! never by arrival order; the three per-channel ring buffers are owned by the
//! synchronizer and driven by a single consumer.

mod buffer;
mod engine;
mod error;

pub use engine::{BufferDepths, StreamSynchronizer, SyncConfig, SyncStatistics};
pub use error::SyncError;
