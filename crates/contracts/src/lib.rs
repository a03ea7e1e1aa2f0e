//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Uses the upstream perception system's wall-clock timestamp (seconds, f64) as primary clock
//! - `frame_id` on incoming payloads is optional, used for ordering/diagnostics
//! - `SyncedFrame::frame_id` is assigned locally by the synchronizer and is gap-free
//!   over successful alignments

mod channel;
mod frame;
mod message;

pub use channel::{ChannelKind, UnknownChannel};
pub use frame::SyncedFrame;
pub use message::*;
