//! # Recorder
//!
//! Durable sink for synchronized frames.
//!
//! `FrameRecorder` appends `SyncedFrame`s to a single structured file per
//! recording session, asynchronously by default, with periodic durability
//! flushes. `RecordingReader` reads a finished file back for offline analysis.
//!
//! The container is a length-prefixed record stream (header, one record per
//! frame, footer). Logically it holds two parallel growable arrays
//! (`timestamps`, `frame_ids`) and three per-channel data areas keyed by a
//! zero-padded frame index, so per-frame groups sort lexicographically in
//! write order.

mod error;
mod format;
mod reader;
mod recorder;
mod store;

pub use error::RecorderError;
pub use format::{
    frame_key, Compression, FooterRecord, FrameRecord, HeaderRecord, MetadataValue,
    PointCloudRecord, FORMAT_VERSION,
};
pub use reader::{Recording, RecordingReader};
pub use recorder::{FrameRecorder, RecorderConfig, RecorderStatistics, RecordingSummary};
