//! SyncedFrame - Synchronizer output
//!
//! Time-aligned composite frame.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ChannelKind, ObbSet, PointCloudSet, StatusReport, SystemState};

/// Time-aligned composite frame
///
/// Contains the per-channel payloads whose timestamps fell inside the sync
/// window around `timestamp`. Each channel is independently optional.
///
/// Frames are built exactly once by the synchronizer, only when
/// `sync_quality` clears the configured minimum, and are immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncedFrame {
    /// Alignment target timestamp (seconds)
    pub timestamp: f64,

    /// Locally assigned frame number (from 1, gap-free over successes)
    pub frame_id: u64,

    /// OBB detections, if the channel contributed
    pub obb: Option<ObbSet>,

    /// Point cloud, if the channel contributed
    pub pointcloud: Option<PointCloudSet>,

    /// Status report, if the channel contributed
    pub status: Option<StatusReport>,

    /// Alignment quality in [0, 1]; 1.0 means every contributing channel
    /// matched the target exactly
    pub sync_quality: f64,

    /// Signed per-channel offset in milliseconds, for channels that contributed
    pub sync_offset_ms: HashMap<ChannelKind, f64>,
}

impl SyncedFrame {
    pub fn has_obb(&self) -> bool {
        self.obb.is_some()
    }

    pub fn has_pointcloud(&self) -> bool {
        self.pointcloud.is_some()
    }

    pub fn has_status(&self) -> bool {
        self.status.is_some()
    }

    /// True if all three channels contributed.
    pub fn is_complete(&self) -> bool {
        self.has_obb() && self.has_pointcloud() && self.has_status()
    }

    /// Number of OBB detections in the frame (0 if the channel is absent).
    pub fn obb_count(&self) -> usize {
        self.obb.as_ref().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// Number of points in the frame (0 if the channel is absent).
    pub fn point_count(&self) -> usize {
        self.pointcloud.as_ref().map(|p| p.points.len()).unwrap_or(0)
    }

    /// System state carried by the frame, if any.
    pub fn status_state(&self) -> Option<SystemState> {
        self.status.as_ref().map(|s| s.state)
    }

    /// Worst absolute per-channel offset in milliseconds (0.0 for an empty map).
    pub fn max_sync_offset_ms(&self) -> f64 {
        self.sync_offset_ms
            .values()
            .map(|o| o.abs())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_frame() -> SyncedFrame {
        SyncedFrame {
            timestamp: 10.0,
            frame_id: 1,
            obb: None,
            pointcloud: None,
            status: None,
            sync_quality: 1.0,
            sync_offset_ms: HashMap::new(),
        }
    }

    #[test]
    fn test_empty_frame_helpers() {
        let frame = empty_frame();
        assert!(!frame.is_complete());
        assert_eq!(frame.obb_count(), 0);
        assert_eq!(frame.point_count(), 0);
        assert_eq!(frame.max_sync_offset_ms(), 0.0);
    }

    #[test]
    fn test_max_offset_uses_absolute_values() {
        let mut frame = empty_frame();
        frame.sync_offset_ms.insert(ChannelKind::Obb, -30.0);
        frame.sync_offset_ms.insert(ChannelKind::Status, 12.5);
        assert_eq!(frame.max_sync_offset_ms(), 30.0);
    }
}
