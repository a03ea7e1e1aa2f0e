//! Stream synchronizer implementation.

use std::collections::HashMap;

use contracts::{ChannelKind, ChannelMessage, ChannelPayload, SyncedFrame};
use observability::{record_alignment, record_alignment_failure};
use tracing::{instrument, trace};

use crate::buffer::ChannelBuffer;
use crate::error::SyncError;

/// Synchronizer configuration
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Maximum |timestamp - target| for a message to be alignable (milliseconds)
    pub window_ms: f64,

    /// Ring buffer capacity per channel
    pub buffer_size: usize,

    /// Minimum sync quality for a frame to be built
    pub min_quality: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_ms: 50.0,
            buffer_size: 100,
            min_quality: 0.5,
        }
    }
}

/// Timestamp-based multi-stream synchronizer
///
/// Single-consumer component: the buffers are only ever mutated through
/// `&mut self` by the one driving loop, and are never shared across channels.
#[derive(Debug)]
pub struct StreamSynchronizer {
    window_ms: f64,
    window_s: f64,
    min_quality: f64,
    obb: ChannelBuffer,
    pointcloud: ChannelBuffer,
    status: ChannelBuffer,
    /// Frame counter; advanced only by successful alignments
    frame_counter: u64,
    success_count: u64,
    fail_count: u64,
    /// Sum of the worst absolute offset over all successful alignments
    total_max_offset_ms: f64,
}

impl StreamSynchronizer {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            window_ms: config.window_ms,
            window_s: config.window_ms / 1000.0,
            min_quality: config.min_quality,
            obb: ChannelBuffer::new(config.buffer_size),
            pointcloud: ChannelBuffer::new(config.buffer_size),
            status: ChannelBuffer::new(config.buffer_size),
            frame_counter: 0,
            success_count: 0,
            fail_count: 0,
            total_max_offset_ms: 0.0,
        }
    }

    fn buffer(&self, kind: ChannelKind) -> &ChannelBuffer {
        match kind {
            ChannelKind::Obb => &self.obb,
            ChannelKind::PointCloud => &self.pointcloud,
            ChannelKind::Status => &self.status,
        }
    }

    fn buffer_mut(&mut self, kind: ChannelKind) -> &mut ChannelBuffer {
        match kind {
            ChannelKind::Obb => &mut self.obb,
            ChannelKind::PointCloud => &mut self.pointcloud,
            ChannelKind::Status => &mut self.status,
        }
    }

    /// Buffer a message for its channel.
    ///
    /// A message without a timestamp, or whose payload belongs to a different
    /// channel than `channel`, is a caller bug and is rejected immediately.
    pub fn add(&mut self, channel: ChannelKind, message: ChannelMessage) -> Result<(), SyncError> {
        if message.kind() != channel {
            return Err(SyncError::ChannelMismatch {
                expected: channel,
                actual: message.kind(),
            });
        }
        let timestamp = message
            .timestamp
            .ok_or(SyncError::MissingTimestamp { channel })?;

        self.buffer_mut(channel).push(timestamp, message);
        Ok(())
    }

    /// Newest timestamp across all buffers (by push order per buffer).
    fn latest_timestamp(&self) -> Option<f64> {
        ChannelKind::ALL
            .iter()
            .filter_map(|kind| self.buffer(*kind).newest_timestamp())
            .fold(None, |acc: Option<f64>, t| {
                Some(acc.map_or(t, |a| a.max(t)))
            })
    }

    /// Produce a time-aligned frame for `target` (or the latest buffered
    /// timestamp when unspecified).
    ///
    /// Returns `None` when all buffers are empty, or when the alignment's
    /// quality falls below the configured minimum; a below-threshold attempt
    /// records a failure and does not consume a frame id.
    #[instrument(name = "synchronizer_align", level = "trace", skip_all)]
    pub fn align(&mut self, target: Option<f64>) -> Option<SyncedFrame> {
        let target = match target.or_else(|| self.latest_timestamp()) {
            Some(t) => t,
            // Nothing buffered anywhere: no attempt is recorded.
            None => return None,
        };

        let mut offsets: HashMap<ChannelKind, f64> = HashMap::new();
        let mut obb = None;
        let mut pointcloud = None;
        let mut status = None;

        for kind in ChannelKind::ALL {
            if let Some((message, offset_s)) = self.buffer(kind).find_closest(target, self.window_s)
            {
                offsets.insert(kind, offset_s * 1000.0);
                match &message.payload {
                    ChannelPayload::ObbSet(set) => obb = Some(set.clone()),
                    ChannelPayload::PointCloud(set) => pointcloud = Some(set.clone()),
                    ChannelPayload::Status(report) => status = Some(report.clone()),
                }
            }
        }

        let max_offset_ms = offsets.values().map(|o| o.abs()).fold(0.0, f64::max);
        let sync_quality = if offsets.is_empty() {
            0.0
        } else {
            (1.0 - max_offset_ms / self.window_ms).clamp(0.0, 1.0)
        };

        if sync_quality < self.min_quality {
            self.fail_count += 1;
            record_alignment_failure();
            trace!(target, sync_quality, "alignment below quality threshold");
            return None;
        }

        self.frame_counter += 1;
        self.success_count += 1;
        if !offsets.is_empty() {
            self.total_max_offset_ms += max_offset_ms;
        }

        let frame = SyncedFrame {
            timestamp: target,
            frame_id: self.frame_counter,
            obb,
            pointcloud,
            status,
            sync_quality,
            sync_offset_ms: offsets,
        };
        record_alignment(&frame);
        Some(frame)
    }

    /// Align the latest buffered data (convenience form of `align(None)`).
    pub fn latest_frame(&mut self) -> Option<SyncedFrame> {
        self.align(None)
    }

    /// Align each target independently; failed targets are simply skipped.
    pub fn batch_align(&mut self, targets: &[f64]) -> Vec<SyncedFrame> {
        targets
            .iter()
            .filter_map(|&target| self.align(Some(target)))
            .collect()
    }

    /// Drop all buffered messages. Counters and the frame id are kept.
    pub fn clear_buffers(&mut self) {
        self.obb.clear();
        self.pointcloud.clear();
        self.status.clear();
    }

    /// Snapshot of the synchronizer's counters and buffer depths.
    pub fn statistics(&self) -> SyncStatistics {
        let attempts = self.success_count + self.fail_count;
        let success_rate = if attempts > 0 {
            self.success_count as f64 / attempts as f64 * 100.0
        } else {
            0.0
        };
        let avg_offset_ms = if self.success_count > 0 {
            self.total_max_offset_ms / self.success_count as f64
        } else {
            0.0
        };

        SyncStatistics {
            frame_count: self.frame_counter,
            success_count: self.success_count,
            fail_count: self.fail_count,
            success_rate,
            avg_offset_ms,
            buffer_depths: BufferDepths {
                obb: self.obb.len(),
                pointcloud: self.pointcloud.len(),
                status: self.status.len(),
            },
        }
    }
}

impl Default for StreamSynchronizer {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

/// Synchronizer statistics snapshot
#[derive(Debug, Clone)]
pub struct SyncStatistics {
    /// Frames built so far (== highest assigned frame id)
    pub frame_count: u64,

    /// Successful alignment attempts
    pub success_count: u64,

    /// Attempts rejected by the quality threshold
    pub fail_count: u64,

    /// Success percentage over all recorded attempts
    pub success_rate: f64,

    /// Average worst-offset (ms) over successful alignments
    pub avg_offset_ms: f64,

    /// Current per-channel buffer depth
    pub buffer_depths: BufferDepths,
}

/// Per-channel buffer depth
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferDepths {
    pub obb: usize,
    pub pointcloud: usize,
    pub status: usize,
}
