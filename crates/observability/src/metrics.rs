//! Metrics recording helpers
//!
//! Thin wrappers over the `metrics` facade so the metric names stay in one
//! place. Call sites pay nothing unless a recorder is installed.

use contracts::SyncedFrame;
use metrics::{counter, gauge, histogram};

/// Record a successful alignment.
///
/// Call once per `SyncedFrame` the synchronizer produces.
pub fn record_alignment(frame: &SyncedFrame) {
    counter!("lcps_observer_frames_total").increment(1);
    gauge!("lcps_observer_last_frame_id").set(frame.frame_id as f64);

    gauge!("lcps_observer_sync_quality").set(frame.sync_quality);
    histogram!("lcps_observer_sync_quality_hist").record(frame.sync_quality);

    for (channel, offset_ms) in &frame.sync_offset_ms {
        gauge!("lcps_observer_sync_offset_ms", "channel" => channel.as_str()).set(*offset_ms);
        histogram!("lcps_observer_sync_offset_ms_hist", "channel" => channel.as_str())
            .record(offset_ms.abs());
    }

    let present = [
        frame.has_obb(),
        frame.has_pointcloud(),
        frame.has_status(),
    ]
    .iter()
    .filter(|p| **p)
    .count();
    gauge!("lcps_observer_frame_channels_present").set(present as f64);
    if !frame.is_complete() {
        counter!("lcps_observer_partial_frames_total").increment(1);
    }
}

/// Record an alignment attempt rejected by the quality threshold.
pub fn record_alignment_failure() {
    counter!("lcps_observer_alignment_failures_total").increment(1);
}

/// Record the current queue depth of one receiver.
pub fn record_channel_queue_depth(channel: contracts::ChannelKind, depth: usize) {
    gauge!("lcps_observer_queue_depth", "channel" => channel.as_str()).set(depth as f64);
}

/// Record a frame handed to the recorder.
pub fn record_frame_recorded() {
    counter!("lcps_observer_frames_recorded_total").increment(1);
}

/// Record a frame dropped because the recorder queue was full.
pub fn record_recorder_drop() {
    counter!("lcps_observer_recorder_drops_total").increment(1);
}
