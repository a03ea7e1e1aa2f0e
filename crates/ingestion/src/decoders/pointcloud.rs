//! PointCloud channel decoder
//!
//! Decodes `{points: [[x, y, z], ...], timestamp, frame_id}` and applies
//! voxel-grid reduction when enabled, re-wrapping the result with its
//! reduction statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use contracts::{ChannelKind, ChannelMessage, ChannelPayload, PointCloudSet};
use serde::Deserialize;

use crate::config::DownsamplingStats;
use crate::decoder::{ChannelDecoder, DecodeError};
use crate::downsample::VoxelDownsampler;
use crate::error::Result;

/// Downsampling configuration for the PointCloud channel
#[derive(Debug, Clone, Copy)]
pub struct DownsamplingConfig {
    /// Voxel edge length in meters
    pub voxel_size: f64,

    /// Whether to downsample at all
    pub enabled: bool,
}

impl Default for DownsamplingConfig {
    fn default() -> Self {
        Self {
            voxel_size: 0.1,
            enabled: true,
        }
    }
}

/// Wire shape of one point-cloud message.
///
/// `points` must be an N x 3 array; any other shape fails deserialization and
/// is reported as a decode error.
#[derive(Debug, Deserialize)]
struct PointCloudWire {
    points: Vec<[f32; 3]>,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    frame_id: Option<u64>,
}

/// Decoder for the PointCloud channel
#[derive(Debug)]
pub struct PointCloudDecoder {
    downsampler: Option<VoxelDownsampler>,
    voxel_size: f64,
    total_points_received: AtomicU64,
    total_points_after: AtomicU64,
}

impl PointCloudDecoder {
    /// Create a decoder; validates the voxel size when downsampling is enabled.
    pub fn new(config: DownsamplingConfig) -> Result<Self> {
        let downsampler = if config.enabled {
            Some(VoxelDownsampler::new(config.voxel_size)?)
        } else {
            None
        };

        Ok(Self {
            downsampler,
            voxel_size: config.voxel_size,
            total_points_received: AtomicU64::new(0),
            total_points_after: AtomicU64::new(0),
        })
    }
}

impl ChannelDecoder for PointCloudDecoder {
    fn kind(&self) -> ChannelKind {
        ChannelKind::PointCloud
    }

    fn decode(&self, raw: Bytes) -> std::result::Result<ChannelMessage, DecodeError> {
        let wire: PointCloudWire =
            serde_json::from_slice(&raw).map_err(|e| DecodeError::Malformed {
                channel: ChannelKind::PointCloud,
                detail: format!("invalid point cloud message (points must be an N x 3 array): {e}"),
            })?;

        let original_count = wire.points.len() as u32;
        self.total_points_received
            .fetch_add(original_count as u64, Ordering::Relaxed);

        let (points, reduction_rate) = match &self.downsampler {
            Some(downsampler) if original_count > 0 => {
                let reduced = downsampler.downsample(&wire.points);
                let rate =
                    (original_count as f64 - reduced.len() as f64) / original_count as f64;
                (reduced, rate)
            }
            _ => (wire.points, 0.0),
        };

        let downsampled_count = points.len() as u32;
        self.total_points_after
            .fetch_add(downsampled_count as u64, Ordering::Relaxed);

        Ok(ChannelMessage {
            timestamp: Some(wire.timestamp.unwrap_or(0.0)),
            sequence_id: None,
            source: None,
            payload: ChannelPayload::PointCloud(PointCloudSet {
                points,
                frame_id: wire.frame_id,
                original_count,
                downsampled_count,
                reduction_rate,
            }),
        })
    }

    fn downsampling_statistics(&self) -> Option<DownsamplingStats> {
        Some(DownsamplingStats {
            voxel_size: self.voxel_size,
            enabled: self.downsampler.is_some(),
            total_points_received: self.total_points_received.load(Ordering::Relaxed),
            total_points_after: self.total_points_after.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(decoder: &PointCloudDecoder, json: &str) -> ChannelMessage {
        decoder.decode(Bytes::from(json.to_string())).unwrap()
    }

    fn cloud(msg: &ChannelMessage) -> &PointCloudSet {
        match &msg.payload {
            ChannelPayload::PointCloud(set) => set,
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_decode_and_downsample() {
        let decoder = PointCloudDecoder::new(DownsamplingConfig {
            voxel_size: 1.0,
            enabled: true,
        })
        .unwrap();

        // Three points, two of them in the same voxel.
        let msg = decode(
            &decoder,
            r#"{"points": [[0.2, 0.2, 0.2], [0.4, 0.4, 0.4], [5.5, 5.5, 5.5]],
                "timestamp": 12.5, "frame_id": 3}"#,
        );

        assert_eq!(msg.timestamp, Some(12.5));
        let set = cloud(&msg);
        assert_eq!(set.original_count, 3);
        assert_eq!(set.downsampled_count, 2);
        assert!((set.reduction_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(set.frame_id, Some(3));
    }

    #[test]
    fn test_downsampling_disabled_passes_through() {
        let decoder = PointCloudDecoder::new(DownsamplingConfig {
            voxel_size: 1.0,
            enabled: false,
        })
        .unwrap();

        let msg = decode(
            &decoder,
            r#"{"points": [[0.1, 0.1, 0.1], [0.2, 0.2, 0.2]], "timestamp": 1.0}"#,
        );
        let set = cloud(&msg);
        assert_eq!(set.downsampled_count, set.original_count);
        assert_eq!(set.reduction_rate, 0.0);
    }

    #[test]
    fn test_empty_cloud_has_zero_reduction() {
        let decoder = PointCloudDecoder::new(DownsamplingConfig::default()).unwrap();
        let msg = decode(&decoder, r#"{"points": [], "timestamp": 1.0}"#);
        let set = cloud(&msg);
        assert_eq!(set.original_count, 0);
        assert_eq!(set.reduction_rate, 0.0);
    }

    #[test]
    fn test_missing_timestamp_defaults_to_zero() {
        let decoder = PointCloudDecoder::new(DownsamplingConfig::default()).unwrap();
        let msg = decode(&decoder, r#"{"points": [[1.0, 2.0, 3.0]]}"#);
        assert_eq!(msg.timestamp, Some(0.0));
    }

    #[test]
    fn test_bad_shape_is_decode_error() {
        let decoder = PointCloudDecoder::new(DownsamplingConfig::default()).unwrap();
        // N x 2 instead of N x 3.
        let err = decoder
            .decode(Bytes::from_static(b"{\"points\": [[1.0, 2.0]]}"))
            .unwrap_err();
        assert!(!err.is_encoding_mismatch());

        // Missing points field entirely.
        assert!(decoder
            .decode(Bytes::from_static(b"{\"timestamp\": 1.0}"))
            .is_err());
    }

    #[test]
    fn test_running_totals_accumulate() {
        let decoder = PointCloudDecoder::new(DownsamplingConfig {
            voxel_size: 10.0,
            enabled: true,
        })
        .unwrap();

        decode(
            &decoder,
            r#"{"points": [[0.0, 0.0, 0.0], [0.1, 0.1, 0.1]], "timestamp": 1.0}"#,
        );
        decode(&decoder, r#"{"points": [[0.2, 0.2, 0.2]], "timestamp": 2.0}"#);

        let stats = decoder.downsampling_statistics().unwrap();
        assert_eq!(stats.total_points_received, 3);
        assert_eq!(stats.total_points_after, 2);
        assert!(stats.avg_reduction_rate() > 0.0);
    }
}
