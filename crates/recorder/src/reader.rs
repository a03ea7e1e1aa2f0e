//! RecordingReader - reads a finished recording back for analysis.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{RecorderError, Result};
use crate::format::{
    frame_key, read_record, Compression, FooterRecord, MetadataValue, PointCloudRecord, Record,
    MAGIC,
};

/// A recording materialized into its logical layout
///
/// Two parallel arrays indexed by write order, plus one entry per present
/// channel payload in each data area, keyed by the zero-padded frame key
/// (`BTreeMap` keeps them in lexicographic, i.e. write, order).
#[derive(Debug, Default)]
pub struct Recording {
    /// Creation timestamp from the header (RFC 3339)
    pub created_at: String,

    /// Container format version
    pub format_version: String,

    /// Compression the records were stored with
    pub compression: Compression,

    /// Caller-supplied metadata attributes
    pub metadata: Vec<(String, MetadataValue)>,

    /// Alignment timestamps, in write order
    pub timestamps: Vec<f64>,

    /// Frame ids, in write order
    pub frame_ids: Vec<u32>,

    /// OBB JSON documents per frame key
    pub obb_data: BTreeMap<String, String>,

    /// Point clouds per frame key
    pub pointcloud_data: BTreeMap<String, PointCloudRecord>,

    /// Status JSON documents per frame key
    pub status_data: BTreeMap<String, String>,

    /// Closing attributes; absent if the recording was cut off before `stop`
    pub footer: Option<FooterRecord>,
}

impl Recording {
    /// Number of recorded frames.
    pub fn frame_count(&self) -> usize {
        self.timestamps.len()
    }
}

/// Reader for the recording container
pub struct RecordingReader;

impl RecordingReader {
    /// Read a recording file into its logical layout.
    pub fn read(path: impl AsRef<Path>) -> Result<Recording> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(RecorderError::BadMagic);
        }

        // The header is always stored uncompressed.
        let header = match read_record(&mut reader, Compression::None)? {
            Some(Record::Header(header)) => header,
            _ => return Err(RecorderError::Corrupt("missing header record".to_string())),
        };

        let mut recording = Recording {
            created_at: header.created_at,
            format_version: header.format_version,
            compression: header.compression,
            metadata: header.metadata,
            ..Default::default()
        };

        while let Some(record) = read_record(&mut reader, recording.compression)? {
            match record {
                Record::Header(_) => {
                    return Err(RecorderError::Corrupt("duplicate header record".to_string()));
                }
                Record::Frame(frame) => {
                    let key = frame_key(frame.index);
                    recording.timestamps.push(frame.timestamp);
                    recording.frame_ids.push(frame.frame_id);
                    if let Some(obb) = frame.obb {
                        recording.obb_data.insert(key.clone(), obb);
                    }
                    if let Some(pointcloud) = frame.pointcloud {
                        recording.pointcloud_data.insert(key.clone(), pointcloud);
                    }
                    if let Some(status) = frame.status {
                        recording.status_data.insert(key, status);
                    }
                }
                Record::Footer(footer) => {
                    recording.footer = Some(footer);
                }
            }
        }

        Ok(recording)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{FrameRecorder, RecorderConfig};
    use contracts::{ChannelKind, ObbSet, PointCloudSet, StatusReport, SyncedFrame, SystemState};
    use std::collections::HashMap;
    use std::time::Duration;

    fn known_frame(frame_id: u64) -> SyncedFrame {
        let mut sync_offset_ms = HashMap::new();
        sync_offset_ms.insert(ChannelKind::Obb, -2.0);

        SyncedFrame {
            timestamp: 50.0 + frame_id as f64,
            frame_id,
            obb: Some(ObbSet::default()),
            pointcloud: Some(PointCloudSet {
                points: vec![[0.5, 1.5, 2.5]],
                frame_id: Some(frame_id),
                original_count: 4,
                downsampled_count: 1,
                reduction_rate: 0.75,
            }),
            status: Some(StatusReport {
                state: SystemState::Alerting,
                state_raw: "alerting".to_string(),
                frame_id: Some(frame_id),
                metrics: serde_json::json!({"fps": 19.5}),
                detection: serde_json::json!({"collision_count": 1}),
            }),
            sync_quality: 0.8,
            sync_offset_ms,
        }
    }

    /// Recording five known frames and re-reading the file recovers exactly
    /// five entries per data area with matching per-frame metadata and
    /// closing attributes.
    #[tokio::test]
    async fn test_round_trip_five_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.lcps");
        let mut recorder = FrameRecorder::new(RecorderConfig::new(&path));

        recorder
            .start(&[
                ("tool".to_string(), serde_json::json!("observer")),
                (
                    "channels".to_string(),
                    serde_json::json!(["obb", "pointcloud", "status"]),
                ),
            ])
            .unwrap();

        for i in 1..=5 {
            recorder.record(&known_frame(i)).unwrap();
        }
        let summary = recorder
            .stop(Duration::from_secs(5))
            .await
            .unwrap()
            .expect("summary");
        assert_eq!(summary.frame_count, 5);

        let recording = RecordingReader::read(&path).unwrap();
        assert_eq!(recording.frame_count(), 5);
        assert_eq!(recording.frame_ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(recording.obb_data.len(), 5);
        assert_eq!(recording.pointcloud_data.len(), 5);
        assert_eq!(recording.status_data.len(), 5);

        // Keys sort in write order.
        let keys: Vec<&String> = recording.pointcloud_data.keys().collect();
        assert_eq!(keys[0], "frame_000000");
        assert_eq!(keys[4], "frame_000004");

        // Per-frame metadata survives.
        let pc = &recording.pointcloud_data["frame_000002"];
        assert_eq!(pc.reduction_rate, 0.75);
        assert_eq!(pc.original_count, 4);

        let status: serde_json::Value =
            serde_json::from_str(&recording.status_data["frame_000000"]).unwrap();
        assert_eq!(status["state"], "alerting");

        // Closing attributes match.
        let footer = recording.footer.expect("footer");
        assert_eq!(footer.frame_count, 5);
        assert!(footer.bytes_written > 0);

        // Header attributes: scalars stay typed, non-scalars become JSON text.
        assert_eq!(recording.format_version, crate::format::FORMAT_VERSION);
        assert!(recording
            .metadata
            .iter()
            .any(|(k, v)| k == "channels" && matches!(v, MetadataValue::Text(_))));
    }

    #[tokio::test]
    async fn test_round_trip_sync_mode_uncompressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.lcps");

        let mut config = RecorderConfig::new(&path);
        config.async_write = false;
        config.compression = Compression::None;

        let mut recorder = FrameRecorder::new(config);
        recorder.start(&[]).unwrap();
        recorder.record(&known_frame(1)).unwrap();
        recorder.stop(Duration::from_secs(1)).await.unwrap();

        let recording = RecordingReader::read(&path).unwrap();
        assert_eq!(recording.frame_count(), 1);
        assert_eq!(recording.compression, Compression::None);
    }

    #[tokio::test]
    async fn test_absent_channels_leave_gaps_in_their_areas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.lcps");
        let mut recorder = FrameRecorder::new(RecorderConfig::new(&path));

        recorder.start(&[]).unwrap();
        let mut frame = known_frame(1);
        frame.obb = None;
        recorder.record(&frame).unwrap();
        recorder.stop(Duration::from_secs(2)).await.unwrap();

        let recording = RecordingReader::read(&path).unwrap();
        assert_eq!(recording.frame_count(), 1);
        assert!(recording.obb_data.is_empty());
        assert_eq!(recording.pointcloud_data.len(), 1);
    }

    #[test]
    fn test_non_recording_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.lcps");
        std::fs::write(&path, b"definitely not a recording").unwrap();

        assert!(matches!(
            RecordingReader::read(&path),
            Err(RecorderError::BadMagic)
        ));
    }
}
