//! Frame store - owns the backing file between `start` and `stop`.
//!
//! Exactly one context holds a `FrameStore` at a time (the recorder itself in
//! synchronous mode, the writer task in asynchronous mode), which is what
//! enforces the single-writer invariant on the file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use contracts::SyncedFrame;
use observability::record_frame_recorded;
use tracing::debug;

use crate::error::Result;
use crate::format::{
    write_record, Compression, FooterRecord, FrameRecord, HeaderRecord, PointCloudRecord, Record,
    FORMAT_VERSION, MAGIC,
};
use crate::recorder::{RecorderConfig, RecorderShared, RecordingSummary};

pub(crate) struct FrameStore {
    writer: BufWriter<File>,
    path: PathBuf,
    compression: Compression,
    flush_interval: u64,
    frame_count: u64,
    bytes_written: u64,
    started_at: Instant,
    shared: Arc<RecorderShared>,
}

impl FrameStore {
    /// Create the backing file (truncating any existing file at the path) and
    /// write the magic plus header attributes.
    pub fn create(
        config: &RecorderConfig,
        metadata: &[(String, serde_json::Value)],
        shared: Arc<RecorderShared>,
    ) -> Result<Self> {
        if let Some(parent) = config.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&config.output_path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&MAGIC)?;
        let mut bytes_written = MAGIC.len() as u64;

        let mut attrs: Vec<(String, crate::format::MetadataValue)> = metadata
            .iter()
            .map(|(key, value)| (key.clone(), value.into()))
            .collect();
        attrs.sort_by(|a, b| a.0.cmp(&b.0));

        let header = HeaderRecord {
            created_at: chrono::Utc::now().to_rfc3339(),
            format_version: FORMAT_VERSION.to_string(),
            compression: config.compression,
            metadata: attrs,
        };
        // The header stays uncompressed so readers can discover the compression.
        bytes_written += write_record(&mut writer, &Record::Header(header), Compression::None)?;

        debug!(path = %config.output_path.display(), "recording file created");

        Ok(Self {
            writer,
            path: config.output_path.clone(),
            compression: config.compression,
            flush_interval: config.flush_interval.max(1),
            frame_count: 0,
            bytes_written,
            started_at: Instant::now(),
            shared,
        })
    }

    /// Append one frame; flushes durability every `flush_interval` frames.
    pub fn write_frame(&mut self, frame: &SyncedFrame) -> Result<()> {
        let record = FrameRecord {
            index: self.frame_count as u32,
            timestamp: frame.timestamp,
            frame_id: frame.frame_id as u32,
            obb: frame
                .obb
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| crate::error::RecorderError::Encode(e.to_string()))?,
            pointcloud: frame.pointcloud.as_ref().map(|pc| PointCloudRecord {
                points: pc.points.clone(),
                original_count: pc.original_count,
                downsampled_count: pc.downsampled_count,
                reduction_rate: pc.reduction_rate,
            }),
            status: frame
                .status
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| crate::error::RecorderError::Encode(e.to_string()))?,
        };

        self.bytes_written += write_record(&mut self.writer, &Record::Frame(record), self.compression)?;
        self.frame_count += 1;
        self.shared
            .frames_recorded
            .store(self.frame_count, Ordering::Relaxed);
        record_frame_recorded();

        if self.frame_count % self.flush_interval == 0 {
            self.flush()?;
        }
        Ok(())
    }

    /// Force buffered data to durable storage.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Write the closing attributes, flush and close the file.
    pub fn finalize(mut self) -> Result<RecordingSummary> {
        let duration_seconds = self.started_at.elapsed().as_secs_f64();
        let footer = FooterRecord {
            frame_count: self.frame_count,
            duration_seconds,
            bytes_written: self.bytes_written,
        };
        write_record(&mut self.writer, &Record::Footer(footer), self.compression)?;

        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        Ok(RecordingSummary {
            frame_count: self.frame_count,
            duration_seconds,
            bytes_written: self.bytes_written,
            output_path: self.path,
        })
    }
}
