//! FrameRecorder - asynchronous single-writer frame sink.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};
use contracts::SyncedFrame;
use observability::record_recorder_drop;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{RecorderError, Result};
use crate::format::Compression;
use crate::store::FrameStore;

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Output file path (truncated on `start`)
    pub output_path: PathBuf,

    /// Record-stream compression
    pub compression: Compression,

    /// Durability flush cadence, in frames
    pub flush_interval: u64,

    /// Write asynchronously through a dedicated writer task
    pub async_write: bool,

    /// Writer queue capacity (async mode)
    pub queue_capacity: usize,
}

impl RecorderConfig {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            compression: Compression::default(),
            flush_interval: 100,
            async_write: true,
            queue_capacity: 200,
        }
    }
}

/// Counters shared with the writer context.
///
/// Written by a single context each; concurrent reads are eventually
/// consistent, which is acceptable for statistics.
#[derive(Debug, Default)]
pub(crate) struct RecorderShared {
    pub recording: AtomicBool,
    pub frames_recorded: AtomicU64,
    pub dropped_frames: AtomicU64,
}

enum ActiveRecording {
    /// Synchronous mode: the recorder itself owns the file
    Sync(FrameStore),
    /// Asynchronous mode: a writer task owns the file and drains the queue
    Async {
        tx: Sender<SyncedFrame>,
        task: JoinHandle<FrameStore>,
    },
}

/// Durable sink for synchronized frames
///
/// State machine: Idle -> Recording -> Idle. `start` fails while recording,
/// `stop` while idle is a no-op, and `record` while idle is a usage error.
pub struct FrameRecorder {
    config: RecorderConfig,
    active: Option<ActiveRecording>,
    shared: Arc<RecorderShared>,
}

impl FrameRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            active: None,
            shared: Arc::new(RecorderShared::default()),
        }
    }

    /// True while a recording session is open.
    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Open the backing file and begin a recording session.
    ///
    /// Writes the header attributes (creation timestamp, format version,
    /// compression) plus the caller-supplied metadata; non-scalar values are
    /// serialized to JSON text before storage. In async mode this also starts
    /// the dedicated writer task.
    #[instrument(name = "recorder_start", skip(self, metadata))]
    pub fn start(&mut self, metadata: &[(String, serde_json::Value)]) -> Result<()> {
        if self.active.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        let store = FrameStore::create(&self.config, metadata, Arc::clone(&self.shared))?;
        self.shared.frames_recorded.store(0, Ordering::Relaxed);
        self.shared.dropped_frames.store(0, Ordering::Relaxed);
        self.shared.recording.store(true, Ordering::Relaxed);

        self.active = Some(if self.config.async_write {
            let (tx, rx) = async_channel::bounded(self.config.queue_capacity.max(1));
            let task = tokio::spawn(writer_loop(store, rx));
            ActiveRecording::Async { tx, task }
        } else {
            ActiveRecording::Sync(store)
        });

        info!(
            path = %self.config.output_path.display(),
            async_write = self.config.async_write,
            compression = self.config.compression.as_str(),
            "recording started"
        );
        Ok(())
    }

    /// Record one frame.
    ///
    /// Synchronous mode writes immediately. Asynchronous mode enqueues without
    /// blocking; when the queue is full the incoming frame is dropped with a
    /// warning - recording never blocks the producer. Calling this while idle
    /// is a usage error.
    pub fn record(&mut self, frame: &SyncedFrame) -> Result<()> {
        match self.active.as_mut() {
            None => Err(RecorderError::NotRecording),

            Some(ActiveRecording::Sync(store)) => store.write_frame(frame),

            Some(ActiveRecording::Async { tx, .. }) => match tx.try_send(frame.clone()) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    self.shared.dropped_frames.fetch_add(1, Ordering::Relaxed);
                    record_recorder_drop();
                    warn!(frame_id = frame.frame_id, "recorder queue full, frame dropped");
                    Ok(())
                }
                Err(TrySendError::Closed(_)) => {
                    Err(RecorderError::WriterFailed("writer queue closed".to_string()))
                }
            },
        }
    }

    /// Close the recording session.
    ///
    /// Signals the writer, waits up to `timeout` for it to drain the queue,
    /// then writes the closing attributes and closes the file. If the writer
    /// does not finish in time the file is closed anyway: data already flushed
    /// is preserved, anything still queued is lost (and logged).
    ///
    /// Returns the session summary, or `Ok(None)` when idle or when the
    /// writer had to be abandoned.
    #[instrument(name = "recorder_stop", skip(self))]
    pub async fn stop(&mut self, timeout: Duration) -> Result<Option<RecordingSummary>> {
        let Some(active) = self.active.take() else {
            debug!("stop while idle is a no-op");
            return Ok(None);
        };
        self.shared.recording.store(false, Ordering::Relaxed);

        let summary = match active {
            ActiveRecording::Sync(store) => Some(store.finalize()?),

            ActiveRecording::Async { tx, task } => {
                // Closing the queue is the stop signal; the writer drains what
                // is already enqueued before exiting.
                drop(tx);

                let abort = task.abort_handle();
                match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(store)) => Some(store.finalize()?),
                    Ok(Err(e)) => {
                        error!(error = %e, "writer task panicked");
                        return Err(RecorderError::WriterFailed(e.to_string()));
                    }
                    Err(_) => {
                        abort.abort();
                        warn!(
                            "writer did not finish within {:?}; closing file, queued frames lost",
                            timeout
                        );
                        None
                    }
                }
            }
        };

        if let Some(summary) = &summary {
            info!(
                frames = summary.frame_count,
                duration_s = summary.duration_seconds,
                bytes = summary.bytes_written,
                "recording stopped"
            );
        }
        Ok(summary)
    }

    /// Eventually-consistent statistics snapshot.
    pub fn statistics(&self) -> RecorderStatistics {
        RecorderStatistics {
            recording: self.shared.recording.load(Ordering::Relaxed),
            frames_recorded: self.shared.frames_recorded.load(Ordering::Relaxed),
            dropped_frames: self.shared.dropped_frames.load(Ordering::Relaxed),
            queue_depth: match &self.active {
                Some(ActiveRecording::Async { tx, .. }) => tx.len(),
                _ => 0,
            },
            output_path: self.config.output_path.clone(),
        }
    }
}

/// Writer task: drains the queue and appends frames until the queue closes.
///
/// Write failures are logged and contained; they never terminate the writer.
async fn writer_loop(mut store: FrameStore, rx: Receiver<SyncedFrame>) -> FrameStore {
    debug!("recorder writer started");

    // recv() keeps yielding already-queued frames after the sender is
    // dropped, so the queue is fully drained before the loop ends.
    while let Ok(frame) = rx.recv().await {
        if let Err(e) = store.write_frame(&frame) {
            error!(frame_id = frame.frame_id, error = %e, "frame write failed");
        }
    }

    debug!("recorder writer drained and exiting");
    store
}

/// Summary of a closed recording session
#[derive(Debug, Clone)]
pub struct RecordingSummary {
    pub frame_count: u64,
    pub duration_seconds: f64,
    pub bytes_written: u64,
    pub output_path: PathBuf,
}

/// Recorder statistics snapshot
#[derive(Debug, Clone)]
pub struct RecorderStatistics {
    pub recording: bool,
    pub frames_recorded: u64,
    pub dropped_frames: u64,
    pub queue_depth: usize,
    pub output_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ChannelKind, ObbSet, PointCloudSet, StatusReport, SystemState};
    use std::collections::HashMap;

    fn test_frame(frame_id: u64) -> SyncedFrame {
        let mut sync_offset_ms = HashMap::new();
        sync_offset_ms.insert(ChannelKind::PointCloud, 5.0);

        SyncedFrame {
            timestamp: 100.0 + frame_id as f64 * 0.05,
            frame_id,
            obb: Some(ObbSet::default()),
            pointcloud: Some(PointCloudSet {
                points: vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
                frame_id: Some(frame_id),
                original_count: 8,
                downsampled_count: 2,
                reduction_rate: 0.75,
            }),
            status: Some(StatusReport {
                state: SystemState::Detecting,
                state_raw: "detecting".to_string(),
                frame_id: Some(frame_id),
                metrics: serde_json::json!({"fps": 20.0}),
                detection: serde_json::json!({"safe": true}),
            }),
            sync_quality: 0.9,
            sync_offset_ms,
        }
    }

    #[tokio::test]
    async fn test_record_before_start_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = FrameRecorder::new(RecorderConfig::new(dir.path().join("out.lcps")));

        assert!(matches!(
            recorder.record(&test_frame(1)),
            Err(RecorderError::NotRecording)
        ));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = FrameRecorder::new(RecorderConfig::new(dir.path().join("out.lcps")));

        recorder.start(&[]).unwrap();
        assert!(matches!(
            recorder.start(&[]),
            Err(RecorderError::AlreadyRecording)
        ));
        recorder.stop(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = FrameRecorder::new(RecorderConfig::new(dir.path().join("out.lcps")));

        let summary = recorder.stop(Duration::from_millis(100)).await.unwrap();
        assert!(summary.is_none());
    }

    #[tokio::test]
    async fn test_async_session_produces_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = FrameRecorder::new(RecorderConfig::new(dir.path().join("out.lcps")));

        recorder
            .start(&[("operator".to_string(), serde_json::json!("test"))])
            .unwrap();
        assert!(recorder.is_recording());

        for i in 1..=3 {
            recorder.record(&test_frame(i)).unwrap();
        }

        let summary = recorder
            .stop(Duration::from_secs(5))
            .await
            .unwrap()
            .expect("summary");
        assert_eq!(summary.frame_count, 3);
        assert!(summary.bytes_written > 0);
        assert!(!recorder.is_recording());
        assert_eq!(recorder.statistics().frames_recorded, 3);
    }
}
