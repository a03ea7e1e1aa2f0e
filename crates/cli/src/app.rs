//! Observer application - builds the pipeline and drives it.
//!
//! Data flow: orchestrator pull -> synchronizer buffers -> alignment ->
//! recorder queue. The driving loop never blocks on I/O; every read here is
//! non-blocking, and Ctrl-C (or the optional duration limit) triggers the
//! ordered shutdown sequence.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use contracts::ChannelKind;
use ingestion::{ChannelOrchestrator, DownsamplingConfig, ReceiverConfig};
use observability::record_channel_queue_depth;
use recorder::{FrameRecorder, RecorderConfig};
use serde_json::json;
use sync_engine::{StreamSynchronizer, SyncConfig};
use tracing::{error, info, trace, warn};

use crate::cli::Cli;

// Shutdown timeouts: short for the receive path, longer for the recorder's
// drain.
const RECEIVER_STOP_TIMEOUT: Duration = Duration::from_secs(2);
const RECORDER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

// Idle yield between driving-loop sweeps.
const LOOP_INTERVAL: Duration = Duration::from_millis(1);

/// The assembled observer pipeline
pub struct ObserverApp {
    orchestrator: ChannelOrchestrator,
    synchronizer: StreamSynchronizer,
    recorder: Option<FrameRecorder>,
    stats_interval: Duration,
    duration: Option<Duration>,
}

impl ObserverApp {
    /// Construct the pipeline from CLI options.
    pub async fn build(cli: &Cli) -> Result<Self> {
        let mut orchestrator = ChannelOrchestrator::new();

        orchestrator
            .add_obb_channel(
                ReceiverConfig::new(cli.obb).with_queue_capacity(cli.queue_size),
                cli.obb_encoding.into(),
            )
            .await;
        orchestrator
            .add_pointcloud_channel(
                ReceiverConfig::new(cli.pointcloud).with_queue_capacity(cli.queue_size),
                DownsamplingConfig {
                    voxel_size: cli.voxel_size,
                    enabled: !cli.no_downsample,
                },
            )
            .await
            .context("invalid point-cloud channel configuration")?;
        orchestrator
            .add_status_channel(ReceiverConfig::new(cli.status).with_queue_capacity(cli.queue_size))
            .await;

        let synchronizer = StreamSynchronizer::new(SyncConfig {
            window_ms: cli.sync_window_ms,
            buffer_size: cli.buffer_size,
            min_quality: cli.min_quality,
        });

        let recorder = if cli.no_record {
            None
        } else {
            Some(FrameRecorder::new(RecorderConfig::new(&cli.output)))
        };

        Ok(Self {
            orchestrator,
            synchronizer,
            recorder,
            stats_interval: Duration::from_secs(cli.stats_interval.max(1)),
            duration: (cli.duration > 0).then(|| Duration::from_secs(cli.duration)),
        })
    }

    /// Run until Ctrl-C or the configured duration elapses, then shut down.
    pub async fn run(&mut self) -> Result<()> {
        let started = self.startup()?;
        let mut last_stats = Instant::now();

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("interrupt received, shutting down");
                    break;
                }
                _ = tokio::time::sleep(LOOP_INTERVAL) => {}
            }

            self.pump();

            if last_stats.elapsed() >= self.stats_interval {
                self.report_statistics();
                last_stats = Instant::now();
            }

            if let Some(limit) = self.duration {
                if started.elapsed() >= limit {
                    info!(seconds = limit.as_secs(), "duration limit reached");
                    break;
                }
            }
        }

        self.shutdown().await;
        self.final_report(started.elapsed());
        Ok(())
    }

    fn startup(&mut self) -> Result<Instant> {
        let configured = self.orchestrator.channel_count();
        let running = self.orchestrator.start_all();
        if running == 0 {
            bail!("no channels could be started");
        }
        if running < configured {
            warn!(running, configured, "some channels failed to start");
        }

        if let Some(recorder) = &mut self.recorder {
            let channels: Vec<&str> = self
                .orchestrator
                .channel_kinds()
                .iter()
                .map(ChannelKind::as_str)
                .collect();
            let metadata = [
                ("tool".to_string(), json!("lcps-observer")),
                ("version".to_string(), json!(env!("CARGO_PKG_VERSION"))),
                ("channels".to_string(), json!(channels)),
            ];
            recorder
                .start(&metadata)
                .context("failed to start recording")?;
        }

        info!("observer running; press Ctrl-C to stop");
        Ok(Instant::now())
    }

    /// One sweep: drain fresh messages into the synchronizer, then try to
    /// align and record the latest frame.
    fn pump(&mut self) {
        for (kind, message) in self.orchestrator.pull_all() {
            let Some(message) = message else { continue };

            // Legacy OBB messages carry no timestamp and cannot be aligned.
            if message.timestamp.is_none() {
                trace!(channel = %kind, "skipping message without timestamp");
                continue;
            }

            if let Err(e) = self.synchronizer.add(kind, message) {
                warn!(channel = %kind, error = %e, "synchronizer rejected message");
            }
        }

        if let Some(frame) = self.synchronizer.latest_frame() {
            trace!(
                frame_id = frame.frame_id,
                quality = frame.sync_quality,
                "frame aligned"
            );
            if let Some(recorder) = &mut self.recorder {
                if let Err(e) = recorder.record(&frame) {
                    error!(frame_id = frame.frame_id, error = %e, "record failed");
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        let stopped = self.orchestrator.stop_all(RECEIVER_STOP_TIMEOUT).await;
        info!(stopped, "receivers stopped");

        if let Some(recorder) = &mut self.recorder {
            match recorder.stop(RECORDER_STOP_TIMEOUT).await {
                Ok(Some(summary)) => info!(
                    frames = summary.frame_count,
                    bytes = summary.bytes_written,
                    path = %summary.output_path.display(),
                    "recording closed"
                ),
                Ok(None) => {}
                Err(e) => error!(error = %e, "recorder shutdown failed"),
            }
        }
    }

    fn report_statistics(&self) {
        let channel_stats = self.orchestrator.aggregate_statistics();
        for kind in ChannelKind::ALL {
            let Some(stats) = channel_stats.get(&kind) else {
                continue;
            };
            record_channel_queue_depth(kind, stats.queue_depth);
            info!(
                channel = %kind,
                received = stats.received_count,
                errors = stats.error_count,
                dropped = stats.dropped_count,
                queue = stats.queue_depth,
                "channel statistics"
            );
        }

        let sync = self.synchronizer.statistics();
        info!(
            frames = sync.frame_count,
            success_rate = format_args!("{:.1}%", sync.success_rate),
            avg_offset_ms = format_args!("{:.2}", sync.avg_offset_ms),
            buffers = ?sync.buffer_depths,
            "synchronizer statistics"
        );

        if let Some(recorder) = &self.recorder {
            let stats = recorder.statistics();
            info!(
                frames = stats.frames_recorded,
                dropped = stats.dropped_frames,
                queue = stats.queue_depth,
                "recorder statistics"
            );
        }
    }

    fn final_report(&self, elapsed: Duration) {
        let sync = self.synchronizer.statistics();
        let elapsed_s = elapsed.as_secs_f64();

        println!();
        println!("==================== Final Statistics ====================");
        println!(
            " Runtime: {:.1}s | Synced frames: {} | {:.1} fps",
            elapsed_s,
            sync.frame_count,
            if elapsed_s > 0.0 {
                sync.frame_count as f64 / elapsed_s
            } else {
                0.0
            }
        );

        println!(" Channels:");
        let channel_stats = self.orchestrator.aggregate_statistics();
        for kind in ChannelKind::ALL {
            if let Some(stats) = channel_stats.get(&kind) {
                println!(
                    "   {:<12} messages {:>7}  errors {:>5}  dropped {:>5}",
                    kind.as_str(),
                    stats.received_count,
                    stats.error_count,
                    stats.dropped_count
                );
                if let Some(ds) = &stats.downsampling {
                    println!(
                        "   {:<12} reduction {:.1}% ({} -> {} points)",
                        "",
                        ds.avg_reduction_rate() * 100.0,
                        ds.total_points_received,
                        ds.total_points_after
                    );
                }
            }
        }

        println!(
            " Synchronizer: success {} | failed {} | rate {:.1}% | avg offset {:.2}ms",
            sync.success_count, sync.fail_count, sync.success_rate, sync.avg_offset_ms
        );

        if let Some(recorder) = &self.recorder {
            let stats = recorder.statistics();
            println!(
                " Recorder: {} frames written, {} dropped -> {}",
                stats.frames_recorded,
                stats.dropped_frames,
                stats.output_path.display()
            );
        }
        println!("===========================================================");
    }
}
