//! # Integration Tests
//!
//! Cross-crate end-to-end tests over loopback UDP, without the live
//! perception system:
//! - mock senders -> orchestrator -> synchronizer -> recorder -> reader
//! - receiver statistics under mixed valid/invalid traffic

#[cfg(test)]
mod e2e_tests {
    use std::net::SocketAddr;
    use std::time::{Duration, Instant};

    use contracts::ChannelKind;
    use ingestion::{
        ChannelOrchestrator, DownsamplingConfig, MockChannelSender, ObbEncoding, ReceiverConfig,
    };
    use recorder::{FrameRecorder, RecorderConfig, RecordingReader};
    use sync_engine::{StreamSynchronizer, SyncConfig};

    fn free_local_addr() -> SocketAddr {
        let probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    }

    async fn build_orchestrator(
        obb: SocketAddr,
        pointcloud: SocketAddr,
        status: SocketAddr,
    ) -> ChannelOrchestrator {
        let mut orchestrator = ChannelOrchestrator::new();
        orchestrator
            .add_obb_channel(ReceiverConfig::new(obb), ObbEncoding::Json)
            .await;
        orchestrator
            .add_pointcloud_channel(
                ReceiverConfig::new(pointcloud),
                DownsamplingConfig::default(),
            )
            .await
            .unwrap();
        orchestrator
            .add_status_channel(ReceiverConfig::new(status))
            .await;
        orchestrator
    }

    /// End-to-end scenario: three mock senders publish 10 messages each at
    /// 20 Hz with near-identical timestamps; driving the pipeline for ~2s
    /// yields at least one recorded frame, and the recorded frame count never
    /// exceeds the synchronizer's success count.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_full_pipeline_records_aligned_frames() {
        let (obb_addr, pc_addr, status_addr) =
            (free_local_addr(), free_local_addr(), free_local_addr());

        let mut orchestrator = build_orchestrator(obb_addr, pc_addr, status_addr).await;
        let mut synchronizer = StreamSynchronizer::new(SyncConfig::default());

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("e2e.lcps");
        let mut recorder = FrameRecorder::new(RecorderConfig::new(&output));

        assert_eq!(orchestrator.start_all(), 3);
        recorder
            .start(&[("scenario".to_string(), serde_json::json!("e2e"))])
            .unwrap();

        // Give the receivers a moment to bind before the senders start.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut senders = vec![
            MockChannelSender::obb(obb_addr, 20.0).with_limit(10),
            MockChannelSender::pointcloud(pc_addr, 20.0).with_limit(10),
            MockChannelSender::status(status_addr, 20.0).with_limit(10),
        ];
        for sender in &mut senders {
            sender.start();
        }

        // Driving loop: pull -> buffer -> align -> record.
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut recorded = 0u64;
        while Instant::now() < deadline {
            for (kind, message) in orchestrator.pull_all() {
                if let Some(message) = message {
                    synchronizer.add(kind, message).unwrap();
                }
            }
            if let Some(frame) = synchronizer.latest_frame() {
                recorder.record(&frame).unwrap();
                recorded += 1;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        for sender in &mut senders {
            sender.stop().await;
        }
        assert_eq!(orchestrator.stop_all(Duration::from_secs(2)).await, 3);
        let summary = recorder
            .stop(Duration::from_secs(5))
            .await
            .unwrap()
            .expect("recording summary");

        let sync_stats = synchronizer.statistics();
        assert!(recorded >= 1, "expected at least one aligned frame");
        assert!(summary.frame_count <= sync_stats.success_count);
        assert_eq!(summary.frame_count + recorder.statistics().dropped_frames, recorded);

        // The recording reads back with one entry per present channel.
        let recording = RecordingReader::read(&output).unwrap();
        assert_eq!(recording.frame_count() as u64, summary.frame_count);
        assert_eq!(recording.footer.unwrap().frame_count, summary.frame_count);
        assert!(!recording.pointcloud_data.is_empty());

        // Frame ids are strictly increasing in write order.
        assert!(recording.frame_ids.windows(2).all(|w| w[0] < w[1]));
    }

    /// Receivers keep running through malformed traffic; errors land in the
    /// statistics instead of killing the channel.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_malformed_traffic_is_counted_not_fatal() {
        let status_addr = free_local_addr();

        let mut orchestrator = ChannelOrchestrator::new();
        orchestrator
            .add_status_channel(ReceiverConfig::new(status_addr))
            .await;
        orchestrator.start_all();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(b"garbage", status_addr).await.unwrap();
        socket
            .send_to(
                br#"{"state": "detecting", "timestamp": 1.5}"#,
                status_addr,
            )
            .await
            .unwrap();

        // Wait for both datagrams to be processed (the bad one backs off briefly).
        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            let stats = orchestrator.aggregate_statistics()[&ChannelKind::Status].clone();
            if stats.received_count >= 1 && stats.error_count >= 1 {
                break;
            }
            assert!(Instant::now() < deadline, "receiver never caught up");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert!(orchestrator.is_running(ChannelKind::Status));
        let message = orchestrator.try_pull(ChannelKind::Status).unwrap();
        assert_eq!(message.timestamp, Some(1.5));

        orchestrator.stop_all(Duration::from_secs(2)).await;
    }
}
