//! Channel orchestrator
//!
//! Owns the named channel receivers and provides uniform lifecycle control
//! and aggregated read access.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use contracts::{ChannelKind, ChannelMessage};
use tracing::{info, instrument, warn};

use crate::config::{ChannelStatistics, ReceiverConfig};
use crate::decoders::{DownsamplingConfig, ObbDecoder, ObbEncoding, PointCloudDecoder, StatusDecoder};
use crate::error::Result;
use crate::receiver::ChannelReceiver;

// How long a replaced channel gets to wind down before being discarded.
const REPLACE_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Orchestrates the three channel receivers
#[derive(Default)]
pub struct ChannelOrchestrator {
    channels: HashMap<ChannelKind, ChannelReceiver>,
}

impl ChannelOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the OBB channel. Replaces (and stops) an existing one.
    pub async fn add_obb_channel(&mut self, config: ReceiverConfig, encoding: ObbEncoding) {
        let receiver = ChannelReceiver::new(config, Arc::new(ObbDecoder::new(encoding)));
        self.install(receiver).await;
    }

    /// Configure the PointCloud channel. Replaces (and stops) an existing one.
    ///
    /// Fails only on an invalid voxel size.
    pub async fn add_pointcloud_channel(
        &mut self,
        config: ReceiverConfig,
        downsampling: DownsamplingConfig,
    ) -> Result<()> {
        let decoder = PointCloudDecoder::new(downsampling)?;
        let receiver = ChannelReceiver::new(config, Arc::new(decoder));
        self.install(receiver).await;
        Ok(())
    }

    /// Configure the Status channel. Replaces (and stops) an existing one.
    pub async fn add_status_channel(&mut self, config: ReceiverConfig) {
        let receiver = ChannelReceiver::new(config, Arc::new(StatusDecoder::new()));
        self.install(receiver).await;
    }

    async fn install(&mut self, receiver: ChannelReceiver) {
        let kind = receiver.kind();
        if let Some(mut previous) = self.channels.remove(&kind) {
            warn!(channel = %kind, "channel already configured, replacing");
            previous.stop(REPLACE_STOP_TIMEOUT).await;
        }
        self.channels.insert(kind, receiver);
    }

    /// Start every configured channel. Returns how many are running afterwards.
    #[instrument(name = "orchestrator_start_all", skip(self))]
    pub fn start_all(&mut self) -> usize {
        if self.channels.is_empty() {
            warn!("no channels configured");
            return 0;
        }

        for receiver in self.channels.values_mut() {
            receiver.start();
        }

        let running = self.channels.values().filter(|r| r.is_running()).count();
        info!(
            started = running,
            configured = self.channels.len(),
            "channels started"
        );
        running
    }

    /// Stop every channel, best-effort. Returns how many stopped cleanly.
    ///
    /// One channel failing to wind down in time does not block the others;
    /// its socket is released regardless.
    #[instrument(name = "orchestrator_stop_all", skip(self))]
    pub async fn stop_all(&mut self, timeout: Duration) -> usize {
        let mut clean = 0;
        for receiver in self.channels.values_mut() {
            if receiver.stop(timeout).await {
                clean += 1;
            }
        }
        info!(
            stopped = clean,
            configured = self.channels.len(),
            "channels stopped"
        );
        clean
    }

    /// Non-blocking pull from one channel.
    pub fn try_pull(&self, kind: ChannelKind) -> Option<ChannelMessage> {
        self.channels.get(&kind).and_then(|r| r.try_pull())
    }

    /// One non-blocking sweep across all configured channels.
    pub fn pull_all(&self) -> HashMap<ChannelKind, Option<ChannelMessage>> {
        self.channels
            .iter()
            .map(|(kind, receiver)| (*kind, receiver.try_pull()))
            .collect()
    }

    /// Statistics for every configured channel, including channel-specific
    /// extensions (downsampling summary, state distribution).
    pub fn aggregate_statistics(&self) -> HashMap<ChannelKind, ChannelStatistics> {
        self.channels
            .iter()
            .map(|(kind, receiver)| (*kind, receiver.statistics()))
            .collect()
    }

    /// True iff the channel is configured and its ingestion task is alive.
    pub fn is_running(&self, kind: ChannelKind) -> bool {
        self.channels
            .get(&kind)
            .map(|r| r.is_running())
            .unwrap_or(false)
    }

    /// Configured channel kinds, in canonical order.
    pub fn channel_kinds(&self) -> Vec<ChannelKind> {
        ChannelKind::ALL
            .into_iter()
            .filter(|kind| self.channels.contains_key(kind))
            .collect()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_local_addr() -> std::net::SocketAddr {
        let probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_over_all_channels() {
        let mut orchestrator = ChannelOrchestrator::new();
        orchestrator
            .add_obb_channel(ReceiverConfig::new(free_local_addr()), ObbEncoding::Json)
            .await;
        orchestrator
            .add_pointcloud_channel(
                ReceiverConfig::new(free_local_addr()),
                DownsamplingConfig::default(),
            )
            .await
            .unwrap();
        orchestrator
            .add_status_channel(ReceiverConfig::new(free_local_addr()))
            .await;

        assert_eq!(orchestrator.channel_count(), 3);
        assert_eq!(orchestrator.start_all(), 3);
        assert!(orchestrator.is_running(ChannelKind::Obb));

        let sweep = orchestrator.pull_all();
        assert_eq!(sweep.len(), 3);
        assert!(sweep.values().all(|m| m.is_none()));

        let stats = orchestrator.aggregate_statistics();
        assert!(stats[&ChannelKind::PointCloud].downsampling.is_some());
        assert!(stats[&ChannelKind::Status].states.is_some());
        assert!(stats[&ChannelKind::Obb].downsampling.is_none());

        assert_eq!(orchestrator.stop_all(Duration::from_secs(2)).await, 3);
        assert!(!orchestrator.is_running(ChannelKind::Obb));
    }

    #[tokio::test]
    async fn test_invalid_voxel_size_is_rejected() {
        let mut orchestrator = ChannelOrchestrator::new();
        let result = orchestrator
            .add_pointcloud_channel(
                ReceiverConfig::new(free_local_addr()),
                DownsamplingConfig {
                    voxel_size: -0.5,
                    enabled: true,
                },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(orchestrator.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_replacing_a_channel_stops_the_old_one() {
        let mut orchestrator = ChannelOrchestrator::new();
        orchestrator
            .add_status_channel(ReceiverConfig::new(free_local_addr()))
            .await;
        orchestrator.start_all();
        assert!(orchestrator.is_running(ChannelKind::Status));

        // Replacement lands stopped; the old receiver is wound down first.
        orchestrator
            .add_status_channel(ReceiverConfig::new(free_local_addr()))
            .await;
        assert_eq!(orchestrator.channel_count(), 1);
        assert!(!orchestrator.is_running(ChannelKind::Status));

        orchestrator.stop_all(Duration::from_secs(1)).await;
    }
}
