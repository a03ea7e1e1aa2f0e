//! Mock channel senders
//!
//! Publish synthetic wire messages over loopback UDP, for tests and demos
//! without the live perception system.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::ChannelKind;
use serde_json::json;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::unix_timestamp;

/// Mock sender configuration
#[derive(Debug, Clone)]
pub struct MockSenderConfig {
    /// Receiver address to publish to
    pub target: SocketAddr,

    /// Channel whose wire format to produce
    pub channel: ChannelKind,

    /// Publish rate (Hz)
    pub frequency_hz: f64,

    /// Stop after this many messages (None = until stopped)
    pub message_limit: Option<u64>,

    /// Points per synthetic cloud (PointCloud channel only)
    pub cloud_points: usize,
}

impl MockSenderConfig {
    pub fn new(target: SocketAddr, channel: ChannelKind) -> Self {
        Self {
            target,
            channel,
            frequency_hz: 20.0,
            message_limit: None,
            cloud_points: 64,
        }
    }
}

/// Synthetic publisher for one channel
pub struct MockChannelSender {
    config: MockSenderConfig,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl MockChannelSender {
    pub fn new(config: MockSenderConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Enveloped-JSON OBB publisher.
    pub fn obb(target: SocketAddr, frequency_hz: f64) -> Self {
        Self::new(MockSenderConfig {
            frequency_hz,
            ..MockSenderConfig::new(target, ChannelKind::Obb)
        })
    }

    /// Point-cloud publisher.
    pub fn pointcloud(target: SocketAddr, frequency_hz: f64) -> Self {
        Self::new(MockSenderConfig {
            frequency_hz,
            ..MockSenderConfig::new(target, ChannelKind::PointCloud)
        })
    }

    /// Status publisher.
    pub fn status(target: SocketAddr, frequency_hz: f64) -> Self {
        Self::new(MockSenderConfig {
            frequency_hz,
            ..MockSenderConfig::new(target, ChannelKind::Status)
        })
    }

    /// Cap the number of messages published.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.config.message_limit = Some(limit);
        self
    }

    /// Start publishing.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        self.task = Some(tokio::spawn(publish_loop(config, running)));
    }

    /// Stop publishing and wait for the task to finish.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn publish_loop(config: MockSenderConfig, running: Arc<AtomicBool>) {
    let socket = match UdpSocket::bind("127.0.0.1:0").await {
        Ok(socket) => socket,
        Err(e) => {
            debug!(error = %e, "mock sender could not bind");
            return;
        }
    };

    let period = Duration::from_secs_f64(1.0 / config.frequency_hz.max(0.001));
    let mut sent: u64 = 0;

    debug!(channel = %config.channel, target = %config.target, "mock sender started");

    while running.load(Ordering::Relaxed) {
        if let Some(limit) = config.message_limit {
            if sent >= limit {
                break;
            }
        }

        let payload = build_payload(&config, sent);
        if let Err(e) = socket.send_to(payload.as_bytes(), config.target).await {
            debug!(channel = %config.channel, error = %e, "mock send failed");
        } else {
            trace!(channel = %config.channel, seq = sent, "mock message sent");
        }

        sent += 1;
        tokio::time::sleep(period).await;
    }

    debug!(channel = %config.channel, sent, "mock sender finished");
}

fn build_payload(config: &MockSenderConfig, seq: u64) -> String {
    let timestamp = unix_timestamp();

    let value = match config.channel {
        ChannelKind::Obb => json!({
            "header": {
                "timestamp": timestamp,
                "seq_id": (seq as i64),
                "source": "mock",
            },
            "payload": {
                "obbs": [
                    {
                        "type": "obs",
                        "position": [0.0, 0.0, 0.0],
                        "rotation": [1.0, 0.0, 0.0, 0.0],
                        "size": [5.0, 5.0, 5.0],
                        "collision_status": 0,
                    },
                    {
                        "type": "sprWarn",
                        "position": [2.0, 2.0, 2.0],
                        "rotation": [1.0, 0.0, 0.0, 0.0],
                        "size": [1.0, 1.0, 1.0],
                        "collision_status": ((seq % 2) as u8),
                    },
                ],
            },
        }),

        ChannelKind::PointCloud => {
            // Deterministic ring of points; enough spread to survive downsampling.
            let points: Vec<[f64; 3]> = (0..config.cloud_points)
                .map(|i| {
                    let angle = i as f64 / config.cloud_points.max(1) as f64
                        * std::f64::consts::TAU;
                    [angle.cos() * 5.0, angle.sin() * 5.0, (i % 8) as f64 * 0.25]
                })
                .collect();
            json!({
                "points": points,
                "timestamp": timestamp,
                "frame_id": seq,
            })
        }

        ChannelKind::Status => json!({
            "state": if seq % 5 == 4 { "alerting" } else { "detecting" },
            "timestamp": timestamp,
            "frame_id": seq,
            "metrics": {
                "fps": 20.0,
                "latency_ms": 12.5,
                "cpu_usage": 37.0,
            },
            "detection": {
                "obb_count": 2,
                "collision_count": (seq % 2),
                "safe": (seq % 2 == 0),
            },
        }),
    };

    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_match_the_wire_formats() {
        let config = MockSenderConfig::new("127.0.0.1:9".parse().unwrap(), ChannelKind::Obb);
        let value: serde_json::Value =
            serde_json::from_str(&build_payload(&config, 3)).unwrap();
        assert!(value["header"]["timestamp"].is_f64());
        assert_eq!(value["payload"]["obbs"].as_array().unwrap().len(), 2);

        let config = MockSenderConfig::new("127.0.0.1:9".parse().unwrap(), ChannelKind::PointCloud);
        let value: serde_json::Value =
            serde_json::from_str(&build_payload(&config, 0)).unwrap();
        assert_eq!(value["points"].as_array().unwrap().len(), 64);
        assert_eq!(value["points"][0].as_array().unwrap().len(), 3);

        let config = MockSenderConfig::new("127.0.0.1:9".parse().unwrap(), ChannelKind::Status);
        let value: serde_json::Value =
            serde_json::from_str(&build_payload(&config, 4)).unwrap();
        assert_eq!(value["state"], "alerting");
    }
}
