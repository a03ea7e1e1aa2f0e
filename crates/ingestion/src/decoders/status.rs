//! Status channel decoder
//!
//! Decodes `{state, timestamp, frame_id, metrics{}, detection{}}`. State
//! strings that do not match a known state map to `Unknown` and are still
//! counted in the per-state distribution.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use contracts::{ChannelKind, ChannelMessage, ChannelPayload, StatusReport, SystemState};
use serde::Deserialize;
use serde_json::Value;

use crate::config::StateDistribution;
use crate::decoder::{ChannelDecoder, DecodeError};

#[derive(Debug, Deserialize)]
struct StatusWire {
    state: String,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    frame_id: Option<u64>,
    #[serde(default)]
    metrics: Option<Value>,
    #[serde(default)]
    detection: Option<Value>,
}

/// Decoder for the Status channel
#[derive(Debug, Default)]
pub struct StatusDecoder {
    // One slot per SystemState, in SystemState::ALL order.
    state_counts: [AtomicU64; 5],
}

impl StatusDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn count_state(&self, state: SystemState) {
        let idx = SystemState::ALL
            .iter()
            .position(|s| *s == state)
            .unwrap_or(SystemState::ALL.len() - 1);
        self.state_counts[idx].fetch_add(1, Ordering::Relaxed);
    }
}

impl ChannelDecoder for StatusDecoder {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Status
    }

    fn decode(&self, raw: Bytes) -> Result<ChannelMessage, DecodeError> {
        let wire: StatusWire = serde_json::from_slice(&raw).map_err(|e| DecodeError::Malformed {
            channel: ChannelKind::Status,
            detail: format!("invalid status message: {e}"),
        })?;

        let state = SystemState::parse(&wire.state);
        self.count_state(state);

        Ok(ChannelMessage {
            timestamp: Some(wire.timestamp.unwrap_or(0.0)),
            sequence_id: None,
            source: None,
            payload: ChannelPayload::Status(StatusReport {
                state,
                state_raw: wire.state,
                frame_id: wire.frame_id,
                metrics: wire.metrics.unwrap_or_else(|| Value::Object(Default::default())),
                detection: wire
                    .detection
                    .unwrap_or_else(|| Value::Object(Default::default())),
            }),
        })
    }

    fn state_statistics(&self) -> Option<StateDistribution> {
        let mut distribution = StateDistribution::default();
        for (state, counter) in SystemState::ALL.iter().zip(self.state_counts.iter()) {
            let count = counter.load(Ordering::Relaxed);
            distribution.total_reports += count;
            distribution.counts.insert(*state, count);
        }
        Some(distribution)
    }
}
