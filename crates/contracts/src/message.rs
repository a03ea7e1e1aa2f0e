//! ChannelMessage - Ingestion output
//!
//! One decoded message from one upstream channel.

use serde::{Deserialize, Serialize};

use crate::ChannelKind;

/// Decoded channel message
///
/// Produced by the per-channel decoders and buffered by the receivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Source-supplied wall-clock timestamp (seconds, f64) - primary clock.
    ///
    /// `None` only for the legacy OBB wire format, which carries no envelope.
    /// The synchronizer refuses messages without a timestamp.
    pub timestamp: Option<f64>,

    /// Sender sequence number (OBB envelope only)
    pub sequence_id: Option<i64>,

    /// Sender identity (OBB envelope only)
    pub source: Option<String>,

    /// Channel payload
    pub payload: ChannelPayload,
}

impl ChannelMessage {
    /// Which channel this message belongs to, derived from the payload.
    pub fn kind(&self) -> ChannelKind {
        match self.payload {
            ChannelPayload::ObbSet(_) => ChannelKind::Obb,
            ChannelPayload::PointCloud(_) => ChannelKind::PointCloud,
            ChannelPayload::Status(_) => ChannelKind::Status,
        }
    }
}

/// Channel payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChannelPayload {
    /// A set of oriented-bounding-box detections
    ObbSet(ObbSet),

    /// A (possibly downsampled) point cloud
    PointCloud(PointCloudSet),

    /// System status report
    Status(StatusReport),
}

/// Oriented-bounding-box detections from one message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObbSet {
    /// Detections, passed through as received
    pub entries: Vec<OrientedBox>,
}

/// One oriented bounding box
///
/// Opaque to this tool beyond pass-through; no plausibility validation is
/// performed on position, rotation or size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrientedBox {
    /// Detection class (e.g. "obs", "sprWarn", "sprStop")
    #[serde(rename = "type")]
    pub kind: String,

    /// Position [x, y, z]
    pub position: [f64; 3],

    /// Orientation, either quaternion or 3x3 matrix depending on the sender
    pub rotation: Rotation,

    /// Extent [width, height, depth]
    pub size: [f64; 3],

    /// Collision state as reported upstream
    #[serde(rename = "collision_status", alias = "collision")]
    pub collision: CollisionFlag,
}

/// Box orientation, as published by the sender.
///
/// Senders publish either a quaternion `[w, x, y, z]` or a row-major 3x3
/// rotation matrix; both are accepted and kept in their original form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rotation {
    Quaternion([f64; 4]),
    Matrix([[f64; 3]; 3]),
}

/// Collision state, either a boolean or a small integer code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollisionFlag {
    Flag(bool),
    Code(u8),
}

impl CollisionFlag {
    /// True if the box is in a colliding state (any non-zero code).
    pub fn is_colliding(&self) -> bool {
        match self {
            CollisionFlag::Flag(b) => *b,
            CollisionFlag::Code(c) => *c != 0,
        }
    }
}

/// Point cloud after decode (and optional voxel downsampling)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloudSet {
    /// Points [x, y, z], float32 as received on the wire
    pub points: Vec<[f32; 3]>,

    /// Sender frame number, if present
    pub frame_id: Option<u64>,

    /// Point count before downsampling (N)
    pub original_count: u32,

    /// Point count after downsampling (M)
    pub downsampled_count: u32,

    /// (N - M) / N, or 0.0 for an empty cloud
    pub reduction_rate: f64,
}

/// System status report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// Parsed state; unrecognized inputs map to `Unknown`
    pub state: SystemState,

    /// State string exactly as received
    pub state_raw: String,

    /// Sender frame number, if present
    pub frame_id: Option<u64>,

    /// Performance metrics, shape defined by the sender
    pub metrics: serde_json::Value,

    /// Detection summary, shape defined by the sender
    pub detection: serde_json::Value,
}

/// Upstream system state
///
/// Closed enum; anything the sender publishes that does not match one of the
/// known states decodes to `Unknown` rather than failing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemState {
    Idle,
    Detecting,
    Alerting,
    Error,
    Unknown,
}

impl SystemState {
    /// All states, in display order.
    pub const ALL: [SystemState; 5] = [
        SystemState::Idle,
        SystemState::Detecting,
        SystemState::Alerting,
        SystemState::Error,
        SystemState::Unknown,
    ];

    /// Parse a wire state string; never fails.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "idle" => SystemState::Idle,
            "detecting" => SystemState::Detecting,
            "alerting" => SystemState::Alerting,
            "error" => SystemState::Error,
            _ => SystemState::Unknown,
        }
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemState::Idle => "idle",
            SystemState::Detecting => "detecting",
            SystemState::Alerting => "alerting",
            SystemState::Error => "error",
            SystemState::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_accepts_quaternion_and_matrix() {
        let quat: Rotation = serde_json::from_str("[1.0, 0.0, 0.0, 0.0]").unwrap();
        assert!(matches!(quat, Rotation::Quaternion(_)));

        let mat: Rotation =
            serde_json::from_str("[[1,0,0],[0,1,0],[0,0,1]]").unwrap();
        assert!(matches!(mat, Rotation::Matrix(_)));
    }

    #[test]
    fn test_collision_accepts_bool_and_code() {
        let flag: CollisionFlag = serde_json::from_str("true").unwrap();
        assert!(flag.is_colliding());

        let code: CollisionFlag = serde_json::from_str("0").unwrap();
        assert!(!code.is_colliding());
    }

    #[test]
    fn test_oriented_box_wire_shape() {
        let json = r#"{
            "type": "sprWarn",
            "position": [2.0, 2.0, 2.0],
            "rotation": [1.0, 0.0, 0.0, 0.0],
            "size": [1.0, 1.0, 1.0],
            "collision_status": 1
        }"#;
        let obb: OrientedBox = serde_json::from_str(json).unwrap();
        assert_eq!(obb.kind, "sprWarn");
        assert!(obb.collision.is_colliding());
    }

    #[test]
    fn test_unknown_state_maps_to_unknown() {
        assert_eq!(SystemState::parse("rebooting"), SystemState::Unknown);
        assert_eq!(SystemState::parse("IDLE"), SystemState::Unknown);
        assert_eq!(SystemState::parse("idle"), SystemState::Idle);
    }

    #[test]
    fn test_message_kind_follows_payload() {
        let msg = ChannelMessage {
            timestamp: Some(1.0),
            sequence_id: None,
            source: None,
            payload: ChannelPayload::ObbSet(ObbSet::default()),
        };
        assert_eq!(msg.kind(), crate::ChannelKind::Obb);
    }
}
