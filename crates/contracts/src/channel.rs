//! ChannelKind - the three fixed telemetry channels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the three fixed upstream channels.
///
/// The channel set is closed by design: this is an observation tool for a
/// specific perception system, not a general broker. Using an enum (rather
/// than string keys) makes the "unknown channel" class of caller bugs
/// unrepresentable in most of the API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Oriented-bounding-box detections
    Obb,
    /// Point-cloud geometry
    PointCloud,
    /// System status / performance telemetry
    Status,
}

impl ChannelKind {
    /// All channels, in the canonical order used for statistics output.
    pub const ALL: [ChannelKind; 3] = [
        ChannelKind::Obb,
        ChannelKind::PointCloud,
        ChannelKind::Status,
    ];

    /// Stable lowercase name, used as map key and in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Obb => "obb",
            ChannelKind::PointCloud => "pointcloud",
            ChannelKind::Status => "status",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a channel name fails.
#[derive(Debug, Error)]
#[error("unknown channel name: {0:?} (expected obb, pointcloud or status)")]
pub struct UnknownChannel(pub String);

impl FromStr for ChannelKind {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "obb" => Ok(ChannelKind::Obb),
            "pointcloud" => Ok(ChannelKind::PointCloud),
            "status" => Ok(ChannelKind::Status),
            other => Err(UnknownChannel(other.to_string())),
        }
    }
}
