//! # Ingestion
//!
//! Channel ingestion layer.
//!
//! Responsibilities:
//! - One receiver per upstream channel (OBB / PointCloud / Status), each owning
//!   its subscription socket and ingestion task
//! - Wire decoding into `ChannelMessage` via per-channel `ChannelDecoder`s
//! - Bounded per-channel queues with a keep-freshest overflow policy
//! - Voxel-grid point-cloud reduction
//! - Uniform lifecycle and statistics through `ChannelOrchestrator`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{ChannelOrchestrator, DownsamplingConfig, ObbEncoding, ReceiverConfig};
//!
//! let mut orchestrator = ChannelOrchestrator::new();
//! orchestrator.add_obb_channel(
//!     ReceiverConfig::new("127.0.0.1:6555".parse()?),
//!     ObbEncoding::Json,
//! ).await;
//! orchestrator.add_pointcloud_channel(
//!     ReceiverConfig::new("127.0.0.1:6556".parse()?),
//!     DownsamplingConfig::default(),
//! ).await?;
//! orchestrator.add_status_channel(ReceiverConfig::new("127.0.0.1:6557".parse()?)).await;
//!
//! orchestrator.start_all();
//! for (kind, message) in orchestrator.pull_all() {
//!     // feed the synchronizer
//! }
//! orchestrator.stop_all(std::time::Duration::from_secs(2)).await;
//! ```

mod config;
mod decoder;
mod decoders;
mod downsample;
mod error;
mod mock;
mod orchestrator;
mod receiver;

// Re-exports
pub use config::{
    ChannelMetrics, ChannelStatistics, DownsamplingStats, ReceiverConfig, StateDistribution,
};
pub use contracts::ChannelMessage;
pub use decoder::{ChannelDecoder, DecodeError};
pub use decoders::{DownsamplingConfig, ObbDecoder, ObbEncoding, PointCloudDecoder, StatusDecoder};
pub use downsample::VoxelDownsampler;
pub use error::IngestionError;
pub use mock::{MockChannelSender, MockSenderConfig};
pub use orchestrator::ChannelOrchestrator;
pub use receiver::ChannelReceiver;

pub(crate) fn unix_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
