//! Per-channel wire decoders.

mod obb;
mod pointcloud;
mod status;

pub use obb::{ObbDecoder, ObbEncoding};
pub use pointcloud::{DownsamplingConfig, PointCloudDecoder};
pub use status::StatusDecoder;
