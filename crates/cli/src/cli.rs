//! CLI argument definitions using clap.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use ingestion::ObbEncoding;

/// LCPS Observer - records time-aligned telemetry from a live perception system
#[derive(Parser, Debug)]
#[command(
    name = "lcps-observer",
    author,
    version,
    about = "Multi-channel telemetry observer and recorder",
    long_about = "Subscribes to the OBB, point-cloud and status channels of a live \n\
                  perception system, aligns them into time-coherent composite frames, \n\
                  and records the aligned frames to a structured file for offline \n\
                  analysis."
)]
pub struct Cli {
    /// OBB channel bind address
    #[arg(long, default_value = "127.0.0.1:6555", env = "LCPS_OBB_ADDR")]
    pub obb: SocketAddr,

    /// OBB wire encoding; must match the sender exactly
    #[arg(long, value_enum, default_value = "json", env = "LCPS_OBB_ENCODING")]
    pub obb_encoding: ObbEncodingArg,

    /// PointCloud channel bind address
    #[arg(long, default_value = "127.0.0.1:6556", env = "LCPS_PC_ADDR")]
    pub pointcloud: SocketAddr,

    /// Status channel bind address
    #[arg(long, default_value = "127.0.0.1:6557", env = "LCPS_STATUS_ADDR")]
    pub status: SocketAddr,

    /// Recording output path
    #[arg(
        short,
        long,
        default_value = "data/recording.lcps",
        env = "LCPS_OUTPUT"
    )]
    pub output: PathBuf,

    /// Observe only, do not record
    #[arg(long)]
    pub no_record: bool,

    /// Synchronization window in milliseconds
    #[arg(long, default_value = "50.0", env = "LCPS_SYNC_WINDOW_MS")]
    pub sync_window_ms: f64,

    /// Minimum sync quality for a frame to be kept
    #[arg(long, default_value = "0.5")]
    pub min_quality: f64,

    /// Voxel size for point-cloud reduction (meters)
    #[arg(long, default_value = "0.1", env = "LCPS_VOXEL_SIZE")]
    pub voxel_size: f64,

    /// Disable point-cloud downsampling
    #[arg(long)]
    pub no_downsample: bool,

    /// Receiver queue capacity per channel
    #[arg(long, default_value = "10")]
    pub queue_size: usize,

    /// Synchronizer buffer size per channel
    #[arg(long, default_value = "100")]
    pub buffer_size: usize,

    /// Stop after this many seconds (0 = run until Ctrl-C)
    #[arg(long, default_value = "0", env = "LCPS_DURATION")]
    pub duration: u64,

    /// Statistics report interval in seconds
    #[arg(long, default_value = "5")]
    pub stats_interval: u64,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, env = "LCPS_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", env = "LCPS_LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// OBB wire encoding selector
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ObbEncodingArg {
    /// Plain JSON text
    Json,
    /// zlib-compressed BSON
    Compressed,
}

impl From<ObbEncodingArg> for ObbEncoding {
    fn from(arg: ObbEncodingArg) -> Self {
        match arg {
            ObbEncodingArg::Json => ObbEncoding::Json,
            ObbEncodingArg::Compressed => ObbEncoding::CompressedBson,
        }
    }
}

/// Log output format selector
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
