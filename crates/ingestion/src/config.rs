//! Receiver configuration and statistics

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{ChannelKind, SystemState};

/// Default queue capacity per channel.
///
/// Deliberately small: consumers care about the freshest state, not
/// completeness, so a deep queue would only add latency.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default socket poll interval, which is also the stop-signal check cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-channel receiver configuration
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Local address the subscription socket binds to
    pub bind_addr: SocketAddr,

    /// Queue capacity (overflow evicts the oldest entry)
    pub queue_capacity: usize,

    /// Socket receive poll interval
    pub poll_interval: Duration,

    /// Pause after a socket or decode error, to avoid hot error loops
    pub error_backoff: Duration,
}

impl ReceiverConfig {
    /// Create a configuration with default queue and timing parameters.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            error_backoff: Duration::from_millis(100),
        }
    }

    /// Override the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

/// Per-receiver counters
///
/// Written only by the owning ingestion task; reads from other contexts are
/// eventually consistent by design.
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    received: AtomicU64,
    errors: AtomicU64,
    dropped: AtomicU64,
    // Microseconds since the Unix epoch; 0 means "never received".
    last_receive_micros: AtomicU64,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, now_unix: f64) {
        self.received.fetch_add(1, Ordering::Relaxed);
        self.last_receive_micros
            .store((now_unix * 1e6) as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received_count(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Unix timestamp (seconds) of the last successful receive.
    pub fn last_receive_time(&self) -> Option<f64> {
        match self.last_receive_micros.load(Ordering::Relaxed) {
            0 => None,
            micros => Some(micros as f64 / 1e6),
        }
    }
}

/// Statistics snapshot for one channel
#[derive(Debug, Clone)]
pub struct ChannelStatistics {
    /// Channel identity
    pub channel: ChannelKind,

    /// Bound subscription address
    pub bind_addr: SocketAddr,

    /// Messages decoded and enqueued
    pub received_count: u64,

    /// Socket and decode errors (transient poll timeouts excluded)
    pub error_count: u64,

    /// Messages evicted by the keep-freshest overflow policy
    pub dropped_count: u64,

    /// Current queue depth
    pub queue_depth: usize,

    /// Whether the ingestion task is alive
    pub running: bool,

    /// Unix timestamp of the last successful receive
    pub last_receive_time: Option<f64>,

    /// Downsampling summary (PointCloud channel only)
    pub downsampling: Option<DownsamplingStats>,

    /// State distribution (Status channel only)
    pub states: Option<StateDistribution>,
}

/// Point-cloud reduction summary
#[derive(Debug, Clone)]
pub struct DownsamplingStats {
    /// Configured voxel edge length (meters)
    pub voxel_size: f64,

    /// Whether downsampling is applied
    pub enabled: bool,

    /// Total points received before reduction
    pub total_points_received: u64,

    /// Total points kept after reduction
    pub total_points_after: u64,
}

impl DownsamplingStats {
    /// Average reduction rate over everything received so far.
    pub fn avg_reduction_rate(&self) -> f64 {
        if self.total_points_received == 0 {
            return 0.0;
        }
        (self.total_points_received - self.total_points_after) as f64
            / self.total_points_received as f64
    }
}

/// Distribution of decoded system states
#[derive(Debug, Clone, Default)]
pub struct StateDistribution {
    /// Total status reports decoded
    pub total_reports: u64,

    /// Reports per state (unknown inputs are counted under `Unknown`)
    pub counts: HashMap<SystemState, u64>,
}

impl StateDistribution {
    /// Share of reports in the given state, in percent.
    pub fn percentage(&self, state: SystemState) -> f64 {
        if self.total_reports == 0 {
            return 0.0;
        }
        *self.counts.get(&state).unwrap_or(&0) as f64 / self.total_reports as f64 * 100.0
    }
}
