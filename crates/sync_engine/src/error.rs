//! Sync engine error types

use contracts::ChannelKind;
use thiserror::Error;

/// Errors raised by `StreamSynchronizer::add`
///
/// These indicate caller bugs (invalid API use), not data-quality issues, and
/// are therefore surfaced synchronously instead of being absorbed into
/// statistics.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The message carries no timestamp and cannot be aligned
    #[error("message for {channel} channel has no timestamp")]
    MissingTimestamp { channel: ChannelKind },

    /// The message payload belongs to a different channel than the target buffer
    #[error("payload is for channel {actual}, not {expected}")]
    ChannelMismatch {
        expected: ChannelKind,
        actual: ChannelKind,
    },
}
