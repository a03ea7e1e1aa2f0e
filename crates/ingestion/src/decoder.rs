//! ChannelDecoder trait
//!
//! One implementation per channel kind. The generic ingestion loop, queue and
//! lifecycle logic live once in `ChannelReceiver`, parameterized over this trait.

use bytes::Bytes;
use contracts::{ChannelKind, ChannelMessage};
use thiserror::Error;

use crate::config::{DownsamplingStats, StateDistribution};

/// Wire decoder for one channel kind
///
/// Decoders are shared between the ingestion task and statistics readers, so
/// any internal counters must use interior mutability (atomics).
pub trait ChannelDecoder: Send + Sync {
    /// The channel this decoder serves.
    fn kind(&self) -> ChannelKind;

    /// Decode one raw wire message.
    fn decode(&self, raw: Bytes) -> Result<ChannelMessage, DecodeError>;

    /// Reduction summary, for decoders that downsample (PointCloud).
    fn downsampling_statistics(&self) -> Option<DownsamplingStats> {
        None
    }

    /// State distribution, for decoders that track it (Status).
    fn state_statistics(&self) -> Option<StateDistribution> {
        None
    }
}

/// Decode failure for a single message
///
/// Either kind is non-fatal to the ingestion loop: the message is dropped,
/// the error counter incremented, and the loop continues. `EncodingMismatch`
/// is kept distinct because it points at a configuration problem (sender and
/// receiver disagree on the wire encoding) that the operator must fix, rather
/// than a one-off bad message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload does not match the configured wire encoding at all
    #[error("encoding mismatch on {channel} channel: {detail}")]
    EncodingMismatch {
        channel: ChannelKind,
        detail: String,
    },

    /// The payload matches the encoding but the content is malformed
    #[error("malformed {channel} message: {detail}")]
    Malformed {
        channel: ChannelKind,
        detail: String,
    },
}

impl DecodeError {
    pub fn is_encoding_mismatch(&self) -> bool {
        matches!(self, DecodeError::EncodingMismatch { .. })
    }
}
