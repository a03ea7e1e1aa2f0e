//! Recorder error types

use thiserror::Error;

/// Recorder errors
///
/// `AlreadyRecording` and `NotRecording` are usage errors (invalid API
/// sequencing) and fail fast; the rest are I/O and format conditions.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Underlying file I/O failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// `start` called while a recording is active
    #[error("already recording")]
    AlreadyRecording,

    /// `record` called before `start`
    #[error("not recording: call start() before record()")]
    NotRecording,

    /// Record serialization failure
    #[error("encode error: {0}")]
    Encode(String),

    /// The file does not begin with the recording magic
    #[error("not a recording file (bad magic)")]
    BadMagic,

    /// The file structure is damaged
    #[error("corrupt recording: {0}")]
    Corrupt(String),

    /// The async writer task is gone or panicked
    #[error("writer task failed: {0}")]
    WriterFailed(String),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
