//! Recording container format
//!
//! ```text
//! +-----------------------------+
//! | magic "LCPSOBS1" (8 bytes)  |
//! +-----------------------------+
//! | u32-LE len | HeaderRecord   |   always uncompressed
//! +-----------------------------+
//! | u32-LE len | FrameRecord    |   per header compression
//! |            ...              |
//! +-----------------------------+
//! | u32-LE len | FooterRecord   |   per header compression
//! +-----------------------------+
//! ```
//!
//! Records are bincode-encoded. The header must stay uncompressed so a reader
//! can learn the compression choice from it.

use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{RecorderError, Result};

/// File magic, followed by the header record.
pub const MAGIC: [u8; 8] = *b"LCPSOBS1";

/// Container format version, written into the header.
pub const FORMAT_VERSION: &str = "1.0.0";

// Upper bound on a single record body; a frame holding a full point cloud
// stays far below this.
const MAX_RECORD_LEN: usize = 256 * 1024 * 1024;

/// Record-stream compression choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Compression {
    None,
    #[default]
    Zlib,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Zlib => "zlib",
        }
    }
}

/// Scalar-or-text metadata attribute
///
/// Caller-supplied metadata keeps scalar values typed; anything structured
/// (arrays, objects) is serialized to JSON text before storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&serde_json::Value> for MetadataValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => MetadataValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MetadataValue::Int(i)
                } else {
                    MetadataValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => MetadataValue::Text(s.clone()),
            other => MetadataValue::Text(other.to_string()),
        }
    }
}

/// Opening attributes, written once at `start`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderRecord {
    /// Recording creation timestamp (RFC 3339)
    pub created_at: String,

    /// Container format version
    pub format_version: String,

    /// Compression applied to the records that follow
    pub compression: Compression,

    /// Caller-supplied metadata, sorted by key
    pub metadata: Vec<(String, MetadataValue)>,
}

/// One recorded frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Zero-based write position; also the basis of the frame key
    pub index: u32,

    /// Alignment timestamp
    pub timestamp: f64,

    /// Synchronizer-assigned frame id
    pub frame_id: u32,

    /// OBB payload as a JSON document (schema-light, caller-defined shape)
    pub obb: Option<String>,

    /// Point cloud as a native numeric array plus reduction statistics
    pub pointcloud: Option<PointCloudRecord>,

    /// Status payload as a JSON document
    pub status: Option<String>,
}

/// Stored point-cloud payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloudRecord {
    pub points: Vec<[f32; 3]>,
    pub original_count: u32,
    pub downsampled_count: u32,
    pub reduction_rate: f64,
}

/// Closing attributes, written once at `stop`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FooterRecord {
    pub frame_count: u64,
    pub duration_seconds: f64,
    pub bytes_written: u64,
}

/// One container record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Record {
    Header(HeaderRecord),
    Frame(FrameRecord),
    Footer(FooterRecord),
}

/// Zero-padded frame key; lexicographic order matches write order.
pub fn frame_key(index: u32) -> String {
    format!("frame_{index:06}")
}

/// Write one length-prefixed record. Returns the bytes written.
pub(crate) fn write_record<W: Write>(
    writer: &mut W,
    record: &Record,
    compression: Compression,
) -> Result<u64> {
    let body = bincode::serialize(record).map_err(|e| RecorderError::Encode(e.to_string()))?;

    let body = match compression {
        Compression::None => body,
        Compression::Zlib => {
            let mut encoder =
                ZlibEncoder::new(Vec::with_capacity(body.len() / 2), flate2::Compression::default());
            encoder.write_all(&body)?;
            encoder.finish()?
        }
    };

    writer.write_all(&(body.len() as u32).to_le_bytes())?;
    writer.write_all(&body)?;
    Ok(4 + body.len() as u64)
}

/// Read one length-prefixed record.
///
/// Returns `Ok(None)` at a clean end of stream, and also for a truncated
/// trailing record (a recording cut off mid-write keeps everything flushed
/// before the tear).
pub(crate) fn read_record<R: Read>(
    reader: &mut R,
    compression: Compression,
) -> Result<Option<Record>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_RECORD_LEN {
        return Err(RecorderError::Corrupt(format!(
            "record length {len} exceeds limit"
        )));
    }

    let mut body = vec![0u8; len];
    match reader.read_exact(&mut body) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let body = match compression {
        Compression::None => body,
        Compression::Zlib => {
            let mut decompressed = Vec::new();
            ZlibDecoder::new(&body[..])
                .read_to_end(&mut decompressed)
                .map_err(|e| RecorderError::Corrupt(format!("zlib: {e}")))?;
            decompressed
        }
    };

    bincode::deserialize(&body)
        .map(Some)
        .map_err(|e| RecorderError::Corrupt(e.to_string()))
}
