//! OBB channel decoder
//!
//! Supports two wire encodings, chosen at construction:
//! - `Json`: plain JSON text
//! - `CompressedBson`: zlib-compressed BSON document
//!
//! The two are mutually exclusive and must match the sender. A payload that
//! fails at the encoding layer (non-UTF-8 text in JSON mode, non-zlib bytes in
//! compressed mode) is reported as an encoding mismatch with an actionable
//! message instead of a generic parse error.

use std::io::Read;

use bytes::Bytes;
use contracts::{ChannelKind, ChannelMessage, ChannelPayload, ObbSet, OrientedBox};
use flate2::read::ZlibDecoder;
use serde_json::Value;

use crate::decoder::{ChannelDecoder, DecodeError};

/// OBB wire encoding, construction-time choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObbEncoding {
    /// Plain JSON text
    #[default]
    Json,
    /// zlib-compressed BSON document
    CompressedBson,
}

/// Decoder for the OBB channel
#[derive(Debug, Clone)]
pub struct ObbDecoder {
    encoding: ObbEncoding,
}

impl ObbDecoder {
    pub fn new(encoding: ObbEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> ObbEncoding {
        self.encoding
    }

    fn parse_json(&self, raw: &[u8]) -> Result<Value, DecodeError> {
        let text = std::str::from_utf8(raw).map_err(|_| DecodeError::EncodingMismatch {
            channel: ChannelKind::Obb,
            detail: "payload is not UTF-8 text; the sender appears to be publishing the \
                     compressed encoding - configure both ends with the same mode"
                .to_string(),
        })?;

        serde_json::from_str(text).map_err(|e| DecodeError::Malformed {
            channel: ChannelKind::Obb,
            detail: format!("invalid JSON: {e}"),
        })
    }

    fn parse_compressed(&self, raw: &[u8]) -> Result<Value, DecodeError> {
        let mut decompressed = Vec::new();
        ZlibDecoder::new(raw)
            .read_to_end(&mut decompressed)
            .map_err(|_| DecodeError::EncodingMismatch {
                channel: ChannelKind::Obb,
                detail: "payload is not a zlib stream; the sender appears to be publishing \
                         plain JSON - configure both ends with the same mode"
                    .to_string(),
            })?;

        bson::from_slice(&decompressed).map_err(|e| DecodeError::Malformed {
            channel: ChannelKind::Obb,
            detail: format!("invalid BSON document: {e}"),
        })
    }

    /// Normalize either wire shape into a single `ObbSet` message.
    ///
    /// Enveloped: `{header: {timestamp, seq_id?, source?}, payload: {obbs: [...]}}`.
    /// Legacy: a bare array of boxes, or `{data: [...]}`; carries no timestamp.
    fn normalize(&self, value: Value) -> Result<ChannelMessage, DecodeError> {
        if let Some(object) = value.as_object() {
            if object.contains_key("header") && object.contains_key("payload") {
                let header =
                    object["header"]
                        .as_object()
                        .ok_or_else(|| DecodeError::Malformed {
                            channel: ChannelKind::Obb,
                            detail: "envelope header is not an object".to_string(),
                        })?;

                let timestamp = header.get("timestamp").and_then(Value::as_f64).ok_or_else(
                    || DecodeError::Malformed {
                        channel: ChannelKind::Obb,
                        detail: "envelope header missing numeric timestamp".to_string(),
                    },
                )?;

                let entries = match object["payload"].get("obbs") {
                    Some(obbs) => parse_entries(obbs.clone())?,
                    None => Vec::new(),
                };

                return Ok(ChannelMessage {
                    timestamp: Some(timestamp),
                    sequence_id: header.get("seq_id").and_then(Value::as_i64),
                    source: header
                        .get("source")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    payload: ChannelPayload::ObbSet(ObbSet { entries }),
                });
            }

            if let Some(data) = object.get("data") {
                return Ok(legacy_message(parse_entries(data.clone())?));
            }

            return Err(DecodeError::Malformed {
                channel: ChannelKind::Obb,
                detail: "unrecognized OBB message shape (expected envelope, array or {data})"
                    .to_string(),
            });
        }

        if value.is_array() {
            return Ok(legacy_message(parse_entries(value)?));
        }

        Err(DecodeError::Malformed {
            channel: ChannelKind::Obb,
            detail: "unrecognized OBB message shape (expected envelope, array or {data})"
                .to_string(),
        })
    }
}

fn parse_entries(value: Value) -> Result<Vec<OrientedBox>, DecodeError> {
    serde_json::from_value(value).map_err(|e| DecodeError::Malformed {
        channel: ChannelKind::Obb,
        detail: format!("invalid OBB entry: {e}"),
    })
}

fn legacy_message(entries: Vec<OrientedBox>) -> ChannelMessage {
    ChannelMessage {
        // Legacy senders publish no envelope, so there is no timestamp to carry.
        timestamp: None,
        sequence_id: None,
        source: None,
        payload: ChannelPayload::ObbSet(ObbSet { entries }),
    }
}

impl ChannelDecoder for ObbDecoder {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Obb
    }

    fn decode(&self, raw: Bytes) -> Result<ChannelMessage, DecodeError> {
        let value = match self.encoding {
            ObbEncoding::Json => self.parse_json(&raw)?,
            ObbEncoding::CompressedBson => self.parse_compressed(&raw)?,
        };
        self.normalize(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    const BOX_JSON: &str = r#"{
        "type": "obs",
        "position": [0.0, 0.0, 0.0],
        "rotation": [1.0, 0.0, 0.0, 0.0],
        "size": [5.0, 5.0, 5.0],
        "collision_status": 0
    }"#;

    fn decode_json(decoder: &ObbDecoder, text: String) -> Result<ChannelMessage, DecodeError> {
        decoder.decode(Bytes::from(text))
    }

    #[test]
    fn test_enveloped_format() {
        let decoder = ObbDecoder::new(ObbEncoding::Json);
        let text = format!(
            r#"{{"header": {{"timestamp": 123.5, "seq_id": 7, "source": "lcps"}},
                "payload": {{"obbs": [{BOX_JSON}]}}}}"#
        );

        let msg = decode_json(&decoder, text).unwrap();
        assert_eq!(msg.timestamp, Some(123.5));
        assert_eq!(msg.sequence_id, Some(7));
        assert_eq!(msg.source.as_deref(), Some("lcps"));
        match msg.payload {
            ChannelPayload::ObbSet(set) => assert_eq!(set.entries.len(), 1),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_legacy_bare_array() {
        let decoder = ObbDecoder::new(ObbEncoding::Json);
        let msg = decode_json(&decoder, format!("[{BOX_JSON}, {BOX_JSON}]")).unwrap();

        assert_eq!(msg.timestamp, None);
        assert_eq!(msg.sequence_id, None);
        match msg.payload {
            ChannelPayload::ObbSet(set) => assert_eq!(set.entries.len(), 2),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_legacy_data_wrapper() {
        let decoder = ObbDecoder::new(ObbEncoding::Json);
        let msg = decode_json(&decoder, format!(r#"{{"data": [{BOX_JSON}]}}"#)).unwrap();
        match msg.payload {
            ChannelPayload::ObbSet(set) => assert_eq!(set.entries.len(), 1),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_envelope_without_timestamp_is_malformed() {
        let decoder = ObbDecoder::new(ObbEncoding::Json);
        let err = decode_json(
            &decoder,
            r#"{"header": {"seq_id": 1}, "payload": {"obbs": []}}"#.to_string(),
        )
        .unwrap_err();
        assert!(!err.is_encoding_mismatch());
    }

    #[test]
    fn test_compressed_round_trip() {
        let decoder = ObbDecoder::new(ObbEncoding::CompressedBson);

        let doc = bson::doc! {
            "header": { "timestamp": 42.0_f64, "seq_id": 3_i64 },
            "payload": { "obbs": [] },
        };
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bson::to_vec(&doc).unwrap()).unwrap();
        let wire = encoder.finish().unwrap();

        let msg = decoder.decode(Bytes::from(wire)).unwrap();
        assert_eq!(msg.timestamp, Some(42.0));
        assert_eq!(msg.sequence_id, Some(3));
    }

    #[test]
    fn test_compressed_bytes_in_json_mode_is_encoding_mismatch() {
        let decoder = ObbDecoder::new(ObbEncoding::Json);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&bson::to_vec(&bson::doc! {"data": []}).unwrap())
            .unwrap();
        let wire = encoder.finish().unwrap();

        let err = decoder.decode(Bytes::from(wire)).unwrap_err();
        assert!(err.is_encoding_mismatch());
    }

    #[test]
    fn test_plain_json_in_compressed_mode_is_encoding_mismatch() {
        let decoder = ObbDecoder::new(ObbEncoding::CompressedBson);
        let err = decoder
            .decode(Bytes::from_static(b"{\"data\": []}"))
            .unwrap_err();
        assert!(err.is_encoding_mismatch());
    }

    #[test]
    fn test_garbage_json_is_malformed_not_mismatch() {
        let decoder = ObbDecoder::new(ObbEncoding::Json);
        let err = decode_json(&decoder, "not json at all".to_string()).unwrap_err();
        assert!(!err.is_encoding_mismatch());
    }
}
