//! JSON (and optionally JSON5) decoding.

use crate::{DecodeError, Document, document};

use super::FormatDecoder;

/// Decoder for JSON payloads. An empty or blank payload decodes to `{}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDecoder;

impl FormatDecoder for JsonDecoder {
    fn decode(&self, bytes: &[u8], _options: &Document) -> Result<Document, DecodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(document::empty());
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Decoder for JSON5 payloads.
#[cfg(feature = "json5")]
#[derive(Clone, Copy, Debug, Default)]
pub struct Json5Decoder;

#[cfg(feature = "json5")]
impl FormatDecoder for Json5Decoder {
    fn decode(&self, bytes: &[u8], _options: &Document) -> Result<Document, DecodeError> {
        let text = super::utf8("json5", bytes)?;
        if text.trim().is_empty() {
            return Ok(document::empty());
        }
        json5::from_str(text).map_err(|e| DecodeError::syntax("json5", e))
    }
}
