//! TOML decoding backed by the `toml` crate.

use crate::{DecodeError, Document};

use super::{FormatDecoder, utf8};

/// Decoder for TOML payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct TomlDecoder;

impl FormatDecoder for TomlDecoder {
    fn decode(&self, bytes: &[u8], _options: &Document) -> Result<Document, DecodeError> {
        let text = utf8("toml", bytes)?;
        let table: ::toml::Table = ::toml::from_str(text)?;
        serde_json::to_value(table).map_err(|e| DecodeError::syntax("toml", e))
    }
}
