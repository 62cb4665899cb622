//! YAML decoding backed by `serde-saphyr`.

use serde_saphyr::Options;

use crate::{DecodeError, Document, document};

use super::{FormatDecoder, utf8};

/// Decoder for YAML payloads using strict boolean semantics.
#[derive(Clone, Copy, Debug, Default)]
pub struct YamlDecoder;

impl FormatDecoder for YamlDecoder {
    fn decode(&self, bytes: &[u8], _options: &Document) -> Result<Document, DecodeError> {
        let text = utf8("yaml", bytes)?;
        if text.trim().is_empty() {
            return Ok(document::empty());
        }
        serde_saphyr::from_str_with_options(
            text,
            Options {
                strict_booleans: true,
                ..Options::default()
            },
        )
        .map_err(|e| DecodeError::syntax("yaml", e))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::YamlDecoder;
    use crate::format::FormatDecoder;

    #[test]
    fn decodes_mappings() {
        let doc = YamlDecoder
            .decode(b"name: svc\ndb:\n  port: 5432\n  tls: true\n", &json!({}))
            .expect("decode");
        assert_eq!(doc, json!({"name": "svc", "db": {"port": 5432, "tls": true}}));
    }

    #[test]
    fn yes_is_not_a_boolean() {
        let doc = YamlDecoder
            .decode(b"flag: yes\n", &json!({}))
            .expect("decode");
        assert_eq!(doc, json!({"flag": "yes"}));
    }
}
