//! Wraps a whole payload under a single key.

use serde_json::{Map, Value};

use crate::{ConfigurationError, DecodeError, Document};

use super::{FormatDecoder, utf8};

const KEY_OPTION: &str = "raw.key";
const TYPE_OPTION: &str = "raw.type";

/// Decoder storing the payload under the key named by the `raw.key` option.
///
/// `raw.type` selects how the payload is interpreted: `string` (default),
/// `json-object` or `json-array`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawDecoder;

#[derive(Clone, Copy)]
enum RawType {
    Text,
    Object,
    Array,
}

impl RawType {
    fn from_options(options: &Document) -> Result<Self, ConfigurationError> {
        match options.get(TYPE_OPTION).and_then(Value::as_str) {
            None | Some("string") => Ok(Self::Text),
            Some("json-object") => Ok(Self::Object),
            Some("json-array") => Ok(Self::Array),
            Some(other) => Err(ConfigurationError::invalid(
                "raw",
                format!("unsupported {TYPE_OPTION} '{other}'"),
            )),
        }
    }
}

fn key(options: &Document) -> Result<&str, ConfigurationError> {
    options
        .get(KEY_OPTION)
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigurationError::invalid("raw", format!("'{KEY_OPTION}' is required")))
}

impl FormatDecoder for RawDecoder {
    fn decode(&self, bytes: &[u8], options: &Document) -> Result<Document, DecodeError> {
        let key = key(options).map_err(|e| DecodeError::unsupported("raw", e.to_string()))?;
        let raw_type =
            RawType::from_options(options).map_err(|e| DecodeError::unsupported("raw", e.to_string()))?;
        let text = utf8("raw", bytes)?;
        let value = match raw_type {
            RawType::Text => Value::String(text.to_owned()),
            RawType::Object | RawType::Array => {
                let value: Value =
                    serde_json::from_str(text).map_err(|e| DecodeError::syntax("raw", e))?;
                let matches = match raw_type {
                    RawType::Object => value.is_object(),
                    _ => value.is_array(),
                };
                if !matches {
                    return Err(DecodeError::unsupported(
                        "raw",
                        format!("payload is a {}", crate::document::kind_of(&value)),
                    ));
                }
                value
            }
        };
        let mut map = Map::new();
        map.insert(key.to_owned(), value);
        Ok(Value::Object(map))
    }

    fn validate(&self, options: &Document) -> Result<(), ConfigurationError> {
        key(options)?;
        RawType::from_options(options).map(|_| ())
    }
}
