//! Trait-based conversions between external error types and relay errors.

use super::DecodeError;

/// Convert JSON decoding failures into [`DecodeError::Syntax`].
impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::syntax(
            "json",
            format!("{} at line {}, column {}", e, e.line(), e.column()),
        )
    }
}

/// Convert TOML decoding failures into [`DecodeError::Syntax`].
#[cfg(feature = "toml")]
impl From<toml::de::Error> for DecodeError {
    fn from(e: toml::de::Error) -> Self {
        Self::syntax("toml", e.message())
    }
}
