//! Java-style `.properties` decoding.
//!
//! Supports `#`/`!` comments, `=`, `:` or whitespace separators, backslash
//! line continuations and the usual escapes (`\t`, `\n`, `\r`, `\f`,
//! `\uXXXX`). Values are typed with [`crate::document::infer_scalar`] unless
//! the store sets `raw-data`, and keys nest on `.` when it sets
//! `hierarchical`.

use crate::document::{self, EntryOptions};
use crate::{DecodeError, Document};

use super::{FormatDecoder, utf8};

/// Decoder for `.properties` payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct PropertiesDecoder;

impl FormatDecoder for PropertiesDecoder {
    fn decode(&self, bytes: &[u8], options: &Document) -> Result<Document, DecodeError> {
        let text = utf8("properties", bytes)?;
        let entries = parse(text)?;
        Ok(document::from_entries(
            entries,
            EntryOptions::from_options(options),
        ))
    }
}

/// Parse `text` into ordered key/value pairs.
fn parse(text: &str) -> Result<Vec<(String, String)>, DecodeError> {
    logical_lines(text)
        .into_iter()
        .map(|line| split_entry(&line))
        .collect()
}

/// Join continuation lines and drop blanks and comments.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;
    for physical in text.lines() {
        let trimmed = physical.trim_start();
        let mut current = match pending.take() {
            Some(mut joined) => {
                joined.push_str(trimmed);
                joined
            }
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed.to_owned()
            }
        };
        if ends_with_continuation(&current) {
            current.pop();
            pending = Some(current);
        } else {
            lines.push(current);
        }
    }
    if let Some(last) = pending {
        lines.push(last);
    }
    lines
}

fn ends_with_continuation(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
    trailing % 2 == 1
}

fn split_entry(line: &str) -> Result<(String, String), DecodeError> {
    let mut key_end = line.len();
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = idx;
                break;
            }
            _ => {}
        }
    }
    let (raw_key, rest) = line.split_at(key_end);
    let rest = rest.trim_start_matches([' ', '\t', '\u{c}']);
    let rest = rest
        .strip_prefix(['=', ':'])
        .map_or(rest, |value| value.trim_start_matches([' ', '\t', '\u{c}']));
    Ok((unescape(raw_key)?, unescape(rest)?))
}

fn unescape(raw: &str) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => out.push(unicode_escape(&mut chars)?),
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

fn unicode_escape(chars: &mut std::str::Chars<'_>) -> Result<char, DecodeError> {
    let digits: String = chars.by_ref().take(4).collect();
    u32::from_str_radix(&digits, 16)
        .ok()
        .filter(|_| digits.len() == 4)
        .and_then(char::from_u32)
        .ok_or_else(|| DecodeError::syntax("properties", format!("malformed \\u{digits} escape")))
}
