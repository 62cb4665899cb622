//! Ant-style path patterns used by the directory store.
//!
//! Patterns are matched against `/`-separated paths relative to the scanned
//! directory. `?` matches one character and `*` any run of characters within
//! a segment; a `**` segment matches zero or more whole segments.

use std::fmt;

/// A compiled Ant-style pattern.
#[derive(Clone, PartialEq, Eq)]
pub struct AntPattern {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    AnyDepth,
    Glob(Vec<char>),
}

impl AntPattern {
    /// Compile `pattern`. Leading `./` and `/` are ignored; `\` is treated
    /// as a separator.
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let normalised = pattern.replace('\\', "/");
        let trimmed = normalised.trim_start_matches("./").trim_start_matches('/');
        let mut segments: Vec<Segment> = Vec::new();
        for part in trimmed.split('/').filter(|part| !part.is_empty()) {
            let segment = if part == "**" {
                Segment::AnyDepth
            } else {
                Segment::Glob(part.chars().collect())
            };
            if segment == Segment::AnyDepth && segments.last() == Some(&Segment::AnyDepth) {
                continue;
            }
            segments.push(segment);
        }
        Self {
            source: pattern.to_owned(),
            segments,
        }
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `path` (relative, `/`-separated) matches.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
        match_segments(&self.segments, &parts)
    }
}

impl fmt::Debug for AntPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AntPattern").field(&self.source).finish()
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => (0..=path.len())
            .filter_map(|skip| path.get(skip..))
            .any(|tail| match_segments(rest, tail)),
        Some((Segment::Glob(glob), rest)) => path.split_first().is_some_and(|(head, tail)| {
            let name: Vec<char> = head.chars().collect();
            match_glob(glob, &name) && match_segments(rest, tail)
        }),
    }
}

fn match_glob(glob: &[char], name: &[char]) -> bool {
    match glob.split_first() {
        None => name.is_empty(),
        Some(('*', rest)) => (0..=name.len())
            .filter_map(|skip| name.get(skip..))
            .any(|tail| match_glob(rest, tail)),
        Some((&expected, rest)) => name.split_first().is_some_and(|(&actual, tail)| {
            (expected == '?' || expected == actual) && match_glob(rest, tail)
        }),
    }
}
