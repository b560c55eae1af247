//! File-name patterns.
//!
//! A [`FilePattern`] renders the names of rotated files and recovers the
//! numeric index embedded in names discovered on disk. Two placeholders are
//! supported:
//!
//! - `%i` — the file index (exactly one occurrence required)
//! - `%d{...}` — a chrono strftime date, e.g. `%d{%Y-%m-%d}`
//!
//! `app.%i.log.gz` names a classic indexed archive chain; a pattern like
//! `app-%d{%Y-%m-%d}-%i.log.gz` buckets files by day, which is what the
//! direct-write retention policy keys on: date slots are rendered with the
//! *current* time when matching, so only files from the current bucket count
//! as candidates.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};

use crate::error::{Error, Result};

/// Extension appended to a direct-write file once its stream is finalized.
pub const GZIP_EXTENSION: &str = ".gz";

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Index,
    Date(String),
}

/// A parsed file-name pattern with one index slot.
#[derive(Debug, Clone)]
pub struct FilePattern {
    segments: Vec<Segment>,
}

impl FilePattern {
    /// Parses a pattern string. Fails unless the pattern contains exactly
    /// one `%i` and every `%d{...}` holds a valid strftime format.
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            match chars.next() {
                Some('i') => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Index);
                }
                Some('d') => {
                    if chars.next() != Some('{') {
                        return Err(Error::InvalidPattern(format!(
                            "expected '{{' after %d in '{pattern}'"
                        )));
                    }
                    let fmt: String = chars.by_ref().take_while(|&c| c != '}').collect();
                    if StrftimeItems::new(&fmt).any(|item| matches!(item, Item::Error)) {
                        return Err(Error::InvalidPattern(format!(
                            "invalid date format '{fmt}' in '{pattern}'"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Date(fmt));
                }
                Some('%') => literal.push('%'),
                other => {
                    return Err(Error::InvalidPattern(format!(
                        "unknown placeholder %{} in '{pattern}'",
                        other.map(String::from).unwrap_or_default()
                    )));
                }
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let index_slots = segments
            .iter()
            .filter(|s| matches!(s, Segment::Index))
            .count();
        if index_slots != 1 {
            return Err(Error::InvalidPattern(format!(
                "pattern '{pattern}' must contain exactly one %i, found {index_slots}"
            )));
        }

        Ok(Self { segments })
    }

    /// Renders the file name for `index`, with date slots rendered at `now`.
    pub fn format(&self, index: u32, now: &DateTime<Local>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Index => out.push_str(&index.to_string()),
                Segment::Date(fmt) => out.push_str(&now.format(fmt).to_string()),
            }
        }
        out
    }

    /// Recovers the index from a file name matching this pattern, or `None`
    /// if the name does not match. Date slots must match their rendering at
    /// `now`.
    pub fn parse_index(&self, name: &str, now: &DateTime<Local>) -> Option<u32> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut seen_index = false;

        for segment in &self.segments {
            let target = if seen_index { &mut suffix } else { &mut prefix };
            match segment {
                Segment::Literal(text) => target.push_str(text),
                Segment::Date(fmt) => target.push_str(&now.format(fmt).to_string()),
                Segment::Index => seen_index = true,
            }
        }

        let middle = name.strip_prefix(&prefix)?.strip_suffix(&suffix)?;
        if middle.is_empty() || !middle.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        middle.parse().ok()
    }
}
