//! Mapping from post-preprocessor line numbers back to original file +
//! line ranges.
//!
//! Produced once, alongside the preprocessed-and-pre-passed source, and
//! read-only for the rest of the pipeline; stored as a plain value shared
//! by reference rather than behind any interior mutability.

use std::collections::HashMap;

/// One entry of the mapping: which original file a post-preprocessor line
/// came from, and the (inclusive) range of lines in that file it expands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOrigin {
    pub filename_index: u32,
    pub original_start_line: u32,
    pub original_end_line: u32,
}

/// Deduplicated filename table plus the per-line origin table.
#[derive(Debug, Clone, Default)]
pub struct SourceMapping {
    filenames: Vec<String>,
    filename_indices: HashMap<String, u32>,
    lines: HashMap<u32, LineOrigin>,
}

impl SourceMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `filename`, returning a small stable index for it.
    pub fn intern_filename(&mut self, filename: &str) -> u32 {
        if let Some(&idx) = self.filename_indices.get(filename) {
            return idx;
        }
        let idx = self.filenames.len() as u32;
        self.filenames.push(filename.to_string());
        self.filename_indices.insert(filename.to_string(), idx);
        idx
    }

    /// Records that post-preprocessor line `line` originates from
    /// `[start, end]` (inclusive) of the file named by `filename_index`.
    pub fn set_line(&mut self, line: u32, filename_index: u32, start: u32, end: u32) {
        self.lines.insert(
            line,
            LineOrigin {
                filename_index,
                original_start_line: start,
                original_end_line: end,
            },
        );
    }

    pub fn filename(&self, index: u32) -> Option<&str> {
        self.filenames.get(index as usize).map(|s| s.as_str())
    }

    pub fn origin_of(&self, line: u32) -> Option<LineOrigin> {
        self.lines.get(&line).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Recognizes a GNU-style preprocessor linemarker (`# <lineno> "<file>"
/// [flags...]`, or the `#line <lineno> "<file>"` spelling), returning the
/// original line number and filename. Neither spelling is confused with
/// `#pragma`, which [`crate::code_pages::scan_and_strip_pragmas`] handles
/// separately.
fn parse_linemarker(line: &str) -> Option<(u32, &str)> {
    let line = line.trim();
    let rest = line.strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("line").map(|r| r.trim_start()).unwrap_or(rest);
    let mut parts = rest.splitn(2, char::is_whitespace);
    let lineno: u32 = parts.next()?.parse().ok()?;
    let remainder = parts.next()?.trim_start();
    let filename = remainder.strip_prefix('"')?;
    let end = filename.find('"')?;
    Some((lineno, &filename[..end]))
}

/// Strips preprocessor linemarkers from `source`, blanking each marker
/// line (preserving its byte length and the overall line count, so later
/// byte offsets stay valid) and building the [`SourceMapping`] they
/// describe: every following content line is attributed to the file and
/// line number the most recent marker announced, incrementing by one per
/// physical line until the next marker (spec.md §3 "Source mapping").
///
/// Source with no linemarkers at all yields an unchanged buffer and an
/// empty mapping, which downstream rendering treats as "no mapping
/// available" and skips the `note:` it would otherwise print.
pub fn extract_line_markers(source: &[u8]) -> (Vec<u8>, SourceMapping) {
    let mut mapping = SourceMapping::new();
    let mut out = Vec::with_capacity(source.len());
    let mut output_line = 1u32;
    let mut current_file: Option<u32> = None;
    let mut next_original_line = 1u32;

    for line in source.split_inclusive(|&b| b == b'\n') {
        let trimmed = line
            .strip_suffix(b"\n")
            .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
            .unwrap_or(line);
        let as_str = std::str::from_utf8(trimmed).ok();
        let marker = as_str.and_then(parse_linemarker);
        if let Some((lineno, filename)) = marker {
            current_file = Some(mapping.intern_filename(filename));
            next_original_line = lineno;
            out.extend(std::iter::repeat(b' ').take(line.len() - if line.ends_with(b"\n") { 1 } else { 0 }));
            if line.ends_with(b"\n") {
                out.push(b'\n');
            }
        } else {
            if let Some(file_idx) = current_file {
                mapping.set_line(output_line, file_idx, next_original_line, next_original_line);
                next_original_line += 1;
            }
            out.extend_from_slice(line);
        }
        output_line += 1;
    }

    (out, mapping)
}
