//! Windows code page registry: lookup of a code page identifier to a
//! decoder producing Unicode scalar values from narrow-string bytes.

use crate::error::{Error, Result};

/// Why a code page identifier couldn't be resolved to a [`CodePage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePageError {
    /// Not a code page identifier that exists at all.
    Invalid,
    /// A real code page, but this compiler doesn't implement a decoder for it.
    Unsupported,
}

impl std::fmt::Display for CodePageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodePageError::Invalid => write!(f, "invalid code page"),
            CodePageError::Unsupported => write!(f, "unsupported code page"),
        }
    }
}

/// A single decoded unit: the scalar value plus how many input bytes it
/// consumed, so callers can keep track of byte-offset positions while
/// decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedChar {
    pub scalar: char,
    pub consumed: usize,
}

/// A resolved, usable code page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePage {
    /// Windows-1252 (Western European), a single-byte encoding where every
    /// byte value maps to *some* scalar (no decode failures).
    Windows1252,
    /// UTF-8.
    Utf8,
}

/// Windows-1252 bytes in the 0x80-0x9F control-code gap that map to
/// non-Latin-1 characters (the "Microsoft Best Fit" mapping). Indexed by
/// `byte - 0x80`.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

impl CodePage {
    /// Resolves a numeric code page identifier (as used in `/c` and
    /// `#pragma code_page`) to a [`CodePage`], or an error classifying why
    /// it couldn't be resolved.
    pub fn from_id(id: u32) -> std::result::Result<CodePage, CodePageError> {
        match id {
            1252 => Ok(CodePage::Windows1252),
            65001 => Ok(CodePage::Utf8),
            0 => Err(CodePageError::Invalid),
            _ => Err(CodePageError::Unsupported),
        }
    }

    pub fn id(self) -> u32 {
        match self {
            CodePage::Windows1252 => 1252,
            CodePage::Utf8 => 65001,
        }
    }

    /// Decodes one scalar value starting at `bytes[0]`. Returns `None` if
    /// `bytes` is empty.
    ///
    /// Invalid sequences are replaced per the code page's substitution
    /// policy rather than failing: Windows-1252 has no invalid single
    /// bytes, and malformed UTF-8 decodes to `U+FFFD` consuming a single
    /// byte (matching the Unicode replacement-character substitution
    /// algorithm's minimal-consumption rule for a lone invalid lead byte).
    pub fn decode_one(self, bytes: &[u8]) -> Option<DecodedChar> {
        if bytes.is_empty() {
            return None;
        }
        match self {
            CodePage::Windows1252 => {
                let b = bytes[0];
                let scalar = match b {
                    0x80..=0x9F => CP1252_HIGH[(b - 0x80) as usize],
                    _ => b as char,
                };
                Some(DecodedChar { scalar, consumed: 1 })
            }
            CodePage::Utf8 => Some(decode_utf8_one(bytes)),
        }
    }

    /// Decodes an entire byte slice into a `String`, applying the
    /// substitution policy to any invalid sequences rather than failing.
    pub fn decode_all(self, mut bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len());
        while let Some(dc) = self.decode_one(bytes) {
            out.push(dc.scalar);
            bytes = &bytes[dc.consumed..];
        }
        out
    }
}

fn decode_utf8_one(bytes: &[u8]) -> DecodedChar {
    match std::str::from_utf8(bytes) {
        Ok(s) => {
            let ch = s.chars().next().expect("bytes is non-empty");
            DecodedChar {
                scalar: ch,
                consumed: ch.len_utf8(),
            }
        }
        Err(e) => {
            if e.valid_up_to() > 0 {
                let ch = std::str::from_utf8(&bytes[..e.valid_up_to()])
                    .unwrap()
                    .chars()
                    .next()
                    .unwrap();
                DecodedChar {
                    scalar: ch,
                    consumed: ch.len_utf8(),
                }
            } else {
                // Invalid lead byte or truncated sequence right at the
                // start: emit U+FFFD and skip the bytes of this erroneous
                // sequence (or just one byte if that length is unclear).
                let consumed = e.error_len().unwrap_or(1).max(1);
                DecodedChar {
                    scalar: '\u{FFFD}',
                    consumed,
                }
            }
        }
    }
}

/// Looks up a code page, converting [`CodePageError`] into the crate-wide
/// [`Error`] for callers that want a hard failure (used by code paths where
/// an unresolvable `/c` value is fatal rather than a soft diagnostic).
pub fn require_code_page(id: u32) -> Result<CodePage> {
    CodePage::from_id(id).map_err(|e| Error::Malformed(format!("code page {id}: {e}")))
}

/// Per-line active code page, built from a default plus any `#pragma
/// code_page(N)` directives encountered while scanning the source
/// (spec.md §6: "`#pragma code_page(N)` inside the source changes the
/// active code page mid-file (at line granularity)").
#[derive(Debug, Clone)]
pub struct CodePageMap {
    default: CodePage,
    /// `(line, code_page)` pairs in increasing line order; the active code
    /// page for a line is that of the last change at or before it.
    changes: Vec<(u32, CodePage)>,
}

impl CodePageMap {
    pub fn at_line(&self, line: u32) -> CodePage {
        match self.changes.partition_point(|&(l, _)| l <= line) {
            0 => self.default,
            n => self.changes[n - 1].1,
        }
    }
}

/// Scans `source` line by line for `#pragma code_page(N)` directives,
/// blanking each one out (preserving line numbers and byte length so later
/// byte offsets stay valid) and recording the resulting per-line code page
/// map.
pub fn scan_and_strip_pragmas(source: &[u8], default: CodePage) -> (Vec<u8>, CodePageMap) {
    let mut out = Vec::with_capacity(source.len());
    let mut changes = Vec::new();
    let mut line_number = 1u32;

    for line in source.split_inclusive(|&b| b == b'\n') {
        let trimmed = line
            .strip_suffix(b"\n")
            .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
            .unwrap_or(line);
        if let Some(id) = parse_pragma_code_page_line(trimmed) {
            if let Ok(cp) = CodePage::from_id(id) {
                changes.push((line_number, cp));
            }
            out.extend(std::iter::repeat(b' ').take(line.len() - if line.ends_with(b"\n") { 1 } else { 0 }));
            if line.ends_with(b"\n") {
                out.push(b'\n');
            }
        } else {
            out.extend_from_slice(line);
        }
        line_number += 1;
    }

    (out, CodePageMap { default, changes })
}

/// Recognizes `#pragma code_page(N)` (or `#pragma code_page(default)`,
/// treated as "no change"), tolerant of surrounding whitespace.
fn parse_pragma_code_page_line(line: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(line).ok()?.trim();
    let rest = text.strip_prefix('#')?.trim_start();
    let rest = strip_ignore_ascii_case(rest, "pragma")?.trim_start();
    let rest = strip_ignore_ascii_case(rest, "code_page")?.trim_start();
    let rest = rest.strip_prefix('(')?;
    let inner = rest.split(')').next()?.trim();
    inner.parse::<u32>().ok()
}

fn strip_ignore_ascii_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_code_pages_resolve() {
        assert_eq!(CodePage::from_id(1252), Ok(CodePage::Windows1252));
        assert_eq!(CodePage::from_id(65001), Ok(CodePage::Utf8));
    }

    #[test]
    fn unknown_code_page_is_unsupported() {
        assert_eq!(CodePage::from_id(932), Err(CodePageError::Unsupported));
    }

    #[test]
    fn zero_code_page_is_invalid() {
        assert_eq!(CodePage::from_id(0), Err(CodePageError::Invalid));
    }

    #[test]
    fn windows_1252_decodes_every_byte() {
        let cp = CodePage::Windows1252;
        for b in 0u8..=255 {
            assert!(cp.decode_one(&[b]).is_some());
        }
    }

    #[test]
    fn windows_1252_euro_sign() {
        let cp = CodePage::Windows1252;
        let dc = cp.decode_one(&[0x80]).unwrap();
        assert_eq!(dc.scalar, '\u{20AC}');
        assert_eq!(dc.consumed, 1);
    }

    #[test]
    fn utf8_decodes_multibyte() {
        let cp = CodePage::Utf8;
        let bytes = "é".as_bytes();
        let dc = cp.decode_one(bytes).unwrap();
        assert_eq!(dc.scalar, 'é');
        assert_eq!(dc.consumed, bytes.len());
    }

    #[test]
    fn utf8_invalid_sequence_becomes_replacement_char() {
        let cp = CodePage::Utf8;
        let dc = cp.decode_one(&[0xFF, b'a']).unwrap();
        assert_eq!(dc.scalar, '\u{FFFD}');
        assert_eq!(dc.consumed, 1);
    }

    #[test]
    fn decode_all_round_trips_ascii() {
        let cp = CodePage::Utf8;
        assert_eq!(cp.decode_all(b"hello"), "hello");
    }

    #[test]
    fn pragma_code_page_changes_take_effect_on_their_line() {
        let source = b"a\n#pragma code_page(65001)\nb\n";
        let (stripped, map) = scan_and_strip_pragmas(source, CodePage::Windows1252);
        assert_eq!(map.at_line(1), CodePage::Windows1252);
        assert_eq!(map.at_line(2), CodePage::Utf8);
        assert_eq!(map.at_line(3), CodePage::Utf8);
        // Line count and overall length are preserved so byte offsets stay valid.
        assert_eq!(stripped.len(), source.len());
        assert_eq!(stripped.iter().filter(|&&b| b == b'\n').count(), 3);
    }

    #[test]
    fn unrecognized_pragma_line_is_left_untouched() {
        let source = b"#pragma once\n";
        let (stripped, map) = scan_and_strip_pragmas(source, CodePage::Utf8);
        assert_eq!(stripped, source);
        assert_eq!(map.at_line(1), CodePage::Utf8);
    }
}
