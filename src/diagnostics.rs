//! Cross-cutting diagnostics: an append-only record of everything wrong
//! (or merely notable) about a compilation, plus a separate rendering pass
//! (spec.md §4.6).
//!
//! Stages never fail across component boundaries over a user-facing
//! problem; they push a [`Diagnostic`] onto a [`DiagnosticSink`] instead.
//! `error::Error` is reserved for conditions no amount of diagnostic
//! bookkeeping can recover from.

use crate::source_mapping::SourceMapping;
use owo_colors::OwoColorize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

/// The closed taxonomy of diagnostic kinds (spec.md §7 "Taxonomy").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    UnfinishedStringLiteral,
    StringLiteralTooLong,
    IllegalByte,
    IllegalByteOutsideStringLiterals,
    FoundCStyleEscapedQuote,
    UnfinishedRawDataBlock,
    UnfinishedStringTableBlock,
    ExpectedToken,
    ExpectedSomethingElse,
    ResourceTypeCantUseRawData,
    IdMustBeOrdinal,
    StringResourceAsNumericType,
    StringAlreadyDefined,
    Cli,
}

impl DiagnosticCode {
    pub fn name(self) -> &'static str {
        match self {
            DiagnosticCode::UnfinishedStringLiteral => "unfinished_string_literal",
            DiagnosticCode::StringLiteralTooLong => "string_literal_too_long",
            DiagnosticCode::IllegalByte => "illegal_byte",
            DiagnosticCode::IllegalByteOutsideStringLiterals => {
                "illegal_byte_outside_string_literals"
            }
            DiagnosticCode::FoundCStyleEscapedQuote => "found_c_style_escaped_quote",
            DiagnosticCode::UnfinishedRawDataBlock => "unfinished_raw_data_block",
            DiagnosticCode::UnfinishedStringTableBlock => "unfinished_string_table_block",
            DiagnosticCode::ExpectedToken => "expected_token",
            DiagnosticCode::ExpectedSomethingElse => "expected_something_else",
            DiagnosticCode::ResourceTypeCantUseRawData => "resource_type_cant_use_raw_data",
            DiagnosticCode::IdMustBeOrdinal => "id_must_be_ordinal",
            DiagnosticCode::StringResourceAsNumericType => "string_resource_as_numeric_type",
            DiagnosticCode::StringAlreadyDefined => "string_already_defined",
            DiagnosticCode::Cli => "cli",
        }
    }
}

/// Where a diagnostic points: a position in the (preprocessed) source
/// buffer, a span within an argv entry, or nowhere in particular.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Byte offset into the source buffer the diagnostic's line/column are
    /// derived from at render time.
    Source { offset: usize },
    Cli {
        arg_index: usize,
        prefix_len: usize,
        name_len: usize,
        value_offset: Option<usize>,
    },
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn source(severity: Severity, code: DiagnosticCode, message: impl Into<String>, offset: usize) -> Self {
        Diagnostic {
            severity,
            code,
            message: message.into(),
            location: Location::Source { offset },
        }
    }

    pub fn cli(
        severity: Severity,
        message: impl Into<String>,
        arg_index: usize,
        prefix_len: usize,
        name_len: usize,
        value_offset: Option<usize>,
    ) -> Self {
        Diagnostic {
            severity,
            code: DiagnosticCode::Cli,
            message: message.into(),
            location: Location::Cli {
                arg_index,
                prefix_len,
                name_len,
                value_offset,
            },
        }
    }
}

/// Append-only diagnostic collection threaded through the whole pipeline
/// (spec.md §5: "the diagnostic collection passed by mutable reference into
/// each stage").
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn error_source(&mut self, code: DiagnosticCode, message: impl Into<String>, offset: usize) {
        self.push(Diagnostic::source(Severity::Error, code, message, offset));
    }

    pub fn warning_source(&mut self, code: DiagnosticCode, message: impl Into<String>, offset: usize) {
        self.push(Diagnostic::source(Severity::Warning, code, message, offset));
    }

    /// A `note:` with no location of its own, appended immediately after
    /// the diagnostic it explains (spec.md §5 "Ordering").
    pub fn note(&mut self, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Note,
            code: DiagnosticCode::Cli,
            message: message.into(),
            location: Location::None,
        });
    }

    pub fn note_source(&mut self, message: impl Into<String>, offset: usize) {
        self.push(Diagnostic::source(Severity::Note, DiagnosticCode::Cli, message, offset));
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }
}

/// 1-based (line, column) of a byte offset into `source`.
fn line_col_of(source: &[u8], offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let mut line = 1u32;
    let mut col = 1u32;
    for &b in &source[..offset] {
        if b == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// The bytes of the line containing `offset`, with control bytes replaced
/// by `U+FFFD` and `\r` elided (spec.md §4.6 "Rendering").
fn render_source_line(source: &[u8], offset: usize) -> String {
    let offset = offset.min(source.len());
    let line_start = source[..offset].iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    let line_end = source[offset..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(source.len(), |i| offset + i);
    let mut out = String::new();
    for &b in &source[line_start..line_end] {
        match b {
            b'\r' => {}
            0x00..=0x1F | 0x7F => out.push('\u{FFFD}'),
            _ => out.push(b as char),
        }
    }
    out
}

/// Renders every diagnostic in `sink` to `out`, in append order.
///
/// `source` is the preprocessed, comment-stripped buffer diagnostic
/// offsets are relative to; `argv` is the original command line;
/// `mapping`, if present, lets source diagnostics attach a `note:`
/// pointing back at the original (pre-preprocessor) file and line range.
pub fn render(
    sink: &DiagnosticSink,
    source: &[u8],
    argv: &[String],
    mapping: Option<&SourceMapping>,
    color: bool,
    out: &mut impl Write,
) -> std::io::Result<()> {
    for diagnostic in sink.iter() {
        render_one(diagnostic, source, argv, mapping, color, out)?;
    }
    Ok(())
}

fn kind_tag(severity: Severity, color: bool) -> String {
    let label = format!("{}:", severity.label());
    if !color {
        return label;
    }
    match severity {
        Severity::Error => label.red().bold().to_string(),
        Severity::Warning => label.yellow().bold().to_string(),
        Severity::Note => label.cyan().bold().to_string(),
    }
}

fn render_one(
    diagnostic: &Diagnostic,
    source: &[u8],
    argv: &[String],
    mapping: Option<&SourceMapping>,
    color: bool,
    out: &mut impl Write,
) -> std::io::Result<()> {
    match &diagnostic.location {
        Location::Source { offset } => {
            let (line, col) = line_col_of(source, *offset);
            writeln!(
                out,
                "<after preprocessor>:{line}:{col}: {} {}",
                kind_tag(diagnostic.severity, color),
                diagnostic.message
            )?;
            let rendered_line = render_source_line(source, *offset);
            writeln!(out, "{rendered_line}")?;
            writeln!(out, "{}^", " ".repeat(col.saturating_sub(1) as usize))?;

            if let Some(mapping) = mapping {
                if let Some(origin) = mapping.origin_of(line) {
                    let filename = mapping.filename(origin.filename_index).unwrap_or("<unknown>");
                    writeln!(
                        out,
                        "{} in file {}, line{} {}",
                        kind_tag(Severity::Note, color),
                        filename,
                        if origin.original_start_line == origin.original_end_line { "" } else { "s" },
                        if origin.original_start_line == origin.original_end_line {
                            origin.original_start_line.to_string()
                        } else {
                            format!("{}-{}", origin.original_start_line, origin.original_end_line)
                        }
                    )?;
                    match std::fs::read_to_string(filename) {
                        Ok(contents) => {
                            for (i, text) in contents
                                .lines()
                                .enumerate()
                                .skip((origin.original_start_line.saturating_sub(1)) as usize)
                                .take((origin.original_end_line - origin.original_start_line + 1) as usize)
                            {
                                writeln!(out, "{:>5} | {}", i + 1, text)?;
                            }
                        }
                        Err(e) => {
                            writeln!(out, "{} could not read {}: {}", kind_tag(Severity::Note, color), filename, e)?;
                        }
                    }
                }
            }
        }
        Location::Cli {
            arg_index,
            prefix_len,
            name_len,
            value_offset,
        } => {
            let arg = argv.get(*arg_index).map(String::as_str).unwrap_or("");
            let before = if *arg_index > 0 { "... " } else { "" };
            let after = if *arg_index + 1 < argv.len() { " ..." } else { "" };
            writeln!(
                out,
                "<cli>: {} {}",
                kind_tag(diagnostic.severity, color),
                diagnostic.message
            )?;
            if color {
                writeln!(out, "{}{}{}", before.dimmed(), arg, after.dimmed())?;
            } else {
                writeln!(out, "{before}{arg}{after}")?;
            }
            let lead = before.len();
            let mut underline = vec![b' '; lead + arg.len()];
            for i in lead + prefix_len..lead + prefix_len + name_len {
                if i < underline.len() {
                    underline[i] = b'^';
                }
            }
            if let Some(value_offset) = value_offset {
                let vi = lead + value_offset;
                if vi < underline.len() {
                    underline[vi] = b'~';
                }
            }
            writeln!(out, "{}", String::from_utf8_lossy(&underline))?;
        }
        Location::None => {
            writeln!(out, "{} {}", kind_tag(diagnostic.severity, color), diagnostic.message)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_errors_is_false_until_an_error_is_pushed() {
        let mut sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        sink.warning_source(DiagnosticCode::StringAlreadyDefined, "dup", 0);
        assert!(!sink.has_errors());
        sink.error_source(DiagnosticCode::ExpectedToken, "bad", 0);
        assert!(sink.has_errors());
    }

    #[test]
    fn line_col_tracks_newlines() {
        let source = b"abc\ndef\nghi";
        assert_eq!(line_col_of(source, 0), (1, 1));
        assert_eq!(line_col_of(source, 4), (2, 1));
        assert_eq!(line_col_of(source, 9), (3, 2));
    }

    #[test]
    fn render_source_diagnostic_includes_caret() {
        let mut sink = DiagnosticSink::new();
        sink.error_source(DiagnosticCode::ExpectedToken, "expected END", 4);
        let source = b"BEGIN\nbad";
        let mut buf = Vec::new();
        render(&sink, source, &[], None, false, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("<after preprocessor>:1:5:"));
        assert!(text.contains("error: expected END"));
        assert!(text.contains('^'));
    }

    #[test]
    fn render_cli_diagnostic_underlines_name() {
        let mut sink = DiagnosticSink::new();
        sink.push(Diagnostic::cli(Severity::Error, "unknown option", 0, 1, 2, None));
        let argv = vec!["/zz".to_string()];
        let mut buf = Vec::new();
        render(&sink, b"", &argv, None, false, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("<cli>:"));
        assert!(text.contains("^^"));
    }

    #[test]
    fn control_bytes_become_replacement_char() {
        let rendered = render_source_line(b"a\x01b\rc", 0);
        assert_eq!(rendered, "a\u{FFFD}bc");
    }
}
