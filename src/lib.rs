//! A compiler from Windows Resource Script (`.rc`) source text to PE
//! `.res` binary resource files.
//!
//! The pipeline is single-threaded and synchronous: comment stripping and
//! `#pragma code_page` handling, lexing, parsing, compiling, and binary
//! emission each run to completion in turn, threading one
//! [`diagnostics::DiagnosticSink`] through by mutable reference and
//! rendering it once at the end rather than failing fast on the first
//! problem found.

pub mod ast;
pub mod cli;
pub mod code_pages;
pub mod comment;
pub mod compile;
pub mod diagnostics;
pub mod error;
pub mod lang;
pub mod lex;
pub mod parse;
pub mod res;
pub mod source_mapping;

use diagnostics::DiagnosticSink;
use res::ResourceRecord;

/// Knobs threaded through the whole pipeline, derived from [`cli::Options`]
/// (or built directly by library callers who don't go through the CLI).
pub struct CompileSettings {
    pub default_code_page: code_pages::CodePage,
    pub parse: parse::ParseOptions,
    pub compile: compile::CompileOptions,
}

impl From<&cli::Options> for CompileSettings {
    fn from(options: &cli::Options) -> Self {
        let default_code_page =
            code_pages::CodePage::from_id(options.default_code_page).unwrap_or(code_pages::CodePage::Windows1252);
        CompileSettings {
            default_code_page,
            parse: parse::ParseOptions {
                max_string_literal_codepoints: options.max_string_literal_codepoints,
            },
            compile: compile::CompileOptions {
                default_language: options.default_language,
                default_code_page: options.default_code_page,
                null_terminate_string_table_strings: options.null_terminate_string_table_strings,
            },
        }
    }
}

/// Runs the comment-stripping → pragma-scan → parse → compile stages
/// over `source`, returning both the compiled records and the fully
/// processed buffer diagnostic byte offsets are relative to (comment
/// stripping and pragma blanking can each change the buffer's length, so
/// this is *not* the same buffer as `source` whenever either one fires).
fn run_pipeline(
    source: &[u8],
    settings: &CompileSettings,
    diagnostics: &mut DiagnosticSink,
) -> (Vec<ResourceRecord>, Vec<u8>) {
    let stripped = comment::remove_comments(source);
    let (stripped, code_pages) = code_pages::scan_and_strip_pragmas(&stripped, settings.default_code_page);
    let file = parse::parse(&stripped, &code_pages, diagnostics, &settings.parse);
    let records = compile::compile(&file, diagnostics, &settings.compile);
    (records, stripped)
}

/// Runs the comment-stripping → lex → parse → compile pipeline over
/// already-preprocessed `source`, collecting every problem found into
/// `diagnostics` rather than stopping at the first one.
///
/// Returns the compiled records regardless of whether errors were
/// recorded; callers should check `diagnostics.has_errors()` before
/// trusting (or writing out) the result, matching the reference
/// compiler's "diagnose everything, then decide whether to emit" behavior.
///
/// Diagnostic byte offsets produced during this call are relative to an
/// internal, further-processed copy of `source`, not `source` itself;
/// callers that need to render those diagnostics should use
/// [`compile_source_with_source_mapping`] instead, which also hands back
/// that buffer.
pub fn compile_source(
    source: &[u8],
    settings: &CompileSettings,
    diagnostics: &mut DiagnosticSink,
) -> Vec<ResourceRecord> {
    run_pipeline(source, settings, diagnostics).0
}

/// Runs [`compile_source`] and serializes the result to a `.res` byte
/// buffer. Returns `Err` only for the unrecoverable binary-layout failures
/// [`error::Error`] represents; user-facing problems are reported purely
/// through `diagnostics`.
pub fn compile_to_res(
    source: &[u8],
    settings: &CompileSettings,
    diagnostics: &mut DiagnosticSink,
) -> error::Result<Vec<u8>> {
    let records = compile_source(source, settings, diagnostics);
    res::write_res_file(&records)
}

/// Strips any preprocessor linemarkers (`# N "file"` / `#line N "file"`)
/// from `source`, then runs the rest of the pipeline, returning the
/// compiled records, the final processed buffer diagnostic offsets are
/// relative to (pass this to [`diagnostics::render`], not the original
/// `source`), and the [`source_mapping::SourceMapping`] the linemarkers
/// described. Callers that invoke an external preprocessor and want
/// diagnostics to point back at the pre-preprocessor source should use
/// this entry point (and the matching [`compile_to_res_with_source_mapping`])
/// instead of [`compile_source`] directly; source with no linemarkers at
/// all yields an empty mapping, which [`diagnostics::render`] treats as
/// "none available".
pub fn compile_source_with_source_mapping(
    source: &[u8],
    settings: &CompileSettings,
    diagnostics: &mut DiagnosticSink,
) -> (Vec<ResourceRecord>, Vec<u8>, source_mapping::SourceMapping) {
    let (source, mapping) = source_mapping::extract_line_markers(source);
    let (records, rendered_source) = run_pipeline(&source, settings, diagnostics);
    (records, rendered_source, mapping)
}

/// [`compile_source_with_source_mapping`] followed by `.res` serialization.
pub fn compile_to_res_with_source_mapping(
    source: &[u8],
    settings: &CompileSettings,
    diagnostics: &mut DiagnosticSink,
) -> (error::Result<Vec<u8>>, Vec<u8>, source_mapping::SourceMapping) {
    let (records, rendered_source, mapping) = compile_source_with_source_mapping(source, settings, diagnostics);
    (res::write_res_file(&records), rendered_source, mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_pages::CodePage;

    fn settings() -> CompileSettings {
        CompileSettings {
            default_code_page: CodePage::Windows1252,
            parse: parse::ParseOptions::default(),
            compile: compile::CompileOptions::default(),
        }
    }

    #[test]
    fn compiles_a_trivial_rcdata_resource_end_to_end() {
        let source = br#"MYDATA RCDATA { 1, 2, 3 }"#;
        let mut diagnostics = DiagnosticSink::new();
        let bytes = compile_to_res(source, &settings(), &mut diagnostics).unwrap();
        assert!(!diagnostics.has_errors());
        let records = res::read_res_file(&bytes).unwrap();
        // One real record plus the leading all-zero sentinel.
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn comments_do_not_survive_into_the_parsed_tree() {
        let source = b"// header comment\nMYDATA RCDATA { 1 /* inline */ }";
        let mut diagnostics = DiagnosticSink::new();
        let _ = compile_to_res(source, &settings(), &mut diagnostics);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn source_mapping_wrapper_attributes_diagnostics_to_original_file() {
        let source = b"# 42 \"original.rc\"\nMYDATA RCDATA { 1, 2";
        let mut diagnostics = DiagnosticSink::new();
        let (_bytes, _rendered_source, mapping) = compile_to_res_with_source_mapping(source, &settings(), &mut diagnostics);
        assert!(diagnostics.has_errors());
        assert!(!mapping.is_empty());
        let origin = mapping.origin_of(2).unwrap();
        assert_eq!(mapping.filename(origin.filename_index), Some("original.rc"));
    }

    #[test]
    fn unterminated_block_is_diagnosed_not_panicked() {
        let source = b"MYDATA RCDATA { 1, 2";
        let mut diagnostics = DiagnosticSink::new();
        let _ = compile_to_res(source, &settings(), &mut diagnostics);
        assert!(diagnostics.has_errors());
    }
}
