//! `rc.exe`-compatible command line parsing (spec.md §4.7).
//!
//! Options are matched by longest unambiguous prefix, independent of which
//! of `/`, `-`, `--` introduced them, and a value-taking option's value may
//! either trail it in the same argv entry or occupy the next one.

use crate::diagnostics::{Diagnostic, DiagnosticSink, Severity};
use crate::lang::LanguageId;
use std::path::PathBuf;

/// The fixed set of recognized option names, longest-prefix matched
/// (spec.md §4.7).
const OPTION_NAMES: &[&str] = &[
    "no-preprocess",
    "nologo",
    "fo",
    "sl",
    "ln",
    "l",
    "c",
    "v",
    "x",
    "i",
    "r",
    "n",
    "y",
    "w",
    "d",
    "u",
];

fn takes_value(name: &str) -> bool {
    matches!(name, "fo" | "sl" | "ln" | "l" | "c" | "i" | "d" | "u")
}

#[derive(Debug, Clone)]
pub struct Options {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub max_string_literal_codepoints: usize,
    pub default_language: LanguageId,
    pub default_code_page: u32,
    pub include_paths: Vec<PathBuf>,
    pub defines: Vec<(String, Option<String>)>,
    pub undefines: Vec<String>,
    pub verbose: bool,
    pub ignore_include_env: bool,
    pub null_terminate_string_table_strings: bool,
    pub silence_duplicate_control_id_warnings: bool,
    pub demote_invalid_code_page_to_warning: bool,
    pub nologo: bool,
    pub no_preprocess: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            input: PathBuf::new(),
            output: None,
            max_string_literal_codepoints: crate::lex::DEFAULT_MAX_STRING_LITERAL_CODEPOINTS,
            default_language: LanguageId::NEUTRAL,
            default_code_page: 1252,
            include_paths: Vec::new(),
            defines: Vec::new(),
            undefines: Vec::new(),
            verbose: false,
            ignore_include_env: false,
            null_terminate_string_table_strings: false,
            silence_duplicate_control_id_warnings: false,
            demote_invalid_code_page_to_warning: false,
            nologo: false,
            no_preprocess: false,
        }
    }
}

impl Options {
    /// Same directory + stem as the input, `.res` extension (spec.md §4.7
    /// "Default output filename").
    pub fn resolve_output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => self.input.with_extension("res"),
        }
    }
}

/// Splits a prefix (`/`, `-`, or `--`) off `arg`, returning `(prefix_len,
/// rest)`, or `None` if `arg` has none of the recognized prefixes.
fn split_prefix(arg: &str) -> Option<(usize, &str)> {
    if let Some(rest) = arg.strip_prefix("--") {
        Some((2, rest))
    } else if let Some(rest) = arg.strip_prefix('/') {
        Some((1, rest))
    } else if let Some(rest) = arg.strip_prefix('-') {
        Some((1, rest))
    } else {
        None
    }
}

/// Longest-prefix match of `text` (case-insensitive) against
/// [`OPTION_NAMES`], returning `(name, consumed_len)`.
fn match_option_name(text: &str) -> Option<(&'static str, usize)> {
    let lower = text.to_ascii_lowercase();
    OPTION_NAMES
        .iter()
        .filter(|name| lower.starts_with(name.as_str()))
        .max_by_key(|name| name.len())
        .map(|&name| (name, name.len()))
}

/// Parses the whole argv (excluding argv[0]) into [`Options`], pushing any
/// problems to `diagnostics` as CLI-kind records.
pub fn parse_args(argv: &[String], diagnostics: &mut DiagnosticSink) -> Options {
    log::debug!("parsing {} cli argument(s)", argv.len());
    let mut options = Options::default();
    let mut positionals: Vec<PathBuf> = Vec::new();
    let mut undefined_syms = std::collections::HashSet::new();
    let mut end_of_options = false;

    let mut i = 0;
    while i < argv.len() {
        let arg = &argv[i];

        if !end_of_options && arg == "--" {
            end_of_options = true;
            i += 1;
            continue;
        }

        let Some((prefix_len, rest)) = (if end_of_options { None } else { split_prefix(arg) }) else {
            positionals.push(PathBuf::from(arg));
            i += 1;
            continue;
        };

        // Packed single-letter boolean options: `/xv` is `/x` followed by `/v`.
        let mut cursor = rest;
        let mut name_offset_in_rest = 0usize;
        loop {
            if cursor.is_empty() {
                break;
            }
            let Some((name, name_len)) = match_option_name(cursor) else {
                diagnostics.push(Diagnostic::cli(
                    Severity::Error,
                    format!("unrecognized option '{cursor}'"),
                    i,
                    prefix_len + name_offset_in_rest,
                    cursor.len(),
                    None,
                ));
                break;
            };

            let after_name = &cursor[name_len..];
            if takes_value(name) {
                let (value, consumed_next) = if !after_name.is_empty() {
                    (after_name.to_string(), false)
                } else if i + 1 < argv.len() {
                    (argv[i + 1].clone(), true)
                } else {
                    diagnostics.push(Diagnostic::cli(
                        Severity::Error,
                        format!("option '{name}' requires a value"),
                        i,
                        prefix_len + name_offset_in_rest,
                        name_len,
                        None,
                    ));
                    (String::new(), false)
                };
                apply_value_option(name, &value, &mut options, &mut undefined_syms, diagnostics, i, prefix_len + name_offset_in_rest, name_len);
                if consumed_next {
                    i += 1;
                }
                break;
            } else {
                apply_flag_option(name, &mut options);
                name_offset_in_rest += name_len;
                cursor = after_name;
            }
        }

        i += 1;
    }

    match positionals.len() {
        0 => {
            diagnostics.push(Diagnostic::cli(Severity::Error, "missing input filename", 0, 0, 0, None));
        }
        1 => options.input = positionals.remove(0),
        _ => {
            options.input = positionals.remove(0);
            if options.output.is_some() {
                diagnostics.push(Diagnostic::cli(
                    Severity::Error,
                    "output filename conflicts with prior /Fo",
                    0,
                    0,
                    0,
                    None,
                ));
                diagnostics.note("previous output filename set by /Fo");
            } else {
                options.output = Some(positionals.remove(0));
            }
        }
    }

    if !options.ignore_include_env {
        if let Ok(include_env) = std::env::var("INCLUDE") {
            let sep = if cfg!(windows) { ';' } else { ':' };
            options
                .include_paths
                .extend(include_env.split(sep).filter(|s| !s.is_empty()).map(PathBuf::from));
        }
    }

    log::debug!("resolved options: input={:?} output={:?}", options.input, options.output);
    options
}

#[allow(clippy::too_many_arguments)]
fn apply_value_option(
    name: &str,
    value: &str,
    options: &mut Options,
    undefined_syms: &mut std::collections::HashSet<String>,
    diagnostics: &mut DiagnosticSink,
    arg_index: usize,
    prefix_and_name_offset: usize,
    name_len: usize,
) {
    match name {
        "fo" => options.output = Some(PathBuf::from(value)),
        "sl" => match value.parse::<u32>() {
            Ok(percent) if (1..=100).contains(&percent) => {
                // Truncating division, matching the original compiler
                // (spec.md §6 OPEN QUESTIONS: "/SL rounding").
                options.max_string_literal_codepoints =
                    (percent as usize * crate::lex::DEFAULT_MAX_STRING_LITERAL_CODEPOINTS) / 100;
            }
            _ => {
                diagnostics.push(Diagnostic::cli(
                    Severity::Error,
                    format!("invalid /SL value '{value}': expected 1..100"),
                    arg_index,
                    prefix_and_name_offset,
                    name_len,
                    Some(prefix_and_name_offset + name_len),
                ));
                diagnostics.note("/SL takes a percentage of the default 8192-codepoint limit, from 1 to 100");
            }
        },
        "ln" => match crate::lang::from_bcp47(value) {
            Some(lang) => options.default_language = lang,
            None => diagnostics.push(Diagnostic::cli(
                Severity::Error,
                format!("invalid language tag: {value}"),
                arg_index,
                prefix_and_name_offset,
                name_len,
                Some(prefix_and_name_offset + name_len),
            )),
        },
        "l" => match parse_numeric(value) {
            Some(id) => options.default_language = LanguageId::unpack(id as u16),
            None => diagnostics.push(Diagnostic::cli(
                Severity::Error,
                format!("invalid language id: {value}"),
                arg_index,
                prefix_and_name_offset,
                name_len,
                Some(prefix_and_name_offset + name_len),
            )),
        },
        "c" => match parse_numeric(value) {
            Some(id) => options.default_code_page = id,
            None => diagnostics.push(Diagnostic::cli(
                Severity::Error,
                format!("invalid code page: {value}"),
                arg_index,
                prefix_and_name_offset,
                name_len,
                Some(prefix_and_name_offset + name_len),
            )),
        },
        "i" => options.include_paths.push(PathBuf::from(value)),
        "d" => {
            let (sym, val) = match value.split_once('=') {
                Some((s, v)) => (s.to_string(), Some(v.to_string())),
                None => (value.to_string(), None),
            };
            if !is_valid_c_identifier(&sym) {
                diagnostics.push(Diagnostic::cli(
                    Severity::Warning,
                    format!("'{sym}' is not a valid identifier"),
                    arg_index,
                    prefix_and_name_offset,
                    name_len,
                    Some(prefix_and_name_offset + name_len),
                ));
            }
            if !undefined_syms.contains(&sym) {
                options.defines.push((sym, val));
            }
        }
        "u" => {
            undefined_syms.insert(value.to_string());
            options.defines.retain(|(s, _)| s != value);
            options.undefines.push(value.to_string());
        }
        other => unreachable!("'{other}' is not a value-taking option"),
    }
}

fn apply_flag_option(name: &str, options: &mut Options) {
    match name {
        "v" => options.verbose = true,
        "x" => options.ignore_include_env = true,
        "n" => options.null_terminate_string_table_strings = true,
        "y" => options.silence_duplicate_control_id_warnings = true,
        "w" => options.demote_invalid_code_page_to_warning = true,
        "r" => {}
        "nologo" => options.nologo = true,
        "no-preprocess" => options.no_preprocess = true,
        other => unreachable!("'{other}' is not a flag option"),
    }
}

fn parse_numeric(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<u32>().ok()
    }
}

fn is_valid_c_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_basic_input_and_output() {
        let mut diags = DiagnosticSink::new();
        let options = parse_args(&args(&["in.rc", "out.res"]), &mut diags);
        assert!(!diags.has_errors());
        assert_eq!(options.input, PathBuf::from("in.rc"));
        assert_eq!(options.output, Some(PathBuf::from("out.res")));
    }

    #[test]
    fn missing_input_is_an_error() {
        let mut diags = DiagnosticSink::new();
        let _ = parse_args(&args(&["/v"]), &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn default_output_mirrors_input_stem() {
        let mut diags = DiagnosticSink::new();
        let options = parse_args(&args(&["src/app.rc"]), &mut diags);
        assert!(!diags.has_errors());
        assert_eq!(options.resolve_output_path(), PathBuf::from("src/app.res"));
    }

    #[test]
    fn concatenated_value_option() {
        let mut diags = DiagnosticSink::new();
        let options = parse_args(&args(&["/FObar.res", "in.rc"]), &mut diags);
        assert!(!diags.has_errors());
        assert_eq!(options.output, Some(PathBuf::from("bar.res")));
    }

    #[test]
    fn packed_single_letter_options() {
        let mut diags = DiagnosticSink::new();
        let options = parse_args(&args(&["/xv", "in.rc"]), &mut diags);
        assert!(!diags.has_errors());
        assert!(options.verbose);
        assert!(options.ignore_include_env);
    }

    #[test]
    fn undefine_is_sticky_against_later_define() {
        let mut diags = DiagnosticSink::new();
        let options = parse_args(&args(&["/Usym", "/Dsym=1", "in.rc"]), &mut diags);
        assert!(!diags.has_errors());
        assert!(options.defines.is_empty());
    }

    #[test]
    fn sl_percent_uses_truncating_division() {
        let mut diags = DiagnosticSink::new();
        let options = parse_args(&args(&["/SL50", "in.rc"]), &mut diags);
        assert!(!diags.has_errors());
        assert_eq!(options.max_string_literal_codepoints, 4096);
    }

    #[test]
    fn invalid_identifier_define_is_a_warning_not_an_error() {
        let mut diags = DiagnosticSink::new();
        let options = parse_args(&args(&["/D1bad", "in.rc"]), &mut diags);
        assert!(!diags.has_errors());
        assert_eq!(options.defines.len(), 1);
    }

    #[test]
    fn second_positional_conflicts_with_prior_fo() {
        let mut diags = DiagnosticSink::new();
        let _ = parse_args(&args(&["/FOfirst.res", "in.rc", "second.res"]), &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn long_and_short_prefixes_both_work() {
        let mut diags = DiagnosticSink::new();
        let options = parse_args(&args(&["--nologo", "-v", "in.rc"]), &mut diags);
        assert!(!diags.has_errors());
        assert!(options.nologo);
        assert!(options.verbose);
    }
}
