//! `rc.exe`-compatible command line front-end.

use std::io::IsTerminal;
use std::process::ExitCode;

use rcc::diagnostics::DiagnosticSink;
use rcc::{cli, CompileSettings};

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut diagnostics = DiagnosticSink::new();
    let options = cli::parse_args(&argv, &mut diagnostics);

    if options.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    if !options.nologo {
        eprintln!("rcc resource compiler");
    }

    if diagnostics.has_errors() {
        render_and_exit(&diagnostics, &[], &argv, &rcc::source_mapping::SourceMapping::new());
    }

    let source = match std::fs::read(&options.input) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("fatal: could not read {}: {}", options.input.display(), err);
            return ExitCode::from(3);
        }
    };

    let settings = CompileSettings::from(&options);
    let (bytes, rendered_source, mapping) =
        rcc::compile_to_res_with_source_mapping(&source, &settings, &mut diagnostics);

    let bytes = match bytes {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("fatal: {err}");
            return ExitCode::from(4);
        }
    };

    if diagnostics.has_errors() {
        render_and_exit(&diagnostics, &rendered_source, &argv, &mapping);
    }

    let output_path = options.resolve_output_path();
    if let Err(err) = std::fs::write(&output_path, &bytes) {
        eprintln!("fatal: could not write {}: {}", output_path.display(), err);
        return ExitCode::from(3);
    }

    if !diagnostics.is_empty() {
        render(&diagnostics, &rendered_source, &argv, &mapping);
    }

    log::info!("wrote {}", output_path.display());
    ExitCode::SUCCESS
}

fn render(
    diagnostics: &DiagnosticSink,
    rendered_source: &[u8],
    argv: &[String],
    mapping: &rcc::source_mapping::SourceMapping,
) {
    let color = std::io::stderr().is_terminal();
    let stderr = std::io::stderr();
    let mut lock = stderr.lock();
    let mapping = if mapping.is_empty() { None } else { Some(mapping) };
    let _ = rcc::diagnostics::render(diagnostics, rendered_source, argv, mapping, color, &mut lock);
}

fn render_and_exit(
    diagnostics: &DiagnosticSink,
    rendered_source: &[u8],
    argv: &[String],
    mapping: &rcc::source_mapping::SourceMapping,
) -> ! {
    render(diagnostics, rendered_source, argv, mapping);
    std::process::exit(1);
}
