//! `kiln cc` / `kiln c++` / `kiln translate-c` — clang-compatible front-ends.
//!
//! These subcommands put the driver in passthrough mode: the child compiler
//! inherits stdio and its exit code becomes ours. A minimal amount of
//! argument classification happens here (sources, `-o`, `-E`); everything
//! else is forwarded verbatim via `clang_argv`.

use crate::{CcArgs, GlobalArgs};
use kiln_config::{
    CSourceFile, CompilationOptions, EmitLoc, OutputMode, PreprocessorMode,
};
use kiln_diagnostics::DiagnosticSink;
use kiln_driver::{Compilation, CreateOptions, DriverError};
use kiln_target::Triple;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which clang-compatible front-end was invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CcMode {
    /// `kiln cc`.
    C,
    /// `kiln c++`.
    Cxx,
    /// `kiln translate-c`.
    TranslateC,
}

/// The classified form of a clang-style command line.
#[derive(Debug, Default)]
pub struct ParsedCcArgs {
    /// Source files, in order.
    pub sources: Vec<PathBuf>,
    /// The `-o` value, if present.
    pub output: Option<PathBuf>,
    /// `-E` was given.
    pub preprocess: bool,
    /// `-c` was given.
    pub compile_only: bool,
    /// A `--target=` override.
    pub target: Option<String>,
    /// Everything else, forwarded verbatim.
    pub rest: Vec<String>,
}

/// Classifies a clang-style argument list.
///
/// Only the arguments the driver itself must understand are pulled out;
/// unknown flags stay in `rest` and reach the child compiler untouched.
pub fn parse_cc_args(args: &[String]) -> ParsedCcArgs {
    let mut parsed = ParsedCcArgs::default();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-o" => {
                if let Some(path) = iter.next() {
                    parsed.output = Some(PathBuf::from(path));
                }
            }
            "-E" => parsed.preprocess = true,
            "-c" => parsed.compile_only = true,
            _ if arg.starts_with("--target=") => {
                parsed.target = Some(arg["--target=".len()..].to_string());
            }
            _ if !arg.starts_with('-') && is_source_file(Path::new(arg)) => {
                parsed.sources.push(PathBuf::from(arg));
            }
            _ => parsed.rest.push(arg.clone()),
        }
    }
    parsed
}

fn is_source_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("c" | "C" | "cc" | "cpp" | "cxx" | "h" | "hpp" | "s" | "S")
    )
}

/// Runs a clang-compatible subcommand. Returns the process exit code.
pub fn run(
    args: &CcArgs,
    global: &GlobalArgs,
    mode: CcMode,
) -> Result<i32, Box<dyn std::error::Error>> {
    let parsed = parse_cc_args(&args.args);
    if parsed.sources.is_empty() {
        eprintln!("error: no input files");
        return Ok(1);
    }

    let target: Triple = match &parsed.target {
        Some(t) => t.parse()?,
        None => host_target(),
    };

    let root_name = parsed
        .sources
        .first()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "a".to_string());

    let mut options = CompilationOptions::new(root_name, target);
    options.output_mode = OutputMode::Obj;
    options.clang_passthrough_mode = true;
    options.link_libcpp = mode == CcMode::Cxx;
    options.c_source_files = parsed
        .sources
        .iter()
        .map(|p| CSourceFile::new(p.clone()))
        .collect();
    options.clang_argv = parsed.rest.clone();
    options.verbose_cc = global.verbose;
    options.clang_preprocessor_mode = if parsed.preprocess {
        if parsed.output.is_some() {
            PreprocessorMode::File
        } else {
            PreprocessorMode::Stdout
        }
    } else {
        PreprocessorMode::Off
    };
    options.emit_bin = parsed.output.as_deref().map(EmitLoc::from_path);

    if mode == CcMode::TranslateC {
        // Translation goes through the cached translate path, not the
        // passthrough object pipeline.
        options.clang_passthrough_mode = false;
        options.clang_preprocessor_mode = PreprocessorMode::Off;
    }

    let sink = Arc::new(DiagnosticSink::new());
    let create = CreateOptions {
        sink: Arc::clone(&sink),
        ..CreateOptions::new(
            options,
            crate::build::lib_dir(),
            cwd_cache_dir(),
            crate::build::global_cache_dir(),
        )
    };
    let mut comp = Compilation::create(create)?;

    if mode == CcMode::TranslateC {
        return run_translate_c(&mut comp, &parsed);
    }

    match comp.update() {
        Ok(()) => {}
        Err(DriverError::EarlyExit(code)) => return Ok(code),
        Err(err) => return Err(err.into()),
    }

    if comp.total_error_count() > 0 {
        return Ok(1);
    }
    Ok(0)
}

/// Translates each source through the cached translate path and writes the
/// result to stdout (or the `-o` path).
fn run_translate_c(
    comp: &mut Compilation,
    parsed: &ParsedCcArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let clang = comp
        .options()
        .clang_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("clang"));
    let mut translator = PreprocessTranslator { clang };

    for src in &parsed.sources {
        let translated = match comp.translate_c(&mut translator, src) {
            Ok(file) => file,
            Err(err) => {
                eprintln!("error: {err}");
                return Ok(1);
            }
        };
        let text = std::fs::read_to_string(&translated.full_object_path)?;
        match &parsed.output {
            Some(out) => std::fs::write(out, text)?,
            None => print!("{text}"),
        }
    }
    Ok(0)
}

/// A translation service backed by the C preprocessor.
///
/// Runs clang in preprocess-only mode and returns the expanded source; the
/// semantic translation into native declarations lives in the language
/// front-end, which registers a richer [`kiln_driver::CTranslator`].
struct PreprocessTranslator {
    clang: PathBuf,
}

impl kiln_driver::CTranslator for PreprocessTranslator {
    fn translate(
        &mut self,
        argv: &[String],
        src_path: &Path,
    ) -> Result<kiln_driver::TranslateOutput, String> {
        let output = std::process::Command::new(&self.clang)
            .args(argv)
            .arg("-E")
            .arg(src_path)
            .output()
            .map_err(|e| format!("unable to spawn {}: {e}", self.clang.display()))?;
        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).into_owned());
        }
        Ok(kiln_driver::TranslateOutput {
            source: String::from_utf8_lossy(&output.stdout).into_owned(),
            deps: vec![src_path.to_path_buf()],
        })
    }
}

/// The local cache for standalone compilations: `.kiln-cache` in the
/// working directory.
fn cwd_cache_dir() -> kiln_common::Directory {
    kiln_common::Directory::new(PathBuf::from(".kiln-cache"))
}

/// The triple Kiln was built for, used when no `--target=` is given.
fn host_target() -> Triple {
    let arch = if cfg!(target_arch = "aarch64") {
        "aarch64"
    } else {
        "x86_64"
    };
    let os = if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "linux"
    };
    format!("{arch}-{os}")
        .parse()
        .unwrap_or_else(|_| Triple::new(
            kiln_target::Arch::X86_64,
            kiln_target::Os::Linux,
            kiln_target::Abi::Gnu,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_sources_and_output() {
        let parsed = parse_cc_args(&strings(&["-c", "foo.c", "-o", "foo.o", "-DX=1"]));
        assert_eq!(parsed.sources, vec![PathBuf::from("foo.c")]);
        assert_eq!(parsed.output, Some(PathBuf::from("foo.o")));
        assert!(parsed.compile_only);
        assert!(!parsed.preprocess);
        assert_eq!(parsed.rest, vec!["-DX=1".to_string()]);
    }

    #[test]
    fn parses_preprocess_flag() {
        let parsed = parse_cc_args(&strings(&["-E", "foo.c"]));
        assert!(parsed.preprocess);
        assert!(parsed.output.is_none());
    }

    #[test]
    fn parses_target_override() {
        let parsed = parse_cc_args(&strings(&["--target=x86_64-linux-musl", "a.c"]));
        assert_eq!(parsed.target.as_deref(), Some("x86_64-linux-musl"));
    }

    #[test]
    fn non_source_positional_args_are_forwarded() {
        let parsed = parse_cc_args(&strings(&["foo.c", "libz.a"]));
        assert_eq!(parsed.sources, vec![PathBuf::from("foo.c")]);
        assert_eq!(parsed.rest, vec!["libz.a".to_string()]);
    }

    #[test]
    fn host_target_parses() {
        let t = host_target();
        assert!(!t.to_string().is_empty());
    }
}
