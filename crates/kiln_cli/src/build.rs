//! `kiln build` — drive a full compilation from `kiln.toml`.

use crate::{BuildArgs, CliOptimize, GlobalArgs, ReportFormat};
use kiln_common::Directory;
use kiln_config::{find_project_root, load_project, EmitLoc, OptimizeMode, OutputMode};
use kiln_diagnostics::{renderer, Diagnostic, DiagnosticSink, TerminalRenderer};
use kiln_driver::{Compilation, CreateOptions, DriverError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs the `kiln build` command. Returns the process exit code.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let project = load_project(&project_dir)?;

    if !global.quiet {
        eprintln!(
            "   Building {} v{}",
            project.project.name, project.project.version
        );
    }

    let mut options = project.to_options(&project_dir)?;
    if let Some(target) = &args.target {
        options.target = target.parse()?;
    }
    if let Some(optimize) = args.optimize {
        options.optimize_mode = match optimize {
            CliOptimize::Debug => OptimizeMode::Debug,
            CliOptimize::ReleaseSafe => OptimizeMode::ReleaseSafe,
            CliOptimize::ReleaseFast => OptimizeMode::ReleaseFast,
            CliOptimize::ReleaseSmall => OptimizeMode::ReleaseSmall,
        };
    }
    options.verbose_cc = global.verbose;

    options.emit_bin = match &args.emit_bin {
        Some(path) => Some(EmitLoc::from_path(Path::new(path))),
        None => {
            let basename = default_bin_basename(&options);
            let build_dir = Directory::new(project_dir.join("build"));
            Some(EmitLoc::in_dir(build_dir, basename))
        }
    };
    options.emit_h = args.emit_h.as_deref().map(emit_from_arg);
    options.emit_asm = args.emit_asm.as_deref().map(emit_from_arg);
    options.emit_llvm_ir = args.emit_llvm_ir.as_deref().map(emit_from_arg);
    options.emit_analysis = args.emit_analysis.as_deref().map(emit_from_arg);
    options.emit_docs = args.emit_docs.as_deref().map(emit_from_arg);

    if !global.quiet {
        eprintln!("    Target {}", options.target);
    }

    let sink = Arc::new(DiagnosticSink::new());
    let create = CreateOptions {
        sink: Arc::clone(&sink),
        ..CreateOptions::new(
            options,
            lib_dir(),
            Directory::new(project_dir.join(".kiln-cache")),
            global_cache_dir(),
        )
    };
    let mut comp = Compilation::create(create)?;

    match comp.update() {
        Ok(()) => {}
        Err(DriverError::EarlyExit(code)) => return Ok(code),
        Err(DriverError::RuntimeLibBuildFailed { lib, errors }) => {
            eprintln!("error: building runtime library '{lib}' failed:");
            report(&errors, args.format, global);
            return Ok(1);
        }
        Err(err) => return Err(err.into()),
    }

    let mut diagnostics = sink.take_all();
    diagnostics.extend(comp.aggregate_errors());
    report(&diagnostics, args.format, global);

    if comp.total_error_count() > 0 {
        return Ok(1);
    }

    if !global.quiet {
        if let Some(bin) = comp.bin_file_path() {
            eprintln!("   Generated {}", bin.display());
        }
        eprintln!("   Build complete.");
    }
    Ok(0)
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir →
/// itself). Otherwise walks up from the current directory looking for
/// `kiln.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(config_path) = &global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        Ok(find_project_root(&std::env::current_dir()?)?)
    }
}

fn emit_from_arg(path: &str) -> EmitLoc {
    EmitLoc::from_path(Path::new(path))
}

fn default_bin_basename(options: &kiln_config::CompilationOptions) -> String {
    match options.output_mode {
        OutputMode::Exe => options.root_name.clone(),
        OutputMode::Lib => format!("lib{}.a", options.root_name),
        OutputMode::Obj => format!("{}{}", options.root_name, options.target.object_file_ext()),
    }
}

/// Kiln's bundled `lib/` directory: `$KILN_LIB_DIR`, or `lib/` next to the
/// executable.
pub fn lib_dir() -> Directory {
    if let Some(dir) = std::env::var_os("KILN_LIB_DIR") {
        return Directory::new(PathBuf::from(dir));
    }
    let exe_adjacent = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.join("lib")));
    Directory::new(exe_adjacent.unwrap_or_else(|| PathBuf::from("lib")))
}

/// The per-user cache: `$KILN_GLOBAL_CACHE`, or `~/.cache/kiln`.
pub fn global_cache_dir() -> Directory {
    if let Some(dir) = std::env::var_os("KILN_GLOBAL_CACHE") {
        return Directory::new(PathBuf::from(dir));
    }
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    Directory::new(home.join(".cache").join("kiln"))
}

fn report(diagnostics: &[Diagnostic], format: ReportFormat, global: &GlobalArgs) {
    if diagnostics.is_empty() {
        return;
    }
    match format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(global.color);
            for diag in diagnostics {
                eprintln!("{}", renderer.render(diag));
            }
            if !global.quiet {
                let errors = diagnostics
                    .iter()
                    .filter(|d| d.severity.is_error())
                    .count();
                let warnings = diagnostics
                    .iter()
                    .filter(|d| d.severity == kiln_diagnostics::Severity::Warning)
                    .count();
                eprintln!("   Result: {errors} error(s), {warnings} warning(s)");
            }
        }
        ReportFormat::Json => {
            println!("{}", renderer::render_json(diagnostics));
        }
    }
}
