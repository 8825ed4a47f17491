//! Kiln CLI — the command-line interface for the Kiln build orchestrator.
//!
//! Provides `kiln build` for project builds driven by `kiln.toml`,
//! `kiln cc` / `kiln c++` for clang-compatible passthrough compilation, and
//! `kiln translate-c` for C-to-native source translation.

#![warn(missing_docs)]

mod build;
mod cc;

use clap::{Parser, Subcommand, ValueEnum};
use std::process;

/// Kiln — a multi-language build orchestrator.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln build orchestrator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output (echoes child compiler invocations).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `kiln.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the current project.
    Build(BuildArgs),
    /// Compile C sources, clang-compatible.
    Cc(CcArgs),
    /// Compile C++ sources, clang-compatible.
    #[command(name = "c++")]
    Cxx(CcArgs),
    /// Translate a C source file into native-language source.
    TranslateC(CcArgs),
}

/// Arguments for the `kiln build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Target triple override (e.g. `x86_64-linux-musl`).
    #[arg(short, long)]
    pub target: Option<String>,

    /// Where to write the produced binary (defaults to `build/` in the
    /// project, or the cache when unset in `kiln.toml`).
    #[arg(long, value_name = "PATH")]
    pub emit_bin: Option<String>,

    /// Where to write the generated C header.
    #[arg(long, value_name = "PATH")]
    pub emit_h: Option<String>,

    /// Where to write the assembly listing.
    #[arg(long, value_name = "PATH")]
    pub emit_asm: Option<String>,

    /// Where to write the LLVM IR.
    #[arg(long, value_name = "PATH")]
    pub emit_llvm_ir: Option<String>,

    /// Where to write the semantic analysis dump.
    #[arg(long, value_name = "PATH")]
    pub emit_analysis: Option<String>,

    /// Where to write generated documentation.
    #[arg(long, value_name = "PATH")]
    pub emit_docs: Option<String>,

    /// Optimization mode override.
    #[arg(short = 'O', long, value_enum)]
    pub optimize: Option<CliOptimize>,

    /// Output format for diagnostics.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the clang-compatible subcommands.
#[derive(Parser, Debug)]
pub struct CcArgs {
    /// Arguments in clang syntax: sources, `-o`, `-E`, defines, includes.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Optimization modes selectable from the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliOptimize {
    /// No optimization, full safety checks.
    Debug,
    /// Optimized with safety checks retained.
    ReleaseSafe,
    /// Optimized for speed.
    ReleaseFast,
    /// Optimized for size.
    ReleaseSmall,
}

/// Diagnostic report formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// A JSON array of diagnostics.
    Json,
}

/// Color output selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Color when stderr is a terminal.
    Auto,
    /// Always color.
    Always,
    /// Never color.
    Never,
}

impl ColorChoice {
    /// Resolves the choice against the environment.
    pub fn enabled(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::env::var_os("NO_COLOR").is_none(),
        }
    }
}

/// Global flags shared by every subcommand.
#[derive(Debug)]
pub struct GlobalArgs {
    /// Suppress status output.
    pub quiet: bool,
    /// Verbose output.
    pub verbose: bool,
    /// Colored diagnostics.
    pub color: bool,
    /// Custom configuration path.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color: cli.color.enabled(),
        config: cli.config.clone(),
    };

    let result = match &cli.command {
        Command::Build(args) => build::run(args, &global),
        Command::Cc(args) => cc::run(args, &global, cc::CcMode::C),
        Command::Cxx(args) => cc::run(args, &global, cc::CcMode::Cxx),
        Command::TranslateC(args) => cc::run(args, &global, cc::CcMode::TranslateC),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    }
}
