//! The user-supplied compilation options record.

use crate::emit::EmitLoc;
use crate::libc::LibcInstallation;
use kiln_target::{CodeModel, CpuFeatures, CpuModel, ObjectFormat, OsVersionRange, Triple};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What kind of image the compilation produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    /// An executable.
    Exe,
    /// A static or dynamic library.
    Lib,
    /// A single relocatable object.
    Obj,
}

/// How libraries are linked into the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkMode {
    /// Everything linked into the image at build time.
    Static,
    /// Shared objects resolved at load time.
    Dynamic,
}

/// The optimization / safety mode of the build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizeMode {
    /// No optimization, full safety checks.
    Debug,
    /// Optimized with safety checks retained.
    ReleaseSafe,
    /// Optimized for speed, safety checks off.
    ReleaseFast,
    /// Optimized for size, safety checks off.
    ReleaseSmall,
}

impl OptimizeMode {
    /// Returns the canonical lowercase name used in config files and the
    /// generated builtin source.
    pub fn name(self) -> &'static str {
        match self {
            OptimizeMode::Debug => "debug",
            OptimizeMode::ReleaseSafe => "release-safe",
            OptimizeMode::ReleaseFast => "release-fast",
            OptimizeMode::ReleaseSmall => "release-small",
        }
    }
}

/// What the child C compiler does with preprocessed output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreprocessorMode {
    /// Normal compilation; no `-E`.
    #[default]
    Off,
    /// `-E -o <path>`: preprocess into the named output file.
    File,
    /// `-E`: preprocess to stdout and stop.
    Stdout,
}

/// One C or C++ input with its extra compiler flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CSourceFile {
    /// Path to the source file.
    pub src_path: PathBuf,
    /// Extra flags appended for this file only.
    pub extra_flags: Vec<String>,
}

impl CSourceFile {
    /// A source file with no extra flags.
    pub fn new(src_path: impl Into<PathBuf>) -> Self {
        Self {
            src_path: src_path.into(),
            extra_flags: Vec::new(),
        }
    }
}

/// Everything the user (or a parent compilation) asks of one compilation.
///
/// This is the input to [`resolve`](crate::resolve::resolve); fields named
/// `want_*` or typed `Option<_>` are requests the resolver may override or
/// reject, the rest are taken as-is.
#[derive(Clone, Debug)]
pub struct CompilationOptions {
    /// Name of the produced artifact (without extension).
    pub root_name: String,
    /// The target being compiled for.
    pub target: Triple,
    /// What kind of image to produce.
    pub output_mode: OutputMode,
    /// Optimization / safety mode.
    pub optimize_mode: OptimizeMode,
    /// Whether a root native-language module participates in the build.
    pub have_root_module: bool,
    /// Path of the root module's source file, when there is one.
    pub root_source_path: Option<PathBuf>,
    /// Whether this build runs under the non-incremental stage1 back-end.
    pub is_stage1: bool,
    /// Whether this is a test build.
    pub is_test: bool,
    /// Whether test IO is evented rather than blocking.
    pub test_evented_io: bool,

    /// C/C++ inputs.
    pub c_source_files: Vec<CSourceFile>,
    /// Pre-built objects passed to the linker.
    pub link_objects: Vec<PathBuf>,
    /// macOS frameworks to link.
    pub frameworks: Vec<String>,
    /// Framework search directories.
    pub framework_dirs: Vec<PathBuf>,
    /// System libraries to link.
    pub system_libs: Vec<String>,
    /// Library search directories.
    pub lib_dirs: Vec<PathBuf>,

    /// Link against the target's C library.
    pub link_libc: bool,
    /// Link against the C++ standard library.
    pub link_libcpp: bool,
    /// Requested link mode; rejected if the target forces the other one.
    pub link_mode: Option<LinkMode>,
    /// Requested PIC setting; `Some(false)` is rejected when PIC is mandatory.
    pub want_pic: Option<bool>,
    /// Requested undefined-behavior sanitizing of C code.
    pub want_sanitize_c: Option<bool>,
    /// Requested stack-probe checking.
    pub want_stack_check: Option<bool>,
    /// Requested valgrind client-request support.
    pub want_valgrind: Option<bool>,
    /// Back-end selection override.
    pub use_llvm: Option<bool>,
    /// Linker selection override.
    pub use_lld: Option<bool>,
    /// C front-end selection override.
    pub use_clang: Option<bool>,
    /// Build with no thread support.
    pub single_threaded: bool,
    /// Omit debug info.
    pub strip: bool,
    /// Place each function in its own section.
    pub function_sections: bool,
    /// Export functions from DLLs.
    pub dll_export_fns: Option<bool>,
    /// Machine code model; non-default requires the LLVM back-end.
    pub machine_code_model: CodeModel,
    /// Object format override.
    pub object_format: Option<ObjectFormat>,
    /// Target CPU model.
    pub cpu_model: CpuModel,
    /// Target CPU features.
    pub cpu_features: CpuFeatures,
    /// Target OS version range override.
    pub os_version_range: Option<OsVersionRange>,

    /// Where the binary goes, if emitted.
    pub emit_bin: Option<EmitLoc>,
    /// Where the generated C header goes, if emitted.
    pub emit_h: Option<EmitLoc>,
    /// Where the assembly listing goes, if emitted.
    pub emit_asm: Option<EmitLoc>,
    /// Where the LLVM IR goes, if emitted.
    pub emit_llvm_ir: Option<EmitLoc>,
    /// Where the semantic analysis dump goes, if emitted.
    pub emit_analysis: Option<EmitLoc>,
    /// Where generated documentation goes, if emitted.
    pub emit_docs: Option<EmitLoc>,

    /// Extra arguments passed verbatim to the child C compiler.
    pub clang_argv: Vec<String>,
    /// Inherit stdio for the child compiler and propagate its exit code.
    pub clang_passthrough_mode: bool,
    /// Preprocessor behavior of the child compiler.
    pub clang_preprocessor_mode: PreprocessorMode,
    /// Override of the child C compiler executable.
    pub clang_path: Option<PathBuf>,

    /// Description of an installed C library, when not built from source.
    pub libc_installation: Option<LibcInstallation>,
    /// Extra libc include directories.
    pub libc_include_dirs: Vec<PathBuf>,

    /// Linker script, if any.
    pub linker_script: Option<PathBuf>,
    /// Symbol version script, if any.
    pub version_script: Option<PathBuf>,
    /// Extra arguments for the LLD linker.
    pub extra_lld_args: Vec<String>,
    /// Request an `.eh_frame_hdr` section.
    pub eh_frame_hdr: bool,
    /// Keep relocations in the output.
    pub emit_relocs: bool,
    /// Add an rpath entry per library directory.
    pub each_lib_rpath: bool,

    /// Echo child compiler invocations to stderr.
    pub verbose_cc: bool,
    /// Keep root sources loaded after a clean update.
    pub keep_source_files_loaded: bool,

    /// Set for sub-compilations building compiler-rt or libc.
    pub is_compiler_rt_or_libc: bool,
    /// The parent compilation's `link_libc`, for sub-compilations.
    pub parent_compilation_link_libc: bool,
}

impl CompilationOptions {
    /// Options with everything defaulted except the artifact name and target.
    pub fn new(root_name: impl Into<String>, target: Triple) -> Self {
        Self {
            root_name: root_name.into(),
            target,
            output_mode: OutputMode::Obj,
            optimize_mode: OptimizeMode::Debug,
            have_root_module: false,
            root_source_path: None,
            is_stage1: false,
            is_test: false,
            test_evented_io: false,
            c_source_files: Vec::new(),
            link_objects: Vec::new(),
            frameworks: Vec::new(),
            framework_dirs: Vec::new(),
            system_libs: Vec::new(),
            lib_dirs: Vec::new(),
            link_libc: false,
            link_libcpp: false,
            link_mode: None,
            want_pic: None,
            want_sanitize_c: None,
            want_stack_check: None,
            want_valgrind: None,
            use_llvm: None,
            use_lld: None,
            use_clang: None,
            single_threaded: false,
            strip: false,
            function_sections: false,
            dll_export_fns: None,
            machine_code_model: CodeModel::Default,
            object_format: None,
            cpu_model: CpuModel::baseline(target.arch),
            cpu_features: CpuFeatures::new(),
            os_version_range: None,
            emit_bin: None,
            emit_h: None,
            emit_asm: None,
            emit_llvm_ir: None,
            emit_analysis: None,
            emit_docs: None,
            clang_argv: Vec::new(),
            clang_passthrough_mode: false,
            clang_preprocessor_mode: PreprocessorMode::Off,
            clang_path: None,
            libc_installation: None,
            libc_include_dirs: Vec::new(),
            linker_script: None,
            version_script: None,
            extra_lld_args: Vec::new(),
            eh_frame_hdr: false,
            emit_relocs: false,
            each_lib_rpath: false,
            verbose_cc: false,
            keep_source_files_loaded: false,
            is_compiler_rt_or_libc: false,
            parent_compilation_link_libc: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Triple {
        "x86_64-linux-gnu".parse().unwrap()
    }

    #[test]
    fn defaults_are_conservative() {
        let opts = CompilationOptions::new("demo", target());
        assert_eq!(opts.output_mode, OutputMode::Obj);
        assert_eq!(opts.optimize_mode, OptimizeMode::Debug);
        assert!(!opts.link_libc);
        assert!(opts.link_mode.is_none());
        assert!(opts.want_pic.is_none());
        assert_eq!(opts.clang_preprocessor_mode, PreprocessorMode::Off);
        assert!(opts.emit_bin.is_none());
    }

    #[test]
    fn optimize_mode_names() {
        assert_eq!(OptimizeMode::Debug.name(), "debug");
        assert_eq!(OptimizeMode::ReleaseSmall.name(), "release-small");
    }

    #[test]
    fn c_source_file_constructor() {
        let f = CSourceFile::new("src/a.c");
        assert_eq!(f.src_path, PathBuf::from("src/a.c"));
        assert!(f.extra_flags.is_empty());
    }
}
