//! Bridge to the non-incremental stage1 back-end.
//!
//! The bootstrap code generator rebuilds the whole root module on every
//! invocation, so its cache discipline differs from the per-artifact
//! manifests: the artifact directory is stable, and a symlink named
//! `stage1.id` records — in its link target string, not file contents —
//! the digest and flags byte of the build the directory currently holds.
//! `libs.txt` alongside it records the link libraries the generator
//! discovered, so a cache hit can replay them without running the
//! generator.

use crate::compilation::Compilation;
use crate::error::DriverError;
use kiln_config::OptimizeMode;
use kiln_diagnostics::Diagnostic;
use kiln_target::Triple;
use std::path::{Path, PathBuf};

/// Length of the `stage1.id` link target: 32 hex digest chars + 2 hex flag
/// chars.
const STAGE1_ID_LEN: usize = 34;

/// Flags the stage1 back-end reports about the root module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stage1Flags {
    /// The module defines a C `main`.
    pub have_c_main: bool,
    /// The module defines a Windows `WinMain`.
    pub have_winmain: bool,
}

impl Stage1Flags {
    /// Packs the flags into the byte stored in the `stage1.id` suffix.
    pub fn to_byte(self) -> u8 {
        u8::from(self.have_c_main) | (u8::from(self.have_winmain) << 1)
    }

    /// Unpacks the flags from the `stage1.id` suffix byte.
    pub fn from_byte(byte: u8) -> Self {
        Self {
            have_c_main: byte & 0b01 != 0,
            have_winmain: byte & 0b10 != 0,
        }
    }
}

/// Everything the external generator needs for one build.
#[derive(Clone, Debug)]
pub struct Stage1Context {
    /// The artifact name.
    pub root_name: String,
    /// The root module's source file.
    pub root_source_path: PathBuf,
    /// The target being compiled for.
    pub target: Triple,
    /// Optimization mode.
    pub optimize_mode: OptimizeMode,
    /// The stable artifact directory the generator writes into.
    pub artifact_dir: PathBuf,
    /// Where the binary goes, when emitted.
    pub emit_bin_path: Option<PathBuf>,
    /// Whether a C header is emitted.
    pub emit_h: bool,
    /// Whether an assembly listing is emitted.
    pub emit_asm: bool,
    /// Whether LLVM IR is emitted.
    pub emit_llvm_ir: bool,
    /// Whether the analysis dump is emitted.
    pub emit_analysis: bool,
    /// Whether documentation is emitted.
    pub emit_docs: bool,
    /// Test build.
    pub is_test: bool,
    /// No thread support.
    pub single_threaded: bool,
    /// One section per function.
    pub function_sections: bool,
    /// Export functions from DLLs.
    pub dll_export_fns: bool,
}

/// What the external generator produced.
#[derive(Clone, Debug, Default)]
pub struct Stage1Result {
    /// Link libraries the generated code requires (`extern "lib"` imports).
    pub link_libs: Vec<String>,
    /// Flags to record on the module.
    pub flags: Stage1Flags,
    /// Source files the build read, for the cache manifest.
    pub source_files: Vec<PathBuf>,
}

/// The external, non-incremental code generator.
pub trait Stage1Backend {
    /// Builds the root module's object into the artifact directory.
    fn build_object(&mut self, ctx: &Stage1Context) -> Result<Stage1Result, DriverError>;
}

/// Reads the `stage1.id` link target string, if present.
pub(crate) fn read_stage1_id(path: &Path) -> Option<String> {
    #[cfg(unix)]
    {
        std::fs::read_link(path)
            .ok()
            .map(|p| p.to_string_lossy().into_owned())
    }
    #[cfg(not(unix))]
    {
        std::fs::read_to_string(path).ok()
    }
}

/// Persists the `stage1.id` marker with the given link target string.
pub(crate) fn write_stage1_id(path: &Path, target: &str) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, path)
    }
    #[cfg(not(unix))]
    {
        std::fs::write(path, target)
    }
}

impl Compilation {
    /// Runs the stage1 job: probe the symlink-digest cache, replay recorded
    /// link libraries on a hit, otherwise invoke the external generator and
    /// persist the new digest.
    pub(crate) fn run_stage1(&mut self) -> Result<(), DriverError> {
        let root_src = self
            .options()
            .root_source_path
            .clone()
            .ok_or_else(|| kiln_common::InternalError::new("stage1 job without a root source"))?;

        let cache = self.local_cache().clone();
        let mut manifest = cache.obtain();
        manifest.add_file(&root_src)?;
        self.add_stage1_inputs(&mut manifest);
        let snapshot = manifest.snapshot();

        let id_path = self.artifact_dir().join("stage1.id");
        if manifest.hit()? {
            let digest = manifest.final_digest().to_string();
            let prior = read_stage1_id(&id_path);
            let matched = prior
                .as_deref()
                .filter(|s| s.len() == STAGE1_ID_LEN && s.starts_with(&digest))
                .and_then(|s| u8::from_str_radix(&s[32..], 16).ok());
            if let Some(flags_byte) = matched {
                let flags = Stage1Flags::from_byte(flags_byte);
                let libs_path = self.artifact_dir().join("libs.txt");
                if let Ok(content) = std::fs::read_to_string(&libs_path) {
                    for line in content.lines().filter(|l| !l.is_empty()) {
                        self.add_link_lib(line)?;
                    }
                }
                self.module_mut().set_stage1_flags(flags);
                self.set_stage1_lock(manifest.take_lock());
                return Ok(());
            }
            // The directory holds some other build's output; redo it.
            manifest.unhit(snapshot);
        }

        let _ = std::fs::remove_file(&id_path);

        let ctx = self.stage1_context(&root_src);
        let result = {
            let backend = self.stage1_backend_mut().ok_or_else(|| {
                kiln_common::InternalError::new("stage1 job without a stage1 back-end")
            })?;
            backend.build_object(&ctx)?
        };

        for file in &result.source_files {
            if file != &root_src {
                if let Err(e) = manifest.add_file(file) {
                    self.sink().emit(Diagnostic::warning(format!(
                        "unable to record stage1 input {}: {e}",
                        file.display()
                    )));
                }
            }
        }
        for lib in &result.link_libs {
            self.add_link_lib(lib)?;
        }
        self.module_mut().set_stage1_flags(result.flags);

        // Persistence failures cost a rebuild next time, nothing more.
        let libs_path = self.artifact_dir().join("libs.txt");
        let mut libs_content = result.link_libs.join("\n");
        if !libs_content.is_empty() {
            libs_content.push('\n');
        }
        if let Err(e) = std::fs::write(&libs_path, libs_content) {
            self.sink()
                .emit(Diagnostic::warning(format!("unable to write libs.txt: {e}")));
        }
        let id_target = format!(
            "{}{:02x}",
            manifest.final_digest(),
            result.flags.to_byte()
        );
        if let Err(e) = write_stage1_id(&id_path, &id_target) {
            self.sink()
                .emit(Diagnostic::warning(format!("unable to update stage1.id: {e}")));
        }
        if let Err(e) = manifest.write_manifest() {
            self.sink().emit(Diagnostic::warning(format!(
                "unable to write cache manifest: {e}"
            )));
        }
        self.set_stage1_lock(manifest.take_lock());
        Ok(())
    }
}
