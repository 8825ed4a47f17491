//! Shared fixtures for driver tests: a scratch project layout and scripted
//! stand-ins for the child compiler and linker.

use crate::compilation::{Compilation, CreateOptions};
use crate::link::{LinkContext, LinkErrorFlags, Linker};
use crate::module::DeclId;
use kiln_common::Directory;
use kiln_config::CompilationOptions;
use kiln_target::Triple;
use std::path::PathBuf;

/// A scratch directory tree with the layout a compilation expects.
pub struct TestEnv {
    root: tempfile::TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        for dir in ["lib", "local-cache", "global-cache"] {
            std::fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        Self { root }
    }

    pub fn lib_dir(&self) -> Directory {
        Directory::new(self.root.path().join("lib"))
    }

    pub fn local_cache_dir(&self) -> Directory {
        Directory::new(self.root.path().join("local-cache"))
    }

    pub fn global_cache_dir(&self) -> Directory {
        Directory::new(self.root.path().join("global-cache"))
    }

    pub fn write_file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn write_script(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.write_file(rel, content);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    /// Path of the log file the fake clang appends to once per run.
    pub fn clang_runs_log(&self) -> PathBuf {
        self.root.path().join("clang-runs.log")
    }

    /// Number of times the fake clang has run.
    pub fn clang_runs(&self) -> usize {
        std::fs::read_to_string(self.clang_runs_log())
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// A scripted `clang` that writes a dummy object and dep file.
    ///
    /// The driver always passes the source file last; `-o` and `-MF`
    /// carry the object and dep file paths.
    pub fn fake_clang(&self) -> PathBuf {
        let log = self.clang_runs_log();
        let script = format!(
            r#"#!/bin/sh
echo run >> "{log}"
out=""
dep=""
mode="compile"
prev=""
for a in "$@"; do
  case "$prev" in
    -o) out="$a";;
    -MF) dep="$a";;
  esac
  case "$a" in
    -E) mode="preprocess";;
  esac
  prev="$a"
done
for a in "$@"; do src="$a"; done
if [ -n "$dep" ]; then
  printf '%s: %s\n' "$out" "$src" > "$dep"
fi
if [ "$mode" = "preprocess" ]; then
  if [ -n "$out" ]; then
    printf 'preprocessed %s\n' "$src" > "$out"
  else
    printf 'preprocessed %s\n' "$src"
  fi
elif [ -n "$out" ]; then
  printf 'object(%s)\n' "$src" > "$out"
fi
exit 0
"#,
            log = log.display()
        );
        self.write_script("bin/clang", &script)
    }

    /// A scripted `clang` that fails with a diagnostic on stderr.
    pub fn failing_clang(&self) -> PathBuf {
        let log = self.clang_runs_log();
        let script = format!(
            "#!/bin/sh\necho run >> \"{}\"\necho \"error: expected ';'\" >&2\nexit 1\n",
            log.display()
        );
        self.write_script("bin/failing-clang", &script)
    }

    /// Writes the bundled runtime sources the default recipes expect for a
    /// musl executable build.
    pub fn seed_musl_runtime_sources(&self) {
        self.write_file("lib/libc/musl/crt/crt1.c", "void _start(void) {}\n");
        self.write_file("lib/libc/musl/crt/Scrt1.c", "void _start(void) {}\n");
        self.write_file("lib/libc/musl/libc.c", "int __libc_dummy;\n");
        self.write_file("lib/libunwind/src/libunwind.c", "int __unwind_dummy;\n");
        self.write_file("lib/std/special/compiler_rt.c", "int __rt_dummy;\n");
    }
}

/// Base options for a target with a fake clang wired in.
pub fn base_options(env: &TestEnv, target: &str) -> CompilationOptions {
    let target: Triple = target.parse().unwrap();
    let mut options = CompilationOptions::new("demo", target);
    options.clang_path = Some(env.fake_clang());
    options
}

/// A compilation over the scratch layout with no inputs.
pub fn plain_compilation(env: &TestEnv) -> Compilation {
    let options = base_options(env, "x86_64-linux-musl");
    Compilation::create(create_options(env, options)).unwrap()
}

/// CreateOptions over the scratch layout.
pub fn create_options(env: &TestEnv, options: CompilationOptions) -> CreateOptions {
    CreateOptions::new(
        options,
        env.lib_dir(),
        env.local_cache_dir(),
        env.global_cache_dir(),
    )
}

/// A linker that records flush calls and never touches the filesystem.
#[derive(Default)]
pub struct RecordingLinker {
    pub flushed: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    pub flags: LinkErrorFlags,
}

impl Linker for RecordingLinker {
    fn update_decl(&mut self, _decl: DeclId) -> Result<(), String> {
        Ok(())
    }

    fn update_decl_line_number(&mut self, _decl: DeclId) -> Result<(), String> {
        Ok(())
    }

    fn flush(&mut self, _ctx: &LinkContext) -> Result<(), crate::DriverError> {
        self.flushed
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    fn error_flags(&self) -> LinkErrorFlags {
        self.flags
    }

    fn clear_error_flags(&mut self) {
        self.flags = LinkErrorFlags::default();
    }
}
