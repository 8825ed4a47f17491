//! Recipes for the bundled C runtime pieces.
//!
//! The driver knows *how* to build a runtime artifact (spawn a
//! sub-compilation, cache it, lock it); the [`RuntimeLibs`] trait answers
//! *what* to build: which bundled source file produces `crt1.o` for musl,
//! what extra flags libunwind needs, and how to materialize a Windows import
//! library. [`BundledRuntime`] maps onto the source layout shipped in Kiln's
//! `lib/` directory.

use crate::error::DriverError;
use crate::job::{GlibcFile, MingwFile, MuslFile};
use kiln_target::Triple;
use std::path::{Path, PathBuf};

/// One runtime piece: its artifact basename, the bundled source that
/// produces it, and per-file compiler flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrtSourceSpec {
    /// The artifact's basename (`crt1.o`, `libc.a`, ...).
    pub basename: String,
    /// Source path relative to the bundled `lib/` directory.
    pub src_rel: PathBuf,
    /// Extra flags for this file only.
    pub extra_flags: Vec<String>,
}

impl CrtSourceSpec {
    fn new(basename: &str, src_rel: &str, extra_flags: &[&str]) -> Self {
        Self {
            basename: basename.to_string(),
            src_rel: PathBuf::from(src_rel),
            extra_flags: extra_flags.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// The runtime-library recipe provider.
pub trait RuntimeLibs {
    /// Recipe for one glibc CRT file.
    fn glibc_crt_file(&self, which: GlibcFile) -> CrtSourceSpec;

    /// Recipe for one musl CRT file.
    fn musl_crt_file(&self, which: MuslFile) -> CrtSourceSpec;

    /// Recipe for one MinGW CRT file.
    fn mingw_crt_file(&self, which: MingwFile) -> CrtSourceSpec;

    /// Recipes for the dummy shared objects a glibc cross-link needs.
    fn glibc_shared_objects(&self) -> Vec<CrtSourceSpec>;

    /// Recipe for the libunwind runtime.
    fn libunwind(&self) -> CrtSourceSpec;

    /// Recipe for the C++ standard library runtime.
    fn libcxx(&self) -> CrtSourceSpec;

    /// Recipe for the C++ ABI runtime.
    fn libcxxabi(&self) -> CrtSourceSpec;

    /// Recipe for the compiler-rt intrinsics.
    fn compiler_rt(&self) -> CrtSourceSpec;

    /// Recipe for the bundled libc shim.
    fn bundled_libc(&self) -> CrtSourceSpec;

    /// Materializes an import library for one Windows system library.
    fn generate_import_lib(
        &self,
        lib: &str,
        target: &Triple,
        out_path: &Path,
    ) -> Result<(), DriverError>;
}

/// The recipes for the runtime sources bundled with Kiln.
#[derive(Debug, Default)]
pub struct BundledRuntime;

impl BundledRuntime {
    /// Creates the default provider.
    pub fn new() -> Self {
        Self
    }
}

impl RuntimeLibs for BundledRuntime {
    fn glibc_crt_file(&self, which: GlibcFile) -> CrtSourceSpec {
        match which {
            GlibcFile::Scrt1O => CrtSourceSpec::new("Scrt1.o", "libc/glibc/csu/Scrt1.c", &[]),
            GlibcFile::CrtiO => CrtSourceSpec::new("crti.o", "libc/glibc/csu/crti.c", &[]),
            GlibcFile::CrtnO => CrtSourceSpec::new("crtn.o", "libc/glibc/csu/crtn.c", &[]),
            GlibcFile::LibcNonsharedA => CrtSourceSpec::new(
                "libc_nonshared.a",
                "libc/glibc/nonshared/libc_nonshared.c",
                &["-DLIBC_NONSHARED=1"],
            ),
        }
    }

    fn musl_crt_file(&self, which: MuslFile) -> CrtSourceSpec {
        match which {
            MuslFile::Crt1O => CrtSourceSpec::new("crt1.o", "libc/musl/crt/crt1.c", &[]),
            MuslFile::Scrt1O => {
                CrtSourceSpec::new("scrt1.o", "libc/musl/crt/Scrt1.c", &["-fPIC"])
            }
            MuslFile::LibcA => CrtSourceSpec::new(
                "libc.a",
                "libc/musl/libc.c",
                &["-D_XOPEN_SOURCE=700", "-ffreestanding"],
            ),
        }
    }

    fn mingw_crt_file(&self, which: MingwFile) -> CrtSourceSpec {
        match which {
            MingwFile::Crt2O => {
                CrtSourceSpec::new("crt2.o", "libc/mingw/crt/crt2.c", &["-D__CRTDLL__"])
            }
            MingwFile::Dllcrt2O => {
                CrtSourceSpec::new("dllcrt2.o", "libc/mingw/crt/dllcrt2.c", &["-D__CRTDLL__"])
            }
            MingwFile::Libmingw32A => {
                CrtSourceSpec::new("libmingw32.a", "libc/mingw/lib/mingw32.c", &[])
            }
        }
    }

    fn glibc_shared_objects(&self) -> Vec<CrtSourceSpec> {
        vec![
            CrtSourceSpec::new("libc.so.6", "libc/glibc/stubs/libc_stub.c", &[]),
            CrtSourceSpec::new("libm.so.6", "libc/glibc/stubs/libm_stub.c", &[]),
            CrtSourceSpec::new("libdl.so.2", "libc/glibc/stubs/libdl_stub.c", &[]),
            CrtSourceSpec::new("libpthread.so.0", "libc/glibc/stubs/libpthread_stub.c", &[]),
            CrtSourceSpec::new("librt.so.1", "libc/glibc/stubs/librt_stub.c", &[]),
        ]
    }

    fn libunwind(&self) -> CrtSourceSpec {
        CrtSourceSpec::new(
            "libunwind.a",
            "libunwind/src/libunwind.c",
            &["-fno-exceptions", "-funwind-tables", "-D_LIBUNWIND_IS_NATIVE_ONLY"],
        )
    }

    fn libcxx(&self) -> CrtSourceSpec {
        CrtSourceSpec::new(
            "libcxx.a",
            "libcxx/src/libcxx.cpp",
            &["-std=c++17", "-D_LIBCPP_BUILDING_LIBRARY"],
        )
    }

    fn libcxxabi(&self) -> CrtSourceSpec {
        CrtSourceSpec::new(
            "libcxxabi.a",
            "libcxxabi/src/libcxxabi.cpp",
            &["-std=c++17", "-D_LIBCXXABI_BUILDING_LIBRARY"],
        )
    }

    fn compiler_rt(&self) -> CrtSourceSpec {
        CrtSourceSpec::new("compiler_rt.a", "std/special/compiler_rt.c", &[])
    }

    fn bundled_libc(&self) -> CrtSourceSpec {
        CrtSourceSpec::new("c.a", "std/special/c.c", &[])
    }

    fn generate_import_lib(
        &self,
        lib: &str,
        target: &Triple,
        out_path: &Path,
    ) -> Result<(), DriverError> {
        // Deterministic placeholder import library: the export table the
        // linker resolves against is synthesized from the library name.
        // TODO: drive llvm-dlltool here once the LLVM bridge exposes it.
        let content = format!(
            "!<arch>\nkiln import library\nlibrary: {lib}\ntarget: {target}\n"
        );
        std::fs::write(out_path, content).map_err(|e| DriverError::io(out_path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn musl_recipes_match_basenames() {
        let r = BundledRuntime::new();
        assert_eq!(r.musl_crt_file(MuslFile::Crt1O).basename, "crt1.o");
        assert_eq!(r.musl_crt_file(MuslFile::Scrt1O).basename, "scrt1.o");
        assert_eq!(r.musl_crt_file(MuslFile::LibcA).basename, "libc.a");
    }

    #[test]
    fn glibc_shared_objects_include_libc() {
        let r = BundledRuntime::new();
        let sos = r.glibc_shared_objects();
        assert!(sos.iter().any(|s| s.basename == "libc.so.6"));
        assert!(sos.iter().any(|s| s.basename == "libpthread.so.0"));
    }

    #[test]
    fn sources_live_under_lib_relative_paths() {
        let r = BundledRuntime::new();
        assert!(r.libunwind().src_rel.starts_with("libunwind"));
        assert!(r.compiler_rt().src_rel.starts_with("std/special"));
    }

    #[test]
    fn import_lib_generation_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("kernel32.lib");
        let target: Triple = "x86_64-windows-gnu".parse().unwrap();
        BundledRuntime::new()
            .generate_import_lib("kernel32", &target, &out)
            .unwrap();
        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.contains("kernel32"));
        assert!(content.contains("x86_64-windows-gnu"));
    }
}
