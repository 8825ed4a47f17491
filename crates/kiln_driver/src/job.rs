//! The tagged work items drained by the compilation update loop.

use crate::module::DeclId;

/// Index of a C-object slot within the compilation, in insertion order.
pub type CObjectId = usize;

/// One glibc CRT piece built from bundled source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlibcFile {
    /// `Scrt1.o`: PIE program entry.
    Scrt1O,
    /// `crti.o`: init prologue.
    CrtiO,
    /// `crtn.o`: init epilogue.
    CrtnO,
    /// `libc_nonshared.a`: the pieces glibc ships only statically.
    LibcNonsharedA,
}

impl GlibcFile {
    /// Artifact basename.
    pub fn basename(self) -> &'static str {
        match self {
            GlibcFile::Scrt1O => "Scrt1.o",
            GlibcFile::CrtiO => "crti.o",
            GlibcFile::CrtnO => "crtn.o",
            GlibcFile::LibcNonsharedA => "libc_nonshared.a",
        }
    }
}

/// One musl CRT piece built from bundled source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MuslFile {
    /// `crt1.o`: static program entry.
    Crt1O,
    /// `scrt1.o`: PIE program entry.
    Scrt1O,
    /// `libc.a`: the whole static libc.
    LibcA,
}

impl MuslFile {
    /// Artifact basename.
    pub fn basename(self) -> &'static str {
        match self {
            MuslFile::Crt1O => "crt1.o",
            MuslFile::Scrt1O => "scrt1.o",
            MuslFile::LibcA => "libc.a",
        }
    }
}

/// One MinGW CRT piece built from bundled source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MingwFile {
    /// `crt2.o`: program entry.
    Crt2O,
    /// `dllcrt2.o`: DLL entry.
    Dllcrt2O,
    /// `libmingw32.a`: the MinGW runtime pieces.
    Libmingw32A,
}

impl MingwFile {
    /// Artifact basename.
    pub fn basename(self) -> &'static str {
        match self {
            MingwFile::Crt2O => "crt2.o",
            MingwFile::Dllcrt2O => "dllcrt2.o",
            MingwFile::Libmingw32A => "libmingw32.a",
        }
    }
}

/// A pending unit of work.
///
/// Jobs are enqueued by [`Compilation::create`](crate::Compilation),
/// by [`update`](crate::Compilation::update), and by the stage1 bridge
/// (import libraries discovered during code generation), and are consumed
/// exactly once, in FIFO order. A failing job records its error on the
/// owning slot or declaration; the drain continues with the next job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Job {
    /// Ensure a declaration is semantically analyzed.
    AnalyzeDecl(DeclId),
    /// Generate machine code for an analyzed declaration.
    CodegenDecl(DeclId),
    /// Tell the linker a declaration's source line moved.
    UpdateLineNumber(DeclId),
    /// Compile one C/C++ input.
    CObject(CObjectId),
    /// Build one glibc CRT file.
    GlibcCrtFile(GlibcFile),
    /// Build the glibc dummy shared objects linked against when
    /// cross-compiling.
    GlibcSharedObjects,
    /// Build one musl CRT file.
    MuslCrtFile(MuslFile),
    /// Build one MinGW CRT file.
    MingwCrtFile(MingwFile),
    /// Build the libunwind runtime library.
    Libunwind,
    /// Build the C++ standard library.
    Libcxx,
    /// Build the C++ ABI runtime.
    Libcxxabi,
    /// Build the compiler-rt intrinsics library.
    CompilerRt,
    /// Build the bundled libc shim for targets whose libc Kiln provides
    /// directly.
    BundledLibc,
    /// Generate a Windows import library for `system_libs[i]`.
    ///
    /// The index refers into the compilation's system-libs sequence, which
    /// is append-only while such jobs are in flight.
    WindowsImportLib(usize),
    /// Materialize the generated builtin source file.
    GenerateBuiltinSource,
    /// Run the non-incremental stage1 back-end over the root module.
    Stage1,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crt_basenames() {
        assert_eq!(GlibcFile::Scrt1O.basename(), "Scrt1.o");
        assert_eq!(MuslFile::Crt1O.basename(), "crt1.o");
        assert_eq!(MuslFile::LibcA.basename(), "libc.a");
        assert_eq!(MingwFile::Dllcrt2O.basename(), "dllcrt2.o");
    }

    #[test]
    fn jobs_compare_by_payload() {
        assert_eq!(Job::CObject(3), Job::CObject(3));
        assert_ne!(Job::CObject(3), Job::CObject(4));
        assert_ne!(Job::Libunwind, Job::Libcxx);
    }
}
