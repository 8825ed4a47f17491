//! Parsing and querying of `arch-os-abi` target triples.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A target CPU architecture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Arch {
    X86,
    X86_64,
    Aarch64,
    Riscv64,
    Wasm32,
}

impl Arch {
    /// Returns the canonical triple spelling (e.g. `x86_64`).
    pub fn name(self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Riscv64 => "riscv64",
            Arch::Wasm32 => "wasm32",
        }
    }

    /// Returns the LLVM spelling of this architecture.
    pub fn llvm_name(self) -> &'static str {
        match self {
            Arch::X86 => "i386",
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Riscv64 => "riscv64",
            Arch::Wasm32 => "wasm32",
        }
    }

    /// Returns the LLVM name of the baseline CPU model for this architecture.
    pub fn baseline_llvm_cpu(self) -> &'static str {
        match self {
            Arch::X86 => "i686",
            Arch::X86_64 => "x86-64",
            Arch::Aarch64 => "generic",
            Arch::Riscv64 => "generic-rv64",
            Arch::Wasm32 => "generic",
        }
    }
}

/// A target operating system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Os {
    Linux,
    Windows,
    Macos,
    Wasi,
    Freestanding,
}

impl Os {
    /// Returns the canonical triple spelling (e.g. `linux`).
    pub fn name(self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Windows => "windows",
            Os::Macos => "macos",
            Os::Wasi => "wasi",
            Os::Freestanding => "freestanding",
        }
    }
}

/// A target ABI / C library flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Abi {
    Gnu,
    Musl,
    Msvc,
    None,
}

impl Abi {
    /// Returns the canonical triple spelling, or `None` for the empty ABI.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Abi::Gnu => Some("gnu"),
            Abi::Musl => Some("musl"),
            Abi::Msvc => Some("msvc"),
            Abi::None => None,
        }
    }
}

/// The container format of produced relocatable objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectFormat {
    /// ELF relocatable objects (Linux, freestanding).
    Elf,
    /// COFF objects (Windows).
    Coff,
    /// Mach-O objects (macOS).
    MachO,
    /// WebAssembly modules.
    Wasm,
    /// C source emitted in place of machine code.
    C,
}

impl fmt::Display for ObjectFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectFormat::Elf => "elf",
            ObjectFormat::Coff => "coff",
            ObjectFormat::MachO => "macho",
            ObjectFormat::Wasm => "wasm",
            ObjectFormat::C => "c",
        };
        write!(f, "{s}")
    }
}

/// The machine code model requested from the back-end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum CodeModel {
    #[default]
    Default,
    Tiny,
    Small,
    Kernel,
    Medium,
    Large,
}

impl CodeModel {
    /// Returns the clang `-mcmodel=` spelling, or `None` for the default model.
    pub fn clang_name(self) -> Option<&'static str> {
        match self {
            CodeModel::Default => None,
            CodeModel::Tiny => Some("tiny"),
            CodeModel::Small => Some("small"),
            CodeModel::Kernel => Some("kernel"),
            CodeModel::Medium => Some("medium"),
            CodeModel::Large => Some("large"),
        }
    }
}

/// Error produced when a triple string cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum TripleParseError {
    /// The architecture component was not recognized.
    #[error("unknown architecture '{0}'")]
    UnknownArch(String),
    /// The operating system component was not recognized.
    #[error("unknown operating system '{0}'")]
    UnknownOs(String),
    /// The ABI component was not recognized.
    #[error("unknown ABI '{0}'")]
    UnknownAbi(String),
    /// The string did not have the `arch-os[-abi]` shape.
    #[error("malformed target triple '{0}' (expected arch-os[-abi])")]
    Malformed(String),
}

/// A parsed `arch-os-abi` target description.
///
/// The ABI component is optional in the textual form; when omitted, a
/// per-OS default is chosen (`gnu` on Linux and Windows, `none` elsewhere).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// The CPU architecture.
    pub arch: Arch,
    /// The operating system.
    pub os: Os,
    /// The ABI / C library flavor.
    pub abi: Abi,
}

impl Triple {
    /// Constructs a triple from its components.
    pub fn new(arch: Arch, os: Os, abi: Abi) -> Self {
        Self { arch, os, abi }
    }

    /// Renders the LLVM 4-component triple form (with vendor).
    pub fn llvm_triple(&self) -> String {
        let vendor = match self.os {
            Os::Windows => "pc",
            Os::Macos => "apple",
            _ => "unknown",
        };
        let os = match self.os {
            Os::Freestanding => "none",
            other => other.name(),
        };
        match self.abi.name() {
            Some(abi) => format!("{}-{}-{}-{}", self.arch.llvm_name(), vendor, os, abi),
            None => format!("{}-{}-{}", self.arch.llvm_name(), vendor, os),
        }
    }

    /// True when the OS itself cannot run programs that do not link its libc.
    pub fn os_requires_libc(&self) -> bool {
        matches!(self.os, Os::Macos)
    }

    /// True when producing a dynamically linked image is possible at all.
    pub fn dynamic_linking_allowed(&self) -> bool {
        !matches!(self.os, Os::Freestanding) && !matches!(self.arch, Arch::Wasm32)
    }

    /// True when the target mandates position-independent code.
    ///
    /// Windows images are relocatable by construction, OSes that force their
    /// libc force its startup code's model, and linking a GNU libc means
    /// taking its PIC-only startup objects.
    pub fn requires_pic(&self, linking_libc: bool) -> bool {
        self.os == Os::Windows
            || self.os_requires_libc()
            || (linking_libc && self.is_glibc())
    }

    /// True when clang accepts `-fPIC` for this target.
    pub fn supports_pic(&self) -> bool {
        self.os != Os::Windows
    }

    /// True when the back-end can emit stack-probe based checks here.
    pub fn supports_stack_probing(&self) -> bool {
        self.os != Os::Windows && matches!(self.arch, Arch::X86 | Arch::X86_64)
    }

    /// True when the valgrind client-request integration works on this target.
    pub fn supports_valgrind(&self) -> bool {
        self.os == Os::Linux && self.arch == Arch::X86_64
    }

    /// True when the target has no thread support.
    pub fn is_single_threaded(&self) -> bool {
        matches!(self.arch, Arch::Wasm32)
    }

    /// True when debug info can be produced for this target.
    pub fn has_debug_info(&self) -> bool {
        !matches!(self.arch, Arch::Wasm32)
    }

    /// True for Linux with the GNU C library.
    pub fn is_glibc(&self) -> bool {
        self.os == Os::Linux && self.abi == Abi::Gnu
    }

    /// True for any musl-ABI target.
    pub fn is_musl(&self) -> bool {
        self.abi == Abi::Musl
    }

    /// True for Windows with the GNU (MinGW) ABI.
    pub fn is_mingw(&self) -> bool {
        self.os == Os::Windows && self.abi == Abi::Gnu
    }

    /// True for bare-metal targets.
    pub fn is_freestanding(&self) -> bool {
        self.os == Os::Freestanding
    }

    /// True when Kiln ships libc source for this target and can build it.
    pub fn can_build_libc_from_source(&self) -> bool {
        self.is_glibc() || self.is_musl() || self.is_mingw()
    }

    /// True when linking libc needs no installed C library: either the libc
    /// is built from bundled source or the toolchain ships it directly
    /// (WASI).
    pub fn libc_provided_by_toolchain(&self) -> bool {
        self.can_build_libc_from_source() || self.os == Os::Wasi
    }

    /// The object format this target produces by default.
    pub fn default_object_format(&self) -> ObjectFormat {
        match (self.arch, self.os) {
            (Arch::Wasm32, _) => ObjectFormat::Wasm,
            (_, Os::Windows) => ObjectFormat::Coff,
            (_, Os::Macos) => ObjectFormat::MachO,
            _ => ObjectFormat::Elf,
        }
    }

    /// The file extension of relocatable objects for this target,
    /// including the leading dot.
    pub fn object_file_ext(&self) -> &'static str {
        match self.default_object_format() {
            ObjectFormat::Coff => ".obj",
            ObjectFormat::Wasm => ".o",
            _ => ".o",
        }
    }
}

impl FromStr for Triple {
    type Err = TripleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let arch_s = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| TripleParseError::Malformed(s.to_string()))?;
        let os_s = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| TripleParseError::Malformed(s.to_string()))?;
        let abi_s = parts.next();

        let arch = match arch_s {
            "x86_64" | "amd64" => Arch::X86_64,
            "x86" | "i386" | "i686" => Arch::X86,
            "aarch64" | "arm64" => Arch::Aarch64,
            "riscv64" => Arch::Riscv64,
            "wasm32" => Arch::Wasm32,
            other => return Err(TripleParseError::UnknownArch(other.to_string())),
        };
        let os = match os_s {
            "linux" => Os::Linux,
            "windows" => Os::Windows,
            "macos" | "darwin" => Os::Macos,
            "wasi" => Os::Wasi,
            "freestanding" | "none" => Os::Freestanding,
            other => return Err(TripleParseError::UnknownOs(other.to_string())),
        };
        let abi = match abi_s {
            Some("gnu") => Abi::Gnu,
            Some("musl") => Abi::Musl,
            Some("msvc") => Abi::Msvc,
            Some("none") => Abi::None,
            Some(other) => return Err(TripleParseError::UnknownAbi(other.to_string())),
            None => match os {
                Os::Linux | Os::Windows => Abi::Gnu,
                _ => Abi::None,
            },
        };
        Ok(Triple { arch, os, abi })
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.abi.name() {
            Some(abi) => write!(f, "{}-{}-{}", self.arch.name(), self.os.name(), abi),
            None => write!(f, "{}-{}", self.arch.name(), self.os.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_triple() {
        let t: Triple = "x86_64-linux-musl".parse().unwrap();
        assert_eq!(t.arch, Arch::X86_64);
        assert_eq!(t.os, Os::Linux);
        assert_eq!(t.abi, Abi::Musl);
    }

    #[test]
    fn parse_defaults_abi_per_os() {
        let linux: Triple = "aarch64-linux".parse().unwrap();
        assert_eq!(linux.abi, Abi::Gnu);
        let macos: Triple = "aarch64-macos".parse().unwrap();
        assert_eq!(macos.abi, Abi::None);
        let windows: Triple = "x86_64-windows".parse().unwrap();
        assert_eq!(windows.abi, Abi::Gnu);
    }

    #[test]
    fn parse_aliases() {
        let t: Triple = "amd64-linux-gnu".parse().unwrap();
        assert_eq!(t.arch, Arch::X86_64);
        let t: Triple = "arm64-darwin".parse().unwrap();
        assert_eq!(t.arch, Arch::Aarch64);
        assert_eq!(t.os, Os::Macos);
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            "m68k-linux".parse::<Triple>(),
            Err(TripleParseError::UnknownArch(_))
        ));
        assert!(matches!(
            "x86_64-plan9".parse::<Triple>(),
            Err(TripleParseError::UnknownOs(_))
        ));
        assert!(matches!(
            "x86_64-linux-eabi".parse::<Triple>(),
            Err(TripleParseError::UnknownAbi(_))
        ));
        assert!(matches!(
            "x86_64".parse::<Triple>(),
            Err(TripleParseError::Malformed(_))
        ));
    }

    #[test]
    fn display_roundtrip() {
        for s in ["x86_64-linux-musl", "aarch64-linux-gnu", "x86_64-windows-gnu"] {
            let t: Triple = s.parse().unwrap();
            assert_eq!(t.to_string(), s);
        }
    }

    #[test]
    fn llvm_triple_form() {
        let t: Triple = "x86_64-linux-musl".parse().unwrap();
        assert_eq!(t.llvm_triple(), "x86_64-unknown-linux-musl");
        let t: Triple = "x86_64-windows-gnu".parse().unwrap();
        assert_eq!(t.llvm_triple(), "x86_64-pc-windows-gnu");
        let t: Triple = "aarch64-macos".parse().unwrap();
        assert_eq!(t.llvm_triple(), "aarch64-apple-macos");
        let t: Triple = "x86_64-freestanding".parse().unwrap();
        assert_eq!(t.llvm_triple(), "x86_64-unknown-none");
    }

    #[test]
    fn pic_requirements() {
        let glibc: Triple = "aarch64-linux-gnu".parse().unwrap();
        assert!(glibc.requires_pic(true));
        assert!(!glibc.requires_pic(false));

        let windows: Triple = "x86_64-windows-gnu".parse().unwrap();
        assert!(windows.requires_pic(false));

        let musl: Triple = "x86_64-linux-musl".parse().unwrap();
        assert!(!musl.requires_pic(true));
    }

    #[test]
    fn dynamic_linking_allowed() {
        assert!("x86_64-linux-gnu".parse::<Triple>().unwrap().dynamic_linking_allowed());
        assert!(!"x86_64-freestanding".parse::<Triple>().unwrap().dynamic_linking_allowed());
        assert!(!"wasm32-wasi".parse::<Triple>().unwrap().dynamic_linking_allowed());
    }

    #[test]
    fn stack_probing_support() {
        assert!("x86_64-linux-gnu".parse::<Triple>().unwrap().supports_stack_probing());
        assert!(!"aarch64-linux-gnu".parse::<Triple>().unwrap().supports_stack_probing());
        assert!(!"x86_64-windows-gnu".parse::<Triple>().unwrap().supports_stack_probing());
    }

    #[test]
    fn valgrind_support() {
        assert!("x86_64-linux-gnu".parse::<Triple>().unwrap().supports_valgrind());
        assert!(!"aarch64-linux-gnu".parse::<Triple>().unwrap().supports_valgrind());
        assert!(!"x86_64-windows-gnu".parse::<Triple>().unwrap().supports_valgrind());
    }

    #[test]
    fn object_formats() {
        assert_eq!(
            "x86_64-linux-musl".parse::<Triple>().unwrap().default_object_format(),
            ObjectFormat::Elf
        );
        assert_eq!(
            "x86_64-windows-gnu".parse::<Triple>().unwrap().default_object_format(),
            ObjectFormat::Coff
        );
        assert_eq!(
            "wasm32-wasi".parse::<Triple>().unwrap().default_object_format(),
            ObjectFormat::Wasm
        );
        assert_eq!(
            "aarch64-macos".parse::<Triple>().unwrap().default_object_format(),
            ObjectFormat::MachO
        );
    }

    #[test]
    fn object_file_ext() {
        assert_eq!("x86_64-linux-gnu".parse::<Triple>().unwrap().object_file_ext(), ".o");
        assert_eq!("x86_64-windows-msvc".parse::<Triple>().unwrap().object_file_ext(), ".obj");
    }

    #[test]
    fn libc_family_predicates() {
        let glibc: Triple = "x86_64-linux-gnu".parse().unwrap();
        assert!(glibc.is_glibc() && !glibc.is_musl() && !glibc.is_mingw());
        let musl: Triple = "x86_64-linux-musl".parse().unwrap();
        assert!(musl.is_musl() && musl.can_build_libc_from_source());
        let mingw: Triple = "x86_64-windows-gnu".parse().unwrap();
        assert!(mingw.is_mingw());
        let msvc: Triple = "x86_64-windows-msvc".parse().unwrap();
        assert!(!msvc.can_build_libc_from_source());
    }

    #[test]
    fn toolchain_provided_libc() {
        assert!("wasm32-wasi".parse::<Triple>().unwrap().libc_provided_by_toolchain());
        assert!("x86_64-linux-musl".parse::<Triple>().unwrap().libc_provided_by_toolchain());
        assert!(!"x86_64-windows-msvc".parse::<Triple>().unwrap().libc_provided_by_toolchain());
    }

    #[test]
    fn macos_requires_libc() {
        assert!("aarch64-macos".parse::<Triple>().unwrap().os_requires_libc());
        assert!(!"x86_64-linux-gnu".parse::<Triple>().unwrap().os_requires_libc());
    }

    #[test]
    fn code_model_clang_names() {
        assert_eq!(CodeModel::Default.clang_name(), None);
        assert_eq!(CodeModel::Kernel.clang_name(), Some("kernel"));
    }

    #[test]
    fn serde_roundtrip() {
        let t: Triple = "riscv64-linux-gnu".parse().unwrap();
        let json = serde_json::to_string(&t).unwrap();
        let back: Triple = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
