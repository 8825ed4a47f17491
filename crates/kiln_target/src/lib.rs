//! Target triple model for the Kiln build orchestrator.
//!
//! This crate describes compilation targets (`x86_64-linux-musl` and friends)
//! and answers the per-target questions the config resolver and the C
//! compiler argument builder need: does this OS require linking libc, is
//! position-independent code mandatory, is dynamic linking possible, which
//! object format and file extension apply, and what does the LLVM back-end
//! want to hear about the CPU.

#![warn(missing_docs)]

pub mod features;
pub mod triple;
pub mod version;

pub use features::{CpuFeature, CpuFeatures, CpuModel};
pub use triple::{Abi, Arch, CodeModel, ObjectFormat, Os, Triple, TripleParseError};
pub use version::{LinuxVersionRange, OsVersionRange, SemanticVersion, SemanticVersionRange, WindowsVersion};
