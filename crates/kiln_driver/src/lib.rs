//! The Kiln compilation driver core.
//!
//! Given a declarative set of inputs — a root native-language module, C/C++
//! sources, a target triple, linker options, and emit requests — the
//! [`Compilation`] type performs an incremental, content-addressed build
//! producing objects, libraries, or executables, bootstrapping the target's
//! C runtime from bundled source when cross-compiling.
//!
//! The pieces:
//! - a FIFO work queue of tagged [`Job`]s drained once per
//!   [`Compilation::update`], with failures captured per job;
//! - the content-addressed cache discipline (from `kiln_cache`) deciding
//!   hit/miss per artifact and holding locks for the lifetime of consumers;
//! - recursive sub-compilations building CRT and runtime libraries whose
//!   outputs feed back as linker inputs;
//! - a bridge to the non-incremental stage1 back-end keyed by a symlink
//!   digest.
//!
//! The language module, the linker back-end, the C translator, and the
//! runtime-library recipes are external collaborators behind the [`Module`],
//! [`Linker`], [`CTranslator`], and [`RuntimeLibs`] traits.

#![warn(missing_docs)]

pub mod builtin;
pub mod c_object;
pub mod cc_args;
pub mod compilation;
pub mod error;
pub mod job;
pub mod link;
pub mod module;
pub mod runtime_libs;
pub mod stage1;
pub mod translate_c;

pub use c_object::{CObject, CObjectStatus};
pub use compilation::{Compilation, CreateOptions, CrtFile};
pub use error::DriverError;
pub use job::{GlibcFile, Job, MingwFile, MuslFile};
pub use link::{LinkContext, LinkErrorFlags, Linker, SystemLinker};
pub use module::{DeclId, DeclState, Module, ModuleError, ModuleJob, NullModule};
pub use runtime_libs::{BundledRuntime, CrtSourceSpec, RuntimeLibs};
pub use stage1::{Stage1Backend, Stage1Context, Stage1Flags, Stage1Result};
pub use translate_c::{CTranslator, TranslateOutput};

/// The compiler version folded into every cache manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Whether this Kiln binary carries the LLVM back-end.
pub const LLVM_AVAILABLE: bool = true;

#[cfg(test)]
pub(crate) mod test_support;
