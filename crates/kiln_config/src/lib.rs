//! Build configuration for the Kiln driver.
//!
//! This crate defines the user-supplied [`CompilationOptions`] record, the
//! [`resolve`] pipeline that derives a consistent [`ResolvedConfig`] from it
//! (rejecting inconsistent requests with specific [`ConfigError`] kinds), the
//! [`EmitLoc`] type naming where artifacts land, the description of an
//! installed C library, and the `kiln.toml` project file loader.

#![warn(missing_docs)]

pub mod emit;
pub mod error;
pub mod libc;
pub mod loader;
pub mod resolve;
pub mod types;

pub use emit::EmitLoc;
pub use error::ConfigError;
pub use libc::LibcInstallation;
pub use loader::{find_project_root, load_project, load_project_from_str, ProjectFile};
pub use resolve::{resolve, ResolvedConfig};
pub use types::{
    CSourceFile, CompilationOptions, LinkMode, OptimizeMode, OutputMode, PreprocessorMode,
};
