//! Driver error types.

use kiln_diagnostics::Diagnostic;
use std::path::PathBuf;

/// Errors that abort a compilation (as opposed to per-input failures, which
/// are captured on the owning slot or declaration and reported together).
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The requested configuration is inconsistent with the target.
    #[error(transparent)]
    Config(#[from] kiln_config::ConfigError),

    /// A cache operation that must succeed failed.
    #[error(transparent)]
    Cache(#[from] kiln_cache::CacheError),

    /// An I/O error outside the cache.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A child process could not be spawned at all.
    #[error("unable to spawn {what}: {source}")]
    Spawn {
        /// The executable that failed to start.
        what: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Building a CRT or runtime library failed.
    ///
    /// These builds are expected to succeed for supported targets, so the
    /// failure carries the sub-compilation's full diagnostic list.
    #[error("building runtime library '{lib}' failed with {} error(s)", errors.len())]
    RuntimeLibBuildFailed {
        /// The library that failed to build.
        lib: String,
        /// Aggregated diagnostics from the sub-compilation.
        errors: Vec<Diagnostic>,
    },

    /// A link library name that cannot be recorded in `libs.txt`.
    #[error("link library name {name:?} contains whitespace or control characters")]
    InvalidLinkLibName {
        /// The offending name.
        name: String,
    },

    /// The self-hosted linker cannot produce the requested output.
    #[error("linker: {0}")]
    Link(String),

    /// Passthrough mode: the child compiler's exit code must become ours.
    ///
    /// Not a failure as such; the CLI exits with the carried code.
    #[error("child compiler exited with code {0}")]
    EarlyExit(i32),

    /// A bug in the driver.
    #[error(transparent)]
    Internal(#[from] kiln_common::InternalError),
}

impl DriverError {
    /// Convenience constructor for [`DriverError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
