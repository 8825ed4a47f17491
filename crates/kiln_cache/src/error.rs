//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Most cache reads are fail-safe: problems result in cache misses rather
/// than hard failures. This enum covers the operations that must succeed for
/// a build to make progress (locking, writing artifacts and manifests).
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A lock file could not be created or locked.
    #[error("failed to lock {path}: {source}")]
    Lock {
        /// The lock file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest file list could not be serialized.
    #[error("failed to serialize manifest: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A manifest operation that requires a prior probe ran without one.
    #[error("manifest used before hit() established its digest")]
    NotProbed,
}
