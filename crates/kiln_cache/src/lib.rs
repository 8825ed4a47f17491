//! Content-addressed compilation caching.
//!
//! Every produced artifact (C object, CRT file, translated source, stage1
//! output) is addressed by a digest over everything that may affect its
//! contents. The [`Manifest`] type runs the per-artifact hashing transaction:
//! callers fold in inputs and file dependencies, probe for a prior result
//! with [`Manifest::hit`], roll back disproved hits with
//! [`Manifest::unhit`], and persist the file list with
//! [`Manifest::write_manifest`]. A cross-process [`ArtifactLock`] is held
//! from the probe until the consumer of the artifact is dropped.
//!
//! All reads are fail-safe: corruption or version mismatches result in cache
//! misses rather than errors.

#![warn(missing_docs)]

pub mod cache;
pub mod depfile;
pub mod error;
pub mod lock;
pub mod manifest;

pub use cache::Cache;
pub use depfile::parse_dep_file;
pub use error::CacheError;
pub use lock::ArtifactLock;
pub use manifest::{FileEntry, Manifest, ManifestSnapshot};
