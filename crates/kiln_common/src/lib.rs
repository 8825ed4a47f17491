//! Shared foundational types used across the Kiln build orchestrator.
//!
//! This crate provides core types including content hashing, the streaming
//! hasher used by the cache manifest, directory handles passed to child
//! process invocations, and common result types.

#![warn(missing_docs)]

pub mod directory;
pub mod hash;
pub mod result;

pub use directory::Directory;
pub use hash::{ContentHash, ContentHasher};
pub use result::{InternalError, KilnResult};
