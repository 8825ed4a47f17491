//! Owned directory handles passed between the driver and child invocations.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// A directory the driver hands to sub-compilations and child processes.
///
/// Wraps the directory's path and guarantees it exists once
/// [`ensure_exists`](Self::ensure_exists) has been called. Child compiler
/// invocations receive the path form; the driver keeps the handle alive for
/// as long as anything may write into it.
#[derive(Clone, PartialEq, Eq)]
pub struct Directory {
    path: PathBuf,
}

impl Directory {
    /// Creates a handle for the given path without touching the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the directory (and any missing parents) and returns the handle.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = Self::new(path);
        dir.ensure_exists()?;
        Ok(dir)
    }

    /// Returns the directory's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Joins a relative path onto this directory.
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.path.join(rel)
    }

    /// Returns a handle for a subdirectory without creating it.
    pub fn sub(&self, rel: impl AsRef<Path>) -> Directory {
        Directory::new(self.path.join(rel))
    }

    /// Creates the directory and any missing parents.
    pub fn ensure_exists(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.path)
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Directory({})", self.path.display())
    }
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<PathBuf> for Directory {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_appends() {
        let d = Directory::new("/cache");
        assert_eq!(d.join("o/abc"), PathBuf::from("/cache/o/abc"));
    }

    #[test]
    fn sub_is_lazy() {
        let tmp = tempfile::tempdir().unwrap();
        let d = Directory::new(tmp.path());
        let sub = d.sub("does-not-exist-yet");
        assert!(!sub.path().exists());
        sub.ensure_exists().unwrap();
        assert!(sub.path().is_dir());
    }

    #[test]
    fn create_makes_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b").join("c");
        let d = Directory::create(&nested).unwrap();
        assert!(d.path().is_dir());
    }

    #[test]
    fn display_is_the_path() {
        let d = Directory::new("/some/dir");
        assert_eq!(format!("{d}"), "/some/dir");
    }
}
