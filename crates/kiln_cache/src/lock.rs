//! Cross-process artifact locks.

use crate::error::CacheError;
use fs2::FileExt as _;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// A filesystem-backed lock scoped to one artifact digest.
///
/// The lock is part of the data structure it protects (a CRT file record, a
/// C-object success payload, the stage1 artifact holder): while the owner is
/// alive no other Kiln process may overwrite the artifact the digest points
/// to. The lock is released when the owner is dropped.
#[derive(Debug)]
pub struct ArtifactLock {
    file: File,
    path: PathBuf,
}

impl ArtifactLock {
    /// Acquires an exclusive lock on `path`, creating the lock file (and any
    /// missing parent directories) if needed.
    ///
    /// This call blocks until the lock is available.
    pub fn acquire(path: &Path) -> Result<Self, CacheError> {
        let file = Self::open(path)?;
        file.lock_exclusive().map_err(|e| CacheError::Lock {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// Returns `Ok(None)` if another process (or another live handle in this
    /// process) holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, CacheError> {
        let file = Self::open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(CacheError::Lock {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// The lock file's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(path: &Path) -> Result<File, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| CacheError::Io {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

impl Drop for ArtifactLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h").join("abc.lock");
        let _lock = ArtifactLock::acquire(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn held_lock_blocks_try_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.lock");
        let held = ArtifactLock::acquire(&path).unwrap();
        assert!(ArtifactLock::try_acquire(&path).unwrap().is_none());
        drop(held);
        assert!(ArtifactLock::try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.lock");
        {
            let _lock = ArtifactLock::acquire(&path).unwrap();
        }
        let reacquired = ArtifactLock::try_acquire(&path).unwrap();
        assert!(reacquired.is_some());
    }
}
