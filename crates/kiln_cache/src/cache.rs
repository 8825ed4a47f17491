//! Cache root layout and manifest creation.

use crate::error::CacheError;
use crate::manifest::Manifest;
use kiln_common::{ContentHash, ContentHasher, Directory};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter distinguishing temporary output files within one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A cache root directory with the standard `h/` / `o/` / `tmp/` layout.
///
/// `h/<digest>` holds manifest files and their `.lock` companions;
/// `o/<digest>/` holds produced artifacts; `tmp/` holds producer outputs
/// before they are renamed into place. The same layout is shared by the
/// local and global caches; CRT sub-compilations point both at the global
/// one.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: Directory,
    version: String,
}

impl Cache {
    /// Creates a cache handle rooted at `dir`.
    ///
    /// `version` is the compiler version string; it is folded into every
    /// manifest so artifacts never survive a toolchain upgrade.
    pub fn new(dir: Directory, version: &str) -> Self {
        Self {
            dir,
            version: version.to_string(),
        }
    }

    /// The cache root directory.
    pub fn dir(&self) -> &Directory {
        &self.dir
    }

    /// Begins a new manifest transaction, seeded with the compiler version.
    pub fn obtain(&self) -> Manifest<'_> {
        let mut hasher = ContentHasher::new();
        hasher.update_str(&self.version);
        Manifest::new(self, hasher)
    }

    /// Path of the manifest file for a digest: `h/<digest>`.
    pub fn manifest_path(&self, digest: &ContentHash) -> PathBuf {
        self.dir.join("h").join(digest.to_string())
    }

    /// Path of the lock file for a digest: `h/<digest>.lock`.
    pub fn lock_path(&self, digest: &ContentHash) -> PathBuf {
        self.dir.join("h").join(format!("{digest}.lock"))
    }

    /// Directory artifacts for a digest live in: `o/<digest>/`.
    pub fn artifact_dir(&self, digest: &ContentHash) -> PathBuf {
        self.dir.join("o").join(digest.to_string())
    }

    /// Full path of a named artifact: `o/<digest>/<basename>`.
    pub fn artifact_path(&self, digest: &ContentHash, basename: &str) -> PathBuf {
        self.artifact_dir(digest).join(basename)
    }

    /// Reserves a fresh temporary path on the same filesystem as `o/`, so a
    /// completed producer output can be renamed into place atomically.
    pub fn tmp_path(&self, basename: &str) -> Result<PathBuf, CacheError> {
        let tmp_dir = self.dir.join("tmp");
        std::fs::create_dir_all(&tmp_dir).map_err(|e| CacheError::Io {
            path: tmp_dir.clone(),
            source: e,
        })?;
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        Ok(tmp_dir.join(format!("{}-{n}-{basename}", std::process::id())))
    }

    /// Moves a finished producer output into `o/<digest>/<basename>`.
    ///
    /// The rename is atomic on POSIX filesystems; a concurrent process that
    /// lost the lock race never observes a partially written artifact.
    pub fn rename_into_cache(
        &self,
        tmp: &PathBuf,
        digest: &ContentHash,
        basename: &str,
    ) -> Result<PathBuf, CacheError> {
        let dir = self.artifact_dir(digest);
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;
        let dest = dir.join(basename);
        std::fs::rename(tmp, &dest).map_err(|e| CacheError::Io {
            path: dest.clone(),
            source: e,
        })?;
        Ok(dest)
    }
}
