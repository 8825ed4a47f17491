//! The per-artifact hashing transaction.
//!
//! A [`Manifest`] accumulates everything that may affect one artifact's
//! contents: explicit inputs (flags, config decisions) and file dependencies.
//! The hash state at probe time names the manifest file under `h/`; the hash
//! state after all file contents are folded names the artifact directory
//! under `o/`. The manifest file records the file list so the next build can
//! re-verify it without running the producer.

use crate::cache::Cache;
use crate::depfile::parse_dep_file;
use crate::error::CacheError;
use crate::lock::ArtifactLock;
use kiln_common::{ContentHash, ContentHasher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One recorded file dependency of an artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// The dependency's path as the producer saw it.
    pub path: PathBuf,
    /// File size at record time (cheap first-pass freshness check).
    pub size: u64,
    /// Hash of the file contents.
    pub content_hash: ContentHash,
}

/// A snapshot of the manifest's hash state, taken before an optimistic
/// [`Manifest::hit`] so it can be rolled back with [`Manifest::unhit`].
pub struct ManifestSnapshot {
    hasher: ContentHasher,
    file_count: usize,
}

/// The hashing transaction for one artifact.
///
/// Obtained from [`Cache::obtain`]; see the crate docs for the protocol.
pub struct Manifest<'a> {
    cache: &'a Cache,
    hasher: ContentHasher,
    files: Vec<FileEntry>,
    digest: Option<ContentHash>,
    lock: Option<ArtifactLock>,
}

/// The persisted form of a manifest: the recorded file list.
#[derive(Serialize, Deserialize)]
struct ManifestFile {
    files: Vec<FileEntry>,
}

impl<'a> Manifest<'a> {
    pub(crate) fn new(cache: &'a Cache, hasher: ContentHasher) -> Self {
        Self {
            cache,
            hasher,
            files: Vec::new(),
            digest: None,
            lock: None,
        }
    }

    /// Folds raw bytes into the artifact hash.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Folds a string into the artifact hash.
    pub fn add_str(&mut self, s: &str) {
        self.hasher.update_str(s);
    }

    /// Folds an optional string into the artifact hash, distinguishing
    /// absence from the empty string.
    pub fn add_opt_str(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                self.hasher.update_bool(true);
                self.hasher.update_str(s);
            }
            None => self.hasher.update_bool(false),
        }
    }

    /// Folds a boolean into the artifact hash.
    pub fn add_bool(&mut self, v: bool) {
        self.hasher.update_bool(v);
    }

    /// Folds an unsigned integer into the artifact hash.
    pub fn add_int(&mut self, v: u64) {
        self.hasher.update_u64(v);
    }

    /// Records a file dependency: its path, size, and content hash are
    /// folded into the artifact hash and remembered for the manifest file.
    pub fn add_file(&mut self, path: &Path) -> Result<usize, CacheError> {
        let content = std::fs::read(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let entry = FileEntry {
            path: path.to_path_buf(),
            size: content.len() as u64,
            content_hash: ContentHash::from_bytes(&content),
        };
        self.fold_entry(&entry);
        self.files.push(entry);
        Ok(self.files.len() - 1)
    }

    /// Ingests a Makefile-style dependency file produced by the child
    /// compiler, recording every prerequisite as a file dependency.
    ///
    /// Called after the producer ran, hence "post": these files extend the
    /// final artifact digest and the persisted file list, but not the
    /// manifest's own name, which was fixed by [`hit`](Self::hit).
    pub fn add_dep_file_post(&mut self, dep_path: &Path) -> Result<(), CacheError> {
        let content = std::fs::read_to_string(dep_path).map_err(|e| CacheError::Io {
            path: dep_path.to_path_buf(),
            source: e,
        })?;
        for dep in parse_dep_file(&content) {
            self.add_file(&dep)?;
        }
        Ok(())
    }

    /// Snapshots the hash state and file count for a later [`unhit`](Self::unhit).
    pub fn snapshot(&self) -> ManifestSnapshot {
        ManifestSnapshot {
            hasher: self.hasher.clone(),
            file_count: self.files.len(),
        }
    }

    /// Rewinds a speculative hit: restores the hash state and truncates the
    /// file list to the snapshot. The digest and lock established by
    /// [`hit`](Self::hit) are kept; the caller re-runs the producer and
    /// persists a fresh file list under the same manifest name.
    pub fn unhit(&mut self, snapshot: ManifestSnapshot) {
        self.hasher = snapshot.hasher;
        self.files.truncate(snapshot.file_count);
    }

    /// Probes the cache for a prior result of this transaction.
    ///
    /// Fixes the manifest digest from the current hash state, acquires the
    /// artifact lock (blocking out concurrent producers of the same digest),
    /// and checks whether a recorded manifest exists whose file list is still
    /// fresh. On a hit, files recorded by the previous run beyond those the
    /// caller already added (dep files) are verified and folded into the hash
    /// so that [`final_digest`](Self::final_digest) lands on the prior
    /// artifact.
    ///
    /// A missing, corrupt, or stale manifest is a miss, never an error.
    pub fn hit(&mut self) -> Result<bool, CacheError> {
        let digest = self.hasher.peek();
        self.digest = Some(digest);
        if self.lock.is_none() {
            self.lock = Some(ArtifactLock::acquire(&self.cache.lock_path(&digest))?);
        }

        let recorded = match std::fs::read(self.cache.manifest_path(&digest)) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };
        let recorded: ManifestFile = match serde_json::from_slice(&recorded) {
            Ok(m) => m,
            Err(_) => return Ok(false),
        };

        if recorded.files.len() < self.files.len() {
            return Ok(false);
        }

        // Verify everything before folding anything, so a miss leaves the
        // hash state exactly as the caller built it.
        let mut post = Vec::new();
        for (i, entry) in recorded.files.iter().enumerate() {
            if i < self.files.len() {
                if *entry != self.files[i] {
                    return Ok(false);
                }
            } else {
                let content = match std::fs::read(&entry.path) {
                    Ok(c) => c,
                    Err(_) => return Ok(false),
                };
                if content.len() as u64 != entry.size
                    || ContentHash::from_bytes(&content) != entry.content_hash
                {
                    return Ok(false);
                }
                post.push(entry.clone());
            }
        }

        for entry in post {
            self.fold_entry(&entry);
            self.files.push(entry);
        }
        Ok(true)
    }

    /// The digest naming the artifact directory: the hash of every input and
    /// every file dependency folded so far.
    pub fn final_digest(&self) -> ContentHash {
        self.hasher.peek()
    }

    /// The digest naming the manifest file, fixed by [`hit`](Self::hit).
    pub fn manifest_digest(&self) -> Option<ContentHash> {
        self.digest
    }

    /// The recorded file dependencies, in insertion order.
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Persists the file list under the manifest digest.
    pub fn write_manifest(&self) -> Result<(), CacheError> {
        let digest = self.digest.ok_or(CacheError::NotProbed)?;
        let path = self.cache.manifest_path(&digest);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(&ManifestFile {
            files: self.files.clone(),
        })
        .map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Converts the held lock into an owned lock returnable to the caller.
    ///
    /// Returns `None` if [`hit`](Self::hit) was never called.
    pub fn take_lock(&mut self) -> Option<ArtifactLock> {
        self.lock.take()
    }

    fn fold_entry(&mut self, entry: &FileEntry) {
        self.hasher.update_str(&entry.path.to_string_lossy());
        self.hasher.update_u64(entry.size);
        self.hasher.update(&entry.content_hash.to_string().into_bytes());
    }
}
