//! Building one C/C++ input into a cached object file.

use crate::cc_args::{add_cc_args, CSourceKind};
use crate::compilation::Compilation;
use crate::error::DriverError;
use crate::job::CObjectId;
use kiln_cache::ArtifactLock;
use kiln_config::{CSourceFile, OutputMode, PreprocessorMode};
use kiln_diagnostics::{Diagnostic, SourceLocation};
use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Cap on the child compiler stderr kept in a failure message.
const MAX_STDERR_BYTES: usize = 10 * 1024 * 1024;

/// The state of one C/C++ input slot.
///
/// `Success` implies the object exists on disk inside a cache directory
/// whose manifest digest matches the held lock; `Failure` implies an entry
/// in the compilation's failed-object table whose lifetime equals the
/// slot's.
#[derive(Debug)]
pub enum CObjectStatus {
    /// Not yet built in this update.
    New,
    /// Built (or cache-hit); the lock keeps the artifact alive.
    Success {
        /// Absolute path of the object inside the cache.
        object_path: PathBuf,
        /// The artifact lock held for the slot's lifetime.
        lock: ArtifactLock,
    },
    /// Compilation failed; the error lives in the failed-object table.
    Failure,
}

/// One C/C++ input and its build status.
#[derive(Debug)]
pub struct CObject {
    /// The input file and its extra flags.
    pub src: CSourceFile,
    /// Current build status.
    pub status: CObjectStatus,
}

impl CObject {
    /// A fresh slot for one input.
    pub fn new(src: CSourceFile) -> Self {
        Self {
            src,
            status: CObjectStatus::New,
        }
    }

    /// Resets the slot to `New`, releasing any held lock.
    ///
    /// Idempotent: clearing a `New` slot is a no-op.
    pub fn clear_status(&mut self) {
        self.status = CObjectStatus::New;
    }
}

impl Compilation {
    /// Runs the `CObject` job for one slot.
    ///
    /// Clang failures are captured on the slot; only driver-level errors
    /// (spawn failures, cache I/O) propagate to the dispatcher, which also
    /// records them. [`DriverError::EarlyExit`] propagates unconditionally:
    /// in passthrough mode the child's exit code becomes ours.
    pub(crate) fn update_c_object(&mut self, id: CObjectId) -> Result<(), DriverError> {
        self.clear_c_object(id);
        let src = self.c_objects()[id].src.clone();
        let kind = CSourceKind::classify(&src.src_path);
        let passthrough = self.options().clang_passthrough_mode;
        let preprocessor = self.options().clang_preprocessor_mode;
        let dep_enabled = !passthrough && preprocessor == PreprocessorMode::Off;

        let cache = self.local_cache().clone();
        let mut manifest = cache.obtain();
        self.add_base_cache_inputs(&mut manifest);
        manifest.add_bool(self.config().sanitize_c);
        for arg in &self.options().clang_argv {
            manifest.add_str(arg);
        }
        manifest.add_bool(self.options().link_libcpp);
        for dir in &self.options().libc_include_dirs {
            manifest.add_str(&dir.display().to_string());
        }
        manifest.add_int(preprocessor as u64);

        manifest.add_file(&src.src_path)?;
        let mut prev_flag: Option<&str> = None;
        for flag in &src.extra_flags {
            manifest.add_str(flag);
            if prev_flag == Some("-include") {
                // The included file is an input in its own right.
                manifest.add_file(std::path::Path::new(flag))?;
            }
            prev_flag = Some(flag.as_str());
        }

        let obj_ext = self.options().target.object_file_ext();
        let direct_to_output = self.c_objects().len() == 1
            && !self.options().have_root_module
            && self.options().output_mode == OutputMode::Obj
            && self.options().link_objects.is_empty();
        let basename = if direct_to_output {
            format!("{}{obj_ext}", self.options().root_name)
        } else {
            let stem = src
                .src_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "anonymous".to_string());
            format!("{stem}{obj_ext}")
        };

        let produces_object = preprocessor == PreprocessorMode::Off;
        let hit = if produces_object {
            dep_enabled && manifest.hit()?
        } else {
            false
        };

        if !hit {
            let dep_path = match dep_enabled {
                true => Some(cache.tmp_path(&format!("{basename}.d"))?),
                false => None,
            };
            let tmp_obj = match preprocessor {
                PreprocessorMode::Off => Some(cache.tmp_path(&basename)?),
                _ => None,
            };

            let mut argv: Vec<String> = Vec::new();
            add_cc_args(
                self.options(),
                self.config(),
                self.lib_dir().path(),
                kind,
                dep_path.as_deref(),
                &mut argv,
            );
            argv.extend(src.extra_flags.iter().cloned());
            match (preprocessor, &tmp_obj) {
                (PreprocessorMode::Off, Some(tmp)) => {
                    argv.push("-c".to_string());
                    argv.push("-o".to_string());
                    argv.push(tmp.display().to_string());
                }
                (PreprocessorMode::File, _) => {
                    argv.push("-E".to_string());
                    if let Some(out) = self.bin_file_path() {
                        argv.push("-o".to_string());
                        argv.push(out.display().to_string());
                    }
                }
                _ => argv.push("-E".to_string()),
            }
            argv.push(src.src_path.display().to_string());

            let clang_exe = self
                .options()
                .clang_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("clang"));
            if self.options().verbose_cc {
                eprintln!("{} {}", clang_exe.display(), argv.join(" "));
            }

            if passthrough {
                let status = Command::new(&clang_exe)
                    .args(&argv)
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .map_err(|e| DriverError::Spawn {
                        what: clang_exe.display().to_string(),
                        source: e,
                    })?;
                if !status.success() {
                    return Err(DriverError::EarlyExit(1));
                }
                if preprocessor == PreprocessorMode::Stdout {
                    return Err(DriverError::EarlyExit(0));
                }
            } else {
                let output = Command::new(&clang_exe)
                    .args(&argv)
                    .stdin(Stdio::null())
                    .output()
                    .map_err(|e| DriverError::Spawn {
                        what: clang_exe.display().to_string(),
                        source: e,
                    })?;
                if !output.status.success() {
                    let mut stderr = output.stderr;
                    stderr.truncate(MAX_STDERR_BYTES);
                    let stderr = String::from_utf8_lossy(&stderr);
                    if !stderr.is_empty() {
                        eprintln!("{stderr}");
                    }
                    let message = match output.status.code() {
                        Some(code) => format!("clang exited with code {code}"),
                        None => "clang terminated unexpectedly".to_string(),
                    };
                    self.record_c_object_failure(id, &src.src_path, message);
                    return Ok(());
                }
                if preprocessor == PreprocessorMode::Stdout {
                    let _ = std::io::stdout().write_all(&output.stdout);
                }
            }

            if !produces_object {
                return Ok(());
            }

            if let Some(dep_path) = &dep_path {
                manifest.add_dep_file_post(dep_path)?;
                if let Err(e) = std::fs::remove_file(dep_path) {
                    self.sink().emit(Diagnostic::warning(format!(
                        "unable to delete dep file {}: {e}",
                        dep_path.display()
                    )));
                }
            }
            if !dep_enabled {
                // Establish the digest and lock even with caching disabled.
                let _ = manifest.hit()?;
            }
            let digest = manifest.final_digest();
            if let Some(tmp) = &tmp_obj {
                cache.rename_into_cache(tmp, &digest, &basename)?;
            }
            if let Err(e) = manifest.write_manifest() {
                self.sink().emit(Diagnostic::warning(format!(
                    "unable to write cache manifest: {e}"
                )));
            }
        }

        if !produces_object {
            return Ok(());
        }

        let object_path = cache.artifact_path(&manifest.final_digest(), &basename);
        let lock = manifest
            .take_lock()
            .ok_or_else(|| kiln_common::InternalError::new("C object manifest has no lock"))?;
        self.set_c_object_success(id, object_path, lock);
        Ok(())
    }

    pub(crate) fn record_c_object_failure(
        &mut self,
        id: CObjectId,
        src_path: &std::path::Path,
        message: String,
    ) {
        let diag =
            Diagnostic::error(message).with_location(SourceLocation::new(src_path, 0));
        self.insert_c_object_failure(id, diag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::CSourceFile;

    #[test]
    fn clear_status_is_idempotent() {
        let mut obj = CObject::new(CSourceFile::new("a.c"));
        obj.clear_status();
        obj.clear_status();
        assert!(matches!(obj.status, CObjectStatus::New));
    }

    #[test]
    fn clear_releases_the_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_path = tmp.path().join("x.lock");
        let lock = ArtifactLock::acquire(&lock_path).unwrap();
        let mut obj = CObject::new(CSourceFile::new("a.c"));
        obj.status = CObjectStatus::Success {
            object_path: tmp.path().join("a.o"),
            lock,
        };
        obj.clear_status();
        assert!(ArtifactLock::try_acquire(&lock_path).unwrap().is_some());
    }
}
