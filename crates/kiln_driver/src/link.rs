//! The linker collaborator.
//!
//! Linking is delegated through the [`Linker`] trait: the driver collects
//! every input (C objects, CRT files, runtime libraries, user objects) into
//! a [`LinkContext`] and calls [`flush`](Linker::flush) once per clean
//! update. Error conditions that should not abort the update (a missing
//! entry point) are reported through [`LinkErrorFlags`] instead of `Err`.

use crate::error::DriverError;
use crate::module::DeclId;
use kiln_config::{LinkMode, OutputMode};
use std::path::PathBuf;
use std::process::Command;

/// Non-fatal conditions the linker observed during flush.
///
/// Reported only when no other error was raised; cleared when the update
/// skips the flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkErrorFlags {
    /// The image needs an entry point and none of the inputs provide one.
    pub no_entry_point_found: bool,
    /// An input referenced libc but the image does not link it.
    pub missing_libc: bool,
}

impl LinkErrorFlags {
    /// Number of error conditions set.
    pub fn count(&self) -> usize {
        usize::from(self.no_entry_point_found) + usize::from(self.missing_libc)
    }
}

/// Everything the linker needs for one flush.
#[derive(Debug)]
pub struct LinkContext {
    /// What kind of image to produce.
    pub output_mode: OutputMode,
    /// Static or dynamic image.
    pub link_mode: LinkMode,
    /// Relocatable objects, in link order.
    pub objects: Vec<PathBuf>,
    /// CRT startup objects and runtime libraries, in link order.
    pub crt_files: Vec<PathBuf>,
    /// System libraries resolved at link time.
    pub system_libs: Vec<String>,
    /// Library search directories.
    pub lib_dirs: Vec<PathBuf>,
    /// Where the image goes, or `None` when no binary is emitted.
    pub out_path: Option<PathBuf>,
}

/// The linker back-end, seen from the driver.
pub trait Linker {
    /// Incrementally (re)emits one declaration into the image.
    fn update_decl(&mut self, decl: DeclId) -> Result<(), String>;

    /// Updates the recorded source line of a declaration.
    fn update_decl_line_number(&mut self, decl: DeclId) -> Result<(), String>;

    /// Produces the final image from the collected inputs.
    fn flush(&mut self, ctx: &LinkContext) -> Result<(), DriverError>;

    /// Error flags observed by the last flush.
    fn error_flags(&self) -> LinkErrorFlags;

    /// Clears the error flags (the update does this when it skips the
    /// flush because other errors exist).
    fn clear_error_flags(&mut self);
}

/// A linker that shells out to the system toolchain.
///
/// Executables and shared libraries go through the C compiler driver so the
/// platform's default search paths apply; static libraries go through `ar`;
/// a single-object `Obj` output is copied into place.
#[derive(Debug)]
pub struct SystemLinker {
    cc_path: PathBuf,
    ar_path: PathBuf,
    flags: LinkErrorFlags,
}

impl SystemLinker {
    /// Creates a system linker; `cc_path`/`ar_path` default to `cc`/`ar`
    /// from `PATH`.
    pub fn new(cc_path: Option<PathBuf>, ar_path: Option<PathBuf>) -> Self {
        Self {
            cc_path: cc_path.unwrap_or_else(|| PathBuf::from("cc")),
            ar_path: ar_path.unwrap_or_else(|| PathBuf::from("ar")),
            flags: LinkErrorFlags::default(),
        }
    }
}

impl Linker for SystemLinker {
    fn update_decl(&mut self, _decl: DeclId) -> Result<(), String> {
        // The system toolchain relinks from whole objects; nothing to do
        // per declaration.
        Ok(())
    }

    fn update_decl_line_number(&mut self, _decl: DeclId) -> Result<(), String> {
        Ok(())
    }

    fn flush(&mut self, ctx: &LinkContext) -> Result<(), DriverError> {
        self.flags = LinkErrorFlags::default();
        let Some(out_path) = &ctx.out_path else {
            return Ok(());
        };

        match ctx.output_mode {
            OutputMode::Obj => match ctx.objects.len() {
                0 => Ok(()),
                1 => {
                    std::fs::copy(&ctx.objects[0], out_path)
                        .map_err(|e| DriverError::io(out_path, e))?;
                    Ok(())
                }
                n => Err(DriverError::Link(format!(
                    "cannot produce a single object from {n} inputs"
                ))),
            },
            OutputMode::Lib if ctx.link_mode == LinkMode::Static => {
                let mut cmd = Command::new(&self.ar_path);
                cmd.arg("rcs").arg(out_path).args(&ctx.objects);
                run_tool(&mut cmd, "ar")
            }
            OutputMode::Exe | OutputMode::Lib => {
                if ctx.objects.is_empty() && ctx.crt_files.is_empty() {
                    self.flags.no_entry_point_found = true;
                    return Ok(());
                }
                let mut cmd = Command::new(&self.cc_path);
                if ctx.output_mode == OutputMode::Lib {
                    cmd.arg("-shared");
                } else if ctx.link_mode == LinkMode::Static {
                    cmd.arg("-static");
                }
                cmd.arg("-o").arg(out_path);
                cmd.args(&ctx.crt_files);
                cmd.args(&ctx.objects);
                for dir in &ctx.lib_dirs {
                    cmd.arg("-L").arg(dir);
                }
                for lib in &ctx.system_libs {
                    cmd.arg(format!("-l{lib}"));
                }
                run_tool(&mut cmd, "cc")
            }
        }
    }

    fn error_flags(&self) -> LinkErrorFlags {
        self.flags
    }

    fn clear_error_flags(&mut self) {
        self.flags = LinkErrorFlags::default();
    }
}

fn run_tool(cmd: &mut Command, what: &str) -> Result<(), DriverError> {
    let output = cmd.output().map_err(|e| DriverError::Spawn {
        what: what.to_string(),
        source: e,
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DriverError::Link(format!(
            "{what} failed with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(output_mode: OutputMode, objects: Vec<PathBuf>, out: Option<PathBuf>) -> LinkContext {
        LinkContext {
            output_mode,
            link_mode: LinkMode::Static,
            objects,
            crt_files: Vec::new(),
            system_libs: Vec::new(),
            lib_dirs: Vec::new(),
            out_path: out,
        }
    }

    #[test]
    fn flags_count() {
        let mut f = LinkErrorFlags::default();
        assert_eq!(f.count(), 0);
        f.no_entry_point_found = true;
        assert_eq!(f.count(), 1);
    }

    #[test]
    fn obj_output_copies_single_object() {
        let tmp = tempfile::tempdir().unwrap();
        let obj = tmp.path().join("in.o");
        std::fs::write(&obj, b"object").unwrap();
        let out = tmp.path().join("out.o");

        let mut linker = SystemLinker::new(None, None);
        linker
            .flush(&ctx(OutputMode::Obj, vec![obj], Some(out.clone())))
            .unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"object");
    }

    #[test]
    fn obj_output_rejects_multiple_objects() {
        let mut linker = SystemLinker::new(None, None);
        let err = linker
            .flush(&ctx(
                OutputMode::Obj,
                vec![PathBuf::from("a.o"), PathBuf::from("b.o")],
                Some(PathBuf::from("out.o")),
            ))
            .unwrap_err();
        assert!(matches!(err, DriverError::Link(_)));
    }

    #[test]
    fn no_out_path_is_a_no_op() {
        let mut linker = SystemLinker::new(None, None);
        linker
            .flush(&ctx(OutputMode::Exe, vec![PathBuf::from("a.o")], None))
            .unwrap();
        assert_eq!(linker.error_flags(), LinkErrorFlags::default());
    }

    #[test]
    fn empty_exe_sets_no_entry_point_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let mut linker = SystemLinker::new(None, None);
        linker
            .flush(&ctx(OutputMode::Exe, Vec::new(), Some(tmp.path().join("a"))))
            .unwrap();
        assert!(linker.error_flags().no_entry_point_found);
        linker.clear_error_flags();
        assert!(!linker.error_flags().no_entry_point_found);
    }

    #[test]
    fn exe_link_invokes_cc() {
        // A fake `cc` that concatenates its object inputs.
        let tmp = tempfile::tempdir().unwrap();
        let cc = tmp.path().join("cc");
        std::fs::write(
            &cc,
            "#!/bin/sh\nout=\"\"\nwhile [ $# -gt 0 ]; do\n  case \"$1\" in\n    -o) shift; out=\"$1\";;\n    -*) ;;\n    *) cat \"$1\" >> \"$out.tmp\";;\n  esac\n  shift\ndone\nmv \"$out.tmp\" \"$out\"\n",
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&cc, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let a = tmp.path().join("a.o");
        let b = tmp.path().join("b.o");
        std::fs::write(&a, b"AA").unwrap();
        std::fs::write(&b, b"BB").unwrap();
        let out = tmp.path().join("prog");

        let mut linker = SystemLinker::new(Some(cc), None);
        let mut c = ctx(OutputMode::Exe, vec![a, b], Some(out.clone()));
        c.link_mode = LinkMode::Dynamic;
        linker.flush(&c).unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"AABB");
    }
}
