//! Installed C library descriptions.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Description of a C library installation on the build machine.
///
/// Used when the target's libc is not built from source: the include
/// directories feed `-isystem` flags and the CRT directory supplies the
/// startup objects the linker needs for executables.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibcInstallation {
    /// Directory containing the libc headers.
    pub include_dir: Option<PathBuf>,
    /// Directory containing the architecture-specific headers.
    pub sys_include_dir: Option<PathBuf>,
    /// Directory containing `crt1.o` and friends.
    pub crt_dir: Option<PathBuf>,
    /// MSVC library directory (Windows only).
    pub msvc_lib_dir: Option<PathBuf>,
    /// Directory containing `kernel32.lib` (Windows only).
    pub kernel32_lib_dir: Option<PathBuf>,
}

impl LibcInstallation {
    /// Validates that this installation can support the requested build.
    ///
    /// Headers are always required; the CRT directory only when linking an
    /// executable or dynamic library against this installation.
    pub fn validate(&self, needs_crt_dir: bool) -> Result<(), ConfigError> {
        if self.include_dir.is_none() {
            return Err(ConfigError::Invalid(
                "libc installation has no include directory".to_string(),
            ));
        }
        if needs_crt_dir && self.crt_dir.is_none() {
            return Err(ConfigError::LibcInstallationMissingCrtDir);
        }
        Ok(())
    }

    /// The include directories, most specific last, for `-isystem` flags.
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(d) = &self.include_dir {
            dirs.push(d.clone());
        }
        if let Some(d) = &self.sys_include_dir {
            dirs.push(d.clone());
        }
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_installation() -> LibcInstallation {
        LibcInstallation {
            include_dir: Some(PathBuf::from("/usr/include")),
            sys_include_dir: Some(PathBuf::from("/usr/include/x86_64-linux-gnu")),
            crt_dir: Some(PathBuf::from("/usr/lib/x86_64-linux-gnu")),
            msvc_lib_dir: None,
            kernel32_lib_dir: None,
        }
    }

    #[test]
    fn valid_installation_passes() {
        assert!(full_installation().validate(true).is_ok());
    }

    #[test]
    fn missing_include_dir_fails() {
        let inst = LibcInstallation::default();
        assert!(matches!(inst.validate(false), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_crt_dir_fails_only_when_needed() {
        let mut inst = full_installation();
        inst.crt_dir = None;
        assert!(inst.validate(false).is_ok());
        assert!(matches!(
            inst.validate(true),
            Err(ConfigError::LibcInstallationMissingCrtDir)
        ));
    }

    #[test]
    fn include_dirs_ordered() {
        let dirs = full_installation().include_dirs();
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0], PathBuf::from("/usr/include"));
    }
}
