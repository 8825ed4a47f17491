//! OS version ranges as they appear in the generated builtin source.

use crate::triple::{Abi, Os, Triple};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `major.minor.patch` version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SemanticVersion {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
}

impl SemanticVersion {
    /// Constructs a version from its components.
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// An inclusive semantic version range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticVersionRange {
    /// Lowest supported version.
    pub min: SemanticVersion,
    /// Highest supported version.
    pub max: SemanticVersion,
}

/// A Windows build version, ordered by build number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowsVersion(pub u32);

impl fmt::Display for WindowsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// A Linux kernel range together with the glibc version linked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxVersionRange {
    /// Supported kernel versions.
    pub range: SemanticVersionRange,
    /// The glibc version the build targets.
    pub glibc: SemanticVersion,
}

/// The version-range shape of a target OS.
///
/// This is one of the constants the builtin source declares: `none` for
/// bare-metal, a semver range for most OSes, a kernel range plus glibc
/// version for Linux, and min/max build versions for Windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsVersionRange {
    /// No meaningful version (freestanding).
    None,
    /// An inclusive semantic version range.
    Semver(SemanticVersionRange),
    /// Linux kernel range with embedded glibc version.
    Linux(LinuxVersionRange),
    /// Windows min/max build versions.
    Windows {
        /// Lowest supported build.
        min: WindowsVersion,
        /// Highest supported build.
        max: WindowsVersion,
    },
}

impl OsVersionRange {
    /// The default version range Kiln assumes for a target.
    pub fn default_for_target(target: &Triple) -> Self {
        match target.os {
            Os::Linux => OsVersionRange::Linux(LinuxVersionRange {
                range: SemanticVersionRange {
                    min: SemanticVersion::new(4, 19, 0),
                    max: SemanticVersion::new(6, 10, 0),
                },
                glibc: if target.abi == Abi::Gnu {
                    SemanticVersion::new(2, 28, 0)
                } else {
                    SemanticVersion::new(0, 0, 0)
                },
            }),
            Os::Windows => OsVersionRange::Windows {
                min: WindowsVersion(0x0A00_0000),
                max: WindowsVersion(0x0A00_FFFF),
            },
            Os::Macos => OsVersionRange::Semver(SemanticVersionRange {
                min: SemanticVersion::new(12, 0, 0),
                max: SemanticVersion::new(15, 0, 0),
            }),
            Os::Wasi => OsVersionRange::Semver(SemanticVersionRange {
                min: SemanticVersion::new(0, 1, 0),
                max: SemanticVersion::new(0, 2, 0),
            }),
            Os::Freestanding => OsVersionRange::None,
        }
    }

    /// Returns the shape tag used by the builtin source (`none`, `semver`,
    /// `linux`, or `windows`).
    pub fn tag(&self) -> &'static str {
        match self {
            OsVersionRange::None => "none",
            OsVersionRange::Semver(_) => "semver",
            OsVersionRange::Linux(_) => "linux",
            OsVersionRange::Windows { .. } => "windows",
        }
    }
}
