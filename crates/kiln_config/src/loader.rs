//! `kiln.toml` project file loading.

use crate::error::ConfigError;
use crate::types::{CSourceFile, CompilationOptions, LinkMode, OptimizeMode, OutputMode};
use kiln_target::Triple;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The top-level project file parsed from `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectFile {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// Build settings.
    #[serde(default)]
    pub build: BuildSection,
}

/// Core project metadata required in every `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project (and default artifact) name.
    pub name: String,
    /// The project version string.
    pub version: String,
    /// Path to the root native-language module, if the project has one.
    #[serde(default)]
    pub root_module: Option<String>,
}

/// The `[build]` section of `kiln.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct BuildSection {
    /// Target triple (defaults to `x86_64-linux-gnu`).
    #[serde(default)]
    pub target: Option<String>,
    /// Output kind: `exe`, `lib`, or `obj`.
    #[serde(default)]
    pub output: Option<String>,
    /// Optimization mode: `debug`, `release-safe`, `release-fast`,
    /// `release-small`.
    #[serde(default)]
    pub optimize: Option<String>,
    /// Link mode override: `static` or `dynamic`.
    #[serde(default)]
    pub link_mode: Option<String>,
    /// C/C++ source files.
    #[serde(default)]
    pub c_sources: Vec<String>,
    /// System libraries to link.
    #[serde(default)]
    pub system_libs: Vec<String>,
    /// Link against the target's C library.
    #[serde(default)]
    pub link_libc: bool,
    /// Link against the C++ standard library.
    #[serde(default)]
    pub link_libcpp: bool,
    /// Omit debug info.
    #[serde(default)]
    pub strip: bool,
    /// Build with no thread support.
    #[serde(default)]
    pub single_threaded: bool,
}

/// Loads and validates `<project_dir>/kiln.toml`.
pub fn load_project(project_dir: &Path) -> Result<ProjectFile, ConfigError> {
    let config_path = project_dir.join("kiln.toml");
    let content = std::fs::read_to_string(&config_path)?;
    load_project_from_str(&content)
}

/// Parses and validates a `kiln.toml` from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_project_from_str(content: &str) -> Result<ProjectFile, ConfigError> {
    let file: ProjectFile =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    if file.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    Ok(file)
}

impl ProjectFile {
    /// Converts the project file into a [`CompilationOptions`] record.
    ///
    /// `project_dir` anchors relative source paths.
    pub fn to_options(&self, project_dir: &Path) -> Result<CompilationOptions, ConfigError> {
        let target: Triple = self
            .build
            .target
            .as_deref()
            .unwrap_or("x86_64-linux-gnu")
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("{e}")))?;

        let mut options = CompilationOptions::new(&self.project.name, target);
        options.have_root_module = self.project.root_module.is_some();
        options.root_source_path = self
            .project
            .root_module
            .as_ref()
            .map(|p| project_dir.join(p));

        options.output_mode = match self.build.output.as_deref() {
            None => {
                if options.have_root_module {
                    OutputMode::Exe
                } else {
                    OutputMode::Obj
                }
            }
            Some("exe") => OutputMode::Exe,
            Some("lib") => OutputMode::Lib,
            Some("obj") => OutputMode::Obj,
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "unknown output kind '{other}' (expected exe, lib, or obj)"
                )))
            }
        };

        options.optimize_mode = match self.build.optimize.as_deref() {
            None | Some("debug") => OptimizeMode::Debug,
            Some("release-safe") => OptimizeMode::ReleaseSafe,
            Some("release-fast") => OptimizeMode::ReleaseFast,
            Some("release-small") => OptimizeMode::ReleaseSmall,
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "unknown optimize mode '{other}'"
                )))
            }
        };

        options.link_mode = match self.build.link_mode.as_deref() {
            None => None,
            Some("static") => Some(LinkMode::Static),
            Some("dynamic") => Some(LinkMode::Dynamic),
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "unknown link mode '{other}' (expected static or dynamic)"
                )))
            }
        };

        options.c_source_files = self
            .build
            .c_sources
            .iter()
            .map(|s| CSourceFile::new(project_dir.join(s)))
            .collect();
        options.system_libs = self.build.system_libs.clone();
        options.link_libc = self.build.link_libc;
        options.link_libcpp = self.build.link_libcpp;
        options.strip = self.build.strip;
        options.single_threaded = self.build.single_threaded;

        Ok(options)
    }
}

/// Walks up from `start` looking for the nearest directory containing
/// `kiln.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join("kiln.toml").exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ConfigError::Invalid(format!(
                "could not find kiln.toml in {} or any parent directory",
                start.display()
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal() {
        let file = load_project_from_str(
            r#"
[project]
name = "demo"
version = "0.1.0"
"#,
        )
        .unwrap();
        assert_eq!(file.project.name, "demo");
        assert!(file.project.root_module.is_none());
    }

    #[test]
    fn parse_full_build_section() {
        let file = load_project_from_str(
            r#"
[project]
name = "demo"
version = "0.1.0"
root_module = "src/main.kn"

[build]
target = "x86_64-linux-musl"
output = "exe"
optimize = "release-safe"
link_libc = true
c_sources = ["src/glue.c"]
system_libs = []
"#,
        )
        .unwrap();
        let options = file.to_options(Path::new("/proj")).unwrap();
        assert_eq!(options.target.to_string(), "x86_64-linux-musl");
        assert_eq!(options.output_mode, OutputMode::Exe);
        assert_eq!(options.optimize_mode, OptimizeMode::ReleaseSafe);
        assert!(options.link_libc);
        assert!(options.have_root_module);
        assert_eq!(
            options.c_source_files[0].src_path,
            PathBuf::from("/proj/src/glue.c")
        );
    }

    #[test]
    fn empty_name_rejected() {
        let err = load_project_from_str(
            r#"
[project]
name = ""
version = "0.1.0"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn invalid_toml_rejected() {
        assert!(matches!(
            load_project_from_str("not toml {{{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn output_defaults_follow_root_module() {
        let with_root = load_project_from_str(
            "[project]\nname = \"a\"\nversion = \"0.1.0\"\nroot_module = \"m.kn\"\n",
        )
        .unwrap();
        assert_eq!(
            with_root.to_options(Path::new(".")).unwrap().output_mode,
            OutputMode::Exe
        );

        let without = load_project_from_str("[project]\nname = \"a\"\nversion = \"0.1.0\"\n")
            .unwrap();
        assert_eq!(
            without.to_options(Path::new(".")).unwrap().output_mode,
            OutputMode::Obj
        );
    }

    #[test]
    fn bad_enums_rejected() {
        let file = load_project_from_str(
            "[project]\nname = \"a\"\nversion = \"0.1.0\"\n[build]\noutput = \"dll\"\n",
        )
        .unwrap();
        assert!(matches!(
            file.to_options(Path::new(".")),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn find_project_root_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("kiln.toml"),
            "[project]\nname=\"t\"\nversion=\"0.1.0\"",
        )
        .unwrap();
        let sub = tmp.path().join("src").join("deep");
        std::fs::create_dir_all(&sub).unwrap();
        let root = find_project_root(&sub).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn find_project_root_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(find_project_root(tmp.path()).is_err());
    }
}
