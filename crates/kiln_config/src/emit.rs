//! Emit locations: where requested artifacts are written.

use kiln_common::Directory;

/// Where one emitted artifact lands.
///
/// Either an explicit directory the user named, or the compilation's cache
/// artifact directory. The basename never contains a path separator; callers
/// that accept user paths split them into directory and basename first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmitLoc {
    /// Explicit output directory, or `None` for the cache artifact directory.
    pub directory: Option<Directory>,
    /// File name within the directory.
    pub basename: String,
}

impl EmitLoc {
    /// An emit location inside the cache artifact directory.
    pub fn cache(basename: impl Into<String>) -> Self {
        let basename = basename.into();
        debug_assert!(!basename.contains(std::path::MAIN_SEPARATOR));
        Self {
            directory: None,
            basename,
        }
    }

    /// An emit location in an explicit directory.
    pub fn in_dir(directory: Directory, basename: impl Into<String>) -> Self {
        let basename = basename.into();
        debug_assert!(!basename.contains(std::path::MAIN_SEPARATOR));
        Self {
            directory: Some(directory),
            basename,
        }
    }

    /// Splits a user-supplied path into an `EmitLoc`.
    ///
    /// `out/foo.o` becomes directory `out` + basename `foo.o`; a bare
    /// `foo.o` lands in the current directory.
    pub fn from_path(path: &std::path::Path) -> Self {
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let directory = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => Some(Directory::new(p)),
            _ => Some(Directory::new(".")),
        };
        Self {
            directory,
            basename,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn cache_location() {
        let loc = EmitLoc::cache("demo.o");
        assert!(loc.directory.is_none());
        assert_eq!(loc.basename, "demo.o");
    }

    #[test]
    fn from_path_splits() {
        let loc = EmitLoc::from_path(Path::new("out/foo.o"));
        assert_eq!(loc.directory.unwrap().path(), Path::new("out"));
        assert_eq!(loc.basename, "foo.o");
    }

    #[test]
    fn from_bare_filename_uses_cwd() {
        let loc = EmitLoc::from_path(Path::new("foo.o"));
        assert_eq!(loc.directory.unwrap().path(), Path::new("."));
        assert_eq!(loc.basename, "foo.o");
    }
}
