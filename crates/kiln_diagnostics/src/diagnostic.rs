//! Structured diagnostic messages with byte-offset source locations.

use crate::line_index::LineIndex;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The location of a diagnostic inside a source file.
///
/// Locations are recorded as raw byte offsets; line and column are resolved
/// lazily at render time because most diagnostics are never shown (they are
/// retried or superseded on the next update).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// The file the diagnostic points into.
    pub path: PathBuf,
    /// Byte offset from the start of the file.
    pub byte_offset: u32,
}

impl SourceLocation {
    /// Creates a location from a path and byte offset.
    pub fn new(path: impl Into<PathBuf>, byte_offset: u32) -> Self {
        Self {
            path: path.into(),
            byte_offset,
        }
    }

    /// Resolves this location to 1-indexed (line, column) against the
    /// file content.
    pub fn resolve(&self, content: &str) -> (u32, u32) {
        LineIndex::new(content).line_col(self.byte_offset)
    }
}

/// A diagnostic message produced by any stage of the build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The diagnostic message.
    pub message: String,
    /// Where in the sources the problem is, when known. Driver-level
    /// failures (a child compiler exiting nonzero, a missing libc
    /// installation) have no location.
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    /// Creates an error diagnostic without a source location.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location: None,
        }
    }

    /// Creates a warning diagnostic without a source location.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            location: None,
        }
    }

    /// Creates a note diagnostic without a source location.
    pub fn note(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Note,
            message: message.into(),
            location: None,
        }
    }

    /// Attaches a source location.
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_severity() {
        assert_eq!(Diagnostic::error("e").severity, Severity::Error);
        assert_eq!(Diagnostic::warning("w").severity, Severity::Warning);
        assert_eq!(Diagnostic::note("n").severity, Severity::Note);
    }

    #[test]
    fn with_location_attaches() {
        let d = Diagnostic::error("bad token")
            .with_location(SourceLocation::new("src/main.c", 42));
        let loc = d.location.unwrap();
        assert_eq!(loc.path, PathBuf::from("src/main.c"));
        assert_eq!(loc.byte_offset, 42);
    }

    #[test]
    fn resolve_line_col() {
        let loc = SourceLocation::new("f.c", 5);
        assert_eq!(loc.resolve("abc\ndef"), (2, 2));
    }

    #[test]
    fn serde_roundtrip() {
        let d = Diagnostic::error("unable to build C object")
            .with_location(SourceLocation::new("foo.c", 7));
        let json = serde_json::to_string(&d).unwrap();
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
