//! Rendering diagnostics for terminals and machine consumers.

use crate::diagnostic::Diagnostic;

/// Renders diagnostics as single-line terminal messages.
///
/// Byte-offset locations are resolved to `path:line:col` by reading the file
/// at render time; if the file cannot be read (it may have been deleted since
/// the failure was recorded) the raw byte offset is shown instead.
pub struct TerminalRenderer {
    color: bool,
}

impl TerminalRenderer {
    /// Creates a renderer; `color` enables ANSI severity coloring.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Renders one diagnostic to a string (no trailing newline).
    pub fn render(&self, diag: &Diagnostic) -> String {
        let severity = if self.color {
            let code = match diag.severity {
                crate::Severity::Error => "31",
                crate::Severity::Warning => "33",
                crate::Severity::Note => "36",
            };
            format!("\x1b[1;{code}m{}\x1b[0m", diag.severity)
        } else {
            diag.severity.to_string()
        };

        match &diag.location {
            Some(loc) => match std::fs::read_to_string(&loc.path) {
                Ok(content) => {
                    let (line, col) = loc.resolve(&content);
                    format!(
                        "{}:{}:{}: {}: {}",
                        loc.path.display(),
                        line,
                        col,
                        severity,
                        diag.message
                    )
                }
                Err(_) => format!(
                    "{}:@{}: {}: {}",
                    loc.path.display(),
                    loc.byte_offset,
                    severity,
                    diag.message
                ),
            },
            None => format!("{}: {}", severity, diag.message),
        }
    }
}

/// Renders a diagnostic list as a pretty-printed JSON array.
pub fn render_json(diagnostics: &[Diagnostic]) -> String {
    serde_json::to_string_pretty(diagnostics).unwrap_or_else(|_| "[]".to_string())
}
