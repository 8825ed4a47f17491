//! Diagnostics for the Kiln build orchestrator.
//!
//! Errors and warnings produced anywhere in the driver are represented as
//! [`Diagnostic`] values carrying an optional `(path, byte offset)` location,
//! accumulated in a thread-safe [`DiagnosticSink`], and rendered for the
//! terminal (resolving byte offsets to line/column on demand) or as JSON.

#![warn(missing_docs)]

pub mod diagnostic;
pub mod line_index;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use diagnostic::{Diagnostic, SourceLocation};
pub use line_index::LineIndex;
pub use renderer::TerminalRenderer;
pub use severity::Severity;
pub use sink::DiagnosticSink;
