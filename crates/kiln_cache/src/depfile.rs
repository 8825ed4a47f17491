//! Parsing of Makefile-style dependency files.
//!
//! C compilers invoked with `-MD -MV -MF <path>` emit a side file of the form
//! `output: input input...` with backslash line continuations. The prerequisite
//! list is what the cache needs: every header the translation unit pulled in.

use std::path::PathBuf;

/// Parses the prerequisite list out of a Makefile-style dependency file.
///
/// The target (everything up to the first unescaped `:`) is discarded.
/// Backslash-newline continuations are treated as spaces and `\ ` escapes
/// inside paths are honored (the `-MV` quoting style).
pub fn parse_dep_file(content: &str) -> Vec<PathBuf> {
    let body = match content.split_once(':') {
        Some((_target, rest)) => rest,
        None => return Vec::new(),
    };

    let mut deps = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                // line continuation
                Some('\n') => {
                    chars.next();
                }
                Some('\r') => {
                    chars.next();
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                }
                // escaped space inside a path
                Some(' ') => {
                    chars.next();
                    current.push(' ');
                }
                _ => current.push('\\'),
            },
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    deps.push(PathBuf::from(std::mem::take(&mut current)));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        deps.push(PathBuf::from(current));
    }
    deps
}
