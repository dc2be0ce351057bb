//! Input readers - parse source code into IR.
//!
//! Every reader follows the same two-pass shape: a skeleton check
//! ([`check_skeleton`](crate::patterns::check_skeleton)), a first pass over
//! top-level declarations that fills [`KnownTypes`](crate::patterns::KnownTypes),
//! then a second pass that reads bodies. Nodes a reader cannot map become
//! `Unhandled` leaves plus a [`Diagnostic`].

#[cfg(feature = "python")]
pub mod python;

#[cfg(feature = "python")]
pub use python::{PYTHON_READER, PythonReader, read_python};

#[cfg(feature = "javascript")]
pub mod javascript;

#[cfg(feature = "javascript")]
pub use javascript::{JAVASCRIPT_READER, JavaScriptReader, read_javascript};

#[cfg(feature = "go")]
pub mod go;

#[cfg(feature = "go")]
pub use go::{GO_READER, GoReader, read_go};

#[cfg(feature = "rust")]
pub mod rust;

#[cfg(feature = "rust")]
pub use rust::{RUST_READER, RustReader, read_rust};

#[cfg(feature = "csharp")]
pub mod csharp;

#[cfg(feature = "csharp")]
pub use csharp::{CSHARP_READER, CSharpReader, read_csharp};

#[cfg(any(
    feature = "python",
    feature = "javascript",
    feature = "go",
    feature = "rust",
    feature = "csharp"
))]
mod support;

/// Module name for a file: its stem (`models/user.py` → `user`).
pub fn module_name_from_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem = match base.rfind('.') {
        Some(0) | None => base,
        Some(dot) => &base[..dot],
    };
    if stem.is_empty() {
        "main".to_string()
    } else {
        stem.to_string()
    }
}

/// Decode backslash escapes shared by the C-family languages and Python.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('`') => out.push('`'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_name_from_filename() {
        assert_eq!(module_name_from_filename("models/user.py"), "user");
        assert_eq!(module_name_from_filename("C:\\src\\Main.cs"), "Main");
        assert_eq!(module_name_from_filename("lib.rs"), "lib");
        assert_eq!(module_name_from_filename(""), "main");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#"a\nb\"c\\"#), "a\nb\"c\\");
        assert_eq!(unescape(r"\d"), r"\d");
    }
}
