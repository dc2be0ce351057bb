//! Source-to-source translation between Python, JavaScript/TypeScript, Go,
//! Rust and C#.
//!
//! Every language has a reader that parses source into a shared IR
//! ([`ir::Module`]) and a writer that emits the IR as source. Any reader can
//! feed any writer, so five languages give twenty-five translation pairs.
//!
//! # Architecture
//!
//! ```text
//! Source Languages        IR              Target Languages
//! ────────────────    ─────────────    ────────────────────
//! Python          ─┐                ┌─> Python
//! JavaScript/TS   ─┤                ├─> JavaScript
//! Go              ─┼─> Module ──────┼─> Go
//! Rust            ─┤    (ir/)       ├─> Rust
//! C#              ─┘                └─> C#
//! ```
//!
//! Readers recognize idioms (Go error tuples, Rust iterator chains, C# LINQ,
//! thread launches) and store them in canonical form; writers lower the
//! canonical form into each target's idiom. Types go through a canonical
//! vocabulary in [`types`].
//!
//! # Example
//!
//! ```ignore
//! let go = polyglot::translate(
//!     "def calculate(a: int, b: int) -> int:\n    return a + b\n",
//!     "calc.py",
//!     "go",
//! )?;
//! assert!(go.contains("func Calculate(a int, b int) (int, error) {"));
//! ```
//!
//! # Note on Translation Fidelity
//!
//! Translation maps structure, not library semantics: calls into another
//! language's standard library keep their names, and constructs no rule
//! covers survive as `Unhandled` nodes that writers render as marked
//! placeholder comments.

pub mod config;
pub mod ir;
pub mod naming;
pub mod patterns;
pub mod registry;
pub mod traits;
pub mod types;

pub mod input;
pub mod output;

// Re-exports: IR types
pub use ir::{
    BinaryOp, Class, Enum, Expr, Function, Literal, Module, Stmt, StructureEq, Type,
    TypeDefinition, UnaryOp,
};

// Re-exports: Traits and errors
pub use traits::{
    Diagnostic, GenerationError, Location, ParseError, ReadOutput, Reader, TranslateError, Writer,
};

// Re-exports: Configuration
pub use config::{ConfigError, TranslateConfig};

// Re-exports: Registry
pub use registry::{
    reader_for_extension, reader_for_language, readers, register_reader, register_writer,
    writer_for_language, writers,
};

// Re-exports: Built-in writers
pub use output::{CSharpWriter, GoWriter, JavaScriptWriter, PythonWriter, RustWriter};

// Re-exports: Built-in readers
#[cfg(feature = "csharp")]
pub use input::{CSharpReader, read_csharp};
#[cfg(feature = "go")]
pub use input::{GoReader, read_go};
#[cfg(feature = "javascript")]
pub use input::{JavaScriptReader, read_javascript};
#[cfg(feature = "python")]
pub use input::{PythonReader, read_python};
#[cfg(feature = "rust")]
pub use input::{RustReader, read_rust};

/// Translate `source` into the `target` language, picking the reader from
/// the extension of `filename`.
pub fn translate(source: &str, filename: &str, target: &str) -> Result<String, TranslateError> {
    translate_with_config(source, filename, target, &TranslateConfig::default())
}

/// [`translate`] with explicit generator options.
pub fn translate_with_config(
    source: &str,
    filename: &str,
    target: &str,
    config: &TranslateConfig,
) -> Result<String, TranslateError> {
    let ext = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    let reader =
        reader_for_extension(ext).ok_or_else(|| TranslateError::UnknownExtension(ext.to_string()))?;
    let writer = writer_for_language(target)
        .or_else(|| types::Language::from_name(target).and_then(|l| writer_for_language(l.name())))
        .ok_or_else(|| TranslateError::UnknownLanguage(target.to_string()))?;
    tracing::debug!(
        from = reader.language(),
        to = writer.language(),
        filename,
        "translating"
    );
    let module = reader.read(source, filename)?;
    Ok(writer.write_with_config(&module, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_target() {
        let err = translate("x = 1\n", "a.py", "cobol").unwrap_err();
        assert_eq!(err, TranslateError::UnknownLanguage("cobol".into()));
    }

    #[test]
    fn test_unknown_extension() {
        let err = translate("x = 1", "a.lua", "go").unwrap_err();
        assert_eq!(err, TranslateError::UnknownExtension("lua".into()));
        let err = translate("x = 1", "Makefile", "go").unwrap_err();
        assert_eq!(err, TranslateError::UnknownExtension(String::new()));
    }

    #[test]
    #[cfg(feature = "python")]
    fn test_translate_python_to_go() {
        let go = translate(
            "def calculate(a: int, b: int) -> int:\n    return a + b\n",
            "calc.py",
            "go",
        )
        .unwrap();
        assert!(go.contains("func Calculate(a int, b int) (int, error) {\n\treturn (a + b), nil\n}"));
    }
}
