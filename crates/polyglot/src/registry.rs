//! Registry for readers and writers.
//!
//! The built-in languages register themselves on first lookup, each behind
//! its cargo feature. Custom readers and writers may be added at runtime and
//! take part in the same lookups.

use crate::traits::{Reader, Writer};
use std::sync::{OnceLock, PoisonError, RwLock};

/// Global reader registry.
static READERS: RwLock<Vec<&'static dyn Reader>> = RwLock::new(Vec::new());
static READERS_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Global writer registry.
static WRITERS: RwLock<Vec<&'static dyn Writer>> = RwLock::new(Vec::new());
static WRITERS_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Register a custom reader.
pub fn register_reader(reader: &'static dyn Reader) {
    READERS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push(reader);
}

/// Register a custom writer.
pub fn register_writer(writer: &'static dyn Writer) {
    WRITERS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push(writer);
}

fn init_readers() {
    READERS_INITIALIZED.get_or_init(|| {
        #[cfg(feature = "python")]
        {
            register_reader(&crate::input::python::PYTHON_READER);
        }
        #[cfg(feature = "javascript")]
        {
            register_reader(&crate::input::javascript::JAVASCRIPT_READER);
        }
        #[cfg(feature = "go")]
        {
            register_reader(&crate::input::go::GO_READER);
        }
        #[cfg(feature = "rust")]
        {
            register_reader(&crate::input::rust::RUST_READER);
        }
        #[cfg(feature = "csharp")]
        {
            register_reader(&crate::input::csharp::CSHARP_READER);
        }
    });
}

fn init_writers() {
    WRITERS_INITIALIZED.get_or_init(|| {
        register_writer(&crate::output::python::PYTHON_WRITER);
        register_writer(&crate::output::javascript::JAVASCRIPT_WRITER);
        register_writer(&crate::output::go::GO_WRITER);
        register_writer(&crate::output::rust::RUST_WRITER);
        register_writer(&crate::output::csharp::CSHARP_WRITER);
    });
}

/// Get a reader by language name.
pub fn reader_for_language(lang: &str) -> Option<&'static dyn Reader> {
    init_readers();
    READERS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .find(|r| r.language() == lang)
        .copied()
}

/// Get a reader by file extension, without the leading dot.
pub fn reader_for_extension(ext: &str) -> Option<&'static dyn Reader> {
    init_readers();
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    READERS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .find(|r| r.extensions().contains(&ext.as_str()))
        .copied()
}

/// Get a writer by language name.
pub fn writer_for_language(lang: &str) -> Option<&'static dyn Writer> {
    init_writers();
    WRITERS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .find(|w| w.language() == lang)
        .copied()
}

/// Get all registered readers.
pub fn readers() -> Vec<&'static dyn Reader> {
    init_readers();
    READERS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Get all registered writers.
pub fn writers() -> Vec<&'static dyn Writer> {
    init_writers();
    WRITERS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_lookup() {
        for (lang, ext) in [
            ("python", "py"),
            ("javascript", "js"),
            ("go", "go"),
            ("rust", "rs"),
            ("csharp", "cs"),
        ] {
            let writer = writer_for_language(lang).expect("built-in writer");
            assert_eq!(writer.language(), lang);
            assert_eq!(writer.extension(), ext);
        }
        assert!(writer_for_language("cobol").is_none());
    }

    #[test]
    #[cfg(feature = "javascript")]
    fn test_reader_lookup_by_extension() {
        for ext in ["js", "mjs", "ts", ".TS"] {
            let reader = reader_for_extension(ext).expect("javascript extension");
            assert_eq!(reader.language(), "javascript");
        }
    }

    #[test]
    #[cfg(all(feature = "python", feature = "go", feature = "rust", feature = "csharp"))]
    fn test_reader_lookup() {
        for (ext, lang) in [("py", "python"), ("go", "go"), ("rs", "rust"), ("cs", "csharp")] {
            assert_eq!(reader_for_extension(ext).map(|r| r.language()), Some(lang));
            assert_eq!(reader_for_language(lang).map(|r| r.language()), Some(lang));
        }
        assert!(reader_for_extension("lua").is_none());
    }

    #[test]
    #[cfg(all(feature = "python", feature = "go"))]
    fn test_python_to_go_via_registry() {
        let reader = reader_for_language("python").unwrap();
        let writer = writer_for_language("go").unwrap();

        let module = reader
            .read("def double(x: int) -> int:\n    return x * 2\n", "m.py")
            .unwrap();
        let go = writer.write(&module).unwrap();

        assert!(go.contains("func Double(x int) (int, error) {"));
    }
}
