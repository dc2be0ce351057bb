//! Traits for language readers and writers.

use crate::config::TranslateConfig;
use crate::ir::Module;
use serde::Serialize;
use std::fmt;

/// A 1-based line/column position in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Error that can occur when reading source code into IR.
///
/// Only raised when the minimal skeleton of a file cannot be found.
/// Anything finer-grained degrades to `Unhandled` nodes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("{location}: {message}")]
    Syntax { message: String, location: Location },

    #[error("no recognizable top-level structure: {0}")]
    NoStructure(String),

    #[error("failed to load grammar: {0}")]
    Grammar(String),
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, location: Location) -> Self {
        ParseError::Syntax {
            message: message.into(),
            location,
        }
    }

    /// Where the failure was detected, if it has a position.
    pub fn location(&self) -> Option<Location> {
        match self {
            ParseError::Syntax { location, .. } => Some(*location),
            _ => None,
        }
    }
}

/// Error raised by a writer for structurally malformed IR.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("struct literal without a type name in `{0}`")]
    MissingTypeName(String),

    #[error("type `{ty}` expects {expected} generic argument(s), found {found}")]
    GenericArity {
        ty: String,
        expected: &'static str,
        found: usize,
    },

    #[error("{0} with an empty name")]
    EmptyName(&'static str),

    #[error("comprehension without an iterator variable in `{0}`")]
    MissingIterator(String),
}

/// Error from a one-shot [`translate`](crate::translate) call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("unknown target language `{0}`")]
    UnknownLanguage(String),

    #[error("no reader for file extension `{0}`")]
    UnknownExtension(String),
}

/// A construct the reader could not map, kept as an `Unhandled` node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub location: Location,
    /// The source text of the construct.
    pub snippet: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// A module together with everything the reader had to skip.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutput {
    pub module: Module,
    pub diagnostics: Vec<Diagnostic>,
}

/// A reader parses source code into the IR.
pub trait Reader: Send + Sync {
    /// Language identifier (e.g., "python", "go").
    fn language(&self) -> &'static str;

    /// File extensions this reader handles (e.g., &["ts", "js"]).
    fn extensions(&self) -> &'static [&'static str];

    /// Parse source code into the IR, reporting skipped constructs.
    fn read_with_diagnostics(&self, source: &str, filename: &str)
    -> Result<ReadOutput, ParseError>;

    /// Parse source code into the IR.
    fn read(&self, source: &str, filename: &str) -> Result<Module, ParseError> {
        self.read_with_diagnostics(source, filename)
            .map(|out| out.module)
    }
}

/// A writer emits the IR as source code in a target language.
pub trait Writer: Send + Sync {
    /// Language identifier (e.g., "rust", "csharp").
    fn language(&self) -> &'static str;

    /// File extension for output (e.g., "rs").
    fn extension(&self) -> &'static str;

    /// Emit the IR as source code using the given options.
    fn write_with_config(
        &self,
        module: &Module,
        config: &TranslateConfig,
    ) -> Result<String, GenerationError>;

    /// Emit the IR as source code with default options.
    fn write(&self, module: &Module) -> Result<String, GenerationError> {
        self.write_with_config(module, &TranslateConfig::default())
    }
}
