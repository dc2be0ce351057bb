//! Generator options.
//!
//! Writers take a [`TranslateConfig`]; every field has a default so an empty
//! file (or no file) gives the stock output.
//!
//! Example polyglot.toml:
//! ```toml
//! [go]
//! package = "models"
//! json_tags = false
//!
//! [csharp]
//! namespace = "Acme.Models"
//! functions_class = "Helpers"
//!
//! [rust]
//! derives = ["Debug", "Clone", "PartialEq"]
//! ```

use crate::types::Language;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Python output options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PythonConfig {
    pub indent: usize,
    /// Render plain structs as `@dataclass` classes.
    pub dataclasses: bool,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            indent: 4,
            dataclasses: true,
        }
    }
}

/// JavaScript output options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JavaScriptConfig {
    pub indent: usize,
    /// Emit JSDoc type annotations on functions and fields.
    pub jsdoc: bool,
    /// Prefix top-level declarations with `export`.
    pub exports: bool,
}

impl Default for JavaScriptConfig {
    fn default() -> Self {
        Self {
            indent: 2,
            jsdoc: true,
            exports: false,
        }
    }
}

/// Go output options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GoConfig {
    /// Package name; defaults to the module name.
    pub package: Option<String>,
    /// Emit `json:"name"` struct tags.
    pub json_tags: bool,
}

impl Default for GoConfig {
    fn default() -> Self {
        Self {
            package: None,
            json_tags: true,
        }
    }
}

/// Rust output options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RustConfig {
    pub indent: usize,
    /// Derives placed on generated structs and enums.
    pub derives: Vec<String>,
}

impl Default for RustConfig {
    fn default() -> Self {
        Self {
            indent: 4,
            derives: vec!["Debug".into(), "Clone".into()],
        }
    }
}

/// C# output options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CSharpConfig {
    pub indent: usize,
    /// Namespace; defaults to the module name in PascalCase.
    pub namespace: Option<String>,
    /// Static class holding module-level functions and constants.
    pub functions_class: String,
}

impl Default for CSharpConfig {
    fn default() -> Self {
        Self {
            indent: 4,
            namespace: None,
            functions_class: "Functions".into(),
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TranslateConfig {
    pub python: PythonConfig,
    pub javascript: JavaScriptConfig,
    pub go: GoConfig,
    pub rust: RustConfig,
    pub csharp: CSharpConfig,
}

impl TranslateConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded translate config");
        Ok(config)
    }

    /// Indent unit for a target. Go is always indented with tabs.
    pub fn indent_for(&self, lang: Language) -> String {
        let width = match lang {
            Language::Python => self.python.indent,
            Language::JavaScript => self.javascript.indent,
            Language::Rust => self.rust.indent,
            Language::CSharp => self.csharp.indent,
            Language::Go => return "\t".to_string(),
        };
        " ".repeat(width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = TranslateConfig::default();
        assert!(config.python.dataclasses);
        assert!(config.go.json_tags);
        assert_eq!(config.csharp.functions_class, "Functions");
        assert_eq!(config.indent_for(Language::JavaScript), "  ");
        assert_eq!(config.indent_for(Language::Go), "\t");
    }

    #[test]
    fn test_partial_config() {
        let config = TranslateConfig::from_toml_str(
            r#"
[go]
package = "models"

[rust]
derives = ["Debug"]
"#,
        )
        .unwrap();
        assert_eq!(config.go.package.as_deref(), Some("models"));
        // Unset keys in a present section keep their defaults.
        assert!(config.go.json_tags);
        assert_eq!(config.rust.derives, vec!["Debug".to_string()]);
        assert_eq!(config.python.indent, 4);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("polyglot.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[csharp]
namespace = "Acme"
indent = 2
"#
        )
        .unwrap();

        let config = TranslateConfig::load(&path).unwrap();
        assert_eq!(config.csharp.namespace.as_deref(), Some("Acme"));
        assert_eq!(config.indent_for(Language::CSharp), "  ");
    }

    #[test]
    fn test_missing_file_and_bad_toml() {
        let dir = TempDir::new().unwrap();
        let err = TranslateConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let err = TranslateConfig::from_toml_str("[go\npackage = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
