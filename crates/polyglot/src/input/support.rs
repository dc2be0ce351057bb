//! Helpers shared by the tree-sitter readers.

use crate::ir::Expr;
use crate::traits::{Diagnostic, Location, ParseError};
use std::cell::RefCell;
use tree_sitter::{Node, Parser, Tree};

/// Failure to map a single syntax node.
///
/// Never escapes a reader: statement and expression boundaries turn it into
/// an `Unhandled` node plus a diagnostic.
#[derive(Debug, thiserror::Error)]
pub(crate) enum NodeError {
    #[error("{kind} missing {field}")]
    Missing {
        kind: &'static str,
        field: &'static str,
    },

    #[error("unsupported {0}")]
    Unsupported(String),
}

pub(crate) type NodeResult<T> = Result<T, NodeError>;

pub(crate) fn unsupported<T>(node: Node) -> NodeResult<T> {
    Err(NodeError::Unsupported(node.kind().to_string()))
}

pub(crate) fn parse(source: &str, language: tree_sitter::Language) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|err| ParseError::Grammar(err.to_string()))?;
    parser
        .parse(source, None)
        .ok_or_else(|| ParseError::Grammar("parser produced no tree".into()))
}

pub(crate) fn location(node: Node) -> Location {
    let pos = node.start_position();
    Location::new(pos.row + 1, pos.column + 1)
}

pub(crate) fn field<'t>(node: Node<'t>, name: &'static str) -> NodeResult<Node<'t>> {
    node.child_by_field_name(name).ok_or(NodeError::Missing {
        kind: node.kind(),
        field: name,
    })
}

pub(crate) fn is_comment(node: Node) -> bool {
    node.kind().ends_with("comment")
}

/// Named children, comments excluded.
pub(crate) fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| !is_comment(*c))
        .collect()
}

/// All children, named or not.
pub(crate) fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

pub(crate) fn fields<'t>(node: Node<'t>, name: &'static str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(name, &mut cursor).collect()
}

/// Whether `node` has an anonymous child token spelled `token`.
pub(crate) fn has_token(node: Node, token: &str) -> bool {
    children(node)
        .iter()
        .any(|c| !c.is_named() && c.kind() == token)
}

/// Fail with `NoStructure` when the parse tree holds nothing but errors.
pub(crate) fn require_structure(root: Node, filename: &str) -> Result<(), ParseError> {
    let top = named_children(root);
    if root.is_error() || (!top.is_empty() && top.iter().all(|c| c.is_error() || c.is_missing()))
    {
        return Err(ParseError::NoStructure(filename.to_string()));
    }
    Ok(())
}

/// Diagnostics collected while reading one file.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics(RefCell<Vec<Diagnostic>>);

impl Diagnostics {
    /// Record an unhandled node; returns its source text.
    pub fn record(&self, node: Node, source: &str, message: impl Into<String>) -> String {
        let snippet = node
            .utf8_text(source.as_bytes())
            .unwrap_or("")
            .to_string();
        let message = message.into();
        let location = location(node);
        tracing::debug!(%location, kind = node.kind(), %message, "unhandled construct");
        self.0.borrow_mut().push(Diagnostic {
            message,
            location,
            snippet: snippet.clone(),
        });
        snippet
    }

    /// Take over diagnostics recorded by a nested read.
    pub fn extend(&self, other: Diagnostics) {
        self.0.borrow_mut().extend(other.into_vec());
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0.into_inner()
    }
}

const TYPE_SUFFIXES: &[&str] = &[
    "i128", "i64", "i32", "i16", "i8", "isize", "u128", "u64", "u32", "u16", "u8", "usize",
    "f32", "f64",
];

/// Numeric literal text in any of the five languages.
///
/// Handles digit separators, radix prefixes and type suffixes (`10u8`,
/// `2.5f`, `100L`, `10n`). Integers that overflow `i64` become floats.
pub(crate) fn number_literal(text: &str) -> Expr {
    let mut s: String = text
        .chars()
        .filter(|c| *c != '_' && *c != '\'')
        .collect::<String>()
        .to_ascii_lowercase();
    let hex = s.starts_with("0x");
    let mut is_float = false;

    if let Some(suffix) = TYPE_SUFFIXES
        .iter()
        .find(|suf| s.len() > suf.len() && s.ends_with(*suf) && !(hex && suf.starts_with('f')))
    {
        is_float = suffix.starts_with('f');
        s.truncate(s.len() - suffix.len());
    }
    while s.len() > 1 && (s.ends_with('u') || s.ends_with('l') || s.ends_with('n')) {
        s.pop();
    }
    if !hex && s.len() > 1 && (s.ends_with('f') || s.ends_with('d') || s.ends_with('m')) {
        is_float = true;
        s.pop();
    }

    let radix = [("0x", 16), ("0o", 8), ("0b", 2)]
        .iter()
        .find_map(|(prefix, radix)| s.strip_prefix(prefix).map(|digits| (digits, *radix)));
    if let Some((digits, radix)) = radix {
        return i64::from_str_radix(digits, radix)
            .map(Expr::int)
            .unwrap_or_else(|_| Expr::float(0.0));
    }

    if is_float || s.contains('.') || s.contains('e') {
        return Expr::float(s.parse().unwrap_or(0.0));
    }
    match s.parse::<i64>() {
        Ok(n) => Expr::int(n),
        Err(_) => Expr::float(s.parse().unwrap_or(0.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_literals() {
        assert_eq!(number_literal("42"), Expr::int(42));
        assert_eq!(number_literal("1_000"), Expr::int(1000));
        assert_eq!(number_literal("0xff"), Expr::int(255));
        assert_eq!(number_literal("10u8"), Expr::int(10));
        assert_eq!(number_literal("100L"), Expr::int(100));
        assert_eq!(number_literal("2.5f"), Expr::float(2.5));
        assert_eq!(number_literal("1e3"), Expr::float(1000.0));
        assert_eq!(number_literal("3.0f64"), Expr::float(3.0));
        assert_eq!(number_literal("7n"), Expr::int(7));
    }
}
