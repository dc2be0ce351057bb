//! Skeleton checks run before parsing.
//!
//! Tree-sitter recovers from almost anything, so readers first make sure the
//! file has a minimal skeleton: balanced brackets (ignoring strings and
//! comments) and, for Go, a closed body for every top-level `func`.

use crate::traits::{Location, ParseError};
use crate::types::Language;

/// Code characters of a source file with strings and comments skipped.
struct CodeChars<'a> {
    source: &'a str,
    lang: Language,
    pos: usize,
    prev: Option<char>,
}

impl<'a> CodeChars<'a> {
    fn new(source: &'a str, lang: Language, pos: usize) -> Self {
        Self {
            source,
            lang,
            pos,
            prev: None,
        }
    }

    fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.source.len());
    }

    /// Byte length of the comment or string literal starting at `rest`.
    fn literal_len(&self, rest: &str, c: char) -> Option<usize> {
        let ident_before = self
            .prev
            .is_some_and(|p| p.is_alphanumeric() || p == '_');
        match (self.lang, c) {
            (Language::Python, '#') => Some(line_len(rest)),
            (Language::Python, '"' | '\'') => {
                let triple: String = std::iter::repeat_n(c, 3).collect();
                if rest.starts_with(&triple) {
                    let end = rest[3..].find(&triple).map(|i| i + 6);
                    Some(end.unwrap_or(rest.len()))
                } else {
                    Some(quoted_len(rest, c, true))
                }
            }
            (_, '/') if rest.starts_with("//") => Some(line_len(rest)),
            (_, '/') if rest.starts_with("/*") => {
                Some(rest[2..].find("*/").map(|i| i + 4).unwrap_or(rest.len()))
            }
            (Language::CSharp, '"') if rest.starts_with("\"\"\"") => {
                Some(rest[3..].find("\"\"\"").map(|i| i + 6).unwrap_or(rest.len()))
            }
            (Language::CSharp, '@') if rest[1..].starts_with('"') => {
                Some(1 + verbatim_len(&rest[1..]))
            }
            (Language::CSharp, '$') if rest[1..].starts_with("@\"") => {
                Some(2 + verbatim_len(&rest[2..]))
            }
            (Language::Rust, 'r')
                if !ident_before && (rest[1..].starts_with('"') || rest[1..].starts_with('#')) =>
            {
                raw_rust_len(rest)
            }
            (Language::Rust, '\'') => Some(rust_quote_len(rest)),
            (Language::Go, '`') => {
                Some(rest[1..].find('`').map(|i| i + 2).unwrap_or(rest.len()))
            }
            (Language::JavaScript, '`') => Some(quoted_len(rest, '`', false)),
            (_, '"' | '\'') => Some(quoted_len(rest, c, false)),
            _ => None,
        }
    }
}

impl Iterator for CodeChars<'_> {
    type Item = (usize, char);

    fn next(&mut self) -> Option<(usize, char)> {
        loop {
            let rest = &self.source[self.pos..];
            let c = rest.chars().next()?;
            if let Some(len) = self.literal_len(rest, c) {
                self.pos += len.max(c.len_utf8());
                self.prev = Some(' ');
                continue;
            }
            let at = self.pos;
            self.pos += c.len_utf8();
            self.prev = Some(c);
            return Some((at, c));
        }
    }
}

fn line_len(rest: &str) -> usize {
    rest.find('\n').unwrap_or(rest.len())
}

/// Length of a quoted literal including both quotes, honoring backslashes.
fn quoted_len(rest: &str, quote: char, stop_at_newline: bool) -> usize {
    let mut escaped = false;
    for (i, c) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return i + c.len_utf8();
        } else if c == '\n' && stop_at_newline {
            return i;
        }
    }
    rest.len()
}

/// C# `@"..."`, where `""` is an escaped quote.
fn verbatim_len(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    rest.len()
}

/// Rust `r"..."` / `r#"..."#`.
fn raw_rust_len(rest: &str) -> Option<usize> {
    let hashes = rest[1..].chars().take_while(|c| *c == '#').count();
    let open = 1 + hashes;
    if !rest[open..].starts_with('"') {
        return None;
    }
    let closing: String = std::iter::once('"')
        .chain(std::iter::repeat_n('#', hashes))
        .collect();
    let body = open + 1;
    Some(
        rest[body..]
            .find(&closing)
            .map(|i| body + i + closing.len())
            .unwrap_or(rest.len()),
    )
}

/// Rust `'` starts either a char literal or a lifetime.
fn rust_quote_len(rest: &str) -> usize {
    let mut chars = rest.char_indices().skip(1);
    match chars.next() {
        Some((_, '\\')) => quoted_len(rest, '\'', true),
        Some(_) => match chars.next() {
            Some((i, '\'')) => i + 1,
            // lifetime: only the quote is skipped
            _ => 1,
        },
        None => 1,
    }
}

/// 1-based line and column of a byte offset.
pub fn location_of(source: &str, offset: usize) -> Location {
    let before = &source[..offset.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map(|nl| before[nl + 1..].chars().count())
        .unwrap_or_else(|| before.chars().count())
        + 1;
    Location::new(line, column)
}

/// Index of the `}` closing the `{` at `open`.
pub fn matching_brace(source: &str, open: usize, lang: Language) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in CodeChars::new(source, lang, open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// `interface{` / `struct{`: a type literal rather than a body.
fn is_type_literal_open(source: &str, brace: usize) -> bool {
    let before = source[..brace].trim_end();
    ["interface", "struct"].iter().any(|kw| {
        before.ends_with(kw)
            && !before[..before.len() - kw.len()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
    })
}

/// Find the `{` opening the body of the declaration starting at `from`.
///
/// Braces of type literals in the signature (`func f(x interface{})
/// struct{}`) are skipped. Stops at the end of the header line.
pub fn find_body_brace(source: &str, from: usize, lang: Language) -> Option<usize> {
    let mut depth = 0i32;
    let mut chars = CodeChars::new(source, lang, from);
    while let Some((i, c)) = chars.next() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            '{' if is_type_literal_open(source, i) => {
                let close = matching_brace(source, i, lang)?;
                chars.seek(close + 1);
            }
            '{' if depth <= 0 => return Some(i),
            '\n' if depth <= 0 => return None,
            _ => {}
        }
    }
    None
}

fn check_go_bodies(source: &str) -> Result<(), ParseError> {
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        if line.starts_with("func ")
            && let Some(open) = find_body_brace(source, offset, Language::Go)
            && matching_brace(source, open, Language::Go).is_none()
        {
            let header = line.trim_end().trim_end_matches('{').trim_end();
            return Err(ParseError::syntax(
                format!("unclosed body of `{header}`"),
                location_of(source, open),
            ));
        }
        offset += line.len();
    }
    Ok(())
}

fn closing_for(c: char) -> char {
    match c {
        ')' => '(',
        ']' => '[',
        _ => '{',
    }
}

fn check_balance(source: &str, lang: Language) -> Result<(), ParseError> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    for (i, c) in CodeChars::new(source, lang, 0) {
        match c {
            '(' | '[' | '{' => stack.push((c, i)),
            ')' | ']' | '}' => match stack.pop() {
                Some((open, _)) if open == closing_for(c) => {}
                Some((open, at)) => {
                    return Err(ParseError::syntax(
                        format!(
                            "mismatched `{c}`: `{open}` opened at {} is still open",
                            location_of(source, at)
                        ),
                        location_of(source, i),
                    ));
                }
                None => {
                    return Err(ParseError::syntax(
                        format!("unmatched `{c}`"),
                        location_of(source, i),
                    ));
                }
            },
            _ => {}
        }
    }
    match stack.pop() {
        Some((open, at)) => Err(ParseError::syntax(
            format!("unclosed `{open}`"),
            location_of(source, at),
        )),
        None => Ok(()),
    }
}

/// Verify the minimal skeleton of a source file.
pub fn check_skeleton(source: &str, lang: Language) -> Result<(), ParseError> {
    if lang == Language::Go {
        check_go_bodies(source)?;
    }
    check_balance(source, lang)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_source() {
        let src = "def f(x):\n    return [x, {\"a\": (1, 2)}]\n";
        assert!(check_skeleton(src, Language::Python).is_ok());
    }

    #[test]
    fn test_unclosed_brace_reports_opening() {
        let src = "function f() {\n  if (x) {\n    g();\n}\n";
        let err = check_skeleton(src, Language::JavaScript).unwrap_err();
        assert_eq!(err.location(), Some(Location::new(1, 14)));
    }

    #[test]
    fn test_brackets_in_strings_and_comments_are_ignored() {
        let src = "fn main() {\n    let s = \"{(\"; // )]\n    let c = '{';\n    let r = r#\"}\"#;\n}\n";
        assert!(check_skeleton(src, Language::Rust).is_ok());

        let src = "x = \"(\"  # )\n";
        assert!(check_skeleton(src, Language::Python).is_ok());
    }

    #[test]
    fn test_rust_lifetimes_are_not_chars() {
        let src = "fn f<'a>(s: &'a str) -> &'a str {\n    s\n}\n";
        assert!(check_skeleton(src, Language::Rust).is_ok());
    }

    #[test]
    fn test_mismatched_closer() {
        let err = check_skeleton("call(a, [b)];", Language::JavaScript).unwrap_err();
        assert_eq!(err.location(), Some(Location::new(1, 11)));
    }

    #[test]
    fn test_go_body_skips_interface_literal() {
        let src = "package main\n\nfunc Handle(v interface{}) {\n\tprint(v)\n";
        let err = check_skeleton(src, Language::Go).unwrap_err();
        assert_eq!(err.location(), Some(Location::new(3, 28)));
        assert!(err.to_string().contains("func Handle"));
    }

    #[test]
    fn test_find_body_brace() {
        let src = "func F(x struct{}) interface{} {\n}";
        let open = find_body_brace(src, 0, Language::Go).unwrap();
        assert_eq!(open, src.find(" {\n").unwrap() + 1);
        assert_eq!(matching_brace(src, open, Language::Go), Some(src.len() - 1));
    }
}
