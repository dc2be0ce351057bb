//! Type mapping between native type syntax and canonical [`Type`]s.
//!
//! Table driven: each language has one function per direction. For every
//! primitive `t` and language `L`, `to_canonical(L, &from_canonical(L, &t))`
//! yields `t` again.

use crate::ir::{BinaryOp, Expr, Literal, Type, UnaryOp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Go,
    Rust,
    CSharp,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::JavaScript,
        Language::Go,
        Language::Rust,
        Language::CSharp,
    ];

    /// Registry identifier.
    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::CSharp => "csharp",
        }
    }

    /// Resolve a language name or common alias.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "python" | "py" => Some(Language::Python),
            "javascript" | "js" | "typescript" | "ts" => Some(Language::JavaScript),
            "go" | "golang" => Some(Language::Go),
            "rust" | "rs" => Some(Language::Rust),
            "csharp" | "c#" | "cs" => Some(Language::CSharp),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical view of a declared return type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReturnShape {
    /// Logical return value, `None` for void.
    pub ty: Option<Type>,
    pub throws: Vec<String>,
    pub is_async: bool,
}

/// Parse native type text into a canonical type.
pub fn to_canonical(lang: Language, text: &str) -> Type {
    let text = text.trim();
    match lang {
        Language::Python => python_to_canonical(text),
        Language::JavaScript => js_to_canonical(text),
        Language::Go => go_to_canonical(text),
        Language::Rust => rust_to_canonical(text),
        Language::CSharp => csharp_to_canonical(text),
    }
}

/// Render a canonical type in native syntax.
pub fn from_canonical(lang: Language, ty: &Type) -> String {
    match lang {
        Language::Python => python_from_canonical(ty),
        Language::JavaScript => js_from_canonical(ty),
        Language::Go => go_from_canonical(ty),
        Language::Rust => rust_from_canonical(ty),
        Language::CSharp => csharp_from_canonical(ty),
    }
}

/// Interpret a function's declared return type.
///
/// Go `(T, error)` and Rust `Result<T, E>` move the error into `throws`;
/// C# `Task<T>` and JS `Promise<T>` unwrap to `T` and mark the function async.
pub fn map_return(lang: Language, text: &str) -> ReturnShape {
    let text = text.trim();
    match lang {
        Language::Go => go_return(text),
        Language::Rust => rust_return(text),
        Language::CSharp => wrapped_async_return(lang, text, &["Task", "ValueTask"]),
        Language::JavaScript => wrapped_async_return(lang, text, &["Promise"]),
        Language::Python => {
            let ty = match text {
                "" | "None" => None,
                _ => Some(python_to_canonical(text)),
            };
            ReturnShape {
                ty,
                ..Default::default()
            }
        }
    }
}

// ============================================================================
// Shared parsing helpers
// ============================================================================

/// Split on `sep` at bracket depth zero.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '[' | '(' | '{' => depth += 1,
            '>' | ']' | ')' | '}' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

/// `Head<args>` / `Head[args]` → (`Head`, args), when the opening bracket
/// matches the final character.
fn generic_parts(text: &str, open: char, close: char) -> Option<(&str, Vec<&str>)> {
    if !text.ends_with(close) {
        return None;
    }
    let start = text.find(open)?;
    let inner = &text[start + 1..text.len() - 1];
    // Reject `A<B>.C<D>` style text where the first bracket closes early.
    let mut depth = 0i32;
    for c in inner.chars() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth < 0 {
                return None;
            }
        }
    }
    Some((text[..start].trim(), split_top_level(inner, ',')))
}

fn arg(args: &[&str], i: usize, f: fn(&str) -> Type) -> Type {
    args.get(i).map(|a| f(a)).unwrap_or_else(Type::any)
}

fn last_path_segment<'a>(text: &'a str, sep: &str) -> &'a str {
    text.rsplit(sep).next().unwrap_or(text)
}

/// Union members, with `null`-like members removed and reported.
fn strip_null_union<'a>(text: &'a str, nulls: &[&str]) -> Option<(Vec<&'a str>, bool)> {
    let parts = split_top_level(text, '|');
    if parts.len() < 2 {
        return None;
    }
    let has_null = parts.iter().any(|p| nulls.contains(p));
    let rest = parts.into_iter().filter(|p| !nulls.contains(p)).collect();
    Some((rest, has_null))
}

fn union_type(members: Vec<&str>, has_null: bool, f: fn(&str) -> Type) -> Type {
    let ty = match members.as_slice() {
        [single] => f(single),
        _ => Type::any(),
    };
    if has_null { ty.optional() } else { ty }
}

fn tuple_or_single(mut members: Vec<Type>) -> Option<Type> {
    match members.len() {
        0 => None,
        1 => members.pop(),
        _ => Some(Type::tuple(members)),
    }
}

fn with_optional(ty: &Type, rendered: String, f: impl Fn(String) -> String) -> String {
    if ty.is_optional { f(rendered) } else { rendered }
}

// ============================================================================
// Python
// ============================================================================

fn python_to_canonical(text: &str) -> Type {
    let text = text.trim_matches(|c| c == '"' || c == '\'');
    if let Some((members, has_null)) = strip_null_union(text, &["None"]) {
        return union_type(members, has_null, python_to_canonical);
    }
    if let Some((head, args)) = generic_parts(text, '[', ']') {
        let head = last_path_segment(head, ".");
        return match head {
            "Optional" => arg(&args, 0, python_to_canonical).optional(),
            "List" | "list" | "Sequence" | "Iterable" | "Set" | "set" | "FrozenSet" => {
                Type::array(arg(&args, 0, python_to_canonical))
            }
            "Dict" | "dict" | "Mapping" => Type::map(
                arg(&args, 0, python_to_canonical),
                arg(&args, 1, python_to_canonical),
            ),
            "Tuple" | "tuple" => {
                let members: Vec<Type> = args
                    .iter()
                    .filter(|a| **a != "...")
                    .map(|a| python_to_canonical(a))
                    .collect();
                if members.len() >= 2 && !args.contains(&"...") {
                    Type::tuple(members)
                } else {
                    Type::array(members.into_iter().next().unwrap_or_else(Type::any))
                }
            }
            "Union" => {
                let has_null = args.contains(&"None");
                let rest = args.into_iter().filter(|a| *a != "None").collect();
                union_type(rest, has_null, python_to_canonical)
            }
            _ => Type::new(head),
        };
    }
    match text {
        "str" => Type::string(),
        "int" => Type::int(),
        "float" => Type::float(),
        "bool" => Type::bool(),
        "Any" | "object" | "None" | "" => Type::any(),
        "list" | "List" => Type::array(Type::any()),
        "dict" | "Dict" => Type::map(Type::any(), Type::any()),
        other => Type::new(last_path_segment(other, ".")),
    }
}

fn python_from_canonical(ty: &Type) -> String {
    let base = match ty.name.as_str() {
        "string" => "str".to_string(),
        "int" | "float" | "bool" => ty.name.clone(),
        "any" => "Any".to_string(),
        "array" => format!("List[{}]", args_joined(ty, python_from_canonical)),
        "map" => format!("Dict[{}]", args_joined(ty, python_from_canonical)),
        "tuple" => format!("Tuple[{}]", args_joined(ty, python_from_canonical)),
        other => other.to_string(),
    };
    with_optional(ty, base, |b| format!("Optional[{b}]"))
}

fn args_joined(ty: &Type, f: fn(&Type) -> String) -> String {
    ty.generic_args.iter().map(f).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// JavaScript / TypeScript / JSDoc
// ============================================================================

fn js_to_canonical(text: &str) -> Type {
    if let Some(inner) = text.strip_prefix('?') {
        return js_to_canonical(inner).optional();
    }
    if let Some((members, has_null)) = strip_null_union(text, &["null", "undefined"]) {
        return union_type(members, has_null, js_to_canonical);
    }
    if let Some(inner) = text.strip_suffix("[]") {
        return Type::array(js_to_canonical(inner));
    }
    if text.starts_with('[') && text.ends_with(']') {
        let members: Vec<Type> = split_top_level(&text[1..text.len() - 1], ',')
            .into_iter()
            .map(js_to_canonical)
            .collect();
        return match members.len() {
            0 => Type::array(Type::any()),
            1 => Type::array(members.into_iter().next().unwrap_or_else(Type::any)),
            _ => Type::tuple(members),
        };
    }
    if let Some((head, args)) = generic_parts(text, '<', '>') {
        return match head {
            "Array" | "ReadonlyArray" | "Set" | "Iterable" => {
                Type::array(arg(&args, 0, js_to_canonical))
            }
            "Record" | "Map" => {
                Type::map(arg(&args, 0, js_to_canonical), arg(&args, 1, js_to_canonical))
            }
            "Promise" => arg(&args, 0, js_to_canonical),
            _ => Type::new(head),
        };
    }
    match text {
        "string" | "String" => Type::string(),
        "integer" | "bigint" => Type::int(),
        "number" | "Number" => Type::float(),
        "boolean" | "Boolean" => Type::bool(),
        "any" | "unknown" | "*" | "object" | "Object" | "void" | "undefined" | "null" | "" => {
            Type::any()
        }
        "Array" => Type::array(Type::any()),
        other => Type::new(other),
    }
}

fn js_from_canonical(ty: &Type) -> String {
    let base = match ty.name.as_str() {
        "string" => "string".to_string(),
        "int" => "integer".to_string(),
        "float" => "number".to_string(),
        "bool" => "boolean".to_string(),
        "any" => "any".to_string(),
        "array" => format!("Array<{}>", args_joined(ty, js_from_canonical)),
        "map" => format!("Record<{}>", args_joined(ty, js_from_canonical)),
        "tuple" => format!("[{}]", args_joined(ty, js_from_canonical)),
        other => other.to_string(),
    };
    with_optional(ty, base, |b| format!("{b} | null"))
}

// ============================================================================
// Go
// ============================================================================

fn go_to_canonical(text: &str) -> Type {
    if let Some(inner) = text.strip_prefix('*') {
        return go_to_canonical(inner).optional();
    }
    if let Some(inner) = text.strip_prefix("[]") {
        return Type::array(go_to_canonical(inner));
    }
    if let Some(inner) = text.strip_prefix("...") {
        return Type::array(go_to_canonical(inner));
    }
    if let Some(rest) = text.strip_prefix("map[") {
        let mut depth = 1;
        for (i, c) in rest.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Type::map(go_to_canonical(&rest[..i]), go_to_canonical(&rest[i + 1..]));
                    }
                }
                _ => {}
            }
        }
        return Type::map(Type::any(), Type::any());
    }
    // Fixed-size arrays: [4]int
    if let Some(rest) = text.strip_prefix('[')
        && let Some(close) = rest.find(']')
        && rest[..close].chars().all(|c| c.is_ascii_digit())
    {
        return Type::array(go_to_canonical(&rest[close + 1..]));
    }
    match text {
        "string" | "error" => Type::string(),
        "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16" | "uint32"
        | "uint64" | "uintptr" | "byte" | "rune" => Type::int(),
        "float64" | "float32" => Type::float(),
        "bool" => Type::bool(),
        "interface{}" | "any" | "" => Type::any(),
        other if other.starts_with("interface") || other.starts_with("func") => Type::any(),
        other if other.starts_with("chan ") => Type::any(),
        other => Type::new(last_path_segment(other, ".")),
    }
}

fn go_from_canonical(ty: &Type) -> String {
    let base = match ty.name.as_str() {
        "string" | "int" | "bool" => ty.name.clone(),
        "float" => "float64".to_string(),
        "any" => "interface{}".to_string(),
        "array" => format!("[]{}", arg_rendered(ty, 0, go_from_canonical)),
        "map" => format!(
            "map[{}]{}",
            arg_rendered(ty, 0, go_from_canonical),
            arg_rendered(ty, 1, go_from_canonical)
        ),
        "tuple" => format!("({})", args_joined(ty, go_from_canonical)),
        other => other.to_string(),
    };
    with_optional(ty, base, |b| format!("*{b}"))
}

fn arg_rendered(ty: &Type, i: usize, f: fn(&Type) -> String) -> String {
    ty.generic_args
        .get(i)
        .map(f)
        .unwrap_or_else(|| f(&Type::any()))
}

fn go_return(text: &str) -> ReturnShape {
    let inner = if text.starts_with('(') && text.ends_with(')') {
        &text[1..text.len() - 1]
    } else {
        text
    };
    let mut results: Vec<&str> = split_top_level(inner, ',')
        .into_iter()
        .filter(|r| !r.is_empty())
        .map(strip_result_name)
        .collect();

    let mut shape = ReturnShape::default();
    if results.last() == Some(&"error") {
        results.pop();
        shape.throws.push("error".into());
    }
    shape.ty = tuple_or_single(results.into_iter().map(go_to_canonical).collect());
    shape
}

/// `n int` → `int`. Unnamed results pass through.
fn strip_result_name(result: &str) -> &str {
    match result.split_once(char::is_whitespace) {
        Some((name, ty))
            if name.chars().all(|c| c.is_alphanumeric() || c == '_')
                && !matches!(name, "map" | "chan" | "func" | "interface" | "struct") =>
        {
            ty.trim()
        }
        _ => result,
    }
}

// ============================================================================
// Rust
// ============================================================================

fn rust_to_canonical(text: &str) -> Type {
    let text = strip_rust_reference(text);
    if text.starts_with('(') && text.ends_with(')') {
        let members: Vec<Type> = split_top_level(&text[1..text.len() - 1], ',')
            .into_iter()
            .filter(|m| !m.is_empty())
            .map(rust_to_canonical)
            .collect();
        return tuple_or_single(members).unwrap_or_else(Type::any);
    }
    if text.starts_with('[') && text.ends_with(']') {
        let inner = &text[1..text.len() - 1];
        let element = split_top_level(inner, ';').into_iter().next().unwrap_or("");
        return Type::array(rust_to_canonical(element));
    }
    if let Some((head, args)) = generic_parts(text, '<', '>') {
        let head = last_path_segment(head, "::");
        return match head {
            "Vec" | "VecDeque" | "HashSet" | "BTreeSet" => Type::array(arg(&args, 0, rust_to_canonical)),
            "HashMap" | "BTreeMap" => {
                Type::map(arg(&args, 0, rust_to_canonical), arg(&args, 1, rust_to_canonical))
            }
            "Option" => arg(&args, 0, rust_to_canonical).optional(),
            "Box" | "Rc" | "Arc" | "RefCell" | "Cow" | "Result" => arg(&args, 0, rust_to_canonical),
            _ => Type::new(head),
        };
    }
    match text {
        "String" | "str" | "char" => Type::string(),
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" => Type::int(),
        "f64" | "f32" => Type::float(),
        "bool" => Type::bool(),
        "dyn Any" | "" => Type::any(),
        other if other.starts_with("impl ") || other.starts_with("dyn ") => Type::any(),
        other => Type::new(last_path_segment(other, "::")),
    }
}

fn strip_rust_reference(text: &str) -> &str {
    let mut text = text.trim();
    loop {
        let Some(rest) = text.strip_prefix('&') else {
            break;
        };
        let rest = rest.trim_start();
        // Lifetime: &'a str
        let rest = match rest.strip_prefix('\'') {
            Some(lt) => lt
                .split_once(char::is_whitespace)
                .map(|(_, r)| r)
                .unwrap_or(lt),
            None => rest,
        };
        text = rest.strip_prefix("mut ").unwrap_or(rest).trim_start();
    }
    text
}

fn rust_from_canonical(ty: &Type) -> String {
    let base = match ty.name.as_str() {
        "string" => "String".to_string(),
        "int" => "i64".to_string(),
        "float" => "f64".to_string(),
        "bool" => "bool".to_string(),
        "any" => "Box<dyn Any>".to_string(),
        "array" => format!("Vec<{}>", arg_rendered(ty, 0, rust_from_canonical)),
        "map" => format!("HashMap<{}>", args_joined(ty, rust_from_canonical)),
        "tuple" => format!("({})", args_joined(ty, rust_from_canonical)),
        other => other.to_string(),
    };
    with_optional(ty, base, |b| format!("Option<{b}>"))
}

fn rust_return(text: &str) -> ReturnShape {
    let text = text.trim();
    if text.is_empty() || text == "()" {
        return ReturnShape::default();
    }
    if let Some(("Result", args)) =
        generic_parts(text, '<', '>').map(|(h, a)| (last_path_segment(h, "::"), a))
    {
        let ok = args.first().copied().unwrap_or("()");
        let err = args.get(1).copied().unwrap_or("Error");
        return ReturnShape {
            ty: if ok == "()" {
                None
            } else {
                Some(rust_to_canonical(ok))
            },
            throws: vec![rust_error_kind(err)],
            is_async: false,
        };
    }
    ReturnShape {
        ty: Some(rust_to_canonical(text)),
        ..Default::default()
    }
}

/// Stringly and boxed errors collapse to the generic `error` kind.
fn rust_error_kind(text: &str) -> String {
    let text = strip_rust_reference(text);
    match text {
        "String" | "str" | "'static str" | "Box<dyn Error>" | "Box<dyn std::error::Error>" => {
            "error".into()
        }
        t if t.starts_with("Box<dyn") => "error".into(),
        t => last_path_segment(t, "::").to_string(),
    }
}

// ============================================================================
// C#
// ============================================================================

fn csharp_to_canonical(text: &str) -> Type {
    if let Some(inner) = text.strip_suffix('?') {
        return csharp_to_canonical(inner).optional();
    }
    if let Some(inner) = text.strip_suffix("[]") {
        return Type::array(csharp_to_canonical(inner));
    }
    if text.starts_with('(') && text.ends_with(')') {
        let members: Vec<Type> = split_top_level(&text[1..text.len() - 1], ',')
            .into_iter()
            .map(|m| csharp_to_canonical(m.split_whitespace().next().unwrap_or(m)))
            .collect();
        return tuple_or_single(members).unwrap_or_else(Type::any);
    }
    if let Some((head, args)) = generic_parts(text, '<', '>') {
        let head = last_path_segment(head, ".");
        return match head {
            "List" | "IList" | "IEnumerable" | "ICollection" | "IReadOnlyList" | "HashSet"
            | "ISet" => Type::array(arg(&args, 0, csharp_to_canonical)),
            "Dictionary" | "IDictionary" | "IReadOnlyDictionary" => Type::map(
                arg(&args, 0, csharp_to_canonical),
                arg(&args, 1, csharp_to_canonical),
            ),
            "Task" | "ValueTask" => arg(&args, 0, csharp_to_canonical),
            "Nullable" => arg(&args, 0, csharp_to_canonical).optional(),
            _ => Type::new(head),
        };
    }
    match text {
        "string" | "String" | "char" => Type::string(),
        "int" | "long" | "short" | "byte" | "uint" | "ulong" | "ushort" | "sbyte" | "Int32"
        | "Int64" => Type::int(),
        "double" | "float" | "decimal" | "Double" | "Single" | "Decimal" => Type::float(),
        "bool" | "Boolean" => Type::bool(),
        "object" | "dynamic" | "Object" | "var" | "" => Type::any(),
        other => Type::new(last_path_segment(other, ".")),
    }
}

fn csharp_from_canonical(ty: &Type) -> String {
    let base = match ty.name.as_str() {
        "string" | "int" | "bool" => ty.name.clone(),
        "float" => "double".to_string(),
        "any" => "object".to_string(),
        "array" => format!("List<{}>", arg_rendered(ty, 0, csharp_from_canonical)),
        "map" => format!("Dictionary<{}>", args_joined(ty, csharp_from_canonical)),
        "tuple" => format!("({})", args_joined(ty, csharp_from_canonical)),
        other => other.to_string(),
    };
    with_optional(ty, base, |b| format!("{b}?"))
}

fn wrapped_async_return(lang: Language, text: &str, wrappers: &[&str]) -> ReturnShape {
    if text.is_empty() || text == "void" {
        return ReturnShape::default();
    }
    if wrappers.contains(&text) {
        return ReturnShape {
            is_async: true,
            ..Default::default()
        };
    }
    if let Some((head, args)) = generic_parts(text, '<', '>')
        && wrappers.contains(&head)
    {
        let inner = args.first().copied().unwrap_or("void");
        return ReturnShape {
            ty: (inner != "void").then(|| to_canonical(lang, inner)),
            throws: Vec::new(),
            is_async: true,
        };
    }
    ReturnShape {
        ty: Some(to_canonical(lang, text)),
        ..Default::default()
    }
}

/// Type of an expression when it is evident without any context.
pub fn infer_type(expr: &Expr) -> Option<Type> {
    match expr {
        Expr::Literal(Literal::String(_)) | Expr::FormatString(_) => Some(Type::string()),
        Expr::Literal(Literal::Int(_)) => Some(Type::int()),
        Expr::Literal(Literal::Float(_)) => Some(Type::float()),
        Expr::Literal(Literal::Bool(_)) => Some(Type::bool()),
        Expr::Array(items) => Some(Type::array(
            items.first().and_then(infer_type).unwrap_or_else(Type::any),
        )),
        Expr::Map(entries) => {
            let (k, v) = entries
                .first()
                .map(|(k, v)| (infer_type(k), infer_type(v)))
                .unwrap_or((None, None));
            Some(Type::map(
                k.unwrap_or_else(Type::any),
                v.unwrap_or_else(Type::any),
            ))
        }
        Expr::StructLiteral { type_name, .. } => Some(Type::new(type_name)),
        Expr::Binary { op, left, right } => match op {
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::In => Some(Type::bool()),
            BinaryOp::Div => Some(Type::float()),
            _ => infer_type(left).or_else(|| infer_type(right)),
        },
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => Some(Type::bool()),
        Expr::Unary { operand, .. } => infer_type(operand),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_identity_every_language() {
        let primitives = [
            Type::string(),
            Type::int(),
            Type::float(),
            Type::bool(),
            Type::any(),
        ];
        for lang in Language::ALL {
            for ty in &primitives {
                let native = from_canonical(lang, ty);
                assert_eq!(&to_canonical(lang, &native), ty, "{lang}: {native}");
            }
        }
    }

    #[test]
    fn test_containers_identity_every_language() {
        let containers = [
            Type::array(Type::int()),
            Type::map(Type::string(), Type::int()),
            Type::array(Type::new("User")),
            Type::string().optional(),
        ];
        for lang in Language::ALL {
            for ty in &containers {
                let native = from_canonical(lang, ty);
                assert_eq!(&to_canonical(lang, &native), ty, "{lang}: {native}");
            }
        }
    }

    #[test]
    fn test_go_map_to_csharp_dictionary() {
        let ty = to_canonical(Language::Go, "map[string]int");
        assert_eq!(ty, Type::map(Type::string(), Type::int()));
        assert_eq!(
            from_canonical(Language::CSharp, &ty),
            "Dictionary<string, int>"
        );
    }

    #[test]
    fn test_python_forms() {
        assert_eq!(
            to_canonical(Language::Python, "Optional[str]"),
            Type::string().optional()
        );
        assert_eq!(
            to_canonical(Language::Python, "str | None"),
            Type::string().optional()
        );
        assert_eq!(
            to_canonical(Language::Python, "Dict[str, List[int]]"),
            Type::map(Type::string(), Type::array(Type::int()))
        );
        assert_eq!(
            to_canonical(Language::Python, "Tuple[int, str]"),
            Type::tuple(vec![Type::int(), Type::string()])
        );
    }

    #[test]
    fn test_native_aliases() {
        assert_eq!(to_canonical(Language::Rust, "&str"), Type::string());
        assert_eq!(to_canonical(Language::Rust, "&'a mut Vec<u8>"), Type::array(Type::int()));
        assert_eq!(to_canonical(Language::Go, "float32"), Type::float());
        assert_eq!(to_canonical(Language::Go, "*User"), Type::new("User").optional());
        assert_eq!(to_canonical(Language::CSharp, "long"), Type::int());
        assert_eq!(to_canonical(Language::CSharp, "int[]"), Type::array(Type::int()));
        assert_eq!(to_canonical(Language::JavaScript, "number"), Type::float());
        assert_eq!(to_canonical(Language::JavaScript, "string[]"), Type::array(Type::string()));
    }

    #[test]
    fn test_go_returns() {
        let shape = map_return(Language::Go, "(User, error)");
        assert_eq!(shape.ty, Some(Type::new("User")));
        assert_eq!(shape.throws, vec!["error"]);

        let shape = map_return(Language::Go, "error");
        assert_eq!(shape.ty, None);
        assert_eq!(shape.throws, vec!["error"]);

        let shape = map_return(Language::Go, "(int, string)");
        assert_eq!(shape.ty, Some(Type::tuple(vec![Type::int(), Type::string()])));
        assert!(shape.throws.is_empty());

        let shape = map_return(Language::Go, "(n int, err error)");
        assert_eq!(shape.ty, Some(Type::int()));
        assert_eq!(shape.throws, vec!["error"]);

        // A bare `error` type in other positions is just a string
        assert_eq!(to_canonical(Language::Go, "error"), Type::string());
    }

    #[test]
    fn test_rust_and_csharp_returns() {
        let shape = map_return(Language::Rust, "Result<User, String>");
        assert_eq!(shape.ty, Some(Type::new("User")));
        assert_eq!(shape.throws, vec!["error"]);

        let shape = map_return(Language::Rust, "Result<(), ParseError>");
        assert_eq!(shape.ty, None);
        assert_eq!(shape.throws, vec!["ParseError"]);

        let shape = map_return(Language::CSharp, "Task<string>");
        assert_eq!(shape.ty, Some(Type::string()));
        assert!(shape.is_async);

        let shape = map_return(Language::CSharp, "Task");
        assert_eq!(shape.ty, None);
        assert!(shape.is_async);

        let shape = map_return(Language::JavaScript, "Promise<number>");
        assert_eq!(shape.ty, Some(Type::float()));
        assert!(shape.is_async);
    }

    #[test]
    fn test_unknown_names_are_custom() {
        assert_eq!(to_canonical(Language::Python, "Widget"), Type::new("Widget"));
        assert_eq!(to_canonical(Language::Rust, "crate::model::Widget"), Type::new("Widget"));
    }
}
