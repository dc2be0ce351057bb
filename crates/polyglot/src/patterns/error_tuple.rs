//! Error tuples and error values.
//!
//! Go and Rust return errors; the other languages raise them. The IR uses
//! `throws` on the function plus `Throw` statements, with a thrown value of
//! the canonical shape `Call(Ident(kind), [message])`. The generic kind is
//! [`GENERIC_ERROR`].

use crate::ir::{BinaryOp, Expr, Literal, Stmt};
use crate::types::Language;

/// Kind used for errors that carry only a message.
pub const GENERIC_ERROR: &str = "Error";

/// Native kind → canonical kind.
pub fn canonical_error_kind(lang: Language, native: &str) -> String {
    match (lang, native) {
        (Language::Python, "Exception" | "BaseException")
        | (Language::CSharp, "Exception" | "System.Exception")
        | (Language::JavaScript, "Error")
        | (Language::Go | Language::Rust, "error") => GENERIC_ERROR.to_string(),
        _ => native.to_string(),
    }
}

/// Canonical kind → native kind for languages with exception classes.
pub fn native_error_kind(lang: Language, kind: &str) -> String {
    let generic = kind == GENERIC_ERROR || kind == "error";
    match lang {
        Language::Python | Language::CSharp if generic => "Exception".to_string(),
        Language::JavaScript if generic => "Error".to_string(),
        _ => kind.to_string(),
    }
}

/// `Error`, `ValueError`, `ArgumentException`.
pub fn is_error_kind(name: &str) -> bool {
    name == GENERIC_ERROR || name.ends_with("Error") || name.ends_with("Exception")
}

/// A thrown value `Call(Ident(kind), [message])`.
pub fn error_value(kind: impl Into<String>, message: Expr) -> Expr {
    Expr::call(Expr::ident(kind), vec![message])
}

/// Split a canonical error value into its kind and optional message.
pub fn thrown_parts(expr: &Expr) -> Option<(&str, Option<&Expr>)> {
    match expr {
        Expr::Call { callee, args, .. } => match (callee.as_ref(), args.as_slice()) {
            (Expr::Ident(kind), []) if is_error_kind(kind) => Some((kind.as_str(), None)),
            (Expr::Ident(kind), [message]) if is_error_kind(kind) => {
                Some((kind.as_str(), Some(message)))
            }
            _ => None,
        },
        Expr::StructLiteral { type_name, fields } if is_error_kind(type_name) => {
            Some((type_name.as_str(), fields.first().map(|f| &f.value)))
        }
        _ => None,
    }
}

/// Zero values of Go: `nil`, `0`, `""`, `false`, `T{}`.
pub fn is_zero_value(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(Literal::Null) | Expr::Literal(Literal::Bool(false)) => true,
        Expr::Literal(Literal::Int(0)) => true,
        Expr::Literal(Literal::Float(f)) => *f == 0.0,
        Expr::Literal(Literal::String(s)) => s.is_empty(),
        Expr::StructLiteral { fields, .. } => fields.is_empty(),
        Expr::Array(items) => items.is_empty(),
        Expr::Map(entries) => entries.is_empty(),
        _ => false,
    }
}

/// Lower a multi-value return.
///
/// In an error-shaped function the last value is the error:
/// `return v, nil` → `Return(v)`; `return zero, err` → `Throw(err)`;
/// `return v, err` → guarded throw followed by `Return(v)`. Elsewhere the
/// values become a tuple `Return(Array[..])`.
pub fn lower_multi_return(mut values: Vec<Expr>, error_shaped: bool) -> Vec<Stmt> {
    if !error_shaped {
        return vec![match values.len() {
            0 => Stmt::Return(None),
            1 => Stmt::Return(values.pop()),
            _ => Stmt::Return(Some(Expr::Array(values))),
        }];
    }

    let Some(err) = values.pop() else {
        return vec![Stmt::Return(None)];
    };
    let rest = match values.len() {
        0 => None,
        1 => values.pop(),
        _ => Some(Expr::Array(values)),
    };

    if err.is_null() {
        return vec![Stmt::Return(rest)];
    }
    let rest_is_zero = match &rest {
        None => true,
        Some(Expr::Array(items)) => items.iter().all(is_zero_value),
        Some(v) => is_zero_value(v),
    };
    if rest_is_zero {
        return vec![Stmt::Throw(err)];
    }

    tracing::debug!("value returned alongside a possibly non-nil error");
    vec![
        Stmt::if_stmt(
            Expr::binary(err.clone(), BinaryOp::Ne, Expr::null()),
            vec![Stmt::Throw(err)],
            vec![],
        ),
        Stmt::Return(rest),
    ]
}

/// `if e != nil { throw e }` for a given error identifier.
fn is_err_check(stmt: &Stmt, err: &str) -> bool {
    let Stmt::If {
        condition,
        then_body,
        else_body,
    } = stmt
    else {
        return false;
    };
    let cond_ok = matches!(
        condition,
        Expr::Binary { op: BinaryOp::Ne, left, right }
            if matches!(left.as_ref(), Expr::Ident(n) if n == err) && right.is_null()
    );
    cond_ok
        && else_body.is_empty()
        && matches!(then_body.as_slice(), [Stmt::Throw(Expr::Ident(n))] if n == err)
}

/// Collapse propagate-on-error checks.
///
/// `x, err := f(); if err != nil { return ..., err }` (already lowered to a
/// throw of `err`) becomes `x := f()`; a lone `err := f()` becomes `f()`.
pub fn collapse_err_checks(body: Vec<Stmt>) -> Vec<Stmt> {
    let mut out: Vec<Stmt> = Vec::with_capacity(body.len());
    let mut iter = body.into_iter().peekable();

    while let Some(stmt) = iter.next() {
        let stmt = super::comprehension::map_nested_bodies(stmt, collapse_err_checks);
        let (target, value, is_declaration, ty) = match stmt {
            Stmt::Assign {
                target,
                value,
                is_declaration,
                ty,
            } => (target, value, is_declaration, ty),
            other => {
                out.push(other);
                continue;
            }
        };

        let err_name = match &target {
            Expr::Ident(n) => Some(n.clone()),
            Expr::Array(items) => items.last().and_then(|e| e.as_ident()).map(str::to_string),
            _ => None,
        };
        let collapses = match (&err_name, iter.peek()) {
            (Some(err), Some(next)) => is_err_check(next, err),
            _ => false,
        };
        if !collapses {
            out.push(Stmt::Assign {
                target,
                value,
                is_declaration,
                ty,
            });
            continue;
        }
        iter.next();
        tracing::trace!("collapsed error propagation check");

        let remaining = match target {
            Expr::Array(mut items) => {
                items.pop();
                match items.len() {
                    0 => None,
                    1 => items.pop(),
                    _ => Some(Expr::Array(items)),
                }
            }
            _ => None,
        };
        match remaining {
            Some(t) if t.as_ident() != Some("_") => out.push(Stmt::Assign {
                target: t,
                value,
                is_declaration,
                ty,
            }),
            _ => out.push(Stmt::Expr(value)),
        }
    }
    out
}

/// Error kinds a body can let escape: throws outside any `try`.
pub fn infer_throws(body: &[Stmt]) -> Vec<String> {
    let mut kinds = Vec::new();
    collect_throws(body, &mut kinds);
    kinds
}

fn collect_throws(body: &[Stmt], kinds: &mut Vec<String>) {
    for stmt in body {
        match stmt {
            Stmt::Throw(value) => {
                let kind = thrown_parts(value)
                    .map(|(k, _)| k.to_string())
                    .unwrap_or_else(|| GENERIC_ERROR.to_string());
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                collect_throws(then_body, kinds);
                collect_throws(else_body, kinds);
            }
            Stmt::For { body, .. } | Stmt::While { body, .. } => collect_throws(body, kinds),
            Stmt::Try {
                catches, finally, ..
            } => {
                for c in catches {
                    collect_throws(&c.body, kinds);
                }
                collect_throws(finally, kinds);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_value_nil() {
        let stmts = lower_multi_return(vec![Expr::ident("user"), Expr::null()], true);
        assert_eq!(stmts, vec![Stmt::Return(Some(Expr::ident("user")))]);
    }

    #[test]
    fn test_return_zero_err() {
        let stmts = lower_multi_return(vec![Expr::null(), Expr::ident("err")], true);
        assert_eq!(stmts, vec![Stmt::Throw(Expr::ident("err"))]);

        let stmts = lower_multi_return(vec![Expr::int(0), Expr::ident("err")], true);
        assert_eq!(stmts, vec![Stmt::Throw(Expr::ident("err"))]);
    }

    #[test]
    fn test_return_value_and_err() {
        let stmts = lower_multi_return(vec![Expr::ident("partial"), Expr::ident("err")], true);
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0], Stmt::If { .. }));
        assert_eq!(stmts[1], Stmt::Return(Some(Expr::ident("partial"))));
    }

    #[test]
    fn test_plain_multi_return_is_tuple() {
        let stmts = lower_multi_return(vec![Expr::int(1), Expr::string("a")], false);
        assert_eq!(
            stmts,
            vec![Stmt::Return(Some(Expr::array(vec![
                Expr::int(1),
                Expr::string("a")
            ])))]
        );
    }

    #[test]
    fn test_collapse_err_check() {
        let call = Expr::call(Expr::ident("load"), vec![]);
        let body = vec![
            Stmt::Assign {
                target: Expr::array(vec![Expr::ident("data"), Expr::ident("err")]),
                value: call.clone(),
                is_declaration: true,
                ty: None,
            },
            Stmt::if_stmt(
                Expr::binary(Expr::ident("err"), BinaryOp::Ne, Expr::null()),
                vec![Stmt::Throw(Expr::ident("err"))],
                vec![],
            ),
            Stmt::Return(Some(Expr::ident("data"))),
        ];
        let collapsed = collapse_err_checks(body);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0], Stmt::declare("data", call));
    }

    #[test]
    fn test_infer_throws_skips_try_body() {
        let body = vec![
            Stmt::Try {
                body: vec![Stmt::Throw(error_value("ValueError", Expr::string("x")))],
                catches: vec![],
                finally: vec![],
            },
            Stmt::Throw(error_value("KeyError", Expr::string("y"))),
        ];
        assert_eq!(infer_throws(&body), vec!["KeyError"]);
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(canonical_error_kind(Language::Python, "Exception"), "Error");
        assert_eq!(canonical_error_kind(Language::Python, "ValueError"), "ValueError");
        assert_eq!(native_error_kind(Language::CSharp, "Error"), "Exception");
        assert_eq!(native_error_kind(Language::JavaScript, "error"), "Error");
    }
}
