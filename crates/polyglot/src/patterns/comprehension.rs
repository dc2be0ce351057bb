//! Comprehension recognition.
//!
//! Python has native comprehensions. The other languages spell the same
//! iterate/filter/transform/accumulate shape as an iterator chain
//! (JavaScript, Rust, C#) or as an accumulation loop (Go). Readers lift both
//! spellings into [`Comprehension`]; writers use [`chain_shape`] to lower it.

use super::{callee_path, method_call, rename_ident};
use crate::ir::{BinaryOp, Comprehension, ComprehensionKind, Expr, LambdaBody, Stmt};
use crate::types::Language;

/// How a language spells an iterator chain.
#[derive(Debug)]
pub struct ChainShape {
    pub language: Language,
    /// Methods that open iteration (`iter`). Required when non-empty.
    pub sources: &'static [&'static str],
    pub filter: &'static str,
    pub map: &'static str,
    /// Terminal methods and the collection they produce.
    pub sinks: &'static [(&'static str, ComprehensionKind)],
    /// Constructor-style wrappers that change the collection kind.
    pub wrappers: &'static [(&'static str, ComprehensionKind)],
}

pub const CHAIN_SHAPES: &[ChainShape] = &[
    ChainShape {
        language: Language::JavaScript,
        sources: &[],
        filter: "filter",
        map: "map",
        sinks: &[],
        wrappers: &[
            ("Set", ComprehensionKind::Set),
            ("Object.from_entries", ComprehensionKind::Dict),
            ("Map", ComprehensionKind::Dict),
        ],
    },
    ChainShape {
        language: Language::Rust,
        sources: &["iter", "into_iter"],
        filter: "filter",
        map: "map",
        sinks: &[("collect", ComprehensionKind::List)],
        wrappers: &[],
    },
    ChainShape {
        language: Language::CSharp,
        sources: &[],
        filter: "where",
        map: "select",
        sinks: &[
            ("to_list", ComprehensionKind::List),
            ("to_array", ComprehensionKind::List),
            ("to_hash_set", ComprehensionKind::Set),
        ],
        wrappers: &[],
    },
];

pub fn chain_shape(lang: Language) -> Option<&'static ChainShape> {
    CHAIN_SHAPES.iter().find(|s| s.language == lang)
}

/// A one-parameter lambda with an expression body.
fn unary_lambda(expr: &Expr) -> Option<(&str, &Expr)> {
    match expr {
        Expr::Lambda { params, body } if params.len() == 1 => {
            let body = match body {
                LambdaBody::Expr(e) => e.as_ref(),
                LambdaBody::Block(stmts) => match stmts.as_slice() {
                    [Stmt::Return(Some(e))] => e,
                    _ => return None,
                },
            };
            Some((params[0].as_str(), body))
        }
        _ => None,
    }
}

/// Recognize an iterator chain, e.g. `xs.filter(x => x > 0).map(x => x * 2)`.
///
/// `sink_hint` overrides the collection kind when the reader knows it from
/// context (Rust `collect::<HashSet<_>>()`).
pub fn recognize_chain(
    lang: Language,
    expr: &Expr,
    sink_hint: Option<ComprehensionKind>,
) -> Option<Comprehension> {
    let shape = chain_shape(lang)?;

    if let Expr::Call { callee, args, .. } = expr
        && let [inner] = args.as_slice()
        && let Some(path) = callee_path(callee)
        && let Some((_, kind)) = shape.wrappers.iter().find(|(w, _)| *w == path)
    {
        let mut c = match inner {
            Expr::Comprehension(c) => c.as_ref().clone(),
            other => recognize_chain(lang, other, None)?,
        };
        c.kind = *kind;
        return Some(split_pair_target(c));
    }

    let mut current = expr;
    let mut kind = None;

    if let Some((object, method, args)) = method_call(current)
        && let Some((_, k)) = shape.sinks.iter().find(|(m, _)| *m == method)
        && args.is_empty()
    {
        kind = Some(*k);
        current = object;
    }

    // C# `xs.ToDictionary(x => k, x => v)`
    if lang == Language::CSharp
        && let Some((object, "to_dictionary", [key, value])) = method_call(current)
        && let (Some((kp, k)), Some((vp, v))) = (unary_lambda(key), unary_lambda(value))
    {
        let mut base = match recognize_chain(lang, object, None) {
            Some(c) if c.is_identity_map() => c,
            Some(_) => return None,
            None => Comprehension {
                kind: ComprehensionKind::Dict,
                target: Expr::ident(kp),
                value: None,
                iterator: kp.to_string(),
                iterable: object.clone(),
                condition: None,
            },
        };
        base.kind = ComprehensionKind::Dict;
        base.target = rename_ident(k, kp, &base.iterator);
        base.value = Some(rename_ident(v, vp, &base.iterator));
        return Some(base);
    }

    let mut map = None;
    if let Some((object, method, [arg])) = method_call(current)
        && method == shape.map
        && let Some(lambda) = unary_lambda(arg)
    {
        map = Some(lambda);
        current = object;
    }

    let mut filter = None;
    if let Some((object, method, [arg])) = method_call(current)
        && method == shape.filter
        && let Some(lambda) = unary_lambda(arg)
    {
        filter = Some(lambda);
        current = object;
    }

    if map.is_none() && filter.is_none() {
        return None;
    }

    if !shape.sources.is_empty() {
        let (object, method, args) = method_call(current)?;
        if !shape.sources.contains(&method) || !args.is_empty() {
            return None;
        }
        current = object;
    }

    let iterator = filter
        .or(map)
        .map(|(param, _)| param.to_string())
        .unwrap_or_default();
    let target = match map {
        Some((param, body)) => rename_ident(body, param, &iterator),
        None => Expr::ident(&iterator),
    };
    let condition = filter.map(|(_, body)| body.clone());

    // Without a terminal collect, Rust and C# chains stay lazy.
    let default_kind = if shape.sinks.is_empty() {
        ComprehensionKind::List
    } else {
        ComprehensionKind::Generator
    };

    let c = Comprehension {
        kind: sink_hint.or(kind).unwrap_or(default_kind),
        target,
        value: None,
        iterator,
        iterable: current.clone(),
        condition,
    };
    tracing::trace!(language = %lang, kind = ?c.kind, "recognized iterator chain");
    Some(split_pair_target(c))
}

/// Dict comprehensions produced by chains carry `[key, value]` targets.
fn split_pair_target(mut c: Comprehension) -> Comprehension {
    if c.kind == ComprehensionKind::Dict
        && c.value.is_none()
        && let Expr::Array(items) = &c.target
        && let [key, value] = items.as_slice()
    {
        let (key, value) = (key.clone(), value.clone());
        c.target = key;
        c.value = Some(value);
    }
    c
}

/// Recognize a Go accumulation loop.
///
/// ```text
/// var result []T                      result := map[K]V{}
/// for _, x := range xs {              for _, x := range xs {
///     if cond {                           result[k] = v
///         result = append(result, e)  }
///     }
/// }
/// ```
///
/// Returns the accumulator declaration rewritten to hold a comprehension.
pub fn recognize_append_loop(decl: &Stmt, next: &Stmt) -> Option<Stmt> {
    let Stmt::Assign {
        target: Expr::Ident(acc),
        value,
        is_declaration: true,
        ty,
    } = decl
    else {
        return None;
    };
    let kind = match value {
        Expr::Array(items) if items.is_empty() => ComprehensionKind::List,
        Expr::Map(entries) if entries.is_empty() => ComprehensionKind::Dict,
        _ => return None,
    };
    let Stmt::For {
        iterator,
        iterable,
        body,
    } = next
    else {
        return None;
    };

    let (condition, inner) = match body.as_slice() {
        [
            Stmt::If {
                condition,
                then_body,
                else_body,
            },
        ] if else_body.is_empty() && then_body.len() == 1 => (Some(condition.clone()), &then_body[0]),
        [single] => (None, single),
        _ => return None,
    };

    let (target, value) = match (kind, inner) {
        (
            ComprehensionKind::List,
            Stmt::Assign {
                target: Expr::Ident(t),
                value:
                    Expr::Call {
                        callee,
                        args,
                        kwargs,
                    },
                ..
            },
        ) if t == acc
            && kwargs.is_empty()
            && matches!(callee.as_ref(), Expr::Ident(f) if f == "append")
            && matches!(args.as_slice(), [Expr::Ident(a), _] if a == acc) =>
        {
            (args[1].clone(), None)
        }
        (
            ComprehensionKind::Dict,
            Stmt::Assign {
                target: Expr::Index { object, index },
                value,
                ..
            },
        ) if matches!(object.as_ref(), Expr::Ident(o) if o == acc) => {
            (index.as_ref().clone(), Some(value.clone()))
        }
        _ => return None,
    };

    // The accumulator must not feed its own elements.
    let mut self_referential = false;
    let mut check = |e: &Expr| {
        if matches!(e, Expr::Ident(n) if n == acc) {
            self_referential = true;
        }
    };
    target.visit(&mut check);
    if let Some(v) = &value {
        v.visit(&mut check);
    }
    if let Some(c) = &condition {
        c.visit(&mut check);
    }
    if self_referential {
        return None;
    }

    tracing::trace!(accumulator = %acc, "recognized accumulation loop");
    Some(Stmt::Assign {
        target: Expr::ident(acc),
        value: Expr::comprehension(Comprehension {
            kind,
            target,
            value,
            iterator: iterator.clone(),
            iterable: iterable.clone(),
            condition,
        }),
        is_declaration: true,
        ty: ty.clone(),
    })
}

/// Apply [`recognize_append_loop`] across a body, recursively.
pub fn lift_append_loops(body: Vec<Stmt>) -> Vec<Stmt> {
    let mut out: Vec<Stmt> = Vec::with_capacity(body.len());
    for stmt in body {
        let stmt = map_nested_bodies(stmt, lift_append_loops);
        if let Some(prev) = out.last()
            && let Some(lifted) = recognize_append_loop(prev, &stmt)
        {
            out.pop();
            out.push(lifted);
            continue;
        }
        out.push(stmt);
    }
    out
}

/// Rebuild a statement with `f` applied to each nested body.
pub fn map_nested_bodies(stmt: Stmt, f: fn(Vec<Stmt>) -> Vec<Stmt>) -> Stmt {
    match stmt {
        Stmt::If {
            condition,
            then_body,
            else_body,
        } => Stmt::If {
            condition,
            then_body: f(then_body),
            else_body: f(else_body),
        },
        Stmt::For {
            iterator,
            iterable,
            body,
        } => Stmt::For {
            iterator,
            iterable,
            body: f(body),
        },
        Stmt::While { condition, body } => Stmt::While {
            condition,
            body: f(body),
        },
        Stmt::Try {
            body,
            catches,
            finally,
        } => Stmt::Try {
            body: f(body),
            catches: catches
                .into_iter()
                .map(|mut c| {
                    c.body = f(c.body);
                    c
                })
                .collect(),
            finally: f(finally),
        },
        other => other,
    }
}

/// `x > 0 && y` style conditions joined with And.
pub fn and_all(conditions: Vec<Expr>) -> Option<Expr> {
    conditions
        .into_iter()
        .reduce(|acc, c| Expr::binary(acc, BinaryOp::And, c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lambda(param: &str, body: Expr) -> Expr {
        Expr::lambda(vec![param.to_string()], body)
    }

    fn method(object: Expr, name: &str, args: Vec<Expr>) -> Expr {
        Expr::call(Expr::member(object, name), args)
    }

    #[test]
    fn test_js_filter_map_chain() {
        let chain = method(
            method(
                Expr::ident("items"),
                "filter",
                vec![lambda(
                    "x",
                    Expr::binary(Expr::ident("x"), BinaryOp::Gt, Expr::int(0)),
                )],
            ),
            "map",
            vec![lambda(
                "y",
                Expr::binary(Expr::ident("y"), BinaryOp::Mul, Expr::int(2)),
            )],
        );
        let c = recognize_chain(Language::JavaScript, &chain, None).unwrap();
        assert_eq!(c.kind, ComprehensionKind::List);
        assert_eq!(c.iterator, "x");
        assert_eq!(
            c.target,
            Expr::binary(Expr::ident("x"), BinaryOp::Mul, Expr::int(2))
        );
        assert!(c.condition.is_some());
    }

    #[test]
    fn test_rust_chain_requires_iter() {
        let without_iter = method(
            method(
                Expr::ident("nums"),
                "map",
                vec![lambda("n", Expr::ident("n"))],
            ),
            "collect",
            vec![],
        );
        assert!(recognize_chain(Language::Rust, &without_iter, None).is_none());

        let with_iter = method(
            method(
                method(Expr::ident("nums"), "iter", vec![]),
                "filter",
                vec![lambda(
                    "n",
                    Expr::binary(Expr::ident("n"), BinaryOp::Gt, Expr::int(0)),
                )],
            ),
            "collect",
            vec![],
        );
        let c = recognize_chain(Language::Rust, &with_iter, None).unwrap();
        assert!(c.is_identity_map());
        assert_eq!(c.iterable, Expr::ident("nums"));
    }

    #[test]
    fn test_plain_method_call_is_not_a_chain() {
        let call = method(Expr::ident("list"), "map", vec![Expr::ident("f")]);
        assert!(recognize_chain(Language::JavaScript, &call, None).is_none());
    }

    #[test]
    fn test_go_append_loop() {
        let decl = Stmt::Assign {
            target: Expr::ident("result"),
            value: Expr::array(vec![]),
            is_declaration: true,
            ty: None,
        };
        let append = Stmt::assign(
            Expr::ident("result"),
            Expr::call(
                Expr::ident("append"),
                vec![
                    Expr::ident("result"),
                    Expr::binary(Expr::ident("x"), BinaryOp::Mul, Expr::int(2)),
                ],
            ),
        );
        let for_loop = Stmt::for_in(
            "x",
            Expr::ident("items"),
            vec![Stmt::if_stmt(
                Expr::binary(Expr::ident("x"), BinaryOp::Gt, Expr::int(0)),
                vec![append],
                vec![],
            )],
        );

        let lifted = lift_append_loops(vec![decl, for_loop]);
        assert_eq!(lifted.len(), 1);
        match &lifted[0] {
            Stmt::Assign {
                value: Expr::Comprehension(c),
                ..
            } => {
                assert_eq!(c.iterator, "x");
                assert!(c.condition.is_some());
            }
            other => panic!("expected comprehension, got {other:?}"),
        }
    }

    #[test]
    fn test_self_referential_loop_is_kept() {
        let decl = Stmt::declare("acc", Expr::array(vec![]));
        let for_loop = Stmt::for_in(
            "x",
            Expr::ident("items"),
            vec![Stmt::assign(
                Expr::ident("acc"),
                Expr::call(
                    Expr::ident("append"),
                    vec![Expr::ident("acc"), Expr::call(Expr::ident("len"), vec![Expr::ident("acc")])],
                ),
            )],
        );
        assert!(recognize_append_loop(&decl, &for_loop).is_none());
    }
}
