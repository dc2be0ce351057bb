//! Pattern recognizers shared by readers and writers.
//!
//! Readers use these to lift language idioms (append loops, iterator
//! chains, error tuples, launch calls) into dedicated IR nodes; writers use
//! the same tables to lower those nodes back into each target's idiom.

pub mod comprehension;
pub mod concurrency;
pub mod error_tuple;
pub mod range;
pub mod skeleton;
pub mod struct_literal;

pub use comprehension::{recognize_append_loop, recognize_chain};
pub use concurrency::{body_is_async, recognize_spawn};
pub use error_tuple::{collapse_err_checks, infer_throws, lower_multi_return};
pub use range::{as_range, range_call, recognize_counted};
pub use skeleton::check_skeleton;
pub use struct_literal::KnownTypes;

use crate::ir::Expr;

/// Dotted path of a callee: `a.b.c` for nested member access on an
/// identifier, with Rust `::` separators folded to `.`.
pub fn callee_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(name) => Some(name.replace("::", ".")),
        Expr::Member { object, property } => {
            callee_path(object).map(|base| format!("{base}.{property}"))
        }
        _ => None,
    }
}

/// `object.method(args)` split into its parts.
pub fn method_call(expr: &Expr) -> Option<(&Expr, &str, &[Expr])> {
    match expr {
        Expr::Call { callee, args, .. } => match callee.as_ref() {
            Expr::Member { object, property } => {
                Some((object.as_ref(), property.as_str(), args.as_slice()))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Replace every `Ident(from)` with `Ident(to)`.
pub fn rename_ident(expr: &Expr, from: &str, to: &str) -> Expr {
    if from == to {
        return expr.clone();
    }
    let r = |e: &Expr| rename_ident(e, from, to);
    let rb = |e: &Expr| Box::new(rename_ident(e, from, to));
    match expr {
        Expr::Ident(name) if name == from => Expr::Ident(to.to_string()),
        Expr::Literal(_) | Expr::Ident(_) | Expr::Unhandled(_) => expr.clone(),
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: rb(left),
            right: rb(right),
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op: *op,
            operand: rb(operand),
        },
        Expr::Call {
            callee,
            args,
            kwargs,
        } => Expr::Call {
            callee: rb(callee),
            args: args.iter().map(r).collect(),
            kwargs: kwargs.iter().map(|(k, v)| (k.clone(), r(v))).collect(),
        },
        Expr::Member { object, property } => Expr::Member {
            object: rb(object),
            property: property.clone(),
        },
        Expr::Index { object, index } => Expr::Index {
            object: rb(object),
            index: rb(index),
        },
        Expr::Array(items) => Expr::Array(items.iter().map(r).collect()),
        Expr::Map(entries) => Expr::Map(entries.iter().map(|(k, v)| (r(k), r(v))).collect()),
        Expr::StructLiteral { type_name, fields } => Expr::StructLiteral {
            type_name: type_name.clone(),
            fields: fields
                .iter()
                .map(|f| crate::ir::FieldInit {
                    name: f.name.clone(),
                    value: r(&f.value),
                })
                .collect(),
        },
        Expr::Ternary {
            condition,
            then,
            otherwise,
        } => Expr::Ternary {
            condition: rb(condition),
            then: rb(then),
            otherwise: rb(otherwise),
        },
        Expr::Await(inner) => Expr::Await(rb(inner)),
        Expr::FormatString(parts) => Expr::FormatString(
            parts
                .iter()
                .map(|p| match p {
                    crate::ir::FormatPart::Expr(e) => crate::ir::FormatPart::Expr(r(e)),
                    text => text.clone(),
                })
                .collect(),
        ),
        // Shadowing scopes: leave nested lambdas and comprehensions alone.
        Expr::Lambda { .. } | Expr::Comprehension(_) => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BinaryOp;

    #[test]
    fn test_callee_path() {
        let callee = Expr::member(Expr::member(Expr::ident("std"), "thread"), "spawn");
        assert_eq!(callee_path(&callee).as_deref(), Some("std.thread.spawn"));
        assert_eq!(
            callee_path(&Expr::ident("tokio::spawn")).as_deref(),
            Some("tokio.spawn")
        );
        assert_eq!(callee_path(&Expr::int(1)), None);
    }

    #[test]
    fn test_rename_ident() {
        let e = Expr::binary(Expr::ident("m"), BinaryOp::Mul, Expr::ident("factor"));
        let renamed = rename_ident(&e, "m", "n");
        assert_eq!(
            renamed,
            Expr::binary(Expr::ident("n"), BinaryOp::Mul, Expr::ident("factor"))
        );
    }
}
