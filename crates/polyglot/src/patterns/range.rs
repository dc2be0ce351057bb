//! Counted loops.
//!
//! `for i := a; i < b; i++`, `for i in a..b` and `for i in range(a, b)` all
//! become `For(i, range(a, b))`.

use crate::ir::{BinaryOp, Expr, Literal, Stmt};

/// Canonical range iterable: `range(start, end)`.
pub fn range_call(start: Expr, end: Expr) -> Expr {
    Expr::call(Expr::ident("range"), vec![start, end])
}

/// Split a canonical range into `(start, end)`.
///
/// A single-argument `range(n)` starts at zero. Stepped ranges are left to
/// the generic call rendering.
pub fn as_range(expr: &Expr) -> Option<(Expr, &Expr)> {
    let Expr::Call {
        callee,
        args,
        kwargs,
    } = expr
    else {
        return None;
    };
    if !kwargs.is_empty() || !matches!(callee.as_ref(), Expr::Ident(n) if n == "range") {
        return None;
    }
    match args.as_slice() {
        [end] => Some((Expr::int(0), end)),
        [start, end] => Some((start.clone(), end)),
        _ => None,
    }
}

/// Recognize a C-style counted loop header.
///
/// `init` is the loop variable's start value, `cond` the loop condition and
/// `update` the post statement. Returns the canonical `range(a, b)`.
pub fn recognize_counted(var: &str, init: &Expr, cond: &Expr, update: &Stmt) -> Option<Expr> {
    if !is_increment(var, update) {
        return None;
    }
    let Expr::Binary { op, left, right } = cond else {
        return None;
    };
    if !matches!(left.as_ref(), Expr::Ident(n) if n == var) {
        return None;
    }
    let end = match op {
        BinaryOp::Lt => right.as_ref().clone(),
        BinaryOp::Le => match right.as_ref() {
            Expr::Literal(Literal::Int(n)) => Expr::int(n + 1),
            other => Expr::binary(other.clone(), BinaryOp::Add, Expr::int(1)),
        },
        _ => return None,
    };
    tracing::trace!(var, "recognized counted loop");
    Some(range_call(init.clone(), end))
}

/// `i++`, `i += 1`, `i = i + 1`, all read as `i = i + 1`.
fn is_increment(var: &str, update: &Stmt) -> bool {
    let Stmt::Assign { target, value, .. } = update else {
        return false;
    };
    matches!(target, Expr::Ident(n) if n == var)
        && matches!(
            value,
            Expr::Binary { op: BinaryOp::Add, left, right }
                if matches!(left.as_ref(), Expr::Ident(n) if n == var)
                    && matches!(right.as_ref(), Expr::Literal(Literal::Int(1)))
        )
}

/// `x = x <op> rhs` for compound assignment operators.
pub fn compound_assign(target: Expr, op: BinaryOp, rhs: Expr) -> Stmt {
    Stmt::assign(target.clone(), Expr::binary(target, op, rhs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn increment(var: &str) -> Stmt {
        compound_assign(Expr::ident(var), BinaryOp::Add, Expr::int(1))
    }

    #[test]
    fn test_counted_loop() {
        let cond = Expr::binary(Expr::ident("i"), BinaryOp::Lt, Expr::ident("n"));
        let range = recognize_counted("i", &Expr::int(0), &cond, &increment("i")).unwrap();
        assert_eq!(range, range_call(Expr::int(0), Expr::ident("n")));
    }

    #[test]
    fn test_inclusive_bound() {
        let cond = Expr::binary(Expr::ident("i"), BinaryOp::Le, Expr::int(9));
        let range = recognize_counted("i", &Expr::int(0), &cond, &increment("i")).unwrap();
        assert_eq!(range, range_call(Expr::int(0), Expr::int(10)));
    }

    #[test]
    fn test_other_updates_are_rejected() {
        let cond = Expr::binary(Expr::ident("i"), BinaryOp::Lt, Expr::int(10));
        let step_two = compound_assign(Expr::ident("i"), BinaryOp::Add, Expr::int(2));
        assert!(recognize_counted("i", &Expr::int(0), &cond, &step_two).is_none());
    }

    #[test]
    fn test_as_range() {
        let call = Expr::call(Expr::ident("range"), vec![Expr::int(5)]);
        let (start, end) = as_range(&call).unwrap();
        assert_eq!(start, Expr::int(0));
        assert_eq!(end, &Expr::int(5));
    }
}
