//! Async flagging and launch recognition.
//!
//! A launch (`go f()`, `Task.Run(...)`, `thread::spawn(...)`) becomes a
//! `Spawn` statement holding the launched expression. Spawn is data only;
//! nothing here runs anything.

use super::callee_path;
use crate::ir::{Expr, LambdaBody, Stmt, walk_body, walk_body_exprs};
use crate::types::Language;

/// How the launched work is passed to a launch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnArg {
    /// `create_task(f(x))`: the argument is the work itself.
    Direct,
    /// `Task.Run(() => f(x))`: a zero-parameter lambda wraps the work.
    Lambda,
    /// `threading.Thread(target=f, args=(x,)).start()`.
    ThreadTarget,
}

#[derive(Debug)]
pub struct SpawnShape {
    pub language: Language,
    /// Dotted callee path in canonical naming.
    pub callee: &'static str,
    pub arg: SpawnArg,
}

pub const SPAWN_SHAPES: &[SpawnShape] = &[
    SpawnShape {
        language: Language::Python,
        callee: "threading.Thread",
        arg: SpawnArg::ThreadTarget,
    },
    SpawnShape {
        language: Language::Python,
        callee: "asyncio.create_task",
        arg: SpawnArg::Direct,
    },
    SpawnShape {
        language: Language::Python,
        callee: "asyncio.ensure_future",
        arg: SpawnArg::Direct,
    },
    SpawnShape {
        language: Language::JavaScript,
        callee: "queue_microtask",
        arg: SpawnArg::Lambda,
    },
    SpawnShape {
        language: Language::JavaScript,
        callee: "set_immediate",
        arg: SpawnArg::Lambda,
    },
    SpawnShape {
        language: Language::Rust,
        callee: "std.thread.spawn",
        arg: SpawnArg::Lambda,
    },
    SpawnShape {
        language: Language::Rust,
        callee: "thread.spawn",
        arg: SpawnArg::Lambda,
    },
    SpawnShape {
        language: Language::Rust,
        callee: "tokio.spawn",
        arg: SpawnArg::Direct,
    },
    SpawnShape {
        language: Language::Rust,
        callee: "tokio.task.spawn",
        arg: SpawnArg::Direct,
    },
    SpawnShape {
        language: Language::CSharp,
        callee: "Task.run",
        arg: SpawnArg::Lambda,
    },
    SpawnShape {
        language: Language::CSharp,
        callee: "Task.factory.start_new",
        arg: SpawnArg::Lambda,
    },
];

/// Unwrap a zero-parameter lambda to the work it performs.
fn lambda_work(expr: &Expr) -> Expr {
    match expr {
        Expr::Lambda { params, body } if params.is_empty() => match body {
            LambdaBody::Expr(e) => e.as_ref().clone(),
            LambdaBody::Block(stmts) => match stmts.as_slice() {
                [Stmt::Expr(e)] => e.clone(),
                _ => expr.clone(),
            },
        },
        Expr::Lambda { .. } => expr.clone(),
        // A bare function reference: `queueMicrotask(tick)`
        other => Expr::call(other.clone(), vec![]),
    }
}

/// Recognize a launch call used as a statement; returns the launched work.
pub fn recognize_spawn(lang: Language, expr: &Expr) -> Option<Expr> {
    let Expr::Call {
        callee,
        args,
        kwargs,
    } = expr
    else {
        return None;
    };

    // threading.Thread(target=f, args=(a,)).start()
    if let Expr::Member { object, property } = callee.as_ref()
        && property == "start"
        && args.is_empty()
        && let Expr::Call {
            callee: ctor,
            kwargs: ctor_kwargs,
            ..
        } = object.as_ref()
        && let Some(path) = callee_path(ctor)
        && SPAWN_SHAPES
            .iter()
            .any(|s| s.language == lang && s.arg == SpawnArg::ThreadTarget && s.callee == path)
    {
        let target = ctor_kwargs.iter().find(|(k, _)| k == "target")?.1.clone();
        let call_args = match ctor_kwargs.iter().find(|(k, _)| k == "args") {
            Some((_, Expr::Array(items))) => items.clone(),
            Some((_, single)) => vec![single.clone()],
            None => Vec::new(),
        };
        tracing::trace!(language = %lang, "recognized thread launch");
        return Some(Expr::call(target, call_args));
    }

    let path = callee_path(callee)?;
    let shape = SPAWN_SHAPES
        .iter()
        .find(|s| s.language == lang && s.callee == path && s.arg != SpawnArg::ThreadTarget)?;
    if !kwargs.is_empty() {
        return None;
    }
    let work = match (shape.arg, args.as_slice()) {
        (SpawnArg::Direct, [work]) => match work {
            Expr::Lambda { .. } => lambda_work(work),
            other => other.clone(),
        },
        (SpawnArg::Lambda, [work, ..]) => lambda_work(work),
        _ => return None,
    };
    tracing::trace!(language = %lang, callee = %path, "recognized launch");
    Some(work)
}

/// Whether a body awaits or launches anything.
pub fn body_is_async(body: &[Stmt]) -> bool {
    let mut found = false;
    walk_body(body, &mut |s| {
        if matches!(s, Stmt::Spawn(_)) {
            found = true;
        }
    });
    if found {
        return true;
    }
    walk_body_exprs(body, &mut |e| {
        if matches!(e, Expr::Await(_)) {
            found = true;
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_thread_launch() {
        let thread = Expr::Call {
            callee: Box::new(Expr::member(Expr::ident("threading"), "Thread")),
            args: vec![],
            kwargs: vec![
                ("target".into(), Expr::ident("worker")),
                ("args".into(), Expr::array(vec![Expr::int(1)])),
            ],
        };
        let start = Expr::call(Expr::member(thread, "start"), vec![]);
        let work = recognize_spawn(Language::Python, &start).unwrap();
        assert_eq!(work, Expr::call(Expr::ident("worker"), vec![Expr::int(1)]));
    }

    #[test]
    fn test_csharp_task_run() {
        let launch = Expr::call(
            Expr::member(Expr::ident("Task"), "run"),
            vec![Expr::lambda(
                vec![],
                Expr::call(Expr::ident("process"), vec![]),
            )],
        );
        let work = recognize_spawn(Language::CSharp, &launch).unwrap();
        assert_eq!(work, Expr::call(Expr::ident("process"), vec![]));
    }

    #[test]
    fn test_shapes_are_per_language() {
        let launch = Expr::call(
            Expr::ident("queue_microtask"),
            vec![Expr::lambda(vec![], Expr::call(Expr::ident("tick"), vec![]))],
        );
        assert!(recognize_spawn(Language::JavaScript, &launch).is_some());
        assert!(recognize_spawn(Language::Python, &launch).is_none());
    }

    #[test]
    fn test_body_is_async() {
        let body = vec![Stmt::Expr(Expr::await_expr(Expr::call(
            Expr::ident("fetch"),
            vec![],
        )))];
        assert!(body_is_async(&body));
        assert!(!body_is_async(&[Stmt::Break]));
        assert!(body_is_async(&[Stmt::Spawn(Expr::ident("x"))]));
    }
}
