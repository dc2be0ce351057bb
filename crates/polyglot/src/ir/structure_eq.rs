//! Structural equality for IR types.
//!
//! `structure_eq` compares IR trees ignoring "surface hints" - fields that
//! capture language-specific details but don't affect program semantics.
//!
//! # Hint Fields (ignored during comparison)
//!
//! - `Stmt::Assign { is_declaration, ty }` - Python has no declarations,
//!   Go `:=` carries no type, C# `var` hides it
//! - `Function::doc`, `Class::doc`, `TypeDefinition::doc` - comments
//! - `Module::version`, `Module::imports` - targets infer their own imports
//!
//! # Core Fields (must match exactly)
//!
//! - All names, values, operators, types of declarations
//! - Control flow structure
//! - Expression trees

use super::{
    CatchBlock, Class, Comprehension, Enum, Expr, FieldInit, FormatPart, Function, LambdaBody,
    Module, ModuleVar, Param, Property, Stmt, TypeDefinition,
};

/// Trait for structural equality comparison.
///
/// Unlike `PartialEq`, this ignores surface hint fields that may differ
/// between languages but don't affect program semantics.
pub trait StructureEq {
    /// Compare two values for structural equality.
    fn structure_eq(&self, other: &Self) -> bool;
}

impl StructureEq for Module {
    fn structure_eq(&self, other: &Self) -> bool {
        self.name == other.name
            && vec_structure_eq(&self.constants, &other.constants)
            && vec_structure_eq(&self.types, &other.types)
            && vec_structure_eq(&self.enums, &other.enums)
            && vec_structure_eq(&self.classes, &other.classes)
            && vec_structure_eq(&self.functions, &other.functions)
    }
}

impl StructureEq for ModuleVar {
    fn structure_eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value.structure_eq(&other.value)
    }
}

impl StructureEq for TypeDefinition {
    fn structure_eq(&self, other: &Self) -> bool {
        self.name == other.name && vec_structure_eq(&self.fields, &other.fields)
    }
}

impl StructureEq for Property {
    fn structure_eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.ty == other.ty
            && option_structure_eq(self.default.as_ref(), other.default.as_ref())
    }
}

impl StructureEq for Enum {
    fn structure_eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.variants.len() == other.variants.len()
            && self
                .variants
                .iter()
                .zip(&other.variants)
                .all(|(a, b)| a.name == b.name && a.associated == b.associated)
    }
}

impl StructureEq for Class {
    fn structure_eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.bases == other.bases
            && vec_structure_eq(&self.properties, &other.properties)
            && option_structure_eq(self.constructor.as_ref(), other.constructor.as_ref())
            && vec_structure_eq(&self.methods, &other.methods)
    }
}

impl StructureEq for Function {
    fn structure_eq(&self, other: &Self) -> bool {
        self.name == other.name
            && vec_structure_eq(&self.params, &other.params)
            && self.return_type == other.return_type
            && self.throws.is_empty() == other.throws.is_empty()
            && self.is_async == other.is_async
            && vec_structure_eq(&self.body, &other.body)
    }
}

impl StructureEq for Param {
    fn structure_eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.ty == other.ty
            && self.is_variadic == other.is_variadic
            && option_structure_eq(self.default.as_ref(), other.default.as_ref())
    }
}

impl StructureEq for Stmt {
    fn structure_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Stmt::Expr(a), Stmt::Expr(b)) => a.structure_eq(b),

            (Stmt::Return(a), Stmt::Return(b)) => option_structure_eq(a.as_ref(), b.as_ref()),

            // Ignore `is_declaration` and `ty` - they're surface hints
            (
                Stmt::Assign {
                    target: t1,
                    value: v1,
                    ..
                },
                Stmt::Assign {
                    target: t2,
                    value: v2,
                    ..
                },
            ) => t1.structure_eq(t2) && v1.structure_eq(v2),

            (
                Stmt::If {
                    condition: c1,
                    then_body: t1,
                    else_body: e1,
                },
                Stmt::If {
                    condition: c2,
                    then_body: t2,
                    else_body: e2,
                },
            ) => c1.structure_eq(c2) && vec_structure_eq(t1, t2) && vec_structure_eq(e1, e2),

            (
                Stmt::For {
                    iterator: v1,
                    iterable: i1,
                    body: b1,
                },
                Stmt::For {
                    iterator: v2,
                    iterable: i2,
                    body: b2,
                },
            ) => v1 == v2 && i1.structure_eq(i2) && vec_structure_eq(b1, b2),

            (
                Stmt::While {
                    condition: c1,
                    body: b1,
                },
                Stmt::While {
                    condition: c2,
                    body: b2,
                },
            ) => c1.structure_eq(c2) && vec_structure_eq(b1, b2),

            (
                Stmt::Try {
                    body: b1,
                    catches: c1,
                    finally: f1,
                },
                Stmt::Try {
                    body: b2,
                    catches: c2,
                    finally: f2,
                },
            ) => vec_structure_eq(b1, b2) && vec_structure_eq(c1, c2) && vec_structure_eq(f1, f2),

            (Stmt::Throw(a), Stmt::Throw(b)) => a.structure_eq(b),
            (Stmt::Spawn(a), Stmt::Spawn(b)) => a.structure_eq(b),
            (Stmt::Break, Stmt::Break) => true,
            (Stmt::Continue, Stmt::Continue) => true,
            (Stmt::Unhandled(a), Stmt::Unhandled(b)) => a == b,

            _ => false,
        }
    }
}

impl StructureEq for CatchBlock {
    fn structure_eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.binding == other.binding
            && vec_structure_eq(&self.body, &other.body)
    }
}

impl StructureEq for Expr {
    fn structure_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Literal(a), Expr::Literal(b)) => a == b,
            (Expr::Ident(a), Expr::Ident(b)) => a == b,

            (
                Expr::Binary {
                    left: l1,
                    op: o1,
                    right: r1,
                },
                Expr::Binary {
                    left: l2,
                    op: o2,
                    right: r2,
                },
            ) => o1 == o2 && l1.structure_eq(l2) && r1.structure_eq(r2),

            (
                Expr::Unary {
                    op: o1,
                    operand: e1,
                },
                Expr::Unary {
                    op: o2,
                    operand: e2,
                },
            ) => o1 == o2 && e1.structure_eq(e2),

            (
                Expr::Call {
                    callee: c1,
                    args: a1,
                    kwargs: k1,
                },
                Expr::Call {
                    callee: c2,
                    args: a2,
                    kwargs: k2,
                },
            ) => {
                c1.structure_eq(c2)
                    && vec_structure_eq(a1, a2)
                    && k1.len() == k2.len()
                    && k1
                        .iter()
                        .zip(k2)
                        .all(|((n1, v1), (n2, v2))| n1 == n2 && v1.structure_eq(v2))
            }

            (
                Expr::Member {
                    object: o1,
                    property: p1,
                },
                Expr::Member {
                    object: o2,
                    property: p2,
                },
            ) => p1 == p2 && o1.structure_eq(o2),

            (
                Expr::Index {
                    object: o1,
                    index: i1,
                },
                Expr::Index {
                    object: o2,
                    index: i2,
                },
            ) => o1.structure_eq(o2) && i1.structure_eq(i2),

            (Expr::Array(a), Expr::Array(b)) => vec_structure_eq(a, b),

            (Expr::Map(a), Expr::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((k1, v1), (k2, v2))| k1.structure_eq(k2) && v1.structure_eq(v2))
            }

            (
                Expr::StructLiteral {
                    type_name: n1,
                    fields: f1,
                },
                Expr::StructLiteral {
                    type_name: n2,
                    fields: f2,
                },
            ) => n1 == n2 && vec_structure_eq(f1, f2),

            (Expr::Comprehension(a), Expr::Comprehension(b)) => a.structure_eq(b),

            (
                Expr::Lambda {
                    params: p1,
                    body: b1,
                },
                Expr::Lambda {
                    params: p2,
                    body: b2,
                },
            ) => {
                p1 == p2
                    && match (b1, b2) {
                        (LambdaBody::Expr(a), LambdaBody::Expr(b)) => a.structure_eq(b),
                        (LambdaBody::Block(a), LambdaBody::Block(b)) => vec_structure_eq(a, b),
                        _ => false,
                    }
            }

            (
                Expr::Ternary {
                    condition: c1,
                    then: t1,
                    otherwise: e1,
                },
                Expr::Ternary {
                    condition: c2,
                    then: t2,
                    otherwise: e2,
                },
            ) => c1.structure_eq(c2) && t1.structure_eq(t2) && e1.structure_eq(e2),

            (Expr::Await(a), Expr::Await(b)) => a.structure_eq(b),

            (Expr::FormatString(a), Expr::FormatString(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| match (x, y) {
                        (FormatPart::Text(s1), FormatPart::Text(s2)) => s1 == s2,
                        (FormatPart::Expr(e1), FormatPart::Expr(e2)) => e1.structure_eq(e2),
                        _ => false,
                    })
            }

            (Expr::Unhandled(a), Expr::Unhandled(b)) => a == b,

            _ => false,
        }
    }
}

impl StructureEq for FieldInit {
    fn structure_eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value.structure_eq(&other.value)
    }
}

impl StructureEq for Comprehension {
    fn structure_eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.iterator == other.iterator
            && self.target.structure_eq(&other.target)
            && option_structure_eq(self.value.as_ref(), other.value.as_ref())
            && self.iterable.structure_eq(&other.iterable)
            && option_structure_eq(self.condition.as_ref(), other.condition.as_ref())
    }
}

// Helper functions

fn vec_structure_eq<T: StructureEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structure_eq(y))
}

fn option_structure_eq<T: StructureEq>(a: Option<&T>, b: Option<&T>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.structure_eq(y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Type;

    #[test]
    fn test_declaration_flag_is_ignored() {
        let decl = Stmt::declare("x", Expr::int(42));
        let plain = Stmt::assign(Expr::ident("x"), Expr::int(42));

        assert!(decl.structure_eq(&plain));
        assert_ne!(decl, plain); // Regular equality still differs
    }

    #[test]
    fn test_declared_type_is_ignored() {
        let typed = Stmt::Assign {
            target: Expr::ident("count"),
            value: Expr::int(0),
            is_declaration: true,
            ty: Some(Type::int()),
        };
        let untyped = Stmt::declare("count", Expr::int(0));

        assert!(typed.structure_eq(&untyped));
    }

    #[test]
    fn test_different_names_not_equal() {
        let x = Stmt::declare("x", Expr::int(1));
        let y = Stmt::declare("y", Expr::int(1));

        assert!(!x.structure_eq(&y));
    }

    #[test]
    fn test_docs_are_ignored() {
        let mut documented = Function::new("run", vec![], vec![Stmt::Break]);
        documented.doc = Some("Runs things.".into());
        let bare = Function::new("run", vec![], vec![Stmt::Break]);

        assert!(documented.structure_eq(&bare));
    }

    #[test]
    fn test_struct_literal_is_not_a_call() {
        let literal = Expr::StructLiteral {
            type_name: "User".into(),
            fields: vec![FieldInit::named("name", Expr::string("Alice"))],
        };
        let call = Expr::call(Expr::ident("User"), vec![Expr::string("Alice")]);

        assert!(!literal.structure_eq(&call));
    }
}
