//! Struct literal vs. call disambiguation.
//!
//! `User("Alice", 30)`, `User{...}` and `new User(...)` are constructions
//! only when `User` is declared in the same module. Readers make a first
//! pass over top-level declarations to fill a [`KnownTypes`] table, then
//! consult it while reading bodies.

use crate::ir::{Expr, FieldInit};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    /// Plain struct with its fields in declaration order.
    Struct(Vec<String>),
    /// Class with an explicit constructor; positional args stay positional.
    Class,
}

#[derive(Debug, Clone, Default)]
pub struct KnownTypes {
    types: HashMap<String, Shape>,
}

impl KnownTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_struct(&mut self, name: impl Into<String>, fields: Vec<String>) {
        self.types.insert(name.into(), Shape::Struct(fields));
    }

    pub fn add_class(&mut self, name: impl Into<String>) {
        self.types.insert(name.into(), Shape::Class);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Build a struct literal for `name`, or `None` if it is not a module type.
    ///
    /// Positional arguments to a plain struct are named by field order when
    /// the counts line up.
    pub fn construct(
        &self,
        name: &str,
        positional: Vec<Expr>,
        named: Vec<(String, Expr)>,
    ) -> Option<Expr> {
        let shape = self.types.get(name)?;
        Some(build(name, shape, positional, named))
    }

    /// Either a struct literal or a plain call, depending on `name`.
    pub fn construct_or_call(
        &self,
        name: &str,
        positional: Vec<Expr>,
        named: Vec<(String, Expr)>,
    ) -> Expr {
        match self.types.get(name) {
            Some(shape) => build(name, shape, positional, named),
            None => Expr::Call {
                callee: Box::new(Expr::ident(name)),
                args: positional,
                kwargs: named,
            },
        }
    }
}

fn build(name: &str, shape: &Shape, positional: Vec<Expr>, named: Vec<(String, Expr)>) -> Expr {
    let fields = match shape {
        Shape::Struct(field_names)
            if named.is_empty()
                && !positional.is_empty()
                && positional.len() == field_names.len() =>
        {
            field_names
                .iter()
                .zip(positional)
                .map(|(n, v)| FieldInit::named(n.clone(), v))
                .collect()
        }
        _ => positional
            .into_iter()
            .map(FieldInit::positional)
            .chain(named.into_iter().map(|(n, v)| FieldInit::named(n, v)))
            .collect(),
    };
    tracing::trace!(type_name = %name, "struct literal");
    Expr::StructLiteral {
        type_name: name.to_string(),
        fields,
    }
}

/// Whether every field of a struct literal is named.
pub fn is_named(fields: &[FieldInit]) -> bool {
    fields.iter().all(|f| f.name.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> KnownTypes {
        let mut known = KnownTypes::new();
        known.add_struct("User", vec!["name".into(), "age".into()]);
        known.add_class("Service");
        known
    }

    #[test]
    fn test_positional_struct_gets_field_names() {
        let expr = known()
            .construct("User", vec![Expr::string("Alice"), Expr::int(30)], vec![])
            .unwrap();
        match expr {
            Expr::StructLiteral { fields, .. } => {
                assert!(is_named(&fields));
                assert_eq!(fields[0].name.as_deref(), Some("name"));
                assert_eq!(fields[1].name.as_deref(), Some("age"));
            }
            other => panic!("expected struct literal, got {other:?}"),
        }
    }

    #[test]
    fn test_class_keeps_positional_args() {
        let expr = known()
            .construct("Service", vec![Expr::string("db")], vec![])
            .unwrap();
        match expr {
            Expr::StructLiteral { fields, .. } => assert!(fields[0].name.is_none()),
            other => panic!("expected struct literal, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_name_is_a_call() {
        let expr = known().construct_or_call("print", vec![Expr::string("hi")], vec![]);
        assert!(matches!(expr, Expr::Call { .. }));
    }
}
