//! Output writers - emit IR as source code.
//!
//! Every writer runs [`validate`] first; past that point rendering cannot
//! fail. Constructs a target cannot express, and `Unhandled` nodes, render
//! as placeholder comments marked `unhandled:`.

pub mod csharp;
pub mod go;
pub mod javascript;
pub mod python;
pub mod rust;

pub use csharp::{CSHARP_WRITER, CSharpWriter};
pub use go::{GO_WRITER, GoWriter};
pub use javascript::{JAVASCRIPT_WRITER, JavaScriptWriter};
pub use python::{PYTHON_WRITER, PythonWriter};
pub use rust::{RUST_WRITER, RustWriter};

use crate::ir::*;
use crate::naming;
use crate::traits::GenerationError;
use crate::types::infer_type;
use std::collections::{HashMap, HashSet};

// ============================================================================
// Validation
// ============================================================================

/// Reject structurally malformed IR before any text is produced.
pub fn validate(module: &Module) -> Result<(), GenerationError> {
    for var in &module.constants {
        non_empty(&var.name, "constant")?;
        if let Some(ty) = &var.ty {
            check_type(ty)?;
        }
        check_expr(&var.value, &var.name)?;
    }
    for def in &module.types {
        non_empty(&def.name, "type")?;
        check_properties(&def.fields)?;
    }
    for en in &module.enums {
        non_empty(&en.name, "enum")?;
        for variant in &en.variants {
            non_empty(&variant.name, "enum variant")?;
            if let Some(ty) = &variant.associated {
                check_type(ty)?;
            }
        }
    }
    for class in &module.classes {
        non_empty(&class.name, "class")?;
        check_properties(&class.properties)?;
        for method in class.constructor.iter().chain(&class.methods) {
            check_function(method)?;
        }
    }
    for function in &module.functions {
        check_function(function)?;
    }
    Ok(())
}

fn non_empty(name: &str, what: &'static str) -> Result<(), GenerationError> {
    if name.is_empty() {
        return Err(GenerationError::EmptyName(what));
    }
    Ok(())
}

fn check_type(ty: &Type) -> Result<(), GenerationError> {
    let expected = match ty.name.as_str() {
        "array" => "1",
        "map" => "2",
        "tuple" => "2 or more",
        _ => "0",
    };
    let arity_ok = match ty.name.as_str() {
        "array" => ty.generic_args.len() == 1,
        "map" => ty.generic_args.len() == 2,
        "tuple" => ty.generic_args.len() >= 2,
        _ => ty.generic_args.is_empty(),
    };
    if !arity_ok {
        return Err(GenerationError::GenericArity {
            ty: ty.name.clone(),
            expected,
            found: ty.generic_args.len(),
        });
    }
    ty.generic_args.iter().try_for_each(check_type)
}

fn check_properties(properties: &[Property]) -> Result<(), GenerationError> {
    for property in properties {
        non_empty(&property.name, "property")?;
        check_type(&property.ty)?;
        if let Some(default) = &property.default {
            check_expr(default, &property.name)?;
        }
    }
    Ok(())
}

fn check_function(function: &Function) -> Result<(), GenerationError> {
    non_empty(&function.name, "function")?;
    for param in &function.params {
        non_empty(&param.name, "parameter")?;
        check_type(&param.ty)?;
    }
    if let Some(ty) = &function.return_type {
        check_type(ty)?;
    }
    let mut result = Ok(());
    walk_body(&function.body, &mut |stmt| {
        if let Stmt::Assign { ty: Some(ty), .. } = stmt
            && result.is_ok()
        {
            result = check_type(ty);
        }
    });
    result?;
    let mut result = Ok(());
    walk_body_exprs(&function.body, &mut |expr| {
        if result.is_ok() {
            result = check_node(expr, &function.name);
        }
    });
    result
}

fn check_expr(expr: &Expr, context: &str) -> Result<(), GenerationError> {
    let mut result = Ok(());
    expr.visit(&mut |e| {
        if result.is_ok() {
            result = check_node(e, context);
        }
    });
    result
}

fn check_node(expr: &Expr, context: &str) -> Result<(), GenerationError> {
    match expr {
        Expr::StructLiteral { type_name, .. } if type_name.is_empty() => {
            Err(GenerationError::MissingTypeName(context.to_string()))
        }
        Expr::Comprehension(c) if c.iterator.is_empty() => {
            Err(GenerationError::MissingIterator(context.to_string()))
        }
        _ => Ok(()),
    }
}

// ============================================================================
// Output buffer
// ============================================================================

/// Line-oriented output with a configurable indent unit.
pub(crate) struct Code {
    out: String,
    depth: usize,
    unit: String,
}

impl Code {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            out: String::new(),
            depth: 0,
            unit: unit.into(),
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(&self.unit);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    /// A blank separator line, never doubled and never leading.
    pub fn blank(&mut self) {
        self.blank_lines(1);
    }

    /// Ensure exactly `n` blank lines end the output so far.
    pub fn blank_lines(&mut self, n: usize) {
        if self.out.is_empty() {
            return;
        }
        let trailing = self.out.len() - self.out.trim_end_matches('\n').len();
        for _ in trailing..=n {
            self.out.push('\n');
        }
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Indentation of the current depth, for multi-line expressions.
    pub fn prefix(&self) -> String {
        self.unit.repeat(self.depth)
    }

    pub fn finish(self) -> String {
        let mut out = self.out.trim_end().to_string();
        out.push('\n');
        out
    }
}

// ============================================================================
// Rendering helpers
// ============================================================================

/// Placeholder text for a construct no rule handled.
pub(crate) fn placeholder(source: &str) -> String {
    let flat = source.split_whitespace().collect::<Vec<_>>().join(" ");
    tracing::debug!(snippet = %flat, "rendering unhandled placeholder");
    format!("unhandled: {}", flat.replace("*/", "* /"))
}

/// Double-quoted string body with C-style escapes.
pub(crate) fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", escape_string(s))
}

/// A float literal that always reads back as a float.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// Names that stay as written in every target: types and constants.
pub(crate) fn keeps_case(name: &str) -> bool {
    naming::is_type_like(name) || naming::is_screaming_case(name)
}

/// Literal value of each variant: explicit values, else counting up from
/// the previous integer.
pub(crate) fn enum_literals(en: &Enum) -> Vec<Literal> {
    let mut next = 0i64;
    en.variants
        .iter()
        .map(|variant| match &variant.value {
            Some(Literal::Int(n)) => {
                next = n + 1;
                Literal::Int(*n)
            }
            Some(other) => other.clone(),
            None => {
                next += 1;
                Literal::Int(next - 1)
            }
        })
        .collect()
}

/// `Level.high` when `Level` is an enum of the module.
pub(crate) fn enum_variant<'m>(
    module: &'m Module,
    expr: &Expr,
) -> Option<(&'m Enum, &'m EnumVariant)> {
    let Expr::Member { object, property } = expr else {
        return None;
    };
    let name = object.as_ident()?;
    let en = module.enums.iter().find(|e| e.name == name)?;
    let wanted = naming::to_snake_case(property);
    let variant = en.variants.iter().find(|v| v.name == wanted)?;
    Some((en, variant))
}

/// Fields of a struct literal, positional ones named by declaration order
/// when the type's fields line up.
pub(crate) fn struct_fields<'e>(
    module: &Module,
    type_name: &str,
    fields: &'e [FieldInit],
) -> Vec<(Option<String>, &'e Expr)> {
    let declared = module
        .types
        .iter()
        .find(|t| t.name == type_name)
        .map(|t| &t.fields);
    let positional = fields.iter().all(|f| f.name.is_none());
    match declared {
        Some(declared) if positional && declared.len() == fields.len() => declared
            .iter()
            .zip(fields)
            .map(|(d, f)| (Some(d.name.clone()), &f.value))
            .collect(),
        _ => fields.iter().map(|f| (f.name.clone(), &f.value)).collect(),
    }
}

/// Positional fields for a class with a constructor are constructor
/// arguments, in order.
pub(crate) fn constructor_args(
    module: &Module,
    type_name: &str,
    fields: &[FieldInit],
) -> Option<Vec<Expr>> {
    let class = module.classes.iter().find(|c| c.name == type_name)?;
    (class.constructor.is_some() && fields.iter().any(|f| f.name.is_none()))
        .then(|| fields.iter().map(|f| f.value.clone()).collect())
}

/// Whether `type_name` is a class (constructed through its constructor).
pub(crate) fn is_class(module: &Module, type_name: &str) -> bool {
    module.classes.iter().any(|c| c.name == type_name)
}

/// `x = x + y` as `(Add, y)`, for targets with compound assignment.
pub(crate) fn compound_parts<'e>(target: &Expr, value: &'e Expr) -> Option<(BinaryOp, &'e Expr)> {
    match value {
        Expr::Binary { op, left, right }
            if left.as_ref() == target
                && matches!(
                    op,
                    BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
                ) =>
        {
            Some((*op, right))
        }
        _ => None,
    }
}

/// Names reassigned after their declaration, or mutated in place.
pub(crate) fn mutated_names(body: &[Stmt]) -> HashSet<String> {
    let mut names = HashSet::new();
    walk_body(body, &mut |stmt| {
        if let Stmt::Assign {
            target,
            is_declaration: false,
            ..
        } = stmt
            && let Some(root) = root_ident(target)
        {
            names.insert(root.to_string());
        }
    });
    walk_body_exprs(body, &mut |expr| {
        if let Expr::Call { callee, .. } = expr
            && let Expr::Member { object, property } = callee.as_ref()
            && matches!(property.as_str(), "append" | "push" | "insert" | "pop" | "clear")
            && let Some(root) = root_ident(object)
        {
            names.insert(root.to_string());
        }
    });
    names
}

/// The map behind `m.items()`; any other iterable is returned as is.
pub(crate) fn pair_source(iterable: &Expr) -> &Expr {
    match iterable {
        Expr::Call { callee, args, .. } if args.is_empty() => match callee.as_ref() {
            Expr::Member { object, property } if property == "items" => object.as_ref(),
            _ => iterable,
        },
        _ => iterable,
    }
}

/// Identifier at the root of `a.b[c].d`.
pub(crate) fn root_ident(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Ident(name) => Some(name),
        Expr::Member { object, .. } | Expr::Index { object, .. } => root_ident(object),
        _ => None,
    }
}

/// Visit every function body of the module: free functions, constructors
/// and methods.
pub(crate) fn all_functions(module: &Module) -> impl Iterator<Item = &Function> {
    module.functions.iter().chain(
        module
            .classes
            .iter()
            .flat_map(|c| c.constructor.iter().chain(&c.methods)),
    )
}

/// The module with missing return types filled in from returned values, for
/// targets that must declare one. Unknown value types fall back to `any`.
pub(crate) fn infer_return_types(module: &Module) -> Module {
    let mut out = module.clone();
    // A second pass lets inferred callees inform their callers.
    for _ in 0..2 {
        let snapshot = out.clone();
        for function in &mut out.functions {
            fill_return_type(&snapshot, None, function);
        }
        for class in &mut out.classes {
            let name = class.name.clone();
            for method in &mut class.methods {
                fill_return_type(&snapshot, Some(&name), method);
            }
        }
    }
    out
}

fn fill_return_type(module: &Module, class: Option<&str>, function: &mut Function) {
    if function.return_type.is_some() {
        return;
    }
    let scope = Scope::for_function(module, class, function);
    let mut returns_value = false;
    let mut inferred = None;
    walk_body(&function.body, &mut |stmt| {
        if let Stmt::Return(Some(value)) = stmt
            && !value.is_null()
        {
            returns_value = true;
            if inferred.is_none() {
                inferred = scope.type_of(value).filter(|t| t.name != "any");
            }
        }
    });
    if returns_value {
        function.return_type = Some(inferred.unwrap_or_else(Type::any));
    }
}

/// Whether any expression in the module satisfies `pred`.
pub(crate) fn module_uses_expr(module: &Module, mut pred: impl FnMut(&Expr) -> bool) -> bool {
    let mut found = false;
    let mut check = |e: &Expr| {
        if !found && pred(e) {
            found = true;
        }
    };
    for var in &module.constants {
        var.value.visit(&mut check);
    }
    for function in all_functions(module) {
        walk_body_exprs(&function.body, &mut check);
        for param in &function.params {
            if let Some(default) = &param.default {
                default.visit(&mut check);
            }
        }
    }
    let properties = module
        .types
        .iter()
        .flat_map(|t| &t.fields)
        .chain(module.classes.iter().flat_map(|c| &c.properties));
    for property in properties {
        if let Some(default) = &property.default {
            default.visit(&mut check);
        }
    }
    found
}

/// Whether any declared type in the module (recursively) satisfies `pred`.
pub(crate) fn module_uses_type(module: &Module, pred: impl Fn(&Type) -> bool) -> bool {
    fn any(ty: &Type, pred: &dyn Fn(&Type) -> bool) -> bool {
        pred(ty) || ty.generic_args.iter().any(|t| any(t, pred))
    }
    let mut types: Vec<&Type> = Vec::new();
    types.extend(module.constants.iter().filter_map(|v| v.ty.as_ref()));
    types.extend(module.types.iter().flat_map(|t| &t.fields).map(|p| &p.ty));
    types.extend(module.classes.iter().flat_map(|c| &c.properties).map(|p| &p.ty));
    types.extend(
        module
            .enums
            .iter()
            .flat_map(|e| &e.variants)
            .filter_map(|v| v.associated.as_ref()),
    );
    let mut found = false;
    for function in all_functions(module) {
        types.extend(function.params.iter().map(|p| &p.ty));
        types.extend(function.return_type.iter());
        walk_body(&function.body, &mut |s| {
            if let Stmt::Assign { ty: Some(ty), .. } = s
                && any(ty, &pred)
            {
                found = true;
            }
        });
    }
    found || types.iter().any(|t| any(t, &pred))
}

// ============================================================================
// Local type knowledge
// ============================================================================

/// Types of the names visible in one function body, flow-insensitive.
///
/// Writers for typed targets use it to pick element types, zero values and
/// the right spelling of `len`/`in` for strings, lists and maps.
#[derive(Debug, Clone)]
pub(crate) struct Scope<'m> {
    module: &'m Module,
    class: Option<&'m str>,
    locals: HashMap<String, Type>,
}

impl<'m> Scope<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            class: None,
            locals: HashMap::new(),
        }
    }

    /// Scope of a function (or method of `class`), with every local bound.
    pub fn for_function(module: &'m Module, class: Option<&'m str>, function: &Function) -> Self {
        let mut scope = Self {
            module,
            class,
            locals: HashMap::new(),
        };
        for param in &function.params {
            let ty = if param.is_variadic {
                Type::array(param.ty.clone())
            } else {
                param.ty.clone()
            };
            scope.bind(&param.name, ty);
        }
        scope.bind_body(&function.body);
        scope
    }

    pub fn bind(&mut self, name: &str, ty: Type) {
        self.locals.entry(name.to_string()).or_insert(ty);
    }

    fn bind_body(&mut self, body: &[Stmt]) {
        for stmt in body {
            match stmt {
                Stmt::Assign {
                    target: Expr::Ident(name),
                    value,
                    ty,
                    ..
                } => {
                    if let Some(ty) = ty.clone().or_else(|| self.type_of(value)) {
                        self.bind(name, ty);
                    }
                }
                Stmt::For {
                    iterator,
                    iterable,
                    body,
                } => {
                    for (name, ty) in self.iteration_bindings(iterator, iterable) {
                        self.bind(&name, ty);
                    }
                    self.bind_body(body);
                }
                Stmt::If {
                    then_body,
                    else_body,
                    ..
                } => {
                    self.bind_body(then_body);
                    self.bind_body(else_body);
                }
                Stmt::While { body, .. } => self.bind_body(body),
                Stmt::Try {
                    body,
                    catches,
                    finally,
                } => {
                    self.bind_body(body);
                    for c in catches {
                        self.bind_body(&c.body);
                    }
                    self.bind_body(finally);
                }
                _ => {}
            }
        }
    }

    /// Names bound by `for iterator in iterable`, with their types.
    pub fn iteration_bindings(&self, iterator: &str, iterable: &Expr) -> Vec<(String, Type)> {
        let names: Vec<&str> = iterator.split(',').map(str::trim).collect();
        if let [key, value] = names.as_slice() {
            let map = match iterable {
                Expr::Call { callee, .. } => match callee.as_ref() {
                    Expr::Member { object, property } if property == "items" => {
                        self.type_of(object)
                    }
                    _ => None,
                },
                other => self.type_of(other),
            };
            let (k, v) = match map {
                Some(t) if t.is_map() => (t.generic_args[0].clone(), t.generic_args[1].clone()),
                Some(t) if t.is_array() => (Type::int(), t.generic_args[0].clone()),
                _ => (Type::any(), Type::any()),
            };
            return vec![(key.to_string(), k), (value.to_string(), v)];
        }
        let ty = self.element_type(iterable).unwrap_or_else(Type::any);
        vec![(iterator.to_string(), ty)]
    }

    /// Type produced by iterating `iterable`.
    pub fn element_type(&self, iterable: &Expr) -> Option<Type> {
        if crate::patterns::as_range(iterable).is_some() {
            return Some(Type::int());
        }
        let ty = self.type_of(iterable)?;
        match ty.name.as_str() {
            "array" => ty.generic_args.first().cloned(),
            "map" => ty.generic_args.first().cloned(),
            "string" => Some(Type::string()),
            _ => None,
        }
    }

    pub fn local(&self, name: &str) -> Option<&Type> {
        self.locals.get(name)
    }

    fn property_type(&self, type_name: &str, property: &str) -> Option<Type> {
        let fields = self
            .module
            .types
            .iter()
            .find(|t| t.name == type_name)
            .map(|t| &t.fields)
            .or_else(|| {
                self.module
                    .classes
                    .iter()
                    .find(|c| c.name == type_name)
                    .map(|c| &c.properties)
            })?;
        fields
            .iter()
            .find(|p| p.name == property)
            .map(|p| p.ty.clone())
    }

    fn return_type_of(&self, callee: &Expr) -> Option<Type> {
        match callee {
            Expr::Ident(name) => self
                .module
                .function(name)
                .and_then(|f| f.return_type.clone()),
            Expr::Member { property, .. } => self
                .module
                .classes
                .iter()
                .flat_map(|c| &c.methods)
                .find(|m| m.name == *property)
                .and_then(|m| m.return_type.clone()),
            _ => None,
        }
    }

    /// Best-effort static type of `expr`.
    pub fn type_of(&self, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::Ident(name) => self.locals.get(name).cloned().or_else(|| {
                self.module
                    .constants
                    .iter()
                    .find(|c| c.name == *name)
                    .and_then(|c| c.ty.clone().or_else(|| infer_type(&c.value)))
            }),
            Expr::Member { object, property } => {
                if let Some((en, _)) = enum_variant(self.module, expr) {
                    return Some(Type::new(&en.name));
                }
                let owner = match object.as_ref() {
                    Expr::Ident(name) if name == "self" => self.class.map(Type::new),
                    other => self.type_of(other),
                }?;
                self.property_type(&owner.name, property)
            }
            Expr::Index { object, .. } => {
                let ty = self.type_of(object)?;
                match ty.name.as_str() {
                    "array" => ty.generic_args.first().cloned(),
                    "map" => ty.generic_args.get(1).cloned(),
                    "string" => Some(Type::string()),
                    _ => None,
                }
            }
            Expr::Call { callee, args, .. } => match (callee.as_ref(), args.as_slice()) {
                (Expr::Ident(name), [_]) if name == "len" => Some(Type::int()),
                (Expr::Ident(name), _) if name == "range" => Some(Type::array(Type::int())),
                (Expr::Ident(name), _) if self.module.declares_type(name) => Some(Type::new(name)),
                (callee, _) => self.return_type_of(callee),
            },
            Expr::StructLiteral { type_name, .. } => Some(Type::new(type_name)),
            Expr::Array(items) => Some(Type::array(
                items
                    .iter()
                    .find_map(|i| self.type_of(i))
                    .unwrap_or_else(Type::any),
            )),
            Expr::Map(entries) => {
                let key = entries.iter().find_map(|(k, _)| self.type_of(k));
                let value = entries.iter().find_map(|(_, v)| self.type_of(v));
                Some(Type::map(
                    key.unwrap_or_else(Type::any),
                    value.unwrap_or_else(Type::any),
                ))
            }
            Expr::Comprehension(c) => {
                let mut inner = self.clone();
                for (name, ty) in self.iteration_bindings(&c.iterator, &c.iterable) {
                    inner.locals.insert(name, ty);
                }
                let target = inner.type_of(&c.target).unwrap_or_else(Type::any);
                Some(match c.kind {
                    ComprehensionKind::Dict => Type::map(
                        target,
                        c.value
                            .as_ref()
                            .and_then(|v| inner.type_of(v))
                            .unwrap_or_else(Type::any),
                    ),
                    _ => Type::array(target),
                })
            }
            Expr::Binary { op, left, right } => match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Mod | BinaryOp::Pow => {
                    self.type_of(left).or_else(|| self.type_of(right))
                }
                BinaryOp::FloorDiv => Some(Type::int()),
                BinaryOp::Div => match (self.type_of(left), self.type_of(right)) {
                    (Some(l), Some(r)) if l.name == "int" && r.name == "int" => Some(Type::int()),
                    _ => Some(Type::float()),
                },
                _ => infer_type(expr),
            },
            Expr::Unary { op: UnaryOp::Not, .. } => Some(Type::bool()),
            Expr::Unary { operand, .. } => self.type_of(operand),
            Expr::Ternary {
                then, otherwise, ..
            } => self.type_of(then).or_else(|| self.type_of(otherwise)),
            Expr::Await(inner) => self.type_of(inner),
            _ => infer_type(expr),
        }
    }

    pub fn is_string(&self, expr: &Expr) -> bool {
        self.type_of(expr).is_some_and(|t| t.name == "string")
    }

    pub fn is_map(&self, expr: &Expr) -> bool {
        self.type_of(expr).is_some_and(|t| t.is_map())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_malformed() {
        let mut module = Module::new("m");
        module.functions.push(Function::new("", vec![], vec![]));
        assert_eq!(
            validate(&module),
            Err(GenerationError::EmptyName("function"))
        );

        let mut module = Module::new("m");
        module.functions.push(Function::new(
            "build",
            vec![],
            vec![Stmt::Return(Some(Expr::StructLiteral {
                type_name: String::new(),
                fields: vec![],
            }))],
        ));
        assert!(matches!(
            validate(&module),
            Err(GenerationError::MissingTypeName(ctx)) if ctx == "build"
        ));

        let mut module = Module::new("m");
        let bad = Type {
            name: "map".into(),
            generic_args: vec![Type::string()],
            is_optional: false,
        };
        module
            .functions
            .push(Function::new("f", vec![Param::new("m", bad)], vec![]));
        assert!(matches!(
            validate(&module),
            Err(GenerationError::GenericArity { found: 1, .. })
        ));
    }

    #[test]
    fn test_enum_literals_count_up() {
        let mut high = EnumVariant::new("high");
        high.value = Some(Literal::Int(5));
        let en = Enum {
            name: "Level".into(),
            variants: vec![EnumVariant::new("low"), high, EnumVariant::new("max")],
        };
        assert_eq!(
            enum_literals(&en),
            vec![Literal::Int(0), Literal::Int(5), Literal::Int(6)]
        );
    }

    #[test]
    fn test_scope_types() {
        let module = Module::new("m");
        let function = Function::new(
            "f",
            vec![Param::new("items", Type::array(Type::int()))],
            vec![
                Stmt::declare("total", Expr::int(0)),
                Stmt::for_in("x", Expr::ident("items"), vec![]),
            ],
        );
        let scope = Scope::for_function(&module, None, &function);
        assert_eq!(scope.local("x"), Some(&Type::int()));
        assert_eq!(scope.local("total"), Some(&Type::int()));
        assert_eq!(
            scope.type_of(&Expr::index(Expr::ident("items"), Expr::int(0))),
            Some(Type::int())
        );
    }

    #[test]
    fn test_helpers() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(quoted("a\"b\n"), "\"a\\\"b\\n\"");
        assert!(placeholder("x  */ y").starts_with("unhandled: x * / y"));
    }
}
