//! Rust writer.
//!
//! Emits a [`Module`] as a Rust source file. Throwing functions return
//! `Result<T, Box<dyn std::error::Error>>`, calls to them use `?` (or
//! `.unwrap()` where the caller cannot fail), and comprehensions become
//! iterator chains ending in `collect`.

use super::{
    Code, Scope, compound_parts, constructor_args, enum_literals, enum_variant, escape_string,
    format_float, infer_return_types, keeps_case, module_uses_expr, module_uses_type,
    mutated_names, pair_source, placeholder, quoted, struct_fields, validate,
};
use crate::config::{RustConfig, TranslateConfig};
use crate::ir::*;
use crate::naming;
use crate::patterns::as_range;
use crate::patterns::error_tuple::{is_error_kind, thrown_parts};
use crate::traits::{GenerationError, Writer};
use crate::types::{Language, from_canonical, infer_type};
use std::collections::HashSet;

/// Static instance of the Rust writer for the registry.
pub static RUST_WRITER: RustWriter = RustWriter;

pub struct RustWriter;

impl Writer for RustWriter {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn extension(&self) -> &'static str {
        "rs"
    }

    fn write_with_config(
        &self,
        module: &Module,
        config: &TranslateConfig,
    ) -> Result<String, GenerationError> {
        validate(module)?;
        let module = infer_return_types(module);
        Ok(Emitter::new(&module, &config.rust).emit())
    }
}

const ERROR_TYPE: &str = "Box<dyn std::error::Error>";

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "const", "crate", "dyn", "enum", "extern", "fn", "impl",
    "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "static", "struct", "super",
    "trait", "type", "unsafe", "use", "where", "yield",
];

fn rust_type(ty: &Type) -> String {
    from_canonical(Language::Rust, ty)
}

/// A string literal usable as a `format!` template.
fn template(text: &str) -> String {
    escape_string(text).replace('{', "{{").replace('}', "}}")
}

#[derive(Debug, Clone, Copy, Default)]
struct Frame {
    fallible: bool,
    is_async: bool,
    /// Inside the closure a `try` block lowers to.
    in_closure: bool,
    /// The function returns a tuple, written as an array in the IR.
    tuple_result: bool,
}

struct Emitter<'m> {
    module: &'m Module,
    config: &'m RustConfig,
    code: Code,
    scope: Scope<'m>,
    class: Option<&'m Class>,
    mutated: HashSet<String>,
    frame: Frame,
    /// Name `self` renders as; constructors build `this` before returning it.
    self_alias: Option<&'static str>,
}

impl<'m> Emitter<'m> {
    fn new(module: &'m Module, config: &'m RustConfig) -> Self {
        Self {
            module,
            config,
            code: Code::new(" ".repeat(config.indent)),
            scope: Scope::new(module),
            class: None,
            mutated: HashSet::new(),
            frame: Frame::default(),
            self_alias: None,
        }
    }

    fn emit(mut self) -> String {
        let module = self.module;
        self.code.line(format!("//! {}", module.name));
        self.code.blank();

        let uses_map = module_uses_type(module, |t| t.is_map())
            || module_uses_expr(module, |e| {
                matches!(e, Expr::Map(_))
                    || matches!(e, Expr::Comprehension(c) if c.kind == ComprehensionKind::Dict)
            });
        let uses_set = module_uses_expr(
            module,
            |e| matches!(e, Expr::Comprehension(c) if c.kind == ComprehensionKind::Set),
        );
        let uses_any = module_uses_type(module, |t| t.name == "any");
        let mut uses = Vec::new();
        if uses_any {
            uses.push("use std::any::Any;".to_string());
        }
        match (uses_map, uses_set) {
            (true, true) => uses.push("use std::collections::{HashMap, HashSet};".to_string()),
            (true, false) => uses.push("use std::collections::HashMap;".to_string()),
            (false, true) => uses.push("use std::collections::HashSet;".to_string()),
            (false, false) => {}
        }
        if !uses.is_empty() {
            for line in uses {
                self.code.line(line);
            }
            self.code.blank();
        }

        for var in &module.constants {
            self.module_var(var);
        }
        for en in &module.enums {
            self.code.blank();
            self.enumeration(en);
        }
        for def in &module.types {
            self.code.blank();
            self.doc(&def.doc);
            self.derives(&[]);
            self.struct_type(&def.name, &def.fields);
        }
        for class in &module.classes {
            self.code.blank();
            self.class(class);
        }
        for function in &module.functions {
            self.code.blank();
            self.function(function, None);
        }
        self.code.finish()
    }

    fn doc(&mut self, doc: &Option<String>) {
        if let Some(doc) = doc {
            for line in doc.lines() {
                self.code.line(format!("/// {}", line.trim()).trim_end());
            }
        }
    }

    fn derives(&mut self, extra: &[&str]) {
        let mut derives: Vec<&str> = self.config.derives.iter().map(String::as_str).collect();
        for name in extra {
            if !derives.contains(name) {
                derives.push(name);
            }
        }
        if !derives.is_empty() {
            self.code.line(format!("#[derive({})]", derives.join(", ")));
        }
    }

    fn name(&self, name: &str) -> String {
        if name == "self" || keeps_case(name) {
            return name.to_string();
        }
        let snake = naming::to_snake_case(name);
        if KEYWORDS.contains(&snake.as_str()) {
            format!("r#{snake}")
        } else {
            snake
        }
    }

    fn find_class(&self, name: &str) -> Option<&'m Class> {
        self.module.classes.iter().find(|c| c.name == name)
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn module_var(&mut self, var: &ModuleVar) {
        let ty = var
            .ty
            .clone()
            .or_else(|| infer_type(&var.value))
            .unwrap_or_else(Type::any);
        let name = naming::to_screaming_snake_case(&var.name);
        match &var.value {
            Expr::Literal(Literal::String(s)) => {
                self.code.line(format!("pub const {name}: &str = {};", quoted(s)));
            }
            Expr::Literal(lit) if var.is_constant => {
                let ty = rust_type(&ty);
                self.code.line(format!("pub const {name}: {ty} = {};", literal(lit)));
            }
            other => {
                let value = self.owned(other);
                let ty = rust_type(&ty);
                self.code.line(format!(
                    "pub static {name}: std::sync::LazyLock<{ty}> = std::sync::LazyLock::new(|| {value});"
                ));
            }
        }
    }

    fn enumeration(&mut self, en: &Enum) {
        let values = enum_literals(en);
        let counts_from_zero = values
            .iter()
            .enumerate()
            .all(|(i, v)| *v == Literal::Int(i as i64));
        let has_payload = en.variants.iter().any(|v| v.associated.is_some());
        let extra: &[&str] = if has_payload {
            &[]
        } else {
            &["Copy", "PartialEq"]
        };
        self.derives(extra);
        self.code.line(format!("pub enum {} {{", en.name));
        self.code.indent();
        for (variant, value) in en.variants.iter().zip(&values) {
            let name = naming::to_pascal_case(&variant.name);
            let line = match (&variant.associated, value) {
                (Some(ty), _) => format!("{name}({}),", rust_type(ty)),
                (None, Literal::Int(n)) if !counts_from_zero && !has_payload => {
                    format!("{name} = {n},")
                }
                _ => format!("{name},"),
            };
            self.code.line(line);
        }
        self.code.dedent();
        self.code.line("}");
    }

    fn struct_type(&mut self, name: &str, fields: &[Property]) {
        if fields.is_empty() {
            self.code.line(format!("pub struct {name};"));
            return;
        }
        self.code.line(format!("pub struct {name} {{"));
        self.code.indent();
        for field in fields {
            let line = format!("pub {}: {},", self.name(&field.name), rust_type(&field.ty));
            self.code.line(line);
        }
        self.code.dedent();
        self.code.line("}");
    }

    fn class(&mut self, class: &'m Class) {
        self.doc(&class.doc);
        let extra: &[&str] = if class.constructor.is_none() {
            &["Default"]
        } else {
            &[]
        };
        self.derives(extra);
        self.struct_type(&class.name, &class.properties);
        if class.constructor.is_none() && class.methods.is_empty() {
            return;
        }
        self.code.blank();
        self.code.line(format!("impl {} {{", class.name));
        self.code.indent();
        let mut first = true;
        if let Some(ctor) = &class.constructor {
            self.constructor(class, ctor);
            first = false;
        }
        for method in &class.methods {
            if !first {
                self.code.blank();
            }
            first = false;
            self.function(method, Some(class));
        }
        self.code.dedent();
        self.code.line("}");
    }

    fn enter(&mut self, function: &'m Function, class: Option<&'m Class>) {
        self.scope = Scope::for_function(self.module, class.map(|c| c.name.as_str()), function);
        self.class = class;
        self.mutated = mutated_names(&function.body);
        self.frame = Frame {
            fallible: function.is_fallible(),
            is_async: function.is_async,
            in_closure: false,
            tuple_result: function.return_type.as_ref().is_some_and(Type::is_tuple),
        };
    }

    fn params(&self, function: &Function) -> Vec<String> {
        function
            .params
            .iter()
            .map(|p| {
                let ty = if p.is_variadic {
                    Type::array(p.ty.clone())
                } else {
                    p.ty.clone()
                };
                let prefix = if self.mutated.contains(&p.name) { "mut " } else { "" };
                format!("{prefix}{}: {}", self.name(&p.name), rust_type(&ty))
            })
            .collect()
    }

    fn result_type(function: &Function) -> Option<String> {
        let value = function.return_type.as_ref().map(rust_type);
        match (value, function.is_fallible()) {
            (Some(v), true) => Some(format!("Result<{v}, {ERROR_TYPE}>")),
            (None, true) => Some(format!("Result<(), {ERROR_TYPE}>")),
            (Some(v), false) => Some(v),
            (None, false) => None,
        }
    }

    fn function(&mut self, function: &'m Function, class: Option<&'m Class>) {
        self.enter(function, class);
        self.doc(&function.doc);
        let mut params = self.params(function);
        if class.is_some() && !function.is_static {
            let receiver = if self.mutated.contains("self") {
                "&mut self"
            } else {
                "&self"
            };
            params.insert(0, receiver.to_string());
        }
        let visibility = if function.name == "main" && class.is_none() {
            ""
        } else {
            "pub "
        };
        let asyncness = if function.is_async { "async " } else { "" };
        let result = Self::result_type(function)
            .map(|r| format!(" -> {r}"))
            .unwrap_or_default();
        self.code.line(format!(
            "{visibility}{asyncness}fn {}({}){result} {{",
            self.name(&function.name),
            params.join(", ")
        ));
        self.code.indent();
        self.body_with_tail(&function.body);
        self.code.dedent();
        self.code.line("}");
        self.class = None;
    }

    /// A function body whose final `return` becomes the tail expression.
    fn body_with_tail(&mut self, body: &[Stmt]) {
        match body.split_last() {
            Some((Stmt::Return(value), rest)) => {
                self.stmts(rest);
                let tail = match value {
                    Some(v) => self.returned(v),
                    None => "()".to_string(),
                };
                if self.frame.fallible {
                    self.code.line(format!("Ok({tail})"));
                } else if value.is_some() {
                    self.code.line(tail);
                }
            }
            _ => {
                self.stmts(body);
                if self.frame.fallible && !body.last().is_some_and(Stmt::is_terminal) {
                    self.code.line("Ok(())");
                }
            }
        }
    }

    /// `pub fn new(..) -> Self`.
    ///
    /// A body that only assigns fields becomes a single struct expression.
    fn constructor(&mut self, class: &'m Class, ctor: &'m Function) {
        self.enter(ctor, Some(class));
        self.doc(&ctor.doc);
        let result = if ctor.is_fallible() {
            format!("Result<Self, {ERROR_TYPE}>")
        } else {
            "Self".to_string()
        };
        self.code.line(format!(
            "pub fn new({}) -> {result} {{",
            self.params(ctor).join(", ")
        ));
        self.code.indent();

        let field_inits: Option<Vec<(&str, &Expr)>> = ctor
            .body
            .iter()
            .map(|stmt| match stmt {
                Stmt::Assign {
                    target: Expr::Member { object, property },
                    value,
                    is_declaration: false,
                    ..
                } if object.as_ident() == Some("self")
                    && class.properties.iter().any(|p| p.name == *property) =>
                {
                    Some((property.as_str(), value))
                }
                _ => None,
            })
            .collect();

        let wrap = |text: String| {
            if ctor.is_fallible() {
                format!("Ok({text})")
            } else {
                text
            }
        };
        match field_inits {
            Some(inits) => {
                let fields = self.field_values(class, &inits);
                let tail = wrap(format!("Self {{ {fields} }}"));
                self.code.line(tail);
            }
            None => {
                let fields = self.field_values(class, &[]);
                self.code
                    .line(format!("let mut this = Self {{ {fields} }};"));
                self.self_alias = Some("this");
                self.stmts(&ctor.body);
                self.self_alias = None;
                let tail = wrap("this".to_string());
                self.code.line(tail);
            }
        }
        self.code.dedent();
        self.code.line("}");
        self.class = None;
    }

    /// `a: v, b: Default::default()` covering every property.
    fn field_values(&mut self, class: &Class, inits: &[(&str, &Expr)]) -> String {
        class
            .properties
            .iter()
            .map(|p| {
                let name = self.name(&p.name);
                let value = match inits.iter().rev().find(|(n, _)| *n == p.name) {
                    Some((_, value)) => self.owned(value),
                    None => match &p.default {
                        Some(default) => self.owned(default),
                        None => "Default::default()".to_string(),
                    },
                };
                if value == name {
                    name
                } else {
                    format!("{name}: {value}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn stmts(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        self.code.indent();
        self.stmts(body);
        self.code.dedent();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => {
                let text = self.expr(e);
                self.code.line(format!("{text};"));
            }
            Stmt::Return(value) => {
                let line = match (value, self.frame.fallible, self.frame.in_closure) {
                    (_, _, true) => "return Ok(());".to_string(),
                    (Some(v), true, false) => format!("return Ok({});", self.returned(v)),
                    (Some(v), false, false) => format!("return {};", self.returned(v)),
                    (None, true, false) => "return Ok(());".to_string(),
                    (None, false, false) => "return;".to_string(),
                };
                self.code.line(line);
            }
            Stmt::Assign {
                target,
                value,
                is_declaration,
                ty,
            } => self.assign(target, value, *is_declaration, ty.as_ref()),
            Stmt::If {
                condition,
                then_body,
                else_body,
            } => {
                let condition = self.condition(condition);
                self.code.line(format!("if {condition} {{"));
                self.else_chain(then_body, else_body);
            }
            Stmt::For {
                iterator,
                iterable,
                body,
            } => {
                let header = self.for_header(iterator, iterable);
                self.code.line(header);
                self.block(body);
                self.code.line("}");
            }
            Stmt::While { condition, body } => {
                let condition = self.condition(condition);
                if condition == "true" {
                    self.code.line("loop {");
                } else {
                    self.code.line(format!("while {condition} {{"));
                }
                self.block(body);
                self.code.line("}");
            }
            Stmt::Try {
                body,
                catches,
                finally,
            } => self.try_stmt(body, catches, finally),
            Stmt::Throw(value) => self.throw(value),
            Stmt::Break => self.code.line("break;"),
            Stmt::Continue => self.code.line("continue;"),
            Stmt::Spawn(work) => {
                let line = if self.frame.is_async {
                    format!("tokio::spawn({});", self.expr(work))
                } else {
                    format!("std::thread::spawn(move || {});", self.expr(work))
                };
                self.code.line(line);
            }
            Stmt::Unhandled(source) => self.code.line(format!("// {}", placeholder(source))),
        }
    }

    /// An expression in `if`/`while` position, without outer parentheses.
    fn condition(&mut self, expr: &Expr) -> String {
        let text = self.expr(expr);
        match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            Some(inner) if matches!(expr, Expr::Binary { .. }) && balanced(inner) => {
                inner.to_string()
            }
            _ => text,
        }
    }

    fn else_chain(&mut self, then_body: &[Stmt], else_body: &[Stmt]) {
        self.block(then_body);
        match else_body {
            [] => self.code.line("}"),
            [
                Stmt::If {
                    condition,
                    then_body,
                    else_body,
                },
            ] => {
                let condition = self.condition(condition);
                self.code.line(format!("}} else if {condition} {{"));
                self.else_chain(then_body, else_body);
            }
            _ => {
                self.code.line("} else {");
                self.block(else_body);
                self.code.line("}");
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr, is_declaration: bool, ty: Option<&Type>) {
        if is_declaration {
            let (pattern, name) = match target {
                Expr::Ident(name) => (self.name(name), Some(name.as_str())),
                Expr::Array(items) => {
                    let names: Vec<String> = items.iter().map(|i| self.expr(i)).collect();
                    (format!("({})", names.join(", ")), None)
                }
                other => (self.expr(other), None),
            };
            let mutability = match name {
                Some(name) if self.mutated.contains(name) => "mut ",
                _ => "",
            };
            if value.is_null() {
                let ty = ty.cloned().unwrap_or_else(Type::any).optional();
                self.code.line(format!(
                    "let {mutability}{pattern}: {} = None;",
                    rust_type(&ty)
                ));
                return;
            }
            let annotation = match (ty, value) {
                (Some(_), Expr::Comprehension(_)) => String::new(),
                (Some(ty), _) if infer_type(value).is_none_or(|t| t != *ty) => {
                    format!(": {}", rust_type(ty))
                }
                _ => String::new(),
            };
            let rhs = self.owned(value);
            self.code
                .line(format!("let {mutability}{pattern}{annotation} = {rhs};"));
            return;
        }
        if let Some((op, rhs)) = compound_parts(target, value) {
            let rhs = self.expr(rhs);
            let lhs = self.place(target);
            self.code.line(format!("{lhs} {}= {rhs};", op.c_symbol()));
            return;
        }
        let rhs = self.owned(value);
        let lhs = self.place(target);
        self.code.line(format!("{lhs} = {rhs};"));
    }

    /// An assignment target; map entries are written through `insert`.
    fn place(&mut self, target: &Expr) -> String {
        match target {
            Expr::Index { object, index } => {
                let object_text = self.expr(object);
                let index_text = self.index(object, index);
                format!("{object_text}[{index_text}]")
            }
            other => self.expr(other),
        }
    }

    fn index(&mut self, object: &Expr, index: &Expr) -> String {
        if self.scope.is_map(object) {
            return format!("&{}", self.expr(index));
        }
        match index {
            Expr::Literal(Literal::Int(_)) => self.expr(index),
            other => format!("{} as usize", self.expr(other)),
        }
    }

    /// `x`, or `(k, v)` for pair iteration.
    fn iteration_pattern(&self, iterator: &str) -> String {
        match iterator.split(',').map(str::trim).collect::<Vec<_>>().as_slice() {
            [single] => self.name(single),
            names => format!(
                "({})",
                names.iter().map(|n| self.name(n)).collect::<Vec<_>>().join(", ")
            ),
        }
    }

    fn for_header(&mut self, iterator: &str, iterable: &Expr) -> String {
        let pattern = self.iteration_pattern(iterator);
        if let Some((start, end)) = as_range(iterable) {
            let start = self.expr(&start);
            let end = self.expr(end);
            return format!("for {pattern} in {start}..{end} {{");
        }
        let source = self.expr(pair_source(iterable));
        format!("for {pattern} in {source}.clone() {{")
    }

    /// try/catch/finally as a `Result`-returning closure.
    fn try_stmt(&mut self, body: &[Stmt], catches: &[CatchBlock], finally: &[Stmt]) {
        let outer = self.frame;
        self.frame.fallible = true;
        self.frame.in_closure = true;
        self.code
            .line(format!("let outcome: Result<(), {ERROR_TYPE}> = (|| {{"));
        self.block(body);
        self.code.indent();
        self.code.line("Ok(())");
        self.code.dedent();
        self.code.line("})();");
        self.frame = outer;

        if let Some(catch) = catches.first() {
            let binding = catch
                .binding
                .as_deref()
                .map(|b| self.name(b))
                .unwrap_or_else(|| "_".to_string());
            self.code.line(format!("if let Err({binding}) = outcome {{"));
            self.block(&catch.body);
            self.code.line("}");
        }
        self.stmts(finally);
    }

    fn throw(&mut self, value: &Expr) {
        let line = match thrown_parts(value) {
            Some((kind, message)) => {
                let message = message.cloned().unwrap_or_else(|| Expr::string(kind));
                if self.frame.fallible {
                    format!("return Err({}.into());", self.expr(&message))
                } else {
                    format!("panic!({});", self.format_args(&message))
                }
            }
            None if self.frame.fallible => format!("return Err({}.into());", self.expr(value)),
            None => format!("panic!({});", self.format_args(value)),
        };
        self.code.line(line);
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Expression in a position that takes ownership: string literals
    /// become `String`s.
    fn owned(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(Literal::String(s)) => format!("{}.to_string()", quoted(s)),
            other => self.expr(other),
        }
    }

    fn returned(&mut self, value: &Expr) -> String {
        match value {
            Expr::Array(items) if self.frame.tuple_result => {
                let items: Vec<String> = items.iter().map(|i| self.owned(i)).collect();
                format!("({})", items.join(", "))
            }
            other => self.owned(other),
        }
    }

    /// `"template", args` for the formatting macros.
    fn format_args(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(Literal::String(s)) => format!("\"{}\"", template(s)),
            Expr::FormatString(parts) => {
                let mut text = String::new();
                let mut args = String::new();
                for part in parts {
                    match part {
                        FormatPart::Text(t) => text.push_str(&template(t)),
                        FormatPart::Expr(e) => {
                            text.push_str(self.placeholder_for(e));
                            args.push_str(", ");
                            args.push_str(&self.expr(e));
                        }
                    }
                }
                format!("\"{text}\"{args}")
            }
            other => {
                let slot = self.placeholder_for(other);
                format!("\"{slot}\", {}", self.expr(other))
            }
        }
    }

    /// `{:?}` for collections, `{}` for everything else.
    fn placeholder_for(&self, expr: &Expr) -> &'static str {
        match self.scope.type_of(expr) {
            Some(t) if t.is_array() || t.is_map() || t.is_tuple() || t.is_optional => "{:?}",
            _ => "{}",
        }
    }

    /// Whether calling `callee` yields a `Result`.
    fn is_fallible_call(&self, callee: &Expr) -> bool {
        match callee {
            Expr::Ident(name) if self.scope.local(name).is_none() => {
                if let Some(function) = self.module.function(name) {
                    return function.is_fallible();
                }
                self.find_class(name)
                    .and_then(|c| c.constructor.as_ref())
                    .is_some_and(Function::is_fallible)
            }
            Expr::Member { object, property } => {
                let owner = match object.as_ref() {
                    Expr::Ident(n) if n == "self" => self.class.map(|c| c.name.clone()),
                    Expr::Ident(n) if self.find_class(n).is_some() => Some(n.clone()),
                    other => self.scope.type_of(other).map(|t| t.name),
                };
                let module = self.module;
                let candidates: Vec<&Function> = match owner.and_then(|o| self.find_class(&o)) {
                    Some(class) => class.methods.iter().filter(|m| m.name == *property).collect(),
                    None => module
                        .classes
                        .iter()
                        .flat_map(|c| &c.methods)
                        .filter(|m| m.name == *property)
                        .collect(),
                };
                !candidates.is_empty() && candidates.iter().all(|m| m.is_fallible())
            }
            _ => false,
        }
    }

    fn args(&mut self, args: &[Expr], kwargs: &[(String, Expr)]) -> String {
        args.iter()
            .chain(kwargs.iter().map(|(_, v)| v))
            .map(|a| self.owned(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn call(&mut self, callee: &Expr, args: &[Expr], kwargs: &[(String, Expr)]) -> String {
        if let Some(text) = self.builtin_call(callee, args) {
            return text;
        }
        let text = match callee {
            Expr::Ident(name) if self.scope.local(name).is_none() => {
                if let Some(class) = self.find_class(name) {
                    match &class.constructor {
                        Some(_) => format!("{name}::new({})", self.args(args, kwargs)),
                        None => format!("{name}::default()"),
                    }
                } else if self.module.types.iter().any(|t| t.name == *name) {
                    let fields: Vec<FieldInit> =
                        args.iter().cloned().map(FieldInit::positional).collect();
                    self.struct_literal(name, &fields)
                } else {
                    format!("{}({})", self.name(name), self.args(args, kwargs))
                }
            }
            Expr::Member { object, property } => match object.as_ref() {
                Expr::Ident(owner)
                    if self.scope.local(owner).is_none() && keeps_case(owner) && owner != "self" =>
                {
                    format!("{owner}::{}({})", self.name(property), self.args(args, kwargs))
                }
                _ => {
                    let object = self.expr(object);
                    format!(
                        "{object}.{}({})",
                        self.name(property),
                        self.args(args, kwargs)
                    )
                }
            },
            other => {
                let callee = self.expr(other);
                format!("({callee})({})", self.args(args, kwargs))
            }
        };
        if !self.is_fallible_call(callee) {
            return text;
        }
        if self.frame.fallible {
            format!("{text}?")
        } else {
            format!("{text}.unwrap()")
        }
    }

    fn builtin_call(&mut self, callee: &Expr, args: &[Expr]) -> Option<String> {
        match callee {
            Expr::Ident(name)
                if self.scope.local(name).is_none() && self.module.function(name).is_none() =>
            {
                match (name.as_str(), args) {
                    ("print", []) => Some("println!()".to_string()),
                    ("print", [single]) => Some(format!("println!({})", self.format_args(single))),
                    ("print", many) => {
                        let parts: Vec<FormatPart> = many
                            .iter()
                            .enumerate()
                            .flat_map(|(i, a)| {
                                let sep = (i > 0).then(|| FormatPart::Text(" ".into()));
                                sep.into_iter().chain([FormatPart::Expr(a.clone())])
                            })
                            .collect();
                        let args = self.format_args(&Expr::FormatString(parts));
                        Some(format!("println!({args})"))
                    }
                    ("len", [arg]) => Some(format!("({}.len() as i64)", self.expr(arg))),
                    ("range", [_] | [_, _]) => {
                        let range = Expr::call(callee.clone(), args.to_vec());
                        let (start, end) = as_range(&range)?;
                        let start = self.expr(&start);
                        let end = self.expr(end);
                        Some(format!("({start}..{end}).collect::<Vec<_>>()"))
                    }
                    (kind, _) if is_error_kind(kind) => {
                        let message = args.first().cloned().unwrap_or_else(|| Expr::string(kind));
                        Some(self.expr(&message))
                    }
                    _ => None,
                }
            }
            Expr::Member { object, property } => match (property.as_str(), args) {
                ("append", [value]) => {
                    let object = self.expr(object);
                    let value = self.owned(value);
                    Some(format!("{object}.push({value})"))
                }
                ("items", []) => Some(format!("{}.iter()", self.expr(object))),
                ("keys" | "values", []) if self.scope.is_map(object) => {
                    Some(format!("{}.{property}()", self.expr(object)))
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn struct_literal(&mut self, type_name: &str, fields: &[FieldInit]) -> String {
        if is_error_kind(type_name) {
            let message = fields
                .first()
                .map(|f| f.value.clone())
                .unwrap_or_else(|| Expr::string(type_name));
            return self.expr(&message);
        }
        if let Some(args) = constructor_args(self.module, type_name, fields) {
            return self.call(&Expr::ident(type_name), &args, &[]);
        }
        let module = self.module;
        let properties: Vec<String> = self
            .find_class(type_name)
            .map(|c| c.properties.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default();
        let parts: Vec<String> = struct_fields(module, type_name, fields)
            .into_iter()
            .enumerate()
            .map(|(i, (name, value))| {
                let name = name
                    .or_else(|| properties.get(i).cloned())
                    .map(|n| self.name(&n))
                    .unwrap_or_else(|| format!("field{i}"));
                let value = self.owned(value);
                if value == name {
                    name
                } else {
                    format!("{name}: {value}")
                }
            })
            .collect();
        if let Some(class) = self.find_class(type_name)
            && class.constructor.is_none()
            && parts.len() < class.properties.len()
        {
            return format!("{type_name} {{ {}, ..Default::default() }}", parts.join(", "));
        }
        format!("{type_name} {{ {} }}", parts.join(", "))
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(lit) => literal(lit),
            Expr::Ident(name) => {
                if name == "self"
                    && let Some(alias) = self.self_alias
                {
                    return alias.to_string();
                }
                match self.module.constants.iter().find(|c| c.name == *name) {
                    Some(var) if self.scope.local(name).is_none() => {
                        let constant = naming::to_screaming_snake_case(&var.name);
                        if matches!(var.value, Expr::Literal(_)) {
                            constant
                        } else {
                            format!("(*{constant})")
                        }
                    }
                    _ => self.name(name),
                }
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Unary { op, operand } => {
                let operand = self.expr(operand);
                match op {
                    UnaryOp::Not | UnaryOp::BitNot => format!("!{operand}"),
                    UnaryOp::Neg => format!("-{operand}"),
                }
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => self.call(callee, args, kwargs),
            Expr::Member { object, property } => {
                if let Some((en, variant)) = enum_variant(self.module, expr) {
                    return format!("{}::{}", en.name, naming::to_pascal_case(&variant.name));
                }
                let object = self.expr(object);
                format!("{object}.{}", self.name(property))
            }
            Expr::Index { object, index } => {
                let object_text = self.expr(object);
                let index_text = self.index(object, index);
                format!("{object_text}[{index_text}]")
            }
            Expr::Array(items) => {
                let items: Vec<String> = items.iter().map(|i| self.owned(i)).collect();
                format!("vec![{}]", items.join(", "))
            }
            Expr::Map(entries) if entries.is_empty() => "HashMap::new()".to_string(),
            Expr::Map(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("({}, {})", self.owned(k), self.owned(v)))
                    .collect();
                format!("HashMap::from([{}])", entries.join(", "))
            }
            Expr::StructLiteral { type_name, fields } => self.struct_literal(type_name, fields),
            Expr::Comprehension(c) => self.comprehension(c),
            Expr::Lambda { params, body } => self.lambda(params, body),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.condition(condition);
                let then = self.owned(then);
                let otherwise = self.owned(otherwise);
                format!("if {condition} {{ {then} }} else {{ {otherwise} }}")
            }
            Expr::Await(inner) => format!("{}.await", self.expr(inner)),
            Expr::FormatString(_) => format!("format!({})", self.format_args(expr)),
            Expr::Unhandled(source) => format!("todo!() /* {} */", placeholder(source)),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> String {
        match op {
            BinaryOp::In => {
                let haystack = self.expr(right);
                let needle = self.expr(left);
                if self.scope.is_map(right) {
                    format!("{haystack}.contains_key(&{needle})")
                } else if self.scope.is_string(right) {
                    format!("{haystack}.contains({needle}.as_str())")
                } else {
                    format!("{haystack}.contains(&{needle})")
                }
            }
            BinaryOp::Pow => {
                let is_float = self.scope.type_of(left).is_some_and(|t| t.name == "float");
                let base = self.expr(left);
                let exp = self.expr(right);
                if is_float {
                    format!("{base}.powf({exp})")
                } else {
                    format!("{base}.pow({exp} as u32)")
                }
            }
            BinaryOp::FloorDiv => {
                let is_float = self.scope.type_of(left).is_some_and(|t| t.name == "float");
                let l = self.expr(left);
                let r = self.expr(right);
                if is_float {
                    format!("({l} / {r}).floor()")
                } else {
                    format!("({l} / {r})")
                }
            }
            BinaryOp::Add if self.scope.is_string(left) => {
                let l = self.expr(left);
                let r = self.expr(right);
                format!("format!(\"{{}}{{}}\", {l}, {r})")
            }
            _ => {
                let l = self.expr(left);
                let r = self.expr(right);
                format!("({l} {} {r})", op.c_symbol())
            }
        }
    }

    /// `xs.iter().filter(..).map(..).collect::<Vec<_>>()`.
    fn comprehension(&mut self, c: &Comprehension) -> String {
        let mut inner = self.scope.clone();
        for (name, ty) in self.scope.iteration_bindings(&c.iterator, &c.iterable) {
            inner.bind(&name, ty);
        }
        let outer = std::mem::replace(&mut self.scope, inner);

        let var = self.iteration_pattern(&c.iterator);
        let source = match as_range(&c.iterable) {
            Some((start, end)) => {
                let start = self.expr(&start);
                let end = self.expr(end);
                format!("({start}..{end}).into_iter()")
            }
            None => format!("{}.iter()", self.expr(pair_source(&c.iterable))),
        };
        let mut chain = source;
        if let Some(condition) = &c.condition {
            let condition = self.expr(condition);
            chain.push_str(&format!(".filter(|{var}| {condition})"));
        }
        let target = self.owned(&c.target);
        match (c.kind, &c.value) {
            (ComprehensionKind::Dict, Some(value)) => {
                let value = self.owned(value);
                chain.push_str(&format!(".map(|{var}| ({target}, {value}))"));
            }
            _ if c.is_identity_map() => {
                chain.push_str(&format!(".map(|{var}| {var}.clone())"));
            }
            _ => chain.push_str(&format!(".map(|{var}| {target})")),
        }
        match c.kind {
            ComprehensionKind::List => chain.push_str(".collect::<Vec<_>>()"),
            ComprehensionKind::Set => chain.push_str(".collect::<HashSet<_>>()"),
            ComprehensionKind::Dict => chain.push_str(".collect::<HashMap<_, _>>()"),
            ComprehensionKind::Generator => {}
        }

        self.scope = outer;
        chain
    }

    fn lambda(&mut self, params: &[String], body: &LambdaBody) -> String {
        let params = params
            .iter()
            .map(|p| self.name(p))
            .collect::<Vec<_>>()
            .join(", ");
        match body {
            LambdaBody::Expr(e) => format!("|{params}| {}", self.expr(e)),
            LambdaBody::Block(stmts) => {
                let outer_frame = std::mem::take(&mut self.frame);
                let prefix = self.code.prefix();
                let unit = " ".repeat(self.config.indent);
                let outer = std::mem::replace(&mut self.code, Code::new(unit.clone()));
                self.body_with_tail(stmts);
                let inner = std::mem::replace(&mut self.code, outer).finish();
                self.frame = outer_frame;
                let mut out = format!("|{params}| {{\n");
                for line in inner.lines().filter(|l| !l.is_empty()) {
                    out.push_str(&format!("{prefix}{unit}{line}\n"));
                }
                out.push_str(&prefix);
                out.push('}');
                out
            }
        }
    }
}

/// Whether every parenthesis in `text` is closed within it.
fn balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "None".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(n) => n.to_string(),
        Literal::Float(f) => format_float(*f),
        Literal::String(s) => quoted(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::error_tuple::error_value;

    fn write(module: &Module) -> String {
        RUST_WRITER.write(module).unwrap()
    }

    #[test]
    fn test_result_and_question_mark() {
        let mut module = Module::new("parser");
        module.functions.push(
            Function::new(
                "parse",
                vec![Param::new("s", Type::string())],
                vec![
                    Stmt::if_stmt(
                        Expr::binary(
                            Expr::call(Expr::ident("len"), vec![Expr::ident("s")]),
                            BinaryOp::Eq,
                            Expr::int(0),
                        ),
                        vec![Stmt::Throw(error_value("Error", Expr::string("empty")))],
                        vec![],
                    ),
                    Stmt::return_stmt(Some(Expr::int(1))),
                ],
            )
            .returning(Type::int())
            .throwing("error"),
        );
        module.functions.push(
            Function::new(
                "run",
                vec![],
                vec![Stmt::declare(
                    "n",
                    Expr::call(Expr::ident("parse"), vec![Expr::string("x")]),
                )],
            )
            .throwing("error"),
        );
        let out = write(&module);
        assert!(out.starts_with("//! parser\n"));
        assert!(out.contains(
            "pub fn parse(s: String) -> Result<i64, Box<dyn std::error::Error>> {"
        ));
        assert!(out.contains("    if (s.len() as i64) == 0 {\n        return Err(\"empty\".into());\n    }\n    Ok(1)\n}"));
        assert!(out.contains("let n = parse(\"x\".to_string())?;\n    Ok(())\n}"));
    }

    #[test]
    fn test_struct_and_literal() {
        let mut module = Module::new("users");
        module.types.push(TypeDefinition::new(
            "User",
            vec![
                Property::new("name", Type::string()),
                Property::new("age", Type::int()),
            ],
        ));
        module.functions.push(
            Function::new(
                "make",
                vec![],
                vec![Stmt::return_stmt(Some(Expr::StructLiteral {
                    type_name: "User".into(),
                    fields: vec![
                        FieldInit::named("name", Expr::string("Alice")),
                        FieldInit::named("age", Expr::int(30)),
                    ],
                }))],
            )
            .returning(Type::new("User")),
        );
        let out = write(&module);
        assert!(out.contains(
            "#[derive(Debug, Clone)]\npub struct User {\n    pub name: String,\n    pub age: i64,\n}"
        ));
        assert!(out.contains("pub fn make() -> User {\n    User { name: \"Alice\".to_string(), age: 30 }\n}"));
    }

    #[test]
    fn test_comprehension_chain() {
        let mut module = Module::new("m");
        module.functions.push(
            Function::new(
                "double_positive",
                vec![Param::new("items", Type::array(Type::int()))],
                vec![Stmt::return_stmt(Some(Expr::comprehension(Comprehension {
                    kind: ComprehensionKind::List,
                    target: Expr::binary(Expr::ident("x"), BinaryOp::Mul, Expr::int(2)),
                    value: None,
                    iterator: "x".into(),
                    iterable: Expr::ident("items"),
                    condition: Some(Expr::binary(Expr::ident("x"), BinaryOp::Gt, Expr::int(0))),
                })))],
            )
            .returning(Type::array(Type::int())),
        );
        let out = write(&module);
        assert!(out.contains(
            "items.iter().filter(|x| (x > 0)).map(|x| (x * 2)).collect::<Vec<_>>()"
        ));
        assert!(!out.contains("HashMap"));
    }

    #[test]
    fn test_class_with_constructor_and_async() {
        let mut module = Module::new("counter");
        let mut class = Class::new("Counter");
        class.properties.push(Property::new("count", Type::int()));
        class.constructor = Some(Function::new(
            CONSTRUCTOR_NAME,
            vec![Param::new("start", Type::int())],
            vec![Stmt::assign(
                Expr::member(Expr::ident("self"), "count"),
                Expr::ident("start"),
            )],
        ));
        class.methods.push(Function::new(
            "tick",
            vec![],
            vec![Stmt::assign(
                Expr::member(Expr::ident("self"), "count"),
                Expr::binary(
                    Expr::member(Expr::ident("self"), "count"),
                    BinaryOp::Add,
                    Expr::int(1),
                ),
            )],
        ));
        module.classes.push(class);
        module.functions.push(
            Function::new(
                "fetch",
                vec![],
                vec![Stmt::expr(Expr::await_expr(Expr::call(
                    Expr::ident("load"),
                    vec![],
                )))],
            )
            .asynchronous(),
        );
        let out = write(&module);
        assert!(out.contains("impl Counter {\n    pub fn new(start: i64) -> Self {\n        Self { count: start }\n    }"));
        assert!(out.contains("    pub fn tick(&mut self) {\n        self.count += 1;\n    }"));
        assert!(out.contains("pub async fn fetch() {\n    load().await;\n}"));
    }

    #[test]
    fn test_enum_and_map_import() {
        let mut module = Module::new("m");
        module.enums.push(Enum {
            name: "Level".into(),
            variants: vec![EnumVariant::new("low"), EnumVariant::new("high")],
        });
        module.functions.push(Function::new(
            "scores",
            vec![],
            vec![
                Stmt::declare(
                    "m",
                    Expr::Map(vec![(Expr::string("a"), Expr::int(1))]),
                ),
                Stmt::declare("lvl", Expr::member(Expr::ident("Level"), "high")),
            ],
        ));
        let out = write(&module);
        assert!(out.contains("use std::collections::HashMap;"));
        assert!(out.contains("pub enum Level {\n    Low,\n    High,\n}"));
        assert!(out.contains("let m = HashMap::from([(\"a\".to_string(), 1)]);"));
        assert!(out.contains("let lvl = Level::High;"));
    }
}
