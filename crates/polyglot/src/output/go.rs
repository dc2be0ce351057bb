//! Go writer.
//!
//! Emits a [`Module`] as a Go package. Every function with a return type
//! returns `(T, error)` and throwing void functions return `error`; calls to
//! such functions are followed by an `if err != nil` check that passes the
//! error up. Comprehensions lower to accumulation loops, and anything that
//! needs statements (error checks, loops, map lookups) is hoisted in front
//! of the statement using it.

use super::{
    Code, Scope, compound_parts, constructor_args, enum_literals, enum_variant, escape_string,
    format_float, infer_return_types, keeps_case, placeholder, quoted, struct_fields, validate,
};
use crate::config::{GoConfig, TranslateConfig};
use crate::ir::*;
use crate::naming;
use crate::patterns::as_range;
use crate::patterns::error_tuple::{is_error_kind, thrown_parts};
use crate::traits::{GenerationError, Writer};
use crate::types::{Language, from_canonical, infer_type};
use std::collections::BTreeSet;

/// Static instance of the Go writer for the registry.
pub static GO_WRITER: GoWriter = GoWriter;

pub struct GoWriter;

impl Writer for GoWriter {
    fn language(&self) -> &'static str {
        "go"
    }

    fn extension(&self) -> &'static str {
        "go"
    }

    fn write_with_config(
        &self,
        module: &Module,
        config: &TranslateConfig,
    ) -> Result<String, GenerationError> {
        validate(module)?;
        let module = infer_return_types(module);
        Ok(Emitter::new(&module, &config.go).emit())
    }
}

const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var",
];

/// How the function being emitted returns and fails.
#[derive(Debug, Clone, Default)]
struct Frame {
    /// Logical result type.
    result: Option<Type>,
    /// Zero value of the result, returned alongside an error.
    zero: Option<String>,
    returns_error: bool,
    /// Instance variable of a `NewT` constructor.
    instance: Option<String>,
    /// Errors panic instead of being returned.
    panics: bool,
    /// Returns carry no values (inside a `recover` closure).
    bare_returns: bool,
}

/// Result shape of a called function.
struct CallSig {
    value: Option<Type>,
    error: bool,
}

fn is_main(function: &Function) -> bool {
    function.name == "main" && function.params.is_empty() && function.return_type.is_none()
}

fn returns_error(function: &Function) -> bool {
    !is_main(function) && (function.return_type.is_some() || function.is_fallible())
}

fn receiver_name(class: &Class) -> String {
    class
        .name
        .chars()
        .next()
        .map(|c| c.to_lowercase().to_string())
        .unwrap_or_else(|| "x".to_string())
}

struct Emitter<'m> {
    module: &'m Module,
    config: &'m GoConfig,
    code: Code,
    imports: BTreeSet<&'static str>,
    scope: Scope<'m>,
    class: Option<&'m Class>,
    receiver: Option<String>,
    frame: Frame,
    temps: usize,
}

impl<'m> Emitter<'m> {
    fn new(module: &'m Module, config: &'m GoConfig) -> Self {
        Self {
            module,
            config,
            code: Code::new("\t"),
            imports: BTreeSet::new(),
            scope: Scope::new(module),
            class: None,
            receiver: None,
            frame: Frame::default(),
            temps: 0,
        }
    }

    fn emit(mut self) -> String {
        let module = self.module;
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
            self.struct_type(&def.name, &[], &def.fields);
        }
        for class in &module.classes {
            self.code.blank();
            self.doc(&class.doc);
            self.struct_type(&class.name, &class.bases, &class.properties);
            if let Some(ctor) = &class.constructor {
                self.code.blank();
                self.constructor(class, ctor);
            }
            for method in &class.methods {
                self.code.blank();
                self.function(method, Some(class));
            }
        }
        for function in &module.functions {
            self.code.blank();
            self.function(function, None);
        }

        let body = std::mem::replace(&mut self.code, Code::new("\t")).finish();
        let package = self
            .config
            .package
            .clone()
            .unwrap_or_else(|| naming::to_snake_case(&module.name));
        let mut out = format!("package {package}\n");
        match self.imports.len() {
            0 => {}
            1 => {
                for import in &self.imports {
                    out.push_str(&format!("\nimport \"{import}\"\n"));
                }
            }
            _ => {
                out.push_str("\nimport (\n");
                for import in &self.imports {
                    out.push_str(&format!("\t\"{import}\"\n"));
                }
                out.push_str(")\n");
            }
        }
        if !body.trim().is_empty() {
            out.push('\n');
            out.push_str(&body);
        }
        out
    }

    /// Classes are handled through pointers, as `NewT` returns them.
    fn ty(&self, ty: &Type) -> String {
        fn pointers(module: &Module, ty: &Type) -> Type {
            let mut ty = ty.clone();
            if module.classes.iter().any(|c| c.name == ty.name) {
                ty.is_optional = true;
            }
            ty.generic_args = ty.generic_args.iter().map(|t| pointers(module, t)).collect();
            ty
        }
        from_canonical(Language::Go, &pointers(self.module, ty))
    }

    fn doc(&mut self, doc: &Option<String>) {
        if let Some(doc) = doc {
            for line in doc.lines() {
                self.code.line(format!("// {}", line.trim()).trim_end());
            }
        }
    }

    fn temp(&mut self) -> String {
        self.temps += 1;
        format!("v{}", self.temps)
    }

    // ========================================================================
    // Names
    // ========================================================================

    fn func_name(function: &Function) -> String {
        if is_main(function) {
            "main".to_string()
        } else {
            naming::to_pascal_case(&function.name)
        }
    }

    fn global_name(var: &ModuleVar) -> String {
        if var.is_constant {
            naming::to_pascal_case(&var.name)
        } else {
            naming::to_camel_case(&var.name)
        }
    }

    fn ident(&self, name: &str) -> String {
        if name == "self" {
            return self.receiver.clone().unwrap_or_else(|| "self".to_string());
        }
        if self.scope.local(name).is_none() {
            if let Some(function) = self.module.function(name) {
                return Self::func_name(function);
            }
            if let Some(var) = self.module.constants.iter().find(|v| v.name == name) {
                return Self::global_name(var);
            }
        }
        if keeps_case(name) {
            return name.to_string();
        }
        let camel = naming::to_camel_case(name);
        if KEYWORDS.contains(&camel.as_str()) {
            format!("{camel}_")
        } else {
            camel
        }
    }

    fn field_name(name: &str) -> String {
        naming::to_pascal_case(name)
    }

    fn find_class(&self, name: &str) -> Option<&'m Class> {
        self.module.classes.iter().find(|c| c.name == name)
    }

    fn is_record(&self, name: &str) -> bool {
        self.module.types.iter().any(|t| t.name == name)
    }

    fn is_enum(&self, name: &str) -> Option<&'m Enum> {
        self.module.enums.iter().find(|e| e.name == name)
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn module_var(&mut self, var: &ModuleVar) {
        let name = Self::global_name(var);
        let value = self.expr_hint(&var.value, var.ty.as_ref());
        let is_const_expr = matches!(
            &var.value,
            Expr::Literal(Literal::Int(_) | Literal::Float(_) | Literal::String(_) | Literal::Bool(_))
        );
        let keyword = if var.is_constant && is_const_expr {
            "const"
        } else {
            "var"
        };
        match &var.ty {
            Some(ty) if is_const_expr && infer_type(&var.value).as_ref() != Some(ty) => {
                let ty = self.ty(ty);
                self.code.line(format!("{keyword} {name} {ty} = {value}"));
            }
            _ => self.code.line(format!("{keyword} {name} = {value}")),
        }
    }

    fn enumeration(&mut self, en: &Enum) {
        let values = enum_literals(en);
        let is_string = values.iter().any(|v| matches!(v, Literal::String(_)));
        let counts_from_zero = values
            .iter()
            .enumerate()
            .all(|(i, v)| *v == Literal::Int(i as i64));
        let base = if is_string { "string" } else { "int" };
        self.code.line(format!("type {} {base}", en.name));
        self.code.blank();
        self.code.line("const (");
        self.code.indent();
        for (i, (variant, value)) in en.variants.iter().zip(&values).enumerate() {
            let name = format!("{}{}", en.name, naming::to_pascal_case(&variant.name));
            let line = match (counts_from_zero, i) {
                (true, 0) => format!("{name} {} = iota", en.name),
                (true, _) => name,
                (false, _) => format!("{name} {} = {}", en.name, literal(value)),
            };
            self.code.line(line);
        }
        self.code.dedent();
        self.code.line(")");
    }

    fn struct_type(&mut self, name: &str, bases: &[String], fields: &[Property]) {
        self.code.line(format!("type {name} struct {{"));
        self.code.indent();
        for base in bases {
            self.code.line(base);
        }
        let rows: Vec<(String, String, String)> = fields
            .iter()
            .map(|f| {
                (
                    Self::field_name(&f.name),
                    self.ty(&f.ty),
                    format!("`json:\"{}\"`", f.name),
                )
            })
            .collect();
        let name_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(0);
        let type_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(0);
        for (field, ty, tag) in rows {
            let line = if self.config.json_tags {
                format!("{field:<name_width$} {ty:<type_width$} {tag}")
            } else {
                format!("{field:<name_width$} {ty}")
            };
            self.code.line(line.trim_end());
        }
        self.code.dedent();
        self.code.line("}");
    }

    fn enter(&mut self, function: &'m Function, class: Option<&'m Class>) {
        self.scope = Scope::for_function(self.module, class.map(|c| c.name.as_str()), function);
        self.class = class;
        self.temps = 0;
        let result = function.return_type.clone();
        self.frame = Frame {
            zero: result.as_ref().map(|t| self.result_zero(t)),
            result,
            returns_error: returns_error(function),
            ..Frame::default()
        };
    }

    fn params(&self, function: &Function) -> String {
        function
            .params
            .iter()
            .map(|p| {
                let ty = self.ty(&p.ty);
                if p.is_variadic {
                    format!("{} ...{ty}", self.ident(&p.name))
                } else {
                    format!("{} {ty}", self.ident(&p.name))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Tuples spread into one result per member.
    fn result_types(&self, ty: &Type) -> String {
        if ty.is_tuple() {
            ty.generic_args
                .iter()
                .map(|t| self.ty(t))
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            self.ty(ty)
        }
    }

    fn results(&self, function: &Function) -> String {
        match (&function.return_type, returns_error(function)) {
            (Some(ty), _) => format!(" ({}, error)", self.result_types(ty)),
            (None, true) => " error".to_string(),
            (None, false) => String::new(),
        }
    }

    fn function(&mut self, function: &'m Function, class: Option<&'m Class>) {
        self.enter(function, class);
        self.doc(&function.doc);
        self.receiver = None;
        let header = match class {
            Some(class) if !function.is_static => {
                let receiver = receiver_name(class);
                self.receiver = Some(receiver.clone());
                format!(
                    "func ({receiver} *{}) {}({}){} {{",
                    class.name,
                    naming::to_pascal_case(&function.name),
                    self.params(function),
                    self.results(function)
                )
            }
            Some(class) => format!(
                "func {}{}({}){} {{",
                class.name,
                naming::to_pascal_case(&function.name),
                self.params(function),
                self.results(function)
            ),
            None => format!(
                "func {}({}){} {{",
                Self::func_name(function),
                self.params(function),
                self.results(function)
            ),
        };
        self.code.line(header);
        self.code.indent();
        self.stmts(&function.body);
        if !function.body.last().is_some_and(Stmt::is_terminal) {
            match (&self.frame.zero, self.frame.returns_error) {
                (Some(zero), true) => {
                    let line = format!("return {zero}, nil");
                    self.code.line(line);
                }
                (None, true) => self.code.line("return nil"),
                _ => {}
            }
        }
        self.code.dedent();
        self.code.line("}");
        self.receiver = None;
    }

    /// `NewT(...) *T`, allocating the instance first.
    fn constructor(&mut self, class: &'m Class, ctor: &'m Function) {
        self.enter(ctor, Some(class));
        let instance = receiver_name(class);
        self.receiver = Some(instance.clone());
        self.frame.result = Some(Type::new(&class.name));
        self.frame.zero = Some("nil".to_string());
        self.frame.instance = Some(instance.clone());
        self.frame.returns_error = ctor.is_fallible();

        self.doc(&ctor.doc);
        let result = if ctor.is_fallible() {
            format!("(*{}, error)", class.name)
        } else {
            format!("*{}", class.name)
        };
        self.code.line(format!(
            "func New{}({}) {result} {{",
            class.name,
            self.params(ctor)
        ));
        self.code.indent();
        self.code.line(format!("{instance} := &{}{{}}", class.name));
        for property in &class.properties {
            if let Some(default) = &property.default {
                let value = self.expr_hint(default, Some(&property.ty));
                self.code.line(format!(
                    "{instance}.{} = {value}",
                    Self::field_name(&property.name)
                ));
            }
        }
        self.stmts(&ctor.body);
        if !ctor.body.last().is_some_and(Stmt::is_terminal) {
            self.return_stmt(None);
        }
        self.code.dedent();
        self.code.line("}");
        self.receiver = None;
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
            Stmt::Expr(e) => self.expr_stmt(e),
            Stmt::Return(value) => self.return_stmt(value.as_ref()),
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
                let condition = self.expr(condition);
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
            Stmt::While { condition, body } => self.while_loop(condition, body),
            Stmt::Try {
                body,
                catches,
                finally,
            } => self.try_stmt(body, catches, finally),
            Stmt::Throw(value) => {
                let err = self.error_expr(value);
                let line = self.propagate(&err);
                self.code.line(line);
            }
            Stmt::Break => self.code.line("break"),
            Stmt::Continue => self.code.line("continue"),
            Stmt::Spawn(work) => {
                let line = match work {
                    Expr::Call {
                        callee,
                        args,
                        kwargs,
                    } => format!("go {}", self.plain_call(callee, args, kwargs)),
                    other => format!("go func() {{ {} }}()", self.expr(other)),
                };
                self.code.line(line);
            }
            Stmt::Unhandled(source) => self.code.line(format!("// {}", placeholder(source))),
        }
    }

    /// The statement that hands `err` to the caller.
    fn propagate(&self, err: &str) -> String {
        if self.frame.panics || !self.frame.returns_error {
            return format!("panic({err})");
        }
        match &self.frame.zero {
            Some(zero) => format!("return {zero}, {err}"),
            None => format!("return {err}"),
        }
    }

    fn err_check(&mut self) {
        self.code.line("if err != nil {");
        self.code.indent();
        let line = self.propagate("err");
        self.code.line(line);
        self.code.dedent();
        self.code.line("}");
    }

    fn expr_stmt(&mut self, expr: &Expr) {
        match expr {
            Expr::Await(inner) => self.expr_stmt(inner),
            Expr::Call {
                callee,
                args,
                kwargs,
            } => {
                if let Expr::Member { object, property } = callee.as_ref()
                    && property == "append"
                    && let [value] = args.as_slice()
                {
                    let target = self.expr(object);
                    let value = self.expr(value);
                    self.code
                        .line(format!("{target} = append({target}, {value})"));
                    return;
                }
                let sig = self.call_sig(callee);
                let text = self.plain_call(callee, args, kwargs);
                match sig {
                    Some(sig) if sig.error => {
                        let bind = if sig.value.is_some() { "_, err" } else { "err" };
                        self.code
                            .line(format!("if {bind} := {text}; err != nil {{"));
                        self.code.indent();
                        let line = self.propagate("err");
                        self.code.line(line);
                        self.code.dedent();
                        self.code.line("}");
                    }
                    _ => self.code.line(text),
                }
            }
            other => {
                let text = self.expr(other);
                self.code.line(text);
            }
        }
    }

    fn return_stmt(&mut self, value: Option<&Expr>) {
        if self.frame.bare_returns {
            self.code.line("return");
            return;
        }
        let Some(value) = value else {
            let line = match (&self.frame.instance, self.frame.returns_error) {
                (Some(instance), true) => format!("return {instance}, nil"),
                (Some(instance), false) => format!("return {instance}"),
                (None, true) => match &self.frame.zero {
                    Some(zero) => format!("return {zero}, nil"),
                    None => "return nil".to_string(),
                },
                (None, false) => "return".to_string(),
            };
            self.code.line(line);
            return;
        };

        // A call with the same result shape is returned as is.
        if let Expr::Call {
            callee,
            args,
            kwargs,
        } = value
            && self.frame.returns_error
            && self.frame.instance.is_none()
            && let Some(sig) = self.call_sig(callee)
            && sig.error
            && sig.value.is_some()
            && sig.value == self.frame.result
        {
            let text = self.plain_call(callee, args, kwargs);
            self.code.line(format!("return {text}"));
            return;
        }

        let text = match value {
            Expr::Comprehension(c) => {
                let acc = if self.scope.local("result").is_some() {
                    self.temp()
                } else {
                    "result".to_string()
                };
                self.lower_comprehension(&acc, true, c);
                acc
            }
            Expr::Array(items) if self.frame.result.as_ref().is_some_and(Type::is_tuple) => {
                let members = self
                    .frame
                    .result
                    .as_ref()
                    .map(|t| t.generic_args.clone())
                    .unwrap_or_default();
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.expr_hint(item, members.get(i)))
                    .collect::<Vec<_>>()
                    .join(", ")
            }
            other => {
                let hint = self.frame.result.clone();
                self.expr_hint(other, hint.as_ref())
            }
        };
        let line = if self.frame.returns_error && self.frame.zero.is_some() {
            format!("return {text}, nil")
        } else {
            format!("return {text}")
        };
        self.code.line(line);
    }

    fn assign(&mut self, target: &Expr, value: &Expr, is_declaration: bool, ty: Option<&Type>) {
        if let (Expr::Ident(name), Expr::Comprehension(c)) = (target, value) {
            let acc = self.ident(name);
            self.lower_comprehension(&acc, is_declaration, c);
            return;
        }
        if is_declaration && let Expr::Ident(name) = target {
            let name = self.ident(name);
            if value.is_null() {
                let ty = ty.map(|t| self.ty(t)).unwrap_or_else(|| "interface{}".to_string());
                self.code.line(format!("var {name} {ty}"));
                return;
            }
            if let Expr::Call {
                callee,
                args,
                kwargs,
            } = value
                && let Some(sig) = self.call_sig(callee)
                && sig.error
                && sig.value.is_some()
            {
                let text = self.plain_call(callee, args, kwargs);
                self.code.line(format!("{name}, err := {text}"));
                self.err_check();
                return;
            }
            let rhs = self.expr_hint(value, ty);
            match ty {
                Some(ty) if infer_type(value).is_some_and(|t| t != *ty) => {
                    let ty = self.ty(ty);
                    self.code.line(format!("var {name} {ty} = {rhs}"));
                }
                _ => self.code.line(format!("{name} := {rhs}")),
            }
            return;
        }
        if let (Expr::Array(names), Expr::Call { callee, args, kwargs }) = (target, value)
            && names.iter().all(|n| n.as_ident().is_some())
        {
            let mut lhs: Vec<String> = names.iter().map(|n| self.expr(n)).collect();
            let sig = self.call_sig(callee);
            let text = self.plain_call(callee, args, kwargs);
            let op = if is_declaration { ":=" } else { "=" };
            if sig.is_some_and(|s| s.error) {
                lhs.push("err".to_string());
                self.code.line(format!("{} {op} {text}", lhs.join(", ")));
                self.err_check();
            } else {
                self.code.line(format!("{} {op} {text}", lhs.join(", ")));
            }
            return;
        }
        if let Some((op, rhs)) = compound_parts(target, value) {
            let rhs = self.expr(rhs);
            let lhs = self.expr(target);
            self.code
                .line(format!("{lhs} {}= {rhs}", op.c_symbol()));
            return;
        }
        let hint = self.scope.type_of(target);
        let rhs = self.expr_hint(value, hint.as_ref());
        let lhs = self.expr(target);
        self.code.line(format!("{lhs} = {rhs}"));
    }

    /// Whether rendering `expr` emits statements ahead of its use.
    fn hoists(&self, expr: &Expr) -> bool {
        let mut found = false;
        expr.visit(&mut |e| {
            found |= match e {
                Expr::Comprehension(_) => true,
                Expr::Binary {
                    op: BinaryOp::In,
                    right,
                    ..
                } => self.scope.is_map(right),
                Expr::Call { callee, .. } => self.call_sig(callee).is_some_and(|s| s.error),
                _ => false,
            };
        });
        found
    }

    /// Body of an `if` whose header is already written, through `else`.
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
            ] if !self.hoists(condition) => {
                let condition = self.expr(condition);
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

    fn while_loop(&mut self, condition: &Expr, body: &[Stmt]) {
        if self.hoists(condition) {
            self.code.line("for {");
            self.code.indent();
            let condition = self.expr(condition);
            self.code.line(format!("if !({condition}) {{"));
            self.code.indent();
            self.code.line("break");
            self.code.dedent();
            self.code.line("}");
            self.stmts(body);
            self.code.dedent();
            self.code.line("}");
            return;
        }
        let condition = self.expr(condition);
        if condition == "true" {
            self.code.line("for {");
        } else {
            self.code.line(format!("for {condition} {{"));
        }
        self.block(body);
        self.code.line("}");
    }

    fn for_header(&mut self, iterator: &str, iterable: &Expr) -> String {
        if let Some((start, end)) = as_range(iterable) {
            let var = self.ident(iterator);
            let start = self.expr(&start);
            let end = self.expr(end);
            return format!("for {var} := {start}; {var} < {end}; {var}++ {{");
        }
        let names: Vec<String> = iterator.split(',').map(|n| self.ident(n.trim())).collect();
        match names.as_slice() {
            [key, value] => {
                let source = match iterable {
                    Expr::Call { callee, args, .. } if args.is_empty() => match callee.as_ref() {
                        Expr::Member { object, property } if property == "items" => object,
                        _ => iterable,
                    },
                    _ => iterable,
                };
                let source = self.expr(source);
                format!("for {key}, {value} := range {source} {{")
            }
            _ => {
                let var = names.join(", ");
                let is_map = self.scope.is_map(iterable);
                let source = self.expr(iterable);
                if is_map {
                    format!("for {var} := range {source} {{")
                } else {
                    format!("for _, {var} := range {source} {{")
                }
            }
        }
    }

    /// try/catch/finally as a closure with deferred `recover`.
    fn try_stmt(&mut self, body: &[Stmt], catches: &[CatchBlock], finally: &[Stmt]) {
        let outer = self.frame.clone();
        self.frame.panics = true;
        self.frame.bare_returns = true;

        self.code.line("func() {");
        self.code.indent();
        if !finally.is_empty() {
            self.code.line("defer func() {");
            self.block(finally);
            self.code.line("}()");
        }
        if let Some((first, rest)) = catches.split_first() {
            self.code.line("defer func() {");
            self.code.indent();
            self.code.line("if r := recover(); r != nil {");
            self.code.indent();
            if let Some(binding) = &first.binding {
                self.imports.insert("fmt");
                let binding = self.ident(binding);
                self.code
                    .line(format!("{binding} := fmt.Errorf(\"%v\", r)"));
                self.code.line(format!("_ = {binding}"));
            }
            self.stmts(&first.body);
            for other in rest {
                let kind = other.kind.as_deref().unwrap_or("error");
                self.code
                    .line(format!("// {}", placeholder(&format!("catch {kind}"))));
            }
            self.code.dedent();
            self.code.line("}");
            self.code.dedent();
            self.code.line("}()");
        }
        self.stmts(body);
        self.code.dedent();
        self.code.line("}()");

        self.frame = outer;
    }

    /// Emit `acc := []T{}` plus the loop filling it.
    fn lower_comprehension(&mut self, acc: &str, declare: bool, c: &Comprehension) {
        let ty = self
            .scope
            .type_of(&Expr::Comprehension(Box::new(c.clone())))
            .unwrap_or_else(|| Type::array(Type::any()));
        let element = ty.element().cloned().unwrap_or_else(Type::any);
        let init = match c.kind {
            ComprehensionKind::Dict => format!("{}{{}}", self.ty(&ty)),
            ComprehensionKind::Set => format!("map[{}]bool{{}}", self.ty(&element)),
            ComprehensionKind::List | ComprehensionKind::Generator => {
                format!("[]{}{{}}", self.ty(&element))
            }
        };
        let op = if declare { ":=" } else { "=" };
        self.code.line(format!("{acc} {op} {init}"));

        let mut inner = self.scope.clone();
        for (name, ty) in self.scope.iteration_bindings(&c.iterator, &c.iterable) {
            inner.bind(&name, ty);
        }
        let outer = std::mem::replace(&mut self.scope, inner);

        let header = self.for_header(&c.iterator, &c.iterable);
        self.code.line(header);
        self.code.indent();
        if let Some(condition) = &c.condition {
            let condition = self.expr(condition);
            self.code.line(format!("if {condition} {{"));
            self.code.indent();
        }
        let target = self.expr(&c.target);
        let line = match c.kind {
            ComprehensionKind::Dict => {
                let value = match &c.value {
                    Some(v) => self.expr(v),
                    None => target.clone(),
                };
                format!("{acc}[{target}] = {value}")
            }
            ComprehensionKind::Set => format!("{acc}[{target}] = true"),
            _ => format!("{acc} = append({acc}, {target})"),
        };
        self.code.line(line);
        if c.condition.is_some() {
            self.code.dedent();
            self.code.line("}");
        }
        self.code.dedent();
        self.code.line("}");

        self.scope = outer;
    }

    // ========================================================================
    // Errors
    // ========================================================================

    fn error_expr(&mut self, value: &Expr) -> String {
        match thrown_parts(value) {
            Some((_, Some(message))) => self.error_from_message(message),
            Some((kind, None)) => {
                self.imports.insert("errors");
                format!("errors.New({})", quoted(kind))
            }
            None => match value {
                Expr::Literal(Literal::String(_)) | Expr::FormatString(_) => {
                    self.error_from_message(value)
                }
                other => self.expr(other),
            },
        }
    }

    fn error_from_message(&mut self, message: &Expr) -> String {
        match message {
            Expr::FormatString(parts) => {
                self.imports.insert("fmt");
                let (format, args) = self.format_parts(parts);
                format!("fmt.Errorf({format}{args})")
            }
            other => {
                self.imports.insert("errors");
                format!("errors.New({})", self.expr(other))
            }
        }
    }

    /// A quoted format string using `%v`, plus `, arg` suffixes.
    fn format_parts(&mut self, parts: &[FormatPart]) -> (String, String) {
        let mut format = String::new();
        let mut args = String::new();
        for part in parts {
            match part {
                FormatPart::Text(text) => format.push_str(&escape_string(text).replace('%', "%%")),
                FormatPart::Expr(e) => {
                    format.push_str("%v");
                    args.push_str(", ");
                    args.push_str(&self.expr(e));
                }
            }
        }
        (format!("\"{format}\""), args)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn method(&self, object: &Expr, name: &str) -> Option<&'m Function> {
        let module = self.module;
        let owner = match object {
            Expr::Ident(n) if n == "self" => self.class.map(|c| c.name.clone()),
            Expr::Ident(n) if self.scope.local(n).is_none() && self.find_class(n).is_some() => {
                Some(n.clone())
            }
            other => self.scope.type_of(other).map(|t| t.name),
        };
        if let Some(class) = owner.and_then(|o| self.find_class(&o)) {
            return class.methods.iter().find(|m| m.name == name);
        }
        let mut candidates = module
            .classes
            .iter()
            .flat_map(|c| &c.methods)
            .filter(|m| m.name == name);
        let first = candidates.next()?;
        candidates.next().is_none().then_some(first)
    }

    fn call_sig(&self, callee: &Expr) -> Option<CallSig> {
        match callee {
            Expr::Ident(name) if self.scope.local(name).is_none() => {
                if let Some(function) = self.module.function(name) {
                    return Some(CallSig {
                        value: function.return_type.clone(),
                        error: returns_error(function),
                    });
                }
                let ctor = self.find_class(name)?.constructor.as_ref()?;
                Some(CallSig {
                    value: Some(Type::new(name)),
                    error: ctor.is_fallible(),
                })
            }
            Expr::Member { object, property } => {
                let method = self.method(object, property)?;
                Some(CallSig {
                    value: method.return_type.clone(),
                    error: returns_error(method),
                })
            }
            _ => None,
        }
    }

    fn args(&mut self, args: &[Expr], kwargs: &[(String, Expr)]) -> String {
        args.iter()
            .chain(kwargs.iter().map(|(_, v)| v))
            .map(|a| self.expr(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// A call with builtins mapped and no error handling.
    fn plain_call(&mut self, callee: &Expr, args: &[Expr], kwargs: &[(String, Expr)]) -> String {
        if let Some(text) = self.builtin_call(callee, args) {
            return text;
        }
        match callee {
            Expr::Ident(name) if self.scope.local(name).is_none() => {
                if let Some(class) = self.find_class(name) {
                    return match &class.constructor {
                        Some(_) => format!("New{name}({})", self.args(args, kwargs)),
                        None => format!("&{name}{{}}"),
                    };
                }
                if self.is_record(name) {
                    let fields: Vec<FieldInit> =
                        args.iter().cloned().map(FieldInit::positional).collect();
                    return self.struct_literal(name, &fields);
                }
                let name = self.ident(name);
                format!("{name}({})", self.args(args, kwargs))
            }
            Expr::Member { object, property } => {
                if let Expr::Ident(owner) = object.as_ref()
                    && self.scope.local(owner).is_none()
                    && let Some(class) = self.find_class(owner)
                    && class.methods.iter().any(|m| m.name == *property && m.is_static)
                {
                    return format!(
                        "{owner}{}({})",
                        naming::to_pascal_case(property),
                        self.args(args, kwargs)
                    );
                }
                let object = self.expr(object);
                format!(
                    "{object}.{}({})",
                    naming::to_pascal_case(property),
                    self.args(args, kwargs)
                )
            }
            other => {
                let callee = self.expr(other);
                format!("{callee}({})", self.args(args, kwargs))
            }
        }
    }

    fn builtin_call(&mut self, callee: &Expr, args: &[Expr]) -> Option<String> {
        match callee {
            Expr::Ident(name)
                if self.scope.local(name).is_none() && self.module.function(name).is_none() =>
            {
                match (name.as_str(), args) {
                    ("print", _) => {
                        self.imports.insert("fmt");
                        Some(format!("fmt.Println({})", self.args(args, &[])))
                    }
                    ("len", [arg]) => Some(format!("len({})", self.expr(arg))),
                    ("range", [_] | [_, _]) => {
                        let tmp = self.temp();
                        let iterable = Expr::call(Expr::ident("range"), args.to_vec());
                        let header = self.for_header("i", &iterable);
                        self.code.line(format!("{tmp} := []int{{}}"));
                        self.code.line(header);
                        self.code.indent();
                        self.code.line(format!("{tmp} = append({tmp}, i)"));
                        self.code.dedent();
                        self.code.line("}");
                        Some(tmp)
                    }
                    (kind, _) if is_error_kind(kind) => {
                        let value = Expr::call(callee.clone(), args.to_vec());
                        Some(self.error_expr(&value))
                    }
                    _ => None,
                }
            }
            Expr::Member { object, property } => match (property.as_str(), args) {
                ("append", [value]) => {
                    let object = self.expr(object);
                    let value = self.expr(value);
                    Some(format!("append({object}, {value})"))
                }
                ("items", []) => Some(self.expr(object)),
                _ => None,
            },
            _ => None,
        }
    }

    /// A call in expression position; fallible calls are hoisted.
    fn call(&mut self, callee: &Expr, args: &[Expr], kwargs: &[(String, Expr)]) -> String {
        let sig = self.call_sig(callee);
        let text = self.plain_call(callee, args, kwargs);
        match sig {
            Some(sig) if sig.error && sig.value.is_some() => {
                let tmp = self.temp();
                self.code.line(format!("{tmp}, err := {text}"));
                self.err_check();
                tmp
            }
            _ => text,
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Zero values to return alongside an error.
    fn result_zero(&self, ty: &Type) -> String {
        if ty.is_tuple() {
            ty.generic_args
                .iter()
                .map(|t| self.zero(t))
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            self.zero(ty)
        }
    }

    fn zero(&self, ty: &Type) -> String {
        if ty.is_optional || self.find_class(&ty.name).is_some() {
            return "nil".to_string();
        }
        match ty.name.as_str() {
            "string" => "\"\"".to_string(),
            "int" | "float" => "0".to_string(),
            "bool" => "false".to_string(),
            "any" | "array" | "map" | "tuple" => "nil".to_string(),
            name => match self.is_enum(name) {
                Some(en) if enum_literals(en).iter().any(|v| matches!(v, Literal::String(_))) => {
                    "\"\"".to_string()
                }
                Some(_) => "0".to_string(),
                None if self.module.declares_type(name) => format!("{name}{{}}"),
                None => "nil".to_string(),
            },
        }
    }

    /// Composite literals take their type from `hint` when given.
    fn expr_hint(&mut self, expr: &Expr, hint: Option<&Type>) -> String {
        let ty = hint
            .filter(|h| h.name != "any")
            .cloned()
            .or_else(|| self.scope.type_of(expr));
        match (expr, ty) {
            (Expr::Array(items), Some(ty)) if ty.is_array() => {
                let element = ty.element().cloned().unwrap_or_else(Type::any);
                let items: Vec<String> = items
                    .iter()
                    .map(|i| self.expr_hint(i, Some(&element)))
                    .collect();
                format!("[]{}{{{}}}", self.ty(&element), items.join(", "))
            }
            (Expr::Map(entries), Some(ty)) if ty.is_map() => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| {
                        let key = self.expr_hint(k, ty.generic_args.first());
                        let value = self.expr_hint(v, ty.generic_args.get(1));
                        format!("{key}: {value}")
                    })
                    .collect();
                format!("{}{{{}}}", self.ty(&ty), entries.join(", "))
            }
            _ => self.expr(expr),
        }
    }

    fn struct_literal(&mut self, type_name: &str, fields: &[FieldInit]) -> String {
        if is_error_kind(type_name) {
            let message = fields.first().map(|f| f.value.clone());
            let value = crate::patterns::error_tuple::error_value(
                type_name,
                message.unwrap_or_else(|| Expr::string(type_name)),
            );
            return self.error_expr(&value);
        }
        if let Some(args) = constructor_args(self.module, type_name, fields) {
            return self.expr(&Expr::call(Expr::ident(type_name), args));
        }
        let module = self.module;
        let declared: Vec<Property> = module
            .types
            .iter()
            .find(|t| t.name == type_name)
            .map(|t| t.fields.clone())
            .or_else(|| self.find_class(type_name).map(|c| c.properties.clone()))
            .unwrap_or_default();
        let parts: Vec<String> = struct_fields(module, type_name, fields)
            .into_iter()
            .map(|(name, value)| {
                let hint = name
                    .as_ref()
                    .and_then(|n| declared.iter().find(|p| p.name == *n))
                    .map(|p| p.ty.clone());
                let value = self.expr_hint(value, hint.as_ref());
                match name {
                    Some(name) => format!("{}: {value}", Self::field_name(&name)),
                    None => value,
                }
            })
            .collect();
        let amp = if self.find_class(type_name).is_some() { "&" } else { "" };
        format!("{amp}{type_name}{{{}}}", parts.join(", "))
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(lit) => literal(lit),
            Expr::Ident(name) => self.ident(name),
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Unary { op, operand } => {
                let operand = self.expr(operand);
                match op {
                    UnaryOp::Not => format!("!{operand}"),
                    UnaryOp::Neg => format!("-{operand}"),
                    UnaryOp::BitNot => format!("^{operand}"),
                }
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => self.call(callee, args, kwargs),
            Expr::Member { object, property } => {
                if let Some((en, variant)) = enum_variant(self.module, expr) {
                    return format!("{}{}", en.name, naming::to_pascal_case(&variant.name));
                }
                let object = self.expr(object);
                format!("{object}.{}", Self::field_name(property))
            }
            Expr::Index { object, index } => {
                let object = self.expr(object);
                let index = self.expr(index);
                format!("{object}[{index}]")
            }
            Expr::Array(_) | Expr::Map(_) => {
                let ty = self.scope.type_of(expr);
                match ty {
                    Some(ty) => self.expr_hint(expr, Some(&ty)),
                    None => "nil".to_string(),
                }
            }
            Expr::StructLiteral { type_name, fields } => self.struct_literal(type_name, fields),
            Expr::Comprehension(c) => {
                let tmp = self.temp();
                self.lower_comprehension(&tmp, true, c);
                tmp
            }
            Expr::Lambda { params, body } => self.lambda(params, body),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let ty = self
                    .scope
                    .type_of(then)
                    .or_else(|| self.scope.type_of(otherwise))
                    .map(|t| self.ty(&t))
                    .unwrap_or_else(|| "interface{}".to_string());
                let condition = self.expr(condition);
                let then = self.expr(then);
                let otherwise = self.expr(otherwise);
                format!("func() {ty} {{ if {condition} {{ return {then} }}; return {otherwise} }}()")
            }
            Expr::Await(inner) => self.expr(inner),
            Expr::FormatString(parts) => {
                self.imports.insert("fmt");
                let (format, args) = self.format_parts(parts);
                format!("fmt.Sprintf({format}{args})")
            }
            Expr::Unhandled(source) => format!("nil /* {} */", placeholder(source)),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> String {
        match op {
            BinaryOp::In => {
                if self.scope.is_map(right) {
                    let map = self.expr(right);
                    let key = self.expr(left);
                    self.temps += 1;
                    let ok = format!("ok{}", self.temps);
                    self.code.line(format!("_, {ok} := {map}[{key}]"));
                    return ok;
                }
                let package = if self.scope.is_string(right) {
                    "strings"
                } else {
                    "slices"
                };
                self.imports.insert(package);
                let haystack = self.expr(right);
                let needle = self.expr(left);
                format!("{package}.Contains({haystack}, {needle})")
            }
            BinaryOp::Pow => {
                self.imports.insert("math");
                let is_int = self
                    .scope
                    .type_of(left)
                    .is_some_and(|t| t.name == "int");
                let base = self.expr(left);
                let exp = self.expr(right);
                if is_int {
                    format!("int(math.Pow(float64({base}), float64({exp})))")
                } else {
                    format!("math.Pow({base}, {exp})")
                }
            }
            BinaryOp::FloorDiv => {
                let is_float = self
                    .scope
                    .type_of(left)
                    .is_some_and(|t| t.name == "float");
                let l = self.expr(left);
                let r = self.expr(right);
                if is_float {
                    self.imports.insert("math");
                    format!("math.Floor({l} / {r})")
                } else {
                    format!("({l} / {r})")
                }
            }
            _ => {
                let l = self.expr(left);
                let r = self.expr(right);
                format!("({l} {} {r})", op.c_symbol())
            }
        }
    }

    fn lambda(&mut self, params: &[String], body: &LambdaBody) -> String {
        let params: Vec<String> = params
            .iter()
            .map(|p| format!("{} interface{{}}", self.ident(p)))
            .collect();
        let params = params.join(", ");
        match body {
            LambdaBody::Expr(e) => {
                let e = self.expr(e);
                format!("func({params}) interface{{}} {{ return {e} }}")
            }
            LambdaBody::Block(stmts) => {
                let returns = stmts.iter().any(|s| matches!(s, Stmt::Return(Some(_))));
                let outer_frame = std::mem::replace(
                    &mut self.frame,
                    Frame {
                        panics: true,
                        ..Frame::default()
                    },
                );
                let prefix = self.code.prefix();
                let outer = std::mem::replace(&mut self.code, Code::new("\t"));
                self.stmts(stmts);
                let inner = std::mem::replace(&mut self.code, outer).finish();
                self.frame = outer_frame;
                let result = if returns { " interface{}" } else { "" };
                let mut out = format!("func({params}){result} {{\n");
                for line in inner.lines().filter(|l| !l.is_empty()) {
                    out.push_str(&format!("{prefix}\t{line}\n"));
                }
                out.push_str(&prefix);
                out.push('}');
                out
            }
        }
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "nil".to_string(),
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
        GO_WRITER.write(module).unwrap()
    }

    #[test]
    fn test_result_gains_error() {
        let mut module = Module::new("calc");
        module.functions.push(
            Function::new(
                "calculate",
                vec![Param::new("a", Type::int()), Param::new("b", Type::int())],
                vec![Stmt::return_stmt(Some(Expr::binary(
                    Expr::ident("a"),
                    BinaryOp::Add,
                    Expr::ident("b"),
                )))],
            )
            .returning(Type::int()),
        );
        let out = write(&module);
        assert!(out.starts_with("package calc\n"));
        assert!(out.contains(
            "func Calculate(a int, b int) (int, error) {\n\treturn (a + b), nil\n}"
        ));
    }

    #[test]
    fn test_struct_and_named_literal() {
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
                "get_user",
                vec![Param::new("id", Type::int())],
                vec![
                    Stmt::declare(
                        "user",
                        Expr::StructLiteral {
                            type_name: "User".into(),
                            fields: vec![
                                FieldInit::positional(Expr::string("Alice")),
                                FieldInit::positional(Expr::int(30)),
                            ],
                        },
                    ),
                    Stmt::return_stmt(Some(Expr::ident("user"))),
                ],
            )
            .returning(Type::new("User")),
        );
        let out = write(&module);
        assert!(out.contains(
            "type User struct {\n\tName string `json:\"name\"`\n\tAge  int    `json:\"age\"`\n}"
        ));
        assert!(out.contains("user := User{Name: \"Alice\", Age: 30}"));
        assert!(out.contains("func GetUser(id int) (User, error) {"));
        assert!(out.contains("\treturn user, nil\n"));
    }

    #[test]
    fn test_throw_and_error_check() {
        let mut module = Module::new("m");
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
            .throwing("Error"),
        );
        module.functions.push(
            Function::new(
                "run",
                vec![],
                vec![
                    Stmt::declare("n", Expr::call(Expr::ident("parse"), vec![Expr::string("x")])),
                    Stmt::expr(Expr::call(Expr::ident("print"), vec![Expr::ident("n")])),
                ],
            )
            .throwing("Error"),
        );
        let out = write(&module);
        assert!(out.contains("import (\n\t\"errors\"\n\t\"fmt\"\n)"));
        assert!(out.contains("\t\treturn 0, errors.New(\"empty\")\n"));
        assert!(out.contains("func Run() error {\n\tn, err := Parse(\"x\")\n\tif err != nil {\n\t\treturn err\n\t}\n\tfmt.Println(n)\n\treturn nil\n}"));
    }

    #[test]
    fn test_comprehension_lowers_to_loop() {
        let mut module = Module::new("m");
        module.functions.push(Function::new(
            "main",
            vec![],
            vec![
                Stmt::declare(
                    "items",
                    Expr::array(vec![Expr::int(1), Expr::int(-2)]),
                ),
                Stmt::declare(
                    "result",
                    Expr::comprehension(Comprehension {
                        kind: ComprehensionKind::List,
                        target: Expr::binary(Expr::ident("x"), BinaryOp::Mul, Expr::int(2)),
                        value: None,
                        iterator: "x".into(),
                        iterable: Expr::ident("items"),
                        condition: Some(Expr::binary(
                            Expr::ident("x"),
                            BinaryOp::Gt,
                            Expr::int(0),
                        )),
                    }),
                ),
            ],
        ));
        let out = write(&module);
        assert!(out.contains("func main() {"));
        assert!(out.contains("items := []int{1, -2}"));
        assert!(out.contains(
            "\tresult := []int{}\n\tfor _, x := range items {\n\t\tif (x > 0) {\n\t\t\tresult = append(result, (x * 2))\n\t\t}\n\t}\n"
        ));
    }

    #[test]
    fn test_class_enum_and_spawn() {
        let mut module = Module::new("shapes");
        module.enums.push(Enum {
            name: "Level".into(),
            variants: vec![EnumVariant::new("low"), EnumVariant::new("high")],
        });
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
                "start",
                vec![],
                vec![
                    Stmt::Spawn(Expr::call(Expr::ident("worker"), vec![])),
                    Stmt::declare("lvl", Expr::member(Expr::ident("Level"), "high")),
                ],
            )
            .asynchronous(),
        );
        let out = write(&module);
        assert!(out.contains("type Level int\n\nconst (\n\tLevelLow Level = iota\n\tLevelHigh\n)"));
        assert!(out.contains("func NewCounter(start int) *Counter {\n\tc := &Counter{}\n\tc.Count = start\n\treturn c\n}"));
        assert!(out.contains("func (c *Counter) Tick() {\n\tc.Count += 1\n}"));
        assert!(out.contains("\tgo worker()\n"));
        assert!(out.contains("lvl := LevelHigh"));
        assert!(!out.contains("async"));
    }
}
