//! Python writer.
//!
//! Emits a [`Module`] as Python 3 source. Imports (`typing`, `dataclasses`,
//! `enum`, `asyncio`, `threading`) are collected while rendering.

use super::{
    Code, compound_parts, enum_literals, enum_variant, format_float, placeholder, quoted,
    struct_fields, validate,
};
use crate::config::{PythonConfig, TranslateConfig};
use crate::ir::*;
use crate::naming;
use crate::patterns::error_tuple::native_error_kind;
use crate::traits::{GenerationError, Writer};
use crate::types::{Language, from_canonical};
use std::collections::BTreeSet;

/// Static instance of the Python writer for the registry.
pub static PYTHON_WRITER: PythonWriter = PythonWriter;

pub struct PythonWriter;

impl Writer for PythonWriter {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extension(&self) -> &'static str {
        "py"
    }

    fn write_with_config(
        &self,
        module: &Module,
        config: &TranslateConfig,
    ) -> Result<String, GenerationError> {
        validate(module)?;
        Ok(Emitter::new(module, &config.python).emit())
    }
}

const TYPING_NAMES: &[&str] = &["Any", "Dict", "List", "Optional", "Tuple"];

struct Emitter<'m> {
    module: &'m Module,
    config: &'m PythonConfig,
    code: Code,
    /// `import x` lines.
    imports: BTreeSet<&'static str>,
    /// `from x import y` lines.
    from_imports: BTreeSet<&'static str>,
    typing: BTreeSet<&'static str>,
    /// Placeholders of the line being built, appended as a comment.
    notes: Vec<String>,
    in_async: bool,
    /// The function being written returns a tuple.
    tuple_result: bool,
    catch_bindings: Vec<String>,
}

impl<'m> Emitter<'m> {
    fn new(module: &'m Module, config: &'m PythonConfig) -> Self {
        Self {
            module,
            config,
            code: Code::new(" ".repeat(config.indent)),
            imports: BTreeSet::new(),
            from_imports: BTreeSet::new(),
            typing: BTreeSet::new(),
            notes: Vec::new(),
            in_async: false,
            tuple_result: false,
            catch_bindings: Vec::new(),
        }
    }

    fn emit(mut self) -> String {
        let module = self.module;
        for var in &module.constants {
            let value = self.expr(&var.value);
            let line = match &var.ty {
                Some(ty) => format!("{}: {} = {value}", var.name, self.ty(ty)),
                None => format!("{} = {value}", var.name),
            };
            self.line(line);
        }
        for en in &module.enums {
            self.code.blank_lines(2);
            self.enumeration(en);
        }
        for def in &module.types {
            self.code.blank_lines(2);
            self.type_definition(def);
        }
        for class in &module.classes {
            self.code.blank_lines(2);
            self.class(class);
        }
        for function in &module.functions {
            self.code.blank_lines(2);
            self.function(function, None);
        }

        let body = std::mem::replace(&mut self.code, Code::new("")).finish();
        let mut header = vec![format!("# {}", module.name)];
        let mut imports: Vec<String> = self.imports.iter().map(|m| format!("import {m}")).collect();
        imports.extend(self.from_imports.iter().map(|s| s.to_string()));
        if !self.typing.is_empty() {
            let names: Vec<&str> = self.typing.iter().copied().collect();
            imports.push(format!("from typing import {}", names.join(", ")));
        }
        if !imports.is_empty() {
            header.push(String::new());
            header.extend(imports);
        }
        let mut out = header.join("\n");
        out.push('\n');
        if body.trim().is_empty() {
            return out;
        }
        out.push_str("\n\n");
        out.push_str(&body);
        out
    }

    /// Emit a line, flushing pending placeholders as a trailing comment.
    fn line(&mut self, text: impl Into<String>) {
        let mut text = text.into();
        if !self.notes.is_empty() {
            text.push_str("  # ");
            text.push_str(&self.notes.join("; "));
            self.notes.clear();
        }
        self.code.line(text);
    }

    fn ty(&mut self, ty: &Type) -> String {
        let text = from_canonical(Language::Python, ty);
        for word in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
            if let Some(name) = TYPING_NAMES.iter().find(|n| **n == word) {
                self.typing.insert(*name);
            }
        }
        text
    }

    fn docstring(&mut self, doc: &Option<String>) {
        if let Some(doc) = doc {
            let doc = doc.replace("\"\"\"", "\\\"\\\"\\\"");
            self.line(format!("\"\"\"{}\"\"\"", doc.trim()));
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn enumeration(&mut self, en: &Enum) {
        self.from_imports.insert("from enum import Enum");
        self.line(format!("class {}(Enum):", en.name));
        self.code.indent();
        if en.variants.is_empty() {
            self.line("pass");
        }
        for (variant, value) in en.variants.iter().zip(enum_literals(en)) {
            let value = self.literal(&value);
            self.line(format!(
                "{} = {value}",
                naming::to_screaming_snake_case(&variant.name)
            ));
        }
        self.code.dedent();
    }

    fn type_definition(&mut self, def: &TypeDefinition) {
        if self.config.dataclasses {
            self.from_imports
                .insert("from dataclasses import dataclass");
            self.line("@dataclass");
            self.line(format!("class {}:", def.name));
            self.code.indent();
            self.docstring(&def.doc);
            if def.fields.is_empty() && def.doc.is_none() {
                self.line("pass");
            }
            for field in &def.fields {
                let ty = self.ty(&field.ty);
                match &field.default {
                    Some(default) => {
                        let default = self.expr(default);
                        self.line(format!("{}: {ty} = {default}", field.name));
                    }
                    None => self.line(format!("{}: {ty}", field.name)),
                }
            }
            self.code.dedent();
            return;
        }

        self.line(format!("class {}:", def.name));
        self.code.indent();
        self.docstring(&def.doc);
        let mut params = vec!["self".to_string()];
        for field in &def.fields {
            let ty = self.ty(&field.ty);
            params.push(match &field.default {
                Some(default) => format!("{}: {ty} = {}", field.name, self.expr(default)),
                None => format!("{}: {ty}", field.name),
            });
        }
        self.line(format!("def __init__({}):", params.join(", ")));
        self.code.indent();
        if def.fields.is_empty() {
            self.line("pass");
        }
        for field in &def.fields {
            self.line(format!("self.{0} = {0}", field.name));
        }
        self.code.dedent();
        self.code.dedent();
    }

    fn class(&mut self, class: &Class) {
        let bases = if class.bases.is_empty() {
            String::new()
        } else {
            format!("({})", class.bases.join(", "))
        };
        self.line(format!("class {}{bases}:", class.name));
        self.code.indent();
        self.docstring(&class.doc);
        for property in &class.properties {
            let ty = self.ty(&property.ty);
            match &property.default {
                Some(default) => {
                    let default = self.expr(default);
                    self.line(format!("{}: {ty} = {default}", property.name));
                }
                None => self.line(format!("{}: {ty}", property.name)),
            }
        }
        let mut first = class.properties.is_empty() && class.doc.is_none();
        for method in class.constructor.iter().chain(&class.methods) {
            if !first {
                self.code.blank();
            }
            first = false;
            self.function(method, Some(class));
        }
        if class.properties.is_empty() && class.constructor.is_none() && class.methods.is_empty()
        {
            self.line("pass");
        }
        self.code.dedent();
    }

    fn function(&mut self, function: &Function, class: Option<&Class>) {
        let is_constructor = class.is_some_and(|c| {
            c.constructor
                .as_ref()
                .is_some_and(|ctor| std::ptr::eq(ctor, function))
        });
        let name = if is_constructor {
            "__init__"
        } else {
            function.name.as_str()
        };

        let mut params = Vec::new();
        if class.is_some() {
            if function.is_static && !is_constructor {
                self.line("@staticmethod");
            } else {
                params.push("self".to_string());
            }
        }
        for param in &function.params {
            let ty = self.ty(&param.ty);
            let splat = if param.is_variadic { "*" } else { "" };
            params.push(match &param.default {
                Some(default) => format!("{}: {ty} = {}", param.name, self.expr(default)),
                None => format!("{splat}{}: {ty}", param.name),
            });
        }
        let returns = match &function.return_type {
            Some(ty) if !is_constructor => format!(" -> {}", self.ty(ty)),
            _ => String::new(),
        };
        let keyword = if function.is_async { "async def" } else { "def" };
        self.line(format!("{keyword} {name}({}){returns}:", params.join(", ")));

        self.code.indent();
        self.docstring(&function.doc);
        let outer = std::mem::replace(&mut self.in_async, function.is_async);
        self.tuple_result = function.return_type.as_ref().is_some_and(Type::is_tuple);
        let has_doc = function.doc.is_some();
        if function.body.is_empty() && !has_doc {
            self.line("pass");
        } else {
            self.stmts(&function.body, has_doc);
        }
        self.in_async = outer;
        self.code.dedent();
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn block(&mut self, body: &[Stmt]) {
        self.code.indent();
        self.stmts(body, false);
        self.code.dedent();
    }

    /// A statement list, padded with `pass` when nothing executable came out.
    fn stmts(&mut self, body: &[Stmt], may_be_empty: bool) {
        for stmt in body {
            self.stmt(stmt);
        }
        let executable = body.iter().any(|s| !matches!(s, Stmt::Unhandled(_)));
        if !executable && !may_be_empty {
            self.line("pass");
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => {
                let text = self.expr(e);
                self.line(text);
            }
            Stmt::Return(None) => self.line("return"),
            Stmt::Return(Some(e)) => {
                let text = match e {
                    Expr::Array(items) if self.tuple_result && !items.is_empty() => self.exprs(items),
                    other => self.expr(other),
                };
                self.line(format!("return {text}"));
            }
            Stmt::Assign {
                target,
                value,
                is_declaration,
                ty,
            } => {
                let lhs = self.expr(target);
                if !is_declaration && let Some((op, rhs)) = compound_parts(target, value) {
                    let rhs = self.expr(rhs);
                    self.line(format!("{lhs} {}= {rhs}", binary_symbol(op)));
                    return;
                }
                let rhs = self.expr(value);
                match ty {
                    Some(ty) if *is_declaration && value.is_null() => {
                        let ty = self.ty(ty);
                        self.line(format!("{lhs}: {ty} = {rhs}"));
                    }
                    _ => self.line(format!("{lhs} = {rhs}")),
                }
            }
            Stmt::If {
                condition,
                then_body,
                else_body,
            } => self.if_chain("if", condition, then_body, else_body),
            Stmt::For {
                iterator,
                iterable,
                body,
            } => {
                let iterable = self.expr(iterable);
                self.line(format!("for {iterator} in {iterable}:"));
                self.block(body);
            }
            Stmt::While { condition, body } => {
                let condition = self.expr(condition);
                self.line(format!("while {condition}:"));
                self.block(body);
            }
            Stmt::Try {
                body,
                catches,
                finally,
            } => self.try_stmt(body, catches, finally),
            Stmt::Throw(value) => self.raise(value),
            Stmt::Break => self.line("break"),
            Stmt::Continue => self.line("continue"),
            Stmt::Spawn(work) => self.spawn(work),
            Stmt::Unhandled(source) => self.line(format!("# {}", placeholder(source))),
        }
    }

    fn if_chain(&mut self, keyword: &str, condition: &Expr, then_body: &[Stmt], else_body: &[Stmt]) {
        let condition = self.expr(condition);
        self.line(format!("{keyword} {condition}:"));
        self.block(then_body);
        match else_body {
            [] => {}
            [
                Stmt::If {
                    condition,
                    then_body,
                    else_body,
                },
            ] => self.if_chain("elif", condition, then_body, else_body),
            _ => {
                self.line("else:");
                self.block(else_body);
            }
        }
    }

    fn try_stmt(&mut self, body: &[Stmt], catches: &[CatchBlock], finally: &[Stmt]) {
        if catches.is_empty() && finally.is_empty() {
            self.stmts(body, false);
            return;
        }
        self.line("try:");
        self.block(body);
        for catch in catches {
            let kind = catch
                .kind
                .as_deref()
                .map(|k| native_error_kind(Language::Python, k));
            let header = match (&kind, &catch.binding) {
                (Some(kind), Some(binding)) => format!("except {kind} as {binding}:"),
                (Some(kind), None) => format!("except {kind}:"),
                (None, Some(binding)) => format!("except Exception as {binding}:"),
                (None, None) => "except:".to_string(),
            };
            self.line(header);
            if let Some(binding) = &catch.binding {
                self.catch_bindings.push(binding.clone());
            }
            self.block(&catch.body);
            if catch.binding.is_some() {
                self.catch_bindings.pop();
            }
        }
        if !finally.is_empty() {
            self.line("finally:");
            self.block(finally);
        }
    }

    fn raise(&mut self, value: &Expr) {
        if let Expr::Ident(name) = value
            && self.catch_bindings.last() == Some(name)
        {
            self.line("raise");
            return;
        }
        let text = match value {
            Expr::Call { callee, args, .. } => match callee.as_ref() {
                Expr::Ident(kind) => {
                    let kind = native_error_kind(Language::Python, kind);
                    let args = self.exprs(args);
                    format!("{kind}({args})")
                }
                _ => self.expr(value),
            },
            Expr::Literal(Literal::String(_)) | Expr::FormatString(_) => {
                format!("Exception({})", self.expr(value))
            }
            other => self.expr(other),
        };
        self.line(format!("raise {text}"));
    }

    fn spawn(&mut self, work: &Expr) {
        if self.in_async {
            self.imports.insert("asyncio");
            let work = self.expr(work);
            self.line(format!("asyncio.create_task({work})"));
            return;
        }
        self.imports.insert("threading");
        let line = match work {
            Expr::Call {
                callee,
                args,
                kwargs,
            } if kwargs.is_empty() => {
                let target = self.expr(callee);
                if args.is_empty() {
                    format!("threading.Thread(target={target}).start()")
                } else {
                    let args = self.exprs(args);
                    let comma = if args.contains(", ") { "" } else { "," };
                    format!("threading.Thread(target={target}, args=({args}{comma})).start()")
                }
            }
            other => {
                let work = self.expr(other);
                format!("threading.Thread(target=lambda: {work}).start()")
            }
        };
        self.line(line);
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn exprs(&mut self, exprs: &[Expr]) -> String {
        exprs
            .iter()
            .map(|e| self.expr(e))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn literal(&self, lit: &Literal) -> String {
        match lit {
            Literal::Null => "None".to_string(),
            Literal::Bool(true) => "True".to_string(),
            Literal::Bool(false) => "False".to_string(),
            Literal::Int(n) => n.to_string(),
            Literal::Float(f) => format_float(*f),
            Literal::String(s) => quoted(s),
        }
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(lit) => self.literal(lit),
            Expr::Ident(name) => name.clone(),
            Expr::Binary { op, left, right } => {
                let left = self.expr(left);
                let right = self.expr(right);
                format!("({left} {} {right})", binary_symbol(*op))
            }
            Expr::Unary { op, operand } => {
                let operand = self.expr(operand);
                match op {
                    UnaryOp::Not => format!("not {operand}"),
                    UnaryOp::Neg => format!("-{operand}"),
                    UnaryOp::BitNot => format!("~{operand}"),
                }
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => {
                let callee = self.expr(callee);
                let mut parts: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                for (name, value) in kwargs {
                    let value = self.expr(value);
                    parts.push(format!("{name}={value}"));
                }
                format!("{callee}({})", parts.join(", "))
            }
            Expr::Member { object, property } => {
                if let Some((en, variant)) = enum_variant(self.module, expr) {
                    return format!(
                        "{}.{}",
                        en.name,
                        naming::to_screaming_snake_case(&variant.name)
                    );
                }
                let object = self.expr(object);
                format!("{object}.{property}")
            }
            Expr::Index { object, index } => {
                let object = self.expr(object);
                let index = self.expr(index);
                format!("{object}[{index}]")
            }
            Expr::Array(items) => format!("[{}]", self.exprs(items)),
            Expr::Map(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", self.expr(k), self.expr(v)))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            Expr::StructLiteral { type_name, fields } => {
                let module = self.module;
                let fields: Vec<String> = struct_fields(module, type_name, fields)
                    .into_iter()
                    .map(|(name, value)| {
                        let value = self.expr(value);
                        match name {
                            Some(name) => format!("{name}={value}"),
                            None => value,
                        }
                    })
                    .collect();
                format!("{type_name}({})", fields.join(", "))
            }
            Expr::Comprehension(c) => self.comprehension(c),
            Expr::Lambda { params, body } => {
                let body = match body {
                    LambdaBody::Expr(e) => self.expr(e),
                    LambdaBody::Block(stmts) => match stmts.as_slice() {
                        [Stmt::Return(Some(e))] | [Stmt::Expr(e)] => self.expr(e),
                        [] => "None".to_string(),
                        _ => {
                            self.notes.push(placeholder("multi-statement lambda"));
                            "None".to_string()
                        }
                    },
                };
                if params.is_empty() {
                    format!("lambda: {body}")
                } else {
                    format!("lambda {}: {body}", params.join(", "))
                }
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.expr(condition);
                let then = self.expr(then);
                let otherwise = self.expr(otherwise);
                format!("({then} if {condition} else {otherwise})")
            }
            Expr::Await(inner) => format!("await {}", self.expr(inner)),
            Expr::FormatString(parts) => {
                let mut out = String::from("f\"");
                for part in parts {
                    match part {
                        FormatPart::Text(text) => out.push_str(
                            &super::escape_string(text)
                                .replace('{', "{{")
                                .replace('}', "}}"),
                        ),
                        FormatPart::Expr(e) => {
                            let text = self.expr(e);
                            out.push('{');
                            out.push_str(&text.replace('"', "'"));
                            out.push('}');
                        }
                    }
                }
                out.push('"');
                out
            }
            Expr::Unhandled(source) => {
                self.notes.push(placeholder(source));
                "None".to_string()
            }
        }
    }

    fn comprehension(&mut self, c: &Comprehension) -> String {
        let target = self.expr(&c.target);
        let iterable = self.expr(&c.iterable);
        let condition = match &c.condition {
            Some(cond) => format!(" if {}", self.expr(cond)),
            None => String::new(),
        };
        let clause = format!("for {} in {iterable}{condition}", c.iterator);
        match c.kind {
            ComprehensionKind::List => format!("[{target} {clause}]"),
            ComprehensionKind::Set => format!("{{{target} {clause}}}"),
            ComprehensionKind::Generator => format!("({target} {clause})"),
            ComprehensionKind::Dict => {
                let value = match &c.value {
                    Some(v) => self.expr(v),
                    None => c.iterator.clone(),
                };
                format!("{{{target}: {value} {clause}}}")
            }
        }
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::In => "in",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Pow => "**",
        other => other.c_symbol(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::error_tuple::error_value;

    fn write(module: &Module) -> String {
        PYTHON_WRITER.write(module).unwrap()
    }

    #[test]
    fn test_typed_function() {
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
        assert!(out.contains("def calculate(a: int, b: int) -> int:\n    return (a + b)\n"));
        assert!(!out.contains("import"));
    }

    #[test]
    fn test_dataclass_and_named_construction() {
        let mut module = Module::new("users");
        module.types.push(TypeDefinition::new(
            "User",
            vec![
                Property::new("name", Type::string()),
                Property::new("tags", Type::array(Type::string())),
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
                        FieldInit::named("tags", Expr::array(vec![])),
                    ],
                }))],
            )
            .returning(Type::new("User")),
        );
        let out = write(&module);
        assert!(out.contains("from dataclasses import dataclass"));
        assert!(out.contains("from typing import List"));
        assert!(out.contains("@dataclass\nclass User:\n    name: str\n    tags: List[str]\n"));
        assert!(out.contains("return User(name=\"Alice\", tags=[])"));
    }

    #[test]
    fn test_plain_class_without_dataclasses() {
        let mut module = Module::new("users");
        module.types.push(TypeDefinition::new(
            "Point",
            vec![Property::new("x", Type::int())],
        ));
        let mut config = TranslateConfig::default();
        config.python.dataclasses = false;
        let out = PYTHON_WRITER.write_with_config(&module, &config).unwrap();
        assert!(out.contains("def __init__(self, x: int):\n        self.x = x"));
        assert!(!out.contains("dataclass"));
    }

    #[test]
    fn test_comprehension_and_raise() {
        let mut module = Module::new("m");
        module.functions.push(
            Function::new(
                "positives",
                vec![Param::new("items", Type::array(Type::int()))],
                vec![
                    Stmt::if_stmt(
                        Expr::binary(
                            Expr::call(Expr::ident("len"), vec![Expr::ident("items")]),
                            BinaryOp::Eq,
                            Expr::int(0),
                        ),
                        vec![Stmt::Throw(error_value("Error", Expr::string("empty")))],
                        vec![],
                    ),
                    Stmt::return_stmt(Some(Expr::comprehension(Comprehension {
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
                    }))),
                ],
            )
            .returning(Type::array(Type::int()))
            .throwing("Error"),
        );
        let out = write(&module);
        assert!(out.contains("raise Exception(\"empty\")"));
        assert!(out.contains("return [(x * 2) for x in items if (x > 0)]"));
    }

    #[test]
    fn test_class_async_and_spawn() {
        let mut module = Module::new("jobs");
        let mut class = Class::new("Worker");
        class.properties.push(Property::new("count", Type::int()));
        class.constructor = Some(Function::new(
            CONSTRUCTOR_NAME,
            vec![],
            vec![Stmt::assign(
                Expr::member(Expr::ident("self"), "count"),
                Expr::int(0),
            )],
        ));
        class.methods.push(
            Function::new(
                "run",
                vec![],
                vec![
                    Stmt::Spawn(Expr::call(Expr::ident("tick"), vec![])),
                    Stmt::expr(Expr::await_expr(Expr::call(Expr::ident("tick"), vec![]))),
                ],
            )
            .asynchronous(),
        );
        module.classes.push(class);
        module.functions.push(Function::new(
            "launch",
            vec![Param::new("n", Type::int())],
            vec![Stmt::Spawn(Expr::call(Expr::ident("work"), vec![Expr::ident("n")]))],
        ));
        let out = write(&module);
        assert!(out.contains("import asyncio\nimport threading"));
        assert!(out.contains("class Worker:\n    count: int\n\n    def __init__(self):"));
        assert!(out.contains("    async def run(self):\n        asyncio.create_task(tick())"));
        assert!(out.contains("await tick()"));
        assert!(out.contains("threading.Thread(target=work, args=(n,)).start()"));
    }

    #[test]
    fn test_enum_and_unhandled() {
        let mut module = Module::new("m");
        module.enums.push(Enum {
            name: "Level".into(),
            variants: vec![EnumVariant::new("low"), EnumVariant::new("high")],
        });
        module.functions.push(Function::new(
            "f",
            vec![],
            vec![
                Stmt::Unhandled("goto end".into()),
                Stmt::assign(
                    Expr::ident("lvl"),
                    Expr::member(Expr::ident("Level"), "high"),
                ),
            ],
        ));
        let out = write(&module);
        assert!(out.contains("class Level(Enum):\n    LOW = 0\n    HIGH = 1"));
        assert!(out.contains("# unhandled: goto end"));
        assert!(out.contains("lvl = Level.HIGH"));
    }
}
