//! C# writer.
//!
//! Emits a [`Module`] as a C# file with a file-scoped namespace. Structs
//! and classes get auto-properties; module-level functions and constants
//! live in one static class. Comprehensions become LINQ chains.

use super::{
    Code, Scope, compound_parts, enum_literals, enum_variant, escape_string, format_float,
    infer_return_types, keeps_case, pair_source, placeholder, quoted, struct_fields, validate,
};
use crate::config::{CSharpConfig, TranslateConfig};
use crate::ir::*;
use crate::naming;
use crate::patterns::as_range;
use crate::patterns::error_tuple::{error_value, is_error_kind, native_error_kind, thrown_parts};
use crate::traits::{GenerationError, Writer};
use crate::types::{Language, from_canonical, infer_type};
use std::collections::BTreeSet;

/// Static instance of the C# writer for the registry.
pub static CSHARP_WRITER: CSharpWriter = CSharpWriter;

pub struct CSharpWriter;

impl Writer for CSharpWriter {
    fn language(&self) -> &'static str {
        "csharp"
    }

    fn extension(&self) -> &'static str {
        "cs"
    }

    fn write_with_config(
        &self,
        module: &Module,
        config: &TranslateConfig,
    ) -> Result<String, GenerationError> {
        validate(module)?;
        let module = infer_return_types(module);
        Ok(Emitter::new(&module, &config.csharp).emit())
    }
}

const KEYWORDS: &[&str] = &[
    "base", "bool", "break", "case", "catch", "char", "checked", "class", "const", "continue",
    "decimal", "default", "delegate", "do", "double", "else", "event", "explicit", "extern",
    "false", "finally", "fixed", "float", "for", "foreach", "goto", "if", "implicit", "in",
    "int", "interface", "internal", "is", "lock", "long", "namespace", "new", "null", "object",
    "operator", "out", "override", "params", "private", "protected", "public", "readonly",
    "ref", "return", "sealed", "short", "sizeof", "static", "string", "struct", "switch",
    "this", "throw", "true", "try", "typeof", "uint", "unchecked", "using", "virtual", "void",
    "volatile", "while",
];

fn cs_type(ty: &Type) -> String {
    from_canonical(Language::CSharp, ty)
}

/// Text of an interpolated string, braces doubled.
fn interpolation_text(text: &str) -> String {
    escape_string(text).replace('{', "{{").replace('}', "}}")
}

struct Emitter<'m> {
    module: &'m Module,
    config: &'m CSharpConfig,
    code: Code,
    usings: BTreeSet<&'static str>,
    scope: Scope<'m>,
    /// Class whose members are being written; `None` inside the functions class.
    class: Option<&'m Class>,
    returns: Option<Type>,
    catch_bindings: Vec<String>,
    /// Pair names bound to `entry.Key` / `entry.Value` inside a LINQ lambda.
    aliases: Vec<(String, String)>,
}

impl<'m> Emitter<'m> {
    fn new(module: &'m Module, config: &'m CSharpConfig) -> Self {
        Self {
            module,
            config,
            code: Code::new(" ".repeat(config.indent)),
            usings: BTreeSet::new(),
            scope: Scope::new(module),
            class: None,
            returns: None,
            catch_bindings: Vec::new(),
            aliases: Vec::new(),
        }
    }

    fn emit(mut self) -> String {
        let module = self.module;
        for en in &module.enums {
            self.code.blank();
            self.enumeration(en);
        }
        for def in &module.types {
            self.code.blank();
            self.doc(&def.doc);
            self.code.line(format!("public class {}", def.name));
            self.code.line("{");
            self.code.indent();
            self.properties(&def.fields);
            self.code.dedent();
            self.code.line("}");
        }
        for class in &module.classes {
            self.code.blank();
            self.class(class);
        }
        if !module.constants.is_empty() || !module.functions.is_empty() {
            self.code.blank();
            self.functions_class();
        }

        let body = std::mem::replace(&mut self.code, Code::new("")).finish();
        let namespace = self
            .config
            .namespace
            .clone()
            .unwrap_or_else(|| naming::to_pascal_case(&module.name));
        let mut out = String::new();
        for using in &self.usings {
            out.push_str(&format!("using {using};\n"));
        }
        if !self.usings.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("namespace {namespace};\n"));
        if !body.trim().is_empty() {
            out.push('\n');
            out.push_str(&body);
        }
        out
    }

    fn ty(&mut self, ty: &Type) -> String {
        if ty.is_array() || ty.is_map() || ty.generic_args.iter().any(|t| t.is_array() || t.is_map())
        {
            self.usings.insert("System.Collections.Generic");
        }
        cs_type(ty)
    }

    fn doc(&mut self, doc: &Option<String>) {
        if let Some(doc) = doc {
            self.code.line("/// <summary>");
            for line in doc.lines() {
                self.code.line(format!("/// {}", line.trim()).trim_end());
            }
            self.code.line("/// </summary>");
        }
    }

    // ========================================================================
    // Names
    // ========================================================================

    fn local(name: &str) -> String {
        let camel = naming::to_camel_case(name);
        if KEYWORDS.contains(&camel.as_str()) {
            format!("@{camel}")
        } else {
            camel
        }
    }

    fn member(name: &str) -> String {
        naming::to_pascal_case(name)
    }

    /// Prefix reaching the functions class from inside another class.
    fn functions_prefix(&self) -> String {
        match self.class {
            Some(_) => format!("{}.", self.config.functions_class),
            None => String::new(),
        }
    }

    fn ident(&self, name: &str) -> String {
        if name == "self" {
            return "this".to_string();
        }
        if let Some((_, alias)) = self.aliases.iter().rev().find(|(n, _)| n == name) {
            return alias.clone();
        }
        if self.scope.local(name).is_none() {
            if self.module.function(name).is_some() {
                return format!("{}{}", self.functions_prefix(), Self::member(name));
            }
            if self.module.constants.iter().any(|c| c.name == name) {
                return format!(
                    "{}{}",
                    self.functions_prefix(),
                    naming::to_screaming_snake_case(name)
                );
            }
        }
        if keeps_case(name) {
            return name.to_string();
        }
        Self::local(name)
    }

    fn find_class(&self, name: &str) -> Option<&'m Class> {
        self.module.classes.iter().find(|c| c.name == name)
    }

    /// An exception class C# knows: declared here, or ending in `Exception`.
    fn exception_kind(&self, kind: &str) -> String {
        let native = native_error_kind(Language::CSharp, kind);
        if native.ends_with("Exception") || self.module.declares_type(&native) {
            native
        } else {
            "Exception".to_string()
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn enumeration(&mut self, en: &Enum) {
        let values = enum_literals(en);
        let counts_from_zero = values
            .iter()
            .enumerate()
            .all(|(i, v)| *v == Literal::Int(i as i64));
        self.code.line(format!("public enum {}", en.name));
        self.code.line("{");
        self.code.indent();
        for (variant, value) in en.variants.iter().zip(&values) {
            let name = naming::to_pascal_case(&variant.name);
            match value {
                Literal::Int(n) if !counts_from_zero => self.code.line(format!("{name} = {n},")),
                _ => self.code.line(format!("{name},")),
            }
        }
        self.code.dedent();
        self.code.line("}");
    }

    fn properties(&mut self, properties: &[Property]) {
        for property in properties {
            let ty = self.ty(&property.ty);
            let name = Self::member(&property.name);
            match &property.default {
                Some(default) => {
                    let value = self.expr_hint(default, Some(&property.ty));
                    self.code
                        .line(format!("public {ty} {name} {{ get; set; }} = {value};"));
                }
                None => self.code.line(format!("public {ty} {name} {{ get; set; }}")),
            }
        }
    }

    fn class(&mut self, class: &'m Class) {
        self.doc(&class.doc);
        let bases = if class.bases.is_empty() {
            String::new()
        } else {
            format!(" : {}", class.bases.join(", "))
        };
        self.code.line(format!("public class {}{bases}", class.name));
        self.code.line("{");
        self.code.indent();
        self.properties(&class.properties);
        let mut first = class.properties.is_empty();
        if let Some(ctor) = &class.constructor {
            if !first {
                self.code.blank();
            }
            first = false;
            self.function(ctor, Some(class), true);
        }
        for method in &class.methods {
            if !first {
                self.code.blank();
            }
            first = false;
            self.function(method, Some(class), false);
        }
        self.code.dedent();
        self.code.line("}");
    }

    fn functions_class(&mut self) {
        let module = self.module;
        self.code
            .line(format!("public static class {}", self.config.functions_class));
        self.code.line("{");
        self.code.indent();
        self.class = None;
        self.scope = Scope::new(module);
        for var in &module.constants {
            let ty = var
                .ty
                .clone()
                .or_else(|| infer_type(&var.value))
                .unwrap_or_else(Type::any);
            let rendered = self.ty(&ty);
            let name = naming::to_screaming_snake_case(&var.name);
            let value = self.expr_hint(&var.value, Some(&ty));
            let is_literal = matches!(
                var.value,
                Expr::Literal(Literal::Int(_) | Literal::Float(_) | Literal::Bool(_) | Literal::String(_))
            );
            let line = match (var.is_constant, is_literal) {
                (true, true) => format!("public const {rendered} {name} = {value};"),
                (true, false) => format!("public static readonly {rendered} {name} = {value};"),
                (false, _) => format!("public static {rendered} {name} = {value};"),
            };
            self.code.line(line);
        }
        let mut first = module.constants.is_empty();
        for function in &module.functions {
            if !first {
                self.code.blank();
            }
            first = false;
            self.function(function, None, false);
        }
        self.code.dedent();
        self.code.line("}");
    }

    fn result_type(&mut self, function: &Function) -> String {
        let value = function.return_type.as_ref().map(|t| self.ty(t));
        if function.is_async {
            self.usings.insert("System.Threading.Tasks");
            match value {
                Some(v) => format!("Task<{v}>"),
                None => "Task".to_string(),
            }
        } else {
            value.unwrap_or_else(|| "void".to_string())
        }
    }

    fn function(&mut self, function: &'m Function, class: Option<&'m Class>, is_ctor: bool) {
        self.scope = Scope::for_function(self.module, class.map(|c| c.name.as_str()), function);
        self.class = class;
        self.returns = function.return_type.clone();
        self.doc(&function.doc);
        let params: Vec<String> = function
            .params
            .iter()
            .map(|p| {
                let name = Self::local(&p.name);
                let default = p
                    .default
                    .as_ref()
                    .map(|d| format!(" = {}", self.expr(d)))
                    .unwrap_or_default();
                if p.is_variadic {
                    format!("params {}[] {name}{default}", self.ty(&p.ty))
                } else {
                    format!("{} {name}{default}", self.ty(&p.ty))
                }
            })
            .collect();
        let header = if let Some(class) = class.filter(|_| is_ctor) {
            format!("public {}({})", class.name, params.join(", "))
        } else {
            let modifiers = match (class.is_none() || function.is_static, function.is_async) {
                (true, true) => "public static async",
                (true, false) => "public static",
                (false, true) => "public async",
                (false, false) => "public",
            };
            let result = self.result_type(function);
            format!(
                "{modifiers} {result} {}({})",
                Self::member(&function.name),
                params.join(", ")
            )
        };
        self.code.line(header);
        self.code.line("{");
        self.block(&function.body);
        self.code.line("}");
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

    /// `{ body }` on its own lines.
    fn braced(&mut self, body: &[Stmt]) {
        self.code.line("{");
        self.block(body);
        self.code.line("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => {
                let text = self.expr(e);
                self.code.line(format!("{text};"));
            }
            Stmt::Return(value) => {
                let line = match value {
                    Some(v) => {
                        let hint = self.returns.clone();
                        format!("return {};", self.expr_hint(v, hint.as_ref()))
                    }
                    None => "return;".to_string(),
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
                let condition = self.expr(condition);
                self.code.line(format!("if ({})", strip_parens(&condition)));
                self.else_chain(then_body, else_body);
            }
            Stmt::For {
                iterator,
                iterable,
                body,
            } => {
                let header = self.for_header(iterator, iterable);
                self.code.line(header);
                self.braced(body);
            }
            Stmt::While { condition, body } => {
                let condition = self.expr(condition);
                self.code
                    .line(format!("while ({})", strip_parens(&condition)));
                self.braced(body);
            }
            Stmt::Try {
                body,
                catches,
                finally,
            } => {
                self.code.line("try");
                self.braced(body);
                for catch in catches {
                    self.usings.insert("System");
                    let kind = self.exception_kind(catch.kind.as_deref().unwrap_or("Error"));
                    let header = match &catch.binding {
                        Some(binding) => format!("catch ({kind} {})", Self::local(binding)),
                        None if catch.kind.is_none() => "catch".to_string(),
                        None => format!("catch ({kind})"),
                    };
                    self.code.line(header);
                    self.catch_bindings.extend(catch.binding.clone());
                    self.braced(&catch.body);
                    if catch.binding.is_some() {
                        self.catch_bindings.pop();
                    }
                }
                if !finally.is_empty() {
                    self.code.line("finally");
                    self.braced(finally);
                }
            }
            Stmt::Throw(value) => {
                let line = match value {
                    Expr::Ident(name) if self.catch_bindings.last() == Some(name) => {
                        "throw;".to_string()
                    }
                    other => format!("throw {};", self.thrown(other)),
                };
                self.code.line(line);
            }
            Stmt::Break => self.code.line("break;"),
            Stmt::Continue => self.code.line("continue;"),
            Stmt::Spawn(work) => {
                self.usings.insert("System.Threading.Tasks");
                let work = self.expr(work);
                self.code.line(format!("Task.Run(() => {work});"));
            }
            Stmt::Unhandled(source) => self.code.line(format!("// {}", placeholder(source))),
        }
    }

    fn else_chain(&mut self, then_body: &[Stmt], else_body: &[Stmt]) {
        self.braced(then_body);
        match else_body {
            [] => {}
            [
                Stmt::If {
                    condition,
                    then_body,
                    else_body,
                },
            ] => {
                let condition = self.expr(condition);
                self.code
                    .line(format!("else if ({})", strip_parens(&condition)));
                self.else_chain(then_body, else_body);
            }
            _ => {
                self.code.line("else");
                self.braced(else_body);
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr, is_declaration: bool, ty: Option<&Type>) {
        if is_declaration {
            let name = match target {
                Expr::Ident(name) => Self::local(name),
                Expr::Array(items) => {
                    let names: Vec<String> = items.iter().map(|i| self.expr(i)).collect();
                    let rhs = self.expr(value);
                    self.code
                        .line(format!("var ({}) = {rhs};", names.join(", ")));
                    return;
                }
                other => self.expr(other),
            };
            let declared = ty.cloned().or_else(|| self.scope.type_of(target));
            if value.is_null() {
                let ty = declared.unwrap_or_else(Type::any).optional();
                let ty = self.ty(&ty);
                self.code.line(format!("{ty} {name} = null;"));
                return;
            }
            let rhs = self.expr_hint(value, declared.as_ref());
            match ty {
                Some(ty) if infer_type(value).is_some_and(|t| t != *ty) => {
                    let ty = self.ty(ty);
                    self.code.line(format!("{ty} {name} = {rhs};"));
                }
                _ => self.code.line(format!("var {name} = {rhs};")),
            }
            return;
        }
        if let Some((op, rhs)) = compound_parts(target, value) {
            let rhs = self.expr(rhs);
            let lhs = self.expr(target);
            self.code.line(format!("{lhs} {}= {rhs};", op.c_symbol()));
            return;
        }
        let hint = self.scope.type_of(target);
        let rhs = self.expr_hint(value, hint.as_ref());
        let lhs = self.expr(target);
        self.code.line(format!("{lhs} = {rhs};"));
    }

    fn for_header(&mut self, iterator: &str, iterable: &Expr) -> String {
        if let Some((start, end)) = as_range(iterable) {
            let var = Self::local(iterator);
            let start = self.expr(&start);
            let end = self.expr(end);
            return format!("for (var {var} = {start}; {var} < {end}; {var}++)");
        }
        let names: Vec<String> = iterator.split(',').map(|n| Self::local(n.trim())).collect();
        let source = self.expr(pair_source(iterable));
        match names.as_slice() {
            [single] => format!("foreach (var {single} in {source})"),
            many => format!("foreach (var ({}) in {source})", many.join(", ")),
        }
    }

    /// `new Exception("message")` for a thrown value.
    fn thrown(&mut self, value: &Expr) -> String {
        self.usings.insert("System");
        match thrown_parts(value) {
            Some((kind, message)) => {
                let kind = self.exception_kind(kind);
                let message = message.map(|m| self.expr(m)).unwrap_or_default();
                format!("new {kind}({message})")
            }
            None => match value {
                Expr::Literal(Literal::String(_)) | Expr::FormatString(_) => {
                    format!("new Exception({})", self.expr(value))
                }
                other => self.expr(other),
            },
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn args(&mut self, args: &[Expr], kwargs: &[(String, Expr)]) -> String {
        let mut out: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
        for (name, value) in kwargs {
            let value = self.expr(value);
            out.push(format!("{}: {value}", Self::local(name)));
        }
        out.join(", ")
    }

    fn call(&mut self, callee: &Expr, args: &[Expr], kwargs: &[(String, Expr)]) -> String {
        if let Some(text) = self.builtin_call(callee, args) {
            return text;
        }
        match callee {
            Expr::Ident(name) if self.scope.local(name).is_none() => {
                if self.find_class(name).is_some() {
                    return format!("new {name}({})", self.args(args, kwargs));
                }
                if self.module.types.iter().any(|t| t.name == *name) {
                    let fields: Vec<FieldInit> =
                        args.iter().cloned().map(FieldInit::positional).collect();
                    return self.struct_literal(name, &fields);
                }
                let name = self.ident(name);
                format!("{name}({})", self.args(args, kwargs))
            }
            Expr::Member { object, property } => {
                let object = self.expr(object);
                format!(
                    "{object}.{}({})",
                    Self::member(property),
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
                        self.usings.insert("System");
                        let text = match args {
                            [] => String::new(),
                            [single] => self.expr(single),
                            many => {
                                let parts: Vec<FormatPart> = many
                                    .iter()
                                    .enumerate()
                                    .flat_map(|(i, a)| {
                                        let sep = (i > 0).then(|| FormatPart::Text(" ".into()));
                                        sep.into_iter().chain([FormatPart::Expr(a.clone())])
                                    })
                                    .collect();
                                self.expr(&Expr::FormatString(parts))
                            }
                        };
                        Some(format!("Console.WriteLine({text})"))
                    }
                    ("len", [arg]) => {
                        let property = if self.scope.is_string(arg) {
                            "Length"
                        } else {
                            "Count"
                        };
                        Some(format!("{}.{property}", self.expr(arg)))
                    }
                    ("range", [_] | [_, _]) => {
                        let range = Expr::call(callee.clone(), args.to_vec());
                        let (start, end) = as_range(&range)?;
                        self.usings.insert("System.Linq");
                        Some(self.enumerable_range(&start, end))
                    }
                    (kind, _) if is_error_kind(kind) => {
                        let value = Expr::call(callee.clone(), args.to_vec());
                        Some(self.thrown(&value))
                    }
                    _ => None,
                }
            }
            Expr::Member { object, property } => match (property.as_str(), args) {
                ("append", [value]) => {
                    let object = self.expr(object);
                    let value = self.expr(value);
                    Some(format!("{object}.Add({value})"))
                }
                ("items", []) => Some(self.expr(object)),
                ("keys" | "values", []) if self.scope.is_map(object) => {
                    Some(format!("{}.{}", self.expr(object), Self::member(property)))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// `Enumerable.Range(start, count)` from exclusive bounds.
    fn enumerable_range(&mut self, start: &Expr, end: &Expr) -> String {
        let end_text = self.expr(end);
        match start {
            Expr::Literal(Literal::Int(0)) => format!("Enumerable.Range(0, {end_text})"),
            other => {
                let start_text = self.expr(other);
                format!("Enumerable.Range({start_text}, {end_text} - {start_text})")
            }
        }
    }

    fn struct_literal(&mut self, type_name: &str, fields: &[FieldInit]) -> String {
        if is_error_kind(type_name) {
            let message = fields
                .first()
                .map(|f| f.value.clone())
                .unwrap_or_else(|| Expr::string(type_name));
            let value = error_value(type_name, message);
            return self.thrown(&value);
        }
        let module = self.module;
        let resolved = struct_fields(module, type_name, fields);
        if resolved.iter().any(|(name, _)| name.is_none()) {
            let args: Vec<String> = resolved.into_iter().map(|(_, v)| self.expr(v)).collect();
            return format!("new {type_name}({})", args.join(", "));
        }
        let declared: Vec<Property> = module
            .types
            .iter()
            .find(|t| t.name == type_name)
            .map(|t| t.fields.clone())
            .or_else(|| self.find_class(type_name).map(|c| c.properties.clone()))
            .unwrap_or_default();
        let parts: Vec<String> = resolved
            .into_iter()
            .filter_map(|(name, value)| {
                let name = name?;
                let hint = declared.iter().find(|p| p.name == name).map(|p| p.ty.clone());
                let value = self.expr_hint(value, hint.as_ref());
                Some(format!("{} = {value}", Self::member(&name)))
            })
            .collect();
        if parts.is_empty() {
            return format!("new {type_name}()");
        }
        format!("new {type_name} {{ {} }}", parts.join(", "))
    }

    /// Collection literals take their element types from `hint`.
    fn expr_hint(&mut self, expr: &Expr, hint: Option<&Type>) -> String {
        let ty = hint
            .filter(|h| h.name != "any")
            .cloned()
            .or_else(|| self.scope.type_of(expr));
        match (expr, ty) {
            (Expr::Array(items), Some(ty)) if ty.is_array() => {
                let element = ty.element().cloned().unwrap_or_else(Type::any);
                let rendered = self.ty(&ty);
                if items.is_empty() {
                    return format!("new {rendered}()");
                }
                let items: Vec<String> = items
                    .iter()
                    .map(|i| self.expr_hint(i, Some(&element)))
                    .collect();
                format!("new {rendered} {{ {} }}", items.join(", "))
            }
            (Expr::Array(items), Some(ty)) if ty.is_tuple() => {
                let items: Vec<String> = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.expr_hint(item, ty.generic_args.get(i)))
                    .collect();
                format!("({})", items.join(", "))
            }
            (Expr::Map(entries), Some(ty)) if ty.is_map() => {
                let rendered = self.ty(&ty);
                if entries.is_empty() {
                    return format!("new {rendered}()");
                }
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| {
                        let key = self.expr_hint(k, ty.generic_args.first());
                        let value = self.expr_hint(v, ty.generic_args.get(1));
                        format!("[{key}] = {value}")
                    })
                    .collect();
                format!("new {rendered} {{ {} }}", entries.join(", "))
            }
            _ => self.expr(expr),
        }
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
                    UnaryOp::BitNot => format!("~{operand}"),
                }
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => self.call(callee, args, kwargs),
            Expr::Member { object, property } => {
                if let Some((en, variant)) = enum_variant(self.module, expr) {
                    return format!("{}.{}", en.name, naming::to_pascal_case(&variant.name));
                }
                let object = self.expr(object);
                format!("{object}.{}", Self::member(property))
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
                    None => "null".to_string(),
                }
            }
            Expr::StructLiteral { type_name, fields } => self.struct_literal(type_name, fields),
            Expr::Comprehension(c) => self.comprehension(c),
            Expr::Lambda { params, body } => self.lambda(params, body),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.expr(condition);
                let then = self.expr(then);
                let otherwise = self.expr(otherwise);
                format!("({condition} ? {then} : {otherwise})")
            }
            Expr::Await(inner) => format!("await {}", self.expr(inner)),
            Expr::FormatString(parts) => {
                let mut out = String::from("$\"");
                for part in parts {
                    match part {
                        FormatPart::Text(text) => out.push_str(&interpolation_text(text)),
                        FormatPart::Expr(e) => {
                            out.push('{');
                            out.push_str(&self.expr(e));
                            out.push('}');
                        }
                    }
                }
                out.push('"');
                out
            }
            Expr::Unhandled(source) => format!("default /* {} */", placeholder(source)),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> String {
        match op {
            BinaryOp::In => {
                let method = if self.scope.is_map(right) {
                    "ContainsKey"
                } else {
                    "Contains"
                };
                let haystack = self.expr(right);
                let needle = self.expr(left);
                format!("{haystack}.{method}({needle})")
            }
            BinaryOp::Pow => {
                self.usings.insert("System");
                let is_int = self.scope.type_of(left).is_some_and(|t| t.name == "int");
                let base = self.expr(left);
                let exp = self.expr(right);
                if is_int {
                    format!("(int)Math.Pow({base}, {exp})")
                } else {
                    format!("Math.Pow({base}, {exp})")
                }
            }
            BinaryOp::FloorDiv => {
                let is_float = self.scope.type_of(left).is_some_and(|t| t.name == "float");
                let l = self.expr(left);
                let r = self.expr(right);
                if is_float {
                    self.usings.insert("System");
                    format!("Math.Floor({l} / {r})")
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

    /// `xs.Where(x => c).Select(x => t).ToList()`.
    fn comprehension(&mut self, c: &Comprehension) -> String {
        self.usings.insert("System.Linq");
        let mut inner = self.scope.clone();
        for (name, ty) in self.scope.iteration_bindings(&c.iterator, &c.iterable) {
            inner.bind(&name, ty);
        }
        let outer = std::mem::replace(&mut self.scope, inner);

        let aliased = self.aliases.len();
        let var = match c.iterator.split(',').map(str::trim).collect::<Vec<_>>().as_slice() {
            [key, value] => {
                self.aliases.push((key.to_string(), "entry.Key".into()));
                self.aliases.push((value.to_string(), "entry.Value".into()));
                "entry".to_string()
            }
            _ => Self::local(&c.iterator),
        };
        let mut chain = match as_range(&c.iterable) {
            Some((start, end)) => self.enumerable_range(&start, end),
            None => self.expr(pair_source(&c.iterable)),
        };
        if let Some(condition) = &c.condition {
            let condition = self.expr(condition);
            chain.push_str(&format!(".Where({var} => {condition})"));
        }
        let target = self.expr(&c.target);
        match c.kind {
            ComprehensionKind::Dict => {
                let value = match &c.value {
                    Some(v) => self.expr(v),
                    None => target.clone(),
                };
                chain.push_str(&format!(".ToDictionary({var} => {target}, {var} => {value})"));
            }
            kind => {
                chain.push_str(&format!(".Select({var} => {target})"));
                match kind {
                    ComprehensionKind::List => chain.push_str(".ToList()"),
                    ComprehensionKind::Set => chain.push_str(".ToHashSet()"),
                    _ => {}
                }
            }
        }

        self.aliases.truncate(aliased);
        self.scope = outer;
        chain
    }

    fn lambda(&mut self, params: &[String], body: &LambdaBody) -> String {
        let params = match params {
            [single] => Self::local(single),
            many => format!(
                "({})",
                many.iter().map(|p| Self::local(p)).collect::<Vec<_>>().join(", ")
            ),
        };
        match body {
            LambdaBody::Expr(e) => format!("{params} => {}", self.expr(e)),
            LambdaBody::Block(stmts) => {
                let prefix = self.code.prefix();
                let unit = " ".repeat(self.config.indent);
                let outer = std::mem::replace(&mut self.code, Code::new(unit.clone()));
                self.stmts(stmts);
                let inner = std::mem::replace(&mut self.code, outer).finish();
                let mut out = format!("{params} =>\n{prefix}{{\n");
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

/// `(a < b)` as `a < b` where the parentheses enclose the whole text.
fn strip_parens(text: &str) -> &str {
    let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) else {
        return text;
    };
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return text;
                }
            }
            _ => {}
        }
    }
    if depth == 0 { inner } else { text }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "null".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(n) => n.to_string(),
        Literal::Float(f) => format_float(*f),
        Literal::String(s) => quoted(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(module: &Module) -> String {
        CSHARP_WRITER.write(module).unwrap()
    }

    #[test]
    fn test_namespace_and_functions_class() {
        let mut module = Module::new("geometry");
        module.constants.push(ModuleVar {
            name: "MAX_SIDES".into(),
            ty: None,
            value: Expr::int(8),
            is_constant: true,
        });
        module.functions.push(
            Function::new(
                "add",
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
        assert!(out.starts_with("namespace Geometry;\n"));
        assert!(out.contains("public static class Functions\n{\n    public const int MAX_SIDES = 8;\n\n    public static int Add(int a, int b)\n    {\n        return (a + b);\n    }\n}"));
    }

    #[test]
    fn test_properties_and_object_initializer() {
        let mut module = Module::new("users");
        module.types.push(TypeDefinition::new(
            "User",
            vec![
                Property::new("name", Type::string()),
                Property::new("scores", Type::map(Type::string(), Type::int())),
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
                        FieldInit::named(
                            "scores",
                            Expr::Map(vec![(Expr::string("a"), Expr::int(1))]),
                        ),
                    ],
                }))],
            )
            .returning(Type::new("User")),
        );
        let out = write(&module);
        assert!(out.starts_with("using System.Collections.Generic;\n\nnamespace Users;\n"));
        assert!(out.contains("    public string Name { get; set; }\n    public Dictionary<string, int> Scores { get; set; }\n"));
        assert!(out.contains(
            "return new User { Name = \"Alice\", Scores = new Dictionary<string, int> { [\"a\"] = 1 } };"
        ));
    }

    #[test]
    fn test_linq_and_async() {
        let mut module = Module::new("m");
        module.functions.push(
            Function::new(
                "positives",
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
            .returning(Type::array(Type::int()))
            .asynchronous(),
        );
        let out = write(&module);
        assert!(out.contains("using System.Linq;"));
        assert!(out.contains("using System.Threading.Tasks;"));
        assert!(out.contains("public static async Task<List<int>> Positives(List<int> items)"));
        assert!(out.contains("return items.Where(x => (x > 0)).Select(x => (x * 2)).ToList();"));
    }

    #[test]
    fn test_class_try_and_throw() {
        let mut module = Module::new("bank");
        let mut class = Class::new("Account");
        class.properties.push(Property::new("balance", Type::float()));
        class.methods.push(
            Function::new(
                "withdraw",
                vec![Param::new("amount", Type::float())],
                vec![
                    Stmt::if_stmt(
                        Expr::binary(
                            Expr::ident("amount"),
                            BinaryOp::Gt,
                            Expr::member(Expr::ident("self"), "balance"),
                        ),
                        vec![Stmt::Throw(error_value("ValueError", Expr::string("too much")))],
                        vec![],
                    ),
                    Stmt::assign(
                        Expr::member(Expr::ident("self"), "balance"),
                        Expr::binary(
                            Expr::member(Expr::ident("self"), "balance"),
                            BinaryOp::Sub,
                            Expr::ident("amount"),
                        ),
                    ),
                ],
            )
            .throwing("ValueError"),
        );
        module.classes.push(class);
        module.functions.push(Function::new(
            "main",
            vec![],
            vec![Stmt::Try {
                body: vec![Stmt::expr(Expr::call(Expr::ident("print"), vec![Expr::int(1)]))],
                catches: vec![CatchBlock {
                    kind: Some("Error".into()),
                    binding: Some("e".into()),
                    body: vec![Stmt::Throw(Expr::ident("e"))],
                }],
                finally: vec![],
            }],
        ));
        let out = write(&module);
        assert!(out.contains("public class Account\n{\n    public double Balance { get; set; }\n\n    public void Withdraw(double amount)\n    {\n        if (amount > this.Balance)\n        {\n            throw new Exception(\"too much\");\n        }\n        this.Balance -= amount;\n    }\n}"));
        assert!(out.contains("        try\n        {\n            Console.WriteLine(1);\n        }\n        catch (Exception e)\n        {\n            throw;\n        }\n"));
    }

    #[test]
    fn test_map_type_renders_dictionary() {
        let mut module = Module::new("m");
        module.functions.push(Function::new(
            "count",
            vec![Param::new("m", Type::map(Type::string(), Type::int()))],
            vec![],
        ));
        let out = write(&module);
        assert!(out.contains("public static void Count(Dictionary<string, int> m)"));
    }
}
