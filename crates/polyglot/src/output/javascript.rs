//! JavaScript writer.
//!
//! Emits a [`Module`] as modern JavaScript with optional JSDoc type
//! annotations. Plain structs become classes taking a destructured object,
//! so construction always names its fields.

use super::{
    Code, Scope, compound_parts, enum_literals, enum_variant, escape_string, format_float,
    is_class, keeps_case, mutated_names, placeholder, quoted, struct_fields, validate,
};
use crate::config::{JavaScriptConfig, TranslateConfig};
use crate::ir::*;
use crate::naming;
use crate::patterns::as_range;
use crate::patterns::error_tuple::{is_error_kind, native_error_kind};
use crate::traits::{GenerationError, Writer};
use crate::types::{Language, from_canonical};
use std::collections::HashSet;

/// Static instance of the JavaScript writer for the registry.
pub static JAVASCRIPT_WRITER: JavaScriptWriter = JavaScriptWriter;

pub struct JavaScriptWriter;

impl Writer for JavaScriptWriter {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn extension(&self) -> &'static str {
        "js"
    }

    fn write_with_config(
        &self,
        module: &Module,
        config: &TranslateConfig,
    ) -> Result<String, GenerationError> {
        validate(module)?;
        Ok(Emitter::new(module, &config.javascript).emit())
    }
}

struct Emitter<'m> {
    module: &'m Module,
    config: &'m JavaScriptConfig,
    code: Code,
    scope: Scope<'m>,
    mutated: HashSet<String>,
    catch_bindings: Vec<String>,
}

fn js_type(ty: &Type) -> String {
    from_canonical(Language::JavaScript, ty)
}

impl<'m> Emitter<'m> {
    fn new(module: &'m Module, config: &'m JavaScriptConfig) -> Self {
        Self {
            module,
            config,
            code: Code::new(" ".repeat(config.indent)),
            scope: Scope::new(module),
            mutated: HashSet::new(),
            catch_bindings: Vec::new(),
        }
    }

    fn emit(mut self) -> String {
        let module = self.module;
        self.code.line(format!("// {}", module.name));
        self.code.blank();
        for var in &module.constants {
            if self.config.jsdoc
                && let Some(ty) = &var.ty
            {
                self.code.line(format!("/** @type {{{}}} */", js_type(ty)));
            }
            let value = self.expr(&var.value);
            let keyword = if var.is_constant { "const" } else { "let" };
            let export = self.export();
            self.code
                .line(format!("{export}{keyword} {} = {value};", var.name));
        }
        for en in &module.enums {
            self.code.blank();
            self.enumeration(en);
        }
        for def in &module.types {
            self.code.blank();
            self.record(def);
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

    fn export(&self) -> &'static str {
        if self.config.exports { "export " } else { "" }
    }

    /// Local, parameter, function and property names.
    fn name(&self, name: &str) -> String {
        match name {
            "self" => "this".to_string(),
            n if keeps_case(n) => n.to_string(),
            n => naming::to_camel_case(n),
        }
    }

    fn jsdoc(&mut self, lines: Vec<String>) {
        match lines.as_slice() {
            [] => {}
            [single] => self.code.line(format!("/** {single} */")),
            _ => {
                self.code.line("/**");
                for line in lines {
                    self.code.line(format!(" * {line}"));
                }
                self.code.line(" */");
            }
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn enumeration(&mut self, en: &Enum) {
        let export = self.export();
        self.code
            .line(format!("{export}const {} = Object.freeze({{", en.name));
        self.code.indent();
        for (variant, value) in en.variants.iter().zip(enum_literals(en)) {
            self.code.line(format!(
                "{}: {},",
                naming::to_screaming_snake_case(&variant.name),
                literal(&value)
            ));
        }
        self.code.dedent();
        self.code.line("});");
    }

    fn field_lines(&mut self, properties: &[Property], with_defaults: bool) {
        for property in properties {
            if self.config.jsdoc {
                self.code
                    .line(format!("/** @type {{{}}} */", js_type(&property.ty)));
            }
            let name = self.name(&property.name);
            match &property.default {
                Some(default) if with_defaults => {
                    let default = self.expr(default);
                    self.code.line(format!("{name} = {default};"));
                }
                _ => self.code.line(format!("{name};")),
            }
        }
    }

    /// A plain struct: a class whose constructor destructures its fields.
    fn record(&mut self, def: &TypeDefinition) {
        if self.config.jsdoc
            && let Some(doc) = &def.doc
        {
            self.jsdoc(vec![doc.clone()]);
        }
        let export = self.export();
        self.code.line(format!("{export}class {} {{", def.name));
        self.code.indent();
        self.field_lines(&def.fields, false);
        if !def.fields.is_empty() {
            self.code.blank();
            let params: Vec<String> = def
                .fields
                .iter()
                .map(|f| {
                    let name = self.name(&f.name);
                    match &f.default {
                        Some(default) => format!("{name} = {}", self.expr(default)),
                        None => name,
                    }
                })
                .collect();
            self.code
                .line(format!("constructor({{ {} }}) {{", params.join(", ")));
            self.code.indent();
            for field in &def.fields {
                let name = self.name(&field.name);
                self.code.line(format!("this.{name} = {name};"));
            }
            self.code.dedent();
            self.code.line("}");
        }
        self.code.dedent();
        self.code.line("}");
    }

    fn class(&mut self, class: &'m Class) {
        if self.config.jsdoc
            && let Some(doc) = &class.doc
        {
            self.jsdoc(vec![doc.clone()]);
        }
        let extends = match class.bases.first() {
            Some(base) => format!(" extends {base}"),
            None => String::new(),
        };
        let export = self.export();
        self.code
            .line(format!("{export}class {}{extends} {{", class.name));
        self.code.indent();
        self.scope = Scope::new(self.module);
        self.field_lines(&class.properties, true);
        let mut first = class.properties.is_empty();
        for method in class.constructor.iter().chain(&class.methods) {
            if !first {
                self.code.blank();
            }
            first = false;
            self.function(method, Some(class));
        }
        self.code.dedent();
        self.code.line("}");
    }

    fn function(&mut self, function: &'m Function, class: Option<&'m Class>) {
        let is_constructor = class.is_some_and(|c| {
            c.constructor
                .as_ref()
                .is_some_and(|ctor| std::ptr::eq(ctor, function))
        });

        if self.config.jsdoc {
            let mut lines = Vec::new();
            if let Some(doc) = &function.doc {
                lines.push(doc.clone());
            }
            for param in &function.params {
                let ty = js_type(&param.ty);
                let name = self.name(&param.name);
                lines.push(if param.is_variadic {
                    format!("@param {{...{ty}}} {name}")
                } else {
                    format!("@param {{{ty}}} {name}")
                });
            }
            if let Some(ty) = &function.return_type
                && !is_constructor
            {
                let ty = js_type(ty);
                lines.push(if function.is_async {
                    format!("@returns {{Promise<{ty}>}}")
                } else {
                    format!("@returns {{{ty}}}")
                });
            }
            for kind in &function.throws {
                lines.push(format!(
                    "@throws {{{}}}",
                    native_error_kind(Language::JavaScript, kind)
                ));
            }
            self.jsdoc(lines);
        }

        self.scope = Scope::for_function(self.module, class.map(|c| c.name.as_str()), function);
        self.mutated = mutated_names(&function.body);

        let params: Vec<String> = function
            .params
            .iter()
            .map(|p| {
                let name = self.name(&p.name);
                match (&p.default, p.is_variadic) {
                    (_, true) => format!("...{name}"),
                    (Some(default), false) => format!("{name} = {}", self.expr(default)),
                    (None, false) => name,
                }
            })
            .collect();
        let params = params.join(", ");
        let asyncness = if function.is_async { "async " } else { "" };
        let header = match class {
            Some(_) if is_constructor => format!("constructor({params}) {{"),
            Some(_) => {
                let statik = if function.is_static { "static " } else { "" };
                format!("{statik}{asyncness}{}({params}) {{", self.name(&function.name))
            }
            None => format!(
                "{}{asyncness}function {}({params}) {{",
                self.export(),
                self.name(&function.name)
            ),
        };
        self.code.line(header);
        self.code.indent();
        if is_constructor && class.is_some_and(|c| !c.bases.is_empty()) && !calls_super(&function.body)
        {
            self.code.line("super();");
        }
        self.stmts(&function.body);
        self.code.dedent();
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

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => {
                let text = self.expr(e);
                self.code.line(format!("{text};"));
            }
            Stmt::Return(None) => self.code.line("return;"),
            Stmt::Return(Some(e)) => {
                let text = self.expr(e);
                self.code.line(format!("return {text};"));
            }
            Stmt::Assign {
                target,
                value,
                is_declaration,
                ..
            } => {
                let lhs = self.expr(target);
                if *is_declaration {
                    let keyword = match target {
                        Expr::Ident(name) if !self.mutated.contains(name) => "const",
                        _ => "let",
                    };
                    let rhs = self.expr(value);
                    self.code.line(format!("{keyword} {lhs} = {rhs};"));
                } else if let Some((op, rhs)) = compound_parts(target, value) {
                    let rhs = self.expr(rhs);
                    self.code.line(format!("{lhs} {}= {rhs};", op.c_symbol()));
                } else {
                    let rhs = self.expr(value);
                    self.code.line(format!("{lhs} = {rhs};"));
                }
            }
            Stmt::If {
                condition,
                then_body,
                else_body,
            } => {
                let condition = self.expr(condition);
                self.code.line(format!("if ({condition}) {{"));
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
                let condition = self.expr(condition);
                self.code.line(format!("while ({condition}) {{"));
                self.block(body);
                self.code.line("}");
            }
            Stmt::Try {
                body,
                catches,
                finally,
            } => self.try_stmt(body, catches, finally),
            Stmt::Throw(value) => {
                let text = self.thrown(value);
                self.code.line(format!("throw {text};"));
            }
            Stmt::Break => self.code.line("break;"),
            Stmt::Continue => self.code.line("continue;"),
            Stmt::Spawn(work) => {
                let work = self.expr(work);
                self.code.line(format!("queueMicrotask(() => {work});"));
            }
            Stmt::Unhandled(source) => self.code.line(format!("// {}", placeholder(source))),
        }
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
            ] => {
                let condition = self.expr(condition);
                self.code.line(format!("}} else if ({condition}) {{"));
                self.else_chain(then_body, else_body);
            }
            _ => {
                self.code.line("} else {");
                self.block(else_body);
                self.code.line("}");
            }
        }
    }

    fn for_header(&mut self, iterator: &str, iterable: &Expr) -> String {
        if let Some((start, end)) = as_range(iterable) {
            let var = self.name(iterator);
            let start = self.expr(&start);
            let end = self.expr(end);
            return format!("for (let {var} = {start}; {var} < {end}; {var}++) {{");
        }
        let names: Vec<String> = iterator.split(',').map(|n| self.name(n.trim())).collect();
        let binding = match names.as_slice() {
            [single] => single.clone(),
            _ => format!("[{}]", names.join(", ")),
        };
        let iterable = self.expr(iterable);
        format!("for (const {binding} of {iterable}) {{")
    }

    fn try_stmt(&mut self, body: &[Stmt], catches: &[CatchBlock], finally: &[Stmt]) {
        self.code.line("try {");
        self.block(body);
        if !catches.is_empty() {
            let binding = catches
                .iter()
                .find_map(|c| c.binding.as_deref())
                .map(|b| self.name(b))
                .unwrap_or_else(|| "err".to_string());
            self.code.line(format!("}} catch ({binding}) {{"));
            self.code.indent();
            self.catch_bindings.push(binding.clone());
            let untyped = catches.iter().all(|c| {
                c.kind
                    .as_deref()
                    .is_none_or(|k| native_error_kind(Language::JavaScript, k) == "Error")
            });
            if untyped {
                for catch in catches {
                    self.catch_body(catch, &binding);
                }
            } else {
                self.typed_catches(catches, &binding);
            }
            self.catch_bindings.pop();
            self.code.dedent();
        }
        if !finally.is_empty() {
            self.code.line("} finally {");
            self.block(finally);
        }
        self.code.line("}");
    }

    /// One `catch` dispatching on `instanceof`, rethrowing unmatched errors.
    fn typed_catches(&mut self, catches: &[CatchBlock], binding: &str) {
        let mut has_fallback = false;
        for (i, catch) in catches.iter().enumerate() {
            let test = catch
                .kind
                .as_deref()
                .map(|k| native_error_kind(Language::JavaScript, k))
                .filter(|k| k != "Error");
            let opener = match (&test, i) {
                (Some(kind), 0) => format!("if ({binding} instanceof {kind}) {{"),
                (Some(kind), _) => format!("}} else if ({binding} instanceof {kind}) {{"),
                (None, 0) => "{".to_string(),
                (None, _) => "} else {".to_string(),
            };
            self.code.line(opener);
            self.code.indent();
            self.catch_body(catch, binding);
            self.code.dedent();
            if test.is_none() {
                has_fallback = true;
                break;
            }
        }
        if !has_fallback {
            self.code.line("} else {");
            self.code.indent();
            self.code.line(format!("throw {binding};"));
            self.code.dedent();
        }
        self.code.line("}");
    }

    fn catch_body(&mut self, catch: &CatchBlock, binding: &str) {
        if let Some(own) = &catch.binding {
            let own = self.name(own);
            if own != binding {
                self.code.line(format!("const {own} = {binding};"));
            }
        }
        self.stmts(&catch.body);
    }

    fn thrown(&mut self, value: &Expr) -> String {
        match value {
            Expr::Ident(name) if self.catch_bindings.contains(&self.name(name)) => self.name(name),
            Expr::Literal(Literal::String(_)) | Expr::FormatString(_) => {
                format!("new Error({})", self.expr(value))
            }
            other => self.expr(other),
        }
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

    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(lit) => literal(lit),
            Expr::Ident(name) => self.name(name),
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
                    return format!(
                        "{}.{}",
                        en.name,
                        naming::to_screaming_snake_case(&variant.name)
                    );
                }
                let object = self.expr(object);
                format!("{object}.{}", self.name(property))
            }
            Expr::Index { object, index } => {
                let object = self.expr(object);
                let index = self.expr(index);
                format!("{object}[{index}]")
            }
            Expr::Array(items) => format!("[{}]", self.exprs(items)),
            Expr::Map(entries) => {
                if entries.is_empty() {
                    return "{}".to_string();
                }
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Expr::Literal(Literal::String(s)) => quoted(s),
                            other => format!("[{}]", self.expr(other)),
                        };
                        format!("{key}: {}", self.expr(v))
                    })
                    .collect();
                format!("{{ {} }}", entries.join(", "))
            }
            Expr::StructLiteral { type_name, fields } => self.struct_literal(type_name, fields),
            Expr::Comprehension(c) => self.comprehension(c),
            Expr::Lambda { params, body } => {
                let params: Vec<String> = params.iter().map(|p| self.name(p)).collect();
                let body = match body {
                    LambdaBody::Expr(e) => self.expr(e),
                    LambdaBody::Block(stmts) => self.inline_block(stmts),
                };
                format!("({}) => {body}", params.join(", "))
            }
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
                let mut out = String::from("`");
                for part in parts {
                    match part {
                        FormatPart::Text(text) => out.push_str(
                            &text
                                .replace('\\', "\\\\")
                                .replace('`', "\\`")
                                .replace("${", "\\${"),
                        ),
                        FormatPart::Expr(e) => {
                            let text = self.expr(e);
                            out.push_str(&format!("${{{text}}}"));
                        }
                    }
                }
                out.push('`');
                out
            }
            Expr::Unhandled(source) => format!("undefined /* {} */", placeholder(source)),
        }
    }

    /// `{ a; b; }` on one line, for block-bodied arrows.
    fn inline_block(&mut self, body: &[Stmt]) -> String {
        let outer = std::mem::replace(&mut self.code, Code::new(""));
        self.stmts(body);
        let inner = std::mem::replace(&mut self.code, outer).finish();
        let lines: Vec<&str> = inner.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if lines.is_empty() {
            return "{}".to_string();
        }
        format!("{{ {} }}", lines.join(" "))
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> String {
        match op {
            BinaryOp::FloorDiv => {
                format!("Math.floor({} / {})", self.expr(left), self.expr(right))
            }
            BinaryOp::In if self.scope.is_map(right) => {
                format!("({} in {})", self.expr(left), self.expr(right))
            }
            BinaryOp::In => format!("{}.includes({})", self.expr(right), self.expr(left)),
            _ => {
                let symbol = match op {
                    BinaryOp::Eq => "===",
                    BinaryOp::Ne => "!==",
                    other => other.c_symbol(),
                };
                format!("({} {symbol} {})", self.expr(left), self.expr(right))
            }
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr], kwargs: &[(String, Expr)]) -> String {
        let mut rendered: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
        if !kwargs.is_empty() {
            let fields: Vec<String> = kwargs
                .iter()
                .map(|(k, v)| format!("{}: {}", self.name(k), self.expr(v)))
                .collect();
            rendered.push(format!("{{ {} }}", fields.join(", ")));
        }
        let joined = rendered.join(", ");

        match callee {
            Expr::Ident(name) => match (name.as_str(), args) {
                ("print", _) => format!("console.log({joined})"),
                ("len", [arg]) if self.scope.is_map(arg) => {
                    format!("Object.keys({joined}).length")
                }
                ("len", [_]) => format!("{joined}.length"),
                ("range", [_]) => format!("Array.from({{ length: {joined} }}, (_, i) => i)"),
                ("range", [_, _]) => format!(
                    "Array.from({{ length: {1} - {0} }}, (_, i) => {0} + i)",
                    rendered[0], rendered[1]
                ),
                (kind, _) if is_error_kind(kind) => {
                    format!("new {}({joined})", native_error_kind(Language::JavaScript, kind))
                }
                (ty, _) if is_class(self.module, ty) => format!("new {ty}({joined})"),
                _ => format!("{}({joined})", self.name(name)),
            },
            Expr::Member { object, property } => {
                let target = self.expr(object);
                match (property.as_str(), args) {
                    ("append", [_]) => format!("{target}.push({joined})"),
                    ("items", []) => format!("Object.entries({target})"),
                    ("keys", []) if self.scope.is_map(object) => format!("Object.keys({target})"),
                    ("values", []) if self.scope.is_map(object) => {
                        format!("Object.values({target})")
                    }
                    _ => format!("{target}.{}({joined})", self.name(property)),
                }
            }
            other => format!("{}({joined})", self.expr(other)),
        }
    }

    fn struct_literal(&mut self, type_name: &str, fields: &[FieldInit]) -> String {
        if is_class(self.module, type_name) || is_error_kind(type_name) {
            let values: Vec<String> = fields.iter().map(|f| self.expr(&f.value)).collect();
            let ty = native_error_kind(Language::JavaScript, type_name);
            return format!("new {ty}({})", values.join(", "));
        }
        let module = self.module;
        let fields = struct_fields(module, type_name, fields);
        if fields.is_empty() {
            return format!("new {type_name}({{}})");
        }
        let parts: Vec<String> = fields
            .into_iter()
            .enumerate()
            .map(|(i, (name, value))| {
                let value = self.expr(value);
                let name = name
                    .map(|n| self.name(&n))
                    .unwrap_or_else(|| format!("field{i}"));
                format!("{name}: {value}")
            })
            .collect();
        format!("new {type_name}({{ {} }})", parts.join(", "))
    }

    /// `xs.filter(...).map(...)`, wrapped for sets and dicts.
    fn comprehension(&mut self, c: &Comprehension) -> String {
        let param = {
            let names: Vec<String> = c.iterator.split(',').map(|n| self.name(n.trim())).collect();
            match names.as_slice() {
                [single] => format!("({single})"),
                _ => format!("([{}])", names.join(", ")),
            }
        };
        let mut chain = self.expr(&c.iterable);
        if as_range(&c.iterable).is_none()
            && matches!(&c.iterable, Expr::Call { .. } | Expr::Ident(_) | Expr::Member { .. })
            && self.scope.is_map(&c.iterable)
        {
            chain = format!("Object.keys({chain})");
        }
        if let Some(condition) = &c.condition {
            let condition = self.expr(condition);
            chain = format!("{chain}.filter({param} => {condition})");
        }
        let is_identity = c.target.as_ident() == Some(c.iterator.as_str());
        match c.kind {
            ComprehensionKind::Dict => {
                let key = self.expr(&c.target);
                let value = match &c.value {
                    Some(v) => self.expr(v),
                    None => self.name(&c.iterator),
                };
                format!("Object.fromEntries({chain}.map({param} => [{key}, {value}]))")
            }
            kind => {
                if !is_identity {
                    let target = self.expr(&c.target);
                    chain = format!("{chain}.map({param} => {target})");
                } else if c.condition.is_none() {
                    chain = format!("Array.from({chain})");
                }
                if kind == ComprehensionKind::Set {
                    format!("new Set({chain})")
                } else {
                    chain
                }
            }
        }
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "null".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(n) => n.to_string(),
        Literal::Float(f) => format_float(*f),
        Literal::String(s) => format!("\"{}\"", escape_string(s)),
    }
}

fn calls_super(body: &[Stmt]) -> bool {
    body.iter().any(|s| {
        matches!(s, Stmt::Expr(Expr::Call { callee, .. }) if callee.as_ident() == Some("super"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::error_tuple::error_value;

    fn write(module: &Module) -> String {
        JAVASCRIPT_WRITER.write(module).unwrap()
    }

    #[test]
    fn test_function_with_jsdoc() {
        let mut module = Module::new("calc");
        module.functions.push(
            Function::new(
                "add_all",
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
        assert!(out.starts_with("// calc\n"));
        assert!(out.contains(
            "/**\n * @param {integer} a\n * @param {integer} b\n * @returns {integer}\n */\nfunction addAll(a, b) {\n  return (a + b);\n}"
        ));
    }

    #[test]
    fn test_record_construction_is_named() {
        let mut module = Module::new("users");
        module.types.push(TypeDefinition::new(
            "User",
            vec![
                Property::new("name", Type::string()),
                Property::new("age", Type::int()),
            ],
        ));
        module.functions.push(Function::new(
            "make",
            vec![],
            vec![Stmt::return_stmt(Some(Expr::StructLiteral {
                type_name: "User".into(),
                fields: vec![
                    FieldInit::positional(Expr::string("Alice")),
                    FieldInit::positional(Expr::int(30)),
                ],
            }))],
        ));
        let out = write(&module);
        assert!(out.contains("  /** @type {string} */\n  name;\n"));
        assert!(out.contains("  constructor({ name, age }) {\n    this.name = name;"));
        assert!(out.contains("return new User({ name: \"Alice\", age: 30 });"));
    }

    #[test]
    fn test_chain_and_builtins() {
        let mut module = Module::new("m");
        module.functions.push(Function::new(
            "process",
            vec![Param::new("items", Type::array(Type::int()))],
            vec![
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
                Stmt::expr(Expr::call(
                    Expr::member(Expr::ident("result"), "append"),
                    vec![Expr::int(1)],
                )),
                Stmt::expr(Expr::call(
                    Expr::ident("print"),
                    vec![Expr::call(Expr::ident("len"), vec![Expr::ident("result")])],
                )),
            ],
        ));
        let out = write(&module);
        assert!(out.contains("let result = items.filter((x) => (x > 0)).map((x) => (x * 2));"));
        assert!(out.contains("result.push(1);"));
        assert!(out.contains("console.log(result.length);"));
    }

    #[test]
    fn test_async_throw_and_loops() {
        let mut module = Module::new("m");
        module.functions.push(
            Function::new(
                "fetch_all",
                vec![Param::new("n", Type::int())],
                vec![
                    Stmt::for_in(
                        "i",
                        crate::patterns::range_call(Expr::int(0), Expr::ident("n")),
                        vec![Stmt::expr(Expr::await_expr(Expr::call(
                            Expr::ident("fetch_one"),
                            vec![Expr::ident("i")],
                        )))],
                    ),
                    Stmt::Throw(error_value("Error", Expr::string("done"))),
                ],
            )
            .asynchronous()
            .throwing("Error"),
        );
        let out = write(&module);
        assert!(out.contains("async function fetchAll(n) {"));
        assert!(out.contains("for (let i = 0; i < n; i++) {\n    await fetchOne(i);\n  }"));
        assert!(out.contains("throw new Error(\"done\");"));
        assert!(out.contains(" * @throws {Error}"));
    }

    #[test]
    fn test_enum_and_typed_catch() {
        let mut module = Module::new("m");
        module.enums.push(Enum {
            name: "Color".into(),
            variants: vec![EnumVariant::new("red"), EnumVariant::new("green")],
        });
        module.functions.push(Function::new(
            "f",
            vec![],
            vec![Stmt::Try {
                body: vec![Stmt::expr(Expr::call(Expr::ident("risky"), vec![]))],
                catches: vec![CatchBlock {
                    kind: Some("ValueError".into()),
                    binding: Some("e".into()),
                    body: vec![Stmt::Return(Some(Expr::member(
                        Expr::ident("Color"),
                        "red",
                    )))],
                }],
                finally: vec![],
            }],
        ));
        let mut config = TranslateConfig::default();
        config.javascript.jsdoc = false;
        let out = JAVASCRIPT_WRITER.write_with_config(&module, &config).unwrap();
        assert!(out.contains("const Color = Object.freeze({\n  RED: 0,\n  GREEN: 1,\n});"));
        assert!(out.contains("} catch (e) {\n    if (e instanceof ValueError) {\n      return Color.RED;\n    } else {\n      throw e;\n    }\n  }"));
        assert!(!out.contains("/**"));
    }
}
