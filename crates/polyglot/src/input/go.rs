//! Tree-sitter based Go reader.
//!
//! Go spells errors as trailing `error` results. Functions declaring one get
//! `throws = ["error"]`, and their `return v, err` statements are lowered
//! into returns and throws. Exported PascalCase names are mapped back to the
//! canonical snake_case through tables built in the first pass.

use super::module_name_from_filename;
use super::support::{
    Diagnostics, NodeError, NodeResult, field, fields, named_children, number_literal, parse,
    require_structure, unsupported,
};
use crate::ir::*;
use crate::naming;
use crate::patterns::comprehension::{lift_append_loops, map_nested_bodies};
use crate::patterns::error_tuple::{GENERIC_ERROR, error_value};
use crate::patterns::range::compound_assign;
use crate::patterns::{
    KnownTypes, body_is_async, callee_path, check_skeleton, collapse_err_checks, infer_throws,
    lower_multi_return, range_call, recognize_counted,
};
use crate::traits::{ParseError, ReadOutput, Reader};
use crate::types::{Language, infer_type, map_return, to_canonical};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use tree_sitter::Node;

/// Static instance of the Go reader for registry.
pub static GO_READER: GoReader = GoReader;

/// Go reader using tree-sitter.
pub struct GoReader;

impl Reader for GoReader {
    fn language(&self) -> &'static str {
        "go"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn read_with_diagnostics(
        &self,
        source: &str,
        filename: &str,
    ) -> Result<ReadOutput, ParseError> {
        read_go_with_diagnostics(source, filename)
    }
}

/// Parse Go source into the IR.
pub fn read_go(source: &str, filename: &str) -> Result<Module, ParseError> {
    read_go_with_diagnostics(source, filename).map(|out| out.module)
}

fn read_go_with_diagnostics(source: &str, filename: &str) -> Result<ReadOutput, ParseError> {
    check_skeleton(source, Language::Go)?;
    let tree = parse(source, arborium_go::language().into())?;
    let root = tree.root_node();
    require_structure(root, filename)?;

    let mut ctx = ReadContext::new(source);
    ctx.collect_declarations(root);
    let module = ctx.read_module(root, filename);
    Ok(ReadOutput {
        module,
        diagnostics: ctx.diagnostics.into_vec(),
    })
}

/// Go zero value of a canonical type.
fn zero_value(ty: &Type) -> Expr {
    if ty.is_optional {
        return Expr::null();
    }
    match ty.name.as_str() {
        "int" => Expr::int(0),
        "float" => Expr::float(0.0),
        "string" => Expr::string(""),
        "bool" => Expr::bool(false),
        "array" => Expr::Array(Vec::new()),
        "map" => Expr::Map(Vec::new()),
        _ => Expr::null(),
    }
}

/// `json:"name,omitempty"` → `name`.
fn json_tag_name(tag: &str) -> Option<&str> {
    let start = tag.find("json:\"")? + "json:\"".len();
    let rest = &tag[start..];
    let name = rest[..rest.find('"')?].split(',').next()?;
    (!name.is_empty() && name != "-").then_some(name)
}

/// Split a `Sprintf` format into text and verb slots; `None` when the
/// number of verbs does not match `args`.
fn format_parts(format: &str, args: &[Expr]) -> Option<Vec<FormatPart>> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut args = args.iter();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            text.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            text.push('%');
            continue;
        }
        // flags, width and precision, then the verb letter
        while chars
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '#' | ' ' | '.'))
        {
            chars.next();
        }
        chars.next()?;
        if !text.is_empty() {
            parts.push(FormatPart::Text(std::mem::take(&mut text)));
        }
        parts.push(FormatPart::Expr(args.next()?.clone()));
    }
    if args.next().is_some() {
        return None;
    }
    if !text.is_empty() {
        parts.push(FormatPart::Text(text));
    }
    Some(parts)
}

struct ReadContext<'a> {
    source: &'a str,
    known: KnownTypes,
    /// Go spelling → canonical name for functions, constants and fields.
    names: HashMap<String, String>,
    field_names: HashMap<String, String>,
    /// Struct types with methods.
    classes: HashSet<String>,
    /// Named basic types (`type Color int`) that may back an enum.
    enum_types: HashSet<String>,
    /// Receiver identifier of the method being read.
    receiver: RefCell<Option<String>>,
    /// Whether the function being read declares an `error` result.
    error_shaped: Cell<bool>,
    local_types: RefCell<HashMap<String, Type>>,
    diagnostics: Diagnostics,
}

impl<'a> ReadContext<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            known: KnownTypes::new(),
            names: HashMap::new(),
            field_names: HashMap::new(),
            classes: HashSet::new(),
            enum_types: HashSet::new(),
            receiver: RefCell::new(None),
            error_shaped: Cell::new(false),
            local_types: RefCell::new(HashMap::new()),
            diagnostics: Diagnostics::default(),
        }
    }

    fn node_text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn expr(&self, node: Node) -> Expr {
        self.read_expr(node).unwrap_or_else(|err| {
            Expr::Unhandled(self.diagnostics.record(node, self.source, err.to_string()))
        })
    }

    fn go_type(&self, node: Node) -> Type {
        to_canonical(Language::Go, self.node_text(node))
    }

    // ========================================================================
    // First pass: declared names
    // ========================================================================

    fn collect_declarations(&mut self, root: Node) {
        for child in named_children(root) {
            match child.kind() {
                "type_declaration" => {
                    for spec in named_children(child) {
                        self.collect_type_spec(spec);
                    }
                }
                "function_declaration" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        let name = self.node_text(name);
                        self.names
                            .insert(name.to_string(), naming::canonical_member(name));
                    }
                }
                "method_declaration" => {
                    let receiver_type = child
                        .child_by_field_name("receiver")
                        .and_then(|r| r.named_child(0))
                        .and_then(|p| p.child_by_field_name("type"))
                        .map(|t| self.node_text(t).trim_start_matches('*').to_string());
                    if let Some(ty) = receiver_type {
                        self.classes.insert(ty);
                    }
                }
                "const_declaration" => {
                    for spec in named_children(child) {
                        for name in fields(spec, "name") {
                            let name = self.node_text(name);
                            self.names
                                .insert(name.to_string(), naming::to_screaming_snake_case(name));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn collect_type_spec(&mut self, spec: Node) {
        let (Some(name), Some(ty)) = (
            spec.child_by_field_name("name"),
            spec.child_by_field_name("type"),
        ) else {
            return;
        };
        let name = self.node_text(name).to_string();
        match ty.kind() {
            "struct_type" => {
                let mut order = Vec::new();
                for decl in self.field_declarations(ty) {
                    let tag = decl
                        .child_by_field_name("tag")
                        .map(|t| self.node_text(t))
                        .unwrap_or("");
                    for go_name in fields(decl, "name") {
                        let go_name = self.node_text(go_name);
                        let canonical = json_tag_name(tag)
                            .map(naming::canonical_member)
                            .unwrap_or_else(|| naming::canonical_member(go_name));
                        self.field_names
                            .insert(go_name.to_string(), canonical.clone());
                        order.push(canonical);
                    }
                }
                self.known.add_struct(name, order);
            }
            "type_identifier" => {
                if matches!(self.node_text(ty), "int" | "string" | "int32" | "int64" | "uint8") {
                    self.enum_types.insert(name);
                }
            }
            _ => {}
        }
    }

    fn field_declarations<'t>(&self, struct_type: Node<'t>) -> Vec<Node<'t>> {
        named_children(struct_type)
            .into_iter()
            .filter(|c| c.kind() == "field_declaration_list")
            .flat_map(named_children)
            .filter(|c| c.kind() == "field_declaration")
            .collect()
    }

    // ========================================================================
    // Module level
    // ========================================================================

    fn read_module(&self, root: Node, filename: &str) -> Module {
        let mut module = Module::new(module_name_from_filename(filename));
        let mut methods: Vec<(String, Function)> = Vec::new();

        for child in named_children(root) {
            let result = match child.kind() {
                "package_clause" => {
                    if let Some(name) = child.named_child(0) {
                        module.name = self.node_text(name).to_string();
                    }
                    Ok(())
                }
                "import_declaration" => {
                    self.read_imports(child, &mut module.imports);
                    Ok(())
                }
                "function_declaration" => self
                    .read_function(child, None)
                    .map(|f| module.functions.push(f)),
                "method_declaration" => self.read_method(child).map(|m| methods.push(m)),
                "type_declaration" => {
                    for spec in named_children(child) {
                        if let Err(err) = self.read_type_spec(spec, &mut module) {
                            self.diagnostics.record(spec, self.source, err.to_string());
                        }
                    }
                    Ok(())
                }
                "const_declaration" | "var_declaration" => {
                    self.read_module_vars(child, &mut module);
                    Ok(())
                }
                _ => {
                    self.diagnostics
                        .record(child, self.source, "top-level declaration dropped");
                    Ok(())
                }
            };
            if let Err(err) = result {
                self.diagnostics.record(child, self.source, err.to_string());
            }
        }

        self.attach_methods(&mut module, methods);
        module
    }

    fn read_imports(&self, node: Node, imports: &mut Vec<Import>) {
        for child in named_children(node) {
            match child.kind() {
                "import_spec_list" => self.read_imports(child, imports),
                "import_spec" => {
                    let Some(path) = child.child_by_field_name("path") else {
                        continue;
                    };
                    let mut import = Import::module(self.node_text(path).trim_matches('"'));
                    import.alias = child
                        .child_by_field_name("name")
                        .map(|n| self.node_text(n).to_string());
                    imports.push(import);
                }
                _ => {}
            }
        }
    }

    fn read_type_spec(&self, spec: Node, module: &mut Module) -> NodeResult<()> {
        let name = self.node_text(field(spec, "name")?).to_string();
        let ty = field(spec, "type")?;
        match ty.kind() {
            "struct_type" => {
                let mut properties = Vec::new();
                let mut bases = Vec::new();
                for decl in self.field_declarations(ty) {
                    let field_type = self.go_type(field(decl, "type")?);
                    let names = fields(decl, "name");
                    if names.is_empty() {
                        // Embedded struct
                        bases.push(field_type.name.clone());
                        continue;
                    }
                    for go_name in names {
                        let go_name = self.node_text(go_name);
                        let canonical = self
                            .field_names
                            .get(go_name)
                            .cloned()
                            .unwrap_or_else(|| naming::canonical_member(go_name));
                        properties.push(Property::new(canonical, field_type.clone()));
                    }
                }
                if self.classes.contains(&name) || !bases.is_empty() {
                    let mut class = Class::new(name);
                    class.bases = bases;
                    class.properties = properties;
                    module.classes.push(class);
                } else {
                    module.types.push(TypeDefinition::new(name, properties));
                }
                Ok(())
            }
            // Enum backing types are consumed by their const block.
            "type_identifier" if self.enum_types.contains(&name) => Ok(()),
            _ => {
                self.diagnostics
                    .record(spec, self.source, format!("type `{name}` dropped"));
                Ok(())
            }
        }
    }

    /// Constants and variables, or an enum when a const block is typed
    /// with a named basic type.
    fn read_module_vars(&self, node: Node, module: &mut Module) {
        let is_const = node.kind() == "const_declaration";
        let specs = named_children(node);

        let enum_type = specs
            .first()
            .and_then(|s| s.child_by_field_name("type"))
            .map(|t| self.node_text(t))
            .filter(|t| is_const && self.enum_types.contains(*t));
        if let Some(enum_name) = enum_type {
            let mut variants = Vec::new();
            for spec in &specs {
                for name in fields(*spec, "name") {
                    let raw = self.node_text(name);
                    let short = raw.strip_prefix(enum_name).filter(|s| !s.is_empty()).unwrap_or(raw);
                    let mut variant = EnumVariant::new(naming::canonical_variant(short));
                    if let Some(value) = spec.child_by_field_name("value")
                        && let Expr::Literal(lit) = self.expr_list(value)
                    {
                        variant.value = Some(lit);
                    }
                    variants.push(variant);
                }
            }
            module.enums.push(Enum {
                name: enum_name.to_string(),
                variants,
            });
            return;
        }

        for spec in specs {
            let names = fields(spec, "name");
            let ty = spec.child_by_field_name("type").map(|t| self.go_type(t));
            let values = spec
                .child_by_field_name("value")
                .map(named_children)
                .unwrap_or_default();
            for (i, name) in names.iter().enumerate() {
                let raw = self.node_text(*name);
                let value = match values.get(i) {
                    Some(v) => self.expr(*v),
                    None => match &ty {
                        Some(t) => zero_value(t),
                        None => {
                            self.diagnostics
                                .record(spec, self.source, "declaration without a value");
                            continue;
                        }
                    },
                };
                module.constants.push(ModuleVar {
                    name: if is_const {
                        naming::to_screaming_snake_case(raw)
                    } else {
                        naming::canonical_member(raw)
                    },
                    ty: ty.clone(),
                    value,
                    is_constant: is_const,
                });
            }
        }
    }

    /// Move methods onto their receiver class; `NewT` becomes T's constructor.
    fn attach_methods(&self, module: &mut Module, methods: Vec<(String, Function)>) {
        for (receiver, method) in methods {
            match module.classes.iter_mut().find(|c| c.name == receiver) {
                Some(class) => class.methods.push(method),
                None => module.functions.push(method),
            }
        }

        for class in &mut module.classes {
            let ctor_name = naming::canonical_member(&format!("New{}", class.name));
            let Some(pos) = module.functions.iter().position(|f| f.name == ctor_name) else {
                continue;
            };
            let mut ctor = module.functions.remove(pos);
            ctor.name = CONSTRUCTOR_NAME.to_string();
            ctor.return_type = None;
            ctor.body = constructor_body(ctor.body, &class.name, &class.properties);
            class.constructor = Some(ctor);
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn read_method(&self, node: Node) -> NodeResult<(String, Function)> {
        let receiver = field(node, "receiver")?
            .named_child(0)
            .ok_or(NodeError::Missing {
                kind: "method_declaration",
                field: "receiver",
            })?;
        let receiver_type = self
            .node_text(field(receiver, "type")?)
            .trim_start_matches('*')
            .to_string();
        let receiver_name = receiver
            .child_by_field_name("name")
            .map(|n| self.node_text(n).to_string());
        let func = self.read_function(node, receiver_name)?;
        Ok((receiver_type, func))
    }

    fn read_function(&self, node: Node, receiver: Option<String>) -> NodeResult<Function> {
        let name = self.node_text(field(node, "name")?);
        let params = self.read_parameters(field(node, "parameters")?);
        let shape = node
            .child_by_field_name("result")
            .map(|r| map_return(Language::Go, self.node_text(r)))
            .unwrap_or_default();

        self.error_shaped.set(!shape.throws.is_empty());
        self.local_types.replace(
            params
                .iter()
                .map(|p| (p.name.clone(), p.ty.clone()))
                .collect(),
        );

        // A constructor's `x := &T{}` names the instance like a receiver.
        let receiver = receiver.or_else(|| {
            let returns = shape.ty.as_ref()?;
            if !name.starts_with("New") || !self.classes.contains(&returns.name) {
                return None;
            }
            let body = node.child_by_field_name("body")?;
            let first = self.statements(body).into_iter().next()?;
            (first.kind() == "short_var_declaration")
                .then(|| first.child_by_field_name("left"))
                .flatten()
                .map(|l| self.node_text(l).to_string())
        });
        self.receiver.replace(receiver);

        let body = self.read_block(field(node, "body")?);
        self.receiver.replace(None);
        let body = normalize_appends(lift_append_loops(collapse_err_checks(body)));

        let mut throws = shape.throws;
        for kind in infer_throws(&body) {
            if !throws.contains(&kind) && !(kind == GENERIC_ERROR && !throws.is_empty()) {
                throws.push(kind);
            }
        }

        Ok(Function {
            name: naming::canonical_member(name),
            params,
            return_type: shape.ty,
            throws,
            is_async: body_is_async(&body),
            is_static: false,
            body,
            doc: self.doc_comment(node),
        })
    }

    /// `//` comment lines directly above a declaration.
    fn doc_comment(&self, node: Node) -> Option<String> {
        let mut lines = Vec::new();
        let mut prev = node.prev_named_sibling();
        while let Some(comment) = prev.filter(|c| c.kind() == "comment") {
            let text = self.node_text(comment);
            let Some(line) = text.strip_prefix("//") else {
                break;
            };
            lines.push(line.trim().to_string());
            prev = comment.prev_named_sibling();
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }

    fn read_parameters(&self, node: Node) -> Vec<Param> {
        let mut params = Vec::new();
        for decl in named_children(node) {
            let Some(ty_node) = decl.child_by_field_name("type") else {
                continue;
            };
            let is_variadic = decl.kind() == "variadic_parameter_declaration";
            let ty = to_canonical(Language::Go, self.node_text(ty_node).trim_start_matches("..."));
            let names = fields(decl, "name");
            if names.is_empty() {
                params.push(Param::new(format!("arg{}", params.len()), ty));
                continue;
            }
            for name in names {
                let mut param = Param::new(naming::canonical(self.node_text(name)), ty.clone());
                param.is_variadic = is_variadic;
                params.push(param);
            }
        }
        params
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Statements of a block, looking through `statement_list`.
    fn statements<'t>(&self, block: Node<'t>) -> Vec<Node<'t>> {
        named_children(block)
            .into_iter()
            .flat_map(|c| {
                if c.kind() == "statement_list" {
                    named_children(c)
                } else {
                    vec![c]
                }
            })
            .collect()
    }

    fn read_block(&self, node: Node) -> Vec<Stmt> {
        self.read_stmts(self.statements(node))
    }

    fn read_stmts(&self, nodes: Vec<Node>) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        for child in nodes {
            if let Err(err) = self.read_stmt(child, &mut stmts) {
                stmts.push(Stmt::Unhandled(
                    self.diagnostics.record(child, self.source, err.to_string()),
                ));
            }
        }
        stmts
    }

    fn read_stmt(&self, node: Node, out: &mut Vec<Stmt>) -> NodeResult<()> {
        match node.kind() {
            "short_var_declaration" => {
                let left = field(node, "left")?;
                let right = field(node, "right")?;
                let value = self.expr_list(right);
                let target = self.target_list(left)?;
                if let (Expr::Ident(name), Some(ty)) = (&target, infer_type(&value)) {
                    self.local_types.borrow_mut().insert(name.clone(), ty);
                }
                out.push(Stmt::Assign {
                    target,
                    value,
                    is_declaration: true,
                    ty: None,
                });
            }
            "var_declaration" => {
                for spec in named_children(node) {
                    let ty = spec.child_by_field_name("type").map(|t| self.go_type(t));
                    let values = spec
                        .child_by_field_name("value")
                        .map(named_children)
                        .unwrap_or_default();
                    for (i, name) in fields(spec, "name").into_iter().enumerate() {
                        let name = naming::canonical(self.node_text(name));
                        let value = match (values.get(i), &ty) {
                            (Some(v), _) => self.expr(*v),
                            (None, Some(t)) => zero_value(t),
                            (None, None) => Expr::null(),
                        };
                        if let Some(t) = ty.clone().or_else(|| infer_type(&value)) {
                            self.local_types.borrow_mut().insert(name.clone(), t);
                        }
                        out.push(Stmt::Assign {
                            target: Expr::Ident(name),
                            value,
                            is_declaration: true,
                            ty: ty.clone(),
                        });
                    }
                }
            }
            "assignment_statement" => {
                let target = self.target_list(field(node, "left")?)?;
                let value = self.expr_list(field(node, "right")?);
                let op = self.node_text(field(node, "operator")?);
                if op == "=" {
                    out.push(Stmt::assign(target, value));
                } else {
                    let op = op
                        .strip_suffix('=')
                        .and_then(BinaryOp::from_c_symbol)
                        .ok_or_else(|| NodeError::Unsupported(format!("operator {op}")))?;
                    out.push(compound_assign(target, op, value));
                }
            }
            "inc_statement" | "dec_statement" => {
                let target = self.read_expr(node.named_child(0).ok_or(NodeError::Missing {
                    kind: "inc_statement",
                    field: "operand",
                })?)?;
                let op = if node.kind() == "inc_statement" {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                out.push(compound_assign(target, op, Expr::int(1)));
            }
            "expression_statement" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "expression_statement",
                    field: "expression",
                })?;
                out.push(Stmt::Expr(self.expr(inner)));
            }
            "return_statement" => {
                let values = match node.named_child(0) {
                    Some(list) if list.kind() == "expression_list" => {
                        named_children(list).into_iter().map(|v| self.expr(v)).collect()
                    }
                    Some(single) => vec![self.expr(single)],
                    None => Vec::new(),
                };
                out.extend(lower_multi_return(values, self.error_shaped.get()));
            }
            "if_statement" => {
                if let Some(init) = node.child_by_field_name("initializer") {
                    self.read_stmt(init, out)?;
                }
                out.push(self.read_if(node)?);
            }
            "for_statement" => out.extend(self.read_for(node)?),
            "expression_switch_statement" => {
                if let Some(init) = node.child_by_field_name("initializer") {
                    self.read_stmt(init, out)?;
                }
                out.extend(self.read_switch(node)?);
            }
            "go_statement" => {
                let call = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "go_statement",
                    field: "call",
                })?;
                out.push(Stmt::Spawn(self.launched_work(call)?));
            }
            "break_statement" => out.push(Stmt::Break),
            "continue_statement" => out.push(Stmt::Continue),
            "block" => out.extend(self.read_block(node)),
            "empty_statement" => {}
            _ => return unsupported(node),
        }
        Ok(())
    }

    /// `go f(x)` launches `f(x)`; `go func() { g() }()` launches `g()`.
    fn launched_work(&self, call: Node) -> NodeResult<Expr> {
        let work = self.read_expr(call)?;
        if let Expr::Call { callee, args, .. } = &work
            && args.is_empty()
            && let Expr::Lambda { params, body } = callee.as_ref()
            && params.is_empty()
        {
            return Ok(match body {
                LambdaBody::Block(stmts) => match stmts.as_slice() {
                    [Stmt::Expr(inner)] => inner.clone(),
                    _ => work.clone(),
                },
                LambdaBody::Expr(inner) => inner.as_ref().clone(),
            });
        }
        Ok(work)
    }

    fn read_if(&self, node: Node) -> NodeResult<Stmt> {
        let condition = self.expr(field(node, "condition")?);
        let then_body = self.read_block(field(node, "consequence")?);
        let else_body = match node.child_by_field_name("alternative") {
            Some(alt) if alt.kind() == "if_statement" => {
                let mut out = Vec::new();
                self.read_stmt(alt, &mut out)?;
                out
            }
            Some(alt) => self.read_block(alt),
            None => Vec::new(),
        };
        Ok(Stmt::if_stmt(condition, then_body, else_body))
    }

    fn read_for(&self, node: Node) -> NodeResult<Vec<Stmt>> {
        let body_node = field(node, "body")?;
        let header = named_children(node)
            .into_iter()
            .find(|c| c.id() != body_node.id());

        let Some(header) = header else {
            return Ok(vec![Stmt::while_loop(Expr::bool(true), self.read_block(body_node))]);
        };
        match header.kind() {
            "for_clause" => self.read_for_clause(header, body_node),
            "range_clause" => Ok(vec![self.read_range(header, body_node)?]),
            _ => Ok(vec![Stmt::while_loop(
                self.expr(header),
                self.read_block(body_node),
            )]),
        }
    }

    fn read_for_clause(&self, clause: Node, body_node: Node) -> NodeResult<Vec<Stmt>> {
        let mut init = Vec::new();
        if let Some(i) = clause.child_by_field_name("initializer") {
            self.read_stmt(i, &mut init)?;
        }
        let condition = clause.child_by_field_name("condition").map(|c| self.expr(c));
        let mut update = Vec::new();
        if let Some(u) = clause.child_by_field_name("update") {
            self.read_stmt(u, &mut update)?;
        }
        let body = self.read_block(body_node);

        if let (
            [
                Stmt::Assign {
                    target: Expr::Ident(var),
                    value,
                    is_declaration: true,
                    ..
                },
            ],
            Some(cond),
            [update],
        ) = (init.as_slice(), &condition, update.as_slice())
            && let Some(range) = recognize_counted(var, value, cond, update)
        {
            return Ok(vec![Stmt::for_in(var.clone(), range, body)]);
        }

        let mut body = body;
        body.extend(update);
        init.push(Stmt::while_loop(
            condition.unwrap_or_else(|| Expr::bool(true)),
            body,
        ));
        Ok(init)
    }

    /// `for k, v := range xs` in its canonical forms.
    fn read_range(&self, clause: Node, body_node: Node) -> NodeResult<Stmt> {
        let iterable = self.expr(field(clause, "right")?);
        let names: Vec<String> = clause
            .child_by_field_name("left")
            .map(|l| {
                named_children(l)
                    .into_iter()
                    .map(|n| naming::canonical(self.node_text(n)))
                    .collect()
            })
            .unwrap_or_default();
        let is_map = match &iterable {
            Expr::Ident(name) => self
                .local_types
                .borrow()
                .get(name)
                .is_some_and(|t| t.is_map()),
            Expr::Map(_) => true,
            _ => false,
        };
        let is_count = matches!(&iterable, Expr::Literal(Literal::Int(_)))
            || matches!(&iterable, Expr::Ident(name)
                if self.local_types.borrow().get(name).is_some_and(|t| t.name == "int"));

        for name in &names {
            if name != "_" {
                let ty = if is_count {
                    Type::int()
                } else {
                    Type::any()
                };
                self.local_types.borrow_mut().insert(name.clone(), ty);
            }
        }
        let mut body = self.read_block(body_node);

        let len = |xs: &Expr| Expr::call(Expr::ident("len"), vec![xs.clone()]);
        let (iterator, iterable) = match (names.as_slice(), is_map) {
            ([], _) => ("_".to_string(), range_call(Expr::int(0), len(&iterable))),
            ([i], false) if is_count => (i.clone(), range_call(Expr::int(0), iterable)),
            ([k], true) => (k.clone(), iterable),
            ([i], false) => (i.clone(), range_call(Expr::int(0), len(&iterable))),
            ([k, v], true) if k == "_" => (
                v.clone(),
                Expr::call(Expr::member(iterable, "values"), vec![]),
            ),
            ([k, v], true) => (
                format!("{k}, {v}"),
                Expr::call(Expr::member(iterable, "items"), vec![]),
            ),
            ([i, x], false) if i == "_" => (x.clone(), iterable),
            ([i, x], false) => {
                body.insert(
                    0,
                    Stmt::declare(x.clone(), Expr::index(iterable.clone(), Expr::ident(i))),
                );
                (i.clone(), range_call(Expr::int(0), len(&iterable)))
            }
            _ => return unsupported(clause),
        };
        Ok(Stmt::for_in(iterator, iterable, body))
    }

    /// Lower a value switch into an if/else chain.
    fn read_switch(&self, node: Node) -> NodeResult<Vec<Stmt>> {
        let subject = node.child_by_field_name("value").map(|v| self.expr(v));
        let mut cases = Vec::new();
        let mut default = Vec::new();
        for case in named_children(node) {
            match case.kind() {
                "expression_case" => {
                    let values_node = field(case, "value")?;
                    let conditions = named_children(values_node)
                        .into_iter()
                        .map(|v| {
                            let v = self.expr(v);
                            match &subject {
                                Some(s) => Expr::binary(s.clone(), BinaryOp::Eq, v),
                                None => v,
                            }
                        })
                        .collect::<Vec<_>>();
                    let condition = conditions
                        .into_iter()
                        .reduce(|a, b| Expr::binary(a, BinaryOp::Or, b))
                        .ok_or_else(|| NodeError::Unsupported("empty case".into()))?;
                    let stmts: Vec<Node> = self
                        .statements(case)
                        .into_iter()
                        .filter(|s| s.id() != values_node.id())
                        .collect();
                    cases.push((condition, self.read_stmts(stmts)));
                }
                "default_case" => default = self.read_stmts(self.statements(case)),
                _ => {}
            }
        }
        let chain = cases
            .into_iter()
            .rev()
            .fold(default, |else_body, (condition, body)| {
                vec![Stmt::if_stmt(condition, body, else_body)]
            });
        Ok(chain)
    }

    /// Left side of an assignment: a single target or a tuple of them.
    fn target_list(&self, node: Node) -> NodeResult<Expr> {
        let items = named_children(node);
        if items.len() == 1 {
            return self.read_expr(items[0]);
        }
        Ok(Expr::Array(
            items.into_iter().map(|i| self.read_expr(i)).collect::<NodeResult<_>>()?,
        ))
    }

    fn expr_list(&self, node: Node) -> Expr {
        if node.kind() != "expression_list" {
            return self.expr(node);
        }
        let items = named_children(node);
        match items.as_slice() {
            [single] => self.expr(*single),
            _ => Expr::Array(items.into_iter().map(|i| self.expr(i)).collect()),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn ident(&self, text: &str) -> Expr {
        if self.receiver.borrow().as_deref() == Some(text) {
            return Expr::ident("self");
        }
        // LevelHigh → Level.high
        if let Some((enum_name, variant)) = self.enum_types.iter().find_map(|e| {
            text.strip_prefix(e.as_str())
                .filter(|rest| rest.starts_with(char::is_uppercase))
                .map(|rest| (e, rest))
        }) {
            return Expr::member(Expr::ident(enum_name), naming::canonical_variant(variant));
        }
        match self.names.get(text) {
            Some(canonical) => Expr::Ident(canonical.clone()),
            None => Expr::Ident(naming::canonical(text)),
        }
    }

    fn read_expr(&self, node: Node) -> NodeResult<Expr> {
        match node.kind() {
            "int_literal" | "float_literal" => Ok(number_literal(self.node_text(node))),
            "interpreted_string_literal" => {
                let text = self.node_text(node);
                let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
                Ok(Expr::string(super::unescape(inner)))
            }
            "raw_string_literal" => Ok(Expr::string(self.node_text(node).trim_matches('`'))),
            "rune_literal" => {
                let text = self.node_text(node);
                let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
                Ok(Expr::string(super::unescape(inner)))
            }
            "true" => Ok(Expr::bool(true)),
            "false" => Ok(Expr::bool(false)),
            "nil" => Ok(Expr::null()),
            "iota" => Ok(Expr::ident("iota")),
            "identifier" => Ok(self.ident(self.node_text(node))),

            "binary_expression" => {
                let left = self.expr(field(node, "left")?);
                let right = self.expr(field(node, "right")?);
                let symbol = self.node_text(field(node, "operator")?);
                let op = BinaryOp::from_c_symbol(symbol)
                    .ok_or_else(|| NodeError::Unsupported(format!("operator {symbol}")))?;
                Ok(Expr::binary(left, op, right))
            }
            "unary_expression" => {
                let operand = self.expr(field(node, "operand")?);
                match self.node_text(field(node, "operator")?) {
                    "!" => Ok(Expr::unary(UnaryOp::Not, operand)),
                    "-" => Ok(match operand {
                        Expr::Literal(Literal::Int(n)) => Expr::int(-n),
                        Expr::Literal(Literal::Float(f)) => Expr::float(-f),
                        other => Expr::unary(UnaryOp::Neg, other),
                    }),
                    "^" => Ok(Expr::unary(UnaryOp::BitNot, operand)),
                    // Address-of and dereference are transparent.
                    "&" | "*" | "+" => Ok(operand),
                    other => Err(NodeError::Unsupported(format!("operator {other}"))),
                }
            }

            "call_expression" => self.read_call(node),
            "selector_expression" => {
                let operand = self.expr(field(node, "operand")?);
                let go_name = self.node_text(field(node, "field")?);
                let property = self
                    .field_names
                    .get(go_name)
                    .cloned()
                    .unwrap_or_else(|| naming::canonical_member(go_name));
                Ok(Expr::member(operand, property))
            }
            "index_expression" => Ok(Expr::index(
                self.expr(field(node, "operand")?),
                self.expr(field(node, "index")?),
            )),
            "composite_literal" => self.read_composite(node),
            "func_literal" => {
                let params = self
                    .read_parameters(field(node, "parameters")?)
                    .into_iter()
                    .map(|p| p.name)
                    .collect();
                let body = self.read_block(field(node, "body")?);
                Ok(Expr::Lambda {
                    params,
                    body: match body.as_slice() {
                        [Stmt::Return(Some(e))] => LambdaBody::Expr(Box::new(e.clone())),
                        _ => LambdaBody::Block(body),
                    },
                })
            }
            "parenthesized_expression" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "parenthesized_expression",
                    field: "expression",
                })?;
                self.read_expr(inner)
            }
            _ => unsupported(node),
        }
    }

    fn read_call(&self, node: Node) -> NodeResult<Expr> {
        let function = field(node, "function")?;
        let arg_nodes = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();

        // make(map[K]V) / make([]T, n): arguments are types
        if self.node_text(function) == "make" {
            return Ok(match arg_nodes.first().map(|t| t.kind()) {
                Some("map_type") => Expr::Map(Vec::new()),
                _ => Expr::Array(Vec::new()),
            });
        }

        let callee = self.expr(function);
        let args: Vec<Expr> = arg_nodes.into_iter().map(|a| self.expr(a)).collect();
        if callee_path(&callee).as_deref() == Some("fmt.println") {
            return Ok(Expr::call(Expr::ident("print"), args));
        }

        match (callee_path(&callee).as_deref(), args.as_slice()) {
            (Some("errors.new"), [message]) => {
                return Ok(error_value(GENERIC_ERROR, message.clone()));
            }
            (Some("fmt.errorf"), [Expr::Literal(Literal::String(format)), rest @ ..]) => {
                let message = format_parts(format, rest)
                    .map(format_message)
                    .unwrap_or_else(|| Expr::string(format.clone()));
                return Ok(error_value(GENERIC_ERROR, message));
            }
            (Some("fmt.sprintf"), [Expr::Literal(Literal::String(format)), rest @ ..]) => {
                if let Some(parts) = format_parts(format, rest) {
                    return Ok(format_message(parts));
                }
            }
            _ => {}
        }

        // NewT(args) constructs class T
        if let Expr::Ident(name) = &callee
            && let Some(ty) = self.node_text(function).strip_prefix("New")
            && self.classes.contains(ty)
            && name == &naming::canonical_member(self.node_text(function))
        {
            return Ok(Expr::StructLiteral {
                type_name: ty.to_string(),
                fields: args.into_iter().map(FieldInit::positional).collect(),
            });
        }

        Ok(Expr::call(callee, args))
    }

    fn read_composite(&self, node: Node) -> NodeResult<Expr> {
        let ty = field(node, "type")?;
        let body = field(node, "body")?;
        let mut positional = Vec::new();
        let mut named = Vec::new();
        let mut keyed = Vec::new();
        for element in named_children(body) {
            match element.kind() {
                "keyed_element" => {
                    let parts = named_children(element);
                    let [key, value] = parts.as_slice() else {
                        return unsupported(element);
                    };
                    let key = element_inner(*key);
                    let value = self.expr(element_inner(*value));
                    if matches!(key.kind(), "field_identifier" | "identifier") {
                        let go_name = self.node_text(key);
                        let name = self
                            .field_names
                            .get(go_name)
                            .cloned()
                            .unwrap_or_else(|| naming::canonical_member(go_name));
                        named.push((name, value.clone()));
                    }
                    keyed.push((self.expr(key), value));
                }
                _ => positional.push(self.expr(element_inner(element))),
            }
        }

        match ty.kind() {
            "slice_type" | "array_type" | "implicit_length_array_type" => Ok(Expr::Array(positional)),
            "map_type" => Ok(Expr::Map(keyed)),
            _ => {
                let name = self.node_text(ty).trim_start_matches('*');
                let name = name.rsplit('.').next().unwrap_or(name);
                Ok(self.known.construct_or_call(name, positional, named))
            }
        }
    }
}

/// `literal_element` wraps the actual expression in newer grammars.
fn element_inner(node: Node) -> Node {
    if node.kind() == "literal_element"
        && let Some(inner) = node.named_child(0)
    {
        return inner;
    }
    node
}

/// A format without verbs stays a plain string.
fn format_message(parts: Vec<FormatPart>) -> Expr {
    match parts.as_slice() {
        [] => Expr::string(""),
        [FormatPart::Text(text)] => Expr::string(text.clone()),
        _ => Expr::FormatString(parts),
    }
}

/// Leftover `xs = append(xs, v)` becomes the method call `xs.append(v)`.
fn normalize_appends(body: Vec<Stmt>) -> Vec<Stmt> {
    body.into_iter()
        .flat_map(|stmt| {
            let stmt = map_nested_bodies(stmt, normalize_appends);
            match stmt {
                Stmt::Assign {
                    target: Expr::Ident(acc),
                    value: Expr::Call { callee, args, .. },
                    is_declaration: false,
                    ..
                } if matches!(callee.as_ref(), Expr::Ident(f) if f == "append")
                    && matches!(args.first(), Some(Expr::Ident(a)) if *a == acc)
                    && args.len() >= 2 =>
                {
                    args.into_iter()
                        .skip(1)
                        .map(|v| {
                            Stmt::Expr(Expr::call(
                                Expr::member(Expr::ident(&acc), "append"),
                                vec![v],
                            ))
                        })
                        .collect::<Vec<_>>()
                }
                other => vec![other],
            }
        })
        .collect()
}

/// Rewrite a `NewT` body into constructor form: the trailing
/// `return &T{...}` becomes field assignments on `self`, and the
/// `self := &T{}` / `return self` frame is dropped.
fn constructor_body(mut body: Vec<Stmt>, class: &str, properties: &[Property]) -> Vec<Stmt> {
    if matches!(body.first(), Some(Stmt::Assign {
            target: Expr::Ident(n),
            value: Expr::StructLiteral { type_name, fields },
            ..
        }) if n == "self" && type_name == class && fields.is_empty())
    {
        body.remove(0);
    }
    match body.pop() {
        Some(Stmt::Return(Some(Expr::Ident(n)))) if n == "self" => {}
        Some(Stmt::Return(Some(Expr::StructLiteral { type_name, fields }))) if type_name == class => {
            for (i, field) in fields.into_iter().enumerate() {
                let name = field
                    .name
                    .or_else(|| properties.get(i).map(|p| p.name.clone()));
                if let Some(name) = name {
                    body.push(Stmt::assign(
                        Expr::member(Expr::ident("self"), name),
                        field.value,
                    ));
                }
            }
        }
        Some(other) => body.push(other),
        None => {}
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(source: &str) -> Module {
        read_go(source, "test.go").unwrap()
    }

    #[test]
    fn test_error_tuple_return() {
        let source = r#"
package users

type User struct {
	Name string `json:"name"`
	Age  int    `json:"age"`
}

func GetUser(id int) (User, error) {
	user := User{Name: "Alice", Age: 30}
	return user, nil
}
"#;
        let module = read(source);
        assert_eq!(module.name, "users");
        let func = &module.functions[0];
        assert_eq!(func.name, "get_user");
        assert_eq!(func.return_type, Some(Type::new("User")));
        assert_eq!(func.throws, vec!["error".to_string()]);
        assert_eq!(func.body[1], Stmt::Return(Some(Expr::ident("user"))));
        let Stmt::Assign { value: Expr::StructLiteral { fields, .. }, .. } = &func.body[0] else {
            panic!("expected struct literal");
        };
        assert_eq!(fields[0], FieldInit::named("name", Expr::string("Alice")));
    }

    #[test]
    fn test_append_loop_becomes_comprehension() {
        let source = r#"
package main

func Doubled(items []int) []int {
	var result []int
	for _, x := range items {
		if x > 0 {
			result = append(result, x*2)
		}
	}
	return result
}
"#;
        let func = &read(source).functions[0];
        let Stmt::Assign { value: Expr::Comprehension(c), .. } = &func.body[0] else {
            panic!("expected comprehension, got {:?}", func.body[0]);
        };
        assert_eq!(c.iterator, "x");
        assert_eq!(c.iterable, Expr::ident("items"));
        assert!(c.condition.is_some());
    }

    #[test]
    fn test_error_check_collapses() {
        let source = r#"
package main

import "errors"

func Load(path string) (string, error) {
	data, err := read(path)
	if err != nil {
		return "", err
	}
	if data == "" {
		return "", errors.New("empty")
	}
	return data, nil
}
"#;
        let func = &read(source).functions[0];
        assert_eq!(
            func.body[0],
            Stmt::declare("data", Expr::call(Expr::ident("read"), vec![Expr::ident("path")]))
        );
        let Stmt::If { then_body, .. } = &func.body[1] else {
            panic!("expected if");
        };
        assert_eq!(
            then_body[0],
            Stmt::Throw(Expr::call(Expr::ident("Error"), vec![Expr::string("empty")]))
        );
    }

    #[test]
    fn test_methods_and_receiver() {
        let source = r#"
package shapes

type Counter struct {
	Count int
}

func NewCounter(start int) *Counter {
	return &Counter{Count: start}
}

func (c *Counter) Increment(by int) int {
	c.Count += by
	return c.Count
}
"#;
        let module = read(source);
        assert!(module.functions.is_empty());
        let class = &module.classes[0];
        assert_eq!(class.properties[0].name, "count");
        let ctor = class.constructor.as_ref().unwrap();
        assert_eq!(
            ctor.body,
            vec![Stmt::assign(
                Expr::member(Expr::ident("self"), "count"),
                Expr::ident("start")
            )]
        );
        let method = &class.methods[0];
        assert_eq!(method.name, "increment");
        assert_eq!(
            method.body[1],
            Stmt::Return(Some(Expr::member(Expr::ident("self"), "count")))
        );
    }

    #[test]
    fn test_goroutine_and_sprintf() {
        let source = r#"
package main

import "fmt"

func Start(n int) {
	go worker(n)
	msg := fmt.Sprintf("started %d workers", n)
	fmt.Println(msg)
}
"#;
        let func = &read(source).functions[0];
        assert!(func.is_async);
        assert_eq!(
            func.body[0],
            Stmt::Spawn(Expr::call(Expr::ident("worker"), vec![Expr::ident("n")]))
        );
        let Stmt::Assign { value: Expr::FormatString(parts), .. } = &func.body[1] else {
            panic!("expected format string");
        };
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn test_iota_enum_and_constants() {
        let source = r#"
package main

type Color int

const (
	ColorRed Color = iota
	ColorGreen
)

const MaxRetries = 3
"#;
        let module = read(source);
        assert_eq!(module.enums[0].name, "Color");
        assert_eq!(module.enums[0].variants[0].name, "red");
        assert_eq!(module.constants[0].name, "MAX_RETRIES");
    }

    #[test]
    fn test_map_range_and_counted_loop() {
        let source = r#"
package main

func Sum(scores map[string]int, n int) int {
	total := 0
	for k, v := range scores {
		total += v
	}
	for i := 0; i < n; i++ {
		total += i
	}
	return total
}
"#;
        let func = &read(source).functions[0];
        let Stmt::For { iterator, iterable, .. } = &func.body[1] else {
            panic!("expected for");
        };
        assert_eq!(iterator, "k, v");
        assert_eq!(
            iterable,
            &Expr::call(Expr::member(Expr::ident("scores"), "items"), vec![])
        );
        let Stmt::For { iterable, .. } = &func.body[2] else {
            panic!("expected counted for");
        };
        assert_eq!(iterable, &range_call(Expr::int(0), Expr::ident("n")));
    }

    #[test]
    fn test_unclosed_body_reports_location() {
        let err = read_go("package main\n\nfunc f(x interface{}) {\n\treturn\n", "t.go").unwrap_err();
        assert_eq!(err.location().map(|l| l.line), Some(3));
    }

    #[test]
    fn test_format_parts() {
        let parts = format_parts("%s is %5.2f%%", &[Expr::ident("a"), Expr::ident("b")]).unwrap();
        assert_eq!(
            parts,
            vec![
                FormatPart::Expr(Expr::ident("a")),
                FormatPart::Text(" is ".into()),
                FormatPart::Expr(Expr::ident("b")),
                FormatPart::Text("%".into()),
            ]
        );
        assert!(format_parts("%d", &[]).is_none());
    }
}
