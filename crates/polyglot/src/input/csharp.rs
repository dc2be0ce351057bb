//! Tree-sitter based C# reader.
//!
//! C# declares members in PascalCase; every declared method, property and
//! field is mapped to its canonical snake_case name, and bare references to
//! instance members become `self.member`. A static class holding only
//! static members is read as a plain module of functions.

use super::module_name_from_filename;
use super::support::{
    Diagnostics, NodeError, NodeResult, children, field, named_children, number_literal, parse,
    require_structure, unsupported,
};
use crate::ir::*;
use crate::naming;
use crate::patterns::error_tuple::{canonical_error_kind, error_value, is_error_kind};
use crate::patterns::range::compound_assign;
use crate::patterns::{
    KnownTypes, body_is_async, callee_path, check_skeleton, infer_throws, recognize_chain,
    recognize_counted, recognize_spawn,
};
use crate::traits::{ParseError, ReadOutput, Reader};
use crate::types::{Language, infer_type, map_return, to_canonical};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use tree_sitter::Node;

/// Static instance of the C# reader for registry.
pub static CSHARP_READER: CSharpReader = CSharpReader;

/// C# reader using tree-sitter.
pub struct CSharpReader;

impl Reader for CSharpReader {
    fn language(&self) -> &'static str {
        "csharp"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["cs"]
    }

    fn read_with_diagnostics(
        &self,
        source: &str,
        filename: &str,
    ) -> Result<ReadOutput, ParseError> {
        read_csharp_with_diagnostics(source, filename)
    }
}

/// Parse C# source into the IR.
pub fn read_csharp(source: &str, filename: &str) -> Result<Module, ParseError> {
    read_csharp_with_diagnostics(source, filename).map(|out| out.module)
}

fn read_csharp_with_diagnostics(source: &str, filename: &str) -> Result<ReadOutput, ParseError> {
    check_skeleton(source, Language::CSharp)?;
    let tree = parse(source, arborium_c_sharp::language().into())?;
    let root = tree.root_node();
    require_structure(root, filename)?;

    let mut ctx = ReadContext::new(source);
    let mut module = Module::new(module_name_from_filename(filename));
    let types = ctx.collect_types(root, &mut module);
    ctx.read_module(&types, &mut module);
    Ok(ReadOutput {
        module,
        diagnostics: ctx.diagnostics.into_vec(),
    })
}

/// Type declarations in reading order, across namespaces.
fn type_declarations<'t>(
    node: Node<'t>,
    out: &mut Vec<Node<'t>>,
    namespace: &mut Option<String>,
    source: &str,
) {
    for child in named_children(node) {
        match child.kind() {
            "namespace_declaration" | "file_scoped_namespace_declaration" => {
                if namespace.is_none() {
                    *namespace = child
                        .child_by_field_name("name")
                        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                        .map(str::to_string);
                }
                type_declarations(child, out, namespace, source);
            }
            "declaration_list" => type_declarations(child, out, namespace, source),
            // a namespace's own name
            "identifier" | "qualified_name" => {}
            _ => out.push(child),
        }
    }
}

/// Operator token of a binary or assignment expression.
fn operator<'t>(node: Node<'t>) -> NodeResult<Node<'t>> {
    node.child_by_field_name("operator")
        .or_else(|| children(node).into_iter().find(|c| !c.is_named()))
        .ok_or(NodeError::Missing {
            kind: "expression",
            field: "operator",
        })
}

/// Key expression of a `["a"] = 1` dictionary initializer entry.
fn indexer_key(mut node: Node) -> Node {
    while matches!(
        node.kind(),
        "bracketed_argument_list"
            | "argument"
            | "element_binding_expression"
            | "implicit_element_access"
    ) {
        match node.named_child(0) {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// First child present among alternative field names.
fn field_any<'t>(node: Node<'t>, names: &[&'static str]) -> NodeResult<Node<'t>> {
    names
        .iter()
        .find_map(|name| node.child_by_field_name(name))
        .ok_or(NodeError::Missing {
            kind: "declaration",
            field: names.first().copied().unwrap_or("field"),
        })
}

/// Shape of a class member, gathered before bodies are read.
#[derive(Debug, Default, Clone)]
struct ClassInfo {
    /// Instance members by C# spelling.
    instance: HashSet<String>,
    statics: HashSet<String>,
}

struct ReadContext<'a> {
    source: &'a str,
    known: KnownTypes,
    classes: HashMap<String, ClassInfo>,
    /// Every declared member name, so `.Count` on a user type stays a field.
    declared_members: HashSet<String>,
    current: RefCell<ClassInfo>,
    locals: RefCell<HashSet<String>>,
    local_types: RefCell<HashMap<String, Type>>,
    catch_bindings: RefCell<Vec<String>>,
    diagnostics: Diagnostics,
}

impl<'a> ReadContext<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            known: KnownTypes::new(),
            classes: HashMap::new(),
            declared_members: HashSet::new(),
            current: RefCell::new(ClassInfo::default()),
            locals: RefCell::new(HashSet::new()),
            local_types: RefCell::new(HashMap::new()),
            catch_bindings: RefCell::new(Vec::new()),
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

    fn cs_type(&self, node: Node) -> Type {
        to_canonical(Language::CSharp, self.node_text(node))
    }

    fn has_modifier(&self, node: Node, modifier: &str) -> bool {
        named_children(node)
            .iter()
            .any(|c| c.kind() == "modifier" && self.node_text(*c) == modifier)
    }

    /// `///` XML doc lines above a declaration, tags stripped.
    fn doc_comment(&self, node: Node) -> Option<String> {
        let mut lines = Vec::new();
        let mut prev = node.prev_sibling();
        while let Some(comment) = prev.filter(|c| c.kind() == "comment") {
            let Some(line) = self.node_text(comment).strip_prefix("///") else {
                break;
            };
            let line = line.trim();
            let is_tag = line.starts_with("<summary") || line.starts_with("</summary");
            if !is_tag && !line.is_empty() {
                lines.push(line.to_string());
            }
            prev = comment.prev_sibling();
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }

    // ========================================================================
    // First pass: types and members
    // ========================================================================

    fn collect_types<'t>(&mut self, root: Node<'t>, module: &mut Module) -> Vec<Node<'t>> {
        let mut types = Vec::new();
        let mut namespace = None;
        type_declarations(root, &mut types, &mut namespace, self.source);
        if let Some(ns) = namespace {
            module.name = ns;
        }

        for decl in &types {
            let Some(name) = decl.child_by_field_name("name").map(|n| self.node_text(n)) else {
                continue;
            };
            match decl.kind() {
                "class_declaration" | "struct_declaration" => {
                    let mut info = ClassInfo::default();
                    let mut has_behavior = false;
                    let mut fields = Vec::new();
                    if let Some(body) = decl.child_by_field_name("body") {
                        for member in named_children(body) {
                            let is_static = self.has_modifier(member, "static")
                                || self.has_modifier(member, "const");
                            let names = self.member_names(member);
                            if matches!(member.kind(), "method_declaration" | "constructor_declaration")
                            {
                                has_behavior = true;
                            }
                            for n in names {
                                self.declared_members.insert(n.clone());
                                if is_static {
                                    info.statics.insert(n);
                                } else {
                                    if member.kind() != "method_declaration" {
                                        fields.push(naming::canonical_member(&n));
                                    }
                                    info.instance.insert(n);
                                }
                            }
                        }
                    }
                    if has_behavior {
                        self.known.add_class(name);
                    } else {
                        self.known.add_struct(name, fields);
                    }
                    self.classes.insert(name.to_string(), info);
                }
                "record_declaration" | "record_struct_declaration" => {
                    let fields = decl
                        .child_by_field_name("parameters")
                        .map(|params| {
                            named_children(params)
                                .into_iter()
                                .filter_map(|p| p.child_by_field_name("name"))
                                .map(|n| naming::canonical_member(self.node_text(n)))
                                .collect()
                        })
                        .unwrap_or_default();
                    self.known.add_struct(name, fields);
                }
                _ => {}
            }
        }
        types
    }

    /// Declared names of a class member.
    fn member_names(&self, member: Node) -> Vec<String> {
        match member.kind() {
            "field_declaration" | "event_field_declaration" => named_children(member)
                .into_iter()
                .filter(|c| c.kind() == "variable_declaration")
                .flat_map(named_children)
                .filter(|c| c.kind() == "variable_declarator")
                .filter_map(|d| self.declarator_name(d))
                .map(str::to_string)
                .collect(),
            "property_declaration" | "method_declaration" => member
                .child_by_field_name("name")
                .map(|n| vec![self.node_text(n).to_string()])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn declarator_name(&self, declarator: Node) -> Option<&'a str> {
        declarator
            .child_by_field_name("name")
            .or_else(|| declarator.named_child(0))
            .map(|n| self.node_text(n))
    }

    /// Initial value of a variable declarator, if any.
    fn declarator_value<'t>(&self, declarator: Node<'t>) -> Option<Node<'t>> {
        let name = declarator
            .child_by_field_name("name")
            .or_else(|| declarator.named_child(0))?;
        let value = named_children(declarator)
            .into_iter()
            .rfind(|c| c.id() != name.id() && c.kind() != "bracketed_argument_list")?;
        if value.kind() == "equals_value_clause" {
            return value.named_child(0);
        }
        Some(value)
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn read_module(&self, types: &[Node], module: &mut Module) {
        for decl in types {
            let result = match decl.kind() {
                "using_directive" => {
                    module.imports.push(self.read_using(*decl));
                    Ok(())
                }
                "class_declaration" | "struct_declaration" => self.read_class(*decl, module),
                "record_declaration" | "record_struct_declaration" => {
                    self.read_record(*decl).map(|t| module.types.push(t))
                }
                "enum_declaration" => self.read_enum(*decl).map(|e| module.enums.push(e)),
                _ => {
                    self.diagnostics
                        .record(*decl, self.source, "top-level declaration dropped");
                    Ok(())
                }
            };
            if let Err(err) = result {
                self.diagnostics.record(*decl, self.source, err.to_string());
            }
        }
    }

    fn read_using(&self, node: Node) -> Import {
        let text = self.node_text(node).trim();
        let text = text.strip_prefix("global ").unwrap_or(text);
        let text = text
            .trim_start_matches("using")
            .trim_end_matches(';')
            .trim();
        let text = text.strip_prefix("static ").unwrap_or(text);
        match text.split_once('=') {
            Some((alias, path)) => Import {
                module: path.trim().to_string(),
                alias: Some(alias.trim().to_string()),
                items: Vec::new(),
            },
            None => Import::module(text),
        }
    }

    fn read_class(&self, node: Node, module: &mut Module) -> NodeResult<()> {
        let name = self.node_text(field(node, "name")?).to_string();
        let info = self.classes.get(&name).cloned().unwrap_or_default();
        self.current.replace(info);

        let is_static_class = self.has_modifier(node, "static");
        let mut class = Class::new(&name);
        class.doc = self.doc_comment(node);
        class.bases = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "base_list")
            .flat_map(named_children)
            .map(|b| self.node_text(b).split('<').next().unwrap_or("").to_string())
            .collect();

        let mut methods = Vec::new();
        let body = field(node, "body")?;
        for member in named_children(body) {
            let result = match member.kind() {
                "field_declaration" => self.read_field(member, &mut class, module),
                "property_declaration" => self.read_property(member, &mut class, &mut methods),
                "method_declaration" => self.read_method(member).map(|m| methods.push(m)),
                "constructor_declaration" => self.read_constructor(member).map(|c| {
                    class.constructor = Some(c);
                }),
                _ => {
                    self.diagnostics
                        .record(member, self.source, "class member dropped");
                    Ok(())
                }
            };
            if let Err(err) = result {
                self.diagnostics.record(member, self.source, err.to_string());
            }
        }
        self.current.replace(ClassInfo::default());

        // A static class is only a namespace for its functions.
        if is_static_class {
            module.functions.extend(methods.into_iter().map(|mut m| {
                m.is_static = false;
                m
            }));
            return Ok(());
        }
        if methods.is_empty() && class.constructor.is_none() && class.bases.is_empty() {
            let mut def = TypeDefinition::new(name, class.properties);
            def.doc = class.doc;
            module.types.push(def);
            return Ok(());
        }
        class.methods = methods;
        module.classes.push(class);
        Ok(())
    }

    fn read_field(&self, node: Node, class: &mut Class, module: &mut Module) -> NodeResult<()> {
        let decl = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "variable_declaration")
            .ok_or(NodeError::Missing {
                kind: "field_declaration",
                field: "declaration",
            })?;
        let ty = self.cs_type(field(decl, "type")?);
        let is_const = self.has_modifier(node, "const")
            || (self.has_modifier(node, "static") && self.has_modifier(node, "readonly"));
        for declarator in named_children(decl)
            .into_iter()
            .filter(|c| c.kind() == "variable_declarator")
        {
            let Some(name) = self.declarator_name(declarator) else {
                continue;
            };
            let value = self.declarator_value(declarator).map(|v| self.expr(v));
            if is_const {
                module.constants.push(ModuleVar {
                    name: naming::to_screaming_snake_case(name),
                    ty: Some(ty.clone()),
                    value: value.unwrap_or_else(Expr::null),
                    is_constant: true,
                });
                continue;
            }
            let mut property = Property::new(naming::canonical_member(name), ty.clone());
            property.default = value;
            class.properties.push(property);
        }
        Ok(())
    }

    /// Auto-properties are fields; `=> expr` properties are getter methods.
    fn read_property(
        &self,
        node: Node,
        class: &mut Class,
        methods: &mut Vec<Function>,
    ) -> NodeResult<()> {
        let name = naming::canonical_member(self.node_text(field(node, "name")?));
        let ty = self.cs_type(field(node, "type")?);
        if let Some(getter) = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "arrow_expression_clause")
        {
            let value = getter.named_child(0).ok_or(NodeError::Missing {
                kind: "arrow_expression_clause",
                field: "expression",
            })?;
            let mut function = Function::new(name, Vec::new(), vec![Stmt::Return(Some(self.expr(value)))]);
            function.return_type = Some(ty);
            methods.push(function);
            return Ok(());
        }
        let mut property = Property::new(name, ty);
        property.default = node.child_by_field_name("value").map(|v| self.expr(v));
        class.properties.push(property);
        Ok(())
    }

    fn read_parameters(&self, node: Node) -> Vec<Param> {
        let mut params = Vec::new();
        for param in named_children(node) {
            if param.kind() != "parameter" {
                continue;
            }
            let Some(name) = param.child_by_field_name("name") else {
                continue;
            };
            let name_text = self.node_text(name);
            self.locals.borrow_mut().insert(name_text.to_string());
            let ty = param
                .child_by_field_name("type")
                .map(|t| self.cs_type(t))
                .unwrap_or_else(Type::any);
            let mut p = Param::new(naming::canonical(name_text), ty);
            p.is_variadic = self.has_modifier(param, "params")
                || children(param).iter().any(|c| c.kind() == "params");
            if p.is_variadic && let Some(element) = p.ty.element().cloned() {
                p.ty = element;
            }
            p.default = named_children(param)
                .into_iter()
                .find(|c| c.kind() == "equals_value_clause")
                .and_then(|c| c.named_child(0))
                .map(|v| self.expr(v));
            params.push(p);
        }
        params
    }

    fn begin_function(&self, params: &[Param]) {
        self.local_types.replace(
            params
                .iter()
                .map(|p| (p.name.clone(), p.ty.clone()))
                .collect(),
        );
    }

    fn read_method(&self, node: Node) -> NodeResult<Function> {
        self.locals.borrow_mut().clear();
        let name = self.node_text(field(node, "name")?);
        let params = self.read_parameters(field(node, "parameters")?);
        self.begin_function(&params);
        let shape = map_return(
            Language::CSharp,
            self.node_text(field_any(node, &["returns", "type"])?),
        );

        let body = match node.child_by_field_name("body") {
            Some(b) if b.kind() == "arrow_expression_clause" => {
                let value = b.named_child(0).ok_or(NodeError::Missing {
                    kind: "arrow_expression_clause",
                    field: "expression",
                })?;
                let value = self.expr(value);
                if shape.ty.is_some() {
                    vec![Stmt::Return(Some(value))]
                } else {
                    vec![Stmt::Expr(value)]
                }
            }
            Some(b) => self.read_block(b),
            None => Vec::new(),
        };

        Ok(Function {
            name: naming::canonical_member(name),
            params,
            return_type: shape.ty,
            throws: infer_throws(&body),
            is_async: self.has_modifier(node, "async") || shape.is_async || body_is_async(&body),
            is_static: self.has_modifier(node, "static"),
            body,
            doc: self.doc_comment(node),
        })
    }

    fn read_constructor(&self, node: Node) -> NodeResult<Function> {
        self.locals.borrow_mut().clear();
        let params = self.read_parameters(field(node, "parameters")?);
        self.begin_function(&params);
        let body = match node.child_by_field_name("body") {
            Some(b) => self.read_block(b),
            None => Vec::new(),
        };
        Ok(Function {
            name: CONSTRUCTOR_NAME.to_string(),
            throws: infer_throws(&body),
            params,
            body,
            doc: self.doc_comment(node),
            ..Default::default()
        })
    }

    fn read_record(&self, node: Node) -> NodeResult<TypeDefinition> {
        let name = self.node_text(field(node, "name")?);
        let fields = node
            .child_by_field_name("parameters")
            .map(|params| {
                named_children(params)
                    .into_iter()
                    .filter_map(|p| {
                        let name = p.child_by_field_name("name")?;
                        let ty = p.child_by_field_name("type")?;
                        Some(Property::new(
                            naming::canonical_member(self.node_text(name)),
                            self.cs_type(ty),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let mut def = TypeDefinition::new(name, fields);
        def.doc = self.doc_comment(node);
        Ok(def)
    }

    fn read_enum(&self, node: Node) -> NodeResult<Enum> {
        let name = self.node_text(field(node, "name")?).to_string();
        let mut variants = Vec::new();
        for member in named_children(field(node, "body")?) {
            if member.kind() != "enum_member_declaration" {
                continue;
            }
            let mut variant =
                EnumVariant::new(naming::canonical_variant(self.node_text(field(member, "name")?)));
            if let Some(value) = member.child_by_field_name("value")
                && let Expr::Literal(lit) = self.expr(value)
            {
                variant.value = Some(lit);
            }
            variants.push(variant);
        }
        Ok(Enum { name, variants })
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn read_block(&self, node: Node) -> Vec<Stmt> {
        if node.kind() != "block" {
            let mut out = Vec::new();
            if let Err(err) = self.read_stmt(node, &mut out) {
                out.push(Stmt::Unhandled(
                    self.diagnostics.record(node, self.source, err.to_string()),
                ));
            }
            return out;
        }
        let mut stmts = Vec::new();
        for child in named_children(node) {
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
            "local_declaration_statement" => {
                let decl = named_children(node)
                    .into_iter()
                    .find(|c| c.kind() == "variable_declaration")
                    .ok_or(NodeError::Missing {
                        kind: "local_declaration_statement",
                        field: "declaration",
                    })?;
                out.extend(self.read_variable_declaration(decl)?);
            }
            "expression_statement" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "expression_statement",
                    field: "expression",
                })?;
                out.push(self.read_expr_stmt(inner)?);
            }
            "return_statement" => {
                out.push(Stmt::Return(node.named_child(0).map(|v| self.expr(v))));
            }
            "throw_statement" => {
                let value = match node.named_child(0) {
                    Some(v) => self.expr(v),
                    // `throw;` rethrows the caught exception
                    None => match self.catch_bindings.borrow().last() {
                        Some(binding) => Expr::ident(binding),
                        None => return unsupported(node),
                    },
                };
                out.push(Stmt::Throw(value));
            }
            "if_statement" => out.push(self.read_if(node)?),
            "for_statement" => out.extend(self.read_for(node)?),
            "foreach_statement" => out.push(self.read_foreach(node)?),
            "while_statement" => out.push(Stmt::while_loop(
                self.expr(field(node, "condition")?),
                self.read_block(field(node, "body")?),
            )),
            "do_statement" => {
                let mut body = self.read_block(field(node, "body")?);
                let condition = self.expr(field(node, "condition")?);
                body.push(Stmt::if_stmt(
                    Expr::unary(UnaryOp::Not, condition),
                    vec![Stmt::Break],
                    vec![],
                ));
                out.push(Stmt::while_loop(Expr::bool(true), body));
            }
            "try_statement" => out.push(self.read_try(node)?),
            "break_statement" => out.push(Stmt::Break),
            "continue_statement" => out.push(Stmt::Continue),
            "block" => out.extend(self.read_block(node)),
            "empty_statement" => {}
            _ => return unsupported(node),
        }
        Ok(())
    }

    fn read_variable_declaration(&self, decl: Node) -> NodeResult<Vec<Stmt>> {
        let ty_text = self.node_text(field(decl, "type")?);
        let ty = (ty_text != "var").then(|| to_canonical(Language::CSharp, ty_text));
        let mut out = Vec::new();
        for declarator in named_children(decl)
            .into_iter()
            .filter(|c| c.kind() == "variable_declarator")
        {
            let Some(name) = self.declarator_name(declarator) else {
                continue;
            };
            self.locals.borrow_mut().insert(name.to_string());
            let value = self
                .declarator_value(declarator)
                .map(|v| self.expr(v))
                .unwrap_or_else(Expr::null);
            let name = naming::canonical(name);
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
        Ok(out)
    }

    fn read_expr_stmt(&self, node: Node) -> NodeResult<Stmt> {
        match node.kind() {
            "assignment_expression" => {
                let target = self.read_expr(field(node, "left")?)?;
                let value = self.expr(field(node, "right")?);
                let op = self.node_text(operator(node)?);
                if op == "=" {
                    return Ok(Stmt::assign(target, value));
                }
                let op = op
                    .strip_suffix('=')
                    .and_then(|sym| match sym {
                        "??" => Some(BinaryOp::Or),
                        other => BinaryOp::from_c_symbol(other),
                    })
                    .ok_or_else(|| NodeError::Unsupported(format!("operator {op}")))?;
                Ok(compound_assign(target, op, value))
            }
            "postfix_unary_expression" | "prefix_unary_expression"
                if self.node_text(node).contains("++") || self.node_text(node).contains("--") =>
            {
                let operand = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "unary_expression",
                    field: "operand",
                })?;
                let op = if self.node_text(node).contains("++") {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                Ok(compound_assign(self.read_expr(operand)?, op, Expr::int(1)))
            }
            _ => {
                let expr = self.expr(node);
                Ok(match recognize_spawn(Language::CSharp, &expr) {
                    Some(work) => Stmt::Spawn(work),
                    None => Stmt::Expr(expr),
                })
            }
        }
    }

    fn read_if(&self, node: Node) -> NodeResult<Stmt> {
        let condition = self.expr(field(node, "condition")?);
        let then_body = self.read_block(field(node, "consequence")?);
        let else_body = match node.child_by_field_name("alternative") {
            Some(alt) => self.read_block(alt),
            None => Vec::new(),
        };
        Ok(Stmt::if_stmt(condition, then_body, else_body))
    }

    fn read_for(&self, node: Node) -> NodeResult<Vec<Stmt>> {
        let mut init = Vec::new();
        if let Some(i) = node.child_by_field_name("initializer") {
            match i.kind() {
                "variable_declaration" => init.extend(self.read_variable_declaration(i)?),
                _ => init.push(self.read_expr_stmt(i)?),
            }
        }
        let condition = node.child_by_field_name("condition").map(|c| self.expr(c));
        let update = match node.child_by_field_name("update") {
            Some(u) => vec![self.read_expr_stmt(u)?],
            None => Vec::new(),
        };
        let body = self.read_block(field(node, "body")?);

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

    fn read_foreach(&self, node: Node) -> NodeResult<Stmt> {
        let left = field(node, "left")?;
        let names: Vec<&str> = match left.kind() {
            "tuple_pattern" | "parenthesized_variable_designation" => named_children(left)
                .into_iter()
                .map(|n| self.node_text(n))
                .collect(),
            _ => vec![self.node_text(left)],
        };
        for name in &names {
            self.locals.borrow_mut().insert(name.to_string());
        }
        let iterator = names
            .iter()
            .map(|n| naming::canonical(n))
            .collect::<Vec<_>>()
            .join(", ");
        let mut iterable = self.expr(field(node, "right")?);
        let is_map = matches!(&iterable, Expr::Ident(name)
            if self.local_types.borrow().get(name).is_some_and(|t| t.is_map()));
        if is_map && names.len() == 2 {
            iterable = Expr::call(Expr::member(iterable, "items"), vec![]);
        }
        Ok(Stmt::for_in(iterator, iterable, self.read_block(field(node, "body")?)))
    }

    fn read_try(&self, node: Node) -> NodeResult<Stmt> {
        let body = self.read_block(field(node, "body")?);
        let mut catches = Vec::new();
        let mut finally = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "catch_clause" => {
                    let decl = named_children(child)
                        .into_iter()
                        .find(|c| c.kind() == "catch_declaration");
                    let kind = decl
                        .and_then(|d| d.child_by_field_name("type"))
                        .map(|t| canonical_error_kind(Language::CSharp, self.node_text(t)));
                    let binding = decl
                        .and_then(|d| d.child_by_field_name("name"))
                        .map(|n| self.node_text(n));
                    if let Some(b) = binding {
                        self.locals.borrow_mut().insert(b.to_string());
                        self.catch_bindings.borrow_mut().push(naming::canonical(b));
                    }
                    let body = self.read_block(field(child, "body")?);
                    if binding.is_some() {
                        self.catch_bindings.borrow_mut().pop();
                    }
                    catches.push(CatchBlock {
                        kind,
                        binding: binding.map(naming::canonical),
                        body,
                    });
                }
                "finally_clause" => {
                    if let Some(block) = named_children(child).into_iter().find(|c| c.kind() == "block") {
                        finally = self.read_block(block);
                    }
                }
                _ => {}
            }
        }
        Ok(Stmt::Try {
            body,
            catches,
            finally,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Whether `expr` is a local known to hold a list or map.
    fn is_collection(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Ident(name)
            if self.local_types.borrow().get(name).is_some_and(|t| t.is_array() || t.is_map()))
    }

    /// A bare identifier: local, instance member, static member or type.
    fn ident(&self, text: &str) -> Expr {
        if self.locals.borrow().contains(text) {
            return Expr::Ident(naming::canonical(text));
        }
        let current = self.current.borrow();
        if current.instance.contains(text) {
            return Expr::member(Expr::ident("self"), naming::canonical_member(text));
        }
        if current.statics.contains(text) {
            return Expr::Ident(naming::canonical_member(text));
        }
        Expr::Ident(naming::canonical(text))
    }

    fn read_expr(&self, node: Node) -> NodeResult<Expr> {
        match node.kind() {
            "integer_literal" | "real_literal" => Ok(number_literal(self.node_text(node))),
            "string_literal" | "character_literal" => {
                let text = self.node_text(node);
                let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
                Ok(Expr::string(super::unescape(inner)))
            }
            "verbatim_string_literal" => {
                let text = self.node_text(node).trim_start_matches('@');
                let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
                Ok(Expr::string(inner.replace("\"\"", "\"")))
            }
            "boolean_literal" => Ok(Expr::bool(self.node_text(node) == "true")),
            "null_literal" => Ok(Expr::null()),
            "identifier" => Ok(self.ident(self.node_text(node))),
            "this" | "this_expression" => Ok(Expr::ident("self")),
            "predefined_type" | "qualified_name" | "generic_name" => {
                Ok(Expr::Ident(self.node_text(node).to_string()))
            }

            "binary_expression" => {
                let left = self.expr(field(node, "left")?);
                let right = self.expr(field(node, "right")?);
                let symbol = self.node_text(operator(node)?);
                let op = match symbol {
                    "??" => BinaryOp::Or,
                    other => BinaryOp::from_c_symbol(other)
                        .ok_or_else(|| NodeError::Unsupported(format!("operator {other}")))?,
                };
                Ok(Expr::binary(left, op, right))
            }
            "prefix_unary_expression" => {
                let operand = self.expr(node.named_child(0).ok_or(NodeError::Missing {
                    kind: "prefix_unary_expression",
                    field: "operand",
                })?);
                match children(node).first().map(|c| c.kind()) {
                    Some("!") => Ok(Expr::unary(UnaryOp::Not, operand)),
                    Some("~") => Ok(Expr::unary(UnaryOp::BitNot, operand)),
                    Some("-") => Ok(match operand {
                        Expr::Literal(Literal::Int(n)) => Expr::int(-n),
                        Expr::Literal(Literal::Float(f)) => Expr::float(-f),
                        other => Expr::unary(UnaryOp::Neg, other),
                    }),
                    Some("+") => Ok(operand),
                    _ => unsupported(node),
                }
            }
            "postfix_unary_expression" if self.node_text(node).ends_with('!') => {
                // null-forgiving `x!`
                self.read_expr(node.named_child(0).ok_or(NodeError::Missing {
                    kind: "postfix_unary_expression",
                    field: "operand",
                })?)
            }
            "parenthesized_expression" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "parenthesized_expression",
                    field: "expression",
                })?;
                self.read_expr(inner)
            }
            "cast_expression" => self.read_expr(field(node, "value")?),
            "await_expression" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "await_expression",
                    field: "expression",
                })?;
                Ok(Expr::await_expr(self.expr(inner)))
            }
            "conditional_expression" => Ok(Expr::ternary(
                self.expr(field(node, "condition")?),
                self.expr(field(node, "consequence")?),
                self.expr(field(node, "alternative")?),
            )),

            "invocation_expression" => self.read_invocation(node),
            "member_access_expression" => {
                let object = self.expr(field(node, "expression")?);
                let name = self.node_text(field(node, "name")?);
                let name = name.split('<').next().unwrap_or(name);
                // .Count / .Length on collections and strings
                if matches!(name, "Count" | "Length") && !self.declared_members.contains(name) {
                    return Ok(Expr::call(Expr::ident("len"), vec![object]));
                }
                Ok(Expr::member(object, naming::canonical_member(name)))
            }
            "element_access_expression" => {
                let object = self.expr(field(node, "expression")?);
                let subscript = field(node, "subscript")?;
                let index = named_children(subscript)
                    .first()
                    .and_then(|arg| arg.named_child(0).or(Some(*arg)))
                    .ok_or(NodeError::Missing {
                        kind: "element_access_expression",
                        field: "subscript",
                    })?;
                Ok(Expr::index(object, self.expr(index)))
            }
            "object_creation_expression" | "implicit_object_creation_expression" => {
                self.read_creation(node)
            }
            "array_creation_expression" | "implicit_array_creation_expression" => {
                match node.child_by_field_name("initializer").or_else(|| {
                    named_children(node)
                        .into_iter()
                        .find(|c| c.kind() == "initializer_expression")
                }) {
                    Some(init) => Ok(Expr::Array(
                        named_children(init).into_iter().map(|e| self.expr(e)).collect(),
                    )),
                    None => Ok(Expr::Array(Vec::new())),
                }
            }
            "collection_expression" | "initializer_expression" => Ok(Expr::Array(
                named_children(node).into_iter().map(|e| self.expr(e)).collect(),
            )),
            "lambda_expression" => self.read_lambda(node),
            "interpolated_string_expression" => self.read_interpolated(node),
            _ => unsupported(node),
        }
    }

    fn read_arguments(&self, node: Node) -> (Vec<Expr>, Vec<(String, Expr)>) {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        let Some(list) = node.child_by_field_name("arguments") else {
            return (args, kwargs);
        };
        for arg in named_children(list) {
            let parts = named_children(arg);
            let Some(value) = parts.last() else {
                continue;
            };
            let value = self.expr(*value);
            match parts.iter().find(|p| p.kind() == "name_colon") {
                Some(name) => kwargs.push((
                    naming::canonical(self.node_text(*name).trim_end_matches(':').trim()),
                    value,
                )),
                None => args.push(value),
            }
        }
        (args, kwargs)
    }

    fn read_invocation(&self, node: Node) -> NodeResult<Expr> {
        let function = field(node, "function")?;
        let callee = self.expr(function);
        let (args, kwargs) = self.read_arguments(node);

        let path = callee_path(&callee);
        match (path.as_deref(), args.as_slice()) {
            (Some("Console.write_line" | "Console.write"), _) => {
                return Ok(Expr::call(Expr::ident("print"), args));
            }
            (Some("Math.floor"), [Expr::Binary { op: BinaryOp::Div, left, right }]) => {
                return Ok(Expr::binary(
                    left.as_ref().clone(),
                    BinaryOp::FloorDiv,
                    right.as_ref().clone(),
                ));
            }
            (Some("Math.pow"), [base, exp]) => {
                return Ok(Expr::binary(base.clone(), BinaryOp::Pow, exp.clone()));
            }
            (Some("string.format" | "String.format"), [Expr::Literal(Literal::String(template)), rest @ ..]) => {
                if let Some(parts) = indexed_format(template, rest) {
                    return Ok(Expr::FormatString(parts));
                }
            }
            _ => {}
        }

        if let Expr::Member { object, property } = &callee {
            let object = object.as_ref();
            match (property.as_str(), args.as_slice()) {
                ("add", [item])
                    if self.is_collection(object) || !self.declared_members.contains("Add") =>
                {
                    return Ok(Expr::call(
                        Expr::member(object.clone(), "append"),
                        vec![item.clone()],
                    ));
                }
                ("contains" | "contains_key", [item]) => {
                    return Ok(Expr::binary(item.clone(), BinaryOp::In, object.clone()));
                }
                ("count", []) if !self.declared_members.contains("Count") => {
                    return Ok(Expr::call(Expr::ident("len"), vec![object.clone()]));
                }
                ("to_string", []) => return Ok(object.clone()),
                _ => {}
            }
        }

        let call = Expr::Call {
            callee: Box::new(callee),
            args,
            kwargs,
        };
        if continues_chain(node) {
            return Ok(call);
        }
        Ok(match recognize_chain(Language::CSharp, &call, None) {
            Some(c) => Expr::comprehension(c),
            None => call,
        })
    }

    fn read_creation(&self, node: Node) -> NodeResult<Expr> {
        let type_text = node
            .child_by_field_name("type")
            .map(|t| self.node_text(t))
            .unwrap_or("");
        let base = type_text.split('<').next().unwrap_or(type_text).trim();
        if base.is_empty() {
            // target-typed `new()`
            return unsupported(node);
        }
        let (args, _) = self.read_arguments(node);
        let initializer = node.child_by_field_name("initializer").or_else(|| {
            named_children(node)
                .into_iter()
                .find(|c| c.kind() == "initializer_expression")
        });
        let items = initializer.map(named_children).unwrap_or_default();

        match base {
            "List" | "HashSet" | "LinkedList" | "Queue" | "Stack" => {
                return Ok(Expr::Array(items.into_iter().map(|e| self.expr(e)).collect()));
            }
            "Dictionary" | "SortedDictionary" => {
                let mut entries = Vec::new();
                for item in items {
                    let pair = match item.kind() {
                        // { "a", 1 }
                        "initializer_expression" => match named_children(item).as_slice() {
                            [k, v] => (self.expr(*k), self.expr(*v)),
                            _ => return unsupported(item),
                        },
                        // ["a"] = 1
                        "assignment_expression" => {
                            let key = indexer_key(field(item, "left")?);
                            (self.expr(key), self.expr(field(item, "right")?))
                        }
                        _ => return unsupported(item),
                    };
                    entries.push(pair);
                }
                return Ok(Expr::Map(entries));
            }
            _ => {}
        }

        if is_error_kind(base) {
            let kind = canonical_error_kind(Language::CSharp, base);
            return Ok(match args.into_iter().next() {
                Some(message) => error_value(kind, message),
                None => Expr::call(Expr::ident(kind), vec![]),
            });
        }

        // new User { Name = "x" } names its fields
        let mut named = Vec::new();
        for item in items {
            if item.kind() != "assignment_expression" {
                return unsupported(item);
            }
            let name = self.node_text(field(item, "left")?);
            named.push((naming::canonical_member(name), self.expr(field(item, "right")?)));
        }
        Ok(self.known.construct_or_call(base, args, named))
    }

    fn read_lambda(&self, node: Node) -> NodeResult<Expr> {
        let params_node = field(node, "parameters")?;
        let names: Vec<&str> = match params_node.kind() {
            "parameter_list" => named_children(params_node)
                .into_iter()
                .filter_map(|p| p.child_by_field_name("name"))
                .map(|n| self.node_text(n))
                .collect(),
            _ => vec![self.node_text(params_node)],
        };
        for name in &names {
            self.locals.borrow_mut().insert(name.to_string());
        }
        let params = names.iter().map(|n| naming::canonical(n)).collect();
        let body = field(node, "body")?;
        let body = match body.kind() {
            "block" => LambdaBody::Block(self.read_block(body)),
            _ => LambdaBody::Expr(Box::new(self.expr(body))),
        };
        Ok(Expr::Lambda { params, body })
    }

    fn read_interpolated(&self, node: Node) -> NodeResult<Expr> {
        let mut parts: Vec<FormatPart> = Vec::new();
        for child in named_children(node) {
            let part = match child.kind() {
                "string_content" | "interpolated_string_text" | "string_literal_content" => {
                    FormatPart::Text(super::unescape(self.node_text(child)))
                }
                "escape_sequence" => FormatPart::Text(super::unescape(self.node_text(child))),
                "interpolation" => {
                    let inner = named_children(child)
                        .into_iter()
                        .find(|c| !c.kind().starts_with("interpolation"))
                        .ok_or(NodeError::Missing {
                            kind: "interpolation",
                            field: "expression",
                        })?;
                    FormatPart::Expr(self.expr(inner))
                }
                _ => continue,
            };
            match (parts.last_mut(), part) {
                (Some(FormatPart::Text(prev)), FormatPart::Text(next)) => prev.push_str(&next),
                (_, part) => parts.push(part),
            }
        }
        Ok(match parts.as_slice() {
            [] => Expr::string(""),
            [FormatPart::Text(text)] => Expr::string(text.clone()),
            _ => Expr::FormatString(parts),
        })
    }
}

/// `"{0} of {1}"` with its arguments.
fn indexed_format(template: &str, args: &[Expr]) -> Option<Vec<FormatPart>> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                text.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                text.push('}');
            }
            '{' => {
                let spec: String = chars.by_ref().take_while(|c| *c != '}').collect();
                let index: usize = spec.split([':', ',']).next()?.trim().parse().ok()?;
                if !text.is_empty() {
                    parts.push(FormatPart::Text(std::mem::take(&mut text)));
                }
                parts.push(FormatPart::Expr(args.get(index)?.clone()));
            }
            c => text.push(c),
        }
    }
    if !text.is_empty() {
        parts.push(FormatPart::Text(text));
    }
    Some(parts)
}

/// Whether a call is the receiver of a further method call, so a LINQ
/// chain is only lifted at its outermost link.
fn continues_chain(call: Node) -> bool {
    call.parent().is_some_and(|p| {
        p.kind() == "member_access_expression" && p.child_by_field_name("expression") == Some(call)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(source: &str) -> Module {
        read_csharp(source, "Program.cs").unwrap()
    }

    #[test]
    fn test_static_class_functions() {
        let source = r#"
namespace Geometry
{
    public static class MathUtils
    {
        /// <summary>
        /// Add two numbers.
        /// </summary>
        public static int Add(int a, int b)
        {
            return a + b;
        }

        public static int Twice(int x) => Add(x, x);
    }
}
"#;
        let module = read(source);
        assert_eq!(module.name, "Geometry");
        assert!(module.classes.is_empty());
        let add = module.function("add").unwrap();
        assert!(!add.is_static);
        assert_eq!(add.doc.as_deref(), Some("Add two numbers."));
        let twice = module.function("twice").unwrap();
        assert_eq!(
            twice.body[0],
            Stmt::Return(Some(Expr::call(
                Expr::ident("add"),
                vec![Expr::ident("x"), Expr::ident("x")]
            )))
        );
    }

    #[test]
    fn test_class_members_resolve_to_self() {
        let source = r#"
public class Account
{
    private decimal Balance;

    public Account(decimal initial)
    {
        Balance = initial;
    }

    public void Deposit(decimal amount)
    {
        if (amount <= 0)
        {
            throw new ArgumentException("amount must be positive");
        }
        this.Balance += amount;
    }
}
"#;
        let module = read(source);
        let class = &module.classes[0];
        assert_eq!(class.properties[0].name, "balance");
        let ctor = class.constructor.as_ref().unwrap();
        assert_eq!(
            ctor.body[0],
            Stmt::assign(
                Expr::member(Expr::ident("self"), "balance"),
                Expr::ident("initial")
            )
        );
        let deposit = &class.methods[0];
        assert_eq!(deposit.name, "deposit");
        assert_eq!(deposit.throws, vec!["ArgumentException".to_string()]);
        let Stmt::If { then_body, .. } = &deposit.body[0] else {
            panic!("expected if");
        };
        assert_eq!(
            then_body[0],
            Stmt::Throw(error_value(
                "ArgumentException",
                Expr::string("amount must be positive")
            ))
        );
    }

    #[test]
    fn test_linq_chain() {
        let source = r#"
using System.Linq;

public static class Filters
{
    public static List<int> Doubled(List<int> items)
    {
        return items.Where(x => x > 0).Select(x => x * 2).ToList();
    }
}
"#;
        let module = read(source);
        assert_eq!(module.imports[0].module, "System.Linq");
        let func = &module.functions[0];
        assert_eq!(func.return_type, Some(Type::array(Type::int())));
        let Stmt::Return(Some(Expr::Comprehension(c))) = &func.body[0] else {
            panic!("expected comprehension, got {:?}", func.body[0]);
        };
        assert_eq!(c.kind, ComprehensionKind::List);
        assert_eq!(c.iterator, "x");
        assert_eq!(
            c.target,
            Expr::binary(Expr::ident("x"), BinaryOp::Mul, Expr::int(2))
        );
    }

    #[test]
    fn test_poco_and_object_initializer() {
        let source = r#"
public class User
{
    public string Name { get; set; }
    public int Age { get; set; }
}

public static class Factory
{
    public static User Make()
    {
        return new User { Name = "Alice", Age = 30 };
    }
}
"#;
        let module = read(source);
        assert_eq!(module.types[0].name, "User");
        assert_eq!(module.types[0].fields[1].name, "age");
        assert_eq!(
            module.functions[0].body[0],
            Stmt::Return(Some(Expr::StructLiteral {
                type_name: "User".into(),
                fields: vec![
                    FieldInit::named("name", Expr::string("Alice")),
                    FieldInit::named("age", Expr::int(30)),
                ],
            }))
        );
    }

    #[test]
    fn test_async_task_and_interpolation() {
        let source = r#"
public static class Jobs
{
    public static async Task<string> Fetch(string url)
    {
        var body = await Download(url);
        Task.Run(() => Log(body));
        return $"got {body.Length} bytes";
    }

    static void Log(string message) { }
}
"#;
        let func = &read(source).functions[0];
        assert!(func.is_async);
        assert_eq!(func.return_type, Some(Type::string()));
        assert_eq!(
            func.body[1],
            Stmt::Spawn(Expr::call(Expr::ident("log"), vec![Expr::ident("body")]))
        );
        let Stmt::Return(Some(Expr::FormatString(parts))) = &func.body[2] else {
            panic!("expected interpolation");
        };
        assert_eq!(
            parts[1],
            FormatPart::Expr(Expr::call(Expr::ident("len"), vec![Expr::ident("body")]))
        );
    }

    #[test]
    fn test_loops_and_enum() {
        let source = r#"
public enum Level { Low, High = 5 }

public static class Loops
{
    public static int Sum(int n)
    {
        var total = 0;
        for (int i = 0; i < n; i++)
        {
            total += i;
        }
        foreach (var x in new List<int> { 1, 2 })
        {
            total += x;
        }
        return total;
    }
}
"#;
        let module = read(source);
        assert_eq!(module.enums[0].variants[0].name, "low");
        assert_eq!(module.enums[0].variants[1].value, Some(Literal::Int(5)));
        let func = &module.functions[0];
        let Stmt::For { iterator, iterable, .. } = &func.body[1] else {
            panic!("expected counted for");
        };
        assert_eq!(iterator, "i");
        assert_eq!(iterable, &crate::patterns::range_call(Expr::int(0), Expr::ident("n")));
        let Stmt::For { iterable, .. } = &func.body[2] else {
            panic!("expected foreach");
        };
        assert_eq!(iterable, &Expr::Array(vec![Expr::int(1), Expr::int(2)]));
    }

    #[test]
    fn test_indexed_format() {
        let parts = indexed_format("{0} of {1:N2}", &[Expr::ident("a"), Expr::ident("b")]).unwrap();
        assert_eq!(
            parts,
            vec![
                FormatPart::Expr(Expr::ident("a")),
                FormatPart::Text(" of ".into()),
                FormatPart::Expr(Expr::ident("b")),
            ]
        );
        assert!(indexed_format("{2}", &[]).is_none());
    }
}
