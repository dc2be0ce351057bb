//! Tree-sitter based JavaScript and TypeScript reader.
//!
//! `.ts` files are parsed with the TypeScript grammar and contribute their
//! annotations; plain JavaScript gets its types from JSDoc comments.

use super::module_name_from_filename;
use super::support::{
    Diagnostics, NodeError, NodeResult, children, field, has_token, named_children,
    number_literal, parse, require_structure, unsupported,
};
use crate::ir::*;
use crate::naming;
use crate::patterns::error_tuple::{canonical_error_kind, is_error_kind};
use crate::patterns::range::compound_assign;
use crate::patterns::{
    KnownTypes, body_is_async, callee_path, check_skeleton, infer_throws, recognize_chain,
    recognize_counted, recognize_spawn,
};
use crate::traits::{ParseError, ReadOutput, Reader};
use crate::types::{Language, infer_type, map_return, to_canonical};
use tree_sitter::Node;

/// Static instance of the JavaScript reader for registry.
pub static JAVASCRIPT_READER: JavaScriptReader = JavaScriptReader;

/// JavaScript/TypeScript reader using tree-sitter.
pub struct JavaScriptReader;

impl Reader for JavaScriptReader {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["js", "mjs", "cjs", "ts", "mts"]
    }

    fn read_with_diagnostics(
        &self,
        source: &str,
        filename: &str,
    ) -> Result<ReadOutput, ParseError> {
        read_javascript_with_diagnostics(source, filename)
    }
}

/// Parse JavaScript (or TypeScript, by extension) into the IR.
pub fn read_javascript(source: &str, filename: &str) -> Result<Module, ParseError> {
    read_javascript_with_diagnostics(source, filename).map(|out| out.module)
}

fn is_typescript(filename: &str) -> bool {
    filename.ends_with(".ts") || filename.ends_with(".mts") || filename.ends_with(".cts")
}

fn read_javascript_with_diagnostics(
    source: &str,
    filename: &str,
) -> Result<ReadOutput, ParseError> {
    check_skeleton(source, Language::JavaScript)?;
    let language = if is_typescript(filename) {
        arborium_typescript::language().into()
    } else {
        arborium_javascript::language().into()
    };
    let tree = parse(source, language)?;
    let root = tree.root_node();
    require_structure(root, filename)?;

    let mut ctx = ReadContext::new(source);
    ctx.collect_types(root);
    let module = ctx.read_module(root, filename);
    Ok(ReadOutput {
        module,
        diagnostics: ctx.diagnostics.into_vec(),
    })
}

// ============================================================================
// JSDoc
// ============================================================================

/// The tags of a `/** ... */` block that carry type information.
#[derive(Debug, Default)]
struct JsDoc {
    summary: Option<String>,
    params: Vec<(String, String)>,
    returns: Option<String>,
    throws: Vec<String>,
    ty: Option<String>,
    typedef: Option<String>,
    properties: Vec<(String, String)>,
}

impl JsDoc {
    fn parse(text: &str) -> Option<Self> {
        let inner = text.strip_prefix("/**")?.strip_suffix("*/")?;
        let mut doc = JsDoc::default();
        let mut summary = Vec::new();
        for line in inner.lines() {
            let line = line.trim().trim_start_matches('*').trim();
            let Some(tag_line) = line.strip_prefix('@') else {
                if !line.is_empty() && doc.params.is_empty() && doc.returns.is_none() {
                    summary.push(line);
                }
                continue;
            };
            let (tag, rest) = tag_line.split_once(' ').unwrap_or((tag_line, ""));
            let Some((ty, after)) = braced(rest) else {
                continue;
            };
            let name = after
                .split_whitespace()
                .next()
                .unwrap_or("")
                .trim_start_matches('[')
                .split(['=', ']'])
                .next()
                .unwrap_or("")
                .to_string();
            match tag {
                "param" | "arg" | "argument" => doc.params.push((name, ty.to_string())),
                "returns" | "return" => doc.returns = Some(ty.to_string()),
                "throws" | "exception" => doc.throws.push(ty.to_string()),
                "type" => doc.ty = Some(ty.to_string()),
                "typedef" => doc.typedef = Some(name),
                "property" | "prop" => doc.properties.push((name, ty.to_string())),
                _ => {}
            }
        }
        if !summary.is_empty() {
            doc.summary = Some(summary.join(" "));
        }
        Some(doc)
    }

    /// Type text for a parameter; `fields.name` matches `name`.
    fn param_type(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name || n.rsplit('.').next() == Some(name))
            .map(|(_, t)| t.as_str())
    }
}

/// `{Array<string>} rest` → (`Array<string>`, `rest`).
fn braced(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if !text.starts_with('{') {
        return None;
    }
    let mut depth = 0;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&text[1..i], &text[i + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

/// TypeScript `: T` annotation text → canonical type.
fn annotation_type(text: &str) -> Type {
    to_canonical(Language::JavaScript, text.trim_start_matches(':').trim())
}

fn jsdoc_type(text: &str) -> Type {
    to_canonical(Language::JavaScript, text.trim_start_matches("..."))
}

// ============================================================================
// Reader
// ============================================================================

struct ReadContext<'a> {
    source: &'a str,
    known: KnownTypes,
    diagnostics: Diagnostics,
}

impl<'a> ReadContext<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            known: KnownTypes::new(),
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

    /// JSDoc block directly above `node`.
    fn jsdoc(&self, node: Node) -> Option<JsDoc> {
        let prev = node.prev_sibling()?;
        if prev.kind() != "comment" {
            return None;
        }
        JsDoc::parse(self.node_text(prev))
    }

    // ========================================================================
    // First pass: declared types
    // ========================================================================

    fn collect_types(&mut self, root: Node) {
        for child in named_children(root) {
            let decl = export_inner(child);
            if decl.kind() != "class_declaration" {
                continue;
            }
            let Some(name) = decl.child_by_field_name("name") else {
                continue;
            };
            let name = self.node_text(name).to_string();
            match decl.child_by_field_name("body").and_then(|b| self.struct_fields(b)) {
                Some(fields) => self.known.add_struct(name, fields),
                None => self.known.add_class(name),
            }
        }
    }

    /// Field names when a class body is a plain record: no methods and a
    /// constructor (if any) destructuring a single object.
    fn struct_fields(&self, body: Node) -> Option<Vec<String>> {
        let mut fields = Vec::new();
        let mut pattern_fields = None;
        for member in named_children(body) {
            match member.kind() {
                "method_definition" => {
                    let name = self.node_text(member.child_by_field_name("name")?);
                    if name != "constructor" {
                        return None;
                    }
                    let params = named_children(member.child_by_field_name("parameters")?);
                    let [param] = params.as_slice() else {
                        return None;
                    };
                    let pattern = match param.kind() {
                        "object_pattern" => *param,
                        "required_parameter" => {
                            let p = param.child_by_field_name("pattern")?;
                            (p.kind() == "object_pattern").then_some(p)?
                        }
                        _ => return None,
                    };
                    pattern_fields = Some(self.pattern_names(pattern));
                }
                "field_definition" | "public_field_definition" => {
                    let name = member
                        .child_by_field_name("property")
                        .or_else(|| member.child_by_field_name("name"))?;
                    fields.push(naming::canonical(self.node_text(name)));
                }
                _ => {}
            }
        }
        for name in pattern_fields.unwrap_or_default() {
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
        Some(fields)
    }

    /// Names bound by `{ a, b = 1, c: d }`, by key.
    fn pattern_names(&self, pattern: Node) -> Vec<String> {
        named_children(pattern)
            .into_iter()
            .filter_map(|p| {
                let key = match p.kind() {
                    "shorthand_property_identifier_pattern" => p,
                    "object_assignment_pattern" => p.child_by_field_name("left")?,
                    "pair_pattern" => p.child_by_field_name("key")?,
                    _ => return None,
                };
                Some(naming::canonical(self.node_text(key)))
            })
            .collect()
    }

    // ========================================================================
    // Module level
    // ========================================================================

    fn read_module(&self, root: Node, filename: &str) -> Module {
        let mut module = Module::new(module_name_from_filename(filename));
        for child in children(root) {
            if child.kind() == "comment" {
                if let Some(def) = JsDoc::parse(self.node_text(child)).and_then(typedef) {
                    module.types.push(def);
                }
                continue;
            }
            if !child.is_named() {
                continue;
            }
            if let Err(err) = self.read_top_level(child, child, &mut module) {
                self.diagnostics.record(child, self.source, err.to_string());
            }
        }
        module
    }

    /// `doc_anchor` is the node a JSDoc comment would precede (the export).
    fn read_top_level(&self, node: Node, doc_anchor: Node, module: &mut Module) -> NodeResult<()> {
        match node.kind() {
            "export_statement" => match node.child_by_field_name("declaration") {
                Some(decl) => self.read_top_level(decl, doc_anchor, module),
                None => Ok(()),
            },
            "function_declaration" => {
                let doc = self.jsdoc(doc_anchor);
                let name = self.node_text(field(node, "name")?);
                module
                    .functions
                    .push(self.read_function(node, name, doc.as_ref(), false)?);
                Ok(())
            }
            "class_declaration" => {
                let doc = self.jsdoc(doc_anchor);
                self.read_class(node, doc, module)
            }
            "lexical_declaration" | "variable_declaration" => {
                let doc = self.jsdoc(doc_anchor);
                for decl in named_children(node) {
                    if decl.kind() == "variable_declarator" {
                        self.read_module_declarator(node, decl, doc.as_ref(), module)?;
                    }
                }
                Ok(())
            }
            "import_statement" => {
                module.imports.push(self.read_import(node)?);
                Ok(())
            }
            "interface_declaration" => {
                let name = self.node_text(field(node, "name")?).to_string();
                let fields = self.read_object_type(field(node, "body")?);
                module.types.push(TypeDefinition::new(name, fields));
                Ok(())
            }
            "type_alias_declaration" => {
                let name = self.node_text(field(node, "name")?).to_string();
                let value = field(node, "value")?;
                if value.kind() != "object_type" {
                    return unsupported(value);
                }
                module
                    .types
                    .push(TypeDefinition::new(name, self.read_object_type(value)));
                Ok(())
            }
            "enum_declaration" => {
                module.enums.push(self.read_ts_enum(node)?);
                Ok(())
            }
            "expression_statement" => {
                // Directive prologue ("use strict")
                if node.named_child(0).is_some_and(|c| c.kind() == "string") {
                    return Ok(());
                }
                self.diagnostics
                    .record(node, self.source, "top-level statement dropped");
                Ok(())
            }
            "empty_statement" => Ok(()),
            _ => {
                self.diagnostics
                    .record(node, self.source, "top-level statement dropped");
                Ok(())
            }
        }
    }

    fn read_module_declarator(
        &self,
        decl_node: Node,
        declarator: Node,
        doc: Option<&JsDoc>,
        module: &mut Module,
    ) -> NodeResult<()> {
        let name_node = field(declarator, "name")?;
        let raw = self.node_text(name_node);
        let Some(value) = declarator.child_by_field_name("value") else {
            self.diagnostics
                .record(declarator, self.source, "declaration without a value");
            return Ok(());
        };

        match value.kind() {
            "arrow_function" | "function_expression" | "function" => {
                module
                    .functions
                    .push(self.read_function(value, raw, doc, false)?);
                return Ok(());
            }
            "call_expression" => {
                // const fs = require("fs")
                if let Some(callee) = value.child_by_field_name("function")
                    && self.node_text(callee) == "require"
                    && let Some(module_name) = value
                        .child_by_field_name("arguments")
                        .and_then(|a| a.named_child(0))
                {
                    let mut import = Import::module(self.string_text(module_name));
                    import.alias = Some(raw.to_string());
                    module.imports.push(import);
                    return Ok(());
                }
                // const Color = Object.freeze({ RED: 1 })
                if let Some(callee) = value.child_by_field_name("function")
                    && self.node_text(callee) == "Object.freeze"
                    && let Some(object) = value
                        .child_by_field_name("arguments")
                        .and_then(|a| a.named_child(0))
                    && object.kind() == "object"
                    && naming::is_type_like(raw)
                {
                    module.enums.push(self.read_frozen_enum(raw, object)?);
                    return Ok(());
                }
            }
            _ => {}
        }

        let is_const = has_token(decl_node, "const");
        let ty = declarator
            .child_by_field_name("type")
            .map(|t| annotation_type(self.node_text(t)))
            .or_else(|| doc.and_then(|d| d.ty.as_deref()).map(jsdoc_type));
        if name_node.kind() != "identifier" {
            return unsupported(name_node);
        }
        module.constants.push(ModuleVar {
            name: naming::canonical(raw),
            ty,
            value: self.expr(value),
            is_constant: is_const && naming::is_screaming_case(raw),
        });
        Ok(())
    }

    fn read_import(&self, node: Node) -> NodeResult<Import> {
        let source = field(node, "source")?;
        let mut import = Import::module(self.string_text(source));
        let Some(clause) = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "import_clause")
        else {
            return Ok(import);
        };
        for part in named_children(clause) {
            match part.kind() {
                "identifier" => import.alias = Some(self.node_text(part).to_string()),
                "namespace_import" => {
                    import.alias = part.named_child(0).map(|n| self.node_text(n).to_string());
                }
                "named_imports" => {
                    for spec in named_children(part) {
                        if let Some(name) = spec.child_by_field_name("name") {
                            import.items.push(self.node_text(name).to_string());
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(import)
    }

    fn read_object_type(&self, body: Node) -> Vec<Property> {
        named_children(body)
            .into_iter()
            .filter(|m| m.kind() == "property_signature")
            .filter_map(|m| {
                let name = m.child_by_field_name("name")?;
                let mut ty = m
                    .child_by_field_name("type")
                    .map(|t| annotation_type(self.node_text(t)))
                    .unwrap_or_else(Type::any);
                if has_token(m, "?") {
                    ty = ty.optional();
                }
                Some(Property::new(naming::canonical(self.node_text(name)), ty))
            })
            .collect()
    }

    fn read_ts_enum(&self, node: Node) -> NodeResult<Enum> {
        let name = self.node_text(field(node, "name")?).to_string();
        let mut variants = Vec::new();
        for member in named_children(field(node, "body")?) {
            let (name_node, value) = match member.kind() {
                "enum_assignment" => (
                    field(member, "name")?,
                    member.child_by_field_name("value").map(|v| self.expr(v)),
                ),
                _ => (member, None),
            };
            let mut variant = EnumVariant::new(naming::canonical_variant(self.node_text(name_node)));
            if let Some(Expr::Literal(lit)) = value {
                variant.value = Some(lit);
            }
            variants.push(variant);
        }
        Ok(Enum { name, variants })
    }

    fn read_frozen_enum(&self, name: &str, object: Node) -> NodeResult<Enum> {
        let mut variants = Vec::new();
        for pair in named_children(object) {
            if pair.kind() != "pair" {
                return unsupported(pair);
            }
            let key = self.string_text(field(pair, "key")?);
            let mut variant = EnumVariant::new(naming::canonical_variant(&key));
            if let Expr::Literal(lit) = self.expr(field(pair, "value")?) {
                variant.value = Some(lit);
            }
            variants.push(variant);
        }
        Ok(Enum {
            name: name.to_string(),
            variants,
        })
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn read_function(
        &self,
        node: Node,
        name: &str,
        doc: Option<&JsDoc>,
        is_method: bool,
    ) -> NodeResult<Function> {
        let params = match node.child_by_field_name("parameters") {
            Some(p) => self.read_parameters(p, doc),
            // `x => ...`
            None => match node.child_by_field_name("parameter") {
                Some(p) => vec![Param::new(naming::canonical(self.node_text(p)), Type::any())],
                None => Vec::new(),
            },
        };

        let shape = match node.child_by_field_name("return_type") {
            Some(t) => map_return(
                Language::JavaScript,
                self.node_text(t).trim_start_matches(':').trim(),
            ),
            None => doc
                .and_then(|d| d.returns.as_deref())
                .map(|t| map_return(Language::JavaScript, t))
                .unwrap_or_default(),
        };

        let body_node = field(node, "body")?;
        let body = if body_node.kind() == "statement_block" {
            self.read_block(body_node)
        } else {
            vec![Stmt::Return(Some(self.expr(body_node)))]
        };

        let mut throws = infer_throws(&body);
        for kind in doc.map(|d| d.throws.as_slice()).unwrap_or_default() {
            let kind = canonical_error_kind(Language::JavaScript, kind);
            if !throws.contains(&kind) {
                throws.push(kind);
            }
        }

        Ok(Function {
            name: if is_method {
                naming::canonical_member(name)
            } else {
                naming::canonical(name)
            },
            params,
            return_type: shape.ty,
            throws,
            is_async: has_token(node, "async") || shape.is_async || body_is_async(&body),
            is_static: has_token(node, "static"),
            body,
            doc: doc.and_then(|d| d.summary.clone()),
        })
    }

    fn read_parameters(&self, node: Node, doc: Option<&JsDoc>) -> Vec<Param> {
        let doc_type = |name: &str| {
            doc.and_then(|d| d.param_type(name))
                .map(jsdoc_type)
                .unwrap_or_else(Type::any)
        };
        let mut params = Vec::new();
        for child in named_children(node) {
            let (pattern, annotation, default, optional) = match child.kind() {
                "required_parameter" | "optional_parameter" => (
                    child.child_by_field_name("pattern"),
                    child.child_by_field_name("type"),
                    child.child_by_field_name("value"),
                    child.kind() == "optional_parameter",
                ),
                "assignment_pattern" => (
                    child.child_by_field_name("left"),
                    None,
                    child.child_by_field_name("right"),
                    false,
                ),
                _ => (Some(child), None, None, false),
            };
            let Some(pattern) = pattern else {
                continue;
            };
            let (raw, is_variadic) = match pattern.kind() {
                "identifier" => (self.node_text(pattern), false),
                "rest_pattern" => match pattern.named_child(0) {
                    Some(inner) => (self.node_text(inner), true),
                    None => continue,
                },
                _ => {
                    self.diagnostics
                        .record(pattern, self.source, "destructured parameter dropped");
                    continue;
                }
            };
            let name = naming::canonical(raw);
            let default = default.map(|d| self.expr(d));
            let mut ty = match annotation {
                Some(t) => annotation_type(self.node_text(t)),
                None => {
                    let from_doc = doc_type(raw);
                    match (&from_doc, &default) {
                        (t, Some(d)) if t.name == "any" => infer_type(d).unwrap_or(from_doc),
                        _ => from_doc,
                    }
                }
            };
            // A rest parameter's annotation is the array; keep the element.
            if is_variadic && annotation.is_some() && ty.is_array() {
                ty = ty.element().cloned().unwrap_or_else(Type::any);
            }
            if optional {
                ty = ty.optional();
            }
            let mut param = Param::new(name, ty);
            param.default = default;
            param.is_variadic = is_variadic;
            params.push(param);
        }
        params
    }

    fn read_class(&self, node: Node, doc: Option<JsDoc>, module: &mut Module) -> NodeResult<()> {
        let name = self.node_text(field(node, "name")?).to_string();
        let body = field(node, "body")?;

        let mut class = Class::new(&name);
        class.doc = doc.and_then(|d| d.summary);
        if let Some(heritage) = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "class_heritage")
        {
            class.bases = self.heritage_names(heritage);
        }

        let mut struct_params = Vec::new();
        for member in named_children(body) {
            match member.kind() {
                "method_definition" => {
                    let member_doc = self.jsdoc(member);
                    let raw = self.node_text(field(member, "name")?);
                    let mut func = self.read_function(member, raw, member_doc.as_ref(), true)?;
                    if raw == "constructor" {
                        func.name = CONSTRUCTOR_NAME.to_string();
                        if let Some(params) = member.child_by_field_name("parameters")
                            && let [param] = named_children(params).as_slice()
                        {
                            let pattern = param.child_by_field_name("pattern").unwrap_or(*param);
                            if pattern.kind() == "object_pattern" {
                                struct_params = self
                                    .pattern_names(pattern)
                                    .into_iter()
                                    .map(|n| {
                                        let ty = member_doc
                                            .as_ref()
                                            .and_then(|d| d.param_type(&n))
                                            .map(jsdoc_type)
                                            .unwrap_or_else(Type::any);
                                        Property::new(n, ty)
                                    })
                                    .collect();
                            }
                        }
                        collect_this_properties(&func, &mut class.properties);
                        class.constructor = Some(func);
                    } else {
                        class.methods.push(func);
                    }
                }
                "field_definition" | "public_field_definition" => {
                    let name_node = member
                        .child_by_field_name("property")
                        .or_else(|| member.child_by_field_name("name"));
                    let Some(name_node) = name_node else {
                        continue;
                    };
                    let default = member.child_by_field_name("value").map(|v| self.expr(v));
                    let ty = member
                        .child_by_field_name("type")
                        .map(|t| annotation_type(self.node_text(t)))
                        .or_else(|| {
                            self.jsdoc(member)
                                .and_then(|d| d.ty)
                                .map(|t| jsdoc_type(&t))
                        })
                        .or_else(|| default.as_ref().and_then(infer_type))
                        .unwrap_or_else(Type::any);
                    let mut prop = Property::new(naming::canonical(self.node_text(name_node)), ty);
                    prop.default = default;
                    class.properties.retain(|p| p.name != prop.name);
                    class.properties.push(prop);
                }
                _ => {}
            }
        }

        let is_record = class.methods.is_empty()
            && class.bases.is_empty()
            && self.known.contains(&name)
            && (class.constructor.is_none() || !struct_params.is_empty());
        if is_record {
            let mut fields = class.properties;
            for param in struct_params {
                match fields.iter_mut().find(|f| f.name == param.name) {
                    Some(f) if f.ty.name == "any" => f.ty = param.ty,
                    Some(_) => {}
                    None => fields.push(param),
                }
            }
            module.types.push(TypeDefinition {
                name,
                fields,
                doc: class.doc,
            });
        } else {
            module.classes.push(class);
        }
        Ok(())
    }

    fn heritage_names(&self, heritage: Node) -> Vec<String> {
        let mut names = Vec::new();
        for part in named_children(heritage) {
            match part.kind() {
                "extends_clause" => {
                    if let Some(value) = part.child_by_field_name("value") {
                        names.push(self.node_text(value).to_string());
                    }
                }
                // Interfaces carry no behavior
                "implements_clause" => {}
                _ => names.push(self.node_text(part).to_string()),
            }
        }
        names
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn read_block(&self, node: Node) -> Vec<Stmt> {
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

    /// A statement position that may hold a block or a single statement.
    fn read_body(&self, node: Node) -> Vec<Stmt> {
        if node.kind() == "statement_block" {
            return self.read_block(node);
        }
        let mut stmts = Vec::new();
        if let Err(err) = self.read_stmt(node, &mut stmts) {
            stmts.push(Stmt::Unhandled(
                self.diagnostics.record(node, self.source, err.to_string()),
            ));
        }
        stmts
    }

    fn read_stmt(&self, node: Node, out: &mut Vec<Stmt>) -> NodeResult<()> {
        match node.kind() {
            "lexical_declaration" | "variable_declaration" => {
                for decl in named_children(node) {
                    if decl.kind() == "variable_declarator" {
                        out.push(self.read_declarator(decl)?);
                    }
                }
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
            "if_statement" => out.push(self.read_if(node)?),
            "for_statement" => out.extend(self.read_for(node)?),
            "for_in_statement" => out.push(self.read_for_in(node)?),
            "while_statement" => {
                let condition = self.expr(field(node, "condition")?);
                let body = self.read_body(field(node, "body")?);
                out.push(Stmt::while_loop(condition, body));
            }
            "do_statement" => {
                // do { body } while (c)  →  while (true) { body; if (!c) break; }
                let condition = self.expr(field(node, "condition")?);
                let mut body = self.read_body(field(node, "body")?);
                body.push(Stmt::if_stmt(
                    Expr::unary(UnaryOp::Not, condition),
                    vec![Stmt::Break],
                    vec![],
                ));
                out.push(Stmt::while_loop(Expr::bool(true), body));
            }
            "try_statement" => out.push(self.read_try(node)?),
            "throw_statement" => {
                let value = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "throw_statement",
                    field: "value",
                })?;
                out.push(Stmt::Throw(self.expr(value)));
            }
            "break_statement" => out.push(Stmt::Break),
            "continue_statement" => out.push(Stmt::Continue),
            "statement_block" => out.extend(self.read_block(node)),
            "empty_statement" => {}
            _ => return unsupported(node),
        }
        Ok(())
    }

    fn read_declarator(&self, node: Node) -> NodeResult<Stmt> {
        let name = field(node, "name")?;
        let target = match name.kind() {
            "identifier" => Expr::Ident(naming::canonical(self.node_text(name))),
            "array_pattern" => Expr::Array(
                named_children(name)
                    .into_iter()
                    .map(|n| Expr::Ident(naming::canonical(self.node_text(n))))
                    .collect(),
            ),
            _ => return unsupported(name),
        };
        let value = node
            .child_by_field_name("value")
            .map(|v| self.expr(v))
            .unwrap_or_else(Expr::null);
        let ty = node
            .child_by_field_name("type")
            .map(|t| annotation_type(self.node_text(t)));
        Ok(Stmt::Assign {
            target,
            value,
            is_declaration: true,
            ty,
        })
    }

    fn read_expr_stmt(&self, node: Node) -> NodeResult<Stmt> {
        match node.kind() {
            "assignment_expression" => {
                let left = field(node, "left")?;
                let target = match left.kind() {
                    "array_pattern" => Expr::Array(
                        named_children(left).into_iter().map(|n| self.expr(n)).collect(),
                    ),
                    _ => self.read_expr(left)?,
                };
                Ok(Stmt::assign(target, self.expr(field(node, "right")?)))
            }
            "augmented_assignment_expression" => {
                let target = self.read_expr(field(node, "left")?)?;
                let value = self.expr(field(node, "right")?);
                let op = self.node_text(field(node, "operator")?);
                let op = op
                    .strip_suffix('=')
                    .and_then(|sym| match sym {
                        "**" => Some(BinaryOp::Pow),
                        "&&" => Some(BinaryOp::And),
                        "||" => Some(BinaryOp::Or),
                        other => BinaryOp::from_c_symbol(other),
                    })
                    .ok_or_else(|| NodeError::Unsupported(format!("operator {op}")))?;
                Ok(compound_assign(target, op, value))
            }
            "update_expression" => {
                let target = self.read_expr(field(node, "argument")?)?;
                let op = if self.node_text(node).contains("++") {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                Ok(compound_assign(target, op, Expr::int(1)))
            }
            _ => {
                let expr = self.expr(node);
                Ok(match recognize_spawn(Language::JavaScript, &expr) {
                    Some(work) => Stmt::Spawn(work),
                    None => Stmt::Expr(expr),
                })
            }
        }
    }

    fn read_if(&self, node: Node) -> NodeResult<Stmt> {
        let condition = self.expr(field(node, "condition")?);
        let then_body = self.read_body(field(node, "consequence")?);
        let else_body = match node.child_by_field_name("alternative") {
            Some(alt) => match alt.named_child(0) {
                Some(inner) => self.read_body(inner),
                None => Vec::new(),
            },
            None => Vec::new(),
        };
        Ok(Stmt::if_stmt(condition, then_body, else_body))
    }

    /// C-style `for`: a counted range when recognizable, else a `while`.
    fn read_for(&self, node: Node) -> NodeResult<Vec<Stmt>> {
        let mut init = Vec::new();
        if let Some(initializer) = node.child_by_field_name("initializer") {
            self.read_stmt(initializer, &mut init)?;
        }
        let condition = node.child_by_field_name("condition").and_then(|c| {
            let inner = if c.kind() == "expression_statement" {
                c.named_child(0)?
            } else {
                c
            };
            Some(self.expr(inner))
        });
        let update = match node.child_by_field_name("increment") {
            Some(inc) => Some(self.read_expr_stmt(inc)?),
            None => None,
        };
        let body = self.read_body(field(node, "body")?);

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
            Some(update),
        ) = (init.as_slice(), &condition, &update)
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

    fn read_for_in(&self, node: Node) -> NodeResult<Stmt> {
        let left = field(node, "left")?;
        let iterator = match left.kind() {
            "identifier" => naming::canonical(self.node_text(left)),
            "array_pattern" => named_children(left)
                .into_iter()
                .map(|n| naming::canonical(self.node_text(n)))
                .collect::<Vec<_>>()
                .join(", "),
            _ => return unsupported(left),
        };
        let mut iterable = self.expr(field(node, "right")?);
        let is_of = node
            .child_by_field_name("operator")
            .is_some_and(|op| self.node_text(op) == "of");

        // Object.entries(d) → d.items()
        if is_of
            && let Expr::Call { callee, args, .. } = &iterable
            && callee_path(callee).as_deref() == Some("Object.entries")
            && let [object] = args.as_slice()
        {
            iterable = Expr::call(Expr::member(object.clone(), "items"), vec![]);
        }
        let body = self.read_body(field(node, "body")?);
        Ok(Stmt::for_in(iterator, iterable, body))
    }

    fn read_try(&self, node: Node) -> NodeResult<Stmt> {
        let body = self.read_block(field(node, "body")?);
        let mut catches = Vec::new();
        if let Some(handler) = node.child_by_field_name("handler") {
            let binding = handler
                .child_by_field_name("parameter")
                .map(|p| naming::canonical(self.node_text(p)));
            catches.push(CatchBlock {
                kind: None,
                binding,
                body: self.read_block(field(handler, "body")?),
            });
        }
        let finally = match node.child_by_field_name("finalizer") {
            Some(f) => self.read_block(field(f, "body")?),
            None => Vec::new(),
        };
        Ok(Stmt::Try {
            body,
            catches,
            finally,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn read_expr(&self, node: Node) -> NodeResult<Expr> {
        match node.kind() {
            "number" => Ok(number_literal(self.node_text(node))),
            "string" => Ok(Expr::string(self.string_text(node))),
            "template_string" => self.read_template(node),
            "true" => Ok(Expr::bool(true)),
            "false" => Ok(Expr::bool(false)),
            "null" | "undefined" => Ok(Expr::null()),
            "this" => Ok(Expr::ident("self")),
            "identifier" | "shorthand_property_identifier" => {
                let text = self.node_text(node);
                Ok(match text {
                    "undefined" => Expr::null(),
                    _ => Expr::Ident(naming::canonical(text)),
                })
            }

            "binary_expression" => {
                let left = self.expr(field(node, "left")?);
                let right = self.expr(field(node, "right")?);
                let op = match self.node_text(field(node, "operator")?) {
                    "===" | "==" => BinaryOp::Eq,
                    "!==" | "!=" => BinaryOp::Ne,
                    "**" => BinaryOp::Pow,
                    "??" => BinaryOp::Or,
                    "in" => BinaryOp::In,
                    ">>>" => BinaryOp::Shr,
                    other => BinaryOp::from_c_symbol(other)
                        .ok_or_else(|| NodeError::Unsupported(format!("operator {other}")))?,
                };
                Ok(Expr::binary(left, op, right))
            }
            "unary_expression" => {
                let arg = self.expr(field(node, "argument")?);
                match self.node_text(field(node, "operator")?) {
                    "!" => Ok(Expr::unary(UnaryOp::Not, arg)),
                    "-" => Ok(match arg {
                        Expr::Literal(Literal::Int(n)) => Expr::int(-n),
                        Expr::Literal(Literal::Float(f)) => Expr::float(-f),
                        other => Expr::unary(UnaryOp::Neg, other),
                    }),
                    "~" => Ok(Expr::unary(UnaryOp::BitNot, arg)),
                    "+" => Ok(arg),
                    other => Err(NodeError::Unsupported(format!("operator {other}"))),
                }
            }

            "call_expression" => self.read_call(node),
            "new_expression" => self.read_new(node),
            "member_expression" => {
                let object = self.expr(field(node, "object")?);
                let property = self.node_text(field(node, "property")?);
                if property == "length" {
                    return Ok(Expr::call(Expr::ident("len"), vec![object]));
                }
                Ok(Expr::member(object, naming::canonical(property)))
            }
            "subscript_expression" => Ok(Expr::index(
                self.expr(field(node, "object")?),
                self.expr(field(node, "index")?),
            )),

            "array" => Ok(Expr::Array(
                named_children(node).into_iter().map(|c| self.expr(c)).collect(),
            )),
            "object" => {
                let mut entries = Vec::new();
                for member in named_children(node) {
                    match member.kind() {
                        "pair" => {
                            let key = field(member, "key")?;
                            let key = match key.kind() {
                                "computed_property_name" => match key.named_child(0) {
                                    Some(inner) => self.expr(inner),
                                    None => return unsupported(key),
                                },
                                _ => Expr::string(self.string_text(key)),
                            };
                            entries.push((key, self.expr(field(member, "value")?)));
                        }
                        "shorthand_property_identifier" => {
                            let name = self.node_text(member);
                            entries.push((
                                Expr::string(name),
                                Expr::Ident(naming::canonical(name)),
                            ));
                        }
                        _ => return unsupported(member),
                    }
                }
                Ok(Expr::Map(entries))
            }

            "arrow_function" | "function_expression" | "function" => {
                let params = match node.child_by_field_name("parameters") {
                    Some(p) => self
                        .read_parameters(p, None)
                        .into_iter()
                        .map(|p| p.name)
                        .collect(),
                    None => node
                        .child_by_field_name("parameter")
                        .map(|p| vec![naming::canonical(self.node_text(p))])
                        .unwrap_or_default(),
                };
                let body = field(node, "body")?;
                let body = if body.kind() == "statement_block" {
                    LambdaBody::Block(self.read_block(body))
                } else {
                    LambdaBody::Expr(Box::new(self.expr(body)))
                };
                Ok(Expr::Lambda { params, body })
            }
            "ternary_expression" => Ok(Expr::ternary(
                self.expr(field(node, "condition")?),
                self.expr(field(node, "consequence")?),
                self.expr(field(node, "alternative")?),
            )),
            "await_expression" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "await_expression",
                    field: "expression",
                })?;
                Ok(Expr::await_expr(self.expr(inner)))
            }
            // Type assertions carry no runtime meaning.
            "parenthesized_expression"
            | "as_expression"
            | "satisfies_expression"
            | "non_null_expression" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "parenthesized_expression",
                    field: "expression",
                })?;
                self.read_expr(inner)
            }
            _ => unsupported(node),
        }
    }

    fn read_arguments(&self, node: Node) -> Vec<Expr> {
        node.child_by_field_name("arguments")
            .map(|args| named_children(args).into_iter().map(|a| self.expr(a)).collect())
            .unwrap_or_default()
    }

    fn read_call(&self, node: Node) -> NodeResult<Expr> {
        let callee = self.expr(field(node, "function")?);
        let args = self.read_arguments(node);

        let path = callee_path(&callee);
        if path.as_deref() == Some("console.log") {
            return Ok(Expr::call(Expr::ident("print"), args));
        }
        match (path.as_deref(), args.as_slice()) {
            // Math.floor(a / b) is floor division
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
            _ => {}
        }
        // xs.includes(x) is membership
        if let Expr::Member { object, property } = &callee
            && property == "includes"
            && let [item] = args.as_slice()
        {
            return Ok(Expr::binary(item.clone(), BinaryOp::In, object.as_ref().clone()));
        }

        let call = Expr::call(callee, args);
        if continues_chain(node) {
            return Ok(call);
        }
        Ok(match recognize_chain(Language::JavaScript, &call, None) {
            Some(c) => Expr::comprehension(c),
            None => call,
        })
    }

    fn read_new(&self, node: Node) -> NodeResult<Expr> {
        let constructor = field(node, "constructor")?;
        let name = self.node_text(constructor);
        let args = self.read_arguments(node);

        if self.known.contains(name) && !is_error_kind(name) {
            // new User({ name, age }) names its fields
            let (positional, named) = match args.as_slice() {
                [Expr::Map(entries)]
                    if entries
                        .iter()
                        .all(|(k, _)| matches!(k, Expr::Literal(Literal::String(_)))) =>
                {
                    let named = entries
                        .iter()
                        .filter_map(|(k, v)| match k {
                            Expr::Literal(Literal::String(k)) => {
                                Some((naming::canonical(k), v.clone()))
                            }
                            _ => None,
                        })
                        .collect();
                    (Vec::new(), named)
                }
                _ => (args, Vec::new()),
            };
            return Ok(self.known.construct_or_call(name, positional, named));
        }

        let callee = match constructor.kind() {
            "identifier" => Expr::ident(canonical_error_kind(Language::JavaScript, name)),
            _ => self.expr(constructor),
        };
        let call = Expr::call(callee, args);
        Ok(match recognize_chain(Language::JavaScript, &call, None) {
            Some(c) => Expr::comprehension(c),
            None => call,
        })
    }

    fn read_template(&self, node: Node) -> NodeResult<Expr> {
        let mut parts: Vec<FormatPart> = Vec::new();
        for child in named_children(node) {
            let part = match child.kind() {
                "string_fragment" | "escape_sequence" => {
                    FormatPart::Text(super::unescape(self.node_text(child)))
                }
                "template_substitution" => {
                    let inner = child.named_child(0).ok_or(NodeError::Missing {
                        kind: "template_substitution",
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

    /// Unquoted, unescaped text of a string or property key.
    fn string_text(&self, node: Node) -> String {
        let text = self.node_text(node);
        let quoted = text.len() >= 2
            && (text.starts_with('"') || text.starts_with('\'') || text.starts_with('`'));
        if quoted {
            super::unescape(&text[1..text.len() - 1])
        } else {
            text.to_string()
        }
    }
}

/// Whether a call is the receiver of a further method call, so an
/// iterator chain is only lifted at its outermost link.
fn continues_chain(call: Node) -> bool {
    call.parent().is_some_and(|p| {
        p.kind() == "member_expression" && p.child_by_field_name("object") == Some(call)
    })
}

/// `export function f` → the declaration itself.
fn export_inner(node: Node) -> Node {
    if node.kind() == "export_statement"
        && let Some(decl) = node.child_by_field_name("declaration")
    {
        return decl;
    }
    node
}

/// `@typedef {Object} User` plus `@property` tags.
fn typedef(doc: JsDoc) -> Option<TypeDefinition> {
    let name = doc.typedef?;
    let fields = doc
        .properties
        .iter()
        .map(|(n, t)| Property::new(naming::canonical(n), jsdoc_type(t)))
        .collect();
    let mut def = TypeDefinition::new(name, fields);
    def.doc = doc.summary;
    Some(def)
}

/// Properties assigned as `this.x = ...` in a constructor.
fn collect_this_properties(ctor: &Function, properties: &mut Vec<Property>) {
    walk_body(&ctor.body, &mut |stmt| {
        let Stmt::Assign {
            target: Expr::Member { object, property },
            value,
            ..
        } = stmt
        else {
            return;
        };
        if object.as_ident() != Some("self") || properties.iter().any(|p| &p.name == property) {
            return;
        }
        let ty = match value {
            Expr::Ident(n) => ctor
                .params
                .iter()
                .find(|p| &p.name == n)
                .map(|p| p.ty.clone()),
            other => infer_type(other),
        }
        .unwrap_or_else(Type::any);
        properties.push(Property::new(property.clone(), ty));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(source: &str) -> Module {
        read_javascript(source, "test.js").unwrap()
    }

    #[test]
    fn test_jsdoc_typed_function() {
        let source = r#"
/**
 * Adds two numbers.
 * @param {integer} a
 * @param {integer} b
 * @returns {integer}
 */
function addNumbers(a, b) {
  return a + b;
}
"#;
        let func = &read(source).functions[0];
        assert_eq!(func.name, "add_numbers");
        assert_eq!(func.doc.as_deref(), Some("Adds two numbers."));
        assert_eq!(func.params[0].ty, Type::int());
        assert_eq!(func.return_type, Some(Type::int()));
    }

    #[test]
    fn test_filter_map_chain() {
        let source = "function f(items) {\n  return items.filter(x => x > 0).map(x => x * 2);\n}\n";
        let Stmt::Return(Some(Expr::Comprehension(c))) = &read(source).functions[0].body[0]
        else {
            panic!("expected comprehension");
        };
        assert_eq!(c.kind, ComprehensionKind::List);
        assert_eq!(c.iterable, Expr::ident("items"));
        assert!(c.condition.is_some());
    }

    #[test]
    fn test_record_class_construction() {
        let source = r#"
class User {
  constructor({ name, age }) {
    this.name = name;
    this.age = age;
  }
}

function make() {
  return new User({ name: "Alice", age: 30 });
}
"#;
        let module = read(source);
        assert_eq!(module.types.len(), 1);
        assert!(module.classes.is_empty());
        let Stmt::Return(Some(Expr::StructLiteral { type_name, fields })) =
            &module.functions[0].body[0]
        else {
            panic!("expected struct literal");
        };
        assert_eq!(type_name, "User");
        assert_eq!(fields[0], FieldInit::named("name", Expr::string("Alice")));
    }

    #[test]
    fn test_counted_for_loop() {
        let source = "function f(n) {\n  for (let i = 0; i < n; i++) {\n    console.log(i);\n  }\n}\n";
        let Stmt::For { iterator, iterable, .. } = &read(source).functions[0].body[0] else {
            panic!("expected for");
        };
        assert_eq!(iterator, "i");
        assert_eq!(
            iterable,
            &Expr::call(Expr::ident("range"), vec![Expr::int(0), Expr::ident("n")])
        );
    }

    #[test]
    fn test_async_and_throw() {
        let source = r#"
async function fetchUser(id) {
  if (id < 0) {
    throw new Error("bad id");
  }
  return await load(id);
}
"#;
        let func = &read(source).functions[0];
        assert!(func.is_async);
        assert_eq!(func.throws, vec!["Error".to_string()]);
        let Stmt::If { then_body, .. } = &func.body[0] else {
            panic!("expected if");
        };
        assert_eq!(
            then_body[0],
            Stmt::Throw(Expr::call(Expr::ident("Error"), vec![Expr::string("bad id")]))
        );
    }

    #[test]
    fn test_typescript_annotations() {
        let source = r#"
interface Point {
  x: number;
  label?: string;
}

export function scale(p: Point, factor: number): Point {
  return p;
}
"#;
        let module = read_javascript(source, "geo.ts").unwrap();
        assert_eq!(module.name, "geo");
        assert_eq!(module.types[0].fields[1].ty, Type::string().optional());
        let func = &module.functions[0];
        assert_eq!(func.params[1].ty, Type::float());
        assert_eq!(func.return_type, Some(Type::new("Point")));
    }

    #[test]
    fn test_template_literal_and_entries() {
        let source = r#"
function show(d) {
  for (const [k, v] of Object.entries(d)) {
    console.log(`${k}=${v}`);
  }
}
"#;
        let Stmt::For { iterator, iterable, body } = &read(source).functions[0].body[0] else {
            panic!("expected for");
        };
        assert_eq!(iterator, "k, v");
        assert_eq!(
            iterable,
            &Expr::call(Expr::member(Expr::ident("d"), "items"), vec![])
        );
        let Stmt::Expr(Expr::Call { args, .. }) = &body[0] else {
            panic!("expected call");
        };
        assert!(matches!(&args[0], Expr::FormatString(parts) if parts.len() == 3));
    }

    #[test]
    fn test_frozen_enum_and_imports() {
        let source = r#"
import { readFile } from "fs";
const path = require("path");
const Color = Object.freeze({ RED: "red", GREEN: "green" });
const MAX_SIZE = 10;
"#;
        let module = read(source);
        assert_eq!(module.imports.len(), 2);
        assert_eq!(module.imports[0].items, vec!["readFile".to_string()]);
        assert_eq!(module.imports[1].alias.as_deref(), Some("path"));
        assert_eq!(module.enums[0].variants.len(), 2);
        assert!(module.constants[0].is_constant);
    }

    #[test]
    fn test_jsdoc_parse() {
        let doc = JsDoc::parse("/**\n * @param {Array<string>} [names=[]] - list\n * @throws {RangeError}\n */")
            .unwrap();
        assert_eq!(doc.param_type("names"), Some("Array<string>"));
        assert_eq!(doc.throws, vec!["RangeError".to_string()]);
    }
}
