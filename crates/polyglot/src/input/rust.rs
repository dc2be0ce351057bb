//! Tree-sitter based Rust reader.
//!
//! `Result` return types move their error into `throws`: `Ok(v)` in return
//! position is a plain return, `Err(e)` is a throw and `?` is transparent.
//! Inherent `impl` blocks turn their struct into a class.

use super::module_name_from_filename;
use super::support::{
    Diagnostics, NodeError, NodeResult, children, field, has_token, named_children,
    number_literal, parse, require_structure, unsupported,
};
use crate::ir::*;
use crate::naming;
use crate::patterns::error_tuple::{GENERIC_ERROR, error_value};
use crate::patterns::range::compound_assign;
use crate::patterns::{
    KnownTypes, body_is_async, callee_path, check_skeleton, infer_throws, method_call,
    range_call, recognize_chain, recognize_spawn,
};
use crate::traits::{ParseError, ReadOutput, Reader};
use crate::types::{Language, infer_type, map_return, to_canonical};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use tree_sitter::Node;

/// Static instance of the Rust reader for registry.
pub static RUST_READER: RustReader = RustReader;

/// Rust reader using tree-sitter.
pub struct RustReader;

impl Reader for RustReader {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn read_with_diagnostics(
        &self,
        source: &str,
        filename: &str,
    ) -> Result<ReadOutput, ParseError> {
        read_rust_with_diagnostics(source, filename)
    }
}

/// Parse Rust source into the IR.
pub fn read_rust(source: &str, filename: &str) -> Result<Module, ParseError> {
    read_rust_with_diagnostics(source, filename).map(|out| out.module)
}

fn read_rust_with_diagnostics(source: &str, filename: &str) -> Result<ReadOutput, ParseError> {
    check_skeleton(source, Language::Rust)?;
    let tree = parse(source, arborium_rust::language().into())?;
    let root = tree.root_node();
    require_structure(root, filename)?;

    let decls = Declarations::collect(root, source);
    let ctx = ReadContext::new(source, &decls);
    let module = ctx.read_module(root, filename);
    Ok(ReadOutput {
        module,
        diagnostics: ctx.diagnostics.into_vec(),
    })
}

/// Where the trailing expression of a block goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    /// Function body: the value is returned.
    Return,
    /// Loop bodies and statement blocks: the value is dropped.
    Discard,
}

/// Collection kind named by a type (`HashSet<_>`, `HashMap<_, _>`).
fn collection_kind(type_text: &str) -> Option<ComprehensionKind> {
    if type_text.contains("HashSet") || type_text.contains("BTreeSet") {
        Some(ComprehensionKind::Set)
    } else if type_text.contains("HashMap") || type_text.contains("BTreeMap") {
        Some(ComprehensionKind::Dict)
    } else {
        None
    }
}

/// `Err(message)` carries a plain message; wrap it as a generic error.
fn error_of(value: Expr) -> Expr {
    match value {
        Expr::Literal(Literal::String(_)) | Expr::FormatString(_) => {
            error_value(GENERIC_ERROR, value)
        }
        other => other,
    }
}

/// The statement a value in return position becomes.
fn return_value(value: Expr) -> Stmt {
    if let Expr::Call { callee, args, .. } = &value
        && let (Expr::Ident(name), [inner]) = (callee.as_ref(), args.as_slice())
    {
        match name.as_str() {
            "Ok" if inner.is_null() => return Stmt::Return(None),
            "Ok" => return Stmt::Return(Some(inner.clone())),
            "Err" => return Stmt::Throw(error_of(inner.clone())),
            _ => {}
        }
    }
    Stmt::Return(Some(value))
}

/// Split a `format!` template into text and argument slots.
fn format_parts(template: &str, args: &[Expr]) -> Option<Vec<FormatPart>> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut positional = args.iter();
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
                let mut spec = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    spec.push(c);
                }
                let name = spec.split(':').next().unwrap_or("").trim();
                let value = if name.is_empty() {
                    positional.next()?.clone()
                } else if let Ok(n) = name.parse::<usize>() {
                    args.get(n)?.clone()
                } else {
                    Expr::Ident(naming::canonical(name))
                };
                if !text.is_empty() {
                    parts.push(FormatPart::Text(std::mem::take(&mut text)));
                }
                parts.push(FormatPart::Expr(value));
            }
            c => text.push(c),
        }
    }
    if !text.is_empty() {
        parts.push(FormatPart::Text(text));
    }
    Some(parts)
}

fn format_message(parts: Vec<FormatPart>) -> Expr {
    match parts.as_slice() {
        [] => Expr::string(""),
        [FormatPart::Text(text)] => Expr::string(text.clone()),
        _ => Expr::FormatString(parts),
    }
}

/// Names declared at the top level, collected before bodies are read.
#[derive(Default)]
struct Declarations {
    known: KnownTypes,
    enums: HashSet<String>,
    /// Structs with an inherent impl block.
    classes: HashSet<String>,
}

impl Declarations {
    fn collect(root: Node, source: &str) -> Self {
        let text = |n: Node| n.utf8_text(source.as_bytes()).unwrap_or("").to_string();
        let mut decls = Declarations::default();
        let items = named_children(root);

        for item in &items {
            if item.kind() == "impl_item"
                && item.child_by_field_name("trait").is_none()
                && let Some(ty) = item.child_by_field_name("type")
            {
                decls.classes.insert(type_name(&text(ty)));
            }
        }
        for item in &items {
            let Some(name) = item.child_by_field_name("name").map(text) else {
                continue;
            };
            match item.kind() {
                "struct_item" if decls.classes.contains(&name) => decls.known.add_class(name),
                "struct_item" => {
                    let fields = item
                        .child_by_field_name("body")
                        .filter(|b| b.kind() == "field_declaration_list")
                        .map(|body| {
                            named_children(body)
                                .into_iter()
                                .filter_map(|f| f.child_by_field_name("name"))
                                .map(text)
                                .collect()
                        })
                        .unwrap_or_default();
                    decls.known.add_struct(name, fields);
                }
                "enum_item" => {
                    decls.enums.insert(name);
                }
                _ => {}
            }
        }
        decls
    }
}

/// `User<T>` → `User`.
fn type_name(text: &str) -> String {
    text.split('<').next().unwrap_or(text).trim().to_string()
}

struct ReadContext<'a> {
    source: &'a str,
    decls: &'a Declarations,
    /// Type named by `Self` inside an impl block.
    self_type: RefCell<Option<String>>,
    local_types: RefCell<HashMap<String, Type>>,
    /// Collection kind expected by the enclosing `let` annotation.
    sink_hint: Cell<Option<ComprehensionKind>>,
    diagnostics: Diagnostics,
}

impl<'a> ReadContext<'a> {
    fn new(source: &'a str, decls: &'a Declarations) -> Self {
        Self {
            source,
            decls,
            self_type: RefCell::new(None),
            local_types: RefCell::new(HashMap::new()),
            sink_hint: Cell::new(None),
            diagnostics: Diagnostics::default(),
        }
    }

    /// A context over a different source text sharing this one's scope.
    fn fork<'b>(&'b self, source: &'b str) -> ReadContext<'b> {
        ReadContext {
            source,
            decls: self.decls,
            self_type: RefCell::new(self.self_type.borrow().clone()),
            local_types: RefCell::new(self.local_types.borrow().clone()),
            sink_hint: Cell::new(None),
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

    fn rust_type(&self, node: Node) -> Type {
        let text = self.node_text(node);
        match (text, self.self_type.borrow().as_deref()) {
            ("Self", Some(own)) => Type::new(own),
            _ => to_canonical(Language::Rust, text),
        }
    }

    /// `///` lines of an item. The grammar nests them under the item's
    /// `attributes` child; older grammars leave them as preceding siblings.
    fn doc_comment(&self, node: Node) -> Option<String> {
        let attributes = children(node).into_iter().find(|c| c.kind() == "attributes");
        let nested: Vec<String> = attributes
            .map(children)
            .unwrap_or_default()
            .into_iter()
            .filter(|c| c.kind() == "line_outer_doc_comment")
            .map(|c| {
                let text = match c.child_by_field_name("doc") {
                    Some(doc) => self.node_text(doc),
                    None => self.node_text(c).trim_start_matches('/'),
                };
                text.trim().to_string()
            })
            .collect();
        if !nested.is_empty() {
            return Some(nested.join("\n"));
        }

        let mut lines = Vec::new();
        let mut prev = node.prev_named_sibling();
        while let Some(sibling) = prev {
            match sibling.kind() {
                "attribute_item" => {}
                "line_comment" => match self.node_text(sibling).strip_prefix("///") {
                    Some(line) => lines.push(line.trim().to_string()),
                    None => break,
                },
                _ => break,
            }
            prev = sibling.prev_named_sibling();
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }

    // ========================================================================
    // Module level
    // ========================================================================

    fn read_module(&self, root: Node, filename: &str) -> Module {
        let mut module = Module::new(module_name_from_filename(filename));
        let mut impls: Vec<(String, Option<Function>, Vec<Function>)> = Vec::new();

        for child in named_children(root) {
            let result = match child.kind() {
                "use_declaration" => {
                    if let Some(arg) = child.child_by_field_name("argument") {
                        self.read_use(arg, "", &mut module.imports);
                    }
                    Ok(())
                }
                "function_item" => self
                    .read_function(child, false)
                    .map(|f| module.functions.push(f)),
                "struct_item" => self.read_struct(child, &mut module),
                "enum_item" => self.read_enum(child).map(|e| module.enums.push(e)),
                "impl_item" => self.read_impl(child).map(|i| impls.extend(i)),
                "const_item" | "static_item" => {
                    self.read_module_var(child).map(|v| module.constants.push(v))
                }
                "attribute_item" | "inner_attribute_item" => Ok(()),
                _ => {
                    self.diagnostics
                        .record(child, self.source, "top-level item dropped");
                    Ok(())
                }
            };
            if let Err(err) = result {
                self.diagnostics.record(child, self.source, err.to_string());
            }
        }

        for (owner, constructor, methods) in impls {
            match module.classes.iter_mut().find(|c| c.name == owner) {
                Some(class) => {
                    if constructor.is_some() {
                        class.constructor = constructor;
                    }
                    class.methods.extend(methods);
                }
                None => module.functions.extend(constructor.into_iter().chain(methods)),
            }
        }
        module
    }

    fn read_use(&self, node: Node, prefix: &str, imports: &mut Vec<Import>) {
        let join = |path: &str| {
            if prefix.is_empty() {
                path.to_string()
            } else {
                format!("{prefix}::{path}")
            }
        };
        match node.kind() {
            "scoped_use_list" => {
                let path = node
                    .child_by_field_name("path")
                    .map(|p| join(self.node_text(p)))
                    .unwrap_or_else(|| prefix.to_string());
                let Some(list) = node.child_by_field_name("list") else {
                    return;
                };
                let mut items = Vec::new();
                for entry in named_children(list) {
                    match entry.kind() {
                        "identifier" | "self" => items.push(self.node_text(entry).to_string()),
                        _ => self.read_use(entry, &path, imports),
                    }
                }
                if !items.is_empty() {
                    imports.push(Import {
                        module: path,
                        alias: None,
                        items,
                    });
                }
            }
            "use_as_clause" => {
                let mut import = Import::module(
                    node.child_by_field_name("path")
                        .map(|p| join(self.node_text(p)))
                        .unwrap_or_default(),
                );
                import.alias = node
                    .child_by_field_name("alias")
                    .map(|a| self.node_text(a).to_string());
                imports.push(import);
            }
            "use_wildcard" => imports.push(Import {
                module: join(self.node_text(node).trim_end_matches("::*")),
                alias: None,
                items: vec!["*".to_string()],
            }),
            _ => {
                let full = join(self.node_text(node));
                match full.rsplit_once("::") {
                    Some((module, item)) => imports.push(Import {
                        module: module.to_string(),
                        alias: None,
                        items: vec![item.to_string()],
                    }),
                    None => imports.push(Import::module(full)),
                }
            }
        }
    }

    fn read_struct(&self, node: Node, module: &mut Module) -> NodeResult<()> {
        let name = self.node_text(field(node, "name")?).to_string();
        let mut properties = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            for (i, decl) in named_children(body).into_iter().enumerate() {
                let ty = self.rust_type(field(decl, "type")?);
                let field_name = match decl.child_by_field_name("name") {
                    Some(n) => naming::canonical_member(self.node_text(n)),
                    None => format!("field{i}"),
                };
                properties.push(Property::new(field_name, ty));
            }
        }
        let doc = self.doc_comment(node);
        if self.decls.classes.contains(&name) {
            let mut class = Class::new(name);
            class.properties = properties;
            class.doc = doc;
            module.classes.push(class);
        } else {
            let mut def = TypeDefinition::new(name, properties);
            def.doc = doc;
            module.types.push(def);
        }
        Ok(())
    }

    fn read_enum(&self, node: Node) -> NodeResult<Enum> {
        let name = self.node_text(field(node, "name")?).to_string();
        let mut variants = Vec::new();
        for variant in named_children(field(node, "body")?) {
            if variant.kind() != "enum_variant" {
                continue;
            }
            let mut v =
                EnumVariant::new(naming::canonical_variant(self.node_text(field(variant, "name")?)));
            if let Some(body) = variant.child_by_field_name("body")
                && body.kind() == "ordered_field_declaration_list"
                && let Some(first) = named_children(body).into_iter().find(|c| c.kind() != "visibility_modifier")
            {
                v.associated = Some(self.rust_type(first));
            }
            if let Some(value) = variant.child_by_field_name("value")
                && let Expr::Literal(lit) = self.expr(value)
            {
                v.value = Some(lit);
            }
            variants.push(v);
        }
        Ok(Enum { name, variants })
    }

    fn read_module_var(&self, node: Node) -> NodeResult<ModuleVar> {
        let name = self.node_text(field(node, "name")?);
        Ok(ModuleVar {
            name: name.to_string(),
            ty: node.child_by_field_name("type").map(|t| self.rust_type(t)),
            value: self.expr(field(node, "value")?),
            is_constant: node.kind() == "const_item"
                || !named_children(node)
                    .iter()
                    .any(|c| c.kind() == "mutable_specifier"),
        })
    }

    /// An inherent impl: its type, the `new` constructor and the methods.
    fn read_impl(&self, node: Node) -> NodeResult<Option<(String, Option<Function>, Vec<Function>)>> {
        if node.child_by_field_name("trait").is_some() {
            self.diagnostics
                .record(node, self.source, "trait impl dropped");
            return Ok(None);
        }
        let owner = type_name(self.node_text(field(node, "type")?));
        self.self_type.replace(Some(owner.clone()));

        let mut constructor = None;
        let mut methods = Vec::new();
        for item in named_children(field(node, "body")?) {
            if item.kind() != "function_item" {
                self.diagnostics
                    .record(item, self.source, "impl item dropped");
                continue;
            }
            match self.read_function(item, true) {
                Ok(f) if f.name == CONSTRUCTOR_NAME && f.is_static => {
                    constructor = Some(into_constructor(f, &owner));
                }
                Ok(f) => methods.push(f),
                Err(err) => {
                    self.diagnostics.record(item, self.source, err.to_string());
                }
            }
        }
        self.self_type.replace(None);
        Ok(Some((owner, constructor, methods)))
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn read_function(&self, node: Node, in_impl: bool) -> NodeResult<Function> {
        let name = self.node_text(field(node, "name")?);
        let mut has_self = false;
        let mut params = Vec::new();
        for param in named_children(field(node, "parameters")?) {
            match param.kind() {
                "self_parameter" => has_self = true,
                "parameter" => {
                    let pattern = self.node_text(field(param, "pattern")?);
                    params.push(Param::new(
                        naming::canonical(pattern.trim_start_matches("mut ")),
                        self.rust_type(field(param, "type")?),
                    ));
                }
                _ => {}
            }
        }
        let shape = node
            .child_by_field_name("return_type")
            .map(|r| map_return(Language::Rust, self.node_text(r)))
            .unwrap_or_default();

        self.local_types.replace(
            params
                .iter()
                .map(|p| (p.name.clone(), p.ty.clone()))
                .collect(),
        );
        let mut body = self.read_block(field(node, "body")?, Tail::Return);
        if body.last() == Some(&Stmt::Return(None)) {
            body.pop();
        }

        let mut throws = shape.throws;
        for kind in infer_throws(&body) {
            if !throws.contains(&kind) && !(kind == GENERIC_ERROR && !throws.is_empty()) {
                throws.push(kind);
            }
        }
        let is_async = named_children(node)
            .iter()
            .any(|c| c.kind() == "function_modifiers" && self.node_text(*c).contains("async"))
            || body_is_async(&body);

        Ok(Function {
            name: naming::canonical_member(name),
            params,
            return_type: shape.ty,
            throws,
            is_async,
            is_static: in_impl && !has_self,
            body,
            doc: self.doc_comment(node),
        })
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn read_block(&self, node: Node, tail: Tail) -> Vec<Stmt> {
        let items = named_children(node);
        let mut stmts = Vec::new();
        for (i, child) in items.iter().enumerate() {
            let is_last = i + 1 == items.len();
            // A trailing `if`/`match` without `;` is still the block's value.
            let (child, tail) = match child.kind() {
                "expression_statement" if is_last && !self.node_text(*child).ends_with(';') => {
                    (child.named_child(0).unwrap_or(*child), tail)
                }
                "expression_statement" | "let_declaration" | "empty_statement"
                | "attribute_item" => (*child, Tail::Discard),
                _ if is_last => (*child, tail),
                _ => (*child, Tail::Discard),
            };
            if let Err(err) = self.read_stmt(child, tail, &mut stmts) {
                stmts.push(Stmt::Unhandled(
                    self.diagnostics.record(child, self.source, err.to_string()),
                ));
            }
        }
        stmts
    }

    fn read_stmt(&self, node: Node, tail: Tail, out: &mut Vec<Stmt>) -> NodeResult<()> {
        match node.kind() {
            "let_declaration" => out.push(self.read_let(node)?),
            "expression_statement" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "expression_statement",
                    field: "expression",
                })?;
                self.read_stmt(inner, Tail::Discard, out)?;
            }
            "empty_statement" | "attribute_item" => {}
            "assignment_expression" => out.push(Stmt::assign(
                self.read_expr(field(node, "left")?)?,
                self.expr(field(node, "right")?),
            )),
            "compound_assignment_expr" => {
                let target = self.read_expr(field(node, "left")?)?;
                let value = self.expr(field(node, "right")?);
                let op = self.node_text(field(node, "operator")?);
                let op = op
                    .strip_suffix('=')
                    .and_then(BinaryOp::from_c_symbol)
                    .ok_or_else(|| NodeError::Unsupported(format!("operator {op}")))?;
                out.push(compound_assign(target, op, value));
            }
            "return_expression" => out.push(match node.named_child(0) {
                Some(value) => return_value(self.expr(value)),
                None => Stmt::Return(None),
            }),
            "if_expression" => out.push(self.read_if(node, tail)?),
            "match_expression" => out.extend(self.read_match(node, tail)?),
            "for_expression" => out.push(self.read_for(node)?),
            "while_expression" => {
                let condition = field(node, "condition")?;
                if condition.kind() == "let_condition" {
                    return unsupported(condition);
                }
                out.push(Stmt::while_loop(
                    self.expr(condition),
                    self.read_block(field(node, "body")?, Tail::Discard),
                ));
            }
            "loop_expression" => out.push(Stmt::while_loop(
                Expr::bool(true),
                self.read_block(field(node, "body")?, Tail::Discard),
            )),
            "break_expression" => out.push(Stmt::Break),
            "continue_expression" => out.push(Stmt::Continue),
            "block" => out.extend(self.read_block(node, tail)),
            "macro_invocation" => out.extend(self.read_macro_stmt(node, tail)?),
            _ => {
                let expr = self.read_expr(node)?;
                out.push(match (tail, recognize_spawn(Language::Rust, &expr)) {
                    (_, Some(work)) => Stmt::Spawn(work),
                    (Tail::Return, None) => return_value(expr),
                    (Tail::Discard, None) => Stmt::Expr(expr),
                });
            }
        }
        Ok(())
    }

    fn read_let(&self, node: Node) -> NodeResult<Stmt> {
        let pattern = field(node, "pattern")?;
        let target = self.pattern_target(pattern)?;
        let ty_node = node.child_by_field_name("type");
        let ty = ty_node.map(|t| self.rust_type(t));

        self.sink_hint
            .set(ty_node.and_then(|t| collection_kind(self.node_text(t))));
        let value = node
            .child_by_field_name("value")
            .map(|v| self.expr(v))
            .unwrap_or_else(Expr::null);
        self.sink_hint.set(None);

        if let Expr::Ident(name) = &target
            && let Some(t) = ty.clone().or_else(|| infer_type(&value))
        {
            self.local_types.borrow_mut().insert(name.clone(), t);
        }
        Ok(Stmt::Assign {
            target,
            value,
            is_declaration: true,
            ty,
        })
    }

    fn pattern_target(&self, pattern: Node) -> NodeResult<Expr> {
        match pattern.kind() {
            "identifier" => Ok(Expr::Ident(naming::canonical(self.node_text(pattern)))),
            "mut_pattern" | "reference_pattern" => {
                let last = pattern.named_child_count().saturating_sub(1) as u32;
                match pattern.named_child(last) {
                    Some(inner) => self.pattern_target(inner),
                    None => unsupported(pattern),
                }
            }
            "tuple_pattern" => Ok(Expr::Array(
                named_children(pattern)
                    .into_iter()
                    .map(|p| self.pattern_target(p))
                    .collect::<NodeResult<_>>()?,
            )),
            "_" => Ok(Expr::ident("_")),
            _ => unsupported(pattern),
        }
    }

    fn pattern_name(&self, pattern: Node) -> NodeResult<String> {
        Ok(match self.pattern_target(pattern)? {
            Expr::Ident(name) => name,
            Expr::Array(items) => items
                .iter()
                .filter_map(|i| i.as_ident())
                .collect::<Vec<_>>()
                .join(", "),
            _ => return unsupported(pattern),
        })
    }

    fn read_if(&self, node: Node, tail: Tail) -> NodeResult<Stmt> {
        let condition = field(node, "condition")?;
        if matches!(condition.kind(), "let_condition" | "let_chain") {
            return unsupported(condition);
        }
        let then_body = self.read_block(field(node, "consequence")?, tail);
        let else_body = match node
            .child_by_field_name("alternative")
            .and_then(|alt| alt.named_child(0))
        {
            Some(alt) if alt.kind() == "if_expression" => vec![self.read_if(alt, tail)?],
            Some(alt) => self.read_block(alt, tail),
            None => Vec::new(),
        };
        Ok(Stmt::if_stmt(self.expr(condition), then_body, else_body))
    }

    /// Lower a `match` over literal and path patterns into an if/else chain.
    fn read_match(&self, node: Node, tail: Tail) -> NodeResult<Vec<Stmt>> {
        let subject = self.expr(field(node, "value")?);
        let mut arms = Vec::new();
        let mut default = Vec::new();
        for arm in named_children(field(node, "body")?) {
            let pattern = field(arm, "pattern")?;
            if pattern.child_by_field_name("condition").is_some() {
                return unsupported(pattern);
            }
            let value = field(arm, "value")?;
            let mut body = Vec::new();
            self.read_stmt(value, tail, &mut body)?;

            let alternatives = match pattern.named_child(0) {
                None => Vec::new(),
                Some(p) if p.kind() == "or_pattern" => named_children(p),
                Some(p) => vec![p],
            };
            if alternatives.is_empty() || self.node_text(pattern) == "_" {
                default = body;
                continue;
            }
            let condition = alternatives
                .into_iter()
                .map(|p| {
                    self.read_expr(p)
                        .map(|v| Expr::binary(subject.clone(), BinaryOp::Eq, v))
                })
                .collect::<NodeResult<Vec<_>>>()?
                .into_iter()
                .reduce(|a, b| Expr::binary(a, BinaryOp::Or, b))
                .ok_or_else(|| NodeError::Unsupported("empty match arm".into()))?;
            arms.push((condition, body));
        }
        Ok(arms
            .into_iter()
            .rev()
            .fold(default, |else_body, (condition, body)| {
                vec![Stmt::if_stmt(condition, body, else_body)]
            }))
    }

    fn read_for(&self, node: Node) -> NodeResult<Stmt> {
        let iterator = self.pattern_name(field(node, "pattern")?)?;
        let mut iterable = self.expr(field(node, "value")?);

        // `xs.iter()` and `&xs` iterate the collection itself
        if let Some((object, "iter" | "into_iter" | "iter_mut", [])) = method_call(&iterable) {
            iterable = object.clone();
        }
        let is_map = match &iterable {
            Expr::Ident(name) => self
                .local_types
                .borrow()
                .get(name)
                .is_some_and(|t| t.is_map()),
            _ => false,
        };
        if is_map && iterator.contains(", ") {
            iterable = Expr::call(Expr::member(iterable, "items"), vec![]);
        }
        for name in iterator.split(", ") {
            self.local_types
                .borrow_mut()
                .insert(name.to_string(), Type::any());
        }
        let body = self.read_block(field(node, "body")?, Tail::Discard);
        Ok(Stmt::for_in(iterator, iterable, body))
    }

    fn read_macro_stmt(&self, node: Node, tail: Tail) -> NodeResult<Vec<Stmt>> {
        let name = self.node_text(field(node, "macro")?);
        match name {
            "panic" | "unreachable" | "todo" | "unimplemented" => {
                let message = match self.macro_args(node)?.as_slice() {
                    [] => Expr::string(name),
                    [template, rest @ ..] => self.format(template, rest),
                };
                Ok(vec![Stmt::Throw(error_value(GENERIC_ERROR, message))])
            }
            "assert" => {
                let args = self.macro_args(node)?;
                let Some((condition, rest)) = args.split_first() else {
                    return unsupported(node);
                };
                let message = match rest {
                    [] => Expr::string("assertion failed"),
                    [template, rest @ ..] => self.format(template, rest),
                };
                Ok(vec![Stmt::if_stmt(
                    Expr::unary(UnaryOp::Not, condition.clone()),
                    vec![Stmt::Throw(error_value("AssertionError", message))],
                    vec![],
                )])
            }
            _ => {
                let expr = self.read_macro(node)?;
                Ok(vec![match tail {
                    Tail::Return => return_value(expr),
                    Tail::Discard => Stmt::Expr(expr),
                }])
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn read_expr(&self, node: Node) -> NodeResult<Expr> {
        match node.kind() {
            "integer_literal" | "float_literal" => Ok(number_literal(self.node_text(node))),
            "string_literal" | "char_literal" => {
                let text = self.node_text(node);
                let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
                Ok(Expr::string(super::unescape(inner)))
            }
            "raw_string_literal" => {
                let text = self.node_text(node).trim_start_matches('r');
                Ok(Expr::string(text.trim_matches('#').trim_matches('"')))
            }
            "boolean_literal" => Ok(Expr::bool(self.node_text(node) == "true")),
            "unit_expression" => Ok(Expr::null()),
            "identifier" => Ok(match self.node_text(node) {
                "None" => Expr::null(),
                text => Expr::Ident(naming::canonical(text)),
            }),
            "self" => Ok(Expr::ident("self")),
            "scoped_identifier" => Ok(self.read_path(self.node_text(node))),

            "binary_expression" => {
                let left = self.expr(field(node, "left")?);
                let right = self.expr(field(node, "right")?);
                let symbol = self.node_text(field(node, "operator")?);
                let op = BinaryOp::from_c_symbol(symbol)
                    .ok_or_else(|| NodeError::Unsupported(format!("operator {symbol}")))?;
                Ok(Expr::binary(left, op, right))
            }
            "unary_expression" => {
                let operand = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "unary_expression",
                    field: "operand",
                })?;
                let operand = self.expr(operand);
                match children(node).first().map(|c| c.kind()) {
                    Some("!") => Ok(Expr::unary(UnaryOp::Not, operand)),
                    Some("-") => Ok(match operand {
                        Expr::Literal(Literal::Int(n)) => Expr::int(-n),
                        Expr::Literal(Literal::Float(f)) => Expr::float(-f),
                        other => Expr::unary(UnaryOp::Neg, other),
                    }),
                    // Dereference is transparent.
                    _ => Ok(operand),
                }
            }
            "reference_expression" => self.read_expr(field(node, "value")?),
            "type_cast_expression" => self.read_expr(field(node, "value")?),
            "try_expression" | "parenthesized_expression" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "try_expression",
                    field: "expression",
                })?;
                self.read_expr(inner)
            }
            "await_expression" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "await_expression",
                    field: "expression",
                })?;
                Ok(Expr::await_expr(self.expr(inner)))
            }

            "call_expression" => self.read_call(node),
            "macro_invocation" => self.read_macro(node),
            "field_expression" => {
                let value = self.expr(field(node, "value")?);
                let name = field(node, "field")?;
                Ok(match name.kind() {
                    "integer_literal" => Expr::index(value, number_literal(self.node_text(name))),
                    _ => Expr::member(value, naming::canonical(self.node_text(name))),
                })
            }
            "index_expression" => {
                let parts = named_children(node);
                let [object, index] = parts.as_slice() else {
                    return unsupported(node);
                };
                Ok(Expr::index(self.expr(*object), self.expr(*index)))
            }
            "range_expression" => {
                let bounds = named_children(node);
                let [start, end] = bounds.as_slice() else {
                    return unsupported(node);
                };
                let end = self.expr(*end);
                let end = if has_token(node, "..=") {
                    match end {
                        Expr::Literal(Literal::Int(n)) => Expr::int(n + 1),
                        other => Expr::binary(other, BinaryOp::Add, Expr::int(1)),
                    }
                } else {
                    end
                };
                Ok(range_call(self.expr(*start), end))
            }
            "array_expression" => {
                if node.child_by_field_name("length").is_some() {
                    return unsupported(node);
                }
                Ok(Expr::Array(
                    named_children(node).into_iter().map(|e| self.expr(e)).collect(),
                ))
            }
            "tuple_expression" => Ok(Expr::Array(
                named_children(node).into_iter().map(|e| self.expr(e)).collect(),
            )),
            "struct_expression" => self.read_struct_expr(node),
            "closure_expression" => self.read_closure(node),
            "async_block" => {
                let body = self.read_block(field(node, "body").or_else(|_| {
                    node.named_child(0).ok_or(NodeError::Missing {
                        kind: "async_block",
                        field: "body",
                    })
                })?, Tail::Return);
                Ok(match body.as_slice() {
                    // `async move { work().await }` is the future of `work()`
                    [Stmt::Return(Some(Expr::Await(work)))] | [Stmt::Expr(Expr::Await(work))] => {
                        work.as_ref().clone()
                    }
                    _ => Expr::Lambda {
                        params: Vec::new(),
                        body: LambdaBody::Block(body),
                    },
                })
            }
            "if_expression" => {
                let condition = field(node, "condition")?;
                let then = self.block_value(field(node, "consequence")?);
                let otherwise = node
                    .child_by_field_name("alternative")
                    .and_then(|alt| alt.named_child(0))
                    .and_then(|alt| match alt.kind() {
                        "block" => self.block_value(alt),
                        _ => self.read_expr(alt).ok(),
                    });
                match (then, otherwise) {
                    (Some(then), Some(otherwise)) => {
                        Ok(Expr::ternary(self.expr(condition), then, otherwise))
                    }
                    _ => unsupported(node),
                }
            }
            "block" => self.block_value(node).map_or_else(|| unsupported(node), Ok),
            _ => unsupported(node),
        }
    }

    /// Value of a block holding nothing but a trailing expression.
    fn block_value(&self, block: Node) -> Option<Expr> {
        match named_children(block).as_slice() {
            [single] if !matches!(single.kind(), "expression_statement" | "let_declaration") => {
                self.read_expr(*single).ok()
            }
            _ => None,
        }
    }

    /// `a::b::c` as a member chain; `Enum::Variant` in canonical spelling.
    fn read_path(&self, text: &str) -> Expr {
        let own = self.self_type.borrow().clone();
        let mut segments = text.split("::").map(|s| match (s, &own) {
            ("Self", Some(own)) => own.clone(),
            _ => s.to_string(),
        });
        let first = segments.next().unwrap_or_default();
        let is_enum = self.decls.enums.contains(&first);
        segments.fold(Expr::Ident(first), |object, segment| {
            let property = if is_enum {
                naming::canonical_variant(&segment)
            } else {
                naming::canonical(&segment)
            };
            Expr::member(object, property)
        })
    }

    fn read_call(&self, node: Node) -> NodeResult<Expr> {
        let mut function = field(node, "function")?;
        let mut hint = None;
        if function.kind() == "generic_function" {
            hint = function
                .child_by_field_name("type_arguments")
                .and_then(|t| collection_kind(self.node_text(t)));
            function = field(function, "function")?;
        }
        let callee = self.expr(function);
        let args: Vec<Expr> = field(node, "arguments")
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .map(|a| self.expr(a))
            .collect();

        if let Expr::Member { object, property } = &callee {
            let object = object.as_ref();
            let len = || Expr::call(Expr::ident("len"), vec![object.clone()]);
            match (property.as_str(), args.as_slice()) {
                ("len", []) => return Ok(len()),
                ("is_empty", []) => return Ok(Expr::binary(len(), BinaryOp::Eq, Expr::int(0))),
                ("push", [item]) => {
                    return Ok(Expr::call(
                        Expr::member(object.clone(), "append"),
                        vec![item.clone()],
                    ));
                }
                ("contains" | "contains_key", [item]) => {
                    return Ok(Expr::binary(item.clone(), BinaryOp::In, object.clone()));
                }
                // Conversions and copies carry no meaning in the IR.
                (
                    "to_string" | "to_owned" | "clone" | "into" | "as_str" | "cloned"
                    | "copied" | "unwrap",
                    [],
                ) => return Ok(object.clone()),
                ("expect", [_]) => return Ok(object.clone()),
                _ => {}
            }
        }

        let path = callee_path(&callee);
        match (path.as_deref(), args.as_slice()) {
            (Some("Some" | "String.from" | "Box.new" | "Rc.new" | "Arc.new"), [inner]) => {
                return Ok(inner.clone());
            }
            (Some("Vec.new" | "Vec.with_capacity" | "HashSet.new" | "VecDeque.new"), _) => {
                return Ok(Expr::Array(Vec::new()));
            }
            (Some("HashMap.new" | "BTreeMap.new"), []) => return Ok(Expr::Map(Vec::new())),
            (Some("HashMap.from" | "BTreeMap.from"), [Expr::Array(pairs)]) => {
                let entries: Option<Vec<(Expr, Expr)>> = pairs
                    .iter()
                    .map(|pair| match pair {
                        Expr::Array(kv) if kv.len() == 2 => Some((kv[0].clone(), kv[1].clone())),
                        _ => None,
                    })
                    .collect();
                if let Some(entries) = entries {
                    return Ok(Expr::Map(entries));
                }
            }
            (Some("String.new"), []) => return Ok(Expr::string("")),
            _ => {}
        }
        if let Expr::Member { object, property } = &callee
            && property == CONSTRUCTOR_NAME
            && let Expr::Ident(owner) = object.as_ref()
            && self.decls.classes.contains(owner)
            && let Some(built) = self.decls.known.construct(owner, args.clone(), Vec::new())
        {
            return Ok(built);
        }

        let call = Expr::call(callee, args);
        if continues_chain(node) {
            return Ok(call);
        }
        let hint = hint.or(self.sink_hint.get());
        Ok(match recognize_chain(Language::Rust, &call, hint) {
            Some(c) => Expr::comprehension(c),
            None => call,
        })
    }

    fn read_struct_expr(&self, node: Node) -> NodeResult<Expr> {
        let name = self.node_text(field(node, "name")?);
        let name = match (name, self.self_type.borrow().as_deref()) {
            ("Self", Some(own)) => own.to_string(),
            _ => type_name(name.rsplit("::").next().unwrap_or(name)),
        };
        let mut named = Vec::new();
        for init in named_children(field(node, "body")?) {
            match init.kind() {
                "field_initializer" => named.push((
                    naming::canonical(self.node_text(field(init, "field")?)),
                    self.expr(field(init, "value")?),
                )),
                "shorthand_field_initializer" => {
                    let ident = naming::canonical(self.node_text(init));
                    named.push((ident.clone(), Expr::Ident(ident)));
                }
                _ => return unsupported(init),
            }
        }
        Ok(self.decls.known.construct_or_call(&name, Vec::new(), named))
    }

    fn read_closure(&self, node: Node) -> NodeResult<Expr> {
        let params = field(node, "parameters")
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .map(|p| {
                let pattern = p.child_by_field_name("pattern").unwrap_or(p);
                let text = self
                    .node_text(pattern)
                    .trim_start_matches('&')
                    .trim_start_matches("mut ");
                naming::canonical(text)
            })
            .collect();
        let body = field(node, "body")?;
        let body = match body.kind() {
            "block" => match self.read_block(body, Tail::Return).as_slice() {
                [Stmt::Return(Some(e))] => LambdaBody::Expr(Box::new(e.clone())),
                stmts => LambdaBody::Block(stmts.to_vec()),
            },
            _ => LambdaBody::Expr(Box::new(self.expr(body))),
        };
        Ok(Expr::Lambda { params, body })
    }

    fn read_macro(&self, node: Node) -> NodeResult<Expr> {
        let name = self.node_text(field(node, "macro")?);
        let args = self.macro_args(node)?;
        match (name, args.as_slice()) {
            ("vec", _) => Ok(Expr::Array(args)),
            ("format", [template, rest @ ..]) => Ok(self.format(template, rest)),
            ("println" | "print" | "eprintln" | "eprint", []) => {
                Ok(Expr::call(Expr::ident("print"), vec![]))
            }
            ("println" | "print" | "eprintln" | "eprint", [template, rest @ ..]) => Ok(
                Expr::call(Expr::ident("print"), vec![self.format(template, rest)]),
            ),
            _ => unsupported(node),
        }
    }

    fn format(&self, template: &Expr, args: &[Expr]) -> Expr {
        match template {
            Expr::Literal(Literal::String(text)) => format_parts(text, args)
                .map(format_message)
                .unwrap_or_else(|| template.clone()),
            other => other.clone(),
        }
    }

    /// Macro arguments, parsed as the arguments of an ordinary call.
    fn macro_args(&self, node: Node) -> NodeResult<Vec<Expr>> {
        let tokens = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "token_tree")
            .ok_or(NodeError::Missing {
                kind: "macro_invocation",
                field: "token_tree",
            })?;
        let text = self.node_text(tokens);
        let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
        if inner.trim().is_empty() {
            return Ok(Vec::new());
        }

        let wrapped = format!("fn __m() {{ __m({inner}); }}");
        let tree = parse(&wrapped, arborium_rust::language().into())
            .map_err(|err| NodeError::Unsupported(err.to_string()))?;
        if tree.root_node().has_error() {
            return Err(NodeError::Unsupported("macro arguments".into()));
        }
        let arguments = tree
            .root_node()
            .named_child(0)
            .and_then(|f| f.child_by_field_name("body"))
            .and_then(|b| b.named_child(0))
            .and_then(|s| s.named_child(0))
            .and_then(|c| c.child_by_field_name("arguments"))
            .ok_or_else(|| NodeError::Unsupported("macro arguments".into()))?;

        let nested = self.fork(&wrapped);
        let args = named_children(arguments)
            .into_iter()
            .map(|a| nested.expr(a))
            .collect();
        self.diagnostics.extend(nested.diagnostics);
        Ok(args)
    }
}

/// Whether a call is the receiver of a further method call, so an
/// iterator chain is only lifted at its outermost link.
fn continues_chain(call: Node) -> bool {
    call.parent().is_some_and(|p| {
        p.kind() == "field_expression" && p.child_by_field_name("value") == Some(call)
    })
}

/// `fn new(..) -> Self { Self { a, b } }` as a constructor assigning fields.
fn into_constructor(mut f: Function, owner: &str) -> Function {
    f.name = CONSTRUCTOR_NAME.to_string();
    f.return_type = None;
    f.is_static = false;
    if let Some(Stmt::Return(Some(Expr::StructLiteral { type_name, fields }))) = f.body.last()
        && type_name == owner
        && fields.iter().all(|fi| fi.name.is_some())
    {
        let assignments: Vec<Stmt> = fields
            .iter()
            .filter_map(|fi| {
                fi.name.as_ref().map(|name| {
                    Stmt::assign(Expr::member(Expr::ident("self"), name), fi.value.clone())
                })
            })
            .collect();
        f.body.pop();
        f.body.extend(assignments);
    }
    f
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(source: &str) -> Module {
        read_rust(source, "lib.rs").unwrap()
    }

    #[test]
    fn test_result_function() {
        let source = r#"
/// Parse a port number.
pub fn parse_port(text: &str) -> Result<u16, String> {
    let port: u16 = text.parse().map_err(|_| "bad port".to_string())?;
    if port == 0 {
        return Err("port must be positive".to_string());
    }
    Ok(port)
}
"#;
        let func = &read(source).functions[0];
        assert_eq!(func.name, "parse_port");
        assert_eq!(func.return_type, Some(Type::int()));
        assert_eq!(func.throws, vec!["error".to_string()]);
        assert_eq!(func.doc.as_deref(), Some("Parse a port number."));
        let Stmt::If { then_body, .. } = &func.body[1] else {
            panic!("expected if, got {:?}", func.body[1]);
        };
        assert_eq!(
            then_body[0],
            Stmt::Throw(error_value(GENERIC_ERROR, Expr::string("port must be positive")))
        );
        assert_eq!(func.body[2], Stmt::Return(Some(Expr::ident("port"))));
    }

    #[test]
    fn test_doc_comments_above_attributes() {
        let source = r#"
/// A registered user.
/// Names are unique.
#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
}

// Not documentation.
pub fn plain() -> i64 {
    1
}
"#;
        let module = read(source);
        assert_eq!(
            module.types[0].doc.as_deref(),
            Some("A registered user.\nNames are unique.")
        );
        assert_eq!(module.functions[0].doc, None);
    }

    #[test]
    fn test_iterator_chain() {
        let source = r#"
fn doubled(items: &[i32]) -> Vec<i32> {
    items.iter().filter(|x| **x > 0).map(|x| x * 2).collect()
}

fn unique(items: &[i32]) -> HashSet<i32> {
    let seen: HashSet<i32> = items.iter().map(|x| x + 1).collect();
    seen
}
"#;
        let module = read(source);
        let Stmt::Return(Some(Expr::Comprehension(c))) = &module.functions[0].body[0] else {
            panic!("expected comprehension, got {:?}", module.functions[0].body);
        };
        assert_eq!(c.kind, ComprehensionKind::List);
        assert_eq!(c.iterable, Expr::ident("items"));
        assert_eq!(
            c.condition,
            Some(Expr::binary(Expr::ident("x"), BinaryOp::Gt, Expr::int(0)))
        );

        let Stmt::Assign { value: Expr::Comprehension(c), .. } = &module.functions[1].body[0]
        else {
            panic!("expected comprehension");
        };
        assert_eq!(c.kind, ComprehensionKind::Set);
    }

    #[test]
    fn test_impl_block_becomes_class() {
        let source = r#"
pub struct Counter {
    count: i64,
}

impl Counter {
    pub fn new(start: i64) -> Self {
        Self { count: start }
    }

    pub fn increment(&mut self, by: i64) -> i64 {
        self.count += by;
        self.count
    }

    pub fn zero() -> Counter {
        Counter::new(0)
    }
}
"#;
        let module = read(source);
        let class = &module.classes[0];
        assert_eq!(class.name, "Counter");
        let ctor = class.constructor.as_ref().unwrap();
        assert_eq!(ctor.name, CONSTRUCTOR_NAME);
        assert_eq!(
            ctor.body,
            vec![Stmt::assign(
                Expr::member(Expr::ident("self"), "count"),
                Expr::ident("start")
            )]
        );
        assert_eq!(class.methods[0].name, "increment");
        assert!(!class.methods[0].is_static);
        assert!(class.methods[1].is_static);
        assert_eq!(
            class.methods[1].body[0],
            Stmt::Return(Some(Expr::StructLiteral {
                type_name: "Counter".into(),
                fields: vec![FieldInit::positional(Expr::int(0))],
            }))
        );
    }

    #[test]
    fn test_format_and_print_macros() {
        let source = r#"
fn greet(name: &str, count: usize) -> String {
    println!("hello {name}");
    format!("{} has {} items", name, count)
}
"#;
        let func = &read(source).functions[0];
        assert_eq!(
            func.body[0],
            Stmt::Expr(Expr::call(
                Expr::ident("print"),
                vec![Expr::FormatString(vec![
                    FormatPart::Text("hello ".into()),
                    FormatPart::Expr(Expr::ident("name")),
                ])]
            ))
        );
        let Stmt::Return(Some(Expr::FormatString(parts))) = &func.body[1] else {
            panic!("expected format string");
        };
        assert_eq!(parts.len(), 4);
    }

    #[test]
    fn test_enum_and_match() {
        let source = r#"
pub enum Status {
    Active,
    Inactive = 2,
}

fn label(s: Status) -> &'static str {
    match s {
        Status::Active => "on",
        _ => "off",
    }
}
"#;
        let module = read(source);
        assert_eq!(module.enums[0].variants[0].name, "active");
        assert_eq!(module.enums[0].variants[1].value, Some(Literal::Int(2)));
        let func = &module.functions[0];
        assert_eq!(
            func.body[0],
            Stmt::if_stmt(
                Expr::binary(
                    Expr::ident("s"),
                    BinaryOp::Eq,
                    Expr::member(Expr::ident("Status"), "active")
                ),
                vec![Stmt::Return(Some(Expr::string("on")))],
                vec![Stmt::Return(Some(Expr::string("off")))],
            )
        );
    }

    #[test]
    fn test_loops_and_spawn() {
        let source = r#"
use std::collections::HashMap;
use std::thread;

fn run(n: i32, scores: HashMap<String, i32>) {
    for i in 0..n {
        thread::spawn(move || work(i));
    }
    for (name, score) in &scores {
        println!("{}", name);
    }
}
"#;
        let module = read(source);
        assert_eq!(module.imports[0].module, "std::collections");
        assert_eq!(module.imports[0].items, vec!["HashMap".to_string()]);
        let func = &module.functions[0];
        assert!(func.is_async);
        let Stmt::For { iterable, body, .. } = &func.body[0] else {
            panic!("expected for");
        };
        assert_eq!(iterable, &range_call(Expr::int(0), Expr::ident("n")));
        assert_eq!(
            body[0],
            Stmt::Spawn(Expr::call(Expr::ident("work"), vec![Expr::ident("i")]))
        );
        let Stmt::For { iterator, iterable, .. } = &func.body[1] else {
            panic!("expected for");
        };
        assert_eq!(iterator, "name, score");
        assert_eq!(
            iterable,
            &Expr::call(Expr::member(Expr::ident("scores"), "items"), vec![])
        );
    }

    #[test]
    fn test_collection_builtins() {
        let source = r#"
fn collect(items: Vec<i32>) -> usize {
    let mut out = Vec::new();
    out.push(items.len());
    if items.contains(&3) {
        out.push(1);
    }
    out.len()
}
"#;
        let func = &read(source).functions[0];
        assert_eq!(func.body[0], Stmt::declare("out", Expr::Array(vec![])));
        assert_eq!(
            func.body[1],
            Stmt::Expr(Expr::call(
                Expr::member(Expr::ident("out"), "append"),
                vec![Expr::call(Expr::ident("len"), vec![Expr::ident("items")])]
            ))
        );
        let Stmt::If { condition, .. } = &func.body[2] else {
            panic!("expected if");
        };
        assert_eq!(
            condition,
            &Expr::binary(Expr::int(3), BinaryOp::In, Expr::ident("items"))
        );
    }

    #[test]
    fn test_format_parts() {
        let parts = format_parts("{{{}}} {x:?}", &[Expr::ident("a")]).unwrap();
        assert_eq!(
            parts,
            vec![
                FormatPart::Text("{".into()),
                FormatPart::Expr(Expr::ident("a")),
                FormatPart::Text("} ".into()),
                FormatPart::Expr(Expr::ident("x")),
            ]
        );
        assert!(format_parts("{}", &[]).is_none());
    }
}
