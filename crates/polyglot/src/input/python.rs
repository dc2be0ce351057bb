//! Tree-sitter based Python reader.

use super::module_name_from_filename;
use super::support::{
    Diagnostics, NodeError, NodeResult, field, fields, has_token, named_children,
    number_literal, parse, require_structure, unsupported,
};
use crate::ir::*;
use crate::naming;
use crate::patterns::comprehension::and_all;
use crate::patterns::error_tuple::{canonical_error_kind, is_error_kind};
use crate::patterns::range::compound_assign;
use crate::patterns::{
    KnownTypes, body_is_async, check_skeleton, infer_throws, range_call, recognize_spawn,
};
use crate::traits::{ParseError, ReadOutput, Reader};
use crate::types::{Language, infer_type, map_return, to_canonical};
use std::cell::RefCell;
use std::collections::HashSet;
use tree_sitter::Node;

/// Static instance of the Python reader for registry.
pub static PYTHON_READER: PythonReader = PythonReader;

/// Python reader using tree-sitter.
pub struct PythonReader;

impl Reader for PythonReader {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn read_with_diagnostics(
        &self,
        source: &str,
        filename: &str,
    ) -> Result<ReadOutput, ParseError> {
        read_python_with_diagnostics(source, filename)
    }
}

/// Parse Python source into the IR.
pub fn read_python(source: &str, filename: &str) -> Result<Module, ParseError> {
    read_python_with_diagnostics(source, filename).map(|out| out.module)
}

fn read_python_with_diagnostics(source: &str, filename: &str) -> Result<ReadOutput, ParseError> {
    check_skeleton(source, Language::Python)?;
    let tree = parse(source, arborium_python::language().into())?;
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

const ENUM_BASES: &[&str] = &["Enum", "IntEnum", "StrEnum", "Flag", "IntFlag"];

/// Dunder names (`__init__`) keep their spelling; everything else is snake_case.
fn member_name(text: &str) -> String {
    if text.starts_with("__") && text.ends_with("__") {
        text.to_string()
    } else {
        naming::canonical_member(text)
    }
}

/// The expression carried by a simple statement. Some grammar versions wrap
/// assignments and calls in `expression_statement`, others leave them bare.
fn statement_expression(node: Node) -> Option<Node> {
    match node.kind() {
        "expression_statement" => node.named_child(0),
        _ => Some(node),
    }
}

fn is_dataclass(decorators: &[String]) -> bool {
    decorators
        .iter()
        .any(|d| d == "dataclass" || d.starts_with("dataclass(") || d.contains(".dataclass"))
}

struct ReadContext<'a> {
    source: &'a str,
    known: KnownTypes,
    /// Locals bound so far in the function being read.
    locals: RefCell<HashSet<String>>,
    /// Bindings of enclosing `except` clauses, for bare `raise`.
    catch_bindings: RefCell<Vec<String>>,
    diagnostics: Diagnostics,
}

impl<'a> ReadContext<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            known: KnownTypes::new(),
            locals: RefCell::new(HashSet::new()),
            catch_bindings: RefCell::new(Vec::new()),
            diagnostics: Diagnostics::default(),
        }
    }

    fn node_text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn unhandled_stmt(&self, node: Node, err: &NodeError) -> Stmt {
        Stmt::Unhandled(self.diagnostics.record(node, self.source, err.to_string()))
    }

    fn unhandled_expr(&self, node: Node, err: &NodeError) -> Expr {
        Expr::Unhandled(self.diagnostics.record(node, self.source, err.to_string()))
    }

    /// Read an expression, degrading to `Unhandled` on failure.
    fn expr(&self, node: Node) -> Expr {
        self.read_expr(node)
            .unwrap_or_else(|err| self.unhandled_expr(node, &err))
    }

    // ========================================================================
    // First pass: declared types
    // ========================================================================

    fn collect_types(&mut self, root: Node) {
        for child in named_children(root) {
            let (decorators, def) = self.unwrap_decorated(child);
            if def.kind() != "class_definition" {
                continue;
            }
            let Some(name) = def.child_by_field_name("name") else {
                continue;
            };
            let name = self.node_text(name).to_string();
            let bases = self.class_bases(def);
            if bases.iter().any(|b| ENUM_BASES.contains(&b.as_str())) {
                continue;
            }
            let mut fields = Vec::new();
            let mut has_methods = false;
            if let Some(body) = def.child_by_field_name("body") {
                for item in named_children(body) {
                    let (_, item) = self.unwrap_decorated(item);
                    match item.kind() {
                        "function_definition" => has_methods = true,
                        "expression_statement" | "assignment" => {
                            if let Some(assign) = statement_expression(item)
                                && assign.kind() == "assignment"
                                && assign.child_by_field_name("type").is_some()
                                && let Some(left) = assign.child_by_field_name("left")
                            {
                                fields.push(naming::canonical_member(self.node_text(left)));
                            }
                        }
                        _ => {}
                    }
                }
            }
            if is_dataclass(&decorators) || !has_methods {
                self.known.add_struct(name, fields);
            } else {
                self.known.add_class(name);
            }
        }
    }

    fn unwrap_decorated<'t>(&self, node: Node<'t>) -> (Vec<String>, Node<'t>) {
        if node.kind() != "decorated_definition" {
            return (Vec::new(), node);
        }
        let decorators = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "decorator")
            .map(|d| self.node_text(d).trim_start_matches('@').trim().to_string())
            .collect();
        let def = node.child_by_field_name("definition").unwrap_or(node);
        (decorators, def)
    }

    fn class_bases(&self, class: Node) -> Vec<String> {
        class
            .child_by_field_name("superclasses")
            .map(|args| {
                named_children(args)
                    .into_iter()
                    .filter(|a| a.kind() != "keyword_argument")
                    .map(|a| {
                        let text = self.node_text(a);
                        text.rsplit('.').next().unwrap_or(text).to_string()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    // ========================================================================
    // Module level
    // ========================================================================

    fn read_module(&self, root: Node, filename: &str) -> Module {
        let mut module = Module::new(module_name_from_filename(filename));
        for child in named_children(root) {
            let (decorators, def) = self.unwrap_decorated(child);
            match def.kind() {
                "function_definition" => match self.read_function(def, &decorators, false) {
                    Ok(func) => module.functions.push(func),
                    Err(err) => {
                        self.diagnostics.record(def, self.source, err.to_string());
                    }
                },
                "class_definition" => {
                    if let Err(err) = self.read_class(def, &decorators, &mut module) {
                        self.diagnostics.record(def, self.source, err.to_string());
                    }
                }
                "import_statement" | "import_from_statement" | "future_import_statement" => {
                    module.imports.extend(self.read_import(def));
                }
                "expression_statement" | "assignment" | "string" => {
                    self.read_module_var(def, &mut module)
                }
                _ => {
                    self.diagnostics
                        .record(def, self.source, "top-level statement dropped");
                }
            }
        }
        module
    }

    fn read_module_var(&self, node: Node, module: &mut Module) {
        let Some(inner) = statement_expression(node) else {
            return;
        };
        match inner.kind() {
            // Module docstring
            "string" => {}
            "assignment" => {
                let left = inner.child_by_field_name("left");
                let right = inner.child_by_field_name("right");
                let (Some(left), Some(right)) = (left, right) else {
                    self.diagnostics
                        .record(node, self.source, "declaration without a value");
                    return;
                };
                if left.kind() != "identifier" {
                    self.diagnostics
                        .record(node, self.source, "top-level destructuring dropped");
                    return;
                }
                let raw = self.node_text(left);
                let annotation = inner
                    .child_by_field_name("type")
                    .map(|t| self.node_text(t));
                let is_final = annotation.is_some_and(|t| t.starts_with("Final"));
                let ty = annotation.map(|t| {
                    let inner_ty = t
                        .strip_prefix("Final[")
                        .and_then(|t| t.strip_suffix(']'))
                        .unwrap_or(t);
                    to_canonical(Language::Python, inner_ty)
                });
                module.constants.push(ModuleVar {
                    name: naming::canonical(raw),
                    ty: ty.filter(|t| !(is_final && t.name == "Final")),
                    value: self.expr(right),
                    is_constant: is_final || naming::is_screaming_case(raw),
                });
            }
            _ => {
                self.diagnostics
                    .record(node, self.source, "top-level statement dropped");
            }
        }
    }

    fn read_import(&self, node: Node) -> Vec<Import> {
        match node.kind() {
            "import_statement" => fields(node, "name")
                .into_iter()
                .map(|n| self.import_name(n))
                .collect(),
            _ => {
                let module = node
                    .child_by_field_name("module_name")
                    .map(|m| self.node_text(m))
                    .unwrap_or("__future__");
                let mut import = Import::module(module);
                for name in fields(node, "name") {
                    let item = match name.kind() {
                        "aliased_import" => name.child_by_field_name("name").unwrap_or(name),
                        _ => name,
                    };
                    import.items.push(self.node_text(item).to_string());
                }
                if named_children(node)
                    .iter()
                    .any(|c| c.kind() == "wildcard_import")
                {
                    import.items.push("*".into());
                }
                vec![import]
            }
        }
    }

    fn import_name(&self, node: Node) -> Import {
        if node.kind() == "aliased_import" {
            let module = node
                .child_by_field_name("name")
                .map(|n| self.node_text(n))
                .unwrap_or("");
            let mut import = Import::module(module);
            import.alias = node
                .child_by_field_name("alias")
                .map(|a| self.node_text(a).to_string());
            import
        } else {
            Import::module(self.node_text(node))
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn read_function(
        &self,
        node: Node,
        decorators: &[String],
        in_class: bool,
    ) -> NodeResult<Function> {
        let name = self.node_text(field(node, "name")?);
        let is_static = decorators
            .iter()
            .any(|d| d == "staticmethod" || d == "classmethod");

        let mut params = match node.child_by_field_name("parameters") {
            Some(p) => self.read_parameters(p),
            None => Vec::new(),
        };
        // Drop the receiver (`self` / `cls`).
        if in_class && !params.is_empty() && decorators.iter().all(|d| d != "staticmethod") {
            params.remove(0);
        }

        let shape = node
            .child_by_field_name("return_type")
            .map(|t| map_return(Language::Python, self.node_text(t)))
            .unwrap_or_default();

        self.locals.replace(params.iter().map(|p| p.name.clone()).collect());
        if in_class {
            self.locals.borrow_mut().insert("self".into());
        }
        let body_node = field(node, "body")?;
        let (doc, body) = self.read_body_with_doc(body_node);

        let is_async = has_token(node, "async") || body_is_async(&body);

        Ok(Function {
            name: member_name(name),
            params,
            return_type: shape.ty,
            throws: infer_throws(&body),
            is_async,
            is_static,
            body,
            doc,
        })
    }

    fn read_parameters(&self, node: Node) -> Vec<Param> {
        let mut params = Vec::new();
        for child in named_children(node) {
            let param = match child.kind() {
                "identifier" => Param::new(naming::canonical(self.node_text(child)), Type::any()),
                "typed_parameter" => {
                    let ty = child
                        .child_by_field_name("type")
                        .map(|t| to_canonical(Language::Python, self.node_text(t)))
                        .unwrap_or_else(Type::any);
                    let Some(target) = child.named_child(0) else {
                        continue;
                    };
                    match target.kind() {
                        "list_splat_pattern" => {
                            let mut p = Param::new(self.splat_name(target), ty);
                            p.is_variadic = true;
                            p
                        }
                        "dictionary_splat_pattern" => Param::new(
                            self.splat_name(target),
                            Type::map(Type::string(), ty),
                        ),
                        _ => Param::new(naming::canonical(self.node_text(target)), ty),
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    let Some(name) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let default = child.child_by_field_name("value").map(|v| self.expr(v));
                    let ty = child
                        .child_by_field_name("type")
                        .map(|t| to_canonical(Language::Python, self.node_text(t)))
                        .or_else(|| default.as_ref().and_then(infer_type))
                        .unwrap_or_else(Type::any);
                    let mut p = Param::new(naming::canonical(self.node_text(name)), ty);
                    p.default = default;
                    p
                }
                "list_splat_pattern" => {
                    let mut p = Param::new(self.splat_name(child), Type::any());
                    p.is_variadic = true;
                    p
                }
                "dictionary_splat_pattern" => Param::new(
                    self.splat_name(child),
                    Type::map(Type::string(), Type::any()),
                ),
                // `*` and `/` separators
                _ => continue,
            };
            params.push(param);
        }
        params
    }

    fn splat_name(&self, node: Node) -> String {
        let text = self.node_text(node).trim_start_matches('*');
        naming::canonical(text)
    }

    fn docstring(&self, body: Node) -> Option<String> {
        let first = *named_children(body).first()?;
        let inner = statement_expression(first)?;
        (inner.kind() == "string").then(|| self.string_value(inner).trim().to_string())
    }

    /// A block, with a leading docstring split off.
    fn read_body_with_doc(&self, body: Node) -> (Option<String>, Vec<Stmt>) {
        let doc = self.docstring(body);
        let skip = usize::from(doc.is_some());
        let stmts = self.read_stmts(named_children(body).into_iter().skip(skip));
        (doc, stmts)
    }

    fn read_class(&self, node: Node, decorators: &[String], module: &mut Module) -> NodeResult<()> {
        let name = self.node_text(field(node, "name")?).to_string();
        let bases = self.class_bases(node);
        let body = field(node, "body")?;
        let doc = self.docstring(body);

        if bases.iter().any(|b| ENUM_BASES.contains(&b.as_str())) {
            module.enums.push(self.read_enum(&name, body));
            return Ok(());
        }

        let mut class = Class::new(&name);
        class.doc = doc;
        class.bases = bases
            .into_iter()
            .filter(|b| b != "object" && !b.starts_with("Generic"))
            .collect();

        for item in named_children(body) {
            let (item_decorators, item) = self.unwrap_decorated(item);
            match item.kind() {
                "function_definition" => {
                    let mut func = self.read_function(item, &item_decorators, true)?;
                    if func.name == "__init__" {
                        func.name = CONSTRUCTOR_NAME.to_string();
                        self.collect_init_properties(&func, &mut class.properties);
                        class.constructor = Some(func);
                    } else {
                        class.methods.push(func);
                    }
                }
                "expression_statement" | "assignment" => {
                    let Some(assign) = statement_expression(item) else {
                        continue;
                    };
                    if assign.kind() != "assignment" {
                        continue;
                    }
                    let Some(left) = assign.child_by_field_name("left") else {
                        continue;
                    };
                    let default = assign.child_by_field_name("right").map(|r| self.expr(r));
                    let ty = assign
                        .child_by_field_name("type")
                        .map(|t| to_canonical(Language::Python, self.node_text(t)))
                        .or_else(|| default.as_ref().and_then(infer_type))
                        .unwrap_or_else(Type::any);
                    let mut prop = Property::new(naming::canonical_member(self.node_text(left)), ty);
                    prop.default = default;
                    class.properties.push(prop);
                }
                _ => {}
            }
        }

        let is_plain = class.constructor.is_none() && class.methods.is_empty();
        if is_plain && (is_dataclass(decorators) || class.bases.is_empty()) {
            module.types.push(TypeDefinition {
                name: class.name,
                fields: class.properties,
                doc: class.doc,
            });
        } else {
            module.classes.push(class);
        }
        Ok(())
    }

    /// Properties assigned as `self.x = ...` in `__init__`.
    fn collect_init_properties(&self, init: &Function, properties: &mut Vec<Property>) {
        walk_body(&init.body, &mut |stmt| {
            let Stmt::Assign {
                target: Expr::Member { object, property },
                value,
                ty,
                ..
            } = stmt
            else {
                return;
            };
            if object.as_ident() != Some("self") || properties.iter().any(|p| &p.name == property)
            {
                return;
            }
            let ty = ty
                .clone()
                .or_else(|| match value {
                    Expr::Ident(n) => init.params.iter().find(|p| &p.name == n).map(|p| p.ty.clone()),
                    other => infer_type(other),
                })
                .unwrap_or_else(Type::any);
            properties.push(Property::new(property.clone(), ty));
        });
    }

    fn read_enum(&self, name: &str, body: Node) -> Enum {
        let mut variants = Vec::new();
        for item in named_children(body) {
            let Some(assign) = statement_expression(item) else {
                continue;
            };
            if assign.kind() != "assignment" {
                continue;
            }
            let (Some(left), Some(right)) = (
                assign.child_by_field_name("left"),
                assign.child_by_field_name("right"),
            ) else {
                continue;
            };
            let mut variant = EnumVariant::new(naming::canonical_variant(self.node_text(left)));
            if let Expr::Literal(lit) = self.expr(right) {
                variant.value = Some(lit);
            }
            variants.push(variant);
        }
        Enum {
            name: name.to_string(),
            variants,
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn read_block(&self, node: Node) -> Vec<Stmt> {
        self.read_stmts(named_children(node).into_iter())
    }

    fn read_stmts<'t>(&self, nodes: impl Iterator<Item = Node<'t>>) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        for child in nodes {
            match self.read_stmt(child) {
                Ok(Some(stmt)) => stmts.push(stmt),
                Ok(None) => {}
                Err(err) => stmts.push(self.unhandled_stmt(child, &err)),
            }
        }
        stmts
    }

    fn read_stmt(&self, node: Node) -> NodeResult<Option<Stmt>> {
        match node.kind() {
            "expression_statement" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "expression_statement",
                    field: "expression",
                })?;
                self.read_simple_stmt(inner)
            }
            "return_statement" => {
                let value = node.named_child(0).map(|v| self.expr(v));
                Ok(Some(Stmt::Return(value)))
            }
            "if_statement" => self.read_if(node).map(Some),
            "for_statement" => self.read_for(node).map(Some),
            "while_statement" => {
                let condition = self.expr(field(node, "condition")?);
                let body = self.read_block(field(node, "body")?);
                Ok(Some(Stmt::while_loop(condition, body)))
            }
            "try_statement" => self.read_try(node).map(Some),
            "raise_statement" => self.read_raise(node).map(Some),
            "assert_statement" => {
                let parts = named_children(node);
                let condition = parts.first().ok_or(NodeError::Missing {
                    kind: "assert_statement",
                    field: "condition",
                })?;
                let message = parts
                    .get(1)
                    .map(|m| self.expr(*m))
                    .unwrap_or_else(|| Expr::string("assertion failed"));
                Ok(Some(Stmt::if_stmt(
                    Expr::unary(UnaryOp::Not, self.expr(*condition)),
                    vec![Stmt::Throw(Expr::call(Expr::ident("AssertionError"), vec![message]))],
                    vec![],
                )))
            }
            "break_statement" => Ok(Some(Stmt::Break)),
            "continue_statement" => Ok(Some(Stmt::Continue)),
            "pass_statement" | "global_statement" | "nonlocal_statement" => Ok(None),
            // Bare assignments and expressions
            _ => self.read_simple_stmt(node),
        }
    }

    fn read_simple_stmt(&self, node: Node) -> NodeResult<Option<Stmt>> {
        match node.kind() {
            "assignment" => self.read_assignment(node).map(Some),
            "augmented_assignment" => self.read_augmented_assignment(node).map(Some),
            // Stray string: a comment in disguise
            "string" => Ok(None),
            _ => {
                let expr = self.read_expr(node)?;
                Ok(Some(match recognize_spawn(Language::Python, &expr) {
                    Some(work) => Stmt::Spawn(work),
                    None => Stmt::Expr(expr),
                }))
            }
        }
    }

    /// Bind a name in the current function; true when it is new.
    fn declare(&self, name: &str) -> bool {
        self.locals.borrow_mut().insert(name.to_string())
    }

    fn read_target(&self, node: Node) -> NodeResult<(Expr, bool)> {
        match node.kind() {
            "identifier" => {
                let name = naming::canonical(self.node_text(node));
                let is_new = self.declare(&name);
                Ok((Expr::Ident(name), is_new))
            }
            "pattern_list" | "tuple_pattern" | "expression_list" | "tuple" => {
                let mut any_new = false;
                let mut items = Vec::new();
                for item in named_children(node) {
                    let (target, is_new) = self.read_target(item)?;
                    any_new |= is_new;
                    items.push(target);
                }
                Ok((Expr::Array(items), any_new))
            }
            "attribute" | "subscript" => Ok((self.read_expr(node)?, false)),
            _ => unsupported(node),
        }
    }

    fn read_assignment(&self, node: Node) -> NodeResult<Stmt> {
        let left = field(node, "left")?;
        let ty = node
            .child_by_field_name("type")
            .map(|t| to_canonical(Language::Python, self.node_text(t)));
        let value = match node.child_by_field_name("right") {
            Some(right) if right.kind() == "assignment" => return unsupported(right),
            Some(right) => self.expr(right),
            // `x: int` declares without a value
            None => Expr::null(),
        };
        let (target, is_new) = self.read_target(left)?;
        Ok(Stmt::Assign {
            target,
            value,
            is_declaration: is_new,
            ty,
        })
    }

    fn read_augmented_assignment(&self, node: Node) -> NodeResult<Stmt> {
        let left = field(node, "left")?;
        let right = field(node, "right")?;
        let op_node = field(node, "operator")?;
        let op = match self.node_text(op_node) {
            "+=" => BinaryOp::Add,
            "-=" => BinaryOp::Sub,
            "*=" => BinaryOp::Mul,
            "/=" => BinaryOp::Div,
            "//=" => BinaryOp::FloorDiv,
            "%=" => BinaryOp::Mod,
            "**=" => BinaryOp::Pow,
            "&=" => BinaryOp::BitAnd,
            "|=" => BinaryOp::BitOr,
            "^=" => BinaryOp::BitXor,
            "<<=" => BinaryOp::Shl,
            ">>=" => BinaryOp::Shr,
            other => return Err(NodeError::Unsupported(format!("operator {other}"))),
        };
        Ok(compound_assign(self.read_expr(left)?, op, self.expr(right)))
    }

    fn read_if(&self, node: Node) -> NodeResult<Stmt> {
        let condition = self.expr(field(node, "condition")?);
        let then_body = self.read_block(field(node, "consequence")?);
        let else_body = self.read_alternatives(&fields(node, "alternative"))?;
        Ok(Stmt::if_stmt(condition, then_body, else_body))
    }

    /// `elif` / `else` chain, innermost last.
    fn read_alternatives(&self, alternatives: &[Node]) -> NodeResult<Vec<Stmt>> {
        let Some((first, rest)) = alternatives.split_first() else {
            return Ok(Vec::new());
        };
        match first.kind() {
            "elif_clause" => {
                let condition = self.expr(field(*first, "condition")?);
                let then_body = self.read_block(field(*first, "consequence")?);
                let else_body = self.read_alternatives(rest)?;
                Ok(vec![Stmt::if_stmt(condition, then_body, else_body)])
            }
            "else_clause" => Ok(self.read_block(field(*first, "body")?)),
            _ => unsupported(*first),
        }
    }

    /// Loop variable(s): `x`, or `k, v` for pair iteration.
    fn iterator_name(&self, node: Node) -> NodeResult<String> {
        match node.kind() {
            "identifier" => {
                let name = naming::canonical(self.node_text(node));
                self.declare(&name);
                Ok(name)
            }
            "pattern_list" | "tuple_pattern" => {
                let names: Vec<String> = named_children(node)
                    .into_iter()
                    .map(|n| self.iterator_name(n))
                    .collect::<NodeResult<_>>()?;
                Ok(names.join(", "))
            }
            _ => unsupported(node),
        }
    }

    fn read_for(&self, node: Node) -> NodeResult<Stmt> {
        let iterator = self.iterator_name(field(node, "left")?)?;
        let iterable = self.expr(field(node, "right")?);
        let body = self.read_block(field(node, "body")?);
        if let Some(alt) = node.child_by_field_name("alternative") {
            self.diagnostics
                .record(alt, self.source, "for-else clause dropped");
        }
        Ok(Stmt::for_in(iterator, iterable, body))
    }

    fn read_try(&self, node: Node) -> NodeResult<Stmt> {
        let mut body = self.read_block(field(node, "body")?);
        let mut catches = Vec::new();
        let mut finally = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "except_clause" => catches.push(self.read_except(child)?),
                "finally_clause" => {
                    if let Some(block) = named_children(child).into_iter().find(|c| c.kind() == "block") {
                        finally = self.read_block(block);
                    }
                }
                // Runs only when nothing was raised: append to the body.
                "else_clause" => body.extend(self.read_block(field(child, "body")?)),
                _ => {}
            }
        }
        Ok(Stmt::Try {
            body,
            catches,
            finally,
        })
    }

    fn read_except(&self, node: Node) -> NodeResult<CatchBlock> {
        let parts = named_children(node);
        let block = parts
            .iter()
            .find(|c| c.kind() == "block")
            .ok_or(NodeError::Missing {
                kind: "except_clause",
                field: "body",
            })?;
        let mut kind = None;
        let mut binding = None;
        let heads: Vec<Node> = parts.iter().copied().filter(|c| c.kind() != "block").collect();
        match heads.as_slice() {
            [pattern] if pattern.kind() == "as_pattern" => {
                let inner = named_children(*pattern);
                kind = inner.first().map(|k| self.node_text(*k));
                binding = pattern
                    .child_by_field_name("alias")
                    .or_else(|| inner.get(1).copied())
                    .map(|b| naming::canonical(self.node_text(b)));
            }
            [ty] => kind = Some(self.node_text(*ty)),
            [ty, name, ..] => {
                kind = Some(self.node_text(*ty));
                binding = Some(naming::canonical(self.node_text(*name)));
            }
            [] => {}
        }
        if let Some(b) = &binding {
            self.declare(b);
            self.catch_bindings.borrow_mut().push(b.clone());
        }
        let body = self.read_block(*block);
        if binding.is_some() {
            self.catch_bindings.borrow_mut().pop();
        }
        Ok(CatchBlock {
            kind: kind.map(|k| canonical_error_kind(Language::Python, k)),
            binding,
            body,
        })
    }

    fn read_raise(&self, node: Node) -> NodeResult<Stmt> {
        let Some(value) = node.named_child(0) else {
            // Bare `raise` re-raises the error being handled.
            let current = self.catch_bindings.borrow().last().cloned();
            return match current {
                Some(binding) => Ok(Stmt::Throw(Expr::Ident(binding))),
                None => unsupported(node),
            };
        };
        let thrown = match self.expr(value) {
            // `raise ValueError` without arguments
            Expr::Ident(kind) if is_error_kind(&kind) || kind == "Exception" => {
                Expr::call(Expr::ident(canonical_error_kind(Language::Python, &kind)), vec![])
            }
            other => other,
        };
        Ok(Stmt::Throw(thrown))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn read_expr(&self, node: Node) -> NodeResult<Expr> {
        match node.kind() {
            "integer" | "float" => Ok(number_literal(self.node_text(node))),
            "string" => self.read_string(node),
            "concatenated_string" => {
                let mut parts = Vec::new();
                for s in named_children(node) {
                    match self.read_string(s)? {
                        Expr::Literal(Literal::String(text)) => parts.push(FormatPart::Text(text)),
                        Expr::FormatString(inner) => parts.extend(inner),
                        other => parts.push(FormatPart::Expr(other)),
                    }
                }
                Ok(collapse_format(parts))
            }
            "true" => Ok(Expr::bool(true)),
            "false" => Ok(Expr::bool(false)),
            "none" => Ok(Expr::null()),
            "identifier" => Ok(Expr::Ident(naming::canonical(self.node_text(node)))),

            "binary_operator" => {
                let left = self.expr(field(node, "left")?);
                let right = self.expr(field(node, "right")?);
                let op = match self.node_text(field(node, "operator")?) {
                    "+" => BinaryOp::Add,
                    "-" => BinaryOp::Sub,
                    "*" => BinaryOp::Mul,
                    "/" => BinaryOp::Div,
                    "//" => BinaryOp::FloorDiv,
                    "%" => BinaryOp::Mod,
                    "**" => BinaryOp::Pow,
                    "&" => BinaryOp::BitAnd,
                    "|" => BinaryOp::BitOr,
                    "^" => BinaryOp::BitXor,
                    "<<" => BinaryOp::Shl,
                    ">>" => BinaryOp::Shr,
                    other => return Err(NodeError::Unsupported(format!("operator {other}"))),
                };
                Ok(Expr::binary(left, op, right))
            }
            "comparison_operator" => self.read_comparison(node),
            "boolean_operator" => {
                let left = self.expr(field(node, "left")?);
                let right = self.expr(field(node, "right")?);
                let op = match self.node_text(field(node, "operator")?) {
                    "and" => BinaryOp::And,
                    _ => BinaryOp::Or,
                };
                Ok(Expr::binary(left, op, right))
            }
            "not_operator" => Ok(Expr::unary(
                UnaryOp::Not,
                self.expr(field(node, "argument")?),
            )),
            "unary_operator" => {
                let arg = self.expr(field(node, "argument")?);
                match self.node_text(field(node, "operator")?) {
                    "-" => Ok(match arg {
                        Expr::Literal(Literal::Int(n)) => Expr::int(-n),
                        Expr::Literal(Literal::Float(f)) => Expr::float(-f),
                        other => Expr::unary(UnaryOp::Neg, other),
                    }),
                    "~" => Ok(Expr::unary(UnaryOp::BitNot, arg)),
                    _ => Ok(arg),
                }
            }

            "call" => self.read_call(node),
            "attribute" => {
                let object = self.expr(field(node, "object")?);
                let attribute = self.node_text(field(node, "attribute")?);
                Ok(Expr::member(object, naming::canonical(attribute)))
            }
            "subscript" => {
                let value = self.expr(field(node, "value")?);
                let subscript = field(node, "subscript")?;
                if subscript.kind() == "slice" {
                    return unsupported(subscript);
                }
                Ok(Expr::index(value, self.expr(subscript)))
            }

            "list" | "tuple" | "expression_list" | "pattern_list" => Ok(Expr::Array(
                named_children(node).into_iter().map(|c| self.expr(c)).collect(),
            )),
            "set" => Ok(Expr::call(
                Expr::ident("set"),
                vec![Expr::Array(
                    named_children(node).into_iter().map(|c| self.expr(c)).collect(),
                )],
            )),
            "dictionary" => {
                let mut entries = Vec::new();
                for pair in named_children(node) {
                    if pair.kind() != "pair" {
                        return unsupported(pair);
                    }
                    entries.push((
                        self.expr(field(pair, "key")?),
                        self.expr(field(pair, "value")?),
                    ));
                }
                Ok(Expr::Map(entries))
            }

            "list_comprehension" => self.read_comprehension(node, ComprehensionKind::List),
            "set_comprehension" => self.read_comprehension(node, ComprehensionKind::Set),
            "dictionary_comprehension" => self.read_comprehension(node, ComprehensionKind::Dict),
            "generator_expression" => self.read_comprehension(node, ComprehensionKind::Generator),

            "conditional_expression" => {
                let parts = named_children(node);
                match parts.as_slice() {
                    [then, condition, otherwise] => Ok(Expr::ternary(
                        self.expr(*condition),
                        self.expr(*then),
                        self.expr(*otherwise),
                    )),
                    _ => unsupported(node),
                }
            }
            "lambda" => {
                let params = node
                    .child_by_field_name("parameters")
                    .map(|p| {
                        named_children(p)
                            .into_iter()
                            .map(|n| {
                                let name = n.child_by_field_name("name").unwrap_or(n);
                                naming::canonical(self.node_text(name))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Expr::lambda(params, self.expr(field(node, "body")?)))
            }
            "await" => {
                let inner = node.named_child(0).ok_or(NodeError::Missing {
                    kind: "await",
                    field: "expression",
                })?;
                Ok(Expr::await_expr(self.expr(inner)))
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

    fn read_comparison(&self, node: Node) -> NodeResult<Expr> {
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.is_named() {
                operands.push(self.expr(child));
            } else {
                ops.push(child.kind());
            }
        }
        if operands.len() != ops.len() + 1 || ops.is_empty() {
            return unsupported(node);
        }

        let mut comparisons = Vec::new();
        for (i, op) in ops.iter().enumerate() {
            let left = operands[i].clone();
            let right = operands[i + 1].clone();
            let cmp = match *op {
                "<" => Expr::binary(left, BinaryOp::Lt, right),
                "<=" => Expr::binary(left, BinaryOp::Le, right),
                ">" => Expr::binary(left, BinaryOp::Gt, right),
                ">=" => Expr::binary(left, BinaryOp::Ge, right),
                "==" | "is" => Expr::binary(left, BinaryOp::Eq, right),
                "!=" | "<>" | "is not" => Expr::binary(left, BinaryOp::Ne, right),
                "in" => Expr::binary(left, BinaryOp::In, right),
                "not in" => Expr::unary(UnaryOp::Not, Expr::binary(left, BinaryOp::In, right)),
                other => return Err(NodeError::Unsupported(format!("comparison {other}"))),
            };
            comparisons.push(cmp);
        }
        and_all(comparisons).ok_or(NodeError::Missing {
            kind: "comparison_operator",
            field: "operator",
        })
    }

    fn read_call(&self, node: Node) -> NodeResult<Expr> {
        let callee = self.expr(field(node, "function")?);
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if let Some(arguments) = node.child_by_field_name("arguments") {
            if arguments.kind() == "generator_expression" {
                args.push(self.expr(arguments));
            } else {
                for arg in named_children(arguments) {
                    if arg.kind() == "keyword_argument" {
                        let name = self.node_text(field(arg, "name")?);
                        kwargs.push((naming::canonical(name), self.expr(field(arg, "value")?)));
                    } else {
                        args.push(self.expr(arg));
                    }
                }
            }
        }

        if let Expr::Ident(name) = &callee {
            if name == "range" && kwargs.is_empty() && args.len() <= 2 {
                let mut args = args.into_iter();
                return Ok(match (args.next(), args.next()) {
                    (Some(end), None) => range_call(Expr::int(0), end),
                    (Some(start), Some(end)) => range_call(start, end),
                    _ => Expr::call(Expr::ident("range"), vec![]),
                });
            }
            if self.known.contains(name) {
                return Ok(self.known.construct_or_call(name, args, kwargs));
            }
            if name == "Exception" || name == "BaseException" {
                return Ok(Expr::Call {
                    callee: Box::new(Expr::ident(canonical_error_kind(Language::Python, name))),
                    args,
                    kwargs,
                });
            }
        }
        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
            kwargs,
        })
    }

    fn read_comprehension(&self, node: Node, kind: ComprehensionKind) -> NodeResult<Expr> {
        let body = field(node, "body")?;
        let mut clauses = None;
        let mut conditions = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "for_in_clause" => {
                    if clauses.is_some() {
                        return Err(NodeError::Unsupported("nested comprehension".into()));
                    }
                    clauses = Some(child);
                }
                "if_clause" => {
                    if let Some(cond) = child.named_child(0) {
                        conditions.push(self.expr(cond));
                    }
                }
                _ => {}
            }
        }
        let clause = clauses.ok_or(NodeError::Missing {
            kind: node.kind(),
            field: "for_in_clause",
        })?;

        let saved = self.locals.borrow().clone();
        let iterator = self.iterator_name(field(clause, "left")?)?;
        let iterable = self.expr(field(clause, "right")?);
        let (target, value) = if body.kind() == "pair" {
            (
                self.expr(field(body, "key")?),
                Some(self.expr(field(body, "value")?)),
            )
        } else {
            (self.expr(body), None)
        };
        self.locals.replace(saved);

        Ok(Expr::comprehension(Comprehension {
            kind,
            target,
            value,
            iterator,
            iterable,
            condition: and_all(conditions),
        }))
    }

    /// Raw value of a plain string node.
    fn string_value(&self, node: Node) -> String {
        let text = self.node_text(node);
        let (prefix, body) = split_string_prefix(text);
        let quote_len = if body.starts_with("\"\"\"") || body.starts_with("'''") {
            3
        } else {
            1
        };
        let inner = if body.len() >= 2 * quote_len {
            &body[quote_len..body.len() - quote_len]
        } else {
            ""
        };
        if prefix.contains(['r', 'R']) {
            inner.to_string()
        } else {
            super::unescape(inner)
        }
    }

    fn read_string(&self, node: Node) -> NodeResult<Expr> {
        let text = self.node_text(node);
        let (prefix, _) = split_string_prefix(text);
        if !prefix.contains(['f', 'F']) {
            return Ok(Expr::string(self.string_value(node)));
        }
        let raw = prefix.contains(['r', 'R']);
        let mut parts = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "string_content" | "escape_sequence" => {
                    let chunk = self.node_text(child).replace("{{", "{").replace("}}", "}");
                    let chunk = if raw { chunk } else { super::unescape(&chunk) };
                    parts.push(FormatPart::Text(chunk));
                }
                "interpolation" => {
                    let expr = field(child, "expression")?;
                    parts.push(FormatPart::Expr(self.expr(expr)));
                }
                _ => {}
            }
        }
        Ok(collapse_format(parts))
    }
}

/// `rb"..."` → (`rb`, `"..."`).
fn split_string_prefix(text: &str) -> (&str, &str) {
    let split = text.find(['"', '\'']).unwrap_or(0);
    text.split_at(split)
}

/// Merge adjacent text parts; a format string without holes is a literal.
fn collapse_format(parts: Vec<FormatPart>) -> Expr {
    let mut merged: Vec<FormatPart> = Vec::new();
    for part in parts {
        match (merged.last_mut(), part) {
            (Some(FormatPart::Text(prev)), FormatPart::Text(next)) => prev.push_str(&next),
            (_, part) => merged.push(part),
        }
    }
    match merged.as_slice() {
        [] => Expr::string(""),
        [FormatPart::Text(text)] => Expr::string(text.clone()),
        _ => Expr::FormatString(merged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(source: &str) -> Module {
        read_python(source, "test.py").unwrap()
    }

    #[test]
    fn test_typed_function() {
        let module = read("def calculate(a: int, b: int) -> int:\n    return a + b\n");
        assert_eq!(module.name, "test");
        assert_eq!(module.functions.len(), 1);
        let func = &module.functions[0];
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params[0].ty, Type::int());
        assert_eq!(func.return_type, Some(Type::int()));
        assert_eq!(
            func.body,
            vec![Stmt::Return(Some(Expr::binary(
                Expr::ident("a"),
                BinaryOp::Add,
                Expr::ident("b")
            )))]
        );
    }

    #[test]
    fn test_list_comprehension() {
        let module = read("def f(items):\n    return [x * 2 for x in items if x > 0]\n");
        let Stmt::Return(Some(Expr::Comprehension(c))) = &module.functions[0].body[0] else {
            panic!("expected comprehension return");
        };
        assert_eq!(c.kind, ComprehensionKind::List);
        assert_eq!(c.iterator, "x");
        assert_eq!(
            c.condition,
            Some(Expr::binary(Expr::ident("x"), BinaryOp::Gt, Expr::int(0)))
        );
        assert_eq!(
            c.target,
            Expr::binary(Expr::ident("x"), BinaryOp::Mul, Expr::int(2))
        );
    }

    #[test]
    fn test_dataclass_construction_is_named() {
        let source = r#"
from dataclasses import dataclass

@dataclass
class User:
    name: str
    age: int

def make() -> User:
    return User("Alice", 30)
"#;
        let module = read(source);
        assert_eq!(module.types.len(), 1);
        assert_eq!(module.types[0].fields.len(), 2);
        let Stmt::Return(Some(Expr::StructLiteral { type_name, fields })) =
            &module.functions[0].body[0]
        else {
            panic!("expected struct literal");
        };
        assert_eq!(type_name, "User");
        assert_eq!(fields[0].name.as_deref(), Some("name"));
        assert_eq!(fields[1].name.as_deref(), Some("age"));
    }

    #[test]
    fn test_class_with_init_and_methods() {
        let source = r#"
class Counter:
    """Counts things."""

    def __init__(self, start: int):
        self.count = start

    def increment(self, by: int = 1) -> int:
        self.count += by
        return self.count
"#;
        let module = read(source);
        let class = &module.classes[0];
        assert_eq!(class.doc.as_deref(), Some("Counts things."));
        assert_eq!(class.properties[0].name, "count");
        assert_eq!(class.properties[0].ty, Type::int());
        assert_eq!(class.constructor.as_ref().unwrap().params.len(), 1);
        let method = &class.methods[0];
        assert_eq!(method.name, "increment");
        assert_eq!(method.params[0].default, Some(Expr::int(1)));
    }

    #[test]
    fn test_raise_sets_throws() {
        let source = "def check(x: int) -> int:\n    if x < 0:\n        raise ValueError(\"negative\")\n    return x\n";
        let func = &read(source).functions[0];
        assert_eq!(func.throws, vec!["ValueError".to_string()]);
    }

    #[test]
    fn test_async_and_spawn() {
        let source = r#"
import asyncio
import threading

async def fetch(url: str) -> str:
    return await get(url)

def start(n: int):
    threading.Thread(target=worker, args=(n,)).start()
"#;
        let module = read(source);
        assert!(module.functions[0].is_async);
        let start = &module.functions[1];
        assert!(start.is_async);
        assert_eq!(
            start.body[0],
            Stmt::Spawn(Expr::call(Expr::ident("worker"), vec![Expr::ident("n")]))
        );
    }

    #[test]
    fn test_declarations_are_tracked() {
        let source = "def f():\n    total = 0\n    total = total + 1\n    return total\n";
        let body = &read(source).functions[0].body;
        assert!(matches!(body[0], Stmt::Assign { is_declaration: true, .. }));
        assert!(matches!(body[1], Stmt::Assign { is_declaration: false, .. }));
    }

    #[test]
    fn test_module_constants_and_statement_kinds() {
        let source = r#"
"""Module docs."""

LIMIT: int = 10
retries = 3

def bump(total: int) -> int:
    """Adds one."""
    total += 1
    log(total)
    return total
"#;
        let out = PYTHON_READER.read_with_diagnostics(source, "t.py").unwrap();
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        let module = out.module;
        assert_eq!(module.constants.len(), 2);
        assert_eq!(module.constants[0].name, "LIMIT");
        assert!(module.constants[0].is_constant);
        assert_eq!(module.constants[0].ty, Some(Type::int()));
        assert!(!module.constants[1].is_constant);

        let func = &module.functions[0];
        assert_eq!(func.doc.as_deref(), Some("Adds one."));
        assert_eq!(func.body.len(), 3);
        assert_eq!(
            func.body[1],
            Stmt::Expr(Expr::call(Expr::ident("log"), vec![Expr::ident("total")]))
        );
        assert!(!func.body.iter().any(|s| matches!(s, Stmt::Unhandled(_))));
    }

    #[test]
    fn test_fstring_and_enum() {
        let source = r#"
from enum import Enum

class Color(Enum):
    RED = 1
    GREEN = 2

def greet(name: str) -> str:
    return f"Hello, {name}!"
"#;
        let module = read(source);
        assert_eq!(module.enums[0].variants[0].name, "red");
        assert_eq!(
            module.functions[0].body[0],
            Stmt::Return(Some(Expr::FormatString(vec![
                FormatPart::Text("Hello, ".into()),
                FormatPart::Expr(Expr::ident("name")),
                FormatPart::Text("!".into()),
            ])))
        );
    }

    #[test]
    fn test_unhandled_statement_is_reported() {
        let source = "def f(path):\n    with open(path) as fh:\n        return fh.read()\n";
        let out = PYTHON_READER.read_with_diagnostics(source, "t.py").unwrap();
        assert!(matches!(out.module.functions[0].body[0], Stmt::Unhandled(_)));
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].location.line, 2);
    }

    #[test]
    fn test_unbalanced_source_fails() {
        let err = read_python("def f(:\n    return [1, 2\n", "t.py").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn test_range_is_canonical() {
        let source = "def f(n: int):\n    for i in range(n):\n        print(i)\n";
        let Stmt::For { iterable, .. } = &read(source).functions[0].body[0] else {
            panic!("expected for loop");
        };
        assert_eq!(iterable, &range_call(Expr::int(0), Expr::ident("n")));
    }
}
