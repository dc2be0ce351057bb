//! Language-neutral intermediate representation.
//!
//! Every reader produces a [`Module`] and every writer consumes one. The tree
//! owns all of its children, has no back references, and is never mutated
//! after a reader returns it.
//!
//! Naming in the IR is canonical: functions, methods, fields, parameters and
//! locals are `snake_case`, type names keep their source spelling, and a
//! method receiver is always the identifier `self`.

mod structure_eq;

pub use structure_eq::StructureEq;

use serde::{Deserialize, Serialize};

/// A translated source file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub version: String,
    pub imports: Vec<Import>,
    pub constants: Vec<ModuleVar>,
    pub types: Vec<TypeDefinition>,
    pub enums: Vec<Enum>,
    pub classes: Vec<Class>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".into(),
            ..Default::default()
        }
    }

    /// Whether `name` is a struct, class or enum declared in this module.
    pub fn declares_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.name == name)
            || self.classes.iter().any(|c| c.name == name)
            || self.enums.iter().any(|e| e.name == name)
    }

    /// Look up a module-level function by canonical name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Pretty-printed JSON dump of the tree.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// An import of another module or package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// Module path as written (`os.path`, `fmt`, `std::collections`).
    pub module: String,
    pub alias: Option<String>,
    /// Imported names for `from x import a, b` style imports.
    pub items: Vec<String>,
}

impl Import {
    pub fn module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            alias: None,
            items: Vec::new(),
        }
    }
}

/// A module-level constant or variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleVar {
    pub name: String,
    pub ty: Option<Type>,
    pub value: Expr,
    pub is_constant: bool,
}

// ============================================================================
// Types
// ============================================================================

/// A canonical type.
///
/// `name` is one of `string`, `int`, `float`, `bool`, `any`, `array`, `map`,
/// `tuple`, or a custom type name. `generic_args` holds exactly one element
/// type for `array`, key and value for `map`, two or more members for
/// `tuple`, and nothing otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic_args: Vec<Type>,
    #[serde(default)]
    pub is_optional: bool,
}

impl Type {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generic_args: Vec::new(),
            is_optional: false,
        }
    }

    pub fn string() -> Self {
        Self::new("string")
    }

    pub fn int() -> Self {
        Self::new("int")
    }

    pub fn float() -> Self {
        Self::new("float")
    }

    pub fn bool() -> Self {
        Self::new("bool")
    }

    pub fn any() -> Self {
        Self::new("any")
    }

    pub fn array(element: Type) -> Self {
        Self {
            name: "array".into(),
            generic_args: vec![element],
            is_optional: false,
        }
    }

    pub fn map(key: Type, value: Type) -> Self {
        Self {
            name: "map".into(),
            generic_args: vec![key, value],
            is_optional: false,
        }
    }

    pub fn tuple(members: Vec<Type>) -> Self {
        Self {
            name: "tuple".into(),
            generic_args: members,
            is_optional: false,
        }
    }

    /// Mark this type as optional (pointer, nullable, `Option`).
    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self.name.as_str(),
            "string" | "int" | "float" | "bool" | "any"
        )
    }

    pub fn is_array(&self) -> bool {
        self.name == "array"
    }

    pub fn is_map(&self) -> bool {
        self.name == "map"
    }

    pub fn is_tuple(&self) -> bool {
        self.name == "tuple"
    }

    /// Element type of an `array`, if this is one.
    pub fn element(&self) -> Option<&Type> {
        if self.is_array() {
            self.generic_args.first()
        } else {
            None
        }
    }

    /// Check the generic-argument arity invariant, recursively.
    pub fn is_well_formed(&self) -> bool {
        let arity_ok = match self.name.as_str() {
            "array" => self.generic_args.len() == 1,
            "map" => self.generic_args.len() == 2,
            "tuple" => self.generic_args.len() >= 2,
            _ => self.generic_args.is_empty(),
        };
        arity_ok && self.generic_args.iter().all(Type::is_well_formed)
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Expr>,
    #[serde(default)]
    pub is_variadic: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            is_variadic: false,
        }
    }
}

/// A function or method.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    /// Error kinds this function may raise (`error`, `ValueError`, ...).
    pub throws: Vec<String>,
    pub is_async: bool,
    #[serde(default)]
    pub is_static: bool,
    pub body: Vec<Stmt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<Param>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params,
            body,
            ..Default::default()
        }
    }

    pub fn returning(mut self, ty: Type) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn throwing(mut self, kind: impl Into<String>) -> Self {
        self.throws.push(kind.into());
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    /// Whether this function reports failures through its error channel.
    pub fn is_fallible(&self) -> bool {
        !self.throws.is_empty()
    }
}

/// A named, typed field of a struct or class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Expr>,
}

impl Property {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }
}

/// A plain struct: fields, no behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub fields: Vec<Property>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            fields,
            doc: None,
        }
    }
}

/// Name every reader gives a class constructor.
pub const CONSTRUCTOR_NAME: &str = "new";

/// A class: fields plus constructor and methods.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    pub properties: Vec<Property>,
    pub constructor: Option<Function>,
    pub methods: Vec<Function>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl Class {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// An enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    pub name: String,
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated: Option<Type>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Literal>,
}

impl EnumVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            associated: None,
            value: None,
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

/// A statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Expression evaluated for its effect (usually a call).
    Expr(Expr),

    Return(Option<Expr>),

    Assign {
        target: Expr,
        value: Expr,
        is_declaration: bool,
        ty: Option<Type>,
    },

    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },

    /// `for iterator in iterable`.
    For {
        iterator: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },

    While {
        condition: Expr,
        body: Vec<Stmt>,
    },

    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchBlock>,
        finally: Vec<Stmt>,
    },

    Throw(Expr),

    Break,

    Continue,

    /// Explicit concurrent launch (`go f()`, `Task.Run`, `thread::spawn`).
    Spawn(Expr),

    /// A construct no reader rule recognized, kept as source text.
    Unhandled(String),
}

/// One `catch`/`except` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchBlock {
    /// Caught error kind; `None` catches everything.
    pub kind: Option<String>,
    pub binding: Option<String>,
    pub body: Vec<Stmt>,
}

impl Stmt {
    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr(expr)
    }

    pub fn return_stmt(value: Option<Expr>) -> Self {
        Stmt::Return(value)
    }

    /// `let name = value` (new binding).
    pub fn declare(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign {
            target: Expr::ident(name),
            value,
            is_declaration: true,
            ty: None,
        }
    }

    /// `target = value` (rebinding or field store).
    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Assign {
            target,
            value,
            is_declaration: false,
            ty: None,
        }
    }

    pub fn if_stmt(condition: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>) -> Self {
        Stmt::If {
            condition,
            then_body,
            else_body,
        }
    }

    pub fn for_in(iterator: impl Into<String>, iterable: Expr, body: Vec<Stmt>) -> Self {
        Stmt::For {
            iterator: iterator.into(),
            iterable,
            body,
        }
    }

    pub fn while_loop(condition: Expr, body: Vec<Stmt>) -> Self {
        Stmt::While { condition, body }
    }

    /// Whether control cannot fall through past this statement.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stmt::Return(_) | Stmt::Throw(_))
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),

    Ident(String),

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        kwargs: Vec<(String, Expr)>,
    },

    /// `object.property`.
    Member {
        object: Box<Expr>,
        property: String,
    },

    /// `object[index]`.
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },

    Array(Vec<Expr>),

    Map(Vec<(Expr, Expr)>),

    /// Construction of a module-declared struct or class.
    StructLiteral {
        type_name: String,
        fields: Vec<FieldInit>,
    },

    Comprehension(Box<Comprehension>),

    Lambda {
        params: Vec<String>,
        body: LambdaBody,
    },

    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    Await(Box<Expr>),

    /// Interpolated string: f-string, template literal, `$""`, `format!`.
    FormatString(Vec<FormatPart>),

    /// An expression no reader rule recognized, kept as source text.
    Unhandled(String),
}

/// One field of a struct literal. Positional fields have no name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInit {
    pub name: Option<String>,
    pub value: Expr,
}

impl FieldInit {
    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }

    pub fn positional(value: Expr) -> Self {
        Self { name: None, value }
    }
}

/// Iterate, optionally filter, transform, accumulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comprehension {
    pub kind: ComprehensionKind,
    /// Produced element (the key for dict comprehensions).
    pub target: Expr,
    /// Produced value for dict comprehensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Expr>,
    pub iterator: String,
    pub iterable: Expr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expr>,
}

impl Comprehension {
    /// Whether the transform step is the identity (`x for x in xs`).
    pub fn is_identity_map(&self) -> bool {
        self.value.is_none() && matches!(&self.target, Expr::Ident(n) if *n == self.iterator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComprehensionKind {
    List,
    Dict,
    Set,
    Generator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormatPart {
    Text(String),
    Expr(Expr),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,

    /// Membership (`x in xs`).
    In,
}

impl BinaryOp {
    /// The operator's spelling shared by the C-family targets.
    pub fn c_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div | BinaryOp::FloorDiv => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::In => "in",
        }
    }

    /// Parse a C-family operator token.
    pub fn from_c_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "**" => BinaryOp::Pow,
            "==" | "===" => BinaryOp::Eq,
            "!=" | "!==" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            _ => return None,
        })
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    BitNot,
}

// Helper constructors
impl Expr {
    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    pub fn bool(v: bool) -> Self {
        Expr::Literal(Literal::Bool(v))
    }

    pub fn int(v: i64) -> Self {
        Expr::Literal(Literal::Int(v))
    }

    pub fn float(v: f64) -> Self {
        Expr::Literal(Literal::Float(v))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(s.into()))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
            kwargs: Vec::new(),
        }
    }

    pub fn member(object: Expr, property: impl Into<String>) -> Self {
        Expr::Member {
            object: Box::new(object),
            property: property.into(),
        }
    }

    pub fn index(object: Expr, index: Expr) -> Self {
        Expr::Index {
            object: Box::new(object),
            index: Box::new(index),
        }
    }

    pub fn array(items: Vec<Expr>) -> Self {
        Expr::Array(items)
    }

    pub fn ternary(condition: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn lambda(params: Vec<String>, body: Expr) -> Self {
        Expr::Lambda {
            params,
            body: LambdaBody::Expr(Box::new(body)),
        }
    }

    pub fn await_expr(inner: Expr) -> Self {
        Expr::Await(Box::new(inner))
    }

    pub fn comprehension(c: Comprehension) -> Self {
        Expr::Comprehension(Box::new(c))
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Expr::Literal(Literal::Null))
    }

    /// Whether this expression contains an `Await` anywhere below it.
    pub fn contains_await(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if matches!(e, Expr::Await(_)) {
                found = true;
            }
        });
        found
    }

    /// Pre-order traversal of this expression and every nested expression.
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Literal(_) | Expr::Ident(_) | Expr::Unhandled(_) => {}
            Expr::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::Unary { operand, .. } => operand.visit(f),
            Expr::Call {
                callee,
                args,
                kwargs,
            } => {
                callee.visit(f);
                args.iter().for_each(|a| a.visit(f));
                kwargs.iter().for_each(|(_, v)| v.visit(f));
            }
            Expr::Member { object, .. } => object.visit(f),
            Expr::Index { object, index } => {
                object.visit(f);
                index.visit(f);
            }
            Expr::Array(items) => items.iter().for_each(|i| i.visit(f)),
            Expr::Map(entries) => entries.iter().for_each(|(k, v)| {
                k.visit(f);
                v.visit(f);
            }),
            Expr::StructLiteral { fields, .. } => fields.iter().for_each(|fi| fi.value.visit(f)),
            Expr::Comprehension(c) => {
                c.target.visit(f);
                if let Some(v) = &c.value {
                    v.visit(f);
                }
                c.iterable.visit(f);
                if let Some(cond) = &c.condition {
                    cond.visit(f);
                }
            }
            Expr::Lambda { body, .. } => match body {
                LambdaBody::Expr(e) => e.visit(f),
                LambdaBody::Block(stmts) => stmts.iter().for_each(|s| s.visit_exprs(f)),
            },
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                condition.visit(f);
                then.visit(f);
                otherwise.visit(f);
            }
            Expr::Await(inner) => inner.visit(f),
            Expr::FormatString(parts) => parts.iter().for_each(|p| {
                if let FormatPart::Expr(e) = p {
                    e.visit(f);
                }
            }),
        }
    }
}

impl Stmt {
    /// Visit every expression in this statement and its nested statements.
    pub fn visit_exprs(&self, f: &mut dyn FnMut(&Expr)) {
        match self {
            Stmt::Expr(e) | Stmt::Throw(e) | Stmt::Spawn(e) => e.visit(f),
            Stmt::Return(e) => {
                if let Some(e) = e {
                    e.visit(f);
                }
            }
            Stmt::Assign { target, value, .. } => {
                target.visit(f);
                value.visit(f);
            }
            Stmt::If {
                condition,
                then_body,
                else_body,
            } => {
                condition.visit(f);
                then_body.iter().for_each(|s| s.visit_exprs(f));
                else_body.iter().for_each(|s| s.visit_exprs(f));
            }
            Stmt::For { iterable, body, .. } => {
                iterable.visit(f);
                body.iter().for_each(|s| s.visit_exprs(f));
            }
            Stmt::While { condition, body } => {
                condition.visit(f);
                body.iter().for_each(|s| s.visit_exprs(f));
            }
            Stmt::Try {
                body,
                catches,
                finally,
            } => {
                body.iter().for_each(|s| s.visit_exprs(f));
                catches
                    .iter()
                    .flat_map(|c| &c.body)
                    .for_each(|s| s.visit_exprs(f));
                finally.iter().for_each(|s| s.visit_exprs(f));
            }
            Stmt::Break | Stmt::Continue | Stmt::Unhandled(_) => {}
        }
    }

    /// Visit this statement and every nested statement, pre-order.
    pub fn visit_stmts(&self, f: &mut dyn FnMut(&Stmt)) {
        f(self);
        let nested: Vec<&Vec<Stmt>> = match self {
            Stmt::If {
                then_body,
                else_body,
                ..
            } => vec![then_body, else_body],
            Stmt::For { body, .. } | Stmt::While { body, .. } => vec![body],
            Stmt::Try {
                body,
                catches,
                finally,
            } => {
                let mut v = vec![body, finally];
                v.extend(catches.iter().map(|c| &c.body));
                v
            }
            _ => Vec::new(),
        };
        for block in nested {
            for s in block {
                s.visit_stmts(f);
            }
        }
    }
}

/// Visit every statement of a body, recursively.
pub fn walk_body(body: &[Stmt], f: &mut dyn FnMut(&Stmt)) {
    for s in body {
        s.visit_stmts(f);
    }
}

/// Visit every expression of a body, recursively.
pub fn walk_body_exprs(body: &[Stmt], f: &mut dyn FnMut(&Expr)) {
    for s in body {
        s.visit_exprs(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_arity_invariant() {
        assert!(Type::array(Type::int()).is_well_formed());
        assert!(Type::map(Type::string(), Type::int()).is_well_formed());
        assert!(Type::tuple(vec![Type::int(), Type::string()]).is_well_formed());

        let bad_array = Type {
            name: "array".into(),
            generic_args: vec![],
            is_optional: false,
        };
        assert!(!bad_array.is_well_formed());

        let bad_custom = Type {
            name: "User".into(),
            generic_args: vec![Type::int()],
            is_optional: false,
        };
        assert!(!bad_custom.is_well_formed());

        let nested_bad = Type::array(bad_array);
        assert!(!nested_bad.is_well_formed());
    }

    #[test]
    fn test_identity_map_detection() {
        let c = Comprehension {
            kind: ComprehensionKind::List,
            target: Expr::ident("x"),
            value: None,
            iterator: "x".into(),
            iterable: Expr::ident("xs"),
            condition: Some(Expr::binary(Expr::ident("x"), BinaryOp::Gt, Expr::int(0))),
        };
        assert!(c.is_identity_map());
    }

    #[test]
    fn test_contains_await() {
        let e = Expr::binary(
            Expr::int(1),
            BinaryOp::Add,
            Expr::await_expr(Expr::call(Expr::ident("fetch"), vec![])),
        );
        assert!(e.contains_await());
        assert!(!Expr::ident("x").contains_await());
    }

    #[test]
    fn test_declares_type() {
        let mut module = Module::new("m");
        module
            .types
            .push(TypeDefinition::new("User", vec![Property::new("name", Type::string())]));
        module.classes.push(Class::new("Service"));
        assert!(module.declares_type("User"));
        assert!(module.declares_type("Service"));
        assert!(!module.declares_type("print"));
    }

    #[test]
    fn test_json_dump() {
        let f = Function::new(
            "add",
            vec![Param::new("a", Type::int()), Param::new("b", Type::int())],
            vec![Stmt::return_stmt(Some(Expr::binary(
                Expr::ident("a"),
                BinaryOp::Add,
                Expr::ident("b"),
            )))],
        )
        .returning(Type::int());
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["name"], "add");
        assert_eq!(json["params"][1]["ty"]["name"], "int");
        let back: Function = serde_json::from_value(json).unwrap();
        assert_eq!(back, f);

        let mut module = Module::new("calc");
        module.functions.push(f);
        let text = module.to_json().unwrap();
        assert!(text.contains("\"name\": \"calc\""));
        assert_eq!(Module::from_json(&text).unwrap(), module);
    }
}
