//! Owned syntax model for Go source files.
//!
//! The tree-sitter CST is converted once, at load time, into these plain
//! structures. Only what the analysis needs is kept: package clause,
//! imports, type declarations, function declarations with their
//! signatures, and a shallow view of each function body.

use std::path::PathBuf;

/// Byte range `[start, end)` into a file's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Stable index of a function declaration inside its package.
///
/// Assigned in a single pass over every file of the package, in file order
/// and then source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub usize);

/// A parsed `.go` file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
    pub package: String,
    pub package_span: Span,
    pub imports: Vec<ImportDecl>,
    /// Start offsets of every top-level declaration after the package clause.
    pub decl_starts: Vec<usize>,
    /// Top-level comments (outside any declaration).
    pub comments: Vec<Span>,
    pub types: Vec<TypeSpec>,
    pub funcs: Vec<FuncDecl>,
}

impl SourceFile {
    pub fn text(&self, span: Span) -> &str {
        &self.source[span.start..span.end]
    }

    /// All import specs of the file, across every import declaration.
    pub fn import_specs(&self) -> impl Iterator<Item = &ImportSpec> {
        self.imports.iter().flat_map(|decl| decl.specs.iter())
    }
}

/// `import "x"` or `import ( ... )`.
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub span: Span,
    /// Offset just past `(` for the parenthesized form.
    pub open_paren: Option<usize>,
    /// Offset of `)` for the parenthesized form.
    pub close_paren: Option<usize>,
    pub specs: Vec<ImportSpec>,
}

impl ImportDecl {
    pub fn is_parenthesized(&self) -> bool {
        self.open_paren.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit local name: an identifier, `_` or `.`.
    pub name: Option<String>,
    pub path: String,
    pub span: Span,
}

/// `type Name[P any] T` or `type Name = T`.
#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: String,
    pub name_span: Span,
    pub alias: bool,
    pub type_params: Vec<String>,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub id: DeclId,
    pub name: String,
    pub name_span: Span,
    pub position: Position,
    pub receiver: Option<Receiver>,
    pub type_params: Vec<String>,
    pub params: Vec<ParamGroup>,
    pub results: Vec<ParamGroup>,
    pub body: Option<Block>,
}

impl FuncDecl {
    pub fn is_method(&self) -> bool {
        self.receiver.is_some()
    }

    /// `T.Name` for methods, `Name` for plain functions.
    pub fn display_name(&self) -> String {
        match &self.receiver {
            Some(recv) => format!("{}.{}", recv.base, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub name: Option<String>,
    pub base: String,
    pub pointer: bool,
    /// Type parameter names as spelled on the receiver, e.g. `T` in `*List[T]`.
    pub type_args: Vec<String>,
}

/// One comma-separated parameter group: `a, b int` or `...x string`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamGroup {
    pub names: Vec<String>,
    pub ty: TypeExpr,
    pub variadic: bool,
}

/// A function body.
#[derive(Debug, Clone)]
pub struct Block {
    /// Offset of `{`.
    pub open: usize,
    /// Offset of `}`.
    pub close: usize,
    pub items: Vec<BlockItem>,
}

impl Block {
    pub fn statements(&self) -> impl Iterator<Item = &Stmt> {
        self.items.iter().filter_map(|item| match item {
            BlockItem::Stmt(stmt) => Some(stmt),
            BlockItem::Comment { .. } => None,
        })
    }

    /// Comments that come before the first statement.
    pub fn leading_comments(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .take_while(|item| matches!(item, BlockItem::Comment { .. }))
            .filter_map(|item| match item {
                BlockItem::Comment { text, .. } => Some(text.as_str()),
                BlockItem::Stmt(_) => None,
            })
    }

    pub fn comment_spans(&self) -> impl Iterator<Item = Span> + '_ {
        self.items.iter().filter_map(|item| match item {
            BlockItem::Comment { span, .. } => Some(*span),
            BlockItem::Stmt(_) => None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum BlockItem {
    Comment { span: Span, text: String },
    Stmt(Stmt),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Defer(Expr),
    Other,
}

/// Expression tree, kept only for deferred statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Ident(String),
    Selector { operand: Box<Expr>, field: String },
    Call { func: Box<Expr>, args: Vec<Expr> },
    Unary { op: String, operand: Box<Expr> },
    StringLit(String),
    Other(String),
}

impl Expr {
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Name { name: String, args: Vec<TypeExpr> },
    Qualified { package: String, name: String, args: Vec<TypeExpr> },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array { len: String, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    Func { params: Vec<ParamGroup>, results: Vec<ParamGroup> },
    Struct(Vec<FieldExpr>),
    Interface(Vec<InterfaceElem>),
    /// Constraint-only syntax (`~T`, unions) or anything not modelled.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExpr {
    /// Empty for an embedded field.
    pub names: Vec<String>,
    pub ty: TypeExpr,
    pub embedded_pointer: bool,
}

impl FieldExpr {
    pub fn is_embedded(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceElem {
    Method {
        name: String,
        params: Vec<ParamGroup>,
        results: Vec<ParamGroup>,
    },
    Embed(TypeExpr),
    Constraint(String),
}

pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

pub fn is_blank(name: &str) -> bool {
    name == "_"
}
