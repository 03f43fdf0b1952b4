// AST definitions for the C subset accepted by the REPL

use crate::parser::preprocessor::MacroEvent;
use crate::sema::types::{CType, FunctionType, TypeTable};

/// Half-open byte range `[start, end)` into the parsed source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Smallest span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The source text this span covers, or `""` if it is out of range
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..self.end).unwrap_or("")
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
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
    BitShl,
    BitShr,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinOp::BitShl | BinOp::BitShr)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,     // -x
    Plus,    // +x
    Not,     // !x
    BitNot,  // ~x
    PreInc,  // ++x
    PreDec,  // --x
    PostInc, // x++
    PostDec, // x--
    Deref,   // *x
    AddrOf,  // &x
}

/// An expression node. `ty` is filled in by the checker; literals get their
/// type from the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub ty: CType,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr {
            kind,
            span,
            ty: CType::Void,
        }
    }

    pub fn typed(kind: ExprKind, span: Span, ty: CType) -> Self {
        Expr { kind, span, ty }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLiteral(u64),
    FloatLiteral(f64),
    CharLiteral(u8),
    /// Bytes without the terminating NUL
    StringLiteral(Vec<u8>),
    Ident(String),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    /// `target = value`, or `target op= value` when `op` is set
    Assign {
        op: Option<BinOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        base: Box<Expr>,
        field: String,
        arrow: bool,
    },
    Cast {
        target: CType,
        operand: Box<Expr>,
    },
    SizeofType(CType),
    SizeofExpr(Box<Expr>),
    Comma(Box<Expr>, Box<Expr>),
}

/// Storage class written in a declaration's specifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Storage {
    #[default]
    None,
    Typedef,
    Extern,
    Static,
}

/// Initializer of a declarator: a single expression or a brace list
#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    Expr(Expr),
    List { items: Vec<Initializer>, span: Span },
}

impl Initializer {
    pub fn span(&self) -> Span {
        match self {
            Initializer::Expr(expr) => expr.span,
            Initializer::List { span, .. } => *span,
        }
    }
}

/// One declarator of a declaration, e.g. `*p = &x` in `int a, *p = &x;`
#[derive(Debug, Clone, PartialEq)]
pub struct InitDeclarator {
    pub name: String,
    pub ty: CType,
    /// Declarator text without the initializer (`*p`, `arr[3]`)
    pub span: Span,
    pub init: Option<Initializer>,
}

/// A declaration statement (file scope or block scope)
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub storage: Storage,
    /// Specifier text (`const unsigned long`, `struct P { int x; }`)
    pub specifiers: Span,
    pub base_type: CType,
    pub declarators: Vec<InitDeclarator>,
    /// Set when the specifiers define a struct/union body
    pub defines_aggregate: Option<String>,
    /// Whole declaration including the terminating `;`
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: CType,
}

/// Function definition
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub ty: FunctionType,
    pub params: Vec<Param>,
    pub body: Stmt,
    pub is_static: bool,
    /// Specifiers plus declarator, i.e. the prototype text without `;`
    pub signature: Span,
    pub span: Span,
}

/// Switch case; `value` is `None` for `default:`
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub value: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// A statement node. The span includes the trailing `;` where there is one.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Decl(Declaration),
    Compound(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Switch {
        cond: Expr,
        cases: Vec<SwitchCase>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Empty,
}

/// File-scope item
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalDecl {
    Function(FunctionDef),
    Declaration(Declaration),
}

impl ExternalDecl {
    pub fn span(&self) -> Span {
        match self {
            ExternalDecl::Function(f) => f.span,
            ExternalDecl::Declaration(d) => d.span,
        }
    }
}

/// A parsed translation unit
#[derive(Debug, Clone, Default)]
pub struct TranslationUnit {
    pub items: Vec<ExternalDecl>,
    pub types: TypeTable,
    pub macros: Vec<MacroEvent>,
}
