//! Abstract syntax tree.
//!
//! Expressions and statements are sealed enum families; consumers match
//! exhaustively instead of downcasting. Nodes carry source spans for
//! diagnostics and instruction origins.

/// A position in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    /// Byte offset into the unit's source.
    pub offset: usize,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// A half-open source range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub fn union(left: Span, right: Span) -> Span {
        Span {
            start: if left.start.offset <= right.start.offset {
                left.start
            } else {
                right.start
            },
            end: if left.end.offset >= right.end.offset {
                left.end
            } else {
                right.end
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Divide,
    Modulo,
    Multiply,
    And,
    Or,
    Equals,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    NotEquals,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Multiply => "*",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Equals => "==",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::NotEquals => "!=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negation,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil {
        span: Span,
    },
    Boolean {
        value: bool,
        span: Span,
    },
    Integer {
        value: i64,
        span: Span,
    },
    Real {
        value: f64,
        span: Span,
    },
    /// Byte contents of a string literal, carried raw end to end.
    Str {
        value: Vec<u8>,
        span: Span,
    },
    /// `{ key: expr, ... }`
    Object {
        properties: Vec<(String, Expr)>,
        span: Span,
    },
}

impl Literal {
    pub fn span(&self) -> Span {
        match self {
            Literal::Nil { span }
            | Literal::Boolean { span, .. }
            | Literal::Integer { span, .. }
            | Literal::Real { span, .. }
            | Literal::Str { span, .. }
            | Literal::Object { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Call {
        callable: Box<Expr>,
        arguments: Vec<Expr>,
        span: Span,
    },
    /// Anonymous function expression. The parser assigns a unique name.
    Function(Box<FunctionDecl>),
    Identifier {
        name: String,
        /// `local name` bypasses class-member capture.
        forced_local: bool,
        span: Span,
    },
    Index {
        range: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    /// A parenthesized expression list. One item is a plain parenthesized
    /// expression; several construct a list.
    List {
        items: Vec<Expr>,
        span: Span,
    },
    Literal(Literal),
    Property {
        object: Box<Expr>,
        name: String,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Identifier { span, .. }
            | Expr::Index { span, .. }
            | Expr::List { span, .. }
            | Expr::Property { span, .. } => *span,
            Expr::Function(function) => function.span,
            Expr::Literal(literal) => literal.span(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub values: Vec<Literal>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assert {
        expr: Expr,
        /// Original expression text, reported on failure.
        text: String,
        span: Span,
    },
    Assignment {
        target: Expr,
        value: Expr,
        span: Span,
    },
    Block(Block),
    Expression {
        expr: Expr,
        span: Span,
    },
    For {
        init: Box<Stmt>,
        condition: Expr,
        update: Box<Stmt>,
        body: Block,
        span: Span,
    },
    /// `iterate x in range { ... }`
    Iterate {
        variable: String,
        range: Expr,
        body: Block,
        span: Span,
    },
    If {
        condition: Expr,
        then_block: Block,
        else_block: Option<Block>,
        span: Span,
    },
    Return {
        expr: Expr,
        span: Span,
    },
    Switch {
        expr: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Block>,
        span: Span,
    },
    Throw {
        expr: Expr,
        span: Span,
    },
    TryCatch {
        try_block: Block,
        variable: String,
        catch_block: Block,
        span: Span,
    },
    While {
        condition: Expr,
        body: Block,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDecl {
    pub name: String,
    pub initializer: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub members: Vec<MemberDecl>,
    pub methods: Vec<FunctionDecl>,
    pub span: Span,
}

/// A parsed translation unit. Loose top-level statements form the body of
/// the synthesized entry function.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub functions: Vec<FunctionDecl>,
    pub classes: Vec<ClassDecl>,
    pub main: FunctionDecl,
}
