use crate::diagnostics::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Decimal digits as written; the host's integers are unbounded.
    Int(String),
    Float(f64),
    Bool(bool),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Identifier(String),
    This,
    Attribute {
        base: Box<Expr>,
        name: String,
    },
    Literal(Literal),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Inclusive interval `start..end`.
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    List(Vec<Expr>),
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
}

impl Expr {
    /// Dotted name of an identifier or attribute chain, e.g. `py.random.randint`.
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Identifier(name) => Some(name.clone()),
            ExprKind::Attribute { base, name } => {
                let base = base.dotted_name()?;
                Some(format!("{base}.{name}"))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: String,
    pub superclass: Option<String>,
    pub body: Block,
    pub position: Position,
}

impl Class {
    pub fn methods(&self) -> impl Iterator<Item = &Function> {
        self.body.statements.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::Function(function) => Some(function),
            _ => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.body.statements.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::Let { name, value } => Some((name.as_str(), value)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    Block(Block),
    If(Box<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let {
        name: String,
        value: Expr,
    },
    Set {
        name: String,
        value: Expr,
    },
    /// Assignment through an attribute or index target.
    Assign {
        target: Expr,
        value: Expr,
    },
    Import(String),
    Return(Option<Expr>),
    Expr(Expr),
    If {
        condition: Expr,
        then_branch: Block,
        else_branch: Option<ElseBranch>,
    },
    For {
        binding: String,
        iterable: Expr,
        body: Block,
    },
    While {
        condition: Expr,
        body: Block,
    },
    Try {
        body: Block,
        error_binding: Option<String>,
        handler: Block,
    },
    /// Method declaration; only produced inside class bodies.
    Function(Function),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub functions: Vec<Function>,
    /// Imports and loose top-level statements, in source order.
    pub statements: Vec<Stmt>,
    pub classes: Vec<Class>,
}

impl Program {
    pub fn has_main(&self) -> bool {
        self.functions.iter().any(|f| f.name == "main")
    }
}
