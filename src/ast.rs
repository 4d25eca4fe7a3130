//! The syntax tree produced by the parser and rewritten by the semantic
//! passes.
//!
//! Two passes mutate this tree in place before lowering: variable
//! resolution overwrites declaration and variable names with unique
//! symbols, and loop labeling fills in the `label` slots on loops and on
//! `break`/`continue`. Every statement and expression records the line of
//! its first token for diagnostics.

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
  pub functions: Vec<Function>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
  pub name: String,
  pub body: Block,
  pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
  pub items: Vec<BlockItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
  Decl(Declaration),
  Stmt(Statement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
  pub name: String,
  pub init: Option<Expr>,
  pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
  pub kind: StmtKind,
  pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
  Return(Expr),
  Expression(Expr),
  If {
    cond: Expr,
    then_branch: Box<Statement>,
    else_branch: Option<Box<Statement>>,
  },
  Compound(Block),
  While {
    cond: Expr,
    body: Box<Statement>,
    label: Option<String>,
  },
  DoWhile {
    body: Box<Statement>,
    cond: Expr,
    label: Option<String>,
  },
  For {
    init: ForInit,
    cond: Option<Expr>,
    post: Option<Expr>,
    body: Box<Statement>,
    label: Option<String>,
  },
  Break {
    label: Option<String>,
  },
  Continue {
    label: Option<String>,
  },
  Null,
}

/// The first clause of a `for` header.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
  Decl(Declaration),
  Expr(Expr),
  Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
  pub kind: ExprKind,
  pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
  Constant(i32),
  Var(String),
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  Binary {
    op: BinaryOp,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  Assignment {
    lvalue: Box<Expr>,
    rvalue: Box<Expr>,
  },
  Conditional {
    cond: Box<Expr>,
    then_expr: Box<Expr>,
    else_expr: Box<Expr>,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Complement,
  Negate,
  Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Subtract,
  Multiply,
  Divide,
  Remainder,
  And,
  Or,
  Equal,
  NotEqual,
  LessThan,
  LessOrEqual,
  GreaterThan,
  GreaterOrEqual,
}

impl Statement {
  pub fn new(kind: StmtKind, line: u32) -> Self {
    Self { kind, line }
  }
}

impl Expr {
  pub fn new(kind: ExprKind, line: u32) -> Self {
    Self { kind, line }
  }

  pub fn constant(value: i32, line: u32) -> Self {
    Self::new(ExprKind::Constant(value), line)
  }

  pub fn var(name: impl Into<String>, line: u32) -> Self {
    Self::new(ExprKind::Var(name.into()), line)
  }

  pub fn unary(op: UnaryOp, operand: Expr, line: u32) -> Self {
    Self::new(
      ExprKind::Unary {
        op,
        operand: Box::new(operand),
      },
      line,
    )
  }

  pub fn binary(op: BinaryOp, left: Expr, right: Expr, line: u32) -> Self {
    Self::new(
      ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
      },
      line,
    )
  }

  pub fn assignment(lvalue: Expr, rvalue: Expr, line: u32) -> Self {
    Self::new(
      ExprKind::Assignment {
        lvalue: Box::new(lvalue),
        rvalue: Box::new(rvalue),
      },
      line,
    )
  }

  pub fn conditional(cond: Expr, then_expr: Expr, else_expr: Expr, line: u32) -> Self {
    Self::new(
      ExprKind::Conditional {
        cond: Box::new(cond),
        then_expr: Box::new(then_expr),
        else_expr: Box::new(else_expr),
      },
      line,
    )
  }
}
