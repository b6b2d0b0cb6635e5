//! Syntax tree produced by the parser.
//!
//! Both trees are closed: code generation matches on every variant, so a new
//! node kind fails to compile until each stage handles it.

use crate::tokenizer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  BitAnd,
  BitOr,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl BinaryOp {
  /// Operators whose operands are evaluated right-to-left so that the left
  /// operand ends up in A and the right one in B.
  pub fn is_ordered(self) -> bool {
    !matches!(self, Self::Add | Self::Mul | Self::BitAnd | Self::BitOr)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Not,
  Neg,
  BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
  And,
  Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Binary {
    op: BinaryOp,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  Grouping(Box<Expr>),
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  LiteralBool(bool),
  LiteralString(String),
  /// Decimal text exactly as the lexer produced it; range checks happen in
  /// code generation.
  LiteralNumber(String),
  Variable(Token),
  Assign {
    name: Token,
    value: Box<Expr>,
  },
  Logical {
    op: LogicalOp,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  Call {
    callee: Box<Expr>,
    paren: Token,
    arguments: Vec<Expr>,
  },
  Input,
}

impl Expr {
  pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
    Self::Binary {
      op,
      left: Box::new(left),
      right: Box::new(right),
    }
  }

  pub fn unary(op: UnaryOp, operand: Expr) -> Self {
    Self::Unary {
      op,
      operand: Box::new(operand),
    }
  }

  pub fn logical(op: LogicalOp, left: Expr, right: Expr) -> Self {
    Self::Logical {
      op,
      left: Box::new(left),
      right: Box::new(right),
    }
  }

  pub fn assign(name: Token, value: Expr) -> Self {
    Self::Assign {
      name,
      value: Box::new(value),
    }
  }

  /// True for nodes that evaluate into A without touching any other register.
  pub fn is_leaf(&self) -> bool {
    match self {
      Self::LiteralBool(_) | Self::LiteralNumber(_) | Self::Variable(_) | Self::Input => true,
      Self::Grouping(inner) => inner.is_leaf(),
      _ => false,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
  Expression(Expr),
  If {
    condition: Expr,
    then_branch: Box<Stmt>,
    else_branch: Option<Box<Stmt>>,
  },
  While {
    condition: Expr,
    body: Box<Stmt>,
  },
  For {
    initializer: Option<Box<Stmt>>,
    condition: Option<Expr>,
    increment: Option<Expr>,
    body: Box<Stmt>,
  },
  Block(Vec<Stmt>),
  Var {
    name: Token,
    initializer: Option<Expr>,
  },
  Function {
    name: Token,
    params: Vec<Token>,
    body: Vec<Stmt>,
  },
  Return {
    keyword: Token,
    value: Option<Expr>,
  },
  Output(Expr),
}
