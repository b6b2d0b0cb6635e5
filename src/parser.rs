//! Recursive-descent parser producing a statement list and expression AST.
//!
//! Each precedence level is one function that calls the next tighter level
//! for its operands. Statement terminators are optional: a `;` is consumed
//! when present and otherwise the next statement simply begins. The first
//! grammar violation aborts the parse.

use crate::ast::{BinaryOp, Expr, LogicalOp, Stmt, UnaryOp};
use crate::error::{ParseResult, SyntaxError};
use crate::tokenizer::{Token, TokenKind};

/// Upper bound on call arguments and function parameters.
const MAX_ARITY: usize = 255;

/// Upper bound on nested groupings, unary chains, assignments and statements.
const MAX_DEPTH: usize = 100;

/// Parse a whole program.
pub fn parse(tokens: Vec<Token>) -> ParseResult<Vec<Stmt>> {
  let mut stream = TokenStream::new(tokens);
  let mut statements = Vec::new();

  while !stream.is_eof() {
    statements.push(parse_declaration(&mut stream)?);
  }

  Ok(statements)
}

fn parse_declaration(stream: &mut TokenStream) -> ParseResult<Stmt> {
  if stream.equal(TokenKind::Fun) {
    return parse_function(stream);
  }
  if stream.equal(TokenKind::Var) {
    return parse_var_declaration(stream);
  }
  parse_statement(stream)
}

fn parse_function(stream: &mut TokenStream) -> ParseResult<Stmt> {
  let name = stream.consume(TokenKind::Identifier, "Expect function name.")?;
  stream.consume(TokenKind::LeftParen, "Expect '(' after function name.")?;

  let mut params = Vec::new();
  if !stream.check(TokenKind::RightParen) {
    loop {
      if params.len() >= MAX_ARITY {
        return Err(stream.error("Can't have more than 255 parameters."));
      }
      params.push(stream.consume(TokenKind::Identifier, "Expect parameter name.")?);
      if !stream.equal(TokenKind::Comma) {
        break;
      }
    }
  }

  stream.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
  stream.consume(TokenKind::LeftBrace, "Expect '{' before function body.")?;
  let body = parse_block(stream)?;
  Ok(Stmt::Function { name, params, body })
}

fn parse_var_declaration(stream: &mut TokenStream) -> ParseResult<Stmt> {
  let name = stream.consume(TokenKind::Identifier, "Expect variable name.")?;
  let initializer = if stream.equal(TokenKind::Equal) {
    Some(parse_expr(stream)?)
  } else {
    None
  };
  stream.equal(TokenKind::Semicolon);
  Ok(Stmt::Var { name, initializer })
}

fn parse_statement(stream: &mut TokenStream) -> ParseResult<Stmt> {
  stream.nested(statement)
}

fn statement(stream: &mut TokenStream) -> ParseResult<Stmt> {
  if stream.equal(TokenKind::If) {
    return parse_if(stream);
  }
  if stream.equal(TokenKind::While) {
    return parse_while(stream);
  }
  if stream.equal(TokenKind::For) {
    return parse_for(stream);
  }
  if stream.check(TokenKind::Return) {
    return parse_return(stream);
  }
  if stream.equal(TokenKind::Out) {
    let value = parse_expr(stream)?;
    stream.equal(TokenKind::Semicolon);
    return Ok(Stmt::Output(value));
  }
  if stream.equal(TokenKind::LeftBrace) {
    return Ok(Stmt::Block(parse_block(stream)?));
  }
  parse_expr_stmt(stream)
}

fn parse_if(stream: &mut TokenStream) -> ParseResult<Stmt> {
  stream.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
  let condition = parse_expr(stream)?;
  stream.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;

  let then_branch = Box::new(parse_statement(stream)?);
  let else_branch = if stream.equal(TokenKind::Else) {
    Some(Box::new(parse_statement(stream)?))
  } else {
    None
  };

  Ok(Stmt::If {
    condition,
    then_branch,
    else_branch,
  })
}

fn parse_while(stream: &mut TokenStream) -> ParseResult<Stmt> {
  stream.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
  let condition = parse_expr(stream)?;
  stream.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
  let body = Box::new(parse_statement(stream)?);
  Ok(Stmt::While { condition, body })
}

fn parse_for(stream: &mut TokenStream) -> ParseResult<Stmt> {
  stream.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

  // The initializer swallows its own `;` when it has one.
  let initializer = if stream.equal(TokenKind::Semicolon) {
    None
  } else if stream.equal(TokenKind::Var) {
    Some(Box::new(parse_var_declaration(stream)?))
  } else {
    Some(Box::new(parse_expr_stmt(stream)?))
  };

  let condition = if stream.check(TokenKind::Semicolon) {
    None
  } else {
    Some(parse_expr(stream)?)
  };
  stream.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

  let increment = if stream.check(TokenKind::RightParen) {
    None
  } else {
    Some(parse_expr(stream)?)
  };
  stream.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

  let body = Box::new(parse_statement(stream)?);
  Ok(Stmt::For {
    initializer,
    condition,
    increment,
    body,
  })
}

fn parse_return(stream: &mut TokenStream) -> ParseResult<Stmt> {
  let keyword = stream.advance();
  let value = if stream.check(TokenKind::Semicolon)
    || stream.check(TokenKind::RightBrace)
    || stream.is_eof()
  {
    None
  } else {
    Some(parse_expr(stream)?)
  };
  stream.equal(TokenKind::Semicolon);
  Ok(Stmt::Return { keyword, value })
}

fn parse_block(stream: &mut TokenStream) -> ParseResult<Vec<Stmt>> {
  stream.nested(block)
}

fn block(stream: &mut TokenStream) -> ParseResult<Vec<Stmt>> {
  let mut statements = Vec::new();
  while !stream.check(TokenKind::RightBrace) && !stream.is_eof() {
    statements.push(parse_declaration(stream)?);
  }
  stream.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
  Ok(statements)
}

fn parse_expr_stmt(stream: &mut TokenStream) -> ParseResult<Stmt> {
  let expr = parse_expr(stream)?;
  stream.equal(TokenKind::Semicolon);
  Ok(Stmt::Expression(expr))
}

fn parse_expr(stream: &mut TokenStream) -> ParseResult<Expr> {
  stream.nested(parse_assign)
}

fn parse_assign(stream: &mut TokenStream) -> ParseResult<Expr> {
  let node = parse_or(stream)?;

  if stream.check(TokenKind::Equal) {
    let equals = stream.advance();
    let value = parse_expr(stream)?;
    return match node {
      Expr::Variable(name) => Ok(Expr::assign(name, value)),
      _ => Err(SyntaxError::at(&equals, "Invalid assignment target.")),
    };
  }

  Ok(node)
}

fn parse_or(stream: &mut TokenStream) -> ParseResult<Expr> {
  let mut node = parse_and(stream)?;
  while stream.equal(TokenKind::PipePipe) {
    let rhs = parse_and(stream)?;
    node = Expr::logical(LogicalOp::Or, node, rhs);
  }
  Ok(node)
}

fn parse_and(stream: &mut TokenStream) -> ParseResult<Expr> {
  let mut node = parse_equality(stream)?;
  while stream.equal(TokenKind::AmpAmp) {
    let rhs = parse_equality(stream)?;
    node = Expr::logical(LogicalOp::And, node, rhs);
  }
  Ok(node)
}

fn parse_equality(stream: &mut TokenStream) -> ParseResult<Expr> {
  let mut node = parse_comparison(stream)?;

  loop {
    let op = match stream.peek_kind() {
      TokenKind::EqualEqual => BinaryOp::Eq,
      TokenKind::BangEqual => BinaryOp::Ne,
      _ => break,
    };
    stream.advance();
    let rhs = parse_comparison(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_comparison(stream: &mut TokenStream) -> ParseResult<Expr> {
  let mut node = parse_bitwise(stream)?;

  loop {
    let op = match stream.peek_kind() {
      TokenKind::Greater => BinaryOp::Gt,
      TokenKind::GreaterEqual => BinaryOp::Ge,
      TokenKind::Less => BinaryOp::Lt,
      TokenKind::LessEqual => BinaryOp::Le,
      _ => break,
    };
    stream.advance();
    let rhs = parse_bitwise(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_bitwise(stream: &mut TokenStream) -> ParseResult<Expr> {
  let mut node = parse_term(stream)?;

  loop {
    let op = match stream.peek_kind() {
      TokenKind::Amp => BinaryOp::BitAnd,
      TokenKind::Pipe => BinaryOp::BitOr,
      _ => break,
    };
    stream.advance();
    let rhs = parse_term(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_term(stream: &mut TokenStream) -> ParseResult<Expr> {
  let mut node = parse_factor(stream)?;

  loop {
    let op = match stream.peek_kind() {
      TokenKind::Plus => BinaryOp::Add,
      TokenKind::Minus => BinaryOp::Sub,
      _ => break,
    };
    stream.advance();
    let rhs = parse_factor(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_factor(stream: &mut TokenStream) -> ParseResult<Expr> {
  let mut node = parse_unary(stream)?;

  loop {
    let op = match stream.peek_kind() {
      TokenKind::Star => BinaryOp::Mul,
      TokenKind::Slash => BinaryOp::Div,
      _ => break,
    };
    stream.advance();
    let rhs = parse_unary(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_unary(stream: &mut TokenStream) -> ParseResult<Expr> {
  let op = match stream.peek_kind() {
    TokenKind::Bang => UnaryOp::Not,
    TokenKind::Minus => UnaryOp::Neg,
    TokenKind::Tilde => UnaryOp::BitNot,
    _ => return parse_call(stream),
  };
  stream.advance();
  let operand = stream.nested(parse_unary)?;
  Ok(Expr::unary(op, operand))
}

fn parse_call(stream: &mut TokenStream) -> ParseResult<Expr> {
  let mut node = parse_primary(stream)?;

  while stream.equal(TokenKind::LeftParen) {
    let mut arguments = Vec::new();
    if !stream.check(TokenKind::RightParen) {
      loop {
        if arguments.len() >= MAX_ARITY {
          return Err(stream.error("Can't have more than 255 arguments."));
        }
        arguments.push(parse_expr(stream)?);
        if !stream.equal(TokenKind::Comma) {
          break;
        }
      }
    }
    let paren = stream.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
    node = Expr::Call {
      callee: Box::new(node),
      paren,
      arguments,
    };
  }

  Ok(node)
}

fn parse_primary(stream: &mut TokenStream) -> ParseResult<Expr> {
  match stream.peek_kind() {
    TokenKind::False => {
      stream.advance();
      Ok(Expr::LiteralBool(false))
    }
    TokenKind::True => {
      stream.advance();
      Ok(Expr::LiteralBool(true))
    }
    TokenKind::In => {
      stream.advance();
      Ok(Expr::Input)
    }
    TokenKind::Number => Ok(Expr::LiteralNumber(stream.advance().lexeme)),
    TokenKind::String => Ok(Expr::LiteralString(stream.advance().lexeme)),
    TokenKind::Identifier => Ok(Expr::Variable(stream.advance())),
    TokenKind::LeftParen => {
      stream.advance();
      let node = parse_expr(stream)?;
      stream.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
      Ok(Expr::Grouping(Box::new(node)))
    }
    _ => Err(stream.error("Expect expression.")),
  }
}

/// Lightweight cursor over the token vector. The vector always ends in
/// `Eof`, and the cursor never moves past it.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
  depth: usize,
}

impl TokenStream {
  fn new(mut tokens: Vec<Token>) -> Self {
    if tokens.last().is_none_or(|token| token.kind != TokenKind::Eof) {
      let (line, column) = tokens
        .last()
        .map_or((1, 1), |token| (token.line, token.column));
      tokens.push(Token::new(TokenKind::Eof, "", line, column));
    }
    Self {
      tokens,
      pos: 0,
      depth: 0,
    }
  }

  /// Run `parse` one nesting level deeper, failing once `MAX_DEPTH` is hit.
  fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
    if self.depth >= MAX_DEPTH {
      return Err(self.error("Nesting too deep."));
    }
    self.depth += 1;
    let result = parse(self);
    self.depth -= 1;
    result
  }

  fn peek(&self) -> &Token {
    &self.tokens[self.pos.min(self.tokens.len() - 1)]
  }

  fn peek_kind(&self) -> TokenKind {
    self.peek().kind
  }

  fn check(&self, kind: TokenKind) -> bool {
    self.peek_kind() == kind
  }

  /// Return the current token and move past it (stays put on `Eof`).
  fn advance(&mut self) -> Token {
    let token = self.peek().clone();
    if token.kind != TokenKind::Eof {
      self.pos += 1;
    }
    token
  }

  /// Consume the current token if it has the given kind.
  fn equal(&mut self, kind: TokenKind) -> bool {
    if self.check(kind) {
      self.advance();
      return true;
    }
    false
  }

  fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
    if self.check(kind) {
      return Ok(self.advance());
    }
    Err(self.error(message))
  }

  fn error(&self, message: &str) -> SyntaxError {
    SyntaxError::at(self.peek(), message)
  }

  fn is_eof(&self) -> bool {
    self.check(TokenKind::Eof)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::tokenize;

  fn parse_src(source: &str) -> ParseResult<Vec<Stmt>> {
    parse(tokenize(source).unwrap())
  }

  fn expr_of(source: &str) -> Expr {
    match parse_src(source).unwrap().remove(0) {
      Stmt::Expression(expr) => expr,
      other => panic!("expected expression statement, got {other:?}"),
    }
  }

  #[test]
  fn factor_binds_tighter_than_term() {
    let expr = expr_of("1 + 2 * 3");
    let Expr::Binary { op, right, .. } = expr else {
      panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
  }

  #[test]
  fn bitwise_sits_between_term_and_comparison() {
    let expr = expr_of("a & b + 1 > c");
    let Expr::Binary { op, left, .. } = expr else {
      panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Gt);
    let Expr::Binary { op, right, .. } = *left else {
      panic!("expected bitwise");
    };
    assert_eq!(op, BinaryOp::BitAnd);
    assert!(matches!(*right, Expr::Binary { op: BinaryOp::Add, .. }));
  }

  #[test]
  fn assignment_is_right_associative() {
    let expr = expr_of("a = b = 3");
    let Expr::Assign { name, value } = expr else {
      panic!("expected assignment");
    };
    assert_eq!(name.lexeme, "a");
    assert!(matches!(*value, Expr::Assign { .. }));
  }

  #[test]
  fn assignment_target_must_be_a_variable() {
    let err = parse_src("1 = 2").unwrap_err();
    assert_eq!(err.to_string(), "1:3: Invalid assignment target. (got '=')");
  }

  #[test]
  fn semicolons_are_optional() {
    for source in ["var x = 1; out x;", "var x = 1 out x"] {
      let stmts = parse_src(source).unwrap();
      assert_eq!(stmts.len(), 2);
      assert!(matches!(&stmts[0], Stmt::Var { initializer: Some(_), .. }));
      assert!(matches!(&stmts[1], Stmt::Output(Expr::Variable(_))));
    }
  }

  #[test]
  fn for_accepts_empty_clauses() {
    let stmts = parse_src("for (;;) out 1").unwrap();
    let Stmt::For {
      initializer,
      condition,
      increment,
      ..
    } = &stmts[0]
    else {
      panic!("expected for");
    };
    assert!(initializer.is_none() && condition.is_none() && increment.is_none());
  }

  #[test]
  fn for_initializer_may_be_a_declaration() {
    let stmts = parse_src("for (var i = 0; i < 3; i = i + 1) { out i }").unwrap();
    let Stmt::For { initializer, .. } = &stmts[0] else {
      panic!("expected for");
    };
    assert!(matches!(initializer.as_deref(), Some(Stmt::Var { .. })));
  }

  #[test]
  fn dangling_else_binds_to_nearest_if() {
    let stmts = parse_src("if (a) if (b) out 1 else out 2").unwrap();
    let Stmt::If {
      then_branch,
      else_branch,
      ..
    } = &stmts[0]
    else {
      panic!("expected if");
    };
    assert!(else_branch.is_none());
    assert!(matches!(
      then_branch.as_ref(),
      Stmt::If {
        else_branch: Some(_),
        ..
      }
    ));
  }

  #[test]
  fn functions_and_returns_parse() {
    let stmts = parse_src("fun add(a, b) { return a + b; } add(1, 2)").unwrap();
    assert!(matches!(&stmts[0], Stmt::Function { params, .. } if params.len() == 2));
    assert!(matches!(
      &stmts[1],
      Stmt::Expression(Expr::Call { arguments, .. }) if arguments.len() == 2
    ));
  }

  #[test]
  fn bare_return_before_brace_has_no_value() {
    let stmts = parse_src("fun f() { return }").unwrap();
    let Stmt::Function { body, .. } = &stmts[0] else {
      panic!("expected function");
    };
    assert!(matches!(&body[0], Stmt::Return { value: None, .. }));
  }

  #[test]
  fn too_many_arguments_is_rejected() {
    let args = vec!["1"; 256].join(", ");
    let err = parse_src(&format!("f({args})")).unwrap_err();
    assert!(err.message.starts_with("Can't have more than 255 arguments."));
  }

  #[test]
  fn missing_paren_reports_location() {
    let err = parse_src("while (x out 1").unwrap_err();
    assert_eq!(err.line, 1);
    assert_eq!(err.column, 10);
    assert!(err.message.starts_with("Expect ')' after condition."));
  }

  #[test]
  fn unclosed_block_reports_end_of_input() {
    let err = parse_src("{ out 1").unwrap_err();
    assert_eq!(err.message, "Expect '}' after block. (at end of input)");
  }

  #[test]
  fn deep_grouping_is_an_error_not_a_crash() {
    let source = format!("out {}1{}", "(".repeat(20_000), ")".repeat(20_000));
    let err = parse_src(&source).unwrap_err();
    assert!(err.message.starts_with("Nesting too deep."));
  }

  #[test]
  fn moderate_nesting_still_parses() {
    let source = format!("out {}1{}", "(".repeat(50), ")".repeat(50));
    assert!(parse_src(&source).is_ok());
    assert!(parse_src(&format!("x = {}1", "-".repeat(50))).is_ok());
  }

  #[test]
  fn deep_unary_and_block_chains_are_capped() {
    let unary = parse_src(&format!("out {}1", "!".repeat(5_000))).unwrap_err();
    assert!(unary.message.starts_with("Nesting too deep."));

    let blocks = parse_src(&format!("{}{}", "{".repeat(5_000), "}".repeat(5_000))).unwrap_err();
    assert!(blocks.message.starts_with("Nesting too deep."));

    let ifs = parse_src(&format!("{}out 1", "if (1) ".repeat(5_000))).unwrap_err();
    assert!(ifs.message.starts_with("Nesting too deep."));
  }

  #[test]
  fn input_keyword_is_an_expression() {
    assert_eq!(expr_of("in"), Expr::Input);
  }
}
