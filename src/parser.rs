//! Recursive-descent parser producing the syntax tree.
//!
//! Statements and declarations descend the grammar directly; expressions go
//! through a single precedence-climbing loop driven by a fixed operator
//! table. `=` and `?:` are right-associative, everything else is left.
//! Sequencing lives in `Block`, so the statement layer stays thin and easy
//! to extend with further statement kinds.

use crate::ast::{
  BinaryOp, Block, BlockItem, Declaration, Expr, ForInit, Function, Program, Statement, StmtKind,
  UnaryOp,
};
#[cfg(test)]
use crate::ast::ExprKind;
use crate::error::{CompileError, CompileResult};
use crate::lexer::{Token, TokenKind, describe_kind, describe_token};

/// Parse a whole translation unit: one or more function definitions.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens);

  if stream.is_eof() {
    return Err(CompileError::parse(
      stream.line(),
      "a function definition",
      "end of file",
    ));
  }

  let mut functions = Vec::new();
  while !stream.is_eof() {
    functions.push(parse_function(&mut stream)?);
  }

  Ok(Program { functions })
}

/// `int IDENT ( void ) { block }`
fn parse_function(stream: &mut TokenStream) -> CompileResult<Function> {
  let line = stream.line();
  stream.skip(&TokenKind::Int)?;
  let (name, _) = stream.get_identifier()?;
  stream.skip(&TokenKind::LParen)?;
  stream.skip(&TokenKind::Void)?;
  stream.skip(&TokenKind::RParen)?;
  let body = parse_block(stream)?;

  Ok(Function { name, body, line })
}

// ----- Statement parsing -----

fn parse_block(stream: &mut TokenStream) -> CompileResult<Block> {
  stream.skip(&TokenKind::LBrace)?;

  let mut items = Vec::new();
  while !stream.peek_is(&TokenKind::RBrace) {
    if stream.is_eof() {
      return Err(CompileError::parse(stream.line(), "'}'", "end of file"));
    }
    items.push(parse_block_item(stream)?);
  }
  stream.skip(&TokenKind::RBrace)?;

  Ok(Block { items })
}

fn parse_block_item(stream: &mut TokenStream) -> CompileResult<BlockItem> {
  if stream.peek_is(&TokenKind::Int) {
    Ok(BlockItem::Decl(parse_declaration(stream)?))
  } else {
    Ok(BlockItem::Stmt(parse_statement(stream)?))
  }
}

/// `int IDENT [= expr] ;`
fn parse_declaration(stream: &mut TokenStream) -> CompileResult<Declaration> {
  let line = stream.line();
  stream.skip(&TokenKind::Int)?;
  let (name, _) = stream.get_identifier()?;

  let init = if stream.equal(&TokenKind::Assign) {
    Some(parse_expr(stream, 0)?)
  } else {
    None
  };
  stream.skip(&TokenKind::Semicolon)?;

  Ok(Declaration { name, init, line })
}

fn parse_statement(stream: &mut TokenStream) -> CompileResult<Statement> {
  let line = stream.line();
  match stream.peek_kind() {
    Some(TokenKind::Return) => {
      stream.advance();
      let expr = parse_expr(stream, 0)?;
      stream.skip(&TokenKind::Semicolon)?;
      Ok(Statement::new(StmtKind::Return(expr), line))
    }
    Some(TokenKind::Semicolon) => {
      stream.advance();
      Ok(Statement::new(StmtKind::Null, line))
    }
    Some(TokenKind::If) => parse_if(stream),
    Some(TokenKind::LBrace) => {
      let block = parse_block(stream)?;
      Ok(Statement::new(StmtKind::Compound(block), line))
    }
    Some(TokenKind::While) => parse_while(stream),
    Some(TokenKind::Do) => parse_do_while(stream),
    Some(TokenKind::For) => parse_for(stream),
    Some(TokenKind::Break) => {
      stream.advance();
      stream.skip(&TokenKind::Semicolon)?;
      Ok(Statement::new(StmtKind::Break { label: None }, line))
    }
    Some(TokenKind::Continue) => {
      stream.advance();
      stream.skip(&TokenKind::Semicolon)?;
      Ok(Statement::new(StmtKind::Continue { label: None }, line))
    }
    _ => {
      let expr = parse_expr(stream, 0)?;
      stream.skip(&TokenKind::Semicolon)?;
      Ok(Statement::new(StmtKind::Expression(expr), line))
    }
  }
}

fn parse_if(stream: &mut TokenStream) -> CompileResult<Statement> {
  let line = stream.line();
  stream.skip(&TokenKind::If)?;
  stream.skip(&TokenKind::LParen)?;
  let cond = parse_expr(stream, 0)?;
  stream.skip(&TokenKind::RParen)?;
  let then_branch = Box::new(parse_statement(stream)?);
  let else_branch = if stream.equal(&TokenKind::Else) {
    Some(Box::new(parse_statement(stream)?))
  } else {
    None
  };

  Ok(Statement::new(
    StmtKind::If {
      cond,
      then_branch,
      else_branch,
    },
    line,
  ))
}

fn parse_while(stream: &mut TokenStream) -> CompileResult<Statement> {
  let line = stream.line();
  stream.skip(&TokenKind::While)?;
  stream.skip(&TokenKind::LParen)?;
  let cond = parse_expr(stream, 0)?;
  stream.skip(&TokenKind::RParen)?;
  let body = Box::new(parse_statement(stream)?);

  Ok(Statement::new(
    StmtKind::While {
      cond,
      body,
      label: None,
    },
    line,
  ))
}

fn parse_do_while(stream: &mut TokenStream) -> CompileResult<Statement> {
  let line = stream.line();
  stream.skip(&TokenKind::Do)?;
  let body = Box::new(parse_statement(stream)?);
  stream.skip(&TokenKind::While)?;
  stream.skip(&TokenKind::LParen)?;
  let cond = parse_expr(stream, 0)?;
  stream.skip(&TokenKind::RParen)?;
  stream.skip(&TokenKind::Semicolon)?;

  Ok(Statement::new(
    StmtKind::DoWhile {
      body,
      cond,
      label: None,
    },
    line,
  ))
}

fn parse_for(stream: &mut TokenStream) -> CompileResult<Statement> {
  let line = stream.line();
  stream.skip(&TokenKind::For)?;
  stream.skip(&TokenKind::LParen)?;

  // A declaration consumes its own terminating semicolon.
  let init = if stream.equal(&TokenKind::Semicolon) {
    ForInit::Empty
  } else if stream.peek_is(&TokenKind::Int) {
    ForInit::Decl(parse_declaration(stream)?)
  } else {
    let expr = parse_expr(stream, 0)?;
    stream.skip(&TokenKind::Semicolon)?;
    ForInit::Expr(expr)
  };

  let cond = if stream.peek_is(&TokenKind::Semicolon) {
    None
  } else {
    Some(parse_expr(stream, 0)?)
  };
  stream.skip(&TokenKind::Semicolon)?;

  let post = if stream.peek_is(&TokenKind::RParen) {
    None
  } else {
    Some(parse_expr(stream, 0)?)
  };
  stream.skip(&TokenKind::RParen)?;

  let body = Box::new(parse_statement(stream)?);

  Ok(Statement::new(
    StmtKind::For {
      init,
      cond,
      post,
      body,
      label: None,
    },
    line,
  ))
}

// ----- Expression parsing -----

/// Binding power of a binary (or binary-like) operator token. Tokens the
/// grammar does not treat as infix operators have none, which includes the
/// lexed-but-unsupported bitwise, shift, and compound-assignment forms.
fn binary_precedence(kind: &TokenKind) -> Option<u8> {
  let prec = match kind {
    TokenKind::Assign => 1,
    TokenKind::Question => 3,
    TokenKind::PipePipe => 5,
    TokenKind::AmpAmp => 10,
    TokenKind::EqEq | TokenKind::BangEq => 30,
    TokenKind::Less | TokenKind::LessEq | TokenKind::Greater | TokenKind::GreaterEq => 35,
    TokenKind::Plus | TokenKind::Minus => 45,
    TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 50,
    _ => return None,
  };
  Some(prec)
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
  let op = match kind {
    TokenKind::PipePipe => BinaryOp::Or,
    TokenKind::AmpAmp => BinaryOp::And,
    TokenKind::EqEq => BinaryOp::Equal,
    TokenKind::BangEq => BinaryOp::NotEqual,
    TokenKind::Less => BinaryOp::LessThan,
    TokenKind::LessEq => BinaryOp::LessOrEqual,
    TokenKind::Greater => BinaryOp::GreaterThan,
    TokenKind::GreaterEq => BinaryOp::GreaterOrEqual,
    TokenKind::Plus => BinaryOp::Add,
    TokenKind::Minus => BinaryOp::Subtract,
    TokenKind::Star => BinaryOp::Multiply,
    TokenKind::Slash => BinaryOp::Divide,
    TokenKind::Percent => BinaryOp::Remainder,
    _ => return None,
  };
  Some(op)
}

/// Precedence climbing: parse a factor, then fold in operators that bind at
/// least as tightly as `min_prec`.
fn parse_expr(stream: &mut TokenStream, min_prec: u8) -> CompileResult<Expr> {
  let mut left = parse_factor(stream)?;

  loop {
    let Some(kind) = stream.peek_kind().cloned() else {
      break;
    };
    let Some(prec) = binary_precedence(&kind) else {
      break;
    };
    if prec < min_prec {
      break;
    }
    stream.advance();

    let line = left.line;
    left = match kind {
      // Right-associative: recurse at the same precedence.
      TokenKind::Assign => {
        let rvalue = parse_expr(stream, prec)?;
        Expr::assignment(left, rvalue, line)
      }
      // The middle of `?:` parses as if parenthesized; the else arm is
      // right-associative like assignment.
      TokenKind::Question => {
        let then_expr = parse_expr(stream, 0)?;
        stream.skip(&TokenKind::Colon)?;
        let else_expr = parse_expr(stream, prec)?;
        Expr::conditional(left, then_expr, else_expr, line)
      }
      _ => {
        let op = match binary_op(&kind) {
          Some(op) => op,
          None => break,
        };
        let right = parse_expr(stream, prec + 1)?;
        Expr::binary(op, left, right, line)
      }
    };
  }

  Ok(left)
}

/// A factor is a constant, a parenthesized expression, a prefix unary
/// applied to a factor, or a variable reference.
fn parse_factor(stream: &mut TokenStream) -> CompileResult<Expr> {
  let line = stream.line();
  match stream.peek_kind() {
    Some(TokenKind::Constant(_)) => {
      let (value, line) = stream.get_constant()?;
      Ok(Expr::constant(value, line))
    }
    Some(TokenKind::Identifier(_)) => {
      let (name, line) = stream.get_identifier()?;
      Ok(Expr::var(name, line))
    }
    Some(TokenKind::LParen) => {
      stream.advance();
      let inner = parse_expr(stream, 0)?;
      stream.skip(&TokenKind::RParen)?;
      Ok(inner)
    }
    Some(TokenKind::Minus) => {
      stream.advance();
      let operand = parse_factor(stream)?;
      Ok(Expr::unary(UnaryOp::Negate, operand, line))
    }
    Some(TokenKind::Tilde) => {
      stream.advance();
      let operand = parse_factor(stream)?;
      Ok(Expr::unary(UnaryOp::Complement, operand, line))
    }
    Some(TokenKind::Bang) => {
      stream.advance();
      let operand = parse_factor(stream)?;
      Ok(Expr::unary(UnaryOp::Not, operand, line))
    }
    _ => Err(CompileError::parse(
      line,
      "an expression",
      stream.describe_current(),
    )),
  }
}

/// Lightweight cursor over the token vector.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
  last_line: u32,
}

impl TokenStream {
  fn new(tokens: Vec<Token>) -> Self {
    let last_line = tokens.last().map(|t| t.line).unwrap_or(1);
    Self {
      tokens,
      pos: 0,
      last_line,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn peek_kind(&self) -> Option<&TokenKind> {
    self.peek().map(|t| &t.kind)
  }

  fn peek_is(&self, kind: &TokenKind) -> bool {
    self.peek_kind() == Some(kind)
  }

  /// Line of the current token, or of the last token once input runs out.
  fn line(&self) -> u32 {
    self.peek().map(|t| t.line).unwrap_or(self.last_line)
  }

  fn advance(&mut self) {
    if self.pos < self.tokens.len() {
      self.pos += 1;
    }
  }

  /// Consume the current token if it matches.
  fn equal(&mut self, kind: &TokenKind) -> bool {
    if self.peek_is(kind) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, kind: &TokenKind) -> CompileResult<()> {
    if self.equal(kind) {
      Ok(())
    } else {
      Err(CompileError::parse(
        self.line(),
        describe_kind(kind),
        self.describe_current(),
      ))
    }
  }

  /// Parse the current token as an integer constant, yielding value and line.
  fn get_constant(&mut self) -> CompileResult<(i32, u32)> {
    if let Some(token) = self.peek()
      && let TokenKind::Constant(value) = token.kind
    {
      let line = token.line;
      self.pos += 1;
      return Ok((value, line));
    }
    Err(CompileError::parse(
      self.line(),
      "a constant",
      self.describe_current(),
    ))
  }

  /// Parse the current token as an identifier, yielding name and line.
  fn get_identifier(&mut self) -> CompileResult<(String, u32)> {
    if let Some(token) = self.peek()
      && let TokenKind::Identifier(name) = &token.kind
    {
      let name = name.clone();
      let line = token.line;
      self.pos += 1;
      return Ok((name, line));
    }
    Err(CompileError::parse(
      self.line(),
      "an identifier",
      self.describe_current(),
    ))
  }

  fn describe_current(&self) -> String {
    describe_token(self.peek())
  }

  fn is_eof(&self) -> bool {
    self.pos >= self.tokens.len()
  }
}
