//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The lexer is intentionally simple – a single byte-index loop with
//! longest-match operator recognition. Multi-character operators are matched
//! before single-character ones to avoid ambiguity. Comments and
//! preprocessor lines are discarded here; everything downstream sees only
//! meaningful tokens, each carrying the 1-based line it started on.

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
  // Keywords.
  Return,
  If,
  Else,
  While,
  Do,
  For,
  Break,
  Continue,
  Int,
  Void,
  // Punctuation.
  LParen,
  RParen,
  LBrace,
  RBrace,
  Semicolon,
  Comma,
  // Operators.
  Plus,
  Minus,
  Star,
  Slash,
  Percent,
  Tilde,
  Bang,
  Assign,
  EqEq,
  BangEq,
  Less,
  LessEq,
  Greater,
  GreaterEq,
  AmpAmp,
  PipePipe,
  Question,
  Colon,
  Amp,
  Pipe,
  Caret,
  LessLess,
  GreaterGreater,
  PlusEq,
  MinusEq,
  StarEq,
  SlashEq,
  PercentEq,
  // Literals and names.
  Constant(i32),
  Identifier(String),
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub line: u32,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32) -> Self {
    Self {
      kind,
      lexeme: lexeme.into(),
      line,
    }
  }
}

/// Multi-character operators, matched before their single-character prefixes.
const TWO_CHAR_OPERATORS: [(&str, TokenKind); 13] = [
  ("==", TokenKind::EqEq),
  ("!=", TokenKind::BangEq),
  ("<=", TokenKind::LessEq),
  (">=", TokenKind::GreaterEq),
  ("&&", TokenKind::AmpAmp),
  ("||", TokenKind::PipePipe),
  ("<<", TokenKind::LessLess),
  (">>", TokenKind::GreaterGreater),
  ("+=", TokenKind::PlusEq),
  ("-=", TokenKind::MinusEq),
  ("*=", TokenKind::StarEq),
  ("/=", TokenKind::SlashEq),
  ("%=", TokenKind::PercentEq),
];

/// Lex the input into a flat vector of tokens.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut line: u32 = 1;
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];

    if c == b'\n' {
      line += 1;
      i += 1;
      continue;
    }
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    // Preprocessor lines and line comments both run to end of line.
    if c == b'#' || input[i..].starts_with("//") {
      while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
      }
      continue;
    }

    if input[i..].starts_with("/*") {
      let opened_on = line;
      i += 2;
      loop {
        if i + 1 >= bytes.len() {
          return Err(CompileError::lex(opened_on, "unterminated block comment"));
        }
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
          i += 2;
          break;
        }
        if bytes[i] == b'\n' {
          line += 1;
        }
        i += 1;
      }
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      // A constant must not run straight into an identifier character.
      if i < bytes.len() && (bytes[i].is_ascii_alphabetic() || bytes[i] == b'_') {
        return Err(CompileError::lex(
          line,
          format!("invalid character in constant: '{}'", bytes[i] as char),
        ));
      }
      let text = &input[start..i];
      let value = text
        .parse::<i32>()
        .map_err(|_| CompileError::lex(line, format!("constant out of range: {text}")))?;
      tokens.push(Token::new(TokenKind::Constant(value), text, line));
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      i += 1;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      let text = &input[start..i];
      tokens.push(Token::new(keyword_or_identifier(text), text, line));
      continue;
    }

    if let Some((op, kind)) = TWO_CHAR_OPERATORS
      .iter()
      .find(|(op, _)| input[i..].starts_with(op))
    {
      tokens.push(Token::new(kind.clone(), *op, line));
      i += op.len();
      continue;
    }

    if let Some(kind) = single_char_kind(c) {
      tokens.push(Token::new(kind, &input[i..i + 1], line));
      i += 1;
      continue;
    }

    let invalid = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::lex(
      line,
      format!("unrecognised character '{invalid}'"),
    ));
  }

  Ok(tokens)
}

fn keyword_or_identifier(text: &str) -> TokenKind {
  match text {
    "return" => TokenKind::Return,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "do" => TokenKind::Do,
    "for" => TokenKind::For,
    "break" => TokenKind::Break,
    "continue" => TokenKind::Continue,
    "int" => TokenKind::Int,
    "void" => TokenKind::Void,
    _ => TokenKind::Identifier(text.to_string()),
  }
}

fn single_char_kind(c: u8) -> Option<TokenKind> {
  let kind = match c {
    b'(' => TokenKind::LParen,
    b')' => TokenKind::RParen,
    b'{' => TokenKind::LBrace,
    b'}' => TokenKind::RBrace,
    b';' => TokenKind::Semicolon,
    b',' => TokenKind::Comma,
    b'+' => TokenKind::Plus,
    b'-' => TokenKind::Minus,
    b'*' => TokenKind::Star,
    b'/' => TokenKind::Slash,
    b'%' => TokenKind::Percent,
    b'~' => TokenKind::Tilde,
    b'!' => TokenKind::Bang,
    b'=' => TokenKind::Assign,
    b'<' => TokenKind::Less,
    b'>' => TokenKind::Greater,
    b'&' => TokenKind::Amp,
    b'|' => TokenKind::Pipe,
    b'^' => TokenKind::Caret,
    b'?' => TokenKind::Question,
    b':' => TokenKind::Colon,
    _ => return None,
  };
  Some(kind)
}

/// Human-friendly rendering of a token kind, used in parser diagnostics.
pub fn describe_kind(kind: &TokenKind) -> String {
  let text = match kind {
    TokenKind::Return => "return",
    TokenKind::If => "if",
    TokenKind::Else => "else",
    TokenKind::While => "while",
    TokenKind::Do => "do",
    TokenKind::For => "for",
    TokenKind::Break => "break",
    TokenKind::Continue => "continue",
    TokenKind::Int => "int",
    TokenKind::Void => "void",
    TokenKind::LParen => "(",
    TokenKind::RParen => ")",
    TokenKind::LBrace => "{",
    TokenKind::RBrace => "}",
    TokenKind::Semicolon => ";",
    TokenKind::Comma => ",",
    TokenKind::Plus => "+",
    TokenKind::Minus => "-",
    TokenKind::Star => "*",
    TokenKind::Slash => "/",
    TokenKind::Percent => "%",
    TokenKind::Tilde => "~",
    TokenKind::Bang => "!",
    TokenKind::Assign => "=",
    TokenKind::EqEq => "==",
    TokenKind::BangEq => "!=",
    TokenKind::Less => "<",
    TokenKind::LessEq => "<=",
    TokenKind::Greater => ">",
    TokenKind::GreaterEq => ">=",
    TokenKind::AmpAmp => "&&",
    TokenKind::PipePipe => "||",
    TokenKind::Question => "?",
    TokenKind::Colon => ":",
    TokenKind::Amp => "&",
    TokenKind::Pipe => "|",
    TokenKind::Caret => "^",
    TokenKind::LessLess => "<<",
    TokenKind::GreaterGreater => ">>",
    TokenKind::PlusEq => "+=",
    TokenKind::MinusEq => "-=",
    TokenKind::StarEq => "*=",
    TokenKind::SlashEq => "/=",
    TokenKind::PercentEq => "%=",
    TokenKind::Constant(_) => return "a constant".to_string(),
    TokenKind::Identifier(_) => return "an identifier".to_string(),
  };
  format!("'{text}'")
}

/// Human-friendly description of a token, used in parser diagnostics.
pub fn describe_token(token: Option<&Token>) -> String {
  match token {
    Some(t) => format!("'{}'", t.lexeme),
    None => "end of file".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(input: &str) -> Vec<TokenKind> {
    tokenize(input)
      .expect("tokenize failed")
      .into_iter()
      .map(|t| t.kind)
      .collect()
  }

  #[test]
  fn lexes_a_minimal_function() {
    assert_eq!(
      kinds("int main(void) { return 2; }"),
      vec![
        TokenKind::Int,
        TokenKind::Identifier("main".to_string()),
        TokenKind::LParen,
        TokenKind::Void,
        TokenKind::RParen,
        TokenKind::LBrace,
        TokenKind::Return,
        TokenKind::Constant(2),
        TokenKind::Semicolon,
        TokenKind::RBrace,
      ]
    );
  }

  #[test]
  fn lexes_all_keywords() {
    assert_eq!(
      kinds("return if else while do for break continue int void"),
      vec![
        TokenKind::Return,
        TokenKind::If,
        TokenKind::Else,
        TokenKind::While,
        TokenKind::Do,
        TokenKind::For,
        TokenKind::Break,
        TokenKind::Continue,
        TokenKind::Int,
        TokenKind::Void,
      ]
    );
  }

  #[test]
  fn prefers_longest_operator_match() {
    assert_eq!(
      kinds("<= < << = == != ! >= > >> += -= *= /= %="),
      vec![
        TokenKind::LessEq,
        TokenKind::Less,
        TokenKind::LessLess,
        TokenKind::Assign,
        TokenKind::EqEq,
        TokenKind::BangEq,
        TokenKind::Bang,
        TokenKind::GreaterEq,
        TokenKind::Greater,
        TokenKind::GreaterGreater,
        TokenKind::PlusEq,
        TokenKind::MinusEq,
        TokenKind::StarEq,
        TokenKind::SlashEq,
        TokenKind::PercentEq,
      ]
    );
  }

  #[test]
  fn lexes_bitwise_and_logical_forms() {
    assert_eq!(
      kinds("& && | || ^ ~ ? :"),
      vec![
        TokenKind::Amp,
        TokenKind::AmpAmp,
        TokenKind::Pipe,
        TokenKind::PipePipe,
        TokenKind::Caret,
        TokenKind::Tilde,
        TokenKind::Question,
        TokenKind::Colon,
      ]
    );
  }

  #[test]
  fn tracks_line_numbers() {
    let tokens = tokenize("int a;\nint b;\n\nint c;").expect("tokenize failed");
    let lines: Vec<u32> = tokens.iter().map(|t| t.line).collect();
    assert_eq!(lines, vec![1, 1, 1, 2, 2, 2, 4, 4, 4]);
  }

  #[test]
  fn strips_comments_and_preprocessor_lines() {
    let tokens = tokenize("#include <stdio.h>\n// nothing\nint /* a\nb */ x;").unwrap();
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind.clone()).collect();
    assert_eq!(
      kinds,
      vec![
        TokenKind::Int,
        TokenKind::Identifier("x".to_string()),
        TokenKind::Semicolon,
      ]
    );
    // The block comment spans a newline, so `x` sits on line 4.
    assert_eq!(tokens[1].line, 4);
  }

  #[test]
  fn rejects_unterminated_block_comment() {
    let err = tokenize("int x; /* oops").unwrap_err();
    assert!(err.to_string().contains("unterminated block comment"));
  }

  #[test]
  fn rejects_constant_running_into_identifier() {
    assert!(tokenize("int x = 12ab;").is_err());
  }

  #[test]
  fn rejects_out_of_range_constant() {
    assert!(tokenize("int x = 99999999999;").is_err());
    assert!(tokenize("int x = 2147483647;").is_ok());
  }

  #[test]
  fn rejects_unrecognised_character() {
    let err = tokenize("int x = $;").unwrap_err();
    assert!(err.to_string().contains('$'));
    assert!(err.to_string().contains("line 1"));
  }

  #[test]
  fn keeps_lexemes_verbatim() {
    let tokens = tokenize("count >= 10").unwrap();
    let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
    assert_eq!(lexemes, vec!["count", ">=", "10"]);
  }
}
