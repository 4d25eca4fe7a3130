//! Shared error utilities used across the compilation pipeline.
//!
//! Every failure is fatal: the driver renders the diagnostic to stderr and
//! exits non-zero. Each variant names the stage that rejected the input, so
//! a one-line message is enough to locate the problem.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("lex error at line {line}: {message}"))]
  Lex { line: u32, message: String },

  #[snafu(display("parse error at line {line}: expected {expected}, found {found}"))]
  Parse {
    line: u32,
    expected: String,
    found: String,
  },

  #[snafu(display("semantic error at line {line}: {message}"))]
  Resolution { line: u32, message: String },

  #[snafu(display("semantic error at line {line}: {message}"))]
  LoopLabeling { line: u32, message: String },

  #[snafu(display("codegen error: {message}"))]
  Codegen { message: String },

  #[snafu(display("emission error: {message}"))]
  Emission { message: String },
}

impl CompileError {
  /// Lexical error anchored at a source line.
  pub fn lex(line: u32, message: impl Into<String>) -> Self {
    Self::Lex {
      line,
      message: message.into(),
    }
  }

  /// Syntax error recording what the parser wanted against what it saw.
  pub fn parse(line: u32, expected: impl Into<String>, found: impl Into<String>) -> Self {
    Self::Parse {
      line,
      expected: expected.into(),
      found: found.into(),
    }
  }

  pub fn resolution(line: u32, message: impl Into<String>) -> Self {
    Self::Resolution {
      line,
      message: message.into(),
    }
  }

  pub fn loop_labeling(line: u32, message: impl Into<String>) -> Self {
    Self::LoopLabeling {
      line,
      message: message.into(),
    }
  }

  pub fn codegen(message: impl Into<String>) -> Self {
    Self::Codegen {
      message: message.into(),
    }
  }

  pub fn emission(message: impl Into<String>) -> Self {
    Self::Emission {
      message: message.into(),
    }
  }
}
