//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be
//! evolved independently:
//! - `lexer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the syntax tree.
//! - `resolve` renames every variable to a globally unique symbol.
//! - `loops` labels loops and binds `break`/`continue` to them.
//! - `tacky` flattens the tree into linear three-address code.
//! - `codegen` lowers the IR to x86-64 instructions in three passes.
//! - `emit` serializes the final tree into AT&T assembly text.
//! - `error` centralises the reporting utilities shared by all stages.

pub mod asm;
pub mod ast;
pub mod codegen;
pub mod emit;
pub mod error;
pub mod lexer;
pub mod loops;
pub mod parser;
pub mod resolve;
pub mod tacky;

pub use error::{CompileError, CompileResult};

/// Compile a source string into AT&T assembly.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let tokens = lexer::tokenize(source)?;
  let program = parser::parse(tokens)?;
  let program = validate(program)?;
  let tacky = tacky::lower(&program);
  let asm = codegen::generate(&tacky)?;
  emit::emit(&asm)
}

/// Run both semantic passes over a freshly parsed program.
pub fn validate(mut program: ast::Program) -> CompileResult<ast::Program> {
  resolve::resolve(&mut program)?;
  loops::label_loops(&mut program)?;
  Ok(program)
}
