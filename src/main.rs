//! Command-line driver: runs the full pipeline, or stops after a requested
//! stage and dumps that stage's tree for inspection.
//!
//! The output file is written only once every pass has succeeded, so a
//! failing compilation never leaves a partial artifact behind.

use clap::Parser;
use nanocc::{CompileResult, codegen, emit, lexer, parser, tacky};
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Debug, clap::Parser)]
#[clap(author, version, about)]
struct Args {
  /// Source file to compile
  input: PathBuf,

  /// Output file for the generated assembly
  #[clap(short, long, default_value = "out.asm")]
  output: PathBuf,

  /// Stop after lexing and dump the token stream
  #[clap(long)]
  lex: bool,

  /// Stop after parsing and dump the syntax tree
  #[clap(long)]
  parse: bool,

  /// Stop after the semantic passes and dump the rewritten tree
  #[clap(long)]
  validate: bool,

  /// Stop after IR generation and dump the three-address code
  #[clap(long)]
  tacky: bool,

  /// Stop after code generation and dump the instruction tree
  #[clap(long)]
  codegen: bool,
}

fn main() {
  let args = Args::parse();

  let source = match fs::read_to_string(&args.input) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("failed to read {}: {err}", args.input.display());
      process::exit(1);
    }
  };

  match run(&args, &source) {
    Ok(Some(assembly)) => {
      if let Err(err) = fs::write(&args.output, assembly) {
        eprintln!("failed to write {}: {err}", args.output.display());
        process::exit(1);
      }
    }
    Ok(None) => {}
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}

/// Run the pipeline up to the requested stage. Yields the assembly text
/// when the whole pipeline ran, or nothing after a stage dump.
fn run(args: &Args, source: &str) -> CompileResult<Option<String>> {
  let tokens = lexer::tokenize(source)?;
  if args.lex {
    println!("{tokens:#?}");
    return Ok(None);
  }

  let program = parser::parse(tokens)?;
  if args.parse {
    println!("{program:#?}");
    return Ok(None);
  }

  let program = nanocc::validate(program)?;
  if args.validate {
    println!("{program:#?}");
    return Ok(None);
  }

  let tacky = tacky::lower(&program);
  if args.tacky {
    println!("{tacky:#?}");
    return Ok(None);
  }

  let asm = codegen::generate(&tacky)?;
  if args.codegen {
    println!("{asm:#?}");
    return Ok(None);
  }

  Ok(Some(emit::emit(&asm)?))
}
