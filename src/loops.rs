//! Loop labeling: attaches a fresh label to every loop and binds each
//! `break` and `continue` to its innermost enclosing loop.
//!
//! The walk carries the label of the loop currently in scope (none at
//! function entry). Downstream lowering derives its jump targets from
//! these labels, so after this pass no control-transfer statement is left
//! unbound.

use crate::ast::{Block, BlockItem, Program, Statement, StmtKind};
use crate::error::{CompileError, CompileResult};

pub fn label_loops(program: &mut Program) -> CompileResult<()> {
  let mut labeler = LoopLabeler { counter: 0 };
  for function in &mut program.functions {
    labeler.label_block(&mut function.body, None)?;
  }
  Ok(())
}

struct LoopLabeler {
  counter: usize,
}

impl LoopLabeler {
  fn fresh_label(&mut self) -> String {
    let n = self.counter;
    self.counter += 1;
    format!("loop_{n}")
  }

  fn label_block(&mut self, block: &mut Block, current: Option<&str>) -> CompileResult<()> {
    for item in &mut block.items {
      if let BlockItem::Stmt(stmt) = item {
        self.label_statement(stmt, current)?;
      }
    }
    Ok(())
  }

  fn label_statement(&mut self, stmt: &mut Statement, current: Option<&str>) -> CompileResult<()> {
    match &mut stmt.kind {
      StmtKind::While { body, label, .. }
      | StmtKind::DoWhile { body, label, .. }
      | StmtKind::For { body, label, .. } => {
        let fresh = self.fresh_label();
        *label = Some(fresh.clone());
        self.label_statement(body, Some(&fresh))
      }
      StmtKind::If {
        then_branch,
        else_branch,
        ..
      } => {
        self.label_statement(then_branch, current)?;
        if let Some(else_branch) = else_branch {
          self.label_statement(else_branch, current)?;
        }
        Ok(())
      }
      StmtKind::Compound(block) => self.label_block(block, current),
      StmtKind::Break { label } => match current {
        Some(active) => {
          *label = Some(active.to_string());
          Ok(())
        }
        None => Err(CompileError::loop_labeling(
          stmt.line,
          "'break' outside of a loop",
        )),
      },
      StmtKind::Continue { label } => match current {
        Some(active) => {
          *label = Some(active.to_string());
          Ok(())
        }
        None => Err(CompileError::loop_labeling(
          stmt.line,
          "'continue' outside of a loop",
        )),
      },
      StmtKind::Return(_) | StmtKind::Expression(_) | StmtKind::Null => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::tokenize;
  use crate::parser::parse;

  fn label_source(source: &str) -> CompileResult<Program> {
    let mut program = parse(tokenize(source).expect("tokenize failed")).expect("parse failed");
    label_loops(&mut program)?;
    Ok(program)
  }

  fn first_statement(program: &Program) -> &Statement {
    match &program.functions[0].body.items[0] {
      BlockItem::Stmt(stmt) => stmt,
      other => panic!("expected statement, got {other:?}"),
    }
  }

  #[test]
  fn break_and_continue_bind_to_the_enclosing_loop() {
    let program = label_source(
      "int main(void) { while (1) { if (0) continue; break; } return 0; }",
    )
    .unwrap();
    let StmtKind::While { label, body, .. } = &first_statement(&program).kind else {
      panic!("expected while");
    };
    let loop_label = label.clone().expect("loop must be labeled");
    let StmtKind::Compound(block) = &body.kind else {
      panic!("expected compound body");
    };
    let BlockItem::Stmt(Statement {
      kind: StmtKind::If { then_branch, .. },
      ..
    }) = &block.items[0]
    else {
      panic!("expected if");
    };
    let StmtKind::Continue { label } = &then_branch.kind else {
      panic!("expected continue");
    };
    assert_eq!(label.as_deref(), Some(loop_label.as_str()));
    let BlockItem::Stmt(Statement {
      kind: StmtKind::Break { label },
      ..
    }) = &block.items[1]
    else {
      panic!("expected break");
    };
    assert_eq!(label.as_deref(), Some(loop_label.as_str()));
  }

  #[test]
  fn nested_loops_get_distinct_labels_and_bind_innermost() {
    let program = label_source(
      "int main(void) { while (1) { do { break; } while (0); } return 0; }",
    )
    .unwrap();
    let StmtKind::While {
      label: outer, body, ..
    } = &first_statement(&program).kind
    else {
      panic!("expected while");
    };
    let StmtKind::Compound(block) = &body.kind else {
      panic!("expected compound body");
    };
    let BlockItem::Stmt(Statement {
      kind: StmtKind::DoWhile {
        label: inner, body, ..
      },
      ..
    }) = &block.items[0]
    else {
      panic!("expected do-while");
    };
    assert_ne!(outer, inner);
    let StmtKind::Compound(block) = &body.kind else {
      panic!("expected compound body");
    };
    let BlockItem::Stmt(Statement {
      kind: StmtKind::Break { label },
      ..
    }) = &block.items[0]
    else {
      panic!("expected break");
    };
    // The break binds to the do-while, not the outer while.
    assert_eq!(label, inner);
  }

  #[test]
  fn for_loops_are_labeled() {
    let program = label_source("int main(void) { for (;;) break; return 0; }").unwrap();
    let StmtKind::For { label, body, .. } = &first_statement(&program).kind else {
      panic!("expected for");
    };
    assert!(label.as_deref().is_some_and(|l| l.starts_with("loop_")));
    let StmtKind::Break { label: bound } = &body.kind else {
      panic!("expected break");
    };
    assert_eq!(bound, label);
  }

  #[test]
  fn break_outside_any_loop_is_rejected() {
    let err = label_source("int main(void) {\n break;\n return 0; }").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("'break' outside of a loop"));
    assert!(message.contains("line 2"));
  }

  #[test]
  fn continue_outside_any_loop_is_rejected() {
    let err = label_source("int main(void) { continue; return 0; }").unwrap_err();
    assert!(err.to_string().contains("'continue' outside of a loop"));
  }

  #[test]
  fn break_in_if_inside_loop_is_accepted() {
    assert!(label_source("int main(void) { while (1) if (1) break; return 0; }").is_ok());
  }

  #[test]
  fn statement_after_loop_is_outside_it() {
    let err = label_source("int main(void) { while (1) ; break; return 0; }").unwrap_err();
    assert!(err.to_string().contains("'break' outside of a loop"));
  }
}
