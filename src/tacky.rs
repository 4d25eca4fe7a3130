//! Three-address code: the linear IR between the syntax tree and the
//! backend.
//!
//! Each function lowers to a flat instruction list. Expressions flatten in
//! post-order into compiler temporaries; `&&`, `||`, and `?:` desugar into
//! explicit jumps; loops desugar against the labels the labeling pass
//! attached. Temporaries live in the `temp.v<n>` namespace, which no
//! source identifier or renamed variable can collide with.

use crate::ast;
use crate::ast::{BlockItem, ExprKind, ForInit, StmtKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Constant(i32),
  Var(String),
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
  Equal,
  NotEqual,
  LessThan,
  LessOrEqual,
  GreaterThan,
  GreaterOrEqual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
  Return(Value),
  Unary {
    op: UnaryOp,
    src: Value,
    dst: Value,
  },
  Binary {
    op: BinaryOp,
    src1: Value,
    src2: Value,
    dst: Value,
  },
  Copy {
    src: Value,
    dst: Value,
  },
  Jump(String),
  JumpIfZero {
    cond: Value,
    target: String,
  },
  JumpIfNotZero {
    cond: Value,
    target: String,
  },
  Label(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
  pub name: String,
  pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
  pub functions: Vec<Function>,
}

/// Lower a resolved, loop-labeled program.
pub fn lower(program: &ast::Program) -> Program {
  Program {
    functions: program.functions.iter().map(lower_function).collect(),
  }
}

fn lower_function(function: &ast::Function) -> Function {
  let mut lowering = FunctionLowering::new();
  lowering.lower_block(&function.body);
  Function {
    name: function.name.clone(),
    instructions: lowering.instructions,
  }
}

/// Per-function lowering state. Temp and label counters are owned here and
/// reset with each function, so names are unique within the function.
struct FunctionLowering {
  instructions: Vec<Instruction>,
  temp_counter: usize,
  label_counter: usize,
}

impl FunctionLowering {
  fn new() -> Self {
    Self {
      instructions: Vec::new(),
      temp_counter: 0,
      label_counter: 0,
    }
  }

  fn fresh_temp(&mut self) -> Value {
    let n = self.temp_counter;
    self.temp_counter += 1;
    Value::Var(format!("temp.v{n}"))
  }

  fn fresh_label(&mut self, prefix: &str) -> String {
    let n = self.label_counter;
    self.label_counter += 1;
    format!("{prefix}_{n}")
  }

  fn push(&mut self, instruction: Instruction) {
    self.instructions.push(instruction);
  }

  fn lower_block(&mut self, block: &ast::Block) {
    for item in &block.items {
      match item {
        BlockItem::Decl(decl) => self.lower_declaration(decl),
        BlockItem::Stmt(stmt) => self.lower_statement(stmt),
      }
    }
  }

  fn lower_declaration(&mut self, decl: &ast::Declaration) {
    // A declaration without an initializer reserves its slot lazily; the
    // backend materializes storage on first use.
    if let Some(init) = &decl.init {
      let value = self.lower_expr(init);
      self.push(Instruction::Copy {
        src: value,
        dst: Value::Var(decl.name.clone()),
      });
    }
  }

  fn lower_statement(&mut self, stmt: &ast::Statement) {
    match &stmt.kind {
      StmtKind::Return(expr) => {
        let value = self.lower_expr(expr);
        self.push(Instruction::Return(value));
      }
      StmtKind::Expression(expr) => {
        let _ = self.lower_expr(expr);
      }
      StmtKind::If {
        cond,
        then_branch,
        else_branch,
      } => self.lower_if(cond, then_branch, else_branch.as_deref()),
      StmtKind::Compound(block) => self.lower_block(block),
      StmtKind::While { cond, body, label } => {
        let label = expect_label(label);
        let continue_label = format!("{label}_continue");
        let break_label = format!("{label}_break");
        self.push(Instruction::Label(continue_label.clone()));
        let cond = self.lower_expr(cond);
        self.push(Instruction::JumpIfZero {
          cond,
          target: break_label.clone(),
        });
        self.lower_statement(body);
        self.push(Instruction::Jump(continue_label));
        self.push(Instruction::Label(break_label));
      }
      StmtKind::DoWhile { body, cond, label } => {
        let label = expect_label(label);
        let start_label = format!("{label}_start");
        self.push(Instruction::Label(start_label.clone()));
        self.lower_statement(body);
        self.push(Instruction::Label(format!("{label}_continue")));
        let cond = self.lower_expr(cond);
        self.push(Instruction::JumpIfNotZero {
          cond,
          target: start_label,
        });
        self.push(Instruction::Label(format!("{label}_break")));
      }
      StmtKind::For {
        init,
        cond,
        post,
        body,
        label,
      } => {
        let label = expect_label(label);
        let start_label = format!("{label}_start");
        let break_label = format!("{label}_break");
        match init {
          ForInit::Decl(decl) => self.lower_declaration(decl),
          ForInit::Expr(expr) => {
            let _ = self.lower_expr(expr);
          }
          ForInit::Empty => {}
        }
        self.push(Instruction::Label(start_label.clone()));
        // No condition means no guarded exit; the loop behaves as if the
        // condition were the constant 1.
        if let Some(cond) = cond {
          let cond = self.lower_expr(cond);
          self.push(Instruction::JumpIfZero {
            cond,
            target: break_label.clone(),
          });
        }
        self.lower_statement(body);
        self.push(Instruction::Label(format!("{label}_continue")));
        if let Some(post) = post {
          let _ = self.lower_expr(post);
        }
        self.push(Instruction::Jump(start_label));
        self.push(Instruction::Label(break_label));
      }
      StmtKind::Break { label } => {
        let label = expect_label(label);
        self.push(Instruction::Jump(format!("{label}_break")));
      }
      StmtKind::Continue { label } => {
        let label = expect_label(label);
        self.push(Instruction::Jump(format!("{label}_continue")));
      }
      StmtKind::Null => {}
    }
  }

  fn lower_if(
    &mut self,
    cond: &ast::Expr,
    then_branch: &ast::Statement,
    else_branch: Option<&ast::Statement>,
  ) {
    let cond = self.lower_expr(cond);
    match else_branch {
      Some(else_branch) => {
        let else_label = self.fresh_label("else");
        let end_label = self.fresh_label("end");
        self.push(Instruction::JumpIfZero {
          cond,
          target: else_label.clone(),
        });
        self.lower_statement(then_branch);
        self.push(Instruction::Jump(end_label.clone()));
        self.push(Instruction::Label(else_label));
        self.lower_statement(else_branch);
        self.push(Instruction::Label(end_label));
      }
      None => {
        let end_label = self.fresh_label("end");
        self.push(Instruction::JumpIfZero {
          cond,
          target: end_label.clone(),
        });
        self.lower_statement(then_branch);
        self.push(Instruction::Label(end_label));
      }
    }
  }

  fn lower_expr(&mut self, expr: &ast::Expr) -> Value {
    match &expr.kind {
      ExprKind::Constant(value) => Value::Constant(*value),
      ExprKind::Var(name) => Value::Var(name.clone()),
      ExprKind::Unary { op, operand } => {
        let src = self.lower_expr(operand);
        let dst = self.fresh_temp();
        self.push(Instruction::Unary {
          op: convert_unary(*op),
          src,
          dst: dst.clone(),
        });
        dst
      }
      ExprKind::Binary {
        op: ast::BinaryOp::And,
        left,
        right,
      } => self.lower_and(left, right),
      ExprKind::Binary {
        op: ast::BinaryOp::Or,
        left,
        right,
      } => self.lower_or(left, right),
      ExprKind::Binary { op, left, right } => {
        let src1 = self.lower_expr(left);
        let src2 = self.lower_expr(right);
        let dst = self.fresh_temp();
        self.push(Instruction::Binary {
          op: convert_binary(*op),
          src1,
          src2,
          dst: dst.clone(),
        });
        dst
      }
      ExprKind::Assignment { lvalue, rvalue } => {
        let name = match &lvalue.kind {
          ExprKind::Var(name) => name.clone(),
          _ => panic!("not an lvalue"),
        };
        let value = self.lower_expr(rvalue);
        self.push(Instruction::Copy {
          src: value,
          dst: Value::Var(name.clone()),
        });
        Value::Var(name)
      }
      ExprKind::Conditional {
        cond,
        then_expr,
        else_expr,
      } => {
        let cond = self.lower_expr(cond);
        let else_label = self.fresh_label("else");
        let end_label = self.fresh_label("end");
        let result = self.fresh_temp();
        self.push(Instruction::JumpIfZero {
          cond,
          target: else_label.clone(),
        });
        let then_value = self.lower_expr(then_expr);
        self.push(Instruction::Copy {
          src: then_value,
          dst: result.clone(),
        });
        self.push(Instruction::Jump(end_label.clone()));
        self.push(Instruction::Label(else_label));
        let else_value = self.lower_expr(else_expr);
        self.push(Instruction::Copy {
          src: else_value,
          dst: result.clone(),
        });
        self.push(Instruction::Label(end_label));
        result
      }
    }
  }

  /// `a && b`: the right side only evaluates when the left is non-zero,
  /// and the result is exactly 0 or 1.
  fn lower_and(&mut self, left: &ast::Expr, right: &ast::Expr) -> Value {
    let false_label = self.fresh_label("false");
    let end_label = self.fresh_label("end");
    let result = self.fresh_temp();
    let left = self.lower_expr(left);
    self.push(Instruction::JumpIfZero {
      cond: left,
      target: false_label.clone(),
    });
    let right = self.lower_expr(right);
    self.push(Instruction::JumpIfZero {
      cond: right,
      target: false_label.clone(),
    });
    self.push(Instruction::Copy {
      src: Value::Constant(1),
      dst: result.clone(),
    });
    self.push(Instruction::Jump(end_label.clone()));
    self.push(Instruction::Label(false_label));
    self.push(Instruction::Copy {
      src: Value::Constant(0),
      dst: result.clone(),
    });
    self.push(Instruction::Label(end_label));
    result
  }

  /// `a || b`: mirror image of `&&` with the jump sense inverted.
  fn lower_or(&mut self, left: &ast::Expr, right: &ast::Expr) -> Value {
    let true_label = self.fresh_label("true");
    let end_label = self.fresh_label("end");
    let result = self.fresh_temp();
    let left = self.lower_expr(left);
    self.push(Instruction::JumpIfNotZero {
      cond: left,
      target: true_label.clone(),
    });
    let right = self.lower_expr(right);
    self.push(Instruction::JumpIfNotZero {
      cond: right,
      target: true_label.clone(),
    });
    self.push(Instruction::Copy {
      src: Value::Constant(0),
      dst: result.clone(),
    });
    self.push(Instruction::Jump(end_label.clone()));
    self.push(Instruction::Label(true_label));
    self.push(Instruction::Copy {
      src: Value::Constant(1),
      dst: result.clone(),
    });
    self.push(Instruction::Label(end_label));
    result
  }
}

/// Loop labels are filled in by the labeling pass before lowering runs.
fn expect_label(label: &Option<String>) -> &str {
  label.as_deref().expect("loop statement missing label")
}

fn convert_unary(op: ast::UnaryOp) -> UnaryOp {
  match op {
    ast::UnaryOp::Complement => UnaryOp::Complement,
    ast::UnaryOp::Negate => UnaryOp::Negate,
    ast::UnaryOp::Not => UnaryOp::Not,
  }
}

fn convert_binary(op: ast::BinaryOp) -> BinaryOp {
  match op {
    ast::BinaryOp::Add => BinaryOp::Add,
    ast::BinaryOp::Subtract => BinaryOp::Subtract,
    ast::BinaryOp::Multiply => BinaryOp::Multiply,
    ast::BinaryOp::Divide => BinaryOp::Divide,
    ast::BinaryOp::Remainder => BinaryOp::Remainder,
    ast::BinaryOp::Equal => BinaryOp::Equal,
    ast::BinaryOp::NotEqual => BinaryOp::NotEqual,
    ast::BinaryOp::LessThan => BinaryOp::LessThan,
    ast::BinaryOp::LessOrEqual => BinaryOp::LessOrEqual,
    ast::BinaryOp::GreaterThan => BinaryOp::GreaterThan,
    ast::BinaryOp::GreaterOrEqual => BinaryOp::GreaterOrEqual,
    ast::BinaryOp::And | ast::BinaryOp::Or => {
      panic!("short-circuit operators lower through jumps")
    }
  }
}
